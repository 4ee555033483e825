mod feeds;
mod posts;
mod schema;
mod types;
mod users;

pub use schema::Database;
pub use types::{Feed, NewPost, Post, StorageError, User};
