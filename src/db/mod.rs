mod connection;
pub mod helpers;
mod migrations;
pub mod repositories;
mod store;

pub use connection::Database;
