//! SQLite database module for the Seamline engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
