//! Chat persistence and conversation state
//!
//! This module provides the SQLite-backed chat store and the in-memory
//! session view the chat pipeline works against.

mod conversation;
mod database;
mod session;

pub use conversation::*;
pub use database::*;
pub use session::*;
