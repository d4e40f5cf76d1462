//! LLM provider abstractions and implementations
//!
//! This module provides the interface the chat pipeline uses to reach a
//! locally hosted language model, and the Ollama client behind it.

pub mod errors;
pub mod ollama;
pub mod provider;
pub mod types;

pub use errors::*;
pub use provider::*;
pub use types::*;
