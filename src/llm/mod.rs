//! Completion client layer
//!
//! The planner hands a finished prompt to a [`CompletionClient`]; this module
//! holds the message types, the trait, the chat-completions client and a mock.

pub mod client;
pub mod openai;
pub mod types;

pub use client::{CompletionClient, MockCompletionClient};
pub use openai::OpenAiClient;
pub use types::{CompletionRequest, CompletionResponse, Message, Role, Usage};
