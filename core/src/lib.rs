// Twostep Core Library
// Two-call chain-of-thought pipeline over an OpenAI-compatible chat API

pub mod client;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompt;
pub mod retry;

// Export core types
pub use client::{
    ChatRequest, ChatResponse, ChatTransport, Choice, ChoiceMessage, CompletionClient,
    HttpTransport, Usage,
};
pub use config::{ProviderConfig, TwoStepConfig};
pub use error::{ErrorKind, ProviderError, ProviderFailure, Result, TwoStepError};
pub use pipeline::{Step, TwoStepOutput, TwoStepPipeline};
pub use prompt::{PromptTemplater, Role, Turn};
pub use retry::{Jitter, RetryPolicy};
