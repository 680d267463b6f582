//! LLM provider abstraction for Genesis.
//!
//! Defines the [`Provider`] trait and the OpenAI-format chat types the
//! orchestration core speaks (including tool-call requests and results),
//! a [`RetryPolicy`] wrapper with bounded attempts and full-jitter
//! pacing, and a [`ScriptedProvider`] for deterministic tests and
//! offline runs. Concrete HTTP adapters live with the boundary
//! collaborators; this crate is the contract.

pub mod error;
pub mod provider;
pub mod retry;
pub mod scripted;
pub mod types;

pub use error::{ProviderError, Result};
pub use provider::{ChunkStream, Provider};
pub use retry::{RetryLimits, RetryPolicy};
pub use scripted::{ScriptStep, ScriptedProvider};
pub use types::{ChatMessage, ChatRequest, ChatResponse, StreamChunk, ToolCall, Usage};
