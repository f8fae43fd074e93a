//! # omnigen
//!
//! A provider-agnostic Rust client for LLM HTTP APIs: text chat,
//! multi-modal input, tool calling, streaming, and batch jobs behind one
//! typed surface.
//!
//! ## Overview
//!
//! Callers build neutral [`Message`]s and [`GenOptions`], hand them to an
//! [`Engine`] parameterised by a vendor [`Adapter`], and get back the
//! same neutral [`Completion`] whichever vendor served the request. The
//! crate ships a reference adapter for OpenAI-compatible
//! chat-completions servers ([`openai::ChatAdapter`]); other vendors
//! implement the [`Adapter`] contract.
//!
//! ## Synchronous generation
//!
//! ```rust,no_run
//! use omnigen::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> omnigen::Result<()> {
//!     let transport = Transport::new()
//!         .with_header("Authorization", "Bearer not-needed")?;
//!     let provider = Provider::new(
//!         transport,
//!         Codec::new(DecodeMode::Lenient),
//!         "http://localhost:1234/v1",
//!     )
//!     .with_model(Some("qwen2.5-32b-instruct".to_string()));
//!     let engine = Engine::new(provider, ChatAdapter::new());
//!
//!     let options = GenOptions::builder().max_tokens(128).build()?;
//!     let completion = engine
//!         .gen_sync(&[Message::user("Say hi")], &options)
//!         .await?;
//!     println!("{}", completion.text());
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming
//!
//! ```rust,no_run
//! # use omnigen::prelude::*;
//! # async fn run(engine: Engine<ChatAdapter>) -> omnigen::Result<()> {
//! let options = GenOptions::builder().build()?;
//! let mut stream = engine
//!     .gen_stream(&[Message::user("Tell me a story")], &options)
//!     .await?;
//! while let Some(fragment) = stream.next().await {
//!     if let Fragment::Text(t) = fragment {
//!         print!("{t}");
//!     }
//! }
//! let completion = stream.finish().await?;
//! println!("\n[{}]", completion.usage.finish_reason);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Layered, each module depending only on those below it:
//!
//! - **transport** + **retry**: HTTP round-trips with backoff, header
//!   injection, request-id tagging
//! - **codec**: strict/lenient JSON with two-pass success/error decode
//! - **sse**: the server-sent-event demultiplexer
//! - **provider**: shared request plumbing, header snapshots, model
//!   selection
//! - **engine**: the generic generation engine (sync, streaming, raw)
//! - **batch**: submit / poll / cancel for asynchronous jobs
//! - **simulate**: streaming simulated over the synchronous path
//! - **adapter**: the contract a vendor adapter implements
//! - **openai**: the reference chat-completions adapter

/// The adapter contract: vendor DTO traits and the [`Adapter`] trait the
/// engine drives.
pub mod adapter;

/// Asynchronous-job (batch) lifecycle: submit, poll, cancel.
pub mod batch;

/// Strict/lenient JSON codec with two-pass success/error decoding.
pub mod codec;

/// The generation engine: sync, streaming, and raw paths plus the
/// fragment accumulator.
pub mod engine;

/// Error types and the crate-wide `Result` alias.
mod error;

/// Neutral request options and their builder.
pub mod options;

/// Reference adapter for OpenAI-compatible chat-completions servers.
pub mod openai;

/// Provider base: transport + codec + model selection + header
/// snapshots.
pub mod provider;

/// Retry policy used by the transport.
pub mod retry;

/// SSE demultiplexer (internal; driven by the engine).
mod sse;

/// Streaming simulation for synchronous-only providers.
pub mod simulate;

/// HTTP transport: retries, header injection, request-id tagging.
pub mod transport;

/// The neutral data model: messages, fragments, completions, usage.
pub mod types;

// --- Core re-exports ---

pub use adapter::{Adapter, VendorRequest, VendorResponse};
pub use batch::BatchAdapter;
pub use codec::{Codec, DecodeMode, ErrorPayload};
pub use engine::{Accumulator, Engine, GenStream};
pub use error::{Error, Result};
pub use options::{GenOptions, GenOptionsBuilder, ToolChoice, ToolDef};
pub use provider::{ModelInfo, ModelQuery, ModelSelection, Provider, ProviderConfig, resolve_model};
pub use retry::RetryConfig;
pub use simulate::gen_stream_via_sync;
pub use transport::Transport;
pub use types::{
    Citation, Completion, Content, Doc, DocSource, FinishReason, Fragment, Job, Message, Modality,
    Opaque, RateLimit, RateLimitKind, Reply, Role, TokenLogprob, ToolCall, ToolCallFragment,
    ToolResult, Usage,
};

/// Convenience module with the most commonly used items.
///
/// ```rust
/// use omnigen::prelude::*;
/// ```
pub mod prelude {
    pub use crate::openai::ChatAdapter;
    pub use crate::{
        Codec, Completion, Content, DecodeMode, Doc, Engine, Error, FinishReason, Fragment,
        GenOptions, GenStream, Job, Message, Modality, Provider, Reply, Result, Role, ToolCall,
        ToolChoice, ToolDef, ToolResult, Transport, Usage,
    };
}
