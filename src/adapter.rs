//! The contract a provider adapter implements.
//!
//! An adapter is the quadruple of vendor DTO types — error payload,
//! request, response, stream chunk — plus a stream-processing function,
//! packaged behind the [`Adapter`] trait so the generic engine can drive
//! any vendor without knowing its wire shapes.
//!
//! The engine never introspects the DTOs: requests are built through
//! [`VendorRequest::init`], responses leave through
//! [`VendorResponse::to_completion`], and chunks pass opaquely from the
//! SSE demultiplexer into [`Adapter::process_stream`].

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use crate::Result;
use crate::codec::ErrorPayload;
use crate::options::GenOptions;
use crate::types::{Completion, Fragment, Message, RateLimit};

/// A vendor request DTO the engine can drive.
pub trait VendorRequest: Serialize + Default + Send + Sync + 'static {
    /// Translates neutral messages and options into this vendor request.
    ///
    /// May return [`Error::Unsupported`](crate::Error::Unsupported) when
    /// some options cannot be honoured but the request is still
    /// sendable; the engine records the skip and continues. Any other
    /// error aborts the call.
    fn init(
        &mut self,
        messages: &[Message],
        model: Option<&str>,
        options: &GenOptions,
    ) -> Result<()>;

    /// Toggles the vendor's streaming flag.
    fn set_stream(&mut self, stream: bool);
}

/// A vendor response DTO the engine can convert back.
pub trait VendorResponse:
    DeserializeOwned + Serialize + Default + PartialEq + Send + Sync + 'static
{
    /// Translates this vendor response into the neutral [`Completion`].
    fn to_completion(self) -> Result<Completion>;
}

/// A provider adapter: vendor DTO types plus behavior flags.
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// The vendor's error envelope.
    type Error: ErrorPayload;
    /// The vendor's request DTO.
    type Request: VendorRequest;
    /// The vendor's response DTO.
    type Response: VendorResponse;
    /// The vendor's stream-chunk DTO. Opaque to the engine; only
    /// [`Adapter::process_stream`] interprets it.
    type Chunk: DeserializeOwned + Serialize + Default + PartialEq + Send + Sync + 'static;

    /// The generation endpoint, shared by the sync and streaming paths.
    fn completion_url(&self, base_url: &str) -> String;

    /// Consumes chunks from the demultiplexer, emitting normalised
    /// fragments on `fragments` and accumulating the final state into
    /// `completion`.
    ///
    /// Must drain `chunks` even after deciding to fail, so the producer
    /// is never blocked on a full channel. Returning an error propagates
    /// through the stream's `finish()`.
    async fn process_stream(
        &self,
        chunks: mpsc::Receiver<Self::Chunk>,
        fragments: mpsc::Sender<Fragment>,
        completion: &mut Completion,
    ) -> Result<()>;

    /// Extracts rate limits from a response-header snapshot. The default
    /// reports none.
    fn process_headers(&self, _headers: &HeaderMap) -> Vec<RateLimit> {
        Vec::new()
    }

    /// Set for vendors that label tool-call terminations as a plain
    /// stop; the engine rewrites the finish reason after accumulation.
    fn lie_tool_calls(&self) -> bool {
        false
    }

    /// Set when the vendor round-trips opaque fields (reasoning
    /// signatures). When unset, the engine rejects messages carrying
    /// them rather than silently dropping data.
    fn allow_opaque_fields(&self) -> bool {
        false
    }
}
