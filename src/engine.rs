//! The generation engine: sync, streaming, and raw request paths.
//!
//! [`Engine`] is generic over an [`Adapter`] and drives the full request
//! lifecycle: validate → build vendor request → send → decode → neutral
//! [`Completion`]. The streaming path fans out into two tasks — an HTTP
//! producer feeding the SSE demultiplexer, and a consumer running the
//! adapter's `process_stream` — joined before [`GenStream::finish`]
//! returns.
//!
//! # Continuable errors
//!
//! When an adapter skips options it cannot honour, the call still runs
//! and the engine returns [`Error::Unsupported`] with the completion
//! attached. Destructure it to keep the output:
//!
//! ```rust,ignore
//! match engine.gen_sync(&messages, &options).await {
//!     Ok(completion) => use_it(completion),
//!     Err(e) => match e.into_completion() {
//!         Some((completion, skipped)) => {
//!             eprintln!("ignored: {skipped:?}");
//!             use_it(completion);
//!         }
//!         None => return Err(...),
//!     },
//! }
//! ```

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::StreamExt;
use reqwest::Method;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::adapter::{Adapter, VendorRequest, VendorResponse};
use crate::options::GenOptions;
use crate::provider::Provider;
use crate::sse;
use crate::types::{
    Completion, Fragment, FinishReason, Message, Modality, Opaque, Reply, ToolCall,
    validate_messages,
};
use crate::{Error, Result};

/// Capacity of the fragment and chunk channels. Small enough that a slow
/// consumer exerts backpressure on the HTTP read.
const CHANNEL_CAPACITY: usize = 16;

type Finisher = Box<dyn FnOnce(&mut Completion) -> Result<()> + Send>;

// ============================================================================
// FRAGMENT ACCUMULATION
// ============================================================================

/// Folds streamed [`Fragment`]s into an append-only reply list.
///
/// Adapters use this inside `process_stream` so every vendor accumulates
/// identically:
///
/// - text and thinking deltas append to the last reply of their kind, or
///   open a new one
/// - a tool-call fragment with a non-empty id opens a new tool call;
///   id-less argument deltas concatenate onto the most recently opened
///   call
/// - citations attach to the current text reply
/// - opaque bags merge into the current reply, last write wins per key
/// - documents append as-is
#[derive(Debug, Default)]
pub struct Accumulator {
    replies: Vec<Reply>,
}

impl Accumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one fragment in. Empty fragments are ignored.
    pub fn push(&mut self, fragment: &Fragment) -> Result<()> {
        if fragment.is_empty() {
            return Ok(());
        }
        match fragment {
            Fragment::Text(t) => match self.replies.last_mut() {
                Some(Reply::Text { text, .. }) => text.push_str(t),
                _ => self.replies.push(Reply::text(t.clone())),
            },
            Fragment::Thinking(t) => match self.replies.last_mut() {
                Some(Reply::Thinking { text, .. }) => text.push_str(t),
                _ => self.replies.push(Reply::Thinking {
                    text: t.clone(),
                    opaque: Opaque::new(),
                }),
            },
            Fragment::ToolCall(tc) => {
                if !tc.id.is_empty() {
                    if !tc.arguments.is_empty() {
                        return Err(Error::stream(
                            "tool-call fragment opens a call and carries arguments at once",
                        ));
                    }
                    self.replies.push(Reply::ToolCall(ToolCall {
                        id: tc.id.clone(),
                        name: tc.name.clone(),
                        arguments: String::new(),
                        opaque: Opaque::new(),
                    }));
                } else {
                    let pending = self.replies.iter_mut().rev().find_map(|r| match r {
                        Reply::ToolCall(tc) => Some(tc),
                        _ => None,
                    });
                    match pending {
                        Some(call) => {
                            if call.name.is_empty() && !tc.name.is_empty() {
                                call.name = tc.name.clone();
                            }
                            call.arguments.push_str(&tc.arguments);
                        }
                        None => {
                            return Err(Error::stream(
                                "tool-call arguments arrived with no open tool call",
                            ));
                        }
                    }
                }
            }
            Fragment::Citation(c) => match self.replies.last_mut() {
                Some(Reply::Text { citations, .. }) => citations.push(c.clone()),
                // No text reply is current (none yet, or something else
                // has opened since): start one for the citation.
                _ => self.replies.push(Reply::Text {
                    text: String::new(),
                    citations: vec![c.clone()],
                    opaque: Opaque::new(),
                }),
            },
            Fragment::Doc(d) => self.replies.push(Reply::Doc(d.clone())),
            Fragment::Opaque(o) => {
                let bag = match self.replies.last_mut() {
                    Some(Reply::Text { opaque, .. }) | Some(Reply::Thinking { opaque, .. }) => {
                        opaque
                    }
                    Some(Reply::ToolCall(tc)) => &mut tc.opaque,
                    // Nothing open (or a document, which carries no
                    // bag): the payload still must not be dropped.
                    _ => {
                        self.replies.push(Reply::Thinking {
                            text: String::new(),
                            opaque: Opaque::new(),
                        });
                        match self.replies.last_mut() {
                            Some(Reply::Thinking { opaque, .. }) => opaque,
                            _ => unreachable!("just pushed a thinking reply"),
                        }
                    }
                };
                for (k, v) in o {
                    bag.insert(k.clone(), v.clone());
                }
            }
        }
        Ok(())
    }

    /// The accumulated replies, in arrival order.
    pub fn into_replies(self) -> Vec<Reply> {
        self.replies
    }
}

// ============================================================================
// STREAM HANDLE
// ============================================================================

/// Handle to an in-flight streaming generation.
///
/// Iterate fragments with [`GenStream::next`] (or the `futures::Stream`
/// impl), then call [`GenStream::finish`] for the accumulated
/// [`Completion`]. `finish` joins both streaming tasks first, so it
/// strictly happens-after the last fragment; it drains any unread
/// fragments itself, so calling it early is safe.
pub struct GenStream {
    fragments: mpsc::Receiver<Fragment>,
    supervisor: JoinHandle<Result<Completion>>,
    finisher: Option<Finisher>,
    skipped: Option<Vec<String>>,
}

impl GenStream {
    pub(crate) fn from_parts(
        fragments: mpsc::Receiver<Fragment>,
        supervisor: JoinHandle<Result<Completion>>,
        finisher: Option<Finisher>,
        skipped: Option<Vec<String>>,
    ) -> Self {
        GenStream {
            fragments,
            supervisor,
            finisher,
            skipped,
        }
    }

    /// The next fragment, or `None` when the stream is exhausted.
    pub async fn next(&mut self) -> Option<Fragment> {
        self.fragments.recv().await
    }

    /// Joins the streaming tasks and returns the accumulated completion.
    ///
    /// Propagates whichever error terminated the stream (a producer
    /// failure wins over a consumer failure). A continuable
    /// unsupported-options condition is returned as
    /// [`Error::Unsupported`] with the completion attached.
    pub async fn finish(mut self) -> Result<Completion> {
        // Unread fragments would block the consumer on a full channel.
        while self.fragments.recv().await.is_some() {}

        let mut completion = match self.supervisor.await {
            Ok(result) => result?,
            Err(join_err) => {
                return Err(Error::stream(format!("streaming task failed: {join_err}")));
            }
        };
        if let Some(finish) = self.finisher.take() {
            finish(&mut completion)?;
        }
        match self.skipped.take() {
            Some(skipped) => Err(Error::Unsupported {
                skipped,
                completion: Some(Box::new(completion)),
            }),
            None => Ok(completion),
        }
    }
}

impl futures::Stream for GenStream {
    type Item = Fragment;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Fragment>> {
        self.get_mut().fragments.poll_recv(cx)
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// The generic provider engine.
pub struct Engine<A: Adapter> {
    provider: Arc<Provider>,
    adapter: Arc<A>,
}

impl<A: Adapter> Clone for Engine<A> {
    fn clone(&self) -> Self {
        Engine {
            provider: Arc::clone(&self.provider),
            adapter: Arc::clone(&self.adapter),
        }
    }
}

impl<A: Adapter> Engine<A> {
    /// Creates an engine from a provider base and an adapter.
    pub fn new(provider: Provider, adapter: A) -> Self {
        Engine {
            provider: Arc::new(provider),
            adapter: Arc::new(adapter),
        }
    }

    /// The provider base.
    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// The adapter.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Shared validation + request construction for the checked paths
    /// (the batch submit path reuses it with `stream = false`).
    pub(crate) fn prepare(
        &self,
        messages: &[Message],
        options: &GenOptions,
        stream: bool,
    ) -> Result<(A::Request, Option<Vec<String>>)> {
        validate_messages(messages)?;
        options.validate()?;
        if !options.output_modalities().is_empty()
            && !options.output_modalities().contains(&Modality::Text)
        {
            return Err(Error::validation(
                "generation requires the text output modality",
            ));
        }
        if !self.adapter.allow_opaque_fields() {
            if let Some(m) = messages.iter().find(|m| m.has_opaque()) {
                return Err(Error::validation(format!(
                    "{} message carries opaque fields this provider cannot round-trip",
                    m.role
                )));
            }
        }

        let model = self.provider.model()?;
        let mut req = A::Request::default();
        let skipped = match req.init(messages, model, options) {
            Ok(()) => None,
            Err(Error::Unsupported { skipped, .. }) => {
                debug!(?skipped, "continuing without unsupported options");
                Some(skipped)
            }
            Err(e) => return Err(e),
        };
        req.set_stream(stream);
        Ok((req, skipped))
    }

    async fn post_sync(&self, req: &A::Request) -> Result<Completion> {
        let url = self.adapter.completion_url(self.provider.base_url());
        let resp: A::Response = self
            .provider
            .do_request::<_, A::Response, A::Error>(Method::POST, &url, Some(req))
            .await?;
        let mut completion = resp.to_completion()?;
        let limits = self.adapter.process_headers(&self.provider.last_headers());
        if !limits.is_empty() {
            completion.usage.rate_limits = limits;
        }
        completion.usage.fill_total();
        completion.validate()?;
        Ok(completion)
    }

    /// Synchronous generation: one request, one complete [`Completion`].
    pub async fn gen_sync(&self, messages: &[Message], options: &GenOptions) -> Result<Completion> {
        let (req, skipped) = self.prepare(messages, options, false)?;
        let completion = self.post_sync(&req).await?;
        attach_skipped(completion, skipped)
    }

    /// Synchronous generation from a caller-built vendor request.
    ///
    /// Bypasses message validation and opaque policing so vendor-only
    /// extensions can be exercised without modelling them neutrally.
    pub async fn gen_sync_raw(&self, mut req: A::Request) -> Result<Completion> {
        req.set_stream(false);
        self.post_sync(&req).await
    }

    /// Streaming generation: fragments on the returned handle, the
    /// accumulated completion from its `finish()`.
    pub async fn gen_stream(&self, messages: &[Message], options: &GenOptions) -> Result<GenStream> {
        let (req, skipped) = self.prepare(messages, options, true)?;
        Ok(self.spawn_stream(req, skipped))
    }

    /// Streaming generation from a caller-built vendor request.
    pub async fn gen_stream_raw(&self, mut req: A::Request) -> Result<GenStream> {
        req.set_stream(true);
        Ok(self.spawn_stream(req, None))
    }

    fn spawn_stream(&self, req: A::Request, skipped: Option<Vec<String>>) -> GenStream {
        let (frag_tx, frag_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (chunk_tx, chunk_rx) = mpsc::channel::<A::Chunk>(CHANNEL_CAPACITY);
        let url = self.adapter.completion_url(self.provider.base_url());

        let producer_provider = Arc::clone(&self.provider);
        let producer = async move {
            let resp = producer_provider
                .do_request_streaming::<_, A::Error>(Method::POST, &url, &req)
                .await?;
            let body = resp.bytes_stream().map(|r| r.map_err(Error::Network)).boxed();
            sse::demux::<A::Chunk, A::Error, _>(producer_provider.codec(), body, chunk_tx).await
        };

        let consumer_adapter = Arc::clone(&self.adapter);
        let consumer = async move {
            let mut completion = Completion::default();
            consumer_adapter
                .process_stream(chunk_rx, frag_tx, &mut completion)
                .await?;
            Ok::<_, Error>(completion)
        };

        let supervisor = tokio::spawn(async move {
            let (produced, consumed) = tokio::join!(producer, consumer);
            match (produced, consumed) {
                // The producer failure is the root cause when both fail.
                (Err(pe), _) => Err(pe),
                (Ok(()), Err(ce)) => Err(ce),
                (Ok(()), Ok(completion)) => Ok(completion),
            }
        });

        let adapter = Arc::clone(&self.adapter);
        let provider = Arc::clone(&self.provider);
        let finisher: Finisher = Box::new(move |completion| {
            fix_finish_reason(completion, adapter.lie_tool_calls());
            let limits = adapter.process_headers(&provider.last_headers());
            if !limits.is_empty() {
                completion.usage.rate_limits = limits;
            }
            completion.usage.fill_total();
            completion.validate()
        });

        GenStream::from_parts(frag_rx, supervisor, Some(finisher), skipped)
    }
}

fn attach_skipped(completion: Completion, skipped: Option<Vec<String>>) -> Result<Completion> {
    match skipped {
        Some(skipped) => Err(Error::Unsupported {
            skipped,
            completion: Some(Box::new(completion)),
        }),
        None => Ok(completion),
    }
}

/// Vendors with the lie-tool-calls quirk report `stop` even when the
/// turn ended in tool calls; rewrite the finish reason from the
/// accumulated replies.
fn fix_finish_reason(completion: &mut Completion, lie_tool_calls: bool) {
    if lie_tool_calls
        && completion.usage.finish_reason == FinishReason::Stop
        && completion
            .message
            .replies
            .iter()
            .any(|r| r.as_tool_call().is_some())
    {
        completion.usage.finish_reason = FinishReason::ToolCalls;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Citation, Doc, Role, ToolCallFragment, Usage};

    fn text_frag(s: &str) -> Fragment {
        Fragment::Text(s.to_string())
    }

    #[test]
    fn test_accumulator_text_concatenation() {
        let mut acc = Accumulator::new();
        acc.push(&text_frag("Hel")).unwrap();
        acc.push(&text_frag("lo")).unwrap();
        let replies = acc.into_replies();
        assert_eq!(replies.len(), 1);
        match &replies[0] {
            Reply::Text { text, .. } => assert_eq!(text, "Hello"),
            r => panic!("expected text reply, got {r:?}"),
        }
    }

    #[test]
    fn test_accumulator_thinking_then_text() {
        let mut acc = Accumulator::new();
        acc.push(&Fragment::Thinking("hmm ".to_string())).unwrap();
        acc.push(&Fragment::Thinking("ok".to_string())).unwrap();
        acc.push(&text_frag("answer")).unwrap();
        let replies = acc.into_replies();
        assert_eq!(replies.len(), 2);
        assert!(matches!(&replies[0], Reply::Thinking { text, .. } if text == "hmm ok"));
        assert!(matches!(&replies[1], Reply::Text { text, .. } if text == "answer"));
    }

    #[test]
    fn test_accumulator_tool_call_assembly() {
        let mut acc = Accumulator::new();
        acc.push(&Fragment::ToolCall(ToolCallFragment {
            id: "call_1".to_string(),
            name: "add".to_string(),
            arguments: String::new(),
        }))
        .unwrap();
        acc.push(&Fragment::ToolCall(ToolCallFragment {
            arguments: "{\"a\":2,".to_string(),
            ..Default::default()
        }))
        .unwrap();
        acc.push(&Fragment::ToolCall(ToolCallFragment {
            arguments: "\"b\":3}".to_string(),
            ..Default::default()
        }))
        .unwrap();
        let replies = acc.into_replies();
        assert_eq!(replies.len(), 1);
        match &replies[0] {
            Reply::ToolCall(tc) => {
                assert_eq!(tc.id, "call_1");
                assert_eq!(tc.name, "add");
                assert_eq!(tc.arguments, "{\"a\":2,\"b\":3}");
            }
            r => panic!("expected tool call, got {r:?}"),
        }
    }

    #[test]
    fn test_accumulator_rejects_open_with_arguments() {
        let mut acc = Accumulator::new();
        let err = acc
            .push(&Fragment::ToolCall(ToolCallFragment {
                id: "call_1".to_string(),
                name: "add".to_string(),
                arguments: "{\"a\":2}".to_string(),
            }))
            .unwrap_err();
        assert!(matches!(err, Error::Stream(_)));
    }

    #[test]
    fn test_accumulator_rejects_orphan_arguments() {
        let mut acc = Accumulator::new();
        let err = acc
            .push(&Fragment::ToolCall(ToolCallFragment {
                arguments: "{}".to_string(),
                ..Default::default()
            }))
            .unwrap_err();
        assert!(matches!(err, Error::Stream(_)));
    }

    #[test]
    fn test_accumulator_interleaved_tool_calls_target_latest() {
        let mut acc = Accumulator::new();
        acc.push(&Fragment::ToolCall(ToolCallFragment {
            id: "call_1".to_string(),
            name: "first".to_string(),
            arguments: String::new(),
        }))
        .unwrap();
        acc.push(&Fragment::ToolCall(ToolCallFragment {
            id: "call_2".to_string(),
            name: "second".to_string(),
            arguments: String::new(),
        }))
        .unwrap();
        acc.push(&Fragment::ToolCall(ToolCallFragment {
            arguments: "{}".to_string(),
            ..Default::default()
        }))
        .unwrap();
        let replies = acc.into_replies();
        match &replies[1] {
            Reply::ToolCall(tc) => {
                assert_eq!(tc.id, "call_2");
                assert_eq!(tc.arguments, "{}");
            }
            r => panic!("expected tool call, got {r:?}"),
        }
        match &replies[0] {
            Reply::ToolCall(tc) => assert!(tc.arguments.is_empty()),
            r => panic!("expected tool call, got {r:?}"),
        }
    }

    #[test]
    fn test_accumulator_citation_attaches_to_text() {
        let mut acc = Accumulator::new();
        acc.push(&text_frag("cited claim")).unwrap();
        acc.push(&Fragment::Citation(Citation {
            source: "https://example.com".to_string(),
            ..Default::default()
        }))
        .unwrap();
        let replies = acc.into_replies();
        match &replies[0] {
            Reply::Text { citations, .. } => assert_eq!(citations.len(), 1),
            r => panic!("expected text reply, got {r:?}"),
        }
    }

    #[test]
    fn test_accumulator_citation_after_tool_call_opens_new_text() {
        // A citation only ever belongs to the current reply; a text
        // reply closed by an intervening tool call must not pick it up.
        let mut acc = Accumulator::new();
        acc.push(&text_frag("earlier text")).unwrap();
        acc.push(&Fragment::ToolCall(ToolCallFragment {
            id: "call_1".to_string(),
            name: "add".to_string(),
            arguments: String::new(),
        }))
        .unwrap();
        acc.push(&Fragment::Citation(Citation {
            source: "https://example.com/late".to_string(),
            ..Default::default()
        }))
        .unwrap();

        let replies = acc.into_replies();
        assert_eq!(replies.len(), 3);
        match &replies[0] {
            Reply::Text { citations, .. } => assert!(citations.is_empty()),
            r => panic!("expected text reply, got {r:?}"),
        }
        match &replies[2] {
            Reply::Text { text, citations, .. } => {
                assert!(text.is_empty());
                assert_eq!(citations[0].source, "https://example.com/late");
            }
            r => panic!("expected text reply, got {r:?}"),
        }
    }

    #[test]
    fn test_accumulator_opaque_last_write_wins() {
        let mut acc = Accumulator::new();
        acc.push(&Fragment::Thinking("t".to_string())).unwrap();
        let mut first = Opaque::new();
        first.insert("sig".to_string(), serde_json::json!("old"));
        first.insert("alg".to_string(), serde_json::json!("a1"));
        acc.push(&Fragment::Opaque(first)).unwrap();
        let mut second = Opaque::new();
        second.insert("sig".to_string(), serde_json::json!("new"));
        acc.push(&Fragment::Opaque(second)).unwrap();

        let replies = acc.into_replies();
        match &replies[0] {
            Reply::Thinking { opaque, .. } => {
                assert_eq!(opaque["sig"], serde_json::json!("new"));
                assert_eq!(opaque["alg"], serde_json::json!("a1"));
            }
            r => panic!("expected thinking reply, got {r:?}"),
        }
    }

    #[test]
    fn test_accumulator_doc_reply() {
        let mut acc = Accumulator::new();
        acc.push(&Fragment::Doc(Doc::from_url("https://example.com/img.png")))
            .unwrap();
        assert!(matches!(acc.into_replies()[0], Reply::Doc(_)));
    }

    #[test]
    fn test_accumulator_skips_empty_fragments() {
        let mut acc = Accumulator::new();
        acc.push(&text_frag("")).unwrap();
        acc.push(&Fragment::Opaque(Opaque::new())).unwrap();
        assert!(acc.into_replies().is_empty());
    }

    #[test]
    fn test_fix_finish_reason() {
        let mut c = Completion {
            message: Message {
                role: Role::Assistant,
                replies: vec![Reply::ToolCall(ToolCall {
                    id: "call_1".to_string(),
                    name: "add".to_string(),
                    arguments: "{}".to_string(),
                    opaque: Opaque::new(),
                })],
                ..Default::default()
            },
            usage: Usage {
                finish_reason: FinishReason::Stop,
                ..Default::default()
            },
            logprobs: None,
        };

        // Flag off: untouched.
        fix_finish_reason(&mut c, false);
        assert_eq!(c.usage.finish_reason, FinishReason::Stop);

        // Flag on: rewritten.
        fix_finish_reason(&mut c, true);
        assert_eq!(c.usage.finish_reason, FinishReason::ToolCalls);

        // No tool calls: untouched even with the flag.
        let mut plain = Completion {
            message: Message::assistant(vec![Reply::text("hi")]),
            usage: Usage {
                finish_reason: FinishReason::Stop,
                ..Default::default()
            },
            logprobs: None,
        };
        fix_finish_reason(&mut plain, true);
        assert_eq!(plain.usage.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn test_gen_stream_handle_order_and_finish() {
        let (frag_tx, frag_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let supervisor = tokio::spawn(async move {
            let mut acc = Accumulator::new();
            for part in ["Hel", "lo"] {
                let f = Fragment::Text(part.to_string());
                acc.push(&f).unwrap();
                frag_tx.send(f).await.unwrap();
            }
            Ok(Completion {
                message: Message {
                    role: Role::Assistant,
                    replies: acc.into_replies(),
                    ..Default::default()
                },
                usage: Usage {
                    finish_reason: FinishReason::Stop,
                    input_tokens: 3,
                    output_tokens: 2,
                    ..Default::default()
                },
                logprobs: None,
            })
        });
        let mut stream = GenStream::from_parts(frag_rx, supervisor, None, None);

        let mut collected = String::new();
        while let Some(f) = stream.next().await {
            if let Fragment::Text(t) = f {
                collected.push_str(&t);
            }
        }
        let completion = stream.finish().await.unwrap();
        assert_eq!(collected, "Hello");
        assert_eq!(completion.text(), "Hello");
    }

    #[tokio::test]
    async fn test_gen_stream_finish_drains_unread_fragments() {
        let (frag_tx, frag_rx) = mpsc::channel(2);
        let supervisor = tokio::spawn(async move {
            // More fragments than the channel holds; finish() must
            // drain or this send blocks forever.
            for i in 0..16 {
                frag_tx
                    .send(Fragment::Text(format!("{i}")))
                    .await
                    .map_err(|_| Error::stream("receiver gone"))?;
            }
            Ok(Completion::pending())
        });
        let stream = GenStream::from_parts(frag_rx, supervisor, None, None);
        let completion = stream.finish().await.unwrap();
        assert_eq!(completion.usage.finish_reason, FinishReason::Pending);
    }

    #[tokio::test]
    async fn test_gen_stream_finish_surfaces_skipped() {
        let (frag_tx, frag_rx) = mpsc::channel::<Fragment>(1);
        drop(frag_tx); // no fragments for this stream
        let supervisor = tokio::spawn(async move { Ok(Completion::pending()) });
        let stream = GenStream::from_parts(
            frag_rx,
            supervisor,
            None,
            Some(vec!["Seed".to_string()]),
        );
        let err = stream.finish().await.unwrap_err();
        let (completion, skipped) = err.into_completion().expect("continuable");
        assert_eq!(skipped, vec!["Seed".to_string()]);
        assert_eq!(completion.usage.finish_reason, FinishReason::Pending);
    }
}
