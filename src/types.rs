//! Neutral data model shared by every provider.
//!
//! The types in this module are the provider-agnostic currency of the
//! crate. Callers build [`Message`]s, the engine returns [`Completion`]s,
//! and streaming callers consume [`Fragment`]s. Adapters translate between
//! these types and their vendor's wire format; nothing here is specific to
//! any vendor.
//!
//! # Message anatomy
//!
//! A [`Message`] carries a [`Role`] plus three item lists:
//!
//! - `contents`: inbound items — text or document attachments ([`Content`])
//! - `replies`: outbound items — text, thinking, tool calls, generated
//!   documents ([`Reply`])
//! - `tool_results`: results of tool calls the model requested earlier
//!
//! A valid message has a role and at least one item across the three
//! lists. See [`Message::validate`].
//!
//! # Opaque round-tripping
//!
//! Some vendors attach payloads that must be echoed back verbatim on the
//! next turn (reasoning signatures are the common case). These live in
//! [`Opaque`] bags on replies and tool calls. The engine never interprets
//! them; providers that cannot round-trip them reject messages carrying
//! them (see the opaque-field policy on the engine).

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Unstructured vendor payload preserved verbatim across round-trips.
///
/// A `BTreeMap` keeps serialization order stable so echoing the bag back
/// to the vendor is byte-deterministic.
pub type Opaque = BTreeMap<String, serde_json::Value>;

// ============================================================================
// ROLES AND MESSAGES
// ============================================================================

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Input from the human or calling application.
    #[default]
    User,
    /// Output from the model.
    Assistant,
    /// Tool execution results flowing back to the model.
    #[serde(alias = "tool")]
    Computer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Computer => write!(f, "computer"),
        }
    }
}

/// Inbound content item: what the caller sends to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },
    /// A document attachment (image, PDF, audio, ...).
    Doc(Doc),
}

impl Content {
    /// Convenience constructor for a text item.
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Content::Text { text } => {
                if text.is_empty() {
                    return Err(Error::validation("empty text content"));
                }
                Ok(())
            }
            Content::Doc(doc) => doc.validate(),
        }
    }
}

/// Outbound content item: what the model produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    /// Generated text, with any citations grounding it.
    Text {
        /// The generated text.
        text: String,
        /// Citations attached to this text, in arrival order.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        citations: Vec<Citation>,
        /// Vendor payload to echo back on the next turn.
        #[serde(default, skip_serializing_if = "Opaque::is_empty")]
        opaque: Opaque,
    },
    /// Reasoning text. Vendors that sign their reasoning put the
    /// signature in `opaque`.
    Thinking {
        /// The reasoning text.
        text: String,
        /// Vendor payload to echo back on the next turn.
        #[serde(default, skip_serializing_if = "Opaque::is_empty")]
        opaque: Opaque,
    },
    /// A request from the model to run a tool.
    ToolCall(ToolCall),
    /// A generated document (image, audio, ...).
    Doc(Doc),
}

impl Reply {
    /// Convenience constructor for a plain text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text {
            text: text.into(),
            citations: Vec::new(),
            opaque: Opaque::new(),
        }
    }

    /// The reply's opaque bag, if the variant carries one.
    pub fn opaque(&self) -> Option<&Opaque> {
        match self {
            Reply::Text { opaque, .. } | Reply::Thinking { opaque, .. } => Some(opaque),
            Reply::ToolCall(tc) => Some(&tc.opaque),
            Reply::Doc(_) => None,
        }
    }

    /// The tool call, if this reply is one with a non-empty id or name.
    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        match self {
            Reply::ToolCall(tc) if !tc.id.is_empty() || !tc.name.is_empty() => Some(tc),
            _ => None,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Reply::Text { .. } | Reply::Thinking { .. } => Ok(()),
            Reply::ToolCall(tc) => tc.validate(),
            Reply::Doc(doc) => doc.validate(),
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ToolCall {
    /// Vendor-issued identifier correlating the eventual [`ToolResult`].
    pub id: String,
    /// Name of the tool to run.
    pub name: String,
    /// Arguments as a JSON-encoded string, exactly as the vendor sent
    /// them. Kept as a string because streaming assembles it from
    /// arbitrary-boundary deltas.
    pub arguments: String,
    /// Vendor payload to echo back on the next turn.
    #[serde(default, skip_serializing_if = "Opaque::is_empty")]
    pub opaque: Opaque,
}

impl ToolCall {
    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::validation("tool call without a name"));
        }
        if !self.arguments.is_empty() {
            serde_json::from_str::<serde_json::Value>(&self.arguments).map_err(|e| {
                Error::validation(format!(
                    "tool call {:?} arguments are not valid JSON: {e}",
                    self.name
                ))
            })?;
        }
        Ok(())
    }
}

/// The result of running a tool, sent back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ToolResult {
    /// Id of the [`ToolCall`] this result answers.
    pub call_id: String,
    /// Textual result of the tool run.
    pub result: String,
}

/// A citation grounding a span of generated text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Citation {
    /// The cited source (URL, document id, title — vendor-dependent).
    pub source: String,
    /// The text being cited, when the vendor reports it.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    /// Start offset into the reply text, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<usize>,
    /// End offset into the reply text, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_index: Option<usize>,
}

impl Citation {
    /// True iff every field is empty.
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
            && self.text.is_empty()
            && self.start_index.is_none()
            && self.end_index.is_none()
    }
}

// ============================================================================
// DOCUMENTS
// ============================================================================

/// Where a document's bytes live. A document is URL-backed or inline,
/// never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocSource {
    /// Remote document, fetched by the vendor (or by the caller, out of
    /// band).
    Url(String),
    /// Inline bytes, sent base64-encoded on the wire.
    Bytes(#[serde(with = "doc_bytes")] Vec<u8>),
}

mod doc_bytes {
    //! Inline document bytes serialize as a JSON array of numbers by
    //! default, which is enormous on the wire; encode as a standard
    //! base64 string instead.

    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Vec<u8>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// A polymorphic document attachment: an image, PDF, audio clip, or any
/// other blob exchanged with a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doc {
    /// Suggested filename, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// MIME type. Required for inline sources on most vendors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// The bytes, by URL or inline.
    pub source: DocSource,
}

impl Doc {
    /// A URL-backed document.
    pub fn from_url(url: impl Into<String>) -> Self {
        Doc {
            filename: None,
            mime_type: None,
            source: DocSource::Url(url.into()),
        }
    }

    /// An inline document with its MIME type.
    pub fn from_bytes(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Doc {
            filename: None,
            mime_type: Some(mime_type.into()),
            source: DocSource::Bytes(data),
        }
    }

    /// Sets the filename.
    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        self.filename = Some(name.into());
        self
    }

    /// Normalises the document to `(mime_type, bytes)`.
    ///
    /// Only inline documents can be read; URL-backed documents must be
    /// fetched out of band. `max_bytes` bounds the accepted size and the
    /// check runs before anything else: a zero budget or an oversized
    /// source fails without touching the data.
    pub fn read(&self, max_bytes: usize) -> Result<(String, &[u8])> {
        if max_bytes == 0 {
            return Err(Error::validation("document read with a zero byte budget"));
        }
        match &self.source {
            DocSource::Url(url) => Err(Error::validation(format!(
                "document is URL-backed ({url}); fetch it out of band"
            ))),
            DocSource::Bytes(data) => {
                if data.len() > max_bytes {
                    return Err(Error::validation(format!(
                        "document is {} bytes, over the {} byte budget",
                        data.len(),
                        max_bytes
                    )));
                }
                let mime = self.mime_type.clone().unwrap_or_default();
                if mime.is_empty() {
                    return Err(Error::validation("inline document without a MIME type"));
                }
                Ok((mime, data))
            }
        }
    }

    fn validate(&self) -> Result<()> {
        match &self.source {
            DocSource::Url(url) if url.is_empty() => {
                Err(Error::validation("document with an empty URL"))
            }
            DocSource::Bytes(data) if data.is_empty() => {
                Err(Error::validation("document with no bytes"))
            }
            _ => Ok(()),
        }
    }
}

// ============================================================================
// MESSAGES
// ============================================================================

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Message {
    /// Who authored this message.
    pub role: Role,
    /// Inbound items (caller → model).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contents: Vec<Content>,
    /// Outbound items (model → caller), present when replaying model
    /// turns in multi-turn conversations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<Reply>,
    /// Tool results answering the model's tool calls.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,
}

impl Message {
    /// A user message with one text item.
    pub fn user(text: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            contents: vec![Content::text(text)],
            ..Default::default()
        }
    }

    /// An assistant message carrying replies (used when replaying a
    /// completion into a follow-up conversation).
    pub fn assistant(replies: Vec<Reply>) -> Self {
        Message {
            role: Role::Assistant,
            replies,
            ..Default::default()
        }
    }

    /// A computer message carrying tool results.
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Message {
            role: Role::Computer,
            tool_results: results,
            ..Default::default()
        }
    }

    /// Concatenation of all text items, inbound and outbound. Handy in
    /// tests and logs.
    pub fn joined_text(&self) -> String {
        let mut out = String::new();
        for c in &self.contents {
            if let Content::Text { text } = c {
                out.push_str(text);
            }
        }
        for r in &self.replies {
            if let Reply::Text { text, .. } = r {
                out.push_str(text);
            }
        }
        out
    }

    /// Checks the message invariants: at least one item, and every item
    /// internally valid.
    pub fn validate(&self) -> Result<()> {
        if self.contents.is_empty() && self.replies.is_empty() && self.tool_results.is_empty() {
            return Err(Error::validation(format!(
                "{} message with no contents, replies, or tool results",
                self.role
            )));
        }
        for c in &self.contents {
            c.validate()?;
        }
        for r in &self.replies {
            r.validate()?;
        }
        for t in &self.tool_results {
            if t.call_id.is_empty() {
                return Err(Error::validation("tool result without a call id"));
            }
        }
        Ok(())
    }

    /// True iff any reply or tool call carries a non-empty opaque bag.
    pub fn has_opaque(&self) -> bool {
        self.replies
            .iter()
            .any(|r| r.opaque().is_some_and(|o| !o.is_empty()))
    }
}

/// Validates a conversation: non-empty, every message valid.
pub fn validate_messages(messages: &[Message]) -> Result<()> {
    if messages.is_empty() {
        return Err(Error::validation("no messages"));
    }
    for (i, m) in messages.iter().enumerate() {
        m.validate()
            .map_err(|e| Error::validation(format!("message #{i}: {e}")))?;
    }
    Ok(())
}

// ============================================================================
// STREAMING FRAGMENTS
// ============================================================================

/// A streamed delta of a tool call.
///
/// A fragment with a non-empty `id` opens a new tool call; a fragment
/// with an empty `id` extends the pending call's argument string. The
/// two forms never combine: an opening fragment must not carry
/// arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ToolCallFragment {
    /// Vendor-issued id. Non-empty on the opening fragment only.
    pub id: String,
    /// Tool name. Non-empty on the opening fragment only.
    pub name: String,
    /// Argument delta, concatenated in arrival order.
    pub arguments: String,
}

/// One unit of streamed output, atomic from the caller's point of view.
///
/// Exactly one kind of payload per fragment, by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fragment {
    /// A text delta.
    Text(String),
    /// A reasoning delta.
    Thinking(String),
    /// A tool-call delta.
    ToolCall(ToolCallFragment),
    /// A complete generated document.
    Doc(Doc),
    /// A citation for the current text reply.
    Citation(Citation),
    /// An opaque payload for the current reply.
    Opaque(Opaque),
}

impl Fragment {
    /// True iff the payload is empty. The engine never emits empty
    /// fragments.
    pub fn is_empty(&self) -> bool {
        match self {
            Fragment::Text(t) | Fragment::Thinking(t) => t.is_empty(),
            Fragment::ToolCall(tc) => {
                tc.id.is_empty() && tc.name.is_empty() && tc.arguments.is_empty()
            }
            Fragment::Doc(_) => false,
            Fragment::Citation(c) => c.is_empty(),
            Fragment::Opaque(o) => o.is_empty(),
        }
    }
}

// ============================================================================
// RESULTS AND USAGE
// ============================================================================

/// Why generation stopped.
///
/// The closed set below covers every vendor we have seen; anything else
/// passes through as [`FinishReason::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FinishReason {
    /// Natural end of generation.
    Stop,
    /// A caller-supplied stop sequence matched.
    StopSequence,
    /// The max-token budget was exhausted.
    Length,
    /// The model requested tool calls.
    ToolCalls,
    /// The vendor's content filter intervened.
    ContentFilter,
    /// Asynchronous job not finished yet.
    Pending,
    /// Vendor-specific value passed through verbatim.
    Other(String),
}

impl Default for FinishReason {
    fn default() -> Self {
        FinishReason::Other(String::new())
    }
}

impl FinishReason {
    /// Canonical wire string.
    pub fn as_str(&self) -> &str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::StopSequence => "stop_sequence",
            FinishReason::Length => "length",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::Pending => "pending",
            FinishReason::Other(s) => s,
        }
    }

    /// True iff no finish reason has been recorded yet.
    pub fn is_unset(&self) -> bool {
        matches!(self, FinishReason::Other(s) if s.is_empty())
    }
}

impl From<String> for FinishReason {
    fn from(s: String) -> Self {
        match s.as_str() {
            "stop" | "end_turn" => FinishReason::Stop,
            "stop_sequence" => FinishReason::StopSequence,
            "length" | "max_tokens" => FinishReason::Length,
            "tool_calls" | "tool_use" => FinishReason::ToolCalls,
            "content_filter" => FinishReason::ContentFilter,
            "pending" => FinishReason::Pending,
            _ => FinishReason::Other(s),
        }
    }
}

impl From<FinishReason> for String {
    fn from(r: FinishReason) -> Self {
        r.as_str().to_string()
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a rate limit is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitKind {
    /// Requests per period.
    Requests,
    /// Tokens per period.
    Tokens,
}

/// One parsed rate-limit header family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimit {
    /// What is being limited.
    pub kind: RateLimitKind,
    /// The limit's window, as reported (e.g. `1m`), when reported.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub period: String,
    /// Maximum allowance in the window.
    pub limit: u64,
    /// Remaining allowance.
    pub remaining: u64,
    /// When the allowance resets, rounded to 10 ms.
    pub reset: SystemTime,
}

impl RateLimit {
    /// Builds a rate limit, rounding `reset` to 10 ms so snapshots taken
    /// moments apart compare equal.
    pub fn new(
        kind: RateLimitKind,
        period: impl Into<String>,
        limit: u64,
        remaining: u64,
        reset: SystemTime,
    ) -> Self {
        let rounded = reset
            .duration_since(UNIX_EPOCH)
            .map(|d| {
                let tens_ms = (d.as_millis() as u64 + 5) / 10;
                UNIX_EPOCH + Duration::from_millis(tens_ms * 10)
            })
            .unwrap_or(UNIX_EPOCH);
        RateLimit {
            kind,
            period: period.into(),
            limit,
            remaining,
            reset: rounded,
        }
    }
}

/// Token accounting and termination state for one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Usage {
    /// Prompt tokens billed.
    pub input_tokens: u64,
    /// Prompt tokens served from the vendor's cache.
    pub input_cached_tokens: u64,
    /// Generated tokens.
    pub output_tokens: u64,
    /// Total tokens. Equals input + cached + output unless the vendor
    /// reports otherwise.
    pub total_tokens: u64,
    /// Why generation stopped.
    pub finish_reason: FinishReason,
    /// Rate-limit snapshot parsed from the response headers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rate_limits: Vec<RateLimit>,
}

impl Usage {
    /// Fills `total_tokens` from the parts when the vendor did not
    /// report a total.
    pub fn fill_total(&mut self) {
        if self.total_tokens == 0 {
            self.total_tokens = self.input_tokens + self.input_cached_tokens + self.output_tokens;
        }
    }
}

/// Per-token log-probability report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TokenLogprob {
    /// The sampled token.
    pub token: String,
    /// Its log probability.
    pub logprob: f64,
    /// The top alternatives at this position, most probable first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top: Vec<(String, f64)>,
}

/// The neutral result of one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Completion {
    /// The assistant message produced by the model.
    pub message: Message,
    /// Token accounting, finish reason, rate limits.
    pub usage: Usage,
    /// Log probabilities, when requested and reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<Vec<TokenLogprob>>,
}

impl Completion {
    /// A pending placeholder for asynchronous jobs that have not
    /// finished yet.
    pub fn pending() -> Self {
        Completion {
            usage: Usage {
                finish_reason: FinishReason::Pending,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Concatenation of the reply text items.
    pub fn text(&self) -> String {
        self.message
            .replies
            .iter()
            .filter_map(|r| match r {
                Reply::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The first tool call among the replies, if any.
    pub fn tool_call(&self) -> Option<&ToolCall> {
        self.message.replies.iter().find_map(|r| r.as_tool_call())
    }

    /// Checks the completion invariants: assistant-authored, a recorded
    /// finish reason, and a consistent token total. Pending completions
    /// are exempt from the message check.
    pub fn validate(&self) -> Result<()> {
        if self.usage.finish_reason.is_unset() {
            return Err(Error::validation("completion without a finish reason"));
        }
        if self.usage.finish_reason == FinishReason::Pending {
            return Ok(());
        }
        if self.message.role != Role::Assistant {
            return Err(Error::validation(format!(
                "completion message has role {}, want assistant",
                self.message.role
            )));
        }
        self.message.validate()
    }
}

// ============================================================================
// MODALITIES
// ============================================================================

/// An output modality the caller requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Generated text.
    Text,
    /// Generated images.
    Image,
    /// Generated audio.
    Audio,
    /// Generated video.
    Video,
    /// Generated documents (PDF and the like).
    Document,
}

/// Opaque handle to an asynchronous generation job.
///
/// Returned by submit; consumed by poll and cancel. The engine keeps no
/// other state across process restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Job(pub String);

impl Job {
    /// The raw vendor identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_validate_requires_items() {
        let empty = Message {
            role: Role::User,
            ..Default::default()
        };
        assert!(empty.validate().is_err());
        assert!(Message::user("hi").validate().is_ok());
    }

    #[test]
    fn test_tool_call_arguments_must_be_json() {
        let mut msg = Message::assistant(vec![Reply::ToolCall(ToolCall {
            id: "call_1".to_string(),
            name: "add".to_string(),
            arguments: "{\"a\":2".to_string(),
            opaque: Opaque::new(),
        })]);
        assert!(msg.validate().is_err());
        if let Reply::ToolCall(tc) = &mut msg.replies[0] {
            tc.arguments = "{\"a\":2,\"b\":3}".to_string();
        }
        assert!(msg.validate().is_ok());
    }

    #[test]
    fn test_doc_read_zero_budget_fails() {
        let doc = Doc::from_bytes("image/png", vec![1, 2, 3]);
        assert!(doc.read(0).is_err());
    }

    #[test]
    fn test_doc_read_oversized_fails() {
        let doc = Doc::from_bytes("image/png", vec![0; 100]);
        assert!(doc.read(99).is_err());
        let (mime, data) = doc.read(100).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(data.len(), 100);
    }

    #[test]
    fn test_doc_read_url_is_not_inline() {
        let doc = Doc::from_url("https://example.com/cat.png");
        assert!(doc.read(1024).is_err());
    }

    #[test]
    fn test_doc_validate_rejects_empty_source() {
        let doc = Doc {
            filename: None,
            mime_type: Some("image/png".to_string()),
            source: DocSource::Bytes(Vec::new()),
        };
        assert!(doc.validate().is_err());
        let doc = Doc::from_url("");
        assert!(doc.validate().is_err());
    }

    #[test]
    fn test_doc_bytes_round_trip() {
        for data in [b"x".to_vec(), b"xy".to_vec(), b"xyz".to_vec(), vec![0u8, 255, 17, 3]] {
            let doc = Doc::from_bytes("application/octet-stream", data.clone());
            let json = serde_json::to_string(&doc).unwrap();
            let back: Doc = serde_json::from_str(&json).unwrap();
            assert_eq!(back.source, DocSource::Bytes(data));
        }
    }

    #[test]
    fn test_fragment_is_empty() {
        assert!(Fragment::Text(String::new()).is_empty());
        assert!(!Fragment::Text("hi".to_string()).is_empty());
        assert!(Fragment::ToolCall(ToolCallFragment::default()).is_empty());
        assert!(Fragment::Opaque(Opaque::new()).is_empty());
    }

    #[test]
    fn test_finish_reason_round_trip() {
        for (wire, want) in [
            ("stop", FinishReason::Stop),
            ("length", FinishReason::Length),
            ("tool_calls", FinishReason::ToolCalls),
            ("max_tokens", FinishReason::Length),
            ("weird_vendor_reason", FinishReason::Other("weird_vendor_reason".to_string())),
        ] {
            assert_eq!(FinishReason::from(wire.to_string()), want);
        }
        let json = serde_json::to_string(&FinishReason::ToolCalls).unwrap();
        assert_eq!(json, "\"tool_calls\"");
    }

    #[test]
    fn test_usage_fill_total() {
        let mut usage = Usage {
            input_tokens: 10,
            input_cached_tokens: 2,
            output_tokens: 5,
            ..Default::default()
        };
        usage.fill_total();
        assert_eq!(usage.total_tokens, 17);

        // Vendor-reported totals are kept as-is.
        let mut usage = Usage {
            input_tokens: 10,
            output_tokens: 5,
            total_tokens: 16,
            ..Default::default()
        };
        usage.fill_total();
        assert_eq!(usage.total_tokens, 16);
    }

    #[test]
    fn test_rate_limit_reset_rounds_to_10ms() {
        let t = UNIX_EPOCH + Duration::from_millis(1_234_567);
        let rl = RateLimit::new(RateLimitKind::Requests, "1m", 100, 99, t);
        let millis = rl
            .reset
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis();
        assert_eq!(millis % 10, 0);
        assert_eq!(millis, 1_234_570);
    }

    #[test]
    fn test_completion_validate() {
        let mut c = Completion::default();
        assert!(c.validate().is_err()); // no finish reason

        c.usage.finish_reason = FinishReason::Stop;
        assert!(c.validate().is_err()); // role is user, message empty

        c.message = Message::assistant(vec![Reply::text("hi")]);
        assert!(c.validate().is_ok());

        assert!(Completion::pending().validate().is_ok());
    }

    #[test]
    fn test_opaque_round_trip_is_stable() {
        let mut opaque = Opaque::new();
        opaque.insert("signature".to_string(), serde_json::json!("c2ln"));
        opaque.insert("alg".to_string(), serde_json::json!("ed25519"));
        let reply = Reply::Thinking {
            text: "reasoning".to_string(),
            opaque: opaque.clone(),
        };
        let json1 = serde_json::to_string(&reply).unwrap();
        let back: Reply = serde_json::from_str(&json1).unwrap();
        let json2 = serde_json::to_string(&back).unwrap();
        assert_eq!(json1, json2);
        assert_eq!(back.opaque(), Some(&opaque));
    }
}
