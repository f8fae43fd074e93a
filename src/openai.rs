//! Reference adapter for OpenAI-compatible chat-completions servers.
//!
//! This adapter speaks the chat-completions dialect served by OpenAI and
//! by the common local inference servers (LM Studio, Ollama, llama.cpp,
//! vLLM). It doubles as the worked example of the [`Adapter`] contract:
//! a request DTO built from neutral messages and options, a response DTO
//! converted back, a streaming chunk DTO folded through the shared
//! [`Accumulator`], and the vendor error envelope.
//!
//! Option support: everything in [`GenOptions`] maps directly except
//! `top_k`, which the dialect has no field for and which is skipped with
//! a continuable error, and non-text output modalities, skipped the same
//! way.
//!
//! Batch endpoints follow the async-queue dialect (`.../async` submit,
//! result by id, cancel by id) that queueing front-ends expose for this
//! API family.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Method;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::adapter::{Adapter, VendorRequest, VendorResponse};
use crate::batch::BatchAdapter;
use crate::codec::{Codec, ErrorPayload};
use crate::engine::Accumulator;
use crate::options::{GenOptions, ToolChoice};
use crate::provider::{
    ModelInfo, ModelQuery, ModelSelection, Provider, ProviderConfig, resolve_model,
};
use crate::transport::Transport;
use crate::types::{
    Completion, Content, DocSource, FinishReason, Fragment, Job, Message, Modality, RateLimit,
    RateLimitKind, Reply, Role, TokenLogprob, ToolCallFragment, Usage,
};
use crate::{Error, Result};

/// Substring heuristics for tier auto-selection against a
/// `/models` catalogue.
pub const MODEL_QUERY: ModelQuery = ModelQuery {
    cheap: "mini",
    good: "gpt-4o",
    sota: "o1",
};

/// The hosted endpoint, used when the config names no remote.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const API_KEY_URL: &str = "https://platform.openai.com/api-keys";

/// Builds a [`Provider`] for this dialect from a [`ProviderConfig`]:
/// bearer auth, base URL from `remote`, and the model selection resolved
/// against `preloaded_models` or a live `/models` listing when a tier
/// was asked for.
pub async fn provider_for(config: &ProviderConfig, codec: Codec) -> Result<Provider> {
    let base_url = config
        .remote
        .clone()
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let mut transport = Transport::new();
    if !config.api_key.is_empty() {
        transport =
            transport.with_header("Authorization", &format!("Bearer {}", config.api_key))?;
    }
    let provider =
        Provider::new(transport, codec, base_url).with_api_key_url(API_KEY_URL.to_string());

    let (model, model_optional) = match &config.model {
        ModelSelection::Disabled => (None, true),
        selection @ (ModelSelection::Cheap | ModelSelection::Good | ModelSelection::Sota) => {
            let catalogue = match &config.preloaded_models {
                Some(models) => models.clone(),
                None => ChatAdapter::new().list_models(&provider).await?,
            };
            (resolve_model(selection, &catalogue, &MODEL_QUERY)?, false)
        }
        selection => (resolve_model(selection, &[], &MODEL_QUERY)?, false),
    };
    Ok(provider
        .with_model(model)
        .with_model_optional(model_optional))
}

// ============================================================================
// ERROR ENVELOPE
// ============================================================================

/// The `{"error": {...}}` envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatError {
    /// The error body, absent on non-error payloads.
    #[serde(default)]
    pub error: Option<ChatErrorBody>,
}

/// The body of the error envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatErrorBody {
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Error type, e.g. `invalid_request_error`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Machine code; a string on OpenAI, a number on some local servers.
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    /// The offending parameter, when reported.
    #[serde(default)]
    pub param: Option<String>,
}

impl ErrorPayload for ChatError {
    fn is_api_error(&self) -> bool {
        self.error.is_some()
    }

    fn message(&self) -> String {
        self.error
            .as_ref()
            .map(|e| e.message.clone())
            .unwrap_or_default()
    }

    fn kind(&self) -> String {
        self.error
            .as_ref()
            .map(|e| e.kind.clone())
            .unwrap_or_default()
    }
}

// ============================================================================
// REQUEST DTO
// ============================================================================

/// One part of a multi-modal message content array.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatPart {
    /// Text part.
    Text {
        /// The text.
        text: String,
    },
    /// Image part, by URL or data URI.
    ImageUrl {
        /// The wrapped URL.
        image_url: ChatImageUrl,
    },
}

/// The URL wrapper the dialect insists on.
#[derive(Debug, Clone, Serialize)]
pub struct ChatImageUrl {
    /// HTTP(S) URL or `data:` URI.
    pub url: String,
}

/// Message content: a bare string for plain text, an array of parts for
/// multi-modal input.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ChatContent {
    /// Plain text content.
    Text(String),
    /// Multi-modal parts.
    Parts(Vec<ChatPart>),
}

/// A chat message on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// `system`, `user`, `assistant`, or `tool`.
    pub role: String,
    /// Content, absent on pure tool-call messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ChatContent>,
    /// Tool calls the assistant made, when replaying history.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChatToolCall>>,
    /// For `tool` messages: which call this result answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// A tool schema on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct ChatToolSpec {
    /// Always `function`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The function schema.
    pub function: ChatFunctionSpec,
}

/// The function half of a tool schema.
#[derive(Debug, Clone, Serialize)]
pub struct ChatFunctionSpec {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// JSON Schema of the arguments.
    pub parameters: serde_json::Value,
}

/// `response_format` for JSON and structured output.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponseFormat {
    /// `json_object` or `json_schema`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The schema wrapper, for `json_schema`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<serde_json::Value>,
}

/// `stream_options`, sent with streaming requests so the final chunk
/// carries usage.
#[derive(Debug, Clone, Serialize)]
pub struct ChatStreamOptions {
    /// Ask for usage in the last chunk.
    pub include_usage: bool,
}

/// The chat-completions request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatRequest {
    /// Model identifier.
    pub model: String,
    /// The conversation, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Streaming toggle.
    pub stream: bool,
    /// Present iff `stream` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<ChatStreamOptions>,
    /// Generation cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Deterministic sampling seed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Stop sequences.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// JSON / structured output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ChatResponseFormat>,
    /// Available tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ChatToolSpec>>,
    /// Tool-use coercion: `auto`, `required`, `none`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    /// Per-token logprob reporting toggle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<bool>,
    /// Number of alternatives per token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_logprobs: Option<u32>,
}

fn doc_to_part(doc: &crate::types::Doc) -> Result<ChatPart> {
    let url = match &doc.source {
        DocSource::Url(url) => url.clone(),
        DocSource::Bytes(data) => {
            let mime = doc.mime_type.as_deref().unwrap_or_default();
            if mime.is_empty() {
                return Err(Error::validation("inline document without a MIME type"));
            }
            format!("data:{mime};base64,{}", BASE64.encode(data))
        }
    };
    Ok(ChatPart::ImageUrl {
        image_url: ChatImageUrl { url },
    })
}

impl VendorRequest for ChatRequest {
    fn init(
        &mut self,
        messages: &[Message],
        model: Option<&str>,
        options: &GenOptions,
    ) -> Result<()> {
        let model = model.ok_or_else(|| {
            Error::validation("the chat-completions dialect requires a model")
        })?;
        self.model = model.to_string();

        if !options.system_prompt().is_empty() {
            self.messages.push(ChatMessage {
                role: "system".to_string(),
                content: Some(ChatContent::Text(options.system_prompt().to_string())),
                tool_calls: None,
                tool_call_id: None,
            });
        }

        for msg in messages {
            match msg.role {
                Role::User => self.push_user(msg)?,
                Role::Assistant => self.push_assistant(msg)?,
                Role::Computer => {
                    for tr in &msg.tool_results {
                        self.messages.push(ChatMessage {
                            role: "tool".to_string(),
                            content: Some(ChatContent::Text(tr.result.clone())),
                            tool_calls: None,
                            tool_call_id: Some(tr.call_id.clone()),
                        });
                    }
                }
            }
        }

        self.max_tokens = options.max_tokens();
        self.temperature = options.temperature();
        self.top_p = options.top_p();
        self.seed = options.seed();
        if !options.stop().is_empty() {
            self.stop = Some(options.stop().to_vec());
        }
        if options.reply_as_json() {
            self.response_format = Some(ChatResponseFormat {
                kind: "json_object".to_string(),
                json_schema: None,
            });
        }
        if let Some(schema) = options.decode_as() {
            self.response_format = Some(ChatResponseFormat {
                kind: "json_schema".to_string(),
                json_schema: Some(serde_json::json!({
                    "name": "response",
                    "schema": schema,
                    "strict": true,
                })),
            });
        }
        if !options.tools().is_empty() {
            self.tools = Some(
                options
                    .tools()
                    .iter()
                    .map(|t| ChatToolSpec {
                        kind: "function".to_string(),
                        function: ChatFunctionSpec {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.input_schema.clone(),
                        },
                    })
                    .collect(),
            );
        }
        if let Some(choice) = options.tool_call_request() {
            self.tool_choice = Some(
                match choice {
                    ToolChoice::Auto => "auto",
                    ToolChoice::Required => "required",
                    ToolChoice::None => "none",
                }
                .to_string(),
            );
        }
        if let Some(n) = options.top_logprobs() {
            self.logprobs = Some(true);
            self.top_logprobs = Some(n);
        }

        // Options the dialect cannot express are skipped, not dropped
        // silently.
        let mut skipped = Vec::new();
        if options.top_k().is_some() {
            skipped.push("TopK");
        }
        if options
            .output_modalities()
            .iter()
            .any(|m| *m != Modality::Text)
        {
            skipped.push("OutputModalities");
        }
        if skipped.is_empty() {
            Ok(())
        } else {
            Err(Error::unsupported(skipped))
        }
    }

    fn set_stream(&mut self, stream: bool) {
        self.stream = stream;
        self.stream_options = stream.then_some(ChatStreamOptions {
            include_usage: true,
        });
    }
}

impl ChatRequest {
    fn push_user(&mut self, msg: &Message) -> Result<()> {
        let mut parts = Vec::new();
        for item in &msg.contents {
            match item {
                Content::Text { text } => parts.push(ChatPart::Text { text: text.clone() }),
                Content::Doc(doc) => parts.push(doc_to_part(doc)?),
            }
        }
        let content = match parts.as_slice() {
            [ChatPart::Text { text }] => ChatContent::Text(text.clone()),
            _ => ChatContent::Parts(parts),
        };
        self.messages.push(ChatMessage {
            role: "user".to_string(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: None,
        });
        Ok(())
    }

    fn push_assistant(&mut self, msg: &Message) -> Result<()> {
        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for reply in &msg.replies {
            match reply {
                Reply::Text { text: t, .. } => text.push_str(t),
                // Reasoning is not replayable in this dialect; history
                // keeps only its conclusions.
                Reply::Thinking { .. } => {}
                Reply::ToolCall(tc) => tool_calls.push(ChatToolCall {
                    id: tc.id.clone(),
                    kind: "function".to_string(),
                    function: ChatFunction {
                        name: tc.name.clone(),
                        arguments: tc.arguments.clone(),
                    },
                }),
                Reply::Doc(_) => {
                    return Err(Error::validation(
                        "assistant document replies cannot be replayed to a chat endpoint",
                    ));
                }
            }
        }
        self.messages.push(ChatMessage {
            role: "assistant".to_string(),
            content: (!text.is_empty()).then_some(ChatContent::Text(text)),
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            tool_call_id: None,
        });
        Ok(())
    }
}

// ============================================================================
// RESPONSE DTO
// ============================================================================

/// A completed tool call on the wire (responses and replayed history).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatToolCall {
    /// Call id.
    pub id: String,
    /// Always `function`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Name and arguments.
    pub function: ChatFunction,
}

/// The function half of a tool call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatFunction {
    /// Tool name.
    #[serde(default)]
    pub name: String,
    /// Arguments as a JSON-encoded string.
    #[serde(default)]
    pub arguments: String,
}

/// Token usage block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatUsage {
    /// Prompt tokens, cached included.
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Generated tokens.
    #[serde(default)]
    pub completion_tokens: u64,
    /// Reported total.
    #[serde(default)]
    pub total_tokens: u64,
    /// Cache breakdown, when reported.
    #[serde(default)]
    pub prompt_tokens_details: Option<ChatPromptTokensDetails>,
}

/// The cache breakdown of the prompt tokens.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatPromptTokensDetails {
    /// Prompt tokens served from cache.
    #[serde(default)]
    pub cached_tokens: u64,
}

impl ChatUsage {
    fn apply(&self, usage: &mut Usage) {
        let cached = self
            .prompt_tokens_details
            .as_ref()
            .map(|d| d.cached_tokens)
            .unwrap_or(0);
        usage.input_tokens = self.prompt_tokens.saturating_sub(cached);
        usage.input_cached_tokens = cached;
        usage.output_tokens = self.completion_tokens;
        usage.total_tokens = self.total_tokens;
    }
}

/// Per-token logprob report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatLogprobs {
    /// One entry per generated token.
    #[serde(default)]
    pub content: Option<Vec<ChatTokenLogprob>>,
}

/// One token of the logprob report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatTokenLogprob {
    /// The token.
    #[serde(default)]
    pub token: String,
    /// Its log probability.
    #[serde(default)]
    pub logprob: f64,
    /// The top alternatives.
    #[serde(default)]
    pub top_logprobs: Vec<ChatTopLogprob>,
}

/// One alternative token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatTopLogprob {
    /// The token.
    #[serde(default)]
    pub token: String,
    /// Its log probability.
    #[serde(default)]
    pub logprob: f64,
}

fn convert_logprobs(lp: ChatLogprobs) -> Option<Vec<TokenLogprob>> {
    let content = lp.content?;
    Some(
        content
            .into_iter()
            .map(|t| TokenLogprob {
                token: t.token,
                logprob: t.logprob,
                top: t
                    .top_logprobs
                    .into_iter()
                    .map(|a| (a.token, a.logprob))
                    .collect(),
            })
            .collect(),
    )
}

/// The assistant message of a synchronous response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponseMessage {
    /// Always `assistant`.
    #[serde(default)]
    pub role: String,
    /// Generated text.
    #[serde(default)]
    pub content: Option<String>,
    /// Requested tool calls.
    #[serde(default)]
    pub tool_calls: Option<Vec<ChatToolCall>>,
}

/// One generation path of a synchronous response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatChoice {
    /// Path index.
    #[serde(default)]
    pub index: u32,
    /// The generated message.
    pub message: ChatResponseMessage,
    /// Why this path stopped.
    #[serde(default)]
    pub finish_reason: Option<String>,
    /// Logprob report, when requested.
    #[serde(default)]
    pub logprobs: Option<ChatLogprobs>,
}

/// The synchronous chat-completions response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Response id.
    #[serde(default)]
    pub id: String,
    /// Always `chat.completion`.
    #[serde(default)]
    pub object: String,
    /// Creation time, seconds since the epoch.
    #[serde(default)]
    pub created: u64,
    /// The serving model.
    #[serde(default)]
    pub model: String,
    /// Generation paths; we use the first.
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    /// Token usage.
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

impl VendorResponse for ChatResponse {
    fn to_completion(self) -> Result<Completion> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::decode("chat response with no choices"))?;

        let mut replies = Vec::new();
        if let Some(text) = choice.message.content {
            if !text.is_empty() {
                replies.push(Reply::text(text));
            }
        }
        for tc in choice.message.tool_calls.unwrap_or_default() {
            replies.push(Reply::ToolCall(crate::types::ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
                opaque: Default::default(),
            }));
        }

        let mut usage = Usage::default();
        if let Some(u) = &self.usage {
            u.apply(&mut usage);
        }
        usage.finish_reason = choice
            .finish_reason
            .map(FinishReason::from)
            .unwrap_or_default();

        Ok(Completion {
            message: Message {
                role: Role::Assistant,
                replies,
                ..Default::default()
            },
            usage,
            logprobs: choice.logprobs.and_then(convert_logprobs),
        })
    }
}

// ============================================================================
// STREAMING CHUNK DTO
// ============================================================================

/// Incremental update to a tool call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatToolCallDelta {
    /// Which tool call this delta extends.
    #[serde(default)]
    pub index: u32,
    /// Present on the delta that opens the call.
    #[serde(default)]
    pub id: Option<String>,
    /// Always `function`, when present.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Name/argument pieces.
    #[serde(default)]
    pub function: Option<ChatFunctionDelta>,
}

/// Incremental function name/arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatFunctionDelta {
    /// Name, on the opening delta.
    #[serde(default)]
    pub name: Option<String>,
    /// An argument piece, split at arbitrary byte positions.
    #[serde(default)]
    pub arguments: Option<String>,
}

/// The delta of one streaming chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatDelta {
    /// Role, on the first chunk.
    #[serde(default)]
    pub role: Option<String>,
    /// A text piece.
    #[serde(default)]
    pub content: Option<String>,
    /// Tool-call pieces.
    #[serde(default)]
    pub tool_calls: Option<Vec<ChatToolCallDelta>>,
}

/// One generation path of a streaming chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatChunkChoice {
    /// Path index.
    #[serde(default)]
    pub index: u32,
    /// The incremental update.
    #[serde(default)]
    pub delta: ChatDelta,
    /// Set on the final content chunk of the path.
    #[serde(default)]
    pub finish_reason: Option<String>,
    /// Logprob report for the tokens of this chunk.
    #[serde(default)]
    pub logprobs: Option<ChatLogprobs>,
}

/// One `data:` frame of the stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatChunk {
    /// Response id.
    #[serde(default)]
    pub id: String,
    /// Always `chat.completion.chunk`.
    #[serde(default)]
    pub object: String,
    /// Creation time.
    #[serde(default)]
    pub created: u64,
    /// The serving model.
    #[serde(default)]
    pub model: String,
    /// Generation paths.
    #[serde(default)]
    pub choices: Vec<ChatChunkChoice>,
    /// Usage, on the final chunk when `include_usage` was requested.
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

// ============================================================================
// THE ADAPTER
// ============================================================================

/// Adapter for OpenAI-compatible chat-completions servers.
#[derive(Debug, Clone, Default)]
pub struct ChatAdapter {
    lie_tool_calls: bool,
}

impl ChatAdapter {
    /// Creates the adapter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the upstream as one that labels tool-call terminations as a
    /// plain stop; the engine then corrects the finish reason after
    /// streaming. Several local servers need this.
    pub fn with_lie_tool_calls(mut self, lie: bool) -> Self {
        self.lie_tool_calls = lie;
        self
    }

    /// Fetches the model catalogue from `/models`, for tier resolution
    /// with [`crate::provider::resolve_model`] and [`MODEL_QUERY`].
    pub async fn list_models(&self, provider: &Provider) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/models", provider.base_url());
        let resp: ModelsResponse = provider
            .do_request::<(), ModelsResponse, ChatError>(Method::GET, &url, None)
            .await?;
        Ok(resp
            .data
            .into_iter()
            .map(|m| ModelInfo {
                id: m.id,
                created: m.created,
            })
            .collect())
    }

}

/// The `/models` listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelsResponse {
    /// Always `list`.
    #[serde(default)]
    pub object: String,
    /// The catalogue.
    #[serde(default)]
    pub data: Vec<ModelEntry>,
}

/// One catalogue entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Model identifier.
    pub id: String,
    /// Always `model`.
    #[serde(default)]
    pub object: String,
    /// Creation time, seconds since the epoch.
    #[serde(default)]
    pub created: u64,
    /// Owning organisation.
    #[serde(default)]
    pub owned_by: String,
}

#[async_trait]
impl Adapter for ChatAdapter {
    type Error = ChatError;
    type Request = ChatRequest;
    type Response = ChatResponse;
    type Chunk = ChatChunk;

    fn completion_url(&self, base_url: &str) -> String {
        format!("{base_url}/chat/completions")
    }

    async fn process_stream(
        &self,
        mut chunks: mpsc::Receiver<ChatChunk>,
        fragments: mpsc::Sender<Fragment>,
        completion: &mut Completion,
    ) -> Result<()> {
        let mut acc = Accumulator::new();
        let mut logprobs: Vec<TokenLogprob> = Vec::new();
        let mut failure: Option<Error> = None;

        while let Some(chunk) = chunks.recv().await {
            if failure.is_some() {
                // Keep draining so the demultiplexer never blocks on a
                // full channel.
                continue;
            }
            if let Err(e) = fold_chunk(
                chunk,
                &mut acc,
                &fragments,
                &mut completion.usage,
                &mut logprobs,
            )
            .await
            {
                failure = Some(e);
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }

        completion.message.role = Role::Assistant;
        completion.message.replies = acc.into_replies();
        if !logprobs.is_empty() {
            completion.logprobs = Some(logprobs);
        }
        Ok(())
    }

    fn process_headers(&self, headers: &HeaderMap) -> Vec<RateLimit> {
        let mut limits = Vec::new();
        for (kind, suffix) in [
            (RateLimitKind::Requests, "requests"),
            (RateLimitKind::Tokens, "tokens"),
        ] {
            let get = |name: String| {
                headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            let limit = get(format!("x-ratelimit-limit-{suffix}"))
                .and_then(|v| v.parse::<u64>().ok());
            let remaining = get(format!("x-ratelimit-remaining-{suffix}"))
                .and_then(|v| v.parse::<u64>().ok());
            let reset = get(format!("x-ratelimit-reset-{suffix}")).and_then(|v| parse_reset(&v));
            if let (Some(limit), Some(remaining)) = (limit, remaining) {
                limits.push(RateLimit::new(
                    kind,
                    "",
                    limit,
                    remaining,
                    SystemTime::now() + reset.unwrap_or(Duration::ZERO),
                ));
            }
        }
        limits
    }

    fn lie_tool_calls(&self) -> bool {
        self.lie_tool_calls
    }
}

async fn fold_chunk(
    chunk: ChatChunk,
    acc: &mut Accumulator,
    fragments: &mpsc::Sender<Fragment>,
    usage: &mut Usage,
    logprobs: &mut Vec<TokenLogprob>,
) -> Result<()> {
    for choice in chunk.choices {
        if let Some(text) = choice.delta.content {
            send_fragment(acc, fragments, Fragment::Text(text)).await?;
        }
        for tcd in choice.delta.tool_calls.unwrap_or_default() {
            let (name, arguments) = match tcd.function {
                Some(f) => (
                    f.name.unwrap_or_default(),
                    f.arguments.unwrap_or_default(),
                ),
                None => (String::new(), String::new()),
            };
            match tcd.id {
                // Opening delta: the id opens the call; any argument
                // piece riding along becomes its own fragment so the
                // accumulator's open/extend split stays clean.
                Some(id) if !id.is_empty() => {
                    send_fragment(
                        acc,
                        fragments,
                        Fragment::ToolCall(ToolCallFragment {
                            id,
                            name,
                            arguments: String::new(),
                        }),
                    )
                    .await?;
                    if !arguments.is_empty() {
                        send_fragment(
                            acc,
                            fragments,
                            Fragment::ToolCall(ToolCallFragment {
                                arguments,
                                ..Default::default()
                            }),
                        )
                        .await?;
                    }
                }
                _ => {
                    send_fragment(
                        acc,
                        fragments,
                        Fragment::ToolCall(ToolCallFragment {
                            id: String::new(),
                            name,
                            arguments,
                        }),
                    )
                    .await?;
                }
            }
        }
        if let Some(reason) = choice.finish_reason {
            usage.finish_reason = FinishReason::from(reason);
        }
        if let Some(lp) = choice.logprobs {
            if let Some(mut tokens) = convert_logprobs(lp) {
                logprobs.append(&mut tokens);
            }
        }
    }
    if let Some(u) = chunk.usage {
        u.apply(usage);
    }
    Ok(())
}

async fn send_fragment(
    acc: &mut Accumulator,
    fragments: &mpsc::Sender<Fragment>,
    fragment: Fragment,
) -> Result<()> {
    if fragment.is_empty() {
        return Ok(());
    }
    acc.push(&fragment)?;
    // A closed receiver means the caller stopped listening; keep
    // accumulating so finish() still works.
    let _ = fragments.send(fragment).await;
    Ok(())
}

/// Parses the dialect's reset durations: `123ms`, `1s`, `6m0s`, `1h2m`.
fn parse_reset(s: &str) -> Option<Duration> {
    let mut total = Duration::ZERO;
    let mut num = String::new();
    let mut unit = String::new();
    let flush = |num: &mut String, unit: &mut String, total: &mut Duration| -> bool {
        if num.is_empty() || unit.is_empty() {
            return false;
        }
        let value: f64 = match num.parse() {
            Ok(v) => v,
            Err(_) => return false,
        };
        let millis = match unit.as_str() {
            "ms" => value,
            "s" => value * 1000.0,
            "m" => value * 60_000.0,
            "h" => value * 3_600_000.0,
            _ => return false,
        };
        *total += Duration::from_millis(millis as u64);
        num.clear();
        unit.clear();
        true
    };

    for c in s.chars() {
        if c.is_ascii_digit() || c == '.' {
            if !unit.is_empty() && !flush(&mut num, &mut unit, &mut total) {
                return None;
            }
            num.push(c);
        } else {
            unit.push(c);
        }
    }
    if !flush(&mut num, &mut unit, &mut total) {
        return None;
    }
    Some(total)
}

// ============================================================================
// BATCH
// ============================================================================

/// Submit response of the async-queue dialect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatJobResponse {
    /// The job id.
    #[serde(default)]
    pub id: String,
    /// Object tag, e.g. `chat.completion.job`.
    #[serde(default)]
    pub object: String,
    /// Queue status, e.g. `queued`, `cancelled`.
    #[serde(default)]
    pub status: Option<String>,
}

impl BatchAdapter for ChatAdapter {
    type JobResponse = ChatJobResponse;

    fn batch_url(&self, base_url: &str) -> String {
        format!("{base_url}/chat/completions/async")
    }

    fn result_url(&self, base_url: &str, job: &Job) -> String {
        format!("{base_url}/chat/completions/async/{job}")
    }

    fn cancel_url(&self, base_url: &str, job: &Job) -> String {
        format!("{base_url}/chat/completions/async/{job}/cancel")
    }

    fn job_id(&self, resp: Self::JobResponse) -> Result<Job> {
        if resp.id.is_empty() {
            return Err(Error::decode("batch submit response without a job id"));
        }
        Ok(Job(resp.id))
    }
}
