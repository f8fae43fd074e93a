//! Neutral generation options.
//!
//! [`GenOptions`] carries everything a caller can ask of a provider that
//! is not part of the messages themselves: sampling controls, stop
//! sequences, structured-output requests, tool schemas, and the required
//! output modalities. Construct it through [`GenOptions::builder()`],
//! which validates ranges at build time.
//!
//! Adapters translate each option into their vendor's dialect. An option
//! a vendor cannot honour is either skipped and reported through a
//! continuable [`Error::Unsupported`](crate::Error::Unsupported), or
//! fails request construction — the choice is per-adapter and documented
//! on the adapter.

use serde::{Deserialize, Serialize};

use crate::types::Modality;
use crate::{Error, Result};

/// Schema of a tool the model may call.
///
/// This is data only: the engine never executes tools. Callers receive
/// [`ToolCall`](crate::types::ToolCall) replies, run the tool themselves,
/// and send a [`ToolResult`](crate::types::ToolResult) back on the next
/// turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    /// Tool name, unique within a request.
    pub name: String,
    /// Human-readable description shown to the model.
    pub description: String,
    /// JSON Schema of the tool's arguments.
    pub input_schema: serde_json::Value,
}

impl ToolDef {
    /// Creates a tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        ToolDef {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// How strongly the model is pushed toward calling tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides whether to call any tool.
    #[default]
    Auto,
    /// The model must call at least one tool.
    Required,
    /// The model must not call tools.
    None,
}

/// Provider-agnostic request options.
///
/// All fields optional; the zero value asks for the provider's defaults.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenOptions {
    system_prompt: String,
    max_tokens: Option<u32>,
    temperature: Option<f64>,
    top_p: Option<f64>,
    top_k: Option<u32>,
    seed: Option<u64>,
    stop: Vec<String>,
    reply_as_json: bool,
    decode_as: Option<serde_json::Value>,
    tools: Vec<ToolDef>,
    tool_call_request: Option<ToolChoice>,
    top_logprobs: Option<u32>,
    output_modalities: Vec<Modality>,
}

impl GenOptions {
    /// Creates a builder.
    pub fn builder() -> GenOptionsBuilder {
        GenOptionsBuilder::default()
    }

    /// System prompt, prepended as a system-role message. Empty = none.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Upper bound on generated tokens.
    pub fn max_tokens(&self) -> Option<u32> {
        self.max_tokens
    }

    /// Sampling temperature.
    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    /// Nucleus-sampling cutoff.
    pub fn top_p(&self) -> Option<f64> {
        self.top_p
    }

    /// Top-k sampling cutoff.
    pub fn top_k(&self) -> Option<u32> {
        self.top_k
    }

    /// Deterministic sampling seed. Providers may ignore it, reporting
    /// the skip through a continuable error.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Stop sequences.
    pub fn stop(&self) -> &[String] {
        &self.stop
    }

    /// Ask for a JSON object reply.
    pub fn reply_as_json(&self) -> bool {
        self.reply_as_json
    }

    /// JSON Schema the reply should decode into; providers that support
    /// structured output enforce it.
    pub fn decode_as(&self) -> Option<&serde_json::Value> {
        self.decode_as.as_ref()
    }

    /// Tool schemas available to the model.
    pub fn tools(&self) -> &[ToolDef] {
        &self.tools
    }

    /// Tool-use coercion.
    pub fn tool_call_request(&self) -> Option<ToolChoice> {
        self.tool_call_request
    }

    /// Number of top log-probabilities to report per token.
    pub fn top_logprobs(&self) -> Option<u32> {
        self.top_logprobs
    }

    /// Output modalities the caller requires. Empty = provider default.
    pub fn output_modalities(&self) -> &[Modality] {
        &self.output_modalities
    }

    /// Re-checks the option invariants. The builder already enforces
    /// them; the engine calls this again on every request so options
    /// built by hand get the same treatment.
    pub fn validate(&self) -> Result<()> {
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(Error::validation("temperature must be between 0.0 and 2.0"));
            }
        }
        if let Some(p) = self.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::validation("top_p must be between 0.0 and 1.0"));
            }
        }
        if self.max_tokens == Some(0) {
            return Err(Error::validation("max_tokens must be greater than 0"));
        }
        if self.top_logprobs == Some(0) {
            return Err(Error::validation("top_logprobs must be greater than 0"));
        }
        for s in &self.stop {
            if s.is_empty() {
                return Err(Error::validation("empty stop sequence"));
            }
        }
        let mut names: Vec<&str> = self.tools.iter().map(|t| t.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.tools.len() {
            return Err(Error::validation("duplicate tool names"));
        }
        if self.tools.iter().any(|t| t.name.is_empty()) {
            return Err(Error::validation("tool without a name"));
        }
        if self.tool_call_request == Some(ToolChoice::Required) && self.tools.is_empty() {
            return Err(Error::validation(
                "tool_call_request is Required but no tools were provided",
            ));
        }
        if self.reply_as_json && self.decode_as.is_some() {
            return Err(Error::validation(
                "reply_as_json and decode_as are mutually exclusive",
            ));
        }
        Ok(())
    }
}

/// Builder for [`GenOptions`] with validation at `build()`.
#[derive(Debug, Clone, Default)]
pub struct GenOptionsBuilder {
    opts: GenOptions,
}

impl GenOptionsBuilder {
    /// Sets the system prompt.
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.opts.system_prompt = prompt.into();
        self
    }

    /// Sets the maximum generated tokens.
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.opts.max_tokens = Some(tokens);
        self
    }

    /// Sets the sampling temperature (0.0 to 2.0).
    pub fn temperature(mut self, temp: f64) -> Self {
        self.opts.temperature = Some(temp);
        self
    }

    /// Sets the nucleus-sampling cutoff (0.0 to 1.0).
    pub fn top_p(mut self, p: f64) -> Self {
        self.opts.top_p = Some(p);
        self
    }

    /// Sets the top-k cutoff.
    pub fn top_k(mut self, k: u32) -> Self {
        self.opts.top_k = Some(k);
        self
    }

    /// Sets the sampling seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.opts.seed = Some(seed);
        self
    }

    /// Adds a stop sequence. Can be called multiple times.
    pub fn stop(mut self, seq: impl Into<String>) -> Self {
        self.opts.stop.push(seq.into());
        self
    }

    /// Asks for a JSON object reply.
    pub fn reply_as_json(mut self, yes: bool) -> Self {
        self.opts.reply_as_json = yes;
        self
    }

    /// Supplies a JSON Schema for structured output.
    pub fn decode_as(mut self, schema: serde_json::Value) -> Self {
        self.opts.decode_as = Some(schema);
        self
    }

    /// Adds a tool schema. Can be called multiple times.
    pub fn tool(mut self, tool: ToolDef) -> Self {
        self.opts.tools.push(tool);
        self
    }

    /// Sets the tool-use coercion.
    pub fn tool_call_request(mut self, choice: ToolChoice) -> Self {
        self.opts.tool_call_request = Some(choice);
        self
    }

    /// Asks for per-token log probabilities.
    pub fn top_logprobs(mut self, n: u32) -> Self {
        self.opts.top_logprobs = Some(n);
        self
    }

    /// Requires an output modality. Can be called multiple times.
    pub fn output_modality(mut self, m: Modality) -> Self {
        if !self.opts.output_modalities.contains(&m) {
            self.opts.output_modalities.push(m);
        }
        self
    }

    /// Validates and builds.
    pub fn build(self) -> Result<GenOptions> {
        self.opts.validate()?;
        Ok(self.opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_happy_path() {
        let opts = GenOptions::builder()
            .system_prompt("be terse")
            .max_tokens(128)
            .temperature(0.0)
            .seed(1)
            .stop("END")
            .build()
            .unwrap();
        assert_eq!(opts.system_prompt(), "be terse");
        assert_eq!(opts.max_tokens(), Some(128));
        assert_eq!(opts.temperature(), Some(0.0));
        assert_eq!(opts.seed(), Some(1));
        assert_eq!(opts.stop(), ["END".to_string()]);
    }

    #[test]
    fn test_temperature_range() {
        assert!(GenOptions::builder().temperature(2.1).build().is_err());
        assert!(GenOptions::builder().temperature(-0.1).build().is_err());
        assert!(GenOptions::builder().temperature(2.0).build().is_ok());
    }

    #[test]
    fn test_required_tools_needs_tools() {
        assert!(
            GenOptions::builder()
                .tool_call_request(ToolChoice::Required)
                .build()
                .is_err()
        );
        assert!(
            GenOptions::builder()
                .tool_call_request(ToolChoice::Required)
                .tool(ToolDef::new("add", "Add numbers", serde_json::json!({"type": "object"})))
                .build()
                .is_ok()
        );
    }

    #[test]
    fn test_duplicate_tool_names_rejected() {
        let schema = serde_json::json!({"type": "object"});
        assert!(
            GenOptions::builder()
                .tool(ToolDef::new("add", "a", schema.clone()))
                .tool(ToolDef::new("add", "b", schema))
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_json_modes_are_exclusive() {
        assert!(
            GenOptions::builder()
                .reply_as_json(true)
                .decode_as(serde_json::json!({"type": "object"}))
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_output_modality_dedups() {
        let opts = GenOptions::builder()
            .output_modality(Modality::Text)
            .output_modality(Modality::Text)
            .output_modality(Modality::Image)
            .build()
            .unwrap();
        assert_eq!(opts.output_modalities().len(), 2);
    }
}
