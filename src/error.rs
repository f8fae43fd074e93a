//! Error types for the omnigen client.

use thiserror::Error;

use crate::types::Completion;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

fn fmt_hint(hint: &Option<String>) -> String {
    match hint {
        Some(h) => format!(" ({h})"),
        None => String::new(),
    }
}

fn fmt_unknown(keys: &[String]) -> String {
    if keys.is_empty() {
        String::new()
    } else {
        format!("; unknown fields: {}", keys.join(", "))
    }
}

fn fmt_joined(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Main error type for the client.
///
/// Five kinds, mirroring the failure surfaces of an LLM HTTP API:
/// transport failures, structured non-200 responses, decode failures,
/// caller-side validation failures, and [`Error::Unsupported`] — the only
/// kind that can accompany a usable [`Completion`].
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport error after retry exhaustion.
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Structured error from the provider: a non-200 status, or an error
    /// envelope embedded in a 200 body (`status` is 200 in that case).
    #[error("API error {status} at {url}: {kind}: {message}{}", fmt_hint(.hint))]
    Api {
        /// HTTP status code.
        status: u16,
        /// Vendor error type/code, e.g. `rate_limit_error`.
        kind: String,
        /// Vendor error message.
        message: String,
        /// Request URL, when known.
        url: String,
        /// Remediation hint, attached for 401 when the provider knows
        /// where API keys are issued.
        hint: Option<String>,
    },

    /// Response decode failure: schema mismatch, or unknown fields in
    /// strict mode (listed in `unknown_keys`).
    #[error("decode error: {message}{}", fmt_unknown(.unknown_keys))]
    Decode {
        /// What went wrong.
        message: String,
        /// Dotted paths of unexpected keys isolated by strict mode.
        unknown_keys: Vec<String>,
    },

    /// Caller-side invariant violation. Raised before any HTTP traffic.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Streaming protocol violation or mid-stream failure.
    #[error("streaming error: {0}")]
    Stream(String),

    /// The request succeeded but some requested options were silently
    /// skipped by the provider. Carries the completion so callers can
    /// destructure and keep the output.
    #[error("unsupported options skipped: {}", .skipped.join(", "))]
    Unsupported {
        /// Names of the options that were not honoured.
        skipped: Vec<String>,
        /// The completion, populated by the engine before returning to
        /// the caller. `None` only while the error is in flight inside
        /// an adapter's `init`.
        completion: Option<Box<Completion>>,
    },

    /// Multiple concurrent diagnostics (e.g. strict-mode unknown fields
    /// joined with an error payload decoded from the same body).
    #[error("{}", fmt_joined(.0))]
    Multiple(Vec<Error>),
}

impl Error {
    /// Create a decode error without unknown-key diagnostics.
    pub fn decode(msg: impl Into<String>) -> Self {
        Error::Decode {
            message: msg.into(),
            unknown_keys: Vec::new(),
        }
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a streaming error.
    pub fn stream(msg: impl Into<String>) -> Self {
        Error::Stream(msg.into())
    }

    /// Create a continuable unsupported-options error with no completion
    /// attached yet.
    pub fn unsupported<I, S>(skipped: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Error::Unsupported {
            skipped: skipped.into_iter().map(Into::into).collect(),
            completion: None,
        }
    }

    /// Create an API error for an error envelope found in a 200 body.
    pub fn in_band(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Api {
            status: 200,
            kind: kind.into(),
            message: message.into(),
            url: String::new(),
            hint: None,
        }
    }

    /// Join two errors into one. Flattens nested joins so the primary
    /// diagnostic stays first.
    pub fn join(primary: Error, secondary: Error) -> Self {
        let mut all = match primary {
            Error::Multiple(v) => v,
            e => vec![e],
        };
        match secondary {
            Error::Multiple(v) => all.extend(v),
            e => all.push(e),
        }
        Error::Multiple(all)
    }

    /// True iff this error accompanies a successful result rather than
    /// replacing one.
    pub fn is_continuable(&self) -> bool {
        matches!(self, Error::Unsupported { .. })
    }

    /// For a continuable error, take the completion out together with
    /// the skipped-option names.
    pub fn into_completion(self) -> Option<(Completion, Vec<String>)> {
        match self {
            Error::Unsupported {
                skipped,
                completion: Some(c),
            } => Some((*c, skipped)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display_with_hint() {
        let err = Error::Api {
            status: 401,
            kind: "authentication_error".to_string(),
            message: "invalid x-api-key".to_string(),
            url: "https://api.example.com/v1/chat".to_string(),
            hint: Some("get a new API key at https://example.com/keys".to_string()),
        };
        let s = err.to_string();
        assert!(s.contains("401"));
        assert!(s.contains("authentication_error"));
        assert!(s.contains("get a new API key"));
    }

    #[test]
    fn test_decode_error_lists_unknown_keys() {
        let err = Error::Decode {
            message: "strict mode".to_string(),
            unknown_keys: vec!["usage.mystery".to_string(), "extra".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "decode error: strict mode; unknown fields: usage.mystery, extra"
        );
    }

    #[test]
    fn test_unsupported_is_continuable() {
        let err = Error::unsupported(["Seed"]);
        assert!(err.is_continuable());
        assert!(!Error::validation("nope").is_continuable());
        assert_eq!(err.to_string(), "unsupported options skipped: Seed");
    }

    #[test]
    fn test_join_flattens() {
        let joined = Error::join(
            Error::join(Error::decode("a"), Error::decode("b")),
            Error::decode("c"),
        );
        match joined {
            Error::Multiple(v) => assert_eq!(v.len(), 3),
            _ => panic!("expected Multiple"),
        }
    }

    #[test]
    fn test_into_completion_requires_attachment() {
        assert!(Error::unsupported(["Seed"]).into_completion().is_none());
    }
}
