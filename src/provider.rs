//! Provider base: shared request plumbing for every adapter.
//!
//! A [`Provider`] owns the transport chain, the codec, and the small
//! amount of per-provider state the engine needs: the resolved model,
//! the API-key URL used for 401 hints, and a mutex-guarded snapshot of
//! the most recent response headers (adapters mine it for rate limits).
//!
//! Model selection: callers may name a model, pass one of the special
//! tiers ([`ModelSelection::Cheap`] / [`Good`](ModelSelection::Good) /
//! [`Sota`](ModelSelection::Sota)) resolved against the provider's
//! catalogue at construction, or disable model-dependent calls with
//! [`ModelSelection::Disabled`].

use std::sync::Mutex;

use reqwest::Method;
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::codec::{Codec, ErrorPayload};
use crate::transport::Transport;
use crate::types::Modality;
use crate::{Error, Result};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Which model a provider should drive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModelSelection {
    /// No preference: the provider's default, if it has one.
    #[default]
    Unset,
    /// Auto-select the cheapest usable model from the catalogue.
    Cheap,
    /// Auto-select a balanced model from the catalogue.
    Good,
    /// Auto-select the state-of-the-art model from the catalogue.
    Sota,
    /// Disable model-dependent calls entirely.
    Disabled,
    /// An explicit model identifier.
    Named(String),
}

impl ModelSelection {
    /// Parses the special identifiers recognised by every adapter:
    /// `""`, `"cheap"`, `"good"`, `"sota"`, `"none"`; anything else is a
    /// concrete model name.
    pub fn from_id(id: &str) -> Self {
        match id {
            "" => ModelSelection::Unset,
            "cheap" => ModelSelection::Cheap,
            "good" => ModelSelection::Good,
            "sota" => ModelSelection::Sota,
            "none" => ModelSelection::Disabled,
            other => ModelSelection::Named(other.to_string()),
        }
    }
}

/// One entry of a provider's model catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize, Default)]
pub struct ModelInfo {
    /// Vendor model identifier.
    pub id: String,
    /// Creation time, seconds since the epoch. Zero when unreported.
    #[serde(default)]
    pub created: u64,
}

/// Name-substring heuristics used to resolve the model tiers against a
/// catalogue. Vendor-specific, so the adapter supplies them.
#[derive(Debug, Clone)]
pub struct ModelQuery {
    /// Substring selecting cheap-tier models.
    pub cheap: &'static str,
    /// Substring selecting balanced models.
    pub good: &'static str,
    /// Substring selecting frontier models.
    pub sota: &'static str,
}

/// Resolves a [`ModelSelection`] against a catalogue.
///
/// Tiers filter by substring and pick by creation date: the newest
/// match, except [`ModelSelection::Cheap`] which picks the oldest (the
/// cheap tier of most vendors is the long-stable small model).
///
/// Returns `Ok(None)` for [`ModelSelection::Disabled`].
pub fn resolve_model(
    selection: &ModelSelection,
    catalogue: &[ModelInfo],
    query: &ModelQuery,
) -> Result<Option<String>> {
    let tier = |needle: &str, oldest: bool| -> Result<Option<String>> {
        let mut matches: Vec<&ModelInfo> = catalogue
            .iter()
            .filter(|m| m.id.contains(needle))
            .collect();
        if matches.is_empty() {
            return Err(Error::validation(format!(
                "no model matching {needle:?} in a catalogue of {}",
                catalogue.len()
            )));
        }
        matches.sort_by_key(|m| m.created);
        let pick = if oldest {
            matches.first()
        } else {
            matches.last()
        };
        Ok(pick.map(|m| m.id.clone()))
    };

    match selection {
        ModelSelection::Unset => Ok(None),
        ModelSelection::Disabled => Ok(None),
        ModelSelection::Named(id) => Ok(Some(id.clone())),
        ModelSelection::Cheap => tier(query.cheap, true),
        ModelSelection::Good => tier(query.good, false),
        ModelSelection::Sota => tier(query.sota, false),
    }
}

/// Provider construction parameters.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    /// API key, injected as the provider's auth header.
    pub api_key: String,
    /// Base URL override; `None` uses the adapter's default endpoint.
    pub remote: Option<String>,
    /// Model selection.
    pub model: ModelSelection,
    /// Output modalities this provider instance is expected to produce.
    pub output_modalities: Vec<Modality>,
    /// Models already known to the caller, skipping the catalogue fetch
    /// during tier resolution.
    pub preloaded_models: Option<Vec<ModelInfo>>,
    /// Account/tenant scoping for vendors that need it in the URL.
    pub account_id: Option<String>,
}

// ============================================================================
// PROVIDER BASE
// ============================================================================

/// Shared request/decode plumbing under every provider engine.
#[derive(Debug)]
pub struct Provider {
    transport: Transport,
    codec: Codec,
    base_url: String,
    model: Option<String>,
    model_optional: bool,
    api_key_url: Option<String>,
    last_headers: Mutex<HeaderMap>,
}

impl Provider {
    /// Creates a provider base.
    pub fn new(transport: Transport, codec: Codec, base_url: impl Into<String>) -> Self {
        Provider {
            transport,
            codec,
            base_url: base_url.into(),
            model: None,
            model_optional: false,
            api_key_url: None,
            last_headers: Mutex::new(HeaderMap::new()),
        }
    }

    /// Sets the resolved model.
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Marks the provider as usable without a model (e.g. pure file or
    /// listing endpoints).
    pub fn with_model_optional(mut self, optional: bool) -> Self {
        self.model_optional = optional;
        self
    }

    /// Sets the URL where API keys are issued, used in 401 hints.
    pub fn with_api_key_url(mut self, url: impl Into<String>) -> Self {
        self.api_key_url = Some(url.into());
        self
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The codec (strictness travels with the provider).
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// The selected model, or a validation error when one is required
    /// and missing.
    pub fn model(&self) -> Result<Option<&str>> {
        match (&self.model, self.model_optional) {
            (Some(m), _) => Ok(Some(m.as_str())),
            (None, true) => Ok(None),
            (None, false) => Err(Error::validation(
                "no model selected and this provider requires one",
            )),
        }
    }

    /// A copy of the most recent response headers.
    pub fn last_headers(&self) -> HeaderMap {
        self.last_headers
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    fn snapshot_headers(&self, headers: &HeaderMap) {
        if let Ok(mut guard) = self.last_headers.lock() {
            *guard = headers.clone();
        }
    }

    /// Sends a request and decodes the 200 body into `Out` via the
    /// two-pass codec. Non-200 responses become structured API errors.
    pub async fn do_request<In, Out, E>(
        &self,
        method: Method,
        url: &str,
        body: Option<&In>,
    ) -> Result<Out>
    where
        In: Serialize + ?Sized,
        Out: DeserializeOwned + Serialize + Default + PartialEq,
        E: ErrorPayload,
    {
        let resp = self.transport.execute(method, url, body).await?;
        self.snapshot_headers(resp.headers());

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(Error::Network)?;
        if !status.is_success() {
            return Err(self.decode_error::<E>(url, status.as_u16(), &bytes));
        }
        debug!(%url, %status, len = bytes.len(), "decoded response");
        self.codec.decode_or_error::<Out, E>(&bytes)
    }

    /// Sends a request expected to answer with a streaming body. The
    /// response is returned undecoded after the status check and header
    /// snapshot.
    pub async fn do_request_streaming<In, E>(
        &self,
        method: Method,
        url: &str,
        body: &In,
    ) -> Result<reqwest::Response>
    where
        In: Serialize + ?Sized,
        E: ErrorPayload,
    {
        let resp = self.transport.execute(method, url, Some(body)).await?;
        self.snapshot_headers(resp.headers());

        let status = resp.status();
        if !status.is_success() {
            let bytes = resp.bytes().await.map_err(Error::Network)?;
            return Err(self.decode_error::<E>(url, status.as_u16(), &bytes));
        }
        Ok(resp)
    }

    /// Builds a structured error from a non-200 response body.
    ///
    /// The vendor's error schema is decoded leniently (an error path is
    /// no place to be strict about extra fields). A 401 gets the
    /// API-key-URL hint unless the message already carries one.
    pub fn decode_error<E: ErrorPayload>(&self, url: &str, status: u16, body: &[u8]) -> Error {
        let (kind, message) = match serde_json::from_slice::<E>(body) {
            Ok(env) if env != E::default() && env.is_api_error() => (env.kind(), env.message()),
            _ => (
                "http_error".to_string(),
                String::from_utf8_lossy(body).into_owned(),
            ),
        };

        let hint = match (&self.api_key_url, status) {
            (Some(key_url), 401) if !message.contains(key_url.as_str()) => {
                Some(format!("get a new API key at {key_url}"))
            }
            _ => None,
        };

        Error::Api {
            status,
            kind,
            message,
            url: url.to_string(),
            hint,
        }
    }
}
