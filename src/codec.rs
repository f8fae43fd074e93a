//! Strict/lenient JSON codec with two-pass success/error decoding.
//!
//! LLM APIs routinely return HTTP 200 with an error body, or a success
//! body that also carries an error envelope. [`Codec::decode_or_error`]
//! handles both: it decodes the success schema first, checks whether
//! anything was actually decoded, falls back to the error schema, and in
//! strict mode reports every unknown field it finds.
//!
//! Strictness is a field, threaded explicitly from the provider config —
//! there is no process-wide lenience switch.
//!
//! Numbers pass through `serde_json::Value` untouched: large integers
//! stay integers and are never coerced through `f64`.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// Vendor error payload contract.
///
/// The zero value (`Default`) must represent "no error decoded";
/// [`ErrorPayload::is_api_error`] discriminates a real error envelope
/// from an incidental decode of an unrelated body.
pub trait ErrorPayload:
    DeserializeOwned + Serialize + Default + PartialEq + Send + Sync + 'static
{
    /// True iff this payload is an actual vendor error envelope.
    fn is_api_error(&self) -> bool;

    /// The vendor's error message.
    fn message(&self) -> String;

    /// The vendor's error type/code, when it has one.
    fn kind(&self) -> String {
        "api_error".to_string()
    }
}

/// Error schema for endpoints with no structured error body: never
/// decodes as an API error, so raw bodies pass through as plain text.
#[derive(Debug, Default, PartialEq, Serialize, serde::Deserialize)]
pub struct NoErrorPayload {}

impl ErrorPayload for NoErrorPayload {
    fn is_api_error(&self) -> bool {
        false
    }

    fn message(&self) -> String {
        String::new()
    }
}

/// Whether unknown JSON fields are tolerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    /// Unknown fields are an error, reported with their dotted paths.
    #[default]
    Strict,
    /// Unknown fields are ignored.
    Lenient,
}

/// JSON decoder carrying the strictness mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec {
    /// Strictness applied to every decode.
    pub mode: DecodeMode,
}

impl Codec {
    /// Creates a codec.
    pub fn new(mode: DecodeMode) -> Self {
        Codec { mode }
    }

    /// Decodes a single schema. In strict mode, any field of the payload
    /// that the schema did not consume is an error.
    pub fn decode<T>(&self, bytes: &[u8]) -> Result<T>
    where
        T: DeserializeOwned + Serialize,
    {
        let raw: serde_json::Value = serde_json::from_slice(bytes)?;
        let decoded: T = serde_json::from_value(raw.clone())
            .map_err(|e| Error::decode(format!("decoding response: {e}")))?;
        if self.mode == DecodeMode::Strict {
            let unknown = unknown_keys(&raw, &to_value(&decoded)?);
            if !unknown.is_empty() {
                return Err(Error::Decode {
                    message: "payload has fields the schema does not".to_string(),
                    unknown_keys: unknown,
                });
            }
        }
        Ok(decoded)
    }

    /// Two-pass decode: the success schema `T` first, then the error
    /// schema `E`.
    ///
    /// Outcomes:
    /// - `T` decodes to a non-zero value and no error envelope is
    ///   present: the value is returned (after the strict-mode
    ///   unknown-field check).
    /// - `T` decodes to its zero value: the body was not a success
    ///   payload; the error schema is tried and a decoded envelope is
    ///   surfaced as an API error.
    /// - Both a non-zero `T` and an error envelope decode: the envelope
    ///   wins — a 200 body carrying an error is an error.
    /// - Strict-mode unknown-field diagnostics are joined onto a decoded
    ///   error envelope; lenient mode keeps only the envelope.
    pub fn decode_or_error<T, E>(&self, bytes: &[u8]) -> Result<T>
    where
        T: DeserializeOwned + Serialize + Default + PartialEq,
        E: ErrorPayload,
    {
        let raw: serde_json::Value = serde_json::from_slice(bytes)?;

        let envelope = serde_json::from_value::<E>(raw.clone())
            .ok()
            .filter(|e| *e != E::default() && e.is_api_error());

        match serde_json::from_value::<T>(raw.clone()) {
            Ok(decoded) => {
                let unknown = if self.mode == DecodeMode::Strict {
                    unknown_keys(&raw, &to_value(&decoded)?)
                } else {
                    Vec::new()
                };

                if let Some(env) = envelope {
                    let api = Error::in_band(env.kind(), env.message());
                    return Err(join_unknown(api, unknown));
                }
                if decoded == T::default() && raw != to_value(&decoded)? {
                    // The schema consumed nothing from a non-trivial
                    // body; whatever this payload is, it is not a
                    // success response.
                    return Err(Error::Decode {
                        message: "payload did not match the response schema".to_string(),
                        unknown_keys: unknown,
                    });
                }
                if !unknown.is_empty() {
                    return Err(Error::Decode {
                        message: "payload has fields the schema does not".to_string(),
                        unknown_keys: unknown,
                    });
                }
                Ok(decoded)
            }
            Err(e) => {
                if let Some(env) = envelope {
                    return Err(Error::in_band(env.kind(), env.message()));
                }
                Err(Error::decode(format!("decoding response: {e}")))
            }
        }
    }
}

fn to_value<T: Serialize>(v: &T) -> Result<serde_json::Value> {
    serde_json::to_value(v).map_err(Error::Json)
}

fn join_unknown(api: Error, unknown: Vec<String>) -> Error {
    if unknown.is_empty() {
        api
    } else {
        Error::join(
            api,
            Error::Decode {
                message: "payload has fields the schema does not".to_string(),
                unknown_keys: unknown,
            },
        )
    }
}

/// Collects dotted paths of keys present in `raw` that the decoded value
/// did not consume, at any depth.
fn unknown_keys(raw: &serde_json::Value, reserialized: &serde_json::Value) -> Vec<String> {
    let mut out = Vec::new();
    walk(raw, reserialized, "", &mut out);
    out
}

fn walk(raw: &serde_json::Value, known: &serde_json::Value, path: &str, out: &mut Vec<String>) {
    use serde_json::Value;
    match (raw, known) {
        (Value::Object(rm), Value::Object(km)) => {
            for (k, rv) in rm {
                let sub = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                match km.get(k) {
                    Some(kv) => walk(rv, kv, &sub, out),
                    None => out.push(sub),
                }
            }
        }
        (Value::Array(ra), Value::Array(ka)) => {
            for (i, rv) in ra.iter().enumerate() {
                if let Some(kv) = ka.get(i) {
                    walk(rv, kv, &format!("{path}[{i}]"), out);
                }
            }
        }
        _ => {}
    }
}
