//! Server-sent-event demultiplexer.
//!
//! Turns a raw byte stream into a channel of typed, JSON-decoded chunks.
//! The parser is line-oriented and reassembles lines split across HTTP
//! reads, which transport chunking does at arbitrary byte positions.
//!
//! Recognised line shapes, per the vendor variants observed in practice:
//!
//! ```text
//! data: {...json chunk...}     one chunk
//! data: [DONE]                 end-of-stream sentinel
//! : keep-alive                 heartbeat, ignored
//! event:<anything>             event tag, ignored
//! <empty line>                 separator, ignored
//! ```
//!
//! Anything else is a protocol violation and terminates the stream with
//! an error. A `data:` payload that fails to decode as the chunk type is
//! re-tried as the vendor's error payload; a decoded in-band error
//! terminates the stream with that error.
//!
//! The demultiplexer runs on its own task, owns the out-channel, and
//! closes it on return (the channel closes when the sender drops).

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::trace;

use crate::codec::{Codec, ErrorPayload};
use crate::{Error, Result};

const DATA_PREFIX: &[u8] = b"data: ";
const DONE_SENTINEL: &[u8] = b"[DONE]";
const KEEP_ALIVE: &[u8] = b": keep-alive";
const EVENT_PREFIX: &[u8] = b"event:";

enum Flow {
    Continue,
    Done,
}

/// Reads `body` line by line, decoding `data:` frames into `C` and
/// sending them on `tx`. Returns when the stream ends (EOF or `[DONE]`),
/// the receiver goes away, or an error terminates it.
pub(crate) async fn demux<C, E, S>(codec: Codec, mut body: S, tx: mpsc::Sender<C>) -> Result<()>
where
    C: DeserializeOwned + Serialize + Default + PartialEq + Send + 'static,
    E: ErrorPayload,
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    let mut buf: Vec<u8> = Vec::new();

    while let Some(chunk) = body.next().await {
        let bytes = chunk?;
        buf.extend_from_slice(&bytes);

        while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buf.drain(..=pos).collect();
            match handle_line::<C, E>(&codec, &tx, &line[..line.len() - 1]).await? {
                Flow::Continue => {}
                Flow::Done => return Ok(()),
            }
        }
    }

    // EOF with a residual partial line: process it as the final line. A
    // truncated JSON payload surfaces as a decode error here rather than
    // a silent drop.
    if !buf.is_empty() {
        handle_line::<C, E>(&codec, &tx, &buf).await?;
    }
    Ok(())
}

fn in_band_error<E: ErrorPayload>(payload: &[u8]) -> Option<Error> {
    let env = serde_json::from_slice::<E>(payload).ok()?;
    if env != E::default() && env.is_api_error() {
        Some(Error::in_band(env.kind(), env.message()))
    } else {
        None
    }
}

async fn handle_line<C, E>(codec: &Codec, tx: &mpsc::Sender<C>, line: &[u8]) -> Result<Flow>
where
    C: DeserializeOwned + Serialize + Default + PartialEq + Send + 'static,
    E: ErrorPayload,
{
    if line.is_empty() {
        return Ok(Flow::Continue);
    }
    if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
        if payload == DONE_SENTINEL {
            trace!("sse done sentinel");
            return Ok(Flow::Done);
        }
        let chunk = match codec.decode::<C>(payload) {
            // A lenient decode of an error frame can vacuously succeed
            // as an all-default chunk; treat that as a failed decode.
            Ok(c) if c == C::default() => {
                if let Some(err) = in_band_error::<E>(payload) {
                    return Err(err);
                }
                c
            }
            Ok(c) => c,
            Err(original) => {
                // An error payload can arrive on the data channel
                // mid-stream; prefer it over the raw decode error.
                if let Some(err) = in_band_error::<E>(payload) {
                    return Err(err);
                }
                return Err(original);
            }
        };
        if tx.send(chunk).await.is_err() {
            // Consumer is gone; nothing left to feed.
            return Ok(Flow::Done);
        }
        return Ok(Flow::Continue);
    }
    if line == KEEP_ALIVE {
        return Ok(Flow::Continue);
    }
    if line.starts_with(EVENT_PREFIX) {
        return Ok(Flow::Continue);
    }
    Err(Error::stream(format!(
        "unexpected SSE line: {:?}",
        String::from_utf8_lossy(line)
    )))
}
