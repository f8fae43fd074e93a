//! Streaming simulation for synchronous-only providers.
//!
//! Some providers (image and document generators especially) have no
//! streaming endpoint. [`gen_stream_via_sync`] gives their callers the
//! same [`GenStream`] surface anyway: it drives [`Engine::gen_sync`] to
//! completion, then emits exactly one fragment per reply item of the
//! final message. The caller still observes a stream — one fragment per
//! artifact — just without mid-generation incrementality.

use tokio::sync::mpsc;

use crate::adapter::Adapter;
use crate::engine::{Engine, GenStream};
use crate::options::GenOptions;
use crate::types::{Fragment, Message, Reply, ToolCallFragment};
use crate::{Error, Result};

/// One fragment per reply item: document replies carry their URL +
/// filename or their inline bytes; text, thinking, and tool-call
/// replies pass through whole.
fn fragment_for(reply: &Reply) -> Fragment {
    match reply {
        Reply::Text { text, .. } => Fragment::Text(text.clone()),
        Reply::Thinking { text, .. } => Fragment::Thinking(text.clone()),
        Reply::ToolCall(tc) => Fragment::ToolCall(ToolCallFragment {
            id: tc.id.clone(),
            name: tc.name.clone(),
            arguments: tc.arguments.clone(),
        }),
        Reply::Doc(doc) => Fragment::Doc(doc.clone()),
    }
}

/// Implements streaming on top of the synchronous path.
///
/// The returned stream yields one fragment per reply item and its
/// `finish()` returns the synchronous completion. Options the adapter
/// skipped as continuable surface from `finish()` the same way the real
/// streaming path reports them.
pub async fn gen_stream_via_sync<A: Adapter>(
    engine: &Engine<A>,
    messages: &[Message],
    options: &GenOptions,
) -> Result<GenStream> {
    let (completion, skipped) = match engine.gen_sync(messages, options).await {
        Ok(c) => (c, None),
        Err(Error::Unsupported {
            skipped,
            completion: Some(c),
        }) => (*c, Some(skipped)),
        Err(e) => return Err(e),
    };

    let (frag_tx, frag_rx) = mpsc::channel(16);
    let supervisor = tokio::spawn(async move {
        for reply in &completion.message.replies {
            let frag = fragment_for(reply);
            if frag.is_empty() {
                continue;
            }
            if frag_tx.send(frag).await.is_err() {
                break;
            }
        }
        drop(frag_tx);
        Ok(completion)
    });

    Ok(GenStream::from_parts(frag_rx, supervisor, None, skipped))
}
