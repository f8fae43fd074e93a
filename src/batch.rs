//! Asynchronous-job (batch) generation lifecycle.
//!
//! Providers with a batch queue expose three extra operations: submit a
//! generation and get back an opaque [`Job`], poll it with
//! [`Engine::poke_result`], and cancel it. Polling is caller-driven; the
//! engine schedules no timers of its own. A job whose result does not
//! exist yet answers with the vendor's not-found error, which the engine
//! maps to a completion with [`FinishReason::Pending`](crate::types::FinishReason::Pending) and no error —
//! the distinguished third outcome between success and failure.

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::adapter::{Adapter, VendorResponse};
use crate::engine::Engine;
use crate::options::GenOptions;
use crate::types::{Completion, Job, Message};
use crate::{Error, Result};

/// Batch-capable extension of the [`Adapter`] contract.
pub trait BatchAdapter: Adapter {
    /// The vendor's submit response, from which the job id is read.
    type JobResponse: DeserializeOwned + Serialize + Default + PartialEq + Send + Sync + 'static;

    /// The batch submit endpoint.
    fn batch_url(&self, base_url: &str) -> String;

    /// The result endpoint for a job.
    fn result_url(&self, base_url: &str, job: &Job) -> String;

    /// The cancel endpoint for a job.
    fn cancel_url(&self, base_url: &str, job: &Job) -> String;

    /// Extracts the job handle from a submit response.
    fn job_id(&self, resp: Self::JobResponse) -> Result<Job>;

    /// Whether an error from the result endpoint means "not finished
    /// yet". The default recognises a 404 whose vendor error type
    /// mentions `not_found`.
    fn is_pending_error(&self, err: &Error) -> bool {
        matches!(
            err,
            Error::Api { status: 404, kind, .. } if kind.contains("not_found")
        )
    }
}

impl<A: BatchAdapter> Engine<A> {
    /// Submits a generation to the batch endpoint and returns the job
    /// handle.
    ///
    /// Validation mirrors [`Engine::gen_sync`]. Options the adapter
    /// skips as continuable are logged and dropped here — a job handle
    /// has nowhere to carry them.
    pub async fn gen_async(&self, messages: &[Message], options: &GenOptions) -> Result<Job> {
        let (req, skipped) = self.prepare(messages, options, false)?;
        if let Some(skipped) = skipped {
            tracing::warn!(?skipped, "batch submit ignoring unsupported options");
        }
        let url = self.adapter().batch_url(self.provider().base_url());
        let resp: A::JobResponse = self
            .provider()
            .do_request::<_, A::JobResponse, A::Error>(Method::POST, &url, Some(&req))
            .await?;
        let job = self.adapter().job_id(resp)?;
        debug!(%job, "batch job submitted");
        Ok(job)
    }

    /// Fetches the job's result. Three mutually exclusive outcomes:
    ///
    /// - not finished yet: `Ok` with [`FinishReason::Pending`](crate::types::FinishReason::Pending) and an
    ///   otherwise empty completion
    /// - the job failed vendor-side: the vendor's error
    /// - the job succeeded: the decoded completion, post-processed
    ///   exactly like the synchronous path
    pub async fn poke_result(&self, job: &Job) -> Result<Completion> {
        let url = self.adapter().result_url(self.provider().base_url(), job);
        let resp = self
            .provider()
            .do_request::<(), A::Response, A::Error>(Method::GET, &url, None)
            .await;
        match resp {
            Ok(resp) => {
                let mut completion = resp.to_completion()?;
                let limits = self
                    .adapter()
                    .process_headers(&self.provider().last_headers());
                if !limits.is_empty() {
                    completion.usage.rate_limits = limits;
                }
                completion.usage.fill_total();
                completion.validate()?;
                Ok(completion)
            }
            Err(e) if self.adapter().is_pending_error(&e) => {
                debug!(%job, "job still pending");
                Ok(Completion::pending())
            }
            Err(e) => Err(e),
        }
    }

    /// Cancels the job. Idempotent: cancelling an already-terminal job
    /// succeeds.
    pub async fn cancel(&self, job: &Job) -> Result<()> {
        let url = self.adapter().cancel_url(self.provider().base_url(), job);
        let resp = self
            .provider()
            .do_request::<(), A::JobResponse, A::Error>(Method::POST, &url, None)
            .await;
        match resp {
            Ok(_) => Ok(()),
            // Cancelling a job the vendor already forgot is a success
            // for idempotence purposes.
            Err(e) if self.adapter().is_pending_error(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FinishReason;

    #[test]
    fn test_pending_completion_shape() {
        let c = Completion::pending();
        assert_eq!(c.usage.finish_reason, FinishReason::Pending);
        assert!(c.message.replies.is_empty());
        assert!(c.validate().is_ok());
    }
}
