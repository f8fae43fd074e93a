//! End-to-end tests of the asynchronous-job lifecycle and the model
//! catalogue path.

mod common;

use common::{Script, engine_for, serve};
use omnigen::prelude::*;
use omnigen::{ModelSelection, resolve_model};

fn job_response() -> String {
    serde_json::json!({
        "id": "job_42",
        "object": "chat.completion.job",
        "status": "queued"
    })
    .to_string()
}

fn not_found() -> String {
    serde_json::json!({
        "error": {
            "type": "not_found_error",
            "message": "no result for job_42 yet",
            "code": null,
            "param": null
        }
    })
    .to_string()
}

fn final_result() -> String {
    serde_json::json!({
        "id": "cmpl-5",
        "object": "chat.completion",
        "created": 1700000000,
        "model": "test-model",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "done", "tool_calls": null},
            "finish_reason": "stop",
            "logprobs": null
        }],
        "usage": {"prompt_tokens": 8, "completion_tokens": 1, "total_tokens": 9,
                  "prompt_tokens_details": null}
    })
    .to_string()
}

#[tokio::test]
async fn pending_then_success() {
    let fixture = serve(vec![
        Script::json(200, job_response()),
        Script::json(404, not_found()),
        Script::json(404, not_found()),
        Script::json(200, final_result()),
    ])
    .await;
    let engine = engine_for(&fixture.base_url, DecodeMode::Strict);

    let job = engine
        .gen_async(&[Message::user("long task")], &GenOptions::default())
        .await
        .unwrap();
    assert_eq!(job.as_str(), "job_42");

    // Not finished yet: Pending outcome, no error.
    for _ in 0..2 {
        let completion = engine.poke_result(&job).await.unwrap();
        assert_eq!(completion.usage.finish_reason, FinishReason::Pending);
        assert!(completion.message.replies.is_empty());
    }

    // Finished: a populated completion, post-processed like the sync
    // path.
    let completion = engine.poke_result(&job).await.unwrap();
    assert_eq!(completion.usage.finish_reason, FinishReason::Stop);
    assert_eq!(completion.text(), "done");
    assert_eq!(completion.usage.total_tokens, 9);

    let recorded = fixture.recorded().await;
    assert_eq!(recorded[0].method, "POST");
    assert_eq!(recorded[0].path, "/v1/chat/completions/async");
    assert_eq!(recorded[0].body_json()["stream"], false);
    assert_eq!(recorded[1].method, "GET");
    assert_eq!(recorded[1].path, "/v1/chat/completions/async/job_42");
}

#[tokio::test]
async fn job_failure_is_an_error() {
    let fixture = serve(vec![
        Script::json(200, job_response()),
        Script::json(
            500,
            serde_json::json!({
                "error": {"type": "job_failed", "message": "ran out of disk",
                          "code": null, "param": null}
            })
            .to_string(),
        ),
        // The 500 is retried once by the transport before bubbling.
        Script::json(
            500,
            serde_json::json!({
                "error": {"type": "job_failed", "message": "ran out of disk",
                          "code": null, "param": null}
            })
            .to_string(),
        ),
    ])
    .await;
    let engine = engine_for(&fixture.base_url, DecodeMode::Strict);

    let job = engine
        .gen_async(&[Message::user("long task")], &GenOptions::default())
        .await
        .unwrap();
    let err = engine.poke_result(&job).await.unwrap_err();
    match err {
        Error::Api { status, kind, .. } => {
            assert_eq!(status, 500);
            assert_eq!(kind, "job_failed");
        }
        e => panic!("expected Api error, got {e}"),
    }
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let cancelled = serde_json::json!({
        "id": "job_42",
        "object": "chat.completion.job",
        "status": "cancelled"
    })
    .to_string();
    let fixture = serve(vec![
        Script::json(200, cancelled.clone()),
        // Second cancel: the vendor already dropped the job.
        Script::json(404, not_found()),
    ])
    .await;
    let engine = engine_for(&fixture.base_url, DecodeMode::Strict);

    let job = Job("job_42".to_string());
    engine.cancel(&job).await.unwrap();
    engine.cancel(&job).await.unwrap();

    let recorded = fixture.recorded().await;
    assert_eq!(recorded.len(), 2);
    assert_eq!(
        recorded[0].path,
        "/v1/chat/completions/async/job_42/cancel"
    );
    assert_eq!(recorded[0].method, "POST");
}

#[tokio::test]
async fn model_catalogue_and_tier_resolution() {
    let listing = serde_json::json!({
        "object": "list",
        "data": [
            {"id": "gpt-4o-mini", "object": "model", "created": 1715367049, "owned_by": "org"},
            {"id": "gpt-4o", "object": "model", "created": 1715367050, "owned_by": "org"},
            {"id": "o1-preview", "object": "model", "created": 1725648865, "owned_by": "org"}
        ]
    })
    .to_string();
    let fixture = serve(vec![Script::json(200, listing)]).await;
    let engine = engine_for(&fixture.base_url, DecodeMode::Strict);

    let models = engine
        .adapter()
        .list_models(engine.provider())
        .await
        .unwrap();
    assert_eq!(models.len(), 3);

    use omnigen::openai::MODEL_QUERY;
    assert_eq!(
        resolve_model(&ModelSelection::Cheap, &models, &MODEL_QUERY).unwrap(),
        Some("gpt-4o-mini".to_string())
    );
    assert_eq!(
        resolve_model(&ModelSelection::Sota, &models, &MODEL_QUERY).unwrap(),
        Some("o1-preview".to_string())
    );
    assert_eq!(
        resolve_model(&ModelSelection::Disabled, &models, &MODEL_QUERY).unwrap(),
        None
    );

    assert_eq!(fixture.recorded().await[0].path, "/v1/models");
}

#[tokio::test]
async fn batch_submit_validates_messages() {
    let fixture = serve(Vec::new()).await;
    let engine = engine_for(&fixture.base_url, DecodeMode::Strict);

    let err = engine
        .gen_async(&[], &GenOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(fixture.recorded().await.is_empty());
}
