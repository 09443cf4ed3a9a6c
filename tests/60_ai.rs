mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use cissp_prep_api::services::ai::StubGenerator;
use common::{TestApp, ADMIN_EMAIL};

#[tokio::test]
async fn generation_previews_questions_and_counts_quota() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, false, 1).await?;

    let (status, body) = app
        .post(
            &format!("/api/admin/ai/flashcards/{}/generate", seeded.card_ids[0]),
            &admin,
            json!({ "count": 4 }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["model"], "stub");
    assert_eq!(body["data"]["questions_requested"], 4);
    assert_eq!(body["data"]["questions_generated"], 4);
    assert_eq!(body["data"]["questions"].as_array().map(Vec::len), Some(4));
    assert_eq!(body["data"]["saved"], json!([]));
    assert_eq!(body["data"]["quota"]["used_today"], 1);
    assert_eq!(body["data"]["quota"]["remaining"], 2);

    // Preview only: nothing attached to the card
    let (_, quiz) = app.get(&format!("/api/flashcards/{}/quiz", seeded.card_ids[0]), &admin).await?;
    assert_eq!(quiz["data"], json!([]));
    Ok(())
}

#[tokio::test]
async fn saved_generation_attaches_to_the_deck() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, false, 2).await?;

    let (status, body) = app
        .post(
            &format!("/api/admin/ai/decks/{}/generate", seeded.deck_id),
            &admin,
            json!({ "count": 3, "save": true }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["saved"].as_array().map(Vec::len), Some(3));
    assert_eq!(body["data"]["saved"][0]["deck_id"], seeded.deck_id.to_string());

    let (_, quiz) = app.get(&format!("/api/decks/{}/quiz", seeded.deck_id), &admin).await?;
    assert_eq!(quiz["data"].as_array().map(Vec::len), Some(3));
    Ok(())
}

#[tokio::test]
async fn malformed_candidates_are_dropped() -> Result<()> {
    let app = TestApp::with_generator(StubGenerator {
        invalid: 2,
        fail_with: None,
    });
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, false, 0).await?;

    let (_, body) = app
        .post(
            &format!("/api/admin/ai/decks/{}/generate", seeded.deck_id),
            &admin,
            json!({ "count": 2, "save": true }),
        )
        .await?;
    assert_eq!(body["data"]["questions_generated"], 2);
    assert_eq!(body["data"]["dropped"], 2);
    assert_eq!(body["data"]["saved"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn daily_quota_is_enforced() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, false, 0).await?;
    let uri = format!("/api/admin/ai/decks/{}/generate", seeded.deck_id);

    for _ in 0..3 {
        let (status, _) = app.post(&uri, &admin, json!({ "count": 1 })).await?;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = app.post(&uri, &admin, json!({ "count": 1 })).await?;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["message"].as_str().unwrap_or_default().contains("quota of 3"));

    let (_, quota) = app.get("/api/admin/ai/quota", &admin).await?;
    assert_eq!(quota["data"]["daily_limit"], 3);
    assert_eq!(quota["data"]["used_today"], 3);
    assert_eq!(quota["data"]["remaining"], 0);
    assert!(quota["data"]["next_reset_at"].is_string());
    Ok(())
}

#[tokio::test]
async fn invalid_requests_do_not_consume_quota() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, false, 0).await?;
    let uri = format!("/api/admin/ai/decks/{}/generate", seeded.deck_id);

    for count in [0, 11] {
        let (status, body) = app.post(&uri, &admin, json!({ "count": count })).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["field_errors"]["count"].is_string());
    }
    let (status, _) = app
        .post(
            &format!("/api/admin/ai/decks/{}/generate", uuid::Uuid::new_v4()),
            &admin,
            json!({}),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, quota) = app.get("/api/admin/ai/quota", &admin).await?;
    assert_eq!(quota["data"]["used_today"], 0);
    Ok(())
}

#[tokio::test]
async fn disabled_generation_is_unavailable() -> Result<()> {
    let app = TestApp::with_config(|c| c.ai.enabled = false);
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, false, 0).await?;

    let (status, body) = app
        .post(&format!("/api/admin/ai/decks/{}/generate", seeded.deck_id), &admin, json!({}))
        .await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");

    let (_, quota) = app.get("/api/admin/ai/quota", &admin).await?;
    assert_eq!(quota["data"]["used_today"], 0);
    Ok(())
}

#[tokio::test]
async fn provider_failures_are_classified_and_logged() -> Result<()> {
    let app = TestApp::with_generator(StubGenerator {
        invalid: 0,
        fail_with: Some("Rate limit: slow down".to_string()),
    });
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, false, 0).await?;

    let (status, _) = app
        .post(&format!("/api/admin/ai/decks/{}/generate", seeded.deck_id), &admin, json!({}))
        .await?;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let admin_id = app.user_id(ADMIN_EMAIL).await?;
    let logs = app.store().list_ai_logs(admin_id, 10).await?;
    assert_eq!(logs.len(), 1);
    assert!(!logs[0].success);
    assert_eq!(logs[0].questions_generated, 0);
    assert_eq!(logs[0].deck_id, Some(seeded.deck_id));

    let broken = TestApp::with_generator(StubGenerator {
        invalid: 0,
        fail_with: Some("upstream exploded".to_string()),
    });
    let admin = broken.admin().await?;
    let seeded = broken.seed_deck(&admin, false, 0).await?;
    let (status, _) = broken
        .post(&format!("/api/admin/ai/decks/{}/generate", seeded.deck_id), &admin, json!({}))
        .await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    Ok(())
}

#[tokio::test]
async fn students_cannot_generate() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, false, 0).await?;
    let student = app.login("student@example.com").await?;

    let (status, _) = app
        .post(&format!("/api/admin/ai/decks/{}/generate", seeded.deck_id), &student, json!({}))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}
