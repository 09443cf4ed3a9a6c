mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{id_of, TestApp};

#[tokio::test]
async fn published_content_is_browsable() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, false, 3).await?;
    let student = app.login("student@example.com").await?;

    let (status, body) = app.get("/api/classes", &student).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let (status, body) = app.get(&format!("/api/classes/{}", seeded.class_id), &student).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["decks"][0]["locked"], false);

    let (status, body) = app.get(&format!("/api/decks/{}", seeded.deck_id), &student).await?;
    assert_eq!(status, StatusCode::OK);
    let cards = body["data"]["flashcards"].as_array().cloned().unwrap_or_default();
    assert_eq!(cards.len(), 3);
    assert_eq!(cards[0]["question"], "Question 1");
    Ok(())
}

#[tokio::test]
async fn unpublished_content_is_hidden_from_students() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin().await?;
    let (_, class) = app.post("/api/admin/classes", &admin, json!({ "name": "Draft domain" })).await?;
    let class_id = id_of(&class)?;
    let student = app.login("student@example.com").await?;

    let (_, list) = app.get("/api/classes", &student).await?;
    assert_eq!(list["data"], json!([]));
    let (status, _) = app.get(&format!("/api/classes/{}", class_id), &student).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get(&format!("/api/classes/{}", class_id), &admin).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn premium_decks_are_locked_for_free_users() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, true, 1).await?;
    let student = app.login("student@example.com").await?;

    let (_, decks) = app.get(&format!("/api/classes/{}/decks", seeded.class_id), &student).await?;
    assert_eq!(decks["data"][0]["locked"], true);

    let (status, body) = app.get(&format!("/api/decks/{}/flashcards", seeded.deck_id), &student).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = app.get(&format!("/api/decks/{}/flashcards", seeded.deck_id), &admin).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn authoring_validates_required_text() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin().await?;

    let (status, body) = app.post("/api/admin/classes", &admin, json!({ "name": "   " })).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"]["name"].is_string());

    let seeded = app.seed_deck(&admin, false, 1).await?;
    let (status, _) = app
        .post(
            "/api/admin/flashcards",
            &admin,
            json!({ "deck_id": seeded.deck_id, "question": "What is CIA?", "answer": "" }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn updating_and_deleting_content() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, false, 2).await?;

    let (status, body) = app
        .request(
            Method::PATCH,
            &format!("/api/admin/decks/{}", seeded.deck_id),
            Some(&admin),
            Some(json!({ "name": "Renamed deck" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Renamed deck");
    assert_eq!(body["data"]["is_published"], true);

    let (status, body) = app
        .request(Method::DELETE, &format!("/api/admin/classes/{}", seeded.class_id), Some(&admin), None)
        .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = app.get(&format!("/api/decks/{}", seeded.deck_id), &admin).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .request(Method::DELETE, &format!("/api/admin/classes/{}", seeded.class_id), Some(&admin), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn quiz_questions_attach_to_decks_and_flashcards() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, false, 1).await?;
    let card = seeded.card_ids[0];

    let (status, created) = app
        .post(
            "/api/admin/quiz-questions",
            &admin,
            json!({
                "parent": { "type": "flashcard", "id": card },
                "question": "Which principle limits access to what is needed?",
                "options": ["Least privilege", "Defense in depth", "Separation of duties"],
                "correct_index": 0
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["data"]["flashcard_id"], card.to_string());
    assert!(created["data"]["deck_id"].is_null());

    let (status, body) = app
        .post(
            &format!("/api/admin/decks/{}/quiz/import", seeded.deck_id),
            &admin,
            json!({ "questions": [
                { "question": "Q1", "options": ["a", "b"], "correct_index": 1 },
                { "question": "Q2", "options": ["a", "b", "c", "d"], "correct_index": 3 }
            ]}),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));

    let student = app.login("student@example.com").await?;
    let (_, deck_quiz) = app.get(&format!("/api/decks/{}/quiz", seeded.deck_id), &student).await?;
    assert_eq!(deck_quiz["data"].as_array().map(Vec::len), Some(2));
    let (_, card_quiz) = app.get(&format!("/api/flashcards/{}/quiz", card), &student).await?;
    assert_eq!(card_quiz["data"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn quiz_import_is_all_or_nothing() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, false, 0).await?;

    let (status, body) = app
        .post(
            &format!("/api/admin/decks/{}/quiz/import", seeded.deck_id),
            &admin,
            json!({ "questions": [
                { "question": "Fine", "options": ["a", "b"], "correct_index": 0 },
                { "question": "Out of range", "options": ["a", "b"], "correct_index": 2 }
            ]}),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"]["questions[1]"].is_string());

    let (_, quiz) = app.get(&format!("/api/decks/{}/quiz", seeded.deck_id), &admin).await?;
    assert_eq!(quiz["data"], json!([]));
    Ok(())
}

#[tokio::test]
async fn quiz_question_update_is_revalidated() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, false, 0).await?;
    let (_, created) = app
        .post(
            "/api/admin/quiz-questions",
            &admin,
            json!({
                "parent": { "type": "deck", "id": seeded.deck_id },
                "question": "Pick one",
                "options": ["a", "b", "c"],
                "correct_index": 2
            }),
        )
        .await?;
    let id = id_of(&created)?;

    // Shrinking the options strands the stored correct_index
    let (status, _) = app
        .request(
            Method::PATCH,
            &format!("/api/admin/quiz-questions/{}", id),
            Some(&admin),
            Some(json!({ "options": ["a", "b"] })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/admin/quiz-questions/{}", id),
            Some(&admin),
            Some(json!({ "options": ["a", "b"], "correct_index": 1 })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["correct_index"], 1);
    Ok(())
}
