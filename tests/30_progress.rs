mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{id_of, TestApp};

#[tokio::test]
async fn rating_a_card_schedules_the_next_review() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, false, 2).await?;
    let student = app.login("student@example.com").await?;
    let card = seeded.card_ids[0];

    let (status, body) = app
        .post(&format!("/api/progress/cards/{}", card), &student, json!({ "confidence_level": 3 }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["mastery"], "learning");
    assert_eq!(body["data"]["progress"]["times_reviewed"], 1);
    assert!(body["data"]["progress"]["next_review_at"].is_string());

    let (_, body) = app
        .post(&format!("/api/progress/cards/{}", card), &student, json!({ "confidence_level": 5 }))
        .await?;
    assert_eq!(body["data"]["mastery"], "mastered");
    assert_eq!(body["data"]["progress"]["times_reviewed"], 2);
    Ok(())
}

#[tokio::test]
async fn confidence_outside_range_is_rejected() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, false, 1).await?;
    let student = app.login("student@example.com").await?;

    for level in [-1, 6] {
        let (status, body) = app
            .post(
                &format!("/api/progress/cards/{}", seeded.card_ids[0]),
                &student,
                json!({ "confidence_level": level }),
            )
            .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["field_errors"]["confidence_level"].is_string());
    }
    Ok(())
}

#[tokio::test]
async fn premium_cards_cannot_be_rated_without_access() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, true, 1).await?;
    let student = app.login("student@example.com").await?;

    let (status, _) = app
        .post(
            &format!("/api/progress/cards/{}", seeded.card_ids[0]),
            &student,
            json!({ "confidence_level": 2 }),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn deck_and_class_rollups() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, false, 4).await?;
    let student = app.login("student@example.com").await?;

    for (card, level) in seeded.card_ids.iter().zip([5, 2]) {
        app.post(&format!("/api/progress/cards/{}", card), &student, json!({ "confidence_level": level }))
            .await?;
    }

    let (status, deck) = app.get(&format!("/api/progress/decks/{}", seeded.deck_id), &student).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deck["data"]["total_cards"], 4);
    assert_eq!(deck["data"]["studied_cards"], 2);
    assert_eq!(deck["data"]["new_cards"], 2);
    assert_eq!(deck["data"]["learning_cards"], 1);
    assert_eq!(deck["data"]["mastered_cards"], 1);
    assert_eq!(deck["data"]["average_confidence"], 3.5);
    assert_eq!(deck["data"]["mastery_percent"], 25.0);

    let (_, class) = app.get(&format!("/api/progress/classes/{}", seeded.class_id), &student).await?;
    assert_eq!(class["data"]["decks"].as_array().map(Vec::len), Some(1));
    assert_eq!(class["data"]["totals"]["studied_cards"], 2);

    // Another user's progress is separate
    let other = app.login("other@example.com").await?;
    let (_, theirs) = app.get(&format!("/api/progress/decks/{}", seeded.deck_id), &other).await?;
    assert_eq!(theirs["data"]["studied_cards"], 0);
    Ok(())
}

#[tokio::test]
async fn resetting_a_deck_clears_progress() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, false, 2).await?;
    let student = app.login("student@example.com").await?;
    for card in &seeded.card_ids {
        app.post(&format!("/api/progress/cards/{}", card), &student, json!({ "confidence_level": 4 }))
            .await?;
    }

    let (status, body) = app
        .request(
            Method::DELETE,
            &format!("/api/progress/decks/{}", seeded.deck_id),
            Some(&student),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cleared"], 2);

    let (_, deck) = app.get(&format!("/api/progress/decks/{}", seeded.deck_id), &student).await?;
    assert_eq!(deck["data"]["studied_cards"], 0);
    Ok(())
}

#[tokio::test]
async fn study_queue_puts_unseen_before_scheduled_cards() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, false, 3).await?;
    let student = app.login("student@example.com").await?;

    // Rated 5 is not due for two weeks
    app.post(
        &format!("/api/progress/cards/{}", seeded.card_ids[0]),
        &student,
        json!({ "confidence_level": 5 }),
    )
    .await?;

    let uri = format!("/api/study/decks/{}/queue", seeded.deck_id);
    let (status, queue) = app.get(&uri, &student).await?;
    assert_eq!(status, StatusCode::OK);
    let items = queue["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|item| item["due"] == true));
    assert_eq!(items[0]["flashcard"]["id"], seeded.card_ids[1].to_string());

    let (_, all) = app.get(&format!("{}?include_all=true", uri), &student).await?;
    let items = all["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(items.len(), 3);
    assert_eq!(items[2]["flashcard"]["id"], seeded.card_ids[0].to_string());
    assert_eq!(items[2]["due"], false);

    let (_, limited) = app.get(&format!("{}?limit=1", uri), &student).await?;
    assert_eq!(limited["data"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn study_session_lifecycle() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, false, 1).await?;
    let student = app.login("student@example.com").await?;

    let (status, started) = app
        .post("/api/sessions", &student, json!({ "deck_id": seeded.deck_id, "mode": "flashcards" }))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert!(started["data"]["ended_at"].is_null());
    let id = id_of(&started)?;

    let end_uri = format!("/api/sessions/{}/end", id);
    let (status, ended) = app
        .request(Method::PUT, &end_uri, Some(&student), Some(json!({ "cards_studied": 12 })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ended["data"]["cards_studied"], 12);
    assert!(ended["data"]["ended_at"].is_string());

    let (status, _) = app
        .request(Method::PUT, &end_uri, Some(&student), Some(json!({ "cards_studied": 1 })))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let other = app.login("other@example.com").await?;
    let (status, _) = app
        .request(Method::PUT, &end_uri, Some(&other), Some(json!({})))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = app.get("/api/sessions", &student).await?;
    assert_eq!(list["data"].as_array().map(Vec::len), Some(1));

    let (_, stats) = app.get("/api/stats", &student).await?;
    assert_eq!(stats["data"]["sessions_completed"], 1);
    assert_eq!(stats["data"]["current_streak"], 1);
    Ok(())
}

#[tokio::test]
async fn session_needs_exactly_one_target() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, false, 0).await?;
    let student = app.login("student@example.com").await?;

    let (status, _) = app.post("/api/sessions", &student, json!({ "mode": "quiz" })).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/sessions",
            &student,
            json!({ "deck_id": seeded.deck_id, "class_id": seeded.class_id, "mode": "quiz" }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn quiz_submission_is_graded_and_recorded() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin().await?;
    let seeded = app.seed_deck(&admin, false, 0).await?;
    let (_, imported) = app
        .post(
            &format!("/api/admin/decks/{}/quiz/import", seeded.deck_id),
            &admin,
            json!({ "questions": [
                { "question": "Q1", "options": ["a", "b"], "correct_index": 0, "explanation": "Because a" },
                { "question": "Q2", "options": ["a", "b", "c"], "correct_index": 2 }
            ]}),
        )
        .await?;
    let q1 = imported["data"][0]["id"].clone();
    let q2 = imported["data"][1]["id"].clone();
    let student = app.login("student@example.com").await?;

    let (status, result) = app
        .post(
            &format!("/api/decks/{}/quiz/submit", seeded.deck_id),
            &student,
            json!({ "answers": [
                { "question_id": q1, "selected_index": 0 },
                { "question_id": q2, "selected_index": 1 }
            ]}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["data"]["total_questions"], 2);
    assert_eq!(result["data"]["correct_count"], 1);
    assert_eq!(result["data"]["score_percent"], 50.0);
    assert_eq!(result["data"]["results"][0]["explanation"], "Because a");
    assert_eq!(result["data"]["results"][1]["correct_index"], 2);

    let (_, sessions) = app.get("/api/sessions", &student).await?;
    assert_eq!(sessions["data"][0]["mode"], "quiz");
    assert_eq!(sessions["data"][0]["deck_id"], seeded.deck_id.to_string());

    let (_, stats) = app.get("/api/stats", &student).await?;
    assert_eq!(stats["data"]["quiz_average"], 50.0);

    let (status, body) = app
        .post(
            &format!("/api/decks/{}/quiz/submit", seeded.deck_id),
            &student,
            json!({ "answers": [] }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"]["answers"].is_string());
    Ok(())
}
