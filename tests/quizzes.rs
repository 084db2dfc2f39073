mod common;
use reqwest::StatusCode;
use serde_json::Value;

use std::sync::Arc;

use crate::common::{
    Action, FailingStore, Flow, FlowContext, FlowDatabase, QUIZ_HEADER, create_deck_action,
    create_lesson_action, seed_admin_and_learner, setup_server, setup_server_with_store, setup_test_db,
    signin_admin_action,
};

fn csv(rows: &[&str]) -> Vec<u8> {
    let mut text = String::from(QUIZ_HEADER);
    for row in rows {
        text.push('\n');
        text.push_str(row);
    }
    text.into_bytes()
}

fn deck_id(ctx: &FlowContext) -> String {
    ctx.get("deck")["id"].as_str().unwrap().to_string()
}

fn deck_path(ctx: &FlowContext) -> String {
    format!("/api/v1/quizzes/{}", deck_id(ctx))
}

fn import_path(ctx: &FlowContext) -> String {
    format!("/api/v1/quizzes/{}/import", deck_id(ctx))
}

async fn count(pool: &FlowDatabase, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn route_import_roundtrip_test() {
    let pool = setup_test_db().await;
    let (mut server, store) = setup_server(&pool).await;
    seed_admin_and_learner(&pool).await;

    let file = csv(&[
        r#"What is 2+2?,3,4,5,6,B,Basic arithmetic,1,1"#,
        r#"  Largest planet? ,Mars,Venus,Jupiter,Earth, c ,"Gas giant, fifth from the sun",2.5,3"#,
        r#"Smallest prime?,0,1,2,3,C,,abc,0"#,
    ]);

    Flow::new()
        .step(signin_admin_action())
        .step(create_lesson_action("Arithmetic", 1).with_save_as("lesson"))
        .step(create_deck_action().with_save_as("deck"))
        .step(
            Action::new("import", "POST", "dynamic")
                .with_dyn_path(import_path)
                .with_file("deck.csv", "text/csv", &file)
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["status"], "success");
                    assert_eq!(body["total_processed"], 3);
                    assert!(body["csv_key"].as_str().unwrap().starts_with("quizzes/quiz-"));
                    assert!(body["csv_key"].as_str().unwrap().ends_with("-deck.csv"));
                }),
        )
        .step(
            Action::new("get_deck", "GET", "dynamic")
                .with_dyn_path(deck_path)
                .assert_body(|body| {
                    let deck: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(deck["total_items"], 4.5);
                    assert!(deck["csv_version"].as_str().unwrap().starts_with("quizzes/quiz-"));

                    let cards = deck["quiz_cards"].as_array().unwrap();
                    assert_eq!(cards.len(), 3);
                    // ordered by sequence
                    assert_eq!(cards[2]["question"], "Largest planet?");
                    let by_question = |q: &str| cards.iter().find(|c| c["question"] == q).unwrap();

                    let first = by_question("What is 2+2?");
                    assert_eq!(first["question"], "What is 2+2?");
                    assert_eq!(first["explanation"], "Basic arithmetic");
                    assert_eq!(first["item_score"], 1.0);
                    assert_eq!(first["sequence"], 1);
                    let choices = first["choices"].as_array().unwrap();
                    let texts: Vec<&str> = choices.iter().map(|c| c["choice"].as_str().unwrap()).collect();
                    assert_eq!(texts, ["3", "4", "5", "6"]);
                    let correct: Vec<&Value> = choices.iter().filter(|c| c["is_correct"] == true).collect();
                    assert_eq!(correct.len(), 1);
                    assert_eq!(correct[0]["choice"], "4");
                    assert_eq!(first["correct_choice_id"], correct[0]["id"]);

                    // defaults: item score "abc" and sequence "0" fall back to 1
                    let defaults = by_question("Smallest prime?");
                    assert_eq!(defaults["item_score"], 1.0);
                    assert_eq!(defaults["sequence"], 1);
                    assert_eq!(defaults["explanation"], "");

                    let quoted = by_question("Largest planet?");
                    assert_eq!(quoted["explanation"], "Gas giant, fifth from the sun");
                    assert_eq!(quoted["item_score"], 2.5);
                    assert_eq!(quoted["sequence"], 3);
                    let correct: Vec<&Value> = quoted["choices"]
                        .as_array()
                        .unwrap()
                        .iter()
                        .filter(|c| c["is_correct"] == true)
                        .collect();
                    assert_eq!(correct[0]["choice"], "Jupiter");
                }),
        )
        .run(&mut server, &pool)
        .await;

    let keys = store.object_keys().await;
    assert_eq!(keys.len(), 1);
    let stored = store.object(&keys[0]).await.unwrap();
    assert_eq!(stored.body, file);
}

#[tokio::test]
async fn route_reimport_leaves_no_residue_test() {
    let pool = setup_test_db().await;
    let (mut server, _) = setup_server(&pool).await;
    seed_admin_and_learner(&pool).await;

    let first = csv(&[
        "Q1,a,b,c,d,A,,1,1",
        "Q2,a,b,c,d,B,,1,2",
        "Q3,a,b,c,d,C,,1,3",
    ]);
    let second = csv(&["Only question,w,x,y,z,D,Replaced,3,1"]);

    Flow::new()
        .step(signin_admin_action())
        .step(create_lesson_action("Residue", 1).with_save_as("lesson"))
        .step(create_deck_action().with_save_as("deck"))
        .step(
            Action::new("first_import", "POST", "dynamic")
                .with_dyn_path(import_path)
                .with_file("first.csv", "text/csv", &first),
        )
        .step(
            Action::new("second_import", "POST", "dynamic")
                .with_dyn_path(import_path)
                .with_file("second.csv", "application/octet-stream", &second),
        )
        .step(
            Action::new("get_deck", "GET", "dynamic")
                .with_dyn_path(deck_path)
                .assert_body(|body| {
                    let deck: Value = serde_json::from_str(body).unwrap();
                    let cards = deck["quiz_cards"].as_array().unwrap();
                    assert_eq!(cards.len(), 1);
                    assert_eq!(cards[0]["question"], "Only question");
                    assert_eq!(deck["total_items"], 3.0);
                    assert!(deck["csv_version"].as_str().unwrap().ends_with("-second.csv"));
                }),
        )
        .run(&mut server, &pool)
        .await;

    assert_eq!(count(&pool, "quiz_cards").await, 1);
    assert_eq!(count(&pool, "choices").await, 4);
}

#[tokio::test]
async fn route_import_rejects_invalid_rows_test() {
    let pool = setup_test_db().await;
    let (mut server, store) = setup_server(&pool).await;
    seed_admin_and_learner(&pool).await;

    let short_row = csv(&["Q1,a,b,c,d,A,,1,1", "Q2,a,b,c,d,B,,1"]);
    let bad_answer = csv(&["Q1,a,b,c,d,E,,1,1"]);
    let bad_header = b"question,choice a,choice b\nQ1,a,b".to_vec();

    Flow::new()
        .step(signin_admin_action())
        .step(create_lesson_action("Rejections", 1).with_save_as("lesson"))
        .step(create_deck_action().with_save_as("deck"))
        .step(
            Action::new("eight_columns", "POST", "dynamic")
                .with_dyn_path(import_path)
                .with_file("short.csv", "text/csv", &short_row)
                .with_expect(StatusCode::BAD_REQUEST)
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["status"], "error");
                    let error = body["error"].as_str().unwrap();
                    assert!(error.starts_with("Error processing CSV: "));
                    assert!(error.contains("must have exactly 9 columns"));
                }),
        )
        .step(
            Action::new("bad_answer", "POST", "/api/v1/quizzes/import")
                .with_file("answer.csv", "text/csv", &bad_answer)
                .with_expect(StatusCode::BAD_REQUEST)
                .assert_body(|body| assert!(body.contains("Correct answer must be A, B, C, or D"))),
        )
        .step(
            Action::new("bad_header", "POST", "/api/v1/quizzes/import")
                .with_file("header.csv", "text/csv", &bad_header)
                .with_expect(StatusCode::BAD_REQUEST)
                .assert_body(|body| assert!(body.contains("Missing required columns"))),
        )
        .step(
            Action::new("wrong_type", "POST", "/api/v1/quizzes/import")
                .with_file("deck.pdf", "application/pdf", &bad_answer)
                .with_expect(StatusCode::BAD_REQUEST),
        )
        .step(
            Action::new("unknown_deck", "POST", "dynamic")
                .with_dyn_path(|_| format!("/api/v1/quizzes/{}/import", uuid::Uuid::new_v4()))
                .with_file("deck.csv", "text/csv", &csv(&["Q1,a,b,c,d,A,,1,1"]))
                .with_expect(StatusCode::NOT_FOUND)
                .assert_body(|body| assert!(body.contains("\"status\":\"error\""))),
        )
        .run(&mut server, &pool)
        .await;

    assert_eq!(count(&pool, "quiz_cards").await, 0);
    assert_eq!(count(&pool, "choices").await, 0);
    assert!(store.object_keys().await.is_empty());
}

#[tokio::test]
async fn route_unattached_import_then_create_test() {
    let pool = setup_test_db().await;
    let (mut server, _) = setup_server(&pool).await;
    seed_admin_and_learner(&pool).await;

    let stale = csv(&["Stale,a,b,c,d,A,,1,1"]);
    let file = csv(&["Q1,a,b,c,d,A,,2,1", "Q2,a,b,c,d,B,,0.5,2"]);

    Flow::new()
        .step(signin_admin_action())
        .step(
            Action::new("stale_import", "POST", "/api/v1/quizzes/import")
                .with_file("stale.csv", "text/csv", &stale),
        )
        // a second unattached import replaces the pool
        .step(
            Action::new("import", "POST", "/api/v1/quizzes/import")
                .with_file("fresh.csv", "text/csv", &file)
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["status"], "success");
                    let cards = body["quiz_cards"].as_array().unwrap();
                    assert_eq!(cards.len(), 2);
                    assert!(cards.iter().all(|c| c["quiz_deck_id"].is_null()));
                }),
        )
        .step(create_lesson_action("Attach", 1).with_save_as("lesson"))
        .step(create_deck_action().with_save_as("deck").assert_body(|body| {
            let deck: Value = serde_json::from_str(body).unwrap();
            assert_eq!(deck["total_items"], 2.5);
            let cards = deck["quiz_cards"].as_array().unwrap();
            assert_eq!(cards.len(), 2);
            assert!(cards.iter().all(|c| c["quiz_deck_id"] == deck["id"]));
        }))
        // nothing left to attach
        .step(
            Action::new("attach_again", "POST", "dynamic")
                .with_dyn_path(|ctx| format!("{}/attach", deck_path(ctx)))
                .assert_body(|body| {
                    let summary: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(summary["attached"], 0);
                    assert_eq!(summary["total_items"], 2.5);
                }),
        )
        .step(
            Action::new("attach_unknown", "POST", "dynamic")
                .with_dyn_path(|_| format!("/api/v1/quizzes/{}/attach", uuid::Uuid::new_v4()))
                .with_expect(StatusCode::NOT_FOUND),
        )
        .run(&mut server, &pool)
        .await;

    assert_eq!(count(&pool, "quiz_cards").await, 2);
    let stale: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quiz_cards WHERE question = 'Stale'")
        .fetch_one(pool.pool())
        .await
        .unwrap();
    assert_eq!(stale, 0);
}

#[tokio::test]
async fn route_deck_update_and_delete_test() {
    let pool = setup_test_db().await;
    let (mut server, store) = setup_server(&pool).await;
    seed_admin_and_learner(&pool).await;

    Flow::new()
        .step(signin_admin_action())
        .step(create_lesson_action("Decks", 1).with_save_as("lesson"))
        .step(create_deck_action().with_save_as("deck"))
        .step(
            Action::new("import", "POST", "dynamic")
                .with_dyn_path(import_path)
                .with_file("deck.csv", "text/csv", &csv(&["Q1,a,b,c,d,A,,1,1"])),
        )
        .step(
            Action::new("invalid_update", "PUT", "dynamic")
                .with_dyn_path(deck_path)
                .with_dyn_body(|ctx| {
                    serde_json::json!({
                        "title": "Tiny",
                        "description": "Still long enough",
                        "lesson_id": ctx.get("lesson")["id"],
                    })
                })
                .with_expect(StatusCode::BAD_REQUEST)
                .assert_body(|body| {
                    assert!(body.contains("Quiz Title is required and must be at least 5 Characters long"))
                }),
        )
        .step(
            Action::new("update", "PUT", "dynamic")
                .with_dyn_path(deck_path)
                .with_dyn_body(|ctx| {
                    serde_json::json!({
                        "title": "Arithmetic revisited",
                        "description": "Numbers, sums and differences",
                        "lesson_id": ctx.get("lesson")["id"],
                    })
                })
                .assert_body(|body| {
                    let deck: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(deck["title"], "Arithmetic revisited");
                    // csv_version survives an update without one
                    assert!(deck["csv_version"].as_str().unwrap().starts_with("quizzes/"));
                }),
        )
        .step(Action::new("delete", "DELETE", "dynamic").with_dyn_path(deck_path))
        .step(
            Action::new("get_deleted", "GET", "dynamic")
                .with_dyn_path(deck_path)
                .with_expect(StatusCode::NOT_FOUND),
        )
        .run(&mut server, &pool)
        .await;

    assert_eq!(count(&pool, "quiz_cards").await, 0);
    assert_eq!(count(&pool, "choices").await, 0);
    assert!(store.object_keys().await.is_empty());
}

#[tokio::test]
async fn route_import_keeps_cards_when_csv_storage_fails_test() {
    let pool = setup_test_db().await;
    let mut server = setup_server_with_store(&pool, Arc::new(FailingStore::new())).await;
    seed_admin_and_learner(&pool).await;

    let first = csv(&["Old question,a,b,c,d,A,,1,1"]);
    let second = csv(&["New question,a,b,c,d,B,,2,1", "Another question,a,b,c,d,C,,1.5,2"]);

    Flow::new()
        .step(signin_admin_action())
        .step(create_lesson_action("Outage", 1).with_save_as("lesson"))
        .step(create_deck_action().with_save_as("deck"))
        .step(
            Action::new("first_import", "POST", "dynamic")
                .with_dyn_path(import_path)
                .with_file("old.csv", "text/csv", &first)
                .with_expect(StatusCode::BAD_GATEWAY)
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["status"], "error");
                    assert!(body["error"].as_str().unwrap().starts_with("Error processing CSV: "));
                }),
        )
        .step(
            Action::new("second_import", "POST", "dynamic")
                .with_dyn_path(import_path)
                .with_file("new.csv", "text/csv", &second)
                .with_expect(StatusCode::BAD_GATEWAY)
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["status"], "error");
                }),
        )
        .step(
            Action::new("get_deck", "GET", "dynamic")
                .with_dyn_path(deck_path)
                .assert_body(|body| {
                    let deck: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(deck["total_items"], 3.5);
                    assert!(deck["csv_version"].is_null());
                    let questions: Vec<&str> = deck["quiz_cards"]
                        .as_array()
                        .unwrap()
                        .iter()
                        .map(|c| c["question"].as_str().unwrap())
                        .collect();
                    assert_eq!(questions, ["New question", "Another question"]);
                }),
        )
        .run(&mut server, &pool)
        .await;

    assert_eq!(count(&pool, "quiz_cards").await, 2);
    assert_eq!(count(&pool, "choices").await, 8);
}

#[tokio::test]
async fn route_import_rolls_back_on_database_failure_test() {
    let pool = setup_test_db().await;
    let (mut server, store) = setup_server(&pool).await;
    seed_admin_and_learner(&pool).await;

    // rejects one specific choice text so the second import fails after the
    // old cards are already deleted inside the transaction
    sqlx::query("ALTER TABLE choices ADD CONSTRAINT choices_reject_marker CHECK (choice <> 'REJECTED')")
        .execute(pool.pool())
        .await
        .unwrap();

    let original = csv(&["Q1,a,b,c,d,A,,1,1", "Q2,a,b,c,d,B,,1,2"]);
    let failing = csv(&["Q3,a,b,c,REJECTED,D,,5,1"]);

    Flow::new()
        .step(signin_admin_action())
        .step(create_lesson_action("Rollback", 1).with_save_as("lesson"))
        .step(create_deck_action().with_save_as("deck"))
        .step(
            Action::new("import", "POST", "dynamic")
                .with_dyn_path(import_path)
                .with_file("original.csv", "text/csv", &original),
        )
        .step(
            Action::new("failing_import", "POST", "dynamic")
                .with_dyn_path(import_path)
                .with_file("failing.csv", "text/csv", &failing)
                .with_expect(StatusCode::INTERNAL_SERVER_ERROR)
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["status"], "error");
                }),
        )
        .step(
            Action::new("get_deck", "GET", "dynamic")
                .with_dyn_path(deck_path)
                .assert_body(|body| {
                    let deck: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(deck["total_items"], 2.0);
                    let questions: Vec<&str> = deck["quiz_cards"]
                        .as_array()
                        .unwrap()
                        .iter()
                        .map(|c| c["question"].as_str().unwrap())
                        .collect();
                    assert_eq!(questions, ["Q1", "Q2"]);
                }),
        )
        .run(&mut server, &pool)
        .await;

    assert_eq!(count(&pool, "quiz_cards").await, 2);
    assert_eq!(count(&pool, "choices").await, 8);
    // only the first file reached storage
    assert_eq!(store.object_keys().await.len(), 1);
}

#[tokio::test]
async fn route_import_accepts_files_above_default_body_limit_test() {
    let pool = setup_test_db().await;
    let (mut server, _) = setup_server(&pool).await;
    seed_admin_and_learner(&pool).await;

    let long_explanation = "x".repeat(3 * 1024 * 1024);
    let file = csv(&[&format!("Long question,a,b,c,d,A,{long_explanation},1,1")]);

    Flow::new()
        .step(signin_admin_action())
        .step(
            Action::new("large_import", "POST", "/api/v1/quizzes/import")
                .with_file("large.csv", "text/csv", &file)
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["status"], "success");
                    assert_eq!(body["total_processed"], 1);
                }),
        )
        .run(&mut server, &pool)
        .await;
}
