mod common;
use reqwest::StatusCode;
use serde_json::{Value, json};
use skilltune::web::UserRole;
use uuid::Uuid;

use crate::common::{
    Action, Flow, FlowDatabase, seed_admin_and_learner, seed_user, setup_server, setup_test_db,
    signin_admin_action,
};

async fn seed_lesson(db: &FlowDatabase, title: &str, sequence: i32) -> (Uuid, Uuid) {
    let lesson_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO lessons (id, title, description, sequence, pdf_key, video_key) VALUES ($1, $2, 'Seeded lesson', $3, 'pdfs/a.pdf', 'videos/a.mp4')",
    )
    .bind(lesson_id)
    .bind(title)
    .bind(sequence)
    .execute(db.pool())
    .await
    .unwrap();

    let deck_id = Uuid::new_v4();
    sqlx::query("INSERT INTO quiz_decks (id, title, description, lesson_id) VALUES ($1, $2, 'Seeded deck', $3)")
        .bind(deck_id)
        .bind(format!("{title} quiz"))
        .bind(lesson_id)
        .execute(db.pool())
        .await
        .unwrap();

    (lesson_id, deck_id)
}

async fn seed_attempt(db: &FlowDatabase, user_id: Uuid, deck_id: Uuid, passed: bool) {
    sqlx::query("INSERT INTO quiz_attempts (id, user_id, quiz_deck_id, score, is_passed) VALUES ($1, $2, $3, $4, $5)")
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(deck_id)
        .bind(if passed { 90.0 } else { 30.0 })
        .bind(passed)
        .execute(db.pool())
        .await
        .unwrap();
}

async fn seed_completion(db: &FlowDatabase, user_id: Uuid, lesson_id: Uuid, days_ago: i32) {
    sqlx::query(
        "INSERT INTO learning_progress (id, user_id, lesson_id, lesson_completed, lesson_completed_at) VALUES ($1, $2, $3, 100, now() - make_interval(days => $4))",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(lesson_id)
    .bind(days_ago)
    .execute(db.pool())
    .await
    .unwrap();
}

#[tokio::test]
async fn route_dashboard_empty_test() {
    let pool = setup_test_db().await;
    let (mut server, _) = setup_server(&pool).await;
    seed_admin_and_learner(&pool).await;

    Flow::new()
        .step(signin_admin_action())
        .step(Action::new("dashboard", "GET", "/api/v1/dashboard/").assert_body(|body| {
            let body: Value = serde_json::from_str(body).unwrap();
            assert_eq!(
                body,
                json!({
                    "total_users": 1,
                    "average_quiz_score": {"attempts": 0, "pass": 0},
                    "total_active_users": 0,
                    "quiz_performance": [],
                    "lesson_completion": [],
                })
            );
        }))
        .run(&mut server, &pool)
        .await;
}

#[tokio::test]
async fn route_dashboard_metrics_test() {
    let pool = setup_test_db().await;
    let (mut server, _) = setup_server(&pool).await;
    seed_admin_and_learner(&pool).await;

    let ann = seed_user(&pool, "ann@skilltune.test", "pw", UserRole::User).await;
    let bob = seed_user(&pool, "bob@skilltune.test", "pw", UserRole::User).await;

    let (second_lesson, second_deck) = seed_lesson(&pool, "Fractions", 2).await;
    let (first_lesson, first_deck) = seed_lesson(&pool, "Counting", 1).await;

    seed_attempt(&pool, ann.id(), first_deck, true).await;
    seed_attempt(&pool, ann.id(), first_deck, false).await;
    seed_attempt(&pool, bob.id(), first_deck, true).await;
    seed_attempt(&pool, bob.id(), second_deck, false).await;

    seed_completion(&pool, ann.id(), first_lesson, 1).await;
    seed_completion(&pool, bob.id(), first_lesson, 3).await;
    // outside the activity window, still counts as a completion
    seed_completion(&pool, bob.id(), second_lesson, 45).await;

    Flow::new()
        .step(signin_admin_action())
        .step(Action::new("dashboard", "GET", "/api/v1/dashboard/").assert_body(|body| {
            let body: Value = serde_json::from_str(body).unwrap();
            assert_eq!(body["total_users"], 3);
            assert_eq!(body["average_quiz_score"], json!({"attempts": 4, "pass": 2}));
            assert_eq!(body["total_active_users"], 2);
            assert_eq!(
                body["quiz_performance"],
                json!([
                    {"bardisplay": "1", "tooltipdisplayquiz": "Counting", "attempts": 3, "passed": 2},
                    {"bardisplay": "2", "tooltipdisplayquiz": "Fractions", "attempts": 1, "passed": 0},
                ])
            );
            assert_eq!(
                body["lesson_completion"],
                json!([
                    {"lesson": "Lesson 1", "users": 2, "total_users": 3},
                    {"lesson": "Lesson 2", "users": 1, "total_users": 3},
                ])
            );
        }))
        .run(&mut server, &pool)
        .await;
}

#[tokio::test]
async fn route_dashboard_requires_session_test() {
    let pool = setup_test_db().await;
    let (mut server, _) = setup_server(&pool).await;

    Flow::new()
        .step(
            Action::new("dashboard_anonymous", "GET", "/api/v1/dashboard/")
                .with_expect(StatusCode::UNAUTHORIZED)
                .assert_body(|body| assert!(body.contains("Authentication required"))),
        )
        .run(&mut server, &pool)
        .await;
}

#[tokio::test]
async fn route_dashboard_degrades_failed_metrics_test() {
    let pool = setup_test_db().await;
    let (mut server, _) = setup_server(&pool).await;
    seed_admin_and_learner(&pool).await;

    let ann = seed_user(&pool, "ann@skilltune.test", "pw", UserRole::User).await;
    let (lesson, deck) = seed_lesson(&pool, "Counting", 1).await;
    seed_attempt(&pool, ann.id(), deck, true).await;
    seed_completion(&pool, ann.id(), lesson, 2).await;

    // both attempt queries fail from here on, the rest keep working
    sqlx::query("DROP TABLE quiz_attempts")
        .execute(pool.pool())
        .await
        .unwrap();

    Flow::new()
        .step(signin_admin_action())
        .step(Action::new("dashboard", "GET", "/api/v1/dashboard/").assert_body(|body| {
            let body: Value = serde_json::from_str(body).unwrap();
            assert_eq!(body["average_quiz_score"], json!({"attempts": 0, "pass": 0}));
            assert_eq!(body["quiz_performance"], json!([]));
            assert_eq!(body["total_users"], 2);
            assert_eq!(body["total_active_users"], 1);
            assert_eq!(
                body["lesson_completion"],
                json!([{"lesson": "Lesson 1", "users": 1, "total_users": 2}])
            );
        }))
        .run(&mut server, &pool)
        .await;
}
