// tests/api_tests.rs

use std::sync::Arc;
use std::time::Duration;

use lms_backend::config::{COURSE_COMPLETED_TOPIC, Config};
use lms_backend::consumers::{CertificateIssuer, Notifier};
use lms_backend::email::RecordingEmailSender;
use lms_backend::events::{BusError, EventBus, EventConsumer, InProcessEventBus};
use lms_backend::objects::ObjectStoreBlobs;
use lms_backend::pdf::PdfCertificateRenderer;
use lms_backend::routes;
use lms_backend::state::AppState;
use lms_backend::store::{Document, MemoryRecordStore, RecordStore, collections};
use lms_backend::utils::jwt::sign_jwt;
use serde_json::{Value, json};

fn test_config() -> Config {
    Config {
        database_url: "postgres://unused-in-tests".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        default_total_lessons: 10,
        email_api_url: "http://localhost:8025/api/send".parse().unwrap(),
        email_from: "noreply@test.local".to_string(),
        object_store_root: "unused-in-tests".into(),
        public_base_url: "http://localhost:3000/files".parse().unwrap(),
    }
}

struct TestApp {
    address: String,
    token: String,
    store: Arc<MemoryRecordStore>,
    mailer: Arc<RecordingEmailSender>,
}

/// Spawns the real router on a random port, wired to in-memory
/// collaborators with both consumers subscribed.
async fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryRecordStore::new());
    let mailer = Arc::new(RecordingEmailSender::new());
    let blobs = Arc::new(ObjectStoreBlobs::in_memory(
        "http://localhost:3000/files".parse().unwrap(),
    ));

    let bus = Arc::new(InProcessEventBus::default());
    bus.subscribe(
        COURSE_COMPLETED_TOPIC,
        Arc::new(CertificateIssuer::new(
            store.clone(),
            blobs,
            Arc::new(PdfCertificateRenderer::new()),
        )),
    );
    bus.subscribe(
        COURSE_COMPLETED_TOPIC,
        Arc::new(Notifier::new(store.clone(), mailer.clone())),
    );

    spawn_router(store, mailer, bus).await
}

async fn spawn_router(
    store: Arc<MemoryRecordStore>,
    mailer: Arc<RecordingEmailSender>,
    bus: Arc<dyn EventBus>,
) -> TestApp {
    let config = test_config();
    let token = sign_jwt("1", "student", &config.jwt_secret, 600).expect("signing a test token");

    let state = AppState {
        store: store.clone(),
        bus,
        config,
    };
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        token,
        store,
        mailer,
    }
}

/// Seeds a student, a four-question quiz (passing score 70) and both
/// email templates. Returns (student_id, quiz_id).
async fn seed_data(store: &MemoryRecordStore) -> (String, String) {
    let student = store
        .create(
            collections::USERS,
            json!({ "name": "Ada Lovelace", "email": "ada@example.com" }),
        )
        .await
        .unwrap();
    let quiz = store
        .create(
            collections::QUIZZES,
            json!({
                "courseId": "course-1",
                "courseName": "Foundations",
                "passingScore": 70,
                "questions": [
                    { "text": "Q1", "options": ["A", "B"], "correctAnswer": "A" },
                    { "text": "Q2", "options": ["A", "B"], "correctAnswer": "B" },
                    { "text": "Q3", "options": ["C", "D"], "correctAnswer": "C" },
                    { "text": "Q4", "options": ["C", "D"], "correctAnswer": "D" },
                ],
            }),
        )
        .await
        .unwrap();

    store
        .create(
            collections::EMAIL_TEMPLATES,
            json!({
                "type": "completion",
                "subject": "Congratulations {{name}}!",
                "content": "<p>You completed {{course}} with {{score}}%.</p>",
            }),
        )
        .await
        .unwrap();
    store
        .create(
            collections::EMAIL_TEMPLATES,
            json!({
                "type": "attempt",
                "subject": "Results for {{course}}",
                "content": "<p>You scored {{score}}%. Try again!</p>",
            }),
        )
        .await
        .unwrap();

    (student.id, quiz.id)
}

/// Polls the store until `collection` holds at least `min` matches.
/// Consumers run on their own tasks, so effects land asynchronously.
async fn wait_for_records(
    store: &MemoryRecordStore,
    collection: &str,
    filter: Value,
    min: usize,
) -> Vec<Document> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    loop {
        let docs = store.find(collection, &filter).await.unwrap();
        if docs.len() >= min {
            return docs;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {} record(s) in '{}'",
            min,
            collection
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

async fn submit(
    app: &TestApp,
    body: Value,
) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/api/exams/submit", app.address))
        .bearer_auth(&app.token)
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request")
}

#[tokio::test]
async fn passing_submission_grades_persists_and_fans_out() {
    let app = spawn_app().await;
    let (student_id, quiz_id) = seed_data(&app.store).await;

    // 3 of 4 correct at passing score 70 -> 75, passed.
    let response = submit(
        &app,
        json!({
            "studentId": student_id,
            "courseId": "course-1",
            "quizId": quiz_id,
            "answers": ["A", "B", "C", "X"],
            "attemptNumber": 1,
        }),
    )
    .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["score"], 75);
    assert_eq!(body["passed"], true);
    assert_eq!(body["correctAnswers"], 3);
    assert_eq!(body["totalQuestions"], 4);
    assert!(body["examResult"]["id"].is_string());
    assert!(body.get("warning").is_none());

    // Synchronous effects: exam result + merged progress.
    let results = app
        .store
        .find(collections::EXAM_RESULTS, &json!({}))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);

    let progress_key = format!("{}_course-1", student_id);
    let progress = app
        .store
        .get_by_id(collections::PROGRESS, &progress_key)
        .await
        .unwrap()
        .expect("progress record should exist");
    assert_eq!(progress.data["examAttempts"], 1);
    assert_eq!(progress.data["passedExams"], 1);
    assert_eq!(progress.data["currentScore"], 75);

    // Asynchronous effects: certificate and notification.
    let certificates =
        wait_for_records(&app.store, collections::CERTIFICATES, json!({}), 1).await;
    assert_eq!(
        certificates[0].data["certificateId"],
        format!("CERT-{}-course-1-1", student_id)
    );
    assert_eq!(certificates[0].data["studentId"], Value::String(student_id));

    let notifications = wait_for_records(
        &app.store,
        collections::NOTIFICATIONS,
        json!({ "type": "completion" }),
        1,
    )
    .await;
    assert_eq!(notifications[0].data["passed"], true);

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ada@example.com");
    assert_eq!(sent[0].subject, "Congratulations Ada Lovelace!");
}

#[tokio::test]
async fn failing_submission_notifies_without_certificate() {
    let app = spawn_app().await;
    let (student_id, quiz_id) = seed_data(&app.store).await;

    let response = submit(
        &app,
        json!({
            "studentId": student_id,
            "courseId": "course-1",
            "quizId": quiz_id,
            "answers": ["X", "X", "X", "X"],
        }),
    )
    .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["score"], 0);
    assert_eq!(body["passed"], false);

    let notifications = wait_for_records(
        &app.store,
        collections::NOTIFICATIONS,
        json!({ "type": "attempt" }),
        1,
    )
    .await;
    assert_eq!(notifications[0].data["score"], 0);

    // The notifier has run, so the issuer has had its chance too.
    let certificates = app
        .store
        .find(collections::CERTIFICATES, &json!({}))
        .await
        .unwrap();
    assert!(certificates.is_empty(), "failed attempts never earn a certificate");

    let progress_key = format!("{}_course-1", student_id);
    let progress = app
        .store
        .get_by_id(collections::PROGRESS, &progress_key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(progress.data["examAttempts"], 1);
    assert_eq!(progress.data["passedExams"], 0);
}

#[tokio::test]
async fn unknown_quiz_is_404_and_persists_nothing() {
    let app = spawn_app().await;
    let (student_id, _quiz_id) = seed_data(&app.store).await;

    let response = submit(
        &app,
        json!({
            "studentId": student_id,
            "courseId": "course-1",
            "quizId": "999",
            "answers": ["A"],
        }),
    )
    .await;

    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("not found"));

    // Rejected before anything was persisted or published.
    assert!(
        app.store
            .find(collections::EXAM_RESULTS, &json!({}))
            .await
            .unwrap()
            .is_empty()
    );
    assert!(
        app.store
            .find(collections::PROGRESS, &json!({}))
            .await
            .unwrap()
            .is_empty()
    );
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn unknown_student_is_404() {
    let app = spawn_app().await;
    let (_student_id, quiz_id) = seed_data(&app.store).await;

    let response = submit(
        &app,
        json!({
            "studentId": "999",
            "courseId": "course-1",
            "quizId": quiz_id,
            "answers": ["A"],
        }),
    )
    .await;

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn blank_required_field_is_400() {
    let app = spawn_app().await;
    let (_student_id, quiz_id) = seed_data(&app.store).await;

    let response = submit(
        &app,
        json!({
            "studentId": "",
            "courseId": "course-1",
            "quizId": quiz_id,
            "answers": ["A"],
        }),
    )
    .await;

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let app = spawn_app().await;
    seed_data(&app.store).await;

    // `answers` missing entirely.
    let response = submit(
        &app,
        json!({
            "studentId": "1",
            "courseId": "course-1",
            "quizId": "2",
        }),
    )
    .await;

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn missing_token_is_401() {
    let app = spawn_app().await;
    seed_data(&app.store).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/exams/submit", app.address))
        .json(&json!({
            "studentId": "1",
            "courseId": "course-1",
            "quizId": "2",
            "answers": ["A"],
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

/// Bus that accepts nothing, to exercise the degraded-publish path.
struct FailingBus;

#[async_trait::async_trait]
impl EventBus for FailingBus {
    async fn publish(&self, topic: &str, _payload: Value) -> Result<(), BusError> {
        Err(BusError::NoDelivery(topic.to_string()))
    }

    fn subscribe(&self, _topic: &str, _consumer: Arc<dyn EventConsumer>) {}
}

#[tokio::test]
async fn publish_failure_degrades_the_response_but_keeps_records() {
    let store = Arc::new(MemoryRecordStore::new());
    let mailer = Arc::new(RecordingEmailSender::new());
    let app = spawn_router(store, mailer, Arc::new(FailingBus)).await;
    let (student_id, quiz_id) = seed_data(&app.store).await;

    let response = submit(
        &app,
        json!({
            "studentId": student_id,
            "courseId": "course-1",
            "quizId": quiz_id,
            "answers": ["A", "B", "C", "D"],
        }),
    )
    .await;

    // Still a success: the exam result and progress are not unwound.
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["passed"], true);
    assert!(body["warning"].as_str().unwrap().contains("delayed"));

    assert_eq!(
        app.store
            .find(collections::EXAM_RESULTS, &json!({}))
            .await
            .unwrap()
            .len(),
        1
    );
    let progress_key = format!("{}_course-1", student_id);
    assert!(
        app.store
            .get_by_id(collections::PROGRESS, &progress_key)
            .await
            .unwrap()
            .is_some()
    );
}
