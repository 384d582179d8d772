// tests/api_tests.rs
//
// HTTP-surface tests: the real router served on a random port, with
// in-memory fakes standing in for the content provider and results sink.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use proctor::config::Config;
use proctor::models::question::{OptionLabel, Question};
use proctor::models::score::GroupScore;
use proctor::models::session::CandidateRef;
use proctor::providers::ProviderError;
use proctor::providers::content::{ContentProvider, GroupRef};
use proctor::providers::results::ResultsSink;
use proctor::routes;
use proctor::state::AppState;
use proctor::utils::jwt::sign_jwt;

const JWT_SECRET: &str = "test_secret_for_integration_tests";

struct FakeContent {
    questions: Vec<Question>,
}

#[async_trait]
impl ContentProvider for FakeContent {
    async fn fetch_exam_groups(&self, _exam_id: i64) -> Result<Vec<GroupRef>, ProviderError> {
        let mut groups: Vec<i64> = Vec::new();
        for q in &self.questions {
            if !groups.contains(&q.group_id) {
                groups.push(q.group_id);
            }
        }
        Ok(groups
            .into_iter()
            .enumerate()
            .map(|(i, id)| GroupRef {
                id,
                position: i as i32,
            })
            .collect())
    }

    async fn fetch_group_items(&self, group_id: i64) -> Result<Vec<Question>, ProviderError> {
        Ok(self
            .questions
            .iter()
            .filter(|q| q.group_id == group_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct RecordingSink {
    existing: AtomicBool,
    submissions: Mutex<Vec<(CandidateRef, Option<i64>, Vec<GroupScore>)>>,
}

#[async_trait]
impl ResultsSink for RecordingSink {
    async fn check_existing_attempt(
        &self,
        _candidate: &CandidateRef,
    ) -> Result<bool, ProviderError> {
        Ok(self.existing.load(Ordering::SeqCst))
    }

    async fn record_proctoring_start(
        &self,
        _candidate: &CandidateRef,
    ) -> Result<i64, ProviderError> {
        Ok(77)
    }

    async fn submit_scores(
        &self,
        candidate: &CandidateRef,
        proctoring_event_id: Option<i64>,
        groups: &[GroupScore],
    ) -> Result<(), ProviderError> {
        self.submissions.lock().unwrap().push((
            *candidate,
            proctoring_event_id,
            groups.to_vec(),
        ));
        Ok(())
    }
}

fn question(id: i64, group_id: i64, correct: OptionLabel, position: i32) -> Question {
    Question {
        id,
        group_id,
        content: format!("Question {}", id),
        options: [
            "one".to_string(),
            "two".to_string(),
            "three".to_string(),
            "four".to_string(),
        ],
        correct,
        position,
    }
}

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL and the recording sink for assertions.
async fn spawn_app() -> (String, Arc<RecordingSink>) {
    let config = Config {
        database_url: "postgres://unused-in-tests".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        rust_log: "error".to_string(),
        allowed_origin: "http://localhost:3000".to_string(),
        exam_duration_secs: 600,
        presence_poll_ms: 1250,
        presence_grace_secs: 10,
        presence_staleness_ms: 4000,
    };

    let content = Arc::new(FakeContent {
        questions: vec![
            question(1, 10, OptionLabel::A, 0),
            question(2, 10, OptionLabel::B, 1),
            question(3, 20, OptionLabel::C, 0),
        ],
    });
    let sink = Arc::new(RecordingSink::default());

    let state = AppState::new(content, sink.clone(), config);
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, sink)
}

/// Unique employee id per test run so session keys never collide.
fn unique_employee() -> i64 {
    (uuid::Uuid::new_v4().as_u128() % 1_000_000_000) as i64
}

fn token_for(employee_id: i64, exam_id: i64, job_id: i64) -> String {
    sign_jwt(employee_id, exam_id, job_id, JWT_SECRET, 600).unwrap()
}

struct TestCandidate {
    address: String,
    token: String,
    session_id: String,
    client: reqwest::Client,
}

impl TestCandidate {
    async fn create(address: &str, token: &str) -> Self {
        let client = reqwest::Client::new();
        let resp = client
            .post(format!("{}/api/sessions", address))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to create session");
        assert_eq!(resp.status().as_u16(), 201);
        let body: serde_json::Value = resp.json().await.unwrap();
        let session_id = body["id"].as_str().unwrap().to_string();

        TestCandidate {
            address: address.to_string(),
            token: token.to_string(),
            session_id,
            client,
        }
    }

    async fn post(&self, action: &str, body: Option<serde_json::Value>) -> reqwest::Response {
        let url = format!(
            "{}/api/sessions/{}{}",
            self.address, self.session_id, action
        );
        let mut req = self.client.post(&url).bearer_auth(&self.token);
        if let Some(body) = body {
            req = req.json(&body);
        }
        req.send().await.expect("Failed to execute request")
    }

    async fn view(&self) -> serde_json::Value {
        self.client
            .get(format!("{}/api/sessions/{}", self.address, self.session_id))
            .bearer_auth(&self.token)
            .send()
            .await
            .expect("Failed to fetch view")
            .json()
            .await
            .unwrap()
    }

    /// Walks the session up to a running exam: proceed, camera check,
    /// fullscreen confirmation, start.
    async fn start_exam(&self) {
        assert_eq!(self.post("/proceed", None).await.status().as_u16(), 200);
        let resp = self
            .post(
                "/monitor/presence",
                Some(serde_json::json!({ "present": true })),
            )
            .await;
        assert_eq!(resp.status().as_u16(), 200);
        let resp = self
            .post(
                "/monitor/fullscreen",
                Some(serde_json::json!({ "active": true })),
            )
            .await;
        assert_eq!(resp.status().as_u16(), 200);
        let resp = self.post("/start", None).await;
        assert_eq!(resp.status().as_u16(), 200);
    }
}

#[tokio::test]
async fn missing_token_is_rejected() {
    let (address, _sink) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/sessions", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn incomplete_identifier_triple_is_rejected() {
    let (address, _sink) = spawn_app().await;
    let client = reqwest::Client::new();

    // A negative job id never resolves to a valid triple.
    let token = token_for(unique_employee(), 3, -1);
    let response = client
        .post(format!("{}/api/sessions", address))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn full_exam_flow_scores_and_submits() {
    let (address, sink) = spawn_app().await;
    let employee = unique_employee();
    let token = token_for(employee, 3, 9);
    let candidate = TestCandidate::create(&address, &token).await;

    candidate.start_exam().await;

    let view = candidate.view().await;
    assert_eq!(view["phase"], "in_progress");
    assert_eq!(view["question"]["id"], 1);
    assert_eq!(view["total_questions"], 3);
    assert!(view["question"].get("correct").is_none());

    // Answer all three questions; the third deliberately wrong.
    for (selected, answered_id) in [("A", 1), ("B", 2), ("D", 3)] {
        let resp = candidate
            .post("/answer", Some(serde_json::json!({ "selected": selected })))
            .await;
        assert_eq!(resp.status().as_u16(), 200);
        let view: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(view["answers"][answered_id.to_string()], selected);
        if answered_id < 3 {
            assert_eq!(candidate.post("/next", None).await.status().as_u16(), 200);
        }
    }

    let resp = candidate.post("/submit", None).await;
    assert_eq!(resp.status().as_u16(), 200);
    let view: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(view["phase"], "completed");
    assert_eq!(view["score_submission"], "delivered");
    assert_eq!(view["fullscreen_held"], false);
    assert_eq!(view["camera_active"], false);

    let submissions = sink.submissions.lock().unwrap();
    assert_eq!(submissions.len(), 1);
    let (who, event_id, groups) = &submissions[0];
    assert_eq!(who.employee_id, employee);
    assert_eq!(*event_id, Some(77));
    assert_eq!(
        *groups,
        vec![
            GroupScore {
                group_id: 10,
                total: 2,
                correct: 2
            },
            GroupScore {
                group_id: 20,
                total: 1,
                correct: 0
            },
        ]
    );
}

#[tokio::test]
async fn start_requires_camera_confirmation() {
    let (address, _sink) = spawn_app().await;
    let token = token_for(unique_employee(), 3, 9);
    let candidate = TestCandidate::create(&address, &token).await;

    assert_eq!(candidate.post("/proceed", None).await.status().as_u16(), 200);

    // No presence sample at all.
    let resp = candidate.post("/start", None).await;
    assert_eq!(resp.status().as_u16(), 409);

    // An absent face blocks the start as well.
    candidate
        .post(
            "/monitor/presence",
            Some(serde_json::json!({ "present": false })),
        )
        .await;
    let resp = candidate.post("/start", None).await;
    assert_eq!(resp.status().as_u16(), 409);

    // A detector failure reads the same as no face.
    candidate
        .post(
            "/monitor/presence",
            Some(serde_json::json!({ "error": "device-unavailable" })),
        )
        .await;
    let resp = candidate.post("/start", None).await;
    assert_eq!(resp.status().as_u16(), 409);
}

#[tokio::test]
async fn start_requires_fullscreen_confirmation() {
    let (address, _sink) = spawn_app().await;
    let token = token_for(unique_employee(), 3, 9);
    let candidate = TestCandidate::create(&address, &token).await;

    assert_eq!(candidate.post("/proceed", None).await.status().as_u16(), 200);
    candidate
        .post(
            "/monitor/presence",
            Some(serde_json::json!({ "present": true })),
        )
        .await;

    // Face confirmed but the client never entered fullscreen.
    let resp = candidate.post("/start", None).await;
    assert_eq!(resp.status().as_u16(), 409);

    // After the client confirms fullscreen the start goes through.
    candidate
        .post(
            "/monitor/fullscreen",
            Some(serde_json::json!({ "active": true })),
        )
        .await;
    let resp = candidate.post("/start", None).await;
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn next_without_answer_is_rejected() {
    let (address, _sink) = spawn_app().await;
    let token = token_for(unique_employee(), 3, 9);
    let candidate = TestCandidate::create(&address, &token).await;
    candidate.start_exam().await;

    let resp = candidate.post("/next", None).await;
    assert_eq!(resp.status().as_u16(), 400);

    // Backward navigation is always allowed.
    let resp = candidate.post("/previous", None).await;
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn backgrounding_terminates_the_session() {
    let (address, sink) = spawn_app().await;
    let token = token_for(unique_employee(), 3, 9);
    let candidate = TestCandidate::create(&address, &token).await;
    candidate.start_exam().await;

    let resp = candidate
        .post(
            "/monitor/visibility",
            Some(serde_json::json!({ "hidden": true })),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["terminated"], true);
    assert_eq!(body["reason"], "tab-or-window-switched");

    let view = candidate.view().await;
    assert_eq!(view["phase"], "terminated");
    assert_eq!(view["reason"], "tab-or-window-switched");
    assert_eq!(view["fullscreen_held"], false);
    assert_eq!(view["camera_active"], false);

    // No further mutation is accepted, and the reason never changes.
    let resp = candidate
        .post("/answer", Some(serde_json::json!({ "selected": "A" })))
        .await;
    assert_eq!(resp.status().as_u16(), 409);

    let resp = candidate
        .post(
            "/monitor/fullscreen",
            Some(serde_json::json!({ "active": false })),
        )
        .await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["terminated"], false);

    let view = candidate.view().await;
    assert_eq!(view["reason"], "tab-or-window-switched");

    // Terminated sessions never reach the results sink.
    assert_eq!(sink.submissions.lock().unwrap().len(), 0);
}

#[tokio::test]
async fn fullscreen_exit_terminates_the_session() {
    let (address, _sink) = spawn_app().await;
    let token = token_for(unique_employee(), 3, 9);
    let candidate = TestCandidate::create(&address, &token).await;
    candidate.start_exam().await;

    let resp = candidate
        .post(
            "/monitor/fullscreen",
            Some(serde_json::json!({ "active": false })),
        )
        .await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["terminated"], true);
    assert_eq!(body["reason"], "fullscreen-exited");
}

#[tokio::test]
async fn recorded_attempt_blocks_a_new_session() {
    let (address, sink) = spawn_app().await;
    sink.existing.store(true, Ordering::SeqCst);

    let client = reqwest::Client::new();
    let token = token_for(unique_employee(), 3, 9);
    let response = client
        .post(format!("{}/api/sessions", address))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn duplicate_open_session_is_refused() {
    let (address, _sink) = spawn_app().await;
    let token = token_for(unique_employee(), 3, 9);
    let _candidate = TestCandidate::create(&address, &token).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/sessions", address))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn foreign_session_is_forbidden() {
    let (address, _sink) = spawn_app().await;
    let token = token_for(unique_employee(), 3, 9);
    let candidate = TestCandidate::create(&address, &token).await;

    let intruder_token = token_for(unique_employee(), 3, 9);
    let client = reqwest::Client::new();
    let response = client
        .get(format!(
            "{}/api/sessions/{}",
            address, candidate.session_id
        ))
        .bearer_auth(intruder_token)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn cancel_allowed_before_start_refused_while_running() {
    let (address, _sink) = spawn_app().await;
    let token = token_for(unique_employee(), 3, 9);
    let candidate = TestCandidate::create(&address, &token).await;

    // Discard at the instructions screen, then open a fresh attempt.
    let resp = candidate
        .client
        .delete(format!(
            "{}/api/sessions/{}",
            address, candidate.session_id
        ))
        .bearer_auth(&candidate.token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(resp.status().as_u16(), 200);

    let candidate = TestCandidate::create(&address, &token).await;
    candidate.start_exam().await;

    // No candidate-initiated cancellation once the exam runs.
    let resp = candidate
        .client
        .delete(format!(
            "{}/api/sessions/{}",
            address, candidate.session_id
        ))
        .bearer_auth(&candidate.token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(resp.status().as_u16(), 409);
}

#[tokio::test]
async fn submit_requires_the_last_question() {
    let (address, _sink) = spawn_app().await;
    let token = token_for(unique_employee(), 3, 9);
    let candidate = TestCandidate::create(&address, &token).await;
    candidate.start_exam().await;

    candidate
        .post("/answer", Some(serde_json::json!({ "selected": "A" })))
        .await;
    let resp = candidate.post("/submit", None).await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn malformed_answer_payloads_are_rejected() {
    let (address, _sink) = spawn_app().await;
    let token = token_for(unique_employee(), 3, 9);
    let candidate = TestCandidate::create(&address, &token).await;
    candidate.start_exam().await;

    let resp = candidate
        .post("/answer", Some(serde_json::json!({ "selected": "E" })))
        .await;
    assert_eq!(resp.status().as_u16(), 400);

    let resp = candidate
        .post(
            "/monitor/presence",
            Some(serde_json::json!({ "present": true, "error": "detection-failed" })),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 400);
}
