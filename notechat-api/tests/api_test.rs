use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::{TestResponse, TestServer};
use notechat_api::app::{AppState, build_router};
use notechat_api::core::config::Settings;
use notechat_api::core::storage::Stores;
use notechat_sdk::Role;
use notechat_sdk::mock::{InMemoryMemoryStore, MockCompletionBackend};
use serde_json::{Value, json};
use std::sync::Arc;

struct TestApp {
    server: TestServer,
    state: AppState,
    completions: Arc<MockCompletionBackend>,
    memory: Arc<InMemoryMemoryStore>,
}

impl TestApp {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(dir.path(), "test").unwrap();

        let completions = Arc::new(MockCompletionBackend::new("Here is my answer."));
        let memory = Arc::new(InMemoryMemoryStore::new());
        let state = AppState::with_collaborators(
            settings,
            Stores::in_memory(),
            completions.clone(),
            memory.clone(),
        )
        .unwrap();

        let server = TestServer::new(build_router(state.clone())).unwrap();
        Self {
            server,
            state,
            completions,
            memory,
        }
    }

    fn bearer(&self, subject: &str) -> HeaderValue {
        let token = self.state.auth.generate_token(subject, 1).unwrap();
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
    }

    async fn get(&self, subject: &str, path: &str) -> TestResponse {
        self.server
            .get(path)
            .add_header(header::AUTHORIZATION, self.bearer(subject))
            .await
    }

    async fn delete(&self, subject: &str, path: &str) -> TestResponse {
        self.server
            .delete(path)
            .add_header(header::AUTHORIZATION, self.bearer(subject))
            .await
    }

    async fn post(&self, subject: &str, path: &str, body: Value) -> TestResponse {
        self.server
            .post(path)
            .add_header(header::AUTHORIZATION, self.bearer(subject))
            .json(&body)
            .await
    }

    async fn put(&self, subject: &str, path: &str, body: Value) -> TestResponse {
        self.server
            .put(path)
            .add_header(header::AUTHORIZATION, self.bearer(subject))
            .json(&body)
            .await
    }

    /// Profile with an OpenAI key only
    async fn onboard(&self, subject: &str) {
        self.post(subject, "/api/v1/user/profile", json!({ "email": "a@b.c" }))
            .await
            .assert_status(StatusCode::CREATED);
        self.put(subject, "/api/v1/user/api-keys", json!({ "openaiKey": "sk-test" }))
            .await
            .assert_status_ok();
    }

    async fn create_note(&self, subject: &str, title: &str, content: &str) -> String {
        let response = self
            .post(
                subject,
                "/api/v1/notes",
                json!({ "title": title, "content": content }),
            )
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["noteId"]
            .as_str()
            .unwrap()
            .to_string()
    }
}

fn error_code(response: &TestResponse) -> Value {
    response.json::<Value>()["error"]["code"].clone()
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;

    let response = app.server.get("/api/v1/public/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "ok");

    let models = app.server.get("/api/v1/models").await.json::<Value>();
    assert_eq!(models["data"][0]["provider"], "openai");
    assert_eq!(models["data"][1]["defaultModel"], "gemini-1.5-flash");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = TestApp::new().await;

    let response = app.server.get("/api/v1/notes").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.json::<Value>()["error"]["type"],
        "authentication_error"
    );

    let response = app
        .server
        .get("/api/v1/notes")
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer garbage"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_request_id_propagated() {
    let app = TestApp::new().await;
    let x_request_id = HeaderName::from_static("x-request-id");

    let response = app
        .server
        .get("/api/v1/public/health")
        .add_header(x_request_id.clone(), HeaderValue::from_static("req-42"))
        .await;
    assert_eq!(response.header(x_request_id.clone()), "req-42");

    let response = app.server.get("/api/v1/public/health").await;
    assert!(!response.header(x_request_id).is_empty());
}

#[tokio::test]
async fn test_unsupported_provider_rejected_before_any_work() {
    let app = TestApp::new().await;

    let response = app
        .post(
            "user_new",
            "/api/v1/chat",
            json!({ "message": "Hello", "model": "claude" }),
        )
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response), "unsupported_provider");
    assert_eq!(app.completions.call_count(), 0);
    assert!(app.memory.adds().is_empty());
    assert!(
        app.state
            .users
            .find_by_subject("user_new")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_chat_requires_profile() {
    let app = TestApp::new().await;

    let response = app
        .post(
            "user_abc",
            "/api/v1/chat",
            json!({ "message": "Hello", "model": "openai" }),
        )
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_key_persists_nothing() {
    let app = TestApp::new().await;
    app.onboard("user_abc").await;

    let response = app
        .post(
            "user_abc",
            "/api/v1/chat",
            json!({ "message": "Hello", "model": "gemini", "sessionId": "s-1" }),
        )
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response), "missing_api_key");
    assert_eq!(
        response.json::<Value>()["error"]["message"],
        "No gemini API key found. Please add your API key in profile settings."
    );
    assert_eq!(app.completions.call_count(), 0);
    assert!(app.state.chats.find_session("s-1").await.unwrap().is_none());
    assert!(
        app.state
            .chats
            .messages("s-1", "user_abc")
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_two_turns_in_one_session() {
    let app = TestApp::new().await;
    app.onboard("user_abc").await;

    let first = app
        .post(
            "user_abc",
            "/api/v1/chat",
            json!({ "message": "What is Rust?", "model": "openai" }),
        )
        .await;
    first.assert_status_ok();
    let body = first.json::<Value>();
    assert_eq!(body["message"], "Chat response generated successfully");
    assert_eq!(body["data"]["role"], "assistant");
    assert_eq!(body["data"]["model"], "openai");
    assert_eq!(body["data"]["modelId"], "gpt-4o-mini");
    let session_id = body["data"]["sessionId"].as_str().unwrap().to_string();

    app.post(
        "user_abc",
        "/api/v1/chat",
        json!({
            "message": "And ownership?",
            "model": "openai",
            "modelId": "gpt-4o",
            "sessionId": session_id,
        }),
    )
    .await
    .assert_status_ok();

    let sessions = app.get("user_abc", "/api/v1/chat/sessions").await.json::<Value>();
    assert_eq!(sessions["count"], 1);
    assert_eq!(sessions["sessions"][0]["messageCount"], 2);
    assert_eq!(sessions["sessions"][0]["title"], "What is Rust?");

    let history = app
        .get("user_abc", &format!("/api/v1/chat/sessions/{session_id}"))
        .await
        .json::<Value>();
    assert_eq!(history["count"], 4);
    assert_eq!(history["messages"][0]["role"], "user");
    assert_eq!(history["messages"][3]["role"], "assistant");
    assert_eq!(history["messages"][3]["model"], "gpt-4o");

    assert!(app.memory.wait_for_adds(4).await);
    let roles: Vec<Role> = app.memory.adds().iter().map(|a| a.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
    );
}

#[tokio::test]
async fn test_long_first_message_truncates_title() {
    let app = TestApp::new().await;
    app.onboard("user_abc").await;

    let message = "a".repeat(60);
    app.post(
        "user_abc",
        "/api/v1/chat",
        json!({ "message": message, "model": "openai" }),
    )
    .await
    .assert_status_ok();

    let sessions = app.get("user_abc", "/api/v1/chat/sessions").await.json::<Value>();
    let title = sessions["sessions"][0]["title"].as_str().unwrap();
    assert_eq!(title, format!("{}...", "a".repeat(47)));
}

#[tokio::test]
async fn test_memory_search_failure_does_not_fail_turn() {
    let app = TestApp::new().await;
    app.onboard("user_abc").await;
    app.memory.set_fail_search(true);

    let response = app
        .post(
            "user_abc",
            "/api/v1/chat",
            json!({ "message": "Hello", "model": "openai" }),
        )
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["message"], "Here is my answer.");
    assert_eq!(app.completions.requests()[0].context, "");
}

#[tokio::test]
async fn test_provider_failure_is_opaque() {
    let app = TestApp::new().await;
    app.onboard("user_abc").await;
    app.completions.set_failing(true);

    let response = app
        .post(
            "user_abc",
            "/api/v1/chat",
            json!({ "message": "Hello", "model": "openai", "sessionId": "s-1" }),
        )
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let error = &response.json::<Value>()["error"];
    assert_eq!(error["type"], "ai_service_error");
    assert_eq!(error["message"], "AI service failed");

    let messages = app.state.chats.messages("s-1", "user_abc").await.unwrap();
    assert_eq!(messages.len(), 1);
}

#[tokio::test]
async fn test_session_delete_is_scoped_and_cascades() {
    let app = TestApp::new().await;
    app.onboard("user_abc").await;
    app.onboard("user_xyz").await;

    app.post(
        "user_abc",
        "/api/v1/chat",
        json!({ "message": "Hello", "model": "openai", "sessionId": "s-1" }),
    )
    .await
    .assert_status_ok();

    app.delete("user_xyz", "/api/v1/chat/sessions/s-1")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    let history = app.get("user_abc", "/api/v1/chat/sessions/s-1").await.json::<Value>();
    assert_eq!(history["count"], 2);

    let response = app.delete("user_abc", "/api/v1/chat/sessions/s-1").await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>()["message"],
        "Chat session deleted successfully"
    );

    let history = app.get("user_abc", "/api/v1/chat/sessions/s-1").await.json::<Value>();
    assert_eq!(history["count"], 0);
    let sessions = app.get("user_abc", "/api/v1/chat/sessions").await.json::<Value>();
    assert_eq!(sessions["count"], 0);
}

#[tokio::test]
async fn test_foreign_session_id_is_not_found() {
    let app = TestApp::new().await;
    app.onboard("user_abc").await;
    app.onboard("user_xyz").await;

    app.post(
        "user_abc",
        "/api/v1/chat",
        json!({ "message": "Hello", "model": "openai", "sessionId": "s-1" }),
    )
    .await
    .assert_status_ok();

    app.post(
        "user_xyz",
        "/api/v1/chat",
        json!({ "message": "Hijack", "model": "openai", "sessionId": "s-1" }),
    )
    .await
    .assert_status(StatusCode::NOT_FOUND);
    assert_eq!(app.completions.call_count(), 1);
}

#[tokio::test]
async fn test_profile_and_keys() {
    let app = TestApp::new().await;

    let profile = app.get("user_abc", "/api/v1/user/profile").await;
    profile.assert_status_ok();
    let user = &profile.json::<Value>()["user"];
    assert_eq!(user["authSubject"], "user_abc");
    assert_eq!(user["hasOpenaiKey"], false);

    app.post(
        "user_abc",
        "/api/v1/user/profile",
        json!({ "username": "abc" }),
    )
    .await
    .assert_status_ok();

    let response = app
        .put(
            "user_abc",
            "/api/v1/user/api-keys",
            json!({ "openaiKey": "sk-secret", "geminiKey": "" }),
        )
        .await;
    response.assert_status_ok();
    let status = &response.json::<Value>()["apiKeyStatus"];
    assert_eq!(status["hasOpenaiKey"], true);
    assert_eq!(status["hasGeminiKey"], false);

    let profile = app.get("user_abc", "/api/v1/user/profile").await;
    assert!(!profile.text().contains("sk-secret"));
    assert_eq!(profile.json::<Value>()["user"]["username"], "abc");

    let response = app.delete("user_abc", "/api/v1/user/api-keys/claude").await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = app.delete("user_abc", "/api/v1/user/api-keys/openai").await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>()["message"],
        "openai API key deleted successfully"
    );

    let profile = app.get("user_abc", "/api/v1/user/profile").await.json::<Value>();
    assert_eq!(profile["user"]["hasOpenaiKey"], false);
}

#[tokio::test]
async fn test_api_keys_require_profile() {
    let app = TestApp::new().await;

    app.put(
        "user_abc",
        "/api/v1/user/api-keys",
        json!({ "openaiKey": "sk-test" }),
    )
    .await
    .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_note_lifecycle() {
    let app = TestApp::new().await;
    app.onboard("user_abc").await;

    app.post("user_abc", "/api/v1/notes", json!({ "title": "Only title" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let first = app.create_note("user_abc", "First", "one").await;
    let second = app.create_note("user_abc", "Second", "two").await;

    let notes = app.get("user_abc", "/api/v1/notes").await.json::<Value>();
    assert_eq!(notes["count"], 2);
    assert_eq!(notes["notes"][0]["title"], "First");

    let updated = app
        .put(
            "user_abc",
            &format!("/api/v1/notes/{first}"),
            json!({ "content": "uno", "title": "" }),
        )
        .await
        .json::<Value>();
    assert_eq!(updated["note"]["title"], "First");
    assert_eq!(updated["note"]["content"], "uno");

    app.get("user_xyz", &format!("/api/v1/notes/{first}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.get("user_abc", "/api/v1/notes/not-a-uuid")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.delete("user_abc", &format!("/api/v1/notes/{second}"))
        .await
        .assert_status_ok();

    let with_notes = app.get("user_abc", "/api/v1/user/with-notes").await.json::<Value>();
    let user = &with_notes["user"];
    assert_eq!(user["notes"].as_array().unwrap().len(), 1);
    assert_eq!(user["noteIds"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_apply_suggestion() {
    let app = TestApp::new().await;
    app.onboard("user_abc").await;
    app.onboard("user_xyz").await;
    let note = app.create_note("user_abc", "Plan", "draft").await;
    let path = format!("/api/v1/notes/{note}/apply-suggestion");

    let response = app
        .post("user_abc", &path, json!({ "newTitle": "", "newContent": "" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"]["message"],
        "At least one field (newTitle or newContent) must be provided"
    );

    app.post("user_xyz", &path, json!({ "newContent": "mine" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let response = app
        .post("user_abc", &path, json!({ "newContent": "final" }))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["title"], "Plan");
    assert_eq!(body["content"], "final");
}

#[tokio::test]
async fn test_note_chat() {
    let app = TestApp::new().await;
    app.onboard("user_abc").await;
    let note = app.create_note("user_abc", "Groceries", "- milk").await;

    app.completions.push_reply("- milk\n- eggs");
    let response = app
        .post(
            "user_abc",
            &format!("/api/v1/notes/{note}/chat"),
            json!({ "message": "Add eggs", "provider": "openai", "model": "gpt-4o" }),
        )
        .await;

    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["message"], "- milk\n- eggs");
    assert_eq!(body["suggestion"], "- milk\n- eggs");
    assert_eq!(body["model"], "openai");
    assert_eq!(body["modelId"], "gpt-4o");
    assert_eq!(body["noteContext"], "Groceries: - milk");

    let request = &app.completions.requests()[0];
    assert!(request.prompt.contains("User's request: Add eggs"));

    assert!(app.memory.wait_for_adds(2).await);
    let adds = app.memory.adds();
    assert_eq!(adds[0].session_id, format!("note-{note}"));
    assert_eq!(adds[0].content, "Add eggs");
}

#[tokio::test]
async fn test_update_note_with_chat() {
    let app = TestApp::new().await;
    app.onboard("user_abc").await;
    let note = app.create_note("user_abc", "Trip", "- flights booked").await;

    app.completions.push_reply("The hotel is in Lisbon.");
    app.post(
        "user_abc",
        "/api/v1/chat",
        json!({ "message": "Where is the hotel?", "model": "openai", "sessionId": "s-trip" }),
    )
    .await
    .assert_status_ok();
    assert!(app.memory.wait_for_adds(2).await);

    app.completions.push_reply("- flights booked\n- hotel in Lisbon");
    let response = app
        .post(
            "user_abc",
            "/api/v1/chat/update-note",
            json!({
                "noteId": note,
                "sessionId": "s-trip",
                "model": "openai",
                "prompt": "Keep bullets",
            }),
        )
        .await;

    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["message"], "Note updated successfully with AI assistance");
    assert_eq!(body["note"]["content"], "- flights booked\n- hotel in Lisbon");
    assert_eq!(body["note"]["title"], "Trip");

    let request = &app.completions.requests()[1];
    assert!(request.prompt.starts_with("Keep bullets\n\n"));
    assert!(request.prompt.contains("The hotel is in Lisbon."));
    assert_eq!(request.context, "");
}

#[tokio::test]
async fn test_update_note_history_failure() {
    let app = TestApp::new().await;
    app.onboard("user_abc").await;
    let note = app.create_note("user_abc", "Trip", "draft").await;
    app.memory.set_fail_history(true);

    let response = app
        .post(
            "user_abc",
            "/api/v1/chat/update-note",
            json!({ "noteId": note, "sessionId": "s-trip", "model": "openai" }),
        )
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    assert_eq!(
        response.json::<Value>()["error"]["type"],
        "memory_service_error"
    );
    assert_eq!(app.completions.call_count(), 0);

    let stored = app.get("user_abc", &format!("/api/v1/notes/{note}")).await.json::<Value>();
    assert_eq!(stored["note"]["content"], "draft");
}
