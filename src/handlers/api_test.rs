#[cfg(test)]
mod api_tests {
    use std::sync::Arc;

    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use axum_test::{TestServer, TestServerConfig};
    use chrono::FixedOffset;
    use serde_json::{json, Value};
    use tempfile::{tempdir, TempDir};

    use crate::auth::SessionAuth;
    use crate::client::IdentityClient;
    use crate::handlers::api::AppState;
    use crate::models::meeting::{MeetingFilter, MeetingStatus};
    use crate::models::profile::Role;
    use crate::routes::create_router;
    use crate::services::database::DatabaseService;

    const SECRET: &str = "test-secret";

    // Helper function to set up a test server over a temporary database.
    // The TempDir must stay alive for the duration of the test.
    fn setup_test_server() -> (TestServer, Arc<DatabaseService>, TempDir) {
        let dir = tempdir().unwrap();
        let database = Arc::new(DatabaseService::new(dir.path()));

        let app_state = Arc::new(AppState {
            database: Arc::clone(&database),
            identity: IdentityClient::with_config("http://localhost:0", "test-key", SECRET),
            booking_offset: FixedOffset::east_opt(0).unwrap(),
            approval_recheck: false,
        });

        let router = create_router(app_state, false);

        let config = TestServerConfig::builder().mock_transport().build();
        let server = TestServer::new_with_config(router, config).unwrap();

        (server, database, dir)
    }

    fn auth_header(user_id: &str) -> (HeaderName, HeaderValue) {
        let token = SessionAuth::issue_token(user_id, 3600, SECRET);
        (
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        )
    }

    fn seed_admin(database: &DatabaseService) {
        database
            .insert_profile("admin-1", "coach@gym.test", "Coach", Role::Admin)
            .unwrap();
    }

    fn seed_client(database: &DatabaseService) {
        database
            .insert_profile("client-1", "alice@gym.test", "Alice", Role::Client)
            .unwrap();
    }

    #[tokio::test]
    async fn test_health_check() {
        let (server, _database, _dir) = setup_test_server();

        let response = server.get("/health").await;

        response.assert_status_ok();
        assert_eq!(response.text(), "OK");
    }

    #[tokio::test]
    async fn test_request_meeting_requires_authentication() {
        let (server, _database, _dir) = setup_test_server();

        let response = server
            .post("/meetings")
            .json(&json!({ "requested_time": "2030-01-01T10:00:00Z" }))
            .await;

        let body: Value = response.json();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Not authenticated.");
    }

    #[tokio::test]
    async fn test_request_meeting_stores_pending_record() {
        let (server, database, _dir) = setup_test_server();
        seed_client(&database);

        let (name, value) = auth_header("client-1");
        let response = server
            .post("/meetings")
            .add_header(name, value)
            .json(&json!({ "requested_time": "2030-01-01T10:00:00Z" }))
            .await;

        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Meeting requested successfully!");
        assert_eq!(body["refresh"][0], "/dashboard/client");

        let meetings = database.list_meetings(&MeetingFilter::default()).unwrap();
        assert_eq!(meetings.len(), 1);
        assert_eq!(meetings[0].status, MeetingStatus::Pending);
        assert_eq!(meetings[0].client_id, "client-1");
    }

    #[tokio::test]
    async fn test_request_meeting_rejects_off_hours() {
        let (server, database, _dir) = setup_test_server();
        seed_client(&database);

        let (name, value) = auth_header("client-1");
        let response = server
            .post("/meetings")
            .add_header(name, value)
            .json(&json!({ "requested_time": "2030-01-01T03:00:00Z" }))
            .await;

        let body: Value = response.json();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Booking is unavailable between 12 AM and 6 AM.");
        assert!(database
            .list_meetings(&MeetingFilter::default())
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_request_meeting_rejects_past_and_missing_times() {
        let (server, database, _dir) = setup_test_server();
        seed_client(&database);

        let (name, value) = auth_header("client-1");
        let response = server
            .post("/meetings")
            .add_header(name, value)
            .json(&json!({ "requested_time": "2020-01-01T10:00:00Z" }))
            .await;
        let body: Value = response.json();
        assert_eq!(body["message"], "Cannot schedule a meeting in the past.");

        let (name, value) = auth_header("client-1");
        let response = server
            .post("/meetings")
            .add_header(name, value)
            .json(&json!({}))
            .await;
        let body: Value = response.json();
        assert_eq!(body["message"], "Please select a date and time.");
    }

    #[tokio::test]
    async fn test_request_meeting_enforces_buffer_against_confirmed() {
        let (server, database, _dir) = setup_test_server();
        seed_client(&database);

        let confirmed = database
            .insert_meeting(
                "client-2",
                "2030-01-01T10:00:00Z".parse().unwrap(),
            )
            .unwrap();
        database
            .update_meeting_status(&confirmed.id, MeetingStatus::Confirmed)
            .unwrap();

        // Inside the 30-minute window
        let (name, value) = auth_header("client-1");
        let response = server
            .post("/meetings")
            .add_header(name, value)
            .json(&json!({ "requested_time": "2030-01-01T10:15:00Z" }))
            .await;
        let body: Value = response.json();
        assert_eq!(body["success"], false);
        assert_eq!(
            body["message"],
            "This time slot is too close to another confirmed meeting. Please choose a later time."
        );

        // Exactly at the window's end
        let (name, value) = auth_header("client-1");
        let response = server
            .post("/meetings")
            .add_header(name, value)
            .json(&json!({ "requested_time": "2030-01-01T10:30:00Z" }))
            .await;
        let body: Value = response.json();
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_pending_meetings_do_not_block_requests() {
        let (server, database, _dir) = setup_test_server();
        seed_client(&database);

        database
            .insert_meeting(
                "client-2",
                "2030-01-01T10:00:00Z".parse().unwrap(),
            )
            .unwrap();

        let (name, value) = auth_header("client-1");
        let response = server
            .post("/meetings")
            .add_header(name, value)
            .json(&json!({ "requested_time": "2030-01-01T10:15:00Z" }))
            .await;

        let body: Value = response.json();
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_request_meeting_reports_unreadable_schedule() {
        let (server, database, dir) = setup_test_server();
        seed_client(&database);

        // Make the meetings table unreadable
        std::fs::remove_file(dir.path().join("meetings.csv")).unwrap();
        std::fs::create_dir(dir.path().join("meetings.csv")).unwrap();

        let (name, value) = auth_header("client-1");
        let response = server
            .post("/meetings")
            .add_header(name, value)
            .json(&json!({ "requested_time": "2030-01-01T10:00:00Z" }))
            .await;

        let body: Value = response.json();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Could not verify schedule. Please try again.");
    }

    #[tokio::test]
    async fn test_approve_and_deny_transitions() {
        let (server, database, _dir) = setup_test_server();
        seed_admin(&database);

        let first = database
            .insert_meeting("client-1", "2030-01-01T10:00:00Z".parse().unwrap())
            .unwrap();
        let second = database
            .insert_meeting("client-1", "2030-01-02T10:00:00Z".parse().unwrap())
            .unwrap();

        let (name, value) = auth_header("admin-1");
        let response = server
            .post("/meetings/approve")
            .add_header(name, value)
            .json(&json!({ "meeting_id": first.id }))
            .await;
        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["refresh"][0], "/admin/meetings");
        assert_eq!(body["refresh"][1], "/dashboard/client");

        let (name, value) = auth_header("admin-1");
        server
            .post("/meetings/deny")
            .add_header(name, value)
            .json(&json!({ "meeting_id": second.id }))
            .await;

        let stored_first = database.find_meeting(&first.id).unwrap().unwrap();
        let stored_second = database.find_meeting(&second.id).unwrap().unwrap();
        assert_eq!(stored_first.status, MeetingStatus::Confirmed);
        assert!(stored_first.decided_at.is_some());
        assert_eq!(stored_second.status, MeetingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_decision_with_empty_id_is_a_noop() {
        let (server, database, _dir) = setup_test_server();
        seed_admin(&database);

        let (name, value) = auth_header("admin-1");
        let response = server
            .post("/meetings/approve")
            .add_header(name, value)
            .json(&json!({}))
            .await;

        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "");
        assert!(database
            .list_meetings(&MeetingFilter::default())
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_decision_requires_admin_role() {
        let (server, database, _dir) = setup_test_server();
        seed_client(&database);

        let (name, value) = auth_header("client-1");
        let response = server
            .post("/meetings/approve")
            .add_header(name, value)
            .json(&json!({ "meeting_id": "anything" }))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_list_meetings_by_role() {
        let (server, database, _dir) = setup_test_server();
        seed_admin(&database);
        seed_client(&database);
        database
            .insert_profile("client-2", "bob@gym.test", "Bob", Role::Client)
            .unwrap();

        database
            .insert_meeting("client-1", "2030-01-01T10:00:00Z".parse().unwrap())
            .unwrap();
        database
            .insert_meeting("client-2", "2030-01-02T10:00:00Z".parse().unwrap())
            .unwrap();

        // The admin sees every meeting with the client's name attached
        let (name, value) = auth_header("admin-1");
        let response = server.get("/meetings").add_header(name, value).await;
        let body: Value = response.json();
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[0]["client_name"], "Alice");

        // A client sees only their own, newest first
        let (name, value) = auth_header("client-1");
        let response = server.get("/meetings").add_header(name, value).await;
        let body: Value = response.json();
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["client_id"], "client-1");
        assert!(body[0]["client_name"].is_null());
    }

    #[tokio::test]
    async fn test_sign_in_requires_credentials() {
        let (server, _database, _dir) = setup_test_server();

        let response = server
            .post("/auth/sign-in")
            .json(&json!({ "email": "", "password": "" }))
            .await;

        let body: Value = response.json();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Email and password are required.");
    }

    #[tokio::test]
    async fn test_workout_plan_create_and_fetch() {
        let (server, database, _dir) = setup_test_server();
        seed_admin(&database);

        let (name, value) = auth_header("admin-1");
        let response = server
            .post("/workout-plans")
            .add_header(name, value)
            .json(&json!({
                "client_id": "client-1",
                "plan_title": "Strength Block",
                "days": [{
                    "day_title": "Day 1",
                    "exercises": [{ "name": "Squat", "sets": "5", "reps": "5" }]
                }]
            }))
            .await;
        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Workout plan created successfully!");

        let (name, value) = auth_header("admin-1");
        let response = server
            .get("/clients/client-1/workout-plan")
            .add_header(name, value)
            .await;
        let body: Value = response.json();
        assert_eq!(body["title"], "Strength Block");
        assert_eq!(body["content"]["days"][0]["exercises"][0]["name"], "Squat");

        // A client with no plan yields null
        let (name, value) = auth_header("admin-1");
        let response = server
            .get("/clients/client-9/workout-plan")
            .add_header(name, value)
            .await;
        let body: Value = response.json();
        assert!(body.is_null());
    }

    #[tokio::test]
    async fn test_workout_plan_requires_fields() {
        let (server, database, _dir) = setup_test_server();
        seed_admin(&database);

        let (name, value) = auth_header("admin-1");
        let response = server
            .post("/workout-plans")
            .add_header(name, value)
            .json(&json!({ "client_id": "client-1", "plan_title": "", "days": [] }))
            .await;

        let body: Value = response.json();
        assert_eq!(body["success"], false);
        assert_eq!(
            body["message"],
            "Client, title, and at least one day are required."
        );
    }

    #[tokio::test]
    async fn test_send_message_routing() {
        let (server, database, _dir) = setup_test_server();
        seed_admin(&database);
        seed_client(&database);

        // A client's message lands with the admin
        let (name, value) = auth_header("client-1");
        let response = server
            .post("/messages")
            .add_header(name, value)
            .json(&json!({ "content": "When is my next session?" }))
            .await;
        let body: Value = response.json();
        assert_eq!(body["success"], true);

        let thread = database.list_thread("admin-1", "client-1").unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].receiver_id, "admin-1");

        // The admin must name a receiver
        let (name, value) = auth_header("admin-1");
        let response = server
            .post("/messages")
            .add_header(name, value)
            .json(&json!({ "content": "Tomorrow at ten." }))
            .await;
        let body: Value = response.json();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "A receiver is required.");

        // Whitespace-only content is refused
        let (name, value) = auth_header("client-1");
        let response = server
            .post("/messages")
            .add_header(name, value)
            .json(&json!({ "content": "   " }))
            .await;
        let body: Value = response.json();
        assert_eq!(body["message"], "Message cannot be empty.");
    }

    #[tokio::test]
    async fn test_list_messages_thread_for_admin() {
        let (server, database, _dir) = setup_test_server();
        seed_admin(&database);
        seed_client(&database);

        database
            .insert_message("client-1", "admin-1", "Hello")
            .unwrap();
        database
            .insert_message("admin-1", "client-1", "Hi Alice")
            .unwrap();

        let (name, value) = auth_header("admin-1");
        let response = server
            .get("/messages")
            .add_query_param("client_id", "client-1")
            .add_header(name, value)
            .await;
        let body: Value = response.json();
        assert_eq!(body.as_array().unwrap().len(), 2);

        // The admin view requires a client id
        let (name, value) = auth_header("admin-1");
        let response = server.get("/messages").add_header(name, value).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_clients_summary() {
        let (server, database, _dir) = setup_test_server();
        seed_admin(&database);
        seed_client(&database);
        database
            .insert_profile("client-2", "bob@gym.test", "Bob", Role::Client)
            .unwrap();

        let meeting = database
            .insert_meeting("client-1", "2030-01-01T10:00:00Z".parse().unwrap())
            .unwrap();
        database
            .update_meeting_status(&meeting.id, MeetingStatus::Confirmed)
            .unwrap();

        database
            .store_workout_plan(
                "client-2",
                "Base",
                &crate::models::workout::PlanContent { days: vec![] },
            )
            .unwrap();

        let (name, value) = auth_header("admin-1");
        let response = server.get("/clients").add_header(name, value).await;
        let body: Value = response.json();

        let clients = body.as_array().unwrap();
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0]["full_name"], "Alice");
        assert_eq!(clients[0]["workout_assigned"], false);
        assert_eq!(clients[0]["next_meeting"], "2030-01-01T10:00:00Z");
        assert_eq!(clients[1]["full_name"], "Bob");
        assert_eq!(clients[1]["workout_assigned"], true);
        assert!(clients[1]["next_meeting"].is_null());
    }

    #[tokio::test]
    async fn test_debug_session_mints_usable_token() {
        let (server, database, _dir) = setup_test_server();
        seed_client(&database);

        let response = server
            .post("/debug/session")
            .json(&json!({ "user_id": "client-1" }))
            .await;
        let body: Value = response.json();
        let token = body["session_token"].as_str().unwrap().to_string();

        let response = server
            .get("/meetings")
            .add_header(
                HeaderName::from_static("authorization"),
                HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
            )
            .await;
        response.assert_status_ok();
    }
}
