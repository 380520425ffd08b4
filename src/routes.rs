use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::info;

use crate::handlers::api::{
    approve_meeting, client_dashboard, create_workout_plan, deny_meeting, get_workout_plan,
    list_clients, list_meetings, list_messages, request_meeting, send_message, sign_in, AppState,
};
use crate::handlers::test::{debug_session, health_check};

pub fn create_router(app_state: Arc<AppState>, is_production: bool) -> Router {
    let mut router = Router::new();

    // Health check is always available
    let health_route = Router::new().route("/health", get(health_check));
    router = router.merge(health_route);

    // Core application routes
    let api_routes = Router::new()
        .route("/auth/sign-in", post(sign_in))
        .route("/meetings", post(request_meeting).get(list_meetings))
        .route("/meetings/approve", post(approve_meeting))
        .route("/meetings/deny", post(deny_meeting))
        .route("/dashboard/client", get(client_dashboard))
        .route("/workout-plans", post(create_workout_plan))
        .route("/clients", get(list_clients))
        .route("/clients/:client_id/workout-plan", get(get_workout_plan))
        .route("/messages", post(send_message).get(list_messages));

    router = router.merge(api_routes);

    // Only add the debug session endpoint if not in production mode
    if !is_production {
        let debug_routes = Router::new().route("/debug/session", post(debug_session));
        router = router.merge(debug_routes);

        info!("Debug session endpoint enabled - server running in development mode");
    } else {
        info!("Running in production mode - debug endpoints disabled");
    }

    router.with_state(app_state)
}
