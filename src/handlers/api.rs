use axum::{
    extract::{Json as ExtractJson, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Json,
};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::client::{IdentityClient, IdentityError};
use crate::models::common::ActionResponse;
use crate::models::meeting::{
    MeetingDecision, MeetingFilter, MeetingRequest, MeetingStatus, MeetingView,
};
use crate::models::message::{MessageRecord, MessageThreadParams, SendMessageRequest};
use crate::models::profile::{ClientSummary, ProfileRecord, Role, SignInRequest, SignInResponse};
use crate::models::workout::{CreatePlanRequest, PlanContent, WorkoutPlanView};
use crate::services::database::DatabaseService;
use crate::services::scheduling::{buffer_conflict, validate_requested_time, RequestRejection};

// AppState struct containing shared resources
pub struct AppState {
    pub database: Arc<DatabaseService>,
    pub identity: IdentityClient,
    /// Booking timezone for the off-hours rule, explicit configuration
    /// rather than the host locale.
    pub booking_offset: FixedOffset,
    /// When set, approving a pending meeting re-runs the buffer check and
    /// refuses conflicting approvals instead of confirming unconditionally.
    pub approval_recheck: bool,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

// Resolve the calling user's profile from the bearer session token
fn current_user(state: &AppState, headers: &HeaderMap) -> Option<ProfileRecord> {
    let token = bearer_token(headers)?;

    let claims = match state.identity.verify_session(token) {
        Ok(claims) => claims,
        Err(err) => {
            warn!("Rejected session token: {}", err);
            return None;
        }
    };

    match state.database.find_profile(&claims.sub) {
        Ok(Some(profile)) => Some(profile),
        Ok(None) => {
            warn!("No profile found for user {}", claims.sub);
            None
        }
        Err(err) => {
            error!("Failed to load profile for {}: {}", claims.sub, err);
            None
        }
    }
}

// Sign-in endpoint: credentials go to the identity provider, the role-based
// redirect comes from the profile table
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    ExtractJson(request): ExtractJson<SignInRequest>,
) -> Json<SignInResponse> {
    let email = request.email.trim();
    if email.is_empty() || request.password.is_empty() {
        return Json(SignInResponse::failure("Email and password are required."));
    }

    let session = match state.identity.sign_in(email, &request.password).await {
        Ok(session) => session,
        Err(IdentityError::InvalidCredentials) => {
            info!("Rejected sign-in for {}: invalid credentials", email);
            return Json(SignInResponse::failure("Invalid email or password."));
        }
        Err(err) => {
            error!("Identity provider error during sign-in: {}", err);
            return Json(SignInResponse::failure(
                "Could not reach the identity service. Please try again.",
            ));
        }
    };

    let profile = match state.database.find_profile(&session.user_id) {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            warn!("Authenticated user {} has no profile", session.user_id);
            return Json(SignInResponse::failure("Could not find user profile."));
        }
        Err(err) => {
            error!("Failed to load profile for {}: {}", session.user_id, err);
            return Json(SignInResponse::failure("Could not find user profile."));
        }
    };

    let redirect_path = match profile.role {
        Role::Admin => "/admin/workouts",
        Role::Client => "/dashboard/client",
    };

    info!("User {} signed in as {}", profile.id, profile.role);

    Json(SignInResponse {
        success: true,
        message: "Signed in successfully.".to_string(),
        redirect_path: Some(redirect_path.to_string()),
        session_token: Some(state.identity.issue_session(&profile.id)),
    })
}

// Meeting request endpoint: validates the candidate slot and stores it as
// pending. The fetch-then-insert sequence takes no lock; two concurrent
// requests can both pass validation against the same confirmed set.
pub async fn request_meeting(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ExtractJson(request): ExtractJson<MeetingRequest>,
) -> Json<ActionResponse> {
    let user = match current_user(&state, &headers) {
        Some(user) => user,
        None => return Json(ActionResponse::failure("Not authenticated.")),
    };

    let candidate = match validate_requested_time(
        request.requested_time.as_deref(),
        Utc::now(),
        state.booking_offset,
    ) {
        Ok(candidate) => candidate,
        Err(rejection) => {
            info!(
                "Rejected meeting request from {}: {:?}",
                user.id, rejection
            );
            return Json(ActionResponse::failure(rejection.message()));
        }
    };

    let confirmed = match state.database.list_confirmed_times() {
        Ok(confirmed) => confirmed,
        Err(err) => {
            error!("Failed to fetch confirmed meetings: {}", err);
            return Json(ActionResponse::failure(
                RequestRejection::ScheduleUnavailable.message(),
            ));
        }
    };

    if buffer_conflict(candidate, &confirmed) {
        info!(
            "Meeting request from {} at {} collides with a confirmed slot",
            user.id, candidate
        );
        return Json(ActionResponse::failure(
            RequestRejection::BufferConflict.message(),
        ));
    }

    match state.database.insert_meeting(&user.id, candidate) {
        Ok(meeting) => {
            info!(
                "Meeting {} requested by {} for {}",
                meeting.id, user.id, meeting.requested_time
            );
            Json(ActionResponse::ok(
                "Meeting requested successfully!",
                &["/dashboard/client"],
            ))
        }
        Err(err) => {
            error!("Failed to store meeting request: {}", err);
            Json(ActionResponse::failure(
                "Database error: Could not request meeting.",
            ))
        }
    }
}

// List meetings endpoint: an administrator sees every meeting with the
// client's name, ordered by status then time; a client sees their own,
// newest first
pub async fn list_meetings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<MeetingView>>, StatusCode> {
    let user = current_user(&state, &headers).ok_or(StatusCode::UNAUTHORIZED)?;

    match user.role {
        Role::Admin => {
            let mut meetings = state
                .database
                .list_meetings(&MeetingFilter::default())
                .map_err(|err| {
                    error!("Failed to list meetings: {}", err);
                    StatusCode::INTERNAL_SERVER_ERROR
                })?;

            meetings.sort_by(|a, b| {
                a.status
                    .to_string()
                    .cmp(&b.status.to_string())
                    .then(a.requested_time.cmp(&b.requested_time))
            });

            let names: HashMap<String, String> = state
                .database
                .list_clients()
                .map_err(|err| {
                    error!("Failed to list clients: {}", err);
                    StatusCode::INTERNAL_SERVER_ERROR
                })?
                .into_iter()
                .map(|profile| (profile.id, profile.full_name))
                .collect();

            Ok(Json(
                meetings
                    .into_iter()
                    .map(|meeting| {
                        let name = names.get(&meeting.client_id).cloned();
                        MeetingView::from_record(meeting, name)
                    })
                    .collect(),
            ))
        }
        Role::Client => {
            let mut meetings = state
                .database
                .list_meetings(&MeetingFilter {
                    status: None,
                    client_id: Some(user.id.clone()),
                })
                .map_err(|err| {
                    error!("Failed to list meetings for {}: {}", user.id, err);
                    StatusCode::INTERNAL_SERVER_ERROR
                })?;

            meetings.sort_by(|a, b| b.requested_time.cmp(&a.requested_time));

            Ok(Json(
                meetings
                    .into_iter()
                    .map(|meeting| MeetingView::from_record(meeting, None))
                    .collect(),
            ))
        }
    }
}

async fn decide_meeting(
    state: Arc<AppState>,
    headers: HeaderMap,
    decision: MeetingDecision,
    status: MeetingStatus,
) -> Result<Json<ActionResponse>, StatusCode> {
    let user = current_user(&state, &headers).ok_or(StatusCode::UNAUTHORIZED)?;
    if user.role != Role::Admin {
        return Err(StatusCode::FORBIDDEN);
    }

    // An absent meeting id is a no-op, not an error
    if decision.meeting_id.is_empty() {
        return Ok(Json(ActionResponse::silent()));
    }

    if status == MeetingStatus::Confirmed && state.approval_recheck {
        // Opt-in policy: refuse approvals that would violate the buffer
        // invariant against the already-confirmed set. The default path
        // confirms unconditionally.
        match recheck_conflict(&state, &decision.meeting_id) {
            Ok(true) => {
                info!(
                    "Refused approval of meeting {}: conflicts with a confirmed slot",
                    decision.meeting_id
                );
                return Ok(Json(ActionResponse::failure(
                    "This time slot now conflicts with another confirmed meeting.",
                )));
            }
            Ok(false) => {}
            Err(err) => {
                // The re-check is a pre-filter, not the enforcement point;
                // a store failure here falls through to the update
                error!("Approval conflict re-check failed: {}", err);
            }
        }
    }

    match state
        .database
        .update_meeting_status(&decision.meeting_id, status)
    {
        Ok(true) => {
            info!("Meeting {} marked {}", decision.meeting_id, status);
            Ok(Json(ActionResponse::ok(
                "",
                &["/admin/meetings", "/dashboard/client"],
            )))
        }
        Ok(false) => Ok(Json(ActionResponse::silent())),
        Err(err) => {
            // Logged for operators, swallowed from the caller's view
            error!(
                "Failed to update status of meeting {}: {}",
                decision.meeting_id, err
            );
            Ok(Json(ActionResponse::silent()))
        }
    }
}

fn recheck_conflict(state: &AppState, meeting_id: &str) -> Result<bool, String> {
    let meeting = match state.database.find_meeting(meeting_id)? {
        Some(meeting) => meeting,
        None => return Ok(false),
    };
    let confirmed = state.database.list_confirmed_times()?;
    Ok(buffer_conflict(meeting.requested_time, &confirmed))
}

// Approve a pending meeting
pub async fn approve_meeting(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ExtractJson(decision): ExtractJson<MeetingDecision>,
) -> Result<Json<ActionResponse>, StatusCode> {
    decide_meeting(state, headers, decision, MeetingStatus::Confirmed).await
}

// Deny a pending meeting
pub async fn deny_meeting(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ExtractJson(decision): ExtractJson<MeetingDecision>,
) -> Result<Json<ActionResponse>, StatusCode> {
    decide_meeting(state, headers, decision, MeetingStatus::Cancelled).await
}

// Aggregated client dashboard payload
#[derive(Debug, Serialize)]
pub struct DashboardView {
    pub full_name: String,
    pub workout_plan: Option<WorkoutPlanView>,
    pub meetings: Vec<MeetingView>,
    /// Start times the booking form should treat as taken.
    pub confirmed_times: Vec<DateTime<Utc>>,
    pub messages: Vec<MessageRecord>,
    pub chat_available: bool,
}

fn flatten_read<T>(
    joined: Result<Result<T, String>, tokio::task::JoinError>,
) -> Result<T, StatusCode> {
    match joined {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            error!("Dashboard read failed: {}", err);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
        Err(err) => {
            error!("Dashboard read task failed: {}", err);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// Client dashboard endpoint: the independent reads fan out in parallel
pub async fn client_dashboard(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DashboardView>, StatusCode> {
    let user = current_user(&state, &headers).ok_or(StatusCode::UNAUTHORIZED)?;

    let meetings_task = tokio::task::spawn_blocking({
        let database = Arc::clone(&state.database);
        let client_id = user.id.clone();
        move || {
            database.list_meetings(&MeetingFilter {
                status: None,
                client_id: Some(client_id),
            })
        }
    });
    let plan_task = tokio::task::spawn_blocking({
        let database = Arc::clone(&state.database);
        let client_id = user.id.clone();
        move || database.latest_plan_for_client(&client_id)
    });
    let messages_task = tokio::task::spawn_blocking({
        let database = Arc::clone(&state.database);
        let user_id = user.id.clone();
        move || database.list_messages_for_user(&user_id)
    });
    let confirmed_task = tokio::task::spawn_blocking({
        let database = Arc::clone(&state.database);
        move || database.list_confirmed_times()
    });
    let admin_task = tokio::task::spawn_blocking({
        let database = Arc::clone(&state.database);
        move || database.find_admin()
    });

    let (meetings, plan, messages, confirmed_times, admin) = futures::join!(
        meetings_task,
        plan_task,
        messages_task,
        confirmed_task,
        admin_task
    );

    let mut meetings = flatten_read(meetings)?;
    let plan = flatten_read(plan)?;
    let messages = flatten_read(messages)?;
    let confirmed_times = flatten_read(confirmed_times)?;
    let admin = flatten_read(admin)?;

    meetings.sort_by(|a, b| b.requested_time.cmp(&a.requested_time));

    let workout_plan = plan.and_then(|record| match record.parse_content() {
        Ok(content) => Some(WorkoutPlanView {
            title: record.title.clone(),
            content,
        }),
        Err(err) => {
            warn!("Stored plan {} has invalid content: {}", record.id, err);
            None
        }
    });

    Ok(Json(DashboardView {
        full_name: user.full_name,
        workout_plan,
        meetings: meetings
            .into_iter()
            .map(|meeting| MeetingView::from_record(meeting, None))
            .collect(),
        confirmed_times,
        messages,
        chat_available: admin.is_some(),
    }))
}

// Create workout plan endpoint (administrator only)
pub async fn create_workout_plan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ExtractJson(request): ExtractJson<CreatePlanRequest>,
) -> Result<Json<ActionResponse>, StatusCode> {
    let user = current_user(&state, &headers).ok_or(StatusCode::UNAUTHORIZED)?;
    if user.role != Role::Admin {
        return Err(StatusCode::FORBIDDEN);
    }

    if request.client_id.is_empty()
        || request.plan_title.trim().is_empty()
        || request.days.is_empty()
    {
        return Ok(Json(ActionResponse::failure(
            "Client, title, and at least one day are required.",
        )));
    }

    let content = PlanContent {
        days: request.days,
    };

    match state
        .database
        .store_workout_plan(&request.client_id, request.plan_title.trim(), &content)
    {
        Ok(plan) => {
            info!(
                "Workout plan {} assigned to client {}",
                plan.id, plan.client_id
            );
            Ok(Json(ActionResponse::ok(
                "Workout plan created successfully!",
                &["/admin/workouts"],
            )))
        }
        Err(err) => {
            error!("Failed to store workout plan: {}", err);
            Ok(Json(ActionResponse::failure(
                "Database error: Could not create plan.",
            )))
        }
    }
}

// Fetch the latest workout plan for a client (administrator only); a client
// without a plan yields null rather than an error
pub async fn get_workout_plan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(client_id): Path<String>,
) -> Result<Json<Option<WorkoutPlanView>>, StatusCode> {
    let user = current_user(&state, &headers).ok_or(StatusCode::UNAUTHORIZED)?;
    if user.role != Role::Admin {
        return Err(StatusCode::FORBIDDEN);
    }

    let plan = state
        .database
        .latest_plan_for_client(&client_id)
        .map_err(|err| {
            error!("Failed to fetch workout plan for {}: {}", client_id, err);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(plan.and_then(|record| match record.parse_content() {
        Ok(content) => Some(WorkoutPlanView {
            title: record.title.clone(),
            content,
        }),
        Err(err) => {
            warn!("Stored plan {} has invalid content: {}", record.id, err);
            None
        }
    })))
}

// Send message endpoint: a client's message goes to the admin, an
// administrator must name the receiving client
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ExtractJson(request): ExtractJson<SendMessageRequest>,
) -> Json<ActionResponse> {
    let user = match current_user(&state, &headers) {
        Some(user) => user,
        None => return Json(ActionResponse::failure("Not authenticated.")),
    };

    let content = request.content.trim();
    if content.is_empty() {
        return Json(ActionResponse::failure("Message cannot be empty."));
    }

    let (receiver_id, refresh) = match user.role {
        Role::Client => match state.database.find_admin() {
            Ok(Some(admin)) => (admin.id, "/dashboard/client"),
            Ok(None) => {
                return Json(ActionResponse::failure("Could not find the admin account."));
            }
            Err(err) => {
                error!("Failed to look up admin profile: {}", err);
                return Json(ActionResponse::failure("Could not find the admin account."));
            }
        },
        Role::Admin => match request.receiver_id.filter(|id| !id.is_empty()) {
            Some(id) => (id, "/admin/chat"),
            None => return Json(ActionResponse::failure("A receiver is required.")),
        },
    };

    match state.database.insert_message(&user.id, &receiver_id, content) {
        Ok(_) => Json(ActionResponse::ok("", &[refresh])),
        Err(err) => {
            error!("Failed to store message: {}", err);
            Json(ActionResponse::failure(
                "Database error: Could not send message.",
            ))
        }
    }
}

// List messages endpoint: a client sees their own thread, an administrator
// sees the thread with the named client
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<MessageThreadParams>,
) -> Result<Json<Vec<MessageRecord>>, StatusCode> {
    let user = current_user(&state, &headers).ok_or(StatusCode::UNAUTHORIZED)?;

    let messages = match user.role {
        Role::Admin => {
            let client_id = params
                .client_id
                .filter(|id| !id.is_empty())
                .ok_or(StatusCode::BAD_REQUEST)?;
            state.database.list_thread(&user.id, &client_id)
        }
        Role::Client => state.database.list_messages_for_user(&user.id),
    }
    .map_err(|err| {
        error!("Failed to list messages for {}: {}", user.id, err);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(messages))
}

// Client roster endpoint (administrator only): workout-assignment flag and
// the next upcoming confirmed meeting per client
pub async fn list_clients(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ClientSummary>>, StatusCode> {
    let user = current_user(&state, &headers).ok_or(StatusCode::UNAUTHORIZED)?;
    if user.role != Role::Admin {
        return Err(StatusCode::FORBIDDEN);
    }

    let clients = state.database.list_clients().map_err(|err| {
        error!("Failed to list clients: {}", err);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let meetings = state
        .database
        .list_meetings(&MeetingFilter::default())
        .map_err(|err| {
            error!("Failed to list meetings: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let assigned: HashSet<String> = state
        .database
        .list_workout_plans()
        .map_err(|err| {
            error!("Failed to list workout plans: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .into_iter()
        .map(|plan| plan.client_id)
        .collect();

    let now = Utc::now();

    let summaries = clients
        .into_iter()
        .map(|client| {
            let next_meeting = meetings
                .iter()
                .filter(|meeting| {
                    meeting.client_id == client.id
                        && meeting.status == MeetingStatus::Confirmed
                        && meeting.requested_time > now
                })
                .map(|meeting| meeting.requested_time)
                .min();

            ClientSummary {
                workout_assigned: assigned.contains(&client.id),
                next_meeting,
                id: client.id,
                full_name: client.full_name,
                email: client.email,
            }
        })
        .collect();

    Ok(Json(summaries))
}
