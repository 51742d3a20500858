use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::mailer::{env_clean, MailSettings, MailTransport, SmtpMailer};
use crate::notify::{self, ExplicitTo};
use crate::store::SchoolStore;
use crate::types::{Activity, AttendanceStatus, HomeworkTask, PeriodInput, Student, StatusUpdate};

/// Application state shared across requests
pub struct AppState {
    pub store: RwLock<SchoolStore>,
    pub mailer: Option<Arc<dyn MailTransport>>,
    pub mail_settings: MailSettings,
    pub admin_token: Option<String>,
}

/// Start the web server
pub async fn serve(port: u16) -> anyhow::Result<()> {
    let mail_settings = MailSettings::from_env();
    let mailer: Option<Arc<dyn MailTransport>> = if mail_settings.is_configured() {
        match SmtpMailer::from_settings(&mail_settings) {
            Ok(m) => Some(Arc::new(m)),
            Err(e) => {
                warn!(error = %e, "SMTP transport unavailable");
                None
            }
        }
    } else {
        info!(
            missing = mail_settings.missing().join("/"),
            "SMTP not configured; notifications limited to preview"
        );
        None
    };

    let state = Arc::new(AppState {
        store: RwLock::new(SchoolStore::new()),
        mailer,
        mail_settings,
        admin_token: env_clean("ADMIN_TOKEN"),
    });

    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!(%addr, "Server running");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/students", post(add_student).get(list_students))
        .route("/students/{roll_no}", get(get_student))
        .route(
            "/students/{roll_no}/contacts",
            get(get_parent_contacts).post(set_parent_contacts),
        )
        .route("/timetable", post(add_timetable))
        .route("/timetable/{grade}", get(view_timetable))
        .route("/timetable/{grade}/{day}", get(view_timetable_by_day))
        .route("/attendance/mark", post(mark_attendance))
        .route("/attendance/{roll_no}", get(view_attendance))
        .route("/homework/set", post(set_homework_for_day))
        .route("/homework/mark", post(mark_homework_complete))
        .route("/diary/{roll_no}", get(view_diary))
        .route("/diary/{roll_no}/{day}", get(view_diary_by_day))
        .route("/report/log", post(log_daily_activity))
        .route("/report/{roll_no}", get(view_report))
        .route("/behavior/record", post(record_behavior))
        .route("/behavior/{roll_no}", get(view_behavior))
        .route("/notify/parents", post(notify_parents))
        .route("/smtp/health", get(smtp_health))
        .route("/reset", post(reset_all))
        .with_state(state)
}

// ---------- Payload helpers ----------

/// Pull a string-ish field out of a loose JSON body, stringifying numbers
/// and booleans the way the old API did.
fn str_field(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Like [`str_field`] but treating an empty string as absent.
fn opt_field(body: &Value, key: &str) -> Option<String> {
    str_field(body, key).filter(|s| !s.is_empty())
}

/// Deserialize a sub-value of the body, defaulting on absence or mismatch.
fn typed_field<T: serde::de::DeserializeOwned + Default>(body: &Value, key: &str) -> T {
    body.get(key)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|i| i.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

// ---------- Health ----------

async fn healthz() -> Json<Value> {
    Json(json!({ "ok": true }))
}

// ---------- Students ----------

const STUDENT_FIELDS: &[&str] = &[
    "roll_no",
    "name",
    "age",
    "grade",
    "gender",
    "fathers_name",
    "mothers_name",
    "blood_group",
    "address",
];

async fn add_student(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let missing: Vec<&str> = STUDENT_FIELDS
        .iter()
        .filter(|k| opt_field(&body, k).is_none())
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::Validation(format!(
            "Missing fields: {}",
            missing.join(", ")
        )));
    }

    let roll_no = opt_field(&body, "roll_no").unwrap_or_default();
    let parent_emails: Vec<String> = ["parent_email", "father_email", "mother_email"]
        .iter()
        .filter_map(|k| opt_field(&body, k))
        .collect();

    let student = Student {
        name: str_field(&body, "name").unwrap_or_default(),
        age: str_field(&body, "age").unwrap_or_default(),
        grade: str_field(&body, "grade").unwrap_or_default(),
        gender: str_field(&body, "gender").unwrap_or_default(),
        fathers_name: str_field(&body, "fathers_name").unwrap_or_default(),
        mothers_name: str_field(&body, "mothers_name").unwrap_or_default(),
        blood_group: str_field(&body, "blood_group").unwrap_or_default(),
        address: str_field(&body, "address").unwrap_or_default(),
        parent_emails,
    };

    let mut store = state.store.write().await;
    let student = store.add_student(&roll_no, student)?.clone();
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Student added", "student": student })),
    ))
}

async fn list_students(State(state): State<Arc<AppState>>) -> Json<Value> {
    let store = state.store.read().await;
    Json(json!(store.students()))
}

async fn get_student(
    State(state): State<Arc<AppState>>,
    Path(roll_no): Path<String>,
) -> Result<Json<Student>, ApiError> {
    let store = state.store.read().await;
    Ok(Json(store.student(&roll_no)?.clone()))
}

async fn get_parent_contacts(
    State(state): State<Arc<AppState>>,
    Path(roll_no): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let store = state.store.read().await;
    let emails = store.parent_emails(&roll_no)?;
    Ok(Json(json!({ "parent_emails": emails })))
}

async fn set_parent_contacts(
    State(state): State<Arc<AppState>>,
    Path(roll_no): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let emails = string_list(body.get("parent_emails"));
    let mut store = state.store.write().await;
    let emails = store.set_parent_emails(&roll_no, emails)?;
    Ok(Json(json!({
        "message": "Parent emails updated",
        "parent_emails": emails
    })))
}

// ---------- Timetable ----------

async fn add_timetable(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let grade = str_field(&body, "grade").unwrap_or_default();
    let day = str_field(&body, "day").unwrap_or_default();
    let periods: Vec<PeriodInput> = typed_field(&body, "periods");

    let mut store = state.store.write().await;
    let built = store.add_timetable(&grade, &day, periods)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Timetable added", "timetable": built })),
    ))
}

async fn view_timetable(
    State(state): State<Arc<AppState>>,
    Path(grade): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let store = state.store.read().await;
    let days = store.timetable_for_grade(&grade)?;
    Ok(Json(json!(days)))
}

async fn view_timetable_by_day(
    State(state): State<Arc<AppState>>,
    Path((grade, day)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let store = state.store.read().await;
    let (matched, periods) = store.timetable_for_day(&grade, &day)?;
    Ok(Json(json!({ "day": matched, "periods": periods })))
}

// ---------- Attendance ----------

async fn mark_attendance(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let roll_no = str_field(&body, "roll_no").unwrap_or_default();
    let day = str_field(&body, "day").unwrap_or_default();
    let provided: Vec<AttendanceStatus> = typed_field(&body, "attendance");

    let mut store = state.store.write().await;
    let (matched_day, records) = store.mark_attendance(&roll_no, &day, &provided)?;
    Ok(Json(json!({
        "message": "Attendance marked",
        "day": matched_day,
        "records": records
    })))
}

async fn view_attendance(
    State(state): State<Arc<AppState>>,
    Path(roll_no): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let store = state.store.read().await;
    Ok(Json(json!(store.attendance_for(&roll_no)?)))
}

// ---------- Homework & diary ----------

async fn set_homework_for_day(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let day = str_field(&body, "day").unwrap_or_default();
    let tasks: Vec<HomeworkTask> = typed_field(&body, "tasks");

    let mut store = state.store.write().await;
    let tasks = store.set_shared_homework(&day, tasks)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Homework set", "tasks": tasks })),
    ))
}

async fn mark_homework_complete(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let roll_no = str_field(&body, "roll_no").unwrap_or_default();
    let day = str_field(&body, "day").unwrap_or_default();
    let completed: Vec<i64> = typed_field(&body, "completed");
    let statuses: Vec<StatusUpdate> = typed_field(&body, "statuses");

    let mut store = state.store.write().await;
    let (day, tasks) = store.mark_homework(&roll_no, &day, &completed, &statuses)?;
    Ok(Json(json!({
        "message": "Homework updated",
        "day": day,
        "tasks": tasks
    })))
}

async fn view_diary(
    State(state): State<Arc<AppState>>,
    Path(roll_no): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let store = state.store.read().await;
    Ok(Json(json!(store.diary_for(&roll_no)?)))
}

async fn view_diary_by_day(
    State(state): State<Arc<AppState>>,
    Path((roll_no, day)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let store = state.store.read().await;
    let tasks = store.diary_for_day(&roll_no, &day)?;
    let name = store
        .students
        .get(&roll_no)
        .map(|s| s.name.clone())
        .unwrap_or_default();
    Ok(Json(json!({
        "student": name,
        "day": crate::keys::normalize_day(&day),
        "tasks": tasks
    })))
}

// ---------- Daily report ----------

async fn log_daily_activity(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let roll_no = str_field(&body, "roll_no").unwrap_or_default();
    let date = str_field(&body, "date").unwrap_or_default();
    let lunch = str_field(&body, "lunch").unwrap_or_else(|| "no".to_string());
    let activities: Vec<Activity> = typed_field(&body, "activities");

    let mut store = state.store.write().await;
    store.log_daily_report(&roll_no, &date, &lunch, activities)?;
    Ok(Json(json!({ "message": "Daily report logged" })))
}

async fn view_report(
    State(state): State<Arc<AppState>>,
    Path(roll_no): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let store = state.store.read().await;
    Ok(Json(json!(store.reports_for(&roll_no)?)))
}

// ---------- Behavior ----------

async fn record_behavior(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let roll_no = str_field(&body, "roll_no").unwrap_or_default();
    let with_teacher = opt_field(&body, "with_teacher");
    let with_classmates = opt_field(&body, "with_classmates");
    let note = str_field(&body, "note").unwrap_or_default();

    let mut store = state.store.write().await;
    store.record_behavior(
        &roll_no,
        with_teacher.as_deref(),
        with_classmates.as_deref(),
        note,
    )?;
    Ok(Json(json!({ "message": "Behavior record added" })))
}

async fn view_behavior(
    State(state): State<Arc<AppState>>,
    Path(roll_no): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let store = state.store.read().await;
    let records = store.behaviors_for(&roll_no)?;
    let name = store
        .students
        .get(&roll_no)
        .map(|s| s.name.clone())
        .unwrap_or_default();
    Ok(Json(json!({
        "student": name,
        "roll_no": roll_no,
        "records": records
    })))
}

// ---------- Notifications ----------

async fn notify_parents(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let roll_no = opt_field(&body, "roll_no")
        .ok_or_else(|| ApiError::Validation("roll_no is required".to_string()))?;
    let day = opt_field(&body, "day");
    let date = opt_field(&body, "date");
    let preview_only = body
        .get("preview_only")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let to = match body.get("to") {
        Some(Value::String(s)) => Some(ExplicitTo::One(s.clone())),
        Some(Value::Array(items)) => Some(ExplicitTo::Many(
            items
                .iter()
                .filter_map(|i| i.as_str().map(str::to_string))
                .collect(),
        )),
        _ => None,
    };

    let prepared = {
        let store = state.store.read().await;
        notify::prepare(
            &store,
            &roll_no,
            day.as_deref(),
            date.as_deref(),
            to.as_ref(),
            preview_only,
        )?
    };

    if prepared.preview_only {
        return Ok(Json(json!({
            "message": "Preview generated (email not sent).",
            "subject": prepared.subject,
            "body": prepared.body,
            "to": prepared.recipients
        })));
    }

    let mailer = state
        .mailer
        .clone()
        .ok_or_else(|| state.mail_settings.not_configured_error())?;

    let to_list = prepared.recipients.clone();
    let subject = prepared.subject.clone();
    tokio::task::spawn_blocking(move || notify::deliver(mailer.as_ref(), &prepared))
        .await
        .map_err(|e| ApiError::Delivery(format!("Mail task failed: {e}")))??;

    Ok(Json(json!({
        "message": "Email sent",
        "to": to_list,
        "subject": subject
    })))
}

// ---------- SMTP health ----------

async fn smtp_health(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let status = state.mail_settings.status();
    let mut payload = json!(status);

    if !status.configured {
        payload["status"] = json!("not-configured");
        return Ok(Json(payload));
    }

    let do_test = params
        .get("test")
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "y"))
        .unwrap_or(false);
    if !do_test {
        payload["status"] = json!("configured");
        return Ok(Json(payload));
    }

    let mailer = state
        .mailer
        .clone()
        .ok_or_else(|| state.mail_settings.not_configured_error())?;
    tokio::task::spawn_blocking(move || mailer.check())
        .await
        .map_err(|e| ApiError::Delivery(format!("Health task failed: {e}")))??;

    Ok(Json(json!({ "status": "ok", "connectivity": "ok" })))
}

// ---------- Utility ----------

/// Clear all in-memory data. Guarded by `ADMIN_TOKEN` when set, provided via
/// the `X-Admin-Token` header or a `token` query parameter.
async fn reset_all(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    if let Some(expected) = &state.admin_token {
        let provided = headers
            .get("x-admin-token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| params.get("token").cloned());
        if provided.as_deref() != Some(expected.as_str()) {
            return Err(ApiError::Forbidden("Forbidden".to_string()));
        }
    }

    state.store.write().await.reset();
    Ok(Json(json!({ "message": "All data cleared" })))
}
