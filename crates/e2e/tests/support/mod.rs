//! In-process stand-in for the course platform's HTTP API

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use coursecheck_common::HarnessConfig;

const TABLES: &[&str] = &["users", "students", "courses", "enrollments", "ratings", "payments"];

#[derive(Default)]
struct Lms {
    next_id: i64,
    tables: BTreeMap<&'static str, BTreeMap<i64, Value>>,
    progress: Vec<Value>,
    deletes: Vec<String>,
    fail_create: Option<String>,
}

impl Lms {
    fn rows(&self, table: &str) -> impl Iterator<Item = &Value> {
        self.tables.get(table).into_iter().flat_map(|t| t.values())
    }

    fn exists(&self, table: &str, id: i64) -> bool {
        self.tables.get(table).map(|t| t.contains_key(&id)).unwrap_or(false)
    }

    fn row(&self, table: &str, id: i64) -> Option<&Value> {
        self.tables.get(table)?.get(&id)
    }

    fn courses_of(&self, instructor: i64) -> BTreeSet<i64> {
        self.rows("courses")
            .filter(|c| c["instructor_id"].as_i64() == Some(instructor))
            .filter_map(|c| c["id"].as_i64())
            .collect()
    }

    /// Latest submitted progress for a student in a course
    fn latest_progress(&self, course: i64, student: i64) -> Option<Value> {
        self.progress
            .iter()
            .rev()
            .find(|p| p["course_id"].as_i64() == Some(course) && p["student_id"].as_i64() == Some(student))
            .map(|p| p["progress"].clone())
    }
}

type Shared = Arc<Mutex<Lms>>;

fn not_found(what: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": format!("{} not found", what) })))
}

fn create(state: &Shared, table: &'static str, mut payload: Value) -> (StatusCode, Json<Value>) {
    let mut lms = state.lock();
    if lms.fail_create.as_deref() == Some(table) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "injected failure" })),
        );
    }
    lms.next_id += 1;
    let id = lms.next_id;
    payload["id"] = json!(id);
    lms.tables.entry(table).or_default().insert(id, payload.clone());
    (StatusCode::CREATED, Json(payload))
}

fn remove(state: &Shared, table: &'static str, id: i64) -> StatusCode {
    let mut lms = state.lock();
    lms.deletes.push(format!("/{}/{}", table, id));
    match lms.tables.get_mut(table).and_then(|t| t.remove(&id)) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

async fn submit_progress(State(state): State<Shared>, Json(payload): Json<Value>) -> (StatusCode, Json<Value>) {
    let mut lms = state.lock();
    if lms.fail_create.as_deref() == Some("progress") {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "injected failure" })));
    }
    lms.progress.push(payload);
    (StatusCode::OK, Json(json!({ "ok": true })))
}

async fn instructor_analytics(State(state): State<Shared>, Path(id): Path<i64>) -> (StatusCode, Json<Value>) {
    let lms = state.lock();
    if !lms.exists("users", id) {
        return not_found("instructor");
    }

    let courses = lms.courses_of(id);
    let students: BTreeSet<i64> = lms
        .rows("enrollments")
        .filter(|e| e["course_id"].as_i64().map_or(false, |c| courses.contains(&c)))
        .filter_map(|e| e["student_id"].as_i64())
        .collect();
    let revenue: f64 = lms
        .rows("payments")
        .filter(|p| p["instructor_id"].as_i64() == Some(id) && p["status"] == "succeeded")
        .filter_map(|p| p["amount"].as_f64())
        .sum();
    let ratings: Vec<f64> = lms
        .rows("ratings")
        .filter(|r| r["course_id"].as_i64().map_or(false, |c| courses.contains(&c)))
        .filter_map(|r| r["rating"].as_f64())
        .collect();
    let average = if ratings.is_empty() {
        Value::Null
    } else {
        json!(ratings.iter().sum::<f64>() / ratings.len() as f64)
    };

    (
        StatusCode::OK,
        Json(json!({
            "total_students": students.len(),
            "total_revenue": revenue,
            "average_rating": average
        })),
    )
}

async fn course_students(State(state): State<Shared>, Path(id): Path<i64>) -> (StatusCode, Json<Value>) {
    let lms = state.lock();
    if !lms.exists("courses", id) {
        return not_found("course");
    }

    let roster: Vec<Value> = lms
        .rows("enrollments")
        .filter(|e| e["course_id"].as_i64() == Some(id))
        .filter_map(|e| e["student_id"].as_i64())
        .filter_map(|sid| {
            let student = lms.row("students", sid)?;
            let mut entry = json!({
                "id": sid,
                "full_name": student["full_name"],
                "email": student["email"]
            });
            if let Some(progress) = lms.latest_progress(id, sid) {
                entry["progress"] = progress;
            }
            Some(entry)
        })
        .collect();

    (StatusCode::OK, Json(Value::Array(roster)))
}

async fn instructor_courses(State(state): State<Shared>, Path(id): Path<i64>) -> (StatusCode, Json<Value>) {
    let lms = state.lock();
    if !lms.exists("users", id) {
        return not_found("instructor");
    }
    let courses: Vec<Value> = lms
        .rows("courses")
        .filter(|c| c["instructor_id"].as_i64() == Some(id))
        .cloned()
        .collect();
    (StatusCode::OK, Json(Value::Array(courses)))
}

async fn course_earnings(State(state): State<Shared>, Path(id): Path<i64>) -> (StatusCode, Json<Value>) {
    let lms = state.lock();
    if !lms.exists("users", id) {
        return not_found("instructor");
    }
    let courses: Vec<Value> = lms
        .courses_of(id)
        .into_iter()
        .map(|course| {
            let earnings: f64 = lms
                .rows("payments")
                .filter(|p| p["course_id"].as_i64() == Some(course) && p["status"] == "succeeded")
                .filter_map(|p| p["amount"].as_f64())
                .sum();
            json!({ "course_id": course, "earnings": earnings })
        })
        .collect();
    (StatusCode::OK, Json(json!({ "courses": courses })))
}

async fn student_enrollments(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let lms = state.lock();
    if !lms.exists("users", id) {
        return not_found("instructor");
    }
    let limit = params
        .get("limit")
        .and_then(|l| l.parse::<usize>().ok())
        .unwrap_or(10);
    let courses = lms.courses_of(id);

    // newest first
    let enrollments: Vec<Value> = lms
        .rows("enrollments")
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .filter_map(|e| {
            let course_id = e["course_id"].as_i64().filter(|c| courses.contains(c))?;
            let student_id = e["student_id"].as_i64()?;
            let course = lms.row("courses", course_id)?;
            let student = lms.row("students", student_id)?;
            let mut entry = json!({
                "id": e["id"],
                "course": { "id": course_id, "title": course["title"] },
                "student_profile": {
                    "full_name": student["full_name"],
                    "email": student["email"]
                }
            });
            if let Some(progress) = lms.latest_progress(course_id, student_id) {
                entry["progress"] = progress;
            }
            Some(entry)
        })
        .take(limit)
        .collect();
    (StatusCode::OK, Json(Value::Array(enrollments)))
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!({ "ok": true }))
}

fn router(state: Shared) -> Router {
    let mut router = Router::new()
        .route("/progress", post(submit_progress))
        .route("/instructors/:id/analytics", get(instructor_analytics))
        .route("/instructors/:id/courses", get(instructor_courses))
        .route("/instructors/:id/course-earnings", get(course_earnings))
        .route("/instructors/:id/student-enrollments", get(student_enrollments))
        .route("/courses/:id/students", get(course_students))
        .route("/slow", get(slow));

    for &table in TABLES {
        router = router
            .route(
                &format!("/{}", table),
                post(move |State(state): State<Shared>, Json(payload): Json<Value>| async move {
                    create(&state, table, payload)
                }),
            )
            .route(
                &format!("/{}/:id", table),
                delete(move |State(state): State<Shared>, Path(id): Path<i64>| async move {
                    remove(&state, table, id)
                }),
            );
    }

    router.with_state(state)
}

/// Stub server bound to an ephemeral port; stops when dropped
pub struct StubServer {
    pub base_url: String,
    state: Shared,
    task: tokio::task::JoinHandle<()>,
}

impl StubServer {
    pub async fn start() -> Self {
        let state = Shared::default();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub local addr");
        let app = router(state.clone());
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("stub server");
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
            task,
        }
    }

    pub fn config(&self) -> HarnessConfig {
        HarnessConfig {
            base_url: self.base_url.clone(),
            timeout_ms: 5_000,
            ..Default::default()
        }
    }

    /// Make every creation on this collection answer 500
    pub fn fail_creates_on(&self, collection: &str) {
        self.state.lock().fail_create = Some(collection.to_string());
    }

    /// Every DELETE path received, in order
    pub fn deletes(&self) -> Vec<String> {
        self.state.lock().deletes.clone()
    }

    /// Rows still stored across all collections
    pub fn live_rows(&self) -> usize {
        self.state.lock().tables.values().map(|t| t.len()).sum()
    }

    pub fn progress_submissions(&self) -> usize {
        self.state.lock().progress.len()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
