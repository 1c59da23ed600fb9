#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use equipvis::{
    Credential, Dataset, DatasetDetail, DatasetId, EquipmentApi, HttpApi, LoginRequest,
    LoginResponse, NormalizedFile, RegisterRequest, ServiceFailure, Summary, UploadResponse,
};

pub const PLANT_CSV: &str = "Equipment Name,Type,Flowrate,Pressure,Temperature\n\
P-101,Pump,120.5,5.2,80.1\n\
V-201,Valve,60,2.1,45.3\n\
P-102,Pump,130,5.8,82.4\n";

pub fn summary() -> Summary {
    serde_json::from_value(json!({
        "equipment_count": 3,
        "avg_flowrate": 103.5,
        "avg_pressure": 4.366,
        "avg_temperature": 69.266,
        "type_distribution": {"Pump": 2, "Valve": 1}
    }))
    .unwrap()
}

pub fn detail(id: &str, filename: &str) -> DatasetDetail {
    serde_json::from_value(json!({
        "id": id,
        "filename": filename,
        "uploaded_at": "2024-05-01T10:00:00Z",
        "summary": summary(),
        "data": [{"Equipment Name": "P-101", "Type": "Pump"}]
    }))
    .unwrap()
}

pub fn entry(id: &str, filename: &str) -> Dataset {
    detail(id, filename).entry()
}

pub fn status(code: u16, body: Value) -> ServiceFailure {
    ServiceFailure::Status { status: code, body }
}

/// Scripted [`EquipmentApi`] that records every call
///
/// Each response slot is returned as-is on every call. When `gate` is set,
/// `dataset` and `upload` signal `started` and then wait for the gate.
pub struct FakeApi {
    pub calls: Mutex<Vec<&'static str>>,
    pub login: Mutex<Result<LoginResponse, ServiceFailure>>,
    pub register: Mutex<Result<(), ServiceFailure>>,
    pub history: Mutex<Result<Vec<Dataset>, ServiceFailure>>,
    pub details: Mutex<HashMap<String, Result<DatasetDetail, ServiceFailure>>>,
    pub upload: Mutex<Result<UploadResponse, ServiceFailure>>,
    pub report: Mutex<Result<Vec<u8>, ServiceFailure>>,
    pub uploaded: Mutex<Vec<NormalizedFile>>,
    pub gate: Mutex<Option<Arc<Notify>>>,
    pub started: Notify,
}

impl Default for FakeApi {
    fn default() -> Self {
        FakeApi {
            calls: Mutex::new(Vec::new()),
            login: Mutex::new(Ok(LoginResponse {
                token: "user_1".to_string(),
            })),
            register: Mutex::new(Ok(())),
            history: Mutex::new(Ok(Vec::new())),
            details: Mutex::new(HashMap::new()),
            upload: Mutex::new(Ok(UploadResponse {
                dataset_id: DatasetId::new("7"),
                summary: summary(),
                data: Vec::new(),
            })),
            report: Mutex::new(Ok(b"%PDF-1.4 fake".to_vec())),
            uploaded: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
            started: Notify::new(),
        }
    }
}

impl FakeApi {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn with_detail(self, detail: DatasetDetail) -> Self {
        self.details
            .lock()
            .unwrap()
            .insert(detail.id.as_str().to_string(), Ok(detail));
        self
    }

    /// Hold `dataset` and `upload` until the returned gate is notified
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    async fn wait_for_gate(&self) {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            self.started.notify_one();
            gate.notified().await;
        }
    }
}

#[async_trait]
impl EquipmentApi for FakeApi {
    async fn login(&self, _request: &LoginRequest) -> Result<LoginResponse, ServiceFailure> {
        self.record("login");
        self.login.lock().unwrap().clone()
    }

    async fn register(&self, _request: &RegisterRequest) -> Result<(), ServiceFailure> {
        self.record("register");
        self.register.lock().unwrap().clone()
    }

    async fn history(&self, _credential: &Credential) -> Result<Vec<Dataset>, ServiceFailure> {
        self.record("history");
        self.history.lock().unwrap().clone()
    }

    async fn dataset(
        &self,
        _credential: &Credential,
        id: &DatasetId,
    ) -> Result<DatasetDetail, ServiceFailure> {
        self.record("dataset");
        self.wait_for_gate().await;
        self.details
            .lock()
            .unwrap()
            .get(id.as_str())
            .cloned()
            .unwrap_or_else(|| Err(status(404, json!({"detail": "Not found."}))))
    }

    async fn upload(
        &self,
        _credential: &Credential,
        file: &NormalizedFile,
    ) -> Result<UploadResponse, ServiceFailure> {
        self.record("upload");
        self.uploaded.lock().unwrap().push(file.clone());
        self.wait_for_gate().await;
        self.upload.lock().unwrap().clone()
    }

    async fn report(
        &self,
        _credential: &Credential,
        _id: &DatasetId,
    ) -> Result<Vec<u8>, ServiceFailure> {
        self.record("report");
        self.report.lock().unwrap().clone()
    }
}

/// What the mock server saw
#[derive(Default)]
pub struct Recorder {
    pub authorization: Mutex<Vec<String>>,
    pub parts: Mutex<Vec<RecordedPart>>,
}

#[derive(Clone, Debug)]
pub struct RecordedPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

type Shared = State<Arc<Recorder>>;

fn remember_auth(recorder: &Recorder, headers: &HeaderMap) -> bool {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let ok = value == "Bearer user_1";
    recorder.authorization.lock().unwrap().push(value);
    ok
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Authentication credentials were not provided."})),
    )
        .into_response()
}

async fn login(Json(body): Json<Value>) -> Response {
    match body["username"].as_str() {
        Some("ghost") => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "user not registered"})),
        )
            .into_response(),
        Some(_) if body["password"] == "wrong" => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid password"})),
        )
            .into_response(),
        Some(_) => Json(json!({"token": "user_1"})).into_response(),
        None => (StatusCode::BAD_REQUEST, "missing username").into_response(),
    }
}

async fn register(Json(body): Json<Value>) -> Response {
    if body["username"] == "taken" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"username": ["A user with that username already exists."]})),
        )
            .into_response();
    }
    (StatusCode::CREATED, Json(json!({"message": "ok"}))).into_response()
}

async fn history(State(recorder): Shared, headers: HeaderMap) -> Response {
    if !remember_auth(&recorder, &headers) {
        return unauthorized();
    }
    Json(json!([
        {"id": 2, "filename": "second.csv", "uploaded_at": "2024-05-02T09:30:00.123456"},
        {"id": 1, "filename": "first.csv", "uploaded_at": "2024-05-01T10:00:00Z"}
    ]))
    .into_response()
}

async fn dataset(State(recorder): Shared, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if !remember_auth(&recorder, &headers) {
        return unauthorized();
    }
    if id != "1" {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response();
    }
    Json(json!({
        "id": 1,
        "filename": "first.csv",
        "uploaded_at": "2024-05-01T10:00:00Z",
        "summary": summary(),
        "data": [{"Equipment Name": "P-101", "Type": "Pump", "Flowrate": 120.5}]
    }))
    .into_response()
}

async fn upload(State(recorder): Shared, headers: HeaderMap, mut multipart: Multipart) -> Response {
    if !remember_auth(&recorder, &headers) {
        return unauthorized();
    }
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.unwrap().to_vec();
        recorder.parts.lock().unwrap().push(RecordedPart {
            name,
            file_name,
            content_type,
            bytes,
        });
    }

    let has_file = recorder.parts.lock().unwrap().iter().any(|p| p.name == "file");
    if !has_file {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "No file provided"})))
            .into_response();
    }
    Json(json!({
        "message": "File uploaded successfully",
        "dataset_id": 3,
        "summary": summary(),
        "data": [{"Equipment Name": "P-101"}, {"Equipment Name": "V-201"}]
    }))
    .into_response()
}

async fn report(State(recorder): Shared, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if !remember_auth(&recorder, &headers) {
        return unauthorized();
    }
    if id != "1" {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "Dataset not found"})))
            .into_response();
    }
    (
        [(header::CONTENT_TYPE, "application/pdf")],
        b"%PDF-1.4 report".to_vec(),
    )
        .into_response()
}

/// Start a mock of the services on an ephemeral port
///
/// # Returns
/// * `(HttpApi, Arc<Recorder>)` - A client pointed at the mock and what it records
pub async fn spawn_server() -> (HttpApi, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let app = Router::new()
        .route("/api/auth/login/", post(login))
        .route("/api/auth/register/", post(register))
        .route("/api/history/", get(history))
        .route("/api/datasets/:id/", get(dataset))
        .route("/api/upload/", post(upload))
        .route("/api/report/pdf/:id/", get(report))
        .with_state(recorder.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let api = HttpApi::with_client(client, format!("http://{}/api/", addr));
    (api, recorder)
}

/// A one-sheet workbook with the plant table, as bytes
pub fn plant_workbook() -> Vec<u8> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    let headers = ["Equipment Name", "Type", "Flowrate", "Pressure", "Temperature"];
    for (col, h) in headers.iter().enumerate() {
        sheet.write_string(0, col as u16, *h).unwrap();
    }
    let rows = [
        ("P-101", "Pump", 120.5, 5.2, 80.1),
        ("V-201", "Valve", 60.0, 2.1, 45.3),
    ];
    for (i, (name, kind, flow, pressure, temp)) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, *name).unwrap();
        sheet.write_string(row, 1, *kind).unwrap();
        sheet.write_number(row, 2, *flow).unwrap();
        sheet.write_number(row, 3, *pressure).unwrap();
        sheet.write_number(row, 4, *temp).unwrap();
    }
    workbook.save_to_buffer().unwrap()
}
