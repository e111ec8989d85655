//! Integration tests for the API.
//!
//! Drive the real router with `oneshot`. The generator is a fake so the
//! tests control what the "model" returns and can see what it was given.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt; // for `oneshot`

use meshgen_api::{build_router, ApiConfig, AppState};
use meshgen_hardware::AccelerationInfo;
use meshgen_pipeline::{MeshResult, PipelineError, PipelineHolder, PipelineLoader, ShapeGenerator};

const BOUNDARY: &str = "meshgen-test-boundary";

#[derive(Clone)]
enum Outcome {
    Meshes(Vec<MeshResult>),
    Fail(String),
}

/// Records every image it is handed, then returns the configured outcome.
struct FakeGenerator {
    outcome: Outcome,
    seen: Arc<Mutex<Vec<(PathBuf, Vec<u8>)>>>,
    alive: Arc<AtomicBool>,
}

impl ShapeGenerator for FakeGenerator {
    fn generate(&self, image: &Path) -> meshgen_pipeline::Result<Vec<MeshResult>> {
        let bytes = std::fs::read(image)?;
        self.seen.lock().unwrap().push((image.to_path_buf(), bytes));
        match &self.outcome {
            Outcome::Meshes(meshes) => Ok(meshes.clone()),
            Outcome::Fail(msg) => Err(PipelineError::Generation(msg.clone())),
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

struct FakeLoader {
    loads: AtomicUsize,
    fail_first: usize,
    outcome: Outcome,
    seen: Arc<Mutex<Vec<(PathBuf, Vec<u8>)>>>,
    /// Cleared by a test to simulate the model process dying.
    alive: Arc<AtomicBool>,
}

impl PipelineLoader for FakeLoader {
    fn load(&self, _model_id: &str) -> meshgen_pipeline::Result<Arc<dyn ShapeGenerator>> {
        let attempt = self.loads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(20));
        if attempt < self.fail_first {
            return Err(PipelineError::LoadFailed("weights not found".to_string()));
        }
        self.alive.store(true, Ordering::SeqCst);
        Ok(Arc::new(FakeGenerator {
            outcome: self.outcome.clone(),
            seen: Arc::clone(&self.seen),
            alive: Arc::clone(&self.alive),
        }))
    }
}

struct TestApp {
    router: Router,
    loader: Arc<FakeLoader>,
    state: Arc<AppState>,
    temp_dir: tempfile::TempDir,
}

impl TestApp {
    fn new(outcome: Outcome) -> Self {
        Self::with_failures(outcome, 0)
    }

    fn with_failures(outcome: Outcome, fail_first: usize) -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let loader = Arc::new(FakeLoader {
            loads: AtomicUsize::new(0),
            fail_first,
            outcome,
            seen: Arc::new(Mutex::new(Vec::new())),
            alive: Arc::new(AtomicBool::new(false)),
        });
        let holder = PipelineHolder::new("test/model", loader.clone(), AccelerationInfo::none());
        let config = ApiConfig {
            temp_dir: temp_dir.path().to_path_buf(),
            ..Default::default()
        };
        let state = Arc::new(AppState::new(config, Arc::new(holder)).unwrap());

        Self {
            router: build_router(state.clone()),
            loader,
            state,
            temp_dir,
        }
    }

    fn loads(&self) -> usize {
        self.loader.loads.load(Ordering::SeqCst)
    }

    fn seen(&self) -> Vec<(PathBuf, Vec<u8>)> {
        self.loader.seen.lock().unwrap().clone()
    }

    fn temp_files(&self) -> usize {
        std::fs::read_dir(self.temp_dir.path()).unwrap().count()
    }

    async fn get(&self, uri: &str) -> Response {
        self.router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn upload(&self, field: &str, filename: Option<&str>, data: &[u8]) -> Response {
        self.router
            .clone()
            .oneshot(upload_request(field, filename, data))
            .await
            .unwrap()
    }
}

fn upload_request(field: &str, filename: Option<&str>, data: &[u8]) -> Request<Body> {
    let disposition = match filename {
        Some(name) => format!("form-data; name=\"{field}\"; filename=\"{name}\""),
        None => format!("form-data; name=\"{field}\""),
    };

    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Disposition: {disposition}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/generate-3d")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// 8 corners, 12 triangles.
fn cube() -> MeshResult {
    MeshResult::new(
        vec![
            [-0.5, -0.5, -0.5],
            [0.5, -0.5, -0.5],
            [0.5, 0.5, -0.5],
            [-0.5, 0.5, -0.5],
            [-0.5, -0.5, 0.5],
            [0.5, -0.5, 0.5],
            [0.5, 0.5, 0.5],
            [-0.5, 0.5, 0.5],
        ],
        vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [2, 3, 7],
            [2, 7, 6],
            [1, 2, 6],
            [1, 6, 5],
            [0, 4, 7],
            [0, 7, 3],
        ],
    )
}

fn fake_png(len: usize) -> Vec<u8> {
    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    data.extend((0..len.saturating_sub(8)).map(|i| (i % 251) as u8));
    data
}

#[tokio::test]
async fn test_root_endpoint() {
    let app = TestApp::new(Outcome::Meshes(vec![cube()]));

    let response = app.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["message"], "3D Model Generator API");
    assert_eq!(body["status"], "healthy");
    assert_eq!(
        body["supported_formats"],
        serde_json::json!(["bmp", "jpeg", "jpg", "png", "webp"])
    );
}

#[tokio::test]
async fn test_health_reports_lazy_load() {
    let app = TestApp::new(Outcome::Meshes(vec![cube()]));

    let body = body_json(app.get("/health").await).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["pipeline_loaded"], false);
    assert_eq!(body["cuda_available"], false);
    assert_eq!(body["device_count"], 0);
    assert_eq!(app.loads(), 0);

    let response = app.upload("image", Some("cat.png"), &fake_png(2048)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(app.get("/health").await).await;
    assert_eq!(body["pipeline_loaded"], true);
}

#[tokio::test]
async fn test_openapi_document() {
    let app = TestApp::new(Outcome::Meshes(vec![cube()]));

    let response = app.get("/openapi.json").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["paths"]["/generate-3d"]["post"].is_object());
    assert!(body["paths"]["/"]["get"].is_object());
    assert!(body["paths"]["/health"]["get"].is_object());
    assert_eq!(body["info"]["title"], "3D Model Generator API");
}

#[tokio::test]
async fn test_generate_returns_glb() {
    let app = TestApp::new(Outcome::Meshes(vec![cube()]));

    let response = app.upload("image", Some("cat.png"), &fake_png(2048)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "model/gltf-binary");

    let request_id = response.headers()["x-request-id"].to_str().unwrap().to_string();
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"model_{request_id}.glb\"").as_str()
    );

    let glb = body_bytes(response).await;
    let gltf = gltf::Gltf::from_slice(&glb).unwrap();
    let primitive = gltf.meshes().next().unwrap().primitives().next().unwrap();
    let reader = primitive.reader(|_| gltf.blob.as_deref());

    assert_eq!(reader.read_positions().unwrap().count(), 8);
    assert_eq!(reader.read_indices().unwrap().into_u32().count() / 3, 12);

    assert_eq!(app.temp_files(), 0);
}

#[tokio::test]
async fn test_generator_receives_uploaded_bytes() {
    let app = TestApp::new(Outcome::Meshes(vec![cube()]));
    let upload = fake_png(4096);

    let response = app.upload("image", Some("photo.WEBP"), &upload).await;
    assert_eq!(response.status(), StatusCode::OK);

    let seen = app.seen();
    assert_eq!(seen.len(), 1);
    let (path, bytes) = &seen[0];
    assert_eq!(bytes, &upload);
    assert_eq!(path.extension().unwrap(), "jpg");
    assert!(path.starts_with(&app.state.config.temp_dir));
    assert!(!path.exists());
}

#[tokio::test]
async fn test_unsupported_format_rejected_without_side_effects() {
    let app = TestApp::new(Outcome::Meshes(vec![cube()]));

    let response = app.upload("image", Some("document.pdf"), b"%PDF-1.7").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    let detail = body["detail"].as_str().unwrap();
    assert_eq!(detail, "Unsupported format: pdf. Supported: bmp, jpeg, jpg, png, webp");

    assert_eq!(app.loads(), 0);
    assert!(app.seen().is_empty());
    assert_eq!(app.temp_files(), 0);
}

#[tokio::test]
async fn test_missing_filename_rejected() {
    let app = TestApp::new(Outcome::Meshes(vec![cube()]));

    let response = app.upload("image", None, &fake_png(64)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["detail"], "No filename provided");
    assert_eq!(app.loads(), 0);
}

#[tokio::test]
async fn test_oversized_upload_rejected() {
    let app = TestApp::new(Outcome::Meshes(vec![cube()]));

    // Just over the limit: reaches validation
    let response = app
        .upload("image", Some("big.png"), &vec![0u8; 10 * 1024 * 1024 + 1])
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["detail"], "File too large (max 10MB)");

    // Far over the limit: stopped by the body limit
    let response = app
        .upload("image", Some("huge.png"), &vec![0u8; 12 * 1024 * 1024])
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["detail"], "File too large (max 10MB)");

    assert_eq!(app.loads(), 0);
    assert_eq!(app.temp_files(), 0);
}

#[tokio::test]
async fn test_upload_at_limit_accepted() {
    let app = TestApp::new(Outcome::Meshes(vec![cube()]));

    let response = app
        .upload("image", Some("edge.jpg"), &vec![7u8; 10 * 1024 * 1024])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.seen()[0].1.len(), 10 * 1024 * 1024);
}

#[tokio::test]
async fn test_missing_image_field() {
    let app = TestApp::new(Outcome::Meshes(vec![cube()]));

    let response = app.upload("file", Some("cat.png"), &fake_png(64)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["detail"], "Field required: image");
    assert_eq!(app.loads(), 0);
}

#[tokio::test]
async fn test_empty_result_is_server_error() {
    let app = TestApp::new(Outcome::Meshes(Vec::new()));

    let response = app.upload("image", Some("cat.png"), &fake_png(2048)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["detail"], "Failed to generate 3D model");

    assert_eq!(app.seen().len(), 1);
    assert_eq!(app.temp_files(), 0);
}

#[tokio::test]
async fn test_generation_error_is_server_error() {
    let app = TestApp::new(Outcome::Fail("CUDA out of memory".to_string()));

    let response = app.upload("image", Some("cat.jpeg"), &fake_png(512)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    assert_eq!(body["detail"], "Generation failed: CUDA out of memory");
    assert_eq!(body["status"], 500);
    assert_eq!(app.temp_files(), 0);
}

#[tokio::test]
async fn test_invalid_mesh_is_export_error() {
    let broken = MeshResult::new(vec![[0.0, 0.0, 0.0]], vec![[0, 1, 2]]);
    let app = TestApp::new(Outcome::Meshes(vec![broken]));

    let response = app.upload("image", Some("cat.bmp"), &fake_png(512)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let detail = body_json(response).await["detail"].as_str().unwrap().to_string();
    assert!(detail.starts_with("Export failed:"));
    assert_eq!(app.temp_files(), 0);
}

#[tokio::test]
async fn test_failed_load_is_retried_on_next_request() {
    let app = TestApp::with_failures(Outcome::Meshes(vec![cube()]), 1);

    let response = app.upload("image", Some("cat.png"), &fake_png(256)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await["detail"],
        "Failed to load model: weights not found"
    );
    assert_eq!(app.temp_files(), 0);
    assert!(!app.state.pipeline.is_loaded());

    let response = app.upload("image", Some("cat.png"), &fake_png(256)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.loads(), 2);
}

#[tokio::test]
async fn test_dead_pipeline_is_reloaded() {
    let app = TestApp::new(Outcome::Meshes(vec![cube()]));

    let response = app.upload("image", Some("cat.png"), &fake_png(256)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.loads(), 1);

    app.loader.alive.store(false, Ordering::SeqCst);
    let body = body_json(app.get("/health").await).await;
    assert_eq!(body["pipeline_loaded"], false);

    let response = app.upload("image", Some("cat.png"), &fake_png(256)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.loads(), 2);

    let body = body_json(app.get("/health").await).await;
    assert_eq!(body["pipeline_loaded"], true);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_share_one_load() {
    let app = TestApp::new(Outcome::Meshes(vec![cube()]));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let router = app.router.clone();
            let name = format!("img{i}.png");
            let request = upload_request("image", Some(name.as_str()), &fake_png(1024));
            tokio::spawn(async move { router.oneshot(request).await.unwrap() })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        let response = handle.await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        ids.push(response.headers()["x-request-id"].to_str().unwrap().to_string());
    }

    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);
    assert_eq!(app.loads(), 1);
    assert_eq!(app.seen().len(), 8);
    assert_eq!(app.temp_files(), 0);
}
