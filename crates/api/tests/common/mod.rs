#![allow(dead_code)]

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use bodyscan_api::config::ServerConfig;
use bodyscan_api::router::build_app_router;
use bodyscan_api::state::AppState;
use bodyscan_core::config::{ComputationConfig, MeasurementConfig};

/// Reports success for whichever calibration it was asked to use and
/// writes the output image.
pub const ECHO_COMPUTATION: &str = r#"
method=""
output=""
for arg in "$@"; do
  case "$arg" in
    --calibration=*) method="${arg#--calibration=}" ;;
    --output=*) output="${arg#--output=}" ;;
  esac
done
echo "processed" > "$output"
echo "{\"success\":true,\"measurements\":{\"chest\":96.5,\"waist\":81.2},\"calibration\":{\"method\":\"$method\",\"factor\":0.21,\"confidence\":0.85,\"unit\":\"cm/pixel\"}}"
"#;

pub const JPEG_BYTES: &[u8] = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00\x01fake-jpeg";

/// An application wired to a bash stand-in for the computation. The temp
/// root holds the script, work dir and output dir.
pub struct TestApp {
    pub router: Router,
    pub root: tempfile::TempDir,
}

impl TestApp {
    pub fn output_files(&self) -> usize {
        std::fs::read_dir(self.root.path().join("processed"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

/// Build a test `ServerConfig` pointing at `root`.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config(root: &Path, script: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_upload_bytes: 1024 * 1024,
        measurement: MeasurementConfig {
            computation: ComputationConfig {
                program: "bash".to_string(),
                script_path: Some(script.to_path_buf()),
                timeout: Duration::from_secs(10),
            },
            work_dir: root.join("work"),
            output_dir: root.join("processed"),
            public_image_base_url: "/storage/processed".to_string(),
            debug: false,
        },
    }
}

/// Build the full application router with all middleware layers, running
/// `script_body` as the computation.
pub fn build_test_app(script_body: &str) -> TestApp {
    build_test_app_with(script_body, |_| {})
}

pub fn build_test_app_with(
    script_body: &str,
    customize: impl FnOnce(&mut ServerConfig),
) -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let script = root.path().join("compute.sh");
    let mut f = std::fs::File::create(&script).unwrap();
    writeln!(f, "#!/bin/bash").unwrap();
    write!(f, "{script_body}").unwrap();

    let mut config = test_config(root.path(), &script);
    customize(&mut config);

    let state = AppState::new(config.clone());
    TestApp {
        router: build_app_router(state, &config),
        root,
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

const BOUNDARY: &str = "bodyscan-test-boundary";

/// Hand-built `multipart/form-data` body.
#[derive(Default)]
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        write!(
            self.body,
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
        .unwrap();
        self
    }

    pub fn file(mut self, name: &str, filename: &str, bytes: &[u8]) -> Self {
        write!(
            self.body,
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .unwrap();
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn image(self) -> Self {
        self.file("image", "photo.jpg", JPEG_BYTES)
    }

    fn finish(mut self) -> Vec<u8> {
        write!(self.body, "--{BOUNDARY}--\r\n").unwrap();
        self.body
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_form(app: Router, form: MultipartForm, request_id: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/measurements")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(id) = request_id {
        builder = builder.header("x-request-id", id);
    }
    let request = builder.body(Body::from(form.finish())).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
