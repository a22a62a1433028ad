// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Request routing and the upload / retrieval handlers.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use kontrast_core::error::{KontrastError, Result};
use kontrast_core::human_errors::{Severity, humanize_error};
use kontrast_core::{AppConfig, ArtifactKind, Method, RequestId, StoredArtifacts};
use kontrast_enhance::{Enhancer, OutputFormat, encode, render_histogram};

use crate::http::{HttpRequest, HttpResponse};
use crate::multipart::FormData;
use crate::pages::{result_page, upload_page};
use crate::storage::{ArtifactStore, NewArtifacts, content_type_for};

/// Form field carrying the image file.
pub const IMAGE_FIELD: &str = "image";
/// Form field carrying the method keyword.
pub const METHOD_FIELD: &str = "method";

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Where a request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Upload,
    Artifact(ArtifactKind, String),
    MethodNotAllowed,
    NotFound,
}

/// Map a method and path to a route.
pub fn route(method: &str, path: &str) -> Route {
    match (method, path) {
        ("GET", "/") => Route::Home,
        ("POST", "/upload") => Route::Upload,
        (_, "/" | "/upload") => Route::MethodNotAllowed,
        _ => match ArtifactKind::from_path(path) {
            Some((kind, name)) if method == "GET" => Route::Artifact(kind, name.to_string()),
            Some(_) => Route::MethodNotAllowed,
            None => Route::NotFound,
        },
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Everything a handler needs; shared read-only between connections.
#[derive(Debug, Clone)]
pub struct AppState {
    pub enhancer: Enhancer,
    pub store: ArtifactStore,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            enhancer: Enhancer::new(config.enhance),
            store: ArtifactStore::from_config(config),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Process an upload form: validate, enhance, render histograms, persist.
///
/// Nothing is written to disk unless every step before persisting succeeds.
pub fn handle_upload(state: &AppState, request: &HttpRequest) -> Result<StoredArtifacts> {
    let content_type = request.header("content-type").unwrap_or_default();
    if crate::multipart::boundary(content_type).is_none() {
        return Err(KontrastError::MissingFile);
    }
    let form = FormData::parse(content_type, &request.body)?;

    let file = form.file(IMAGE_FIELD).ok_or(KontrastError::MissingFile)?;
    let filename = file.filename.as_deref().unwrap_or_default();
    if filename.is_empty() {
        return Err(KontrastError::EmptySelection);
    }

    debug!(
        filename,
        content_type = file.content_type.as_deref().unwrap_or("unspecified"),
        bytes = file.data.len(),
        "image part received"
    );

    let method_field = form
        .text(METHOD_FIELD)
        .unwrap_or_else(|| Method::default().as_str().to_string());

    let request_id = RequestId::new();
    let result = state.enhancer.enhance_bytes(&file.data, &method_field)?;

    let format = OutputFormat::from_filename(filename);
    let processed = encode(&result.image, format)?;
    let hist_original = render_histogram(&result.original_histogram)?;
    let hist_processed = render_histogram(&result.enhanced_histogram)?;

    let stored = state.store.persist(&NewArtifacts {
        request_id,
        method: result.method,
        upload_filename: filename,
        original: &file.data,
        processed_extension: format.extension(),
        processed: &processed,
        hist_original: &hist_original,
        hist_processed: &hist_processed,
    })?;

    info!(
        request_id = %request_id,
        method = %result.method,
        width = result.image.width(),
        height = result.image.height(),
        "upload enhanced"
    );
    Ok(stored)
}

/// Serve a stored artifact.
pub fn handle_artifact(state: &AppState, kind: ArtifactKind, name: &str) -> Result<HttpResponse> {
    let data = state.store.read(kind, name)?;
    Ok(HttpResponse::new(200, content_type_for(name), data))
}

pub(crate) fn error_response(err: &KontrastError) -> HttpResponse {
    let human = humanize_error(err);
    match human.severity {
        Severity::ClientError => warn!(status = human.status, error = %err, "request rejected"),
        Severity::ServerError => error!(status = human.status, error = %err, "request failed"),
    }
    HttpResponse::error(&human)
}

/// Route a request and produce its response.
///
/// Image work and file I/O run on the blocking pool.
pub async fn dispatch(state: Arc<AppState>, request: HttpRequest) -> HttpResponse {
    let outcome = match route(&request.method, &request.path) {
        Route::Home => Ok(HttpResponse::html(200, upload_page())),
        Route::Upload => {
            let blocking_state = Arc::clone(&state);
            tokio::task::spawn_blocking(move || handle_upload(&blocking_state, &request))
                .await
                .map_err(|e| KontrastError::Server(format!("upload task: {e}")))
                .and_then(|result| result)
                .map(|stored| HttpResponse::html(200, result_page(&stored)))
        }
        Route::Artifact(kind, name) => {
            let blocking_state = Arc::clone(&state);
            tokio::task::spawn_blocking(move || handle_artifact(&blocking_state, kind, &name))
                .await
                .map_err(|e| KontrastError::Server(format!("artifact task: {e}")))
                .and_then(|result| result)
        }
        Route::MethodNotAllowed => {
            let body = serde_json::json!({ "error": "Method not allowed." }).to_string();
            Ok(HttpResponse::new(405, "application/json", body.into_bytes()))
        }
        Route::NotFound => Err(KontrastError::NotFound(request.path.clone())),
    };

    outcome.unwrap_or_else(|err| error_response(&err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    const BOUNDARY: &str = "kontrastTestBoundary";

    fn state_in(dir: &std::path::Path) -> AppState {
        let store = ArtifactStore::new(
            dir.join("uploads"),
            dir.join("processed"),
            dir.join("histograms"),
        );
        store.ensure_dirs().unwrap();
        AppState {
            enhancer: Enhancer::default(),
            store,
            max_upload_bytes: 1 << 20,
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = GrayImage::from_fn(24, 16, |x, y| Luma([(100 + x + y) as u8]));
        encode(&img, OutputFormat::Png).unwrap()
    }

    fn upload_request(file: Option<(&str, &[u8])>, method: Option<&str>) -> HttpRequest {
        let mut body = Vec::new();
        if let Some((filename, data)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        if let Some(method) = method {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"method\"\r\n\r\n{method}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        HttpRequest {
            method: "POST".into(),
            path: "/upload".into(),
            headers: vec![(
                "Content-Type".into(),
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )],
            body,
        }
    }

    fn file_count(dir: &std::path::Path) -> usize {
        ["uploads", "processed", "histograms"]
            .iter()
            .map(|sub| std::fs::read_dir(dir.join(sub)).unwrap().count())
            .sum()
    }

    #[test]
    fn routes_are_matched() {
        assert_eq!(route("GET", "/"), Route::Home);
        assert_eq!(route("POST", "/upload"), Route::Upload);
        assert_eq!(route("GET", "/upload"), Route::MethodNotAllowed);
        assert_eq!(route("DELETE", "/"), Route::MethodNotAllowed);
        assert_eq!(
            route("GET", "/static/histograms/h.png"),
            Route::Artifact(ArtifactKind::Histogram, "h.png".into())
        );
        assert_eq!(route("POST", "/static/uploads/a.png"), Route::MethodNotAllowed);
        assert_eq!(route("GET", "/elsewhere"), Route::NotFound);
    }

    #[test]
    fn successful_upload_writes_four_files() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        let png = png_bytes();

        let stored =
            handle_upload(&state, &upload_request(Some(("scan.png", png.as_slice())), Some("CLAHE"))).unwrap();

        assert_eq!(stored.method, Method::Clahe);
        assert!(stored.processed.ends_with(".png"));
        assert_eq!(file_count(dir.path()), 4);

        let processed = state.store.read(ArtifactKind::Processed, &stored.processed).unwrap();
        let decoded = image::load_from_memory(&processed).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (24, 16));
    }

    #[test]
    fn missing_method_defaults_to_he() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        let png = png_bytes();
        let stored = handle_upload(&state, &upload_request(Some(("a.png", png.as_slice())), None)).unwrap();
        assert_eq!(stored.method, Method::HistogramEqualization);
    }

    #[test]
    fn invalid_method_writes_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        let png = png_bytes();

        let err = handle_upload(&state, &upload_request(Some(("a.png", png.as_slice())), Some("XYZ")))
            .unwrap_err();
        assert!(matches!(err, KontrastError::InvalidMethod(_)));
        assert_eq!(humanize_error(&err).message, "Invalid enhancement method.");
        assert_eq!(file_count(dir.path()), 0);
    }

    #[test]
    fn missing_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        let err = handle_upload(&state, &upload_request(None, Some("HE"))).unwrap_err();
        assert!(matches!(err, KontrastError::MissingFile));
        assert_eq!(file_count(dir.path()), 0);
    }

    #[test]
    fn non_multipart_body_is_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        let request = HttpRequest {
            method: "POST".into(),
            path: "/upload".into(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: b"{}".to_vec(),
        };
        assert!(matches!(
            handle_upload(&state, &request),
            Err(KontrastError::MissingFile)
        ));
    }

    #[test]
    fn empty_selection_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        let err = handle_upload(&state, &upload_request(Some(("", &b""[..])), Some("HE"))).unwrap_err();
        assert!(matches!(err, KontrastError::EmptySelection));
        assert_eq!(file_count(dir.path()), 0);
    }

    #[test]
    fn undecodable_upload_writes_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        let err = handle_upload(
            &state,
            &upload_request(Some(("a.png", &b"definitely not a png"[..])), Some("AHE")),
        )
        .unwrap_err();
        assert!(matches!(err, KontrastError::Decode(_)));
        assert_eq!(file_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn dispatch_serves_form_and_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(state_in(dir.path()));
        let png = png_bytes();

        let home = dispatch(
            Arc::clone(&state),
            HttpRequest {
                method: "GET".into(),
                path: "/".into(),
                headers: Vec::new(),
                body: Vec::new(),
            },
        )
        .await;
        assert_eq!(home.status, 200);

        let stored =
            handle_upload(&state, &upload_request(Some(("a.png", png.as_slice())), Some("HE"))).unwrap();
        let hist = dispatch(
            Arc::clone(&state),
            HttpRequest {
                method: "GET".into(),
                path: format!("/static/histograms/{}", stored.hist_processed),
                headers: Vec::new(),
                body: Vec::new(),
            },
        )
        .await;
        assert_eq!(hist.status, 200);
        assert_eq!(hist.content_type, "image/png");
    }

    #[tokio::test]
    async fn dispatch_maps_errors_to_json() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(state_in(dir.path()));

        let response = dispatch(Arc::clone(&state), upload_request(None, None)).await;
        assert_eq!(response.status, 400);
        let value: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(value["error"], "No image file");

        let traversal = dispatch(
            Arc::clone(&state),
            HttpRequest {
                method: "GET".into(),
                path: "/static/uploads/../secret".into(),
                headers: Vec::new(),
                body: Vec::new(),
            },
        )
        .await;
        assert_eq!(traversal.status, 404);
    }
}
