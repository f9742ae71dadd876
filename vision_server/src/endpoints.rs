//! Endpoints of HTTP server.
//!
use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    body::{Bytes, StreamBody},
    extract::{ConnectInfo, DefaultBodyLimit, Multipart},
    http::{header, HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Response,
    },
    routing::{get, post},
    Extension, Json, Router,
};
use cam_capture::CameraError;
use common::media::FacingMode;
use futures::Stream;
use serde::Serialize;

use crate::{
    app::AppState,
    as_jpeg_stream_item,
    controls::ControlError,
    error::AnalysisError,
    pages::{LIVE_PAGE, UPLOAD_PAGE},
    render::{LiveView, UploadView},
};

/// Uploads are photos, often larger than axum's default limit.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Pause between preview frames.
const PREVIEW_INTERVAL: Duration = Duration::from_millis(66);

/// How often the status stream checks for changed controls.
const CONTROLS_POLL: Duration = Duration::from_millis(250);

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(live_page))
        .route("/upload", get(upload_page))
        .route("/healthcheck", get(healthcheck))
        .route("/stream", get(preview_stream))
        .route("/api/camera/start", post(start_camera))
        .route("/api/camera/switch", post(switch_camera))
        .route("/api/camera/stop", post(stop_camera))
        .route("/api/capture", post(capture))
        .route("/api/analyze", post(analyze))
        .route("/api/annotated", get(annotated))
        .route("/api/status", get(status))
        .route("/api/status/stream", get(status_stream))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(Extension(state))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        let status = match &self {
            AnalysisError::Control(ControlError::Busy) => StatusCode::CONFLICT,
            AnalysisError::Control(ControlError::Unavailable) => StatusCode::SERVICE_UNAVAILABLE,
            AnalysisError::NoFile => StatusCode::BAD_REQUEST,
            AnalysisError::Camera(CameraError::InsecureContext) => StatusCode::FORBIDDEN,
            AnalysisError::Camera(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.kind(),
            message: self.user_message(),
        };

        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct CameraReply {
    facing_mode: FacingMode,
}

/// Health check endpoint.
pub async fn healthcheck() -> &'static str {
    "healthy"
}

pub async fn live_page() -> Html<&'static str> {
    Html(LIVE_PAGE)
}

pub async fn upload_page() -> Html<&'static str> {
    Html(UPLOAD_PAGE)
}

/// Preview of the active camera stream as multipart JPEG.
///
/// Follows camera switches: every frame is taken from whatever stream is active at that time.
pub async fn preview_stream(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    log::info!("Preview stream requested");

    let stream = async_stream::stream! {
        let mut ticker = tokio::time::interval(PREVIEW_INTERVAL);
        loop {
            ticker.tick().await;
            let media = match state.current_stream().await {
                Some(media) => media,
                None => continue,
            };
            match tokio::task::spawn_blocking(move || media.capture()).await {
                Ok(Ok(jpeg)) => {
                    yield Ok::<_, std::io::Error>(as_jpeg_stream_item(&jpeg));
                }
                Ok(Err(err)) => log::debug!("Skipping preview frame: {}", err),
                Err(err) => {
                    log::warn!("Preview capture task failed: {}", err);
                    break;
                }
            }
        }
    };

    // Set body and headers for multipart streaming
    let body = StreamBody::new(stream);
    let headers = [(
        header::CONTENT_TYPE,
        "multipart/x-mixed-replace; boundary=frame",
    )];

    (headers, body)
}

pub async fn start_camera(
    Extension(state): Extension<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<CameraReply>, AnalysisError> {
    let context = state.access_context(peer, forwarded_proto(&headers));
    let facing_mode = state.start_camera(context).await?;
    Ok(Json(CameraReply { facing_mode }))
}

pub async fn switch_camera(
    Extension(state): Extension<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<CameraReply>, AnalysisError> {
    let context = state.access_context(peer, forwarded_proto(&headers));
    let facing_mode = state.switch_camera(context).await?;
    log::info!("Switched camera to {}", facing_mode);
    Ok(Json(CameraReply { facing_mode }))
}

pub async fn stop_camera(
    Extension(state): Extension<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<StatusCode, AnalysisError> {
    let context = state.access_context(peer, forwarded_proto(&headers));
    state.stop_camera(context).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn capture(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<LiveView>, AnalysisError> {
    Ok(Json(state.capture().await?))
}

pub async fn analyze(
    Extension(state): Extension<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadView>, AnalysisError> {
    let upload = read_image_field(&mut multipart).await?;
    Ok(Json(state.analyze(upload).await?))
}

pub async fn annotated(Extension(state): Extension<Arc<AppState>>) -> Response {
    match state.annotated() {
        Some(jpeg) => ([(header::CONTENT_TYPE, "image/jpeg")], jpeg).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn status(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(state.snapshot())
}

/// Status and controls as server-sent events, sent whenever either changes.
pub async fn status_stream(
    Extension(state): Extension<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = async_stream::stream! {
        let mut status_rx = state.status.subscribe();
        let mut ticker = tokio::time::interval(CONTROLS_POLL);
        let mut last_sent = None;

        loop {
            tokio::select! {
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {}
            }

            let snapshot = state.snapshot();
            if last_sent.as_ref() != Some(&snapshot) {
                yield Event::default().json_data(&snapshot).map_err(axum::Error::new);
                last_sent = Some(snapshot);
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Contents of the `image` field of a multipart upload.
async fn read_image_field(multipart: &mut Multipart) -> Result<Bytes, AnalysisError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AnalysisError::Image(err.to_string()))?
    {
        if field.name() == Some("image") {
            log::debug!("Receiving upload {:?}", field.file_name());
            return field
                .bytes()
                .await
                .map_err(|err| AnalysisError::Image(err.to_string()));
        }
    }

    Err(AnalysisError::NoFile)
}

fn forwarded_proto(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod test {
    use common::protocol::{Controls, Status};

    use super::*;
    use crate::app::StatusSnapshot;

    #[test]
    fn test_error_status_codes() {
        let status_of = |err: AnalysisError| err.into_response().status();

        assert_eq!(
            status_of(AnalysisError::Control(ControlError::Busy)),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(AnalysisError::NoFile), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(AnalysisError::Camera(CameraError::InsecureContext)),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(AnalysisError::Camera(CameraError::PermissionDenied)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(AnalysisError::Image("truncated".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_snapshot_json_matches_page_scripts() {
        let snapshot = StatusSnapshot {
            status: Status::ready("Camera ready"),
            controls: Controls {
                capture: true,
                switch_camera: true,
                analyze: false,
            },
        };

        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["status"]["kind"], "ready");
        assert_eq!(json["status"]["message"], "Camera ready");
        assert_eq!(json["controls"]["switch_camera"], true);
        assert_eq!(json["controls"]["analyze"], false);
    }

    #[test]
    fn test_facing_mode_reply() {
        let reply = CameraReply {
            facing_mode: FacingMode::User,
        };
        assert_eq!(
            serde_json::to_string(&reply).unwrap(),
            r#"{"facing_mode":"user"}"#
        );
    }
}
