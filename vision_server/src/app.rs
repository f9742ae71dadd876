//! State and operations behind the two pages.
//!
use std::{net::SocketAddr, sync::Arc};

use bytes::Bytes;
use cam_capture::{AccessContext, CameraController, MediaProvider, MediaStream};
use common::{
    media::FacingMode,
    protocol::{Controls, Status},
    status::StatusIndicator,
};
use serde::Serialize;
use tokio::sync::{Mutex, OnceCell};

use crate::{
    capture::{encode_jpeg, FrameCapturer},
    controls::{ControlError, ControlPanel},
    error::AnalysisError,
    loader::load_image,
    models::{ClassifierOptions, DetectorOptions, ModelError, ModelProvider, Models},
    render::{draw_detections, LiveView, ResultBoard, UploadView, ANALYZING},
};

/// What the status indicator and the buttons of a page should show.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub status: Status,
    pub controls: Controls,
}

/// Everything the endpoints share.
pub struct AppState {
    pub status: StatusIndicator,
    pub controls: ControlPanel,
    camera: Mutex<CameraController>,
    models: OnceCell<Models>,
    capturer: FrameCapturer,
    live_results: ResultBoard<LiveView>,
    upload_results: ResultBoard<UploadView>,
    annotated: ResultBoard<Bytes>,
    trust_remote: bool,
}

impl AppState {
    pub fn new(media: Arc<dyn MediaProvider>, facing_mode: FacingMode, trust_remote: bool) -> Self {
        let status = StatusIndicator::default();
        let camera = CameraController::new(media, facing_mode, status.clone());

        Self {
            status,
            controls: ControlPanel::new(),
            camera: Mutex::new(camera),
            models: OnceCell::new(),
            capturer: FrameCapturer::default(),
            live_results: ResultBoard::new(),
            upload_results: ResultBoard::new(),
            annotated: ResultBoard::new(),
            trust_remote,
        }
    }

    /// Load the models. Capture and analyze stay disabled until this succeeds, and for the
    /// rest of the session if it fails.
    pub async fn load_models(
        &self,
        provider: &dyn ModelProvider,
        classifier: ClassifierOptions,
        detector: DetectorOptions,
    ) -> Result<(), ModelError> {
        self.controls.capture.set_available(false);
        self.controls.analyze.set_available(false);

        let models = Models::load_all(provider, classifier, detector, &self.status).await?;
        if self.models.set(models).is_err() {
            log::warn!("Models were already loaded, keeping the first ones");
        }

        self.controls.capture.set_available(true);
        self.controls.analyze.set_available(true);
        Ok(())
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            status: self.status.current(),
            controls: self.controls.snapshot(),
        }
    }

    /// Whether a request from `peer` may operate the camera.
    pub fn access_context(&self, peer: SocketAddr, forwarded_proto: Option<&str>) -> AccessContext {
        let behind_tls = forwarded_proto.map_or(false, |proto| proto.eq_ignore_ascii_case("https"));
        match self.trust_remote || peer.ip().is_loopback() || behind_tls {
            true => AccessContext::Secure,
            false => AccessContext::Insecure,
        }
    }

    /// Start the camera with the current facing mode.
    pub async fn start_camera(&self, context: AccessContext) -> Result<FacingMode, AnalysisError> {
        let _guard = self.controls.switch_camera.try_acquire()?;
        let mut camera = self.camera.lock().await;
        let facing_mode = camera.facing_mode();
        camera.start(facing_mode, context).await?;
        Ok(facing_mode)
    }

    pub async fn switch_camera(&self, context: AccessContext) -> Result<FacingMode, AnalysisError> {
        let _guard = self.controls.switch_camera.try_acquire()?;
        let mut camera = self.camera.lock().await;
        Ok(camera.switch_facing(context).await?)
    }

    pub async fn stop_camera(&self, context: AccessContext) -> Result<(), AnalysisError> {
        Ok(self.camera.lock().await.stop(context).await?)
    }

    pub async fn current_stream(&self) -> Option<Arc<dyn MediaStream>> {
        self.camera.lock().await.current_stream()
    }

    /// Classify the current camera frame.
    ///
    /// Only a disabled control is an error here. A failed capture or inference is rendered as
    /// such, with the confidence reset to zero.
    pub async fn capture(&self) -> Result<LiveView, AnalysisError> {
        let _guard = self.controls.capture.try_acquire()?;
        let models = self.models()?;
        self.live_results.clear();
        self.status.set(Status::loading("Classifying..."));

        let classified = async {
            let stream = self.current_stream().await.ok_or(AnalysisError::NoStream)?;
            let frame = self.capturer.capture(stream).await?;
            Ok::<_, AnalysisError>(models.classify(Arc::new(frame)).await?)
        }
        .await;

        let view = match classified {
            Ok(predictions) => {
                log::info!("Classified frame: {:?}", predictions.first());
                self.status.set(Status::ready("Camera ready"));
                LiveView::from_predictions(&predictions)
            }
            Err(err) => {
                log::error!("Error in classification: {}", err);
                self.status.set(Status::error(err.user_message()));
                LiveView::failed()
            }
        };

        Ok(self.live_results.show(view))
    }

    /// Classify and detect objects on an uploaded image. Both models run concurrently and
    /// both must finish before anything is shown.
    pub async fn analyze(&self, upload: Bytes) -> Result<UploadView, AnalysisError> {
        if upload.is_empty() {
            return Err(AnalysisError::NoFile);
        }
        let _guard = self.controls.analyze.try_acquire()?;
        let models = self.models()?;
        self.upload_results.clear();
        self.annotated.clear();
        self.status.set(Status::loading(ANALYZING));

        let analyzed = async {
            let image = Arc::new(tokio::task::spawn_blocking(move || load_image(&upload)).await??);

            let (classified, detected) = tokio::join!(
                models.classify(Arc::clone(&image)),
                models.detect(Arc::clone(&image))
            );
            let (predictions, detections) = (classified?, detected?);

            let annotated = tokio::task::spawn_blocking({
                let detections = detections.clone();
                move || encode_jpeg(&draw_detections(&image, &detections))
            })
            .await??;

            Ok::<_, AnalysisError>((predictions, detections, annotated))
        }
        .await;

        match analyzed {
            Ok((predictions, detections, annotated)) => {
                log::info!(
                    "Analyzed upload: {} predictions, {} detections",
                    predictions.len(),
                    detections.len()
                );
                self.annotated.show(Bytes::from(annotated));
                self.status.set(Status::ready("Analysis complete"));
                Ok(self
                    .upload_results
                    .show(UploadView::render(&predictions, &detections)))
            }
            Err(err) => {
                log::error!("Error analyzing upload: {}", err);
                self.status.set(Status::error(err.user_message()));
                Err(err)
            }
        }
    }

    pub fn live_view(&self) -> Option<LiveView> {
        self.live_results.current()
    }

    pub fn upload_view(&self) -> Option<UploadView> {
        self.upload_results.current()
    }

    /// Detections drawn on the last analyzed upload, JPEG encoded.
    pub fn annotated(&self) -> Option<Bytes> {
        self.annotated.current()
    }

    /// Release the camera.
    pub async fn shutdown(&self) {
        self.camera.lock().await.shutdown().await;
    }

    fn models(&self) -> Result<&Models, AnalysisError> {
        self.models
            .get()
            .ok_or(AnalysisError::Control(ControlError::Unavailable))
    }
}
