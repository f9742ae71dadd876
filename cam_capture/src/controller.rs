//! Camera lifecycle.
//!
use std::sync::Arc;

use common::{
    media::{FacingMode, StreamConstraints},
    protocol::Status,
    status::StatusIndicator,
};

use crate::{CameraError, MediaProvider, MediaStream};

/// Whether the party asking for the camera may have it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AccessContext {
    Secure,
    Insecure,
}

/// The active stream together with the facing mode it was opened for.
pub struct CaptureSession {
    stream: Arc<dyn MediaStream>,
    facing_mode: FacingMode,
}

impl CaptureSession {
    pub fn stream(&self) -> Arc<dyn MediaStream> {
        Arc::clone(&self.stream)
    }

    pub fn facing_mode(&self) -> FacingMode {
        self.facing_mode
    }

    fn release(self) {
        self.stream.stop();
        log::info!("Capture session ({}) closed", self.facing_mode);
    }
}

/// Owns the single active camera stream.
///
/// At most one [`CaptureSession`] exists at a time. Starting a new one always stops the
/// previous stream first so its device is free before the next one is opened.
pub struct CameraController {
    provider: Arc<dyn MediaProvider>,
    facing_mode: FacingMode,
    session: Option<CaptureSession>,
    status: StatusIndicator,
}

impl CameraController {
    pub fn new(
        provider: Arc<dyn MediaProvider>,
        facing_mode: FacingMode,
        status: StatusIndicator,
    ) -> Self {
        Self {
            provider,
            facing_mode,
            session: None,
            status,
        }
    }

    /// Facing mode of the current or next session.
    pub fn facing_mode(&self) -> FacingMode {
        self.facing_mode
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    pub fn current_stream(&self) -> Option<Arc<dyn MediaStream>> {
        self.session.as_ref().map(CaptureSession::stream)
    }

    /// Open a stream for `facing_mode`, replacing the current one.
    pub async fn start(
        &mut self,
        facing_mode: FacingMode,
        context: AccessContext,
    ) -> Result<(), CameraError> {
        // Refused before the current session or facing mode is touched
        if context == AccessContext::Insecure {
            return self.fail(CameraError::InsecureContext);
        }

        self.status.set(Status::loading("Starting camera..."));
        self.facing_mode = facing_mode;
        self.release().await;

        let provider = Arc::clone(&self.provider);
        let constraints = StreamConstraints::new(facing_mode);
        let opened = tokio::task::spawn_blocking(move || provider.open(&constraints))
            .await
            .unwrap_or_else(|err| Err(CameraError::Device(err.to_string())));

        match opened {
            Ok(stream) => {
                self.session = Some(CaptureSession {
                    stream,
                    facing_mode,
                });
                log::info!("Capture session ({}) started", facing_mode);
                self.status.set(Status::ready("Camera ready"));
                Ok(())
            }
            Err(err) => self.fail(err),
        }
    }

    /// Toggle between front and back camera and start the other one.
    ///
    /// The facing mode flips even if the new camera fails to start.
    pub async fn switch_facing(&mut self, context: AccessContext) -> Result<FacingMode, CameraError> {
        let next = self.facing_mode.toggled();
        self.start(next, context).await?;
        Ok(next)
    }

    /// Release the camera.
    pub async fn stop(&mut self, context: AccessContext) -> Result<(), CameraError> {
        if context == AccessContext::Insecure {
            return Err(CameraError::InsecureContext);
        }
        self.release().await;
        Ok(())
    }

    /// Release the camera without an access check, for shutting down.
    pub async fn shutdown(&mut self) {
        self.release().await;
    }

    async fn release(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(err) = tokio::task::spawn_blocking(move || session.release()).await {
                log::warn!("Releasing the camera failed: {}", err);
            }
        }
    }

    fn fail(&mut self, err: CameraError) -> Result<(), CameraError> {
        log::error!("Error accessing the camera: {}", err);
        self.status.set(Status::error(err.user_message()));
        Err(err)
    }
}

impl Drop for CameraController {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.release();
        }
    }
}
