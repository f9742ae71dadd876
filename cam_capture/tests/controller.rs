use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

use cam_capture::{
    AccessContext, CameraController, CameraError, MediaProvider, MediaStream,
};
use common::{
    media::{FacingMode, StreamConstraints},
    protocol::StatusKind,
    status::StatusIndicator,
};

/// Provider handing out fake streams and counting how many of them are running.
#[derive(Default)]
struct FakeProvider {
    active: Arc<AtomicUsize>,
    opened: Mutex<Vec<FacingMode>>,
    denied: Option<FacingMode>,
    missing: Option<FacingMode>,
    /// How long releasing a stream blocks.
    stop_delay: Duration,
}

impl FakeProvider {
    fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn opened(&self) -> Vec<FacingMode> {
        self.opened.lock().unwrap().clone()
    }
}

struct FakeStream {
    active: AtomicBool,
    counter: Arc<AtomicUsize>,
    stop_delay: Duration,
}

impl MediaStream for FakeStream {
    fn capture(&self) -> Result<Vec<u8>, CameraError> {
        match self.active.load(Ordering::SeqCst) {
            true => Ok(vec![0xFF, 0xD8, 0xFF, 0xD9]),
            false => Err(CameraError::Stopped),
        }
    }

    fn stop(&self) {
        std::thread::sleep(self.stop_delay);
        if self.active.swap(false, Ordering::SeqCst) {
            self.counter.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl MediaProvider for FakeProvider {
    fn open(&self, constraints: &StreamConstraints) -> Result<Arc<dyn MediaStream>, CameraError> {
        assert_eq!(
            self.active(),
            0,
            "previous stream must be released before opening a new one"
        );
        self.opened.lock().unwrap().push(constraints.facing_mode);

        if self.denied == Some(constraints.facing_mode) {
            return Err(CameraError::PermissionDenied);
        }
        if self.missing == Some(constraints.facing_mode) {
            return Err(CameraError::DeviceNotFound("/dev/video1".into()));
        }

        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeStream {
            active: AtomicBool::new(true),
            counter: Arc::clone(&self.active),
            stop_delay: self.stop_delay,
        }))
    }
}

fn controller(provider: &Arc<FakeProvider>) -> (CameraController, StatusIndicator) {
    let status = StatusIndicator::default();
    let media: Arc<dyn MediaProvider> = provider.clone();
    (
        CameraController::new(media, FacingMode::Environment, status.clone()),
        status,
    )
}

#[tokio::test]
async fn test_start_opens_one_stream_and_reports_ready() {
    let provider = Arc::new(FakeProvider::default());
    let (mut camera, status) = controller(&provider);

    camera
        .start(FacingMode::Environment, AccessContext::Secure)
        .await
        .unwrap();

    assert_eq!(provider.active(), 1);
    assert_eq!(status.current().kind, StatusKind::Ready);
    assert_eq!(status.current().message, "Camera ready");
    assert!(camera.current_stream().unwrap().capture().is_ok());
}

#[tokio::test]
async fn test_switching_keeps_exactly_one_active_stream() {
    let provider = Arc::new(FakeProvider::default());
    let (mut camera, _status) = controller(&provider);

    camera
        .start(FacingMode::Environment, AccessContext::Secure)
        .await
        .unwrap();
    let first = camera.current_stream().unwrap();

    for _ in 0..5 {
        camera.switch_facing(AccessContext::Secure).await.unwrap();
        assert_eq!(provider.active(), 1);
    }

    assert!(!first.is_active());
    assert!(matches!(first.capture(), Err(CameraError::Stopped)));
    assert_eq!(camera.facing_mode(), FacingMode::User);
    assert_eq!(
        provider.opened(),
        vec![
            FacingMode::Environment,
            FacingMode::User,
            FacingMode::Environment,
            FacingMode::User,
            FacingMode::Environment,
            FacingMode::User,
        ]
    );
}

#[tokio::test]
async fn test_permission_denied_reports_its_own_message() {
    let provider = Arc::new(FakeProvider {
        denied: Some(FacingMode::Environment),
        ..Default::default()
    });
    let (mut camera, status) = controller(&provider);

    let err = camera
        .start(FacingMode::Environment, AccessContext::Secure)
        .await
        .unwrap_err();

    assert!(matches!(err, CameraError::PermissionDenied));
    assert!(camera.session().is_none());
    assert_eq!(status.current().kind, StatusKind::Error);
    assert_eq!(status.current().message, err.user_message());
}

#[tokio::test]
async fn test_failed_switch_releases_previous_stream() {
    let provider = Arc::new(FakeProvider {
        missing: Some(FacingMode::User),
        ..Default::default()
    });
    let (mut camera, status) = controller(&provider);

    camera
        .start(FacingMode::Environment, AccessContext::Secure)
        .await
        .unwrap();
    let err = camera.switch_facing(AccessContext::Secure).await.unwrap_err();

    assert!(matches!(err, CameraError::DeviceNotFound(_)));
    assert_eq!(provider.active(), 0);
    assert_eq!(camera.facing_mode(), FacingMode::User);
    assert_eq!(status.current().message, "No camera found on this device.");
}

#[tokio::test]
async fn test_insecure_context_never_touches_the_device() {
    let provider = Arc::new(FakeProvider::default());
    let (mut camera, status) = controller(&provider);

    let err = camera
        .start(FacingMode::Environment, AccessContext::Insecure)
        .await
        .unwrap_err();

    assert!(matches!(err, CameraError::InsecureContext));
    assert!(provider.opened().is_empty());
    assert_eq!(status.current().kind, StatusKind::Error);
}

#[tokio::test]
async fn test_insecure_requests_keep_the_running_stream() {
    let provider = Arc::new(FakeProvider::default());
    let (mut camera, _status) = controller(&provider);
    camera
        .start(FacingMode::Environment, AccessContext::Secure)
        .await
        .unwrap();

    let err = camera
        .switch_facing(AccessContext::Insecure)
        .await
        .unwrap_err();
    assert!(matches!(err, CameraError::InsecureContext));
    assert_eq!(provider.active(), 1);
    assert_eq!(camera.facing_mode(), FacingMode::Environment);

    let err = camera.stop(AccessContext::Insecure).await.unwrap_err();
    assert!(matches!(err, CameraError::InsecureContext));
    assert_eq!(provider.active(), 1);
    assert!(camera.current_stream().unwrap().is_active());
    assert_eq!(provider.opened(), vec![FacingMode::Environment]);
}

#[tokio::test]
async fn test_slow_release_does_not_block_other_tasks() {
    let provider = Arc::new(FakeProvider {
        stop_delay: Duration::from_millis(300),
        ..Default::default()
    });
    let (mut camera, _status) = controller(&provider);
    camera
        .start(FacingMode::Environment, AccessContext::Secure)
        .await
        .unwrap();

    let ticks = Arc::new(AtomicUsize::new(0));
    let ticker = {
        let ticks = Arc::clone(&ticks);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(10));
            loop {
                interval.tick().await;
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        })
    };
    tokio::task::yield_now().await;

    let started = Instant::now();
    let before = ticks.load(Ordering::SeqCst);
    camera.switch_facing(AccessContext::Secure).await.unwrap();
    let during = ticks.load(Ordering::SeqCst) - before;
    ticker.abort();

    assert!(started.elapsed() >= Duration::from_millis(300));
    assert!(during >= 5, "only {during} ticks while releasing the camera");
    assert_eq!(provider.active(), 1);
}

#[tokio::test]
async fn test_stop_and_drop_release_the_camera() {
    let provider = Arc::new(FakeProvider::default());

    let (mut camera, _status) = controller(&provider);
    camera
        .start(FacingMode::Environment, AccessContext::Secure)
        .await
        .unwrap();
    camera.stop(AccessContext::Secure).await.unwrap();
    assert_eq!(provider.active(), 0);
    assert!(camera.current_stream().is_none());

    camera
        .start(FacingMode::User, AccessContext::Secure)
        .await
        .unwrap();
    assert_eq!(provider.active(), 1);
    drop(camera);
    assert_eq!(provider.active(), 0);
}
