/// Capture session: one microphone take from request to finished blob
///
/// Idle -> Requesting -> Recording -> Stopped. The chunk buffer belongs to the
/// session alone; the microphone only ever sees the sending half of a channel.

use crate::config::CaptureConfig;
use crate::core::object_url::{ObjectUrl, ObjectUrlTable};
use crate::db::Blob;
use crate::error::{Result, SoundboardError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, info, warn};

/// Where a capture session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Idle,
    Requesting,
    Recording,
    Stopped,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CaptureState::Idle => "idle",
            CaptureState::Requesting => "requesting",
            CaptureState::Recording => "recording",
            CaptureState::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

/// What the capture device pushes while a take is running
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Encoded audio, in arrival order
    Data(Vec<u8>),
    /// The device broke; nothing after this is trustworthy
    Error(String),
}

/// Why the microphone could not be opened
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("permission refused: {0}")]
    Denied(String),
    #[error("device unavailable: {0}")]
    Device(String),
}

/// One underlying media track. Stopping it releases the hardware.
pub trait Track: Send + Sync {
    fn stop(&self);
    fn is_live(&self) -> bool;
}

/// A granted microphone: its event feed plus the tracks to shut down later
pub struct InputStream {
    events: mpsc::UnboundedReceiver<CaptureEvent>,
    tracks: Vec<Arc<dyn Track>>,
}

impl InputStream {
    pub fn new(events: mpsc::UnboundedReceiver<CaptureEvent>, tracks: Vec<Arc<dyn Track>>) -> Self {
        Self { events, tracks }
    }

    fn stop_tracks(&mut self) {
        for track in &self.tracks {
            if track.is_live() {
                track.stop();
            }
        }
        // Nothing sent after this point belongs to the take
        self.events.close();
    }
}

/// Source of microphone access (may wait on a permission prompt)
#[async_trait]
pub trait Microphone: Send + Sync {
    async fn request_access(&self) -> std::result::Result<InputStream, AccessError>;
}

/// Numbers about the last finished take
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureSummary {
    pub chunks: usize,
    pub bytes: usize,
    pub duration_ms: i64,
    pub finished_at: DateTime<Utc>,
}

struct ActiveCapture {
    stream: InputStream,
    chunks: Vec<Vec<u8>>,
    started_at: DateTime<Utc>,
    failure: Option<String>,
}

impl ActiveCapture {
    fn new(stream: InputStream) -> Self {
        Self {
            stream,
            chunks: Vec::new(),
            started_at: Utc::now(),
            failure: None,
        }
    }

    /// Move whatever has arrived into the buffer. Stops at the first error.
    fn drain(&mut self) -> usize {
        let mut received = 0;
        while self.failure.is_none() {
            match self.stream.events.try_recv() {
                Ok(CaptureEvent::Data(bytes)) => {
                    if !bytes.is_empty() {
                        self.chunks.push(bytes);
                        received += 1;
                    }
                }
                Ok(CaptureEvent::Error(reason)) => self.failure = Some(reason),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        received
    }
}

pub struct CaptureSession {
    microphone: Arc<dyn Microphone>,
    urls: ObjectUrlTable,
    config: CaptureConfig,
    state: CaptureState,
    active: Option<ActiveCapture>,
    captured: Option<Arc<Blob>>,
    preview: Option<ObjectUrl>,
    summary: Option<CaptureSummary>,
}

impl CaptureSession {
    pub fn new(microphone: Arc<dyn Microphone>, urls: ObjectUrlTable) -> Self {
        Self::with_config(microphone, urls, CaptureConfig::default())
    }

    pub fn with_config(
        microphone: Arc<dyn Microphone>,
        urls: ObjectUrlTable,
        config: CaptureConfig,
    ) -> Self {
        Self {
            microphone,
            urls,
            config,
            state: CaptureState::Idle,
            active: None,
            captured: None,
            preview: None,
            summary: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// The finished recording, if the last take completed
    pub fn captured_blob(&self) -> Option<&Blob> {
        self.captured.as_deref()
    }

    /// Playable reference to the finished recording
    pub fn preview_url(&self) -> Option<&ObjectUrl> {
        self.preview.as_ref()
    }

    pub fn last_summary(&self) -> Option<&CaptureSummary> {
        self.summary.as_ref()
    }

    /// Ask for the microphone and begin buffering.
    ///
    /// A previous take (and its preview reference) is replaced once access
    /// is granted. On refusal the previous take is kept, the session goes
    /// back to `Stopped` (or `Idle` if there was none) and can be retried.
    pub async fn start(&mut self) -> Result<()> {
        if self.state == CaptureState::Recording {
            return Err(SoundboardError::InvalidStateTransition {
                state: self.state,
                action: "start",
            });
        }

        self.state = CaptureState::Requesting;
        debug!("requesting microphone");

        match self.microphone.request_access().await {
            Ok(stream) => {
                self.clear_take();
                self.active = Some(ActiveCapture::new(stream));
                self.state = CaptureState::Recording;
                info!("recording started");
                Ok(())
            }
            Err(e) => {
                self.state = if self.captured.is_some() {
                    CaptureState::Stopped
                } else {
                    CaptureState::Idle
                };
                warn!(error = %e, "microphone access refused");
                Err(SoundboardError::PermissionDenied(e.to_string()))
            }
        }
    }

    /// Pull chunks that arrived since the last call into the buffer.
    ///
    /// Surfaces a device failure as soon as it shows up; the take is lost.
    pub fn poll_chunks(&mut self) -> Result<usize> {
        let Some(active) = self.active.as_mut() else {
            return Ok(0);
        };

        let received = active.drain();
        if let Some(reason) = active.failure.take() {
            self.abort(&reason);
            return Err(SoundboardError::DeviceFailure(reason));
        }
        Ok(received)
    }

    /// Finish the take: one blob, all tracks released.
    ///
    /// Does nothing (returns `Ok(None)`) unless currently recording.
    pub fn stop(&mut self) -> Result<Option<&Blob>> {
        if self.state != CaptureState::Recording {
            debug!(state = %self.state, "stop ignored");
            return Ok(None);
        }
        let Some(mut active) = self.active.take() else {
            self.state = CaptureState::Idle;
            return Ok(None);
        };

        active.drain();
        active.stream.stop_tracks();

        if let Some(reason) = active.failure {
            self.state = CaptureState::Idle;
            warn!(reason = %reason, "recording lost to device failure");
            return Err(SoundboardError::DeviceFailure(reason));
        }

        let finished_at = Utc::now();
        let summary = CaptureSummary {
            chunks: active.chunks.len(),
            bytes: active.chunks.iter().map(Vec::len).sum(),
            duration_ms: (finished_at - active.started_at).num_milliseconds(),
            finished_at,
        };
        let blob = Arc::new(Blob::new(self.config.mime_type.clone(), active.chunks.concat()));

        info!(
            chunks = summary.chunks,
            bytes = summary.bytes,
            duration_ms = summary.duration_ms,
            "recording stopped"
        );

        self.preview = Some(self.urls.create(Arc::clone(&blob)));
        self.captured = Some(blob);
        self.summary = Some(summary);
        self.state = CaptureState::Stopped;
        Ok(self.captured.as_deref())
    }

    /// Hand the finished recording over (e.g. into a new item).
    ///
    /// The preview reference is released with it.
    pub fn take_captured(&mut self) -> Option<Blob> {
        self.release_preview();
        self.captured
            .take()
            .map(|blob| Arc::try_unwrap(blob).unwrap_or_else(|shared| (*shared).clone()))
    }

    /// Revoke the preview reference, if any
    pub fn release_preview(&mut self) -> bool {
        match self.preview.take() {
            Some(url) => self.urls.revoke(&url),
            None => false,
        }
    }

    /// Abandon whatever is going on and go back to `Idle`
    pub fn reset(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.stream.stop_tracks();
        }
        self.clear_take();
        self.state = CaptureState::Idle;
    }

    fn clear_take(&mut self) {
        self.release_preview();
        self.captured = None;
        self.summary = None;
    }

    fn abort(&mut self, reason: &str) {
        if let Some(mut active) = self.active.take() {
            active.stream.stop_tracks();
        }
        self.state = CaptureState::Idle;
        warn!(reason = %reason, "recording lost to device failure");
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.stream.stop_tracks();
        }
        self.release_preview();
    }
}

impl fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSession")
            .field("state", &self.state)
            .field("captured_bytes", &self.captured.as_ref().map(|b| b.len()))
            .field("preview", &self.preview)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeTrack {
        live: AtomicBool,
    }

    impl Track for FakeTrack {
        fn stop(&self) {
            self.live.store(false, Ordering::SeqCst);
        }

        fn is_live(&self) -> bool {
            self.live.load(Ordering::SeqCst)
        }
    }

    /// Microphone driven by the test: grants or denies, then lets the test
    /// push events into the current take
    #[derive(Default)]
    struct FakeMicrophone {
        deny: AtomicBool,
        requests: AtomicUsize,
        sender: Mutex<Option<mpsc::UnboundedSender<CaptureEvent>>>,
        tracks: Mutex<Vec<Arc<FakeTrack>>>,
    }

    impl FakeMicrophone {
        fn denying() -> Self {
            let mic = Self::default();
            mic.deny.store(true, Ordering::SeqCst);
            mic
        }

        fn push(&self, event: CaptureEvent) {
            if let Some(sender) = self.sender.lock().unwrap().as_ref() {
                // Rejected once the session has closed the feed
                let _ = sender.send(event);
            }
        }

        fn feed(&self, bytes: &[u8]) {
            self.push(CaptureEvent::Data(bytes.to_vec()));
        }

        fn live_tracks(&self) -> usize {
            self.tracks
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.is_live())
                .count()
        }
    }

    #[async_trait]
    impl Microphone for FakeMicrophone {
        async fn request_access(&self) -> std::result::Result<InputStream, AccessError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if self.deny.load(Ordering::SeqCst) {
                return Err(AccessError::Denied("NotAllowedError".to_string()));
            }

            let (tx, rx) = mpsc::unbounded_channel();
            *self.sender.lock().unwrap() = Some(tx);

            let left = Arc::new(FakeTrack {
                live: AtomicBool::new(true),
            });
            let right = Arc::new(FakeTrack {
                live: AtomicBool::new(true),
            });
            self.tracks.lock().unwrap().extend([left.clone(), right.clone()]);

            let tracks: Vec<Arc<dyn Track>> = vec![left, right];
            Ok(InputStream::new(rx, tracks))
        }
    }

    fn session_with(mic: &Arc<FakeMicrophone>) -> (CaptureSession, ObjectUrlTable) {
        let urls = ObjectUrlTable::new();
        let session = CaptureSession::new(mic.clone(), urls.clone());
        (session, urls)
    }

    #[tokio::test]
    async fn test_stop_before_start_is_noop() {
        let mic = Arc::new(FakeMicrophone::default());
        let (mut session, urls) = session_with(&mic);

        assert!(session.stop().unwrap().is_none());
        assert_eq!(session.state(), CaptureState::Idle);
        assert!(session.captured_blob().is_none());
        assert_eq!(urls.live_count(), 0);
        assert_eq!(mic.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_start_stop_concatenates_in_order() {
        let mic = Arc::new(FakeMicrophone::default());
        let (mut session, urls) = session_with(&mic);

        session.start().await.unwrap();
        assert_eq!(session.state(), CaptureState::Recording);

        mic.feed(b"one-");
        mic.feed(b"two-");
        assert_eq!(session.poll_chunks().unwrap(), 2);
        mic.feed(b"three");

        let blob = session.stop().unwrap().unwrap().clone();
        assert_eq!(blob.data, b"one-two-three".to_vec());
        assert_eq!(blob.mime_type, "audio/webm");
        assert_eq!(session.state(), CaptureState::Stopped);

        let summary = session.last_summary().unwrap();
        assert_eq!(summary.chunks, 3);
        assert_eq!(summary.bytes, 13);

        let preview = session.preview_url().unwrap().clone();
        assert_eq!(*urls.resolve(&preview).unwrap(), blob);
    }

    #[tokio::test]
    async fn test_stop_releases_every_track() {
        let mic = Arc::new(FakeMicrophone::default());
        let (mut session, _urls) = session_with(&mic);

        session.start().await.unwrap();
        assert_eq!(mic.live_tracks(), 2);

        session.stop().unwrap();
        assert_eq!(mic.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_chunks_after_stop_are_ignored() {
        let mic = Arc::new(FakeMicrophone::default());
        let (mut session, _urls) = session_with(&mic);

        session.start().await.unwrap();
        mic.feed(b"kept");
        session.stop().unwrap();
        mic.feed(b"late");

        assert!(session.stop().unwrap().is_none());
        assert_eq!(session.captured_blob().unwrap().data, b"kept".to_vec());
    }

    #[tokio::test]
    async fn test_permission_denied_returns_to_idle() {
        let mic = Arc::new(FakeMicrophone::denying());
        let (mut session, _urls) = session_with(&mic);

        match session.start().await {
            Err(SoundboardError::PermissionDenied(reason)) => {
                assert!(reason.contains("NotAllowedError"))
            }
            other => panic!("Expected PermissionDenied, got {:?}", other),
        }
        assert_eq!(session.state(), CaptureState::Idle);

        // Granted on the second try
        mic.deny.store(false, Ordering::SeqCst);
        session.start().await.unwrap();
        assert_eq!(session.state(), CaptureState::Recording);
        assert_eq!(mic.requests.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_start_while_recording_is_rejected() {
        let mic = Arc::new(FakeMicrophone::default());
        let (mut session, _urls) = session_with(&mic);

        session.start().await.unwrap();
        mic.feed(b"abc");

        match session.start().await {
            Err(SoundboardError::InvalidStateTransition { state, action }) => {
                assert_eq!(state, CaptureState::Recording);
                assert_eq!(action, "start");
            }
            other => panic!("Expected InvalidStateTransition, got {:?}", other),
        }

        assert_eq!(session.state(), CaptureState::Recording);
        assert_eq!(mic.requests.load(Ordering::SeqCst), 1);
        assert_eq!(session.stop().unwrap().unwrap().data, b"abc".to_vec());
    }

    #[tokio::test]
    async fn test_device_failure_discards_take() {
        let mic = Arc::new(FakeMicrophone::default());
        let (mut session, urls) = session_with(&mic);

        session.start().await.unwrap();
        mic.feed(b"partial");
        mic.push(CaptureEvent::Error("device unplugged".to_string()));

        match session.stop() {
            Err(SoundboardError::DeviceFailure(reason)) => assert_eq!(reason, "device unplugged"),
            other => panic!("Expected DeviceFailure, got {:?}", other),
        }
        assert_eq!(session.state(), CaptureState::Idle);
        assert!(session.captured_blob().is_none());
        assert_eq!(mic.live_tracks(), 0);
        assert_eq!(urls.live_count(), 0);
    }

    #[tokio::test]
    async fn test_device_failure_surfaces_on_poll() {
        let mic = Arc::new(FakeMicrophone::default());
        let (mut session, _urls) = session_with(&mic);

        session.start().await.unwrap();
        mic.push(CaptureEvent::Error("overrun".to_string()));

        assert!(matches!(
            session.poll_chunks(),
            Err(SoundboardError::DeviceFailure(_))
        ));
        assert_eq!(session.state(), CaptureState::Idle);
        assert_eq!(mic.live_tracks(), 0);
        assert!(session.stop().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_new_take_revokes_old_preview() {
        let mic = Arc::new(FakeMicrophone::default());
        let (mut session, urls) = session_with(&mic);

        session.start().await.unwrap();
        mic.feed(b"first");
        session.stop().unwrap();
        let old = session.preview_url().unwrap().clone();

        session.start().await.unwrap();
        assert!(urls.resolve(&old).is_none());
        assert!(session.captured_blob().is_none());

        mic.feed(b"second");
        session.stop().unwrap();
        assert_eq!(urls.live_count(), 1);
        assert_eq!(session.captured_blob().unwrap().data, b"second".to_vec());
    }

    #[tokio::test]
    async fn test_denied_retake_keeps_previous_take() {
        let mic = Arc::new(FakeMicrophone::default());
        let (mut session, urls) = session_with(&mic);

        session.start().await.unwrap();
        mic.feed(b"moo!");
        session.stop().unwrap();
        let preview = session.preview_url().unwrap().clone();

        mic.deny.store(true, Ordering::SeqCst);
        assert!(matches!(
            session.start().await,
            Err(SoundboardError::PermissionDenied(_))
        ));

        assert_eq!(session.state(), CaptureState::Stopped);
        assert_eq!(session.captured_blob().unwrap().data, b"moo!".to_vec());
        assert_eq!(session.preview_url(), Some(&preview));
        assert!(urls.resolve(&preview).is_some());
    }

    #[tokio::test]
    async fn test_take_captured_releases_preview() {
        let mic = Arc::new(FakeMicrophone::default());
        let (mut session, urls) = session_with(&mic);

        session.start().await.unwrap();
        mic.feed(b"woof");
        session.stop().unwrap();

        let blob = session.take_captured().unwrap();
        assert_eq!(blob.data, b"woof".to_vec());
        assert!(session.captured_blob().is_none());
        assert!(session.preview_url().is_none());
        assert_eq!(urls.live_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_releases_tracks_and_preview() {
        let mic = Arc::new(FakeMicrophone::default());
        let urls = ObjectUrlTable::new();

        {
            let mut finished = CaptureSession::new(mic.clone(), urls.clone());
            finished.start().await.unwrap();
            mic.feed(b"x");
            finished.stop().unwrap();
            assert_eq!(urls.live_count(), 1);
        }
        assert_eq!(urls.live_count(), 0);

        {
            let mut running = CaptureSession::new(mic.clone(), urls.clone());
            running.start().await.unwrap();
            assert!(mic.live_tracks() > 0);
        }
        assert_eq!(mic.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_reset_mid_recording() {
        let mic = Arc::new(FakeMicrophone::default());
        let (mut session, _urls) = session_with(&mic);

        session.start().await.unwrap();
        mic.feed(b"nope");
        session.reset();

        assert_eq!(session.state(), CaptureState::Idle);
        assert_eq!(mic.live_tracks(), 0);
        assert!(session.stop().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_custom_mime_type() {
        let mic = Arc::new(FakeMicrophone::default());
        let config = CaptureConfig {
            mime_type: "audio/ogg".to_string(),
        };
        let mut session = CaptureSession::with_config(mic.clone(), ObjectUrlTable::new(), config);

        session.start().await.unwrap();
        mic.feed(b"ogg");
        assert_eq!(session.stop().unwrap().unwrap().mime_type, "audio/ogg");
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CaptureState::Requesting.to_string(), "requesting");
        assert_eq!(CaptureState::Stopped.to_string(), "stopped");
    }
}
