//! Periodic capture scheduler
//!
//! One worker thread runs the capture loop and a second one reports the remaining time
//! once per second. Both stop when the session's cancel channel disconnects.
//!
//! ```text
//! start() ──► capture loop ── tick(interval) ──► FrameSource::grab
//!               │                                  │
//!               │ after(duration)                  ▼
//!               │ cancel                       sequence_file_name ──► ImageSink::write
//!               ▼
//!             SessionEvent channel ◄── progress reporter (1s)
//! ```

use crate::state::{RemainingTime, SessionEvent, SessionState, SessionStatus, StopReason};
use capture_gdi::{CaptureBackend, CaptureResult, PixelImage, WindowCapturer, WindowHandle};
use chrono::{DateTime, Local};
use crossbeam_channel::{after, bounded, never, select, tick, unbounded, Receiver, Sender};
use export::{sequence_file_name, ImageSink, SequenceCounter};
use parking_lot::Mutex;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

const PROGRESS_PERIOD: Duration = Duration::from_secs(1);

/// Produces one image of a window per call
pub trait FrameSource: Send + Sync + 'static {
    fn grab(&self, window: WindowHandle) -> CaptureResult<PixelImage>;
}

impl<B> FrameSource for WindowCapturer<B>
where
    B: CaptureBackend + Send + Sync + 'static,
{
    fn grab(&self, window: WindowHandle) -> CaptureResult<PixelImage> {
        self.capture(window)
    }
}

/// Settings for one capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    pub target_window: WindowHandle,
    pub interval: Duration,
    /// `None` runs until stopped
    pub duration: Option<Duration>,
    pub save_directory: PathBuf,
}

#[derive(Error, Debug)]
pub enum StartError {
    #[error("please select a window to capture")]
    NoWindowSelected,

    #[error("capture interval must be positive")]
    InvalidInterval,

    #[error("failed to create save directory {path}: {source}")]
    SaveDirectory { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A session was already running; nothing changed
    AlreadyCapturing,
}

struct Shared {
    state: SessionState,
    stopping: bool,
    captured: u64,
    target: WindowHandle,
    cancel: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

/// Drives a `FrameSource` on a timer and hands every frame to an `ImageSink`
pub struct CaptureScheduler<S, K> {
    source: Arc<S>,
    sink: Arc<K>,
    shared: Arc<Mutex<Shared>>,
    events: Sender<SessionEvent>,
}

impl<S, K> CaptureScheduler<S, K>
where
    S: FrameSource,
    K: ImageSink + 'static,
{
    /// Create a scheduler and the receiving end of its status events
    pub fn new(source: S, sink: K) -> (Self, Receiver<SessionEvent>) {
        let (events, event_rx) = unbounded();
        let scheduler = Self {
            source: Arc::new(source),
            sink: Arc::new(sink),
            shared: Arc::new(Mutex::new(Shared {
                state: SessionState::Idle,
                stopping: false,
                captured: 0,
                target: WindowHandle::NULL,
                cancel: None,
                worker: None,
            })),
            events,
        };
        (scheduler, event_rx)
    }

    /// Begin capturing. Does nothing if a session is already running.
    pub fn start(&self, config: &CaptureConfig) -> Result<StartOutcome, StartError> {
        if !self.shared.lock().state.can_start() {
            return Ok(StartOutcome::AlreadyCapturing);
        }

        if config.target_window.is_null() {
            return Err(StartError::NoWindowSelected);
        }
        if config.interval.is_zero() {
            return Err(StartError::InvalidInterval);
        }

        fs::create_dir_all(&config.save_directory).map_err(|source| StartError::SaveDirectory {
            path: config.save_directory.clone(),
            source,
        })?;

        let (cancel_tx, cancel_rx) = bounded::<()>(0);

        let mut shared = self.shared.lock();
        if !shared.state.can_start() {
            return Ok(StartOutcome::AlreadyCapturing);
        }
        shared.state = SessionState::Capturing;
        shared.stopping = false;
        shared.captured = 0;
        shared.target = config.target_window;
        shared.cancel = Some(cancel_tx);

        let worker = CaptureLoop {
            source: self.source.clone(),
            sink: self.sink.clone(),
            shared: self.shared.clone(),
            events: self.events.clone(),
            target: config.target_window,
            interval: config.interval,
            duration: config.duration,
            save_directory: config.save_directory.clone(),
            cancel: cancel_rx,
            sequence: SequenceCounter::new(),
        };
        shared.worker = Some(thread::spawn(move || worker.run()));

        let _ = self.events.send(SessionEvent::Started);
        info!(
            window = %config.target_window,
            interval_ms = config.interval.as_millis() as u64,
            duration = ?config.duration,
            dir = %config.save_directory.display(),
            "capture started"
        );

        Ok(StartOutcome::Started)
    }

    /// Ask the running session to end. Returns `false` if there was nothing to stop.
    ///
    /// A capture already in flight finishes first; use [`wait`](Self::wait) to block
    /// until the loop has exited.
    pub fn stop(&self) -> bool {
        let cancel = {
            let mut shared = self.shared.lock();
            if !shared.state.can_stop() || shared.stopping {
                return false;
            }
            shared.stopping = true;
            shared.cancel.take()
        };
        drop(cancel);
        true
    }

    /// Block until the current (or last) session's loop has exited
    pub fn wait(&self) {
        let worker = self.shared.lock().worker.take();
        if let Some(handle) = worker {
            if handle.join().is_err() {
                warn!("capture loop panicked");
            }
        }
    }

    pub fn status(&self) -> SessionStatus {
        let shared = self.shared.lock();
        SessionStatus {
            state: shared.state,
            captured: shared.captured,
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    /// Window of the current or last session
    pub fn target(&self) -> WindowHandle {
        self.shared.lock().target
    }
}

impl<S, K> Drop for CaptureScheduler<S, K> {
    fn drop(&mut self) {
        let (cancel, worker) = {
            let mut shared = self.shared.lock();
            shared.stopping = true;
            (shared.cancel.take(), shared.worker.take())
        };
        drop(cancel);
        if let Some(handle) = worker {
            let _ = handle.join();
        }
    }
}

/// State owned by the capture thread for one session
struct CaptureLoop<S, K> {
    source: Arc<S>,
    sink: Arc<K>,
    shared: Arc<Mutex<Shared>>,
    events: Sender<SessionEvent>,
    target: WindowHandle,
    interval: Duration,
    duration: Option<Duration>,
    save_directory: PathBuf,
    cancel: Receiver<()>,
    sequence: SequenceCounter,
}

impl<S, K> CaptureLoop<S, K>
where
    S: FrameSource,
    K: ImageSink + 'static,
{
    fn run(mut self) {
        let started = Instant::now();

        let progress = {
            let cancel = self.cancel.clone();
            let events = self.events.clone();
            let limit = self.duration;
            thread::spawn(move || report_progress(cancel, events, limit, started))
        };

        let cancel = self.cancel.clone();
        let ticker = tick(self.interval);
        let expiry = match self.duration {
            Some(limit) => after(limit),
            None => never(),
        };

        let reason = loop {
            select! {
                recv(cancel) -> _ => break StopReason::Requested,
                recv(expiry) -> _ => {
                    info!("capture duration elapsed");
                    break StopReason::DurationElapsed;
                }
                recv(ticker) -> _ => self.on_tick(Local::now()),
            }
        };

        self.finish(reason, progress);
    }

    /// One capture attempt. Failures are reported and never end the session.
    fn on_tick(&mut self, now: DateTime<Local>) {
        let number = self.sequence.observe(now.timestamp());

        let image = match self.source.grab(self.target) {
            Ok(image) => image,
            Err(e) => {
                warn!(window = %self.target, error = %e, "capture failed");
                let _ = self.events.send(SessionEvent::CaptureFailed(e.to_string()));
                return;
            }
        };

        let path = sequence_file_name(&self.save_directory, &now.naive_local(), number);
        if let Err(e) = self.sink.write(&image, &path) {
            warn!(path = %path.display(), error = %e, "saving screenshot failed");
            let _ = self.events.send(SessionEvent::WriteFailed(e.to_string()));
            return;
        }

        self.sequence.advance();
        let count = {
            let mut shared = self.shared.lock();
            shared.captured += 1;
            shared.captured
        };
        let _ = self.events.send(SessionEvent::Captured { count, path });
    }

    fn finish(self, reason: StopReason, progress: JoinHandle<()>) {
        let cancel = {
            let mut shared = self.shared.lock();
            shared.stopping = true;
            shared.cancel.take()
        };
        drop(cancel);
        let _ = progress.join();

        let mut shared = self.shared.lock();
        shared.state = SessionState::Idle;
        shared.stopping = false;
        let captured = shared.captured;
        info!(?reason, captured, "capture stopped");
        let _ = self.events.send(SessionEvent::Stopped { reason, captured });
    }
}

fn report_progress(
    cancel: Receiver<()>,
    events: Sender<SessionEvent>,
    limit: Option<Duration>,
    started: Instant,
) {
    let ticker = tick(PROGRESS_PERIOD);
    loop {
        select! {
            recv(cancel) -> _ => return,
            recv(ticker) -> _ => {
                let remaining = RemainingTime::compute(limit, started.elapsed());
                let _ = events.send(SessionEvent::Remaining(remaining));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture_gdi::CaptureError;
    use chrono::TimeZone;
    use export::{ExportError, ExportResult};
    use image::RgbaImage;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_secs(5);

    /// Fails the first `fail_first` grabs, then returns a 2x2 image
    #[derive(Default)]
    struct FakeSource {
        calls: AtomicUsize,
        fail_first: usize,
    }

    impl FrameSource for FakeSource {
        fn grab(&self, window: WindowHandle) -> CaptureResult<PixelImage> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(CaptureError::HandleInvalid {
                    handle: window,
                    reason: "window closed".into(),
                });
            }
            Ok(RgbaImage::new(2, 2))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        fail: bool,
        written: Mutex<Vec<PathBuf>>,
    }

    impl ImageSink for RecordingSink {
        fn write(&self, _image: &RgbaImage, path: &Path) -> ExportResult<()> {
            if self.fail {
                return Err(ExportError::Io(io::Error::new(io::ErrorKind::Other, "disk full")));
            }
            self.written.lock().push(path.to_path_buf());
            Ok(())
        }
    }

    fn config(dir: &Path, interval_ms: u64, duration: Option<Duration>) -> CaptureConfig {
        CaptureConfig {
            target_window: WindowHandle(0x1234),
            interval: Duration::from_millis(interval_ms),
            duration,
            save_directory: dir.join("shots"),
        }
    }

    fn fake_scheduler() -> (CaptureScheduler<FakeSource, RecordingSink>, Receiver<SessionEvent>) {
        CaptureScheduler::new(FakeSource::default(), RecordingSink::default())
    }

    fn wait_for<F>(events: &Receiver<SessionEvent>, mut pred: F) -> SessionEvent
    where
        F: FnMut(&SessionEvent) -> bool,
    {
        let deadline = Instant::now() + WAIT;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            let event = events.recv_timeout(left).expect("timed out waiting for event");
            if pred(&event) {
                return event;
            }
        }
    }

    fn test_loop(
        source: FakeSource,
        sink: RecordingSink,
        dir: &Path,
    ) -> (CaptureLoop<FakeSource, RecordingSink>, Receiver<SessionEvent>) {
        let (events, event_rx) = unbounded();
        let (_cancel_tx, cancel_rx) = bounded(0);
        let capture_loop = CaptureLoop {
            source: Arc::new(source),
            sink: Arc::new(sink),
            shared: Arc::new(Mutex::new(Shared {
                state: SessionState::Capturing,
                stopping: false,
                captured: 0,
                target: WindowHandle(1),
                cancel: None,
                worker: None,
            })),
            events,
            target: WindowHandle(1),
            interval: Duration::from_millis(100),
            duration: None,
            save_directory: dir.to_path_buf(),
            cancel: cancel_rx,
            sequence: SequenceCounter::new(),
        };
        (capture_loop, event_rx)
    }

    fn file_name(path: &Path) -> String {
        path.file_name().unwrap().to_string_lossy().into_owned()
    }

    #[test]
    fn rejects_missing_window() {
        let dir = TempDir::new().unwrap();
        let (scheduler, _events) = fake_scheduler();

        let mut cfg = config(dir.path(), 100, None);
        cfg.target_window = WindowHandle::NULL;

        assert!(matches!(scheduler.start(&cfg), Err(StartError::NoWindowSelected)));
        assert_eq!(scheduler.state(), SessionState::Idle);
        assert!(!cfg.save_directory.exists());
    }

    #[test]
    fn rejects_zero_interval() {
        let dir = TempDir::new().unwrap();
        let (scheduler, _events) = fake_scheduler();

        let cfg = config(dir.path(), 0, None);

        assert!(matches!(scheduler.start(&cfg), Err(StartError::InvalidInterval)));
        assert_eq!(scheduler.state(), SessionState::Idle);
    }

    #[test]
    fn unusable_save_directory_keeps_idle() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"not a directory").unwrap();
        let (scheduler, _events) = fake_scheduler();

        let mut cfg = config(dir.path(), 100, None);
        cfg.save_directory = blocker.join("shots");

        assert!(matches!(scheduler.start(&cfg), Err(StartError::SaveDirectory { .. })));
        assert_eq!(scheduler.state(), SessionState::Idle);
    }

    #[test]
    fn second_start_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let (scheduler, _events) = fake_scheduler();

        let cfg = config(dir.path(), 10_000, None);
        assert_eq!(scheduler.start(&cfg).unwrap(), StartOutcome::Started);
        let before = scheduler.status();

        let mut other = config(dir.path(), 100, None);
        other.target_window = WindowHandle(0x9999);
        assert_eq!(scheduler.start(&other).unwrap(), StartOutcome::AlreadyCapturing);

        assert_eq!(scheduler.status(), before);
        assert_eq!(scheduler.target(), WindowHandle(0x1234));

        assert!(scheduler.stop());
        scheduler.wait();
        assert_eq!(scheduler.state(), SessionState::Idle);
    }

    #[test]
    fn stop_when_idle_does_nothing() {
        let (scheduler, _events) = fake_scheduler();
        assert!(!scheduler.stop());
        scheduler.wait();
        assert_eq!(scheduler.state(), SessionState::Idle);
    }

    #[test]
    fn failed_captures_do_not_end_session() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource {
            fail_first: 2,
            ..Default::default()
        };
        let (scheduler, events) = CaptureScheduler::new(source, RecordingSink::default());

        scheduler.start(&config(dir.path(), 20, None)).unwrap();

        wait_for(&events, |e| matches!(e, SessionEvent::CaptureFailed(_)));
        let captured = wait_for(&events, |e| matches!(e, SessionEvent::Captured { .. }));
        assert!(matches!(captured, SessionEvent::Captured { count: 1, .. }));
        assert_eq!(scheduler.state(), SessionState::Capturing);

        assert!(scheduler.stop());
        scheduler.wait();

        let stopped = wait_for(&events, |e| matches!(e, SessionEvent::Stopped { .. }));
        match stopped {
            SessionEvent::Stopped { reason, captured } => {
                assert_eq!(reason, StopReason::Requested);
                assert_eq!(captured, scheduler.status().captured);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(scheduler.state(), SessionState::Idle);
    }

    #[test]
    fn stops_after_duration() {
        let dir = TempDir::new().unwrap();
        let (scheduler, events) = fake_scheduler();

        let started = Instant::now();
        scheduler
            .start(&config(dir.path(), 20, Some(Duration::from_millis(200))))
            .unwrap();

        let stopped = wait_for(&events, |e| matches!(e, SessionEvent::Stopped { .. }));
        assert!(matches!(
            stopped,
            SessionEvent::Stopped { reason: StopReason::DurationElapsed, .. }
        ));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(200));
        // one 20ms tick past the limit, plus scheduling slack
        assert!(elapsed < Duration::from_millis(200 + 20 + 500), "stopped after {:?}", elapsed);

        scheduler.wait();
        assert_eq!(scheduler.state(), SessionState::Idle);
        assert!(!scheduler.stop());
    }

    #[test]
    fn unbounded_session_keeps_running() {
        let dir = TempDir::new().unwrap();
        let (scheduler, events) = fake_scheduler();

        scheduler.start(&config(dir.path(), 50, None)).unwrap();

        let remaining = wait_for(&events, |e| matches!(e, SessionEvent::Remaining(_)));
        assert_eq!(remaining, SessionEvent::Remaining(RemainingTime::Unbounded));
        assert_eq!(scheduler.state(), SessionState::Capturing);

        scheduler.stop();
        scheduler.wait();
    }

    #[test]
    fn bounded_session_reports_time_left() {
        let dir = TempDir::new().unwrap();
        let (scheduler, events) = fake_scheduler();

        let limit = Duration::from_secs(30);
        scheduler.start(&config(dir.path(), 50, Some(limit))).unwrap();

        let remaining = wait_for(&events, |e| matches!(e, SessionEvent::Remaining(_)));
        match remaining {
            SessionEvent::Remaining(RemainingTime::Limited(left)) => {
                assert!(left < limit);
                assert!(left > limit - WAIT);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(scheduler.state(), SessionState::Capturing);

        scheduler.stop();
        scheduler.wait();
    }

    #[test]
    fn restart_after_stop() {
        let dir = TempDir::new().unwrap();
        let (scheduler, events) = fake_scheduler();
        scheduler.start(&config(dir.path(), 20, None)).unwrap();
        wait_for(&events, |e| matches!(e, SessionEvent::Captured { .. }));
        scheduler.stop();
        scheduler.wait();

        let slow = config(dir.path(), 10_000, None);
        assert_eq!(scheduler.start(&slow).unwrap(), StartOutcome::Started);
        assert_eq!(scheduler.status().captured, 0);
        scheduler.stop();
        scheduler.wait();
    }

    #[test]
    fn sequence_numbers_follow_wall_clock_seconds() {
        let dir = TempDir::new().unwrap();
        let (mut capture_loop, events) =
            test_loop(FakeSource::default(), RecordingSink::default(), dir.path());

        let base = Local.timestamp_opt(1_700_000_000, 0).unwrap();
        let offsets_ms = [0, 300, 600, 900, 1_200, 1_500, 2_100];
        for ms in offsets_ms {
            capture_loop.on_tick(base + chrono::Duration::milliseconds(ms));
        }

        let suffixes: Vec<String> = capture_loop
            .sink
            .written
            .lock()
            .iter()
            .map(|p| file_name(p)[31..].to_string())
            .collect();
        assert_eq!(
            suffixes,
            vec!["0000.png", "0001.png", "0002.png", "0003.png", "0000.png", "0001.png", "0000.png"]
        );
        assert_eq!(capture_loop.shared.lock().captured, 7);
        assert_eq!(events.try_iter().count(), 7);
    }

    #[test]
    fn capture_failure_skips_number() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource {
            fail_first: 1,
            ..Default::default()
        };
        let (mut capture_loop, events) = test_loop(source, RecordingSink::default(), dir.path());

        let now = Local.timestamp_opt(1_700_000_000, 0).unwrap();
        capture_loop.on_tick(now);
        capture_loop.on_tick(now);

        let written = capture_loop.sink.written.lock().clone();
        assert_eq!(written.len(), 1);
        assert!(file_name(&written[0]).ends_with("_0000.png"));
        assert!(matches!(events.try_recv(), Ok(SessionEvent::CaptureFailed(_))));
        assert!(matches!(events.try_recv(), Ok(SessionEvent::Captured { count: 1, .. })));
    }

    #[test]
    fn write_failure_is_not_counted() {
        let dir = TempDir::new().unwrap();
        let sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let (mut capture_loop, events) = test_loop(FakeSource::default(), sink, dir.path());

        let now = Local.timestamp_opt(1_700_000_000, 0).unwrap();
        capture_loop.on_tick(now);
        capture_loop.on_tick(now);

        assert_eq!(capture_loop.shared.lock().captured, 0);
        assert_eq!(capture_loop.sequence.value(), 0);
        let failures = events
            .try_iter()
            .filter(|e| matches!(e, SessionEvent::WriteFailed(_)))
            .count();
        assert_eq!(failures, 2);
    }
}
