//! Blink-counting session controller
//!
//! Owns the capture loop for one time-boxed blink test. `start` spawns a
//! dedicated background thread running the capture -> landmarks -> geometry
//! -> detector pipeline; request handlers poll the shared state without ever
//! blocking on the loop. At most one loop is active at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use camera_capture::source::default_source;
use camera_capture::{CameraConfig, FrameSource, VideoFrame};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::BlinkConfig;
use crate::detector::BlinkDetector;
use crate::encoder;
use crate::geometry::openness_ratio;
use crate::landmarks::{FaceMeshExtractor, LandmarkExtractor, LEFT_EYE, RIGHT_EYE};
use crate::overlay::draw_eye_overlays;
use crate::risk::RiskVerdict;
use crate::BlinkError;

/// Snapshot returned to polling callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub blink_count: u32,
    pub time_remaining: u64,
    pub completed: bool,
}

/// Why the capture loop exited.
///
/// Pollers only observe `completed = true` either way; the cause is kept so
/// operators can tell a lost camera apart from an expired timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndCause {
    TimerExpired,
    CameraLost,
    Stopped,
}

/// State shared between the capture loop and request handlers
struct SharedState {
    current_frame: Option<VideoFrame>,
    blink_total: u32,
    closed_streak: u32,
    started_at: Option<Instant>,
    end_cause: Option<EndCause>,
}

/// One blink-test session, safe to share across request handlers
pub struct BlinkSession {
    config: BlinkConfig,
    camera_config: CameraConfig,
    running: Arc<AtomicBool>,
    shared: Arc<Mutex<SharedState>>,
}

impl BlinkSession {
    pub fn new(config: BlinkConfig, camera_config: CameraConfig) -> Self {
        Self {
            config,
            camera_config,
            running: Arc::new(AtomicBool::new(false)),
            shared: Arc::new(Mutex::new(SharedState {
                current_frame: None,
                blink_total: 0,
                closed_streak: 0,
                started_at: None,
                end_cause: None,
            })),
        }
    }

    fn lock_shared(&self) -> MutexGuard<'_, SharedState> {
        // A panicked loop thread must not wedge the polling endpoints
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a session with the configured capture source and landmark model.
    ///
    /// Returns false if a session is already running, the camera cannot be
    /// opened, or the landmark model fails to load. Non-blocking: the capture
    /// loop runs on its own thread.
    pub fn start(&self) -> bool {
        let extractor = match FaceMeshExtractor::new(&self.config) {
            Ok(e) => e,
            Err(e) => {
                error!("Cannot start blink session: {}", e);
                return false;
            }
        };
        self.start_with(default_source(&self.camera_config), Box::new(extractor))
    }

    /// Start with an explicit source and extractor (used by tests)
    pub fn start_with(
        &self,
        mut source: Box<dyn FrameSource>,
        extractor: Box<dyn LandmarkExtractor>,
    ) -> bool {
        // The shared lock serializes concurrent start attempts; the flag is
        // stored while it is held, so a second caller always observes it.
        let mut shared = self.lock_shared();

        if self.running.load(Ordering::SeqCst) {
            warn!("Blink session already running; start rejected");
            return false;
        }

        if let Err(e) = source.open() {
            warn!("Failed to open camera: {}", e);
            return false;
        }

        shared.current_frame = None;
        shared.blink_total = 0;
        shared.closed_streak = 0;
        shared.end_cause = None;
        let started_at = Instant::now();
        shared.started_at = Some(started_at);
        self.running.store(true, Ordering::SeqCst);
        drop(shared);

        info!(
            duration_secs = self.config.session_duration_secs,
            "Blink session started"
        );

        let config = self.config.clone();
        let running = Arc::clone(&self.running);
        let shared = Arc::clone(&self.shared);
        thread::spawn(move || {
            capture_loop(config, source, extractor, started_at, running, shared);
        });

        true
    }

    /// Non-blocking snapshot of the session state.
    ///
    /// Before the first `start` this is a zeroed default with the full
    /// session duration remaining.
    pub fn get_stats(&self) -> SessionStats {
        let shared = self.lock_shared();

        let Some(started_at) = shared.started_at else {
            return SessionStats {
                blink_count: 0,
                time_remaining: self.config.session_duration_secs,
                completed: false,
            };
        };

        let duration = Duration::from_secs(self.config.session_duration_secs);
        let elapsed = started_at.elapsed();
        SessionStats {
            blink_count: shared.blink_total,
            time_remaining: duration.saturating_sub(elapsed).as_secs(),
            completed: elapsed >= duration || !self.running.load(Ordering::SeqCst),
        }
    }

    /// JPEG-encode the most recent frame; a black placeholder before any
    /// frame has been captured. The frame is cloned out under the lock and
    /// encoded outside it, so pollers never hold up the loop.
    pub fn current_frame_jpeg(&self) -> Result<Vec<u8>, BlinkError> {
        let frame = self.lock_shared().current_frame.clone();
        match frame {
            Some(frame) => encoder::encode_jpeg(&frame),
            None => encoder::encode_placeholder(self.config.frame_width, self.config.frame_height),
        }
    }

    /// Signal the capture loop to stop. Idempotent and non-blocking: the
    /// loop releases the camera as it observes the flag, so callers must not
    /// assume it has fully exited on return.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Risk verdict for the session's final blink total
    pub fn get_final_results(&self) -> RiskVerdict {
        RiskVerdict::from_blink_count(self.lock_shared().blink_total)
    }

    /// Why the last capture loop exited, if one has finished
    pub fn end_cause(&self) -> Option<EndCause> {
        self.lock_shared().end_cause
    }
}

fn capture_loop(
    config: BlinkConfig,
    mut source: Box<dyn FrameSource>,
    mut extractor: Box<dyn LandmarkExtractor>,
    started_at: Instant,
    running: Arc<AtomicBool>,
    shared: Arc<Mutex<SharedState>>,
) {
    let duration = Duration::from_secs(config.session_duration_secs);
    let mut detector = BlinkDetector::new(&config);

    let end_cause = loop {
        if !running.load(Ordering::SeqCst) {
            break EndCause::Stopped;
        }

        let Some(mut frame) = source.read_frame() else {
            break EndCause::CameraLost;
        };

        if started_at.elapsed() > duration {
            break EndCause::TimerExpired;
        }

        frame.flip_horizontal();

        match extractor.extract(&frame) {
            Ok(Some(landmarks)) => {
                let left = landmarks.eye_points(&LEFT_EYE, frame.width, frame.height);
                let right = landmarks.eye_points(&RIGHT_EYE, frame.width, frame.height);
                draw_eye_overlays(&mut frame, &left, &right);
                detector.observe(openness_ratio(&left), openness_ratio(&right));
            }
            // No face this frame: detector untouched, frame still published
            Ok(None) => {}
            Err(e) => warn!("Landmark inference failed, skipping frame: {}", e),
        }

        let mut state = shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.current_frame = Some(frame);
        state.blink_total = detector.blink_total();
        state.closed_streak = detector.closed_streak();
    };

    running.store(false, Ordering::SeqCst);
    source.release();

    let mut state = shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    state.blink_total = detector.blink_total();
    state.closed_streak = detector.closed_streak();
    state.end_cause = Some(end_cause);
    drop(state);

    match end_cause {
        EndCause::TimerExpired => info!("Blink session complete: timer expired"),
        EndCause::CameraLost => warn!("Blink session ended early: camera stream lost"),
        EndCause::Stopped => info!("Blink session stopped by caller"),
    }
}
