use anyhow::{bail, Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{display::Renderer, timer::TimerController};

use super::loop_worker::{frame_loop, Collaborators, LoopReport};
use super::source::{FrameSource, HandDetector};

const ENABLE_LOGS: bool = true;

use crate::log_info;

type LoopHandle<S, D, R> = JoinHandle<(Collaborators<S, D, R>, LoopReport)>;

/// One camera session: owns the frame source, detector and renderer for as
/// long as it runs, and hands them back when it stops.
pub struct CameraSession<S, D, R> {
    id: Uuid,
    timer: TimerController,
    max_hands: usize,
    parts: Option<Collaborators<S, D, R>>,
    handle: Option<LoopHandle<S, D, R>>,
    cancel_token: Option<CancellationToken>,
}

impl<S, D, R> CameraSession<S, D, R>
where
    S: FrameSource + 'static,
    D: HandDetector + 'static,
    R: Renderer + 'static,
{
    pub fn new(parts: Collaborators<S, D, R>, timer: TimerController, max_hands: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            timer,
            max_hands,
            parts: Some(parts),
            handle: None,
            cancel_token: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Opens the frame source, resets the timer and starts the frame loop.
    pub async fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            bail!("session already active");
        }
        let mut parts = self
            .parts
            .take()
            .context("session collaborators were already released")?;

        if let Err(err) = parts.source.open().await {
            self.parts = Some(parts);
            return Err(err.context("failed to open frame source"));
        }

        self.timer.reset().await;

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(frame_loop(
            self.id,
            parts,
            self.timer.clone(),
            self.max_hands,
            cancel_token.clone(),
        ));

        log_info!("camera session {} started", self.id);
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Cancels the frame loop and waits for it to hand the collaborators back.
    /// An episode still in progress is dropped, not reported.
    pub async fn stop(&mut self) -> Result<LoopReport> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        let report = self.join().await;
        self.timer.reset().await;
        report
    }

    /// Waits for the frame loop to end on its own (source exhausted).
    pub async fn wait(&mut self) -> Result<LoopReport> {
        self.join().await
    }

    async fn join(&mut self) -> Result<LoopReport> {
        let Some(handle) = self.handle.take() else {
            return Ok(LoopReport::default());
        };
        self.cancel_token = None;

        let (mut parts, report) = handle.await.context("frame loop task failed to join")?;
        parts.source.close();
        self.parts = Some(parts);
        log_info!("camera session {} stopped", self.id);
        Ok(report)
    }

    /// Gives the collaborators back once the session is stopped.
    pub fn into_parts(mut self) -> Option<Collaborators<S, D, R>> {
        if self.handle.is_some() {
            return None;
        }
        self.parts.take()
    }
}

impl<S, D, R> Drop for CameraSession<S, D, R> {
    fn drop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::StatusLine;
    use crate::presence::{HandRecord, Handedness};
    use crate::sensing::source::Frame;
    use crate::stats::{StatsBackend, TimeRecord};
    use crate::timer::{FinalizedDuration, TimerStatus};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use image::RgbaImage;
    use std::sync::{Arc, Mutex as StdMutex};
    use std::time::Duration;

    struct NullBackend;

    #[async_trait]
    impl StatsBackend for NullBackend {
        async fn record_duration(&self, _seconds: u64) -> Result<()> {
            Ok(())
        }

        async fn fetch_records(&self) -> Result<Vec<TimeRecord>> {
            Ok(Vec::new())
        }
    }

    /// One blank frame every 100ms until `total`.
    struct ScriptedSource {
        next: u64,
        total: u64,
        fail_open: bool,
        closed: bool,
    }

    #[async_trait]
    impl FrameSource for ScriptedSource {
        async fn open(&mut self) -> Result<()> {
            if self.fail_open {
                return Err(anyhow!("camera permission denied"));
            }
            Ok(())
        }

        async fn next_frame(&mut self) -> Result<Option<Frame>> {
            if self.next >= self.total {
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
            let frame = Frame {
                sequence: self.next,
                image: RgbaImage::new(2, 2),
            };
            self.next += 1;
            Ok(Some(frame))
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    struct ScriptedDetector {
        present_from: u64,
        present_until: u64,
        broken: bool,
    }

    #[async_trait]
    impl HandDetector for ScriptedDetector {
        async fn estimate_hands(&self, frame: &Frame) -> Result<Vec<HandRecord>> {
            if self.broken {
                return Err(anyhow!("detector unavailable"));
            }
            if (self.present_from..self.present_until).contains(&frame.sequence) {
                Ok(vec![HandRecord::new(Handedness::Right)])
            } else {
                Ok(Vec::new())
            }
        }
    }

    #[derive(Clone, Default)]
    struct LinesRenderer {
        lines: Arc<StdMutex<Vec<String>>>,
    }

    impl Renderer for LinesRenderer {
        fn render(&mut self, _frame: &RgbaImage, _hands: &[HandRecord], status: &StatusLine) {
            self.lines.lock().unwrap().push(status.to_string());
        }
    }

    fn timer() -> TimerController {
        TimerController::with_intervals(
            Arc::new(NullBackend),
            Duration::from_secs(1),
            Duration::from_secs(5),
        )
    }

    fn session(
        total: u64,
        detector: ScriptedDetector,
        renderer: LinesRenderer,
        timer: TimerController,
    ) -> CameraSession<ScriptedSource, ScriptedDetector, LinesRenderer> {
        let source = ScriptedSource {
            next: 0,
            total,
            fail_open: false,
            closed: false,
        };
        CameraSession::new(
            Collaborators {
                source,
                detector,
                renderer,
            },
            timer,
            2,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn episode_is_timed_and_finalized() {
        let timer = timer();
        let mut finalized = timer.subscribe();
        let renderer = LinesRenderer::default();
        // Hands on frames 0..35 (3.5s), then 7s of empty frames.
        let detector = ScriptedDetector {
            present_from: 0,
            present_until: 35,
            broken: false,
        };
        let mut session = session(105, detector, renderer.clone(), timer.clone());

        session.start().await.unwrap();
        let report = session.wait().await.unwrap();

        assert_eq!(report.frames, 105);
        assert!(!report.cancelled);
        assert_eq!(finalized.recv().await.unwrap(), FinalizedDuration { seconds: 3 });

        let lines = renderer.lines.lock().unwrap();
        assert_eq!(lines[0], "Left Hand Detected - Timer: 00:00");
        assert!(lines.contains(&"Left Hand Detected - Timer: 00:03".to_string()));
        assert_eq!(lines.last().unwrap(), "No Hands Detected - Timer: 00:00");
        drop(lines);

        let parts = session.into_parts().unwrap();
        assert!(parts.source.closed);
    }

    #[tokio::test(start_paused = true)]
    async fn broken_detector_holds_state() {
        let timer = timer();
        let renderer = LinesRenderer::default();
        let detector = ScriptedDetector {
            present_from: 0,
            present_until: 0,
            broken: true,
        };
        let mut session = session(20, detector, renderer.clone(), timer.clone());

        session.start().await.unwrap();
        let report = session.wait().await.unwrap();

        assert_eq!(report.detector_failures, 20);
        assert_eq!(timer.get_state().await.status, TimerStatus::Idle);
        assert!(renderer
            .lines
            .lock()
            .unwrap()
            .iter()
            .all(|line| line == "No Hands Detected - Timer: 00:00"));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_and_allows_restart() {
        let timer = timer();
        let detector = ScriptedDetector {
            present_from: 0,
            present_until: u64::MAX,
            broken: false,
        };
        let mut session = session(u64::MAX, detector, LinesRenderer::default(), timer.clone());

        session.start().await.unwrap();
        assert!(session.start().await.is_err());
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(timer.get_state().await.elapsed_seconds, 2);

        let report = session.stop().await.unwrap();
        assert!(report.cancelled);
        assert!(!session.is_active());

        // Restarting begins a fresh episode.
        session.start().await.unwrap();
        assert_eq!(timer.get_state().await.elapsed_seconds, 0);
        session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn camera_unavailable_keeps_session_inert() {
        let timer = timer();
        let mut session = session(
            10,
            ScriptedDetector {
                present_from: 0,
                present_until: 10,
                broken: false,
            },
            LinesRenderer::default(),
            timer,
        );
        if let Some(parts) = session.parts.as_mut() {
            parts.source.fail_open = true;
        }

        let err = session.start().await.unwrap_err();
        assert!(format!("{err:#}").contains("camera permission denied"));
        assert!(!session.is_active());
        assert!(session.into_parts().is_some());
    }
}
