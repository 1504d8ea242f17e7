use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    display::{Renderer, StatusLine},
    presence::PresenceSample,
    timer::TimerController,
};

use super::source::{FrameSource, HandDetector};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Everything a camera session needs from the outside world.
pub struct Collaborators<S, D, R> {
    pub source: S,
    pub detector: D,
    pub renderer: R,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopReport {
    pub frames: u64,
    pub detector_failures: u64,
    pub source_failed: bool,
    pub cancelled: bool,
}

/// Pulls frames until the source ends or the session is cancelled. Each
/// frame waits for its detection before the next one is requested.
pub async fn frame_loop<S, D, R>(
    session_id: Uuid,
    mut parts: Collaborators<S, D, R>,
    timer: TimerController,
    max_hands: usize,
    cancel_token: CancellationToken,
) -> (Collaborators<S, D, R>, LoopReport)
where
    S: FrameSource,
    D: HandDetector,
    R: Renderer,
{
    let mut report = LoopReport::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                report.cancelled = true;
                break;
            }
            next = parts.source.next_frame() => next,
        };

        let frame = match next {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log_info!("frame source ended for session {session_id}");
                break;
            }
            Err(err) => {
                log_error!("frame source failed for session {session_id}: {err:#}");
                report.source_failed = true;
                break;
            }
        };
        report.frames += 1;

        let detection = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                report.cancelled = true;
                break;
            }
            detection = parts.detector.estimate_hands(&frame) => detection,
        };

        // A failed detection produces no sample; the timer keeps its state.
        let sample = match detection {
            Ok(hands) => {
                let sample = PresenceSample::from_hands(hands, max_hands);
                timer.observe(&sample).await;
                sample
            }
            Err(err) => {
                log_warn!("hand detection failed on frame {}: {err:#}", frame.sequence);
                report.detector_failures += 1;
                PresenceSample::empty()
            }
        };

        let state = timer.get_state().await;
        let status = StatusLine {
            label: sample.label(),
            elapsed_seconds: state.elapsed_seconds,
        };
        parts.renderer.render(&frame.image, sample.hands(), &status);
        log_debug!("frame {} done: {status}", frame.sequence);
    }

    log_info!(
        "frame loop for session {session_id} stopped after {} frames ({} detector failures)",
        report.frames,
        report.detector_failures
    );

    (parts, report)
}
