use serde::{Deserialize, Serialize};

use crate::presence::PresenceSample;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    /// Hands left the frame; the episode is finalized unless they return
    /// before the grace delay fires.
    GracePeriod,
}

/// Duration of a completed presence episode, reported to the backend once.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FinalizedDuration {
    pub seconds: u64,
}

/// Work the driver has to do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEffect {
    StartTicking,
    StopTicking,
    ArmGrace { epoch: u64 },
    DisarmGrace,
    Finalize(FinalizedDuration),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub status: TimerStatus,
    pub elapsed_seconds: u64,
    /// Bumped every time a grace delay is armed; a delay carrying an older
    /// epoch is stale.
    #[serde(skip)]
    grace_epoch: u64,
}

impl TimerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    pub fn observe(&mut self, sample: &PresenceSample) -> Vec<TimerEffect> {
        if sample.has_hands() {
            self.hands_present()
        } else {
            self.hands_absent()
        }
    }

    fn hands_present(&mut self) -> Vec<TimerEffect> {
        match self.status {
            TimerStatus::Running => Vec::new(),
            TimerStatus::Idle => {
                self.status = TimerStatus::Running;
                vec![TimerEffect::StartTicking]
            }
            TimerStatus::GracePeriod => {
                self.status = TimerStatus::Running;
                vec![TimerEffect::DisarmGrace, TimerEffect::StartTicking]
            }
        }
    }

    fn hands_absent(&mut self) -> Vec<TimerEffect> {
        if self.status != TimerStatus::Running {
            return Vec::new();
        }

        // Nothing accumulated, nothing to report.
        if self.elapsed_seconds == 0 {
            self.status = TimerStatus::Idle;
            return vec![TimerEffect::StopTicking];
        }

        self.status = TimerStatus::GracePeriod;
        self.grace_epoch = self.grace_epoch.wrapping_add(1);
        vec![
            TimerEffect::StopTicking,
            TimerEffect::ArmGrace {
                epoch: self.grace_epoch,
            },
        ]
    }

    /// One whole second of presence. Returns whether the counter moved.
    pub fn tick(&mut self) -> bool {
        if self.status != TimerStatus::Running {
            return false;
        }
        self.elapsed_seconds = self.elapsed_seconds.saturating_add(1);
        true
    }

    /// The grace delay armed with `epoch` ran out. Finalizes the episode
    /// unless hands came back or a newer delay has been armed since.
    pub fn grace_elapsed(&mut self, epoch: u64) -> Vec<TimerEffect> {
        if self.status != TimerStatus::GracePeriod || epoch != self.grace_epoch {
            return Vec::new();
        }

        let finalized = FinalizedDuration {
            seconds: self.elapsed_seconds,
        };
        self.status = TimerStatus::Idle;
        self.elapsed_seconds = 0;
        vec![TimerEffect::Finalize(finalized)]
    }

    /// Back to idle with a zeroed counter. Returns the effects needed to
    /// silence any ticker or pending delay.
    pub fn reset(&mut self) -> Vec<TimerEffect> {
        let effects = match self.status {
            TimerStatus::Idle => Vec::new(),
            TimerStatus::Running => vec![TimerEffect::StopTicking],
            TimerStatus::GracePeriod => vec![TimerEffect::DisarmGrace],
        };
        self.status = TimerStatus::Idle;
        self.elapsed_seconds = 0;
        // Invalidate any delay that is already in flight.
        self.grace_epoch = self.grace_epoch.wrapping_add(1);
        effects
    }
}
