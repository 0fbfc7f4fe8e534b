/// Displayed-progress state machine.
///
/// Blends backend-reported percentages (capped at the server ceiling) with a
/// client-side tail that walks the bar from the done floor up to 100.
/// Displayed progress only moves down through `abort` and `reset`.
use crate::api_protocol::{JobStatus, ProgressReport};
use crate::config::ProgressConfig;
use crate::models::ProgressPhase;

/// What the polling loop should do after a report has been applied.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Keep polling after the poll interval.
    Continue,
    /// Backend finished; stop polling and run the client tail.
    EnterTail,
    /// Backend reported an error; the job is over.
    Failed { message: Option<String> },
}

#[derive(Debug, Clone)]
pub struct ProgressTracker {
    displayed: f64,
    phase: ProgressPhase,
    config: ProgressConfig,
}

impl ProgressTracker {
    pub fn new(config: ProgressConfig) -> Self {
        Self {
            displayed: 0.0,
            phase: ProgressPhase::Idle,
            config,
        }
    }

    pub fn displayed(&self) -> f64 {
        self.displayed
    }

    pub fn phase(&self) -> ProgressPhase {
        self.phase
    }

    /// Start a new job: show the seed value right away.
    pub fn begin(&mut self) {
        self.displayed = self.config.seed;
        self.phase = ProgressPhase::ServerPhase;
    }

    /// Job failed to start or was reported as failed.
    pub fn abort(&mut self) {
        self.reset();
    }

    /// Stop tracking without touching the displayed value.
    pub fn halt(&mut self) {
        self.phase = ProgressPhase::Idle;
    }

    /// Back to idle at 0.
    pub fn reset(&mut self) {
        self.displayed = 0.0;
        self.phase = ProgressPhase::Idle;
    }

    fn raise_to(&mut self, value: f64) {
        if value > self.displayed {
            self.displayed = value.min(100.0);
        }
    }

    /// Apply one `/progress` report.
    pub fn apply_report(&mut self, report: &ProgressReport) -> PollOutcome {
        match &report.status {
            JobStatus::Downloading | JobStatus::Processing => {
                if let Some(reported) = report.progress_percent() {
                    self.raise_to(reported.clamp(0.0, self.config.server_ceiling));
                }
                PollOutcome::Continue
            }
            JobStatus::Done => {
                self.raise_to(self.config.done_floor);
                self.phase = ProgressPhase::ClientTailPhase;
                PollOutcome::EnterTail
            }
            JobStatus::Error => {
                self.abort();
                PollOutcome::Failed {
                    message: report.error.clone(),
                }
            }
            JobStatus::Other(_) => PollOutcome::Continue,
        }
    }

    /// Advance the client tail by one step. Returns true once 100 is reached.
    pub fn tail_step(&mut self) -> bool {
        if self.phase == ProgressPhase::Settled {
            return true;
        }
        let next = (self.displayed + self.config.tail_step).min(100.0);
        self.raise_to(next);
        if self.displayed >= 100.0 {
            self.displayed = 100.0;
            self.phase = ProgressPhase::Settled;
            return true;
        }
        false
    }
}
