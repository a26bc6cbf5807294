// Sequential single-flight test driver.
//
// Steps run strictly one at a time in registration order. `advance()` is
// the only entry point that moves the run forward; a call that arrives
// while a step is still running is ignored, so a repeating trigger can
// call it freely. The first step that does not pass ends the run.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed,
    TimedOut,
}

/// One self-contained test case.
pub trait TestStep: Send + Sync + 'static {
    /// State shared by every step of a run (tokens, channels, counters).
    type Context: Send + 'static;

    fn name(&self) -> &str;

    fn run(&self, ctx: &mut Self::Context) -> impl Future<Output = Verdict> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running(usize),
    Completed(Verdict),
}

impl RunState {
    /// State after the step at `index` (of `step_count`) returned `verdict`.
    fn settle(index: usize, verdict: Verdict, step_count: usize) -> Self {
        match verdict {
            Verdict::Passed if index + 1 < step_count => Self::Idle,
            Verdict::Passed => Self::Completed(Verdict::Passed),
            other => Self::Completed(other),
        }
    }
}

/// What a single `advance()` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// A step was already running; nothing happened.
    Ignored,
    /// A step passed and more remain.
    Stepped,
    /// The run is over.
    Finished(Verdict),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub state: RunState,
    /// Index of the next step to run; equals the number of steps started.
    pub cursor: usize,
    /// Step that ended the run without passing, if any.
    pub stopped_at: Option<usize>,
}

pub struct TestSequencer<S: TestStep> {
    steps: Vec<S>,
    progress: Mutex<Progress>,
    context: tokio::sync::Mutex<S::Context>,
    verdict: watch::Sender<Option<Verdict>>,
}

impl<S: TestStep> TestSequencer<S> {
    pub fn new(context: S::Context) -> Self {
        let (verdict, _) = watch::channel(None);
        Self {
            steps: Vec::new(),
            progress: Mutex::new(Progress { state: RunState::Idle, cursor: 0, stopped_at: None }),
            context: tokio::sync::Mutex::new(context),
            verdict,
        }
    }

    pub fn with_steps(context: S::Context, steps: impl IntoIterator<Item = S>) -> Self {
        let mut sequencer = Self::new(context);
        for step in steps {
            sequencer.register(step);
        }
        sequencer
    }

    /// Append a step. Returns `false` (and drops the step) once the run has begun.
    pub fn register(&mut self, step: S) -> bool {
        let progress = *self.progress.get_mut().unwrap_or_else(PoisonError::into_inner);
        if progress.state != RunState::Idle || progress.cursor != 0 {
            warn!(step = step.name(), "run already started, step not registered");
            return false;
        }
        self.steps.push(step);
        true
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn step_name(&self, index: usize) -> Option<&str> {
        self.steps.get(index).map(TestStep::name)
    }

    pub fn progress(&self) -> Progress {
        *self.lock_progress()
    }

    /// Shared step context, e.g. to inspect counters after a run.
    pub fn context(&self) -> &tokio::sync::Mutex<S::Context> {
        &self.context
    }

    /// Run the next step if none is running.
    pub async fn advance(&self) -> Advance {
        let index = {
            let mut progress = self.lock_progress();
            match progress.state {
                RunState::Running(index) => {
                    debug!(index = index + 1, "advance ignored, step still running");
                    return Advance::Ignored;
                }
                RunState::Completed(verdict) => return Advance::Finished(verdict),
                RunState::Idle => {}
            }

            if progress.cursor >= self.steps.len() {
                progress.state = RunState::Completed(Verdict::Passed);
                drop(progress);
                self.publish(Verdict::Passed);
                return Advance::Finished(Verdict::Passed);
            }

            let index = progress.cursor;
            progress.state = RunState::Running(index);
            index
        };

        let step = &self.steps[index];
        info!(index = index + 1, step = step.name(), "starting test step");
        let verdict = {
            let mut context = self.context.lock().await;
            step.run(&mut context).await
        };
        info!(index = index + 1, step = step.name(), ?verdict, "finished test step");

        let state = {
            let mut progress = self.lock_progress();
            // An abort may have completed the run while the step was in flight.
            if progress.state == RunState::Running(index) {
                progress.cursor = index + 1;
                progress.state = RunState::settle(index, verdict, self.steps.len());
                if verdict != Verdict::Passed {
                    progress.stopped_at = Some(index);
                }
            }
            progress.state
        };

        match state {
            RunState::Completed(verdict) => {
                self.publish(verdict);
                Advance::Finished(verdict)
            }
            _ => Advance::Stepped,
        }
    }

    /// Wait for the terminal verdict.
    pub async fn finished(&self) -> Verdict {
        let mut receiver = self.verdict.subscribe();
        let verdict = match receiver.wait_for(Option::is_some).await {
            Ok(verdict) => *verdict,
            Err(_) => None,
        };
        verdict.unwrap_or(Verdict::Failed)
    }

    /// End the run with `verdict` unless it already ended; returns the final verdict.
    pub fn abort(&self, verdict: Verdict) -> Verdict {
        let final_verdict = {
            let mut progress = self.lock_progress();
            match progress.state {
                RunState::Completed(existing) => existing,
                RunState::Running(index) => {
                    progress.cursor = index + 1;
                    progress.stopped_at = Some(index);
                    progress.state = RunState::Completed(verdict);
                    verdict
                }
                RunState::Idle => {
                    progress.state = RunState::Completed(verdict);
                    verdict
                }
            }
        };
        self.publish(final_verdict);
        final_verdict
    }

    fn publish(&self, verdict: Verdict) {
        self.verdict.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(verdict);
            true
        });
    }

    fn lock_progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: TestStep> TestSequencer<S> {
    /// Drive the run from a repeating trigger until it ends or `run_timeout` elapses.
    ///
    /// Every tick spawns an `advance()`; ticks that land while a step is
    /// running are absorbed by the single-flight guard.
    pub async fn run(self: Arc<Self>, trigger_interval: Duration, run_timeout: Duration) -> Verdict {
        let trigger = {
            let sequencer = Arc::clone(&self);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(trigger_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                let mut advances = JoinSet::new();
                loop {
                    ticker.tick().await;
                    while advances.try_join_next().is_some() {}
                    let sequencer = Arc::clone(&sequencer);
                    advances.spawn(async move { sequencer.advance().await });
                }
            })
        };

        let verdict = match tokio::time::timeout(run_timeout, self.finished()).await {
            Ok(verdict) => verdict,
            Err(_) => {
                error!(
                    timeout_ms = run_timeout.as_millis() as u64,
                    "run exceeded its overall time bound"
                );
                self.abort(Verdict::TimedOut)
            }
        };

        // Aborting the trigger drops its JoinSet, which cancels an in-flight step.
        trigger.abort();
        let _ = trigger.await;
        verdict
    }
}
