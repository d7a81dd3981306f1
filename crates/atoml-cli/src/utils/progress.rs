use atoml::engine::progress::{Progress, ProgressCallback, Stage};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 100;

struct StageBar {
    bar: ProgressBar,
    /// Stage currently running, if any.
    stage: Option<Stage>,
    /// Stages finished so far, in order.
    finished: Vec<Stage>,
}

impl StageBar {
    fn label(&self) -> &'static str {
        self.stage.map_or("Working", Stage::label)
    }

    fn apply(&mut self, event: Progress) {
        match event {
            Progress::StageStart { stage } => {
                self.stage = Some(stage);
                self.bar.reset();
                self.bar.set_length(0);
                self.bar.set_style(spinner_style());
                self.bar.set_message(stage.label());
                self.bar
                    .enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
            }
            Progress::TaskStart { total_steps } => {
                // Per-candidate work inside a stage: switch to a counted bar
                // that keeps the stage label.
                self.bar.disable_steady_tick();
                self.bar.reset();
                self.bar.set_style(bar_style());
                self.bar.set_length(total_steps);
                self.bar.set_message(self.label());
            }
            Progress::TaskIncrement => self.bar.inc(1),
            Progress::TaskFinish => {
                if let Some(len) = self.bar.length() {
                    self.bar.set_position(len);
                }
            }
            Progress::StageFinish => {
                self.bar.disable_steady_tick();
                let label = self.label();
                if let Some(stage) = self.stage.take() {
                    self.finished.push(stage);
                }
                self.bar.finish_with_message(format!("✓ {label}"));
            }
            Progress::Message(msg) => {
                if self.bar.is_finished() {
                    self.bar.set_message(msg);
                } else {
                    self.bar.println(format!("  {}: {}", self.label(), msg));
                }
            }
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg} ({elapsed})")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg:<26} {wide_bar:.cyan/blue} {pos}/{len} candidates")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// Renders pipeline stages on stderr: a spinner per stage, turning into a
/// counted bar while the stage works through candidates.
#[derive(Clone)]
pub struct CliProgressHandler {
    state: Arc<Mutex<StageBar>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), target);
        bar.finish_and_clear();
        Self {
            state: Arc::new(Mutex::new(StageBar {
                bar,
                stage: None,
                finished: Vec::new(),
            })),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let state = Arc::clone(&self.state);
        Box::new(move |event: Progress| match state.lock() {
            Ok(mut state) => state.apply(event),
            Err(_) => warn!("Progress state lock was poisoned; dropping progress event."),
        })
    }

    /// Stages that have run to completion, in order.
    pub fn finished_stages(&self) -> Vec<Stage> {
        self.state
            .lock()
            .map(|state| state.finished.clone())
            .unwrap_or_default()
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atoml::engine::progress::ProgressReporter;

    fn hidden() -> CliProgressHandler {
        CliProgressHandler::with_target(ProgressDrawTarget::hidden())
    }

    fn snapshot(handler: &CliProgressHandler) -> (String, Option<u64>, u64, bool) {
        let state = handler.state.lock().unwrap();
        (
            state.bar.message(),
            state.bar.length(),
            state.bar.position(),
            state.bar.is_finished(),
        )
    }

    #[test]
    fn counted_task_keeps_the_stage_label() {
        let handler = hidden();
        let callback = handler.get_callback();

        callback(Progress::StageStart {
            stage: Stage::Fingerprint,
        });
        callback(Progress::TaskStart { total_steps: 12 });
        callback(Progress::TaskIncrement);
        callback(Progress::TaskIncrement);
        assert_eq!(
            snapshot(&handler),
            ("Fingerprinting".to_string(), Some(12), 2, false)
        );

        callback(Progress::TaskFinish);
        assert_eq!(snapshot(&handler).2, 12);
    }

    #[test]
    fn reporter_stages_are_recorded_in_order() {
        let handler = hidden();
        let reporter = ProgressReporter::with_callback(handler.get_callback());

        reporter.stage(Stage::LoadCandidates, || {
            reporter.report(Progress::Message("20 candidates".into()));
        });
        reporter.stage(Stage::Screening, || {
            reporter.report(Progress::TaskStart { total_steps: 7 });
            for _ in 0..7 {
                reporter.report(Progress::TaskIncrement);
            }
            reporter.report(Progress::TaskFinish);
        });

        assert_eq!(
            handler.finished_stages(),
            vec![Stage::LoadCandidates, Stage::Screening]
        );
        let (message, length, position, finished) = snapshot(&handler);
        assert_eq!(message, "✓ Feature screening");
        assert_eq!((length, position), (Some(7), 7));
        assert!(finished);
    }

    #[test]
    fn message_after_a_stage_replaces_the_summary() {
        let handler = hidden();
        let callback = handler.get_callback();
        callback(Progress::StageStart {
            stage: Stage::Cleanup,
        });
        callback(Progress::StageFinish);
        callback(Progress::Message("Removed train_fpv_store.sqlite".into()));
        assert_eq!(snapshot(&handler).0, "Removed train_fpv_store.sqlite");
        assert_eq!(handler.finished_stages(), vec![Stage::Cleanup]);
    }

    #[test]
    fn events_from_another_thread_reach_the_handler() {
        let handler = hidden();
        let callback = handler.get_callback();
        std::thread::spawn(move || {
            callback(Progress::StageStart {
                stage: Stage::ModelFit,
            });
            callback(Progress::StageFinish);
        })
        .join()
        .unwrap();
        assert_eq!(handler.finished_stages(), vec![Stage::ModelFit]);
    }
}
