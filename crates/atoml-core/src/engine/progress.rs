use std::fmt;

/// A coarse pipeline stage, announced through [`Progress::StageStart`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadCandidates,
    Split,
    Fingerprint,
    Storage,
    Screening,
    ModelFit,
    Cleanup,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::LoadCandidates => "Loading candidates",
            Stage::Split => "Splitting dataset",
            Stage::Fingerprint => "Fingerprinting",
            Stage::Storage => "Writing descriptor stores",
            Stage::Screening => "Feature screening",
            Stage::ModelFit => "Fitting model",
            Stage::Cleanup => "Cleaning up",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone)]
pub enum Progress {
    StageStart { stage: Stage },
    StageFinish,

    TaskStart { total_steps: u64 },
    TaskIncrement,
    TaskFinish,

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    /// Runs `f` between a start and finish event for `stage`.
    pub fn stage<T>(&self, stage: Stage, f: impl FnOnce() -> T) -> T {
        self.report(Progress::StageStart { stage });
        let out = f();
        self.report(Progress::StageFinish);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn stage_wraps_closure_in_start_and_finish_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let reporter = ProgressReporter::with_callback(Box::new(move |e| {
            sink.lock().unwrap().push(format!("{:?}", e));
        }));

        let value = reporter.stage(Stage::Split, || {
            reporter.report(Progress::Message("inside".into()));
            7
        });

        assert_eq!(value, 7);
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert!(events[0].contains("Split"));
        assert!(events[1].contains("inside"));
        assert_eq!(events[2], "StageFinish");
    }

    #[test]
    fn reporter_without_callback_is_silent() {
        ProgressReporter::new().report(Progress::TaskIncrement);
    }
}
