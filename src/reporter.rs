use tracing::info;

/// How many failure descriptions are kept for the final summary.
pub const MAX_FAILURE_SAMPLES: usize = 10;

/// Running success/failure counters for one pipeline stage.
///
/// Purely observational: nothing in the pipeline branches on these values.
#[derive(Debug)]
pub struct Progress {
    stage: &'static str,
    every: usize,
    pub succeeded: usize,
    pub failed: usize,
    samples: Vec<String>,
}

impl Progress {
    pub fn new(stage: &'static str, every: usize) -> Self {
        Self {
            stage,
            every: every.max(1),
            succeeded: 0,
            failed: 0,
            samples: Vec::new(),
        }
    }

    pub fn success(&mut self, count: usize) {
        self.succeeded += count;
    }

    pub fn failure(&mut self, count: usize, description: impl Into<String>) {
        self.failed += count;
        if self.samples.len() < MAX_FAILURE_SAMPLES {
            self.samples.push(description.into());
        }
    }

    /// Logs a progress line when `processed` lands on the cadence or the end.
    pub fn tick(&self, processed: usize, total: usize) {
        if processed % self.every == 0 || processed == total {
            info!(
                stage = self.stage,
                processed,
                total,
                ok = self.succeeded,
                failed = self.failed,
                "progress"
            );
        }
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }
}
