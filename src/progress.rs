/// Optional collaborator supplying fractional progress for the phase lines.
/// The feed hooks default to no-ops so an estimator only has to observe the
/// signals it cares about.
pub trait ProgressEstimator: Send + Sync {
    fn processing_progress(&self) -> Option<f64> {
        None
    }

    fn project_generation_progress(&self) -> Option<f64> {
        None
    }

    fn build_progress(&self) -> Option<f64> {
        None
    }

    fn did_start_command(&self, _name: &str, _args: &[String]) {}

    fn did_finish_parsing(&self) {}

    fn did_generate_project_target(&self) {}

    fn did_finish_project_generation(&self) {}

    fn did_start_build(&self) {}

    fn set_rule_count(&self, _rule_count: u32) {}

    fn did_start_rule(&self) {}

    fn did_resume_rule(&self) {}

    fn did_suspend_rule(&self) {}

    fn did_finish_rule(&self) {}

    fn did_finish_build(&self) {}
}

use std::sync::atomic::{AtomicU64, Ordering};

/// A lock-free cell for a fraction in [0, 1], stored as raw f64 bits. Used
/// for the locally computed distributed-build progress.
#[derive(Debug, Default)]
pub struct ProgressCell(AtomicU64);

impl ProgressCell {
    pub fn set(&self, fraction: f64) {
        self.0.store(fraction.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Distributed-build progress: the fraction of predicted total time already
/// spent, `elapsed / (elapsed + eta)`.
pub fn dist_build_progress(elapsed_ms: u64, eta_ms: u64) -> f64 {
    let total = elapsed_ms + eta_ms;
    if total == 0 {
        0.0
    } else {
        elapsed_ms as f64 / total as f64
    }
}
