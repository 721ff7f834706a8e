use crate::events::{CacheResult, RuleStatus, TestResultKind};
use std::sync::atomic::{AtomicU32, Ordering};

/// Display-only counters; all loads and stores are relaxed.
#[derive(Debug, Default)]
pub struct BuildCounters {
    rules_completed: AtomicU32,
    rules_updated: AtomicU32,
    cache_misses: AtomicU32,
    cache_errors: AtomicU32,
    test_passes: AtomicU32,
    test_failures: AtomicU32,
    test_skips: AtomicU32,
    uploads_scheduled: AtomicU32,
    uploads_started: AtomicU32,
    uploads_done: AtomicU32,
    uploads_failed: AtomicU32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpUploadSnapshot {
    pub scheduled: u32,
    pub complete: u32,
    pub failed: u32,
    pub uploading: u32,
    pub pending: u32,
}

impl BuildCounters {
    pub fn record_rule_finished(&self, status: RuleStatus, cache: CacheResult) {
        if status != RuleStatus::Canceled {
            self.rules_completed.fetch_add(1, Ordering::Relaxed);
        }
        if status != RuleStatus::Success {
            return;
        }
        match cache {
            CacheResult::Miss => {
                self.cache_misses.fetch_add(1, Ordering::Relaxed);
            }
            CacheResult::Error => {
                self.cache_errors.fetch_add(1, Ordering::Relaxed);
            }
            CacheResult::Hit | CacheResult::Ignored | CacheResult::LocalKeyUnchangedHit => {}
        }
        if cache != CacheResult::LocalKeyUnchangedHit {
            self.rules_updated.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_test_result(&self, kind: TestResultKind) {
        match kind {
            TestResultKind::Success => {
                self.test_passes.fetch_add(1, Ordering::Relaxed);
            }
            TestResultKind::Failure => {
                self.test_failures.fetch_add(1, Ordering::Relaxed);
            }
            TestResultKind::AssumptionViolation => {
                self.test_skips.fetch_add(1, Ordering::Relaxed);
            }
            TestResultKind::DryRun => {}
        }
    }

    pub fn record_upload_scheduled(&self) {
        self.uploads_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upload_started(&self) {
        self.uploads_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upload_finished(&self, success: bool) {
        if success {
            self.uploads_done.fetch_add(1, Ordering::Relaxed);
        } else {
            self.uploads_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn rules_completed(&self) -> u32 {
        self.rules_completed.load(Ordering::Relaxed)
    }

    pub fn rules_updated(&self) -> u32 {
        self.rules_updated.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u32 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn cache_errors(&self) -> u32 {
        self.cache_errors.load(Ordering::Relaxed)
    }

    pub fn test_passes(&self) -> u32 {
        self.test_passes.load(Ordering::Relaxed)
    }

    pub fn test_failures(&self) -> u32 {
        self.test_failures.load(Ordering::Relaxed)
    }

    pub fn test_skips(&self) -> u32 {
        self.test_skips.load(Ordering::Relaxed)
    }

    pub fn upload_snapshot(&self) -> HttpUploadSnapshot {
        let scheduled = self.uploads_scheduled.load(Ordering::Relaxed);
        let complete = self.uploads_done.load(Ordering::Relaxed);
        let failed = self.uploads_failed.load(Ordering::Relaxed);
        let started = self.uploads_started.load(Ordering::Relaxed);
        let uploading = started.saturating_sub(complete + failed);
        let pending = scheduled.saturating_sub(uploading + complete + failed);
        HttpUploadSnapshot {
            scheduled,
            complete,
            failed,
            uploading,
            pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BuildCounters;
    use crate::events::{CacheResult, RuleStatus, TestResultKind};

    #[test]
    fn cache_fold_matches_result_types() {
        let counters = BuildCounters::default();
        counters.record_rule_finished(RuleStatus::Success, CacheResult::Miss);
        counters.record_rule_finished(RuleStatus::Success, CacheResult::Error);
        counters.record_rule_finished(RuleStatus::Success, CacheResult::Hit);
        counters.record_rule_finished(RuleStatus::Success, CacheResult::Ignored);
        counters.record_rule_finished(RuleStatus::Success, CacheResult::LocalKeyUnchangedHit);

        assert_eq!(counters.rules_completed(), 5);
        assert_eq!(counters.cache_misses(), 1);
        assert_eq!(counters.cache_errors(), 1);
        // everything except the local-key hit produced a new artifact
        assert_eq!(counters.rules_updated(), 4);
    }

    #[test]
    fn non_success_rules_never_touch_cache_counters() {
        let counters = BuildCounters::default();
        counters.record_rule_finished(RuleStatus::Fail, CacheResult::Miss);
        counters.record_rule_finished(RuleStatus::Canceled, CacheResult::Miss);
        assert_eq!(counters.rules_completed(), 1);
        assert_eq!(counters.cache_misses(), 0);
        assert_eq!(counters.rules_updated(), 0);
    }

    #[test]
    fn updated_never_exceeds_completed() {
        let counters = BuildCounters::default();
        for _ in 0..7 {
            counters.record_rule_finished(RuleStatus::Success, CacheResult::Hit);
        }
        counters.record_rule_finished(RuleStatus::Success, CacheResult::LocalKeyUnchangedHit);
        assert!(counters.rules_updated() <= counters.rules_completed());
    }

    #[test]
    fn upload_snapshot_derives_uploading_and_pending() {
        let counters = BuildCounters::default();
        for _ in 0..5 {
            counters.record_upload_scheduled();
        }
        for _ in 0..3 {
            counters.record_upload_started();
        }
        counters.record_upload_finished(true);
        counters.record_upload_finished(false);

        let snapshot = counters.upload_snapshot();
        assert_eq!(snapshot.scheduled, 5);
        assert_eq!(snapshot.complete, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.uploading, 1);
        assert_eq!(snapshot.pending, 2);
    }

    #[test]
    fn dry_run_results_count_nowhere() {
        let counters = BuildCounters::default();
        counters.record_test_result(TestResultKind::Success);
        counters.record_test_result(TestResultKind::Failure);
        counters.record_test_result(TestResultKind::AssumptionViolation);
        counters.record_test_result(TestResultKind::DryRun);
        assert_eq!(counters.test_passes(), 1);
        assert_eq!(counters.test_failures(), 1);
        assert_eq!(counters.test_skips(), 1);
    }
}
