pub type WorkerId = u64;
pub type EventKey = u64;

/// One timestamped, typed record from the orchestrator's event bus.
#[derive(Debug, Clone)]
pub struct Event {
    pub timestamp_ms: u64,
    pub worker_id: WorkerId,
    pub event_key: EventKey,
    pub kind: EventKind,
}

impl Event {
    pub fn new(timestamp_ms: u64, worker_id: WorkerId, event_key: EventKey, kind: EventKind) -> Self {
        Self {
            timestamp_ms,
            worker_id,
            event_key,
            kind,
        }
    }
}

#[derive(Debug, Clone)]
pub enum EventKind {
    CommandStarted {
        name: String,
        args: Vec<String>,
    },
    BuildFileParseStarted,
    BuildFileParseFinished,
    ParseStarted,
    ParseFinished,
    ActionGraphStarted,
    ActionGraphFinished,
    ProjectGenerationStarted,
    ProjectGenerationProcessed,
    ProjectGenerationFinished,
    BuildStarted {
        distributed: bool,
    },
    RuleCountCalculated {
        rule_count: u32,
    },
    RuleCountUpdated {
        rule_count: u32,
    },
    BuildFinished {
        build_id: String,
    },
    RuleStarted {
        name: String,
    },
    RuleSuspended {
        name: String,
    },
    RuleResumed {
        name: String,
    },
    RuleFinished {
        name: String,
        status: RuleStatus,
        cache: CacheResult,
    },
    StepStarted {
        description: String,
        short_name: String,
    },
    StepFinished,
    CacheOpStarted {
        description: String,
        short_name: String,
        synchronous: bool,
    },
    CacheOpFinished {
        synchronous: bool,
    },
    CompressionStarted {
        description: String,
        short_name: String,
    },
    CompressionFinished,
    InstallStarted,
    InstallFinished,
    HttpUploadScheduled,
    HttpUploadStarted,
    HttpUploadFinished {
        success: bool,
    },
    HttpFetchStarted,
    HttpFetchFinished,
    HttpCacheShutdown,
    BytesReceived {
        bytes: u64,
    },
    TestRunStarted {
        run_all: bool,
        target_names: Vec<String>,
    },
    TestRunFinished {
        results: Vec<TestResults>,
    },
    TestSummaryStarted {
        test_case: String,
        test_name: String,
    },
    TestSummaryFinished {
        summary: TestResultSummary,
    },
    TestStatusMessageStarted {
        message: TestStatusMessage,
    },
    TestStatusMessageFinished {
        message: TestStatusMessage,
    },
    ConsoleLog {
        level: LogLevel,
        message: String,
    },
    DistBuildStatusUpdate {
        status: DistBuildStatus,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleStatus {
    Success,
    Fail,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheResult {
    Miss,
    Error,
    Hit,
    Ignored,
    LocalKeyUnchangedHit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestResultKind {
    Success,
    Failure,
    AssumptionViolation,
    DryRun,
}

impl TestResultKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::AssumptionViolation => "ASSUMPTION_VIOLATION",
            Self::DryRun => "DRY_RUN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResultSummary {
    pub test_case: String,
    pub test_name: String,
    pub kind: TestResultKind,
    pub duration_ms: u64,
    pub message: Option<String>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

/// All summaries produced for one test target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResults {
    pub target: String,
    pub summaries: Vec<TestResultSummary>,
}

impl TestResults {
    pub fn count(&self, kind: TestResultKind) -> usize {
        self.summaries.iter().filter(|s| s.kind == kind).count()
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.summaries.iter().map(|s| s.duration_ms).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestStatusMessage {
    pub message: String,
    pub level: LogLevel,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistBuildState {
    Init,
    Queued,
    Building,
    FinishedSuccessfully,
    Failed,
}

impl DistBuildState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Queued => "QUEUED",
            Self::Building => "BUILDING",
            Self::FinishedSuccessfully => "FINISHED_SUCCESSFULLY",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::FinishedSuccessfully | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistBuildLogRecord {
    pub timestamp_ms: i64,
    pub name: String,
}

/// Latest-wins snapshot of the remote build coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistBuildStatus {
    pub state: DistBuildState,
    pub eta_ms: u64,
    pub message: Option<String>,
    pub log_book: Option<Vec<DistBuildLogRecord>>,
}
