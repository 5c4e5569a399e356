use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Stopped,
    Failed,
    Completed,
    CompletedWithErrors,
}

/// Outcome of one step after all of its attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempt: u32,
    pub can_continue: bool,
    pub should_stop: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved_references: Vec<String>,
}

impl StepOutcome {
    pub fn succeeded(result: Value, attempt: u32) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            attempt,
            can_continue: true,
            should_stop: false,
            unresolved_references: Vec::new(),
        }
    }

    pub fn failed(error: impl Into<String>, attempt: u32, optional: bool, critical: bool) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            attempt,
            can_continue: optional,
            should_stop: critical && !optional,
            unresolved_references: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_id: String,
    pub step_name: String,
    pub result: StepOutcome,
    pub completed_at: DateTime<Utc>,
}

/// Runtime record of one plan run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: String,
    pub plan_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub steps: Vec<String>,
    pub results: Vec<StepResult>,
    pub status: ExecutionStatus,
    pub current_step: usize,
    pub total_steps: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl Execution {
    pub fn start(plan_id: impl Into<String>, steps: Vec<String>) -> Self {
        Self {
            id: format!("exec-{}", uuid::Uuid::new_v4()),
            plan_id: plan_id.into(),
            started_at: Utc::now(),
            completed_at: None,
            total_steps: steps.len(),
            steps,
            results: Vec::new(),
            status: ExecutionStatus::Running,
            current_step: 0,
            stopped_reason: None,
            error: None,
            duration_ms: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn result_for(&self, step_id: &str) -> Option<&StepResult> {
        self.results.iter().find(|r| r.step_id == step_id)
    }

    /// Records one finished step and applies the stop/fail rules.
    pub fn record(&mut self, result: StepResult) {
        let outcome = &result.result;
        if self.status == ExecutionStatus::Running {
            if outcome.should_stop {
                self.status = ExecutionStatus::Stopped;
                self.stopped_reason = Some(format!(
                    "critical step {} failed: {}",
                    result.step_id,
                    outcome.error.as_deref().unwrap_or("unknown error")
                ));
            } else if !outcome.success && !outcome.can_continue {
                self.status = ExecutionStatus::Failed;
                self.error = outcome.error.clone();
            }
        }
        self.results.push(result);
    }

    pub fn stop(&mut self, reason: impl Into<String>) {
        if self.status == ExecutionStatus::Running {
            self.status = ExecutionStatus::Stopped;
            self.stopped_reason = Some(reason.into());
        }
    }

    /// Sets the terminal status and completion time.
    pub fn finish(&mut self) {
        let completed_at = Utc::now();
        if self.status == ExecutionStatus::Running {
            self.status = if self.results.iter().any(|r| !r.result.success) {
                ExecutionStatus::CompletedWithErrors
            } else {
                ExecutionStatus::Completed
            };
        }
        self.duration_ms = (completed_at - self.started_at).num_milliseconds().max(0) as u64;
        self.completed_at = Some(completed_at);
    }

    pub fn summary(&self) -> ExecutionSummary {
        ExecutionSummary {
            total_steps: self.total_steps,
            completed_steps: self.results.len(),
            successful_steps: self.results.iter().filter(|r| r.result.success).count(),
            failed_steps: self.results.iter().filter(|r| !r.result.success).count(),
            duration_ms: self.duration_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub total_steps: usize,
    pub completed_steps: usize,
    pub successful_steps: usize,
    pub failed_steps: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub execution: Execution,
    pub summary: ExecutionSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub step_id: String,
    pub step_name: String,
    pub success: bool,
    pub current: usize,
    pub total: usize,
    pub percentage: u8,
}

impl ProgressEvent {
    pub fn new(result: &StepResult, current: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            100
        } else {
            ((current as f64 / total as f64) * 100.0).round().min(100.0) as u8
        };
        Self {
            step_id: result.step_id.clone(),
            step_name: result.step_name.clone(),
            success: result.result.success,
            current,
            total,
            percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, outcome: StepOutcome) -> StepResult {
        StepResult {
            step_id: id.into(),
            step_name: id.into(),
            result: outcome,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn optional_failure_completes_with_errors() {
        let mut execution = Execution::start("plan", vec!["a".into(), "b".into()]);
        execution.record(result("a", StepOutcome::failed("boom", 1, true, false)));
        execution.record(result("b", StepOutcome::succeeded(Value::Null, 1)));
        execution.finish();

        assert_eq!(execution.status, ExecutionStatus::CompletedWithErrors);
        let summary = execution.summary();
        assert_eq!(summary.successful_steps, 1);
        assert_eq!(summary.failed_steps, 1);
        assert!(execution.is_terminal());
    }

    #[test]
    fn critical_failure_stops_and_terminal_failure_fails() {
        let mut stopped = Execution::start("plan", vec!["a".into()]);
        stopped.record(result("a", StepOutcome::failed("boom", 1, false, true)));
        stopped.finish();
        assert_eq!(stopped.status, ExecutionStatus::Stopped);

        let mut failed = Execution::start("plan", vec!["a".into()]);
        failed.record(result("a", StepOutcome::failed("boom", 1, false, false)));
        failed.finish();
        assert_eq!(failed.status, ExecutionStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }
}
