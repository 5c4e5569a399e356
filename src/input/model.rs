use std::{sync::Arc, time::Duration};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{
    context::BusinessContext, execution::state::ProgressEvent,
    orchestration::task::TaskProgressEvent,
};

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;
pub type TaskProgressCallback = Arc<dyn Fn(TaskProgressEvent) + Send + Sync>;

/// Options for turning a command into function calls.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Project used when the command names none.
    pub project_id: Option<String>,
    /// Free-form caller context appended to the preamble.
    pub user_context: Option<Value>,
}

impl ParseOptions {
    pub fn with_project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            user_context: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub command: String,
    pub context: Option<Arc<BusinessContext>>,
    pub user_id: Option<String>,
    pub project_id: Option<String>,
}

impl PlanOptions {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

#[derive(Clone)]
pub struct ExecuteOptions {
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub on_progress: Option<ProgressCallback>,
    pub max_retries: u32,
    pub step_timeout: Option<Duration>,
    pub cancel: CancellationToken,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            user_id: None,
            project_id: None,
            on_progress: None,
            max_retries: 3,
            step_timeout: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl ExecuteOptions {
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

#[derive(Clone)]
pub struct OrchestrateOptions {
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub use_planning: bool,
    pub on_progress: Option<TaskProgressCallback>,
}

impl Default for OrchestrateOptions {
    fn default() -> Self {
        Self {
            user_id: None,
            project_id: None,
            use_planning: true,
            on_progress: None,
        }
    }
}

impl OrchestrateOptions {
    pub fn without_planning(mut self) -> Self {
        self.use_planning = false;
        self
    }

    pub fn with_progress(mut self, callback: TaskProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }
}
