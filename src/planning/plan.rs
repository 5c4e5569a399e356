use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::planning::{
    duration::{estimate_duration_secs, format_duration},
    graph::{ValidationReport, assign_levels, resolve_dependencies, validate},
    step::Step,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallelGroup {
    pub level: usize,
    pub step_ids: Vec<String>,
    pub parallel: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDependency {
    pub step_id: String,
    pub depends_on: Vec<String>,
}

/// Validated step graph handed to the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    /// Ordered by execution level.
    pub steps: Vec<Step>,
    pub parallel_groups: Vec<ParallelGroup>,
    pub dependencies: Vec<StepDependency>,
    pub total_steps: usize,
    pub parallel_steps: usize,
    pub sequential_steps: usize,
    pub estimated_duration: String,
    pub estimated_duration_secs: u64,
}

impl Plan {
    /// Resolves, levels and validates `steps`.
    ///
    /// Unknown dependencies are dropped with a warning. Steps that cannot be
    /// scheduled (cycles) stay in the plan and are reported as errors.
    pub fn from_steps(mut steps: Vec<Step>) -> (Self, ValidationReport) {
        let warnings = resolve_dependencies(&mut steps);
        let leveling = assign_levels(&mut steps);
        steps.sort_by_key(|s| s.execution_level);

        let mut report = validate(&steps);
        report.merge_warnings(warnings);
        if !leveling.unscheduled.is_empty() {
            report.push_error(format!(
                "Steps could not be scheduled (circular or unsatisfiable dependencies): {}",
                leveling.unscheduled.join(", ")
            ));
        }

        let parallel_steps = leveling
            .groups
            .iter()
            .filter(|g| g.parallel)
            .map(|g| g.step_ids.len())
            .sum();
        let duration_secs = estimate_duration_secs(&steps, &leveling.groups);

        let plan = Plan {
            id: format!("plan-{}", uuid::Uuid::new_v4()),
            dependencies: steps
                .iter()
                .map(|s| StepDependency {
                    step_id: s.id.clone(),
                    depends_on: s.depends_on.clone(),
                })
                .collect(),
            total_steps: steps.len(),
            parallel_steps,
            sequential_steps: steps.len() - parallel_steps,
            estimated_duration: format_duration(duration_secs),
            estimated_duration_secs: duration_secs,
            parallel_groups: leveling.groups,
            steps,
        };
        (plan, report)
    }

    pub fn step(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// Steps grouped by level, ascending, each level in plan order.
    pub fn levels(&self) -> Vec<(usize, Vec<&Step>)> {
        let mut levels: Vec<(usize, Vec<&Step>)> = Vec::new();
        for step in &self.steps {
            match levels.iter_mut().find(|(level, _)| *level == step.execution_level) {
                Some((_, members)) => members.push(step),
                None => levels.push((step.execution_level, vec![step])),
            }
        }
        levels.sort_by_key(|(level, _)| *level);
        levels
    }
}

/// Where the steps of a plan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecompositionSource {
    /// Steps proposed by the model.
    Model,
    /// The model answered with no steps; one step per call.
    Calls,
    /// The model call failed; calls chained in order.
    SequentialFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanMetadata {
    pub command: String,
    pub created_at: DateTime<Utc>,
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub decomposition: DecompositionSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOutcome {
    pub success: bool,
    pub plan: Plan,
    pub validation: ValidationReport,
    pub metadata: PlanMetadata,
}
