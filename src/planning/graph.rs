use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::planning::{plan::ParallelGroup, step::Step};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub step_count: usize,
}

impl ValidationReport {
    pub fn merge_warnings(&mut self, warnings: impl IntoIterator<Item = String>) {
        self.warnings.extend(warnings);
    }

    pub fn push_error(&mut self, error: String) {
        self.errors.push(error);
        self.valid = false;
    }
}

/// Result of level assignment.
#[derive(Debug, Clone, Default)]
pub struct Leveling {
    pub groups: Vec<ParallelGroup>,
    /// Steps that never became ready, in input order.
    pub unscheduled: Vec<String>,
}

/// A level runs concurrently only when it holds several steps, all parallel-safe.
pub fn level_is_parallel<'a>(steps: impl IntoIterator<Item = &'a Step>) -> bool {
    let mut count = 0;
    for step in steps {
        if !step.can_parallel {
            return false;
        }
        count += 1;
    }
    count > 1
}

/// Drops references to ids outside the step set. Returns one warning per drop.
pub fn resolve_dependencies(steps: &mut [Step]) -> Vec<String> {
    let ids: HashSet<String> = steps.iter().map(|s| s.id.clone()).collect();
    let mut warnings = Vec::new();

    for step in steps.iter_mut() {
        let own_id = step.id.clone();
        step.depends_on.retain(|dep| {
            let known = ids.contains(dep);
            if !known {
                warnings.push(format!(
                    "Step {} depends on non-existent step: {}",
                    own_id, dep
                ));
            }
            known
        });
    }

    warnings
}

/// Assigns `execution_level` by repeatedly scheduling every step whose
/// dependencies are already scheduled. Stops when nothing is ready.
pub fn assign_levels(steps: &mut [Step]) -> Leveling {
    let known: HashSet<&str> = steps.iter().map(|s| s.id.as_str()).collect();
    let mut scheduled: HashSet<String> = HashSet::new();
    let mut done = vec![false; steps.len()];
    let mut levels: Vec<(usize, Vec<usize>)> = Vec::new();

    loop {
        let ready: Vec<usize> = (0..steps.len())
            .filter(|&i| !done[i])
            .filter(|&i| {
                steps[i]
                    .depends_on
                    .iter()
                    .all(|dep| !known.contains(dep.as_str()) || scheduled.contains(dep))
            })
            .collect();

        if ready.is_empty() {
            break;
        }

        let level = levels.len();
        for &i in &ready {
            done[i] = true;
            scheduled.insert(steps[i].id.clone());
        }
        levels.push((level, ready));
    }

    let unscheduled_level = levels.len();
    let mut leveling = Leveling::default();
    for (level, indices) in levels {
        for &i in &indices {
            steps[i].execution_level = level;
        }
        leveling.groups.push(ParallelGroup {
            level,
            parallel: level_is_parallel(indices.iter().map(|&i| &steps[i])),
            step_ids: indices.iter().map(|&i| steps[i].id.clone()).collect(),
        });
    }
    for (i, step) in steps.iter_mut().enumerate() {
        if !done[i] {
            step.execution_level = unscheduled_level;
            leveling.unscheduled.push(step.id.clone());
        }
    }

    leveling
}

/// Every dependency cycle, each listed as the ids along it.
pub fn find_cycles(steps: &[Step]) -> Vec<Vec<String>> {
    let by_id: HashMap<&str, &Step> = steps.iter().map(|s| (s.id.as_str(), s)).collect();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = Vec::new();
    let mut cycles = Vec::new();
    let mut seen_cycles: HashSet<Vec<String>> = HashSet::new();

    fn visit<'a>(
        id: &'a str,
        by_id: &HashMap<&'a str, &'a Step>,
        visited: &mut HashSet<&'a str>,
        stack: &mut Vec<&'a str>,
        cycles: &mut Vec<Vec<String>>,
        seen_cycles: &mut HashSet<Vec<String>>,
    ) {
        if let Some(pos) = stack.iter().position(|&s| s == id) {
            let cycle: Vec<String> = stack[pos..].iter().map(|s| s.to_string()).collect();
            let mut key = cycle.clone();
            key.sort();
            if seen_cycles.insert(key) {
                cycles.push(cycle);
            }
            return;
        }
        if !visited.insert(id) {
            return;
        }

        stack.push(id);
        if let Some(&step) = by_id.get(id) {
            for dep in &step.depends_on {
                visit(dep.as_str(), by_id, visited, stack, cycles, seen_cycles);
            }
        }
        stack.pop();
    }

    for step in steps {
        visit(
            step.id.as_str(),
            &by_id,
            &mut visited,
            &mut stack,
            &mut cycles,
            &mut seen_cycles,
        );
    }

    cycles
}

/// Structural checks: unique ids, named functions, no cycles, levels
/// consistent with dependencies. Dangling references are warnings.
pub fn validate(steps: &[Step]) -> ValidationReport {
    let mut report = ValidationReport {
        valid: true,
        step_count: steps.len(),
        ..Default::default()
    };

    let mut ids = HashSet::new();
    for step in steps {
        if !ids.insert(step.id.as_str()) {
            report.push_error(format!("Duplicate step id: {}", step.id));
        }
    }

    for cycle in find_cycles(steps) {
        let mut path = cycle.clone();
        if let Some(first) = cycle.first() {
            path.push(first.clone());
        }
        report.push_error(format!(
            "Circular dependency detected: {}",
            path.join(" -> ")
        ));
    }

    let levels: HashMap<&str, usize> = steps
        .iter()
        .map(|s| (s.id.as_str(), s.execution_level))
        .collect();

    for step in steps {
        if step.function.trim().is_empty() {
            report.push_error(format!("Step {} missing function", step.id));
        }
        for dep in &step.depends_on {
            match levels.get(dep.as_str()) {
                None => report
                    .warnings
                    .push(format!("Step {} depends on non-existent step: {}", step.id, dep)),
                Some(&dep_level) if dep_level >= step.execution_level && dep != &step.id => {
                    report.push_error(format!(
                        "Step {} (level {}) must run after {} (level {})",
                        step.id, step.execution_level, dep, dep_level
                    ));
                }
                Some(_) => {}
            }
        }
    }

    report.valid = report.errors.is_empty();
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_follow_dependencies() {
        let mut steps = vec![
            Step::new("a", "load_context"),
            Step::new("b", "create_post").depends_on("a"),
            Step::new("c", "get_stats").depends_on("a"),
            Step::new("d", "schedule_post").depends_on("b"),
        ];
        let leveling = assign_levels(&mut steps);

        assert!(leveling.unscheduled.is_empty());
        let levels: Vec<usize> = steps.iter().map(|s| s.execution_level).collect();
        assert_eq!(levels, vec![0, 1, 1, 2]);
        assert!(!leveling.groups[0].parallel);
        assert!(leveling.groups[1].parallel);
        assert!(validate(&steps).valid);
    }

    #[test]
    fn non_parallel_member_makes_level_sequential() {
        let mut steps = vec![Step::new("a", "create_post"), Step::new("b", "backup_database")];
        let leveling = assign_levels(&mut steps);
        assert_eq!(leveling.groups.len(), 1);
        assert!(!leveling.groups[0].parallel);
    }

    #[test]
    fn cycles_are_reported_with_every_member() {
        let mut steps = vec![
            Step::new("a", "create_post").depends_on("c"),
            Step::new("b", "create_post").depends_on("a"),
            Step::new("c", "create_post").depends_on("b"),
            Step::new("d", "get_stats"),
        ];
        let leveling = assign_levels(&mut steps);
        assert_eq!(leveling.unscheduled, vec!["a", "b", "c"]);

        let cycles = find_cycles(&steps);
        assert_eq!(cycles.len(), 1);
        let mut members = cycles[0].clone();
        members.sort();
        assert_eq!(members, vec!["a", "b", "c"]);
        assert!(!validate(&steps).valid);
    }

    #[test]
    fn dangling_references_are_dropped_with_warning() {
        let mut steps = vec![Step::new("a", "create_post").depends_on("ghost")];
        let warnings = resolve_dependencies(&mut steps);
        assert_eq!(warnings.len(), 1);
        assert!(steps[0].depends_on.is_empty());
    }

    #[test]
    fn duplicate_ids_and_missing_functions_are_errors() {
        let mut blank = Step::new("b", "x");
        blank.function = String::new();
        let steps = vec![Step::new("a", "create_post"), Step::new("a", "get_stats"), blank];
        let report = validate(&steps);
        assert_eq!(report.errors.len(), 2);
    }
}
