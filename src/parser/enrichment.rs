use serde_json::{Map, Value};

use crate::context::{BusinessContext, ProjectRef};

pub const PROJECT_ID_KEY: &str = "project_id";
pub const PROJECT_NAME_KEY: &str = "project_name";

/// How a call's project reference was settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enrichment {
    /// The model already supplied a project id.
    AlreadySet,
    /// A project named in the command text was injected.
    Matched(String),
    /// The caller's default project was injected.
    Default(String),
    /// Several projects matched equally well; nothing was injected from the text.
    Ambiguous(Vec<String>),
    /// No project could be inferred.
    Unresolved,
}

fn has_project_id(arguments: &Map<String, Value>) -> bool {
    match arguments.get(PROJECT_ID_KEY) {
        Some(Value::String(id)) => !id.trim().is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    }
}

/// Length of the longest of the project's name or slug found in `command`.
fn match_length(command: &str, project: &ProjectRef) -> Option<usize> {
    [Some(project.name.as_str()), project.slug.as_deref()]
        .into_iter()
        .flatten()
        .map(|label| label.trim().to_lowercase())
        .filter(|label| !label.is_empty() && command.contains(label.as_str()))
        .map(|label| label.chars().count())
        .max()
}

/// Projects mentioned in the command. The longest mention wins; several
/// projects tied at that length are returned together.
pub fn find_mentioned_projects<'a>(command: &str, context: &'a BusinessContext) -> Vec<&'a ProjectRef> {
    let lowered = command.to_lowercase();
    let scored: Vec<(usize, &ProjectRef)> = context
        .current_projects
        .iter()
        .filter_map(|p| match_length(&lowered, p).map(|len| (len, p)))
        .collect();

    let Some(best) = scored.iter().map(|(len, _)| *len).max() else {
        return Vec::new();
    };
    scored
        .into_iter()
        .filter(|(len, _)| *len == best)
        .map(|(_, p)| p)
        .collect()
}

/// Fills in `project_id` / `project_name` on call arguments that lack them.
///
/// Pure function of the command text, the snapshot and the default id.
pub fn enrich_arguments(
    arguments: &mut Value,
    command: &str,
    context: &BusinessContext,
    default_project_id: Option<&str>,
) -> Enrichment {
    if !arguments.is_object() {
        *arguments = Value::Object(Map::new());
    }
    let Some(map) = arguments.as_object_mut() else {
        return Enrichment::Unresolved;
    };

    if has_project_id(map) {
        return Enrichment::AlreadySet;
    }

    let mentioned = find_mentioned_projects(command, context);
    if let [project] = mentioned.as_slice() {
        map.insert(PROJECT_ID_KEY.into(), Value::String(project.id.clone()));
        map.insert(PROJECT_NAME_KEY.into(), Value::String(project.name.clone()));
        return Enrichment::Matched(project.id.clone());
    }

    let ambiguous: Vec<String> = mentioned.iter().map(|p| p.id.clone()).collect();

    if let Some(default_id) = default_project_id {
        map.insert(PROJECT_ID_KEY.into(), Value::String(default_id.to_string()));
        if let Some(project) = context.find_project(default_id) {
            map.insert(PROJECT_NAME_KEY.into(), Value::String(project.name.clone()));
        }
        if ambiguous.is_empty() {
            return Enrichment::Default(default_id.to_string());
        }
    }

    if ambiguous.is_empty() {
        Enrichment::Unresolved
    } else {
        Enrichment::Ambiguous(ambiguous)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn context() -> BusinessContext {
        BusinessContext {
            current_projects: vec![
                ProjectRef::new("p1", "Sabo").with_slug("sabo"),
                ProjectRef::new("p2", "Sabo Arena").with_slug("sabo-arena"),
                ProjectRef::new("p3", "Long Sang"),
                ProjectRef::new("p4", "Vũng Tàu Dream"),
                ProjectRef::new("p5", "Dream Homes"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn injects_mentioned_project() {
        let mut args = json!({"topic": "AI"});
        let outcome = enrich_arguments(&mut args, "Tạo bài post cho LONG SANG", &context(), None);
        assert_eq!(outcome, Enrichment::Matched("p3".into()));
        assert_eq!(args["project_id"], "p3");
        assert_eq!(args["project_name"], "Long Sang");
    }

    #[test]
    fn longest_mention_wins_over_shared_prefix() {
        let mut args = json!({});
        let outcome = enrich_arguments(&mut args, "post về Sabo Arena tuần này", &context(), None);
        assert_eq!(outcome, Enrichment::Matched("p2".into()));
    }

    #[test]
    fn keeps_model_supplied_id() {
        let mut args = json!({"project_id": "p1"});
        let outcome = enrich_arguments(&mut args, "Long Sang", &context(), Some("p5"));
        assert_eq!(outcome, Enrichment::AlreadySet);
        assert_eq!(args["project_id"], "p1");
    }

    #[test]
    fn falls_back_to_default_project() {
        let mut args = json!({"project_id": null});
        let outcome = enrich_arguments(&mut args, "backup database", &context(), Some("p4"));
        assert_eq!(outcome, Enrichment::Default("p4".into()));
        assert_eq!(args["project_name"], "Vũng Tàu Dream");
    }

    #[test]
    fn equal_length_mentions_are_ambiguous() {
        let ctx = BusinessContext {
            current_projects: vec![ProjectRef::new("a", "Alpha"), ProjectRef::new("b", "Omega")],
            ..Default::default()
        };
        let mut args = json!({});
        let outcome = enrich_arguments(&mut args, "compare alpha and omega", &ctx, None);
        assert_eq!(outcome, Enrichment::Ambiguous(vec!["a".into(), "b".into()]));
        assert!(args.get("project_id").is_none());
    }
}
