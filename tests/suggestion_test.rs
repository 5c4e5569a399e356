#[cfg(test)]
mod suggestion_tests {
    use std::sync::Arc;

    use copilot_core::{
        GlobalConfig, GlobalContext,
        context::{BusinessContext, ProjectRef, StaticContextSource},
        input::ExecuteOptions,
        llm::ScriptedModel,
        planning::{Plan, Step},
        suggestion::{GenerateOptions, SuggestionSource, SuggestionType},
    };

    fn context(model: Arc<ScriptedModel>) -> GlobalContext {
        let source = StaticContextSource::new(BusinessContext {
            current_projects: vec![ProjectRef::new("proj-ls", "Long Sang")],
            ..Default::default()
        });
        GlobalContext::builder(GlobalConfig::default())
            .model(model)
            .context_source(Arc::new(source))
            .build()
    }

    #[tokio::test]
    async fn test_backup_reminder_follows_execution_history() {
        let model = Arc::new(ScriptedModel::new());
        model.push_completion_error("suggestions unavailable");
        let context = context(model.clone());

        let suggestions = context.suggestion_engine().generate(&GenerateOptions::default()).await;
        let reminder = suggestions
            .iter()
            .find(|s| s.kind == SuggestionType::Reminder)
            .expect("backup reminder before any backup");
        assert_eq!(reminder.suggested_action.action, "backup_database");

        for _ in 0..2 {
            let (plan, _) = Plan::from_steps(vec![Step::new("backup", "backup_database")]);
            let outcome = context
                .executor()
                .execute_plan(&plan, &ExecuteOptions::default())
                .await
                .unwrap();
            assert!(outcome.success);
        }

        model.push_completion_error("suggestions unavailable");
        let suggestions = context.suggestion_engine().generate(&GenerateOptions::default()).await;
        assert!(suggestions.iter().all(|s| s.kind != SuggestionType::Reminder));

        let pattern = suggestions
            .iter()
            .find(|s| s.source == SuggestionSource::Pattern)
            .expect("repeated backups become a pattern");
        assert_eq!(pattern.suggested_action.action, "backup_database");
        assert!(pattern.reason.contains("2 lần"));
    }

    #[tokio::test]
    async fn test_persisted_suggestions_can_be_dismissed() {
        let model = Arc::new(ScriptedModel::new());
        model.push_completion(
            r#"{"suggestions": [{
                "type": "optimization",
                "priority": "high",
                "reason": "Tối ưu workflow đăng bài",
                "suggested_action": {"action": "create_workflow", "parameters": {}}
            }]}"#,
        );
        let context = context(model);

        let options = GenerateOptions {
            project_id: Some("proj-ls".into()),
            persist: true,
            ..Default::default()
        };
        let suggestions = context.suggestion_engine().generate(&options).await;
        assert!(suggestions.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(suggestions.iter().any(|s| s.source == SuggestionSource::Ai));

        let engine = context.suggestion_engine();
        let first = &suggestions[0];
        assert!(engine.dismiss(&first.id, Some("user-1")).await.unwrap());
        assert!(!engine.dismiss("missing", None).await.unwrap());

        let stored = context.suggestions.get(&first.id).await.unwrap().unwrap();
        assert!(stored.is_dismissed());
        assert_eq!(stored.dismissed_by.as_deref(), Some("user-1"));
    }
}
