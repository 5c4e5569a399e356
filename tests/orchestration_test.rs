#[cfg(test)]
mod orchestration_tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use copilot_core::{
        GlobalConfig, GlobalContext,
        input::OrchestrateOptions,
        llm::ScriptedModel,
        orchestration::{AgentInfo, AgentRequest, AgentRuntime, AgentStatus, AgentType, TaskProgressEvent},
    };
    use serde_json::{Value, json};

    const SYNTHESIS: &str = r#"{"summary": "Combined", "finalResult": "post with keywords"}"#;

    struct Analyst {
        requests: Mutex<Vec<AgentRequest>>,
    }

    #[async_trait]
    impl AgentRuntime for Analyst {
        async fn execute(&self, request: AgentRequest) -> copilot_core::Result<Value> {
            self.requests.lock().unwrap().push(request);
            Ok(json!({"visits": 1200}))
        }
    }

    #[tokio::test]
    async fn test_keyword_fallback_plans_runs_and_synthesizes() {
        let model = Arc::new(ScriptedModel::new().with_fallback_completion(SYNTHESIS));
        model.push_completion_error("selection unavailable");
        let context = GlobalContext::builder(GlobalConfig::default()).model(model).build();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let options = OrchestrateOptions::default()
            .with_progress(Arc::new(move |event: TaskProgressEvent| sink.lock().unwrap().push(event.task)));

        let outcome = context
            .orchestrator()
            .orchestrate("viết bài post tối ưu seo", &options)
            .await;

        assert!(outcome.success);
        let selected: Vec<AgentType> = outcome.selected_agents.iter().map(|a| a.agent_type).collect();
        assert!(selected.contains(&AgentType::ContentCreator));
        assert!(selected.contains(&AgentType::SeoSpecialist));

        let plan = outcome.plan.unwrap();
        assert_eq!(plan.total_steps, 2);

        let results = outcome.results.unwrap();
        assert_eq!(results.successful_agents, 2);
        assert_eq!(results.synthesis.unwrap().summary, "Combined");
        assert_eq!(outcome.summary.as_deref(), Some("Combined"));
        assert_eq!(events.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_registered_agents_receive_the_command() {
        let model = Arc::new(ScriptedModel::new());
        model.push_completion(
            r#"{"agents": [{"type": "data_analyst", "confidence": 0.9, "reason": "stats", "role": "Report traffic"}]}"#,
        );
        let context = GlobalContext::builder(GlobalConfig::default()).model(model).build();

        let analyst = Arc::new(Analyst {
            requests: Mutex::new(Vec::new()),
        });
        context
            .registry
            .register_runtime(AgentInfo::new("analyst-1", AgentType::DataAnalyst), analyst.clone())
            .await
            .unwrap();

        let outcome = context
            .orchestrator()
            .orchestrate("how many visits this week", &OrchestrateOptions::default())
            .await;

        assert!(outcome.success);
        assert!(outcome.plan.is_none());
        let results = outcome.results.unwrap();
        assert_eq!(results.final_result, Some(json!({"visits": 1200})));
        assert_eq!(results.summary.as_deref(), Some("Agent data_analyst completed successfully"));

        let requests = analyst.requests.lock().unwrap();
        assert_eq!(requests[0].command, "how many visits this week");
        assert_eq!(requests[0].role, "Report traffic");
    }

    #[tokio::test]
    async fn test_offline_agent_types_are_not_selected() {
        let model = Arc::new(ScriptedModel::new());
        model.push_completion(r#"{"agents": [{"type": "research_agent", "confidence": 0.7, "reason": "research"}]}"#);
        let context = GlobalContext::builder(GlobalConfig::default()).model(model).build();

        context
            .registry
            .register(AgentInfo::new("research-1", AgentType::ResearchAgent))
            .await
            .unwrap();
        context
            .registry
            .update_status("research-1", AgentStatus::Offline)
            .await
            .unwrap();

        let outcome = context
            .orchestrator()
            .orchestrate("research competitors", &OrchestrateOptions::default())
            .await;

        assert!(!outcome.success);
        assert!(outcome.selected_agents.is_empty());
        assert!(outcome.error.is_some());
    }
}
