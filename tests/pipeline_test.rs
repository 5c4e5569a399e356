#[cfg(test)]
mod pipeline_tests {
    use std::{
        sync::{
            Arc, Mutex,
            atomic::{AtomicU32, Ordering},
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use copilot_core::{
        GlobalConfig, GlobalContext,
        context::{BusinessContext, ProjectRef, StaticContextSource},
        execution::{ExecutionStatus, StepContext, StepHandler},
        input::{ExecuteOptions, ParseOptions, PlanOptions},
        llm::{FunctionCall, ScriptedModel},
        parser::ParsedCall,
        planning::{Plan, Step},
        tools::default_catalog,
    };
    use serde_json::{Value, json};

    fn config() -> GlobalConfig {
        GlobalConfig {
            backoff_base_ms: 0,
            ..Default::default()
        }
    }

    fn business() -> Arc<StaticContextSource> {
        Arc::new(StaticContextSource::new(BusinessContext {
            current_projects: vec![ProjectRef::new("proj-sabo", "Sabo Arena").with_slug("sabo")],
            ..Default::default()
        }))
    }

    /// Records the order in which steps start and finish.
    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
        delay: Duration,
    }

    #[async_trait]
    impl StepHandler for Recorder {
        async fn execute(&self, args: &Value, ctx: &StepContext) -> copilot_core::Result<Value> {
            self.log.lock().unwrap().push(format!("start {}", ctx.step_id));
            tokio::time::sleep(self.delay).await;
            self.log.lock().unwrap().push(format!("end {}", ctx.step_id));
            Ok(json!({"step": ctx.step_id, "args": args}))
        }
    }

    struct AlwaysTransient {
        calls: AtomicU32,
    }

    #[async_trait]
    impl StepHandler for AlwaysTransient {
        async fn execute(&self, _args: &Value, _ctx: &StepContext) -> copilot_core::Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(copilot_core::Error::collaborator("upstream timeout"))
        }
    }

    struct Failing;

    #[async_trait]
    impl StepHandler for Failing {
        async fn execute(&self, _args: &Value, _ctx: &StepContext) -> copilot_core::Result<Value> {
            Err(copilot_core::Error::collaborator("quota exceeded"))
        }
    }

    #[tokio::test]
    async fn test_parsing_is_idempotent_and_enriches_projects() {
        let model = Arc::new(ScriptedModel::new());
        for _ in 0..2 {
            model.push_function_calls(vec![FunctionCall::new("create_post", json!({"topic": "giải đấu"}))]);
        }
        let context = GlobalContext::builder(config())
            .model(model)
            .context_source(business())
            .build();

        let parser = context.parser();
        let command = "Tạo bài post cho Sabo Arena";
        let first = parser.parse(command, &context.catalog, &ParseOptions::default()).await.unwrap();
        let second = parser.parse(command, &context.catalog, &ParseOptions::default()).await.unwrap();

        assert!(first.success);
        assert_eq!(first.tool_calls, second.tool_calls);
        assert_eq!(first.tool_calls[0].arguments["project_id"], "proj-sabo");
        assert_eq!(first.tool_calls[0].arguments["project_name"], "Sabo Arena");
    }

    #[tokio::test]
    async fn test_commands_without_functions_fail_with_a_hint() {
        let model = Arc::new(ScriptedModel::new());
        model.push_function_calls(Vec::new());
        let context = GlobalContext::builder(config()).model(model).build();

        let outcome = context
            .pipeline()
            .run("hát cho tôi nghe", &ExecuteOptions::default())
            .await
            .unwrap();

        assert!(!outcome.parse.success);
        assert_eq!(outcome.parse.error.as_deref(), Some("no function identified"));
        assert!(outcome.parse.suggestion.is_some());
        assert!(outcome.plan.is_none());
    }

    #[tokio::test]
    async fn test_model_plans_keep_the_dag_invariant() {
        let model = Arc::new(ScriptedModel::new());
        model.push_completion(
            r#"{"steps": [
                {"id": "c", "function": "publish", "dependsOn": ["a", "b"]},
                {"id": "a", "function": "draft", "estimatedTime": "30s"},
                {"id": "b", "function": "research", "estimatedTime": "1 min"},
                {"id": "d", "function": "report", "dependsOn": ["c", "ghost"]}
            ]}"#,
        );
        let context = GlobalContext::builder(config()).model(model).build();

        let calls = vec![ParsedCall::new("call-1", "draft", json!({}))];
        let outcome = context.planner().create_plan(&calls, &PlanOptions::new("launch")).await;
        assert!(outcome.success);
        assert!(outcome.validation.warnings.iter().any(|w| w.contains("ghost")));

        let plan = &outcome.plan;
        for step in &plan.steps {
            for dep in &step.depends_on {
                assert!(step.execution_level > plan.step(dep).unwrap().execution_level);
            }
        }
        // a and b run together (max 60s), then c and d at 5s each.
        assert_eq!(plan.estimated_duration_secs, 70);
    }

    #[tokio::test]
    async fn test_cyclic_plans_are_rejected_and_never_executed() {
        let model = Arc::new(ScriptedModel::new());
        model.push_function_calls(vec![
            FunctionCall::new("create_post", json!({})),
            FunctionCall::new("get_stats", json!({})),
        ]);
        model.push_completion(
            r#"{"steps": [
                {"id": "a", "function": "create_post", "dependsOn": ["b"]},
                {"id": "b", "function": "get_stats", "dependsOn": ["a"]}
            ]}"#,
        );
        let context = GlobalContext::builder(config()).model(model).build();

        let outcome = context
            .pipeline()
            .run("post and stats", &ExecuteOptions::default())
            .await
            .unwrap();

        let plan = outcome.plan.unwrap();
        assert!(!plan.success);
        assert!(plan.validation.errors.iter().any(|e| e.contains("Circular dependency")));
        assert!(outcome.execution.is_none());
    }

    #[tokio::test]
    async fn test_dependent_steps_run_strictly_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let context = GlobalContext::builder(config())
            .model(Arc::new(ScriptedModel::new()))
            .handler(
                "trace",
                Arc::new(Recorder {
                    log: log.clone(),
                    delay: Duration::from_millis(5),
                }),
            )
            .build();

        let (plan, _) = Plan::from_steps(vec![
            Step::new("one", "trace"),
            Step::new("two", "trace")
                .depends_on("one")
                .with_arguments(json!({"from": "${one.result.step}"})),
            Step::new("three", "trace").depends_on("two"),
        ]);

        let outcome = context.executor().execute_plan(&plan, &ExecuteOptions::default()).await.unwrap();

        assert!(outcome.success);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["start one", "end one", "start two", "end two", "start three", "end three"]
        );
        let second = outcome.execution.result_for("two").unwrap();
        assert_eq!(second.result.result.as_ref().unwrap()["args"]["from"], "one");
    }

    #[tokio::test]
    async fn test_fan_out_levels_run_concurrently() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let context = GlobalContext::builder(config())
            .model(Arc::new(ScriptedModel::new()))
            .handler(
                "trace",
                Arc::new(Recorder {
                    log: log.clone(),
                    delay: Duration::from_millis(50),
                }),
            )
            .build();

        let steps = ["a", "b", "c"]
            .into_iter()
            .map(|id| Step::new(id, "trace").with_estimate(format!("{}s", id.len() * 10)))
            .collect();
        let (plan, report) = Plan::from_steps(steps);
        assert!(report.valid);
        assert!(plan.parallel_groups[0].parallel);
        assert_eq!(plan.estimated_duration_secs, 10);

        let outcome = context.executor().execute_plan(&plan, &ExecuteOptions::default()).await.unwrap();
        assert!(outcome.success);

        let log = log.lock().unwrap();
        let first_end = log.iter().position(|e| e.starts_with("end")).unwrap();
        assert_eq!(log[..first_end].len(), 3, "all steps start before any finishes: {:?}", log);
    }

    #[tokio::test]
    async fn test_non_parallel_steps_keep_a_level_sequential() {
        let steps = vec![
            Step::new("a", "create_post"),
            Step::new("b", "backup_database"),
        ];
        let (plan, _) = Plan::from_steps(steps);
        assert_eq!(plan.parallel_groups.len(), 1);
        assert!(!plan.parallel_groups[0].parallel);
        assert_eq!(plan.sequential_steps, 2);
    }

    #[tokio::test]
    async fn test_retries_stop_at_the_configured_bound() {
        let handler = Arc::new(AlwaysTransient {
            calls: AtomicU32::new(0),
        });
        let context = GlobalContext::builder(config())
            .model(Arc::new(ScriptedModel::new()))
            .handler("flaky", handler.clone())
            .build();

        let (plan, _) = Plan::from_steps(vec![Step::new("s", "flaky")]);
        let options = ExecuteOptions::default().with_max_retries(4);
        let outcome = context.executor().execute_plan(&plan, &options).await.unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 4);
        assert_eq!(outcome.execution.results[0].result.attempt, 4);
        assert_eq!(outcome.execution.status, ExecutionStatus::Failed);
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_parallel_failures_are_isolated() {
        let context = GlobalContext::builder(config())
            .model(Arc::new(ScriptedModel::new()))
            .handler(
                "trace",
                Arc::new(Recorder {
                    log: Arc::new(Mutex::new(Vec::new())),
                    delay: Duration::from_millis(1),
                }),
            )
            .handler("broken", Arc::new(Failing))
            .build();

        let (plan, _) = Plan::from_steps(vec![
            Step::new("a", "trace"),
            Step::new("b", "broken"),
            Step::new("c", "trace"),
        ]);
        let outcome = context.executor().execute_plan(&plan, &ExecuteOptions::default()).await.unwrap();

        assert_eq!(outcome.summary.completed_steps, 3);
        assert_eq!(outcome.summary.successful_steps, 2);
        assert_eq!(outcome.execution.status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn test_optional_failures_complete_with_errors_and_are_logged() {
        let context = GlobalContext::builder(config())
            .model(Arc::new(ScriptedModel::new()))
            .handler("broken", Arc::new(Failing))
            .build();

        let (plan, _) = Plan::from_steps(vec![
            Step::new("a", "broken").optional(),
            Step::new("b", "backup_database").depends_on("a"),
        ]);
        let outcome = context.executor().execute_plan(&plan, &ExecuteOptions::default()).await.unwrap();

        assert_eq!(outcome.execution.status, ExecutionStatus::CompletedWithErrors);
        assert!(!outcome.success);
        assert!(context.logs.last_backup_at().await.unwrap().is_some());
        let recent = context.logs.recent(10).await.unwrap();
        assert!(recent.iter().any(|e| e.function == "execute_plan" && e.status == "completed_with_errors"));
    }

    #[tokio::test]
    async fn test_simple_sequential_command_runs_end_to_end() {
        let model = Arc::new(ScriptedModel::new().with_fallback_completion("Post copy"));
        model.push_function_calls(vec![
            FunctionCall::new("create_post", json!({"topic": "weekend cup"})),
            FunctionCall::new("backup_database", json!({})),
        ]);
        model.push_completion_error("decomposition unavailable");

        let context = GlobalContext::builder(config())
            .model(model)
            .context_source(business())
            .catalog(default_catalog())
            .build();

        let outcome = context
            .pipeline()
            .run("post about sabo then backup", &ExecuteOptions::default())
            .await
            .unwrap();

        assert!(outcome.success());
        let plan = outcome.plan.unwrap();
        assert_eq!(plan.plan.steps[1].depends_on, vec!["step-1"]);
        let execution = outcome.execution.unwrap().execution;
        assert_eq!(execution.results[0].result.result.as_ref().unwrap()["content"], "Post copy");
        assert_eq!(execution.results[0].result.result.as_ref().unwrap()["projectId"], "proj-sabo");
    }
}
