use std::sync::Arc;

use copilot_core::{
    GlobalConfig, GlobalContext,
    context::{BusinessContext, ProjectRef, StaticContextSource},
    execution::ProgressEvent,
    llm::{ChatModel, FunctionCall, ScriptedModel},
    logging::init_tracing,
};
use serde_json::json;
use tracing::info;

/// Offline model answering one "post + backup" command.
fn scripted_model() -> Arc<dyn ChatModel> {
    let model = ScriptedModel::new().with_fallback_completion("Sabo Arena mở giải đấu mới cuối tuần này!");
    model.push_function_calls(vec![
        FunctionCall::new("create_post", json!({"topic": "giải đấu cuối tuần", "platform": "facebook"})),
        FunctionCall::new("backup_database", json!({})),
    ]);
    model.push_completion(
        r#"{"steps": [
            {"id": "step-1", "name": "Create Post", "function": "create_post",
             "arguments": {"topic": "giải đấu cuối tuần"}, "estimatedTime": "30s", "canParallel": true},
            {"id": "step-2", "name": "Backup Database", "function": "backup_database",
             "arguments": {}, "estimatedTime": "2m", "canParallel": false, "dependsOn": ["step-1"]}
        ]}"#,
    );
    Arc::new(model)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = GlobalConfig::from_env();
    init_tracing(&config.log_level);

    let live = config.model.api_key.is_some();
    let mut builder = GlobalContext::builder(config).context_source(Arc::new(StaticContextSource::new(
        BusinessContext {
            domain: "marketing".into(),
            current_projects: vec![ProjectRef::new("proj-sabo", "Sabo Arena").with_slug("sabo")],
            ..Default::default()
        },
    )));
    if !live {
        info!("OPENAI_API_KEY not set, using the scripted model");
        builder = builder.model(scripted_model());
    }

    let context = builder.build();
    context.init();

    let options = context
        .execute_options()
        .with_progress(Arc::new(|event: ProgressEvent| {
            info!("[{}%] {} {}", event.percentage, event.step_name, if event.success { "ok" } else { "failed" });
        }));

    let outcome = context
        .pipeline()
        .run("Tạo bài post cho Sabo Arena về giải đấu cuối tuần rồi backup database", &options)
        .await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    context.shutdown().await;
    Ok(())
}
