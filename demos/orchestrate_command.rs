use std::sync::Arc;

use async_trait::async_trait;
use copilot_core::{
    GlobalConfig, GlobalContext,
    input::OrchestrateOptions,
    llm::ScriptedModel,
    logging::init_tracing,
    orchestration::{AgentInfo, AgentRequest, AgentRuntime, AgentType, TaskProgressEvent},
};
use serde_json::{Value, json};
use tracing::info;

/// Stand-in for a remote SEO agent.
struct SeoAgent;

#[async_trait]
impl AgentRuntime for SeoAgent {
    async fn execute(&self, request: AgentRequest) -> copilot_core::Result<Value> {
        Ok(json!({
            "keywords": ["billiards tournament", "sabo arena"],
            "role": request.role,
        }))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = GlobalConfig::from_env();
    init_tracing(&config.log_level);

    let model = ScriptedModel::new().with_fallback_completion("Bài viết đã sẵn sàng.");
    model.push_completion(
        r#"{"agents": [
            {"type": "content_creator", "confidence": 0.85, "reason": "needs a post", "role": "Write the post", "canParallel": true},
            {"type": "seo_specialist", "confidence": 0.9, "reason": "needs keywords", "role": "Pick keywords", "canParallel": true}
        ]}"#,
    );
    model.push_completion(r#"{"steps": []}"#);
    model.push_completion("Sabo Arena mở giải đấu mới, đăng ký ngay hôm nay!");
    model.push_completion(r#"{"summary": "Post drafted with SEO keywords", "finalResult": {"ready": true}}"#);

    let context = GlobalContext::builder(config).model(Arc::new(model)).build();
    context.init();
    context
        .registry
        .register_runtime(AgentInfo::new("seo-1", AgentType::SeoSpecialist), Arc::new(SeoAgent))
        .await?;

    let options = OrchestrateOptions::default().with_progress(Arc::new(|event: TaskProgressEvent| {
        info!(
            "{} ({}) {:?} [{}/{}]",
            event.task, event.agent, event.status, event.progress.completed, event.progress.total
        );
    }));

    let outcome = context
        .orchestrator()
        .orchestrate("Viết bài post chuẩn SEO cho giải đấu Sabo Arena", &options)
        .await;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    context.shutdown().await;
    Ok(())
}
