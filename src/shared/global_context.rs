use std::{path::Path, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    context::{CachedContextProvider, ContextProvider, ContextSource, StaticContextSource},
    error::Result,
    execution::{Executor, HandlerRegistry, HandlerServices, RetryPolicy, StepHandler},
    input::ExecuteOptions,
    llm::{ChatModel, OpenAiClient},
    orchestration::{AgentRegistry, Orchestrator, RegistryConfig},
    parser::{CommandParser, ParseMode},
    pipeline::CommandPipeline,
    planning::Planner,
    services::{
        ActionExecutor, ExecutionLogStore, InMemoryExecutionLogStore, InMemorySuggestionStore,
        InMemoryWorkflowService, KeywordActionExecutor, SuggestionStore, WorkflowService,
    },
    shared::cache::{CacheConfig, CacheService},
    suggestion::SuggestionEngine,
    tools::{FunctionSpec, default_catalog},
};

/// OpenAI-compatible endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
        }
    }
}

/// 全局配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub model: ModelConfig,
    pub cache: CacheConfig,
    /// Attempts per step, including the first.
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub step_timeout_secs: Option<u64>,
    pub context_cache_ttl_secs: i64,
    pub heartbeat_timeout_secs: i64,
    pub registry_cleanup_interval_secs: u64,
    pub streaming_parse: bool,
    pub log_level: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            cache: CacheConfig::default(),
            max_retries: 3,
            backoff_base_ms: 1000,
            backoff_max_ms: 60_000,
            step_timeout_secs: None,
            context_cache_ttl_secs: 300,
            heartbeat_timeout_secs: 30,
            registry_cleanup_interval_secs: 60,
            streaming_parse: false,
            log_level: "info".to_string(),
        }
    }
}

impl GlobalConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Defaults overridden by `OPENAI_*` and `COPILOT_*` variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`. Unparsable values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = get("OPENAI_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.model.base_url = url;
        }
        if let Some(model) = get("COPILOT_MODEL").or_else(|| get("OPENAI_MODEL")) {
            self.model.model = model;
        }
        if let Some(t) = get("COPILOT_TEMPERATURE").and_then(|v| v.parse().ok()) {
            self.model.temperature = t;
        }
        if let Some(n) = get("COPILOT_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            self.max_retries = n;
        }
        if let Some(ms) = get("COPILOT_BACKOFF_BASE_MS").and_then(|v| v.parse().ok()) {
            self.backoff_base_ms = ms;
        }
        if let Some(secs) = get("COPILOT_STEP_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.step_timeout_secs = Some(secs);
        }
        if let Some(secs) = get("COPILOT_CONTEXT_TTL_SECS").and_then(|v| v.parse().ok()) {
            self.context_cache_ttl_secs = secs;
        }
        if let Some(level) = get("COPILOT_LOG_LEVEL") {
            self.log_level = level;
        }
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::new(self.max_retries.max(1), Duration::from_millis(self.backoff_base_ms));
        policy.max_delay = Duration::from_millis(self.backoff_max_ms);
        policy
    }

    pub fn execute_options(&self) -> ExecuteOptions {
        let mut options = ExecuteOptions::default().with_max_retries(self.max_retries);
        options.step_timeout = self.step_timeout_secs.map(Duration::from_secs);
        options
    }
}

/// 运行时信息
#[derive(Debug, Clone)]
pub struct RuntimeInfo {
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

impl Default for RuntimeInfo {
    fn default() -> Self {
        Self {
            start_time: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Explicitly constructed dependency root: configuration, the model, the
/// cache service, registries and stores. Components are built from it.
#[derive(Clone)]
pub struct GlobalContext {
    pub config: GlobalConfig,
    pub runtime_info: RuntimeInfo,
    pub model: Arc<dyn ChatModel>,
    pub cache: Arc<CacheService>,
    pub context: Arc<dyn ContextProvider>,
    pub registry: Arc<AgentRegistry>,
    pub workflows: Arc<dyn WorkflowService>,
    pub actions: Arc<dyn ActionExecutor>,
    pub suggestions: Arc<dyn SuggestionStore>,
    pub logs: Arc<dyn ExecutionLogStore>,
    pub handlers: Arc<HandlerRegistry>,
    pub catalog: Vec<FunctionSpec>,
}

impl GlobalContext {
    pub fn builder(config: GlobalConfig) -> GlobalContextBuilder {
        GlobalContextBuilder::new(config)
    }

    /// Starts background maintenance: cache sweeping and dead-agent cleanup.
    pub fn init(&self) {
        self.cache.start();
        self.registry.start_cleanup_task();
        info!(
            "copilot context v{} initialised (model {})",
            self.runtime_info.version, self.config.model.model
        );
    }

    pub async fn shutdown(&self) {
        self.registry.stop_cleanup_task();
        self.cache.stop().await;
        info!("copilot context shut down");
    }

    pub fn parser(&self) -> CommandParser {
        let mode = if self.config.streaming_parse {
            ParseMode::Streaming
        } else {
            ParseMode::NonStreaming
        };
        CommandParser::new(self.model.clone(), self.context.clone()).with_mode(mode)
    }

    pub fn planner(&self) -> Planner {
        Planner::new(self.model.clone(), self.context.clone())
    }

    pub fn executor(&self) -> Executor {
        Executor::new(self.handlers.clone())
            .with_retry_policy(self.config.retry_policy())
            .with_log_store(self.logs.clone())
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.model.clone(),
            self.context.clone(),
            self.registry.clone(),
            self.actions.clone(),
        )
    }

    pub fn suggestion_engine(&self) -> SuggestionEngine {
        SuggestionEngine::new(self.model.clone(), self.context.clone())
            .with_store(self.suggestions.clone())
            .with_execution_logs(self.logs.clone())
    }

    pub fn pipeline(&self) -> CommandPipeline {
        CommandPipeline::new(self.parser(), self.planner(), self.executor(), self.catalog.clone())
    }

    pub fn execute_options(&self) -> ExecuteOptions {
        self.config.execute_options()
    }
}

/// Collaborators left unset get in-memory defaults; the model defaults to an
/// `OpenAiClient` for the configured endpoint.
pub struct GlobalContextBuilder {
    config: GlobalConfig,
    model: Option<Arc<dyn ChatModel>>,
    context_source: Option<Arc<dyn ContextSource>>,
    workflows: Option<Arc<dyn WorkflowService>>,
    actions: Option<Arc<dyn ActionExecutor>>,
    suggestions: Option<Arc<dyn SuggestionStore>>,
    logs: Option<Arc<dyn ExecutionLogStore>>,
    catalog: Option<Vec<FunctionSpec>>,
    handlers: Vec<(String, Arc<dyn StepHandler>)>,
}

impl GlobalContextBuilder {
    pub fn new(config: GlobalConfig) -> Self {
        Self {
            config,
            model: None,
            context_source: None,
            workflows: None,
            actions: None,
            suggestions: None,
            logs: None,
            catalog: None,
            handlers: Vec::new(),
        }
    }

    pub fn model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn context_source(mut self, source: Arc<dyn ContextSource>) -> Self {
        self.context_source = Some(source);
        self
    }

    pub fn workflows(mut self, workflows: Arc<dyn WorkflowService>) -> Self {
        self.workflows = Some(workflows);
        self
    }

    pub fn actions(mut self, actions: Arc<dyn ActionExecutor>) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn suggestion_store(mut self, store: Arc<dyn SuggestionStore>) -> Self {
        self.suggestions = Some(store);
        self
    }

    pub fn execution_logs(mut self, logs: Arc<dyn ExecutionLogStore>) -> Self {
        self.logs = Some(logs);
        self
    }

    pub fn catalog(mut self, catalog: Vec<FunctionSpec>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Adds or replaces the handler for `function`.
    pub fn handler(mut self, function: &str, handler: Arc<dyn StepHandler>) -> Self {
        self.handlers.push((function.to_string(), handler));
        self
    }

    pub fn build(self) -> GlobalContext {
        let config = self.config;

        let model = self
            .model
            .unwrap_or_else(|| Arc::new(OpenAiClient::from_config(&config.model)));
        let cache = Arc::new(CacheService::new(config.cache.clone()));
        let source = self
            .context_source
            .unwrap_or_else(|| Arc::new(StaticContextSource::default()));
        let context: Arc<dyn ContextProvider> = Arc::new(CachedContextProvider::new(
            source,
            cache.clone(),
            config.context_cache_ttl_secs,
        ));
        let registry = Arc::new(AgentRegistry::new(RegistryConfig {
            heartbeat_timeout_secs: config.heartbeat_timeout_secs,
            cleanup_interval_secs: config.registry_cleanup_interval_secs,
        }));
        let workflows = self
            .workflows
            .unwrap_or_else(|| Arc::new(InMemoryWorkflowService::new()));
        let actions = self
            .actions
            .unwrap_or_else(|| Arc::new(KeywordActionExecutor::new()));
        let suggestions = self
            .suggestions
            .unwrap_or_else(|| Arc::new(InMemorySuggestionStore::new()));
        let logs = self
            .logs
            .unwrap_or_else(|| Arc::new(InMemoryExecutionLogStore::new()));

        let mut handlers = HandlerRegistry::with_defaults(&HandlerServices {
            model: model.clone(),
            context: context.clone(),
            workflows: workflows.clone(),
            actions: actions.clone(),
            logs: Some(logs.clone()),
        });
        for (function, handler) in self.handlers {
            handlers.register(&function, handler);
        }

        GlobalContext {
            runtime_info: RuntimeInfo::default(),
            catalog: self.catalog.unwrap_or_else(default_catalog),
            config,
            model,
            cache,
            context,
            registry,
            workflows,
            actions,
            suggestions,
            logs,
            handlers: Arc::new(handlers),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{context::BusinessContext, llm::ScriptedModel};

    #[test]
    fn toml_overrides_defaults() {
        let config = GlobalConfig::from_toml_str(
            r#"
            max_retries = 5
            step_timeout_secs = 20

            [model]
            model = "gpt-4o"
            "#,
        )
        .unwrap();

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.step_timeout_secs, Some(20));
        assert_eq!(config.model.model, "gpt-4o");
        assert_eq!(config.model.base_url, "https://api.openai.com/v1");
        assert_eq!(config.cache.max_entries, 1000);
    }

    #[test]
    fn env_overrides_skip_unparsable_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-test"),
            ("COPILOT_MAX_RETRIES", "five"),
            ("COPILOT_BACKOFF_BASE_MS", "250"),
        ]);
        let config = GlobalConfig::default().with_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.model.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_policy().base_delay, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn builds_and_shuts_down() {
        let context = GlobalContext::builder(GlobalConfig::default())
            .model(Arc::new(ScriptedModel::new()))
            .context_source(Arc::new(StaticContextSource::new(BusinessContext {
                domain: "marketing".into(),
                ..Default::default()
            })))
            .build();
        context.init();

        assert_eq!(context.context.load().await.domain, "marketing");
        assert!(context.handlers.has_handler("backup_database"));
        assert!(!context.catalog.is_empty());

        context.shutdown().await;
        assert!(!context.cache.is_running());
    }
}
