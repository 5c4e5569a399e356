use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{sync::RwLock, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    error::{CopilotError, Result},
    orchestration::agent_types::AgentType,
};

/// Work handed to a registered agent runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    pub command: String,
    pub role: String,
    /// Results of earlier agents keyed by agent type.
    pub context: Value,
    pub user_id: Option<String>,
    pub project_id: Option<String>,
}

/// A running agent that can take orchestrated work.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn execute(&self, request: AgentRequest) -> Result<Value>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Idle,
    Busy,
    Offline,
}

#[derive(Debug, Clone)]
pub struct AgentInfo {
    pub id: String,
    pub agent_type: AgentType,
    pub status: AgentStatus,
    pub last_heartbeat: DateTime<Utc>,
    pub metadata: Value,
}

impl AgentInfo {
    pub fn new(id: impl Into<String>, agent_type: AgentType) -> Self {
        Self {
            id: id.into(),
            agent_type,
            status: AgentStatus::Active,
            last_heartbeat: Utc::now(),
            metadata: serde_json::json!({}),
        }
    }

    pub fn update_heartbeat(&mut self) {
        self.last_heartbeat = Utc::now();
    }

    pub fn is_alive(&self, timeout: Duration) -> bool {
        Utc::now() - self.last_heartbeat < timeout
    }

    /// Alive and not marked offline.
    pub fn is_available(&self, timeout: Duration) -> bool {
        self.status != AgentStatus::Offline && self.is_alive(timeout)
    }
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub heartbeat_timeout_secs: i64,
    pub cleanup_interval_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: 30,
            cleanup_interval_secs: 60,
        }
    }
}

/// Availability of an agent type as seen by selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeAvailability {
    /// No instance registered; the orchestrator serves it directly.
    Unregistered,
    Available,
    /// Instances exist but none is alive.
    Unavailable,
}

pub struct AgentRegistry {
    agents: Arc<RwLock<HashMap<String, AgentInfo>>>,
    runtimes: Arc<RwLock<HashMap<String, Arc<dyn AgentRuntime>>>>,
    type_index: Arc<RwLock<HashMap<AgentType, Vec<String>>>>,
    config: RegistryConfig,
    cleanup: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl AgentRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            agents: Arc::new(RwLock::new(HashMap::new())),
            runtimes: Arc::new(RwLock::new(HashMap::new())),
            type_index: Arc::new(RwLock::new(HashMap::new())),
            config,
            cleanup: std::sync::Mutex::new(None),
        }
    }

    fn heartbeat_timeout(&self) -> Duration {
        Duration::seconds(self.config.heartbeat_timeout_secs)
    }

    pub async fn register(&self, info: AgentInfo) -> Result<()> {
        let agent_id = info.id.clone();
        let agent_type = info.agent_type;

        if self.agents.write().await.insert(agent_id.clone(), info).is_none() {
            self.type_index
                .write()
                .await
                .entry(agent_type)
                .or_default()
                .push(agent_id.clone());
        }

        info!("agent {} ({}) registered", agent_id, agent_type);
        Ok(())
    }

    /// Registers an instance together with the runtime that executes its tasks.
    pub async fn register_runtime(&self, info: AgentInfo, runtime: Arc<dyn AgentRuntime>) -> Result<()> {
        let agent_id = info.id.clone();
        self.register(info).await?;
        self.runtimes.write().await.insert(agent_id, runtime);
        Ok(())
    }

    pub async fn unregister(&self, agent_id: &str) -> Result<()> {
        let info = self
            .agents
            .write()
            .await
            .remove(agent_id)
            .ok_or_else(|| CopilotError::AgentNotFound(agent_id.to_string()))?;
        self.runtimes.write().await.remove(agent_id);

        let mut type_index = self.type_index.write().await;
        if let Some(agents) = type_index.get_mut(&info.agent_type) {
            agents.retain(|id| id != agent_id);
            if agents.is_empty() {
                type_index.remove(&info.agent_type);
            }
        }

        info!("agent {} unregistered", agent_id);
        Ok(())
    }

    pub async fn update_status(&self, agent_id: &str, status: AgentStatus) -> Result<()> {
        let mut agents = self.agents.write().await;
        let agent = agents
            .get_mut(agent_id)
            .ok_or_else(|| CopilotError::AgentNotFound(agent_id.to_string()))?;
        agent.status = status;
        Ok(())
    }

    pub async fn heartbeat(&self, agent_id: &str) -> Result<()> {
        let mut agents = self.agents.write().await;
        let agent = agents
            .get_mut(agent_id)
            .ok_or_else(|| CopilotError::AgentNotFound(agent_id.to_string()))?;
        agent.update_heartbeat();
        Ok(())
    }

    pub async fn get_agent(&self, agent_id: &str) -> Option<AgentInfo> {
        self.agents.read().await.get(agent_id).cloned()
    }

    pub async fn find_by_type(&self, agent_type: AgentType) -> Vec<AgentInfo> {
        let type_index = self.type_index.read().await;
        let agents = self.agents.read().await;

        type_index
            .get(&agent_type)
            .map(|ids| ids.iter().filter_map(|id| agents.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    pub async fn availability(&self, agent_type: AgentType) -> TypeAvailability {
        let instances = self.find_by_type(agent_type).await;
        if instances.is_empty() {
            TypeAvailability::Unregistered
        } else if instances.iter().any(|a| a.is_available(self.heartbeat_timeout())) {
            TypeAvailability::Available
        } else {
            TypeAvailability::Unavailable
        }
    }

    /// Types with at least one live instance.
    pub async fn available_types(&self) -> Vec<AgentType> {
        let timeout = self.heartbeat_timeout();
        let agents = self.agents.read().await;
        AgentType::ALL
            .into_iter()
            .filter(|t| agents.values().any(|a| a.agent_type == *t && a.is_available(timeout)))
            .collect()
    }

    /// Picks a live instance with a runtime, preferring `preferred` and then
    /// idle or active instances over busy ones.
    pub async fn runtime_for(
        &self,
        agent_type: AgentType,
        preferred: Option<&str>,
    ) -> Option<(AgentInfo, Arc<dyn AgentRuntime>)> {
        let timeout = self.heartbeat_timeout();
        let runtimes = self.runtimes.read().await;
        let mut candidates: Vec<AgentInfo> = self
            .find_by_type(agent_type)
            .await
            .into_iter()
            .filter(|a| a.is_available(timeout) && runtimes.contains_key(&a.id))
            .collect();

        candidates.sort_by_key(|a| {
            let preferred_rank = if Some(a.id.as_str()) == preferred { 0 } else { 1 };
            let busy_rank = if a.status == AgentStatus::Busy { 1 } else { 0 };
            (preferred_rank, busy_rank)
        });

        let info = candidates.into_iter().next()?;
        let runtime = runtimes.get(&info.id)?.clone();
        Some((info, runtime))
    }

    pub async fn cleanup_dead_agents(&self) -> Vec<String> {
        let timeout = self.heartbeat_timeout();
        let dead_agents: Vec<String> = self
            .agents
            .read()
            .await
            .iter()
            .filter(|(_, agent)| !agent.is_alive(timeout))
            .map(|(id, _)| id.clone())
            .collect();

        for agent_id in &dead_agents {
            warn!("removing dead agent {}", agent_id);
            if let Err(e) = self.unregister(agent_id).await {
                debug!("agent {} already gone: {}", agent_id, e);
            }
        }

        dead_agents
    }

    pub async fn get_stats(&self) -> RegistryStats {
        let agents = self.agents.read().await;
        let timeout = self.heartbeat_timeout();

        let mut agents_by_type = HashMap::new();
        for agent in agents.values() {
            *agents_by_type.entry(agent.agent_type).or_insert(0) += 1;
        }

        RegistryStats {
            total_agents: agents.len(),
            alive_agents: agents.values().filter(|a| a.is_alive(timeout)).count(),
            idle_agents: agents.values().filter(|a| a.status == AgentStatus::Idle).count(),
            busy_agents: agents.values().filter(|a| a.status == AgentStatus::Busy).count(),
            agents_by_type,
        }
    }

    /// Starts the periodic dead-agent sweep. Calling it twice is a no-op.
    pub fn start_cleanup_task(self: &Arc<Self>) {
        let Ok(mut slot) = self.cleanup.lock() else {
            return;
        };
        if slot.is_some() {
            return;
        }

        let registry = Arc::downgrade(self);
        let period = std::time::Duration::from_secs(self.config.cleanup_interval_secs.max(1));
        *slot = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let dead_agents = registry.cleanup_dead_agents().await;
                if !dead_agents.is_empty() {
                    info!("cleaned up {} dead agents", dead_agents.len());
                }
            }
        }));
    }

    pub fn stop_cleanup_task(&self) {
        if let Ok(mut slot) = self.cleanup.lock()
            && let Some(handle) = slot.take()
        {
            handle.abort();
        }
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

#[derive(Debug)]
pub struct RegistryStats {
    pub total_agents: usize,
    pub alive_agents: usize,
    pub idle_agents: usize,
    pub busy_agents: usize,
    pub agents_by_type: HashMap<AgentType, usize>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct Echo;

    #[async_trait]
    impl AgentRuntime for Echo {
        async fn execute(&self, request: AgentRequest) -> Result<Value> {
            Ok(json!({"handled": request.command}))
        }
    }

    #[tokio::test]
    async fn test_agent_registration() {
        let registry = AgentRegistry::default();
        registry
            .register(AgentInfo::new("writer-1", AgentType::ContentCreator))
            .await
            .unwrap();

        let agent = registry.get_agent("writer-1").await.unwrap();
        assert_eq!(agent.agent_type, AgentType::ContentCreator);
        assert_eq!(registry.available_types().await, vec![AgentType::ContentCreator]);
        assert_eq!(
            registry.availability(AgentType::SeoSpecialist).await,
            TypeAvailability::Unregistered
        );
    }

    #[tokio::test]
    async fn offline_instances_make_a_type_unavailable() {
        let registry = AgentRegistry::default();
        registry
            .register_runtime(AgentInfo::new("seo-1", AgentType::SeoSpecialist), Arc::new(Echo))
            .await
            .unwrap();
        assert!(registry.runtime_for(AgentType::SeoSpecialist, None).await.is_some());

        registry.update_status("seo-1", AgentStatus::Offline).await.unwrap();
        assert_eq!(
            registry.availability(AgentType::SeoSpecialist).await,
            TypeAvailability::Unavailable
        );
        assert!(registry.runtime_for(AgentType::SeoSpecialist, None).await.is_none());
    }

    #[tokio::test]
    async fn stale_heartbeats_are_cleaned_up() {
        let registry = AgentRegistry::new(RegistryConfig {
            heartbeat_timeout_secs: 30,
            cleanup_interval_secs: 60,
        });
        let mut stale = AgentInfo::new("analyst-1", AgentType::DataAnalyst);
        stale.last_heartbeat = Utc::now() - Duration::seconds(120);
        registry.register(stale).await.unwrap();
        registry
            .register(AgentInfo::new("analyst-2", AgentType::DataAnalyst))
            .await
            .unwrap();

        assert_eq!(registry.cleanup_dead_agents().await, vec!["analyst-1".to_string()]);
        let stats = registry.get_stats().await;
        assert_eq!(stats.total_agents, 1);
        assert_eq!(stats.agents_by_type.get(&AgentType::DataAnalyst), Some(&1));
    }

    #[tokio::test]
    async fn unknown_agents_are_reported() {
        let registry = AgentRegistry::default();
        let err = registry.heartbeat("ghost").await.unwrap_err();
        assert!(matches!(err.as_copilot(), Some(CopilotError::AgentNotFound(_))));
    }
}
