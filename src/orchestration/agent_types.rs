use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Specialised agent kinds the orchestrator can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    ContentCreator,
    DataAnalyst,
    SeoSpecialist,
    WorkflowAutomation,
    ResearchAgent,
}

impl AgentType {
    pub const ALL: [AgentType; 5] = [
        AgentType::ContentCreator,
        AgentType::DataAnalyst,
        AgentType::SeoSpecialist,
        AgentType::WorkflowAutomation,
        AgentType::ResearchAgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::ContentCreator => "content_creator",
            AgentType::DataAnalyst => "data_analyst",
            AgentType::SeoSpecialist => "seo_specialist",
            AgentType::WorkflowAutomation => "workflow_automation",
            AgentType::ResearchAgent => "research_agent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|t| t.as_str().eq_ignore_ascii_case(value))
    }

    pub fn info(&self) -> &'static AgentTypeInfo {
        // Every variant has exactly one catalog entry.
        &AGENT_CATALOG[*self as usize]
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct AgentTypeInfo {
    pub agent_type: AgentType,
    pub name: &'static str,
    pub description: &'static str,
    pub capabilities: Vec<&'static str>,
}

/// Catalog in `AgentType` declaration order.
pub static AGENT_CATALOG: Lazy<Vec<AgentTypeInfo>> = Lazy::new(|| {
    vec![
        AgentTypeInfo {
            agent_type: AgentType::ContentCreator,
            name: "Content Creator",
            description: "Writes posts, articles and social media content",
            capabilities: vec!["generate_content", "create_post", "write_article", "create_social_post"],
        },
        AgentTypeInfo {
            agent_type: AgentType::DataAnalyst,
            name: "Data Analyst",
            description: "Analyses data, statistics and keyword performance",
            capabilities: vec!["analyze_data", "generate_stats", "analyze_keywords", "performance_analysis"],
        },
        AgentTypeInfo {
            agent_type: AgentType::SeoSpecialist,
            name: "SEO Specialist",
            description: "Optimises content for search and researches keywords",
            capabilities: vec!["optimize_seo", "keyword_research", "seo_analysis", "content_optimization"],
        },
        AgentTypeInfo {
            agent_type: AgentType::WorkflowAutomation,
            name: "Workflow Automation",
            description: "Creates and optimises automation workflows",
            capabilities: vec!["create_workflow", "optimize_workflow", "automate_task"],
        },
        AgentTypeInfo {
            agent_type: AgentType::ResearchAgent,
            name: "Research Agent",
            description: "Researches topics and gathers information",
            capabilities: vec!["research_topic", "gather_information", "analyze_trends"],
        },
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_lines_up_with_variants() {
        for agent_type in AgentType::ALL {
            assert_eq!(agent_type.info().agent_type, agent_type);
            assert_eq!(AgentType::parse(agent_type.as_str()), Some(agent_type));
        }
        assert_eq!(AgentType::parse("janitor"), None);
    }
}
