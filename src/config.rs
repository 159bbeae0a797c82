//! Project settings and agent construction defaults

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Provider used when neither the node nor the settings name one
pub const DEFAULT_PROVIDER: &str = "openai";

/// Model used when neither the node, the environment nor the settings name one
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Label of the director synthesized when the graph declares none
pub const DEFAULT_DIRECTOR_LABEL: &str = "Team Director";

/// Environment variable overriding the default chat model
pub const MODEL_ENV_VAR: &str = "OPENAI_CHAT_MODEL_ID";

/// Settings attached to a project graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_director_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_director_strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_strategy: Option<String>,
    /// Settings this crate does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TeamSettings {
    /// Label for a synthesized director
    pub fn director_label(&self) -> &str {
        self.team_director_label
            .as_deref()
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_DIRECTOR_LABEL)
    }

    /// Strategy for a synthesized director
    pub fn director_strategy(&self) -> &str {
        [&self.team_director_strategy, &self.team_strategy]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|s| !s.is_empty())
            .unwrap_or("sequential")
    }
}

/// Provider and model handed to agents that do not pick their own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDefaults {
    pub provider: String,
    pub model: String,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self::new(DEFAULT_PROVIDER, DEFAULT_MODEL)
    }
}

impl AgentDefaults {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Resolve defaults from settings, with `OPENAI_CHAT_MODEL_ID` taking
    /// precedence over the settings model
    pub fn from_settings(settings: &TeamSettings) -> Self {
        Self::resolve(settings, std::env::var(MODEL_ENV_VAR).ok())
    }

    fn resolve(settings: &TeamSettings, env_model: Option<String>) -> Self {
        let provider = settings
            .default_provider
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PROVIDER.to_string());
        let model = env_model
            .filter(|m| !m.is_empty())
            .or_else(|| settings.default_model.clone().filter(|m| !m.is_empty()))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Self { provider, model }
    }
}
