use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{SheetPilotError, SheetPilotResult};

pub const DEFAULT_PROVIDER: &str = "openai";
pub const DEFAULT_MAX_DEPTH: u32 = 10;
pub const DEFAULT_MAX_PLAYGROUND_CELLS: u64 = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub workbook: WorkbookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub active_provider: String,
    pub providers: HashMap<String, ProviderEntry>,
    /// Role-to-model mapping. If a role is absent, falls back to active_provider defaults.
    #[serde(default)]
    pub roles: RolesConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert(
            DEFAULT_PROVIDER.to_string(),
            ProviderEntry {
                display_name: "OpenAI".into(),
                api_base: "https://api.openai.com/v1/chat/completions".into(),
                model: "gpt-3.5-turbo".into(),
                temperature: 0.0,
                api_key: None,
            },
        );
        Self {
            active_provider: DEFAULT_PROVIDER.into(),
            providers,
            roles: RolesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub display_name: String,
    pub api_base: String,
    /// Default model for this provider (used as fallback when no role config exists).
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Optional API key stored in config.toml (env vars take precedence).
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Maps agent roles to specific provider+model combinations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RolesConfig {
    /// Free-text planning pass.
    pub reasoning: Option<RoleEntry>,
    /// JSON action-list pass.
    pub actions: Option<RoleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleEntry {
    /// Must match a key under [llm.providers.*].
    pub provider: String,
    /// Model name sent to the API.
    pub model: String,
    /// Use SSE streaming.
    #[serde(default)]
    pub stream: bool,
    /// Overrides the provider-level temperature for this role.
    pub temperature: Option<f64>,
}

fn default_temperature() -> f64 {
    0.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Retries allowed when the action pass yields no JSON array.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    /// Append every chat entry to a JSONL session file.
    #[serde(default = "default_true")]
    pub record_history: bool,
    /// Extra rules appended to the built-in data layout conventions.
    #[serde(default)]
    pub extra_conventions: Vec<String>,
    /// Largest playground, in cells, the agent will snapshot.
    #[serde(default = "default_max_playground_cells")]
    pub max_playground_cells: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            record_history: true,
            extra_conventions: Vec::new(),
            max_playground_cells: DEFAULT_MAX_PLAYGROUND_CELLS,
        }
    }
}

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

fn default_max_playground_cells() -> u64 {
    DEFAULT_MAX_PLAYGROUND_CELLS
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkbookConfig {
    /// JSON file backing the worksheet.
    #[serde(default = "default_workbook_path")]
    pub path: PathBuf,
    /// Playground selected at startup, if any.
    #[serde(default)]
    pub playground: Option<String>,
}

impl Default for WorkbookConfig {
    fn default() -> Self {
        Self {
            path: default_workbook_path(),
            playground: None,
        }
    }
}

fn default_workbook_path() -> PathBuf {
    PathBuf::from("sheet.json")
}

fn resolve_config_path() -> SheetPilotResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(SheetPilotError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

pub fn parse_config(content: &str) -> SheetPilotResult<AppConfig> {
    let config: AppConfig = toml::from_str(content)?;
    if !config.llm.providers.contains_key(&config.llm.active_provider) {
        return Err(SheetPilotError::Config(format!(
            "active provider '{}' has no [llm.providers.{}] entry",
            config.llm.active_provider, config.llm.active_provider
        )));
    }
    Ok(config)
}

pub fn load_config() -> SheetPilotResult<AppConfig> {
    let path = resolve_config_path()?;
    let content = std::fs::read_to_string(&path)?;
    let config = parse_config(&content)?;
    tracing::info!(path = %path.display(), provider = %config.llm.active_provider, "config loaded");
    Ok(config)
}

/// Like `load_config`, but a missing file means built-in defaults.
pub fn load_or_default() -> SheetPilotResult<AppConfig> {
    if resolve_config_path().is_err() {
        tracing::info!("no config.toml; using built-in defaults");
        return Ok(AppConfig::default());
    }
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_openai() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.active_provider, "openai");
        let entry = &cfg.llm.providers["openai"];
        assert_eq!(entry.model, "gpt-3.5-turbo");
        assert_eq!(entry.temperature, 0.0);
        assert_eq!(cfg.agent.max_depth, 10);
        assert!(cfg.agent.record_history);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.agent.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(cfg.agent.max_playground_cells, DEFAULT_MAX_PLAYGROUND_CELLS);
        assert_eq!(cfg.workbook.path, PathBuf::from("sheet.json"));
    }

    #[test]
    fn parses_roles_and_agent_settings() {
        let toml = r#"
[llm]
active_provider = "local"

[llm.providers.local]
display_name = "Local"
api_base = "http://localhost:11434/v1/chat/completions"
model = "llama3"

[llm.roles.actions]
provider = "local"
model = "llama3-json"
temperature = 0.0

[agent]
max_depth = 3
record_history = false
max_playground_cells = 500

[workbook]
path = "budget.json"
playground = "A1:D10"
"#;
        let cfg = parse_config(toml).unwrap();
        assert_eq!(cfg.llm.active_provider, "local");
        let actions = cfg.llm.roles.actions.as_ref().unwrap();
        assert_eq!(actions.model, "llama3-json");
        assert!(!actions.stream);
        assert!(cfg.llm.roles.reasoning.is_none());
        assert_eq!(cfg.agent.max_depth, 3);
        assert!(!cfg.agent.record_history);
        assert_eq!(cfg.agent.max_playground_cells, 500);
        assert_eq!(cfg.workbook.playground.as_deref(), Some("A1:D10"));
    }

    #[test]
    fn unknown_active_provider_is_rejected() {
        let toml = r#"
[llm]
active_provider = "missing"
[llm.providers.openai]
display_name = "OpenAI"
api_base = "https://api.openai.com/v1/chat/completions"
model = "gpt-3.5-turbo"
"#;
        assert!(matches!(parse_config(toml), Err(SheetPilotError::Config(_))));
    }
}
