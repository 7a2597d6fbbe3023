use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{AppConfig, LlmConfig, ProviderEntry, DEFAULT_PROVIDER};
use crate::errors::{SheetPilotError, SheetPilotResult};
use crate::llm::provider::LlmProvider;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::llm::types::CallConfig;

/// Agent roles that need a model.
pub const ROLE_REASONING: &str = "reasoning";
pub const ROLE_ACTIONS: &str = "actions";

const OPENAI_API_ORIGIN: &str = "https://api.openai.com/";

/// Registry of all available LLM providers, keyed by their config.toml identifier.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    active: String,
    llm_config: LlmConfig,
}

impl ProviderRegistry {
    /// An empty registry over `llm_config`; providers are added with `register`.
    pub fn new(llm_config: LlmConfig) -> Self {
        Self {
            providers: HashMap::new(),
            active: llm_config.active_provider.clone(),
            llm_config,
        }
    }

    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get_active(&self) -> SheetPilotResult<Arc<dyn LlmProvider>> {
        self.providers
            .get(&self.active)
            .cloned()
            .ok_or_else(|| SheetPilotError::Config(format!("Active provider '{}' not found in registry", self.active)))
    }

    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Return the provider and call configuration for a named agent role.
    ///
    /// Role resolution order:
    /// 1. `[llm.roles.<role>]` in config.toml
    /// 2. Fallback: active provider with its default model / temperature, no streaming
    pub fn call_config_for_role(&self, role: &str) -> SheetPilotResult<(Arc<dyn LlmProvider>, CallConfig)> {
        let role_entry = match role {
            ROLE_REASONING => self.llm_config.roles.reasoning.as_ref(),
            ROLE_ACTIONS => self.llm_config.roles.actions.as_ref(),
            other => {
                tracing::warn!(role = other, "unknown role, falling back to active provider");
                None
            }
        };

        if let Some(entry) = role_entry {
            let provider = self.providers.get(&entry.provider).cloned().ok_or_else(|| {
                SheetPilotError::Config(format!(
                    "Role '{}' references unknown provider '{}'",
                    role, entry.provider
                ))
            })?;
            let temperature = entry.temperature.unwrap_or_else(|| {
                self.llm_config
                    .providers
                    .get(&entry.provider)
                    .map(|p| p.temperature)
                    .unwrap_or(0.0)
            });
            tracing::debug!(
                role = role,
                provider = %entry.provider,
                model = %entry.model,
                stream = entry.stream,
                temperature = temperature,
                "resolved role config"
            );
            return Ok((provider, CallConfig {
                model: entry.model.clone(),
                stream: entry.stream,
                temperature,
            }));
        }

        let provider = self.get_active()?;
        let (model, temperature) = self
            .llm_config
            .providers
            .get(&self.active)
            .map(|p| (p.model.clone(), p.temperature))
            .unwrap_or_else(|| (String::new(), 0.0));
        tracing::debug!(
            role = role,
            provider = %self.active,
            model = %model,
            "role not configured, using active provider fallback"
        );
        Ok((provider, CallConfig { model, stream: false, temperature }))
    }

    /// Build a registry from the loaded app config.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::new(config.llm.clone());
        for (id, entry) in &config.llm.providers {
            let api_key = resolve_api_key(id, entry, |name| std::env::var(name).ok());
            if api_key.is_empty() {
                tracing::warn!(provider = %id, "no API key found for provider");
            }
            let provider = OpenAiCompatibleProvider::new(id.clone(), entry.api_base.clone(), api_key);
            registry.register(Arc::new(provider));
        }
        registry
    }
}

/// Key for one provider: `SHEETPILOT_<ID>_API_KEY`, then the entry's own
/// `api_key`, then `OPENAI_API_KEY` for OpenAI endpoints only.
fn resolve_api_key(
    id: &str,
    entry: &ProviderEntry,
    env: impl Fn(&str) -> Option<String>,
) -> String {
    let non_empty = |v: Option<String>| v.filter(|k| !k.trim().is_empty());
    if let Some(key) = non_empty(env(&format!("SHEETPILOT_{}_API_KEY", id.to_uppercase()))) {
        return key;
    }
    if let Some(key) = non_empty(entry.api_key.clone()) {
        return key;
    }
    let is_openai = id == DEFAULT_PROVIDER || entry.api_base.starts_with(OPENAI_API_ORIGIN);
    if is_openai {
        if let Some(key) = non_empty(env("OPENAI_API_KEY")) {
            return key;
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_engine::event_bus::EventBus;
    use crate::config::RoleEntry;
    use crate::llm::types::{ChatMessage, LlmResponse};
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl LlmProvider for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn chat(
            &self,
            _messages: Vec<ChatMessage>,
            _cfg: &CallConfig,
            _events: &EventBus,
        ) -> SheetPilotResult<LlmResponse> {
            Ok(LlmResponse::default())
        }
    }

    #[test]
    fn role_falls_back_to_active_provider() {
        let mut reg = ProviderRegistry::new(LlmConfig::default());
        reg.register(Arc::new(Named("openai")));
        let (provider, cfg) = reg.call_config_for_role(ROLE_REASONING).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(cfg.model, "gpt-3.5-turbo");
        assert!(!cfg.stream);
    }

    #[test]
    fn configured_role_wins() {
        let mut llm = LlmConfig::default();
        llm.roles.actions = Some(RoleEntry {
            provider: "openai".into(),
            model: "gpt-4o-mini".into(),
            stream: false,
            temperature: Some(0.2),
        });
        let mut reg = ProviderRegistry::new(llm);
        reg.register(Arc::new(Named("openai")));
        let (_, cfg) = reg.call_config_for_role(ROLE_ACTIONS).unwrap();
        assert_eq!(cfg.model, "gpt-4o-mini");
        assert_eq!(cfg.temperature, 0.2);
    }

    #[test]
    fn role_with_unknown_provider_errors() {
        let mut llm = LlmConfig::default();
        llm.roles.reasoning = Some(RoleEntry {
            provider: "ghost".into(),
            model: "x".into(),
            stream: true,
            temperature: None,
        });
        let mut reg = ProviderRegistry::new(llm);
        reg.register(Arc::new(Named("openai")));
        assert!(reg.call_config_for_role(ROLE_REASONING).is_err());
    }

    #[test]
    fn list_names_is_sorted() {
        let mut reg = ProviderRegistry::new(LlmConfig::default());
        reg.register(Arc::new(Named("openai")));
        reg.register(Arc::new(Named("local")));
        assert_eq!(reg.list_names(), vec!["local", "openai"]);
        assert_eq!(reg.get_active().unwrap().name(), "openai");
    }

    fn entry(api_base: &str, api_key: Option<&str>) -> ProviderEntry {
        ProviderEntry {
            display_name: "test".into(),
            api_base: api_base.into(),
            model: "m".into(),
            temperature: 0.0,
            api_key: api_key.map(str::to_string),
        }
    }

    fn env_with(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| vars.iter().find(|(k, _)| *k == name).map(|(_, v)| v.to_string())
    }

    #[test]
    fn openai_key_never_reaches_other_endpoints() {
        let env = env_with(&[("OPENAI_API_KEY", "sk-openai")]);
        let local = entry("http://localhost:11434/v1/chat/completions", Some("local-key"));
        assert_eq!(resolve_api_key("local", &local, &env), "local-key");

        let keyless = entry("https://llm.example.com/v1/chat/completions", None);
        assert_eq!(resolve_api_key("thirdparty", &keyless, &env), "");

        let openai = entry("https://api.openai.com/v1/chat/completions", None);
        assert_eq!(resolve_api_key("openai", &openai, &env), "sk-openai");
        assert_eq!(resolve_api_key("gpt", &openai, &env), "sk-openai");
    }

    #[test]
    fn provider_specific_env_wins() {
        let env = env_with(&[
            ("SHEETPILOT_LOCAL_API_KEY", "env-local"),
            ("OPENAI_API_KEY", "sk-openai"),
        ]);
        let local = entry("http://localhost:11434/v1/chat/completions", Some("local-key"));
        assert_eq!(resolve_api_key("local", &local, &env), "env-local");

        let openai = entry("https://api.openai.com/v1/chat/completions", Some("sk-config"));
        assert_eq!(resolve_api_key("openai", &openai, &env), "sk-config");
    }

    #[test]
    fn from_config_registers_every_provider() {
        let reg = ProviderRegistry::from_config(&AppConfig::default());
        assert_eq!(reg.list_names(), vec!["openai"]);
    }
}
