//! Provider router — maps configured names to provider instances.

use crate::openai_compat::OpenAiCompatProvider;
use agentloom_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;

/// Routes model requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider name.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default_provider(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// Resolve a model string to (provider, model).
    ///
    /// `custom:<base-url>` creates an ad-hoc OpenAI-compatible provider
    /// against that endpoint; everything else goes to the default
    /// provider with the model string as-is.
    pub fn resolve(&self, model_or_provider: &str) -> Option<(Arc<dyn Provider>, String)> {
        if let Some(rest) = model_or_provider.strip_prefix("custom:") {
            let provider = Arc::new(OpenAiCompatProvider::new("custom", rest, ""));
            return Some((provider, model_or_provider.to_string()));
        }
        self.default_provider()
            .map(|p| (p, model_or_provider.to_string()))
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup() {
        let mut router = ProviderRouter::new("openrouter");
        let provider = Arc::new(OpenAiCompatProvider::openrouter("sk-test"));
        router.register("openrouter", provider);

        assert!(router.get("openrouter").is_some());
        assert!(router.get("nonexistent").is_none());
        assert!(router.default_provider().is_some());
    }

    #[test]
    fn resolve_falls_back_to_default() {
        let mut router = ProviderRouter::new("openai");
        router.register("openai", Arc::new(OpenAiCompatProvider::openai("sk-test")));

        let (provider, model) = router.resolve("gpt-4o").unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(model, "gpt-4o");
    }

    #[test]
    fn resolve_custom_endpoint() {
        let router = ProviderRouter::new("missing");
        let resolved = router.resolve("custom:http://localhost:8000/v1");
        assert!(resolved.is_some());
        assert_eq!(resolved.unwrap().0.name(), "custom");
    }

    #[test]
    fn resolve_without_default_is_none() {
        let router = ProviderRouter::new("unconfigured");
        assert!(router.resolve("gpt-4o").is_none());
    }
}
