//! Provider Registry
//!
//! Maps model ids to the provider that serves them. Each entry decides which
//! endpoint a request goes to, which environment variable holds its
//! credential, and how the model name is normalized before it is sent.
//! Lookup is first-match over an ordered table; the last entry is a
//! catch-all for the default gateway.

use serde::{Deserialize, Serialize};

use super::error::GenerationError;

/// How to reach one provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSpec {
    /// Provider name, used in messages
    pub name: String,
    /// Model id prefixes served by this provider (empty = matches anything)
    pub prefixes: Vec<String>,
    /// Environment variable holding the credential
    pub credential_env: Option<String>,
    /// Endpoint override; `None` uses the backend's default base URL
    pub base_url: Option<String>,
    /// Prefix stripped from the model id before sending (e.g. `openai/`)
    pub strip_prefix: Option<String>,
    /// Whether a missing credential is a configuration error
    pub requires_credential: bool,
}

impl Default for ProviderSpec {
    fn default() -> Self {
        Self {
            name: "gateway".to_string(),
            prefixes: Vec::new(),
            credential_env: None,
            base_url: None,
            strip_prefix: None,
            requires_credential: false,
        }
    }
}

impl ProviderSpec {
    /// Create a provider matching the given prefixes
    pub fn new(name: impl Into<String>, prefixes: &[&str]) -> Self {
        Self {
            name: name.into(),
            prefixes: prefixes.iter().map(|p| (*p).to_string()).collect(),
            ..Default::default()
        }
    }

    /// Set the credential variable
    #[must_use]
    pub fn with_credential(mut self, env: impl Into<String>, required: bool) -> Self {
        self.credential_env = Some(env.into());
        self.requires_credential = required;
        self
    }

    /// Set the strip prefix
    #[must_use]
    pub fn with_strip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.strip_prefix = Some(prefix.into());
        self
    }

    /// Set the endpoint override
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Whether this provider serves a model id
    #[must_use]
    pub fn matches(&self, model: &str) -> bool {
        self.prefixes.is_empty() || self.prefixes.iter().any(|p| model.starts_with(p.as_str()))
    }

    /// Model name as the provider expects it
    #[must_use]
    pub fn normalize(&self, model: &str) -> String {
        self.strip_prefix
            .as_deref()
            .and_then(|prefix| model.strip_prefix(prefix))
            .unwrap_or(model)
            .to_string()
    }
}

/// A model id resolved against the registry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedModel {
    /// Provider name
    pub provider: String,
    /// Normalized model name
    pub model: String,
    /// Endpoint override
    pub base_url: Option<String>,
    /// Credential value, if one was found
    pub credential: Option<String>,
}

/// Ordered model-id → provider table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderRegistry {
    providers: Vec<ProviderSpec>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new(vec![
            ProviderSpec::new("openai", &["openai/", "gpt-", "o1", "o3", "o4"])
                .with_credential("OPENAI_API_KEY", false)
                .with_strip_prefix("openai/"),
            ProviderSpec::new("anthropic", &["anthropic/", "claude-"])
                .with_credential("ANTHROPIC_API_KEY", false)
                .with_strip_prefix("anthropic/"),
            ProviderSpec::new("google", &["google/", "gemini-"])
                .with_credential("GEMINI_API_KEY", false)
                .with_strip_prefix("google/"),
            ProviderSpec::new("mistral", &["mistral/", "mistral-", "open-mistral"])
                .with_credential("MISTRAL_API_KEY", false)
                .with_strip_prefix("mistral/"),
        ])
    }
}

impl ProviderRegistry {
    /// Create a registry; a catch-all gateway entry is appended if missing
    #[must_use]
    pub fn new(mut providers: Vec<ProviderSpec>) -> Self {
        if !providers.iter().any(|p| p.prefixes.is_empty()) {
            providers.push(ProviderSpec::default());
        }
        Self { providers }
    }

    /// Registry entries, in lookup order
    #[must_use]
    pub fn providers(&self) -> &[ProviderSpec] {
        &self.providers
    }

    /// Insert a provider ahead of the existing entries
    pub fn register(&mut self, provider: ProviderSpec) {
        self.providers.insert(0, provider);
    }

    /// Find the provider for a model id
    #[must_use]
    pub fn lookup(&self, model: &str) -> Option<&ProviderSpec> {
        self.providers.iter().find(|p| p.matches(model))
    }

    /// Resolve a model id using the process environment for credentials
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Configuration`] for an empty model id or
    /// a required credential that is not set.
    pub fn resolve(&self, model: &str) -> Result<ResolvedModel, GenerationError> {
        self.resolve_with(model, |name| std::env::var(name).ok())
    }

    /// Resolve a model id with a custom credential lookup
    ///
    /// # Errors
    ///
    /// See [`ProviderRegistry::resolve`].
    pub fn resolve_with<F>(&self, model: &str, lookup_env: F) -> Result<ResolvedModel, GenerationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let model = model.trim();
        if model.is_empty() {
            return Err(GenerationError::Configuration(
                "No model selected. Pick a model for this participant.".to_string(),
            ));
        }

        let spec = self.lookup(model).ok_or_else(|| {
            GenerationError::Configuration(format!("No provider configured for model '{model}'"))
        })?;

        let credential = spec
            .credential_env
            .as_deref()
            .and_then(|name| lookup_env(name))
            .filter(|value| !value.trim().is_empty());

        if spec.requires_credential && credential.is_none() {
            let var = spec.credential_env.as_deref().unwrap_or("an API key");
            return Err(GenerationError::Configuration(format!(
                "Missing credential for {} model '{model}'. Set {var} and send again.",
                spec.name
            )));
        }

        Ok(ResolvedModel {
            provider: spec.name.clone(),
            model: spec.normalize(model),
            base_url: spec.base_url.clone(),
            credential,
        })
    }
}
