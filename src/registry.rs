// src/registry.rs
// Provider/model registry - external configuration for the model selectors

use std::collections::BTreeMap;

use reqwest::Client;
use serde::Deserialize;

/// One selectable endpoint configuration. Persisted as `provider/model`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderModel {
    pub provider: String,
    pub model_name: String,
}

impl ProviderModel {
    pub fn new(provider: &str, model_name: &str) -> Self {
        Self {
            provider: provider.to_string(),
            model_name: model_name.to_string(),
        }
    }

    /// Storage form used by the settings file.
    pub fn persist_key(&self) -> String {
        format!("{}/{}", self.provider, self.model_name)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (provider, model_name) = raw.split_once('/')?;
        if provider.is_empty() || model_name.is_empty() {
            return None;
        }
        Some(Self::new(provider, model_name))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelEntry {
    pub model_name: String,
    pub locale_key: String,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("registry document has no entries")]
    Empty,
}

/// Models grouped by provider, as published in the registry document:
/// `{ "<group>": [ { "modelName", "localeKey", "default"? }, ... ], ... }`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRegistry {
    groups: BTreeMap<String, Vec<ModelEntry>>,
}

impl ModelRegistry {
    pub fn parse(document: &str) -> Result<Self, RegistryError> {
        let groups: BTreeMap<String, Vec<ModelEntry>> = serde_json::from_str(document)?;
        if groups.values().all(|models| models.is_empty()) {
            return Err(RegistryError::Empty);
        }
        Ok(Self { groups })
    }

    /// Fetch the published registry; any failure falls back to the given
    /// hard-coded registry so a selector always has at least one entry.
    pub async fn fetch(client: &Client, url: &str, fallback: ModelRegistry) -> Self {
        let fetched = async {
            let resp = client.get(url).send().await?.error_for_status()?;
            resp.text().await
        }
        .await;

        match fetched {
            Ok(document) => match Self::parse(&document) {
                Ok(registry) => registry,
                Err(e) => {
                    tracing::warn!("Model registry at {} unusable ({}), using fallback", url, e);
                    fallback
                }
            },
            Err(e) => {
                tracing::warn!("Model registry fetch from {} failed ({}), using fallback", url, e);
                fallback
            }
        }
    }

    /// Built-in transcription registry used when the published one is
    /// unreachable.
    pub fn fallback_transcription() -> Self {
        Self::parse(
            r#"{
                "OpenAI": [
                    { "modelName": "whisper-1", "localeKey": "model_whisper", "default": true }
                ]
            }"#,
        )
        .expect("valid built-in registry")
    }

    /// Built-in summarization registry used when the published one is
    /// unreachable.
    pub fn fallback_summarization() -> Self {
        Self::parse(
            r#"{
                "OpenAI": [
                    { "modelName": "gpt-4.1", "localeKey": "model_gpt41", "default": true }
                ]
            }"#,
        )
        .expect("valid built-in registry")
    }

    pub fn groups(&self) -> impl Iterator<Item = (&String, &Vec<ModelEntry>)> {
        self.groups.iter()
    }

    /// The entry flagged `default`, else the first entry.
    pub fn default_selection(&self) -> Option<ProviderModel> {
        for (provider, models) in &self.groups {
            if let Some(entry) = models.iter().find(|m| m.default) {
                return Some(ProviderModel::new(provider, &entry.model_name));
            }
        }
        self.groups.iter().find_map(|(provider, models)| {
            models
                .first()
                .map(|entry| ProviderModel::new(provider, &entry.model_name))
        })
    }

    pub fn resolve(&self, provider: &str, model_name: &str) -> Option<ProviderModel> {
        self.groups.get(provider).and_then(|models| {
            models
                .iter()
                .find(|m| m.model_name == model_name)
                .map(|entry| ProviderModel::new(provider, &entry.model_name))
        })
    }

    /// The persisted selection when it still exists in the registry, else the
    /// registry default.
    pub fn restore(&self, persisted: Option<&str>) -> Option<ProviderModel> {
        persisted
            .and_then(ProviderModel::parse)
            .and_then(|pm| self.resolve(&pm.provider, &pm.model_name))
            .or_else(|| self.default_selection())
    }
}
