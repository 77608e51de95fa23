//! Model catalog — every addressable `provider:model` id the config offers

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::aggregator::ModelLabel;
use crate::config::{ConfigError, ConsultConfig, capitalize};

/// Separator between provider id and model key in an addressable id
pub const MODEL_ID_DELIMITER: char = ':';

/// A model that callers can address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    #[serde(rename = "id")]
    pub addressable_id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "provider")]
    pub provider_display_name: String,
    #[serde(rename = "providerId")]
    pub provider_id: String,
}

#[derive(Debug, Clone)]
struct ProviderEntry {
    display_name: String,
    models: HashMap<String, String>,
}

/// Immutable catalog built once from [`ConsultConfig`]
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ModelDescriptor>,
    providers: HashMap<String, ProviderEntry>,
}

/// Split an addressable id on the first delimiter.
///
/// Returns `None` when there is no delimiter or either half is empty.
pub fn split_model_id(addressable_id: &str) -> Option<(&str, &str)> {
    let (provider_id, model_key) = addressable_id.split_once(MODEL_ID_DELIMITER)?;
    if provider_id.is_empty() || model_key.is_empty() {
        return None;
    }
    Some((provider_id, model_key))
}

impl ModelCatalog {
    /// Build the catalog, provider by provider and model by model in
    /// configuration order. Duplicate addressable ids are a configuration
    /// error.
    pub fn from_config(config: &ConsultConfig) -> Result<Self, ConfigError> {
        let mut models = Vec::new();
        let mut providers = HashMap::with_capacity(config.providers.len());
        let mut seen = HashSet::new();

        for provider in &config.providers {
            if providers.contains_key(&provider.id) {
                return Err(ConfigError::InvalidProvider {
                    provider: provider.id.clone(),
                    reason: "provider is configured twice".to_string(),
                });
            }

            for (model_key, display_name) in &provider.models {
                let addressable_id = format!("{}{}{}", provider.id, MODEL_ID_DELIMITER, model_key);
                if !seen.insert(addressable_id.clone()) {
                    return Err(ConfigError::DuplicateModel(addressable_id));
                }
                models.push(ModelDescriptor {
                    addressable_id,
                    display_name: display_name.clone(),
                    provider_display_name: provider.display_name.clone(),
                    provider_id: provider.id.clone(),
                });
            }

            providers.insert(
                provider.id.clone(),
                ProviderEntry {
                    display_name: provider.display_name.clone(),
                    models: provider.models.iter().cloned().collect(),
                },
            );
        }

        Ok(Self { models, providers })
    }

    /// All addressable models in configuration order
    pub fn list_models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Find the descriptor for an addressable id listed in the catalog
    pub fn get(&self, addressable_id: &str) -> Option<&ModelDescriptor> {
        self.models
            .iter()
            .find(|m| m.addressable_id == addressable_id)
    }

    /// Names to show for an addressable id, whether or not it is listed.
    ///
    /// Unlisted model keys fall back to the key itself; unknown providers
    /// fall back to the capitalized provider id; ids that do not split fall
    /// back to the raw id with no provider name.
    pub fn label(&self, addressable_id: &str) -> ModelLabel {
        let Some((provider_id, model_key)) = split_model_id(addressable_id) else {
            return ModelLabel::new(addressable_id, addressable_id, "");
        };

        match self.providers.get(provider_id) {
            Some(entry) => ModelLabel::new(
                addressable_id,
                entry
                    .models
                    .get(model_key)
                    .map(String::as_str)
                    .unwrap_or(model_key),
                &entry.display_name,
            ),
            None => ModelLabel::new(addressable_id, model_key, &capitalize(provider_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> (ConsultConfig, ModelCatalog) {
        let config = ConsultConfig::from_toml_str_with_env("", |_| None).unwrap();
        let catalog = ModelCatalog::from_config(&config).unwrap();
        (config, catalog)
    }

    #[test]
    fn test_split_model_id() {
        assert_eq!(split_model_id("openai:gpt-4o"), Some(("openai", "gpt-4o")));
        assert_eq!(split_model_id("a:b:c"), Some(("a", "b:c")));
        assert_eq!(split_model_id("openai"), None);
        assert_eq!(split_model_id(":gpt-4o"), None);
        assert_eq!(split_model_id("openai:"), None);
        assert_eq!(split_model_id(""), None);
    }

    #[test]
    fn test_list_models_order() {
        let (_, catalog) = catalog();
        let ids: Vec<&str> = catalog
            .list_models()
            .iter()
            .take(5)
            .map(|m| m.addressable_id.as_str())
            .collect();
        assert_eq!(
            ids,
            [
                "openai:gpt-4o",
                "openai:gpt-4o-mini",
                "openai:gpt-4-turbo",
                "openai:gpt-3.5-turbo",
                "anthropic:claude-sonnet-4-20250514",
            ]
        );
        assert_eq!(catalog.len(), 15);
        assert!(!catalog.is_empty());
    }

    #[test]
    fn test_every_id_resolves_back_to_config() {
        let (config, catalog) = catalog();
        for model in catalog.list_models() {
            let (provider_id, model_key) = split_model_id(&model.addressable_id)
                .unwrap_or_else(|| panic!("{} does not split", model.addressable_id));
            let provider = config
                .provider(provider_id)
                .unwrap_or_else(|| panic!("{provider_id} is not configured"));
            assert_eq!(provider_id, model.provider_id);
            assert_eq!(provider.model_display_name(model_key), Some(model.display_name.as_str()));
            assert_eq!(provider.display_name, model.provider_display_name);
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let (_, catalog) = catalog();
        let unique: HashSet<&str> = catalog
            .list_models()
            .iter()
            .map(|m| m.addressable_id.as_str())
            .collect();
        assert_eq!(unique.len(), catalog.len());
    }

    #[test]
    fn test_duplicate_provider_is_rejected() {
        let (mut config, _) = catalog();
        let first = config.providers[0].clone();
        config.providers.push(first);
        assert!(matches!(
            ModelCatalog::from_config(&config),
            Err(ConfigError::InvalidProvider { .. })
        ));
    }

    #[test]
    fn test_duplicate_model_is_rejected() {
        let (mut config, _) = catalog();
        let dup = config.providers[0].models[0].clone();
        config.providers[0].models.push(dup);
        assert!(matches!(
            ModelCatalog::from_config(&config),
            Err(ConfigError::DuplicateModel(id)) if id == "openai:gpt-4o"
        ));
    }

    #[test]
    fn test_label_known_model() {
        let (_, catalog) = catalog();
        let label = catalog.label("google:gemini-2.0-flash");
        assert_eq!(label.addressable_id, "google:gemini-2.0-flash");
        assert_eq!(label.display_name, "Gemini 2.0 Flash");
        assert_eq!(label.provider_display_name, "Google");
    }

    #[test]
    fn test_label_unlisted_model_falls_back_to_key() {
        let (_, catalog) = catalog();
        let label = catalog.label("openai:gpt-5");
        assert_eq!(label.display_name, "gpt-5");
        assert_eq!(label.provider_display_name, "OpenAI");
    }

    #[test]
    fn test_label_unknown_provider() {
        let (_, catalog) = catalog();
        let label = catalog.label("bogus:x");
        assert_eq!(label.display_name, "x");
        assert_eq!(label.provider_display_name, "Bogus");
        assert!(catalog.get("bogus:x").is_none());
    }

    #[test]
    fn test_label_malformed() {
        let (_, catalog) = catalog();
        let label = catalog.label("no-delimiter");
        assert_eq!(label.display_name, "no-delimiter");
        assert_eq!(label.provider_display_name, "");
    }

    #[test]
    fn test_descriptor_wire_names() {
        let (_, catalog) = catalog();
        let json = serde_json::to_value(catalog.get("groq:mixtral-8x7b-32768").unwrap()).unwrap();
        assert_eq!(json["id"], "groq:mixtral-8x7b-32768");
        assert_eq!(json["name"], "Mixtral 8x7B");
        assert_eq!(json["provider"], "Groq");
        assert_eq!(json["providerId"], "groq");
    }
}
