//! Model catalog
//!
//! Named [`ModelDefinition`]s loaded once per run from a JSON object of
//! `name -> definition` and shared read-only by every policy.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use carbonshift_core::{ModelCatalogProvider, ModelDefinition, Result, SimError};
use tracing::info;

/// Immutable set of model definitions keyed by name
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: BTreeMap<String, Arc<ModelDefinition>>,
}

impl ModelCatalog {
    /// Build a catalog, validating every definition
    pub fn new(models: impl IntoIterator<Item = ModelDefinition>) -> Result<Self> {
        let mut catalog = ModelCatalog::default();
        for model in models {
            validate_model(&model)?;
            let name = model.model_name.clone();
            if catalog.models.insert(name.clone(), Arc::new(model)).is_some() {
                return Err(SimError::config(format!("duplicate model '{name}' in catalog")));
            }
        }
        if catalog.models.is_empty() {
            return Err(SimError::config("model catalog is empty"));
        }
        Ok(catalog)
    }

    /// Load a catalog from a JSON file
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&content)?;
        info!("Loaded {} models from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Parse a JSON object mapping model names to definitions.
    ///
    /// The map key is authoritative; a missing or mismatched `model_name`
    /// field is replaced with it.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: BTreeMap<String, ModelDefinition> = serde_json::from_str(content)?;
        Self::new(raw.into_iter().map(|(name, mut model)| {
            model.model_name = name;
            model
        }))
    }

    /// Small built-in catalog for runs without a catalog file
    pub fn builtin() -> Self {
        let models = [
            ModelDefinition::new("distilbert", 120.0, 15.0, 0.0004, 0.82),
            ModelDefinition::new("bert-large", 300.0, 30.0, 0.0009, 0.88),
            ModelDefinition::new("llama-7b", 900.0, 120.0, 0.0030, 0.91),
            ModelDefinition::new("llama-70b", 2400.0, 300.0, 0.0120, 0.96),
        ];
        let models = models.into_iter().map(|mut m| {
            m.slo_threshold = 3600.0;
            m
        });
        Self {
            models: models.map(|m| (m.model_name.clone(), Arc::new(m))).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}

impl ModelCatalogProvider for ModelCatalog {
    fn model_by_name(&self, name: &str) -> Result<Arc<ModelDefinition>> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| SimError::config(format!("model '{name}' not found in catalog")))
    }

    fn all_models(&self) -> Vec<Arc<ModelDefinition>> {
        self.models.values().cloned().collect()
    }
}

fn validate_model(model: &ModelDefinition) -> Result<()> {
    let name = &model.model_name;
    if name.is_empty() {
        return Err(SimError::config("model with empty name"));
    }
    if !(model.mean_run_time >= 0.0 && model.std_dev_run_time >= 0.0) {
        return Err(SimError::config(format!("model '{name}': runtimes must be non-negative")));
    }
    if !(model.energy_usage >= 0.0) {
        return Err(SimError::config(format!("model '{name}': energy usage must be non-negative")));
    }
    if !(model.slo_threshold.is_finite() && model.slo_threshold >= 0.0) {
        return Err(SimError::config(format!("model '{name}': SLO threshold must be non-negative")));
    }
    if !(0.0..=1.0).contains(&model.accuracy) {
        return Err(SimError::config(format!(
            "model '{name}': accuracy {} outside [0, 1]",
            model.accuracy
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CATALOG_JSON: &str = r#"{
        "small": {
            "model_name": "small",
            "mean_run_time": 60,
            "std_dev_run_time": 5,
            "energy_usage": 0.001,
            "accuracy": 0.7,
            "slo_threshold": 1800,
            "number_of_runs": 100,
            "workload_policy": "uniform"
        },
        "large": {
            "model_name": "renamed",
            "mean_run_time": 600,
            "std_dev_run_time": 50,
            "energy_usage": 0.01,
            "accuracy": 0.95
        }
    }"#;

    #[test]
    fn test_load_from_json() {
        let catalog = ModelCatalog::from_json_str(CATALOG_JSON).unwrap();

        assert_eq!(catalog.len(), 2);
        let small = catalog.model_by_name("small").unwrap();
        assert_eq!(small.mean_run_time, 60.0);
        assert_eq!(small.workload_policy.as_deref(), Some("uniform"));

        // Map key wins over the embedded name
        let large = catalog.model_by_name("large").unwrap();
        assert_eq!(large.model_name, "large");
        assert!(catalog.model_by_name("renamed").is_err());
    }

    #[test]
    fn test_unknown_model() {
        let catalog = ModelCatalog::builtin();
        assert!(matches!(
            catalog.model_by_name("gpt-17"),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn test_all_models_name_ordered() {
        let catalog = ModelCatalog::builtin();
        let names: Vec<String> = catalog
            .all_models()
            .iter()
            .map(|m| m.model_name.clone())
            .collect();

        assert_eq!(names, vec!["bert-large", "distilbert", "llama-70b", "llama-7b"]);
    }

    #[test]
    fn test_rejects_invalid_models() {
        let bad_accuracy = ModelDefinition::new("a", 1.0, 0.0, 1.0, 1.5);
        assert!(ModelCatalog::new([bad_accuracy]).is_err());

        let negative_runtime = ModelDefinition::new("b", -1.0, 0.0, 1.0, 0.5);
        assert!(ModelCatalog::new([negative_runtime]).is_err());

        let mut infinite_slo = ModelDefinition::new("s", 1.0, 0.0, 1.0, 0.5);
        infinite_slo.slo_threshold = f64::INFINITY;
        assert!(ModelCatalog::new([infinite_slo]).is_err());

        let dup = ModelDefinition::new("c", 1.0, 0.0, 1.0, 0.5);
        assert!(ModelCatalog::new([dup.clone(), dup]).is_err());

        assert!(ModelCatalog::new(Vec::new()).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CATALOG_JSON.as_bytes()).unwrap();

        let catalog = ModelCatalog::from_json_path(file.path()).unwrap();
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["large", "small"]);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            ModelCatalog::from_json_str("{ not json"),
            Err(SimError::Json(_))
        ));
    }
}
