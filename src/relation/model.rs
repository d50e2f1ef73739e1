//! Pre-fitted linear relation model and its feature selection.

use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use crate::annotation::REL_PRO_LOC_ID;
use crate::error::{LoctextError, Result};

/// On-disk model artifact
#[derive(Debug, Deserialize)]
struct ModelFile {
    relation_class: String,
    bias: f64,
    #[serde(default)]
    threshold: f64,
    weights: HashMap<String, f64>,
}

/// Linear classifier over named sparse features
///
/// Immutable once loaded; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct RelationModel {
    relation_class: String,
    bias: f64,
    threshold: f64,
    weights: HashMap<String, f64>,
}

impl RelationModel {
    /// Load the model and check it against the selected feature names
    pub fn load(model_path: &Path, features_path: &Path) -> Result<Self> {
        let model_json = std::fs::read_to_string(model_path).map_err(|e| {
            LoctextError::ModelConfiguration(format!(
                "Failed to read model {}: {}",
                model_path.display(),
                e
            ))
        })?;
        let features = std::fs::read_to_string(features_path).map_err(|e| {
            LoctextError::ModelConfiguration(format!(
                "Failed to read selected features {}: {}",
                features_path.display(),
                e
            ))
        })?;

        Self::from_parts(&model_json, &parse_feature_names(&features))
    }

    /// Build from model JSON and the selected feature names
    pub fn from_parts(model_json: &str, selected: &[String]) -> Result<Self> {
        let file: ModelFile = serde_json::from_str(model_json).map_err(|e| {
            LoctextError::ModelConfiguration(format!("Failed to parse model: {}", e))
        })?;

        if file.relation_class != REL_PRO_LOC_ID {
            return Err(LoctextError::ModelConfiguration(format!(
                "Model predicts relation class {}, expected {}",
                file.relation_class, REL_PRO_LOC_ID
            )));
        }

        if selected.is_empty() {
            return Err(LoctextError::ModelConfiguration(
                "Selected feature list is empty".to_string(),
            ));
        }

        let selected: BTreeSet<&str> = selected.iter().map(String::as_str).collect();
        let trained: BTreeSet<&str> = file.weights.keys().map(String::as_str).collect();

        let missing: Vec<&str> = selected.difference(&trained).copied().collect();
        let unexpected: Vec<&str> = trained.difference(&selected).copied().collect();
        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(LoctextError::ModelConfiguration(format!(
                "Selected features do not match the model: missing weights for [{}], unselected weights [{}]",
                missing.join(", "),
                unexpected.join(", ")
            )));
        }

        Ok(Self {
            relation_class: file.relation_class,
            bias: file.bias,
            threshold: file.threshold,
            weights: file.weights,
        })
    }

    pub fn relation_class(&self) -> &str {
        &self.relation_class
    }

    pub fn feature_count(&self) -> usize {
        self.weights.len()
    }

    /// Decision value; features the model was not trained with contribute nothing
    pub fn score<'a, I>(&self, features: I) -> f64
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        features
            .into_iter()
            .filter_map(|(name, value)| self.weights.get(name).map(|w| w * value))
            .fold(self.bias, |acc, x| acc + x)
    }

    pub fn is_positive(&self, score: f64) -> bool {
        score > self.threshold
    }
}

/// One feature name per line; blank lines and `#` comments are ignored
pub fn parse_feature_names(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
