//! Random-forest insolation regressor loaded from a JSON artifact.
//!
//! Artifact layout:
//!
//! ```json
//! {
//!   "features":   ["State", "District", "Month"],
//!   "categories": [["Rajasthan", ...], ["Jaipur", ...], ["January", ...]],
//!   "trees": [ { "nodes": [
//!       { "feature": 0, "threshold": 0.5, "left": 1, "right": 2 },
//!       { "value": 4.8 },
//!       { "value": 5.9 }
//!   ] } ]
//! }
//! ```
//!
//! Features are one-hot encoded in `categories` order; a split sends a row
//! left when `x[feature] <= threshold`. The prediction is the mean leaf value
//! across trees.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::ModelError;

/// One categorical input row.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub state: String,
    pub district: String,
    pub month: String,
}

impl FeatureRow {
    fn values(&self) -> [&str; 3] {
        [self.state.as_str(), self.district.as_str(), self.month.as_str()]
    }
}

/// A trained insolation model: rows in, kWh/m²/day out.
pub trait InsolationModel: Send + Sync {
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, ModelError>;
}

/// Category-to-indicator transform. Unknown categories encode to zeros.
#[derive(Debug, Clone)]
pub struct OneHotEncoder {
    categories: Vec<Vec<String>>,
    offsets: Vec<usize>,
    width: usize,
}

impl OneHotEncoder {
    pub fn new(categories: Vec<Vec<String>>) -> Self {
        let mut offsets = Vec::with_capacity(categories.len());
        let mut width = 0;
        for cats in &categories {
            offsets.push(width);
            width += cats.len();
        }
        Self { categories, offsets, width }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn encode(&self, values: &[&str]) -> Vec<f64> {
        let mut x = vec![0.0; self.width];
        for ((cats, offset), value) in self.categories.iter().zip(&self.offsets).zip(values) {
            if let Some(idx) = cats.iter().position(|c| c == value) {
                x[offset + idx] = 1.0;
            }
        }
        x
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn evaluate(&self, x: &[f64]) -> Result<f64, ModelError> {
        let mut idx = 0;
        // A valid tree reaches a leaf in fewer steps than it has nodes.
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return Ok(*value),
                Some(Node::Split { feature, threshold, left, right }) => {
                    let v = x.get(*feature).copied().unwrap_or(0.0);
                    idx = if v <= *threshold { *left } else { *right };
                }
                None => return Err(ModelError::Prediction(format!("node {} out of range", idx))),
            }
        }
        Err(ModelError::Prediction("tree traversal did not terminate".to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ForestArtifact {
    features: Vec<String>,
    categories: Vec<Vec<String>>,
    trees: Vec<Tree>,
}

/// Fitted encoder plus tree ensemble. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct ForestModel {
    encoder: OneHotEncoder,
    trees: Vec<Tree>,
}

impl ForestModel {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let model = Self::from_json(&content)?;
        info!(
            "[MODEL] Loaded {} trees over {} indicator columns from {}",
            model.trees.len(),
            model.encoder.width(),
            path.display()
        );
        Ok(model)
    }

    pub fn from_json(content: &str) -> Result<Self, ModelError> {
        let artifact: ForestArtifact = serde_json::from_str(content)?;
        Self::from_artifact(artifact)
    }

    fn from_artifact(artifact: ForestArtifact) -> Result<Self, ModelError> {
        if artifact.features.len() != 3 {
            return Err(ModelError::Invalid(format!(
                "expected 3 features (State, District, Month), got {}",
                artifact.features.len()
            )));
        }
        if artifact.categories.len() != artifact.features.len() {
            return Err(ModelError::Invalid(format!(
                "{} category lists for {} features",
                artifact.categories.len(),
                artifact.features.len()
            )));
        }
        if artifact.trees.is_empty() {
            return Err(ModelError::Invalid("forest has no trees".to_string()));
        }

        let encoder = OneHotEncoder::new(artifact.categories);
        for (t, tree) in artifact.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(ModelError::Invalid(format!("tree {} is empty", t)));
            }
            for (n, node) in tree.nodes.iter().enumerate() {
                if let Node::Split { feature, left, right, .. } = node {
                    if *feature >= encoder.width() {
                        return Err(ModelError::Invalid(format!(
                            "tree {} node {}: feature {} outside {} columns",
                            t, n, feature, encoder.width()
                        )));
                    }
                    if *left >= tree.nodes.len() || *right >= tree.nodes.len() {
                        return Err(ModelError::Invalid(format!("tree {} node {}: child out of range", t, n)));
                    }
                }
            }
        }

        Ok(Self { encoder, trees: artifact.trees })
    }
}

impl InsolationModel for ForestModel {
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, ModelError> {
        rows.iter()
            .map(|row| {
                let x = self.encoder.encode(&row.values());
                let mut sum = 0.0;
                for tree in &self.trees {
                    sum += tree.evaluate(&x)?;
                }
                Ok(sum / self.trees.len() as f64)
            })
            .collect()
    }
}
