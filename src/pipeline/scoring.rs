//! Dropout probability scoring
//!
//! Scorers are deserialized from a tagged JSON artifact:
//!
//! - `linear`: logistic model, `sigmoid(intercept + Σ coef·x)`
//! - `tree_ensemble`: boosted regression trees summed into a margin, then `sigmoid`
//! - `weighted_blend`: weighted average of member model probabilities
//!
//! Missing values (null cells or absent columns) contribute nothing to a linear
//! model and follow each split's default branch in a tree.

use std::collections::{BTreeMap, HashMap};

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::{PipelineError, PipelineResult, Stage};

/// Upper bound of the low risk band (exclusive).
pub const LOW_RISK_BELOW: f64 = 0.30;

/// Upper bound of the medium risk band (inclusive).
pub const MEDIUM_RISK_UP_TO: f64 = 0.60;

/// Numerically stable logistic function.
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Risk band for a dropout probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_probability(p: f64) -> Self {
        if p < LOW_RISK_BELOW {
            RiskLevel::Low
        } else if p <= MEDIUM_RISK_UP_TO {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Column-major view of a numeric frame with name lookup. NaN reads as missing.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    height: usize,
    columns: Vec<Vec<Option<f64>>>,
    index: HashMap<String, usize>,
}

impl FeatureMatrix {
    pub fn from_frame(frame: &DataFrame) -> PipelineResult<Self> {
        let mut columns = Vec::with_capacity(frame.width());
        let mut index = HashMap::with_capacity(frame.width());
        for column in frame.get_columns() {
            let cast = column.cast(&DataType::Float64)?;
            let values: Vec<Option<f64>> = cast
                .f64()?
                .into_iter()
                .map(|v| v.filter(|x| !x.is_nan()))
                .collect();
            index.insert(column.name().to_string(), columns.len());
            columns.push(values);
        }
        Ok(Self {
            height: frame.height(),
            columns,
            index,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn value(&self, feature: &str, row: usize) -> Option<f64> {
        self.index
            .get(feature)
            .and_then(|&c| self.columns[c].get(row).copied().flatten())
    }
}

/// A model that maps a feature matrix to one probability per row.
pub trait Scorer: Send + Sync {
    fn predict_proba(&self, features: &FeatureMatrix) -> Vec<f64>;
}

/// Logistic regression coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearScorer {
    pub intercept: f64,
    pub coefficients: BTreeMap<String, f64>,
}

impl LinearScorer {
    pub fn margin(&self, features: &FeatureMatrix, row: usize) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .filter_map(|(name, coef)| features.value(name, row).map(|x| coef * x))
                .sum::<f64>()
    }
}

impl Scorer for LinearScorer {
    fn predict_proba(&self, features: &FeatureMatrix) -> Vec<f64> {
        (0..features.height())
            .map(|row| sigmoid(self.margin(features, row)))
            .collect()
    }
}

/// One node of a regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// `x < threshold` goes left; a missing `x` goes left iff `default_left`.
    Split {
        feature: String,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default = "default_left")]
        default_left: bool,
    },
    Leaf {
        leaf: f64,
    },
}

fn default_left() -> bool {
    true
}

/// A regression tree stored as a flat node list rooted at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    /// Children must come after their parent, which also rules out cycles.
    fn validate(&self, position: usize) -> PipelineResult<()> {
        if self.nodes.is_empty() {
            return Err(PipelineError::artifact(
                Stage::Score,
                "model",
                format!("tree {} has no nodes", position),
            ));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split { left, right, threshold, .. } = node {
                let in_range = |c: usize| c > i && c < self.nodes.len();
                if !in_range(*left) || !in_range(*right) || !threshold.is_finite() {
                    return Err(PipelineError::artifact(
                        Stage::Score,
                        "model",
                        format!("tree {} node {} has an invalid split", position, i),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn leaf_value(&self, features: &FeatureMatrix, row: usize) -> f64 {
        let mut node = 0;
        loop {
            match &self.nodes[node] {
                TreeNode::Leaf { leaf } => return *leaf,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let go_left = match features.value(feature, row) {
                        Some(x) => x < *threshold,
                        None => *default_left,
                    };
                    node = if go_left { *left } else { *right };
                }
            }
        }
    }
}

/// Gradient-boosted tree ensemble with a logistic link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleScorer {
    /// Margin added before the sigmoid.
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

impl Scorer for EnsembleScorer {
    fn predict_proba(&self, features: &FeatureMatrix) -> Vec<f64> {
        (0..features.height())
            .map(|row| {
                let margin = self.base_score
                    + self
                        .trees
                        .iter()
                        .map(|t| t.leaf_value(features, row))
                        .sum::<f64>();
                sigmoid(margin)
            })
            .collect()
    }
}

/// A weighted member of a blend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendMember {
    pub weight: f64,
    pub model: ModelArtifact,
}

/// Weighted average of member probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedBlendScorer {
    pub members: Vec<BlendMember>,
}

impl Scorer for WeightedBlendScorer {
    fn predict_proba(&self, features: &FeatureMatrix) -> Vec<f64> {
        let total: f64 = self.members.iter().map(|m| m.weight).sum();
        let mut blended = vec![0.0; features.height()];
        for member in &self.members {
            let share = member.weight / total;
            for (acc, p) in blended.iter_mut().zip(member.model.predict_proba(features)) {
                *acc += share * p;
            }
        }
        blended
    }
}

/// Serialized classifier, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Linear(LinearScorer),
    TreeEnsemble(EnsembleScorer),
    WeightedBlend(WeightedBlendScorer),
}

impl ModelArtifact {
    pub fn from_json(text: &str) -> PipelineResult<Self> {
        let model: ModelArtifact = serde_json::from_str(text)
            .map_err(|e| PipelineError::artifact(Stage::Score, "model", e.to_string()))?;
        model.validate()?;
        Ok(model)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ModelArtifact::Linear(_) => "linear",
            ModelArtifact::TreeEnsemble(_) => "tree_ensemble",
            ModelArtifact::WeightedBlend(_) => "weighted_blend",
        }
    }

    /// Tree-based models were trained on zero-filled features; linear ones skip nulls.
    pub fn imputes_missing(&self) -> bool {
        !matches!(self, ModelArtifact::Linear(_))
    }

    pub fn validate(&self) -> PipelineResult<()> {
        match self {
            ModelArtifact::Linear(model) => {
                let finite = model.intercept.is_finite()
                    && model.coefficients.values().all(|c| c.is_finite());
                if !finite {
                    return Err(PipelineError::artifact(
                        Stage::Score,
                        "model",
                        "linear model has non-finite coefficients",
                    ));
                }
            }
            ModelArtifact::TreeEnsemble(model) => {
                if model.trees.is_empty() {
                    return Err(PipelineError::artifact(
                        Stage::Score,
                        "model",
                        "tree ensemble has no trees",
                    ));
                }
                for (i, tree) in model.trees.iter().enumerate() {
                    tree.validate(i)?;
                }
            }
            ModelArtifact::WeightedBlend(model) => {
                if model.members.is_empty() {
                    return Err(PipelineError::artifact(
                        Stage::Score,
                        "model",
                        "weighted blend has no members",
                    ));
                }
                if model.members.iter().any(|m| !(m.weight >= 0.0 && m.weight.is_finite()))
                    || model.members.iter().map(|m| m.weight).sum::<f64>() <= 0.0
                {
                    return Err(PipelineError::artifact(
                        Stage::Score,
                        "model",
                        "blend weights must be non-negative with a positive sum",
                    ));
                }
                for member in &model.members {
                    member.model.validate()?;
                }
            }
        }
        Ok(())
    }
}

impl Scorer for ModelArtifact {
    fn predict_proba(&self, features: &FeatureMatrix) -> Vec<f64> {
        match self {
            ModelArtifact::Linear(model) => model.predict_proba(features),
            ModelArtifact::TreeEnsemble(model) => model.predict_proba(features),
            ModelArtifact::WeightedBlend(model) => model.predict_proba(features),
        }
    }
}
