use super::terms::RewardTerm;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the weighted terms of a configuration are combined into one reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombinationMode {
    /// `Π rᵢ^wᵢ`
    #[default]
    Multiplicative,
    /// `Σ wᵢ·rᵢ`
    Additive,
}

impl CombinationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Multiplicative => "multiplicative",
            Self::Additive => "additive",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "multiplicative" | "mult" | "product" => Ok(Self::Multiplicative),
            "additive" | "add" | "sum" => Ok(Self::Additive),
            other => Err(ValidationError::OutOfRange {
                field: "combination_mode".into(),
                message: format!("unknown combination mode '{other}'"),
            }),
        }
    }
}

impl fmt::Display for CombinationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, weighted combination of reward terms.
///
/// Construction always goes through validation, so holding a value means the
/// term list is non-empty, every parameter is finite and there is exactly one
/// finite weight per term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireRewardConfiguration")]
pub struct RewardConfiguration {
    terms: Vec<RewardTerm>,
    weights: Vec<f64>,
    combination_mode: CombinationMode,
}

/// Client wire shape. Accepts the legacy `rewards`/`combinationType` keys and
/// ignores the opaque `id` and any other bookkeeping fields.
#[derive(Debug, Deserialize)]
struct WireRewardConfiguration {
    #[serde(alias = "rewards")]
    terms: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    weights: Option<Vec<f64>>,
    #[serde(default, alias = "combinationType", alias = "combination_type")]
    combination_mode: Option<String>,
}

impl TryFrom<WireRewardConfiguration> for RewardConfiguration {
    type Error = ValidationError;

    fn try_from(wire: WireRewardConfiguration) -> Result<Self, Self::Error> {
        let raw_terms = wire
            .terms
            .ok_or_else(|| ValidationError::Malformed("missing field `terms`".into()))?;
        let terms = raw_terms
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                serde_json::from_value::<RewardTerm>(value)
                    .map_err(|error| ValidationError::Malformed(format!("term {index}: {error}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mode = wire
            .combination_mode
            .as_deref()
            .map(CombinationMode::parse)
            .transpose()?
            .unwrap_or_default();
        Self::new(terms, wire.weights, mode)
    }
}

impl RewardConfiguration {
    pub fn new(
        terms: Vec<RewardTerm>,
        weights: Option<Vec<f64>>,
        combination_mode: CombinationMode,
    ) -> Result<Self, ValidationError> {
        if terms.is_empty() {
            return Err(ValidationError::EmptyTerms);
        }
        for term in &terms {
            term.validate()?;
        }

        let weights = weights.unwrap_or_else(|| vec![1.0; terms.len()]);
        if weights.len() != terms.len() {
            return Err(ValidationError::WeightCount {
                terms: terms.len(),
                weights: weights.len(),
            });
        }
        for (index, weight) in weights.iter().enumerate() {
            if !weight.is_finite() {
                return Err(ValidationError::NonFinite {
                    field: format!("weights[{index}]"),
                });
            }
            if *weight < 0.0 {
                return Err(ValidationError::OutOfRange {
                    field: format!("weights[{index}]"),
                    message: format!("{weight} is negative"),
                });
            }
        }

        Ok(Self {
            terms,
            weights,
            combination_mode,
        })
    }

    /// Single term, unit weight, multiplicative.
    pub fn single(term: RewardTerm) -> Result<Self, ValidationError> {
        Self::new(vec![term], None, CombinationMode::Multiplicative)
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, ValidationError> {
        let wire: WireRewardConfiguration = serde_json::from_value(value)
            .map_err(|error| ValidationError::Malformed(error.to_string()))?;
        Self::try_from(wire)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ValidationError> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|error| ValidationError::Malformed(error.to_string()))?;
        Self::from_json(value)
    }

    pub fn terms(&self) -> &[RewardTerm] {
        &self.terms
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn combination_mode(&self) -> CombinationMode {
        self.combination_mode
    }

    /// Terms paired with their weights, in client order.
    pub fn weighted_terms(&self) -> impl Iterator<Item = (&RewardTerm, f64)> {
        self.terms.iter().zip(self.weights.iter().copied())
    }
}
