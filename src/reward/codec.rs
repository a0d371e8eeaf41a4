//! Canonical cache keys for reward configurations.
//!
//! Two configurations that differ only in term order (with weights moving
//! together with their terms) or in parameter field order produce the same
//! key. Any difference in a term name, a parameter value, a weight or the
//! combination mode produces a different key.

use super::config::RewardConfiguration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Write as _};

/// Canonical string form of a [`RewardConfiguration`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap an already-canonical key, e.g. one read back from storage.
    pub fn from_canonical(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Encode a configuration into its canonical key.
pub fn encode(config: &RewardConfiguration) -> CacheKey {
    let mut pairs: Vec<(String, f64)> = config
        .weighted_terms()
        .map(|(term, weight)| {
            let value = serde_json::to_value(term).unwrap_or(Value::Null);
            let mut canonical = String::new();
            write_canonical(&value, &mut canonical);
            (canonical, normalize_zero(weight))
        })
        .collect();

    // Sort the pairs, never the two columns independently.
    pairs.sort_by(|(a_term, a_weight), (b_term, b_weight)| {
        a_term
            .cmp(b_term)
            .then_with(|| a_weight.total_cmp(b_weight))
    });

    let mut key = String::from(config.combination_mode().as_str());
    for (term, weight) in &pairs {
        key.push('|');
        key.push_str(term);
        key.push('*');
        write_number(*weight, &mut key);
    }
    CacheKey(key)
}

fn normalize_zero(value: f64) -> f64 {
    if value == 0.0 { 0.0 } else { value }
}

fn write_number(value: f64, out: &mut String) {
    match serde_json::Number::from_f64(normalize_zero(value)) {
        Some(number) => {
            let _ = write!(out, "{number}");
        }
        None => out.push_str("null"),
    }
}

/// JSON with object keys sorted at every depth, independent of how
/// `serde_json::Map` orders its entries.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        Value::Number(number) => match number.as_f64() {
            Some(float) if number.is_f64() => write_number(float, out),
            _ => {
                let _ = write!(out, "{number}");
            }
        },
        Value::String(text) => {
            let _ = write!(out, "{}", Value::String(text.clone()));
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (index, (name, item)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}:", Value::String(name.clone()));
                write_canonical(item, out);
            }
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reward::config::CombinationMode;
    use serde_json::json;

    fn config(value: Value) -> RewardConfiguration {
        RewardConfiguration::from_json(value).unwrap()
    }

    #[test]
    fn permutations_with_paired_weights_share_a_key() {
        let a = config(json!({
            "terms": [
                {"name": "move-ego", "move_speed": 2.0},
                {"name": "raisearms", "left": "h", "right": "l"},
                {"name": "jump", "jump_height": 1.8}
            ],
            "weights": [1.0, 0.5, 2.0]
        }));
        let b = config(json!({
            "terms": [
                {"name": "jump", "jump_height": 1.8},
                {"name": "move-ego", "move_speed": 2.0},
                {"name": "raisearms", "left": "h", "right": "l"}
            ],
            "weights": [2.0, 1.0, 0.5]
        }));
        assert_eq!(encode(&a), encode(&b));
    }

    #[test]
    fn weights_do_not_detach_from_their_terms() {
        let a = config(json!({
            "terms": [{"name": "sitonground"}, {"name": "split", "distance": 1.0}],
            "weights": [1.0, 3.0]
        }));
        let swapped = config(json!({
            "terms": [{"name": "sitonground"}, {"name": "split", "distance": 1.0}],
            "weights": [3.0, 1.0]
        }));
        assert_ne!(encode(&a), encode(&swapped));
    }

    #[test]
    fn parameter_field_order_is_irrelevant() {
        let a = config(json!({
            "terms": [{"name": "move-ego", "move_speed": 0, "stand_height": 1.4}]
        }));
        let b = config(json!({
            "terms": [{"stand_height": 1.4, "move_speed": 0.0, "name": "move-ego"}]
        }));
        assert_eq!(encode(&a), encode(&b));
    }

    #[test]
    fn opaque_id_is_excluded() {
        let a = config(json!({"id": "a", "terms": [{"name": "sitonground"}]}));
        let b = config(json!({"id": "b", "terms": [{"name": "sitonground"}]}));
        assert_eq!(encode(&a), encode(&b));
    }

    #[test]
    fn explicit_defaults_match_omitted_defaults() {
        let a = config(json!({"terms": [{"name": "split"}]}));
        let b = config(json!({"terms": [{"name": "split", "distance": 1.5}]}));
        assert_eq!(encode(&a), encode(&b));
    }

    #[test]
    fn differing_values_produce_distinct_keys() {
        let samples = [
            json!({"terms": [{"name": "move-ego", "move_speed": 0}]}),
            json!({"terms": [{"name": "move-ego", "move_speed": 1}]}),
            json!({"terms": [{"name": "move-ego", "move_speed": 1, "stand_height": 1.2}]}),
            json!({"terms": [{"name": "move-ego", "move_speed": 1, "move_angle": 90}]}),
            json!({"terms": [{"name": "move-ego", "move_speed": 1, "stay_low": true}]}),
            json!({"terms": [{"name": "move-ego", "move_speed": 1}], "weights": [0.5]}),
            json!({"terms": [{"name": "move-ego", "move_speed": 1}], "combination_mode": "additive"}),
            json!({"terms": [{"name": "jump", "jump_height": 1.0}]}),
            json!({"terms": [{"name": "jump", "jump_height": 1.0, "max_velocity": 4.0}]}),
            json!({"terms": [{"name": "rotation", "axis": "x", "target_ang_velocity": 5.0}]}),
            json!({"terms": [{"name": "rotation", "axis": "y", "target_ang_velocity": 5.0}]}),
            json!({"terms": [{"name": "raisearms", "left": "l", "right": "h"}]}),
            json!({"terms": [{"name": "raisearms", "left": "h", "right": "l"}]}),
            json!({"terms": [{"name": "lieonground", "direction": "up"}]}),
            json!({"terms": [{"name": "lieonground", "direction": "down"}]}),
            json!({"terms": [{"name": "headstand"}]}),
            json!({"terms": [{"name": "crawl"}]}),
            json!({"terms": [{"name": "sitonground"}]}),
            json!({"terms": [{"name": "split"}]}),
        ];

        let mut keys: Vec<CacheKey> = samples.into_iter().map(|v| encode(&config(v))).collect();
        let total = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), total);
    }

    #[test]
    fn negative_zero_weight_is_normalized() {
        let term = crate::reward::terms::RewardTerm::SitOnGround(
            crate::reward::terms::SitOnGroundParams {},
        );
        let a = RewardConfiguration::new(
            vec![term.clone()],
            Some(vec![0.0]),
            CombinationMode::Additive,
        )
        .unwrap();
        let b =
            RewardConfiguration::new(vec![term], Some(vec![-0.0]), CombinationMode::Additive)
                .unwrap();
        assert_eq!(encode(&a), encode(&b));
    }

    #[test]
    fn key_layout_is_stable() {
        let key = encode(&config(json!({
            "terms": [{"name": "move-ego", "move_speed": 0, "stand_height": 1.4}],
            "weights": [1.0]
        })));
        assert_eq!(
            key.as_str(),
            "multiplicative|{\"egocentric_target\":true,\"low_height\":0.6,\"move_angle\":0.0,\
             \"move_speed\":0.0,\"name\":\"move-ego\",\"stand_height\":1.4,\"stay_low\":false}*1.0"
        );
    }
}
