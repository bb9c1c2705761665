// ============================================================
// Layer 3 — Hyperparameters
// ============================================================
// A hyperparameter set maps a parameter name to one scalar
// value (integer, float or categorical). Each trainer variant
// declares a HyperparameterSpace listing, per parameter:
//
//   default — used when nobody supplies a value
//   search  — the range an orchestrator should explore
//   domain  — the values the trainer can actually run with
//
// Resolution happens in three layers, later layers winning:
//
//   declared defaults  ←  SM_HPS JSON object  ←  CLI flags
//
// After resolution every declared parameter has a concrete,
// correctly typed value inside its domain. Values outside the
// search range are kept but reported as notes so the caller
// can log them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ─── ParamValue ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Categorical(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v)         => write!(f, "{v}"),
            ParamValue::Float(v)       => write!(f, "{v}"),
            ParamValue::Categorical(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self { ParamValue::Int(v) }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self { ParamValue::Float(v) }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self { ParamValue::Categorical(v.to_string()) }
}

// ─── ParamRange ───────────────────────────────────────────────────────────────
/// An inclusive range a parameter may take.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamRange {
    Integer { min: i64, max: i64 },
    Continuous { min: f64, max: f64 },
}

impl ParamRange {
    pub fn contains(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (ParamRange::Integer { min, max }, ParamValue::Int(v)) => min <= v && v <= max,
            (ParamRange::Continuous { min, max }, ParamValue::Float(v)) => *min <= *v && *v <= *max,
            (ParamRange::Continuous { min, max }, ParamValue::Int(v)) => {
                let v = *v as f64;
                *min <= v && v <= *max
            }
            _ => false,
        }
    }

    /// Convert `value` to this range's kind (the platform passes every
    /// hyperparameter as a string, so "3" must become Int(3)).
    fn coerce(&self, name: &str, value: ParamValue) -> Result<ParamValue, ConfigError> {
        let invalid = |value: &ParamValue, reason: &str| ConfigError::InvalidValue {
            name:   name.to_string(),
            value:  value.to_string(),
            reason: reason.to_string(),
        };

        match self {
            ParamRange::Integer { .. } => match value {
                ParamValue::Int(_) => Ok(value),
                ParamValue::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                    Ok(ParamValue::Int(f as i64))
                }
                ParamValue::Categorical(ref s) => s
                    .trim()
                    .parse::<i64>()
                    .map(ParamValue::Int)
                    .map_err(|_| invalid(&value, "expected an integer")),
                ParamValue::Float(_) => Err(invalid(&value, "expected an integer")),
            },
            ParamRange::Continuous { .. } => match value {
                ParamValue::Float(f) if f.is_finite() => Ok(value),
                ParamValue::Float(_) => Err(invalid(&value, "expected a finite number")),
                ParamValue::Int(i) => Ok(ParamValue::Float(i as f64)),
                ParamValue::Categorical(ref s) => match s.trim().parse::<f64>() {
                    Ok(f) if f.is_finite() => Ok(ParamValue::Float(f)),
                    _ => Err(invalid(&value, "expected a finite number")),
                },
            },
        }
    }
}

impl fmt::Display for ParamRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamRange::Integer { min, max }    => write!(f, "[{min}, {max}]"),
            ParamRange::Continuous { min, max } => write!(f, "[{min}, {max}]"),
        }
    }
}

// ─── ParamSpec ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
    pub name:    &'static str,
    pub default: ParamValue,
    pub search:  ParamRange,
    #[serde(skip)]
    pub domain:  ParamRange,
}

// ─── HyperparameterSet ────────────────────────────────────────────────────────
/// Concrete values keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterSet(BTreeMap<String, ParamValue>);

impl HyperparameterSet {
    pub fn new() -> Self { Self::default() }

    /// Parse a JSON object such as the platform's `SM_HPS` variable.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)?;
        let mut set = Self::new();
        for (name, value) in raw {
            let value = match value {
                serde_json::Value::Number(n) => match n.as_i64() {
                    Some(i) => ParamValue::Int(i),
                    None => ParamValue::Float(n.as_f64().unwrap_or(f64::NAN)),
                },
                serde_json::Value::String(s) => ParamValue::Categorical(s),
                serde_json::Value::Bool(b) => ParamValue::Categorical(b.to_string()),
                other => {
                    return Err(ConfigError::InvalidValue {
                        name,
                        value:  other.to_string(),
                        reason: "expected a scalar".to_string(),
                    })
                }
            };
            set.0.insert(name, value);
        }
        Ok(set)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Set `name` only when a value was actually supplied.
    pub fn set_opt<V: Into<ParamValue>>(&mut self, name: &str, value: Option<V>) {
        if let Some(v) = value {
            self.set(name, v);
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> { self.0.get(name) }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> { self.0.iter() }

    pub fn require_int(&self, name: &str) -> Result<i64, ConfigError> {
        match self.get(name) {
            Some(ParamValue::Int(v)) => Ok(*v),
            Some(other) => Err(ConfigError::InvalidValue {
                name:   name.to_string(),
                value:  other.to_string(),
                reason: "expected an integer".to_string(),
            }),
            None => Err(ConfigError::MissingParameter(name.to_string())),
        }
    }

    pub fn require_usize(&self, name: &str) -> Result<usize, ConfigError> {
        let v = self.require_int(name)?;
        usize::try_from(v).map_err(|_| ConfigError::InvalidValue {
            name:   name.to_string(),
            value:  v.to_string(),
            reason: "must not be negative".to_string(),
        })
    }

    pub fn require_float(&self, name: &str) -> Result<f64, ConfigError> {
        match self.get(name) {
            Some(ParamValue::Float(v)) => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v as f64),
            Some(other) => Err(ConfigError::InvalidValue {
                name:   name.to_string(),
                value:  other.to_string(),
                reason: "expected a number".to_string(),
            }),
            None => Err(ConfigError::MissingParameter(name.to_string())),
        }
    }
}

// ─── HyperparameterSpace ──────────────────────────────────────────────────────
/// Result of resolving a space: the concrete values plus human
/// readable notes (ignored keys, values outside the search range).
#[derive(Debug, Clone)]
pub struct Resolution {
    pub values: HyperparameterSet,
    pub notes:  Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HyperparameterSpace {
    pub variant: &'static str,
    pub params:  Vec<ParamSpec>,
}

impl HyperparameterSpace {
    /// Search space of the convolutional network trainer.
    pub fn cnn() -> Self {
        Self {
            variant: "cnn",
            params: vec![
                ParamSpec {
                    name:    "batch-size",
                    default: ParamValue::Int(64),
                    search:  ParamRange::Integer { min: 32, max: 256 },
                    domain:  ParamRange::Integer { min: 1, max: 65_536 },
                },
                ParamSpec {
                    name:    "epochs",
                    default: ParamValue::Int(10),
                    search:  ParamRange::Integer { min: 5, max: 15 },
                    domain:  ParamRange::Integer { min: 1, max: 10_000 },
                },
                ParamSpec {
                    name:    "lr",
                    default: ParamValue::Float(0.001),
                    search:  ParamRange::Continuous { min: 0.0001, max: 0.1 },
                    domain:  ParamRange::Continuous { min: f64::MIN_POSITIVE, max: 10.0 },
                },
            ],
        }
    }

    /// Search space of the gradient-boosted tree trainer.
    pub fn tree() -> Self {
        Self {
            variant: "tree",
            params: vec![
                ParamSpec {
                    name:    "max_depth",
                    default: ParamValue::Int(3),
                    search:  ParamRange::Integer { min: 3, max: 10 },
                    domain:  ParamRange::Integer { min: 1, max: 32 },
                },
                ParamSpec {
                    name:    "eta",
                    default: ParamValue::Float(0.1),
                    search:  ParamRange::Continuous { min: 0.1, max: 0.5 },
                    domain:  ParamRange::Continuous { min: f64::MIN_POSITIVE, max: 1.0 },
                },
                ParamSpec {
                    name:    "num_round",
                    default: ParamValue::Int(100),
                    search:  ParamRange::Integer { min: 100, max: 1000 },
                    domain:  ParamRange::Integer { min: 1, max: 100_000 },
                },
            ],
        }
    }

    pub fn spec(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn defaults(&self) -> HyperparameterSet {
        let mut set = HyperparameterSet::new();
        for p in &self.params {
            set.set(p.name, p.default.clone());
        }
        set
    }

    /// Layer defaults ← `hps_json` ← `overrides`, then coerce and check
    /// every value against its domain.
    ///
    /// Unknown keys in the JSON layer are ignored (the platform mixes its
    /// own keys in), unknown keys in `overrides` are an error.
    pub fn resolve(
        &self,
        hps_json:  Option<&str>,
        overrides: HyperparameterSet,
    ) -> Result<Resolution, ConfigError> {
        let mut notes  = Vec::new();
        let mut merged = self.defaults();

        if let Some(json) = hps_json.filter(|j| !j.trim().is_empty()) {
            let from_env = HyperparameterSet::from_json(json)?;
            for (name, value) in from_env.0 {
                if self.spec(&name).is_some() {
                    merged.0.insert(name, value);
                } else {
                    notes.push(format!("ignoring unrecognised hyperparameter '{name}'"));
                }
            }
        }

        for (name, value) in overrides.0 {
            if self.spec(&name).is_none() {
                return Err(ConfigError::UnknownParameter(name));
            }
            merged.0.insert(name, value);
        }

        let mut values = HyperparameterSet::new();
        for spec in &self.params {
            let raw = merged
                .0
                .remove(spec.name)
                .ok_or_else(|| ConfigError::MissingParameter(spec.name.to_string()))?;
            let value = spec.domain.coerce(spec.name, raw)?;

            if !spec.domain.contains(&value) {
                return Err(ConfigError::InvalidValue {
                    name:   spec.name.to_string(),
                    value:  value.to_string(),
                    reason: format!("must lie in {}", spec.domain),
                });
            }
            if !spec.search.contains(&value) {
                notes.push(format!(
                    "{} = {} is outside the declared search range {}",
                    spec.name, value, spec.search
                ));
            }
            values.0.insert(spec.name.to_string(), value);
        }

        Ok(Resolution { values, notes })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_resolve_cleanly() {
        let r = HyperparameterSpace::cnn()
            .resolve(None, HyperparameterSet::new())
            .unwrap();
        assert_eq!(r.values.require_int("epochs").unwrap(), 10);
        assert_eq!(r.values.require_float("lr").unwrap(), 0.001);
        assert!(r.notes.is_empty());
    }

    #[test]
    fn test_cli_overrides_env_json() {
        let mut cli = HyperparameterSet::new();
        cli.set("eta", 0.3);
        let r = HyperparameterSpace::tree()
            .resolve(Some(r#"{"eta": "0.2", "max_depth": "5"}"#), cli)
            .unwrap();
        assert_eq!(r.values.require_float("eta").unwrap(), 0.3);
        // String values from the platform are coerced to the declared kind
        assert_eq!(r.values.require_int("max_depth").unwrap(), 5);
    }

    #[test]
    fn test_zero_rounds_rejected() {
        let mut cli = HyperparameterSet::new();
        cli.set("num_round", 0i64);
        let err = HyperparameterSpace::tree().resolve(None, cli).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref name, .. } if name == "num_round"));
    }

    #[test]
    fn test_zero_epochs_rejected() {
        let err = HyperparameterSpace::cnn()
            .resolve(Some(r#"{"epochs": 0}"#), HyperparameterSet::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_outside_search_range_is_noted_not_rejected() {
        let mut cli = HyperparameterSet::new();
        cli.set("num_round", 10i64);
        let r = HyperparameterSpace::tree().resolve(None, cli).unwrap();
        assert_eq!(r.values.require_int("num_round").unwrap(), 10);
        assert_eq!(r.notes.len(), 1);
        assert!(r.notes[0].contains("num_round"));
    }

    #[test]
    fn test_unknown_env_key_ignored_unknown_cli_key_rejected() {
        let r = HyperparameterSpace::cnn()
            .resolve(Some(r#"{"sagemaker_program": "train"}"#), HyperparameterSet::new())
            .unwrap();
        assert!(r.notes[0].contains("sagemaker_program"));

        let mut cli = HyperparameterSet::new();
        cli.set("momentum", 0.9);
        let err = HyperparameterSpace::cnn().resolve(None, cli).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownParameter(_)));
    }

    #[test]
    fn test_non_integer_rejected() {
        let err = HyperparameterSpace::cnn()
            .resolve(Some(r#"{"batch-size": "lots"}"#), HyperparameterSet::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_missing_parameter() {
        let set = HyperparameterSet::new();
        assert!(matches!(set.require_int("epochs"), Err(ConfigError::MissingParameter(_))));
    }

    #[test]
    fn test_range_contains() {
        let r = ParamRange::Continuous { min: 0.1, max: 0.5 };
        assert!(r.contains(&ParamValue::Float(0.3)));
        assert!(!r.contains(&ParamValue::Float(0.6)));
        let i = ParamRange::Integer { min: 1, max: 3 };
        assert!(!i.contains(&ParamValue::Categorical("2".into())));
    }
}
