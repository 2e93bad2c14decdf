//! Runtime feature gates.
//!
//! Strategies receive a [`FeatureGate`] at construction and read it at most once per call, so
//! a toggle between two requests is observed by the second one and never in the middle of one.

use log::info;
use std::collections::BTreeMap as Map;
use std::sync::RwLock;

/// Exposes the `status` subresource of network policies.
pub const NETWORK_POLICY_STATUS: &str = "NetworkPolicyStatus";

/// Features known to this registry and their default value.
const KNOWN_FEATURES: &[(&str, bool)] = &[(NETWORK_POLICY_STATUS, false)];

pub trait FeatureGate: Send + Sync {
    fn enabled(&self, feature: &str) -> bool;
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unrecognized feature gate: {0}")]
    Unknown(String),
    #[error("missing bool value for {0}")]
    MissingValue(String),
    #[error("invalid value of {name}={value}, expected true or false")]
    InvalidValue { name: String, value: String },
}

/// Mutable set of feature gates, shared between strategies.
#[derive(Debug)]
pub struct FeatureGates {
    defaults: Map<String, bool>,
    values: RwLock<Map<String, bool>>,
}

impl FeatureGates {
    /// Gates for the features this registry knows about, all at their default.
    pub fn new() -> Self {
        Self::with_known(KNOWN_FEATURES.iter().copied())
    }

    pub fn with_known<'a>(known: impl IntoIterator<Item = (&'a str, bool)>) -> Self {
        Self {
            defaults: known.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            values: RwLock::new(Map::new()),
        }
    }

    pub fn known(&self) -> impl Iterator<Item = &str> {
        self.defaults.keys().map(String::as_str)
    }

    pub fn set(&self, name: &str, enabled: bool) -> Result<(), Error> {
        self.set_all([(name, enabled)])
    }

    /// Sets all the given gates, or none of them if one is unknown.
    pub fn set_all<'a>(
        &self,
        gates: impl IntoIterator<Item = (&'a str, bool)>,
    ) -> Result<(), Error> {
        let gates = gates.into_iter().collect::<Vec<_>>();

        if let Some((name, _)) = gates.iter().find(|(n, _)| !self.defaults.contains_key(*n)) {
            return Err(Error::Unknown(name.to_string()));
        }

        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        for (name, enabled) in gates {
            if values.get(name) != Some(&enabled) {
                info!("feature gate {name}={enabled}");
            }
            values.insert(name.to_string(), enabled);
        }
        Ok(())
    }

    /// Parses and applies gates in the `Name=true,Other=false` form.
    pub fn set_from_str(&self, s: &str) -> Result<(), Error> {
        let gates = parse(s)?;
        self.set_all(gates.iter().map(|(k, v)| (k.as_str(), *v)))
    }

    /// Current value of every known gate.
    pub fn snapshot(&self) -> Map<String, bool> {
        self.defaults
            .keys()
            .map(|k| (k.clone(), self.enabled(k)))
            .collect()
    }
}

impl Default for FeatureGates {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureGate for FeatureGates {
    fn enabled(&self, feature: &str) -> bool {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        match values.get(feature) {
            Some(v) => *v,
            None => self.defaults.get(feature).copied().unwrap_or(false),
        }
    }
}

fn parse(s: &str) -> Result<Vec<(String, bool)>, Error> {
    let mut gates = Vec::new();

    for item in s.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((name, value)) = item.split_once('=') else {
            return Err(Error::MissingValue(item.to_string()));
        };
        let name = name.trim();
        let value = value.trim();

        let enabled = match value.to_lowercase().as_str() {
            "true" => true,
            "false" => false,
            _ => {
                return Err(Error::InvalidValue {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
        };
        gates.push((name.to_string(), enabled));
    }

    Ok(gates)
}
