use eyre::{Result, format_err};
use std::collections::BTreeMap as Map;

use netpol_registry::FeatureGates;

#[derive(Debug, Default, serde::Deserialize, serde::Serialize)]
pub struct Config {
    /// Namespace of requests for objects that don't set one.
    pub namespace: Option<String>,

    /// Feature gates, as in `NetworkPolicyStatus: true`.
    #[serde(default)]
    pub feature_gates: Map<String, bool>,
}

impl Config {
    /// Builds the feature gates from the config, then applies `overrides` (`A=true,B=false`).
    pub fn feature_gates(&self, overrides: &str) -> Result<FeatureGates> {
        let gates = FeatureGates::new();
        gates
            .set_all(self.feature_gates.iter().map(|(k, v)| (k.as_str(), *v)))
            .map_err(|e| format_err!("invalid feature_gates in config: {e}"))?;
        gates
            .set_from_str(overrides)
            .map_err(|e| format_err!("invalid --feature-gates: {e}"))?;
        Ok(gates)
    }
}
