//! Replays a script of requests and feature gate changes against an in-memory store.
//!
//! ```yaml
//! - setFeatureGates: { NetworkPolicyStatus: true }
//! - create: { metadata: { name: foo, namespace: bar }, spec: { podSelector: {} } }
//! - updateStatus: { metadata: { name: foo, namespace: bar }, status: { conditions: [...] } }
//! ```

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap as Map;
use std::sync::Arc;

use crate::api::NetworkPolicy;
use crate::features::{self, FeatureGates};
use crate::memstore::{self, Store};
use crate::strategy::{StatusStrategy, Strategy};
use crate::Context;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Step {
    SetFeatureGates(Map<String, bool>),
    Create(NetworkPolicy),
    Update(NetworkPolicy),
    UpdateStatus(NetworkPolicy),
}

pub fn parse_script(script: &str) -> Result<Vec<Step>, serde_yaml::Error> {
    serde_yaml::from_str(script)
}

#[derive(Debug)]
pub enum Outcome {
    /// feature gates after the change.
    FeatureGates(Map<String, bool>),
    /// the object as stored.
    Stored(NetworkPolicy),
    /// the request was refused, nothing was stored.
    Rejected(memstore::Error),
}

impl Outcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

pub struct Replayer {
    ctx: Context,
    gates: Arc<FeatureGates>,
    strategy: Strategy,
    status_strategy: StatusStrategy,
    store: Store<NetworkPolicy>,
}

impl Replayer {
    pub fn new(ctx: Context, gates: Arc<FeatureGates>) -> Self {
        let strategy = Strategy::new();
        Self {
            ctx,
            status_strategy: StatusStrategy::new(strategy.clone(), gates.clone()),
            strategy,
            gates,
            store: Store::new(),
        }
    }

    pub fn store(&self) -> &Store<NetworkPolicy> {
        &self.store
    }

    /// Runs one step. Refused requests are outcomes; only an invalid gate change is an error.
    pub fn step(&mut self, step: Step) -> Result<Outcome, features::Error> {
        let result = match step {
            Step::SetFeatureGates(gates) => {
                self.gates
                    .set_all(gates.iter().map(|(k, v)| (k.as_str(), *v)))?;
                return Ok(Outcome::FeatureGates(self.gates.snapshot()));
            }
            Step::Create(np) => self.store.create(&self.ctx, &self.strategy, np),
            Step::Update(np) => self.store.update(&self.ctx, &self.strategy, np),
            Step::UpdateStatus(np) => self.store.update(&self.ctx, &self.status_strategy, np),
        };

        Ok(match result {
            Ok(np) => Outcome::Stored(np),
            Err(e) => {
                debug!("request rejected: {e}");
                Outcome::Rejected(e)
            }
        })
    }

    pub fn run(&mut self, steps: Vec<Step>) -> Result<Vec<Outcome>, features::Error> {
        info!("replaying {} steps", steps.len());
        steps.into_iter().map(|step| self.step(step)).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::ConditionStatus;
    use crate::memstore::Key;

    const SCRIPT: &str = r#"
- setFeatureGates: { NetworkPolicyStatus: true }
- create:
    metadata: { name: foo, namespace: bar }
    spec:
      podSelector: { matchLabels: { a: b } }
      egress:
        - to: [{ namespaceSelector: { matchLabels: { c: d } } }]
          ports: [{ protocol: TCP, port: 31000, endPort: 32000 }]
- updateStatus:
    metadata: { name: foo, namespace: bar }
    status:
      conditions:
        - type: Accepted
          status: "True"
          reason: RuleApplied
          message: rule was successfully applied
          observedGeneration: 1
          lastTransitionTime: "2024-01-02T03:04:05Z"
- setFeatureGates: { NetworkPolicyStatus: false }
- updateStatus:
    metadata: { name: foo, namespace: bar }
    status: {}
- update:
    metadata: { name: foo, namespace: bar }
    spec:
      podSelector: { matchLabels: { a: b } }
- updateStatus:
    metadata: { name: foo, namespace: bar }
    status:
      conditions:
        - type: Accepted
          status: "False"
"#;

    #[test]
    fn test_replay() {
        let steps = parse_script(SCRIPT).unwrap();
        assert_eq!(steps.len(), 7);

        let mut replayer = Replayer::new(Context::default(), Arc::new(FeatureGates::new()));
        let outcomes = replayer.run(steps).unwrap();

        assert!(outcomes.iter().all(|o| !o.is_rejected()), "{outcomes:?}");

        let np = replayer.store().get(&Key::new("bar", "foo")).unwrap();
        assert_eq!(np.metadata.generation, Some(2));
        assert!(np.spec.egress.is_empty());
        assert_eq!(np.status.conditions.len(), 1);
        assert_eq!(np.status.conditions[0].status, ConditionStatus::True);
    }

    #[test]
    fn test_replay_rejections() {
        let script = r#"
- setFeatureGates: { NetworkPolicyStatus: true }
- update:
    metadata: { name: foo, namespace: bar }
- create:
    metadata: { name: foo, namespace: bar }
    spec:
      ingress:
        - ports: [{ port: http, endPort: 32000 }]
- create:
    metadata: { name: foo, namespace: bar }
- updateStatus:
    metadata: { name: foo, namespace: bar }
    status:
      conditions:
        - type: Accepted
          status: "True"
"#;
        let mut replayer = Replayer::new(Context::default(), Arc::new(FeatureGates::new()));
        let outcomes = replayer.run(parse_script(script).unwrap()).unwrap();

        let rejected = outcomes.iter().map(Outcome::is_rejected).collect::<Vec<_>>();
        assert_eq!(rejected, vec![false, true, true, false, true]);

        let Outcome::Rejected(memstore::Error::Invalid { errors, .. }) = &outcomes[4] else {
            panic!("unexpected outcome: {:?}", outcomes[4]);
        };
        assert_eq!(
            errors[0].path.as_str(),
            "status.conditions[0].lastTransitionTime"
        );
    }

    #[test]
    fn test_replay_unknown_gate() {
        let mut replayer = Replayer::new(Context::default(), Arc::new(FeatureGates::new()));
        let err = replayer
            .run(parse_script("- setFeatureGates: { Nope: true }").unwrap())
            .unwrap_err();
        assert_eq!(err, features::Error::Unknown("Nope".into()));
    }
}
