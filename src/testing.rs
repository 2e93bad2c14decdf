//! Fixtures shared by the unit tests.

use chrono::{Duration, Utc};
use serde_json::json;

use crate::api::{Condition, ConditionStatus, NetworkPolicy, condition};

/// foo in namespace bar, selecting a=b, with optional ingress/egress rules from/to namespaces
/// labelled c=d on TCP 31000 (up to 32000 with `has_end_port`).
pub fn make_network_policy(is_ingress: bool, is_egress: bool, has_end_port: bool) -> NetworkPolicy {
    let mut ports = json!([{ "protocol": "TCP", "port": 31000 }]);
    if has_end_port {
        ports[0]["endPort"] = json!(32000);
    }

    let mut np = json!({
        "metadata": { "name": "foo", "namespace": "bar", "generation": 0 },
        "spec": { "podSelector": { "matchLabels": { "a": "b" } } }
    });
    if is_ingress {
        np["spec"]["ingress"] = json!([{
            "from": [{ "namespaceSelector": { "matchLabels": { "c": "d" } } }],
            "ports": ports,
        }]);
    }
    if is_egress {
        np["spec"]["egress"] = json!([{
            "to": [{ "namespaceSelector": { "matchLabels": { "c": "d" } } }],
            "ports": ports,
        }]);
    }

    serde_json::from_value(np).unwrap()
}

/// An `Accepted` condition that passes validation.
pub fn accepted(status: ConditionStatus) -> Condition {
    Condition {
        type_: condition::ACCEPTED.into(),
        status,
        reason: "RuleApplied".into(),
        message: "rule was successfully applied".into(),
        observed_generation: 2,
        last_transition_time: Some(Utc::now() - Duration::minutes(5)),
    }
}
