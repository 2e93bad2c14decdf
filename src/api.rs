//! The NetworkPolicy resource as seen by the registry.

use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::{
    apis::meta::v1::{LabelSelector, LabelSelectorRequirement, ObjectMeta},
    util::intstr::IntOrString,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub const GROUP: &str = "networking.k8s.io";
pub const VERSION: &str = "v1";
pub const KIND: &str = "NetworkPolicy";
pub const PLURAL: &str = "networkpolicies";

pub const PROTOCOL_TCP: &str = "TCP";
pub const PROTOCOL_UDP: &str = "UDP";
pub const PROTOCOL_SCTP: &str = "SCTP";

pub const POLICY_TYPE_INGRESS: &str = "Ingress";
pub const POLICY_TYPE_EGRESS: &str = "Egress";

/// Condition types reported by network policy implementations.
pub mod condition {
    pub const ACCEPTED: &str = "Accepted";
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct NetworkPolicy {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: NetworkPolicySpec,
    #[serde(default, skip_serializing_if = "NetworkPolicyStatus::is_empty")]
    pub status: NetworkPolicyStatus,
}

impl kube::Resource for NetworkPolicy {
    type DynamicType = ();
    type Scope = k8s_openapi::NamespaceResourceScope;

    fn kind(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(KIND)
    }

    fn group(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(GROUP)
    }

    fn version(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(VERSION)
    }

    fn plural(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(PLURAL)
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPolicySpec {
    #[serde(default)]
    pub pod_selector: LabelSelector,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress: Vec<IngressRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub egress: Vec<EgressRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy_types: Vec<String>,
}

impl NetworkPolicySpec {
    /// Semantic equality, used to decide whether a write bumps `generation`.
    ///
    /// Both sides are normalized first:
    /// - `matchLabels` compare as maps, and absent equals empty;
    /// - absent `matchExpressions` (or expression `values`) equals empty;
    /// - an unset port protocol equals `TCP`.
    ///
    /// Every sequence keeps its order.
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }

    fn normalized(&self) -> Self {
        Self {
            pod_selector: normalize_selector(&self.pod_selector),
            ingress: (self.ingress.iter())
                .map(|r| IngressRule {
                    peers: normalize_peers(&r.peers),
                    ports: normalize_ports(&r.ports),
                })
                .collect(),
            egress: (self.egress.iter())
                .map(|r| EgressRule {
                    peers: normalize_peers(&r.peers),
                    ports: normalize_ports(&r.ports),
                })
                .collect(),
            policy_types: self.policy_types.clone(),
        }
    }
}

fn normalize_selector(sel: &LabelSelector) -> LabelSelector {
    LabelSelector {
        match_labels: sel.match_labels.clone().filter(|m| !m.is_empty()),
        match_expressions: (sel.match_expressions.as_ref())
            .filter(|v| !v.is_empty())
            .map(|exprs| {
                (exprs.iter())
                    .map(|e| LabelSelectorRequirement {
                        key: e.key.clone(),
                        operator: e.operator.clone(),
                        values: e.values.clone().filter(|v| !v.is_empty()),
                    })
                    .collect()
            }),
    }
}

fn normalize_peers(peers: &[Peer]) -> Vec<Peer> {
    (peers.iter())
        .map(|p| Peer {
            pod_selector: p.pod_selector.as_ref().map(normalize_selector),
            namespace_selector: p.namespace_selector.as_ref().map(normalize_selector),
            ip_block: p.ip_block.clone(),
        })
        .collect()
}

fn normalize_ports(ports: &[PortSpec]) -> Vec<PortSpec> {
    (ports.iter())
        .map(|p| PortSpec {
            protocol: Some(p.protocol().to_string()),
            port: p.port.clone(),
            end_port: p.end_port,
        })
        .collect()
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct IngressRule {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortSpec>,
    #[serde(default, rename = "from", skip_serializing_if = "Vec::is_empty")]
    pub peers: Vec<Peer>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct EgressRule {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortSpec>,
    #[serde(default, rename = "to", skip_serializing_if = "Vec::is_empty")]
    pub peers: Vec<Peer>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_selector: Option<LabelSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_selector: Option<LabelSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_block: Option<IpBlock>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct IpBlock {
    pub cidr: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub except: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<IntOrString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_port: Option<i32>,
}

impl PortSpec {
    pub fn protocol(&self) -> &str {
        self.protocol.as_deref().unwrap_or(PROTOCOL_TCP)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct NetworkPolicyStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl NetworkPolicyStatus {
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    #[serde(default)]
    pub observed_generation: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

impl Condition {
    /// true when the transition time is unset (or the zero timestamp).
    pub fn transition_time_is_zero(&self) -> bool {
        match self.last_transition_time {
            None => true,
            Some(t) => t == DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::True => "True",
            Self::False => "False",
            Self::Unknown => "Unknown",
        })
    }
}
