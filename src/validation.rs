//! Validation rules for network policies.
//!
//! Every function is pure: it only reads its inputs and returns the errors it found, in field
//! declaration order and then rule order.

pub mod names;


use cidr::IpCidr;
use k8s_openapi::apimachinery::pkg::{
    apis::meta::v1::{LabelSelector, ObjectMeta},
    util::intstr::IntOrString,
};
use std::collections::BTreeSet as Set;

use crate::api::{
    Condition, IpBlock, NetworkPolicy, NetworkPolicySpec, NetworkPolicyStatus, Peer, PortSpec,
    POLICY_TYPE_EGRESS, POLICY_TYPE_INGRESS, PROTOCOL_SCTP, PROTOCOL_TCP, PROTOCOL_UDP,
};
use crate::field::{FieldError, FieldErrors, Path};

const SUPPORTED_PROTOCOLS: &[&str] = &[PROTOCOL_TCP, PROTOCOL_UDP, PROTOCOL_SCTP];
const SUPPORTED_POLICY_TYPES: &[&str] = &[POLICY_TYPE_INGRESS, POLICY_TYPE_EGRESS];
const SUPPORTED_SELECTOR_OPERATORS: &[&str] = &["In", "NotIn", "Exists", "DoesNotExist"];

const CONDITION_TYPE_MAX: usize = 316;
const CONDITION_REASON_MAX: usize = 1024;
const CONDITION_MESSAGE_MAX: usize = 32 * 1024;

/// Full validation of a policy: object metadata, then spec.
pub fn validate_network_policy(np: &NetworkPolicy) -> FieldErrors {
    let mut errs = validate_object_meta(&np.metadata, &Path::new("metadata"));
    errs.extend(validate_network_policy_spec(&np.spec, &Path::new("spec")));
    errs
}

/// Rules for an update through the main resource: metadata transitions, then the new object.
pub fn validate_network_policy_update(new: &NetworkPolicy, old: &NetworkPolicy) -> FieldErrors {
    let mut errs =
        validate_object_meta_update(&new.metadata, &old.metadata, &Path::new("metadata"));
    errs.extend(validate_network_policy(new));
    errs
}

/// Rules for an update through the status subresource.
pub fn validate_network_policy_status_update(
    new: &NetworkPolicy,
    old: &NetworkPolicy,
) -> FieldErrors {
    let mut errs =
        validate_object_meta_update(&new.metadata, &old.metadata, &Path::new("metadata"));
    errs.extend(validate_status(&new.status, &old.status, &Path::new("status")));
    errs
}

pub fn validate_object_meta(meta: &ObjectMeta, path: &Path) -> FieldErrors {
    let mut errs = FieldErrors::new();

    let name_path = path.child("name");
    match meta.name.as_deref() {
        None | Some("") => errs.push(FieldError::required(&name_path)),
        Some(name) => {
            if let Err(e) = names::is_dns1123_subdomain(name) {
                errs.push(FieldError::invalid(&name_path, name, e));
            }
        }
    }

    let ns_path = path.child("namespace");
    match meta.namespace.as_deref() {
        None | Some("") => errs.push(FieldError::required(&ns_path)),
        Some(ns) => {
            if let Err(e) = names::is_dns1123_label(ns) {
                errs.push(FieldError::invalid(&ns_path, ns, e));
            }
        }
    }

    errs
}

pub fn validate_object_meta_update(
    new: &ObjectMeta,
    old: &ObjectMeta,
    path: &Path,
) -> FieldErrors {
    let mut errs = FieldErrors::new();

    for (field, new, old) in [
        ("name", &new.name, &old.name),
        ("namespace", &new.namespace, &old.namespace),
    ] {
        if new != old {
            let value = new.as_deref().unwrap_or_default();
            errs.push(FieldError::invalid(
                &path.child(field),
                value,
                "field is immutable",
            ));
        }
    }

    errs
}

pub fn validate_network_policy_spec(spec: &NetworkPolicySpec, path: &Path) -> FieldErrors {
    let mut errs = validate_label_selector(&spec.pod_selector, &path.child("podSelector"));

    let ingress_path = path.child("ingress");
    for (i, rule) in spec.ingress.iter().enumerate() {
        let rule_path = ingress_path.index(i);
        errs.extend(validate_ports(&rule.ports, &rule_path.child("ports")));
        errs.extend(validate_peers(&rule.peers, &rule_path.child("from")));
    }

    let egress_path = path.child("egress");
    for (i, rule) in spec.egress.iter().enumerate() {
        let rule_path = egress_path.index(i);
        errs.extend(validate_ports(&rule.ports, &rule_path.child("ports")));
        errs.extend(validate_peers(&rule.peers, &rule_path.child("to")));
    }

    errs.extend(validate_policy_types(
        &spec.policy_types,
        &path.child("policyTypes"),
    ));

    errs
}

pub fn validate_label_selector(sel: &LabelSelector, path: &Path) -> FieldErrors {
    let mut errs = FieldErrors::new();

    if let Some(labels) = &sel.match_labels {
        let labels_path = path.child("matchLabels");
        for (k, v) in labels {
            if let Err(e) = names::is_qualified_name(k) {
                errs.push(FieldError::invalid(&labels_path, k, e));
            }
            if let Err(e) = names::is_label_value(v) {
                errs.push(FieldError::invalid(&labels_path.key(k), v, e));
            }
        }
    }

    let exprs_path = path.child("matchExpressions");
    for (i, expr) in sel.match_expressions.iter().flatten().enumerate() {
        let expr_path = exprs_path.index(i);

        if let Err(e) = names::is_qualified_name(&expr.key) {
            errs.push(FieldError::invalid(&expr_path.child("key"), &expr.key, e));
        }

        let values = expr.values.as_deref().unwrap_or_default();
        let values_path = expr_path.child("values");
        match expr.operator.as_str() {
            "In" | "NotIn" => {
                if values.is_empty() {
                    errs.push(FieldError::required(&values_path));
                }
            }
            "Exists" | "DoesNotExist" => {
                if !values.is_empty() {
                    errs.push(FieldError::forbidden(
                        &values_path,
                        "may not be specified when `operator` is 'Exists' or 'DoesNotExist'",
                    ));
                }
            }
            op => errs.push(FieldError::not_supported(
                &expr_path.child("operator"),
                op,
                SUPPORTED_SELECTOR_OPERATORS,
            )),
        }
    }

    errs
}

fn validate_ports(ports: &[PortSpec], path: &Path) -> FieldErrors {
    (ports.iter().enumerate())
        .flat_map(|(i, port)| validate_port(port, &path.index(i)))
        .collect()
}

/// Rules for one port entry. `endPort` is only valid with a numeric `port` it doesn't precede.
pub fn validate_port(port: &PortSpec, path: &Path) -> FieldErrors {
    let mut errs = FieldErrors::new();

    if let Some(protocol) = &port.protocol {
        if !SUPPORTED_PROTOCOLS.contains(&protocol.as_str()) {
            errs.push(FieldError::not_supported(
                &path.child("protocol"),
                protocol,
                SUPPORTED_PROTOCOLS,
            ));
        }
    }

    let port_path = path.child("port");
    match &port.port {
        None => {}
        Some(IntOrString::Int(p)) => {
            if let Err(e) = names::is_port_num(*p) {
                errs.push(FieldError::invalid(&port_path, p, e));
            }
        }
        Some(IntOrString::String(name)) => {
            if let Err(e) = names::is_iana_svc_name(name) {
                errs.push(FieldError::invalid(&port_path, name, e));
            }
        }
    }

    if let Some(end_port) = port.end_port {
        let end_port_path = path.child("endPort");
        match &port.port {
            None => errs.push(FieldError::required(&port_path)),
            Some(IntOrString::String(_)) => errs.push(FieldError::forbidden(
                &end_port_path,
                "may not be specified when `port` is non-numeric",
            )),
            Some(IntOrString::Int(p)) => {
                if end_port < *p {
                    errs.push(FieldError::invalid(
                        &end_port_path,
                        end_port,
                        "must be greater than or equal to `port`",
                    ));
                }
            }
        }
        if let Err(e) = names::is_port_num(end_port) {
            errs.push(FieldError::invalid(&end_port_path, end_port, e));
        }
    }

    errs
}

fn validate_peers(peers: &[Peer], path: &Path) -> FieldErrors {
    (peers.iter().enumerate())
        .flat_map(|(i, peer)| validate_peer(peer, &path.index(i)))
        .collect()
}

/// A peer selects pods and/or namespaces, or is a lone ipBlock.
pub fn validate_peer(peer: &Peer, path: &Path) -> FieldErrors {
    let mut errs = FieldErrors::new();

    let mut peers_set = 0;
    if let Some(sel) = &peer.pod_selector {
        peers_set += 1;
        errs.extend(validate_label_selector(sel, &path.child("podSelector")));
    }
    if let Some(sel) = &peer.namespace_selector {
        peers_set += 1;
        errs.extend(validate_label_selector(sel, &path.child("namespaceSelector")));
    }
    if let Some(block) = &peer.ip_block {
        if peers_set != 0 {
            errs.push(FieldError::forbidden(
                path,
                "may not specify both ipBlock and another peer",
            ));
        }
        peers_set += 1;
        errs.extend(validate_ip_block(block, &path.child("ipBlock")));
    }

    if peers_set == 0 {
        errs.push(FieldError::required(path));
    }

    errs
}

pub fn validate_ip_block(block: &IpBlock, path: &Path) -> FieldErrors {
    let mut errs = FieldErrors::new();

    let cidr_path = path.child("cidr");
    if block.cidr.is_empty() {
        errs.push(FieldError::required(&cidr_path));
        return errs;
    }
    let cidr = match block.cidr.parse::<IpCidr>() {
        Ok(cidr) => cidr,
        Err(e) => {
            errs.push(FieldError::invalid(&cidr_path, &block.cidr, e.to_string()));
            return errs;
        }
    };

    let except_path = path.child("except");
    for (i, except) in block.except.iter().enumerate() {
        let path = except_path.index(i);
        let except_cidr = match except.parse::<IpCidr>() {
            Ok(v) => v,
            Err(e) => {
                errs.push(FieldError::invalid(&path, except, e.to_string()));
                continue;
            }
        };

        let is_strict_subset = except_cidr.is_ipv4() == cidr.is_ipv4()
            && except_cidr.network_length() > cidr.network_length()
            && cidr.contains(&except_cidr.first_address());
        if !is_strict_subset {
            errs.push(FieldError::invalid(
                &path,
                except,
                "must be a strict subset of `cidr`",
            ));
        }
    }

    errs
}

pub fn validate_policy_types(types: &[String], path: &Path) -> FieldErrors {
    let mut errs = FieldErrors::new();

    let mut seen = Set::new();
    for (i, t) in types.iter().enumerate() {
        let path = path.index(i);
        if !SUPPORTED_POLICY_TYPES.contains(&t.as_str()) {
            errs.push(FieldError::not_supported(&path, t, SUPPORTED_POLICY_TYPES));
        } else if !seen.insert(t.as_str()) {
            errs.push(FieldError::invalid(&path, t, "duplicate policy type"));
        }
    }

    if types.len() > SUPPORTED_POLICY_TYPES.len() {
        errs.push(FieldError::invalid(
            path,
            types.len(),
            "may not have more than 2 policyTypes",
        ));
    }

    errs
}

/// Condition rules. A transition time is required whenever a condition is new or its status
/// moved relative to the condition of the same type in `old`.
pub fn validate_status(
    new: &NetworkPolicyStatus,
    old: &NetworkPolicyStatus,
    path: &Path,
) -> FieldErrors {
    let mut errs = FieldErrors::new();

    let conds_path = path.child("conditions");
    for (i, cond) in new.conditions.iter().enumerate() {
        errs.extend(validate_condition(
            cond,
            old.condition(&cond.type_),
            &conds_path.index(i),
        ));
    }

    errs
}

pub fn validate_condition(cond: &Condition, old: Option<&Condition>, path: &Path) -> FieldErrors {
    let mut errs = FieldErrors::new();

    let type_path = path.child("type");
    if cond.type_.is_empty() {
        errs.push(FieldError::required(&type_path));
    } else if cond.type_.len() > CONDITION_TYPE_MAX {
        errs.push(FieldError::too_long(&type_path, CONDITION_TYPE_MAX));
    }

    if cond.observed_generation < 0 {
        errs.push(FieldError::invalid(
            &path.child("observedGeneration"),
            cond.observed_generation,
            "must be greater than or equal to zero",
        ));
    }

    let status_changed = old.is_none_or(|old| old.status != cond.status);
    if status_changed && cond.transition_time_is_zero() {
        errs.push(FieldError::required(&path.child("lastTransitionTime")));
    }

    let reason_path = path.child("reason");
    if cond.reason.len() > CONDITION_REASON_MAX {
        errs.push(FieldError::too_long(&reason_path, CONDITION_REASON_MAX));
    } else if !cond.reason.is_empty() && !names::is_camel_case_reason(&cond.reason) {
        errs.push(FieldError::invalid(
            &reason_path,
            &cond.reason,
            "a condition reason must start with alphabetic character, optionally followed by a string of alphanumeric characters or '_,:', and must end with an alphanumeric character or '_'",
        ));
    }

    if cond.message.len() > CONDITION_MESSAGE_MAX {
        errs.push(FieldError::too_long(
            &path.child("message"),
            CONDITION_MESSAGE_MAX,
        ));
    }

    errs
}
