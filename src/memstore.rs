//! In-memory object store driving the strategies.
//!
//! This is the generic registry flow (prepare, validate, then persist) without a real storage
//! backend behind it. It keeps the last committed version of each object and assigns
//! increasing resource versions.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{self as meta, ObjectMeta};
use kube::Resource;
use log::info;
use std::collections::{BTreeMap as Map, btree_map};

use crate::Context;
use crate::field::FieldErrors;
use crate::strategy::RestStrategy;

/// namespace/name key of a stored object. Cluster-scoped objects have an empty namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Key {
    pub namespace: String,
    pub name: String,
}
impl Key {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}
impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        if self.namespace.is_empty() {
            return f.write_str(&self.name);
        }
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    BadRequest(String),
    #[error("{kind} \"{key}\" not found")]
    NotFound { kind: String, key: Key },
    #[error("{kind} \"{key}\" already exists")]
    AlreadyExists { kind: String, key: Key },
    #[error(
        "operation cannot be fulfilled on {kind} \"{key}\": the object has been modified; please apply your changes to the latest version and try again"
    )]
    Conflict { kind: String, key: Key },
    #[error("{kind} \"{key}\" is invalid: {errors}")]
    Invalid {
        kind: String,
        key: Key,
        errors: FieldErrors,
    },
}

impl Error {
    /// The status an API server would answer with.
    pub fn to_status(&self) -> meta::Status {
        let (code, reason, kind, key) = match self {
            Self::BadRequest(_) => (400, "BadRequest", None, None),
            Self::NotFound { kind, key } => (404, "NotFound", Some(kind), Some(key)),
            Self::AlreadyExists { kind, key } => (409, "AlreadyExists", Some(kind), Some(key)),
            Self::Conflict { kind, key } => (409, "Conflict", Some(kind), Some(key)),
            Self::Invalid { kind, key, errors } => return errors.to_status(kind, &key.name),
        };

        meta::Status {
            code: Some(code),
            message: Some(self.to_string()),
            reason: Some(reason.to_string()),
            status: Some("Failure".to_string()),
            details: key.map(|key| meta::StatusDetails {
                kind: kind.cloned(),
                name: Some(key.name.clone()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

pub struct Store<K> {
    objects: Map<Key, K>,
    resource_version: u64,
}

impl<K> Store<K>
where
    K: Resource<DynamicType = ()> + Clone + PartialEq,
{
    pub fn new() -> Self {
        Self {
            objects: Map::new(),
            resource_version: 0,
        }
    }

    pub fn get(&self, key: &Key) -> Option<&K> {
        self.objects.get(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Key, K> {
        self.objects.iter()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Prepares, validates and stores a new object.
    pub fn create<S>(&mut self, ctx: &Context, strategy: &S, mut obj: K) -> Result<K, Error>
    where
        S: RestStrategy<Object = K>,
    {
        let key = key_for(ctx, strategy.namespace_scoped(), obj.meta_mut())?;

        strategy.prepare_for_create(ctx, &mut obj);

        let errors = strategy.validate(ctx, &obj);
        if !errors.is_empty() {
            return Err(Error::Invalid {
                kind: kind::<K>(),
                key,
                errors,
            });
        }

        if self.objects.contains_key(&key) {
            return Err(Error::AlreadyExists {
                kind: kind::<K>(),
                key,
            });
        }

        obj.meta_mut().resource_version = Some(self.next_resource_version());
        info!("{} {key} created", kind::<K>());

        self.objects.insert(key, obj.clone());
        Ok(obj)
    }

    /// Prepares, validates and stores a new version of an object.
    ///
    /// A resource version sent by the client must match the stored one. An update that
    /// changes nothing keeps the stored resource version.
    pub fn update<S>(&mut self, ctx: &Context, strategy: &S, mut obj: K) -> Result<K, Error>
    where
        S: RestStrategy<Object = K>,
    {
        let key = key_for(ctx, strategy.namespace_scoped(), obj.meta_mut())?;

        let Some(old) = self.objects.get(&key).cloned() else {
            if strategy.allow_create_on_update() {
                return self.create(ctx, strategy, obj);
            }
            return Err(Error::NotFound {
                kind: kind::<K>(),
                key,
            });
        };

        let sent_version = obj.meta().resource_version.as_deref();
        if sent_version.is_some_and(|v| !v.is_empty())
            && sent_version != old.meta().resource_version.as_deref()
        {
            return Err(Error::Conflict {
                kind: kind::<K>(),
                key,
            });
        }
        obj.meta_mut().resource_version = old.meta().resource_version.clone();

        strategy.prepare_for_update(ctx, &mut obj, &old);

        let errors = strategy.validate_update(ctx, &obj, &old);
        if !errors.is_empty() {
            return Err(Error::Invalid {
                kind: kind::<K>(),
                key,
                errors,
            });
        }

        if obj == old {
            return Ok(obj);
        }

        obj.meta_mut().resource_version = Some(self.next_resource_version());
        info!("{} {key} updated", kind::<K>());

        self.objects.insert(key, obj.clone());
        Ok(obj)
    }

    fn next_resource_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }
}

impl<K> Default for Store<K>
where
    K: Resource<DynamicType = ()> + Clone + PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}

fn kind<K: Resource<DynamicType = ()>>() -> String {
    K::kind(&()).to_string()
}

/// Computes the key of an object, defaulting its namespace from the request.
fn key_for(ctx: &Context, namespaced: bool, meta: &mut ObjectMeta) -> Result<Key, Error> {
    let name = match meta.name.as_deref() {
        None | Some("") => return Err(Error::BadRequest("name is required".into())),
        Some(name) => name.to_string(),
    };

    if !namespaced {
        return Ok(Key::new("", name));
    }

    let obj_ns = meta.namespace.as_deref().filter(|ns| !ns.is_empty());
    let namespace = match (obj_ns, ctx.namespace.as_deref()) {
        (Some(obj_ns), Some(req_ns)) if obj_ns != req_ns => {
            return Err(Error::BadRequest(format!(
                "the namespace of the provided object ({obj_ns}) does not match the namespace sent on the request ({req_ns})"
            )));
        }
        (Some(ns), _) | (None, Some(ns)) => ns.to_string(),
        (None, None) => return Err(Error::BadRequest("namespace is required".into())),
    };

    meta.namespace = Some(namespace.clone());
    Ok(Key::new(namespace, name))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::api::{ConditionStatus, NetworkPolicy, NetworkPolicyStatus};
    use crate::features::{FeatureGates, NETWORK_POLICY_STATUS};
    use crate::strategy::{StatusStrategy, Strategy};
    use crate::testing::{accepted, make_network_policy};

    fn key() -> Key {
        Key::new("bar", "foo")
    }

    #[test]
    fn test_create() {
        let mut store = Store::new();
        let ctx = Context::default();

        let np = store
            .create(&ctx, &Strategy::new(), make_network_policy(true, true, false))
            .unwrap();
        assert_eq!(np.metadata.generation, Some(1));
        assert_eq!(np.metadata.resource_version.as_deref(), Some("1"));
        assert_eq!(store.get(&key()), Some(&np));

        let err = store
            .create(&ctx, &Strategy::new(), make_network_policy(true, true, false))
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }), "{err}");
        assert_eq!(err.to_status().code, Some(409));
    }

    #[test]
    fn test_create_invalid_is_not_stored() {
        let mut store = Store::<NetworkPolicy>::new();

        let mut np = make_network_policy(true, false, false);
        np.spec.ingress[0].ports[0].end_port = Some(1);

        let err = store
            .create(&Context::default(), &Strategy::new(), np)
            .unwrap_err();
        let Error::Invalid { errors, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(errors[0].path.as_str(), "spec.ingress[0].ports[0].endPort");
        assert_eq!(err.to_status().code, Some(422));
        assert!(store.is_empty());
    }

    #[test]
    fn test_namespace_from_request() {
        let mut store = Store::new();
        let ctx = Context::namespaced("bar");

        let mut np = make_network_policy(false, false, false);
        np.metadata.namespace = None;
        let np = store.create(&ctx, &Strategy::new(), np).unwrap();
        assert_eq!(np.metadata.namespace.as_deref(), Some("bar"));

        let mut other = make_network_policy(false, false, false);
        other.metadata.namespace = Some("baz".into());
        let err = store.create(&ctx, &Strategy::new(), other).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)), "{err}");
    }

    #[test]
    fn test_update() {
        let mut store = Store::new();
        let ctx = Context::default();
        let strategy = Strategy::new();

        let created = store
            .create(&ctx, &strategy, make_network_policy(true, false, false))
            .unwrap();

        // no change: same version, same generation
        let same = store.update(&ctx, &strategy, created.clone()).unwrap();
        assert_eq!(same, created);

        // spec change
        let mut new = make_network_policy(true, false, true);
        new.metadata.resource_version = created.metadata.resource_version.clone();
        let updated = store.update(&ctx, &strategy, new).unwrap();
        assert_eq!(updated.metadata.generation, Some(2));
        assert_eq!(updated.metadata.resource_version.as_deref(), Some("2"));

        // stale version
        let err = store.update(&ctx, &strategy, created).unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }), "{err}");
        assert_eq!(store.get(&key()), Some(&updated));
    }

    #[test]
    fn test_update_missing() {
        let mut store = Store::new();
        let err = store
            .update(
                &Context::default(),
                &Strategy::new(),
                make_network_policy(true, false, false),
            )
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }), "{err}");
        assert_eq!(err.to_status().code, Some(404));
        assert!(store.is_empty());
    }

    #[test]
    fn test_status_toggle() {
        let mut store = Store::new();
        let ctx = Context::default();
        let gates = Arc::new(FeatureGates::new());
        let strategy = Strategy::new();
        let status_strategy = StatusStrategy::new(strategy.clone(), gates.clone());

        let created = store
            .create(&ctx, &strategy, make_network_policy(true, false, false))
            .unwrap();

        let c1 = NetworkPolicyStatus {
            conditions: vec![accepted(ConditionStatus::True)],
        };
        let with_status = |status: &NetworkPolicyStatus| {
            let mut np = created.clone();
            np.metadata.resource_version = None;
            np.status = status.clone();
            np
        };

        // disabled by default: dropped
        let np = store.update(&ctx, &status_strategy, with_status(&c1)).unwrap();
        assert!(np.status.is_empty());

        gates.set(NETWORK_POLICY_STATUS, true).unwrap();
        let np = store.update(&ctx, &status_strategy, with_status(&c1)).unwrap();
        assert_eq!(np.status, c1);
        assert_eq!(np.metadata.generation, Some(1));

        gates.set(NETWORK_POLICY_STATUS, false).unwrap();
        let np = store
            .update(&ctx, &status_strategy, with_status(&NetworkPolicyStatus::default()))
            .unwrap();
        assert_eq!(np.status, c1);

        // spec updates keep the frozen status
        let mut new = make_network_policy(true, true, false);
        new.metadata.resource_version = None;
        let np = store.update(&ctx, &strategy, new).unwrap();
        assert_eq!(np.status, c1);
        assert_eq!(np.metadata.generation, Some(2));
    }
}
