//! Create/update strategies for network policies.
//!
//! Two strategies share the [`RestStrategy`] interface: [`Strategy`] for the main resource and
//! [`StatusStrategy`] for its `status` subresource. A request framework dispatches to one or the
//! other depending on the path it was called on, calls `prepare_*` to compute the object to
//! store, then `validate*`, and persists only when validation returned no error.

mod status;


pub use status::StatusStrategy;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use log::debug;

use crate::Context;
use crate::api::{NetworkPolicy, NetworkPolicyStatus};
use crate::field::FieldErrors;
use crate::validation;

pub trait RestStrategy: Send + Sync {
    type Object;

    /// true when objects live in a namespace.
    fn namespace_scoped(&self) -> bool;
    /// true when an update of a missing object may create it.
    fn allow_create_on_update(&self) -> bool;

    fn prepare_for_create(&self, ctx: &Context, obj: &mut Self::Object);
    fn prepare_for_update(&self, ctx: &Context, new: &mut Self::Object, old: &Self::Object);

    fn validate(&self, ctx: &Context, obj: &Self::Object) -> FieldErrors;
    fn validate_update(
        &self,
        ctx: &Context,
        new: &Self::Object,
        old: &Self::Object,
    ) -> FieldErrors;
}

/// Strategy of the main resource: spec and metadata. Status is never written through it.
#[derive(Debug, Clone, Default)]
pub struct Strategy {}

impl Strategy {
    pub fn new() -> Self {
        Self {}
    }
}

impl RestStrategy for Strategy {
    type Object = NetworkPolicy;

    fn namespace_scoped(&self) -> bool {
        true
    }

    fn allow_create_on_update(&self) -> bool {
        false
    }

    fn prepare_for_create(&self, _ctx: &Context, np: &mut NetworkPolicy) {
        np.metadata.generation = Some(1);
        // status is owned by the status subresource
        np.status = NetworkPolicyStatus::default();
    }

    fn prepare_for_update(&self, _ctx: &Context, new: &mut NetworkPolicy, old: &NetworkPolicy) {
        new.status = old.status.clone();

        let generation = old.metadata.generation.unwrap_or_default();
        if new.spec.is_equivalent(&old.spec) {
            new.metadata.generation = Some(generation);
        } else {
            debug!(
                "{}: spec changed, generation {generation} -> {}",
                object_name(&old.metadata),
                generation.saturating_add(1)
            );
            new.metadata.generation = Some(generation.saturating_add(1));
        }
    }

    fn validate(&self, _ctx: &Context, np: &NetworkPolicy) -> FieldErrors {
        validation::validate_network_policy(np)
    }

    fn validate_update(
        &self,
        _ctx: &Context,
        new: &NetworkPolicy,
        old: &NetworkPolicy,
    ) -> FieldErrors {
        validation::validate_network_policy_update(new, old)
    }
}

/// Restores the metadata fields a status update may not change.
fn reset_object_meta_for_status(meta: &mut ObjectMeta, old: &ObjectMeta) {
    meta.generation = old.generation;
    meta.deletion_timestamp = old.deletion_timestamp.clone();
    meta.labels = old.labels.clone();
    meta.annotations = old.annotations.clone();
    meta.finalizers = old.finalizers.clone();
    meta.owner_references = old.owner_references.clone();
    meta.managed_fields = old.managed_fields.clone();
}

fn object_name(meta: &ObjectMeta) -> String {
    format!(
        "{}/{}",
        meta.namespace.as_deref().unwrap_or_default(),
        meta.name.as_deref().unwrap_or_default()
    )
}
