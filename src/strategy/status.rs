use log::debug;
use std::sync::Arc;

use super::{RestStrategy, Strategy, object_name, reset_object_meta_for_status};
use crate::Context;
use crate::api::NetworkPolicy;
use crate::features::{FeatureGate, NETWORK_POLICY_STATUS};
use crate::field::FieldErrors;
use crate::validation;

/// Strategy of the `status` subresource.
///
/// The spec and metadata of the stored object always win over the ones sent by the client,
/// apart from the name and namespace, which are checked for immutability. The status sent
/// by the client is taken only while the `NetworkPolicyStatus` feature is enabled; while it is
/// disabled the stored status is kept as is, so toggling the feature never loses data.
#[derive(Clone)]
pub struct StatusStrategy {
    strategy: Strategy,
    gates: Arc<dyn FeatureGate>,
}

impl StatusStrategy {
    pub fn new(strategy: Strategy, gates: Arc<dyn FeatureGate>) -> Self {
        Self { strategy, gates }
    }

    fn status_enabled(&self) -> bool {
        self.gates.enabled(NETWORK_POLICY_STATUS)
    }
}

impl RestStrategy for StatusStrategy {
    type Object = NetworkPolicy;

    fn namespace_scoped(&self) -> bool {
        self.strategy.namespace_scoped()
    }

    fn allow_create_on_update(&self) -> bool {
        false
    }

    fn prepare_for_create(&self, ctx: &Context, np: &mut NetworkPolicy) {
        self.strategy.prepare_for_create(ctx, np)
    }

    fn prepare_for_update(&self, _ctx: &Context, new: &mut NetworkPolicy, old: &NetworkPolicy) {
        new.spec = old.spec.clone();
        reset_object_meta_for_status(&mut new.metadata, &old.metadata);

        if !self.status_enabled() {
            if new.status != old.status {
                debug!(
                    "{}: {NETWORK_POLICY_STATUS} disabled, status change dropped",
                    object_name(&old.metadata)
                );
            }
            new.status = old.status.clone();
        }
    }

    fn validate(&self, _ctx: &Context, _np: &NetworkPolicy) -> FieldErrors {
        FieldErrors::new()
    }

    fn validate_update(
        &self,
        _ctx: &Context,
        new: &NetworkPolicy,
        old: &NetworkPolicy,
    ) -> FieldErrors {
        // a status change that got through prepare is validated even if the gate was disabled since
        if !self.status_enabled() && new.status == old.status {
            return FieldErrors::new();
        }
        validation::validate_network_policy_status_update(new, old)
    }
}
