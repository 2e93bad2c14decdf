pub mod api;
pub mod features;
pub mod field;
pub mod memstore;
pub mod replay;
pub mod strategy;
pub mod validation;

#[cfg(test)]
mod testing;

pub use features::{FeatureGate, FeatureGates};
pub use strategy::{RestStrategy, StatusStrategy, Strategy};

/// Context of the request a strategy is called for.
///
/// Strategies never block on it: cancelling a request happens before or after a strategy
/// call, not during one.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// namespace targeted by the request, if any.
    pub namespace: Option<String>,
}

impl Context {
    pub fn namespaced(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
        }
    }
}
