//! Memory accounting scopes for bulk materialisations.
//!
//! Every site that materialises a whole message (spilling a large
//! serialisation to a temporary file, reassembling a remote payload) wraps
//! the work in a scope obtained from the environment's factory. The scope
//! receives the anticipated byte count up front and releases on drop. The
//! default scope is a no-op; embedders may enforce quotas by installing
//! their own factory.

use std::sync::Arc;

/// A scoped accounting region. Dropping the scope releases the reservation.
pub trait MemScope: Send {}

/// The default scope: accounts for nothing.
pub struct NoopScope;

impl MemScope for NoopScope {}

/// Factory producing a scope for an anticipated byte count.
pub type ScopeFactory = Arc<dyn Fn(usize) -> Box<dyn MemScope> + Send + Sync>;

#[must_use]
pub fn noop_factory() -> ScopeFactory {
    Arc::new(|_len| Box::new(NoopScope))
}
