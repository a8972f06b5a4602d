//! The capability model every evaluable node exposes to the scheduler.

use crate::{NameSet, Pos, ResourceDef, Result, Scope};
use async_trait::async_trait;
use std::sync::Arc;

/// Capability set declared by a node when it is constructed.
///
/// Node implementations compute this once and hand out references, so the
/// scheduler never has to probe a node's concrete variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Names read (builtins and positional arguments already excluded)
    pub used: NameSet,
    /// Names bound in the current scope when evaluated
    pub written: NameSet,
    /// Names reassigned in an enclosing scope
    pub reassigned: NameSet,
    /// Effectful resources; empty means pure
    pub resources: Vec<ResourceDef>,
}

impl Capabilities {
    /// A node that reads, writes and touches nothing.
    pub fn pure() -> Self {
        Self::default()
    }

    /// Combine the capabilities of nodes evaluated in order in one scope.
    ///
    /// Reads satisfied by an earlier node's write are not exposed; writes,
    /// reassignments and resources accumulate. A reassignment always escapes:
    /// it also updates any enclosing binding of the name, even when an earlier
    /// node shadowed it locally.
    pub fn sequence<'a>(items: impl IntoIterator<Item = &'a Capabilities>) -> Self {
        let mut caps = Self::default();
        for item in items {
            caps.used.extend(item.used.iter().filter(|n| !caps.written.contains(*n)).cloned());
            caps.reassigned.extend(item.reassigned.iter().cloned());
            caps.written.extend(item.written.iter().cloned());
            caps.resources.extend(item.resources.iter().cloned());
        }
        caps
    }

    /// The same capabilities as seen from outside a child scope: nothing is
    /// written outward.
    pub fn scoped(mut self) -> Self {
        self.written.clear();
        self
    }
}

/// An evaluable node.
///
/// The scheduler only relies on this capability set: what a node reads, what
/// it writes, which effects it declares, and how to evaluate it.
#[async_trait]
pub trait Evaler: std::fmt::Debug + std::fmt::Display + Send + Sync + Sized + 'static {
    /// Names this node reads.
    fn used_names(&self) -> &NameSet;

    /// Names this node binds in the current scope.
    fn written_names(&self) -> &NameSet;

    /// Names this node reassigns in an enclosing scope.
    fn reassigned_names(&self) -> &NameSet;

    /// Effectful resources this node declares.
    fn declared_resources(&self) -> &[ResourceDef];

    /// Source position for diagnostics.
    fn pos(&self) -> Pos;

    /// Whether the node declares no effectful resources.
    fn is_pure(&self) -> bool {
        self.declared_resources().is_empty()
    }

    /// Evaluate against a scope, returning the replacement node.
    async fn evaluate(&self, scope: &Arc<Scope>) -> Result<Self>;
}
