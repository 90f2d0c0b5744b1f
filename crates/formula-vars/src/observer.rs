//! Capability interfaces notified when a variable switches between independent and dependent.

use crate::registry::VarHandle;

/// Outcome of asking a container to treat a variable as dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependanceUpdate {
    /// The container tracked the variable and now treats it as dependent.
    Updated,
    /// The container does not reference the variable.
    Unaffected,
    /// The container's template variable is bound by another relation; nothing changed.
    Refused,
}

/// A nested scope that may hold its own view of which variables are independent.
pub trait VariableContainer {
    fn name(&self) -> &str;

    /// Stop treating `handle` as dependent. Returning `false` refuses the change.
    fn remove_dependance(&mut self, handle: VarHandle) -> bool;

    fn set_dependance(&mut self, handle: VarHandle) -> DependanceUpdate;
}

/// An object (e.g. a likelihood function) that caches per-variable bookkeeping which depends on
/// whether a variable is independent.
pub trait ModelConsumer {
    /// `handle` lost its formula and is independent now.
    fn update_dependent(&mut self, handle: VarHandle);

    /// `handle` gained a formula and is dependent now.
    ///
    /// `is_constant` is only set when the installed formula lost all its references while
    /// folding constants.
    fn update_independent(&mut self, handle: VarHandle, is_constant: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(pub(crate) u32);
