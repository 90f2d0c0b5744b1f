use std::fmt;

use crate::registry::VarHandle;
use crate::value::ValueClass;

pub type VarResult<T> = Result<T, VarError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VarError {
    /// Binding `formula` to `variable` would make it depend on itself.
    ///
    /// `path` lists the variable names from the formula's direct reference back to `variable`.
    #[error(
        "can't set variable {variable} to {formula} because it would create a circular dependency ({})",
        path.join(" -> ")
    )]
    CircularDependency {
        variable: String,
        formula: String,
        path: Vec<String>,
    },

    #[error("duplicate variable name: {0}")]
    DuplicateName(String),

    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    #[error("stale variable handle {0}")]
    StaleHandle(VarHandle),

    /// The handle is live but its slot holds a non-variable entry (e.g. a tree).
    #[error("{0} does not denote a variable")]
    NotAVariable(String),

    #[error("registry has no free variable slots")]
    RegistryFull,

    #[error("registry cannot be restructured while an evaluation is in progress")]
    RegistryBusy,

    #[error("type mismatch: expected {expected}, got {actual}")]
    Type {
        expected: ValueClass,
        actual: ValueClass,
    },

    #[error("matrix shape mismatch: {rows}x{cols} needs {expected} values, got {actual}")]
    MatrixShape {
        rows: usize,
        cols: usize,
        expected: usize,
        actual: usize,
    },
}

/// A non-fatal condition reported while evaluating or rebinding variables.
///
/// Warnings never abort the operation that produced them. Each one is logged through
/// [`log::warn!`] and retained by the registry until drained with
/// [`Registry::take_warnings`](crate::Registry::take_warnings).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A variable was read before it was ever assigned.
    Uninitialized { variable: String },
    /// A container kept a variable dependent because its template variable is not independent.
    ContainerRefusedIndependence { variable: String, container: String },
    /// A container kept a variable independent because its template variable is bound by
    /// another relation.
    ContainerRefusedDependence { variable: String, container: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::Uninitialized { variable } => {
                write!(f, "variable '{variable}' was not initialized prior to being used")
            }
            Warning::ContainerRefusedIndependence {
                variable,
                container,
            } => write!(
                f,
                "can't make variable {variable} independent in the context of {container} \
                 because its template variable is not independent"
            ),
            Warning::ContainerRefusedDependence {
                variable,
                container,
            } => write!(
                f,
                "can't make variable {variable} dependent in the context of {container} \
                 because its template variable is bound by another relation in the global context"
            ),
        }
    }
}
