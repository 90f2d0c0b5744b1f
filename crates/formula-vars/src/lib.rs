#![forbid(unsafe_code)]
#![deny(unreachable_patterns)]

//! Named variables whose values are either assigned directly (independent) or derived from a
//! formula over other variables (dependent).
//!
//! Dependent values are computed lazily and memoized until a referenced variable changes. All
//! variables live in a [`Registry`] and are addressed by generational [`VarHandle`]s, so a
//! removed variable can never be confused with whatever later reuses its slot.
//!
//! ## Binding formulas
//!
//! [`Registry::set_formula`] binds any [`Formula`] implementation (the bundled [`Expr`] tree
//! covers plain arithmetic). Bindings that would make a variable depend on itself are rejected
//! with [`VarError::CircularDependency`] before anything changes.
//!
//! ## Observers
//!
//! Hosts that keep their own view of which variables are free register a
//! [`VariableContainer`] (which may refuse a status change) or a [`ModelConsumer`] (which is
//! only told). Refusals never fail the assignment; they surface as [`Warning`]s.
//!
//! ## Evaluation passes
//!
//! With [`EvalContext::pass_caching`] enabled, every dependent variable is evaluated at most once
//! between [`Registry::pre_mark_all`] and [`Registry::post_mark_all`]. Change flags on
//! independent variables are acknowledged with [`Registry::mark_all_done`].

pub mod bounds;
pub mod context;
pub mod error;
pub mod expr;
pub mod flags;
pub mod formula;
pub mod observer;
pub mod registry;
pub mod settings;
pub mod value;
pub mod variable;

mod binding;
mod compute;
mod pass;
mod propagate;

pub use bounds::{
    Bounds, CHECKED_EPSILON, CLAMP_EPSILON, DEFAULT_LOWER_BOUND, DEFAULT_UPPER_BOUND,
};
pub use context::{DeferredBinding, EvalContext};
pub use error::{VarError, VarResult, Warning};
pub use expr::{BinaryOp, Expr, UnaryOp};
pub use flags::VarFlags;
pub use formula::Formula;
pub use observer::{ConsumerId, ContainerId, DependanceUpdate, ModelConsumer, VariableContainer};
pub use registry::{Entry, Registry, Tree, VarHandle};
pub use settings::EvalSettings;
pub use value::{Matrix, TreeValue, Value, ValueClass};
pub use variable::{Scope, Variable, VariableKind};
