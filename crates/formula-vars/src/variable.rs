use std::sync::Arc;

use crate::bounds::Bounds;
use crate::flags::VarFlags;
use crate::formula::Formula;
use crate::registry::VarHandle;
use crate::value::{Value, ValueClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VariableKind {
    #[default]
    Plain,
    /// Excluded from change detection when categories are ignored.
    Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    #[default]
    Local,
    Global,
}

/// A named quantity that either holds an authoritative value (independent) or derives one from
/// a formula (dependent).
///
/// Variables live inside a [`Registry`](crate::Registry). Operations that only touch the variable
/// itself are methods here; anything that evaluates formulas or notifies other objects goes
/// through the registry.
#[derive(Debug, Clone)]
pub struct Variable {
    pub(crate) handle: VarHandle,
    pub(crate) name: Arc<str>,
    pub(crate) kind: VariableKind,
    pub(crate) scope: Scope,
    pub(crate) value: Option<Value>,
    pub(crate) numeric_value: f64,
    pub(crate) bounds: Bounds,
    pub(crate) formula: Option<Box<dyn Formula>>,
    pub(crate) flags: VarFlags,
}

impl Variable {
    pub(crate) fn new(
        handle: VarHandle,
        name: Arc<str>,
        kind: VariableKind,
        scope: Scope,
        bounds: Bounds,
    ) -> Self {
        Self {
            handle,
            name,
            kind,
            scope,
            value: None,
            numeric_value: 0.0,
            bounds,
            formula: None,
            flags: VarFlags::NOT_SET,
        }
    }

    pub fn handle(&self) -> VarHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn is_global(&self) -> bool {
        self.scope == Scope::Global
    }

    pub fn is_category(&self) -> bool {
        self.kind == VariableKind::Category
    }

    pub fn is_independent(&self) -> bool {
        self.formula.is_none()
    }

    pub fn is_dependent(&self) -> bool {
        self.formula.is_some()
    }

    pub fn formula(&self) -> Option<&dyn Formula> {
        self.formula.as_deref()
    }

    /// Whether the variable can never change without being reassigned.
    pub fn is_constant(&self) -> bool {
        match (&self.formula, &self.value) {
            (Some(formula), _) => formula.is_constant(),
            (None, Some(value)) => !value.is_variable_like() && value.class() != ValueClass::Number,
            (None, None) => false,
        }
    }

    /// The materialized value, if one is cached.
    pub fn cached_value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn numeric_value(&self) -> f64 {
        self.numeric_value
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn flags(&self) -> VarFlags {
        self.flags
    }

    pub fn is_initialized(&self) -> bool {
        !self.flags.contains(VarFlags::NOT_SET)
    }

    /// The class `compute` will produce for an independent variable.
    pub(crate) fn independent_class(&self) -> ValueClass {
        self.value
            .as_ref()
            .map_or(ValueClass::Number, Value::class)
    }

    pub(crate) fn mark_assigned(&mut self) {
        self.flags.remove(VarFlags::NOT_SET);
        self.flags.insert(VarFlags::CHANGED);
    }

    /// Replace the domain. The current value is not re-clamped.
    pub fn set_bounds(&mut self, lower: f64, upper: f64) {
        self.bounds = Bounds::new(lower, upper);
    }

    /// Assign a number without touching the formula or notifying anyone.
    ///
    /// Meant for variables already known to be independent, e.g. inside an optimizer loop.
    pub fn set_numeric_value(&mut self, value: f64) {
        self.mark_assigned();
        self.numeric_value = self.bounds.clamp(value);
        self.value = None;
    }

    /// Assign a number validated against the domain inset by
    /// [`CHECKED_EPSILON`](crate::bounds::CHECKED_EPSILON).
    ///
    /// Out-of-domain values are discarded when `out_of_bounds_is_noop` is set and clamped to the
    /// inset edge otherwise. Returns whether an assignment happened.
    pub fn check_and_set(&mut self, value: f64, out_of_bounds_is_noop: bool) -> bool {
        let value = match self.bounds.check(value) {
            Ok(value) => value,
            Err(_) if out_of_bounds_is_noop => return false,
            Err(edge) => edge,
        };
        self.mark_assigned();
        self.numeric_value = value;
        self.value = Some(Value::Number(value));
        true
    }

    /// Clear the pass-scoped bits. Runs once per pass after every consumer read its changes.
    pub fn post_mark_changed(&mut self) {
        self.flags.remove(VarFlags::PASS);
    }

    /// Acknowledge the change of an independent variable.
    ///
    /// Variables whose value is another variable leave acknowledgement to that variable.
    pub fn mark_done(&mut self) {
        if self.formula.is_none()
            && self.flags.contains(VarFlags::CHANGED)
            && !self.value.as_ref().is_some_and(Value::is_variable_like)
        {
            self.flags.remove(VarFlags::CHANGED);
        }
    }
}
