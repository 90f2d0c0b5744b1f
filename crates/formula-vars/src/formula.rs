use std::collections::BTreeSet;
use std::fmt;

use crate::context::EvalContext;
use crate::error::VarResult;
use crate::registry::{Registry, VarHandle};
use crate::value::Value;

/// An expression over variables that a dependent variable derives its value from.
///
/// A dependent variable owns a private copy of its formula (see [`Formula::box_clone`]). The
/// engine never looks inside a formula; everything it needs goes through this trait.
pub trait Formula: fmt::Debug {
    /// Evaluate the formula, computing referenced variables through `vars`.
    fn compute(&self, vars: &mut Registry, ctx: &EvalContext) -> VarResult<Value>;

    /// Whether any referenced variable changed since the formula was last evaluated.
    ///
    /// With `ignore_categories`, changes of category variables are not reported.
    fn has_changed(&self, vars: &Registry, ctx: &EvalContext, ignore_categories: bool) -> bool;

    /// Whether the formula references no variables at all.
    fn is_constant(&self) -> bool;

    /// Add the handles of all directly referenced variables to `out`.
    ///
    /// Category variables are skipped unless `include_categories` is set.
    fn scan_variables(
        &self,
        vars: &Registry,
        include_categories: bool,
        out: &mut BTreeSet<VarHandle>,
    );

    /// Fold variable-free subexpressions into literals.
    fn simplify_constants(&mut self);

    fn box_clone(&self) -> Box<dyn Formula>;

    fn to_display_string(&self, vars: &Registry) -> String;

    /// Whether evaluating the formula reads `target`.
    ///
    /// With `transitive`, references through the formulas of dependent variables count too.
    fn references_variable(&self, vars: &Registry, target: VarHandle, transitive: bool) -> bool {
        let mut direct = BTreeSet::new();
        self.scan_variables(vars, true, &mut direct);
        if direct.contains(&target) {
            return true;
        }
        transitive && vars.dependency_path(direct, target).is_some()
    }
}

impl Clone for Box<dyn Formula> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}
