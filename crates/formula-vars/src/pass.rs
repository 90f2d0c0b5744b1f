//! Two-phase change tracking for an evaluation pass.
//!
//! A pass is bracketed by the caller:
//!
//! 1. [`Registry::pre_mark_all`] caches, for every dependent variable, whether it changed (with
//!    and without category variables).
//! 2. Any number of [`Registry::compute`] / [`Registry::has_changed`] calls read those cached
//!    answers instead of walking formulas again.
//! 3. [`Registry::post_mark_all`] forgets the pass, and [`Registry::mark_all_done`]
//!    acknowledges the changes of independent variables.
//!
//! Skipping the bracket is still correct, just unmemoized.

use crate::context::EvalContext;
use crate::flags::VarFlags;
use crate::registry::{Entry, Registry, VarHandle};
use crate::value::Value;

impl Registry {
    /// Whether `handle` changed since its consumers last looked.
    ///
    /// With `ignore_categories`, changes that only stem from category variables are not
    /// reported. Handles that no longer resolve report a change so dependents re-derive and
    /// surface the error.
    pub fn has_changed(&self, ctx: &EvalContext, handle: VarHandle, ignore_categories: bool) -> bool {
        let var = match self.entry(handle) {
            Some(Entry::Variable(var)) => var,
            Some(Entry::Tree(_)) => return false,
            None => return true,
        };

        if let Some(formula) = var.formula() {
            if ctx.pass_caching() && var.flags.contains(VarFlags::COMPUTED) {
                return false;
            }
            if var.flags.contains(VarFlags::INSPECTED) {
                let bit = if ignore_categories {
                    VarFlags::MODIFIED_CATS
                } else {
                    VarFlags::MODIFIED
                };
                return var.flags.contains(bit);
            }
            return formula.has_changed(self, ctx, ignore_categories);
        }

        if let Some(Value::Reference(target)) = var.value {
            return self.has_changed(ctx, target, ignore_categories);
        }
        if ignore_categories && var.is_category() {
            return false;
        }
        var.flags.contains(VarFlags::CHANGED)
    }

    /// Cache the change status of a dependent variable for the current pass.
    pub fn pre_mark_changed(&mut self, ctx: &EvalContext, handle: VarHandle) {
        match self.variable_mut(handle) {
            Some(var) if var.is_dependent() => {
                var.flags
                    .remove(VarFlags::INSPECTED | VarFlags::MODIFIED | VarFlags::MODIFIED_CATS);
            }
            _ => return,
        }

        let modified = self.has_changed(ctx, handle, false);
        let modified_cats = self.has_changed(ctx, handle, true);

        if let Some(var) = self.variable_mut(handle) {
            var.flags.set(VarFlags::MODIFIED, modified);
            var.flags.set(VarFlags::MODIFIED_CATS, modified_cats);
            var.flags.insert(VarFlags::INSPECTED);
        }
    }

    pub fn post_mark_changed(&mut self, handle: VarHandle) {
        if let Some(var) = self.variable_mut(handle) {
            var.post_mark_changed();
        }
    }

    pub fn mark_done(&mut self, handle: VarHandle) {
        if let Some(var) = self.variable_mut(handle) {
            var.mark_done();
        }
    }

    /// Pre-mark every variable, in registry order.
    pub fn pre_mark_all(&mut self, ctx: &EvalContext) {
        let handles: Vec<VarHandle> = self.handles().collect();
        for handle in handles {
            self.pre_mark_changed(ctx, handle);
        }
    }

    pub fn post_mark_all(&mut self) {
        for var in self.variables_mut() {
            var.post_mark_changed();
        }
    }

    pub fn mark_all_done(&mut self) {
        for var in self.variables_mut() {
            var.mark_done();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use crate::variable::{Scope, VariableKind};

    #[test]
    fn independent_change_flag_until_marked_done() {
        let mut reg = Registry::new();
        let ctx = EvalContext::new();
        let a = reg.insert_value("a", 1.0).unwrap();
        assert!(reg.has_changed(&ctx, a, false));
        reg.mark_done(a);
        assert!(!reg.has_changed(&ctx, a, false));
    }

    #[test]
    fn category_changes_hidden_when_ignoring_categories() {
        let mut reg = Registry::new();
        let mut ctx = EvalContext::new();
        let c = reg
            .insert_variable_with("c", VariableKind::Category, Scope::Local)
            .unwrap();
        reg.set_value(c, Value::Number(1.0)).unwrap();
        let d = reg.insert_formula(&mut ctx, "d", &(Expr::var(c) + Expr::number(1.0))).unwrap();

        assert!(reg.has_changed(&ctx, c, false));
        assert!(!reg.has_changed(&ctx, c, true));

        reg.pre_mark_changed(&ctx, d);
        let flags = reg.variable(d).unwrap().flags();
        assert!(flags.contains(VarFlags::INSPECTED | VarFlags::MODIFIED));
        assert!(!flags.contains(VarFlags::MODIFIED_CATS));
        assert!(reg.has_changed(&ctx, d, false));
        assert!(!reg.has_changed(&ctx, d, true));
    }

    #[test]
    fn pre_mark_ignores_independent_variables() {
        let mut reg = Registry::new();
        let ctx = EvalContext::new();
        let a = reg.insert_value("a", 1.0).unwrap();
        reg.pre_mark_changed(&ctx, a);
        assert!(!reg.variable(a).unwrap().flags().contains(VarFlags::INSPECTED));
    }

    #[test]
    fn post_mark_forgets_cached_status() {
        let mut reg = Registry::new();
        let mut ctx = EvalContext::new();
        let a = reg.insert_value("a", 1.0).unwrap();
        let b = reg.insert_formula(&mut ctx, "b", &(Expr::var(a) * Expr::number(2.0))).unwrap();

        reg.pre_mark_all(&ctx);
        reg.mark_all_done();
        // Still answered from the pre-mark.
        assert!(reg.has_changed(&ctx, b, false));

        reg.post_mark_all();
        assert!(!reg.has_changed(&ctx, b, false));
    }
}
