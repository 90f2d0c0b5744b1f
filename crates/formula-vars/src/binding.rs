use std::collections::BTreeSet;

use crate::context::{DeferredBinding, EvalContext};
use crate::error::{VarError, VarResult};
use crate::flags::VarFlags;
use crate::formula::Formula;
use crate::registry::{Registry, VarHandle};

impl Registry {
    /// Bind `formula` to `handle`, making the variable dependent.
    ///
    /// - A constant formula is evaluated right away and assigned as a plain value.
    /// - A formula that reaches `handle` (directly or through other dependent variables) is
    ///   rejected with [`VarError::CircularDependency`]; the variable is left untouched.
    /// - Otherwise a private copy of `formula`, with constants folded, replaces whatever the
    ///   variable held. If the variable was independent, containers and model consumers are
    ///   notified, or the notification is queued when `ctx` is deferring.
    pub fn set_formula(
        &mut self,
        ctx: &mut EvalContext,
        handle: VarHandle,
        formula: &dyn Formula,
    ) -> VarResult<()> {
        self.try_variable(handle)?;

        if formula.is_constant() {
            self.traversal_depth += 1;
            let result = formula.compute(self, ctx);
            self.traversal_depth -= 1;
            return self.set_value(handle, result?);
        }

        let mut references = BTreeSet::new();
        formula.scan_variables(self, true, &mut references);
        if let Some(path) = self.dependency_path(references, handle) {
            return Err(VarError::CircularDependency {
                variable: self.display_name(handle),
                formula: formula.to_display_string(self),
                path: path.into_iter().map(|h| self.display_name(h)).collect(),
            });
        }

        let mut installed = formula.box_clone();
        installed.simplify_constants();
        let is_constant = installed.is_constant();

        let var = self.try_variable_mut(handle)?;
        let was_independent = var.is_independent();
        var.flags.remove(VarFlags::NOT_SET | VarFlags::CHANGED);
        var.value = None;
        var.formula = Some(installed);

        if was_independent {
            let binding = DeferredBinding {
                handle,
                is_constant,
            };
            if !ctx.record_binding(binding) {
                self.notify_now_dependent(binding);
            }
        }
        Ok(())
    }

    /// Insert a new variable bound to `formula`.
    ///
    /// If binding fails the variable is removed again and the error returned.
    pub fn insert_formula(
        &mut self,
        ctx: &mut EvalContext,
        name: &str,
        formula: &dyn Formula,
    ) -> VarResult<VarHandle> {
        let handle = self.insert_variable(name)?;
        if let Err(err) = self.set_formula(ctx, handle, formula) {
            self.remove(handle)?;
            return Err(err);
        }
        Ok(handle)
    }
}
