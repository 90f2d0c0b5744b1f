//! Value access and assignment: lazily materialized independent values, memoized dependent
//! values, and the numeric bound rules applied on every assignment path.

use std::sync::Arc;

use crate::context::EvalContext;
use crate::error::{VarError, VarResult, Warning};
use crate::flags::VarFlags;
use crate::registry::{Entry, Registry, Tree, VarHandle};
use crate::value::{TreeValue, Value, ValueClass};
use crate::variable::{Variable, VariableKind};

impl Registry {
    /// Compute the current value of `handle`.
    ///
    /// Independent variables return their cached value, materializing it from the numeric value
    /// on first read. Dependent variables re-evaluate their formula only when it reports a
    /// change (or nothing is cached yet); with pass caching enabled they evaluate at most once
    /// per pass. Inputs assigned after the pre-mark of a caching pass are seen by the next pass.
    pub fn compute(&mut self, ctx: &EvalContext, handle: VarHandle) -> VarResult<Value> {
        let dependent = match self.entry(handle) {
            Some(Entry::Tree(tree)) => return Ok(Value::Tree(Arc::clone(tree.value()))),
            Some(Entry::Variable(var)) => var.is_dependent(),
            None => return Err(VarError::StaleHandle(handle)),
        };
        if dependent {
            self.compute_dependent(ctx, handle)
        } else {
            self.compute_independent(ctx, handle)
        }
    }

    fn compute_independent(&mut self, ctx: &EvalContext, handle: VarHandle) -> VarResult<Value> {
        let var = self.try_variable_mut(handle)?;
        if let Some(Value::Reference(target)) = var.value {
            return self.compute(ctx, target);
        }
        if let Some(value) = &var.value {
            return Ok(value.clone());
        }

        let value = Value::Number(var.numeric_value);
        var.value = Some(value.clone());
        if !var.is_initialized() {
            let variable = var.name().to_string();
            self.warn(Warning::Uninitialized { variable });
        }
        Ok(value)
    }

    fn compute_dependent(&mut self, ctx: &EvalContext, handle: VarHandle) -> VarResult<Value> {
        let var = self.try_variable(handle)?;
        if ctx.pass_caching() && var.flags.contains(VarFlags::COMPUTED) {
            if let Some(value) = &var.value {
                return Ok(value.clone());
            }
        }

        // In a caching pass the pre-marked answer stands; otherwise the formula is asked again.
        let cached = match &var.value {
            None => None,
            Some(value) if ctx.pass_caching() && var.flags.contains(VarFlags::INSPECTED) => {
                (!var.flags.contains(VarFlags::MODIFIED)).then(|| value.clone())
            }
            Some(value) => match var.formula.as_deref() {
                Some(formula) if !formula.has_changed(self, ctx, false) => Some(value.clone()),
                _ => None,
            },
        };

        let value = match cached {
            Some(value) => value,
            None => self.rederive(ctx, handle)?,
        };

        if ctx.pass_caching() {
            self.try_variable_mut(handle)?.flags.insert(VarFlags::COMPUTED);
        }
        Ok(value)
    }

    /// Evaluate the formula of `handle` and replace its cached value with the result.
    fn rederive(&mut self, ctx: &EvalContext, handle: VarHandle) -> VarResult<Value> {
        let var = self.try_variable_mut(handle)?;
        var.value = None;
        let Some(formula) = var.formula.take() else {
            return Err(VarError::NotAVariable(var.name().to_string()));
        };

        self.traversal_depth += 1;
        let result = formula.compute(self, ctx);
        self.traversal_depth -= 1;

        let var = self.try_variable_mut(handle)?;
        var.formula = Some(formula);
        let value = result?;
        log::trace!("recomputed {} = {value}", var.name());
        var.value = Some(value.clone());
        Ok(value)
    }

    /// Assign `value` to `handle`.
    ///
    /// A number turns a dependent variable independent: containers are asked to drop the
    /// dependence and model consumers are told, then the number is clamped into the bounds. A
    /// tree retires the variable and leaves a [`Tree`] under the same handle and name. Any other
    /// value replaces the formula (without notification) and becomes the cached value.
    pub fn set_value(&mut self, handle: VarHandle, value: Value) -> VarResult<()> {
        let var = self.try_variable(handle)?;
        match value {
            Value::Number(number) => {
                if var.is_dependent() {
                    self.notify_now_independent(handle);
                }
                let var = self.try_variable_mut(handle)?;
                var.mark_assigned();
                var.formula = None;
                var.value = None;
                var.numeric_value = var.bounds.clamp(number);
                Ok(())
            }
            Value::Tree(tree) => self.retire_as_tree(handle, tree),
            Value::Reference(target) => {
                if !self.contains(target) {
                    return Err(VarError::StaleHandle(target));
                }
                if let Some(path) = self.dependency_path([target], handle) {
                    return Err(VarError::CircularDependency {
                        variable: var.name().to_string(),
                        formula: self.display_name(target),
                        path: path.into_iter().map(|h| self.display_name(h)).collect(),
                    });
                }
                self.store_value(handle, Value::Reference(target))
            }
            other => self.store_value(handle, other),
        }
    }

    fn store_value(&mut self, handle: VarHandle, value: Value) -> VarResult<()> {
        let var = self.try_variable_mut(handle)?;
        var.mark_assigned();
        var.formula = None;
        var.value = Some(value);
        Ok(())
    }

    fn retire_as_tree(&mut self, handle: VarHandle, tree: Arc<TreeValue>) -> VarResult<()> {
        let name = Arc::clone(&self.try_variable(handle)?.name);
        let retired = self.replace_entry(handle, Entry::Tree(Tree::new(name, tree)))?;
        log::debug!("variable {} ({handle}) replaced by a tree", retired.name());
        Ok(())
    }

    /// Assign a number without formula teardown or notification.
    pub fn set_numeric_value(&mut self, handle: VarHandle, value: f64) -> VarResult<()> {
        self.try_variable_mut(handle)?.set_numeric_value(value);
        Ok(())
    }

    /// See [`Variable::check_and_set`].
    pub fn check_and_set(
        &mut self,
        handle: VarHandle,
        value: f64,
        out_of_bounds_is_noop: bool,
    ) -> VarResult<bool> {
        Ok(self
            .try_variable_mut(handle)?
            .check_and_set(value, out_of_bounds_is_noop))
    }

    pub fn set_bounds(&mut self, handle: VarHandle, lower: f64, upper: f64) -> VarResult<()> {
        self.try_variable_mut(handle)?.set_bounds(lower, upper);
        Ok(())
    }

    /// Re-clamp the computed value of an independent numeric variable into its bounds.
    pub fn ensure_value_in_bounds(&mut self, ctx: &EvalContext, handle: VarHandle) -> VarResult<()> {
        let var = self.try_variable(handle)?;
        if var.is_dependent() || var.independent_class() != ValueClass::Number {
            return Ok(());
        }
        let bounds = var.bounds;
        let current = self.compute(ctx, handle)?.expect_number()?;
        if current < bounds.lower {
            self.set_value(handle, Value::Number(bounds.lower))?;
        } else if current > bounds.upper {
            self.set_value(handle, Value::Number(bounds.upper))?;
        }
        Ok(())
    }

    /// Drop every constraint on `handle`: its formula, its category status and its bounds.
    ///
    /// A category variable is replaced by a fresh plain variable (same handle, name and scope)
    /// holding the current value. Any other dependent variable is assigned its current value.
    pub fn clear_constraints(&mut self, ctx: &EvalContext, handle: VarHandle) -> VarResult<()> {
        let var = self.try_variable(handle)?;
        let default_bounds = self.default_bounds();

        if var.is_category() {
            let (name, scope) = (Arc::clone(&var.name), var.scope);
            let value = self.compute(ctx, handle)?;
            let fresh = Variable::new(handle, name, VariableKind::Plain, scope, default_bounds);
            self.replace_entry(handle, Entry::Variable(fresh))?;
            return self.set_value(handle, value);
        }

        if var.is_dependent() {
            let value = self.compute(ctx, handle)?;
            self.set_value(handle, value)?;
        }
        if let Some(var) = self.variable_mut(handle) {
            var.bounds = default_bounds;
        }
        Ok(())
    }

    /// Whether `handle` denotes something that cannot change without being reassigned.
    ///
    /// Trees are constant; stale handles are not.
    pub fn is_constant(&self, handle: VarHandle) -> bool {
        match self.entry(handle) {
            Some(Entry::Variable(var)) => var.is_constant(),
            Some(Entry::Tree(_)) => true,
            None => false,
        }
    }

    /// Render the value of `handle`, computing it if nothing printable is cached.
    pub fn display_value(&mut self, ctx: &EvalContext, handle: VarHandle) -> String {
        if let Some(value) = self
            .variable(handle)
            .and_then(Variable::cached_value)
            .filter(|value| value.is_printable())
        {
            return value.to_string();
        }
        match self.compute(ctx, handle) {
            Ok(value) => value.to_string(),
            Err(_) => "NAN".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::Bounds;
    use crate::expr::Expr;
    use crate::value::Matrix;
    use pretty_assertions::assert_eq;

    #[test]
    fn uninitialized_read_warns_and_yields_zero() {
        let mut reg = Registry::new();
        let ctx = EvalContext::new();
        let x = reg.insert_variable("x").unwrap();
        assert_eq!(reg.compute(&ctx, x).unwrap(), Value::Number(0.0));
        assert_eq!(
            reg.take_warnings(),
            vec![Warning::Uninitialized {
                variable: "x".to_string()
            }]
        );

        // The materialized value is cached, so the warning is not repeated.
        reg.compute(&ctx, x).unwrap();
        assert!(reg.warnings().is_empty());
    }

    #[test]
    fn non_numeric_values_are_cached_verbatim() {
        let mut reg = Registry::new();
        let ctx = EvalContext::new();
        let m = Matrix::new(1, 2, vec![1.0, 2.0]).unwrap();
        let x = reg.insert_value("x", m.clone()).unwrap();
        assert_eq!(reg.compute(&ctx, x).unwrap(), Value::from(m));
        assert!(reg.warnings().is_empty());
    }

    #[test]
    fn reference_values_compute_through_target() {
        let mut reg = Registry::new();
        let ctx = EvalContext::new();
        let a = reg.insert_value("a", 3.0).unwrap();
        let r = reg.insert_variable("r").unwrap();
        reg.set_value(r, Value::Reference(a)).unwrap();
        assert_eq!(reg.compute(&ctx, r).unwrap(), Value::Number(3.0));

        reg.set_value(a, Value::Number(4.0)).unwrap();
        assert_eq!(reg.compute(&ctx, r).unwrap(), Value::Number(4.0));
    }

    #[test]
    fn reference_cycles_are_rejected() {
        let mut reg = Registry::new();
        let a = reg.insert_value("a", 1.0).unwrap();
        let b = reg.insert_variable("b").unwrap();
        reg.set_value(b, Value::Reference(a)).unwrap();

        let err = reg.set_value(a, Value::Reference(b)).unwrap_err();
        assert!(matches!(err, VarError::CircularDependency { .. }));
        assert_eq!(reg.variable(a).unwrap().numeric_value(), 1.0);

        let err = reg.set_value(a, Value::Reference(a)).unwrap_err();
        assert!(matches!(err, VarError::CircularDependency { .. }));
    }

    #[test]
    fn tree_assignment_replaces_slot_under_same_name() {
        let mut reg = Registry::new();
        let ctx = EvalContext::new();
        let t = reg.insert_value("t", 1.0).unwrap();
        let tree = TreeValue::new("((a,b),c)");
        reg.set_value(t, Value::from(tree.clone())).unwrap();

        assert!(reg.variable(t).is_none());
        assert_eq!(reg.tree(t).map(Tree::name), Some("t"));
        assert_eq!(reg.lookup("t"), Some(t));
        assert_eq!(reg.compute(&ctx, t).unwrap(), Value::from(tree));
        assert_eq!(
            reg.set_value(t, Value::Number(1.0)).unwrap_err(),
            VarError::NotAVariable("t".to_string())
        );
    }

    #[test]
    fn ensure_value_in_bounds_reclamps_after_narrowing() {
        let mut reg = Registry::new();
        let ctx = EvalContext::new();
        let x = reg.insert_value("x", 50.0).unwrap();
        reg.set_bounds(x, 0.0, 10.0).unwrap();
        assert_eq!(reg.compute(&ctx, x).unwrap(), Value::Number(50.0));

        reg.ensure_value_in_bounds(&ctx, x).unwrap();
        assert_eq!(reg.compute(&ctx, x).unwrap(), Value::Number(10.0));
    }

    #[test]
    fn clear_constraints_frees_dependent_variable() {
        let mut reg = Registry::new();
        let mut ctx = EvalContext::new();
        let a = reg.insert_value("a", 2.0).unwrap();
        let b = reg.insert_variable("b").unwrap();
        reg.set_bounds(b, 0.0, 100.0).unwrap();
        reg.set_formula(&mut ctx, b, &(Expr::var(a) + Expr::number(1.0)))
            .unwrap();

        reg.clear_constraints(&ctx, b).unwrap();
        let var = reg.variable(b).unwrap();
        assert!(var.is_independent());
        assert_eq!(var.bounds(), Bounds::default());
        assert_eq!(reg.compute(&ctx, b).unwrap(), Value::Number(3.0));
    }

    #[test]
    fn clear_constraints_rebinds_category_as_plain_variable() {
        let mut reg = Registry::new();
        let ctx = EvalContext::new();
        let c = reg
            .insert_variable_with("c", VariableKind::Category, crate::Scope::Global)
            .unwrap();
        reg.set_value(c, Value::Number(0.25)).unwrap();

        reg.clear_constraints(&ctx, c).unwrap();
        let var = reg.variable(c).unwrap();
        assert!(!var.is_category());
        assert!(var.is_global());
        assert_eq!(reg.lookup("c"), Some(c));
        assert_eq!(reg.compute(&ctx, c).unwrap(), Value::Number(0.25));
    }

    #[test]
    fn constness_follows_formula_or_value() {
        let mut reg = Registry::new();
        let mut ctx = EvalContext::new();
        let n = reg.insert_value("n", 1.0).unwrap();
        let s = reg.insert_value("s", "text").unwrap();
        let d = reg.insert_formula(&mut ctx, "d", &(Expr::var(n) * Expr::number(2.0))).unwrap();
        let r = reg.insert_variable("r").unwrap();
        reg.set_value(r, Value::Reference(n)).unwrap();

        assert!(!reg.is_constant(n));
        assert!(reg.is_constant(s));
        assert!(!reg.is_constant(d));
        assert!(!reg.is_constant(r));

        reg.set_value(s, Value::from(TreeValue::new("(a,b)"))).unwrap();
        assert!(reg.is_constant(s));
        reg.remove(s).unwrap();
        assert!(!reg.is_constant(s));
    }

    #[test]
    fn display_value_prefers_cached_value() {
        let mut reg = Registry::new();
        let ctx = EvalContext::new();
        let s = reg.insert_value("s", "hello").unwrap();
        assert_eq!(reg.display_value(&ctx, s), "hello");

        let n = reg.insert_value("n", 1.5).unwrap();
        assert_eq!(reg.display_value(&ctx, n), "1.5");
    }
}
