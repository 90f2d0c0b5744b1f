//! A small arithmetic expression tree implementing [`Formula`].
//!
//! Hosts with their own formula language implement [`Formula`] directly; `Expr` covers numeric
//! relations between variables and is what the crate's own tests bind.

use std::collections::BTreeSet;
use std::ops;

use crate::context::EvalContext;
use crate::error::VarResult;
use crate::formula::Formula;
use crate::registry::{Registry, VarHandle};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Exp,
    Log,
}

impl UnaryOp {
    fn apply(self, x: f64) -> f64 {
        match self {
            UnaryOp::Neg => -x,
            UnaryOp::Exp => x.exp(),
            UnaryOp::Log => x.ln(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Pow => 50,
            BinaryOp::Mul | BinaryOp::Div => 40,
            BinaryOp::Add | BinaryOp::Sub => 30,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
        }
    }

    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => a.powf(b),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(VarHandle),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn number(value: f64) -> Self {
        Expr::Literal(Value::Number(value))
    }

    pub fn var(handle: VarHandle) -> Self {
        Expr::Var(handle)
    }

    /// A literal value. A [`Value::Reference`] becomes a variable reference.
    pub fn literal(value: Value) -> Self {
        match value {
            Value::Reference(handle) => Expr::Var(handle),
            value => Expr::Literal(value),
        }
    }

    #[must_use]
    pub fn exp(self) -> Self {
        Expr::Unary(UnaryOp::Exp, Box::new(self))
    }

    /// Natural logarithm.
    #[must_use]
    pub fn ln(self) -> Self {
        Expr::Unary(UnaryOp::Log, Box::new(self))
    }

    #[must_use]
    pub fn pow(self, exponent: Expr) -> Self {
        Expr::Binary(BinaryOp::Pow, Box::new(self), Box::new(exponent))
    }

    fn for_each_reference(&self, f: &mut impl FnMut(VarHandle)) {
        match self {
            Expr::Var(handle) | Expr::Literal(Value::Reference(handle)) => f(*handle),
            Expr::Literal(_) => {}
            Expr::Unary(_, inner) => inner.for_each_reference(f),
            Expr::Binary(_, left, right) => {
                left.for_each_reference(f);
                right.for_each_reference(f);
            }
        }
    }

    fn eval(&self, vars: &mut Registry, ctx: &EvalContext) -> VarResult<Value> {
        match self {
            Expr::Var(handle) | Expr::Literal(Value::Reference(handle)) => {
                vars.compute(ctx, *handle)
            }
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Unary(op, inner) => {
                let x = inner.eval(vars, ctx)?.expect_number()?;
                Ok(Value::Number(op.apply(x)))
            }
            Expr::Binary(op, left, right) => {
                let a = left.eval(vars, ctx)?.expect_number()?;
                let b = right.eval(vars, ctx)?.expect_number()?;
                Ok(Value::Number(op.apply(a, b)))
            }
        }
    }

    /// Evaluate a variable-free subtree, if it only involves numbers.
    fn fold(&self) -> Option<f64> {
        match self {
            Expr::Literal(value) => value.as_number(),
            Expr::Var(_) => None,
            Expr::Unary(op, inner) => Some(op.apply(inner.fold()?)),
            Expr::Binary(op, left, right) => Some(op.apply(left.fold()?, right.fold()?)),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary(op, ..) => op.precedence(),
            Expr::Unary(UnaryOp::Neg, _) => 70,
            _ => 100,
        }
    }

    fn fmt(&self, out: &mut String, vars: &Registry, parent_prec: Option<u8>) {
        let my_prec = self.precedence();
        let needs_parens = parent_prec.is_some_and(|p| my_prec < p);
        if needs_parens {
            out.push('(');
        }
        match self {
            Expr::Var(handle) | Expr::Literal(Value::Reference(handle)) => {
                out.push_str(&vars.display_name(*handle));
            }
            Expr::Literal(Value::Text(text)) => {
                out.push('"');
                out.push_str(text);
                out.push('"');
            }
            Expr::Literal(value) => out.push_str(&value.to_string()),
            Expr::Unary(UnaryOp::Neg, inner) => {
                out.push('-');
                inner.fmt(out, vars, Some(my_prec));
            }
            Expr::Unary(op, inner) => {
                out.push_str(if *op == UnaryOp::Exp { "exp(" } else { "log(" });
                inner.fmt(out, vars, None);
                out.push(')');
            }
            Expr::Binary(op, left, right) => {
                left.fmt(out, vars, Some(my_prec));
                out.push(' ');
                out.push_str(op.as_str());
                out.push(' ');
                // Sub, Div and Pow don't associate to the right.
                let right_prec = match op {
                    BinaryOp::Add | BinaryOp::Mul => my_prec,
                    BinaryOp::Sub | BinaryOp::Div | BinaryOp::Pow => my_prec + 1,
                };
                right.fmt(out, vars, Some(right_prec));
            }
        }
        if needs_parens {
            out.push(')');
        }
    }
}

impl Formula for Expr {
    fn compute(&self, vars: &mut Registry, ctx: &EvalContext) -> VarResult<Value> {
        self.eval(vars, ctx)
    }

    fn has_changed(&self, vars: &Registry, ctx: &EvalContext, ignore_categories: bool) -> bool {
        let mut changed = false;
        self.for_each_reference(&mut |handle| {
            changed = changed || vars.has_changed(ctx, handle, ignore_categories);
        });
        changed
    }

    fn is_constant(&self) -> bool {
        let mut constant = true;
        self.for_each_reference(&mut |_| constant = false);
        constant
    }

    fn scan_variables(
        &self,
        vars: &Registry,
        include_categories: bool,
        out: &mut BTreeSet<VarHandle>,
    ) {
        self.for_each_reference(&mut |handle| {
            let category = vars.variable(handle).is_some_and(|var| var.is_category());
            if include_categories || !category {
                out.insert(handle);
            }
        });
    }

    fn simplify_constants(&mut self) {
        match self {
            Expr::Unary(_, inner) => inner.simplify_constants(),
            Expr::Binary(_, left, right) => {
                left.simplify_constants();
                right.simplify_constants();
            }
            Expr::Literal(_) | Expr::Var(_) => return,
        }
        if let Some(value) = self.fold() {
            *self = Expr::number(value);
        }
    }

    fn box_clone(&self) -> Box<dyn Formula> {
        Box::new(self.clone())
    }

    fn to_display_string(&self, vars: &Registry) -> String {
        let mut out = String::new();
        self.fmt(&mut out, vars, None);
        out
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::number(value)
    }
}

impl From<VarHandle> for Expr {
    fn from(handle: VarHandle) -> Self {
        Expr::Var(handle)
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl ops::$trait for Expr {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                Expr::Binary($op, Box::new(self), Box::new(rhs))
            }
        }
    };
}

impl_binary_op!(Add, add, BinaryOp::Add);
impl_binary_op!(Sub, sub, BinaryOp::Sub);
impl_binary_op!(Mul, mul, BinaryOp::Mul);
impl_binary_op!(Div, div, BinaryOp::Div);

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Unary(UnaryOp::Neg, Box::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VarError;
    use crate::value::ValueClass;
    use crate::variable::{Scope, VariableKind};
    use pretty_assertions::assert_eq;

    fn registry() -> (Registry, VarHandle, VarHandle) {
        let mut reg = Registry::new();
        let a = reg.insert_value("a", 2.0).unwrap();
        let b = reg.insert_value("b", 3.0).unwrap();
        (reg, a, b)
    }

    #[test]
    fn evaluates_arithmetic() {
        let (mut reg, a, b) = registry();
        let ctx = EvalContext::new();
        let f = (Expr::var(a) + Expr::var(b)) * Expr::number(2.0) - Expr::var(a).pow(Expr::number(2.0));
        assert_eq!(f.compute(&mut reg, &ctx).unwrap(), Value::Number(6.0));

        let g = Expr::number(0.0).exp() + Expr::number(1.0).ln() - -Expr::var(b);
        assert_eq!(g.compute(&mut reg, &ctx).unwrap(), Value::Number(4.0));
    }

    #[test]
    fn non_numeric_operands_are_type_errors() {
        let (mut reg, a, _) = registry();
        let ctx = EvalContext::new();
        let f = Expr::var(a) + Expr::literal(Value::from("x"));
        assert_eq!(
            f.compute(&mut reg, &ctx).unwrap_err(),
            VarError::Type {
                expected: ValueClass::Number,
                actual: ValueClass::Text,
            }
        );
        // A bare literal is returned as-is.
        let text = Expr::literal(Value::from("x"));
        assert_eq!(text.compute(&mut reg, &ctx).unwrap(), Value::from("x"));
    }

    #[test]
    fn display_parenthesizes_by_precedence() {
        let (reg, a, b) = registry();
        let cases = [
            (Expr::var(a) + Expr::var(b) * Expr::number(2.0), "a + b * 2"),
            ((Expr::var(a) + Expr::var(b)) * Expr::number(2.0), "(a + b) * 2"),
            (Expr::var(a) - (Expr::var(b) - Expr::number(1.0)), "a - (b - 1)"),
            ((Expr::var(a) - Expr::var(b)) - Expr::number(1.0), "a - b - 1"),
            (-(Expr::var(a) + Expr::var(b)), "-(a + b)"),
            ((Expr::var(a) * Expr::number(0.5)).exp(), "exp(a * 0.5)"),
            (Expr::literal(Value::from("t")), "\"t\""),
        ];
        for (expr, expected) in cases {
            assert_eq!(expr.to_display_string(&reg), expected);
        }
    }

    #[test]
    fn simplify_folds_variable_free_subtrees() {
        let (reg, a, _) = registry();
        let mut f = Expr::var(a) + Expr::number(2.0) * (Expr::number(1.0) + Expr::number(0.5));
        f.simplify_constants();
        assert_eq!(f, Expr::var(a) + Expr::number(3.0));
        assert_eq!(f.to_display_string(&reg), "a + 3");

        let mut g = Expr::number(4.0) / Expr::number(2.0);
        g.simplify_constants();
        assert_eq!(g, Expr::number(2.0));
        assert!(g.is_constant());
    }

    #[test]
    fn scan_skips_categories_unless_requested() {
        let mut reg = Registry::new();
        let a = reg.insert_value("a", 1.0).unwrap();
        let c = reg
            .insert_variable_with("c", VariableKind::Category, Scope::Local)
            .unwrap();
        let f = Expr::var(a) * Expr::var(c) + Expr::var(a);

        let mut out = BTreeSet::new();
        f.scan_variables(&reg, false, &mut out);
        assert_eq!(out, BTreeSet::from([a]));

        out.clear();
        f.scan_variables(&reg, true, &mut out);
        assert_eq!(out, BTreeSet::from([a, c]));
        assert!(!f.is_constant());
    }

    #[test]
    fn has_changed_follows_references() {
        let (mut reg, a, b) = registry();
        let ctx = EvalContext::new();
        let f = Expr::var(a) + Expr::var(b);
        assert!(f.has_changed(&reg, &ctx, false));

        reg.mark_all_done();
        assert!(!f.has_changed(&reg, &ctx, false));

        reg.set_value(b, Value::Number(7.0)).unwrap();
        assert!(f.has_changed(&reg, &ctx, false));
        assert!(!Expr::var(a).has_changed(&reg, &ctx, false));
    }
}
