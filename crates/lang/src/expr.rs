//! Expression nodes.
//!
//! Every [`Expr`] computes its [`Capabilities`] once, when it is built, from
//! its kind and its children. Evaluation returns a literal carrying the
//! result, positioned where the original expression was.

use crate::builtin::Builtin;
use async_trait::async_trait;
use coa_core::{name_set, Capabilities, EvalError, Evaler, NameSet, Pos, Resource, ResourceDef, Result, Scope, Value};
use coa_execution::evaluate_sequence;
use std::sync::Arc;
use tracing::trace;

/// The shape of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// A constant
    Literal(Value),
    /// A variable reference
    Ident(String),
    /// `(@def name value)`: bind in the current scope
    Def {
        /// Bound name
        name: String,
        /// Bound value
        value: Box<Expr>,
    },
    /// `(@mod name value)`: reassign a visible name
    Mod {
        /// Reassigned name
        name: String,
        /// New value
        value: Box<Expr>,
    },
    /// `(@op args...)`
    Call {
        /// Operation
        op: Builtin,
        /// Arguments, evaluated as one sequence
        args: Vec<Expr>,
    },
    /// `{...}`: a sequence in its own scope, yielding its last value
    Block(Vec<Expr>),
    /// `[...]`: a sequence in the current scope, yielding a list
    List(Vec<Expr>),
}

/// An expression with its position and capability set.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    kind: ExprKind,
    pos: Pos,
    caps: Capabilities,
}

impl Expr {
    fn new(kind: ExprKind) -> Self {
        let caps = capabilities_of(&kind);
        Self { kind, pos: Pos::default(), caps }
    }

    /// A constant.
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::new(ExprKind::Literal(value.into()))
    }

    /// A variable reference.
    pub fn ident(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Ident(name.into()))
    }

    /// `(@def name value)`
    pub fn def(name: impl Into<String>, value: Expr) -> Self {
        Self::new(ExprKind::Def { name: name.into(), value: Box::new(value) })
    }

    /// `(@mod name value)`
    pub fn modify(name: impl Into<String>, value: Expr) -> Self {
        Self::new(ExprKind::Mod { name: name.into(), value: Box::new(value) })
    }

    /// `(@op args...)`
    pub fn call(op: Builtin, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call { op, args })
    }

    /// `{body...}`
    pub fn block(body: Vec<Expr>) -> Self {
        Self::new(ExprKind::Block(body))
    }

    /// `[items...]`
    pub fn list(items: Vec<Expr>) -> Self {
        Self::new(ExprKind::List(items))
    }

    /// Set the source position.
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.pos = Pos::new(line, column);
        self
    }

    /// The expression's kind.
    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    /// Capability set computed at construction.
    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// The value of a literal; evaluated expressions are always literals.
    pub fn value(&self) -> Option<&Value> {
        match &self.kind {
            ExprKind::Literal(v) => Some(v),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        match self.kind {
            ExprKind::Literal(v) => v,
            _ => Value::Unit,
        }
    }

    fn evaluated(&self, value: Value) -> Self {
        Self { kind: ExprKind::Literal(value), pos: self.pos, caps: Capabilities::pure() }
    }

    async fn evaluate_binding(&self, value: &Expr, scope: &Arc<Scope>) -> Result<Value> {
        let child = scope.child();
        Ok(value.evaluate(&child).await?.into_value())
    }
}

fn capabilities_of(kind: &ExprKind) -> Capabilities {
    match kind {
        ExprKind::Literal(_) => Capabilities::pure(),
        ExprKind::Ident(name) => Capabilities { used: name_set([name.as_str()]), ..Default::default() },
        ExprKind::Def { name, value } => {
            let mut caps = value.caps.clone().scoped();
            caps.written = caps.reassigned.clone();
            caps.written.insert(name.clone());
            caps
        }
        ExprKind::Mod { name, value } => {
            let mut caps = value.caps.clone().scoped();
            caps.used.insert(name.clone());
            caps.reassigned.insert(name.clone());
            caps.written = caps.reassigned.clone();
            caps
        }
        ExprKind::Call { op, args } => {
            let mut caps = Capabilities::sequence(args.iter().map(|a| &a.caps));
            caps.resources.extend(op.resources());
            caps
        }
        ExprKind::Block(body) => {
            // Locals stay inside; reassignments of outer names still write outward.
            let mut caps = Capabilities::sequence(body.iter().map(|e| &e.caps)).scoped();
            caps.written = caps.reassigned.clone();
            caps
        }
        ExprKind::List(items) => Capabilities::sequence(items.iter().map(|e| &e.caps)),
    }
}

#[async_trait]
impl Evaler for Expr {
    fn used_names(&self) -> &NameSet {
        &self.caps.used
    }

    fn written_names(&self) -> &NameSet {
        &self.caps.written
    }

    fn reassigned_names(&self) -> &NameSet {
        &self.caps.reassigned
    }

    fn declared_resources(&self) -> &[ResourceDef] {
        &self.caps.resources
    }

    fn pos(&self) -> Pos {
        self.pos
    }

    async fn evaluate(&self, scope: &Arc<Scope>) -> Result<Self> {
        trace!("evaluating {} at {}", self, self.pos);
        let value = match &self.kind {
            ExprKind::Literal(_) => return Ok(self.clone()),
            ExprKind::Ident(name) => scope
                .get(name)
                .ok_or_else(|| EvalError::Undefined { names: vec![name.clone()], pos: self.pos })?,
            ExprKind::Def { name, value } => {
                let v = self.evaluate_binding(value, scope).await?;
                scope.define(name.clone(), v.clone());
                v
            }
            ExprKind::Mod { name, value } => {
                let not_modifiable = || EvalError::NotModifiable { name: name.clone(), pos: self.pos };
                if !scope.is_name_visible(name) {
                    return Err(not_modifiable());
                }
                let v = self.evaluate_binding(value, scope).await?;
                if !scope.modify(name, v.clone()) {
                    return Err(not_modifiable());
                }
                v
            }
            ExprKind::Call { op, args } => {
                let values: Vec<Value> = evaluate_sequence(scope, args.clone(), true)
                    .await?
                    .into_iter()
                    .map(Expr::into_value)
                    .collect();
                let rendered: Vec<String> = values.iter().map(Value::render).collect();
                let resources: Vec<Resource> = op.resources().iter().map(|r| r.resolve(&rendered)).collect();

                let denied = scope.denied_resources(&resources);
                if !denied.is_empty() {
                    return Err(EvalError::ResourcesDenied {
                        op: op.name().to_string(),
                        resources: denied.iter().map(|&i| resources[i].to_string()).collect(),
                        indices: denied,
                        pos: self.pos,
                    });
                }

                let _guard = scope.lock(&resources).await;
                op.apply(&values, scope, self.pos).await?
            }
            ExprKind::Block(body) => {
                let child = scope.child();
                evaluate_sequence(&child, body.clone(), true)
                    .await?
                    .pop()
                    .map(Expr::into_value)
                    .unwrap_or_default()
            }
            ExprKind::List(items) => Value::List(
                evaluate_sequence(scope, items.clone(), true)
                    .await?
                    .into_iter()
                    .map(Expr::into_value)
                    .collect(),
            ),
        };
        Ok(self.evaluated(value))
    }
}

fn write_seq(f: &mut std::fmt::Formatter<'_>, items: &[Expr]) -> std::fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ExprKind::Literal(v) => write!(f, "{}", v),
            ExprKind::Ident(name) => f.write_str(name),
            ExprKind::Def { name, value } => write!(f, "(@def {} {})", name, value),
            ExprKind::Mod { name, value } => write!(f, "(@mod {} {})", name, value),
            ExprKind::Call { op, args } => {
                write!(f, "({}", op)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                f.write_str(")")
            }
            ExprKind::Block(body) => {
                f.write_str("{")?;
                write_seq(f, body)?;
                f.write_str("}")
            }
            ExprKind::List(items) => {
                f.write_str("[")?;
                write_seq(f, items)?;
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coa_core::{EvalConfig, EvalContext, ResourcePolicy};

    fn scope() -> Arc<Scope> {
        Scope::root(Arc::new(EvalContext::new(EvalConfig::default())))
    }

    fn num(n: f64) -> Expr {
        Expr::literal(n)
    }

    #[test]
    fn test_display_is_source_syntax() {
        let e = Expr::block(vec![
            Expr::def("a", num(1.0)),
            Expr::call(Builtin::Add, vec![Expr::ident("a"), num(2.0)]),
            Expr::list(vec![Expr::literal("s"), Expr::literal(true)]),
        ]);
        assert_eq!(e.to_string(), "{(@def a 1) (@add a 2) [\"s\" @true]}");
    }

    #[test]
    fn test_block_hides_locals_but_exposes_outer_writes() {
        let e = Expr::block(vec![
            Expr::def("x", Expr::ident("outer")),
            Expr::modify("count", Expr::ident("x")),
            Expr::call(Builtin::Print, vec![Expr::ident("x")]),
        ]);
        let caps = e.capabilities();
        assert_eq!(caps.used, name_set(["outer", "count"]));
        assert_eq!(caps.written, name_set(["count"]));
        assert_eq!(caps.reassigned, name_set(["count"]));
        assert_eq!(caps.resources, vec![ResourceDef::global("io.stdout")]);
    }

    #[test]
    fn test_def_writes_its_name_and_reads_its_value() {
        let e = Expr::def("b", Expr::call(Builtin::Mul, vec![Expr::ident("a"), Expr::ident("$0")]));
        assert_eq!(e.used_names(), &name_set(["a", "$0"]));
        assert_eq!(e.written_names(), &name_set(["b"]));
        assert!(e.is_pure());
    }

    #[tokio::test]
    async fn test_block_scoping() {
        let s = scope();
        s.define("n", Value::Number(1.0));
        let e = Expr::block(vec![
            Expr::def("local", num(5.0)),
            Expr::modify("n", Expr::call(Builtin::Add, vec![Expr::ident("n"), Expr::ident("local")])),
        ]);

        let out = e.evaluate(&s).await.unwrap();
        assert_eq!(out.value(), Some(&Value::Number(6.0)));
        assert_eq!(s.get("n"), Some(Value::Number(6.0)));
        assert_eq!(s.get("local"), None);
    }

    #[tokio::test]
    async fn test_modify_requires_visible_name() {
        let s = scope();
        let err = Expr::modify("ghost", num(1.0)).at(4, 2).evaluate(&s).await.unwrap_err();
        assert_eq!(err, EvalError::NotModifiable { name: "ghost".into(), pos: Pos::new(4, 2) });
    }

    #[tokio::test]
    async fn test_call_positions_errors() {
        let s = scope();
        let e = Expr::call(Builtin::Div, vec![num(1.0), num(0.0)]).at(3, 9);
        assert_eq!(e.evaluate(&s).await.unwrap_err(), EvalError::DivisionByZero { pos: Pos::new(3, 9) });
    }

    #[tokio::test]
    async fn test_call_checks_scope_policy_before_running() {
        let s = scope();
        let sandbox = s.guarded(ResourcePolicy::allow([Resource { name: "channel".into(), arg: "log".into() }]));
        let emit = |channel: &str| {
            Expr::call(Builtin::Emit, vec![Expr::literal(channel), Expr::literal("x")]).at(1, 2)
        };

        emit("log").evaluate(&sandbox).await.unwrap();
        let err = emit("audit").evaluate(&sandbox.child()).await.unwrap_err();
        assert_eq!(
            err,
            EvalError::ResourcesDenied {
                op: "@emit".into(),
                indices: vec![0],
                resources: vec!["channel(audit)".into()],
                pos: Pos::new(1, 2),
            }
        );
        assert_eq!(s.context().output(), ["log: x"]);

        let pure = s.guarded(ResourcePolicy::Pure);
        let err = Expr::call(Builtin::Print, vec![Expr::literal("hi")]).evaluate(&pure).await.unwrap_err();
        assert!(matches!(err, EvalError::ResourcesDenied { .. }));
        assert_eq!(s.context().output().len(), 1);
    }

    #[tokio::test]
    async fn test_list_collects_values() {
        let s = scope();
        let e = Expr::list(vec![Expr::def("a", num(1.0)), Expr::call(Builtin::Add, vec![Expr::ident("a"), num(1.0)])]);
        let out = e.evaluate(&s).await.unwrap();
        assert_eq!(out.value(), Some(&Value::List(vec![Value::Number(1.0), Value::Number(2.0)])));
        assert_eq!(s.get("a"), Some(Value::Number(1.0)));
    }
}
