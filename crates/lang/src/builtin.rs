//! Builtin operations callable from `Expr::Call`.

use coa_core::{EvalError, Pos, ResourceDef, Result, Scope, Value};
use std::time::Duration;

/// A builtin operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// `@add a b`
    Add,
    /// `@sub a b`
    Sub,
    /// `@mul a b`
    Mul,
    /// `@div a b`
    Div,
    /// `@eq a b`
    Eq,
    /// `@lt a b`
    Lt,
    /// `@not b`
    Not,
    /// `@error message`
    Error,
    /// `@assert cond [message]`
    Assert,
    /// `@sleep millis`
    Sleep,
    /// `@print values...`
    Print,
    /// `@emit channel value`
    Emit,
    /// `@time_now`
    TimeNow,
}

impl Builtin {
    /// Every builtin, in declaration order.
    pub const ALL: [Builtin; 13] = [
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::Eq,
        Self::Lt,
        Self::Not,
        Self::Error,
        Self::Assert,
        Self::Sleep,
        Self::Print,
        Self::Emit,
        Self::TimeNow,
    ];

    /// Source name, including the `@` prefix.
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "@add",
            Self::Sub => "@sub",
            Self::Mul => "@mul",
            Self::Div => "@div",
            Self::Eq => "@eq",
            Self::Lt => "@lt",
            Self::Not => "@not",
            Self::Error => "@error",
            Self::Assert => "@assert",
            Self::Sleep => "@sleep",
            Self::Print => "@print",
            Self::Emit => "@emit",
            Self::TimeNow => "@time_now",
        }
    }

    /// Look a builtin up by source name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    /// Effectful resources the operation touches.
    pub fn resources(self) -> Vec<ResourceDef> {
        match self {
            Self::Print => vec![ResourceDef::global("io.stdout")],
            Self::Emit => vec![ResourceDef::keyed("channel", 0)],
            Self::TimeNow => vec![ResourceDef::global("os.time")],
            _ => Vec::new(),
        }
    }

    /// Run the operation on evaluated arguments.
    pub async fn apply(self, args: &[Value], scope: &Scope, pos: Pos) -> Result<Value> {
        match self {
            Self::Add => {
                let (a, b) = self.numbers(args, pos)?;
                Ok(Value::Number(a + b))
            }
            Self::Sub => {
                let (a, b) = self.numbers(args, pos)?;
                Ok(Value::Number(a - b))
            }
            Self::Mul => {
                let (a, b) = self.numbers(args, pos)?;
                Ok(Value::Number(a * b))
            }
            Self::Div => {
                let (a, b) = self.numbers(args, pos)?;
                if b == 0.0 {
                    return Err(EvalError::DivisionByZero { pos });
                }
                Ok(Value::Number(a / b))
            }
            Self::Eq => {
                self.arity(args, 2, pos)?;
                Ok(Value::Bool(args[0] == args[1]))
            }
            Self::Lt => {
                let (a, b) = self.numbers(args, pos)?;
                Ok(Value::Bool(a < b))
            }
            Self::Not => {
                self.arity(args, 1, pos)?;
                Ok(Value::Bool(!self.boolean(&args[0], pos)?))
            }
            Self::Error => {
                self.arity(args, 1, pos)?;
                Err(EvalError::Raised { message: args[0].render(), pos })
            }
            Self::Assert => {
                if args.is_empty() || args.len() > 2 {
                    return Err(self.arity_error(1, args.len(), pos));
                }
                if self.boolean(&args[0], pos)? {
                    return Ok(Value::Unit);
                }
                let message = args.get(1).map(Value::render).unwrap_or_else(|| "assertion failed".to_string());
                Err(EvalError::AssertionFailed { message, pos })
            }
            Self::Sleep => {
                self.arity(args, 1, pos)?;
                let millis = self.number(&args[0], pos)?.max(0.0);
                tokio::time::sleep(Duration::from_secs_f64(millis / 1000.0)).await;
                Ok(Value::Unit)
            }
            Self::Print => {
                let line = args.iter().map(Value::render).collect::<Vec<_>>().join(" ");
                scope.context().emit(line);
                Ok(Value::Unit)
            }
            Self::Emit => {
                self.arity(args, 2, pos)?;
                scope.context().emit(format!("{}: {}", args[0].render(), args[1].render()));
                Ok(args[1].clone())
            }
            Self::TimeNow => {
                self.arity(args, 0, pos)?;
                Ok(Value::Number(chrono::Utc::now().timestamp_millis() as f64))
            }
        }
    }

    fn arity(self, args: &[Value], expected: usize, pos: Pos) -> Result<()> {
        if args.len() == expected {
            Ok(())
        } else {
            Err(self.arity_error(expected, args.len(), pos))
        }
    }

    fn arity_error(self, expected: usize, found: usize, pos: Pos) -> EvalError {
        EvalError::Arity { op: self.name().to_string(), expected, found, pos }
    }

    fn number(self, value: &Value, pos: Pos) -> Result<f64> {
        value.as_number().ok_or_else(|| EvalError::TypeMismatch {
            op: self.name().to_string(),
            expected: "number",
            found: value.type_name(),
            pos,
        })
    }

    fn numbers(self, args: &[Value], pos: Pos) -> Result<(f64, f64)> {
        self.arity(args, 2, pos)?;
        Ok((self.number(&args[0], pos)?, self.number(&args[1], pos)?))
    }

    fn boolean(self, value: &Value, pos: Pos) -> Result<bool> {
        value.as_bool().ok_or_else(|| EvalError::TypeMismatch {
            op: self.name().to_string(),
            expected: "bool",
            found: value.type_name(),
            pos,
        })
    }
}

impl std::fmt::Display for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
