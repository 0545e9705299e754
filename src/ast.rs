/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Expression AST (`COND_EXPR` in the original), used by high-level icodes
//! once forward substitution has folded register temporaries into
//! expression trees. Each node is exclusively owned by its parent slot;
//! sharing is done by deep clone (spec section 3, "Expression AST").

use crate::locident::HlType;

/// Boolean/relational/arithmetic operator used by a `Boolean` node.
/// Order matches `dcc`'s `condOp` enum so that `inverse()` can mirror
/// `inverseCondOp`'s table lookup without reinventing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondOp {
    LessEqual,
    Less,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Xor,
    Not,
    Add,
    Sub,
    Mul,
    Div,
    Shr,
    Shl,
    Mod,
    DblOr,
    DblAnd,
}

impl CondOp {
    /// `inverseCondOp`'s relational table: the operator that negates this
    /// one when it is itself relational or a compound `&&`/`||`.
    pub fn relational_inverse(self) -> Option<CondOp> {
        use CondOp::*;
        match self {
            LessEqual => Some(Greater),
            Less => Some(GreaterEqual),
            Equal => Some(NotEqual),
            NotEqual => Some(Equal),
            Greater => Some(LessEqual),
            GreaterEqual => Some(Less),
            DblOr => Some(DblAnd),
            DblAnd => Some(DblOr),
            _ => None,
        }
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            CondOp::LessEqual
                | CondOp::Less
                | CondOp::Equal
                | CondOp::NotEqual
                | CondOp::Greater
                | CondOp::GreaterEqual
        )
    }

    pub fn c_symbol(self) -> &'static str {
        use CondOp::*;
        match self {
            LessEqual => "<=",
            Less => "<",
            Equal => "==",
            NotEqual => "!=",
            Greater => ">",
            GreaterEqual => ">=",
            And => "&",
            Or => "|",
            Xor => "^",
            Not => "~",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Shr => ">>",
            Shl => "<<",
            Mod => "%",
            DblOr => "||",
            DblAnd => "&&",
        }
    }
}

/// Which kind of thing an `Identifier` node refers to.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentKind {
    /// Index into a procedure's `LocalId` table, register-frame entry.
    Register(usize),
    /// Index into a procedure's `LocalId` table, a split long register pair.
    LongRegister(usize),
    /// Index into the global symbol table.
    Global(usize),
    /// Index into a procedure's `LocalId` table, stack-frame entry.
    Local(usize),
    /// Index into a procedure's argument/stack-frame table.
    Parameter(usize),
    /// Interned string literal (e.g. from `INT 21h, AH=09h`).
    StringLiteral(String),
    /// A call expression: callee procedure index plus actual arguments.
    Call(Box<CallExpr>),
    /// Anything not otherwise classified (e.g. a flag value).
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub proc_idx: usize,
    pub args: Vec<Expr>,
}

/// `PRE_INC`/`PRE_DEC`/`POST_INC`/`POST_DEC` — the increment-in-test
/// idioms (spec section 4.3, idioms 18-20) fold a separate `INC`/`DEC`
/// icode into one of these wrapped around the compared variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl UnaryOp {
    pub fn c_fmt(self, operand: &str) -> String {
        match self {
            UnaryOp::PreInc => format!("++{operand}"),
            UnaryOp::PreDec => format!("--{operand}"),
            UnaryOp::PostInc => format!("{operand}++"),
            UnaryOp::PostDec => format!("{operand}--"),
        }
    }
}

/// An expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Boolean {
        op: CondOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Negation(Box<Expr>),
    AddressOf(Box<Expr>),
    Dereference(Box<Expr>),
    /// `unaryCondExp` — pre/post increment or decrement of the inner
    /// lvalue expression.
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Identifier {
        kind: IdentKind,
        ty: HlType,
    },
    Constant {
        value: i64,
        size: u8,
    },
}

impl Expr {
    pub fn boolean(lhs: Expr, rhs: Expr, op: CondOp) -> Expr {
        Expr::Boolean {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn constant(value: i64, size: u8) -> Expr {
        Expr::Constant { value, size }
    }

    pub fn unary(op: UnaryOp, expr: Expr) -> Expr {
        Expr::Unary { op, expr: Box::new(expr) }
    }

    pub fn register(idx: usize, ty: HlType) -> Expr {
        Expr::Identifier {
            kind: IdentKind::Register(idx),
            ty,
        }
    }

    /// `changeBoolCondExpOp` — rewrites a top-level boolean node's operator
    /// in place (used when condition-code elimination merges a
    /// predecessor's `JCOND` into a new `Jcc`'s operator).
    pub fn change_bool_op(&mut self, new_op: CondOp) {
        if let Expr::Boolean { op, .. } = self {
            *op = new_op;
        }
    }

    /// `inverseCondOp` — logically negates the expression in place,
    /// recursing into compound `&&`/`||` so both sides end up negated too.
    pub fn inverse(&mut self) {
        match self {
            Expr::Boolean { op, lhs, rhs } if op.is_relational() || matches!(op, CondOp::DblOr | CondOp::DblAnd) => {
                let compound = matches!(op, CondOp::DblOr | CondOp::DblAnd);
                if let Some(inv) = op.relational_inverse() {
                    *op = inv;
                }
                if compound {
                    lhs.inverse();
                    rhs.inverse();
                }
            }
            Expr::Negation(inner) => {
                let taken = std::mem::replace(inner.as_mut(), Expr::constant(0, 2));
                *self = taken;
            }
            other => {
                let taken = std::mem::replace(other, Expr::constant(0, 2));
                *other = Expr::Negation(Box::new(taken));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relational_inverse_flips_operator() {
        let mut e = Expr::boolean(Expr::constant(1, 2), Expr::constant(2, 2), CondOp::Less);
        e.inverse();
        assert!(matches!(
            e,
            Expr::Boolean {
                op: CondOp::GreaterEqual,
                ..
            }
        ));
    }

    #[test]
    fn compound_inverse_recurses_into_both_sides() {
        let lhs = Expr::boolean(Expr::constant(1, 2), Expr::constant(2, 2), CondOp::Equal);
        let rhs = Expr::boolean(Expr::constant(3, 2), Expr::constant(4, 2), CondOp::Less);
        let mut e = Expr::boolean(lhs, rhs, CondOp::DblAnd);
        e.inverse();
        match e {
            Expr::Boolean { op: CondOp::DblOr, lhs, rhs } => {
                assert!(matches!(*lhs, Expr::Boolean { op: CondOp::NotEqual, .. }));
                assert!(matches!(*rhs, Expr::Boolean { op: CondOp::GreaterEqual, .. }));
            }
            _ => panic!("expected DblOr"),
        }
    }
}
