// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use crate::builtins::{Loc, UntypedBuiltinFn};

// we use Boxs here because we may walk ASTs a number of times, and we
// want to avoid copying and reallocating subexpressions all over the place.
#[derive(PartialEq, Clone, Debug)]
pub enum Expr {
    Const(String, f64, Loc),
    Str(String, Loc),
    Var(String, Loc),
    App(UntypedBuiltinFn<Expr>, Loc),
    Op1(UnaryOp, Box<Expr>, Loc),
    Op2(BinaryOp, Box<Expr>, Box<Expr>, Loc),
}

impl Expr {
    #[cfg(test)]
    pub(crate) fn strip_loc(self) -> Self {
        let loc = Loc::default();
        match self {
            Expr::Const(s, n, _loc) => Expr::Const(s, n, loc),
            Expr::Str(s, _loc) => Expr::Str(s, loc),
            Expr::Var(v, _loc) => Expr::Var(v, loc),
            Expr::App(UntypedBuiltinFn(func, args), _loc) => Expr::App(
                UntypedBuiltinFn(func, args.into_iter().map(|arg| arg.strip_loc()).collect()),
                loc,
            ),
            Expr::Op1(op, r, _loc) => Expr::Op1(op, Box::new(r.strip_loc()), loc),
            Expr::Op2(op, l, r, _loc) => {
                Expr::Op2(op, Box::new(l.strip_loc()), Box::new(r.strip_loc()), loc)
            }
        }
    }

    pub fn get_loc(&self) -> Loc {
        match self {
            Expr::Const(_, _, loc) => *loc,
            Expr::Str(_, loc) => *loc,
            Expr::Var(_, loc) => *loc,
            Expr::App(_, loc) => *loc,
            Expr::Op1(_, _, loc) => *loc,
            Expr::Op2(_, _, _, loc) => *loc,
        }
    }
}

pub trait Visitor<T> {
    fn walk(&mut self, e: &Expr) -> T;
}

#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Exp,
    Mul,
    Div,
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Neq,
    And,
    Or,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Exp => "^",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Gt => ">",
            BinaryOp::Lt => "<",
            BinaryOp::Gte => ">=",
            BinaryOp::Lte => "<=",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum UnaryOp {
    Positive,
    Negative,
    Not,
}

struct PrintVisitor {}

impl Visitor<String> for PrintVisitor {
    fn walk(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Const(s, _, _) => s.clone(),
            Expr::Str(s, _) => {
                if s.contains('"') {
                    format!("'{s}'")
                } else {
                    format!("\"{s}\"")
                }
            }
            Expr::Var(id, _) => id.clone(),
            Expr::App(UntypedBuiltinFn(func, args), _) => {
                let args: Vec<String> = args.iter().map(|e| self.walk(e)).collect();
                format!("{}({})", func, args.join(", "))
            }
            Expr::Op1(op, l, _) => {
                // Op2 always parenthesizes itself
                let l = self.walk(l);
                let op: &str = match op {
                    UnaryOp::Positive => "+",
                    UnaryOp::Negative => "-",
                    UnaryOp::Not => "!",
                };
                format!("{op}{l}")
            }
            Expr::Op2(op, l, r, _) => {
                let l = self.walk(l);
                let r = self.walk(r);
                format!("({} {} {})", l, op.as_str(), r)
            }
        }
    }
}

/// print_eqn renders an expression fully parenthesized, which is handy
/// for checking how an equation was grouped.
pub fn print_eqn(expr: &Expr) -> String {
    let mut visitor = PrintVisitor {};
    visitor.walk(expr)
}

#[test]
fn test_print_eqn() {
    assert_eq!(
        "(a + b)",
        print_eqn(&Expr::Op2(
            BinaryOp::Add,
            Box::new(Expr::Var("a".to_string(), Loc::new(1, 2))),
            Box::new(Expr::Var("b".to_string(), Loc::new(5, 6))),
            Loc::new(0, 7),
        ))
    );
    assert_eq!(
        "-a",
        print_eqn(&Expr::Op1(
            UnaryOp::Negative,
            Box::new(Expr::Var("a".to_string(), Loc::new(1, 2))),
            Loc::new(0, 2),
        ))
    );
    assert_eq!(
        "d(\"income\")",
        print_eqn(&Expr::App(
            UntypedBuiltinFn(
                "d".to_string(),
                vec![Expr::Str("income".to_string(), Loc::new(2, 10))]
            ),
            Loc::new(0, 11),
        ))
    );
    assert_eq!(
        "elem('a\"b', x)",
        print_eqn(&Expr::App(
            UntypedBuiltinFn(
                "elem".to_string(),
                vec![
                    Expr::Str("a\"b".to_string(), Loc::new(5, 10)),
                    Expr::Var("x".to_string(), Loc::new(12, 13)),
                ]
            ),
            Loc::new(0, 14),
        ))
    );
}
