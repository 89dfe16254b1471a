//! Parametric trajectory expressions.
//!
//! Segments are given as textual functions of `t` over `+ - * / ^` with
//! `^` meaning power. They are parsed once into a small AST, differentiated
//! symbolically, and evaluated per sample.

use crate::error::{Result, StrataError};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f64),
    T,
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
}

peg::parser! {
    grammar trajectory() for str {
        rule _ = [' ' | '\t']*

        rule number() -> Expr
            = n:$(['0'..='9']+ ("." ['0'..='9']*)?) {?
                n.parse().map(Expr::Const).or(Err("number"))
            }

        rule expr() -> Expr = precedence! {
            x:(@) _ "+" _ y:@ { Expr::Add(Box::new(x), Box::new(y)) }
            x:(@) _ "-" _ y:@ { Expr::Sub(Box::new(x), Box::new(y)) }
            --
            x:(@) _ "*" _ y:@ { Expr::Mul(Box::new(x), Box::new(y)) }
            x:(@) _ "/" _ y:@ { Expr::Div(Box::new(x), Box::new(y)) }
            --
            "-" _ x:@ { Expr::Neg(Box::new(x)) }
            --
            // Right-associative; a negated exponent is legal.
            x:@ _ "^" _ "-" _ y:(@) { Expr::Pow(Box::new(x), Box::new(Expr::Neg(Box::new(y)))) }
            x:@ _ "^" _ y:(@) { Expr::Pow(Box::new(x), Box::new(y)) }
            --
            n:number() { n }
            "t" { Expr::T }
            "(" _ e:expr() _ ")" { e }
        }

        pub rule expression() -> Expr = _ e:expr() _ ![_] { e }
    }
}

impl Expr {
    pub fn parse(text: &str) -> Result<Expr> {
        trajectory::expression(text).map_err(|e| StrataError::Expression {
            expr: text.to_string(),
            message: e.to_string(),
        })
    }

    pub fn eval(&self, t: f64) -> f64 {
        match self {
            Expr::Const(c) => *c,
            Expr::T => t,
            Expr::Add(a, b) => a.eval(t) + b.eval(t),
            Expr::Sub(a, b) => a.eval(t) - b.eval(t),
            Expr::Mul(a, b) => a.eval(t) * b.eval(t),
            Expr::Div(a, b) => a.eval(t) / b.eval(t),
            Expr::Pow(a, b) => a.eval(t).powf(b.eval(t)),
            Expr::Neg(a) => -a.eval(t),
        }
    }

    /// Symbolic derivative with respect to `t`.
    pub fn diff(&self) -> Expr {
        match self {
            Expr::Const(_) => Expr::Const(0.0),
            Expr::T => Expr::Const(1.0),
            Expr::Add(a, b) => Expr::Add(Box::new(a.diff()), Box::new(b.diff())),
            Expr::Sub(a, b) => Expr::Sub(Box::new(a.diff()), Box::new(b.diff())),
            Expr::Mul(a, b) => Expr::Add(
                Box::new(Expr::Mul(Box::new(a.diff()), b.clone())),
                Box::new(Expr::Mul(a.clone(), Box::new(b.diff()))),
            ),
            Expr::Div(a, b) => Expr::Div(
                Box::new(Expr::Sub(
                    Box::new(Expr::Mul(Box::new(a.diff()), b.clone())),
                    Box::new(Expr::Mul(a.clone(), Box::new(b.diff()))),
                )),
                Box::new(Expr::Mul(b.clone(), b.clone())),
            ),
            // Power rule, b a^(b-1) a', with the exponent treated as t-free.
            Expr::Pow(a, b) => Expr::Mul(
                Box::new(Expr::Mul(
                    b.clone(),
                    Box::new(Expr::Pow(
                        a.clone(),
                        Box::new(Expr::Sub(b.clone(), Box::new(Expr::Const(1.0)))),
                    )),
                )),
                Box::new(a.diff()),
            ),
            Expr::Neg(a) => Expr::Neg(Box::new(a.diff())),
        }
    }
}
