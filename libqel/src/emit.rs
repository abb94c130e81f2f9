//! Emit strategies for the libqel grammar IR.
//!
//! Pretty emission is the inverse of parsing up to literal formatting: re-scanning a pretty
//! emit yields a tree that evaluates to the same result. It is also what rewrite-loop
//! fingerprints and diagnostic messages are built from.

use crate::grammar::*;
use crate::utils::display_float;

use core::fmt;

/// The format in which a QEL tree should be emitted.
#[derive(Copy, Clone)]
pub enum EmitFormat {
    /// Canonical, human-readable form.
    /// For example, `1+1` is output as `1 + 1`.
    Pretty,
    /// S-expression form.
    /// For example, `1+1` is output as `(+ 1 1)`.
    SExpression,
    /// QEL internal debug form.
    /// NB: this form is not stable, and no assumptions should be made about it.
    Debug,
}

/// Implements the emission of a type in an [EmitFormat].
pub trait Emit
where
    Self: fmt::Debug,
{
    /// Emit `self` with the given [EmitFormat].
    fn emit(&self, form: EmitFormat) -> String {
        match form {
            EmitFormat::Pretty => self.emit_pretty(),
            EmitFormat::SExpression => self.emit_s_expression(),
            EmitFormat::Debug => self.emit_debug(),
        }
    }

    /// Emit `self` with the [pretty emit format][EmitFormat::Pretty]
    fn emit_pretty(&self) -> String;

    /// Emit `self` with the [s_expression emit format][EmitFormat::SExpression]
    fn emit_s_expression(&self) -> String;

    /// Emit `self` with the [debug emit format][EmitFormat::Debug]
    fn emit_debug(&self) -> String {
        format!("{:#?}", self)
    }
}

/// Implements `core::fmt::Display` for a type implementing `Emit`.
macro_rules! fmt_emit_impl {
    ($S:path) => {
        impl core::fmt::Display for $S {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.emit_pretty())
            }
        }
    };
}

fmt_emit_impl!(Expr);

/// The precedence a subtree re-scans at, used to decide explicit grouping. Negative and
/// complex numerals re-scan as operator applications, so they carry the precedence of the
/// application they re-scan as.
fn rescan_prec(expr: &Expr) -> Option<u8> {
    match &expr.tok {
        Tok::Op(op) => Some(precedence(&op.name)),
        Tok::Number(n) if !n.is_real() => Some(if n.re == 0. { 3 } else { 5 }),
        Tok::Number(n) if n.re < 0. => Some(4),
        _ => None,
    }
}

fn needs_group(child: &Expr, parent_prec: u8, right_child: bool, parent_right_assoc: bool) -> bool {
    match rescan_prec(child) {
        Some(cp) => cp > parent_prec || (cp == parent_prec && (right_child != parent_right_assoc)),
        None => false,
    }
}

fn group(child: &Expr, parent_prec: u8, right_child: bool, parent_right_assoc: bool) -> String {
    let inner = child.emit_pretty();
    if needs_group(child, parent_prec, right_child, parent_right_assoc) {
        format!("({})", inner)
    } else {
        inner
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn comma_join(items: &[RcExpr], form: EmitFormat) -> String {
    items
        .iter()
        .map(|c| c.emit(form))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Emit for Expr {
    fn emit_pretty(&self) -> String {
        match &self.tok {
            Tok::Number(n) => n.to_string(),
            Tok::Bool(b) => b.to_string(),
            Tok::Str(s) => quote(&s.value),
            Tok::Name(name) => {
                let mut out = String::new();
                for ann in &name.annotations {
                    out.push_str(ann);
                    out.push(':');
                }
                out.push_str(&name.name);
                out
            }
            Tok::KeyPair(key) => format!(
                "{}: {}",
                quote(key),
                self.children
                    .first()
                    .map(|v| v.emit_pretty())
                    .unwrap_or_default()
            ),
            Tok::List(List::Built(items)) => format!("[{}]", comma_join(items, EmitFormat::Pretty)),
            Tok::List(List::Unbuilt(_)) => {
                format!("[{}]", comma_join(&self.children, EmitFormat::Pretty))
            }
            Tok::Dict(Dict::Built(map)) => {
                if map.is_empty() {
                    return "dict()".to_string();
                }
                let entries = map
                    .iter()
                    .map(|(k, v)| format!("{}: {}", quote(k), v.emit_pretty()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("[{}]", entries)
            }
            Tok::Dict(Dict::Unbuilt(_)) => {
                format!("[{}]", comma_join(&self.children, EmitFormat::Pretty))
            }
            Tok::Set(items) => format!("set({})", comma_join(items, EmitFormat::Pretty)),
            Tok::Vector(ns) => format!(
                "vector({})",
                ns.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", ")
            ),
            Tok::Matrix(m) => {
                let rows = (0..m.rows)
                    .map(|r| {
                        format!(
                            "[{}]",
                            m.row(r)
                                .iter()
                                .map(|n| n.to_string())
                                .collect::<Vec<_>>()
                                .join(", ")
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("matrix({})", rows)
            }
            Tok::Range(r) => {
                let mut out = format!("{}..{}", display_float(r.start), display_float(r.end));
                if r.step != 1. {
                    out.push('#');
                    out.push_str(&display_float(r.step));
                }
                out
            }
            Tok::Expression(inner) => format!("expression({})", quote(&inner.emit_pretty())),
            Tok::Func(f) => format!("{}({})", f.name, comma_join(&self.children, EmitFormat::Pretty)),
            Tok::Op(op) => self.emit_op_pretty(op),
        }
    }

    fn emit_s_expression(&self) -> String {
        let head_children = |head: &str, children: &[RcExpr]| {
            let mut out = format!("({}", head);
            for c in children {
                out.push(' ');
                out.push_str(&c.emit_s_expression());
            }
            out.push(')');
            out
        };
        match &self.tok {
            Tok::Number(n) => n.to_string(),
            Tok::Bool(b) => b.to_string(),
            Tok::Str(s) => quote(&s.value),
            Tok::Name(_) => self.emit_pretty(),
            Tok::KeyPair(key) => {
                head_children(&format!(": {}", quote(key)), &self.children)
            }
            Tok::List(List::Built(items)) => head_children("list", items),
            Tok::List(List::Unbuilt(_)) => head_children("list", &self.children),
            Tok::Dict(Dict::Built(map)) => {
                let mut out = String::from("(dict");
                for (k, v) in map {
                    out.push_str(&format!(" ({} {})", quote(k), v.emit_s_expression()));
                }
                out.push(')');
                out
            }
            Tok::Dict(Dict::Unbuilt(_)) => head_children("dict", &self.children),
            Tok::Set(items) => head_children("set", items),
            Tok::Vector(_) | Tok::Matrix(_) | Tok::Range(_) => self.emit_pretty(),
            Tok::Expression(inner) => format!("(expression {})", inner.emit_s_expression()),
            Tok::Func(f) => head_children(&f.name, &self.children),
            Tok::Op(op) => head_children(&op.name, &self.children),
        }
    }
}

impl Expr {
    fn emit_op_pretty(&self, op: &Op) -> String {
        let prec = precedence(&op.name);
        if op.prefix {
            let arg = self
                .children
                .first()
                .map(|c| group(c, prec, true, true))
                .unwrap_or_default();
            return match op.name.as_str() {
                "+u" => format!("+{}", arg),
                "-u" => format!("-{}", arg),
                _ => format!("{} {}", op.name, arg),
            };
        }
        if op.postfix {
            let arg = self
                .children
                .first()
                .map(|c| group(c, prec, false, false))
                .unwrap_or_default();
            return match op.name.as_str() {
                "fact" => format!("{}!", arg),
                _ => format!("{}{}", arg, op.name),
            };
        }
        if self.children.len() != 2 {
            // A malformed application; fall back to call syntax rather than guessing.
            return format!("{}({})", op.name, comma_join(&self.children, EmitFormat::Pretty));
        }
        let right_assoc = is_right_assoc(&op.name);
        let lhs = group(&self.children[0], prec, false, right_assoc);
        let rhs = group(&self.children[1], prec, true, right_assoc);
        match op.name.as_str() {
            // These bind so tightly they are conventionally written without spaces.
            ".." | "#" | ";" => format!("{}{}{}", lhs, op.name, rhs),
            name => format!("{} {} {}", lhs, name, rhs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Emit;
    use crate::{parse, scan};

    fn pretty(program: &str) -> String {
        parse(scan(program).unwrap()).unwrap().unwrap().emit_pretty()
    }

    macro_rules! emit_pretty_tests {
        ($($name:ident: $program:expr, $expected:expr)*) => {$(
            #[test]
            fn $name() {
                assert_eq!(pretty($program), $expected);
            }
        )*};
    }

    emit_pretty_tests! {
        flat_sum:           "1+2+3",        "1 + 2 + 3"
        parens_needed:      "(1+2)*3",      "(1 + 2) * 3"
        parens_dropped:     "(1*2)+3",      "1 * 2 + 3"
        right_assoc_exp:    "2^(3^2)",      "2 ^ 3 ^ 2"
        left_grouped_exp:   "(2^3)^2",      "(2 ^ 3) ^ 2"
        sub_right_grouped:  "1-(2-3)",      "1 - (2 - 3)"
        unary:              "-x^2",         "-x ^ 2"
        unary_grouped:      "(-x)^2",       "(-x) ^ 2"
        factorial:          "(n+1)!",       "(n + 1)!"
        keyword_ops:        "a and not b",  "a and not b"
        range_tight:        "1..5#2",       "1..5#2"
        binding_tight:      "?;x + 0",      "?;x + 0"
        call:               "f(x, y+1)",    "f(x, y + 1)"
        index:              "[1,2,3][1]",   "listval([1, 2, 3], 1)"
        dict_literal:       r#"["a": 1]"#,  "[\"a\": 1]"
        string_escapes:     r#"'say "hi"'"#, r#""say \"hi\"""#
    }

    #[test]
    fn pretty_emit_reparses() {
        for program in &[
            "1 + 2 * 3",
            "-x^2 + (a + b) * c",
            "[1, 2, [3, 4]][1]",
            r#"["k": 1 + 2]"#,
            "map(x^2, x, 1..5)",
            "a and b or not c",
            "(n + 1)! / n!",
        ] {
            let once = pretty(program);
            let twice = parse(scan(once.clone()).unwrap()).unwrap().unwrap().emit_pretty();
            assert_eq!(once, twice);
        }
    }
}
