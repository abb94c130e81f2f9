//! Module `collectors` provides utilities for collecting items in a QEL syntax tree.

use crate::grammar::{Expr, RcExpr, Tok};

use std::collections::HashSet;

/// Collects the free variable names referenced by an expression, case-folded.
///
/// Binding constructs are respected: the iteration name of a `map`/`filter` body and the
/// names introduced by a `let` are not free in the subtrees they scope over, and the right
/// side of a `;` capture binding is a binder, not a use.
pub fn collect_free_vars(expr: &RcExpr) -> HashSet<String> {
    let mut vars = HashSet::new();
    walk(expr, &HashSet::new(), &mut vars);
    vars
}

fn walk(expr: &RcExpr, bound: &HashSet<String>, vars: &mut HashSet<String>) {
    match &expr.tok {
        Tok::Name(name) => {
            if name.name == "?" || name.name == "??" {
                return;
            }
            let folded = name.name.to_lowercase();
            if !bound.contains(&folded) {
                vars.insert(folded);
            }
        }
        Tok::Op(op) if op.name == ";" && expr.children.len() == 2 => {
            // `pattern ; capture` — the capture name is a binder.
            walk(&expr.children[0], bound, vars);
        }
        Tok::Func(f) if is_mapping(&f.name) && expr.children.len() == 3 => {
            walk(&expr.children[2], bound, vars);
            let mut inner = bound.clone();
            inner.extend(binder_names(&expr.children[1]));
            walk(&expr.children[0], &inner, vars);
        }
        Tok::Func(f) if f.name.eq_ignore_ascii_case("let") => {
            // let(n1, v1, ..., nk, vk, body): each value sees the names bound before it.
            let mut inner = bound.clone();
            let mut chunks = expr.children.chunks_exact(2);
            for pair in &mut chunks {
                walk(&pair[1], &inner, vars);
                inner.extend(binder_names(&pair[0]));
            }
            for body in chunks.remainder() {
                walk(body, &inner, vars);
            }
        }
        _ => {
            for child in &expr.children {
                walk(child, bound, vars);
            }
        }
    }
}

fn is_mapping(name: &str) -> bool {
    name.eq_ignore_ascii_case("map") || name.eq_ignore_ascii_case("filter")
}

fn binder_names(expr: &Expr) -> Vec<String> {
    match &expr.tok {
        Tok::Name(name) => vec![name.name.to_lowercase()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use crate::compile;

    fn free_vars(program: &str) -> Vec<String> {
        let parsed = compile(program).unwrap().unwrap();
        let mut vars: Vec<_> = super::collect_free_vars(&parsed).into_iter().collect();
        vars.sort();
        vars
    }

    macro_rules! collect_tests {
        ($($name:ident: $program:expr => [$($var:expr),*])*) => {$(
            #[test]
            fn $name() {
                assert_eq!(free_vars($program), vec![$($var.to_string()),*] as Vec<String>);
            }
        )*};
    }

    collect_tests! {
        simple:          "a + b * c"                      => ["a", "b", "c"]
        repeated:        "a + a / A"                      => ["a"]
        map_binder:      "map(x + y, x, 1..n)"            => ["n", "y"]
        filter_binder:   "filter(x > lo, x, items)"       => ["items", "lo"]
        let_binder:      "let(a, b + 1, a * c)"           => ["b", "c"]
        let_sequential:  "let(a, 1, b, a + z, a + b)"     => ["z"]
        capture_binder:  "(m_number;n) + k"               => ["k", "m_number"]
        wildcards:       "? + ?? + w"                     => ["w"]
        no_vars:         "1 + 2 * 3"                      => []
    }
}
