//! Tree evaluation against a scope chain: variable substitution, lazy operator forms, and
//! multiple-dispatch function overload resolution.

pub(crate) mod builtins;
mod scope;

pub use scope::{Builtin, FnDef, Scope};

use crate::common::Span;
use crate::diagnostics::Diagnostic;
use crate::emit::Emit;
use crate::grammar::*;

use core::fmt;
use std::error::Error;
use std::rc::Rc;

/// An evaluation failure.
#[derive(Clone, Debug, PartialEq)]
pub enum EvalError {
    /// A name with no binding in the scope chain.
    UnboundVariable { name: String },
    /// A function or operator name with no definition at all.
    UnknownFunction {
        name: String,
        /// Set when stripping the leading character leaves a defined function; the common
        /// "typed `xf(y)` meaning `x*f(y)`" mistake.
        implicit_mult_hint: Option<String>,
    },
    /// A defined function, but no overload accepting these argument types.
    NoMatchingOverload { name: String, arg_types: Vec<Type> },
    /// A defined function, but no overload of this arity.
    WrongArity { name: String, got: usize },
    /// A user-raised or domain error from an evaluation procedure.
    Raised { message: String },
    /// A `{...}` segment of a string that could not be compiled or was empty.
    BadInterpolation { segment: String, message: String },
}

impl EvalError {
    /// Lowers the error into a [Diagnostic] anchored at `span` (evaluation is span-free, so
    /// the caller supplies the span of the evaluated source).
    pub fn diagnostic<S: Into<Span>>(&self, span: S) -> Diagnostic {
        let diag = Diagnostic::span_err(span, "Evaluation error", self.to_string());
        match self {
            EvalError::UnknownFunction {
                implicit_mult_hint: Some(hint),
                ..
            } => diag.with_help(format!("did you mean \"{}\"?", hint)),
            _ => diag,
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::UnboundVariable { name } => {
                write!(f, "Variable \"{}\" is not defined", name)
            }
            EvalError::UnknownFunction { name, .. } => {
                write!(f, "Unknown function \"{}\"", name)
            }
            EvalError::NoMatchingOverload { name, arg_types } => {
                let tys = arg_types
                    .iter()
                    .map(|t| t.name())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "No definition of \"{}\" takes arguments ({})", name, tys)
            }
            EvalError::WrongArity { name, got } => {
                write!(f, "Wrong number of arguments to \"{}\" (got {})", name, got)
            }
            EvalError::Raised { message } => write!(f, "{}", message),
            EvalError::BadInterpolation { segment, message } => write!(
                f,
                "Could not evaluate embedded expression \"{{{}}}\": {}",
                segment, message
            ),
        }
    }
}

impl Error for EvalError {}

/// Operator and function names whose arguments are passed unevaluated, so they can
/// short-circuit or introduce scopes of their own.
const LAZY_OPS: &[&str] = &[
    "if", "switch", "map", "filter", "let", "repeat", "set", "dict", "and", "or", "isa",
    "assert", "isset", "safe",
];

/// Evaluates a syntax tree against a scope, producing a tagged result token.
pub fn evaluate(expr: &RcExpr, scope: &Scope) -> Result<RcExpr, EvalError> {
    match &expr.tok {
        Tok::Number(_)
        | Tok::Bool(_)
        | Tok::Set(_)
        | Tok::Vector(_)
        | Tok::Matrix(_)
        | Tok::Range(_)
        | Tok::Expression(_)
        | Tok::List(List::Built(_))
        | Tok::Dict(Dict::Built(_)) => Ok(expr.clone()),
        Tok::Str(s) if s.safe => Ok(expr.clone()),
        Tok::Str(s) => interpolate(s, scope),
        Tok::Name(name) => match scope.resolve_var(&name.name) {
            Some(value) => {
                let value = value.clone();
                evaluate(&value, scope)
            }
            None => Err(EvalError::UnboundVariable {
                name: name.name.clone(),
            }),
        },
        Tok::List(List::Unbuilt(_)) => {
            let items = expr
                .children
                .iter()
                .map(|c| evaluate(c, scope))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::leaf(Tok::List(List::Built(items))))
        }
        Tok::Dict(Dict::Unbuilt(_)) => build_dict(&expr.children, scope),
        Tok::KeyPair(key) => match expr.children.first() {
            Some(value) => Ok(Expr::node(
                Tok::KeyPair(key.clone()),
                vec![evaluate(value, scope)?],
            )),
            None => Ok(expr.clone()),
        },
        Tok::Op(op) => dispatch(&op.name, &expr.children, scope),
        Tok::Func(f) => dispatch(&f.name, &expr.children, scope),
    }
}

/// Substitutes scope variables into a tree without evaluating it.
///
/// When `allow_unbound` is set, names with no binding are left in place with their `unbound`
/// flag raised instead of failing.
pub fn substitute(expr: &RcExpr, scope: &Scope, allow_unbound: bool) -> Result<RcExpr, EvalError> {
    match &expr.tok {
        Tok::Name(name) => match scope.resolve_var(&name.name) {
            Some(value) => Ok(value.clone()),
            None if allow_unbound => Ok(Expr::leaf(Tok::Name(Name {
                unbound: true,
                ..name.clone()
            }))),
            None => Err(EvalError::UnboundVariable {
                name: name.name.clone(),
            }),
        },
        Tok::Expression(_) => Ok(expr.clone()),
        _ => {
            let mut changed = false;
            let mut children = Vec::with_capacity(expr.children.len());
            for child in &expr.children {
                let subbed = substitute(child, scope, allow_unbound)?;
                changed = changed || !Rc::ptr_eq(&subbed, child);
                children.push(subbed);
            }
            if changed {
                Ok(Expr::node(expr.tok.clone(), children))
            } else {
                Ok(expr.clone())
            }
        }
    }
}

fn dispatch(name: &str, args: &[RcExpr], scope: &Scope) -> Result<RcExpr, EvalError> {
    let lname = name.to_lowercase();
    if LAZY_OPS.contains(&lname.as_str()) {
        return eval_lazy(&lname, args, scope);
    }

    let mut vals = Vec::with_capacity(args.len());
    for arg in args {
        vals.push(evaluate(arg, scope)?);
    }

    let defs = scope.collect_fns(&lname);
    if defs.is_empty() {
        return Err(EvalError::UnknownFunction {
            name: name.to_string(),
            implicit_mult_hint: implicit_mult_hint(&lname, scope),
        });
    }
    for def in &defs {
        if def.accepts(&vals) {
            log::trace!("dispatch {} -> overload #{}", lname, def.seq);
            return def.call(&vals, scope);
        }
    }
    if defs.iter().any(|d| d.allows_arity(vals.len())) {
        Err(EvalError::NoMatchingOverload {
            name: name.to_string(),
            arg_types: vals.iter().map(|v| v.tok.ty()).collect(),
        })
    } else {
        Err(EvalError::WrongArity {
            name: name.to_string(),
            got: vals.len(),
        })
    }
}

fn implicit_mult_hint(lname: &str, scope: &Scope) -> Option<String> {
    let mut chars = lname.chars();
    let head = chars.next()?;
    let rest = chars.as_str();
    if rest.is_empty() || scope.collect_fns(rest).is_empty() {
        return None;
    }
    Some(format!("{} * {}(...)", head, rest))
}

fn expect_arity(name: &str, args: &[RcExpr], n: usize) -> Result<(), EvalError> {
    if args.len() == n {
        Ok(())
    } else {
        Err(EvalError::WrongArity {
            name: name.to_string(),
            got: args.len(),
        })
    }
}

fn eval_bool(name: &str, arg: &RcExpr, scope: &Scope) -> Result<bool, EvalError> {
    let value = evaluate(arg, scope)?;
    value.as_bool().ok_or_else(|| EvalError::NoMatchingOverload {
        name: name.to_string(),
        arg_types: vec![value.tok.ty()],
    })
}

fn eval_lazy(name: &str, args: &[RcExpr], scope: &Scope) -> Result<RcExpr, EvalError> {
    match name {
        "if" => {
            expect_arity(name, args, 3)?;
            if eval_bool(name, &args[0], scope)? {
                evaluate(&args[1], scope)
            } else {
                evaluate(&args[2], scope)
            }
        }
        "switch" => {
            let mut i = 0;
            while i + 1 < args.len() {
                if eval_bool(name, &args[i], scope)? {
                    return evaluate(&args[i + 1], scope);
                }
                i += 2;
            }
            match args.len() % 2 {
                1 => evaluate(&args[args.len() - 1], scope),
                _ => Err(EvalError::Raised {
                    message: "no case of switch matched and no default was given".into(),
                }),
            }
        }
        "map" | "filter" => eval_mapping(name, args, scope),
        "let" => eval_let(args, scope),
        "repeat" => {
            expect_arity(name, args, 2)?;
            let count = evaluate(&args[1], scope)?;
            let count = match count.as_number() {
                Some(n) if n.is_int() && n.re >= 0. => n.re as usize,
                _ => {
                    return Err(EvalError::NoMatchingOverload {
                        name: name.to_string(),
                        arg_types: vec![count.tok.ty()],
                    })
                }
            };
            // The body re-evaluates once per repetition, so random values differ.
            let items = (0..count)
                .map(|_| evaluate(&args[0], scope))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::leaf(Tok::List(List::Built(items))))
        }
        "set" => {
            let mut items = Vec::new();
            for arg in args {
                items.push(evaluate(arg, scope)?);
            }
            // set(collection) unwraps into the collection's elements.
            if items.len() == 1 {
                if let Some(inner) = collection_items(&items[0]) {
                    items = inner;
                }
            }
            let mut distinct: Vec<RcExpr> = Vec::with_capacity(items.len());
            for item in items {
                if !distinct.iter().any(|d| value_eq(d, &item)) {
                    distinct.push(item);
                }
            }
            Ok(Expr::leaf(Tok::Set(distinct)))
        }
        "dict" => build_dict(args, scope),
        "and" => {
            expect_arity(name, args, 2)?;
            if !eval_bool(name, &args[0], scope)? {
                return Ok(Expr::boolean(false));
            }
            Ok(Expr::boolean(eval_bool(name, &args[1], scope)?))
        }
        "or" => {
            expect_arity(name, args, 2)?;
            if eval_bool(name, &args[0], scope)? {
                return Ok(Expr::boolean(true));
            }
            Ok(Expr::boolean(eval_bool(name, &args[1], scope)?))
        }
        "isa" => {
            expect_arity(name, args, 2)?;
            let expected = match &args[1].tok {
                Tok::Str(s) => s.value.clone(),
                Tok::Name(n) => n.name.clone(),
                tok => {
                    return Err(EvalError::NoMatchingOverload {
                        name: name.to_string(),
                        arg_types: vec![tok.ty()],
                    })
                }
            };
            let expected = expected.to_lowercase();
            match evaluate(&args[0], scope) {
                Ok(value) => Ok(Expr::boolean(value.tok.ty().name() == expected)),
                // An unbound name is still a name.
                Err(EvalError::UnboundVariable { .. }) => Ok(Expr::boolean(expected == "name")),
                Err(err) => Err(err),
            }
        }
        "assert" => {
            expect_arity(name, args, 2)?;
            if eval_bool(name, &args[0], scope)? {
                Ok(Expr::boolean(true))
            } else {
                let message = evaluate(&args[1], scope)?;
                Err(EvalError::Raised {
                    message: display_value(&message),
                })
            }
        }
        "isset" => {
            expect_arity(name, args, 1)?;
            match &args[0].tok {
                Tok::Name(n) => Ok(Expr::boolean(scope.has_var(&n.name))),
                tok => Err(EvalError::NoMatchingOverload {
                    name: name.to_string(),
                    arg_types: vec![tok.ty()],
                }),
            }
        }
        "safe" => {
            expect_arity(name, args, 1)?;
            match &args[0].tok {
                Tok::Str(s) => Ok(Expr::leaf(Tok::Str(Str {
                    safe: true,
                    ..s.clone()
                }))),
                tok => Err(EvalError::NoMatchingOverload {
                    name: name.to_string(),
                    arg_types: vec![tok.ty()],
                }),
            }
        }
        _ => unreachable!("not a lazy operation: {}", name),
    }
}

fn eval_mapping(which: &str, args: &[RcExpr], scope: &Scope) -> Result<RcExpr, EvalError> {
    expect_arity(which, args, 3)?;
    let var = match &args[1].tok {
        Tok::Name(n) => n.name.clone(),
        tok => {
            return Err(EvalError::NoMatchingOverload {
                name: which.to_string(),
                arg_types: vec![tok.ty()],
            })
        }
    };
    let collection = evaluate(&args[2], scope)?;
    let items = collection_items(&collection).ok_or_else(|| EvalError::NoMatchingOverload {
        name: which.to_string(),
        arg_types: vec![collection.tok.ty()],
    })?;

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let mut body_scope = scope.child();
        body_scope.set_var(&var, item.clone());
        let value = evaluate(&args[0], &body_scope)?;
        match which {
            "map" => out.push(value),
            _ => {
                if value.as_bool() == Some(true) {
                    out.push(item);
                }
            }
        }
    }
    Ok(Expr::leaf(Tok::List(List::Built(out))))
}

fn eval_let(args: &[RcExpr], scope: &Scope) -> Result<RcExpr, EvalError> {
    let mut body_scope = scope.child();
    match args.len() {
        // let(dict, body)
        2 => {
            let bindings = evaluate(&args[0], scope)?;
            match &bindings.tok {
                Tok::Dict(Dict::Built(map)) => {
                    for (k, v) in map {
                        body_scope.set_var(k.clone(), v.clone());
                    }
                }
                tok => {
                    return Err(EvalError::NoMatchingOverload {
                        name: "let".into(),
                        arg_types: vec![tok.ty()],
                    })
                }
            }
        }
        // let(name1, value1, ..., body) — later values see earlier bindings.
        n if n % 2 == 1 && n >= 3 => {
            for pair in args[..n - 1].chunks_exact(2) {
                let name = match &pair[0].tok {
                    Tok::Name(name) => name.name.clone(),
                    tok => {
                        return Err(EvalError::NoMatchingOverload {
                            name: "let".into(),
                            arg_types: vec![tok.ty()],
                        })
                    }
                };
                let value = evaluate(&pair[1], &body_scope)?;
                body_scope.set_var(name, value);
            }
        }
        n => {
            return Err(EvalError::WrongArity {
                name: "let".into(),
                got: n,
            })
        }
    }
    evaluate(&args[args.len() - 1], &body_scope)
}

fn build_dict(entries: &[RcExpr], scope: &Scope) -> Result<RcExpr, EvalError> {
    let mut map = std::collections::BTreeMap::new();
    for entry in entries {
        match (&entry.tok, entry.children.first()) {
            (Tok::KeyPair(key), Some(value)) => {
                map.insert(key.clone(), evaluate(value, scope)?);
            }
            _ => {
                return Err(EvalError::NoMatchingOverload {
                    name: "dict".into(),
                    arg_types: vec![entry.tok.ty()],
                })
            }
        }
    }
    Ok(Expr::leaf(Tok::Dict(Dict::Built(map))))
}

/// The elements of a collection value, realized as trees.
pub(crate) fn collection_items(expr: &RcExpr) -> Option<Vec<RcExpr>> {
    match &expr.tok {
        Tok::List(List::Built(items)) => Some(items.clone()),
        Tok::Set(items) => Some(items.clone()),
        Tok::Range(r) => Some(r.items().into_iter().map(Expr::number).collect()),
        Tok::Vector(ns) => Some(ns.iter().map(|&n| Expr::leaf(Tok::Number(n))).collect()),
        _ => None,
    }
}

/// Converts an evaluated token to display text: strings yield their value, everything else
/// its pretty emit.
pub(crate) fn display_value(expr: &RcExpr) -> String {
    match &expr.tok {
        Tok::Str(s) => s.value.replace("\\{", "{").replace("\\}", "}"),
        _ => expr.emit_pretty(),
    }
}

/// Expands a non-safe string by compiling and evaluating each brace-delimited sub-expression
/// and splicing in its display text.
fn interpolate(s: &Str, scope: &Scope) -> Result<RcExpr, EvalError> {
    let finish = |value: String| {
        Ok(Expr::leaf(Tok::Str(Str {
            value,
            safe: true,
            latex: s.latex,
        })))
    };
    if !s.value.contains('{') {
        return finish(s.value.clone());
    }

    let mut out = String::with_capacity(s.value.len());
    let mut chars = s.value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                // An escaped brace is literal text, not a sub-expression.
                Some(b @ ('{' | '}')) => {
                    out.push('\\');
                    out.push(b);
                }
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            },
            '{' => {
                let mut depth = 1;
                let mut segment = String::new();
                for inner in &mut chars {
                    match inner {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    segment.push(inner);
                }
                if depth != 0 {
                    return Err(EvalError::BadInterpolation {
                        segment,
                        message: "missing closing '}'".into(),
                    });
                }
                let tree = crate::compile(&segment)
                    .map_err(|err| EvalError::BadInterpolation {
                        segment: segment.clone(),
                        message: err.to_string(),
                    })?
                    .ok_or_else(|| EvalError::BadInterpolation {
                        segment: segment.clone(),
                        message: "the expression is empty".into(),
                    })?;
                let value = evaluate(&tree, scope)?;
                out.push_str(&display_value(&value));
            }
            _ => out.push(c),
        }
    }
    finish(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(program: &str) -> Result<RcExpr, EvalError> {
        let tree = crate::compile(program).unwrap().unwrap();
        evaluate(&tree, &Scope::base())
    }

    macro_rules! evaluator_tests {
        ($($name:ident: $program:expr, $result:expr)*) => {$(
            #[test]
            fn $name() {
                match eval($program) {
                    Ok(value) => assert_eq!(value.emit_pretty(), $result),
                    Err(err) => panic!("evaluation failed: {}", err),
                }
            }
        )*};
    }

    mod values {
        use super::*;

        evaluator_tests! {
            arithmetic:         "1+2*3",                        "7"
            precedence_group:   "(1+2)*3",                      "9"
            division:           "1/2",                          "0.5"
            exponent:           "2^10",                         "1024"
            unary:              "-2^2",                         "-4"
            factorial:          "5!",                           "120"
            modulo:             "mod(-1, 3)",                   "2"
            implicit_mult:      "2(3+4)",                       "14"
            complex_product:    "(1+2i)*(1-2i)",                "5"
            sqrt_negative:      "sqrt(-4)",                     "2i"

            comparison:         "1+1 <= 2",                     "true"
            equality_mixed:     "\"a\" = 1",                    "false"
            boolean_tower:      "true and not false",           "true"
            xor:                "true xor true",                "false"
            implies:            "false implies false",          "true"
            isa_number:         "1 isa \"number\"",             "true"
            isa_unbound_name:   "zzz isa \"name\"",             "true"

            list_literal:       "[1, 2, 1+2]",                  "[1, 2, 3]"
            list_index:         "[1,2,3][1]",                   "2"
            list_index_neg:     "[1,2,3][-1]",                  "3"
            list_slice:         "[1,2,3,4][1..2]",              "[2, 3]"
            list_len:           "len([1,2,3])",                 "3"
            list_sum:           "sum([1,2,3])",                 "6"
            list_sort:          "sort([3,1,2])",                "[1, 2, 3]"
            list_distinct:      "distinct([1,1,2,1])",          "[1, 2]"
            list_join:          "join([1,2], \"-\")",           "\"1-2\""
            list_concat:        "[1] + [2]",                    "[1, 2]"

            dict_literal:       "[\"a\": 1, \"b\": 2]",         "[\"a\": 1, \"b\": 2]"
            dict_index:         "[\"a\": 1][\"a\"]",            "1"
            dict_keys:          "keys([\"b\": 1, \"a\": 2])",   "[\"a\", \"b\"]"
            dict_get_default:   "get(dict(), \"k\", 0)",        "0"

            range_build:        "list(1..4)",                   "[1, 2, 3, 4]"
            range_step:         "list(1..6#2)",                 "[1, 3, 5]"
            range_in:           "3 in 1..5",                    "true"
            range_except:       "list((1..5) except 3)",        "[1, 2, 4, 5]"

            set_dedup:          "set(1, 2, 1)",                 "set(1, 2)"
            set_union:          "union(set(1), set(2))",        "set(1, 2)"
            set_intersection:   "intersection(set(1,2), set(2,3))", "set(2)"

            vector_add:         "vector(1,2) + vector(3,4)",    "vector(4, 6)"
            vector_dot:         "dot(vector(1,2), vector(3,4))", "11"
            matrix_det:         "det(matrix([1,2],[3,4]))",     "-2"
            matrix_transpose:   "transpose(matrix([1,2],[3,4]))", "matrix([1, 3], [2, 4])"
            matrix_identity:    "id(2)",                        "matrix([1, 0], [0, 1])"

            string_upper:       "upper(\"ab\")",                "\"AB\""
            string_split:       "split(\"a,b\", \",\")",        "[\"a\", \"b\"]"
            string_number:      "number(\"42\") + 1",           "43"
            string_interp:      "\"two is {1+1}\"",             "\"two is 2\""
            string_interp_var:  "let(x, 3, \"x is {x}\")",      "\"x is 3\""
            safe_no_interp:     "safe(\"{1+1}\")",              "\"{1+1}\""

            lazy_if:            "if(1 < 2, \"y\", \"n\")",      "\"y\""
            lazy_switch:        "switch(false, 1, true, 2, 3)", "2"
            lazy_switch_default: "switch(false, 1, 9)",         "9"
            short_circuit_and:  "false and assert(false, \"boom\")", "false"
            short_circuit_or:   "true or assert(false, \"boom\")",   "true"
            let_pairs:          "let(a, 2, b, a+1, a*b)",       "6"
            let_dict:           "let([\"a\": 5], a + 1)",       "6"
            map_over_range:     "map(x^2, x, 1..4)",            "[1, 4, 9, 16]"
            filter_list:        "filter(x > 1, x, [1,2,3])",    "[2, 3]"
            repeat_value:       "repeat(7, 3)",                 "[7, 7, 7]"
            isset_unset:        "isset(q)",                     "false"

            metaprogramming:    "eval(expression(\"1+2\"))",    "3"
            type_of:            "type([1])",                    "\"list\""
            min_max:            "min(3, 2) + max(1, 5)",        "7"
            gcd:                "gcd(12, 18)",                  "6"
            precround:          "precround(1.2345, 2)",         "1.23"
        }
    }

    mod determinism {
        use super::*;

        #[test]
        fn same_tree_same_scope_same_result() {
            let tree = crate::compile("map(x^2 + 1, x, 1..10)").unwrap().unwrap();
            let base = Scope::base();
            let a = evaluate(&tree, &base).unwrap();
            let b = evaluate(&tree, &base).unwrap();
            assert!(value_eq(&a, &b));
        }

        #[test]
        fn earliest_registered_overload_wins() {
            fn one(_: &[RcExpr], _: &Scope) -> Result<RcExpr, EvalError> {
                Ok(Expr::number(1.))
            }
            fn two(_: &[RcExpr], _: &Scope) -> Result<RcExpr, EvalError> {
                Ok(Expr::number(2.))
            }

            let mut base = Scope::base();
            base.register_fn(FnDef::new("pick", vec![Sig::Any], Type::Number, one));
            base.register_fn(FnDef::new("pick", vec![Sig::Of(Type::Number)], Type::Number, two));

            let tree = crate::compile("pick(5)").unwrap().unwrap();
            for _ in 0..4 {
                let value = evaluate(&tree, &base).unwrap();
                assert_eq!(value.emit_pretty(), "1");
            }
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn unbound_variable() {
            assert_eq!(
                eval("x + 1"),
                Err(EvalError::UnboundVariable { name: "x".into() })
            );
        }

        #[test]
        fn unknown_function_suggests_implicit_mult() {
            match eval("xsin(1)") {
                Err(EvalError::UnknownFunction {
                    name,
                    implicit_mult_hint: Some(hint),
                }) => {
                    assert_eq!(name, "xsin");
                    assert_eq!(hint, "x * sin(...)");
                }
                other => panic!("expected unknown function with hint, got {:?}", other),
            }
        }

        #[test]
        fn no_matching_overload() {
            assert!(matches!(
                eval("1 + \"a\""),
                Err(EvalError::NoMatchingOverload { .. })
            ));
        }

        #[test]
        fn wrong_arity() {
            assert!(matches!(
                eval("sin(1, 2)"),
                Err(EvalError::WrongArity { got: 2, .. })
            ));
        }

        #[test]
        fn assert_raises_evaluated_message() {
            assert_eq!(
                eval("assert(1 > 2, \"one is {1}\")"),
                Err(EvalError::Raised {
                    message: "one is 1".into()
                })
            );
        }

        #[test]
        fn bad_interpolation() {
            assert!(matches!(
                eval("\"value: {1 +}\""),
                Err(EvalError::BadInterpolation { .. })
            ));
        }
    }

    mod substitution {
        use super::*;

        #[test]
        fn bound_names_replaced_unbound_flagged() {
            let tree = crate::compile("x + y").unwrap().unwrap();
            let mut scope = Scope::new();
            scope.set_var("x", Expr::number(3.));

            let subbed = substitute(&tree, &scope, true).unwrap();
            assert_eq!(subbed.emit_pretty(), "3 + y");
            match &subbed.children[1].tok {
                Tok::Name(n) => assert!(n.unbound),
                tok => panic!("expected name, got {:?}", tok),
            }

            assert!(matches!(
                substitute(&tree, &scope, false),
                Err(EvalError::UnboundVariable { .. })
            ));
        }

        #[test]
        fn substitution_shares_unchanged_subtrees() {
            let tree = crate::compile("(a + 1) * 2").unwrap().unwrap();
            let scope = Scope::new();
            let subbed = substitute(&tree, &scope, true).unwrap();
            // `a` is unbound, so nothing changed and the original tree is reused.
            assert!(Rc::ptr_eq(&tree.children[1], &subbed.children[1]));
        }
    }
}
