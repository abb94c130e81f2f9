//! The built-in function registry.
//!
//! Every definition is one overload: a signature of type tags plus an evaluation procedure
//! over already-evaluated argument tokens. Overload resolution scans definitions in
//! declaration order, so the order of the table below is part of the dispatch contract.

use super::scope::{FnDef, Scope};
use super::{collection_items, display_value, evaluate, EvalError};
use crate::emit::Emit;
use crate::grammar::*;
use crate::math::{self, Matrix, Number};

use rand::seq::SliceRandom;
use std::collections::BTreeMap;

const NUM: Sig = Sig::Of(Type::Number);
const STR: Sig = Sig::Of(Type::Str);
const BOOL: Sig = Sig::Of(Type::Bool);
const LIST: Sig = Sig::Of(Type::List);
const DICT: Sig = Sig::Of(Type::Dict);
const SET: Sig = Sig::Of(Type::Set);
const VEC: Sig = Sig::Of(Type::Vector);
const MAT: Sig = Sig::Of(Type::Matrix);
const RANGE: Sig = Sig::Of(Type::Range);
const EXPR: Sig = Sig::Of(Type::Expression);
const ANY: Sig = Sig::Any;
const NUMS: Sig = Sig::Star(Type::Number);
const LISTS: Sig = Sig::Star(Type::List);

macro_rules! fn_out {
    (any) => {
        None::<Type>
    };
    ($t:ident) => {
        Type::$t
    };
}

macro_rules! define_builtins {
    ($scope:ident { $($name:literal ($($slot:expr),*) -> $out:ident => $f:ident $(, $attr:ident)?;)* }) => {$(
        $scope.register_fn(FnDef::new($name, vec![$($slot),*], fn_out!($out), $f)$(.$attr())?);
    )*};
}

pub(crate) fn register(scope: &mut Scope<'_>) {
    define_builtins! { scope {
        // Arithmetic.
        "+" (NUM, NUM) -> Number => add_numbers;
        "+" (STR, STR) -> Str => concat_strings;
        "+" (LIST, LIST) -> List => concat_lists;
        "+" (VEC, VEC) -> Vector => add_vectors;
        "+" (MAT, MAT) -> Matrix => add_matrices;
        "-" (NUM, NUM) -> Number => sub_numbers;
        "-" (VEC, VEC) -> Vector => sub_vectors;
        "-" (MAT, MAT) -> Matrix => sub_matrices;
        "*" (NUM, NUM) -> Number => mul_numbers;
        "*" (NUM, VEC) -> Vector => scale_vector;
        "*" (VEC, NUM) -> Vector => scale_vector_flipped;
        "*" (NUM, MAT) -> Matrix => scale_matrix;
        "*" (MAT, NUM) -> Matrix => scale_matrix_flipped;
        "*" (MAT, MAT) -> Matrix => mul_matrices;
        "*" (MAT, VEC) -> Vector => mul_matrix_vector;
        "/" (NUM, NUM) -> Number => div_numbers;
        "^" (NUM, NUM) -> Number => pow_numbers;
        "+u" (NUM) -> Number => pos_number;
        "-u" (NUM) -> Number => neg_number;
        "fact" (NUM) -> Number => fact_number;
        "mod" (NUM, NUM) -> Number => mod_numbers;
        "divides" (NUM, NUM) -> Bool => divides_numbers;

        // Comparisons and equality.
        "<" (NUM, NUM) -> Bool => lt_numbers;
        "<=" (NUM, NUM) -> Bool => le_numbers;
        ">" (NUM, NUM) -> Bool => gt_numbers;
        ">=" (NUM, NUM) -> Bool => ge_numbers;
        "=" (ANY, ANY) -> Bool => eq_values;
        "<>" (ANY, ANY) -> Bool => neq_values;

        // Boolean operators. `and`/`or` are lazy and live in the evaluator.
        "not" (BOOL) -> Bool => not_bool;
        "xor" (BOOL, BOOL) -> Bool => xor_bools;
        "implies" (BOOL, BOOL) -> Bool => implies_bools;

        // Ranges.
        ".." (NUM, NUM) -> Range => make_range;
        "#" (RANGE, NUM) -> Range => step_range;
        "except" (RANGE, ANY) -> List => except_range;
        "except" (LIST, ANY) -> List => except_list;
        "in" (NUM, RANGE) -> Bool => in_range;
        "in" (ANY, LIST) -> Bool => in_list;
        "in" (ANY, SET) -> Bool => in_set;
        "in" (STR, DICT) -> Bool => in_dict;
        "list" (RANGE) -> List => list_from_range;
        "list" (SET) -> List => list_from_set;
        "list" (VEC) -> List => list_from_vector;
        "list" (LIST) -> List => list_identity;

        // Lists and indexing.
        "listval" (LIST, NUM) -> any => listval_list;
        "listval" (LIST, RANGE) -> List => listval_slice;
        "listval" (DICT, STR) -> any => listval_dict;
        "listval" (VEC, NUM) -> Number => listval_vector;
        "listval" (STR, NUM) -> Str => listval_string;
        "len" (LIST) -> Number => len_list;
        "len" (STR) -> Number => len_string;
        "len" (DICT) -> Number => len_dict;
        "len" (SET) -> Number => len_set;
        "len" (VEC) -> Number => len_vector;
        "sum" (LIST) -> Number => sum_list;
        "sum" (VEC) -> Number => sum_vector;
        "sort" (LIST) -> List => sort_list;
        "distinct" (LIST) -> List => distinct_list;
        "join" (LIST, STR) -> Str => join_list;

        // Dictionaries.
        "keys" (DICT) -> List => keys_dict;
        "values" (DICT) -> List => values_dict;
        "get" (DICT, STR, ANY) -> any => get_dict;

        // Sets.
        "union" (SET, SET) -> Set => union_sets;
        "intersection" (SET, SET) -> Set => intersection_sets;

        // Vectors and matrices.
        "vector" (NUMS) -> Vector => make_vector;
        "vector" (LIST) -> Vector => vector_from_list;
        "matrix" (LISTS) -> Matrix => make_matrix;
        "dot" (VEC, VEC) -> Number => dot_vectors;
        "transpose" (MAT) -> Matrix => transpose_matrix;
        "id" (NUM) -> Matrix => identity_matrix;
        "det" (MAT) -> Number => det_matrix;
        "rows" (MAT) -> Number => rows_matrix;
        "columns" (MAT) -> Number => columns_matrix;

        // Numeric functions.
        "abs" (NUM) -> Number => abs_number;
        "abs" (VEC) -> Number => abs_vector;
        "sqrt" (NUM) -> Number => sqrt_number;
        "exp" (NUM) -> Number => exp_number;
        "ln" (NUM) -> Number => ln_number;
        "log" (NUM) -> Number => log_number;
        "log" (NUM, NUM) -> Number => log_base;
        "sin" (NUM) -> Number => sin_number;
        "cos" (NUM) -> Number => cos_number;
        "tan" (NUM) -> Number => tan_number;
        "asin" (NUM) -> Number => asin_number;
        "acos" (NUM) -> Number => acos_number;
        "atan" (NUM) -> Number => atan_number;
        "floor" (NUM) -> Number => floor_number;
        "ceil" (NUM) -> Number => ceil_number;
        "round" (NUM) -> Number => round_number;
        "precround" (NUM, NUM) -> Number => precround_number;
        "min" (NUM, NUM) -> Number => min_numbers;
        "max" (NUM, NUM) -> Number => max_numbers;
        "gcd" (NUM, NUM) -> Number => gcd_numbers;
        "re" (NUM) -> Number => re_number;
        "im" (NUM) -> Number => im_number;
        "conj" (NUM) -> Number => conj_number;

        // Strings.
        "upper" (STR) -> Str => upper_string;
        "lower" (STR) -> Str => lower_string;
        "string" (ANY) -> Str => string_of;
        "number" (STR) -> Number => number_from_string;
        "split" (STR, STR) -> List => split_string;
        "latex" (STR) -> Str => latex_string;

        // Metaprogramming.
        "expression" (STR) -> Expression => make_expression;
        "eval" (EXPR) -> any => eval_expression;
        "type" (ANY) -> Str => type_of;

        // Randomization.
        "random" (RANGE) -> Number => random_range, random;
        "random" (LIST) -> any => random_list, random;
        "shuffle" (LIST) -> List => shuffle_list, random;
    }};
}

fn raise<T, S: Into<String>>(message: S) -> Result<T, EvalError> {
    Err(EvalError::Raised {
        message: message.into(),
    })
}

// Extractors. A mismatch here means the typecheck that admitted the call was wrong, which is
// a bug in the registry, not in the program being evaluated.

fn num(arg: &RcExpr) -> Number {
    match &arg.tok {
        Tok::Number(n) => *n,
        tok => unreachable!("typecheck admitted {:?} as a number", tok),
    }
}

fn real(op: &str, arg: &RcExpr) -> Result<f64, EvalError> {
    let n = num(arg);
    if n.is_real() {
        Ok(n.re)
    } else {
        raise(format!("{} is not defined for complex numbers", op))
    }
}

fn string(arg: &RcExpr) -> &str {
    match &arg.tok {
        Tok::Str(s) => &s.value,
        tok => unreachable!("typecheck admitted {:?} as a string", tok),
    }
}

fn items(arg: &RcExpr) -> &[RcExpr] {
    match arg.list_items() {
        Some(items) => items,
        None => unreachable!("typecheck admitted {:?} as a list", arg.tok),
    }
}

fn set_items(arg: &RcExpr) -> &[RcExpr] {
    match &arg.tok {
        Tok::Set(items) => items,
        tok => unreachable!("typecheck admitted {:?} as a set", tok),
    }
}

fn dict(arg: &RcExpr) -> &BTreeMap<String, RcExpr> {
    match &arg.tok {
        Tok::Dict(Dict::Built(map)) => map,
        tok => unreachable!("typecheck admitted {:?} as a dict", tok),
    }
}

fn vector(arg: &RcExpr) -> &[Number] {
    match &arg.tok {
        Tok::Vector(ns) => ns,
        tok => unreachable!("typecheck admitted {:?} as a vector", tok),
    }
}

fn matrix(arg: &RcExpr) -> &Matrix {
    match &arg.tok {
        Tok::Matrix(m) => m,
        tok => unreachable!("typecheck admitted {:?} as a matrix", tok),
    }
}

fn range(arg: &RcExpr) -> Range {
    match &arg.tok {
        Tok::Range(r) => *r,
        tok => unreachable!("typecheck admitted {:?} as a range", tok),
    }
}

fn number_leaf(n: Number) -> RcExpr {
    Expr::leaf(Tok::Number(n))
}

fn list_leaf(items: Vec<RcExpr>) -> RcExpr {
    Expr::leaf(Tok::List(List::Built(items)))
}

type Args<'a> = &'a [RcExpr];
type Out = Result<RcExpr, EvalError>;

// Arithmetic.

fn add_numbers(args: Args, _: &Scope) -> Out {
    Ok(number_leaf(num(&args[0]) + num(&args[1])))
}

fn sub_numbers(args: Args, _: &Scope) -> Out {
    Ok(number_leaf(num(&args[0]) - num(&args[1])))
}

fn mul_numbers(args: Args, _: &Scope) -> Out {
    Ok(number_leaf(num(&args[0]) * num(&args[1])))
}

fn div_numbers(args: Args, _: &Scope) -> Out {
    let d = num(&args[1]);
    if d == Number::real(0.) {
        return raise("division by zero");
    }
    Ok(number_leaf(num(&args[0]) / d))
}

fn pow_numbers(args: Args, _: &Scope) -> Out {
    Ok(number_leaf(num(&args[0]).pow(num(&args[1]))))
}

fn pos_number(args: Args, _: &Scope) -> Out {
    Ok(args[0].clone())
}

fn neg_number(args: Args, _: &Scope) -> Out {
    Ok(number_leaf(-num(&args[0])))
}

fn fact_number(args: Args, _: &Scope) -> Out {
    match math::factorial(num(&args[0])) {
        Some(n) => Ok(number_leaf(n)),
        None => raise("factorial is only defined for non-negative integers"),
    }
}

fn mod_numbers(args: Args, _: &Scope) -> Out {
    let a = real("mod", &args[0])?;
    let b = real("mod", &args[1])?;
    if b == 0. {
        return raise("modulo by zero");
    }
    Ok(Expr::number(math::modulo(a, b)))
}

fn divides_numbers(args: Args, _: &Scope) -> Out {
    let a = real("divides", &args[0])?;
    let b = real("divides", &args[1])?;
    Ok(Expr::boolean(a != 0. && math::modulo(b, a) == 0.))
}

fn concat_strings(args: Args, _: &Scope) -> Out {
    Ok(Expr::string(format!(
        "{}{}",
        string(&args[0]),
        string(&args[1])
    )))
}

fn concat_lists(args: Args, _: &Scope) -> Out {
    let mut out = items(&args[0]).to_vec();
    out.extend_from_slice(items(&args[1]));
    Ok(list_leaf(out))
}

// Comparisons. Complex numbers have no order; comparing them is a domain error.

fn cmp_reals(op: &'static str, args: Args) -> Result<(f64, f64), EvalError> {
    Ok((real(op, &args[0])?, real(op, &args[1])?))
}

fn lt_numbers(args: Args, _: &Scope) -> Out {
    let (a, b) = cmp_reals("<", args)?;
    Ok(Expr::boolean(a < b))
}

fn le_numbers(args: Args, _: &Scope) -> Out {
    let (a, b) = cmp_reals("<=", args)?;
    Ok(Expr::boolean(a <= b))
}

fn gt_numbers(args: Args, _: &Scope) -> Out {
    let (a, b) = cmp_reals(">", args)?;
    Ok(Expr::boolean(a > b))
}

fn ge_numbers(args: Args, _: &Scope) -> Out {
    let (a, b) = cmp_reals(">=", args)?;
    Ok(Expr::boolean(a >= b))
}

fn eq_values(args: Args, _: &Scope) -> Out {
    Ok(Expr::boolean(value_eq(&args[0], &args[1])))
}

fn neq_values(args: Args, _: &Scope) -> Out {
    Ok(Expr::boolean(!value_eq(&args[0], &args[1])))
}

// Boolean operators.

fn not_bool(args: Args, _: &Scope) -> Out {
    match args[0].as_bool() {
        Some(b) => Ok(Expr::boolean(!b)),
        None => unreachable!("typecheck admitted a non-boolean"),
    }
}

fn xor_bools(args: Args, _: &Scope) -> Out {
    match (args[0].as_bool(), args[1].as_bool()) {
        (Some(a), Some(b)) => Ok(Expr::boolean(a != b)),
        _ => unreachable!("typecheck admitted a non-boolean"),
    }
}

fn implies_bools(args: Args, _: &Scope) -> Out {
    match (args[0].as_bool(), args[1].as_bool()) {
        (Some(a), Some(b)) => Ok(Expr::boolean(!a || b)),
        _ => unreachable!("typecheck admitted a non-boolean"),
    }
}

// Ranges.

fn make_range(args: Args, _: &Scope) -> Out {
    let start = real("..", &args[0])?;
    let end = real("..", &args[1])?;
    Ok(Expr::leaf(Tok::Range(Range {
        start,
        end,
        step: 1.,
    })))
}

fn step_range(args: Args, _: &Scope) -> Out {
    let r = range(&args[0]);
    let step = real("#", &args[1])?;
    if step == 0. {
        return raise("a range step cannot be zero");
    }
    Ok(Expr::leaf(Tok::Range(Range { step, ..r })))
}

/// The values excluded by the right operand of `except`: a collection's elements, or the
/// value itself.
fn excluded_values(arg: &RcExpr) -> Vec<RcExpr> {
    collection_items(arg).unwrap_or_else(|| vec![arg.clone()])
}

fn except_range(args: Args, _: &Scope) -> Out {
    let excluded = excluded_values(&args[1]);
    let kept = range(&args[0])
        .items()
        .into_iter()
        .map(Expr::number)
        .filter(|item| !excluded.iter().any(|e| value_eq(e, item)))
        .collect();
    Ok(list_leaf(kept))
}

fn except_list(args: Args, _: &Scope) -> Out {
    let excluded = excluded_values(&args[1]);
    let kept = items(&args[0])
        .iter()
        .filter(|item| !excluded.iter().any(|e| value_eq(e, item)))
        .cloned()
        .collect();
    Ok(list_leaf(kept))
}

fn in_range(args: Args, _: &Scope) -> Out {
    let n = real("in", &args[0])?;
    Ok(Expr::boolean(range(&args[1]).contains(n)))
}

fn in_list(args: Args, _: &Scope) -> Out {
    Ok(Expr::boolean(
        items(&args[1]).iter().any(|item| value_eq(item, &args[0])),
    ))
}

fn in_set(args: Args, _: &Scope) -> Out {
    Ok(Expr::boolean(
        set_items(&args[1]).iter().any(|item| value_eq(item, &args[0])),
    ))
}

fn in_dict(args: Args, _: &Scope) -> Out {
    Ok(Expr::boolean(dict(&args[1]).contains_key(string(&args[0]))))
}

fn list_from_range(args: Args, _: &Scope) -> Out {
    Ok(list_leaf(
        range(&args[0]).items().into_iter().map(Expr::number).collect(),
    ))
}

fn list_from_set(args: Args, _: &Scope) -> Out {
    Ok(list_leaf(set_items(&args[0]).to_vec()))
}

fn list_from_vector(args: Args, _: &Scope) -> Out {
    Ok(list_leaf(
        vector(&args[0]).iter().map(|&n| number_leaf(n)).collect(),
    ))
}

fn list_identity(args: Args, _: &Scope) -> Out {
    Ok(args[0].clone())
}

// Lists and indexing. Indices are zero-based; negative indices count from the end.

fn resolve_index(len: usize, arg: &RcExpr) -> Result<usize, EvalError> {
    let n = real("an index", arg)?;
    if n.fract() != 0. {
        return raise("an index must be an integer");
    }
    let idx = if n < 0. { len as f64 + n } else { n };
    if idx < 0. || idx >= len as f64 {
        return raise(format!("index {} is out of range", arg.emit_pretty()));
    }
    Ok(idx as usize)
}

fn listval_list(args: Args, _: &Scope) -> Out {
    let list = items(&args[0]);
    Ok(list[resolve_index(list.len(), &args[1])?].clone())
}

fn listval_slice(args: Args, _: &Scope) -> Out {
    let list = items(&args[0]);
    let mut out = Vec::new();
    for idx in range(&args[1]).items() {
        out.push(list[resolve_index(list.len(), &Expr::number(idx))?].clone());
    }
    Ok(list_leaf(out))
}

fn listval_dict(args: Args, _: &Scope) -> Out {
    let key = string(&args[1]);
    match dict(&args[0]).get(key) {
        Some(value) => Ok(value.clone()),
        None => raise(format!("key \"{}\" is not in the dictionary", key)),
    }
}

fn listval_vector(args: Args, _: &Scope) -> Out {
    let v = vector(&args[0]);
    Ok(number_leaf(v[resolve_index(v.len(), &args[1])?]))
}

fn listval_string(args: Args, _: &Scope) -> Out {
    let chars: Vec<char> = string(&args[0]).chars().collect();
    let idx = resolve_index(chars.len(), &args[1])?;
    Ok(Expr::string(chars[idx].to_string()))
}

fn len_list(args: Args, _: &Scope) -> Out {
    Ok(Expr::number(items(&args[0]).len() as f64))
}

fn len_string(args: Args, _: &Scope) -> Out {
    Ok(Expr::number(string(&args[0]).chars().count() as f64))
}

fn len_dict(args: Args, _: &Scope) -> Out {
    Ok(Expr::number(dict(&args[0]).len() as f64))
}

fn len_set(args: Args, _: &Scope) -> Out {
    Ok(Expr::number(set_items(&args[0]).len() as f64))
}

fn len_vector(args: Args, _: &Scope) -> Out {
    Ok(Expr::number(vector(&args[0]).len() as f64))
}

fn sum_items(values: &[RcExpr]) -> Result<Number, EvalError> {
    let mut acc = Number::real(0.);
    for value in values {
        match value.as_number() {
            Some(n) => acc = acc + n,
            None => return raise("sum is only defined over numbers"),
        }
    }
    Ok(acc)
}

fn sum_list(args: Args, _: &Scope) -> Out {
    Ok(number_leaf(sum_items(items(&args[0]))?))
}

fn sum_vector(args: Args, _: &Scope) -> Out {
    let mut acc = Number::real(0.);
    for &n in vector(&args[0]) {
        acc = acc + n;
    }
    Ok(number_leaf(acc))
}

fn sort_list(args: Args, _: &Scope) -> Out {
    let mut sorted = items(&args[0]).to_vec();
    if sorted
        .iter()
        .all(|i| matches!(&i.tok, Tok::Number(n) if n.is_real()))
    {
        sorted.sort_by(|a, b| {
            num(a)
                .re
                .partial_cmp(&num(b).re)
                .unwrap_or(core::cmp::Ordering::Equal)
        });
    } else if sorted.iter().all(|i| matches!(&i.tok, Tok::Str(_))) {
        sorted.sort_by(|a, b| string(a).cmp(string(b)));
    } else {
        return raise("sort needs a list of real numbers or of strings");
    }
    Ok(list_leaf(sorted))
}

fn distinct_list(args: Args, _: &Scope) -> Out {
    let mut out: Vec<RcExpr> = Vec::new();
    for item in items(&args[0]) {
        if !out.iter().any(|seen| value_eq(seen, item)) {
            out.push(item.clone());
        }
    }
    Ok(list_leaf(out))
}

fn join_list(args: Args, _: &Scope) -> Out {
    let sep = string(&args[1]);
    let joined = items(&args[0])
        .iter()
        .map(display_value)
        .collect::<Vec<_>>()
        .join(sep);
    Ok(Expr::string(joined))
}

// Dictionaries.

fn keys_dict(args: Args, _: &Scope) -> Out {
    Ok(list_leaf(
        dict(&args[0]).keys().map(|k| Expr::string(k.clone())).collect(),
    ))
}

fn values_dict(args: Args, _: &Scope) -> Out {
    Ok(list_leaf(dict(&args[0]).values().cloned().collect()))
}

fn get_dict(args: Args, _: &Scope) -> Out {
    match dict(&args[0]).get(string(&args[1])) {
        Some(value) => Ok(value.clone()),
        None => Ok(args[2].clone()),
    }
}

// Sets.

fn union_sets(args: Args, _: &Scope) -> Out {
    let mut out = set_items(&args[0]).to_vec();
    for item in set_items(&args[1]) {
        if !out.iter().any(|seen| value_eq(seen, item)) {
            out.push(item.clone());
        }
    }
    Ok(Expr::leaf(Tok::Set(out)))
}

fn intersection_sets(args: Args, _: &Scope) -> Out {
    let right = set_items(&args[1]);
    let out = set_items(&args[0])
        .iter()
        .filter(|item| right.iter().any(|r| value_eq(r, item)))
        .cloned()
        .collect();
    Ok(Expr::leaf(Tok::Set(out)))
}

// Vectors and matrices.

fn make_vector(args: Args, _: &Scope) -> Out {
    Ok(Expr::leaf(Tok::Vector(args.iter().map(num).collect())))
}

fn numbers_of_list(arg: &RcExpr) -> Result<Vec<Number>, EvalError> {
    items(arg)
        .iter()
        .map(|i| {
            i.as_number()
                .ok_or(EvalError::Raised {
                    message: "expected a list of numbers".into(),
                })
        })
        .collect()
}

fn vector_from_list(args: Args, _: &Scope) -> Out {
    Ok(Expr::leaf(Tok::Vector(numbers_of_list(&args[0])?)))
}

fn make_matrix(args: Args, _: &Scope) -> Out {
    let rows = args
        .iter()
        .map(numbers_of_list)
        .collect::<Result<Vec<_>, _>>()?;
    match Matrix::from_rows(rows) {
        Some(m) => Ok(Expr::leaf(Tok::Matrix(m))),
        None => raise("matrix rows must be non-empty and of equal length"),
    }
}

fn dimension_checked(result: Option<Vec<Number>>) -> Out {
    match result {
        Some(v) => Ok(Expr::leaf(Tok::Vector(v))),
        None => raise("vector dimensions do not match"),
    }
}

fn add_vectors(args: Args, _: &Scope) -> Out {
    dimension_checked(math::vec_add(vector(&args[0]), vector(&args[1])))
}

fn sub_vectors(args: Args, _: &Scope) -> Out {
    dimension_checked(math::vec_sub(vector(&args[0]), vector(&args[1])))
}

fn scale_vector(args: Args, _: &Scope) -> Out {
    Ok(Expr::leaf(Tok::Vector(math::vec_scale(
        num(&args[0]),
        vector(&args[1]),
    ))))
}

fn scale_vector_flipped(args: Args, _: &Scope) -> Out {
    Ok(Expr::leaf(Tok::Vector(math::vec_scale(
        num(&args[1]),
        vector(&args[0]),
    ))))
}

fn dot_vectors(args: Args, _: &Scope) -> Out {
    match math::vec_dot(vector(&args[0]), vector(&args[1])) {
        Some(n) => Ok(number_leaf(n)),
        None => raise("vector dimensions do not match"),
    }
}

fn matrix_checked(result: Option<Matrix>) -> Out {
    match result {
        Some(m) => Ok(Expr::leaf(Tok::Matrix(m))),
        None => raise("matrix dimensions do not match"),
    }
}

fn add_matrices(args: Args, _: &Scope) -> Out {
    matrix_checked(matrix(&args[0]).add(matrix(&args[1])))
}

fn sub_matrices(args: Args, _: &Scope) -> Out {
    matrix_checked(matrix(&args[0]).sub(matrix(&args[1])))
}

fn mul_matrices(args: Args, _: &Scope) -> Out {
    matrix_checked(matrix(&args[0]).mul(matrix(&args[1])))
}

fn scale_matrix(args: Args, _: &Scope) -> Out {
    Ok(Expr::leaf(Tok::Matrix(matrix(&args[1]).scale(num(&args[0])))))
}

fn scale_matrix_flipped(args: Args, _: &Scope) -> Out {
    Ok(Expr::leaf(Tok::Matrix(matrix(&args[0]).scale(num(&args[1])))))
}

fn mul_matrix_vector(args: Args, _: &Scope) -> Out {
    dimension_checked(matrix(&args[0]).mul_vec(vector(&args[1])))
}

fn transpose_matrix(args: Args, _: &Scope) -> Out {
    Ok(Expr::leaf(Tok::Matrix(matrix(&args[0]).transpose())))
}

fn identity_matrix(args: Args, _: &Scope) -> Out {
    let n = num(&args[0]);
    if !n.is_int() || n.re < 0. {
        return raise("id needs a non-negative integer dimension");
    }
    Ok(Expr::leaf(Tok::Matrix(Matrix::identity(n.re as usize))))
}

fn det_matrix(args: Args, _: &Scope) -> Out {
    match matrix(&args[0]).det() {
        Some(n) => Ok(number_leaf(n)),
        None => raise("determinant is only defined for square matrices"),
    }
}

fn rows_matrix(args: Args, _: &Scope) -> Out {
    Ok(Expr::number(matrix(&args[0]).rows as f64))
}

fn columns_matrix(args: Args, _: &Scope) -> Out {
    Ok(Expr::number(matrix(&args[0]).cols as f64))
}

// Numeric functions.

fn abs_number(args: Args, _: &Scope) -> Out {
    Ok(Expr::number(num(&args[0]).abs()))
}

fn abs_vector(args: Args, _: &Scope) -> Out {
    let sq: f64 = vector(&args[0]).iter().map(|n| n.abs() * n.abs()).sum();
    Ok(Expr::number(sq.sqrt()))
}

fn sqrt_number(args: Args, _: &Scope) -> Out {
    Ok(number_leaf(num(&args[0]).sqrt()))
}

fn exp_number(args: Args, _: &Scope) -> Out {
    Ok(number_leaf(num(&args[0]).exp()))
}

fn ln_number(args: Args, _: &Scope) -> Out {
    Ok(number_leaf(num(&args[0]).ln()))
}

fn log_number(args: Args, _: &Scope) -> Out {
    Ok(Expr::number(real("log", &args[0])?.log10()))
}

fn log_base(args: Args, _: &Scope) -> Out {
    let n = real("log", &args[0])?;
    let base = real("log", &args[1])?;
    Ok(Expr::number(n.log(base)))
}

fn sin_number(args: Args, _: &Scope) -> Out {
    Ok(number_leaf(num(&args[0]).sin()))
}

fn cos_number(args: Args, _: &Scope) -> Out {
    Ok(number_leaf(num(&args[0]).cos()))
}

fn tan_number(args: Args, _: &Scope) -> Out {
    Ok(number_leaf(num(&args[0]).tan()))
}

fn asin_number(args: Args, _: &Scope) -> Out {
    Ok(Expr::number(real("asin", &args[0])?.asin()))
}

fn acos_number(args: Args, _: &Scope) -> Out {
    Ok(Expr::number(real("acos", &args[0])?.acos()))
}

fn atan_number(args: Args, _: &Scope) -> Out {
    Ok(Expr::number(real("atan", &args[0])?.atan()))
}

fn floor_number(args: Args, _: &Scope) -> Out {
    Ok(Expr::number(real("floor", &args[0])?.floor()))
}

fn ceil_number(args: Args, _: &Scope) -> Out {
    Ok(Expr::number(real("ceil", &args[0])?.ceil()))
}

fn round_number(args: Args, _: &Scope) -> Out {
    Ok(Expr::number(real("round", &args[0])?.round()))
}

fn precround_number(args: Args, _: &Scope) -> Out {
    let n = real("precround", &args[0])?;
    let places = real("precround", &args[1])?;
    Ok(Expr::number(math::precround(n, places)))
}

fn min_numbers(args: Args, _: &Scope) -> Out {
    let (a, b) = cmp_reals("min", args)?;
    Ok(Expr::number(a.min(b)))
}

fn max_numbers(args: Args, _: &Scope) -> Out {
    let (a, b) = cmp_reals("max", args)?;
    Ok(Expr::number(a.max(b)))
}

fn gcd_numbers(args: Args, _: &Scope) -> Out {
    let (a, b) = cmp_reals("gcd", args)?;
    Ok(Expr::number(math::gcd(a, b)))
}

fn re_number(args: Args, _: &Scope) -> Out {
    Ok(Expr::number(num(&args[0]).re))
}

fn im_number(args: Args, _: &Scope) -> Out {
    Ok(Expr::number(num(&args[0]).im))
}

fn conj_number(args: Args, _: &Scope) -> Out {
    Ok(number_leaf(num(&args[0]).conj()))
}

// Strings.

fn upper_string(args: Args, _: &Scope) -> Out {
    Ok(Expr::string(string(&args[0]).to_uppercase()))
}

fn lower_string(args: Args, _: &Scope) -> Out {
    Ok(Expr::string(string(&args[0]).to_lowercase()))
}

fn string_of(args: Args, _: &Scope) -> Out {
    Ok(Expr::string(display_value(&args[0])))
}

fn number_from_string(args: Args, _: &Scope) -> Out {
    match string(&args[0]).trim().parse::<f64>() {
        Ok(n) => Ok(Expr::number(n)),
        Err(_) => raise(format!("\"{}\" is not a number", string(&args[0]))),
    }
}

fn split_string(args: Args, _: &Scope) -> Out {
    let s = string(&args[0]);
    let sep = string(&args[1]);
    let parts: Vec<RcExpr> = if sep.is_empty() {
        s.chars().map(|c| Expr::string(c.to_string())).collect()
    } else {
        s.split(sep).map(Expr::string).collect()
    };
    Ok(list_leaf(parts))
}

fn latex_string(args: Args, _: &Scope) -> Out {
    match &args[0].tok {
        Tok::Str(s) => Ok(Expr::leaf(Tok::Str(Str {
            latex: true,
            ..s.clone()
        }))),
        tok => unreachable!("typecheck admitted {:?} as a string", tok),
    }
}

// Metaprogramming.

fn make_expression(args: Args, _: &Scope) -> Out {
    match crate::compile(string(&args[0])) {
        Ok(Some(tree)) => Ok(Expr::leaf(Tok::Expression(tree))),
        Ok(None) => raise("expression() was given an empty string"),
        Err(err) => raise(format!("could not compile expression: {}", err)),
    }
}

fn eval_expression(args: Args, scope: &Scope) -> Out {
    match &args[0].tok {
        Tok::Expression(inner) => evaluate(inner, scope),
        tok => unreachable!("typecheck admitted {:?} as an expression", tok),
    }
}

fn type_of(args: Args, _: &Scope) -> Out {
    Ok(Expr::string(args[0].tok.ty().name()))
}

// Randomization.

fn random_range(args: Args, _: &Scope) -> Out {
    let choices = range(&args[0]).items();
    match choices.choose(&mut rand::thread_rng()) {
        Some(&n) => Ok(Expr::number(n)),
        None => raise("cannot pick from an empty range"),
    }
}

fn random_list(args: Args, _: &Scope) -> Out {
    match items(&args[0]).choose(&mut rand::thread_rng()) {
        Some(item) => Ok(item.clone()),
        None => raise("cannot pick from an empty list"),
    }
}

fn shuffle_list(args: Args, _: &Scope) -> Out {
    let mut shuffled = items(&args[0]).to_vec();
    shuffled.shuffle(&mut rand::thread_rng());
    Ok(list_leaf(shuffled))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(program: &str) -> RcExpr {
        let tree = crate::compile(program).unwrap().unwrap();
        evaluate(&tree, &Scope::base()).unwrap()
    }

    #[test]
    fn random_range_stays_in_bounds() {
        for _ in 0..20 {
            let n = eval("random(1..6)").as_number().unwrap();
            assert!(n.is_int());
            assert!((1. ..=6.).contains(&n.re));
        }
    }

    #[test]
    fn random_definitions_are_flagged() {
        let base = Scope::base();
        assert!(base.collect_fns("random").iter().all(|d| d.random));
        assert!(base.collect_fns("shuffle").iter().all(|d| d.random));
        assert!(base.collect_fns("sum").iter().all(|d| !d.random));
    }

    #[test]
    fn shuffle_preserves_elements() {
        let shuffled = eval("sort(shuffle([3, 1, 2]))");
        assert_eq!(shuffled.emit_pretty(), "[1, 2, 3]");
    }

    #[test]
    fn overloads_dispatch_by_type() {
        assert_eq!(eval("\"a\" + \"b\"").emit_pretty(), "\"ab\"");
        assert_eq!(eval("len(\"abc\")").emit_pretty(), "3");
        assert_eq!(eval("len([\"a\": 1])").emit_pretty(), "1");
    }
}
