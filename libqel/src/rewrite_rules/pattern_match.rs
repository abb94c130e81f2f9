//! Structural and commutative pattern matching with named captures.

use crate::grammar::collectors::collect_free_vars;
use crate::grammar::*;

use std::collections::HashMap;
use std::rc::Rc;

/// The named subtrees bound by a successful pattern match.
///
/// Captures are recorded by `pattern ; name` binding forms and consumed by a rule's condition
/// and result templates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Captures {
    map: HashMap<String, RcExpr>,
}

impl Captures {
    pub fn get(&self, name: &str) -> Option<&RcExpr> {
        self.map.get(&name.to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(|k| k.as_str())
    }

    fn single(name: &str, value: RcExpr) -> Captures {
        let mut captures = Captures::default();
        captures.map.insert(name.to_lowercase(), value);
        captures
    }

    /// Merges two capture sets. Fails when the same name is bound to two different subtrees.
    fn try_merge(mut left: Captures, right: Captures) -> Option<Captures> {
        for (name, value) in right.map {
            match left.map.get(&name) {
                Some(existing) if value_eq(existing, &value) => {}
                Some(_) => return None,
                None => {
                    left.map.insert(name, value);
                }
            }
        }
        Some(left)
    }

    /// Folds a repeated capture of `name` into a rebuilt commuting expression. The operand
    /// order is subject-visit order and not part of the contract.
    fn accumulate(&mut self, op: &str, name: String, value: RcExpr) {
        match self.map.remove(&name) {
            Some(existing) => {
                self.map.insert(name, Expr::op(op, vec![existing, value]));
            }
            None => {
                self.map.insert(name, value);
            }
        }
    }

    /// Substitutes captured subtrees into a template, replacing each captured name and leaving
    /// everything else in place. Unchanged subtrees are shared with the template.
    pub fn substitute(&self, template: &RcExpr) -> RcExpr {
        match &template.tok {
            Tok::Name(name) => match self.map.get(&name.name.to_lowercase()) {
                Some(value) => value.clone(),
                None => template.clone(),
            },
            Tok::Expression(_) => template.clone(),
            _ => {
                let mut changed = false;
                let mut children = Vec::with_capacity(template.children.len());
                for child in &template.children {
                    let subbed = self.substitute(child);
                    changed = changed || !Rc::ptr_eq(&subbed, child);
                    children.push(subbed);
                }
                if changed {
                    Expr::node(template.tok.clone(), children)
                } else {
                    template.clone()
                }
            }
        }
    }
}

/// Matches a pattern tree against a subject tree, returning the captures bound by the match.
///
/// When `commute` is set, applications of a commutative operator match by flattened operand
/// multiset rather than positionally; `m_commute(p)` forces it on for a subtree.
pub fn match_pattern(pattern: &RcExpr, subject: &RcExpr, commute: bool) -> Option<Captures> {
    match &pattern.tok {
        Tok::Name(n) if n.name == "?" || n.name == "??" => Some(Captures::default()),
        Tok::Name(n) if n.name.eq_ignore_ascii_case("m_number") => {
            matches!(subject.tok, Tok::Number(_)).then(Captures::default)
        }
        Tok::Op(op) if op.name == ";" && pattern.children.len() == 2 => {
            let name = match &pattern.children[1].tok {
                Tok::Name(n) => &n.name,
                // Malformed bindings are rejected when the rule is built.
                _ => return None,
            };
            let captures = match_pattern(&pattern.children[0], subject, commute)?;
            Captures::try_merge(captures, Captures::single(name, subject.clone()))
        }
        Tok::Func(f) => match f.name.to_lowercase().as_str() {
            "m_any" => pattern
                .children
                .iter()
                .find_map(|alt| match_pattern(alt, subject, commute)),
            "m_all" if pattern.children.len() == 1 => {
                match_pattern(&pattern.children[0], subject, commute)
            }
            "m_pm" if pattern.children.len() == 1 => {
                match_pattern(&pattern.children[0], subject, commute).or_else(|| {
                    match &subject.tok {
                        Tok::Op(op) if op.name == "-u" => {
                            match_pattern(&pattern.children[0], &subject.children[0], commute)
                        }
                        _ => None,
                    }
                })
            }
            "m_not" if pattern.children.len() == 1 => {
                match match_pattern(&pattern.children[0], subject, commute) {
                    Some(_) => None,
                    None => Some(Captures::default()),
                }
            }
            "m_and" => {
                let mut captures = Captures::default();
                for p in &pattern.children {
                    captures = Captures::try_merge(captures, match_pattern(p, subject, commute)?)?;
                }
                Some(captures)
            }
            "m_uses" => {
                let free = collect_free_vars(subject);
                let all_used = pattern.children.iter().all(|name| match &name.tok {
                    Tok::Name(n) => free.contains(&n.name.to_lowercase()),
                    _ => false,
                });
                all_used.then(Captures::default)
            }
            "m_commute" if pattern.children.len() == 1 => {
                match_pattern(&pattern.children[0], subject, true)
            }
            "m_type" if pattern.children.len() == 1 => {
                let expected = match &pattern.children[0].tok {
                    Tok::Name(n) => n.name.to_lowercase(),
                    Tok::Str(s) => s.value.to_lowercase(),
                    _ => return None,
                };
                (subject.tok.ty().name() == expected).then(Captures::default)
            }
            _ => match_application(pattern, subject, commute),
        },
        Tok::Op(_) => match_application(pattern, subject, commute),
        // Literal leaves match by value equality.
        _ => value_eq(pattern, subject).then(Captures::default),
    }
}

fn match_application(pattern: &RcExpr, subject: &RcExpr, commute: bool) -> Option<Captures> {
    let p_name = pattern.callee()?;
    let s_name = subject.callee()?;

    // A subtraction is a sum of a negation for commuting purposes, so a "+" pattern still
    // flattens an "a - b" subject.
    if commute
        && is_commutative(p_name)
        && (p_name.eq_ignore_ascii_case(s_name) || (p_name == "+" && s_name == "-"))
    {
        return match_commuting(p_name, pattern, subject);
    }

    if !p_name.eq_ignore_ascii_case(s_name) || pattern.children.len() != subject.children.len() {
        return None;
    }
    let mut captures = Captures::default();
    for (p, s) in pattern.children.iter().zip(&subject.children) {
        captures = Captures::try_merge(captures, match_pattern(p, s, commute)?)?;
    }
    Some(captures)
}

/// Flattens nested applications of `op` into a list of commuting terms, turning subtraction
/// into addition of a negation along the way.
fn flatten_terms(op: &str, expr: &RcExpr, terms: &mut Vec<RcExpr>) {
    match expr.callee() {
        Some(name) if name.eq_ignore_ascii_case(op) && expr.children.len() == 2 => {
            flatten_terms(op, &expr.children[0], terms);
            flatten_terms(op, &expr.children[1], terms);
        }
        Some("-") if op == "+" && expr.children.len() == 2 => {
            flatten_terms(op, &expr.children[0], terms);
            terms.push(Expr::op("-u", vec![expr.children[1].clone()]));
        }
        _ => terms.push(expr.clone()),
    }
}

/// A term that is set aside to match last: a wildcard, an `m_all` form, or a binding of one.
fn is_end_term(pattern: &RcExpr) -> bool {
    match &pattern.tok {
        Tok::Name(n) => n.name == "?" || n.name == "??",
        Tok::Op(op) if op.name == ";" => pattern.children.first().map_or(false, is_end_term),
        Tok::Func(f) => f.name.eq_ignore_ascii_case("m_all"),
        _ => false,
    }
}

fn match_commuting(op: &str, pattern: &RcExpr, subject: &RcExpr) -> Option<Captures> {
    let mut pattern_terms = Vec::new();
    flatten_terms(op, pattern, &mut pattern_terms);
    let mut subject_terms = Vec::new();
    flatten_terms(op, subject, &mut subject_terms);

    let (end_terms, mandatory): (Vec<_>, Vec<_>) =
        pattern_terms.into_iter().partition(|p| is_end_term(p));

    let mut matched = vec![false; mandatory.len()];
    let mut captures = Captures::default();
    'subjects: for term in &subject_terms {
        for (i, p) in mandatory.iter().enumerate() {
            if matched[i] {
                continue;
            }
            if let Some(caps) = match_pattern(p, term, true) {
                if let Some(merged) = Captures::try_merge(captures.clone(), caps) {
                    captures = merged;
                    matched[i] = true;
                    continue 'subjects;
                }
            }
        }
        // End terms absorb whatever the mandatory terms left over; a repeated capture of the
        // same name folds back into a commuting expression.
        for p in &end_terms {
            if let Some(caps) = match_pattern(p, term, true) {
                for (name, value) in caps.map {
                    captures.accumulate(op, name, value);
                }
                continue 'subjects;
            }
        }
        return None;
    }

    if matched.iter().all(|&m| m) {
        Some(captures)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(program: &str) -> RcExpr {
        crate::compile(program).unwrap().unwrap()
    }

    // Tests a match's captures against "name: pretty-emit" pairs, or None for no match.
    macro_rules! match_tests {
        ($($name:ident: $pattern:expr, $subject:expr, $commute:expr => $expected:expr)*) => {$(
            #[test]
            fn $name() {
                let result = match_pattern(&tree($pattern), &tree($subject), $commute);
                let expected: Option<Vec<&str>> = $expected;
                match (result, expected) {
                    (None, None) => {}
                    (Some(captures), Some(expected)) => {
                        assert_eq!(captures.map.len(), expected.len());
                        for entry in expected {
                            let mut split = entry.splitn(2, ": ");
                            let (name, emit) = (split.next().unwrap(), split.next().unwrap());
                            assert_eq!(captures.get(name).unwrap().to_string(), emit);
                        }
                    }
                    (result, expected) => {
                        panic!("expected {:?}, got a {} match", expected,
                            if result.is_some() { "successful" } else { "failed" });
                    }
                }
            }
        )*};
    }

    match_tests! {
        wildcard:            "?", "x + 1", false           => Some(vec![])
        double_wildcard:     "??", "[1, 2]", false         => Some(vec![])
        number_pattern:      "m_number", "3.5", false      => Some(vec![])
        number_on_name:      "m_number", "x", false        => None

        literal_match:       "0", "0", false               => Some(vec![])
        literal_mismatch:    "0", "1", false               => None
        name_match:          "k", "K", false               => Some(vec![])
        name_mismatch:       "k", "j", false               => None
        string_match:        "'ab'", "'ab'", false         => Some(vec![])

        binding:             "?;x", "y + 1", false         => Some(vec!["x: y + 1"])
        binding_nested:      "m_number;n + ?;x", "2 + y", false => Some(vec!["n: 2", "x: y"])
        binding_conflict:    "?;x + ?;x", "a + b", false   => None
        binding_repeat_eq:   "?;x + ?;x", "a + a", false   => Some(vec!["x: a"])

        positional:          "?;x + 0", "y + 0", false     => Some(vec!["x: y"])
        positional_flipped:  "?;x + 0", "0 + y", false     => None
        commuted:            "?;x + 0", "0 + y", true      => Some(vec!["x: y"])
        wrong_operator:      "?;x + 0", "y * 0", true      => None
        wrong_arity:         "f(?;x)", "f(1, 2)", false    => None
        call_match:          "f(?;x, 0)", "f(y, 0)", false => Some(vec!["x: y"])

        subtraction_folds:   "?? + m_number;n", "5 - 2", true => Some(vec!["n: 5"])
        nested_sum_flattens: "m_number;n + ??", "a + (2 + b)", true => Some(vec!["n: 2"])

        m_any_first:         "m_any(1, m_number;n)", "1", false => Some(vec![])
        m_any_second:        "m_any(1, m_number;n)", "2", false => Some(vec!["n: 2"])
        m_any_neither:       "m_any(1, 2)", "x", false     => None
        m_pm_plain:          "m_pm(m_number;n)", "3", false  => Some(vec!["n: 3"])
        m_pm_negated:        "m_pm(m_number;n)", "-3", false => Some(vec!["n: 3"])
        m_not_matches:       "m_not(m_number)", "x", false => Some(vec![])
        m_not_fails:         "m_not(m_number)", "1", false => None
        m_and_merges:        "m_and(?;x, m_number)", "2", false => Some(vec!["x: 2"])
        m_and_fails:         "m_and(?;x, m_number)", "y", false => None
        m_uses_present:      "m_uses(x)", "x + 1", false   => Some(vec![])
        m_uses_absent:       "m_uses(x, y)", "x + 1", false => None
        m_type_list:         "m_type(list)", "[1, 2]", false => Some(vec![])
        m_type_wrong:        "m_type(string)", "[1, 2]", false => None
        m_commute_forces:    "m_commute(?;x + 0)", "0 + y", false => Some(vec!["x: y"])
    }

    #[test]
    fn commutative_matching_is_symmetric() {
        let pattern = tree("m_number;n + ?;x");
        for (a, b) in &[("y + 3", "3 + y"), ("1 + z", "z + 1")] {
            let fwd = match_pattern(&pattern, &tree(a), true);
            let rev = match_pattern(&pattern, &tree(b), true);
            assert_eq!(fwd.is_some(), rev.is_some());
            let (fwd, rev) = (fwd.unwrap(), rev.unwrap());
            assert!(value_eq(fwd.get("n").unwrap(), rev.get("n").unwrap()));
            assert!(value_eq(fwd.get("x").unwrap(), rev.get("x").unwrap()));
        }
    }

    #[test]
    fn repeated_end_term_captures_rebuild_a_commuting_expression() {
        let pattern = tree("m_all(m_number;n) + ??");
        let captures = match_pattern(&pattern, &tree("1 + 2 + x"), true).unwrap();
        // Two number terms fold back into one sum; the fold order is unspecified, so assert
        // the rebuilt expression's value instead.
        let rebuilt = captures.get("n").unwrap();
        let value = crate::evaluate(rebuilt, &crate::Scope::base()).unwrap();
        assert_eq!(value.as_number().unwrap().re, 3.);
    }

    #[test]
    fn substitution_replaces_captures_and_shares_the_rest() {
        let captures = match_pattern(&tree("?;x + 0"), &tree("y + 0"), false).unwrap();
        let template = tree("x * 2");
        let result = captures.substitute(&template);
        assert_eq!(result.to_string(), "y * 2");

        let unchanged = tree("k + 1");
        assert!(Rc::ptr_eq(&captures.substitute(&unchanged), &unchanged));
    }
}
