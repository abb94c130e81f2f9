//! Ordered, duplicate-free rule sets, fixed-point simplification, and named-set composition.

use super::rule::Rule;
use super::RewriteError;
use crate::emit::Emit;
use crate::evaluator::{evaluate, Scope};
use crate::grammar::{Expr, RcExpr, Tok};
use crate::utils::hash;

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Rewrite steps taken before simplification starts fingerprinting intermediate trees to
/// detect a non-terminating rule set.
const QUIET_REWRITE_STEPS: usize = 100;

/// An ordered, duplicate-free list of rewrite rules plus named boolean display flags.
///
/// Rules apply first-match in insertion order; flags are carried for the rendering layer and
/// do not affect rewriting.
#[derive(Clone, Debug, Default)]
pub struct Ruleset {
    rules: Vec<Rc<Rule>>,
    flags: HashMap<String, bool>,
}

impl Ruleset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a ruleset from textual `[pattern, conditions[], result]` triples.
    pub fn from_triples(triples: &[(&str, &[&str], &str)]) -> Result<Self, RewriteError> {
        let mut set = Self::new();
        for (pattern, conditions, result) in triples {
            set.add_rule(Rule::from_strs(pattern, conditions, result)?);
        }
        Ok(set)
    }

    /// Appends a rule, dropping it if an identical rule is already present.
    pub fn add_rule(&mut self, rule: Rule) {
        if !self.rules.iter().any(|r| **r == rule) {
            self.rules.push(Rc::new(rule));
        }
    }

    pub fn rules(&self) -> &[Rc<Rule>] {
        &self.rules
    }

    pub fn set_flag<S: Into<String>>(&mut self, name: S, on: bool) {
        self.flags.insert(name.into().to_lowercase(), on);
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.flags.get(&name.to_lowercase()).copied()
    }

    /// The union of two rulesets: rules appended in order without duplicates, the other set's
    /// flags overriding.
    pub fn union(&self, other: &Ruleset) -> Ruleset {
        let mut out = self.clone();
        for rule in &other.rules {
            if !out.rules.iter().any(|r| **r == **rule) {
                out.rules.push(rule.clone());
            }
        }
        out.flags
            .extend(other.flags.iter().map(|(k, v)| (k.clone(), *v)));
        out
    }

    /// Removes the other set's rules from this one, rule for rule.
    pub fn subtract(&self, other: &Ruleset) -> Ruleset {
        let mut out = self.clone();
        out.rules
            .retain(|r| !other.rules.iter().any(|o| **o == **r));
        out
    }

    /// Rewrites a tree to a fixed point of this ruleset.
    ///
    /// Each pass first replaces a top-level `eval(...)` escape with the evaluated result of
    /// its argument, then simplifies every child to its own fixed point, then applies the
    /// first matching rule and restarts. Past a step threshold, intermediate trees are
    /// fingerprinted and a repeat raises [RewriteError::StuckInLoop].
    pub fn simplify(&self, tree: &RcExpr, scope: &Scope) -> Result<RcExpr, RewriteError> {
        let mut current = tree.clone();
        let mut steps = 0;
        let mut seen = HashSet::new();
        loop {
            if let Tok::Func(f) = &current.tok {
                if f.name.eq_ignore_ascii_case("eval") && current.children.len() == 1 {
                    current = evaluate(&current.children[0], scope).map_err(|err| {
                        RewriteError::EvalEscape {
                            message: err.to_string(),
                        }
                    })?;
                    continue;
                }
            }

            let mut changed = false;
            let mut children = Vec::with_capacity(current.children.len());
            for child in &current.children {
                let simplified = self.simplify(child, scope)?;
                changed = changed || !Rc::ptr_eq(&simplified, child);
                children.push(simplified);
            }
            if changed {
                current = Expr::node(current.tok.clone(), children);
            }

            match self
                .rules
                .iter()
                .find_map(|rule| rule.apply(&current, scope))
            {
                Some(next) => {
                    log::trace!("rewrite {} => {}", current, next);
                    steps += 1;
                    if steps > QUIET_REWRITE_STEPS && !seen.insert(hash(&next.emit_pretty())) {
                        return Err(RewriteError::StuckInLoop {
                            expr: next.emit_pretty(),
                        });
                    }
                    current = next;
                }
                None => return Ok(current),
            }
        }
    }
}

/// Composes a ruleset from a comma-separated specification resolved against a dictionary of
/// named rulesets.
///
/// Each part either names a ruleset (its rules are added, or subtracted rule-for-rule with a
/// leading `!`) or, when no ruleset has the name, toggles a display flag (`!` turns it off).
/// Named sets are themselves collected before they enter `defs`, so references resolve
/// recursively.
pub fn collect_ruleset(spec: &str, defs: &HashMap<String, Ruleset>) -> Ruleset {
    let mut out = Ruleset::new();
    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (name, on) = match part.strip_prefix('!') {
            Some(rest) => (rest.trim(), false),
            None => (part, true),
        };
        match defs.get(&name.to_lowercase()) {
            Some(set) if on => out = out.union(set),
            Some(set) => out = out.subtract(set),
            None => out.set_flag(name, on),
        }
    }
    out
}

macro_rules! triples {
    ($(($pattern:literal, [$($cond:literal),*], $result:literal))*) => {
        Ruleset::from_triples(&[$(($pattern, &[$($cond),*], $result)),*])
            .expect("the default rules are well-formed")
    };
}

/// The named default simplification rulesets, including the composed `basic` and `all` sets.
pub fn default_rulesets() -> HashMap<String, Ruleset> {
    let zeroterm = triples! {
        ("?;x + 0", [], "x")
        ("?;x - 0", [], "x")
    };
    let unitfactor = triples! {
        ("?;x * 1", [], "x")
    };
    let unitdenominator = triples! {
        ("?;x / 1", [], "x")
    };
    let unitpower = triples! {
        ("?;x ^ 1", [], "x")
    };
    let zerofactor = triples! {
        ("?;x * 0", [], "0")
    };
    let zeropower = triples! {
        ("?;x ^ 0", [], "1")
    };
    let zerobase = triples! {
        ("0 ^ ?;x", ["x > 0"], "0")
    };
    // A fold of `?;x + -(?;y)` into `x - y` cannot live here: commuting treats a subtraction
    // as a sum of a negation, so the rule would match its own output forever.
    let noleadingminus = triples! {
        ("--(?;x)", [], "x")
    };
    let collectnumbers = triples! {
        ("m_number;n + m_number;m", [], "eval(n + m)")
        ("m_number;n - m_number;m", [], "eval(n - m)")
        ("m_number;n * m_number;m", [], "eval(n * m)")
        ("m_number;n / m_number;m", ["m <> 0"], "eval(n / m)")
        ("m_number;n ^ m_number;m", [], "eval(n ^ m)")
        ("-(m_number;n)", [], "eval(-n)")
    };

    let basic = zeroterm
        .union(&unitfactor)
        .union(&unitdenominator)
        .union(&unitpower)
        .union(&zerofactor)
        .union(&zeropower)
        .union(&noleadingminus);
    let all = basic.union(&zerobase).union(&collectnumbers);

    let mut defs = HashMap::new();
    defs.insert("zeroterm".to_string(), zeroterm);
    defs.insert("unitfactor".to_string(), unitfactor);
    defs.insert("unitdenominator".to_string(), unitdenominator);
    defs.insert("unitpower".to_string(), unitpower);
    defs.insert("zerofactor".to_string(), zerofactor);
    defs.insert("zeropower".to_string(), zeropower);
    defs.insert("zerobase".to_string(), zerobase);
    defs.insert("noleadingminus".to_string(), noleadingminus);
    defs.insert("collectnumbers".to_string(), collectnumbers);
    defs.insert("basic".to_string(), basic);
    defs.insert("all".to_string(), all);
    defs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(program: &str) -> RcExpr {
        crate::compile(program).unwrap().unwrap()
    }

    fn simplified(spec: &str, program: &str) -> String {
        let defs = default_rulesets();
        let set = collect_ruleset(spec, &defs);
        set.simplify(&tree(program), &Scope::base())
            .unwrap()
            .to_string()
    }

    macro_rules! simplify_tests {
        ($($name:ident: $spec:expr, $program:expr => $expected:expr)*) => {$(
            #[test]
            fn $name() {
                assert_eq!(simplified($spec, $program), $expected);
            }
        )*};
    }

    simplify_tests! {
        additive_identity:      "zeroterm", "y + 0"           => "y"
        additive_identity_comm: "zeroterm", "0 + y"           => "y"
        subtractive_identity:   "zeroterm", "y - 0"           => "y"
        unit_factor:            "unitfactor", "1 * y"         => "y"
        zero_factor:            "zerofactor", "y * 0 + x"   => "0 + x"
        unit_power:             "basic", "(x + 0) ^ 1"        => "x"
        double_negation:        "basic", "--y"                => "y"
        collect_sum:            "collectnumbers", "1 + 2 * 3" => "7"
        collect_sub:            "collectnumbers", "5 - 2"     => "3"
        collect_guarded_div:    "collectnumbers", "4 / 0"     => "4 / 0"
        zero_base_guarded:      "zerobase", "0 ^ x"           => "0 ^ x"
        zero_base_positive:     "zerobase", "0 ^ 2"           => "0"
        everything:             "all", "x * 1 + (2 + 3) * 0 + 4 / 2" => "x + 2"
        untouched:              "all", "x + y"                => "x + y"
    }

    #[test]
    fn simplify_reaches_a_fixed_point() {
        let defs = default_rulesets();
        let all = collect_ruleset("all", &defs);
        let base = Scope::base();
        let once = all.simplify(&tree("y + 0 * x + 0"), &base).unwrap();
        let twice = all.simplify(&once, &base).unwrap();
        assert_eq!(once.to_string(), "y");
        assert!(Rc::ptr_eq(&once, &twice));
    }

    #[test]
    fn eval_escape_failure_is_reported() {
        let set = Ruleset::new();
        let err = set
            .simplify(&tree("eval(nosuchfn(1))"), &Scope::base())
            .unwrap_err();
        assert!(matches!(err, RewriteError::EvalEscape { .. }));
    }

    #[test]
    fn cycling_rule_set_is_detected() {
        let set = Ruleset::from_triples(&[("1 + ?;x", &[], "x + 1")]).unwrap();
        let err = set.simplify(&tree("a + 1"), &Scope::base()).unwrap_err();
        assert!(matches!(err, RewriteError::StuckInLoop { .. }));
    }

    #[test]
    fn rules_are_deduplicated() {
        let mut set = Ruleset::new();
        set.add_rule(Rule::from_strs("?;x + 0", &[], "x").unwrap());
        set.add_rule(Rule::from_strs("?;x + 0", &[], "x").unwrap());
        assert_eq!(set.rules().len(), 1);

        let defs = default_rulesets();
        let basic = &defs["basic"];
        assert_eq!(
            basic.union(basic).rules().len(),
            basic.rules().len()
        );
    }

    #[test]
    fn composition_adds_subtracts_and_toggles_flags() {
        let defs = default_rulesets();

        let both = collect_ruleset("zeroterm, unitfactor", &defs);
        assert_eq!(
            both.rules().len(),
            defs["zeroterm"].rules().len() + defs["unitfactor"].rules().len()
        );

        let trimmed = collect_ruleset("basic, !zeroterm", &defs);
        assert_eq!(
            trimmed.rules().len(),
            defs["basic"].rules().len() - defs["zeroterm"].rules().len()
        );

        let flagged = collect_ruleset("basic, fractionNumbers, !rowVector", &defs);
        assert_eq!(flagged.flag("fractionnumbers"), Some(true));
        assert_eq!(flagged.flag("rowvector"), Some(false));
        assert_eq!(flagged.rules().len(), defs["basic"].rules().len());
    }

    #[test]
    fn first_matching_rule_wins() {
        let set = Ruleset::from_triples(&[
            ("m_number;n + 0", &[], "eval(n + 100)"),
            ("?;x + 0", &[], "x"),
        ])
        .unwrap();
        let result = set.simplify(&tree("1 + 0"), &Scope::base()).unwrap();
        assert_eq!(result.to_string(), "101");
    }
}
