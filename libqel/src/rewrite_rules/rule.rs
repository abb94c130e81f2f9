//! A conditional pattern → result tree rewrite.

use super::pattern_match::{match_pattern, Captures};
use super::RewriteError;
use crate::evaluator::{evaluate, Scope};
use crate::grammar::{RcExpr, Tok};

use core::fmt;

/// One rewrite rule: a compiled pattern tree, boolean condition trees over the pattern's
/// captures, and a result template.
#[derive(Debug, PartialEq)]
pub struct Rule {
    pattern: RcExpr,
    conditions: Vec<RcExpr>,
    result: RcExpr,
}

impl Rule {
    /// Builds a rule from compiled trees, rejecting malformed `pattern ; name` bindings.
    pub fn new(
        pattern: RcExpr,
        conditions: Vec<RcExpr>,
        result: RcExpr,
    ) -> Result<Self, RewriteError> {
        validate_bindings(&pattern)?;
        Ok(Self {
            pattern,
            conditions,
            result,
        })
    }

    /// Builds a rule from its textual `[pattern, conditions[], result]` declaration.
    pub fn from_strs(
        pattern: &str,
        conditions: &[&str],
        result: &str,
    ) -> Result<Self, RewriteError> {
        let conditions = conditions
            .iter()
            .map(|c| compile_part(c))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(compile_part(pattern)?, conditions, compile_part(result)?)
    }

    /// Matches the rule's pattern against a subject (commutatively) and gates the match on
    /// every condition evaluating to true with the captures substituted in.
    ///
    /// A condition that fails to evaluate disqualifies the rule rather than propagating, so a
    /// condition inapplicable to the matched subtrees silently rejects the match.
    pub fn match_in(&self, subject: &RcExpr, scope: &Scope) -> Option<Captures> {
        let captures = match_pattern(&self.pattern, subject, true)?;
        for condition in &self.conditions {
            match evaluate(&captures.substitute(condition), scope) {
                Ok(value) if value.as_bool() == Some(true) => {}
                _ => return None,
            }
        }
        Some(captures)
    }

    /// Applies the rule to a subject: on a match, the result template with the captures
    /// substituted in.
    pub fn apply(&self, subject: &RcExpr, scope: &Scope) -> Option<RcExpr> {
        Some(self.match_in(subject, scope)?.substitute(&self.result))
    }
}

fn compile_part(source: &str) -> Result<RcExpr, RewriteError> {
    let invalid = |message: String| RewriteError::InvalidRule {
        source: source.to_string(),
        message,
    };
    crate::compile(source)
        .map_err(|err| invalid(err.to_string()))?
        .ok_or_else(|| invalid("the expression is empty".into()))
}

fn validate_bindings(pattern: &RcExpr) -> Result<(), RewriteError> {
    if let Tok::Op(op) = &pattern.tok {
        if op.name == ";" {
            match pattern.children.get(1).map(|c| &c.tok) {
                Some(Tok::Name(_)) => {}
                Some(_) => {
                    return Err(RewriteError::MalformedBinding {
                        found: pattern.children[1].to_string(),
                    })
                }
                None => {
                    return Err(RewriteError::MalformedBinding {
                        found: pattern.to_string(),
                    })
                }
            }
        }
    }
    for child in &pattern.children {
        validate_bindings(child)?;
    }
    Ok(())
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pattern)?;
        if !self.conditions.is_empty() {
            let conditions = self
                .conditions
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, " where {}", conditions)?;
        }
        write!(f, " -> {}", self.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(program: &str) -> RcExpr {
        crate::compile(program).unwrap().unwrap()
    }

    #[test]
    fn applies_on_match() {
        let rule = Rule::from_strs("?;x + 0", &[], "x").unwrap();
        let base = Scope::base();
        let rewritten = rule.apply(&tree("y + 0"), &base).unwrap();
        assert_eq!(rewritten.to_string(), "y");
        assert!(rule.apply(&tree("y + 1"), &base).is_none());
    }

    #[test]
    fn conditions_gate_the_match() {
        let rule = Rule::from_strs("m_number;n / m_number;m", &["m <> 0"], "eval(n / m)").unwrap();
        let base = Scope::base();
        assert!(rule.match_in(&tree("4 / 2"), &base).is_some());
        assert!(rule.match_in(&tree("4 / 0"), &base).is_none());
    }

    #[test]
    fn condition_evaluation_error_is_a_non_match() {
        // `x` captures the name `y`, so the condition compares a name with a number and no
        // overload matches; the rule is disqualified instead of the error propagating.
        let rule = Rule::from_strs("?;x + 0", &["x > 0"], "x").unwrap();
        assert!(rule.match_in(&tree("y + 0"), &Scope::base()).is_none());
        assert!(rule.match_in(&tree("3 + 0"), &Scope::base()).is_some());
    }

    #[test]
    fn malformed_binding_is_rejected_at_build() {
        assert!(matches!(
            Rule::from_strs("?;3 + 0", &[], "0"),
            Err(RewriteError::MalformedBinding { .. })
        ));
    }

    #[test]
    fn unparsable_rule_text_is_rejected() {
        assert!(matches!(
            Rule::from_strs("(1", &[], "1"),
            Err(RewriteError::InvalidRule { .. })
        ));
        assert!(matches!(
            Rule::from_strs("", &[], "1"),
            Err(RewriteError::InvalidRule { .. })
        ));
    }

    #[test]
    fn display_includes_conditions() {
        let rule = Rule::from_strs("?;x / m_number;m", &["m <> 0"], "x").unwrap();
        assert_eq!(rule.to_string(), "?;x / m_number;m where m <> 0 -> x");
    }
}
