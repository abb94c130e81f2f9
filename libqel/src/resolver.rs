//! Dependency-ordered, cycle-checked resolution of named variable definitions.
//!
//! Each definition is evaluated only after the definitions it references, with circular and
//! undefined references reported as typed errors. The per-variable compute procedure is
//! injectable so that subsystems with their own accumulated state (such as answer marking)
//! can reuse the traversal unchanged.

use crate::common::Span;
use crate::diagnostics::Diagnostic;
use crate::evaluator::{evaluate, Scope};
use crate::grammar::collectors::collect_free_vars;
use crate::grammar::RcExpr;

use core::fmt;
use std::collections::HashMap;
use std::error::Error;

/// A variable-resolution failure.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolveError {
    /// A definition that (transitively) references itself; carries the full dependency path.
    Circular { path: Vec<String> },
    /// A referenced name present in neither the scope nor the definition set.
    Undefined { name: String },
    /// A definition with no expression.
    Empty { name: String },
    /// A definition whose source does not compile.
    Invalid { name: String, message: String },
    /// A definition whose tree failed to evaluate.
    Eval { name: String, message: String },
    /// No run satisfied the gate condition within the retry bound.
    TooManyAttempts { max_runs: usize },
}

impl ResolveError {
    /// Lowers the error into a [Diagnostic] anchored at `span`.
    pub fn diagnostic<S: Into<Span>>(&self, span: S) -> Diagnostic {
        let diag = Diagnostic::span_err(span, "Variable resolution error", self.to_string());
        match self {
            ResolveError::Circular { .. } => {
                diag.with_note("every variable on the path depends on the next, and the last on the first")
            }
            ResolveError::TooManyAttempts { .. } => {
                diag.with_help("loosen the condition or the ranges the variables draw from")
            }
            _ => diag,
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Circular { path } => {
                write!(f, "Circular reference: {}", path.join(" -> "))
            }
            ResolveError::Undefined { name } => {
                write!(f, "Variable \"{}\" is not defined", name)
            }
            ResolveError::Empty { name } => {
                write!(f, "The definition of \"{}\" is empty", name)
            }
            ResolveError::Invalid { name, message } => {
                write!(f, "The definition of \"{}\" is invalid: {}", name, message)
            }
            ResolveError::Eval { name, message } => {
                write!(f, "Could not evaluate \"{}\": {}", name, message)
            }
            ResolveError::TooManyAttempts { max_runs } => {
                write!(
                    f,
                    "No variable assignment satisfied the condition in {} attempts",
                    max_runs
                )
            }
        }
    }
}

impl Error for ResolveError {}

/// A named variable's definition: a syntax tree and the free-variable names it references.
#[derive(Clone, Debug)]
pub struct VariableDef {
    pub tree: RcExpr,
    pub vars: Vec<String>,
}

impl VariableDef {
    /// Wraps a compiled tree, collecting its free variables.
    pub fn new(tree: RcExpr) -> Self {
        let mut vars: Vec<String> = collect_free_vars(&tree).into_iter().collect();
        vars.sort();
        Self { tree, vars }
    }

    /// Compiles a definition from source text, reporting empty and invalid definitions.
    pub fn from_source(name: &str, source: &str) -> Result<Self, ResolveError> {
        let tree = crate::compile(source)
            .map_err(|err| ResolveError::Invalid {
                name: name.to_string(),
                message: err.to_string(),
            })?
            .ok_or_else(|| ResolveError::Empty {
                name: name.to_string(),
            })?;
        Ok(Self::new(tree))
    }
}

/// The procedure computing one variable's value; the default resolves the definition's
/// dependencies and evaluates its tree.
pub type Compute<'a> = &'a dyn Fn(&str, &VariableDef, &Scope) -> Result<RcExpr, ResolveError>;

/// The outcome of a resolution run.
#[derive(Debug, PartialEq)]
pub struct Resolution {
    /// The evaluated variables, keyed by case-folded name.
    pub variables: HashMap<String, RcExpr>,
    /// False when the gate condition evaluated to false and resolution stopped early.
    pub condition_satisfied: bool,
}

/// Resolves every definition in dependency order against a scope.
///
/// When a gate `condition` is given, its free variables are resolved first and the condition
/// evaluated; a false gate stops resolution with `condition_satisfied = false`. Names already
/// bound directly in the scope are not recomputed.
pub fn resolve_variables(
    defs: &HashMap<String, VariableDef>,
    scope: &Scope,
    condition: Option<&RcExpr>,
    compute: Option<Compute>,
) -> Result<Resolution, ResolveError> {
    let defs: HashMap<String, &VariableDef> =
        defs.iter().map(|(k, v)| (k.to_lowercase(), v)).collect();
    let mut resolver = Resolver {
        defs: &defs,
        base: scope,
        compute,
        results: HashMap::new(),
        path: Vec::new(),
    };

    if let Some(condition) = condition {
        for name in {
            let mut names: Vec<_> = collect_free_vars(condition).into_iter().collect();
            names.sort();
            names
        } {
            resolver.resolve(&name)?;
        }
        let satisfied = evaluate(condition, &resolver.env())
            .map_err(|err| ResolveError::Eval {
                name: "the condition".to_string(),
                message: err.to_string(),
            })?
            .as_bool();
        match satisfied {
            Some(true) => {}
            Some(false) => {
                return Ok(Resolution {
                    variables: resolver.results,
                    condition_satisfied: false,
                })
            }
            None => {
                return Err(ResolveError::Eval {
                    name: "the condition".to_string(),
                    message: "the condition is not a boolean".to_string(),
                })
            }
        }
    }

    let mut names: Vec<_> = defs.keys().cloned().collect();
    names.sort();
    for name in names {
        resolver.resolve(&name)?;
    }

    Ok(Resolution {
        variables: resolver.results,
        condition_satisfied: true,
    })
}

/// Re-runs resolution until the gate condition passes, re-drawing randomized definitions on
/// every run, up to `max_runs` attempts.
pub fn resolve_with_retries(
    defs: &HashMap<String, VariableDef>,
    scope: &Scope,
    condition: Option<&RcExpr>,
    max_runs: usize,
) -> Result<Resolution, ResolveError> {
    for run in 0..max_runs {
        let resolution = resolve_variables(defs, scope, condition, None)?;
        if resolution.condition_satisfied {
            return Ok(resolution);
        }
        log::debug!("condition not satisfied on run {}, re-drawing", run + 1);
    }
    Err(ResolveError::TooManyAttempts { max_runs })
}

struct Resolver<'a, 'p> {
    defs: &'a HashMap<String, &'a VariableDef>,
    base: &'a Scope<'p>,
    compute: Option<Compute<'a>>,
    results: HashMap<String, RcExpr>,
    /// The names currently being resolved, outermost first.
    path: Vec<String>,
}

impl Resolver<'_, '_> {
    /// The base scope overlaid with the values resolved so far.
    fn env(&self) -> Scope<'_> {
        let mut env = self.base.child();
        for (name, value) in &self.results {
            env.set_var(name.clone(), value.clone());
        }
        env
    }

    fn resolve(&mut self, name: &str) -> Result<(), ResolveError> {
        let key = name.to_lowercase();
        if self.results.contains_key(&key) || self.base.has_var(&key) {
            return Ok(());
        }
        if self.path.contains(&key) {
            return Err(ResolveError::Circular {
                path: self.path.clone(),
            });
        }
        let def = match self.defs.get(&key) {
            Some(def) => *def,
            None => return Err(ResolveError::Undefined { name: key }),
        };

        self.path.push(key.clone());
        for dep in &def.vars {
            self.resolve(dep)?;
        }
        self.path.pop();

        log::debug!("resolving {} (depends on {:?})", key, def.vars);
        let value = match self.compute {
            Some(compute) => compute(&key, def, &self.env())?,
            None => evaluate(&def.tree, &self.env()).map_err(|err| ResolveError::Eval {
                name: key.clone(),
                message: err.to_string(),
            })?,
        };
        self.results.insert(key, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn defs(entries: &[(&str, &str)]) -> HashMap<String, VariableDef> {
        entries
            .iter()
            .map(|(name, source)| {
                (
                    name.to_string(),
                    VariableDef::from_source(name, source).unwrap(),
                )
            })
            .collect()
    }

    fn values(resolution: &Resolution) -> HashMap<String, String> {
        resolution
            .variables
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }

    #[test]
    fn resolves_in_dependency_order() {
        let defs = defs(&[("a", "b + 1"), ("b", "2")]);
        let base = Scope::base();
        let resolution = resolve_variables(&defs, &base, None, None).unwrap();
        assert!(resolution.condition_satisfied);
        let values = values(&resolution);
        assert_eq!(values["a"], "3");
        assert_eq!(values["b"], "2");
    }

    #[test]
    fn deep_chains_and_scope_bindings() {
        let defs = defs(&[("a", "b * c"), ("b", "c + 1"), ("c", "k + 1")]);
        let base = Scope::base();
        let mut scope = base.child();
        scope.set_var("k", crate::grammar::Expr::number(1.));

        let resolution = resolve_variables(&defs, &scope, None, None).unwrap();
        let values = values(&resolution);
        // k comes from the scope and is not recomputed.
        assert!(!resolution.variables.contains_key("k"));
        assert_eq!(values["c"], "2");
        assert_eq!(values["b"], "3");
        assert_eq!(values["a"], "6");
    }

    #[test]
    fn circular_reference_names_the_full_path() {
        let defs = defs(&[("a", "b"), ("b", "a")]);
        assert_eq!(
            resolve_variables(&defs, &Scope::base(), None, None),
            Err(ResolveError::Circular {
                path: vec!["a".into(), "b".into()]
            })
        );
    }

    #[test]
    fn self_reference_is_circular() {
        let defs = defs(&[("a", "a + 1")]);
        assert!(matches!(
            resolve_variables(&defs, &Scope::base(), None, None),
            Err(ResolveError::Circular { .. })
        ));
    }

    #[test]
    fn undefined_reference() {
        let defs = defs(&[("a", "nope + 1")]);
        assert_eq!(
            resolve_variables(&defs, &Scope::base(), None, None),
            Err(ResolveError::Undefined {
                name: "nope".into()
            })
        );
    }

    #[test]
    fn empty_and_invalid_definitions() {
        assert_eq!(
            VariableDef::from_source("a", "  // nothing").unwrap_err(),
            ResolveError::Empty { name: "a".into() }
        );
        assert!(matches!(
            VariableDef::from_source("a", "(1"),
            Err(ResolveError::Invalid { .. })
        ));
    }

    #[test]
    fn false_gate_stops_resolution() {
        let defs = defs(&[("a", "1"), ("b", "assert(false, 'b was computed')")]);
        let condition = crate::compile("a > 1").unwrap().unwrap();
        let resolution =
            resolve_variables(&defs, &Scope::base(), Some(&condition), None).unwrap();
        assert!(!resolution.condition_satisfied);
        // Only the gate's dependencies were computed.
        assert!(resolution.variables.contains_key("a"));
        assert!(!resolution.variables.contains_key("b"));
    }

    #[test]
    fn true_gate_resolves_everything() {
        let defs = defs(&[("a", "1"), ("b", "a + 1")]);
        let condition = crate::compile("a <= 1").unwrap().unwrap();
        let resolution =
            resolve_variables(&defs, &Scope::base(), Some(&condition), None).unwrap();
        assert!(resolution.condition_satisfied);
        assert_eq!(values(&resolution)["b"], "2");
    }

    #[test]
    fn injectable_compute_sees_dependency_order() {
        let defs = defs(&[("a", "b + 1"), ("b", "2")]);
        let order = RefCell::new(Vec::new());
        let compute = |name: &str, def: &VariableDef, scope: &Scope| {
            order.borrow_mut().push(name.to_string());
            evaluate(&def.tree, scope).map_err(|err| ResolveError::Eval {
                name: name.to_string(),
                message: err.to_string(),
            })
        };
        let base = Scope::base();
        resolve_variables(&defs, &base, None, Some(&compute)).unwrap();
        assert_eq!(*order.borrow(), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn retries_until_the_gate_passes() {
        // The gate is always satisfiable, so a run succeeds well within the bound.
        let defs = defs(&[("roll", "random(1..4)")]);
        let condition = crate::compile("roll <= 4").unwrap().unwrap();
        let resolution =
            resolve_with_retries(&defs, &Scope::base(), Some(&condition), 50).unwrap();
        assert!(resolution.condition_satisfied);
    }

    #[test]
    fn bounded_retries_raise_after_the_limit() {
        let defs = defs(&[("a", "1")]);
        let condition = crate::compile("a > 1").unwrap().unwrap();
        assert_eq!(
            resolve_with_retries(&defs, &Scope::base(), Some(&condition), 3),
            Err(ResolveError::TooManyAttempts { max_runs: 3 })
        );
    }

    #[test]
    fn case_insensitive_names() {
        let defs = defs(&[("Total", "Part + 1"), ("part", "2")]);
        let resolution = resolve_variables(&defs, &Scope::base(), None, None).unwrap();
        assert_eq!(values(&resolution)["total"], "3");
    }
}
