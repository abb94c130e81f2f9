//! The scope chain: parent-linked environments owning variables, function overload sets, and
//! named rulesets.
//!
//! Ancestor scopes are held by immutable borrow, so a child overlay can never mutate the scope
//! it extends; shadow-hiding a parent entry is done with per-mapping deleted-name sets.

use crate::evaluator::EvalError;
use crate::grammar::{signature_accepts, signature_allows_arity, RcExpr, Sig, Type};
use crate::rewrite_rules::Ruleset;

use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The evaluation procedure of a function definition. Arguments arrive already evaluated.
pub type Builtin = fn(&[RcExpr], &Scope) -> Result<RcExpr, EvalError>;

/// Globally increasing declaration sequence, used to keep overloads in declaration order
/// across merged scopes.
static NEXT_SEQ: AtomicUsize = AtomicUsize::new(0);

/// One overload of a named function or operator.
#[derive(Clone, Debug)]
pub struct FnDef {
    /// The (case-folded) function name.
    pub name: String,
    /// The input type signature.
    pub sig: Vec<Sig>,
    /// The output type tag; `None` when the output type depends on the arguments.
    pub out: Option<Type>,
    /// Custom typecheck predicate; the default is a positional structural match of the
    /// signature against the argument type tags.
    typecheck: Option<fn(&[RcExpr]) -> bool>,
    eval: Builtin,
    /// Whether the definition consumes randomness.
    pub random: bool,
    /// Declaration sequence id.
    pub seq: usize,
}

impl FnDef {
    pub fn new<S, O>(name: S, sig: Vec<Sig>, out: O, eval: Builtin) -> Self
    where
        S: Into<String>,
        O: Into<Option<Type>>,
    {
        Self {
            name: name.into().to_lowercase(),
            sig,
            out: out.into(),
            typecheck: None,
            eval,
            random: false,
            seq: NEXT_SEQ.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn random(mut self) -> Self {
        self.random = true;
        self
    }

    #[allow(unused)]
    pub fn with_typecheck(mut self, typecheck: fn(&[RcExpr]) -> bool) -> Self {
        self.typecheck = Some(typecheck);
        self
    }

    /// Whether this overload accepts the given evaluated arguments.
    pub fn accepts(&self, args: &[RcExpr]) -> bool {
        match self.typecheck {
            Some(check) => check(args),
            None => {
                let tys: Vec<Type> = args.iter().map(|a| a.tok.ty()).collect();
                signature_accepts(&self.sig, &tys)
            }
        }
    }

    /// Whether this overload could accept an `n`-argument call of any types.
    pub fn allows_arity(&self, n: usize) -> bool {
        signature_allows_arity(&self.sig, n)
    }

    pub fn call(&self, args: &[RcExpr], scope: &Scope) -> Result<RcExpr, EvalError> {
        (self.eval)(args, scope)
    }
}

/// A node in a parent-linked chain of environments.
#[derive(Default)]
pub struct Scope<'p> {
    parent: Option<&'p Scope<'p>>,
    variables: HashMap<String, RcExpr>,
    functions: HashMap<String, Vec<Rc<FnDef>>>,
    rulesets: HashMap<String, Ruleset>,
    deleted_variables: HashSet<String>,
    deleted_functions: HashSet<String>,
    deleted_rulesets: HashSet<String>,
}

impl Scope<'static> {
    /// Constructs the immutable base scope holding every built-in definition. Build it once at
    /// startup and pass it around by reference; per-evaluation bindings belong in a
    /// [child](Scope::child) overlay.
    pub fn base() -> Scope<'static> {
        let mut scope = Scope::default();
        super::builtins::register(&mut scope);
        scope
    }
}

impl<'p> Scope<'p> {
    pub fn new() -> Scope<'p> {
        Scope::default()
    }

    /// A thin overlay extending this scope.
    pub fn child(&self) -> Scope<'_> {
        Scope {
            parent: Some(self),
            ..Scope::default()
        }
    }

    /// Binds a variable, case-folding the name.
    pub fn set_var<S: Into<String>>(&mut self, name: S, value: RcExpr) {
        let key = name.into().to_lowercase();
        self.deleted_variables.remove(&key);
        self.variables.insert(key, value);
    }

    /// Resolves a variable through the chain, stopping at the first defining or deleting
    /// scope.
    pub fn resolve_var(&self, name: &str) -> Option<&RcExpr> {
        let key = name.to_lowercase();
        let mut scope = Some(self);
        while let Some(s) = scope {
            if let Some(value) = s.variables.get(&key) {
                return Some(value);
            }
            if s.deleted_variables.contains(&key) {
                return None;
            }
            scope = s.parent;
        }
        None
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.resolve_var(name).is_some()
    }

    /// Hides a variable from this scope and its ancestors without touching them.
    pub fn delete_var(&mut self, name: &str) {
        let key = name.to_lowercase();
        self.variables.remove(&key);
        self.deleted_variables.insert(key);
    }

    /// Registers a function overload in this scope.
    pub fn register_fn(&mut self, def: FnDef) {
        self.deleted_functions.remove(&def.name);
        self.functions
            .entry(def.name.clone())
            .or_insert_with(Vec::new)
            .push(Rc::new(def));
    }

    pub fn delete_fn(&mut self, name: &str) {
        let key = name.to_lowercase();
        self.functions.remove(&key);
        self.deleted_functions.insert(key);
    }

    /// Collects every overload registered under `name` across the chain, in declaration
    /// order, with duplicates removed.
    pub fn collect_fns(&self, name: &str) -> Vec<Rc<FnDef>> {
        let key = name.to_lowercase();
        let mut defs: Vec<Rc<FnDef>> = Vec::new();
        let mut scope = Some(self);
        while let Some(s) = scope {
            if let Some(overloads) = s.functions.get(&key) {
                defs.extend(overloads.iter().cloned());
            }
            if s.deleted_functions.contains(&key) {
                break;
            }
            scope = s.parent;
        }
        defs.sort_by_key(|d| d.seq);
        defs.dedup_by_key(|d| d.seq);
        defs
    }

    pub fn add_ruleset<S: Into<String>>(&mut self, name: S, ruleset: Ruleset) {
        let key = name.into().to_lowercase();
        self.deleted_rulesets.remove(&key);
        self.rulesets.insert(key, ruleset);
    }

    pub fn resolve_ruleset(&self, name: &str) -> Option<&Ruleset> {
        let key = name.to_lowercase();
        let mut scope = Some(self);
        while let Some(s) = scope {
            if let Some(ruleset) = s.rulesets.get(&key) {
                return Some(ruleset);
            }
            if s.deleted_rulesets.contains(&key) {
                return None;
            }
            scope = s.parent;
        }
        None
    }

    pub fn delete_ruleset(&mut self, name: &str) {
        let key = name.to_lowercase();
        self.rulesets.remove(&key);
        self.deleted_rulesets.insert(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Expr;

    #[test]
    fn variable_lookup_walks_the_chain() {
        let mut base = Scope::new();
        base.set_var("X", Expr::number(1.));

        let mut child = base.child();
        child.set_var("y", Expr::number(2.));

        assert!(child.has_var("x")); // names are case-folded
        assert!(child.has_var("Y"));
        assert!(!base.has_var("y"));
    }

    #[test]
    fn deletion_shadow_hides_without_mutating_parent() {
        let mut base = Scope::new();
        base.set_var("x", Expr::number(1.));

        let mut child = base.child();
        child.delete_var("x");
        assert!(!child.has_var("x"));
        assert!(base.has_var("x"));
    }

    #[test]
    fn rebinding_after_deletion() {
        let mut scope = Scope::new();
        scope.set_var("x", Expr::number(1.));
        scope.delete_var("x");
        scope.set_var("x", Expr::number(2.));
        assert_eq!(scope.resolve_var("x").unwrap().as_number().unwrap().re, 2.);
    }

    #[test]
    fn overloads_merge_in_declaration_order() {
        fn first(_: &[RcExpr], _: &Scope) -> Result<RcExpr, EvalError> {
            Ok(Expr::number(1.))
        }
        fn second(_: &[RcExpr], _: &Scope) -> Result<RcExpr, EvalError> {
            Ok(Expr::number(2.))
        }

        let mut base = Scope::new();
        base.register_fn(FnDef::new("f", vec![Sig::Any], Type::Number, first));

        let mut child = base.child();
        child.register_fn(FnDef::new("F", vec![Sig::Any], Type::Number, second));

        let defs = child.collect_fns("f");
        assert_eq!(defs.len(), 2);
        // The base-scope definition was declared first, so it stays first.
        assert!(defs[0].seq < defs[1].seq);
    }
}
