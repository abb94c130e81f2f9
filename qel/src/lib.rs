//! The qel app: evaluates or simplifies one QEL program from the command line. For an
//! overview of the language core, see [libqel's documentation](libqel).

#![deny(warnings)]
#![deny(missing_docs)]

mod diagnostics;
use diagnostics::{emit_qel_diagnostics, sanitize_source_for_diagnostics};

use libqel::diagnostics::Diagnostic;
use libqel::{
    collect_ruleset, default_rulesets, evaluate, parse, scan, Emit, EmitFormat, Scope,
};

/// Options to run qel with.
pub struct Opts {
    /// QEL program.
    pub program: String,
    /// How the result of qel's execution should be emitted.
    pub emit_format: String,
    /// When [Some](Option::Some) ruleset specification, simplify the program with those rule
    /// sets instead of evaluating it.
    pub simplify: Option<String>,
    /// When true, qel will stop after parsing a program.
    pub parse_only: bool,
    /// When true, qel emit will be colored.
    pub color: bool,
}

/// Output of a qel execution.
#[derive(Default)]
pub struct QelResult {
    /// Exit code
    pub code: i32,
    /// Emit for stdout
    pub stdout: String,
    /// Emit for stderr
    pub stderr: String,
}

/// Builds a [QelResult](self::QelResult).
struct QelResultBuilder<'a> {
    /// File the program is defined in. [None](Option::None) if the program comes from a side
    /// channel like the command line.
    file: Option<&'a str>,
    /// Program source code sanitized for diagnostic emission.
    sanitized_program: String,
    emit_format: EmitFormat,
    color: bool,
    stdout: String,
    stderr: String,
}

impl<'a> QelResultBuilder<'a> {
    fn new(file: Option<&'a str>, program: &'a str, emit_format: &str, color: bool) -> Self {
        Self {
            file,
            sanitized_program: sanitize_source_for_diagnostics(program),
            emit_format: match emit_format {
                "s-expression" => EmitFormat::SExpression,
                "debug" => EmitFormat::Debug,
                _ => EmitFormat::Pretty,
            },
            color,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    fn emit(&mut self, obj: &dyn Emit) {
        self.stdout.push_str(&obj.emit(self.emit_format));
    }

    fn err(&mut self, diagnostic: Diagnostic) {
        self.stderr.push_str(&emit_qel_diagnostics(
            self.file,
            &self.sanitized_program,
            &[diagnostic],
            self.color,
        ));
    }

    fn ok(self) -> QelResult {
        QelResult {
            code: 0,
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }

    fn failed(self) -> QelResult {
        QelResult {
            code: 1,
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }
}

/// Runs qel end-to-end: scan, parse, then evaluate or simplify.
pub fn run_qel(opts: Opts) -> QelResult {
    let mut result = QelResultBuilder::new(
        None, // file: currently programs can only be read from the command line
        &opts.program,
        &opts.emit_format,
        opts.color,
    );
    let program_span = (0, opts.program.chars().count());

    let tokens = match scan(&*opts.program) {
        Ok(tokens) => tokens,
        Err(err) => {
            result.err(err.diagnostic());
            return result.failed();
        }
    };

    let tree = match parse(tokens) {
        Ok(Some(tree)) => tree,
        // An empty program has nothing to emit.
        Ok(None) => return result.ok(),
        Err(err) => {
            result.err(err.diagnostic());
            return result.failed();
        }
    };

    if opts.parse_only {
        result.emit(&*tree);
        return result.ok();
    }

    let base = Scope::base();
    if let Some(spec) = &opts.simplify {
        let ruleset = collect_ruleset(spec, &default_rulesets());
        match ruleset.simplify(&tree, &base) {
            Ok(simplified) => {
                result.emit(&*simplified);
                result.ok()
            }
            Err(err) => {
                result.err(err.diagnostic(program_span));
                result.failed()
            }
        }
    } else {
        match evaluate(&tree, &base) {
            Ok(value) => {
                result.emit(&*value);
                result.ok()
            }
            Err(err) => {
                result.err(err.diagnostic(program_span));
                result.failed()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(program: &str, simplify: Option<&str>, parse_only: bool) -> QelResult {
        run_qel(Opts {
            program: program.into(),
            emit_format: "pretty".into(),
            simplify: simplify.map(str::to_owned),
            parse_only,
            color: false,
        })
    }

    #[test]
    fn evaluates_a_program() {
        let result = run("1 + 2 * 3", None, false);
        assert_eq!(result.code, 0);
        assert_eq!(result.stdout, "7");
        assert!(result.stderr.is_empty());
    }

    #[test]
    fn empty_program_is_ok_and_silent() {
        let result = run("  // nothing here", None, false);
        assert_eq!(result.code, 0);
        assert!(result.stdout.is_empty());
    }

    #[test]
    fn parse_only_dumps_the_tree() {
        let result = run_qel(Opts {
            program: "1 + 2 * 3".into(),
            emit_format: "s-expression".into(),
            simplify: None,
            parse_only: true,
            color: false,
        });
        assert_eq!(result.stdout, "(+ 1 (* 2 3))");
    }

    #[test]
    fn simplifies_without_evaluating_unbound_names() {
        let result = run("x + 0 * y", Some("all"), false);
        assert_eq!(result.code, 0);
        assert_eq!(result.stdout, "x");
    }

    #[test]
    fn scan_errors_are_rendered() {
        let result = run("1 + @", None, false);
        assert_eq!(result.code, 1);
        assert!(result.stdout.is_empty());
        assert!(result.stderr.contains("Unrecognized token"));
    }

    #[test]
    fn parse_errors_are_rendered() {
        let result = run("(1 + 2", None, false);
        assert_eq!(result.code, 1);
        assert!(result.stderr.contains("Unmatched bracket"));
    }

    #[test]
    fn eval_errors_are_rendered_with_hints() {
        let result = run("xsin(1)", None, false);
        assert_eq!(result.code, 1);
        assert!(result.stderr.contains("Unknown function"));
        assert!(result.stderr.contains("did you mean"));
    }
}
