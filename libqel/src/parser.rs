//! The QEL operator-precedence (shunting-yard) parser.
//!
//! The parser maintains an output stack of built subtrees and an operator/bracket stack. Each
//! open bracket carries an argument counter and the output length at the time it was opened,
//! from which the arity of a call or list literal is computed on close.

mod errors;
pub use errors::ParseError;

use crate::common::Span;
use crate::grammar::*;
use crate::scanner::types::{Token, TokenType};
use crate::utils::PeekIter;

/// Parses a token sequence into a syntax tree, or `None` for empty input.
pub fn parse(tokens: Vec<Token>) -> Result<Option<RcExpr>, ParseError> {
    Parser::new(tokens).parse()
}

struct Parser {
    input: PeekIter<Token>,
    output: Vec<RcExpr>,
    stack: Vec<StackEntry>,
    last_span: Span,
}

enum StackEntry {
    Op(OpEntry),
    KeyPair { key: String, span: Span },
    Bracket(BracketEntry),
}

struct OpEntry {
    name: String,
    prec: u8,
    prefix: bool,
    span: Span,
}

struct BracketEntry {
    kind: BracketKind,
    span: Span,
    /// Commas seen inside this bracket so far.
    args: usize,
    /// Output stack length when the bracket was opened.
    out_len: usize,
}

enum BracketKind {
    /// `name(` — a function call marker.
    Call { name: String },
    /// A plain grouping `(`.
    Group,
    /// A `[` opening a list or dictionary literal.
    NewList,
    /// A `[` indexing or slicing the preceding value.
    Index,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            input: PeekIter::new(tokens.into_iter()),
            output: Vec::new(),
            stack: Vec::new(),
            last_span: Span { lo: 0, hi: 0 },
        }
    }

    fn parse(mut self) -> Result<Option<RcExpr>, ParseError> {
        let mut prev: Option<TokenType> = None;
        while let Some(Token { ty, span }) = self.input.next() {
            self.last_span = span;
            let mut consumed = ty.clone();
            match ty {
                TokenType::Number(n) => self.output.push(Expr::leaf(Tok::Number(n))),
                TokenType::Bool(b) => self.output.push(Expr::boolean(b)),
                TokenType::Str(value) => self.output.push(Expr::leaf(Tok::Str(Str {
                    value,
                    safe: false,
                    latex: false,
                }))),
                TokenType::Name { name, annotations } => {
                    if matches!(self.input.peek().map(|t| &t.ty), Some(TokenType::OpenParen)) {
                        let open = self.input.next().unwrap();
                        self.stack.push(StackEntry::Bracket(BracketEntry {
                            kind: BracketKind::Call { name },
                            span: span.to(open.span),
                            args: 0,
                            out_len: self.output.len(),
                        }));
                        consumed = TokenType::OpenParen;
                    } else {
                        self.output.push(Expr::leaf(Tok::Name(Name {
                            name,
                            annotations,
                            unbound: false,
                        })));
                    }
                }
                TokenType::KeyPair(key) => self.stack.push(StackEntry::KeyPair { key, span }),
                TokenType::Op(name) => self.handle_op(name, span)?,
                TokenType::OpenParen => self.stack.push(StackEntry::Bracket(BracketEntry {
                    kind: BracketKind::Group,
                    span,
                    args: 0,
                    out_len: self.output.len(),
                })),
                TokenType::OpenBracket => {
                    let indexes = matches!(
                        prev,
                        Some(
                            TokenType::Name { .. }
                                | TokenType::Str(_)
                                | TokenType::CloseParen
                                | TokenType::CloseBracket
                        )
                    );
                    self.stack.push(StackEntry::Bracket(BracketEntry {
                        kind: if indexes {
                            BracketKind::Index
                        } else {
                            BracketKind::NewList
                        },
                        span,
                        args: 0,
                        out_len: self.output.len(),
                    }));
                }
                TokenType::CloseParen => self.close_paren(span)?,
                TokenType::CloseBracket => self.close_bracket(span)?,
                TokenType::Comma => self.handle_comma(span)?,
            }
            prev = Some(consumed);
        }

        // End of input: flush the remaining stack to output.
        while let Some(entry) = self.stack.pop() {
            match entry {
                StackEntry::Op(op) => self.apply_op(op)?,
                StackEntry::KeyPair { key, span } => self.apply_key_pair(key, span)?,
                StackEntry::Bracket(b) => return Err(Self::unclosed(b)),
            }
        }

        match self.output.len() {
            0 => Ok(None),
            1 => Ok(self.output.pop()),
            _ => Err(ParseError::MissingOperator { span: self.last_span }),
        }
    }

    fn handle_op(&mut self, name: String, span: Span) -> Result<(), ParseError> {
        if is_postfix_op(&name) {
            // Postfix operators bind tightest of all and apply immediately.
            let operand = self
                .output
                .pop()
                .ok_or(ParseError::MissingOperand { op: name.clone(), span })?;
            self.output.push(Expr::node(
                Tok::Op(Op {
                    name,
                    arity: 1,
                    prefix: false,
                    postfix: true,
                }),
                vec![operand],
            ));
            return Ok(());
        }

        let prec = precedence(&name);
        let prefix = is_prefix_op(&name);
        if !prefix {
            let right = is_right_assoc(&name);
            while let Some(StackEntry::Op(top)) = self.stack.last() {
                if top.prec < prec || (top.prec == prec && !right) {
                    match self.stack.pop() {
                        Some(StackEntry::Op(top)) => self.apply_op(top)?,
                        _ => unreachable!(),
                    }
                } else {
                    break;
                }
            }
        }
        self.stack.push(StackEntry::Op(OpEntry {
            name,
            prec,
            prefix,
            span,
        }));
        Ok(())
    }

    fn apply_op(&mut self, op: OpEntry) -> Result<(), ParseError> {
        let arity = if op.prefix { 1 } else { 2 };
        if self.output.len() < arity {
            return Err(ParseError::MissingOperand {
                op: op.name,
                span: op.span,
            });
        }
        let children = self.output.split_off(self.output.len() - arity);
        self.output.push(Expr::node(
            Tok::Op(Op {
                name: op.name,
                arity,
                prefix: op.prefix,
                postfix: false,
            }),
            children,
        ));
        Ok(())
    }

    fn apply_key_pair(&mut self, key: String, span: Span) -> Result<(), ParseError> {
        let value = self
            .output
            .pop()
            .ok_or(ParseError::MissingOperand { op: ":".into(), span })?;
        self.output.push(Expr::node(Tok::KeyPair(key), vec![value]));
        Ok(())
    }

    /// Pops pending operators and key-pairs down to the enclosing bracket, which is left on
    /// the stack. Returns whether a bracket was found.
    fn pop_to_bracket(&mut self) -> Result<bool, ParseError> {
        loop {
            match self.stack.last() {
                Some(StackEntry::Bracket(_)) => return Ok(true),
                None => return Ok(false),
                _ => match self.stack.pop() {
                    Some(StackEntry::Op(op)) => self.apply_op(op)?,
                    Some(StackEntry::KeyPair { key, span }) => self.apply_key_pair(key, span)?,
                    _ => unreachable!(),
                },
            }
        }
    }

    fn handle_comma(&mut self, span: Span) -> Result<(), ParseError> {
        if !self.pop_to_bracket()? {
            return Err(ParseError::UnexpectedComma { span });
        }
        let bracket = match self.stack.last_mut() {
            Some(StackEntry::Bracket(b)) => b,
            _ => unreachable!(),
        };
        if self.output.len() <= bracket.out_len + bracket.args {
            return Err(ParseError::MissingOperand { op: ",".into(), span });
        }
        bracket.args += 1;
        Ok(())
    }

    /// Pops the enclosing bracket and computes the number of arguments it encloses.
    fn pop_bracket(&mut self) -> Option<(BracketEntry, usize)> {
        match self.stack.pop() {
            Some(StackEntry::Bracket(b)) => {
                let grew = self.output.len() > b.out_len + b.args;
                let argc = b.args + grew as usize;
                Some((b, argc))
            }
            _ => None,
        }
    }

    fn close_paren(&mut self, span: Span) -> Result<(), ParseError> {
        if !self.pop_to_bracket()? {
            return Err(ParseError::UnmatchedBracket { bracket: ')', span });
        }
        let (bracket, argc) = self.pop_bracket().unwrap();
        match bracket.kind {
            BracketKind::Call { name } => {
                let children = self.output.split_off(self.output.len() - argc);
                self.output.push(Expr::node(
                    Tok::Func(Func { name, arity: argc }),
                    children,
                ));
                Ok(())
            }
            BracketKind::Group => match argc {
                1 if bracket.args == 0 => Ok(()),
                0 => Err(ParseError::MissingOperand { op: "(".into(), span }),
                _ => Err(ParseError::MissingOperator { span }),
            },
            BracketKind::NewList | BracketKind::Index => {
                Err(ParseError::UnmatchedBracket { bracket: '[', span: bracket.span })
            }
        }
    }

    fn close_bracket(&mut self, span: Span) -> Result<(), ParseError> {
        if !self.pop_to_bracket()? {
            return Err(ParseError::UnmatchedBracket { bracket: ']', span });
        }
        let (bracket, argc) = self.pop_bracket().unwrap();
        match bracket.kind {
            BracketKind::NewList => {
                let children = self.output.split_off(self.output.len() - argc);
                let pairs = children
                    .iter()
                    .filter(|c| matches!(c.tok, Tok::KeyPair(_)))
                    .count();
                let tok = match pairs {
                    0 => Tok::List(crate::grammar::List::Unbuilt(argc)),
                    n if n == argc => Tok::Dict(Dict::Unbuilt(argc)),
                    _ => return Err(ParseError::MixedKeyPairs { span: bracket.span.to(span) }),
                };
                self.output.push(Expr::node(tok, children));
                Ok(())
            }
            BracketKind::Index => {
                if argc == 0 {
                    return Err(ParseError::MissingOperand { op: "[]".into(), span });
                }
                let indices = self.output.split_off(self.output.len() - argc);
                let target = self
                    .output
                    .pop()
                    .ok_or(ParseError::MissingOperand { op: "[]".into(), span })?;
                let mut children = Vec::with_capacity(argc + 1);
                children.push(target);
                children.extend(indices);
                self.output.push(Expr::func("listval", children));
                Ok(())
            }
            BracketKind::Call { .. } | BracketKind::Group => {
                Err(ParseError::UnmatchedBracket { bracket: '(', span: bracket.span })
            }
        }
    }

    fn unclosed(bracket: BracketEntry) -> ParseError {
        match bracket.kind {
            BracketKind::Call { name } => ParseError::UnterminatedCall {
                name,
                span: bracket.span,
            },
            BracketKind::Group => ParseError::UnmatchedBracket {
                bracket: '(',
                span: bracket.span,
            },
            BracketKind::NewList | BracketKind::Index => ParseError::UnmatchedBracket {
                bracket: '[',
                span: bracket.span,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    // Tests the parser's output in s-expression form.
    macro_rules! parser_tests {
        ($($name:ident: $program:expr, $sexpr:expr)*) => {$(
            #[test]
            fn $name() {
                use crate::emit::Emit;
                use crate::{parse, scan};

                let tree = parse(scan($program).unwrap()).unwrap().unwrap();
                assert_eq!(tree.emit_s_expression(), $sexpr);
            }
        )*};
    }

    mod parse {
        parser_tests! {
            precedence:         "1+2*3",          "(+ 1 (* 2 3))"
            implicit_mult:      "2x",             "(* 2 x)"
            grouping:           "(1+2)*3",        "(* (+ 1 2) 3)"
            sub_left_assoc:     "1-2-3",          "(- (- 1 2) 3)"
            exp_right_assoc:    "2^3^2",          "(^ 2 (^ 3 2))"
            unary_vs_exp:       "-x^2",           "(-u (^ x 2))"
            unary_vs_mult:      "-2x",            "(-u (* 2 x))"
            unary_rhs:          "2^-3",           "(^ 2 (-u 3))"
            factorial:          "3!^2",           "(^ (fact 3) 2)"
            not_prefix:         "!a and b",       "(and (not a) b)"
            boolean_tower:      "a and b or c",   "(or (and a b) c)"
            comparison:         "x+1 <= 2",       "(<= (+ x 1) 2)"
            equality:           "a = b",          "(= a b)"

            call:               "f(x, y)",        "(f x y)"
            call_empty:         "f()",            "(f)"
            call_nested:        "f(g(1), 2)",     "(f (g 1) 2)"

            list:               "[1, 2, 3]",      "(list 1 2 3)"
            list_empty:         "[]",             "(list)"
            list_nested:        "[[1], [2]]",     "(list (list 1) (list 2))"
            dict:               r#"["a": 1, "b": 2]"#, "(dict (: \"a\" 1) (: \"b\" 2))"
            dict_expr_value:    r#"["a": 1+2]"#,  "(dict (: \"a\" (+ 1 2)))"

            index:              "[1,2,3][1]",     "(listval (list 1 2 3) 1)"
            index_chain:        "a[1][2]",        "(listval (listval a 1) 2)"
            slice:              "x[1..3]",        "(listval x (.. 1 3))"

            range:              "1..5",           "(.. 1 5)"
            range_step:         "1..5#2",         "(# (.. 1 5) 2)"

            capture_binding:    "?;x+0",          "(+ (; ? x) 0)"
            lazy_call:          "let(a, 1, a+2)", "(let a 1 (+ a 2))"
        }
    }

    mod parse_empty {
        #[test]
        fn empty_input_parses_to_none() {
            use crate::{parse, scan};
            assert!(parse(scan("").unwrap()).unwrap().is_none());
            assert!(parse(scan("  // comment").unwrap()).unwrap().is_none());
        }
    }

    mod parse_errors {
        macro_rules! parser_error_tests {
            ($($name:ident: $program:expr, $err:pat)*) => {$(
                #[test]
                fn $name() {
                    use crate::parser::ParseError::*;
                    use crate::{parse, scan};

                    match parse(scan($program).unwrap()) {
                        Err($err) => {}
                        other => panic!("expected error, got {:?}", other),
                    }
                }
            )*};
        }

        parser_error_tests! {
            unclosed_paren:     "(1",        UnmatchedBracket { bracket: '(', .. }
            stray_close_paren:  "1)",        UnmatchedBracket { bracket: ')', .. }
            unclosed_list:      "[1, 2",     UnmatchedBracket { bracket: '[', .. }
            stray_close_brack:  "1]",        UnmatchedBracket { bracket: ']', .. }
            mismatched:         "[1, 2)",    UnmatchedBracket { bracket: '[', .. }
            unclosed_call:      "f(1",       UnterminatedCall { .. }
            tuple_group:        "(1, 2)",    MissingOperator { .. }
            adjacent_values:    "'a' 1",     MissingOperator { .. }
            dangling_operator:  "1 +",       MissingOperand { .. }
            lonely_comma:       ", 1",       UnexpectedComma { .. }
            empty_arg:          "f(, 1)",    MissingOperand { .. }
            mixed_pairs:        r#"["a": 1, 2]"#, MixedKeyPairs { .. }
        }
    }
}
