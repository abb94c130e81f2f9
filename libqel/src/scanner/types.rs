//! Definitions of types used in the libqel scanner.

use crate::common::Span;
use crate::math::Number;

use core::fmt;

/// The type of a [Token].
#[derive(PartialEq, Clone, Debug)]
pub enum TokenType {
    /// A scanned numeric literal, or a reserved constant folded into a number.
    Number(Number),

    /// A boolean literal.
    Bool(bool),

    /// A quoted string literal, with backslash escapes decoded.
    Str(String),

    /// An identifier, with any `ann:`-style namespacing annotations.
    Name {
        name: String,
        annotations: Vec<String>,
    },

    /// An operator, canonicalized: symbolic synonyms map to one name (`&&` to `and`), and
    /// prefix/postfix forms are already selected (`+u`, `-u`, `fact`, `not`).
    Op(String),

    /// ( symbol
    OpenParen,

    /// ) symbol
    CloseParen,

    /// [ symbol
    OpenBracket,

    /// ] symbol
    CloseBracket,

    /// , symbol
    Comma,

    /// A `key:` dictionary entry marker, folded from a string or name followed by a colon.
    KeyPair(String),
}

impl TokenType {
    /// True when this token signals that the next token begins an operand, which retags an
    /// ambiguous operator symbol into its prefix form.
    pub fn starts_operand(&self) -> bool {
        use TokenType::*;
        match self {
            OpenParen | OpenBracket | Comma | KeyPair(_) => true,
            Op(name) => !crate::grammar::is_postfix_op(name),
            _ => false,
        }
    }

    /// True when this token can end an operand, which makes a following `!` a postfix
    /// factorial and participates in implicit multiplication.
    pub fn ends_operand(&self) -> bool {
        use TokenType::*;
        matches!(
            self,
            Number(_) | Bool(_) | Str(_) | Name { .. } | CloseParen | CloseBracket
        )
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenType::*;
        match self {
            Number(n) => write!(f, "{}", n),
            Bool(b) => write!(f, "{}", b),
            Str(s) => write!(f, "{:?}", s),
            Name { name, annotations } => {
                for ann in annotations {
                    write!(f, "{}:", ann)?;
                }
                write!(f, "{}", name)
            }
            Op(name) => write!(f, "{}", name),
            OpenParen => write!(f, "("),
            CloseParen => write!(f, ")"),
            OpenBracket => write!(f, "["),
            CloseBracket => write!(f, "]"),
            Comma => write!(f, ","),
            KeyPair(key) => write!(f, "{:?}:", key),
        }
    }
}

/// Describes a token in a QEL program.
#[derive(PartialEq, Clone, Debug)]
pub struct Token {
    /// The type of the token.
    pub ty: TokenType,
    /// The source span of the token.
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    pub fn new<S: Into<Span>>(ty: TokenType, span: S) -> Self {
        Self {
            ty,
            span: span.into(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ty)
    }
}

#[cfg(test)]
mod tests {
    mod format {
        use crate::scanner::types::*;

        macro_rules! format_tests {
            ($($name:ident: $ty:expr, $format_str:expr)*) => {$(
                #[test]
                fn $name() {
                    use TokenType::*;
                    let tok = Token::new($ty, (0, 0));
                    assert_eq!(tok.to_string(), $format_str);
                }
            )*};
        }

        format_tests! {
            number:         Number(1.3.into()), "1.3"
            integral:       Number(2f64.into()), "2"
            imaginary:      Number(crate::math::Number::i()), "i"
            boolean:        Bool(true), "true"
            string:         Str("ab".into()), "\"ab\""
            name:           Name { name: "ab".into(), annotations: vec![] }, "ab"
            annotated_name: Name { name: "x".into(), annotations: vec!["vec".into()] }, "vec:x"
            op:             Op("+".into()), "+"
            prefix_minus:   Op("-u".into()), "-u"
            open_paren:     OpenParen, "("
            close_paren:    CloseParen, ")"
            open_bracket:   OpenBracket, "["
            close_bracket:  CloseBracket, "]"
            comma:          Comma, ","
            key_pair:       KeyPair("k".into()), "\"k\":"
        }
    }
}
