//! The QEL tokenizer.
//!
//! Scanning resolves the local ambiguities of the surface syntax using the previously emitted
//! token: implicit multiplication is inserted between adjacent values, ambiguous operator
//! symbols are retagged into their prefix or postfix forms, and reserved constant names fold
//! directly into number tokens.

pub mod types;

mod errors;
pub use errors::ScanError;

use crate::math::Number;
use crate::utils::PeekIter;
use types::*;

/// Scans a QEL program into a token sequence.
pub fn scan<T: Into<String>>(input: T) -> Result<Vec<Token>, ScanError> {
    let mut scanner = Scanner::new(input);
    scanner.scan()?;
    Ok(scanner.output)
}

struct Scanner {
    source: String,
    input: PeekIter<char>,
    pos: usize,
    output: Vec<Token>,
}

impl Scanner {
    fn new<T: Into<String>>(input: T) -> Scanner {
        let source = input.into();
        let chars: Vec<char> = source.chars().collect();

        Scanner {
            source,
            input: PeekIter::new(chars.into_iter()),
            pos: 0,
            output: Vec::new(),
        }
    }

    fn scan(&mut self) -> Result<(), ScanError> {
        while let Some(c) = self.input.peek().copied() {
            match c {
                _ if c.is_whitespace() => {
                    self.bump();
                }
                '/' if self.input.peek_at(1) == Some(&'/') => self.skip_comment(),
                _ if c.is_ascii_digit() => self.scan_num(),
                '\'' | '"' => self.scan_str(c)?,
                '?' => self.scan_wildcard(),
                _ if c.is_alphabetic() || c == '_' => self.scan_name(),
                _ => self.scan_symbol()?,
            }
        }
        Ok(())
    }

    /// Consumes and returns the next character.
    fn bump(&mut self) -> Option<char> {
        let c = self.input.next();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    /// Consumes characters matching `predicate`, returning them as a string.
    fn take_while<P: Fn(&char) -> bool>(&mut self, predicate: P) -> String {
        let s: String = self.input.collect_while(predicate);
        self.pos += s.chars().count();
        s
    }

    fn skip_comment(&mut self) {
        self.take_while(|&c| c != '\n');
    }

    /// Emits a token, inserting an implicit multiplication if the previous token ends a value
    /// and this one starts a new one. A name directly followed by `(` is exempt: that is a
    /// function call.
    fn emit(&mut self, ty: TokenType, lo: usize) {
        use TokenType::*;
        let implicit_mult = match self.output.last().map(|t| &t.ty) {
            Some(prev) if matches!(prev, Number(_) | Name { .. } | CloseParen) => match &ty {
                Number(_) | Name { .. } => true,
                OpenParen => !matches!(prev, Name { .. }),
                _ => false,
            },
            _ => false,
        };
        if implicit_mult {
            self.output
                .push(Token::new(TokenType::Op("*".into()), (lo, lo)));
        }
        self.output.push(Token::new(ty, (lo, self.pos)));
    }

    fn scan_num(&mut self) {
        let lo = self.pos;
        let mut float_str: String = self.take_while(|c| c.is_ascii_digit());
        if self.input.peek() == Some(&'.') && self.input.peek_at(1).map_or(false, char::is_ascii_digit)
        {
            float_str.push('.');
            self.bump();
            float_str.push_str(&self.take_while(|c| c.is_ascii_digit()));
        }
        let num: f64 = float_str.parse().unwrap();
        self.emit(TokenType::Number(num.into()), lo);
    }

    fn scan_wildcard(&mut self) {
        let lo = self.pos;
        self.bump();
        let name = if self.input.peek() == Some(&'?') {
            self.bump();
            "??"
        } else {
            "?"
        };
        self.emit(
            TokenType::Name {
                name: name.into(),
                annotations: Vec::new(),
            },
            lo,
        );
    }

    fn scan_word(&mut self) -> String {
        self.take_while(|&c| c.is_alphanumeric() || c == '_' || c == '\'')
    }

    fn scan_name(&mut self) {
        let lo = self.pos;
        let mut annotations = Vec::new();
        let mut word = self.scan_word();
        // `ann:name` namespacing annotations; the colon only belongs to the name when an
        // identifier character follows it, so `[total: 1]` still scans as a key-pair.
        while self.input.peek() == Some(&':')
            && self.input.peek_at(1).map_or(false, |c| c.is_alphabetic())
        {
            self.bump();
            annotations.push(word);
            word = self.scan_word();
        }

        if !annotations.is_empty() {
            return self.emit(TokenType::Name { name: word, annotations }, lo);
        }

        let ty = match word.to_lowercase().as_str() {
            "true" => TokenType::Bool(true),
            "false" => TokenType::Bool(false),
            "and" | "or" | "xor" | "implies" | "isa" | "except" | "in" | "divides" => {
                TokenType::Op(word.to_lowercase())
            }
            "not" => TokenType::Op("not".into()),
            // Reserved constants fold straight into number tokens.
            "e" => TokenType::Number(std::f64::consts::E.into()),
            "pi" | "π" => TokenType::Number(std::f64::consts::PI.into()),
            "i" => TokenType::Number(Number::i()),
            "infinity" => TokenType::Number(f64::INFINITY.into()),
            _ => TokenType::Name {
                name: word,
                annotations,
            },
        };
        self.emit(ty, lo);
    }

    fn scan_str(&mut self, quote: char) -> Result<(), ScanError> {
        let lo = self.pos;
        self.bump();
        let triple = self.input.peek() == Some(&quote) && self.input.peek_at(1) == Some(&quote);
        if triple {
            self.bump();
            self.bump();
        }

        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(ScanError::UnterminatedString { span: (lo, self.pos).into() }),
                Some('\\') => match self.bump() {
                    None => {
                        return Err(ScanError::UnterminatedString { span: (lo, self.pos).into() })
                    }
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    // Escaped braces stay escaped so string interpolation can tell them apart
                    // from a `{...}` sub-expression.
                    Some(c @ ('{' | '}')) => {
                        value.push('\\');
                        value.push(c);
                    }
                    Some(c) => value.push(c),
                },
                Some(c) if c == quote => {
                    if !triple {
                        break;
                    }
                    if self.input.peek() == Some(&quote) && self.input.peek_at(1) == Some(&quote) {
                        self.bump();
                        self.bump();
                        break;
                    }
                    value.push(c);
                }
                Some(c) => value.push(c),
            }
        }
        self.emit(TokenType::Str(value), lo);
        Ok(())
    }

    fn scan_symbol(&mut self) -> Result<(), ScanError> {
        use TokenType::*;
        let lo = self.pos;
        let prev = self.output.last().map(|t| t.ty.clone());
        let operand_starts = prev.as_ref().map_or(true, TokenType::starts_operand);
        let operand_ended = prev.as_ref().map_or(false, TokenType::ends_operand);

        let c = match self.bump() {
            Some(c) => c,
            None => return Ok(()),
        };
        let ty = match c {
            '+' => Op(if operand_starts { "+u" } else { "+" }.into()),
            '-' => Op(if operand_starts { "-u" } else { "-" }.into()),
            '*' | '×' => Op("*".into()),
            '/' | '÷' => Op("/".into()),
            '^' => Op("^".into()),
            '#' => Op("#".into()),
            ';' => Op(";".into()),
            '=' => Op("=".into()),
            '(' => OpenParen,
            ')' => CloseParen,
            '[' => OpenBracket,
            ']' => CloseBracket,
            ',' => Comma,
            '!' if self.input.peek() == Some(&'=') => {
                self.bump();
                Op("<>".into())
            }
            '!' => Op(if operand_ended { "fact" } else { "not" }.into()),
            '<' => match self.input.peek() {
                Some('=') => {
                    self.bump();
                    Op("<=".into())
                }
                Some('>') => {
                    self.bump();
                    Op("<>".into())
                }
                _ => Op("<".into()),
            },
            '>' if self.input.peek() == Some(&'=') => {
                self.bump();
                Op(">=".into())
            }
            '>' => Op(">".into()),
            '&' => {
                if self.input.peek() == Some(&'&') {
                    self.bump();
                }
                Op("and".into())
            }
            '|' => {
                if self.input.peek() == Some(&'|') {
                    self.bump();
                }
                Op("or".into())
            }
            '.' if self.input.peek() == Some(&'.') => {
                self.bump();
                Op("..".into())
            }
            ':' => {
                // A key-pair colon must follow a string or a plain name.
                let key = match self.output.pop() {
                    Some(Token { ty: Str(s), span }) => return Ok(self.fold_key_pair(s, span.lo)),
                    Some(Token {
                        ty: Name { name, annotations },
                        span,
                    }) if annotations.is_empty() => {
                        return Ok(self.fold_key_pair(name, span.lo))
                    }
                    prev => prev,
                };
                return Err(ScanError::MalformedKeyPair {
                    found: key.map(|t| t.to_string()),
                    span: (lo, self.pos).into(),
                });
            }
            _ => {
                return Err(ScanError::UnrecognizedSequence {
                    remainder: self.source.chars().skip(lo).collect(),
                    source: self.source.clone(),
                    span: (lo, self.source.chars().count()).into(),
                });
            }
        };
        self.emit(ty, lo);
        Ok(())
    }

    fn fold_key_pair(&mut self, key: String, lo: usize) {
        self.output
            .push(Token::new(TokenType::KeyPair(key), (lo, self.pos)));
    }
}
