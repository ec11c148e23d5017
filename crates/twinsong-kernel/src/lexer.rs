//! Tokenizer for the embedded language.
//!
//! Hand-rolled scanner over the source text. Newlines are significant
//! (they terminate statements); blank lines and `#` comments are skipped.

use crate::exec::ExecError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),

    // Keywords
    None,
    True,
    False,
    And,
    Or,
    Not,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Pass,

    // Punctuation and operators
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semicolon,
    Dot,
    Assign,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    Newline,
    Eof,
}

/// A token plus the 1-based source line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub line: u32,
}

pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, ExecError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line: u32 = 1;

    macro_rules! push {
        ($token:expr) => {
            tokens.push(SpannedToken { token: $token, line })
        };
    }

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' => {
                chars.next();
            }
            '#' => {
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '\n' => {
                chars.next();
                // Collapse consecutive blank lines into one separator.
                if !matches!(
                    tokens.last(),
                    None | Some(SpannedToken {
                        token: Token::Newline,
                        ..
                    })
                ) {
                    push!(Token::Newline);
                }
                line += 1;
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some('r') => text.push('\r'),
                            Some('\\') => text.push('\\'),
                            Some('\'') => text.push('\''),
                            Some('"') => text.push('"'),
                            Some(other) => {
                                // Unknown escapes keep the backslash, as Python does.
                                text.push('\\');
                                text.push(other);
                            }
                            None => {
                                return Err(ExecError::syntax(line, "unterminated string literal"));
                            }
                        },
                        Some(c) if c == quote => break,
                        Some('\n') | None => {
                            return Err(ExecError::syntax(line, "unterminated string literal"));
                        }
                        Some(c) => text.push(c),
                    }
                }
                push!(Token::Str(text));
            }
            '0'..='9' => {
                let mut text = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() {
                        text.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if chars.peek() == Some(&'.') {
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    // `1.method()` is not float syntax; only consume the dot
                    // when a digit follows.
                    if lookahead.peek().is_some_and(|c| c.is_ascii_digit()) {
                        text.push('.');
                        chars.next();
                        while let Some(&c) = chars.peek() {
                            if c.is_ascii_digit() {
                                text.push(c);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        let value: f64 = text
                            .parse()
                            .map_err(|_| ExecError::syntax(line, "invalid float literal"))?;
                        push!(Token::Float(value));
                        continue;
                    }
                }
                let value: i64 = text
                    .parse()
                    .map_err(|_| ExecError::syntax(line, "integer literal too large"))?;
                push!(Token::Int(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let token = match name.as_str() {
                    "None" => Token::None,
                    "True" => Token::True,
                    "False" => Token::False,
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "if" => Token::If,
                    "elif" => Token::Elif,
                    "else" => Token::Else,
                    "while" => Token::While,
                    "for" => Token::For,
                    "in" => Token::In,
                    "pass" => Token::Pass,
                    _ => Token::Name(name),
                };
                push!(token);
            }
            _ => {
                chars.next();
                let token = match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => {
                        if chars.peek() == Some(&'/') {
                            chars.next();
                            Token::DoubleSlash
                        } else {
                            Token::Slash
                        }
                    }
                    '%' => Token::Percent,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    ',' => Token::Comma,
                    ':' => Token::Colon,
                    ';' => Token::Semicolon,
                    '.' => Token::Dot,
                    '=' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            Token::Eq
                        } else {
                            Token::Assign
                        }
                    }
                    '!' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            Token::NotEq
                        } else {
                            return Err(ExecError::syntax(line, "invalid syntax: '!'"));
                        }
                    }
                    '<' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            Token::LtEq
                        } else {
                            Token::Lt
                        }
                    }
                    '>' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            Token::GtEq
                        } else {
                            Token::Gt
                        }
                    }
                    other => {
                        return Err(ExecError::syntax(
                            line,
                            format!("invalid character {:?}", other),
                        ));
                    }
                };
                push!(token);
            }
        }
    }

    push!(Token::Eof);
    Ok(tokens)
}
