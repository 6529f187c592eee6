//! Tokenizer for the expression language.

use crate::error::ExpressionError;

/// A lexed token with its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Token kind and payload.
    pub kind: TokenKind,
    /// Byte offset where the token starts.
    pub offset: usize,
}

/// Token kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// An identifier or keyword operand (`data`, `toNumber`, ...).
    Ident(String),
    /// A numeric literal.
    Number(f64),
    /// An integer literal (kept separate so `2 * 3` stays integral).
    Integer(i64),
    /// A string literal (single- or double-quoted).
    Str(String),
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `in`
    In,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    /// `!`
    Bang,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `.`
    Dot,
    /// `,`
    Comma,
}

/// Tokenize an expression source string.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ExpressionError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                i += 1;
            }
            '(' => push_simple(&mut tokens, TokenKind::LParen, start, &mut i),
            ')' => push_simple(&mut tokens, TokenKind::RParen, start, &mut i),
            '[' => push_simple(&mut tokens, TokenKind::LBracket, start, &mut i),
            ']' => push_simple(&mut tokens, TokenKind::RBracket, start, &mut i),
            '.' => push_simple(&mut tokens, TokenKind::Dot, start, &mut i),
            ',' => push_simple(&mut tokens, TokenKind::Comma, start, &mut i),
            '+' => push_simple(&mut tokens, TokenKind::Plus, start, &mut i),
            '-' => push_simple(&mut tokens, TokenKind::Minus, start, &mut i),
            '*' => push_simple(&mut tokens, TokenKind::Star, start, &mut i),
            '/' => push_simple(&mut tokens, TokenKind::Slash, start, &mut i),
            '%' => push_simple(&mut tokens, TokenKind::Percent, start, &mut i),
            '=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token { kind: TokenKind::EqEq, offset: start });
                    i += 2;
                } else {
                    return Err(ExpressionError::Lex {
                        offset: start,
                        message: "assignment is not supported; use ==".into(),
                    });
                }
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token { kind: TokenKind::NotEq, offset: start });
                    i += 2;
                } else {
                    tokens.push(Token { kind: TokenKind::Bang, offset: start });
                    i += 1;
                }
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token { kind: TokenKind::Le, offset: start });
                    i += 2;
                } else {
                    tokens.push(Token { kind: TokenKind::Lt, offset: start });
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token { kind: TokenKind::Ge, offset: start });
                    i += 2;
                } else {
                    tokens.push(Token { kind: TokenKind::Gt, offset: start });
                    i += 1;
                }
            }
            '&' => {
                if bytes.get(i + 1) == Some(&b'&') {
                    tokens.push(Token { kind: TokenKind::AndAnd, offset: start });
                    i += 2;
                } else {
                    return Err(ExpressionError::Lex {
                        offset: start,
                        message: "expected &&".into(),
                    });
                }
            }
            '|' => {
                if bytes.get(i + 1) == Some(&b'|') {
                    tokens.push(Token { kind: TokenKind::OrOr, offset: start });
                    i += 2;
                } else {
                    return Err(ExpressionError::Lex {
                        offset: start,
                        message: "expected ||".into(),
                    });
                }
            }
            '"' | '\'' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match bytes.get(i).map(|&b| b as char) {
                        None => {
                            return Err(ExpressionError::Lex {
                                offset: start,
                                message: "unterminated string literal".into(),
                            });
                        }
                        Some(ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            let escaped = bytes.get(i + 1).map(|&b| b as char).ok_or_else(|| {
                                ExpressionError::Lex {
                                    offset: i,
                                    message: "dangling escape".into(),
                                }
                            })?;
                            value.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                other => other,
                            });
                            i += 2;
                        }
                        Some(ch) => {
                            value.push(ch);
                            i += ch.len_utf8();
                        }
                    }
                }
                tokens.push(Token { kind: TokenKind::Str(value), offset: start });
            }
            '0'..='9' => {
                let mut end = i;
                let mut is_float = false;
                while end < bytes.len() {
                    let b = bytes[end] as char;
                    if b.is_ascii_digit() {
                        end += 1;
                    } else if b == '.'
                        && !is_float
                        && bytes.get(end + 1).is_some_and(|n| (*n as char).is_ascii_digit())
                    {
                        is_float = true;
                        end += 1;
                    } else {
                        break;
                    }
                }
                let text = &source[i..end];
                let kind = if is_float {
                    TokenKind::Number(text.parse().map_err(|_| ExpressionError::Lex {
                        offset: start,
                        message: format!("invalid number: {text}"),
                    })?)
                } else {
                    TokenKind::Integer(text.parse().map_err(|_| ExpressionError::Lex {
                        offset: start,
                        message: format!("invalid integer: {text}"),
                    })?)
                };
                tokens.push(Token { kind, offset: start });
                i = end;
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                let mut end = i;
                while end < bytes.len() {
                    let b = bytes[end] as char;
                    if b.is_ascii_alphanumeric() || b == '_' || b == '$' {
                        end += 1;
                    } else {
                        break;
                    }
                }
                let word = &source[i..end];
                let kind = match word {
                    "true" => TokenKind::True,
                    "false" => TokenKind::False,
                    "null" => TokenKind::Null,
                    "in" => TokenKind::In,
                    _ => TokenKind::Ident(word.to_string()),
                };
                tokens.push(Token { kind, offset: start });
                i = end;
            }
            other => {
                return Err(ExpressionError::Lex {
                    offset: start,
                    message: format!("unexpected character {other:?}"),
                });
            }
        }
    }

    Ok(tokens)
}

fn push_simple(tokens: &mut Vec<Token>, kind: TokenKind, offset: usize, i: &mut usize) {
    tokens.push(Token { kind, offset });
    *i += 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn arithmetic_tokens() {
        assert_eq!(
            kinds("data.v * 2"),
            vec![
                TokenKind::Ident("data".into()),
                TokenKind::Dot,
                TokenKind::Ident("v".into()),
                TokenKind::Star,
                TokenKind::Integer(2),
            ]
        );
    }

    #[test]
    fn comparison_and_boolean_tokens() {
        assert_eq!(
            kinds("a >= 1 && b != 'x' || !c"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Ge,
                TokenKind::Integer(1),
                TokenKind::AndAnd,
                TokenKind::Ident("b".into()),
                TokenKind::NotEq,
                TokenKind::Str("x".into()),
                TokenKind::OrOr,
                TokenKind::Bang,
                TokenKind::Ident("c".into()),
            ]
        );
    }

    #[test]
    fn keywords_and_floats() {
        assert_eq!(
            kinds("true in [1.5, null]"),
            vec![
                TokenKind::True,
                TokenKind::In,
                TokenKind::LBracket,
                TokenKind::Number(1.5),
                TokenKind::Comma,
                TokenKind::Null,
                TokenKind::RBracket,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(kinds(r#""a\"b""#), vec![TokenKind::Str("a\"b".into())]);
        assert_eq!(kinds(r"'a\nb'"), vec![TokenKind::Str("a\nb".into())]);
    }

    #[test]
    fn unterminated_string_fails() {
        assert!(matches!(
            tokenize("'abc"),
            Err(ExpressionError::Lex { .. })
        ));
    }

    #[test]
    fn single_equals_rejected() {
        let err = tokenize("a = 1").unwrap_err();
        assert!(err.to_string().contains("=="));
    }

    #[test]
    fn unexpected_character_rejected() {
        assert!(tokenize("a @ b").is_err());
    }
}
