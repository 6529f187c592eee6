//! Pratt parser for the expression language.

use serde_json::Value;

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::ExpressionError;
use crate::lexer::{tokenize, Token, TokenKind};

/// Parse an expression source string into an AST.
pub fn parse(source: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0, source_len: source.len() };
    let expr = parser.expression(0)?;
    if let Some(tok) = parser.peek() {
        return Err(ExpressionError::Parse {
            offset: tok.offset,
            message: format!("unexpected trailing token {:?}", tok.kind),
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    source_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), ExpressionError> {
        match self.advance() {
            Some(tok) if &tok.kind == kind => Ok(()),
            Some(tok) => Err(ExpressionError::Parse {
                offset: tok.offset,
                message: format!("expected {what}, got {:?}", tok.kind),
            }),
            None => Err(self.eof(what)),
        }
    }

    fn eof(&self, what: &str) -> ExpressionError {
        ExpressionError::Parse {
            offset: self.source_len,
            message: format!("expected {what}, got end of input"),
        }
    }

    /// Pratt expression parsing with the given minimum binding power.
    fn expression(&mut self, min_precedence: u8) -> Result<Expr, ExpressionError> {
        let mut left = self.unary()?;

        while let Some(op) = self.peek_binary_op() {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.advance();
            // Left-associative: the right side binds one tier tighter.
            let right = self.expression(precedence + 1)?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn peek_binary_op(&self) -> Option<BinaryOp> {
        Some(match self.peek()?.kind {
            TokenKind::OrOr => BinaryOp::Or,
            TokenKind::AndAnd => BinaryOp::And,
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::Ne,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Ge => BinaryOp::Ge,
            TokenKind::In => BinaryOp::In,
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Mod,
            _ => return None,
        })
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        match self.peek().map(|t| t.kind.clone()) {
            Some(TokenKind::Bang) => {
                self.advance();
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(self.unary()?),
                })
            }
            Some(TokenKind::Minus) => {
                self.advance();
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(self.unary()?),
                })
            }
            _ => self.postfix(),
        }
    }

    /// Primary expression followed by any chain of `.field`, `[index]`.
    fn postfix(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.primary()?;

        loop {
            match self.peek().map(|t| t.kind.clone()) {
                Some(TokenKind::Dot) => {
                    self.advance();
                    let property = match self.advance() {
                        Some(Token { kind: TokenKind::Ident(name), .. }) => name,
                        Some(tok) => {
                            return Err(ExpressionError::Parse {
                                offset: tok.offset,
                                message: format!("expected property name, got {:?}", tok.kind),
                            });
                        }
                        None => return Err(self.eof("property name")),
                    };
                    expr = Expr::Property {
                        object: Box::new(expr),
                        property,
                    };
                }
                Some(TokenKind::LBracket) => {
                    self.advance();
                    let index = self.expression(0)?;
                    self.expect(&TokenKind::RBracket, "]")?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        let tok = self.advance().ok_or_else(|| self.eof("expression"))?;
        match tok.kind {
            TokenKind::Integer(i) => Ok(Expr::Literal(Value::from(i))),
            TokenKind::Number(f) => Ok(Expr::Literal(
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            )),
            TokenKind::Str(s) => Ok(Expr::Literal(Value::String(s))),
            TokenKind::True => Ok(Expr::Literal(Value::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(Value::Bool(false))),
            TokenKind::Null => Ok(Expr::Literal(Value::Null)),
            TokenKind::Ident(name) => {
                // A following `(` makes this a helper call.
                if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::LParen)) {
                    self.advance();
                    let mut args = Vec::new();
                    if !matches!(self.peek().map(|t| &t.kind), Some(TokenKind::RParen)) {
                        loop {
                            args.push(self.expression(0)?);
                            match self.peek().map(|t| t.kind.clone()) {
                                Some(TokenKind::Comma) => {
                                    self.advance();
                                }
                                _ => break,
                            }
                        }
                    }
                    self.expect(&TokenKind::RParen, ")")?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Identifier(name))
                }
            }
            TokenKind::LParen => {
                let expr = self.expression(0)?;
                self.expect(&TokenKind::RParen, ")")?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                let mut elements = Vec::new();
                if !matches!(self.peek().map(|t| &t.kind), Some(TokenKind::RBracket)) {
                    loop {
                        elements.push(self.expression(0)?);
                        match self.peek().map(|t| t.kind.clone()) {
                            Some(TokenKind::Comma) => {
                                self.advance();
                            }
                            _ => break,
                        }
                    }
                }
                self.expect(&TokenKind::RBracket, "]")?;
                Ok(Expr::Array(elements))
            }
            other => Err(ExpressionError::Parse {
                offset: tok.offset,
                message: format!("unexpected token {other:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn precedence_mul_over_add() {
        let expr = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                left: Box::new(Expr::Literal(json!(1))),
                op: BinaryOp::Add,
                right: Box::new(Expr::Binary {
                    left: Box::new(Expr::Literal(json!(2))),
                    op: BinaryOp::Mul,
                    right: Box::new(Expr::Literal(json!(3))),
                }),
            }
        );
    }

    #[test]
    fn parens_override_precedence() {
        let expr = parse("(1 + 2) * 3").unwrap();
        assert!(matches!(
            expr,
            Expr::Binary { op: BinaryOp::Mul, .. }
        ));
    }

    #[test]
    fn property_chain() {
        let expr = parse("data.user.name").unwrap();
        assert_eq!(
            expr,
            Expr::Property {
                object: Box::new(Expr::Property {
                    object: Box::new(Expr::Identifier("data".into())),
                    property: "user".into(),
                }),
                property: "name".into(),
            }
        );
    }

    #[test]
    fn index_access() {
        let expr = parse("items[0]").unwrap();
        assert_eq!(
            expr,
            Expr::Index {
                object: Box::new(Expr::Identifier("items".into())),
                index: Box::new(Expr::Literal(json!(0))),
            }
        );
    }

    #[test]
    fn helper_call() {
        let expr = parse("contains(data.tags, 'urgent')").unwrap();
        match expr {
            Expr::Call { name, args } => {
                assert_eq!(name, "contains");
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected Call, got {other:?}"),
        }
    }

    #[test]
    fn boolean_precedence() {
        // a || b && c  parses as  a || (b && c)
        let expr = parse("a || b && c").unwrap();
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::Or, .. }));
    }

    #[test]
    fn in_operator() {
        let expr = parse("'x' in data.tags").unwrap();
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::In, .. }));
    }

    #[test]
    fn unary_chain() {
        let expr = parse("!!a").unwrap();
        assert!(matches!(expr, Expr::Unary { op: UnaryOp::Not, .. }));
        let expr = parse("-5").unwrap();
        assert!(matches!(expr, Expr::Unary { op: UnaryOp::Neg, .. }));
    }

    #[test]
    fn array_literal() {
        let expr = parse("[1, 'two', true]").unwrap();
        match expr {
            Expr::Array(items) => assert_eq!(items.len(), 3),
            other => panic!("expected Array, got {other:?}"),
        }
    }

    #[test]
    fn trailing_tokens_rejected() {
        assert!(matches!(parse("1 2"), Err(ExpressionError::Parse { .. })));
    }

    #[test]
    fn empty_input_rejected() {
        assert!(parse("").is_err());
        assert!(parse("   ").is_err());
    }

    #[test]
    fn dangling_operator_rejected() {
        assert!(parse("1 +").is_err());
        assert!(parse("&& a").is_err());
    }
}
