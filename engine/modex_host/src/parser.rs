//! Recursive descent parser producing a flattened expression tree.
//!
//! Precedence, loosest first:
//!
//! 1. `$x := e` (right associative)
//! 2. `c ? a : b`
//! 3. `or`
//! 4. `and`
//! 5. `= != < <= > >=`
//! 6. `&`
//! 7. `+ -`
//! 8. `* / %`
//! 9. unary `-`
//! 10. postfix `.name`, `(args)`, `[index]`

use crate::ast::{BinaryOp, Expr, ExprArena, ExprId, ExprKind, Span};
use crate::errors::ParseError;
use crate::lexer::{lex, Token, TokenKind};

/// Result of parsing one source text.
#[derive(Debug)]
pub struct Parsed {
    pub arena: ExprArena,
    pub root: ExprId,
}

/// Parse `source` into an expression tree.
///
/// A top-level `a; b` sequence is accepted and becomes an implicit block.
pub fn parse(source: &str) -> Result<Parsed, ParseError> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        tokens: &tokens,
        arena: ExprArena::new(),
        pos: 0,
        end: Span::new(source.len(), source.len()),
    };
    let root = parser.sequence()?;
    if let Some(token) = parser.current() {
        return Err(ParseError::new(
            format!("unexpected {}", token.kind.describe()),
            token.span,
        ));
    }
    Ok(Parsed {
        arena: parser.arena,
        root,
    })
}

struct Parser<'t> {
    tokens: &'t [Token],
    arena: ExprArena,
    pos: usize,
    /// Zero-width span at the end of the input.
    end: Span,
}

impl<'t> Parser<'t> {
    // ===== Token access =====

    fn current(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn current_kind(&self) -> Option<&'t TokenKind> {
        self.current().map(|token| &token.kind)
    }

    fn current_span(&self) -> Span {
        self.current().map_or(self.end, |token| token.span)
    }

    fn previous_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|idx| self.tokens.get(idx))
            .map_or(self.end, |token| token.span)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current_kind().is_some_and(|current| current == kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: &TokenKind, what: &str) -> Result<Span, ParseError> {
        if self.check(kind) {
            self.pos += 1;
            Ok(self.previous_span())
        } else {
            Err(self.error(&format!("expected {what}")))
        }
    }

    fn error(&self, expected: &str) -> ParseError {
        let found = self
            .current()
            .map_or_else(|| "end of input".to_owned(), |token| token.kind.describe());
        ParseError::new(format!("{expected}, found {found}"), self.current_span())
    }

    fn alloc(&mut self, kind: ExprKind, span: Span) -> ExprId {
        self.arena.alloc(Expr::new(kind, span))
    }

    fn span_of(&self, id: ExprId) -> Span {
        self.arena.get(id).span
    }

    // ===== Expressions =====

    fn sequence(&mut self) -> Result<ExprId, ParseError> {
        let first = self.expression()?;
        if !self.check(&TokenKind::Semicolon) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&TokenKind::Semicolon) {
            if self.current().is_none() {
                break;
            }
            items.push(self.expression()?);
        }
        let span = self.span_of(first).merge(self.previous_span());
        Ok(self.alloc(ExprKind::Block(items), span))
    }

    fn expression(&mut self) -> Result<ExprId, ParseError> {
        self.bind()
    }

    fn bind(&mut self) -> Result<ExprId, ParseError> {
        if let (Some(TokenKind::Variable(name)), Some(TokenKind::Assign)) = (
            self.current_kind(),
            self.tokens.get(self.pos + 1).map(|token| &token.kind),
        ) {
            let name = name.clone();
            let start = self.current_span();
            self.pos += 2;
            let value = self.bind()?;
            let span = start.merge(self.span_of(value));
            return Ok(self.alloc(ExprKind::Bind { name, value }, span));
        }
        self.condition()
    }

    fn condition(&mut self) -> Result<ExprId, ParseError> {
        let test = self.binary(0)?;
        if !self.eat(&TokenKind::Question) {
            return Ok(test);
        }
        let then = self.expression()?;
        let otherwise = if self.eat(&TokenKind::Colon) {
            Some(self.expression()?)
        } else {
            None
        };
        let end = self.span_of(otherwise.unwrap_or(then));
        let span = self.span_of(test).merge(end);
        Ok(self.alloc(
            ExprKind::Condition {
                test,
                then,
                otherwise,
            },
            span,
        ))
    }

    /// Binary operators by precedence climbing, loosest level first.
    fn binary(&mut self, level: usize) -> Result<ExprId, ParseError> {
        if level == BINARY_LEVELS {
            return self.unary();
        }
        let mut left = self.binary(level + 1)?;
        while let Some(op) = self.current_kind().and_then(|kind| binary_op(level, kind)) {
            self.pos += 1;
            let right = self.binary(level + 1)?;
            let span = self.span_of(left).merge(self.span_of(right));
            left = self.alloc(ExprKind::Binary { op, left, right }, span);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<ExprId, ParseError> {
        if self.check(&TokenKind::Minus) {
            let start = self.current_span();
            self.pos += 1;
            let operand = self.unary()?;
            let span = start.merge(self.span_of(operand));
            return Ok(self.alloc(ExprKind::Negate(operand), span));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<ExprId, ParseError> {
        let mut expr = self.primary()?;
        loop {
            match self.current_kind() {
                Some(TokenKind::Dot) => {
                    self.pos += 1;
                    let field = match self.current_kind() {
                        Some(TokenKind::Name(name) | TokenKind::String(name)) => name.clone(),
                        _ => return Err(self.error("expected field name after `.`")),
                    };
                    self.pos += 1;
                    let span = self.span_of(expr).merge(self.previous_span());
                    expr = self.alloc(
                        ExprKind::Path {
                            target: expr,
                            field,
                        },
                        span,
                    );
                }
                Some(TokenKind::LParen) => {
                    self.pos += 1;
                    let args = self.list(&TokenKind::RParen, Self::expression)?;
                    let span = self.span_of(expr).merge(self.previous_span());
                    expr = self.alloc(ExprKind::Call { callee: expr, args }, span);
                }
                Some(TokenKind::LBracket) => {
                    self.pos += 1;
                    let index = self.expression()?;
                    self.consume(&TokenKind::RBracket, "`]`")?;
                    let span = self.span_of(expr).merge(self.previous_span());
                    expr = self.alloc(
                        ExprKind::Index {
                            target: expr,
                            index,
                        },
                        span,
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> Result<ExprId, ParseError> {
        let Some(token) = self.current() else {
            return Err(self.error("expected an expression"));
        };
        let span = token.span;
        let kind = match &token.kind {
            TokenKind::Number(n) => ExprKind::Number(*n),
            TokenKind::String(s) => ExprKind::String(s.clone()),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Null => ExprKind::Null,
            TokenKind::Variable(name) => ExprKind::Variable(name.clone()),
            TokenKind::ContextVariable => ExprKind::Context,
            TokenKind::RootVariable => ExprKind::Root,
            TokenKind::Name(name) => ExprKind::Field(name.clone()),
            TokenKind::LParen => return self.block(),
            TokenKind::LBracket => return self.array(),
            TokenKind::LBrace => return self.object(),
            TokenKind::Function => return self.lambda(),
            _ => return Err(self.error("expected an expression")),
        };
        self.pos += 1;
        Ok(self.alloc(kind, span))
    }

    fn block(&mut self) -> Result<ExprId, ParseError> {
        let start = self.consume(&TokenKind::LParen, "`(`")?;
        let mut items = Vec::new();
        while !self.check(&TokenKind::RParen) {
            items.push(self.expression()?);
            if !self.eat(&TokenKind::Semicolon) {
                break;
            }
        }
        let end = self.consume(&TokenKind::RParen, "`)`")?;
        Ok(self.alloc(ExprKind::Block(items), start.merge(end)))
    }

    fn array(&mut self) -> Result<ExprId, ParseError> {
        let start = self.consume(&TokenKind::LBracket, "`[`")?;
        let items = self.list(&TokenKind::RBracket, Self::expression)?;
        let span = start.merge(self.previous_span());
        Ok(self.alloc(ExprKind::Array(items), span))
    }

    fn object(&mut self) -> Result<ExprId, ParseError> {
        let start = self.consume(&TokenKind::LBrace, "`{`")?;
        let entries = self.list(&TokenKind::RBrace, |p| {
            let key = match p.current_kind() {
                Some(TokenKind::String(key) | TokenKind::Name(key)) => key.clone(),
                _ => return Err(p.error("expected object key")),
            };
            p.pos += 1;
            p.consume(&TokenKind::Colon, "`:`")?;
            Ok((key, p.expression()?))
        })?;
        let span = start.merge(self.previous_span());
        Ok(self.alloc(ExprKind::Object(entries), span))
    }

    fn lambda(&mut self) -> Result<ExprId, ParseError> {
        let start = self.consume(&TokenKind::Function, "`function`")?;
        self.consume(&TokenKind::LParen, "`(`")?;
        let params = self.list(&TokenKind::RParen, |p| match p.current_kind() {
            Some(TokenKind::Variable(name)) => {
                let name = name.clone();
                p.pos += 1;
                Ok(name)
            }
            _ => Err(p.error("expected parameter")),
        })?;
        self.consume(&TokenKind::LBrace, "`{`")?;
        let body = self.sequence()?;
        let end = self.consume(&TokenKind::RBrace, "`}`")?;
        Ok(self.alloc(ExprKind::Lambda { params, body }, start.merge(end)))
    }

    /// Comma separated items up to and including `close`.
    fn list<T>(
        &mut self,
        close: &TokenKind,
        mut item: impl FnMut(&mut Self) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        let mut items = Vec::new();
        while !self.check(close) {
            items.push(item(self)?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.consume(close, &close.describe())?;
        Ok(items)
    }
}

const BINARY_LEVELS: usize = 6;

/// Operator for `kind` at precedence `level`, if it sits there.
fn binary_op(level: usize, kind: &TokenKind) -> Option<BinaryOp> {
    let op = match (level, kind) {
        (0, TokenKind::Or) => BinaryOp::Or,
        (1, TokenKind::And) => BinaryOp::And,
        (2, TokenKind::Eq) => BinaryOp::Eq,
        (2, TokenKind::NotEq) => BinaryOp::NotEq,
        (2, TokenKind::Lt) => BinaryOp::Lt,
        (2, TokenKind::LtEq) => BinaryOp::LtEq,
        (2, TokenKind::Gt) => BinaryOp::Gt,
        (2, TokenKind::GtEq) => BinaryOp::GtEq,
        (3, TokenKind::Ampersand) => BinaryOp::Concat,
        (4, TokenKind::Plus) => BinaryOp::Add,
        (4, TokenKind::Minus) => BinaryOp::Sub,
        (5, TokenKind::Star) => BinaryOp::Mul,
        (5, TokenKind::Slash) => BinaryOp::Div,
        (5, TokenKind::Percent) => BinaryOp::Rem,
        _ => return None,
    };
    Some(op)
}

#[cfg(test)]
mod tests;
