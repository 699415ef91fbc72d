// Statement Language Recursive Descent Parser

use crate::assembler::ast::*;
use crate::assembler::lexer::{Token, TokenKind};
use crate::error::ScummError;
use crate::instruction::BinOp;
use crate::var::VarKind;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, current: 0 }
    }

    pub fn parse(&mut self) -> Result<Program, ScummError> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            // Skip blank lines
            if self.check(&TokenKind::Newline) {
                self.advance();
                continue;
            }

            statements.push(self.parse_statement()?);

            if !self.is_at_end() {
                self.consume(TokenKind::Newline, "end of line")?;
            }
        }

        Ok(Program { statements })
    }

    /// A single operand expression spanning the whole input, as used inside
    /// string markup.
    pub fn parse_operand(&mut self) -> Result<Expr, ScummError> {
        let expr = self.parse_unary()?;
        if !self.is_at_end() {
            let token = self.peek();
            return Err(ScummError::ExpectedToken(
                "end of operand".to_string(),
                token.kind.describe(),
                token.position,
            ));
        }
        Ok(expr)
    }

    fn parse_statement(&mut self) -> Result<Statement, ScummError> {
        let token = self.peek().clone();
        let next = self.peek_next().map(|t| t.kind.clone());

        let kind = match &token.kind {
            TokenKind::Identifier(name) if next == Some(TokenKind::Colon) => {
                let label = name.clone();
                self.advance();
                self.advance();
                StatementKind::Label(label)
            }
            TokenKind::Goto => {
                self.advance();
                StatementKind::Goto(self.parse_target()?)
            }
            TokenKind::Unless => {
                self.advance();
                self.consume(TokenKind::LeftParen, "'(' after 'unless'")?;
                let condition = self.parse_condition()?;
                self.consume(TokenKind::RightParen, "')' after condition")?;
                self.consume(TokenKind::Goto, "'goto'")?;
                StatementKind::Unless {
                    condition,
                    target: self.parse_target()?,
                }
            }
            TokenKind::Identifier(_) if next == Some(TokenKind::LeftParen) => {
                StatementKind::Call(self.parse_call_chain()?)
            }
            _ => self.parse_assignment()?,
        };

        Ok(Statement {
            kind,
            position: token.position,
            line: token.line,
        })
    }

    fn parse_assignment(&mut self) -> Result<StatementKind, ScummError> {
        let target = self.parse_primary()?;
        let token = self.peek().clone();

        let symbol = match token.kind {
            TokenKind::Equal => "=",
            TokenKind::PlusEqual => "+=",
            TokenKind::MinusEqual => "-=",
            TokenKind::StarEqual => "*=",
            TokenKind::SlashEqual => "/=",
            TokenKind::AndEqual => "&=",
            TokenKind::OrEqual => "|=",
            TokenKind::PlusPlus => {
                self.advance();
                return Ok(StatementKind::Step {
                    target,
                    symbol: "++",
                });
            }
            TokenKind::MinusMinus => {
                self.advance();
                return Ok(StatementKind::Step {
                    target,
                    symbol: "--",
                });
            }
            other => {
                return Err(ScummError::ExpectedToken(
                    "assignment operator".to_string(),
                    other.describe(),
                    token.position,
                ))
            }
        };
        self.advance();

        let value = self.parse_expression()?;
        Ok(StatementKind::Assign {
            target,
            symbol,
            value,
        })
    }

    fn parse_condition(&mut self) -> Result<Condition, ScummError> {
        if self.match_token(&[TokenKind::Not]) {
            return Ok(Condition::Zero(self.parse_unary()?));
        }

        let left = self.parse_expression()?;
        let symbol = match self.peek().kind {
            TokenKind::EqualEqual => "==",
            TokenKind::NotEqual => "!=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            _ => return Ok(Condition::Truth(left)),
        };
        self.advance();
        let right = self.parse_expression()?;
        Ok(Condition::Compare(left, symbol, right))
    }

    fn parse_target(&mut self) -> Result<Target, ScummError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Target::Label(name))
            }
            TokenKind::IntegerLiteral(offset) if offset >= 0 => {
                self.advance();
                Ok(Target::Offset(offset as usize))
            }
            other => Err(ScummError::ExpectedToken(
                "label".to_string(),
                other.describe(),
                token.position,
            )),
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, ScummError> {
        let mut expr = self.parse_term()?;

        while self.match_token(&[TokenKind::Plus, TokenKind::Minus]) {
            let operator = match self.previous().kind {
                TokenKind::Plus => BinOp::Add,
                _ => BinOp::Sub,
            };
            let right = self.parse_term()?;
            expr = Expr::Binary(Box::new(expr), operator, Box::new(right));
        }

        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expr, ScummError> {
        let mut expr = self.parse_unary()?;

        while self.match_token(&[TokenKind::Star, TokenKind::Slash]) {
            let operator = match self.previous().kind {
                TokenKind::Star => BinOp::Mul,
                _ => BinOp::Div,
            };
            let right = self.parse_unary()?;
            expr = Expr::Binary(Box::new(expr), operator, Box::new(right));
        }

        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, ScummError> {
        if self.check(&TokenKind::Minus) {
            let position = self.peek().position;
            self.advance();
            let token = self.peek().clone();
            return match token.kind {
                TokenKind::IntegerLiteral(value) => {
                    self.advance();
                    Ok(Expr::Integer(-value, position))
                }
                other => Err(ScummError::ExpectedToken(
                    "number after '-'".to_string(),
                    other.describe(),
                    token.position,
                )),
            };
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ScummError> {
        let token = self.peek().clone();

        match token.kind {
            TokenKind::IntegerLiteral(value) => {
                self.advance();
                Ok(Expr::Integer(value, token.position))
            }
            TokenKind::StringLiteral(value) => {
                self.advance();
                // markup positions start after the opening quote
                Ok(Expr::String(value, token.position + 1))
            }
            TokenKind::Var | TokenKind::Local | TokenKind::Bit => {
                Ok(Expr::Var(self.parse_var()?))
            }
            TokenKind::Identifier(name) => {
                if matches!(self.peek_next().map(|t| &t.kind), Some(TokenKind::LeftParen)) {
                    Ok(Expr::Call(self.parse_call_chain()?))
                } else {
                    self.advance();
                    Ok(Expr::Identifier(name, token.position))
                }
            }
            TokenKind::LeftBracket => {
                self.advance();
                let elements = self.parse_arguments(TokenKind::RightBracket)?;
                self.consume(TokenKind::RightBracket, "']' after list")?;
                Ok(Expr::List(elements, token.position))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.consume(TokenKind::RightParen, "')' after expression")?;
                Ok(Expr::Paren(Box::new(expr), token.position))
            }
            other => Err(ScummError::ExpectedToken(
                "expression".to_string(),
                other.describe(),
                token.position,
            )),
        }
    }

    fn parse_var(&mut self) -> Result<VarRef, ScummError> {
        let token = self.advance().clone();
        let kind = match token.kind {
            TokenKind::Var => VarKind::Global,
            TokenKind::Local => VarKind::Local,
            TokenKind::Bit => VarKind::Bit,
            other => {
                return Err(ScummError::ExpectedToken(
                    "variable".to_string(),
                    other.describe(),
                    token.position,
                ))
            }
        };

        self.consume(TokenKind::LeftBracket, "'[' after variable kind")?;
        let index = self.consume_integer()?;

        let offset = if self.match_token(&[TokenKind::Plus]) {
            if matches!(
                self.peek().kind,
                TokenKind::Var | TokenKind::Local | TokenKind::Bit
            ) {
                Some(Box::new(VarIndex::Var(self.parse_var()?)))
            } else {
                Some(Box::new(VarIndex::Literal(self.consume_integer()?)))
            }
        } else {
            None
        };
        self.consume(TokenKind::RightBracket, "']' after variable index")?;

        Ok(VarRef {
            kind,
            index,
            offset,
            position: token.position,
        })
    }

    fn parse_call_chain(&mut self) -> Result<CallChain, ScummError> {
        let head = self.parse_call()?;
        let mut setters = Vec::new();

        while self.match_token(&[TokenKind::Dot]) {
            setters.push(self.parse_call()?);
        }

        Ok(CallChain { head, setters })
    }

    fn parse_call(&mut self) -> Result<Call, ScummError> {
        let position = self.peek().position;
        let name = self.consume_identifier()?;
        self.consume(TokenKind::LeftParen, "'(' after name")?;
        let args = self.parse_arguments(TokenKind::RightParen)?;
        self.consume(TokenKind::RightParen, "')' after arguments")?;

        Ok(Call {
            name,
            args,
            position,
        })
    }

    fn parse_arguments(&mut self, close: TokenKind) -> Result<Vec<Expr>, ScummError> {
        let mut args = Vec::new();
        if self.check(&close) {
            return Ok(args);
        }

        args.push(self.parse_expression()?);
        while self.match_token(&[TokenKind::Comma]) {
            args.push(self.parse_expression()?);
        }
        Ok(args)
    }

    // Helper methods
    fn match_token(&mut self, types: &[TokenKind]) -> bool {
        for token_type in types {
            if self.check(token_type) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, token_type: &TokenKind) -> bool {
        if self.is_at_end() {
            false
        } else {
            std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(token_type)
        }
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len() || matches!(self.peek().kind, TokenKind::EOF)
    }

    fn peek(&self) -> &Token {
        static END: Token = Token {
            kind: TokenKind::EOF,
            position: 0,
            line: 1,
            column: 1,
        };
        self.tokens.get(self.current).unwrap_or(&END)
    }

    fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.current + 1)
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn consume(&mut self, token_type: TokenKind, expected: &str) -> Result<(), ScummError> {
        if self.check(&token_type) {
            self.advance();
            Ok(())
        } else {
            let token = self.peek();
            Err(ScummError::ExpectedToken(
                expected.to_string(),
                token.kind.describe(),
                token.position,
            ))
        }
    }

    fn consume_identifier(&mut self) -> Result<String, ScummError> {
        if let TokenKind::Identifier(name) = &self.peek().kind {
            let identifier = name.clone();
            self.advance();
            Ok(identifier)
        } else {
            let token = self.peek();
            Err(ScummError::ExpectedToken(
                "identifier".to_string(),
                token.kind.describe(),
                token.position,
            ))
        }
    }

    fn consume_integer(&mut self) -> Result<i64, ScummError> {
        if let TokenKind::IntegerLiteral(value) = self.peek().kind {
            self.advance();
            Ok(value)
        } else {
            let token = self.peek();
            Err(ScummError::ExpectedToken(
                "number".to_string(),
                token.kind.describe(),
                token.position,
            ))
        }
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
