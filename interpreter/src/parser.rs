use crate::ast::{
    Argument, BinaryOperator, ComparisonOperator, Expr, Located, LogicalOperator, Statement,
    Target, UnaryOperator,
};
use crate::error::ParseError;
use crate::lexer::{Spanned, Token, tokenize};

const MAX_DEPTH: usize = 128;

// Binding powers, loosest first.
const BP_CONDITIONAL: u8 = 2; // x if c else y
const BP_OR: u8 = 4; // or
const BP_AND: u8 = 6; // and
const BP_NOT: u8 = 8; // not
const BP_COMPARISON: u8 = 10; // == != < > <= >= in
const BP_ADDITIVE: u8 = 12; // + -
const BP_MULTIPLICATIVE: u8 = 14; // * / // %
const BP_UNARY: u8 = 16; // -x +x
const BP_POWER: u8 = 18; // **
const BP_POSTFIX: u8 = 20; // f(x) x[i]

/// Parse a whole program into located statements.
pub fn parse_program(source: &str) -> Result<Vec<Located>, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = StatementParser { tokens, pos: 0, depth: 0 };
    let mut statements = Vec::new();
    while !parser.at(&Token::EndOfInput) {
        statements.extend(parser.parse_statement()?);
    }
    Ok(statements)
}

/// Parse a single expression, as used by `eval`.
pub fn parse_expression(source: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = StatementParser { tokens, pos: 0, depth: 0 };
    let expr = parser.parse_expression_list()?;
    while parser.at(&Token::Newline) {
        parser.advance();
    }
    if !parser.at(&Token::EndOfInput) {
        return Err(parser.error("invalid syntax"));
    }
    Ok(expr)
}

struct StatementParser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl StatementParser {
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|t| &t.token)
            .unwrap_or(&Token::EndOfInput)
    }

    fn peek_next(&self) -> &Token {
        self.tokens
            .get(self.pos + 1)
            .map(|t| &t.token)
            .unwrap_or(&Token::EndOfInput)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.line())
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), ParseError> {
        if self.at(&token) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            _ => Err(self.error("expected a name")),
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_statement(&mut self) -> Result<Vec<Located>, ParseError> {
        let line = self.line();
        match self.peek() {
            Token::If => Ok(vec![Located { statement: self.parse_if()?, line }]),
            Token::For => Ok(vec![Located { statement: self.parse_for()?, line }]),
            Token::Indent => Err(self.error("unexpected indent")),
            Token::Newline => {
                self.advance();
                Ok(Vec::new())
            }
            _ => self.parse_simple_line(),
        }
    }

    /// One or more simple statements separated by `;`, ending the line.
    fn parse_simple_line(&mut self) -> Result<Vec<Located>, ParseError> {
        let mut statements = Vec::new();
        loop {
            let line = self.line();
            statements.push(Located { statement: self.parse_simple()?, line });
            if self.at(&Token::Semicolon) {
                self.advance();
                if self.at(&Token::Newline) {
                    break;
                }
                continue;
            }
            break;
        }
        match self.peek() {
            Token::Newline => {
                self.advance();
                Ok(statements)
            }
            Token::EndOfInput => Ok(statements),
            _ => Err(self.error("invalid syntax")),
        }
    }

    fn parse_simple(&mut self) -> Result<Statement, ParseError> {
        match self.peek() {
            Token::Pass => {
                self.advance();
                Ok(Statement::Pass)
            }
            Token::Assert => {
                self.advance();
                let test = self.parse_expr(0)?;
                let message = if self.at(&Token::Comma) {
                    self.advance();
                    Some(self.parse_expr(0)?)
                } else {
                    None
                };
                Ok(Statement::Assert { test, message })
            }
            Token::Del => {
                self.advance();
                let mut names = vec![self.expect_ident()?];
                while self.at(&Token::Comma) {
                    self.advance();
                    names.push(self.expect_ident()?);
                }
                Ok(Statement::Delete(names))
            }
            _ => {
                let expr = self.parse_expression_list()?;
                match self.peek() {
                    Token::Eq => {
                        self.advance();
                        let target = self.to_target(expr)?;
                        let value = self.parse_expression_list()?;
                        Ok(Statement::Assign { target, value })
                    }
                    Token::PlusEq | Token::MinusEq => {
                        let operator = if self.advance() == Token::PlusEq {
                            BinaryOperator::Addition
                        } else {
                            BinaryOperator::Subtraction
                        };
                        let Expr::Name(name) = expr else {
                            return Err(self.error("illegal expression for augmented assignment"));
                        };
                        let value = self.parse_expression_list()?;
                        Ok(Statement::AugmentedAssign { name, operator, value })
                    }
                    _ => Ok(Statement::Expression(expr)),
                }
            }
        }
    }

    fn to_target(&self, expr: Expr) -> Result<Target, ParseError> {
        match expr {
            Expr::Name(name) => Ok(Target::Name(name)),
            Expr::Tuple(items) | Expr::List(items) => {
                let mut names = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Expr::Name(name) => names.push(name),
                        _ => return Err(self.error("cannot assign to expression")),
                    }
                }
                Ok(Target::Unpack(names))
            }
            _ => Err(self.error("cannot assign to expression")),
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Located>, ParseError> {
        self.expect(Token::Colon, "':'")?;
        if !self.at(&Token::Newline) {
            return self.parse_simple_line();
        }
        self.advance();
        if !self.at(&Token::Indent) {
            return Err(self.error("expected an indented block"));
        }
        self.advance();
        let mut body = Vec::new();
        while !self.at(&Token::Dedent) && !self.at(&Token::EndOfInput) {
            body.extend(self.parse_statement()?);
        }
        if self.at(&Token::Dedent) {
            self.advance();
        }
        Ok(body)
    }

    fn parse_if(&mut self) -> Result<Statement, ParseError> {
        self.advance();
        let condition = self.parse_expr(0)?;
        let mut branches = vec![(condition, self.parse_block()?)];
        let mut otherwise = Vec::new();
        loop {
            match self.peek() {
                Token::Elif => {
                    self.advance();
                    let condition = self.parse_expr(0)?;
                    branches.push((condition, self.parse_block()?));
                }
                Token::Else => {
                    self.advance();
                    otherwise = self.parse_block()?;
                    break;
                }
                _ => break,
            }
        }
        Ok(Statement::If { branches, otherwise })
    }

    fn parse_for(&mut self) -> Result<Statement, ParseError> {
        self.advance();
        let mut names = vec![self.expect_ident()?];
        while self.at(&Token::Comma) {
            self.advance();
            names.push(self.expect_ident()?);
        }
        let target = if names.len() == 1 {
            Target::Name(names.remove(0))
        } else {
            Target::Unpack(names)
        };
        self.expect(Token::In, "'in'")?;
        let iterable = self.parse_expression_list()?;
        let body = self.parse_block()?;
        Ok(Statement::For { target, iterable, body })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// `a, b, c` without brackets builds a tuple.
    fn parse_expression_list(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_expr(0)?;
        if !self.at(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.at(&Token::Comma) {
            self.advance();
            if !starts_expression(self.peek()) {
                break;
            }
            items.push(self.parse_expr(0)?);
        }
        Ok(Expr::Tuple(items))
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("expression is nested too deeply"));
        }
        let result = self.parse_expr_inner(min_bp);
        self.depth -= 1;
        result
    }

    fn parse_expr_inner(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut left = self.parse_prefix()?;

        loop {
            let Some((l_bp, r_bp)) = infix_bp(self.peek(), self.peek_next()) else { break };
            if l_bp < min_bp {
                break;
            }

            match self.peek().clone() {
                Token::If => {
                    self.advance();
                    let condition = self.parse_expr(BP_CONDITIONAL + 1)?;
                    self.expect(Token::Else, "'else'")?;
                    let false_branch = self.parse_expr(BP_CONDITIONAL)?;
                    left = Expr::Conditional {
                        condition: Box::new(condition),
                        true_branch: Box::new(left),
                        false_branch: Box::new(false_branch),
                    };
                }
                Token::And | Token::Or => {
                    let operator = if self.advance() == Token::And {
                        LogicalOperator::And
                    } else {
                        LogicalOperator::Or
                    };
                    let right = self.parse_expr(r_bp)?;
                    left = Expr::Logical {
                        operator,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                }
                Token::LParen => {
                    self.advance();
                    let arguments = self.parse_arguments()?;
                    left = Expr::Call { callee: Box::new(left), arguments };
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expression_list()?;
                    self.expect(Token::RBracket, "']'")?;
                    left = Expr::Index { target: Box::new(left), index: Box::new(index) };
                }
                token if comparison_operator(&token, self.peek_next()).is_some() => {
                    let mut rest = Vec::new();
                    while let Some(operator) = comparison_operator(self.peek(), self.peek_next()) {
                        self.advance();
                        if operator == ComparisonOperator::NotIn {
                            self.advance();
                        }
                        rest.push((operator, self.parse_expr(r_bp)?));
                    }
                    left = Expr::Compare { first: Box::new(left), rest };
                }
                token => {
                    self.advance();
                    let operator = match token {
                        Token::Plus => BinaryOperator::Addition,
                        Token::Minus => BinaryOperator::Subtraction,
                        Token::Star => BinaryOperator::Multiplication,
                        Token::Slash => BinaryOperator::Division,
                        Token::SlashSlash => BinaryOperator::FloorDivision,
                        Token::Percent => BinaryOperator::Modulo,
                        Token::StarStar => BinaryOperator::Power,
                        _ => return Err(self.error("invalid syntax")),
                    };
                    let right = self.parse_expr(r_bp)?;
                    left = Expr::Binary {
                        operator,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                }
            }
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        match self.advance() {
            Token::Integer(n) => Ok(Expr::Integer(n)),
            Token::Float(n) => Ok(Expr::Float(n)),
            Token::Str(mut s) => {
                // Adjacent string literals concatenate.
                while let Token::Str(next) = self.peek() {
                    s.push_str(next);
                    self.advance();
                }
                Ok(Expr::Str(s))
            }
            Token::True => Ok(Expr::Boolean(true)),
            Token::False => Ok(Expr::Boolean(false)),
            Token::None => Ok(Expr::None),
            Token::Ident(name) => Ok(Expr::Name(name)),

            token @ (Token::Minus | Token::Plus) => {
                let operator = if token == Token::Minus {
                    UnaryOperator::Negation
                } else {
                    UnaryOperator::Plus
                };
                let operand = self.parse_expr(BP_UNARY)?;
                Ok(Expr::Unary { operator, operand: Box::new(operand) })
            }
            Token::Not => {
                let operand = self.parse_expr(BP_NOT)?;
                Ok(Expr::Unary { operator: UnaryOperator::LogicalNot, operand: Box::new(operand) })
            }

            Token::LParen => {
                if self.at(&Token::RParen) {
                    self.advance();
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let first = self.parse_expr(0)?;
                if self.at(&Token::RParen) {
                    self.advance();
                    return Ok(first);
                }
                let mut items = vec![first];
                while self.at(&Token::Comma) {
                    self.advance();
                    if self.at(&Token::RParen) {
                        break;
                    }
                    items.push(self.parse_expr(0)?);
                }
                self.expect(Token::RParen, "')'")?;
                Ok(Expr::Tuple(items))
            }
            Token::LBracket => {
                let mut items = Vec::new();
                while !self.at(&Token::RBracket) {
                    items.push(self.parse_expr(0)?);
                    if self.at(&Token::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.expect(Token::RBracket, "']'")?;
                Ok(Expr::List(items))
            }

            Token::EndOfInput | Token::Newline => Err(self.error("unexpected EOF while parsing")),
            _ => Err(self.error("invalid syntax")),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Argument>, ParseError> {
        let mut arguments = Vec::new();
        while !self.at(&Token::RParen) {
            let keyword = *self.peek_next() == Token::Eq;
            let argument = match self.peek().clone() {
                Token::Ident(name) if keyword => {
                    self.advance();
                    self.advance();
                    Argument::Keyword(name, self.parse_expr(0)?)
                }
                _ => {
                    if arguments.iter().any(|a| matches!(a, Argument::Keyword(..))) {
                        return Err(self.error("positional argument follows keyword argument"));
                    }
                    Argument::Positional(self.parse_expr(0)?)
                }
            };
            arguments.push(argument);
            if self.at(&Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(Token::RParen, "')'")?;
        Ok(arguments)
    }
}

fn starts_expression(token: &Token) -> bool {
    matches!(
        token,
        Token::Integer(_)
            | Token::Float(_)
            | Token::Str(_)
            | Token::Ident(_)
            | Token::True
            | Token::False
            | Token::None
            | Token::Minus
            | Token::Plus
            | Token::Not
            | Token::LParen
            | Token::LBracket
    )
}

fn comparison_operator(token: &Token, next: &Token) -> Option<ComparisonOperator> {
    match token {
        Token::EqEq => Some(ComparisonOperator::Equality),
        Token::BangEq => Some(ComparisonOperator::Inequality),
        Token::Lt => Some(ComparisonOperator::LessThan),
        Token::Gt => Some(ComparisonOperator::GreaterThan),
        Token::LtEq => Some(ComparisonOperator::LessThanOrEqual),
        Token::GtEq => Some(ComparisonOperator::GreaterThanOrEqual),
        Token::In => Some(ComparisonOperator::In),
        Token::Not if *next == Token::In => Some(ComparisonOperator::NotIn),
        _ => None,
    }
}

/// Infix binding powers: returns (left_bp, right_bp) or None if not infix.
fn infix_bp(token: &Token, next: &Token) -> Option<(u8, u8)> {
    if comparison_operator(token, next).is_some() {
        return Some((BP_COMPARISON, BP_COMPARISON + 1));
    }
    match token {
        Token::If => Some((BP_CONDITIONAL, BP_CONDITIONAL)),
        Token::Or => Some((BP_OR, BP_OR + 1)),
        Token::And => Some((BP_AND, BP_AND + 1)),
        Token::Plus | Token::Minus => Some((BP_ADDITIVE, BP_ADDITIVE + 1)),
        Token::Star | Token::Slash | Token::SlashSlash | Token::Percent => {
            Some((BP_MULTIPLICATIVE, BP_MULTIPLICATIVE + 1))
        }
        // Right associative, and binds tighter than a unary minus on its left.
        Token::StarStar => Some((BP_POWER, BP_UNARY)),
        Token::LParen | Token::LBracket => Some((BP_POSTFIX, BP_POSTFIX + 1)),
        _ => None,
    }
}
