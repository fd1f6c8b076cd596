// File: src/parser.rs
//
// Pratt parser turning the token stream from lexer.rs into the ast::Program
// the compiler consumes. Like lexing, parsing sits outside spec.md's core —
// this implementation exists so the crate can run source text end to end.

use crate::ast::{Expr, Program, Stmt};
use crate::lexer::{Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
enum Precedence {
    Lowest,
    Or,
    And,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
    Index,
}

fn precedence_of(op: &str) -> Precedence {
    match op {
        "||" => Precedence::Or,
        "&&" => Precedence::And,
        "==" | "!=" => Precedence::Equals,
        "<" | ">" | "<=" | ">=" => Precedence::LessGreater,
        "+" | "-" => Precedence::Sum,
        "*" | "/" => Precedence::Product,
        _ => Precedence::Lowest,
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<String>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0, errors: Vec::new() }
    }

    pub fn parse_program(&mut self) -> Result<Program, Vec<String>> {
        let mut statements = Vec::new();
        while !self.at_eof() {
            match self.parse_statement() {
                Some(stmt) => statements.push(stmt),
                None => self.advance(),
            };
        }
        if self.errors.is_empty() {
            Ok(Program { statements })
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    fn peek(&self) -> &TokenKind {
        self.tokens.get(self.pos).map(|t| &t.kind).unwrap_or(&TokenKind::Eof)
    }

    fn advance(&mut self) -> TokenKind {
        let tok = self.tokens.get(self.pos).map(|t| t.kind.clone()).unwrap_or(TokenKind::Eof);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    fn is_keyword(kind: &TokenKind, word: &str) -> bool {
        matches!(kind, TokenKind::Keyword(k) if k == word)
    }

    fn is_punct(kind: &TokenKind, ch: char) -> bool {
        matches!(kind, TokenKind::Punctuation(c) if *c == ch)
    }

    fn is_operator(kind: &TokenKind, op: &str) -> bool {
        matches!(kind, TokenKind::Operator(o) if o == op)
    }

    fn expect_punct(&mut self, ch: char) -> bool {
        if Self::is_punct(self.peek(), ch) {
            self.advance();
            true
        } else {
            self.errors.push(format!("expected '{}', got {:?}", ch, self.peek()));
            false
        }
    }

    fn expect_operator(&mut self, op: &str) -> bool {
        if Self::is_operator(self.peek(), op) {
            self.advance();
            true
        } else {
            self.errors.push(format!("expected '{}', got {:?}", op, self.peek()));
            false
        }
    }

    fn parse_statement(&mut self) -> Option<Stmt> {
        match self.peek().clone() {
            TokenKind::Keyword(k) if k == "let" => self.parse_let_statement(),
            TokenKind::Keyword(k) if k == "return" => self.parse_return_statement(),
            _ => {
                let expr = self.parse_expression(Precedence::Lowest)?;
                if Self::is_punct(self.peek(), ';') {
                    self.advance();
                }
                Some(Stmt::Expr(expr))
            }
        }
    }

    fn parse_let_statement(&mut self) -> Option<Stmt> {
        self.advance(); // `let`
        let name = match self.advance() {
            TokenKind::Identifier(name) => name,
            other => {
                self.errors.push(format!("expected identifier after 'let', got {:?}", other));
                return None;
            }
        };
        if !self.expect_operator("=") {
            return None;
        }
        let value = self.parse_expression(Precedence::Lowest)?;
        if Self::is_punct(self.peek(), ';') {
            self.advance();
        }
        Some(Stmt::Let { name, value })
    }

    fn parse_return_statement(&mut self) -> Option<Stmt> {
        self.advance(); // `return`
        if Self::is_punct(self.peek(), ';') {
            self.advance();
            return Some(Stmt::Return(None));
        }
        let value = self.parse_expression(Precedence::Lowest)?;
        if Self::is_punct(self.peek(), ';') {
            self.advance();
        }
        Some(Stmt::Return(Some(value)))
    }

    fn parse_block(&mut self) -> Option<Vec<Stmt>> {
        if !self.expect_punct('{') {
            return None;
        }
        let mut statements = Vec::new();
        while !Self::is_punct(self.peek(), '}') && !self.at_eof() {
            match self.parse_statement() {
                Some(stmt) => statements.push(stmt),
                None => return None,
            }
        }
        self.expect_punct('}');
        Some(statements)
    }

    fn parse_expression(&mut self, precedence: Precedence) -> Option<Expr> {
        let mut left = self.parse_prefix()?;

        loop {
            let next_precedence = match self.peek() {
                TokenKind::Operator(op) => precedence_of(op),
                TokenKind::Punctuation('(') => Precedence::Call,
                TokenKind::Punctuation('[') => Precedence::Index,
                _ => Precedence::Lowest,
            };
            if precedence >= next_precedence {
                break;
            }
            left = match self.peek().clone() {
                TokenKind::Operator(_) => self.parse_infix(left)?,
                TokenKind::Punctuation('(') => self.parse_call(left)?,
                TokenKind::Punctuation('[') => self.parse_index(left)?,
                _ => break,
            };
        }

        Some(left)
    }

    fn parse_prefix(&mut self) -> Option<Expr> {
        match self.peek().clone() {
            TokenKind::Integer(n) => {
                self.advance();
                Some(Expr::Integer(n))
            }
            TokenKind::String(s) => {
                self.advance();
                Some(Expr::StringLiteral(s))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Some(Expr::Identifier(name))
            }
            TokenKind::Keyword(k) if k == "true" => {
                self.advance();
                Some(Expr::Boolean(true))
            }
            TokenKind::Keyword(k) if k == "false" => {
                self.advance();
                Some(Expr::Boolean(false))
            }
            TokenKind::Keyword(k) if k == "if" => self.parse_if(),
            TokenKind::Keyword(k) if k == "fn" => self.parse_function(),
            TokenKind::Operator(op) if op == "-" || op == "!" => {
                self.advance();
                let right = self.parse_expression(Precedence::Prefix)?;
                Some(Expr::Prefix { operator: op, right: Box::new(right) })
            }
            TokenKind::Punctuation('(') => {
                self.advance();
                let expr = self.parse_expression(Precedence::Lowest)?;
                self.expect_punct(')');
                Some(expr)
            }
            TokenKind::Punctuation('[') => self.parse_array(),
            TokenKind::Punctuation('{') => self.parse_hash(),
            other => {
                self.errors.push(format!("no prefix parse for {:?}", other));
                None
            }
        }
    }

    fn parse_infix(&mut self, left: Expr) -> Option<Expr> {
        let operator = match self.advance() {
            TokenKind::Operator(op) => op,
            other => {
                self.errors.push(format!("expected operator, got {:?}", other));
                return None;
            }
        };
        let precedence = precedence_of(&operator);
        let right = self.parse_expression(precedence)?;
        Some(Expr::Infix { left: Box::new(left), operator, right: Box::new(right) })
    }

    fn parse_if(&mut self) -> Option<Expr> {
        self.advance(); // `if`
        self.expect_punct('(');
        let condition = self.parse_expression(Precedence::Lowest)?;
        self.expect_punct(')');
        let consequence = self.parse_block()?;
        let alternative = if Self::is_keyword(self.peek(), "else") {
            self.advance();
            Some(self.parse_block()?)
        } else {
            None
        };
        Some(Expr::If { condition: Box::new(condition), consequence, alternative })
    }

    fn parse_function(&mut self) -> Option<Expr> {
        self.advance(); // `fn`
        self.expect_punct('(');
        let mut parameters = Vec::new();
        if !Self::is_punct(self.peek(), ')') {
            loop {
                match self.advance() {
                    TokenKind::Identifier(name) => parameters.push(name),
                    other => {
                        self.errors.push(format!("expected parameter name, got {:?}", other));
                        return None;
                    }
                }
                if Self::is_punct(self.peek(), ',') {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect_punct(')');
        let body = self.parse_block()?;
        Some(Expr::Function { parameters, body })
    }

    fn parse_call(&mut self, function: Expr) -> Option<Expr> {
        self.advance(); // `(`
        let arguments = self.parse_expression_list(')')?;
        Some(Expr::Call { function: Box::new(function), arguments })
    }

    fn parse_index(&mut self, left: Expr) -> Option<Expr> {
        self.advance(); // `[`
        let index = self.parse_expression(Precedence::Lowest)?;
        self.expect_punct(']');
        Some(Expr::Index { left: Box::new(left), index: Box::new(index) })
    }

    fn parse_array(&mut self) -> Option<Expr> {
        self.advance(); // `[`
        let elements = self.parse_expression_list(']')?;
        Some(Expr::Array(elements))
    }

    fn parse_hash(&mut self) -> Option<Expr> {
        self.advance(); // `{`
        let mut pairs = Vec::new();
        while !Self::is_punct(self.peek(), '}') {
            let key = self.parse_expression(Precedence::Lowest)?;
            self.expect_punct(':');
            let value = self.parse_expression(Precedence::Lowest)?;
            pairs.push((key, value));
            if Self::is_punct(self.peek(), ',') {
                self.advance();
            } else {
                break;
            }
        }
        self.expect_punct('}');
        Some(Expr::Hash(pairs))
    }

    fn parse_expression_list(&mut self, end: char) -> Option<Vec<Expr>> {
        let mut list = Vec::new();
        if Self::is_punct(self.peek(), end) {
            self.advance();
            return Some(list);
        }
        list.push(self.parse_expression(Precedence::Lowest)?);
        while Self::is_punct(self.peek(), ',') {
            self.advance();
            list.push(self.parse_expression(Precedence::Lowest)?);
        }
        self.expect_punct(end);
        Some(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse(input: &str) -> Program {
        let tokens = tokenize(input);
        Parser::new(tokens).parse_program().expect("parse error")
    }

    #[test]
    fn parses_let_statement() {
        let program = parse("let x = 5;");
        assert_eq!(program.statements, vec![Stmt::Let { name: "x".into(), value: Expr::Integer(5) }]);
    }

    #[test]
    fn parses_operator_precedence() {
        let program = parse("1 + 2 * 3;");
        assert_eq!(
            program.statements,
            vec![Stmt::Expr(Expr::Infix {
                left: Box::new(Expr::Integer(1)),
                operator: "+".into(),
                right: Box::new(Expr::Infix {
                    left: Box::new(Expr::Integer(2)),
                    operator: "*".into(),
                    right: Box::new(Expr::Integer(3)),
                }),
            })]
        );
    }

    #[test]
    fn parses_function_literal_and_call() {
        let program = parse("let add = fn(a, b) { a + b }; add(1, 2);");
        assert_eq!(program.statements.len(), 2);
        match &program.statements[1] {
            Stmt::Expr(Expr::Call { arguments, .. }) => assert_eq!(arguments.len(), 2),
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn parses_if_else() {
        let program = parse("if (true) { 10 } else { 20 };");
        match &program.statements[0] {
            Stmt::Expr(Expr::If { alternative, .. }) => assert!(alternative.is_some()),
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn parses_array_and_index() {
        let program = parse("[1, 2, 3][1];");
        match &program.statements[0] {
            Stmt::Expr(Expr::Index { left, .. }) => {
                assert_eq!(**left, Expr::Array(vec![Expr::Integer(1), Expr::Integer(2), Expr::Integer(3)]));
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }
}
