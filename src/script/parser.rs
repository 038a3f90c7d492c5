use std::rc::Rc;

use super::ast::*;
use super::lexer::{Token, TokenKind, tokenize};
use super::value::format_number;
use crate::{Error, Result};

const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROW_SIZE: usize = 1024 * 1024;

const RESERVED_WORDS: &[&str] = &[
    "break",
    "case",
    "catch",
    "class",
    "const",
    "continue",
    "debugger",
    "default",
    "delete",
    "do",
    "else",
    "enum",
    "export",
    "extends",
    "false",
    "finally",
    "for",
    "function",
    "if",
    "import",
    "in",
    "instanceof",
    "new",
    "null",
    "return",
    "super",
    "switch",
    "this",
    "throw",
    "true",
    "try",
    "typeof",
    "var",
    "void",
    "while",
    "with",
];

pub(crate) fn parse_program(src: &str) -> Result<Vec<Stmt>> {
    let mut parser = Parser::new(tokenize(src)?);
    let mut body = Vec::new();
    while !parser.at_eof() {
        body.push(parser.parse_statement()?);
    }
    Ok(body)
}

fn parse_expression_source(src: &str) -> Result<Expr> {
    let mut parser = Parser::new(tokenize(src)?);
    let expr = parser.parse_expression()?;
    if !parser.at_eof() {
        return Err(parser.unexpected());
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Set while parsing a `for` head, where `in` ends the initializer.
    no_in: bool,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            no_in: false,
        }
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + offset).min(last)].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn is_punct(&self, punct: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Punct(p) if *p == punct)
    }

    fn is_keyword(&self, word: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(name) if name == word)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.is_punct(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.is_keyword(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &str) -> Result<()> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{punct}'")))
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<()> {
        if self.eat_keyword(word) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{word}'")))
        }
    }

    fn error(&self, message: String) -> Error {
        Error::ScriptParse(format!("{message} at {}", self.peek().pos))
    }

    fn unexpected(&self) -> Error {
        let found = match &self.peek().kind {
            TokenKind::Ident(name) => format!("'{name}'"),
            TokenKind::Number(value) => format_number(*value),
            TokenKind::String(_) => "string".to_string(),
            TokenKind::Template { .. } => "template literal".to_string(),
            TokenKind::Regex { .. } => "regular expression".to_string(),
            TokenKind::Punct(punct) => format!("'{punct}'"),
            TokenKind::Eof => "end of input".to_string(),
        };
        self.error(format!("unexpected token {found}"))
    }

    fn consume_semicolon(&mut self) -> Result<()> {
        if self.eat_punct(";") || self.is_punct("}") || self.at_eof() || self.peek().newline_before
        {
            return Ok(());
        }
        Err(self.unexpected())
    }

    fn binding_identifier(&mut self) -> Result<String> {
        match &self.peek().kind {
            TokenKind::Ident(name) if !RESERVED_WORDS.contains(&name.as_str()) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            TokenKind::Punct("[" | "{") => {
                Err(self.error("destructuring patterns are not supported".to_string()))
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.parse_statement_inner())
    }

    fn parse_statement_inner(&mut self) -> Result<Stmt> {
        if self.eat_punct(";") {
            return Ok(Stmt::Empty);
        }
        if self.is_punct("{") {
            return Ok(Stmt::Block(self.parse_block()?));
        }

        let TokenKind::Ident(word) = self.peek().kind.clone() else {
            return self.parse_expression_statement();
        };

        match word.as_str() {
            "var" | "const" => {
                self.advance();
                let kind = if word == "var" {
                    DeclKind::Var
                } else {
                    DeclKind::Const
                };
                let decls = self.parse_var_declarations(kind)?;
                self.consume_semicolon()?;
                Ok(Stmt::VarDecl { kind, decls })
            }
            "let" if matches!(self.peek_at(1), TokenKind::Ident(_) | TokenKind::Punct("[" | "{")) => {
                self.advance();
                let decls = self.parse_var_declarations(DeclKind::Let)?;
                self.consume_semicolon()?;
                Ok(Stmt::VarDecl {
                    kind: DeclKind::Let,
                    decls,
                })
            }
            "function" => {
                self.advance();
                if self.is_punct("*") {
                    return Err(self.error("generator functions are not supported".to_string()));
                }
                let name = self.binding_identifier()?;
                let decl = self.parse_function_rest(Some(name))?;
                Ok(Stmt::FunctionDecl(decl))
            }
            "async" if matches!(self.peek_at(1), TokenKind::Ident(next) if next == "function") => {
                Err(self.error("async functions are not supported".to_string()))
            }
            "class" => Err(self.error("class declarations are not supported".to_string())),
            "if" => self.parse_if(),
            "for" => self.parse_for(),
            "while" => {
                self.advance();
                self.expect_punct("(")?;
                let test = self.parse_expression()?;
                self.expect_punct(")")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::While { test, body })
            }
            "do" => {
                self.advance();
                let body = Box::new(self.parse_statement()?);
                self.expect_keyword("while")?;
                self.expect_punct("(")?;
                let test = self.parse_expression()?;
                self.expect_punct(")")?;
                self.eat_punct(";");
                Ok(Stmt::DoWhile { body, test })
            }
            "return" => {
                self.advance();
                let value = if self.restricted_production_ends() {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume_semicolon()?;
                Ok(Stmt::Return(value))
            }
            "break" | "continue" => {
                self.advance();
                let label = match &self.peek().kind {
                    TokenKind::Ident(name)
                        if !self.peek().newline_before
                            && !RESERVED_WORDS.contains(&name.as_str()) =>
                    {
                        let name = name.clone();
                        self.advance();
                        Some(name)
                    }
                    _ => None,
                };
                self.consume_semicolon()?;
                Ok(if word == "break" {
                    Stmt::Break(label)
                } else {
                    Stmt::Continue(label)
                })
            }
            "throw" => {
                self.advance();
                if self.peek().newline_before {
                    return Err(self.error("illegal newline after throw".to_string()));
                }
                let value = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Throw(value))
            }
            "try" => self.parse_try(),
            "switch" => self.parse_switch(),
            "debugger" => {
                self.advance();
                self.consume_semicolon()?;
                Ok(Stmt::Empty)
            }
            "with" | "import" | "export" => {
                Err(self.error(format!("'{word}' statements are not supported")))
            }
            _ if !RESERVED_WORDS.contains(&word.as_str())
                && matches!(self.peek_at(1), TokenKind::Punct(":")) =>
            {
                self.advance();
                self.advance();
                let body = self.parse_statement()?;
                Ok(Stmt::Labeled(word, Box::new(body)))
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn restricted_production_ends(&self) -> bool {
        self.is_punct(";") || self.is_punct("}") || self.at_eof() || self.peek().newline_before
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt> {
        let expr = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(Stmt::Expr(expr))
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.is_punct("}") {
            if self.at_eof() {
                return Err(self.error("expected '}'".to_string()));
            }
            body.push(self.parse_statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn parse_var_declarations(&mut self, kind: DeclKind) -> Result<Vec<(String, Option<Expr>)>> {
        let mut decls = Vec::new();
        loop {
            let name = self.binding_identifier()?;
            let init = if self.eat_punct("=") {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            if kind == DeclKind::Const
                && init.is_none()
                && !(self.no_in && (self.is_keyword("of") || self.is_keyword("in")))
            {
                return Err(self.error("missing initializer in const declaration".to_string()));
            }
            decls.push((name, init));
            if !self.eat_punct(",") {
                return Ok(decls);
            }
        }
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        self.expect_keyword("if")?;
        self.expect_punct("(")?;
        let test = self.parse_expression()?;
        self.expect_punct(")")?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.eat_keyword("else") {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            consequent,
            alternate,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        self.expect_keyword("for")?;
        if self.is_keyword("await") {
            return Err(self.error("for await is not supported".to_string()));
        }
        self.expect_punct("(")?;

        let mut init = None;
        if !self.is_punct(";") {
            let decl_kind = match &self.peek().kind {
                TokenKind::Ident(word) if word == "var" => Some(DeclKind::Var),
                TokenKind::Ident(word) if word == "const" => Some(DeclKind::Const),
                TokenKind::Ident(word)
                    if word == "let"
                        && matches!(self.peek_at(1), TokenKind::Ident(_) | TokenKind::Punct("[" | "{")) =>
                {
                    Some(DeclKind::Let)
                }
                _ => None,
            };

            self.no_in = true;
            let head = match decl_kind {
                Some(kind) => {
                    self.advance();
                    self.parse_var_declarations(kind).map(|decls| Stmt::VarDecl { kind, decls })
                }
                None => self.parse_expression().map(Stmt::Expr),
            };
            self.no_in = false;
            let head = head?;

            let is_of = self.is_keyword("of");
            if is_of || self.is_keyword("in") {
                self.advance();
                let target = match head {
                    Stmt::VarDecl { kind, mut decls } if decls.len() == 1 => {
                        let (name, init) = decls.remove(0);
                        if init.is_some() {
                            return Err(self.error(
                                "for-in/of variable may not have an initializer".to_string(),
                            ));
                        }
                        ForTarget::Decl(kind, name)
                    }
                    Stmt::Expr(expr @ (Expr::Ident(_) | Expr::Member { .. })) => {
                        ForTarget::Expr(expr)
                    }
                    _ => return Err(self.error("invalid for-in/of left-hand side".to_string())),
                };
                let right = if is_of {
                    self.parse_assignment()?
                } else {
                    self.parse_expression()?
                };
                self.expect_punct(")")?;
                let body = Box::new(self.parse_statement()?);
                return Ok(if is_of {
                    Stmt::ForOf {
                        target,
                        iterable: right,
                        body,
                    }
                } else {
                    Stmt::ForIn {
                        target,
                        object: right,
                        body,
                    }
                });
            }
            init = Some(Box::new(head));
        }

        self.expect_punct(";")?;
        let test = if self.is_punct(";") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_punct(";")?;
        let update = if self.is_punct(")") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_punct(")")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
        })
    }

    fn parse_try(&mut self) -> Result<Stmt> {
        self.expect_keyword("try")?;
        let block = self.parse_block()?;
        let handler = if self.eat_keyword("catch") {
            let param = if self.eat_punct("(") {
                let name = self.binding_identifier()?;
                self.expect_punct(")")?;
                Some(name)
            } else {
                None
            };
            let body = self.parse_block()?;
            Some(CatchClause { param, body })
        } else {
            None
        };
        let finalizer = if self.eat_keyword("finally") {
            Some(self.parse_block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.error("missing catch or finally after try".to_string()));
        }
        Ok(Stmt::Try {
            block,
            handler,
            finalizer,
        })
    }

    fn parse_switch(&mut self) -> Result<Stmt> {
        self.expect_keyword("switch")?;
        self.expect_punct("(")?;
        let discriminant = self.parse_expression()?;
        self.expect_punct(")")?;
        self.expect_punct("{")?;
        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.eat_punct("}") {
            let test = if self.eat_keyword("case") {
                Some(self.parse_expression()?)
            } else if self.eat_keyword("default") {
                if seen_default {
                    return Err(self.error("more than one default clause in switch".to_string()));
                }
                seen_default = true;
                None
            } else {
                return Err(self.unexpected());
            };
            self.expect_punct(":")?;
            let mut body = Vec::new();
            while !self.is_keyword("case") && !self.is_keyword("default") && !self.is_punct("}") {
                if self.at_eof() {
                    return Err(self.error("expected '}'".to_string()));
                }
                body.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        Ok(Stmt::Switch {
            discriminant,
            cases,
        })
    }

    fn parse_function_rest(&mut self, name: Option<String>) -> Result<Rc<FunctionDecl>> {
        let params = self.parse_params()?;
        let body = self.parse_function_body()?;
        let mut var_names = Vec::new();
        collect_var_names(&body, &mut var_names);
        Ok(Rc::new(FunctionDecl {
            name,
            params,
            body: FunctionBody::Block(body),
            is_arrow: false,
            var_names,
        }))
    }

    fn parse_function_body(&mut self) -> Result<Vec<Stmt>> {
        // A function body resets the `for` head context.
        let saved = std::mem::replace(&mut self.no_in, false);
        let body = self.parse_block();
        self.no_in = saved;
        body
    }

    fn parse_params(&mut self) -> Result<Vec<Param>> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        while !self.eat_punct(")") {
            let rest = self.eat_punct("...");
            let name = self.binding_identifier()?;
            let default = if !rest && self.eat_punct("=") {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            params.push(Param {
                name,
                default,
                rest,
            });
            if rest {
                self.expect_punct(")")?;
                break;
            }
            if !self.is_punct(")") {
                self.expect_punct(",")?;
            }
        }
        Ok(params)
    }

    fn parse_expression(&mut self) -> Result<Expr> {
        let first = self.parse_assignment()?;
        if !self.is_punct(",") {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat_punct(",") {
            exprs.push(self.parse_assignment()?);
        }
        Ok(Expr::Sequence(exprs))
    }

    fn parse_assignment(&mut self) -> Result<Expr> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.parse_assignment_inner()
        })
    }

    fn parse_assignment_inner(&mut self) -> Result<Expr> {
        if self.arrow_ahead() {
            return self.parse_arrow();
        }

        let target = self.parse_conditional()?;
        let TokenKind::Punct(punct) = self.peek().kind else {
            return Ok(target);
        };
        let Some(op) = assign_op(punct) else {
            return Ok(target);
        };
        if !is_simple_target(&target) {
            return Err(self.error("invalid assignment target".to_string()));
        }
        self.advance();
        let value = self.parse_assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn arrow_ahead(&self) -> bool {
        match &self.peek().kind {
            TokenKind::Ident(name) if !RESERVED_WORDS.contains(&name.as_str()) => {
                let next = &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)];
                matches!(next.kind, TokenKind::Punct("=>")) && !next.newline_before
            }
            TokenKind::Punct("(") => {
                let mut depth = 0usize;
                for index in self.pos..self.tokens.len() {
                    match self.tokens[index].kind {
                        TokenKind::Punct("(" | "[" | "{") => depth += 1,
                        TokenKind::Punct(")" | "]" | "}") => {
                            depth = depth.saturating_sub(1);
                            if depth == 0 {
                                return self.tokens.get(index + 1).is_some_and(|token| {
                                    matches!(token.kind, TokenKind::Punct("=>"))
                                        && !token.newline_before
                                });
                            }
                        }
                        TokenKind::Eof => return false,
                        _ => {}
                    }
                }
                false
            }
            _ => false,
        }
    }

    fn parse_arrow(&mut self) -> Result<Expr> {
        let params = if self.is_punct("(") {
            self.parse_params()?
        } else {
            vec![Param {
                name: self.binding_identifier()?,
                default: None,
                rest: false,
            }]
        };
        self.expect_punct("=>")?;

        let (body, var_names) = if self.is_punct("{") {
            let body = self.parse_function_body()?;
            let mut var_names = Vec::new();
            collect_var_names(&body, &mut var_names);
            (FunctionBody::Block(body), var_names)
        } else {
            (
                FunctionBody::Expr(Box::new(self.parse_assignment()?)),
                Vec::new(),
            )
        };

        Ok(Expr::Function(Rc::new(FunctionDecl {
            name: None,
            params,
            body,
            is_arrow: true,
            var_names,
        })))
    }

    fn parse_conditional(&mut self) -> Result<Expr> {
        let test = self.parse_binary(0)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let saved = std::mem::replace(&mut self.no_in, false);
        let consequent = self.parse_assignment();
        self.no_in = saved;
        let consequent = consequent?;
        self.expect_punct(":")?;
        let alternate = self.parse_assignment()?;
        Ok(Expr::Conditional(
            Box::new(test),
            Box::new(consequent),
            Box::new(alternate),
        ))
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let Some((prec, op)) = self.binary_operator() else {
                return Ok(left);
            };
            if prec < min_prec {
                return Ok(left);
            }
            self.advance();
            let right_assoc = matches!(op, InfixOp::Binary(BinaryOp::Pow));
            let right = self.parse_binary(if right_assoc { prec } else { prec + 1 })?;
            left = match op {
                InfixOp::Binary(op) => Expr::Binary(op, Box::new(left), Box::new(right)),
                InfixOp::Logical(op) => Expr::Logical(op, Box::new(left), Box::new(right)),
            };
        }
    }

    fn binary_operator(&self) -> Option<(u8, InfixOp)> {
        let op = match &self.peek().kind {
            TokenKind::Punct(punct) => match *punct {
                "??" => (1, InfixOp::Logical(LogicalOp::Nullish)),
                "||" => (1, InfixOp::Logical(LogicalOp::Or)),
                "&&" => (2, InfixOp::Logical(LogicalOp::And)),
                "|" => (3, InfixOp::Binary(BinaryOp::BitOr)),
                "^" => (4, InfixOp::Binary(BinaryOp::BitXor)),
                "&" => (5, InfixOp::Binary(BinaryOp::BitAnd)),
                "==" => (6, InfixOp::Binary(BinaryOp::Eq)),
                "!=" => (6, InfixOp::Binary(BinaryOp::Ne)),
                "===" => (6, InfixOp::Binary(BinaryOp::StrictEq)),
                "!==" => (6, InfixOp::Binary(BinaryOp::StrictNe)),
                "<" => (7, InfixOp::Binary(BinaryOp::Lt)),
                ">" => (7, InfixOp::Binary(BinaryOp::Gt)),
                "<=" => (7, InfixOp::Binary(BinaryOp::Le)),
                ">=" => (7, InfixOp::Binary(BinaryOp::Ge)),
                "<<" => (8, InfixOp::Binary(BinaryOp::ShiftLeft)),
                ">>" => (8, InfixOp::Binary(BinaryOp::ShiftRight)),
                ">>>" => (8, InfixOp::Binary(BinaryOp::UnsignedShiftRight)),
                "+" => (9, InfixOp::Binary(BinaryOp::Add)),
                "-" => (9, InfixOp::Binary(BinaryOp::Sub)),
                "*" => (10, InfixOp::Binary(BinaryOp::Mul)),
                "/" => (10, InfixOp::Binary(BinaryOp::Div)),
                "%" => (10, InfixOp::Binary(BinaryOp::Mod)),
                "**" => (11, InfixOp::Binary(BinaryOp::Pow)),
                _ => return None,
            },
            TokenKind::Ident(word) if word == "instanceof" => {
                (7, InfixOp::Binary(BinaryOp::InstanceOf))
            }
            TokenKind::Ident(word) if word == "in" && !self.no_in => {
                (7, InfixOp::Binary(BinaryOp::In))
            }
            _ => return None,
        };
        Some(op)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match &self.peek().kind {
            TokenKind::Punct("!") => Some(UnaryOp::Not),
            TokenKind::Punct("-") => Some(UnaryOp::Neg),
            TokenKind::Punct("+") => Some(UnaryOp::Plus),
            TokenKind::Punct("~") => Some(UnaryOp::BitNot),
            TokenKind::Ident(word) if word == "typeof" => Some(UnaryOp::TypeOf),
            TokenKind::Ident(word) if word == "void" => Some(UnaryOp::Void),
            TokenKind::Ident(word) if word == "delete" => Some(UnaryOp::Delete),
            TokenKind::Ident(word) if word == "await" => {
                return Err(self.error("await is not supported".to_string()));
            }
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
                self.parse_unary()
            })?;
            return Ok(Expr::Unary(op, Box::new(operand)));
        }

        if self.is_punct("++") || self.is_punct("--") {
            let op = if self.is_punct("++") {
                UpdateOp::Inc
            } else {
                UpdateOp::Dec
            };
            self.advance();
            let target = self.parse_unary()?;
            if !is_simple_target(&target) {
                return Err(self.error("invalid update target".to_string()));
            }
            return Ok(Expr::Update {
                op,
                prefix: true,
                target: Box::new(target),
            });
        }

        let expr = self.parse_left_hand_side()?;
        if (self.is_punct("++") || self.is_punct("--")) && !self.peek().newline_before {
            if !is_simple_target(&expr) {
                return Err(self.error("invalid update target".to_string()));
            }
            let op = if self.is_punct("++") {
                UpdateOp::Inc
            } else {
                UpdateOp::Dec
            };
            self.advance();
            return Ok(Expr::Update {
                op,
                prefix: false,
                target: Box::new(expr),
            });
        }
        Ok(expr)
    }

    fn parse_left_hand_side(&mut self) -> Result<Expr> {
        let mut expr = if self.is_keyword("new") {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };

        let mut optional_chain = false;
        loop {
            if self.eat_punct(".") {
                let name = self.property_name()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: MemberKey::Named(name),
                    optional: false,
                };
            } else if self.eat_punct("?.") {
                optional_chain = true;
                expr = if self.is_punct("(") {
                    let args = self.parse_arguments()?;
                    Expr::Call {
                        callee: Box::new(expr),
                        args,
                        optional: true,
                    }
                } else if self.eat_punct("[") {
                    let key = self.parse_expression()?;
                    self.expect_punct("]")?;
                    Expr::Member {
                        object: Box::new(expr),
                        property: MemberKey::Computed(Box::new(key)),
                        optional: true,
                    }
                } else {
                    let name = self.property_name()?;
                    Expr::Member {
                        object: Box::new(expr),
                        property: MemberKey::Named(name),
                        optional: true,
                    }
                };
            } else if self.eat_punct("[") {
                let saved = std::mem::replace(&mut self.no_in, false);
                let key = self.parse_expression();
                self.no_in = saved;
                let key = key?;
                self.expect_punct("]")?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: MemberKey::Computed(Box::new(key)),
                    optional: false,
                };
            } else if self.is_punct("(") {
                let args = self.parse_arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    optional: false,
                };
            } else if matches!(self.peek().kind, TokenKind::Template { .. }) {
                return Err(self.error("tagged templates are not supported".to_string()));
            } else {
                break;
            }
        }

        if optional_chain {
            expr = Expr::OptionalChain(Box::new(expr));
        }
        Ok(expr)
    }

    fn parse_new(&mut self) -> Result<Expr> {
        self.expect_keyword("new")?;
        if self.is_punct(".") {
            return Err(self.error("new.target is not supported".to_string()));
        }
        let mut callee = if self.is_keyword("new") {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        loop {
            if self.eat_punct(".") {
                let name = self.property_name()?;
                callee = Expr::Member {
                    object: Box::new(callee),
                    property: MemberKey::Named(name),
                    optional: false,
                };
            } else if self.eat_punct("[") {
                let key = self.parse_expression()?;
                self.expect_punct("]")?;
                callee = Expr::Member {
                    object: Box::new(callee),
                    property: MemberKey::Computed(Box::new(key)),
                    optional: false,
                };
            } else {
                break;
            }
        }
        let args = if self.is_punct("(") {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
        })
    }

    fn property_name(&mut self) -> Result<String> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Argument>> {
        self.expect_punct("(")?;
        let saved = std::mem::replace(&mut self.no_in, false);
        let args = self.parse_argument_list();
        self.no_in = saved;
        args
    }

    fn parse_argument_list(&mut self) -> Result<Vec<Argument>> {
        let mut args = Vec::new();
        while !self.eat_punct(")") {
            if self.eat_punct("...") {
                args.push(Argument::Spread(self.parse_assignment()?));
            } else {
                args.push(Argument::Expr(self.parse_assignment()?));
            }
            if !self.is_punct(")") {
                self.expect_punct(",")?;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number(value) => {
                self.advance();
                Ok(Expr::Number(value))
            }
            TokenKind::String(value) => {
                self.advance();
                Ok(Expr::String(value))
            }
            TokenKind::Template { quasis, exprs } => {
                self.advance();
                let exprs = exprs
                    .iter()
                    .map(|source| parse_expression_source(source))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Expr::Template { quasis, exprs })
            }
            TokenKind::Regex { pattern, flags } => {
                self.advance();
                Ok(Expr::Regex { pattern, flags })
            }
            TokenKind::Punct("(") => {
                self.advance();
                let saved = std::mem::replace(&mut self.no_in, false);
                let expr = self.parse_expression();
                self.no_in = saved;
                let expr = expr?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            TokenKind::Punct("[") => self.parse_array_literal(),
            TokenKind::Punct("{") => self.parse_object_literal(),
            TokenKind::Ident(word) => match word.as_str() {
                "this" => {
                    self.advance();
                    Ok(Expr::This)
                }
                "null" => {
                    self.advance();
                    Ok(Expr::Null)
                }
                "true" | "false" => {
                    self.advance();
                    Ok(Expr::Bool(word == "true"))
                }
                "function" => {
                    self.advance();
                    if self.is_punct("*") {
                        return Err(
                            self.error("generator functions are not supported".to_string())
                        );
                    }
                    let name = match &self.peek().kind {
                        TokenKind::Ident(_) => Some(self.binding_identifier()?),
                        _ => None,
                    };
                    Ok(Expr::Function(self.parse_function_rest(name)?))
                }
                "class" => Err(self.error("class expressions are not supported".to_string())),
                _ if RESERVED_WORDS.contains(&word.as_str()) => Err(self.unexpected()),
                _ => {
                    self.advance();
                    Ok(Expr::Ident(word))
                }
            },
            _ => Err(self.unexpected()),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expr> {
        self.expect_punct("[")?;
        let saved = std::mem::replace(&mut self.no_in, false);
        let elements = self.parse_array_elements();
        self.no_in = saved;
        Ok(Expr::Array(elements?))
    }

    fn parse_array_elements(&mut self) -> Result<Vec<ArrayElement>> {
        let mut elements = Vec::new();
        loop {
            if self.eat_punct("]") {
                return Ok(elements);
            }
            if self.eat_punct(",") {
                elements.push(ArrayElement::Hole);
                continue;
            }
            let element = if self.eat_punct("...") {
                ArrayElement::Spread(self.parse_assignment()?)
            } else {
                ArrayElement::Expr(self.parse_assignment()?)
            };
            elements.push(element);
            if !self.is_punct("]") {
                self.expect_punct(",")?;
            }
        }
    }

    fn parse_object_literal(&mut self) -> Result<Expr> {
        self.expect_punct("{")?;
        let saved = std::mem::replace(&mut self.no_in, false);
        let props = self.parse_object_properties();
        self.no_in = saved;
        Ok(Expr::Object(props?))
    }

    fn parse_object_properties(&mut self) -> Result<Vec<PropertyDef>> {
        let mut props = Vec::new();
        while !self.eat_punct("}") {
            if self.eat_punct("...") {
                props.push(PropertyDef::Spread(self.parse_assignment()?));
            } else {
                props.push(self.parse_object_property()?);
            }
            if !self.is_punct("}") {
                self.expect_punct(",")?;
            }
        }
        Ok(props)
    }

    fn parse_object_property(&mut self) -> Result<PropertyDef> {
        if let TokenKind::Ident(word) = &self.peek().kind {
            let is_accessor = (word == "get" || word == "set")
                && !matches!(
                    self.peek_at(1),
                    TokenKind::Punct(":" | "(" | "," | "}" | "=")
                );
            if is_accessor {
                let getter = word == "get";
                self.advance();
                let key = self.parse_property_key()?;
                let name = match &key {
                    PropertyKey::Static(name) => Some(name.clone()),
                    PropertyKey::Computed(_) => None,
                };
                let function = self.parse_function_rest(name)?;
                return Ok(if getter {
                    PropertyDef::Getter(key, function)
                } else {
                    PropertyDef::Setter(key, function)
                });
            }
            if word == "async" && !matches!(self.peek_at(1), TokenKind::Punct(":" | "(" | "," | "}")) {
                return Err(self.error("async methods are not supported".to_string()));
            }
        }

        let shorthand = match &self.peek().kind {
            TokenKind::Ident(name) if !RESERVED_WORDS.contains(&name.as_str()) => {
                Some(name.clone())
            }
            _ => None,
        };
        let key = self.parse_property_key()?;

        if self.eat_punct(":") {
            let value = self.parse_assignment()?;
            return Ok(PropertyDef::Init(key, value));
        }
        if self.is_punct("(") {
            let name = match &key {
                PropertyKey::Static(name) => Some(name.clone()),
                PropertyKey::Computed(_) => None,
            };
            let function = self.parse_function_rest(name)?;
            return Ok(PropertyDef::Init(key, Expr::Function(function)));
        }
        match shorthand {
            Some(name) if self.is_punct(",") || self.is_punct("}") => {
                Ok(PropertyDef::Init(key, Expr::Ident(name)))
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_property_key(&mut self) -> Result<PropertyKey> {
        let token = self.advance();
        match token.kind {
            TokenKind::Ident(name) => Ok(PropertyKey::Static(name)),
            TokenKind::String(value) => Ok(PropertyKey::Static(value)),
            TokenKind::Number(value) => Ok(PropertyKey::Static(format_number(value))),
            TokenKind::Punct("[") => {
                let key = self.parse_assignment()?;
                self.expect_punct("]")?;
                Ok(PropertyKey::Computed(Box::new(key)))
            }
            _ => Err(Error::ScriptParse(format!(
                "unexpected token in object literal at {}",
                token.pos
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum InfixOp {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn assign_op(punct: &str) -> Option<AssignOp> {
    let op = match punct {
        "=" => AssignOp::Assign,
        "+=" => AssignOp::Compound(BinaryOp::Add),
        "-=" => AssignOp::Compound(BinaryOp::Sub),
        "*=" => AssignOp::Compound(BinaryOp::Mul),
        "/=" => AssignOp::Compound(BinaryOp::Div),
        "%=" => AssignOp::Compound(BinaryOp::Mod),
        "**=" => AssignOp::Compound(BinaryOp::Pow),
        "<<=" => AssignOp::Compound(BinaryOp::ShiftLeft),
        ">>=" => AssignOp::Compound(BinaryOp::ShiftRight),
        ">>>=" => AssignOp::Compound(BinaryOp::UnsignedShiftRight),
        "&=" => AssignOp::Compound(BinaryOp::BitAnd),
        "|=" => AssignOp::Compound(BinaryOp::BitOr),
        "^=" => AssignOp::Compound(BinaryOp::BitXor),
        "&&=" => AssignOp::Logical(LogicalOp::And),
        "||=" => AssignOp::Logical(LogicalOp::Or),
        "??=" => AssignOp::Logical(LogicalOp::Nullish),
        _ => return None,
    };
    Some(op)
}

fn is_simple_target(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Ident(_)
            | Expr::Member {
                optional: false,
                ..
            }
    )
}
