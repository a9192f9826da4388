use super::ast::*;
use super::lexer::{SpannedToken, Token};
use super::CompileError;

pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    /// `tokens` must end with `Token::Eof`, as produced by the lexer.
    pub fn new(tokens: Vec<SpannedToken>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        match self.tokens.get(self.pos) {
            Some(t) => &t.token,
            None => &Token::Eof,
        }
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), CompileError> {
        if self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {}, got {}",
                expected.describe(),
                self.peek().describe()
            )))
        }
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        let (line, column) = self
            .tokens
            .get(self.pos)
            .map(|t| (t.line, t.column))
            .unwrap_or((0, 0));
        CompileError::Parse {
            line,
            column,
            message: message.into(),
        }
    }

    fn expect_ident(&mut self) -> Result<String, CompileError> {
        if let Token::Ident(name) = self.peek().clone() {
            self.advance();
            Ok(name)
        } else {
            Err(self.error(format!("expected identifier, got {}", self.peek().describe())))
        }
    }

    /// file: PROGRAM ID declare? body
    pub fn parse_program(&mut self) -> Result<Program, CompileError> {
        self.expect(&Token::Program)?;
        let name = self.expect_ident()?;
        let declare = if self.at(&Token::Declare) {
            Some(self.parse_declare()?)
        } else {
            None
        };
        self.expect(&Token::Begin)?;
        let body = self.parse_statements(&[Token::End])?;
        self.expect(&Token::End)?;
        if !self.at(&Token::Eof) {
            return Err(self.error(format!(
                "unexpected {} after END",
                self.peek().describe()
            )));
        }
        Ok(Program {
            name,
            declare,
            body,
        })
    }

    fn parse_declare(&mut self) -> Result<Vec<Declaration>, CompileError> {
        self.expect(&Token::Declare)?;
        let mut variables = Vec::new();
        loop {
            let ty = match self.peek() {
                Token::Integer => VarType::Integer,
                Token::Str => VarType::Text,
                _ => break,
            };
            self.advance();
            let name = self.expect_ident()?;
            variables.push(Declaration { name, ty });
        }
        Ok(variables)
    }

    /// Statements up to (not including) one of `terminators`.
    fn parse_statements(&mut self, terminators: &[Token]) -> Result<Vec<Stmt>, CompileError> {
        let mut stmts = Vec::new();
        while !terminators.contains(self.peek()) {
            if self.at(&Token::Eof) {
                return Err(self.error("unexpected end of input"));
            }
            stmts.push(self.parse_statement()?);
        }
        Ok(stmts)
    }

    fn parse_statement(&mut self) -> Result<Stmt, CompileError> {
        match self.peek() {
            Token::Set => {
                self.advance();
                let name = self.expect_ident()?;
                self.expect(&Token::Assign)?;
                let value = if let Token::StringLiteral(s) = self.peek().clone() {
                    self.advance();
                    SetValue::Text(s)
                } else {
                    SetValue::Expr(self.parse_expression()?)
                };
                Ok(Stmt::Setvar { name, value })
            }
            Token::Print => {
                self.advance();
                match self.peek().clone() {
                    Token::StringLiteral(s) => {
                        self.advance();
                        Ok(Stmt::Print(PrintArg::Text(s)))
                    }
                    Token::Ident(name) => {
                        self.advance();
                        Ok(Stmt::Print(PrintArg::Variable(name)))
                    }
                    other => Err(self.error(format!(
                        "PRINT expects a string or identifier, got {}",
                        other.describe()
                    ))),
                }
            }
            Token::Read => {
                self.advance();
                let name = self.expect_ident()?;
                Ok(Stmt::Read { name })
            }
            Token::If => self.parse_decision(),
            Token::While => self.parse_loop(),
            other => Err(self.error(format!("expected statement, got {}", other.describe()))),
        }
    }

    fn parse_decision(&mut self) -> Result<Stmt, CompileError> {
        self.expect(&Token::If)?;
        let condition = self.parse_condition()?;
        self.expect(&Token::Then)?;
        let then_branch = self.parse_statements(&[Token::Else, Token::EndIf])?;
        let else_branch = if self.at(&Token::Else) {
            self.advance();
            Some(self.parse_statements(&[Token::EndIf])?)
        } else {
            None
        };
        self.expect(&Token::EndIf)?;
        Ok(Stmt::Decision {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_loop(&mut self) -> Result<Stmt, CompileError> {
        self.expect(&Token::While)?;
        let condition = self.parse_condition()?;
        self.expect(&Token::Do)?;
        let body = self.parse_statements(&[Token::EndWhile])?;
        self.expect(&Token::EndWhile)?;
        Ok(Stmt::Loop { condition, body })
    }

    fn parse_condition(&mut self) -> Result<Condition, CompileError> {
        let left = self.parse_operand()?;
        let op = self.compare_op().ok_or_else(|| {
            self.error(format!("expected comparison, got {}", self.peek().describe()))
        })?;
        self.advance();
        let right = self.parse_operand()?;
        Ok(Condition { left, op, right })
    }

    fn parse_operand(&mut self) -> Result<Operand, CompileError> {
        match self.peek().clone() {
            Token::Number(n) => {
                self.advance();
                Ok(Operand::Number(n))
            }
            Token::Ident(name) => {
                self.advance();
                Ok(Operand::Ident(name))
            }
            other => Err(self.error(format!(
                "expected number or identifier, got {}",
                other.describe()
            ))),
        }
    }

    fn compare_op(&self) -> Option<CompareOp> {
        match self.peek() {
            Token::Gt => Some(CompareOp::Gt),
            Token::Lt => Some(CompareOp::Lt),
            Token::Eq => Some(CompareOp::Eq),
            Token::NotEq => Some(CompareOp::Ne),
            _ => None,
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, CompileError> {
        let left = self.parse_additive()?;
        if let Some(op) = self.compare_op() {
            self.advance();
            let right = self.parse_additive()?;
            return Ok(Expr::compare(op, left, right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_primary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_primary()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        match self.peek().clone() {
            Token::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            Token::Ident(name) => {
                self.advance();
                Ok(Expr::Ident(name))
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&Token::RParen)?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            other => Err(self.error(format!("expected expression, got {}", other.describe()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::lexer::Lexer;

    fn parse(src: &str) -> Program {
        let tokens = Lexer::new(src).tokenize().unwrap();
        Parser::new(tokens).parse_program().unwrap()
    }

    fn parse_err(src: &str) -> CompileError {
        let tokens = Lexer::new(src).tokenize().unwrap();
        Parser::new(tokens).parse_program().unwrap_err()
    }

    fn body(stmts: &str) -> Vec<Stmt> {
        parse(&format!("PROGRAM t BEGIN {} END", stmts)).body
    }

    #[test]
    fn test_declarations() {
        let program = parse("PROGRAM demo DECLARE INTEGER a STRING s BEGIN END");
        assert_eq!(program.name, "demo");
        assert_eq!(
            program.declare,
            Some(vec![
                Declaration { name: "a".into(), ty: VarType::Integer },
                Declaration { name: "s".into(), ty: VarType::Text },
            ])
        );
        assert!(program.body.is_empty());
    }

    #[test]
    fn test_no_declare_block() {
        let program = parse("PROGRAM demo BEGIN PRINT \"hi\" END");
        assert_eq!(program.declare, None);
        assert_eq!(program.body, vec![Stmt::Print(PrintArg::Text("hi".into()))]);
    }

    #[test]
    fn test_setvar_text_and_expr() {
        let stmts = body("SET s := \"x\" SET a := 1 + 2");
        assert_eq!(
            stmts[0],
            Stmt::Setvar { name: "s".into(), value: SetValue::Text("x".into()) }
        );
        assert_eq!(
            stmts[1],
            Stmt::Setvar {
                name: "a".into(),
                value: SetValue::Expr(Expr::binary(BinOp::Add, Expr::Number(1), Expr::Number(2))),
            }
        );
    }

    #[test]
    fn test_arithmetic_precedence() {
        let stmts = body("SET a := b + c * 2");
        match &stmts[0] {
            Stmt::Setvar {
                value: SetValue::Expr(Expr::Binary { op: BinOp::Add, right, .. }),
                ..
            } => {
                assert!(matches!(right.as_ref(), Expr::Binary { op: BinOp::Mul, .. }));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_comparison_binds_loosest() {
        let stmts = body("SET a := (1 + 2) > 2");
        match &stmts[0] {
            Stmt::Setvar {
                value: SetValue::Expr(Expr::Compare { op: CompareOp::Gt, left, .. }),
                ..
            } => {
                assert!(matches!(left.as_ref(), Expr::Paren(_)));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_if_else() {
        let stmts = body("IF a > 1 THEN PRINT a ELSE PRINT \"no\" ENDIF");
        match &stmts[0] {
            Stmt::Decision { condition, then_branch, else_branch } => {
                assert_eq!(
                    *condition,
                    Condition {
                        left: Operand::Ident("a".into()),
                        op: CompareOp::Gt,
                        right: Operand::Number(1),
                    }
                );
                assert_eq!(then_branch.len(), 1);
                assert_eq!(else_branch.as_ref().map(Vec::len), Some(1));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_if_without_else() {
        let stmts = body("IF a <> 0 THEN ENDIF");
        assert!(matches!(&stmts[0], Stmt::Decision { else_branch: None, .. }));
    }

    #[test]
    fn test_while_loop() {
        let stmts = body("WHILE i < 10 DO SET i := i + 1 READ j ENDWHILE");
        match &stmts[0] {
            Stmt::Loop { condition, body } => {
                assert_eq!(condition.op, CompareOp::Lt);
                assert_eq!(body.len(), 2);
                assert_eq!(body[1], Stmt::Read { name: "j".into() });
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_missing_end_reports_position() {
        let err = parse_err("PROGRAM t BEGIN\n  PRINT \"x\"\n");
        match err {
            CompileError::Parse { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_print_rejects_expression() {
        assert!(matches!(parse_err("PROGRAM t BEGIN PRINT 1 END"), CompileError::Parse { .. }));
    }

    #[test]
    fn test_condition_requires_simple_operands() {
        assert!(matches!(
            parse_err("PROGRAM t BEGIN WHILE a + 1 < 3 DO ENDWHILE END"),
            CompileError::Parse { .. }
        ));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(matches!(parse_err("PROGRAM t BEGIN END PRINT"), CompileError::Parse { .. }));
    }
}
