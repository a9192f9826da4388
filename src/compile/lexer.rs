use super::CompileError;

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    // Literals
    Number(i32),
    StringLiteral(String),

    Ident(String),

    // Keywords
    Program,
    Declare,
    Integer,
    Str,
    Begin,
    End,
    Set,
    Print,
    Read,
    If,
    Then,
    Else,
    EndIf,
    While,
    Do,
    EndWhile,

    // Operators
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Gt,
    Lt,
    Eq,
    NotEq,

    // Delimiters
    LParen,
    RParen,

    // End of input
    Eof,
}

impl Token {
    /// How the token reads in source, for error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::StringLiteral(s) => format!("string \"{}\"", s),
            Token::Ident(name) => format!("identifier '{}'", name),
            Token::Eof => "end of input".into(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::Program => "PROGRAM",
            Token::Declare => "DECLARE",
            Token::Integer => "INTEGER",
            Token::Str => "STRING",
            Token::Begin => "BEGIN",
            Token::End => "END",
            Token::Set => "SET",
            Token::Print => "PRINT",
            Token::Read => "READ",
            Token::If => "IF",
            Token::Then => "THEN",
            Token::Else => "ELSE",
            Token::EndIf => "ENDIF",
            Token::While => "WHILE",
            Token::Do => "DO",
            Token::EndWhile => "ENDWHILE",
            Token::Assign => ":=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Gt => ">",
            Token::Lt => "<",
            Token::Eq => "=",
            Token::NotEq => "<>",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Number(_) | Token::StringLiteral(_) | Token::Ident(_) | Token::Eof => "",
        }
    }
}

#[derive(Clone, Debug)]
pub struct SpannedToken {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<SpannedToken>, CompileError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let Some(c) = self.peek() else {
                tokens.push(SpannedToken {
                    token: Token::Eof,
                    line: self.line,
                    column: self.column,
                });
                break;
            };
            tokens.push(self.next_token(c)?);
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.peek().is_some_and(|c| c.is_whitespace()) {
                self.advance();
            }
            if self.peek() == Some('#') {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.advance();
                }
                continue;
            }
            break;
        }
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::Parse {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }

    fn next_token(&mut self, c: char) -> Result<SpannedToken, CompileError> {
        let line = self.line;
        let column = self.column;

        let token = match c {
            '(' => { self.advance(); Token::LParen }
            ')' => { self.advance(); Token::RParen }
            '+' => { self.advance(); Token::Plus }
            '-' => { self.advance(); Token::Minus }
            '*' => { self.advance(); Token::Star }
            '/' => { self.advance(); Token::Slash }
            '>' => { self.advance(); Token::Gt }
            '=' => { self.advance(); Token::Eq }
            '<' => {
                self.advance();
                if self.peek() == Some('>') { self.advance(); Token::NotEq }
                else { Token::Lt }
            }
            ':' => {
                self.advance();
                if self.peek() != Some('=') {
                    return Err(self.error("expected '=' after ':'"));
                }
                self.advance();
                Token::Assign
            }
            '"' => self.read_string()?,
            _ if c.is_ascii_digit() => self.read_number()?,
            _ if c.is_ascii_alphabetic() || c == '_' => self.read_ident_or_keyword(),
            _ => return Err(self.error(format!("unexpected character: '{}'", c))),
        };

        Ok(SpannedToken { token, line, column })
    }

    fn read_string(&mut self) -> Result<Token, CompileError> {
        self.advance(); // opening "
        let mut s = String::new();
        loop {
            match self.advance() {
                None => return Err(self.error("unterminated string literal")),
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('"') => s.push('"'),
                    Some('\\') => s.push('\\'),
                    _ => return Err(self.error("invalid escape sequence")),
                },
                Some(c) => s.push(c),
            }
        }
        Ok(Token::StringLiteral(s))
    }

    fn read_number(&mut self) -> Result<Token, CompileError> {
        let mut digits = String::new();
        while let Some(c) = self.peek().filter(|c| c.is_ascii_digit()) {
            digits.push(c);
            self.advance();
        }
        let value: i32 = digits.parse().map_err(|_| {
            self.error(format!("integer literal {} does not fit in 32 bits", digits))
        })?;
        Ok(Token::Number(value))
    }

    fn read_ident_or_keyword(&mut self) -> Token {
        let mut ident = String::new();
        while let Some(c) = self.peek().filter(|c| c.is_ascii_alphanumeric() || *c == '_') {
            ident.push(c);
            self.advance();
        }
        match ident.as_str() {
            "PROGRAM" => Token::Program,
            "DECLARE" => Token::Declare,
            "INTEGER" => Token::Integer,
            "STRING" => Token::Str,
            "BEGIN" => Token::Begin,
            "END" => Token::End,
            "SET" => Token::Set,
            "PRINT" => Token::Print,
            "READ" => Token::Read,
            "IF" => Token::If,
            "THEN" => Token::Then,
            "ELSE" => Token::Else,
            "ENDIF" => Token::EndIf,
            "WHILE" => Token::While,
            "DO" => Token::Do,
            "ENDWHILE" => Token::EndWhile,
            _ => Token::Ident(ident),
        }
    }
}
