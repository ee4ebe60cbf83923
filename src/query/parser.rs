//! Query parser
//!
//! Hand-rolled lexer and recursive-descent parser for the subscription
//! query language. Parsing short-circuits on the first error and reports
//! the line/column it occurred at.
//!
//! The language is deliberately small:
//!
//! ```text
//! document       = operation+
//! operation      = selection-set                          (shorthand)
//!                | "subscription" [Name] [var-defs] selection-set
//! var-defs       = "(" variable+ ")"
//! selection-set  = "{" field+ "}"
//! field          = Name [ "(" argument+ ")" ] [ selection-set ]
//! argument       = Name ":" value
//! value          = variable | int | float | string | "true" | "false"
//!                | "null" | "[" value* "]" | "{" (Name ":" value)* "}"
//! ```
//!
//! Commas are insignificant separators and `#` comments run to end of line.

use std::fmt;

use super::ast::{Argument, Document, FieldNode, Operation, Pos, Value, VariableDefinition};

/// Maximum nesting depth for selection sets and values
///
/// Guards against stack exhaustion from adversarial input.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Error type for query parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// What went wrong
    pub message: String,
    /// Where it went wrong
    pub pos: Pos,
}

impl SyntaxError {
    fn new(message: impl Into<String>, pos: Pos) -> Self {
        Self {
            message: message.into(),
            pos,
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Syntax error at {}: {}", self.pos, self.message)
    }
}

impl std::error::Error for SyntaxError {}

/// Parse a query document
pub fn parse(input: &str) -> Result<Document, SyntaxError> {
    Parser::new(input)?.parse_document()
}

#[derive(Debug, Clone)]
enum TokenKind {
    Name(String),
    Variable(String),
    Int(i64),
    Float(f64),
    Str(String),
    Punct(u8),
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    pos: Pos,
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Name(n) => format!("'{}'", n),
        TokenKind::Variable(n) => format!("'${}'", n),
        TokenKind::Int(i) => format!("'{}'", i),
        TokenKind::Float(x) => format!("'{}'", x),
        TokenKind::Str(_) => "string".to_string(),
        TokenKind::Punct(c) => format!("'{}'", *c as char),
        TokenKind::Eof => "end of input".to_string(),
    }
}

struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    offset: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    fn pos(&self) -> Pos {
        Pos::new(self.line, self.column)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.offset += 1;
        if byte == b'\n' {
            self.line += 1;
            self.column = 1;
        } else if byte & 0xC0 != 0x80 {
            // continuation bytes of a multibyte char do not advance the column
            self.column += 1;
        }
        Some(byte)
    }

    fn skip_ignored(&mut self) {
        while let Some(byte) = self.peek() {
            match byte {
                b' ' | b'\t' | b'\r' | b'\n' | b',' => {
                    self.bump();
                }
                b'#' => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, SyntaxError> {
        self.skip_ignored();
        let pos = self.pos();

        let Some(byte) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                pos,
            });
        };

        let kind = match byte {
            b'{' | b'}' | b'(' | b')' | b'[' | b']' | b':' => {
                self.bump();
                TokenKind::Punct(byte)
            }
            b'$' => {
                self.bump();
                match self.lex_name() {
                    Some(name) => TokenKind::Variable(name),
                    None => {
                        return Err(SyntaxError::new("Expected variable name after '$'", pos));
                    }
                }
            }
            b'"' => {
                self.bump();
                self.lex_string(pos)?
            }
            b'-' | b'0'..=b'9' => self.lex_number(pos)?,
            b'_' | b'a'..=b'z' | b'A'..=b'Z' => match self.lex_name() {
                Some(name) => TokenKind::Name(name),
                None => return Err(SyntaxError::new("Expected name", pos)),
            },
            other => {
                return Err(SyntaxError::new(
                    format!("Unexpected character '{}'", other as char),
                    pos,
                ));
            }
        };

        Ok(Token { kind, pos })
    }

    fn lex_name(&mut self) -> Option<String> {
        let start = self.offset;
        match self.peek() {
            Some(b'_' | b'a'..=b'z' | b'A'..=b'Z') => {
                self.bump();
            }
            _ => return None,
        }
        while let Some(b'_' | b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z') = self.peek() {
            self.bump();
        }
        Some(self.input[start..self.offset].to_string())
    }

    fn lex_string(&mut self, start: Pos) -> Result<TokenKind, SyntaxError> {
        let mut out = String::new();
        let mut segment_start = self.offset;

        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    return Err(SyntaxError::new("Unterminated string", start));
                }
                Some(b'"') => {
                    out.push_str(&self.input[segment_start..self.offset]);
                    self.bump();
                    return Ok(TokenKind::Str(out));
                }
                Some(b'\\') => {
                    out.push_str(&self.input[segment_start..self.offset]);
                    let escape_pos = self.pos();
                    self.bump();
                    let escaped = match self.bump() {
                        Some(b'"') => '"',
                        Some(b'\\') => '\\',
                        Some(b'/') => '/',
                        Some(b'n') => '\n',
                        Some(b't') => '\t',
                        Some(b'r') => '\r',
                        Some(b'b') => '\u{0008}',
                        Some(b'f') => '\u{000C}',
                        Some(b'u') => self.lex_unicode_escape(escape_pos)?,
                        _ => {
                            return Err(SyntaxError::new("Invalid escape sequence", escape_pos));
                        }
                    };
                    out.push(escaped);
                    segment_start = self.offset;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn lex_unicode_escape(&mut self, pos: Pos) -> Result<char, SyntaxError> {
        let mut code: u32 = 0;
        for _ in 0..4 {
            let digit = match self.bump() {
                Some(b @ b'0'..=b'9') => (b - b'0') as u32,
                Some(b @ b'a'..=b'f') => (b - b'a' + 10) as u32,
                Some(b @ b'A'..=b'F') => (b - b'A' + 10) as u32,
                _ => return Err(SyntaxError::new("Invalid unicode escape", pos)),
            };
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or_else(|| SyntaxError::new("Invalid unicode escape", pos))
    }

    fn lex_number(&mut self, pos: Pos) -> Result<TokenKind, SyntaxError> {
        let start = self.offset;

        if self.peek() == Some(b'-') {
            self.bump();
        }
        if !matches!(self.peek(), Some(b'0'..=b'9')) {
            return Err(SyntaxError::new("Expected digit in number", pos));
        }
        while let Some(b'0'..=b'9') = self.peek() {
            self.bump();
        }

        let mut is_float = false;
        if self.peek() == Some(b'.') {
            is_float = true;
            self.bump();
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(SyntaxError::new("Expected digit after decimal point", pos));
            }
            while let Some(b'0'..=b'9') = self.peek() {
                self.bump();
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            is_float = true;
            self.bump();
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.bump();
            }
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(SyntaxError::new("Expected digit in exponent", pos));
            }
            while let Some(b'0'..=b'9') = self.peek() {
                self.bump();
            }
        }

        let text = &self.input[start..self.offset];
        if is_float {
            let value = text
                .parse::<f64>()
                .map_err(|_| SyntaxError::new(format!("Invalid float literal '{}'", text), pos))?;
            Ok(TokenKind::Float(value))
        } else {
            let value = text
                .parse::<i64>()
                .map_err(|_| SyntaxError::new(format!("Invalid int literal '{}'", text), pos))?;
            Ok(TokenKind::Int(value))
        }
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self, SyntaxError> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;
        Ok(Self { lexer, current })
    }

    /// Consume the current token and load the next one
    fn advance(&mut self) -> Result<Token, SyntaxError> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn at_punct(&self, c: u8) -> bool {
        matches!(self.current.kind, TokenKind::Punct(p) if p == c)
    }

    fn expect_punct(&mut self, c: u8, what: &str) -> Result<Pos, SyntaxError> {
        let pos = self.current.pos;
        if self.at_punct(c) {
            self.advance()?;
            Ok(pos)
        } else {
            Err(SyntaxError::new(
                format!("{}, found {}", what, describe(&self.current.kind)),
                pos,
            ))
        }
    }

    fn take_name(&mut self) -> Result<Option<String>, SyntaxError> {
        if matches!(self.current.kind, TokenKind::Name(_)) {
            if let TokenKind::Name(name) = self.advance()?.kind {
                return Ok(Some(name));
            }
        }
        Ok(None)
    }

    fn parse_document(mut self) -> Result<Document, SyntaxError> {
        let mut operations = Vec::new();
        while !matches!(self.current.kind, TokenKind::Eof) {
            operations.push(self.parse_operation()?);
        }
        if operations.is_empty() {
            return Err(SyntaxError::new(
                "Expected at least one operation",
                self.current.pos,
            ));
        }
        Ok(Document { operations })
    }

    fn parse_operation(&mut self) -> Result<Operation, SyntaxError> {
        let pos = self.current.pos;

        if self.at_punct(b'{') {
            let selection_set = self.parse_selection_set(0)?;
            return Ok(Operation {
                name: None,
                variable_definitions: Vec::new(),
                selection_set,
                shorthand: true,
                pos,
            });
        }

        match &self.current.kind {
            TokenKind::Name(n) if n == "subscription" => {
                self.advance()?;
            }
            TokenKind::Name(n) if n == "query" || n == "mutation" => {
                return Err(SyntaxError::new(
                    format!("Operation type '{}' is not supported, expected 'subscription'", n),
                    pos,
                ));
            }
            other => {
                return Err(SyntaxError::new(
                    format!("Expected 'subscription' or '{{', found {}", describe(other)),
                    pos,
                ));
            }
        }

        let name = self.take_name()?;
        let variable_definitions = if self.at_punct(b'(') {
            self.parse_variable_definitions()?
        } else {
            Vec::new()
        };
        let selection_set = self.parse_selection_set(0)?;

        Ok(Operation {
            name,
            variable_definitions,
            selection_set,
            shorthand: false,
            pos,
        })
    }

    fn parse_variable_definitions(&mut self) -> Result<Vec<VariableDefinition>, SyntaxError> {
        let open_pos = self.expect_punct(b'(', "Expected '('")?;

        let mut definitions = Vec::new();
        while !self.at_punct(b')') {
            let pos = self.current.pos;
            match self.advance()?.kind {
                TokenKind::Variable(name) => {
                    definitions.push(VariableDefinition { name, pos });
                }
                other => {
                    return Err(SyntaxError::new(
                        format!("Expected variable definition, found {}", describe(&other)),
                        pos,
                    ));
                }
            }
        }
        self.advance()?;

        if definitions.is_empty() {
            return Err(SyntaxError::new(
                "Expected at least one variable definition",
                open_pos,
            ));
        }
        Ok(definitions)
    }

    fn parse_selection_set(&mut self, depth: usize) -> Result<Vec<FieldNode>, SyntaxError> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(SyntaxError::new(
                format!("Selection nesting exceeds limit of {}", MAX_NESTING_DEPTH),
                self.current.pos,
            ));
        }

        let open_pos = self.expect_punct(b'{', "Expected '{'")?;

        let mut fields = Vec::new();
        while !self.at_punct(b'}') {
            fields.push(self.parse_field(depth)?);
        }
        self.advance()?;

        if fields.is_empty() {
            return Err(SyntaxError::new("Expected at least one field", open_pos));
        }
        Ok(fields)
    }

    fn parse_field(&mut self, depth: usize) -> Result<FieldNode, SyntaxError> {
        let pos = self.current.pos;
        let name = match self.advance()?.kind {
            TokenKind::Name(name) => name,
            other => {
                return Err(SyntaxError::new(
                    format!("Expected field name, found {}", describe(&other)),
                    pos,
                ));
            }
        };

        let arguments = if self.at_punct(b'(') {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        let selection_set = if self.at_punct(b'{') {
            self.parse_selection_set(depth + 1)?
        } else {
            Vec::new()
        };

        Ok(FieldNode {
            name,
            arguments,
            selection_set,
            pos,
        })
    }

    fn parse_arguments(&mut self) -> Result<Vec<Argument>, SyntaxError> {
        let open_pos = self.expect_punct(b'(', "Expected '('")?;

        let mut arguments = Vec::new();
        while !self.at_punct(b')') {
            let pos = self.current.pos;
            let name = match self.advance()?.kind {
                TokenKind::Name(name) => name,
                other => {
                    return Err(SyntaxError::new(
                        format!("Expected argument name, found {}", describe(&other)),
                        pos,
                    ));
                }
            };
            self.expect_punct(b':', "Expected ':' after argument name")?;
            let value = self.parse_value(0)?;
            arguments.push(Argument { name, value, pos });
        }
        self.advance()?;

        if arguments.is_empty() {
            return Err(SyntaxError::new("Expected at least one argument", open_pos));
        }
        Ok(arguments)
    }

    fn parse_value(&mut self, depth: usize) -> Result<Value, SyntaxError> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(SyntaxError::new(
                format!("Value nesting exceeds limit of {}", MAX_NESTING_DEPTH),
                self.current.pos,
            ));
        }

        let pos = self.current.pos;
        match self.advance()?.kind {
            TokenKind::Variable(name) => Ok(Value::Variable(name)),
            TokenKind::Int(i) => Ok(Value::Int(i)),
            TokenKind::Float(x) => Ok(Value::Float(x)),
            TokenKind::Str(s) => Ok(Value::String(s)),
            TokenKind::Name(n) => match n.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                "null" => Ok(Value::Null),
                other => Err(SyntaxError::new(
                    format!("Invalid value '{}'", other),
                    pos,
                )),
            },
            TokenKind::Punct(b'[') => {
                let mut items = Vec::new();
                while !self.at_punct(b']') {
                    items.push(self.parse_value(depth + 1)?);
                }
                self.advance()?;
                Ok(Value::List(items))
            }
            TokenKind::Punct(b'{') => {
                let mut fields = Vec::new();
                while !self.at_punct(b'}') {
                    let field_pos = self.current.pos;
                    let name = match self.advance()?.kind {
                        TokenKind::Name(name) => name,
                        other => {
                            return Err(SyntaxError::new(
                                format!("Expected object field name, found {}", describe(&other)),
                                field_pos,
                            ));
                        }
                    };
                    self.expect_punct(b':', "Expected ':' after object field name")?;
                    let value = self.parse_value(depth + 1)?;
                    fields.push((name, value));
                }
                self.advance()?;
                Ok(Value::Object(fields))
            }
            other => Err(SyntaxError::new(
                format!("Expected value, found {}", describe(&other)),
                pos,
            )),
        }
    }
}
