// Statement Language Lexer
// Tokenizes disassembled script text into a stream of tokens

use crate::error::ScummError;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    /// Raw string body; escapes and `{...}` markup are left for the string codec.
    StringLiteral(String),
    IntegerLiteral(i64),
    Identifier(String),

    // Keywords
    Goto,
    Unless,
    Var,
    Local,
    Bit,

    // Symbols
    LeftBracket,  // [
    RightBracket, // ]
    LeftParen,    // (
    RightParen,   // )
    Colon,        // :
    Comma,        // ,
    Dot,          // .

    // Operators
    Equal,        // =
    EqualEqual,   // ==
    NotEqual,     // !=
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=
    Not,          // !
    PlusEqual,    // +=
    MinusEqual,   // -=
    StarEqual,    // *=
    SlashEqual,   // /=
    AndEqual,     // &=
    OrEqual,      // |=
    PlusPlus,     // ++
    MinusMinus,   // --

    // Special
    Newline,
    EOF,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::StringLiteral(_) => "string".to_string(),
            TokenKind::IntegerLiteral(n) => n.to_string(),
            TokenKind::Identifier(name) => name.clone(),
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::EOF => "end of input".to_string(),
            other => format!("{:?}", other),
        }
    }
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    current_char: Option<char>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Lexer {
            input: chars,
            position: 0,
            line: 1,
            column: 1,
            current_char,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, ScummError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::EOF;
            tokens.push(token);
            if done {
                break;
            }
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, ScummError> {
        self.skip_whitespace();

        let start_pos = self.position;
        let start_line = self.line;
        let start_column = self.column;

        let ch = match self.current_char {
            None => {
                return Ok(Token {
                    kind: TokenKind::EOF,
                    position: start_pos,
                    line: start_line,
                    column: start_column,
                })
            }
            Some(ch) => ch,
        };

        let kind = match ch {
            '[' => self.single(TokenKind::LeftBracket),
            ']' => self.single(TokenKind::RightBracket),
            '(' => self.single(TokenKind::LeftParen),
            ')' => self.single(TokenKind::RightParen),
            ':' => self.single(TokenKind::Colon),
            ',' => self.single(TokenKind::Comma),
            '.' => self.single(TokenKind::Dot),
            '\n' => {
                self.advance();
                while matches!(self.current_char, Some('\n')) {
                    self.advance();
                    self.skip_whitespace();
                }
                TokenKind::Newline
            }
            '/' => {
                self.advance();
                match self.current_char {
                    Some('/') => {
                        self.skip_line_comment();
                        return self.next_token();
                    }
                    Some('*') => {
                        self.skip_block_comment(start_pos)?;
                        return self.next_token();
                    }
                    Some('=') => {
                        self.advance();
                        TokenKind::SlashEqual
                    }
                    _ => TokenKind::Slash,
                }
            }
            '+' => self.compound(TokenKind::Plus, &[('=', TokenKind::PlusEqual), ('+', TokenKind::PlusPlus)]),
            '-' => self.compound(
                TokenKind::Minus,
                &[('=', TokenKind::MinusEqual), ('-', TokenKind::MinusMinus)],
            ),
            '*' => self.compound(TokenKind::Star, &[('=', TokenKind::StarEqual)]),
            '=' => self.compound(TokenKind::Equal, &[('=', TokenKind::EqualEqual)]),
            '!' => self.compound(TokenKind::Not, &[('=', TokenKind::NotEqual)]),
            '<' => self.compound(TokenKind::Less, &[('=', TokenKind::LessEqual)]),
            '>' => self.compound(TokenKind::Greater, &[('=', TokenKind::GreaterEqual)]),
            '&' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    TokenKind::AndEqual
                } else {
                    return Err(ScummError::UnexpectedCharacter('&', start_pos));
                }
            }
            '|' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    TokenKind::OrEqual
                } else {
                    return Err(ScummError::UnexpectedCharacter('|', start_pos));
                }
            }
            '"' => {
                self.advance();
                TokenKind::StringLiteral(self.read_string(start_pos)?)
            }
            ch if ch.is_ascii_digit() => TokenKind::IntegerLiteral(self.read_number()?),
            ch if ch.is_alphabetic() || ch == '_' => {
                let identifier = self.read_identifier();
                keyword_or_identifier(identifier)
            }
            ch => return Err(ScummError::UnexpectedCharacter(ch, start_pos)),
        };

        Ok(Token {
            kind,
            position: start_pos,
            line: start_line,
            column: start_column,
        })
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    /// One-character operator, or a two-character one when the next
    /// character matches.
    fn compound(&mut self, plain: TokenKind, pairs: &[(char, TokenKind)]) -> TokenKind {
        self.advance();
        for (next, kind) in pairs {
            if self.current_char == Some(*next) {
                self.advance();
                return kind.clone();
            }
        }
        plain
    }

    fn advance(&mut self) {
        if let Some('\n') = self.current_char {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() && ch != '\n' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.current_char {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self, start_pos: usize) -> Result<(), ScummError> {
        // current char is the '*' after '/'
        self.advance();
        while let Some(ch) = self.current_char {
            self.advance();
            if ch == '*' && self.current_char == Some('/') {
                self.advance();
                return Ok(());
            }
        }
        Err(ScummError::LexicalError(
            "unterminated block comment".to_string(),
            start_pos,
        ))
    }

    fn read_string(&mut self, start_pos: usize) -> Result<String, ScummError> {
        let mut value = String::new();

        while let Some(ch) = self.current_char {
            match ch {
                '"' => {
                    self.advance();
                    return Ok(value);
                }
                '\\' => {
                    value.push(ch);
                    self.advance();
                    match self.current_char {
                        Some(escaped) => {
                            value.push(escaped);
                            self.advance();
                        }
                        None => return Err(ScummError::UnterminatedString(start_pos)),
                    }
                }
                '\n' => return Err(ScummError::UnterminatedString(start_pos)),
                ch => {
                    value.push(ch);
                    self.advance();
                }
            }
        }

        Err(ScummError::UnterminatedString(start_pos))
    }

    fn read_number(&mut self) -> Result<i64, ScummError> {
        let start = self.position;
        let mut value = String::new();
        let mut radix = 10;

        if self.current_char == Some('0')
            && matches!(self.input.get(self.position + 1), Some('x') | Some('X'))
        {
            self.advance();
            self.advance();
            radix = 16;
        }

        while let Some(ch) = self.current_char {
            if ch.is_digit(radix) {
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        i64::from_str_radix(&value, radix)
            .map_err(|_| ScummError::LexicalError("Invalid number".to_string(), start))
    }

    fn read_identifier(&mut self) -> String {
        let mut value = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' {
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        value
    }
}

fn keyword_or_identifier(identifier: String) -> TokenKind {
    match identifier.as_str() {
        "goto" => TokenKind::Goto,
        "unless" => TokenKind::Unless,
        "Var" => TokenKind::Var,
        "Local" => TokenKind::Local,
        "Bit" => TokenKind::Bit,
        _ => TokenKind::Identifier(identifier),
    }
}

#[cfg(test)]
#[path = "lexer_tests.rs"]
mod tests;
