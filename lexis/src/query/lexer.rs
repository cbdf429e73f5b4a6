//! Lexer for query strings
//!
//! Splits a query into words, quoted phrases (with their `/n` or `~n`
//! suffix) and operators.

use super::QueryError;

pub(crate) const NOT_IN_WORD: &str = "Unexpected NOT in WORD";
pub(crate) const NOT_IN_PHRASE: &str = "Unexpected NOT in PHRASE query";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Unquoted word, anchors included (`^cat$`)
    Word(String),
    /// Quoted phrase text and its optional operator suffix
    Phrase(String, Option<PhraseSuffix>),
    /// `!` or `-` before an operand
    Not,
    /// `&`
    And,
    /// `|`
    Or,
    /// `<<`
    Before,
    LeftParen,
    RightParen,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhraseSuffix {
    /// `~n`
    Proximity(u32),
    /// `/n`
    Quorum(u32),
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Word(word) => format!("'{}'", word),
            Token::Phrase(text, _) => format!("\"{}\"", text),
            Token::Not => "NOT".to_string(),
            Token::And => "'&'".to_string(),
            Token::Or => "'|'".to_string(),
            Token::Before => "'<<'".to_string(),
            Token::LeftParen => "'('".to_string(),
            Token::RightParen => "')'".to_string(),
            Token::Eof => "end of query".to_string(),
        }
    }
}

fn syntax(message: impl Into<String>) -> QueryError {
    QueryError::Syntax(message.into())
}

fn is_not(c: char) -> bool {
    c == '!' || c == '-'
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    pub fn next_token(&mut self) -> Result<Token, QueryError> {
        self.skip_whitespace();

        let Some(ch) = self.current_char() else {
            return Ok(Token::Eof);
        };

        match ch {
            '(' => {
                self.advance();
                Ok(Token::LeftParen)
            }
            ')' => {
                self.advance();
                Ok(Token::RightParen)
            }
            '&' => {
                self.advance();
                Ok(Token::And)
            }
            '|' => {
                self.advance();
                Ok(Token::Or)
            }
            '<' if self.peek() == Some('<') => {
                self.advance();
                self.advance();
                Ok(Token::Before)
            }
            '"' => {
                self.advance();
                self.read_phrase()
            }
            _ if is_not(ch) => {
                self.advance();
                Ok(Token::Not)
            }
            _ => self.read_word(),
        }
    }

    fn is_word_end(&self) -> bool {
        match self.current_char() {
            None => true,
            Some(c) if c.is_whitespace() => true,
            Some('(' | ')' | '&' | '|' | '"') => true,
            Some('<') => self.peek() == Some('<'),
            Some(_) => false,
        }
    }

    fn read_word(&mut self) -> Result<Token, QueryError> {
        let mut word = String::new();

        while !self.is_word_end() {
            let Some(ch) = self.current_char() else { break };
            if ch == '!' {
                return Err(syntax(NOT_IN_WORD));
            }
            word.push(ch);
            self.advance();
        }

        Ok(Token::Word(word))
    }

    fn read_phrase(&mut self) -> Result<Token, QueryError> {
        let mut text = String::new();

        loop {
            match self.current_char() {
                None => return Err(syntax("Unterminated phrase")),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some(ch) => {
                    text.push(ch);
                    self.advance();
                }
            }
        }

        let negated = text
            .split_whitespace()
            .any(|word| word.starts_with(is_not) || word.contains('!'));
        if negated {
            return Err(syntax(NOT_IN_PHRASE));
        }

        let suffix = match self.current_char() {
            Some('~') => {
                self.advance();
                Some(PhraseSuffix::Proximity(self.read_count('~')?))
            }
            Some('/') => {
                self.advance();
                Some(PhraseSuffix::Quorum(self.read_count('/')?))
            }
            _ => None,
        };

        Ok(Token::Phrase(text, suffix))
    }

    fn read_count(&mut self, operator: char) -> Result<u32, QueryError> {
        let mut digits = String::new();
        while let Some(ch) = self.current_char().filter(char::is_ascii_digit) {
            digits.push(ch);
            self.advance();
        }
        digits
            .parse()
            .map_err(|_| syntax(format!("Expected a number after '{}'", operator)))
    }

    fn skip_whitespace(&mut self) {
        while self.current_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }
}
