//! Tokenizer for Jack source.
//!
//! Works line by line. Each line is split on whitespace that is not inside
//! a string constant, each piece is split again around single-character
//! symbols, and every resulting fragment is classified. Comments must be
//! gone before a line gets here; `tokenize` takes care of that for whole
//! files.

use crate::error::CoreError;

/// Reserved words of the language.
pub const KEYWORDS: &[&str] = &[
    "class",
    "constructor",
    "function",
    "method",
    "field",
    "static",
    "var",
    "int",
    "char",
    "boolean",
    "void",
    "true",
    "false",
    "null",
    "this",
    "let",
    "do",
    "if",
    "else",
    "while",
    "return",
];

/// Single-character symbols. None of them needs surrounding whitespace.
pub const SYMBOLS: &[char] = &[
    '{', '}', '(', ')', '[', ']', '.', ',', ';', '+', '-', '*', '/', '&', '|', '<', '>', '=', '~',
];

/// Largest integer constant the target machine can push.
pub const MAX_INT_CONSTANT: u32 = 32767;

/// Lexical class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Symbol,
    Identifier,
    IntConstant,
    StringConstant,
}

impl TokenKind {
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Keyword => "keyword",
            TokenKind::Symbol => "symbol",
            TokenKind::Identifier => "identifier",
            TokenKind::IntConstant => "integer constant",
            TokenKind::StringConstant => "string constant",
        }
    }
}

/// A classified token.
///
/// `text` is the raw source slice, so string constants keep their quotes.
/// `line` is 1-based and only used for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            line,
        }
    }

    /// Contents of a string constant without the surrounding quotes.
    /// Other kinds return their text unchanged.
    pub fn string_value(&self) -> &str {
        match self.kind {
            TokenKind::StringConstant => &self.text[1..self.text.len() - 1],
            _ => &self.text,
        }
    }

    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text == text
    }
}

/// Strip comments and tokenize a whole source file.
pub fn tokenize(source: &str) -> Result<Vec<Token>, CoreError> {
    let stripped = strip_comments(source);
    let mut tokens = Vec::new();
    for (index, line) in stripped.lines().enumerate() {
        tokens.extend(tokenize_line(line, index + 1)?);
    }
    log::trace!("tokenized {} tokens", tokens.len());
    Ok(tokens)
}

/// Tokenize one comment-free line.
pub fn tokenize_line(line: &str, line_number: usize) -> Result<Vec<Token>, CoreError> {
    let mut tokens = Vec::new();
    for piece in split_whitespace(line) {
        for fragment in split_symbols(piece) {
            tokens.push(classify(fragment, line_number)?);
        }
    }
    Ok(tokens)
}

/// Remove `//` and `/* */` comments. Comment markers inside string
/// constants are left alone, and newlines inside block comments survive so
/// that line numbers stay put.
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut in_string = false;

    while let Some(ch) = chars.next() {
        if in_string {
            out.push(ch);
            if ch == '"' || ch == '\n' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            '/' if chars.peek() == Some(&'/') => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                    }
                    if previous == '*' && next == '/' {
                        break;
                    }
                    previous = next;
                }
                out.push(' ');
            }
            _ => out.push(ch),
        }
    }
    out
}

fn split_whitespace(line: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = None;
    let mut in_string = false;

    for (index, ch) in line.char_indices() {
        if ch == '"' {
            in_string = !in_string;
        }
        if ch.is_whitespace() && !in_string {
            if let Some(begin) = start.take() {
                pieces.push(&line[begin..index]);
            }
        } else if start.is_none() {
            start = Some(index);
        }
    }
    if let Some(begin) = start {
        pieces.push(&line[begin..]);
    }
    pieces
}

fn split_symbols(piece: &str) -> Vec<&str> {
    let mut fragments = Vec::new();
    let mut start = 0;
    let mut in_string = false;

    for (index, ch) in piece.char_indices() {
        if ch == '"' {
            if in_string {
                fragments.push(&piece[start..=index]);
                start = index + 1;
            } else {
                if start < index {
                    fragments.push(&piece[start..index]);
                }
                start = index;
            }
            in_string = !in_string;
            continue;
        }
        if !in_string && is_symbol(ch) {
            if start < index {
                fragments.push(&piece[start..index]);
            }
            let end = index + ch.len_utf8();
            fragments.push(&piece[index..end]);
            start = end;
        }
    }
    if start < piece.len() {
        fragments.push(&piece[start..]);
    }
    fragments
}

/// Keyword, then symbol, then integer, then string, then identifier.
fn classify(text: &str, line: usize) -> Result<Token, CoreError> {
    if KEYWORDS.contains(&text) {
        return Ok(Token::new(TokenKind::Keyword, text, line));
    }
    let mut chars = text.chars();
    if let (Some(first), None) = (chars.next(), chars.next()) {
        if is_symbol(first) {
            return Ok(Token::new(TokenKind::Symbol, text, line));
        }
    }
    if text.bytes().all(|b| b.is_ascii_digit()) {
        return match text.parse::<u32>() {
            Ok(value) if value <= MAX_INT_CONSTANT => {
                Ok(Token::new(TokenKind::IntConstant, text, line))
            }
            _ => Err(invalid(
                text,
                line,
                format!("integer constant exceeds {MAX_INT_CONSTANT}"),
            )),
        };
    }
    if text.starts_with('"') {
        if is_string_constant(text) {
            return Ok(Token::new(TokenKind::StringConstant, text, line));
        }
        return Err(invalid(text, line, "unterminated string constant"));
    }
    if is_identifier(text) {
        return Ok(Token::new(TokenKind::Identifier, text, line));
    }
    Err(invalid(text, line, "unrecognized character sequence"))
}

fn invalid(text: &str, line: usize, reason: impl Into<String>) -> CoreError {
    CoreError::InvalidToken {
        line,
        text: text.to_string(),
        reason: reason.into(),
    }
}

fn is_symbol(ch: char) -> bool {
    SYMBOLS.contains(&ch)
}

fn is_string_constant(text: &str) -> bool {
    text.len() >= 2
        && text.starts_with('"')
        && text.ends_with('"')
        && !text[1..text.len() - 1].contains(['"', '\n'])
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if is_ident_start(first) => chars.all(is_ident_continue),
        _ => false,
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}
