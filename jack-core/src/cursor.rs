//! Read position over a token slice.
//!
//! A `Cursor` is `Copy`: grammar rules receive one and hand back a new one,
//! so abandoning an alternative is just dropping the returned cursor.
//! Running past the last token yields the end-of-input sentinel (`None`).

use crate::lexer::Token;

#[derive(Debug, Clone, Copy)]
pub struct Cursor<'t> {
    tokens: &'t [Token],
    position: usize,
}

impl<'t> Cursor<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Cursor {
            tokens,
            position: 0,
        }
    }

    /// The next token, or `None` at end of input.
    pub fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.position)
    }

    /// Cursor one token further along. Stays on the sentinel once there.
    pub fn advance(self) -> Self {
        Cursor {
            tokens: self.tokens,
            position: (self.position + 1).min(self.tokens.len()),
        }
    }

    pub fn is_at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::TokenKind;

    #[test]
    fn advancing_never_passes_the_sentinel() {
        let tokens = vec![Token::new(TokenKind::Identifier, "x", 1)];
        let start = Cursor::new(&tokens);
        assert_eq!(start.peek().map(|token| token.text.as_str()), Some("x"));

        let end = start.advance();
        assert!(end.is_at_end());
        assert!(end.peek().is_none());
        assert_eq!(end.advance().position(), 1);

        // advancing returns a new cursor; `start` is unchanged
        assert_eq!(start.position(), 0);
    }
}
