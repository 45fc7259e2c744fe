/// Single-character cursor over an `If` header value.
///
/// There is no lookahead. The parser decides everything on the
/// current character, except for the keyword `Not`.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    input: &'a str,
    pos: usize,
    cur: Option<char>,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Scanner<'a> {
        Scanner {
            input,
            pos: 0,
            cur: input.chars().next(),
        }
    }

    /// The active character, or `None` at end of input.
    pub fn current(&self) -> Option<char> {
        self.cur
    }

    /// Move forward one character. Returns false at end of input.
    pub fn advance(&mut self) -> bool {
        if let Some(c) = self.cur {
            self.pos += c.len_utf8();
            self.cur = self.input[self.pos..].chars().next();
        }
        self.cur.is_some()
    }

    pub fn at_end(&self) -> bool {
        self.cur.is_none()
    }

    /// Byte offset of the current character.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Skip spaces and tabs.
    pub fn skip_ws(&mut self) {
        while matches!(self.cur, Some(' ') | Some('\t')) {
            self.advance();
        }
    }

    /// Consume `c` if it is the current character.
    pub fn accept(&mut self, c: char) -> bool {
        if self.cur == Some(c) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume a literal keyword, character by character. On a
    /// mismatch the cursor is left on the offending character.
    pub fn accept_literal(&mut self, lit: &str) -> bool {
        lit.chars().all(|c| self.accept(c))
    }

    /// Return everything up to `end`, and consume `end` as well.
    /// Returns `None` if `end` never shows up.
    pub fn take_until(&mut self, end: char) -> Option<&'a str> {
        let start = self.pos;
        loop {
            match self.cur {
                None => return None,
                Some(c) if c == end => {
                    let s = &self.input[start..self.pos];
                    self.advance();
                    return Some(s);
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance() {
        let mut s = Scanner::new("ab");
        assert_eq!(s.current(), Some('a'));
        assert!(s.advance());
        assert_eq!(s.current(), Some('b'));
        assert!(!s.advance());
        assert!(s.at_end());
        assert!(!s.advance());
        assert_eq!(s.position(), 2);
    }

    #[test]
    fn test_take_until() {
        let mut s = Scanner::new("urn:é>rest");
        assert_eq!(s.take_until('>'), Some("urn:é"));
        assert_eq!(s.current(), Some('r'));
        let mut s = Scanner::new("unterminated");
        assert_eq!(s.take_until('>'), None);
    }

    #[test]
    fn test_literal() {
        let mut s = Scanner::new("Not <x>");
        assert!(s.accept_literal("Not"));
        s.skip_ws();
        assert_eq!(s.current(), Some('<'));

        let mut s = Scanner::new("Nox");
        assert!(!s.accept_literal("Not"));
        assert_eq!(s.current(), Some('x'));
    }
}
