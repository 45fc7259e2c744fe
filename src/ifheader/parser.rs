use super::scanner::Scanner;
use super::SyntaxError;

/// Parse events, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IfEvent<'a> {
    ResourceTag(&'a str),
    StartList,
    Not,
    StateToken(&'a str),
    ETag(&'a str),
    EndList,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    BeforeList,
    InList,
    AfterNot,
    AfterList,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form {
    Tagged,
    Untagged,
}

/// Recursive-descent parser for the `If` header, driven as a state
/// machine so that it can hand out events one by one.
///
/// The iterator yields `Ok(IfEvent::End)` or a single `Err` as its
/// last item.
#[derive(Debug, Clone)]
pub struct IfParser<'a> {
    scanner: Scanner<'a>,
    state: State,
    form: Option<Form>,
    opened: bool,
}

impl<'a> IfParser<'a> {
    pub fn new(header: &'a str) -> IfParser<'a> {
        IfParser {
            scanner: Scanner::new(header),
            state: State::Start,
            form: None,
            opened: false,
        }
    }

    fn error(&self, msg: &'static str) -> SyntaxError {
        SyntaxError::new(self.scanner.position(), msg, !self.opened)
    }

    // ResourceTag := '<' AnyCharsExcept('>') '>'
    fn resource_tag(&mut self) -> Result<IfEvent<'a>, SyntaxError> {
        self.scanner.advance();
        match self.scanner.take_until('>') {
            Some(tag) => {
                self.opened = true;
                self.state = State::BeforeList;
                Ok(IfEvent::ResourceTag(tag))
            }
            None => Err(self.error("unterminated resource tag")),
        }
    }

    // StateToken := '<' AnyCharsExcept('>') '>'
    // ETag       := '[' AnyCharsExcept(']') ']'
    fn condition(&mut self) -> Result<IfEvent<'a>, SyntaxError> {
        let etag = self.scanner.current() == Some('[');
        self.scanner.advance();
        let value = match self.scanner.take_until(if etag { ']' } else { '>' }) {
            Some(v) => v,
            None if etag => return Err(self.error("unterminated entity tag")),
            None => return Err(self.error("unterminated state token")),
        };
        if value == "*" || value == "." {
            return Err(self.error("reserved value in condition"));
        }
        self.state = State::InList;
        Ok(if etag {
            IfEvent::ETag(value)
        } else {
            IfEvent::StateToken(value)
        })
    }

    fn step(&mut self) -> Option<Result<IfEvent<'a>, SyntaxError>> {
        let res = match self.state {
            State::Done => return None,
            State::Start => {
                self.scanner.skip_ws();
                match self.scanner.current() {
                    None => Ok(IfEvent::End),
                    Some('<') => {
                        self.form = Some(Form::Tagged);
                        self.resource_tag()
                    }
                    Some('(') => {
                        self.form = Some(Form::Untagged);
                        self.state = State::BeforeList;
                        return self.step();
                    }
                    Some(_) => Err(self.error("expected '<' or '('")),
                }
            }
            State::BeforeList => {
                self.scanner.skip_ws();
                if self.scanner.accept('(') {
                    self.opened = true;
                    self.state = State::InList;
                    Ok(IfEvent::StartList)
                } else if self.scanner.at_end() {
                    Err(self.error("resource tag without list"))
                } else {
                    Err(self.error("expected '('"))
                }
            }
            State::InList => {
                self.scanner.skip_ws();
                match self.scanner.current() {
                    None => Err(self.error("unterminated list")),
                    Some(')') => {
                        self.scanner.advance();
                        self.state = State::AfterList;
                        Ok(IfEvent::EndList)
                    }
                    Some('N') => {
                        if self.scanner.accept_literal("Not") {
                            self.scanner.skip_ws();
                            self.state = State::AfterNot;
                            Ok(IfEvent::Not)
                        } else {
                            Err(self.error("expected 'Not'"))
                        }
                    }
                    Some('<') | Some('[') => self.condition(),
                    Some(_) => Err(self.error("unexpected character in list")),
                }
            }
            State::AfterNot => match self.scanner.current() {
                Some('<') | Some('[') => self.condition(),
                _ => Err(self.error("'Not' must be followed by a state token or entity tag")),
            },
            State::AfterList => {
                self.scanner.skip_ws();
                match self.scanner.current() {
                    None => Ok(IfEvent::End),
                    Some('(') => {
                        self.state = State::BeforeList;
                        return self.step();
                    }
                    Some('<') if self.form == Some(Form::Tagged) => self.resource_tag(),
                    Some('<') => Err(self.error("resource tag in untagged header")),
                    Some(_) => Err(self.error("unexpected character after list")),
                }
            }
        };
        Some(res)
    }
}

impl<'a> Iterator for IfParser<'a> {
    type Item = Result<IfEvent<'a>, SyntaxError>;

    fn next(&mut self) -> Option<Self::Item> {
        let res = self.step();
        if matches!(res, Some(Err(_)) | Some(Ok(IfEvent::End))) {
            self.state = State::Done;
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_order() {
        let ev: Vec<_> = IfParser::new("<http://a/b> (Not <urn:x> [\"e\"])")
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            ev,
            vec![
                IfEvent::ResourceTag("http://a/b"),
                IfEvent::StartList,
                IfEvent::Not,
                IfEvent::StateToken("urn:x"),
                IfEvent::ETag("\"e\""),
                IfEvent::EndList,
                IfEvent::End,
            ]
        );
    }

    #[test]
    fn test_stops_after_error() {
        let mut p = IfParser::new("(<urn:x> ?)");
        assert_eq!(p.next(), Some(Ok(IfEvent::StartList)));
        assert_eq!(p.next(), Some(Ok(IfEvent::StateToken("urn:x"))));
        let err = p.next().unwrap().unwrap_err();
        assert_eq!(err.pos, 9);
        assert_eq!(p.next(), None);
    }

    #[test]
    fn test_empty() {
        let ev: Vec<_> = IfParser::new(" ").collect();
        assert_eq!(ev, vec![Ok(IfEvent::End)]);
    }
}
