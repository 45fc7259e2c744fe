//! The WebDAV `If` header (RFC4918 10.4).
//!
//! The header is processed in a pipeline: the [`Scanner`] walks the raw
//! string one character at a time, the [`IfParser`] turns that into a
//! stream of [`IfEvent`]s, the [`RuleBuilder`] folds the events into
//! [`Rule`]s, and [`evaluate`] decides whether a set of resources
//! satisfies them.
//!
//! ```text
//! If: <http://host/dir/> (<urn:uuid:1234> ["etag"]) (Not <urn:uuid:5678>)
//! ```
//!
//! Two forms exist. A header that starts with a resource tag is
//! "tagged", and every list that follows applies to that resource only.
//! A header that starts with a bare list is "untagged", and its lists
//! apply to whatever resource the request touches. The two forms
//! cannot be mixed.
use std::error::Error;
use std::fmt;

mod eval;
mod parser;
mod rules;
mod scanner;

pub use self::eval::evaluate;
pub use self::parser::{IfEvent, IfParser};
pub use self::rules::{ConditionSet, Rule, RuleBuilder, RuleTarget};
pub use self::scanner::Scanner;

/// Grammar violation in an `If` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// Byte offset in the header where parsing stopped.
    pub pos: usize,
    pub msg: &'static str,
    /// Set if parsing failed before a resource tag or list was opened.
    pub early: bool,
}

impl SyntaxError {
    pub(crate) fn new(pos: usize, msg: &'static str, early: bool) -> SyntaxError {
        SyntaxError { pos, msg, early }
    }
}

impl Error for SyntaxError {}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} at offset {}", self.msg, self.pos)
    }
}

/// Parse an `If` header into rules.
///
/// An empty `Vec` is a valid outcome: the header was present but
/// contained no conditions. Evaluating that always fails.
pub fn parse(header: &str) -> Result<Vec<Rule>, SyntaxError> {
    let mut builder = RuleBuilder::new();
    for event in IfParser::new(header) {
        builder.feed(event?);
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn set(v: &[&str]) -> BTreeSet<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_untagged_single_token() {
        let rules = parse("(<urn:a>)").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].target, RuleTarget::Any);
        assert_eq!(rules[0].conditions.len(), 1);
        assert_eq!(rules[0].conditions[0].required_tokens, set(&["urn:a"]));
        assert!(rules[0].conditions[0].forbidden_tokens.is_empty());
    }

    #[test]
    fn test_negated_token() {
        let rules = parse("(Not <urn:a>)").unwrap();
        let cond = &rules[0].conditions[0];
        assert_eq!(cond.forbidden_tokens, set(&["urn:a"]));
        assert!(cond.required_tokens.is_empty());
    }

    #[test]
    fn test_etags_in_one_list() {
        let rules = parse("([e1] [e2])").unwrap();
        assert_eq!(rules[0].conditions.len(), 1);
        assert_eq!(rules[0].conditions[0].required_etags, set(&["e1", "e2"]));
    }

    #[test]
    fn test_tagged() {
        let rules = parse("<resource/> (<urn:t>)").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].target, RuleTarget::Tagged("resource/".to_string()));
    }

    #[test]
    fn test_tagged_multiple() {
        let hdr = "<http://example.com/a> (<urn:1>) (Not <urn:2> [\"x\"])\t<http://example.com/b> ([\"y\"])";
        let rules = parse(hdr).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].conditions.len(), 2);
        assert_eq!(rules[0].conditions[1].forbidden_tokens, set(&["urn:2"]));
        assert_eq!(rules[0].conditions[1].required_etags, set(&["\"x\""]));
        assert_eq!(rules[1].target, RuleTarget::Tagged("http://example.com/b".to_string()));
    }

    #[test]
    fn test_no_rules() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("  \t ").unwrap().is_empty());
        assert!(parse("()").unwrap().is_empty());
        assert!(parse("( ) ()").unwrap().is_empty());
        assert!(parse("<http://example.com/a> ()").unwrap().is_empty());
    }

    #[test]
    fn test_syntax_errors() {
        for hdr in [
            "(<urn:a>",
            "(<urn:a)",
            "([etag)",
            "(Not)",
            "(Not(<urn:a>))",
            "(Nope <urn:a>)",
            "<http://example.com/a>",
            "(<urn:a>) <http://example.com/a> (<urn:b>)",
            "(<urn:a>) x",
            "(<*>)",
            "([.])",
        ] {
            let err = parse(hdr).unwrap_err();
            assert!(!err.early, "{hdr}");
        }
        let err = parse("x (<urn:a>)").unwrap_err();
        assert!(err.early);
        assert_eq!(err.pos, 0);
        assert!(parse("<http://example.com/a").unwrap_err().early);
    }

    #[test]
    fn test_idempotent() {
        let hdr = "<http://example.com/a> (<urn:1> [\"e\"]) (Not <urn:2>)";
        assert_eq!(parse(hdr).unwrap(), parse(hdr).unwrap());
    }
}
