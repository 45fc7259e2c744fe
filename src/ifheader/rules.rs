use std::collections::BTreeSet;

use super::parser::IfEvent;

/// Which resource a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleTarget {
    /// Untagged header: applies to any resource (`*`).
    Any,
    /// Tagged header: applies to the resource named by the tag.
    Tagged(String),
}

/// One parenthesized list, folded into four buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionSet {
    pub required_tokens: BTreeSet<String>,
    pub forbidden_tokens: BTreeSet<String>,
    pub required_etags: BTreeSet<String>,
    pub forbidden_etags: BTreeSet<String>,
}

impl ConditionSet {
    pub fn is_empty(&self) -> bool {
        self.required_tokens.is_empty()
            && self.forbidden_tokens.is_empty()
            && self.required_etags.is_empty()
            && self.forbidden_etags.is_empty()
    }
}

/// A target plus its lists. The lists are alternatives: the rule
/// holds if any one of them holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub target: RuleTarget,
    pub conditions: Vec<ConditionSet>,
}

/// Folds parser events into rules.
#[derive(Debug, Default)]
pub struct RuleBuilder {
    rules: Vec<Rule>,
    list: Option<ConditionSet>,
    negate: bool,
}

impl RuleBuilder {
    pub fn new() -> RuleBuilder {
        RuleBuilder::default()
    }

    pub fn feed(&mut self, event: IfEvent) {
        match event {
            IfEvent::ResourceTag(name) => {
                self.rules.push(Rule {
                    target: RuleTarget::Tagged(name.to_string()),
                    conditions: Vec::new(),
                });
            }
            IfEvent::StartList => {
                if self.rules.is_empty() {
                    self.rules.push(Rule {
                        target: RuleTarget::Any,
                        conditions: Vec::new(),
                    });
                }
                self.list = Some(ConditionSet::default());
                self.negate = false;
            }
            IfEvent::Not => self.negate = true,
            IfEvent::StateToken(token) => {
                let negate = std::mem::take(&mut self.negate);
                if let Some(list) = self.list.as_mut() {
                    let bucket = if negate {
                        &mut list.forbidden_tokens
                    } else {
                        &mut list.required_tokens
                    };
                    bucket.insert(token.to_string());
                }
            }
            IfEvent::ETag(etag) => {
                let negate = std::mem::take(&mut self.negate);
                if let Some(list) = self.list.as_mut() {
                    let bucket = if negate {
                        &mut list.forbidden_etags
                    } else {
                        &mut list.required_etags
                    };
                    bucket.insert(etag.to_string());
                }
            }
            IfEvent::EndList => {
                // an empty list grants nothing, so it is not kept.
                if let Some(list) = self.list.take().filter(|l| !l.is_empty()) {
                    if let Some(rule) = self.rules.last_mut() {
                        rule.conditions.push(list);
                    }
                }
            }
            IfEvent::End => {
                self.rules.retain(|r| !r.conditions.is_empty());
            }
        }
    }

    pub fn build(self) -> Vec<Rule> {
        self.rules
    }
}
