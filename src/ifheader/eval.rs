use super::rules::{ConditionSet, Rule, RuleTarget};
use crate::davpath;
use crate::errors::DavError;
use crate::fs::DavResource;
use crate::DavResult;

// strip weak marker and quotes.
fn bare_etag(etag: &str) -> &str {
    let etag = etag.trim();
    let etag = etag.strip_prefix("W/").unwrap_or(etag);
    etag.strip_prefix('"')
        .and_then(|e| e.strip_suffix('"'))
        .unwrap_or(etag)
}

fn etag_in(set: &std::collections::BTreeSet<String>, etag: Option<&str>) -> bool {
    match etag {
        Some(etag) => {
            let etag = bare_etag(etag);
            set.iter().any(|e| bare_etag(e) == etag)
        }
        None => false,
    }
}

fn token_in(set: &std::collections::BTreeSet<String>, token: Option<&str>) -> bool {
    token.map(|t| set.contains(t)).unwrap_or(false)
}

impl ConditionSet {
    /// Does a resource with this etag and lock token satisfy the list.
    pub fn matches(&self, etag: Option<&str>, token: Option<&str>) -> bool {
        !etag_in(&self.forbidden_etags, etag)
            && !token_in(&self.forbidden_tokens, token)
            && (self.required_tokens.is_empty() || token_in(&self.required_tokens, token))
            && (self.required_etags.is_empty() || etag_in(&self.required_etags, etag))
    }
}

impl Rule {
    /// Does this rule address the resource with this name.
    pub fn applies_to(&self, name: &str) -> bool {
        match &self.target {
            RuleTarget::Any => true,
            RuleTarget::Tagged(tag) => tag == name || davpath::same_resource(tag, name),
        }
    }

    // first list that holds wins and supplies the token.
    fn satisfied_by(&self, res: &DavResource) -> Option<Option<String>> {
        let token = res.lock().map(|l| l.token.as_str());
        self.conditions
            .iter()
            .find(|c| c.matches(res.etag(), token))
            .map(|_| token.map(|t| t.to_string()))
    }
}

fn match_resource<'r>(rules: &'r [Rule], res: &DavResource) -> Option<&'r Rule> {
    rules.iter().find(|r| r.applies_to(res.name()))
}

/// Evaluate rules against the candidate resources.
///
/// Untagged rules are a disjunction over the resources, tagged rules a
/// conjunction. A resource that no rule addresses passes. On success,
/// returns the lock token of the resource that satisfied the rules,
/// which is `None` if that resource is not locked.
pub fn evaluate(rules: &[Rule], resources: &[&DavResource]) -> DavResult<Option<String>> {
    if rules.is_empty() {
        return Err(DavError::NoRules);
    }

    if rules[0].target == RuleTarget::Any {
        for res in resources {
            if let Some(token) = match_resource(rules, res).and_then(|r| r.satisfied_by(res)) {
                trace!("if: untagged rule satisfied by {}", res.name());
                return Ok(token);
            }
        }
        return Err(DavError::PreconditionFailed);
    }

    let mut resolved = None;
    for res in resources {
        let rule = match match_resource(rules, res) {
            Some(rule) => rule,
            None => {
                trace!("if: no rule for {}, passing", res.name());
                continue;
            }
        };
        match rule.satisfied_by(res) {
            Some(token) => resolved = token,
            None => {
                trace!("if: tagged rule failed for {}", res.name());
                return Err(DavError::PreconditionFailed);
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ifheader::parse;
    use crate::lock::{Lock, LockDepth, LockScope};
    use crate::DavPath;

    fn resource(name: &str, etag: Option<&str>, token: Option<&str>) -> DavResource {
        let mut res = DavResource::new(name, name.ends_with('/'), etag.map(String::from));
        if let Some(token) = token {
            let path = DavPath::new(name).unwrap();
            let mut lock = Lock::new(path, LockScope::Exclusive, LockDepth::Zero, None, None, None);
            lock.token = token.to_string();
            res.set_locks(vec![lock]);
        }
        res
    }

    #[test]
    fn test_empty_rules_fail() {
        let res = resource("/a", None, None);
        assert!(matches!(evaluate(&[], &[&res]), Err(DavError::NoRules)));
    }

    #[test]
    fn test_required_token() {
        let rules = parse("(<L1>)").unwrap();
        let res = resource("/a", None, Some("L1"));
        assert_eq!(evaluate(&rules, &[&res]).unwrap(), Some("L1".to_string()));
        let res = resource("/a", None, Some("L2"));
        assert!(matches!(evaluate(&rules, &[&res]), Err(DavError::PreconditionFailed)));
        let res = resource("/a", None, None);
        assert!(evaluate(&rules, &[&res]).is_err());
    }

    #[test]
    fn test_etag_set() {
        let rules = parse("([e1] [e2])").unwrap();
        let res = resource("/a", Some("e1"), None);
        assert_eq!(evaluate(&rules, &[&res]).unwrap(), None);
        let res = resource("/a", Some("e3"), None);
        assert!(evaluate(&rules, &[&res]).is_err());
        let res = resource("/a", None, None);
        assert!(evaluate(&rules, &[&res]).is_err());
    }

    #[test]
    fn test_etag_quotes() {
        let rules = parse("([\"abc\"])").unwrap();
        let res = resource("/a", Some("W/\"abc\""), None);
        assert!(evaluate(&rules, &[&res]).is_ok());
        let res = resource("/a", Some("abc"), None);
        assert!(evaluate(&rules, &[&res]).is_ok());
    }

    #[test]
    fn test_forbidden() {
        let rules = parse("(Not <L1>)").unwrap();
        assert!(evaluate(&rules, &[&resource("/a", None, Some("L1"))]).is_err());
        assert_eq!(
            evaluate(&rules, &[&resource("/a", None, Some("L2"))]).unwrap(),
            Some("L2".to_string())
        );
        let rules = parse("(Not [e1])").unwrap();
        assert!(evaluate(&rules, &[&resource("/a", Some("e1"), None)]).is_err());
        assert!(evaluate(&rules, &[&resource("/a", None, None)]).is_ok());
    }

    #[test]
    fn test_lists_are_alternatives() {
        let rules = parse("(<L9>) ([e1])").unwrap();
        let res = resource("/a", Some("e1"), Some("L1"));
        assert_eq!(evaluate(&rules, &[&res]).unwrap(), Some("L1".to_string()));
    }

    #[test]
    fn test_untagged_any_resource() {
        let rules = parse("(<L2>)").unwrap();
        let child = resource("/dir/a", None, None);
        let parent = resource("/dir/", None, Some("L2"));
        assert_eq!(evaluate(&rules, &[&child, &parent]).unwrap(), Some("L2".to_string()));
    }

    #[test]
    fn test_tagged_unaddressed_passes() {
        let rules = parse("<resource/> (<urn:t>)").unwrap();
        let res = resource("other/", None, None);
        assert_eq!(evaluate(&rules, &[&res]).unwrap(), None);
    }

    #[test]
    fn test_tagged_all_resources() {
        let rules = parse("<http://localhost/dir/a> (<L1>) <http://localhost/dir/> (<L2>)").unwrap();
        let child = resource("/dir/a", None, Some("L1"));
        let parent = resource("/dir/", None, Some("L2"));
        assert_eq!(evaluate(&rules, &[&child, &parent]).unwrap(), Some("L2".to_string()));
        let parent = resource("/dir/", None, Some("L3"));
        assert!(evaluate(&rules, &[&child, &parent]).is_err());
    }
}
