pub mod builtin;
pub mod schema;

use crate::error::SpoleError;
use regex::{Regex, RegexBuilder};
use schema::{FieldKind, FieldSlot, LabelRuleDef, RuleSetDef, ValuePolicy};
use std::path::Path;

/// Load a ruleset from a JSON file.
pub fn load_ruleset(path: &Path) -> Result<RuleSetDef, SpoleError> {
    let content = std::fs::read_to_string(path).map_err(|e| SpoleError::RulesetLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_ruleset(&content, path)
}

/// Parse a ruleset from a JSON string.
pub fn parse_ruleset(json: &str, source: &Path) -> Result<RuleSetDef, SpoleError> {
    let ruleset: RuleSetDef = serde_json::from_str(json).map_err(|e| SpoleError::RulesetLoad {
        path: source.to_path_buf(),
        reason: e.to_string(),
    })?;
    validate_ruleset(&ruleset)?;
    Ok(ruleset)
}

/// Parse a ruleset from a JSON string (no file path context).
pub fn parse_ruleset_str(json: &str) -> Result<RuleSetDef, SpoleError> {
    let ruleset: RuleSetDef = serde_json::from_str(json).map_err(SpoleError::Json)?;
    validate_ruleset(&ruleset)?;
    Ok(ruleset)
}

/// Validate that a ruleset is well-formed.
pub fn validate_ruleset(ruleset: &RuleSetDef) -> Result<(), SpoleError> {
    if ruleset.name.trim().is_empty() {
        return Err(SpoleError::RulesetInvalid(
            "ruleset name must not be empty".into(),
        ));
    }

    if ruleset.rules.is_empty() {
        return Err(SpoleError::RulesetInvalid("rules must not be empty".into()));
    }

    for rule in &ruleset.rules {
        validate_rule(rule)?;
    }

    Ok(())
}

fn validate_rule(rule: &LabelRuleDef) -> Result<(), SpoleError> {
    if rule.pattern.trim().is_empty() {
        return Err(SpoleError::RulesetInvalid(format!(
            "rule for '{}' has an empty pattern",
            rule.field
        )));
    }

    let regex = compile_pattern(&rule.pattern)?;
    if regex.is_match("") {
        return Err(SpoleError::RulesetInvalid(format!(
            "pattern '{}' matches the empty string",
            rule.pattern
        )));
    }

    let compatible = match (rule.policy, rule.field) {
        (ValuePolicy::PerWinding, FieldSlot::Winding(_)) => true,
        (_, FieldSlot::Winding(_)) => false,
        (ValuePolicy::List, slot) => slot.kind() == FieldKind::NumericList,
        (ValuePolicy::Trailing, slot) => slot.kind() != FieldKind::NumericList,
        (ValuePolicy::PerWinding, _) => false,
    };
    if !compatible {
        return Err(SpoleError::RulesetInvalid(format!(
            "policy '{:?}' cannot fill field '{}'",
            rule.policy, rule.field
        )));
    }

    Ok(())
}

fn compile_pattern(pattern: &str) -> Result<Regex, SpoleError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| SpoleError::RulesetInvalid(format!("invalid pattern '{pattern}': {e}")))
}

/// A label rule with its pattern compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub regex: Regex,
    pub field: FieldSlot,
    pub policy: ValuePolicy,
}

/// The best rule match on a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleMatch {
    pub rule: usize,
    pub start: usize,
    pub end: usize,
}

/// An ordered, compiled rule table. Earlier rules win ties.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<CompiledRule>,
}

impl RuleTable {
    /// Validate and compile rulesets, keeping their order.
    pub fn compile(rulesets: &[RuleSetDef]) -> Result<Self, SpoleError> {
        let mut table = RuleTable::default();
        for ruleset in rulesets {
            validate_ruleset(ruleset)?;
            table.push_rules(&ruleset.rules)?;
        }
        Ok(table)
    }

    /// User rules followed by the built-in table.
    pub fn with_extra_rules(extra: &[LabelRuleDef]) -> Result<Self, SpoleError> {
        let mut table = RuleTable::default();
        for rule in extra {
            validate_rule(rule)?;
        }
        table.push_rules(extra)?;
        table.rules.extend(builtin::builtin_table().rules.iter().cloned());
        Ok(table)
    }

    fn push_rules(&mut self, rules: &[LabelRuleDef]) -> Result<(), SpoleError> {
        for rule in rules {
            self.rules.push(CompiledRule {
                regex: compile_pattern(&rule.pattern)?,
                field: rule.field,
                policy: rule.policy,
            });
        }
        Ok(())
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The rule with the longest match on `text`; ties go to the earlier rule.
    pub fn best_match(&self, text: &str) -> Option<RuleMatch> {
        let mut best: Option<RuleMatch> = None;
        for (idx, rule) in self.rules.iter().enumerate() {
            let Some(m) = rule.regex.find(text) else {
                continue;
            };
            if m.is_empty() {
                continue;
            }
            let longer = best.is_none_or(|b| m.len() > b.end - b.start);
            if longer {
                best = Some(RuleMatch {
                    rule: idx,
                    start: m.start(),
                    end: m.end(),
                });
            }
        }
        best
    }
}
