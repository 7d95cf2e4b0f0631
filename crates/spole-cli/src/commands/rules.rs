use spole_core::error::SpoleError;
use spole_core::rules::builtin;
use spole_core::rules::schema::{FieldKind, LabelRuleDef, ValuePolicy};
use std::path::Path;

pub fn list() -> Result<(), SpoleError> {
    println!("Available predefined label rule tables:\n");
    for name in builtin::PRESETS {
        let rs = builtin::load_preset(name)?;
        println!("  {:<12} {} (v{}), {} rules", name, rs.name, rs.version, rs.rules.len());
        if let Some(ref desc) = rs.description {
            println!("               {}", desc);
        }
        println!();
    }
    Ok(())
}

pub fn show(preset: &str) -> Result<(), SpoleError> {
    let rs = builtin::load_preset(preset)?;

    println!("{} (version {})\n", rs.name, rs.version);
    if let Some(ref desc) = rs.description {
        println!("{}\n", desc);
    }
    println!("Rules are tried in order. On each line the longest label match wins;");
    println!("equal-length matches go to the earlier rule.\n");
    print_rules(&rs.rules);
    Ok(())
}

fn print_rules(rules: &[LabelRuleDef]) {
    let width = rules
        .iter()
        .map(|r| r.field.to_string().len())
        .max()
        .unwrap_or(20);

    println!(
        "  {:<width$}  {:<12}  {:<8}  Pattern",
        "Field",
        "Policy",
        "Kind",
        width = width
    );
    println!("  {}", "-".repeat(width + 2 + 12 + 2 + 8 + 2 + 30));

    for rule in rules {
        println!(
            "  {:<width$}  {:<12}  {:<8}  {}",
            rule.field.to_string(),
            policy_name(rule.policy),
            kind_name(rule.field.kind()),
            rule.pattern,
            width = width
        );
        if let Some(ref note) = rule.note {
            println!("  {:<width$}  {}", "", note, width = width + 26);
        }
    }
    println!();
}

fn policy_name(policy: ValuePolicy) -> &'static str {
    match policy {
        ValuePolicy::Trailing => "trailing",
        ValuePolicy::PerWinding => "per_winding",
        ValuePolicy::List => "list",
    }
}

fn kind_name(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Numeric => "numeric",
        FieldKind::Text => "text",
        FieldKind::Enum => "enum",
        FieldKind::NumericList => "list",
    }
}

pub fn schema() -> Result<(), SpoleError> {
    print!(
        r#"JSON Label Rule Schema
======================

A rule file maps printed labels in a design report to record fields.
Rules from files given with `spole extract --rules` are tried before
the built-in table, so they win when two labels match equally long.

Top-level fields:
  name          (string, required)  Human-readable name of the rule table
  description   (string, optional)  What this table is for
  version       (string, required)  Version identifier (e.g., "2026.1")
  rules         (array, required)   List of label rules (see below)

Each rule in the "rules" array:
  pattern       (string, required)  Regular expression, matched case-
                                    insensitively against each text line.
                                    Must not match the empty string.
  field         (object, required)  Target field, one of:
                                      {{"winding": "<name>"}}
                                      {{"core": "<name>"}}
                                      {{"tank": "<name>"}}
                                      {{"document": "<name>"}}
                                    Run `spole rules show transformer` to
                                    see every field name in use.
  policy        (string, required)  How values are read after the label:
                                      trailing     first value on the line
                                      per_winding  up to three values, one
                                                   per winding column
                                      list         every number on the line
                                    per_winding is required for winding
                                    fields; list only for list fields.
  note          (string, optional)  Free-form explanation.

Example:
{{
  "name": "Site template overrides",
  "version": "1.0",
  "rules": [
    {{
      "pattern": "\\bturns\\s+at\\s+max\\s+tap\\b",
      "field": {{ "winding": "max_turns" }},
      "policy": "per_winding"
    }},
    {{
      "pattern": "\\bsteel\\s+grade\\b",
      "field": {{ "core": "core_grade" }},
      "policy": "trailing",
      "note": "Older templates"
    }}
  ]
}}
"#
    );
    Ok(())
}

pub fn validate(file: &Path) -> Result<(), SpoleError> {
    let rs = spole_core::rules::load_ruleset(file)?;

    println!("Rule table '{}' (v{}) is valid.", rs.name, rs.version);
    println!("  Rules: {}", rs.rules.len());

    let builtin = builtin::builtin_table();
    let overridden = rs
        .rules
        .iter()
        .filter(|r| builtin.rules().iter().any(|b| b.field == r.field))
        .count();
    println!("  Fields also covered by built-in rules: {}", overridden);

    let mut warnings = Vec::new();
    for (i, rule) in rs.rules.iter().enumerate() {
        if rs.rules[..i].iter().any(|r| r.pattern == rule.pattern) {
            warnings.push(format!(
                "pattern '{}' appears more than once; only the first can match",
                rule.pattern
            ));
        }
    }

    if !warnings.is_empty() {
        println!("\nWarnings:");
        for w in &warnings {
            println!("  - {}", w);
        }
    }

    Ok(())
}
