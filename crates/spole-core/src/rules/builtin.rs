use crate::error::SpoleError;
use crate::rules::schema::RuleSetDef;
use crate::rules::RuleTable;
use std::sync::LazyLock;

const TRANSFORMER_LABELS_JSON: &str = include_str!("../../../../rules/transformer-labels.json");

/// Available predefined label rule tables.
pub const PRESETS: &[&str] = &["transformer"];

static BUILTIN_TABLE: LazyLock<RuleTable> = LazyLock::new(|| {
    let ruleset = load_preset("transformer").expect("built-in label rules parse");
    RuleTable::compile(&[ruleset]).expect("built-in label rules compile")
});

/// Load a predefined ruleset by name.
pub fn load_preset(name: &str) -> Result<RuleSetDef, SpoleError> {
    match name {
        "transformer" => {
            let ruleset: RuleSetDef = serde_json::from_str(TRANSFORMER_LABELS_JSON)?;
            Ok(ruleset)
        }
        _ => Err(SpoleError::RulesetInvalid(format!(
            "unknown preset '{}'. Available: {}",
            name,
            PRESETS.join(", ")
        ))),
    }
}

/// The compiled built-in rule table, shared by every extraction.
pub fn builtin_table() -> &'static RuleTable {
    &BUILTIN_TABLE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::schema::{FieldSlot, WindingField};
    use crate::rules::validate_ruleset;

    #[test]
    fn test_load_transformer_preset() {
        let rs = load_preset("transformer").unwrap();
        assert!(!rs.rules.is_empty());
        validate_ruleset(&rs).unwrap();
    }

    #[test]
    fn test_unknown_preset() {
        assert!(load_preset("xyz").is_err());
    }

    #[test]
    fn test_builtin_table_compiles() {
        let table = builtin_table();
        assert_eq!(table.len(), load_preset("transformer").unwrap().rules.len());
    }

    fn field_of(text: &str) -> Option<FieldSlot> {
        let table = builtin_table();
        table
            .best_match(text)
            .map(|m| table.rules()[m.rule].field)
    }

    #[test]
    fn test_common_labels_resolve() {
        use crate::rules::schema::{CoreField, DocumentField, TankField};

        let cases = [
            ("rated turns", FieldSlot::Winding(WindingField::RatedTurns)),
            ("max turns", FieldSlot::Winding(WindingField::MaxTurns)),
            ("turns/disc", FieldSlot::Winding(WindingField::LyrsVal)),
            ("no. of discs", FieldSlot::Winding(WindingField::DiscVal)),
            ("i.d.", FieldSlot::Winding(WindingField::Id)),
            ("surface grad oa", FieldSlot::Winding(WindingField::SGradOa)),
            ("grad oa", FieldSlot::Winding(WindingField::GradOa)),
            ("flux den", FieldSlot::Core(CoreField::FluxDen)),
            ("core grade", FieldSlot::Core(CoreField::CoreGrade)),
            ("tank width", FieldSlot::Tank(TankField::Width)),
            ("max mva", FieldSlot::Document(DocumentField::MaxMva)),
            ("mva", FieldSlot::Document(DocumentField::Mva)),
            ("kva ratings", FieldSlot::Document(DocumentField::KvaRatings)),
            ("%z", FieldSlot::Document(DocumentField::PercentZ)),
            ("volts/turn", FieldSlot::Document(DocumentField::VoltsPerTurn)),
        ];
        for (label, expected) in cases {
            assert_eq!(field_of(label), Some(expected), "{label}");
        }
    }
}
