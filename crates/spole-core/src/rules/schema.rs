use serde::{Deserialize, Serialize};
use std::fmt;

/// A set of label rules mapping report labels to record fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSetDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: String,
    pub rules: Vec<LabelRuleDef>,
}

/// A single label rule: when `pattern` matches a line, extract a value with
/// `policy` and store it in `field`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRuleDef {
    /// Case-insensitive regular expression matched against the line text.
    pub pattern: String,
    pub field: FieldSlot,
    pub policy: ValuePolicy,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuePolicy {
    /// The first value after the label on the same line.
    Trailing,
    /// Up to three values, one per winding column.
    PerWinding,
    /// Every number after the label.
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Numeric,
    Text,
    Enum,
    NumericList,
}

/// A named destination for an extracted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSlot {
    Winding(WindingField),
    Core(CoreField),
    Tank(TankField),
    Document(DocumentField),
}

impl FieldSlot {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldSlot::Winding(f) => f.kind(),
            FieldSlot::Core(f) => f.kind(),
            FieldSlot::Tank(_) => FieldKind::Numeric,
            FieldSlot::Document(f) => f.kind(),
        }
    }
}

impl fmt::Display for FieldSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSlot::Winding(w) => write!(f, "winding.{}", w.as_str()),
            FieldSlot::Core(c) => write!(f, "core.{}", c.as_str()),
            FieldSlot::Tank(t) => write!(f, "tank.{}", t.as_str()),
            FieldSlot::Document(d) => write!(f, "document.{}", d.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindingField {
    Type,
    RatedTurns,
    MaxTurns,
    MinTurns,
    DiscVal,
    LyrsVal,
    KsCircle,
    KsWidth,
    KsThk,
    Id,
    Od,
    MeanTurn,
    LineVoltage,
    CoilVoltage,
    TotalLoss,
    PaperInsul,
    BareThk,
    BareWidth,
    Radial,
    I2r,
    WattsOa,
    WattsMax,
    GradOa,
    GradMax,
    SGradOa,
    SGradMax,
    PullsW,
    PullsH,
    Strands,
    ParallelGroups,
    RatedAmps,
    WireSpaceMech,
    AddKsColGrp,
    DesignElecHt,
}

impl WindingField {
    /// Every field, in report order.
    pub const ALL: &[WindingField] = &[
        WindingField::Type,
        WindingField::RatedTurns,
        WindingField::MaxTurns,
        WindingField::MinTurns,
        WindingField::DiscVal,
        WindingField::LyrsVal,
        WindingField::KsCircle,
        WindingField::KsWidth,
        WindingField::KsThk,
        WindingField::Id,
        WindingField::Od,
        WindingField::MeanTurn,
        WindingField::LineVoltage,
        WindingField::CoilVoltage,
        WindingField::TotalLoss,
        WindingField::PaperInsul,
        WindingField::BareThk,
        WindingField::BareWidth,
        WindingField::Radial,
        WindingField::I2r,
        WindingField::WattsOa,
        WindingField::WattsMax,
        WindingField::GradOa,
        WindingField::GradMax,
        WindingField::SGradOa,
        WindingField::SGradMax,
        WindingField::PullsW,
        WindingField::PullsH,
        WindingField::Strands,
        WindingField::ParallelGroups,
        WindingField::RatedAmps,
        WindingField::WireSpaceMech,
        WindingField::AddKsColGrp,
        WindingField::DesignElecHt,
    ];

    pub fn kind(&self) -> FieldKind {
        match self {
            WindingField::Type => FieldKind::Enum,
            WindingField::KsThk | WindingField::LineVoltage | WindingField::CoilVoltage => {
                FieldKind::Text
            }
            _ => FieldKind::Numeric,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WindingField::Type => "type",
            WindingField::RatedTurns => "rated_turns",
            WindingField::MaxTurns => "max_turns",
            WindingField::MinTurns => "min_turns",
            WindingField::DiscVal => "disc_val",
            WindingField::LyrsVal => "lyrs_val",
            WindingField::KsCircle => "ks_circle",
            WindingField::KsWidth => "ks_width",
            WindingField::KsThk => "ks_thk",
            WindingField::Id => "id",
            WindingField::Od => "od",
            WindingField::MeanTurn => "mean_turn",
            WindingField::LineVoltage => "line_voltage",
            WindingField::CoilVoltage => "coil_voltage",
            WindingField::TotalLoss => "total_loss",
            WindingField::PaperInsul => "paper_insul",
            WindingField::BareThk => "bare_thk",
            WindingField::BareWidth => "bare_width",
            WindingField::Radial => "radial",
            WindingField::I2r => "i2r",
            WindingField::WattsOa => "watts_oa",
            WindingField::WattsMax => "watts_max",
            WindingField::GradOa => "grad_oa",
            WindingField::GradMax => "grad_max",
            WindingField::SGradOa => "s_grad_oa",
            WindingField::SGradMax => "s_grad_max",
            WindingField::PullsW => "pulls_w",
            WindingField::PullsH => "pulls_h",
            WindingField::Strands => "strands",
            WindingField::ParallelGroups => "parallel_groups",
            WindingField::RatedAmps => "rated_amps",
            WindingField::WireSpaceMech => "wire_space_mech",
            WindingField::AddKsColGrp => "add_ks_col_grp",
            WindingField::DesignElecHt => "design_elec_ht",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoreField {
    Weight,
    FluxDen,
    FeCircle,
    WindowHt,
    WindowWidth,
    LegCenter,
    CoreLength,
    CoreHt,
    LamWidth,
    CoreGrade,
}

impl CoreField {
    /// Every field, in report order.
    pub const ALL: &[CoreField] = &[
        CoreField::Weight,
        CoreField::FluxDen,
        CoreField::FeCircle,
        CoreField::WindowHt,
        CoreField::WindowWidth,
        CoreField::LegCenter,
        CoreField::CoreLength,
        CoreField::CoreHt,
        CoreField::LamWidth,
        CoreField::CoreGrade,
    ];

    pub fn kind(&self) -> FieldKind {
        match self {
            CoreField::CoreGrade => FieldKind::Text,
            _ => FieldKind::Numeric,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CoreField::Weight => "weight",
            CoreField::FluxDen => "flux_den",
            CoreField::FeCircle => "fe_circle",
            CoreField::WindowHt => "window_ht",
            CoreField::WindowWidth => "window_width",
            CoreField::LegCenter => "leg_center",
            CoreField::CoreLength => "core_length",
            CoreField::CoreHt => "core_ht",
            CoreField::LamWidth => "lam_width",
            CoreField::CoreGrade => "core_grade",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TankField {
    ClearanceRight,
    ClearanceLeft,
    ClearanceFront,
    ClearanceBack,
    Width,
    Depth,
    Height,
}

impl TankField {
    /// Every field, in report order.
    pub const ALL: &[TankField] = &[
        TankField::ClearanceRight,
        TankField::ClearanceLeft,
        TankField::ClearanceFront,
        TankField::ClearanceBack,
        TankField::Width,
        TankField::Depth,
        TankField::Height,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TankField::ClearanceRight => "clearance_right",
            TankField::ClearanceLeft => "clearance_left",
            TankField::ClearanceFront => "clearance_front",
            TankField::ClearanceBack => "clearance_back",
            TankField::Width => "width",
            TankField::Depth => "depth",
            TankField::Height => "height",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentField {
    Mva,
    MaxMva,
    KvaRatings,
    VoltsPerTurn,
    PercentZ,
    BracketWdgSpace,
    BracketTop,
    BracketBottom,
    KeepBack,
    NllExp,
}

impl DocumentField {
    /// Every field, in report order.
    pub const ALL: &[DocumentField] = &[
        DocumentField::Mva,
        DocumentField::MaxMva,
        DocumentField::KvaRatings,
        DocumentField::VoltsPerTurn,
        DocumentField::PercentZ,
        DocumentField::BracketWdgSpace,
        DocumentField::BracketTop,
        DocumentField::BracketBottom,
        DocumentField::KeepBack,
        DocumentField::NllExp,
    ];

    pub fn kind(&self) -> FieldKind {
        match self {
            DocumentField::KvaRatings => FieldKind::NumericList,
            DocumentField::NllExp => FieldKind::Text,
            _ => FieldKind::Numeric,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentField::Mva => "mva",
            DocumentField::MaxMva => "max_mva",
            DocumentField::KvaRatings => "kva_ratings",
            DocumentField::VoltsPerTurn => "volts_per_turn",
            DocumentField::PercentZ => "percent_z",
            DocumentField::BracketWdgSpace => "bracket_wdg_space",
            DocumentField::BracketTop => "bracket_top",
            DocumentField::BracketBottom => "bracket_bottom",
            DocumentField::KeepBack => "keep_back",
            DocumentField::NllExp => "nll_exp",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_slot_json_shape() {
        let slot: FieldSlot = serde_json::from_str(r#"{ "winding": "s_grad_oa" }"#).unwrap();
        assert_eq!(slot, FieldSlot::Winding(WindingField::SGradOa));
        assert_eq!(slot.to_string(), "winding.s_grad_oa");
    }

    #[test]
    fn test_as_str_matches_serde_names() {
        for field in WindingField::ALL {
            let json = serde_json::to_string(field).unwrap();
            assert_eq!(json, format!("\"{}\"", field.as_str()));
        }
        for field in CoreField::ALL {
            let json = serde_json::to_string(field).unwrap();
            assert_eq!(json, format!("\"{}\"", field.as_str()));
        }
        for field in TankField::ALL {
            let json = serde_json::to_string(field).unwrap();
            assert_eq!(json, format!("\"{}\"", field.as_str()));
        }
        for field in DocumentField::ALL {
            let json = serde_json::to_string(field).unwrap();
            assert_eq!(json, format!("\"{}\"", field.as_str()));
        }
        assert_eq!(WindingField::ALL.len(), 34);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(FieldSlot::Winding(WindingField::Type).kind(), FieldKind::Enum);
        assert_eq!(FieldSlot::Core(CoreField::CoreGrade).kind(), FieldKind::Text);
        assert_eq!(
            FieldSlot::Document(DocumentField::KvaRatings).kind(),
            FieldKind::NumericList
        );
        assert_eq!(FieldSlot::Tank(TankField::Depth).kind(), FieldKind::Numeric);
    }
}
