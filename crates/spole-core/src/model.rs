use crate::parsing::values::{parse_number, round_dp};
use crate::rules::schema::{CoreField, DocumentField, TankField, WindingField};
use crate::trace::TraceBundle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of winding slots every document carries.
pub const WINDING_SLOTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindingType {
    #[serde(rename = "LV")]
    Lv,
    #[serde(rename = "HV")]
    Hv,
    #[serde(rename = "TV")]
    Tv,
    #[serde(rename = "RV")]
    Rv,
}

impl fmt::Display for WindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindingType::Lv => write!(f, "LV"),
            WindingType::Hv => write!(f, "HV"),
            WindingType::Tv => write!(f, "TV"),
            WindingType::Rv => write!(f, "RV"),
        }
    }
}

impl WindingType {
    /// "LV", "L.V.", "Low Voltage", "Tertiary", "Reg" ...
    pub fn from_str_loose(s: &str) -> Option<WindingType> {
        let compact: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '.')
            .flat_map(char::to_lowercase)
            .collect();
        if compact.starts_with("lv") || compact.starts_with("low") {
            Some(WindingType::Lv)
        } else if compact.starts_with("hv") || compact.starts_with("high") {
            Some(WindingType::Hv)
        } else if compact.starts_with("tv") || compact.starts_with("ter") {
            Some(WindingType::Tv)
        } else if compact.starts_with("rv") || compact.starts_with("reg") {
            Some(WindingType::Rv)
        } else {
            None
        }
    }
}

/// A value destined for a record field, tagged by its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Numeric(Option<f64>),
    Text(Option<String>),
    Enum(Option<WindingType>),
    NumericList(Vec<f64>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        match self {
            FieldValue::Numeric(v) => v.is_none(),
            FieldValue::Text(v) => v.is_none(),
            FieldValue::Enum(v) => v.is_none(),
            FieldValue::NumericList(v) => v.is_empty(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Numeric(v) => *v,
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Numeric(Some(v)) => write!(f, "{v}"),
            FieldValue::Text(Some(v)) => write!(f, "{v}"),
            FieldValue::Enum(Some(v)) => write!(f, "{v}"),
            FieldValue::NumericList(v) if !v.is_empty() => {
                let parts: Vec<String> = v.iter().map(|n| n.to_string()).collect();
                write!(f, "{}", parts.join(" / "))
            }
            _ => write!(f, "-"),
        }
    }
}

/// Outcome of storing a value into a record slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    Set,
    /// The slot already holds a value; the new one was dropped.
    Occupied,
    /// The value was null; the slot is unchanged.
    Null,
    /// The value's kind does not fit the field.
    KindMismatch,
}

fn fill_slot<T>(slot: &mut Option<T>, value: Option<T>) -> Fill {
    match (slot.is_some(), value) {
        (_, None) => Fill::Null,
        (true, Some(_)) => Fill::Occupied,
        (false, Some(v)) => {
            *slot = Some(v);
            Fill::Set
        }
    }
}

fn fill_list(slot: &mut Vec<f64>, value: Vec<f64>) -> Fill {
    if value.is_empty() {
        Fill::Null
    } else if !slot.is_empty() {
        Fill::Occupied
    } else {
        *slot = value;
        Fill::Set
    }
}

/// Generates `get` and first-wins `fill` for a record over its field enum.
macro_rules! record_fields {
    ($record:ident, $field:ident {
        $(numeric $n:ident => $nf:ident,)*
        $(text $t:ident => $tf:ident,)*
        $(choice $e:ident => $ef:ident,)*
        $(list $l:ident => $lf:ident,)*
    }) => {
        impl $record {
            /// Current value of a field.
            pub fn get(&self, field: $field) -> FieldValue {
                match field {
                    $($field::$n => FieldValue::Numeric(self.$nf),)*
                    $($field::$t => FieldValue::Text(self.$tf.clone()),)*
                    $($field::$e => FieldValue::Enum(self.$ef),)*
                    $($field::$l => FieldValue::NumericList(self.$lf.clone()),)*
                }
            }

            /// Store a value unless the field already holds one.
            pub fn fill(&mut self, field: $field, value: FieldValue) -> Fill {
                match (field, value) {
                    $(($field::$n, FieldValue::Numeric(v)) => fill_slot(&mut self.$nf, v),)*
                    $(($field::$t, FieldValue::Text(v)) => fill_slot(&mut self.$tf, v),)*
                    $(($field::$e, FieldValue::Enum(v)) => fill_slot(&mut self.$ef, v),)*
                    $(($field::$l, FieldValue::NumericList(v)) => fill_list(&mut self.$lf, v),)*
                    _ => Fill::KindMismatch,
                }
            }
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindingRecord {
    #[serde(rename = "type")]
    pub winding_type: Option<WindingType>,
    pub rated_turns: Option<f64>,
    pub max_turns: Option<f64>,
    pub min_turns: Option<f64>,
    pub disc_val: Option<f64>,
    /// Turns per disc.
    pub lyrs_val: Option<f64>,
    pub ks_circle: Option<f64>,
    pub ks_width: Option<f64>,
    pub ks_thk: Option<String>,
    pub id: Option<f64>,
    pub od: Option<f64>,
    pub mean_turn: Option<f64>,
    pub line_voltage: Option<String>,
    pub coil_voltage: Option<String>,
    pub total_loss: Option<f64>,
    pub paper_insul: Option<f64>,
    pub bare_thk: Option<f64>,
    pub bare_width: Option<f64>,
    pub radial: Option<f64>,
    pub i2r: Option<f64>,
    pub watts_oa: Option<f64>,
    pub watts_max: Option<f64>,
    pub grad_oa: Option<f64>,
    pub grad_max: Option<f64>,
    pub s_grad_oa: Option<f64>,
    pub s_grad_max: Option<f64>,
    pub pulls_w: Option<f64>,
    pub pulls_h: Option<f64>,
    pub strands: Option<f64>,
    pub parallel_groups: Option<f64>,
    pub rated_amps: Option<f64>,
    pub wire_space_mech: Option<f64>,
    pub add_ks_col_grp: Option<f64>,
    pub design_elec_ht: Option<f64>,
}

record_fields!(WindingRecord, WindingField {
    numeric RatedTurns => rated_turns,
    numeric MaxTurns => max_turns,
    numeric MinTurns => min_turns,
    numeric DiscVal => disc_val,
    numeric LyrsVal => lyrs_val,
    numeric KsCircle => ks_circle,
    numeric KsWidth => ks_width,
    numeric Id => id,
    numeric Od => od,
    numeric MeanTurn => mean_turn,
    numeric TotalLoss => total_loss,
    numeric PaperInsul => paper_insul,
    numeric BareThk => bare_thk,
    numeric BareWidth => bare_width,
    numeric Radial => radial,
    numeric I2r => i2r,
    numeric WattsOa => watts_oa,
    numeric WattsMax => watts_max,
    numeric GradOa => grad_oa,
    numeric GradMax => grad_max,
    numeric SGradOa => s_grad_oa,
    numeric SGradMax => s_grad_max,
    numeric PullsW => pulls_w,
    numeric PullsH => pulls_h,
    numeric Strands => strands,
    numeric ParallelGroups => parallel_groups,
    numeric RatedAmps => rated_amps,
    numeric WireSpaceMech => wire_space_mech,
    numeric AddKsColGrp => add_ks_col_grp,
    numeric DesignElecHt => design_elec_ht,
    text KsThk => ks_thk,
    text LineVoltage => line_voltage,
    text CoilVoltage => coil_voltage,
    choice Type => winding_type,
});

impl WindingRecord {
    /// True when no field holds a value.
    pub fn is_empty(&self) -> bool {
        *self == WindingRecord::default()
    }

    pub fn set_rated_turns(&mut self, value: Option<f64>) {
        self.rated_turns = value;
        self.recompute_lyrs();
    }

    pub fn set_max_turns(&mut self, value: Option<f64>) {
        self.max_turns = value;
        self.recompute_lyrs();
    }

    pub fn set_disc_val(&mut self, value: Option<f64>) {
        self.disc_val = value;
        self.recompute_lyrs();
    }

    /// Turns per disc from max turns (or rated turns) and the disc count,
    /// rounded to 2 places. `None` when either side is missing or discs is 0.
    pub fn derived_lyrs(&self) -> Option<f64> {
        let base = self.max_turns.or(self.rated_turns)?;
        let discs = self.disc_val.filter(|d| *d != 0.0)?;
        round_dp(base / discs, 2)
    }

    fn recompute_lyrs(&mut self) {
        if let Some(lyrs) = self.derived_lyrs() {
            self.lyrs_val = Some(lyrs);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoreRecord {
    pub weight: Option<f64>,
    pub flux_den: Option<f64>,
    pub fe_circle: Option<f64>,
    pub window_ht: Option<f64>,
    pub window_width: Option<f64>,
    pub leg_center: Option<f64>,
    pub core_length: Option<f64>,
    pub core_ht: Option<f64>,
    /// Max lamination width.
    pub lam_width: Option<f64>,
    pub core_grade: Option<String>,
}

record_fields!(CoreRecord, CoreField {
    numeric Weight => weight,
    numeric FluxDen => flux_den,
    numeric FeCircle => fe_circle,
    numeric WindowHt => window_ht,
    numeric WindowWidth => window_width,
    numeric LegCenter => leg_center,
    numeric CoreLength => core_length,
    numeric CoreHt => core_ht,
    numeric LamWidth => lam_width,
    text CoreGrade => core_grade,
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TankRecord {
    pub clearance_right: Option<f64>,
    pub clearance_left: Option<f64>,
    pub clearance_front: Option<f64>,
    pub clearance_back: Option<f64>,
    pub width: Option<f64>,
    pub depth: Option<f64>,
    pub height: Option<f64>,
}

record_fields!(TankRecord, TankField {
    numeric ClearanceRight => clearance_right,
    numeric ClearanceLeft => clearance_left,
    numeric ClearanceFront => clearance_front,
    numeric ClearanceBack => clearance_back,
    numeric Width => width,
    numeric Depth => depth,
    numeric Height => height,
});

/// Document-level ratings and clearances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignSummary {
    pub mva: Option<f64>,
    pub max_mva: Option<f64>,
    /// Every kVA rating listed, in document order.
    pub kva_ratings: Vec<f64>,
    pub volts_per_turn: Option<f64>,
    pub percent_z: Option<f64>,
    pub bracket_wdg_space: Option<f64>,
    pub bracket_top: Option<f64>,
    pub bracket_bottom: Option<f64>,
    pub keep_back: Option<f64>,
    /// No-load loss expectation, as printed.
    pub nll_exp: Option<String>,
}

record_fields!(DesignSummary, DocumentField {
    numeric Mva => mva,
    numeric MaxMva => max_mva,
    numeric VoltsPerTurn => volts_per_turn,
    numeric PercentZ => percent_z,
    numeric BracketWdgSpace => bracket_wdg_space,
    numeric BracketTop => bracket_top,
    numeric BracketBottom => bracket_bottom,
    numeric KeepBack => keep_back,
    text NllExp => nll_exp,
    list KvaRatings => kva_ratings,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    TubeDetails,
    CoreBuild,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKind::TubeDetails => write!(f, "tube details"),
            TableKind::CoreBuild => write!(f, "core build"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub cells: Vec<String>,
    #[serde(default)]
    pub is_total: bool,
    #[serde(default)]
    pub is_duct: bool,
    pub page_number: usize,
}

/// An auxiliary bill-of-material table recovered from the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxTable {
    pub kind: TableKind,
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl AuxTable {
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
    }

    /// Rows that are neither totals nor ducts.
    pub fn data_rows(&self) -> impl Iterator<Item = &TableRow> {
        self.rows.iter().filter(|r| !r.is_total && !r.is_duct)
    }

    /// The first total row, if any.
    pub fn total_row(&self) -> Option<&TableRow> {
        self.rows.iter().find(|r| r.is_total)
    }

    /// Sum of a column over non-total rows; cells that do not parse count as 0.
    pub fn column_sum(&self, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        Some(
            self.rows
                .iter()
                .filter(|r| !r.is_total)
                .filter_map(|r| r.cells.get(idx))
                .filter_map(|c| parse_number(c))
                .sum(),
        )
    }

    /// The total row's value in a column.
    pub fn total_value(&self, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        self.total_row()
            .and_then(|r| r.cells.get(idx))
            .and_then(|c| parse_number(c))
    }

    /// Whether the total row agrees with the column sum, when both exist.
    pub fn total_matches(&self, column: &str, tolerance: f64) -> Option<bool> {
        let total = self.total_value(column)?;
        let sum = self.column_sum(column)?;
        Some((total - sum).abs() <= tolerance)
    }
}

/// The structured content of one design report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub windings: [WindingRecord; WINDING_SLOTS],
    pub core: CoreRecord,
    pub tank: TankRecord,
    pub summary: DesignSummary,
    pub tube_tables: Vec<AuxTable>,
    pub core_table: Option<AuxTable>,
    /// Design electrical height of each counted winding.
    pub design_elec_ht: Vec<f64>,
}

impl ExtractedDocument {
    /// Winding by 1-based ordinal.
    pub fn winding(&self, ordinal: usize) -> Option<&WindingRecord> {
        ordinal.checked_sub(1).and_then(|i| self.windings.get(i))
    }
}

/// Result of one extraction call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub document: ExtractedDocument,
    pub winding_count: usize,
    pub winding_names: Vec<String>,
    pub trace: TraceBundle,
}
