use crate::model::{AuxTable, FieldValue};
use crate::parsing::lines::TextLine;
use serde::{Deserialize, Serialize};

pub const TRACE_SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceSeverity {
    Critical,
    Important,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceVisibility {
    Always,
    Auto,
    OnDemand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStepType {
    MatchLabel,
    ParseValue,
    AssignColumn,
    SegmentTable,
    InferWindings,
    DeriveField,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    pub step_type: TraceStepType,
    pub message: String,
}

/// One value stored into a record, with the line it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub entry_id: String,
    /// Dotted field name, e.g. `winding.rated_turns`.
    pub field: String,
    /// 1-based winding ordinal for per-winding fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winding: Option<usize>,
    pub raw_value: String,
    pub value: FieldValue,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence_spans: Vec<EvidenceSpan>,
    pub steps: Vec<TraceStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSpan {
    pub page_number: usize,
    pub line_index: usize,
    pub matched_text: String,
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl EvidenceSpan {
    /// Bounding box of a whole line.
    pub fn from_line(line: &TextLine) -> Self {
        let mut span = EvidenceSpan {
            page_number: line.page_number,
            line_index: line.line_index,
            matched_text: line.joined_text.clone(),
            x_min: f32::INFINITY,
            y_min: f32::INFINITY,
            x_max: f32::NEG_INFINITY,
            y_max: f32::NEG_INFINITY,
        };
        for t in &line.tokens {
            span.x_min = span.x_min.min(t.x);
            span.y_min = span.y_min.min(t.y);
            span.x_max = span.x_max.max(t.x_max());
            span.y_max = span.y_max.max(t.y + t.height);
        }
        if line.tokens.is_empty() {
            span.x_min = 0.0;
            span.y_min = 0.0;
            span.x_max = 0.0;
            span.y_max = 0.0;
        }
        span
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceDecisionTarget {
    ColumnHeader,
    Table,
    WindingCount,
    WindingNames,
    DerivedField,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceDecision {
    pub decision_id: String,
    pub target: TraceDecisionTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<usize>,
    pub reason: String,
    pub severity: TraceSeverity,
    pub visibility: TraceVisibility,
    pub steps: Vec<TraceStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceWarning {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<usize>,
    pub message: String,
    pub severity: TraceSeverity,
    pub visibility: TraceVisibility,
}

impl TraceWarning {
    pub fn on_page(page_number: usize, message: impl Into<String>) -> Self {
        TraceWarning {
            page_number: Some(page_number),
            message: message.into(),
            severity: TraceSeverity::Info,
            visibility: TraceVisibility::Auto,
        }
    }

    /// A warning about the document as a whole.
    pub fn document(message: impl Into<String>) -> Self {
        TraceWarning {
            page_number: None,
            message: message.into(),
            severity: TraceSeverity::Important,
            visibility: TraceVisibility::Auto,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceBundle {
    pub trace_schema_version: String,
    pub entries: Vec<TraceEntry>,
    pub decisions: Vec<TraceDecision>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<TraceWarning>,
}

impl Default for TraceBundle {
    fn default() -> Self {
        Self {
            trace_schema_version: TRACE_SCHEMA_VERSION.to_string(),
            entries: Vec::new(),
            decisions: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl TraceBundle {
    pub fn push_decision(
        &mut self,
        target: TraceDecisionTarget,
        page_number: Option<usize>,
        reason: impl Into<String>,
        step_type: TraceStepType,
    ) {
        let reason = reason.into();
        self.decisions.push(TraceDecision {
            decision_id: format!("dec_{}", self.decisions.len()),
            target,
            page_number,
            reason: reason.clone(),
            severity: TraceSeverity::Info,
            visibility: TraceVisibility::OnDemand,
            steps: vec![TraceStep {
                step_type,
                message: reason,
            }],
        });
    }

    /// Append another bundle, renumbering its ids to follow ours.
    pub fn absorb(&mut self, other: TraceBundle) {
        for mut entry in other.entries {
            entry.entry_id = format!("ent_{}", self.entries.len());
            self.entries.push(entry);
        }
        for mut decision in other.decisions {
            decision.decision_id = format!("dec_{}", self.decisions.len());
            self.decisions.push(decision);
        }
        self.warnings.extend(other.warnings);
    }
}

/// Build the trace entry for a value stored from a matched line.
pub fn build_field_entry(
    entry_idx: usize,
    field: String,
    winding: Option<usize>,
    raw_value: &str,
    value: FieldValue,
    line: &TextLine,
    pattern: &str,
) -> TraceEntry {
    let target = match winding {
        Some(w) => format!("{field} (wdg{w})"),
        None => field.clone(),
    };
    TraceEntry {
        entry_id: format!("ent_{entry_idx}"),
        steps: vec![
            TraceStep {
                step_type: TraceStepType::MatchLabel,
                message: format!("Matched /{pattern}/ on '{}'", line.joined_text),
            },
            TraceStep {
                step_type: TraceStepType::ParseValue,
                message: format!("Parsed '{raw_value}' as {value} for {target}"),
            },
        ],
        field,
        winding,
        raw_value: raw_value.to_string(),
        value,
        evidence_spans: vec![EvidenceSpan::from_line(line)],
    }
}

/// Describe a recovered table for the decision log.
pub fn describe_table(table: &AuxTable) -> String {
    let totals = table.rows.iter().filter(|r| r.is_total).count();
    format!(
        "{} table '{}': {} column(s), {} row(s), {} total row(s)",
        table.kind,
        table.title,
        table.columns.len(),
        table.rows.len(),
        totals
    )
}
