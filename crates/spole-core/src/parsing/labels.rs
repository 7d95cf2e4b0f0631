use crate::model::{
    CoreRecord, DesignSummary, FieldValue, Fill, TankRecord, WindingRecord, WindingType,
    WINDING_SLOTS,
};
use crate::parsing::lines::TextLine;
use crate::parsing::values::{is_placeholder, parse_number};
use crate::rules::schema::{FieldKind, FieldSlot, ValuePolicy, WindingField};
use crate::rules::{CompiledRule, RuleTable};
use crate::trace::{
    build_field_entry, TraceBundle, TraceDecisionTarget, TraceStepType, TraceWarning,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::LazyLock;

/// "Winding  LV  HV  TV", "Type: HV LV"
static HEADER_TYPES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?:windings?|wdg|type|(?:wdg|winding)\.?\s+type)\s*:?\s+)?(?:[lhtr]\.?v\.?\s+){1,2}[lhtr]\.?v\.?$",
    )
    .unwrap()
});

/// "Wdg 1  Wdg 2  Wdg 3", "Winding #1  Winding #2"
static HEADER_NUMBERS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:windings\s*:?\s+)?(?:(?:wdg|winding)\.?\s*#?\s*[1-3]\s+){1,2}(?:wdg|winding)\.?\s*#?\s*[1-3]$",
    )
    .unwrap()
});

static WDG_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:wdg|winding)\.?#?$").unwrap());
static WDG_NUMBERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:wdg|winding)\.?#?[1-3]$").unwrap());
static DESIGNATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[lhtr]\.?v\.?$").unwrap());

/// A horizontal band owning one winding column, in page units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnRange {
    pub x_min: f32,
    pub x_max: f32,
}

impl ColumnRange {
    pub fn new(x_min: f32, x_max: f32) -> Self {
        ColumnRange { x_min, x_max }
    }

    pub fn contains(&self, x: f32) -> bool {
        x >= self.x_min && x <= self.x_max
    }
}

impl FromStr for ColumnRange {
    type Err = String;

    /// Parse "x0-x1", e.g. "180-250" or "-5-10".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // the separator is the first '-' after the start value's sign
        let sep = trimmed
            .char_indices()
            .skip(1)
            .find(|&(_, c)| c == '-')
            .map(|(i, _)| i)
            .ok_or_else(|| format!("expected a range like 180-250, got '{s}'"))?;
        let (a, b) = (&trimmed[..sep], &trimmed[sep + 1..]);
        let x_min: f32 = a
            .trim()
            .parse()
            .map_err(|_| format!("invalid column start '{a}'"))?;
        let x_max: f32 = b
            .trim()
            .parse()
            .map_err(|_| format!("invalid column end '{b}'"))?;
        if !x_min.is_finite() || !x_max.is_finite() || x_min > x_max {
            return Err(format!("invalid column range '{s}'"));
        }
        Ok(ColumnRange { x_min, x_max })
    }
}

/// Winding columns announced by a header line.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnHeader {
    pub centers: Vec<f32>,
    pub types: Vec<Option<WindingType>>,
    pub labels: Vec<String>,
}

impl ColumnHeader {
    fn nearest(&self, x: f32) -> Option<usize> {
        self.centers
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (*a - x).abs().total_cmp(&(*b - x).abs()))
            .map(|(i, _)| i)
    }
}

/// Recognize a winding column header line.
pub fn detect_column_header(line: &TextLine) -> Option<ColumnHeader> {
    let text = line.match_text.trim();
    let by_type = HEADER_TYPES_RE.is_match(text);
    if !by_type && !HEADER_NUMBERS_RE.is_match(text) {
        return None;
    }

    let pieces = line.pieces_from(0);
    let mut header = ColumnHeader {
        centers: Vec::new(),
        types: Vec::new(),
        labels: Vec::new(),
    };

    for (i, piece) in pieces.iter().enumerate() {
        if by_type {
            if DESIGNATION_RE.is_match(&piece.text) {
                header.centers.push(piece.x);
                header.types.push(WindingType::from_str_loose(&piece.text));
                header.labels.push(piece.text.clone());
            }
        } else if WDG_NUMBERED_RE.is_match(&piece.text) {
            header.centers.push(piece.x);
            header.types.push(None);
            header.labels.push(piece.text.clone());
        } else if piece.text.len() == 1 && piece.text.chars().all(|c| ('1'..='3').contains(&c)) {
            // "Wdg 1": center between the word and its number
            let prev = i.checked_sub(1).map(|p| &pieces[p]);
            let x = match prev {
                Some(p) if WDG_WORD_RE.is_match(&p.text) => (p.x + piece.x) / 2.0,
                _ => piece.x,
            };
            header.centers.push(x);
            header.types.push(None);
            header.labels.push(match prev {
                Some(p) => format!("{} {}", p.text, piece.text),
                None => piece.text.clone(),
            });
        }
    }

    let columns = header.centers.len();
    ((2..=WINDING_SLOTS).contains(&columns)).then_some(header)
}

/// A value found after a label, with its horizontal position.
#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    raw: String,
    value: FieldValue,
    x: f32,
}

/// Fields recovered by the label matcher, plus the evidence for them.
#[derive(Debug, Clone, Default)]
pub struct LabelMatches {
    pub windings: [WindingRecord; WINDING_SLOTS],
    pub core: CoreRecord,
    pub tank: TankRecord,
    pub summary: DesignSummary,
    pub trace: TraceBundle,
}

/// Applies a rule table to assembled lines.
pub struct LabelMatcher<'a> {
    rules: &'a RuleTable,
    known_columns: Option<&'a [ColumnRange]>,
}

impl<'a> LabelMatcher<'a> {
    pub fn new(rules: &'a RuleTable, known_columns: Option<&'a [ColumnRange]>) -> Self {
        LabelMatcher {
            rules,
            known_columns: known_columns.filter(|c| !c.is_empty()),
        }
    }

    /// Match every unclaimed line in document order.
    ///
    /// `claimed[i]` marks lines already owned by a table; they are skipped.
    pub fn match_lines(&self, lines: &[TextLine], claimed: &[bool]) -> LabelMatches {
        let mut out = LabelMatches::default();
        let mut header: Option<ColumnHeader> = None;

        for (i, line) in lines.iter().enumerate() {
            if claimed.get(i).copied().unwrap_or(false) {
                continue;
            }

            if let Some(h) = detect_column_header(line) {
                self.apply_header(&h, line, &mut out);
                header = Some(h);
                continue;
            }

            let Some(m) = self.rules.best_match(&line.match_text) else {
                continue;
            };
            let rule = &self.rules.rules()[m.rule];
            tracing::trace!(
                page = line.page_number,
                line = line.line_index,
                field = %rule.field,
                "label matched"
            );

            match (rule.policy, rule.field) {
                (ValuePolicy::PerWinding, FieldSlot::Winding(field)) => {
                    self.match_per_winding(rule, field, line, m.end, header.as_ref(), &mut out)
                }
                (ValuePolicy::List, slot) => {
                    let candidates = numeric_candidates(line, m.end, true);
                    let values: Vec<f64> =
                        candidates.iter().filter_map(|c| c.value.as_f64()).collect();
                    let raw: Vec<&str> = candidates.iter().map(|c| c.raw.as_str()).collect();
                    let candidate = Candidate {
                        raw: raw.join(" "),
                        value: FieldValue::NumericList(values),
                        x: candidates.first().map_or(0.0, |c| c.x),
                    };
                    store(&mut out, slot, None, candidate, line, rule);
                }
                (_, slot) => {
                    if let Some(candidate) = trailing_candidate(line, m.end, slot.kind()) {
                        store(&mut out, slot, None, candidate, line, rule);
                    }
                }
            }
        }

        out
    }

    fn apply_header(&self, header: &ColumnHeader, line: &TextLine, out: &mut LabelMatches) {
        out.trace.push_decision(
            TraceDecisionTarget::ColumnHeader,
            Some(line.page_number),
            format!(
                "Winding columns from header on line {}: {}",
                line.line_index,
                header.labels.join(", ")
            ),
            TraceStepType::AssignColumn,
        );

        for (idx, (label, ty)) in header.labels.iter().zip(&header.types).enumerate() {
            if ty.is_none() {
                continue;
            }
            let candidate = Candidate {
                raw: label.clone(),
                value: FieldValue::Enum(*ty),
                x: header.centers[idx],
            };
            let fill = out.windings[idx].fill(WindingField::Type, candidate.value.clone());
            record_fill(
                out,
                fill,
                FieldSlot::Winding(WindingField::Type),
                Some(idx),
                candidate,
                line,
                "column header",
            );
        }
    }

    fn match_per_winding(
        &self,
        rule: &CompiledRule,
        field: WindingField,
        line: &TextLine,
        offset: usize,
        header: Option<&ColumnHeader>,
        out: &mut LabelMatches,
    ) {
        let candidates = match field.kind() {
            FieldKind::Text => text_candidates(line, offset),
            FieldKind::Enum => enum_candidates(line, offset),
            _ => numeric_candidates(line, offset, false),
        };
        if candidates.is_empty() {
            return;
        }

        let mut slots: [Option<Candidate>; WINDING_SLOTS] = Default::default();
        let mut dropped = Vec::new();

        for (pos, candidate) in candidates.into_iter().enumerate() {
            let column = match (self.known_columns, header) {
                (Some(ranges), _) => ranges
                    .iter()
                    .take(WINDING_SLOTS)
                    .position(|r| r.contains(candidate.x)),
                (None, Some(h)) => h.nearest(candidate.x),
                (None, None) => Some(pos),
            };
            match column {
                Some(c) if c < WINDING_SLOTS && slots[c].is_none() => slots[c] = Some(candidate),
                _ => dropped.push(candidate.raw),
            }
        }

        if !dropped.is_empty() {
            out.trace.warnings.push(TraceWarning::on_page(
                line.page_number,
                format!(
                    "line {}: no winding column for value(s) {} of {}",
                    line.line_index,
                    dropped.join(", "),
                    FieldSlot::Winding(field)
                ),
            ));
        }

        for (idx, slot) in slots.into_iter().enumerate() {
            if let Some(candidate) = slot {
                store(out, FieldSlot::Winding(field), Some(idx), candidate, line, rule);
            }
        }
    }
}

fn store(
    out: &mut LabelMatches,
    slot: FieldSlot,
    winding: Option<usize>,
    candidate: Candidate,
    line: &TextLine,
    rule: &CompiledRule,
) {
    let value = candidate.value.clone();
    let fill = match (slot, winding) {
        (FieldSlot::Winding(f), Some(w)) => out.windings[w].fill(f, value),
        (FieldSlot::Winding(f), None) => out.windings[0].fill(f, value),
        (FieldSlot::Core(f), _) => out.core.fill(f, value),
        (FieldSlot::Tank(f), _) => out.tank.fill(f, value),
        (FieldSlot::Document(f), _) => out.summary.fill(f, value),
    };
    record_fill(out, fill, slot, winding, candidate, line, rule.regex.as_str());
}

fn record_fill(
    out: &mut LabelMatches,
    fill: Fill,
    slot: FieldSlot,
    winding: Option<usize>,
    candidate: Candidate,
    line: &TextLine,
    pattern: &str,
) {
    let target = match winding {
        Some(w) => format!("{slot} (wdg{})", w + 1),
        None => slot.to_string(),
    };
    match fill {
        Fill::Set => {
            let entry = build_field_entry(
                out.trace.entries.len(),
                slot.to_string(),
                winding.map(|w| w + 1),
                &candidate.raw,
                candidate.value,
                line,
                pattern,
            );
            out.trace.entries.push(entry);
        }
        Fill::Occupied => {
            tracing::debug!(field = %target, page = line.page_number, "later value ignored");
            out.trace.warnings.push(TraceWarning::on_page(
                line.page_number,
                format!(
                    "line {}: ignored later value '{}' for {target}; first value kept",
                    line.line_index, candidate.raw
                ),
            ));
        }
        Fill::Null => {}
        Fill::KindMismatch => {
            out.trace.warnings.push(TraceWarning::on_page(
                line.page_number,
                format!(
                    "line {}: value '{}' does not fit {target}",
                    line.line_index, candidate.raw
                ),
            ));
        }
    }
}

/// Numbers and placeholders after `offset`; other pieces such as units are skipped.
fn numeric_candidates(line: &TextLine, offset: usize, split_slashes: bool) -> Vec<Candidate> {
    let mut out = Vec::new();
    for piece in line.pieces_from(offset) {
        let parts: Vec<&str> = if split_slashes {
            piece.text.split('/').filter(|p| !p.is_empty()).collect()
        } else {
            vec![piece.text.as_str()]
        };
        for part in parts {
            let value = if is_placeholder(part) {
                FieldValue::Numeric(None)
            } else if let Some(v) = parse_number(part) {
                FieldValue::Numeric(Some(v))
            } else {
                continue;
            };
            out.push(Candidate {
                raw: part.to_string(),
                value,
                x: piece.x,
            });
        }
    }
    out
}

fn enum_candidates(line: &TextLine, offset: usize) -> Vec<Candidate> {
    line.pieces_from(offset)
        .into_iter()
        .filter_map(|piece| {
            let value = if is_placeholder(&piece.text) {
                None
            } else {
                Some(WindingType::from_str_loose(&piece.text)?)
            };
            Some(Candidate {
                raw: piece.text,
                value: FieldValue::Enum(value),
                x: piece.x,
            })
        })
        .collect()
}

/// The rest of the label's cell (if any), then each following cell.
fn text_candidates(line: &TextLine, offset: usize) -> Vec<Candidate> {
    let Some(first) = line.cell_at(offset) else {
        return Vec::new();
    };
    let mut out = Vec::new();

    let cell = &line.cells[first];
    let rest = clean_text(&line.joined_text[offset.max(cell.start)..cell.end]);
    if !rest.is_empty() {
        let x = line
            .pieces_from(offset)
            .first()
            .map_or(cell.center(), |p| p.x);
        out.push(text_candidate(rest, x));
    }

    for cell in &line.cells[first + 1..] {
        let text = clean_text(&cell.text);
        if !text.is_empty() {
            out.push(text_candidate(text, cell.center()));
        }
    }
    out
}

fn text_candidate(text: &str, x: f32) -> Candidate {
    let value = (!is_placeholder(text)).then(|| text.to_string());
    Candidate {
        raw: text.to_string(),
        value: FieldValue::Text(value),
        x,
    }
}

fn clean_text(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || c == ':' || c == '=')
}

/// The first value after the label on the same line.
fn trailing_candidate(line: &TextLine, offset: usize, kind: FieldKind) -> Option<Candidate> {
    match kind {
        FieldKind::Text => text_candidates(line, offset).into_iter().next(),
        FieldKind::Enum => enum_candidates(line, offset).into_iter().next(),
        _ => numeric_candidates(line, offset, true).into_iter().next(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{PageTokens, PositionedToken, TokenStream, YAxis};
    use crate::parsing::lines::{assemble_lines, tests::tok, LayoutOptions};
    use crate::rules::builtin::builtin_table;

    /// One page per entry; each row is a list of (text, x) at its own y.
    fn pages(layout: &[&[&[(&str, f32)]]]) -> Vec<TextLine> {
        let stream = TokenStream {
            y_axis: YAxis::TopDown,
            pages: layout
                .iter()
                .enumerate()
                .map(|(p, rows)| PageTokens {
                    page_number: p + 1,
                    tokens: rows
                        .iter()
                        .enumerate()
                        .flat_map(|(r, row)| {
                            row.iter()
                                .map(move |(t, x)| tok(t, *x, 20.0 + 30.0 * r as f32))
                        })
                        .collect::<Vec<PositionedToken>>(),
                })
                .collect(),
        };
        assemble_lines(&stream, &LayoutOptions::default())
    }

    fn run(lines: &[TextLine], columns: Option<&[ColumnRange]>) -> LabelMatches {
        LabelMatcher::new(builtin_table(), columns).match_lines(lines, &[])
    }

    #[test]
    fn test_known_columns_with_placeholder() {
        let lines = pages(&[&[&[
            ("Rated", 10.0),
            ("Turns", 40.0),
            ("113", 200.0),
            ("226", 300.0),
            ("–", 400.0),
        ]]]);
        let ranges = [
            ColumnRange::new(180.0, 250.0),
            ColumnRange::new(280.0, 350.0),
            ColumnRange::new(380.0, 450.0),
        ];
        let m = run(&lines, Some(&ranges));
        assert_eq!(m.windings[0].rated_turns, Some(113.0));
        assert_eq!(m.windings[1].rated_turns, Some(226.0));
        assert_eq!(m.windings[2].rated_turns, None);
        assert!(m.windings[2].is_empty());
    }

    #[test]
    fn test_value_outside_known_columns_dropped() {
        let lines = pages(&[&[&[("O.D.", 10.0), ("40.2", 200.0), ("99", 600.0)]]]);
        let ranges = [ColumnRange::new(180.0, 250.0)];
        let m = run(&lines, Some(&ranges));
        assert_eq!(m.windings[0].od, Some(40.2));
        assert!(m.windings[1].is_empty());
        assert_eq!(m.trace.warnings.len(), 1);
    }

    #[test]
    fn test_positional_placeholder_keeps_column() {
        let lines = pages(&[&[&[
            ("Rated", 10.0),
            ("Turns", 40.0),
            ("113", 200.0),
            ("-", 300.0),
            ("226", 400.0),
        ]]]);
        let m = run(&lines, None);
        assert_eq!(m.windings[0].rated_turns, Some(113.0));
        assert_eq!(m.windings[1].rated_turns, None);
        assert_eq!(m.windings[2].rated_turns, Some(226.0));
    }

    #[test]
    fn test_header_columns_and_types() {
        let lines = pages(&[&[
            &[("Winding", 10.0), ("LV", 200.0), ("HV", 300.0)],
            &[("O.D.", 10.0), ("40.2", 295.0)],
        ]]);
        let m = run(&lines, None);
        assert_eq!(m.windings[0].winding_type, Some(WindingType::Lv));
        assert_eq!(m.windings[1].winding_type, Some(WindingType::Hv));
        assert_eq!(m.windings[0].od, None);
        assert_eq!(m.windings[1].od, Some(40.2));
        assert_eq!(m.trace.decisions.len(), 1);
    }

    #[test]
    fn test_header_applies_across_pages() {
        let lines = pages(&[
            &[&[("Wdg", 200.0), ("1", 220.0), ("Wdg", 300.0), ("2", 320.0), ("Wdg", 400.0), ("3", 420.0)]],
            &[&[("Rated", 10.0), ("Turns", 40.0), ("950", 405.0)]],
        ]);
        let m = run(&lines, None);
        assert_eq!(m.windings[2].rated_turns, Some(950.0));
        assert!(m.windings[0].is_empty());
    }

    #[test]
    fn test_detect_numbered_header() {
        let lines = pages(&[&[&[("Wdg1", 200.0), ("Wdg2", 300.0)]]]);
        let header = detect_column_header(&lines[0]).unwrap();
        assert_eq!(header.centers.len(), 2);
        assert!(header.types.iter().all(Option::is_none));
    }

    #[test]
    fn test_non_header_lines() {
        let lines = pages(&[&[
            &[("LV", 10.0)],
            &[("Rated", 10.0), ("Turns", 40.0), ("113", 200.0)],
        ]]);
        assert!(detect_column_header(&lines[0]).is_none());
        assert!(detect_column_header(&lines[1]).is_none());
    }

    #[test]
    fn test_first_occurrence_wins() {
        let lines = pages(&[
            &[&[("Flux", 10.0), ("Den", 40.0), ("1.55", 200.0)]],
            &[&[("Flux", 10.0), ("Den", 40.0), ("1.70", 200.0)]],
        ]);
        let m = run(&lines, None);
        assert_eq!(m.core.flux_den, Some(1.55));
        assert_eq!(m.trace.warnings.len(), 1);
        assert_eq!(m.trace.warnings[0].page_number, Some(2));
        assert_eq!(m.trace.entries.len(), 1);
    }

    #[test]
    fn test_trailing_skips_annotation() {
        let lines = pages(&[&[&[("Flux", 10.0), ("Den", 40.0), ("(T)", 120.0), ("1.55", 200.0)]]]);
        let m = run(&lines, None);
        assert_eq!(m.core.flux_den, Some(1.55));
    }

    #[test]
    fn test_list_policy() {
        let lines = pages(&[&[&[("kVA", 10.0), ("12000/16000/20000", 200.0)]]]);
        let m = run(&lines, None);
        assert_eq!(m.summary.kva_ratings, vec![12000.0, 16000.0, 20000.0]);
    }

    #[test]
    fn test_trailing_text() {
        let lines = pages(&[&[&[("Core", 10.0), ("Grade", 40.0), ("M4", 200.0), ("HiB", 215.0)]]]);
        let m = run(&lines, None);
        assert_eq!(m.core.core_grade.as_deref(), Some("M4 HiB"));
    }

    #[test]
    fn test_longest_label_owns_line() {
        let lines = pages(&[&[&[("Max", 10.0), ("MVA", 35.0), ("20", 200.0)]]]);
        let m = run(&lines, None);
        assert_eq!(m.summary.max_mva, Some(20.0));
        assert_eq!(m.summary.mva, None);
    }

    #[test]
    fn test_per_winding_text_cells() {
        let lines = pages(&[&[&[
            ("Line", 10.0),
            ("Voltage", 35.0),
            ("13.8", 200.0),
            ("kV", 223.0),
            ("115", 300.0),
            ("kV", 318.0),
        ]]]);
        let m = run(&lines, None);
        assert_eq!(m.windings[0].line_voltage.as_deref(), Some("13.8 kV"));
        assert_eq!(m.windings[1].line_voltage.as_deref(), Some("115 kV"));
    }

    #[test]
    fn test_claimed_lines_are_skipped() {
        let lines = pages(&[&[&[("Flux", 10.0), ("Den", 40.0), ("1.55", 200.0)]]]);
        let m = LabelMatcher::new(builtin_table(), None).match_lines(&lines, &[true]);
        assert_eq!(m.core.flux_den, None);
    }

    #[test]
    fn test_column_range_from_str() {
        assert_eq!("180-250".parse::<ColumnRange>(), Ok(ColumnRange::new(180.0, 250.0)));
        assert!("250-180".parse::<ColumnRange>().is_err());
        assert!("abc".parse::<ColumnRange>().is_err());
        assert_eq!("-5-10".parse::<ColumnRange>(), Ok(ColumnRange::new(-5.0, 10.0)));
        assert_eq!("-20--5".parse::<ColumnRange>(), Ok(ColumnRange::new(-20.0, -5.0)));
        assert!("-5".parse::<ColumnRange>().is_err());
    }
}
