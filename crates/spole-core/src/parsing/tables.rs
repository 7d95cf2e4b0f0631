use crate::model::{AuxTable, TableKind, TableRow};
use crate::parsing::labels::detect_column_header;
use crate::parsing::lines::TextLine;
use crate::parsing::normalize::{clean_material_name, clean_table_title};
use crate::parsing::values::{is_placeholder, parse_number};
use crate::rules::RuleTable;
use crate::trace::{describe_table, TraceBundle, TraceDecisionTarget, TraceStepType, TraceWarning};
use regex::Regex;
use std::sync::LazyLock;

static CORE_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcore\s+(?:build|step)s?\b|\blamination\s+stack\b").unwrap()
});
static DETAILS_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[a-z]\s+details\b").unwrap());
static VENDOR_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:weidmann|wdman|enpay)\b.*\btubes?\b").unwrap());
/// "TOTAL 12.55", "Total -> 12.55 139.19"
static TOTAL_ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*totals?\s*(?:->|:|=)?\s*[-+(]?\.?\d").unwrap());
static DUCT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bducts?\b").unwrap());
/// "Page 3 of 7", "Page 3", a bare page number.
static FURNITURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:page\s+\d+(?:\s+of\s+\d+)?|\d{1,3})\s*$").unwrap()
});

/// Max difference between a total row and its column sum.
pub const TOTAL_TOLERANCE: f64 = 1e-4;

/// Column-header lines skipped after a title.
const MAX_HEADER_LINES: usize = 2;

/// A cell of a candidate row. Numeric cells holding several numbers are
/// split into one field per number.
#[derive(Debug, Clone)]
struct Field {
    text: String,
    x_min: f32,
    x_max: f32,
    value: Option<f64>,
    placeholder: bool,
}

impl Field {
    fn is_numberish(&self) -> bool {
        self.value.is_some() || self.placeholder
    }
}

fn fields(line: &TextLine) -> Vec<Field> {
    let mut out = Vec::new();
    for cell in &line.cells {
        let words: Vec<&str> = cell.text.split_whitespace().collect();
        let all_numeric = words
            .iter()
            .all(|w| parse_number(w).is_some() || is_placeholder(w));

        if words.len() > 1 && all_numeric {
            let step = (cell.x_max - cell.x_min) / words.len() as f32;
            for (i, word) in words.iter().enumerate() {
                let x_min = cell.x_min + step * i as f32;
                out.push(field(word, x_min, x_min + step));
            }
        } else {
            out.push(field(&cell.text, cell.x_min, cell.x_max));
        }
    }
    out
}

fn field(text: &str, x_min: f32, x_max: f32) -> Field {
    let text = text.trim();
    Field {
        text: text.to_string(),
        x_min,
        x_max,
        value: parse_number(text),
        placeholder: is_placeholder(text),
    }
}

fn numeric_count(fields: &[Field]) -> usize {
    fields.iter().filter(|f| f.value.is_some()).count()
}

/// Material text followed by at least two numeric cells.
fn is_tube_row(fields: &[Field]) -> bool {
    fields.len() >= 3
        && !fields[0].is_numberish()
        && fields[1..].iter().all(Field::is_numberish)
        && numeric_count(&fields[1..]) >= 2
}

/// At least three numeric cells and nothing else.
fn is_core_row(fields: &[Field]) -> bool {
    fields.len() >= 3 && fields.iter().all(Field::is_numberish) && numeric_count(fields) >= 3
}

fn is_row_shaped(kind: TableKind, fields: &[Field]) -> bool {
    match kind {
        TableKind::TubeDetails => is_tube_row(fields),
        TableKind::CoreBuild => is_core_row(fields),
    }
}

fn title_kind(line: &TextLine, fields: &[Field]) -> Option<TableKind> {
    let text = &line.joined_text;
    if CORE_TITLE_RE.is_match(text) {
        Some(TableKind::CoreBuild)
    } else if DETAILS_TITLE_RE.is_match(text) {
        Some(TableKind::TubeDetails)
    } else if VENDOR_TITLE_RE.is_match(text) && !is_tube_row(fields) {
        Some(TableKind::TubeDetails)
    } else {
        None
    }
}

fn default_columns(kind: TableKind, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| match (kind, i) {
            (TableKind::TubeDetails, 0) => "material".to_string(),
            (TableKind::TubeDetails, 1) => "thk".to_string(),
            (TableKind::TubeDetails, 2) => "qty".to_string(),
            _ => format!("col{}", i + 1),
        })
        .collect()
}

/// Tables recovered from a document, and the lines they own.
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    pub tube_tables: Vec<AuxTable>,
    pub core_table: Option<AuxTable>,
    /// One flag per input line; true when a table owns the line.
    pub claimed: Vec<bool>,
    pub trace: TraceBundle,
}

struct OpenTable {
    table: AuxTable,
    ranges: Vec<(f32, f32)>,
    headers_left: usize,
    /// The table crossed a page break and waits for its next row.
    awaiting_continuation: bool,
}

impl OpenTable {
    fn new(kind: TableKind, title: String) -> Self {
        OpenTable {
            table: AuxTable {
                kind,
                title,
                columns: Vec::new(),
                rows: Vec::new(),
            },
            ranges: Vec::new(),
            headers_left: MAX_HEADER_LINES,
            awaiting_continuation: false,
        }
    }

    /// A data row that fits the locked columns, or the first data row.
    fn accepts(&self, fields: &[Field], tolerance: f32) -> bool {
        if !is_row_shaped(self.table.kind, fields) {
            return false;
        }
        if self.ranges.is_empty() {
            return true;
        }
        fields.len() == self.ranges.len()
            && fields.iter().zip(&self.ranges).all(|(f, (lo, hi))| {
                f.x_min <= hi + tolerance && f.x_max >= lo - tolerance
            })
    }

    fn push_data_row(&mut self, fields: &[Field], page_number: usize) {
        if self.ranges.is_empty() {
            self.ranges = fields.iter().map(|f| (f.x_min, f.x_max)).collect();
            self.table.columns = default_columns(self.table.kind, fields.len());
        }
        let cells = fields
            .iter()
            .enumerate()
            .map(|(i, f)| match (self.table.kind, i) {
                (TableKind::TubeDetails, 0) => clean_material_name(&f.text),
                _ => f.text.clone(),
            })
            .collect();
        self.table.rows.push(TableRow {
            cells,
            is_total: false,
            is_duct: false,
            page_number,
        });
    }

    /// Numbers right-aligned into the numeric columns; when there are more
    /// numbers than columns the leading ones are kept.
    fn push_total_row(&mut self, fields: &[Field], page_number: usize) {
        let numbers: Vec<&Field> = fields.iter().filter(|f| f.value.is_some()).collect();
        let label: Vec<&str> = fields
            .iter()
            .filter(|f| !f.is_numberish())
            .map(|f| f.text.as_str())
            .collect();

        let first_numeric = match self.table.kind {
            TableKind::TubeDetails => 1,
            TableKind::CoreBuild => 0,
        };
        let width = match self.table.columns.len() {
            0 => numbers.len() + first_numeric,
            n => n,
        };
        let mut cells = vec![String::new(); width.max(first_numeric + 1)];
        let slots = cells.len() - first_numeric;
        let taken = numbers.len().min(slots);
        let start = cells.len() - taken;
        for (cell, number) in cells[start..].iter_mut().zip(&numbers[..taken]) {
            *cell = number.text.clone();
        }
        if first_numeric == 1 {
            cells[0] = label.join(" ");
        }

        self.table.rows.push(TableRow {
            cells,
            is_total: true,
            is_duct: false,
            page_number,
        });
    }

    /// The locked column nearest to a field; a field inside a range is at
    /// distance zero.
    fn column_for(&self, field: &Field) -> Option<usize> {
        let center = (field.x_min + field.x_max) / 2.0;
        let distance = |(lo, hi): &(f32, f32)| (lo - center).max(center - hi).max(0.0);
        self.ranges
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| distance(*a).total_cmp(&distance(*b)))
            .map(|(i, _)| i)
    }

    /// Duct values go under the columns they are printed in.
    fn push_duct_row(&mut self, fields: &[Field], page_number: usize) {
        let numbers = fields.iter().filter(|f| f.value.is_some());
        let cells = if self.ranges.is_empty() {
            numbers.map(|f| f.text.clone()).collect()
        } else {
            let mut cells = vec![String::new(); self.ranges.len()];
            for f in numbers {
                if let Some(cell) = self.column_for(f).map(|i| &mut cells[i]) {
                    if cell.is_empty() {
                        *cell = f.text.clone();
                    }
                }
            }
            cells
        };
        self.table.rows.push(TableRow {
            cells,
            is_total: false,
            is_duct: true,
            page_number,
        });
    }
}

/// Find the auxiliary tables among the document's lines.
///
/// A line some label rule matches is never a table row; it closes the open
/// table and stays with the label matcher.
pub fn segment_tables(lines: &[TextLine], rules: &RuleTable) -> Segmentation {
    let mut seg = Segmentation {
        claimed: vec![false; lines.len()],
        ..Default::default()
    };
    let mut open: Option<OpenTable> = None;
    let mut current_page = lines.first().map_or(0, |l| l.page_number);

    for (i, line) in lines.iter().enumerate() {
        if line.page_number != current_page {
            current_page = line.page_number;
            if let Some(t) = open.as_mut() {
                t.awaiting_continuation = true;
            }
        }

        let fields = fields(line);

        if let Some(kind) = title_kind(line, &fields) {
            close(&mut seg, open.take());
            let title = clean_table_title(&line.joined_text);
            tracing::debug!(page = line.page_number, %title, %kind, "table title");
            open = Some(OpenTable::new(kind, title));
            seg.claimed[i] = true;
            continue;
        }

        let Some(table) = open.as_mut() else {
            continue;
        };

        if FURNITURE_RE.is_match(&line.joined_text) {
            continue;
        }

        let tolerance = line
            .tokens
            .iter()
            .map(|t| t.height)
            .fold(1.0_f32, f32::max);
        let text = &line.joined_text;
        let labelled = rules.best_match(&line.match_text).is_some();

        if labelled {
            close(&mut seg, open.take());
            continue;
        } else if TOTAL_ROW_RE.is_match(text) && numeric_count(&fields) > 0 {
            table.push_total_row(&fields, line.page_number);
        } else if table.table.kind == TableKind::CoreBuild
            && DUCT_RE.is_match(text)
            && numeric_count(&fields) > 0
        {
            table.push_duct_row(&fields, line.page_number);
        } else if table.accepts(&fields, tolerance) {
            table.push_data_row(&fields, line.page_number);
        } else if table.headers_left > 0
            && !table.awaiting_continuation
            && table.table.rows.is_empty()
            && numeric_count(&fields) == 0
            && detect_column_header(line).is_none()
        {
            table.headers_left -= 1;
            seg.trace.push_decision(
                TraceDecisionTarget::Table,
                Some(line.page_number),
                format!("Skipped column header '{text}' of '{}'", table.table.title),
                TraceStepType::SegmentTable,
            );
            seg.claimed[i] = true;
            continue;
        } else {
            close(&mut seg, open.take());
            continue;
        }

        table.headers_left = 0;
        table.awaiting_continuation = false;
        seg.claimed[i] = true;
    }

    close(&mut seg, open.take());
    seg
}

fn close(seg: &mut Segmentation, open: Option<OpenTable>) {
    let Some(open) = open else {
        return;
    };
    let table = open.table;

    if table.rows.is_empty() {
        seg.trace.push_decision(
            TraceDecisionTarget::Table,
            None,
            format!("Dropped {} table '{}' with no rows", table.kind, table.title),
            TraceStepType::SegmentTable,
        );
        return;
    }

    let page = table.rows.first().map(|r| r.page_number);
    check_totals(seg, &table, page);
    seg.trace.push_decision(
        TraceDecisionTarget::Table,
        page,
        describe_table(&table),
        TraceStepType::SegmentTable,
    );
    tracing::debug!(title = %table.title, rows = table.rows.len(), "table closed");

    let kind = table.kind;
    match kind {
        TableKind::TubeDetails => seg.tube_tables.push(table),
        TableKind::CoreBuild if seg.core_table.is_none() => seg.core_table = Some(table),
        TableKind::CoreBuild => seg.trace.warnings.push(TraceWarning::on_page(
            page.unwrap_or(0),
            format!("additional core table '{}' ignored", table.title),
        )),
    }
}

fn check_totals(seg: &mut Segmentation, table: &AuxTable, page: Option<usize>) {
    for column in &table.columns {
        if column == "material" {
            continue;
        }
        if table.total_matches(column, TOTAL_TOLERANCE) == Some(false) {
            let total = table.total_value(column).unwrap_or_default();
            let sum = table.column_sum(column).unwrap_or_default();
            seg.trace.warnings.push(TraceWarning::on_page(
                page.unwrap_or(0),
                format!(
                    "table '{}': total {column} is {total} but rows sum to {sum}",
                    table.title
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{PageTokens, PositionedToken, TokenStream, YAxis};
    use crate::parsing::lines::{assemble_lines, tests::tok, LayoutOptions};
    use crate::rules::builtin::builtin_table;

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

    const MATERIAL_X: f32 = 10.0;
    const THK_X: f32 = 200.0;
    const QTY_X: f32 = 300.0;

    #[test]
    fn test_tube_table_with_header_and_total() {
        let lines = pages(&[&[
            &[("COVER", 10.0), ("DETAILS", 45.0)],
            &[("Material", MATERIAL_X), ("Thk", THK_X), ("Qty", QTY_X)],
            &[("Pressboard", MATERIAL_X), ("0.125", THK_X), ("2", QTY_X)],
            &[("+ 0.1875 Wdman Duct", MATERIAL_X), ("0.1875", THK_X), ("4", QTY_X)],
            &[("TOTAL", MATERIAL_X), ("0.3125", THK_X), ("6", QTY_X)],
            &[("Flux", 10.0), ("Den", 40.0), ("1.55", THK_X)],
        ]]);
        let seg = segment_tables(&lines, builtin_table());
        assert_eq!(seg.tube_tables.len(), 1);
        let t = &seg.tube_tables[0];
        assert_eq!(t.title, "COVER DETAILS");
        assert_eq!(t.columns, vec!["material", "thk", "qty"]);
        assert_eq!(t.rows.len(), 3);
        assert_eq!(t.rows[1].cells[0], "Wdman Duct");
        assert!(t.rows[2].is_total);
        assert_eq!(t.rows[2].cells, vec!["TOTAL", "0.3125", "6"]);
        assert_eq!(t.total_matches("thk", TOTAL_TOLERANCE), Some(true));
        assert!(seg.trace.warnings.is_empty());
        assert_eq!(seg.claimed, vec![true, true, true, true, true, false]);
    }

    #[test]
    fn test_total_details_title_has_no_spurious_row() {
        let lines = pages(&[&[
            &[("Pressboard", MATERIAL_X), ("0.125", THK_X), ("2", QTY_X)],
            &[("TOTAL -> 12.55 139.19 10073 COVER DETAILS", 10.0)],
            &[("Kraft", MATERIAL_X), ("0.5", THK_X), ("3", QTY_X)],
        ]]);
        let seg = segment_tables(&lines, builtin_table());
        assert_eq!(seg.tube_tables.len(), 1);
        let t = &seg.tube_tables[0];
        assert_eq!(t.title, "COVER DETAILS");
        assert_eq!(t.rows.len(), 1);
        assert_eq!(t.rows[0].cells[0], "Kraft");
        assert!(!seg.claimed[0]);
    }

    #[test]
    fn test_leading_numbers_stripped_from_title() {
        let lines = pages(&[&[
            &[("12 2 24 1743 MAJOR DETAILS", 10.0)],
            &[("Pressboard", MATERIAL_X), ("0.125", THK_X), ("2", QTY_X)],
        ]]);
        let seg = segment_tables(&lines, builtin_table());
        assert_eq!(seg.tube_tables[0].title, "MAJOR DETAILS");
    }

    #[test]
    fn test_vendor_title_only_when_not_row() {
        let lines = pages(&[&[
            &[("WEIDMANN", 10.0), ("TUBES", 70.0)],
            &[("Wdman Tube", MATERIAL_X), ("0.080", THK_X), ("1", QTY_X)],
            &[("Wdman Tube", MATERIAL_X), ("0.125", THK_X), ("2", QTY_X)],
        ]]);
        let seg = segment_tables(&lines, builtin_table());
        assert_eq!(seg.tube_tables.len(), 1);
        assert_eq!(seg.tube_tables[0].title, "WEIDMANN TUBES");
        assert_eq!(seg.tube_tables[0].rows.len(), 2);
    }

    #[test]
    fn test_table_continues_on_next_page() {
        let lines = pages(&[
            &[
                &[("LEAD", 10.0), ("DETAILS", 40.0)],
                &[("Pressboard", MATERIAL_X), ("0.125", THK_X), ("2", QTY_X)],
                &[("Page", 10.0), ("1", 40.0), ("of", 50.0), ("2", 65.0)],
            ],
            &[
                &[("2", 400.0)],
                &[("Kraft", MATERIAL_X), ("0.25", THK_X), ("1", QTY_X)],
                &[("Flux", 10.0), ("Den", 40.0), ("1.55", THK_X)],
            ],
        ]);
        let seg = segment_tables(&lines, builtin_table());
        let t = &seg.tube_tables[0];
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[1].page_number, 2);
        // page numbers are skipped, never claimed
        let unclaimed: Vec<&str> = lines
            .iter()
            .zip(&seg.claimed)
            .filter(|(_, c)| !**c)
            .map(|(l, _)| l.joined_text.as_str())
            .collect();
        assert_eq!(unclaimed, vec!["Page 1 of 2", "2", "Flux Den 1.55"]);
    }

    #[test]
    fn test_continuation_needs_row_first_on_page() {
        let lines = pages(&[
            &[
                &[("LEAD", 10.0), ("DETAILS", 40.0)],
                &[("Pressboard", MATERIAL_X), ("0.125", THK_X), ("2", QTY_X)],
            ],
            &[
                &[("Design", 10.0), ("Report", 50.0)],
                &[("Kraft", MATERIAL_X), ("0.25", THK_X), ("1", QTY_X)],
            ],
        ]);
        let seg = segment_tables(&lines, builtin_table());
        assert_eq!(seg.tube_tables.len(), 1);
        assert_eq!(seg.tube_tables[0].rows.len(), 1);
        assert_eq!(seg.claimed, vec![true, true, false, false]);
    }

    #[test]
    fn test_label_lines_after_page_break_close_table() {
        let lines = pages(&[
            &[
                &[("LEAD", 10.0), ("DETAILS", 40.0)],
                &[("Pressboard", MATERIAL_X), ("0.125", THK_X), ("2", QTY_X)],
            ],
            &[
                &[("Core", 10.0), ("Grade", 35.0), ("M4", THK_X)],
                &[("Flux", 10.0), ("Den", 40.0), ("1.55", THK_X)],
                &[("Rated", 10.0), ("Turns", 40.0), ("113", THK_X), ("226", QTY_X)],
            ],
        ]);
        let seg = segment_tables(&lines, builtin_table());
        assert_eq!(seg.tube_tables[0].rows.len(), 1);
        assert_eq!(seg.claimed, vec![true, true, false, false, false]);
    }

    #[test]
    fn test_labelled_rows_under_details_heading() {
        let lines = pages(&[&[
            &[("WINDING", 10.0), ("DETAILS", 60.0)],
            &[("Rated", 10.0), ("Turns", 40.0), ("113", THK_X), ("226", QTY_X)],
            &[("Max", 10.0), ("Turns", 30.0), ("120", THK_X), ("240", QTY_X)],
        ]]);
        let seg = segment_tables(&lines, builtin_table());
        assert!(seg.tube_tables.is_empty());
        assert_eq!(seg.claimed, vec![true, false, false]);
    }

    #[test]
    fn test_core_build_with_duct_and_total() {
        let lines = pages(&[&[
            &[("CORE", 10.0), ("BUILD", 40.0)],
            &[("1", 100.0), ("22.5", 200.0), ("3.2", 300.0), ("410", 400.0)],
            &[("2", 100.0), ("21.0", 200.0), ("2.8", 300.0), ("380", 400.0)],
            &[("Duct", 10.0), ("0.25", 300.0)],
            &[("Total", 10.0), ("6.0", 300.0), ("790", 400.0)],
        ]]);
        let seg = segment_tables(&lines, builtin_table());
        let core = seg.core_table.as_ref().unwrap();
        assert_eq!(core.title, "CORE BUILD");
        assert_eq!(core.columns, vec!["col1", "col2", "col3", "col4"]);
        assert_eq!(core.rows.len(), 4);
        assert!(core.rows[2].is_duct);
        assert_eq!(core.rows[2].cells, vec!["", "", "0.25", ""]);
        assert_eq!(core.column_sum("col2"), Some(43.5));
        assert!(core.rows[3].is_total);
        assert_eq!(core.rows[3].cells, vec!["", "", "6.0", "790"]);
        assert_eq!(core.total_matches("col4", TOTAL_TOLERANCE), Some(true));
        assert!(seg.tube_tables.is_empty());
    }

    #[test]
    fn test_total_mismatch_is_a_warning() {
        let lines = pages(&[&[
            &[("COVER", 10.0), ("DETAILS", 45.0)],
            &[("Pressboard", MATERIAL_X), ("0.125", THK_X), ("2", QTY_X)],
            &[("TOTAL", MATERIAL_X), ("0.5", THK_X), ("2", QTY_X)],
        ]]);
        let seg = segment_tables(&lines, builtin_table());
        assert_eq!(seg.tube_tables.len(), 1);
        assert_eq!(seg.trace.warnings.len(), 1);
        assert!(seg.trace.warnings[0].message.contains("thk"));
    }

    #[test]
    fn test_misaligned_row_closes_table() {
        let lines = pages(&[&[
            &[("COVER", 10.0), ("DETAILS", 45.0)],
            &[("Pressboard", MATERIAL_X), ("0.125", THK_X), ("2", QTY_X)],
            &[("Rated", 10.0), ("Turns", 40.0), ("113", 500.0), ("226", 600.0)],
        ]]);
        let seg = segment_tables(&lines, builtin_table());
        assert_eq!(seg.tube_tables[0].rows.len(), 1);
        assert!(!seg.claimed[2]);
    }

    #[test]
    fn test_empty_table_dropped() {
        let lines = pages(&[&[
            &[("COVER", 10.0), ("DETAILS", 45.0)],
            &[("Flux", 10.0), ("Den", 40.0), ("1.55", THK_X)],
        ]]);
        let seg = segment_tables(&lines, builtin_table());
        assert!(seg.tube_tables.is_empty());
        assert!(!seg.claimed[1]);
    }

    #[test]
    fn test_winding_header_not_taken_as_column_header() {
        let lines = pages(&[&[
            &[("WINDING", 10.0), ("DETAILS", 60.0)],
            &[("Winding", 10.0), ("LV", 200.0), ("HV", 300.0)],
        ]]);
        let seg = segment_tables(&lines, builtin_table());
        assert_eq!(seg.claimed, vec![true, false]);
    }
}
