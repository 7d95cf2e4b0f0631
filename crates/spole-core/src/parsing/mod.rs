pub mod labels;
pub mod lines;
pub mod normalize;
pub mod tables;
pub mod values;
pub mod windings;

use crate::error::SpoleError;
use crate::extraction::TokenStream;
use crate::model::{ExtractedDocument, Extraction};
use crate::rules::builtin::builtin_table;
use crate::rules::schema::LabelRuleDef;
use crate::rules::RuleTable;
use crate::trace::{TraceBundle, TraceDecisionTarget, TraceStepType};
use labels::{ColumnRange, LabelMatcher};
use lines::{assemble_lines, LayoutOptions};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tables::segment_tables;
use tracing::debug;
use values::round_dp;
use windings::infer_windings;

/// Knobs for one extraction. `Default` reproduces the stock behaviour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    pub layout: LayoutOptions,
    /// Fixed x-ranges of the winding columns, when the template is known.
    pub winding_columns: Option<Vec<ColumnRange>>,
    /// User label rules, tried before the built-in table.
    pub extra_rules: Vec<LabelRuleDef>,
}

/// Run the whole pipeline over a document's text layer.
///
/// Tables claim their lines first; the label matcher reads everything else.
/// Winding inference and the derived fields run once all pages are consumed.
pub fn parse_document(
    stream: &TokenStream,
    options: &ExtractOptions,
) -> Result<Extraction, SpoleError> {
    if stream.token_count() == 0 {
        return Err(SpoleError::EmptyDocument);
    }

    let rules: Cow<'_, RuleTable> = if options.extra_rules.is_empty() {
        Cow::Borrowed(builtin_table())
    } else {
        Cow::Owned(RuleTable::with_extra_rules(&options.extra_rules)?)
    };

    let lines = assemble_lines(stream, &options.layout);
    debug!(pages = stream.pages.len(), lines = lines.len(), "lines assembled");

    let segmentation = segment_tables(&lines, &rules);
    debug!(
        tube_tables = segmentation.tube_tables.len(),
        core_table = segmentation.core_table.is_some(),
        "tables segmented"
    );

    let matcher = LabelMatcher::new(&rules, options.winding_columns.as_deref());
    let matches = matcher.match_lines(&lines, &segmentation.claimed);

    let mut trace = segmentation.trace;
    trace.absorb(matches.trace);

    let layout = infer_windings(&matches.windings, &mut trace);

    let mut document = ExtractedDocument {
        windings: matches.windings,
        core: matches.core,
        tank: matches.tank,
        summary: matches.summary,
        tube_tables: segmentation.tube_tables,
        core_table: segmentation.core_table,
        design_elec_ht: Vec::new(),
    };
    derive_fields(&mut document, layout.count, &mut trace);

    Ok(Extraction {
        document,
        winding_count: layout.count,
        winding_names: layout.names,
        trace,
    })
}

/// Fill values the report implies but does not print.
fn derive_fields(doc: &mut ExtractedDocument, winding_count: usize, trace: &mut TraceBundle) {
    for (idx, winding) in doc.windings.iter_mut().take(winding_count).enumerate() {
        if winding.lyrs_val.is_some() {
            continue;
        }
        if let Some(lyrs) = winding.derived_lyrs() {
            winding.lyrs_val = Some(lyrs);
            trace.push_decision(
                TraceDecisionTarget::DerivedField,
                None,
                format!("wdg{} lyrs_val = {lyrs} from turns / discs", idx + 1),
                TraceStepType::DeriveField,
            );
        }
    }

    let summary = &mut doc.summary;
    if summary.mva.is_none() {
        if let Some(mva) = summary.kva_ratings.first().and_then(|kva| round_dp(kva / 1000.0, 4)) {
            summary.mva = Some(mva);
            trace.push_decision(
                TraceDecisionTarget::DerivedField,
                None,
                format!("mva = {mva} from first kVA rating"),
                TraceStepType::DeriveField,
            );
        }
    }
    if summary.max_mva.is_none() {
        let max_kva = summary.kva_ratings.iter().copied().reduce(f64::max);
        if let Some(max_mva) = max_kva.and_then(|kva| round_dp(kva / 1000.0, 4)) {
            summary.max_mva = Some(max_mva);
            trace.push_decision(
                TraceDecisionTarget::DerivedField,
                None,
                format!("max_mva = {max_mva} from largest kVA rating"),
                TraceStepType::DeriveField,
            );
        }
    }

    doc.design_elec_ht = doc.windings[..winding_count]
        .iter()
        .filter_map(|w| w.design_elec_ht)
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{PageTokens, PositionedToken};
    use crate::parsing::lines::tests::tok;

    fn stream(pages: &[&[&[(&str, f32)]]]) -> TokenStream {
        TokenStream {
            pages: pages
                .iter()
                .enumerate()
                .map(|(p, rows)| PageTokens {
                    page_number: p + 1,
                    tokens: rows
                        .iter()
                        .enumerate()
                        .flat_map(|(r, row)| {
                            row.iter().map(move |(t, x)| tok(t, *x, 20.0 + 30.0 * r as f32))
                        })
                        .collect(),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_document() {
        let empty = TokenStream::default();
        assert!(matches!(
            parse_document(&empty, &ExtractOptions::default()),
            Err(SpoleError::EmptyDocument)
        ));

        let blank = TokenStream {
            pages: vec![PageTokens {
                page_number: 1,
                tokens: vec![PositionedToken::new("  ", 10.0, 10.0, 5.0, 10.0)],
            }],
            ..Default::default()
        };
        assert!(matches!(
            parse_document(&blank, &ExtractOptions::default()),
            Err(SpoleError::EmptyDocument)
        ));
    }

    #[test]
    fn test_two_winding_document() {
        let doc = stream(&[&[
            &[("Winding", 10.0), ("LV", 200.0), ("HV", 300.0)],
            &[("Rated", 10.0), ("Turns", 40.0), ("113", 200.0), ("226", 300.0)],
            &[("Max", 10.0), ("Turns", 30.0), ("3002", 200.0), ("3400", 300.0)],
            &[("No.", 10.0), ("of", 30.0), ("Discs", 45.0), ("56", 200.0), ("68", 300.0)],
        ]]);
        let out = parse_document(&doc, &ExtractOptions::default()).unwrap();

        assert_eq!(out.winding_count, 2);
        assert_eq!(out.winding_names, vec!["LV", "HV", "Winding 3"]);
        let w1 = &out.document.windings[0];
        assert_eq!(w1.rated_turns, Some(113.0));
        assert_eq!(w1.lyrs_val, Some(53.61));
        assert_eq!(out.document.windings[1].lyrs_val, Some(50.0));
        assert!(out.document.windings[2].is_empty());
        assert!(out
            .trace
            .decisions
            .iter()
            .any(|d| d.target == TraceDecisionTarget::DerivedField));
    }

    #[test]
    fn test_mva_from_kva_ratings() {
        let doc = stream(&[&[&[("KVA", 10.0), ("60000/80000/100000", 200.0)]]]);
        let out = parse_document(&doc, &ExtractOptions::default()).unwrap();
        let summary = &out.document.summary;
        assert_eq!(summary.kva_ratings, vec![60000.0, 80000.0, 100000.0]);
        assert_eq!(summary.mva, Some(60.0));
        assert_eq!(summary.max_mva, Some(100.0));
    }

    #[test]
    fn test_printed_mva_not_overridden() {
        let doc = stream(&[&[
            &[("MVA", 10.0), ("75", 200.0)],
            &[("KVA", 10.0), ("60000/80000", 200.0)],
        ]]);
        let out = parse_document(&doc, &ExtractOptions::default()).unwrap();
        assert_eq!(out.document.summary.mva, Some(75.0));
        assert_eq!(out.document.summary.max_mva, Some(80.0));
    }

    #[test]
    fn test_table_lines_not_read_as_labels() {
        let doc = stream(&[&[
            &[("LV", 10.0), ("TUBE", 25.0), ("DETAILS", 50.0)],
            &[("Wdman", 10.0), ("Tube", 40.0), ("3.0", 200.0), ("2", 300.0)],
            &[("Total", 10.0), ("3.0", 200.0), ("2", 300.0)],
            &[("Flux", 10.0), ("Den", 35.0), ("1.55", 200.0)],
        ]]);
        let out = parse_document(&doc, &ExtractOptions::default()).unwrap();
        assert_eq!(out.document.tube_tables.len(), 1);
        assert_eq!(out.document.tube_tables[0].title, "LV TUBE DETAILS");
        assert_eq!(out.document.core.flux_den, Some(1.55));
    }

    #[test]
    fn test_winding_rows_under_details_heading() {
        let doc = stream(&[&[
            &[("WINDING", 10.0), ("DETAILS", 60.0)],
            &[("Rated", 10.0), ("Turns", 40.0), ("113", 200.0), ("226", 300.0)],
            &[("Max", 10.0), ("Turns", 30.0), ("120", 200.0), ("240", 300.0)],
        ]]);
        let out = parse_document(&doc, &ExtractOptions::default()).unwrap();
        assert!(out.document.tube_tables.is_empty());
        let w = &out.document.windings;
        assert_eq!((w[0].rated_turns, w[1].rated_turns), (Some(113.0), Some(226.0)));
        assert_eq!((w[0].max_turns, w[1].max_turns), (Some(120.0), Some(240.0)));
    }

    #[test]
    fn test_open_table_does_not_swallow_next_page_labels() {
        let doc = stream(&[
            &[
                &[("LEAD", 10.0), ("DETAILS", 40.0)],
                &[("Pressboard", 10.0), ("0.125", 200.0), ("2", 300.0)],
            ],
            &[
                &[("Core", 10.0), ("Grade", 35.0), ("M4", 200.0)],
                &[("Flux", 10.0), ("Den", 35.0), ("1.55", 200.0)],
                &[("Rated", 10.0), ("Turns", 40.0), ("113", 200.0), ("226", 300.0)],
            ],
        ]);
        let out = parse_document(&doc, &ExtractOptions::default()).unwrap();
        assert_eq!(out.document.tube_tables[0].rows.len(), 1);
        assert_eq!(out.document.windings[0].rated_turns, Some(113.0));
        assert_eq!(out.document.windings[1].rated_turns, Some(226.0));
    }

    #[test]
    fn test_design_elec_ht_per_counted_winding() {
        let doc = stream(&[&[&[
            ("Design", 10.0),
            ("Elec", 45.0),
            ("Ht", 70.0),
            ("1500", 200.0),
            ("1520", 300.0),
        ]]]);
        let out = parse_document(&doc, &ExtractOptions::default()).unwrap();
        assert_eq!(out.document.design_elec_ht, vec![1500.0, 1520.0]);
    }

    #[test]
    fn test_invalid_extra_rule_rejected() {
        let options = ExtractOptions {
            extra_rules: vec![LabelRuleDef {
                pattern: "(".into(),
                field: crate::rules::schema::FieldSlot::Core(
                    crate::rules::schema::CoreField::Weight,
                ),
                policy: crate::rules::schema::ValuePolicy::Trailing,
                note: None,
            }],
            ..Default::default()
        };
        let doc = stream(&[&[&[("Weight", 10.0), ("42", 200.0)]]]);
        assert!(parse_document(&doc, &options).is_err());
    }
}
