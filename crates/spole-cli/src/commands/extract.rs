use spole_core::error::SpoleError;
use spole_core::parsing::labels::ColumnRange;
use spole_core::parsing::ExtractOptions;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::commands::{read_input, source_for};
use crate::output;

pub fn run(
    input_file: PathBuf,
    output_format: &str,
    output_file: Option<PathBuf>,
    rule_files: Vec<PathBuf>,
    columns: Vec<ColumnRange>,
) -> Result<(), SpoleError> {
    let mut options = ExtractOptions::default();
    for path in &rule_files {
        let rs = spole_core::rules::load_ruleset(path)?;
        debug!(path = %path.display(), rules = rs.rules.len(), "loaded rule file");
        options.extra_rules.extend(rs.rules);
    }
    if !columns.is_empty() {
        debug!(?columns, "using fixed winding columns");
        options.winding_columns = Some(columns);
    }

    let bytes = read_input(&input_file)?;
    let source = source_for(&input_file);
    let extraction = spole_core::extract_pdf(&bytes, source.as_ref(), &options)?;

    match output_file {
        Some(path) => {
            // Always write JSON when saving to file
            let json = serde_json::to_string_pretty(&extraction)?;
            std::fs::write(&path, json)?;
            eprintln!(
                "Extracted {} winding(s) and {} table(s), written to {}",
                extraction.winding_count,
                extraction.document.tube_tables.len()
                    + usize::from(extraction.document.core_table.is_some()),
                path.display()
            );
            for w in &extraction.trace.warnings {
                warn!(page = ?w.page_number, "{}", w.message);
            }
        }
        None => match output_format {
            "json" => output::json::print(&extraction)?,
            _ => output::table::print(&extraction),
        },
    }

    Ok(())
}
