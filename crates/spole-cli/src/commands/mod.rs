pub mod extract;
pub mod lines;
pub mod rules;

use spole_core::error::SpoleError;
use spole_core::extraction::json::JsonTokenSource;
use spole_core::extraction::pdftotext::PdftotextSource;
use spole_core::extraction::TextLayerSource;
use std::path::Path;
use tracing::debug;

/// Pick the text-layer backend by file extension.
pub fn source_for(path: &Path) -> Box<dyn TextLayerSource> {
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    debug!(path = %path.display(), json = is_json, "selected text-layer source");
    if is_json {
        Box::new(JsonTokenSource::new())
    } else {
        Box::new(PdftotextSource::new())
    }
}

pub fn read_input(path: &Path) -> Result<Vec<u8>, SpoleError> {
    Ok(std::fs::read(path)?)
}
