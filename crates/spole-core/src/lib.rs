pub mod error;
pub mod extraction;
pub mod model;
pub mod parsing;
pub mod rules;
pub mod trace;

use error::SpoleError;
use extraction::{TextLayerSource, TokenStream};
use model::Extraction;
use parsing::ExtractOptions;

/// Main API entry point: extract a design report from its text layer
/// with the built-in label rules.
pub fn extract(stream: &TokenStream) -> Result<Extraction, SpoleError> {
    extract_with_options(stream, &ExtractOptions::default())
}

/// Extract with explicit layout thresholds, winding columns and extra rules.
///
/// Fails only when the document has no text at all or when the extra
/// rules are invalid. Anything the report does not say stays `None`.
pub fn extract_with_options(
    stream: &TokenStream,
    options: &ExtractOptions,
) -> Result<Extraction, SpoleError> {
    parsing::parse_document(stream, options)
}

/// Read a PDF through a text-layer backend, then extract it.
pub fn extract_pdf(
    pdf_bytes: &[u8],
    source: &dyn TextLayerSource,
    options: &ExtractOptions,
) -> Result<Extraction, SpoleError> {
    let stream = source.read_tokens(pdf_bytes)?;
    tracing::debug!(
        backend = source.backend_name(),
        pages = stream.pages.len(),
        "text layer read"
    );
    extract_with_options(&stream, options)
}
