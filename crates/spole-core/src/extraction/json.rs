use crate::error::SpoleError;
use crate::extraction::{TextLayerSource, TokenStream};

/// Text-layer backend reading a pre-extracted, serialized `TokenStream`.
///
/// Useful for documents rendered elsewhere (e.g. by a browser-side PDF
/// renderer) and for fixtures.
pub struct JsonTokenSource;

impl JsonTokenSource {
    pub fn new() -> Self {
        JsonTokenSource
    }
}

impl Default for JsonTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayerSource for JsonTokenSource {
    fn read_tokens(&self, bytes: &[u8]) -> Result<TokenStream, SpoleError> {
        serde_json::from_slice(bytes)
            .map_err(|e| SpoleError::DocumentUnreadable(format!("invalid token stream: {e}")))
    }

    fn backend_name(&self) -> &str {
        "json"
    }
}
