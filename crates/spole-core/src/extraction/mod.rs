pub mod json;
pub mod pdftotext;

use crate::error::SpoleError;
use serde::{Deserialize, Serialize};

/// One atomic run of text at a page coordinate, as delivered by the text layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedToken {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PositionedToken {
    pub fn new(text: impl Into<String>, x: f32, y: f32, width: f32, height: f32) -> Self {
        PositionedToken {
            text: text.into(),
            x,
            y,
            width,
            height,
        }
    }

    pub fn x_max(&self) -> f32 {
        self.x + self.width
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    pub(crate) fn is_usable(&self) -> bool {
        !self.text.trim().is_empty()
            && self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }
}

/// Direction of the vertical axis of the page coordinate system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YAxis {
    /// y grows downwards (pdftotext, most renderers).
    #[default]
    TopDown,
    /// y grows upwards (raw PDF user space, pdf.js transforms).
    BottomUp,
}

/// Tokens of a single page, in whatever order the text layer produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageTokens {
    pub page_number: usize,
    pub tokens: Vec<PositionedToken>,
}

/// The full text layer of a document, pages in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenStream {
    #[serde(default)]
    pub y_axis: YAxis,
    pub pages: Vec<PageTokens>,
}

impl TokenStream {
    pub fn token_count(&self) -> usize {
        self.pages
            .iter()
            .map(|p| p.tokens.iter().filter(|t| t.is_usable()).count())
            .sum()
    }
}

/// Trait for text-layer backends.
pub trait TextLayerSource: Send + Sync {
    /// Turn document bytes into positioned tokens, one entry per page.
    ///
    /// Any backend failure is reported as `SpoleError::DocumentUnreadable`.
    fn read_tokens(&self, bytes: &[u8]) -> Result<TokenStream, SpoleError>;

    /// Name of this backend (for diagnostics).
    fn backend_name(&self) -> &str;
}
