use crate::extraction::{PageTokens, PositionedToken, TokenStream, YAxis};
use serde::{Deserialize, Serialize};

/// Font height assumed when the text layer reports zero-height tokens.
const FALLBACK_HEIGHT: f32 = 10.0;

/// Geometry thresholds for grouping tokens, as fractions of the page's
/// dominant token height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutOptions {
    /// Max distance between vertical centers of tokens on the same line.
    pub line_tolerance: f32,
    /// Horizontal gap above which a space is inserted between tokens.
    pub word_gap: f32,
    /// Horizontal gap above which a new cell starts.
    pub cell_gap: f32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        LayoutOptions {
            line_tolerance: 0.5,
            word_gap: 0.1,
            cell_gap: 0.8,
        }
    }
}

/// A run of tokens on a line separated from its neighbours by a wide gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub text: String,
    pub x_min: f32,
    pub x_max: f32,
    /// Byte range of this cell within the line's `joined_text`.
    pub start: usize,
    pub end: usize,
}

impl Cell {
    pub fn center(&self) -> f32 {
        (self.x_min + self.x_max) / 2.0
    }
}

/// A whitespace-separated piece of text with its estimated horizontal center.
#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    pub text: String,
    pub x: f32,
    pub cell: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub page_number: usize,
    /// Position of the line on its page, top to bottom.
    pub line_index: usize,
    /// Mean vertical center of the tokens, in page coordinates.
    pub y: f32,
    pub tokens: Vec<PositionedToken>,
    pub joined_text: String,
    /// ASCII-lowercased `joined_text`; byte offsets are shared with it.
    pub match_text: String,
    pub cells: Vec<Cell>,
    token_starts: Vec<usize>,
}

impl TextLine {
    /// Index of the cell containing (or starting after) a byte offset.
    pub fn cell_at(&self, offset: usize) -> Option<usize> {
        self.cells.iter().position(|c| offset < c.end)
    }

    /// Pieces of text at or after `offset`, with x centers interpolated
    /// inside their token.
    pub fn pieces_from(&self, offset: usize) -> Vec<Piece> {
        let mut pieces = Vec::new();

        for (token, &start) in self.tokens.iter().zip(&self.token_starts) {
            let end = start + token.text.len();
            if end <= offset {
                continue;
            }
            let skip = offset.saturating_sub(start);
            let total_chars = token.text.chars().count().max(1) as f32;
            let cell = self.cell_at(start.max(offset)).unwrap_or(0);

            let mut chars_before = token.text[..skip].chars().count();
            for word in token.text[skip..].split_inclusive(char::is_whitespace) {
                let word_chars = word.chars().count();
                let trimmed = word.trim();
                if !trimmed.is_empty() {
                    let mid = chars_before as f32 + trimmed.chars().count() as f32 / 2.0;
                    pieces.push(Piece {
                        text: trimmed.to_string(),
                        x: token.x + token.width * (mid / total_chars),
                        cell,
                    });
                }
                chars_before += word_chars;
            }
        }

        pieces
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Assemble the lines of every page, in page order.
pub fn assemble_lines(stream: &TokenStream, options: &LayoutOptions) -> Vec<TextLine> {
    let mut pages: Vec<&PageTokens> = stream.pages.iter().collect();
    pages.sort_by_key(|p| p.page_number);

    pages
        .into_iter()
        .flat_map(|page| assemble_page(page, stream.y_axis, options))
        .collect()
}

/// Cluster one page's tokens into lines, top to bottom.
pub fn assemble_page(page: &PageTokens, y_axis: YAxis, options: &LayoutOptions) -> Vec<TextLine> {
    let mut tokens: Vec<PositionedToken> = page
        .tokens
        .iter()
        .filter(|t| t.is_usable())
        .map(|t| PositionedToken {
            text: t.text.trim().to_string(),
            ..t.clone()
        })
        .collect();

    if tokens.is_empty() {
        return Vec::new();
    }

    let height = dominant_height(&tokens);
    let key = |t: &PositionedToken| match y_axis {
        YAxis::TopDown => t.center_y(),
        YAxis::BottomUp => -t.center_y(),
    };

    tokens.sort_by(|a, b| key(a).total_cmp(&key(b)).then(a.x.total_cmp(&b.x)));

    let tolerance = options.line_tolerance * height;
    let mut groups: Vec<Vec<PositionedToken>> = Vec::new();
    let mut anchor = f32::NEG_INFINITY;

    for token in tokens {
        let k = key(&token);
        match groups.last_mut() {
            Some(group) if k - anchor < tolerance => group.push(token),
            _ => {
                anchor = k;
                groups.push(vec![token]);
            }
        }
    }

    let lines: Vec<TextLine> = groups
        .into_iter()
        .enumerate()
        .map(|(i, group)| build_line(page.page_number, i, group, height, options))
        .collect();

    tracing::debug!(
        page = page.page_number,
        lines = lines.len(),
        height,
        "assembled page lines"
    );
    lines
}

fn build_line(
    page_number: usize,
    line_index: usize,
    mut tokens: Vec<PositionedToken>,
    height: f32,
    options: &LayoutOptions,
) -> TextLine {
    tokens.sort_by(|a, b| a.x.total_cmp(&b.x));

    let word_gap = options.word_gap * height;
    let cell_gap = options.cell_gap * height;

    let mut joined_text = String::new();
    let mut token_starts = Vec::with_capacity(tokens.len());
    let mut cells: Vec<Cell> = Vec::new();
    let mut prev_end: Option<f32> = None;

    for token in &tokens {
        let gap = prev_end.map(|end| token.x - end);
        let new_cell = gap.is_none_or(|g| g > cell_gap);

        if gap.is_some_and(|g| g > word_gap) {
            joined_text.push(' ');
        }
        let start = joined_text.len();
        token_starts.push(start);
        joined_text.push_str(&token.text);

        if new_cell {
            cells.push(Cell {
                text: String::new(),
                x_min: token.x,
                x_max: token.x_max(),
                start,
                end: joined_text.len(),
            });
        } else if let Some(cell) = cells.last_mut() {
            cell.x_max = cell.x_max.max(token.x_max());
            cell.end = joined_text.len();
        }

        prev_end = Some(prev_end.map_or(token.x_max(), |e| e.max(token.x_max())));
    }

    for cell in &mut cells {
        cell.text = joined_text[cell.start..cell.end].to_string();
    }

    let y = tokens.iter().map(|t| t.center_y()).sum::<f32>() / tokens.len() as f32;

    TextLine {
        page_number,
        line_index,
        y,
        match_text: joined_text.to_ascii_lowercase(),
        joined_text,
        cells,
        tokens,
        token_starts,
    }
}

/// Median token height, ignoring zero-height tokens.
fn dominant_height(tokens: &[PositionedToken]) -> f32 {
    let mut heights: Vec<f32> = tokens
        .iter()
        .map(|t| t.height)
        .filter(|h| *h > 0.0)
        .collect();
    if heights.is_empty() {
        return FALLBACK_HEIGHT;
    }
    heights.sort_by(|a, b| a.total_cmp(b));
    heights[heights.len() / 2]
}
