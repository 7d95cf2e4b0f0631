use crate::error::SpoleError;
use crate::extraction::{PageTokens, PositionedToken, TextLayerSource, TokenStream, YAxis};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::Write;
use std::process::Command;

/// Text-layer backend using pdftotext (from poppler-utils).
///
/// Runs `pdftotext -bbox`, which emits one `<word>` element with its bounding
/// box per word, in a top-down page coordinate system.
pub struct PdftotextSource;

impl PdftotextSource {
    pub fn new() -> Self {
        PdftotextSource
    }

    /// Check if pdftotext is available on the system.
    pub fn is_available() -> bool {
        Command::new("pdftotext")
            .arg("-v")
            .output()
            .map(|o| o.status.success() || !o.stderr.is_empty())
            .unwrap_or(false)
    }
}

impl Default for PdftotextSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayerSource for PdftotextSource {
    fn read_tokens(&self, pdf_bytes: &[u8]) -> Result<TokenStream, SpoleError> {
        let mut tmpfile = tempfile::NamedTempFile::new()
            .map_err(|e| SpoleError::DocumentUnreadable(e.to_string()))?;
        tmpfile
            .write_all(pdf_bytes)
            .map_err(|e| SpoleError::DocumentUnreadable(e.to_string()))?;

        let output = Command::new("pdftotext")
            .arg("-bbox")
            .arg(tmpfile.path())
            .arg("-")
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    SpoleError::DocumentUnreadable(
                        "pdftotext not found. Install poppler: brew install poppler (macOS) or apt install poppler-utils (Linux)".into(),
                    )
                } else {
                    SpoleError::DocumentUnreadable(format!("pdftotext failed: {e}"))
                }
            })?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SpoleError::DocumentUnreadable(format!(
                "pdftotext exited with code {code}: {}",
                stderr.trim()
            )));
        }

        let xml = String::from_utf8_lossy(&output.stdout);
        let stream = parse_bbox_xml(&xml)?;
        tracing::debug!(
            pages = stream.pages.len(),
            tokens = stream.token_count(),
            "pdftotext text layer read"
        );
        Ok(stream)
    }

    fn backend_name(&self) -> &str {
        "pdftotext"
    }
}

#[derive(Default)]
struct WordBox {
    x_min: f32,
    y_min: f32,
    x_max: f32,
    y_max: f32,
    text: String,
}

/// Parse the XHTML document written by `pdftotext -bbox`.
fn parse_bbox_xml(xml: &str) -> Result<TokenStream, SpoleError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut pages: Vec<PageTokens> = Vec::new();
    let mut word: Option<WordBox> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            SpoleError::DocumentUnreadable(format!(
                "malformed pdftotext output at byte {}: {e}",
                reader.buffer_position()
            ))
        })?;

        match event {
            Event::Start(e) if e.name().as_ref() == b"page" => {
                pages.push(PageTokens {
                    page_number: pages.len() + 1,
                    tokens: Vec::new(),
                });
            }
            Event::Empty(e) if e.name().as_ref() == b"page" => {
                pages.push(PageTokens {
                    page_number: pages.len() + 1,
                    tokens: Vec::new(),
                });
            }
            Event::Start(e) if e.name().as_ref() == b"word" => {
                word = Some(parse_word_box(&e)?);
            }
            Event::Text(t) => {
                if let Some(w) = word.as_mut() {
                    let text = t.unescape().map_err(|e| {
                        SpoleError::DocumentUnreadable(format!("bad word text: {e}"))
                    })?;
                    w.text.push_str(&text);
                }
            }
            Event::End(e) if e.name().as_ref() == b"word" => {
                if let (Some(w), Some(page)) = (word.take(), pages.last_mut()) {
                    page.tokens.push(PositionedToken {
                        text: w.text,
                        x: w.x_min,
                        y: w.y_min,
                        width: (w.x_max - w.x_min).max(0.0),
                        height: (w.y_max - w.y_min).max(0.0),
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(TokenStream {
        y_axis: YAxis::TopDown,
        pages,
    })
}

fn parse_word_box(tag: &BytesStart<'_>) -> Result<WordBox, SpoleError> {
    let mut word = WordBox::default();
    for attr in tag.attributes() {
        let attr =
            attr.map_err(|e| SpoleError::DocumentUnreadable(format!("bad word attribute: {e}")))?;
        let value = attr
            .unescape_value()
            .map_err(|e| SpoleError::DocumentUnreadable(format!("bad word attribute: {e}")))?;
        let number: f32 = value.trim().parse().unwrap_or(f32::NAN);
        match attr.key.as_ref() {
            b"xMin" => word.x_min = number,
            b"yMin" => word.y_min = number,
            b"xMax" => word.x_max = number,
            b"yMax" => word.y_max = number,
            _ => {}
        }
    }
    Ok(word)
}
