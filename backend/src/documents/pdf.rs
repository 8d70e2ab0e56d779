//! Plain-text to PDF rendering (A4, Helvetica)

use printpdf::{BuiltinFont, Mm, PdfDocument};

use crate::error::{AppError, AppResult};

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const FONT_SIZE: f32 = 11.0;
const LINE_HEIGHT_MM: f32 = 5.5;
/// Helvetica 11pt fits roughly this many characters in 170 mm
const WRAP_COLUMNS: usize = 90;

/// Wrap text to `width` characters per line, keeping blank lines.
///
/// Words longer than a line are split.
pub fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        if paragraph.trim().is_empty() {
            lines.push(String::new());
            continue;
        }

        let indent: String = paragraph.chars().take_while(|c| c.is_whitespace()).collect();
        let mut current = indent.clone();

        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if !current.trim().is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                lines.push(word.drain(..width).collect());
            }
            let word: String = word.into_iter().collect();

            let needed = if current.trim().is_empty() {
                current.chars().count() + word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };

            if needed > width && !current.trim().is_empty() {
                lines.push(std::mem::replace(&mut current, indent.clone()));
            }
            if !current.trim().is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }

        if !current.trim().is_empty() {
            lines.push(current);
        }
    }

    lines
}

/// Number of text lines that fit on one page
pub fn lines_per_page() -> usize {
    ((PAGE_HEIGHT_MM - 2.0 * MARGIN_MM) / LINE_HEIGHT_MM).floor() as usize
}

/// Render text as a paginated A4 PDF
pub fn render_text_pdf(title: &str, text: &str) -> AppResult<Vec<u8>> {
    let lines = wrap_lines(text, WRAP_COLUMNS);
    let per_page = lines_per_page();

    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| AppError::Document(format!("font: {}", e)))?;

    let chunks: Vec<&[String]> = if lines.is_empty() {
        vec![&lines[..]]
    } else {
        lines.chunks(per_page).collect()
    };

    for (index, chunk) in chunks.iter().enumerate() {
        let (page, layer) = if index == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1")
        };
        let layer = doc.get_page(page).get_layer(layer);

        let mut y = PAGE_HEIGHT_MM - MARGIN_MM;
        for line in chunk.iter() {
            if !line.is_empty() {
                layer.use_text(line.as_str(), FONT_SIZE, Mm(MARGIN_MM), Mm(y), &font);
            }
            y -= LINE_HEIGHT_MM;
        }
    }

    doc.save_to_bytes()
        .map_err(|e| AppError::Document(format!("pdf: {}", e)))
}
