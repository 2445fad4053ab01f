// src/extractors/text.rs
use std::path::Path;

use lopdf::Document;

use crate::utils::error::ExtractError;

/// Text pulled from a single PDF page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    pub page_number: u32,
    pub text: String,
}

/// Extracts the full text of a PDF, page by page in ascending page order.
///
/// lopdf's per-page text is preferred; if it yields nothing for the whole
/// document (custom encodings, Type3 fonts) the whole-document output of
/// `pdf-extract` is used instead.
pub fn extract_full_text(pdf_path: &Path) -> Result<String, ExtractError> {
    tracing::info!("Extracting text from {}", pdf_path.display());

    let pages = read_pages(pdf_path)?;
    for page in pages.iter().filter(|p| p.text.trim().is_empty()) {
        tracing::debug!("Page {} has no extractable text", page.page_number);
    }
    let text = join_pages(&pages);
    if !text.trim().is_empty() {
        tracing::debug!("Extracted {} bytes from {} pages via lopdf", text.len(), pages.len());
        return Ok(text);
    }

    tracing::warn!(
        "lopdf produced no text for {}; falling back to pdf-extract",
        pdf_path.display()
    );
    let fallback = pdf_extract::extract_text(pdf_path)
        .map_err(|e| ExtractError::PdfText(e.to_string()))?;
    if fallback.trim().is_empty() {
        return Err(ExtractError::NoText(pdf_path.display().to_string()));
    }

    Ok(fallback)
}

fn read_pages(pdf_path: &Path) -> Result<Vec<PageText>, ExtractError> {
    let document = Document::load(pdf_path)?;

    let mut pages = Vec::new();
    // get_pages() is a BTreeMap, so iteration is already in page order.
    for page_number in document.get_pages().keys() {
        let text = match document.extract_text(&[*page_number]) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("No text on page {}: {}", page_number, e);
                String::new()
            }
        };
        pages.push(PageText { page_number: *page_number, text });
    }

    Ok(pages)
}

/// Concatenates page texts, each followed by a newline.
pub fn join_pages(pages: &[PageText]) -> String {
    let mut full_text = String::new();
    for page in pages {
        full_text.push_str(&page.text);
        full_text.push('\n');
    }
    full_text
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    fn write_pdf(path: &Path, pages: &[&str]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for line in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![50.into(), 780.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*line)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::from(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn join_pages_appends_newline_per_page() {
        let pages = vec![
            PageText { page_number: 1, text: "Income".to_string() },
            PageText { page_number: 2, text: "Balance".to_string() },
        ];
        assert_eq!(join_pages(&pages), "Income\nBalance\n");
    }

    #[test]
    fn extracts_text_in_page_order() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("statement.pdf");
        write_pdf(&path, &["Statement of profit or loss", "Statement of financial position"]);

        let text = extract_full_text(&path).unwrap();
        let first = text.find("profit or loss").unwrap();
        let second = text.find("financial position").unwrap();
        assert!(first < second);
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = extract_full_text(Path::new("/definitely/not/here.pdf"));
        assert!(matches!(result, Err(ExtractError::Pdf(_))));
    }
}
