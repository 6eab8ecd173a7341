use super::{ClassificationError, TextExtractor};

/// Text layer of a digital PDF via pdf-extract, pages joined with blank lines.
///
/// Scanned PDFs without a text layer come back empty.
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, ClassificationError> {
        let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| ClassificationError::PdfParsing(e.to_string()))?;

        Ok(pages
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_pdf(lines: &[&str]) -> Vec<u8> {
        use lopdf::dictionary;
        use lopdf::{Document, Object, Stream};

        let mut doc = Document::with_version("1.4");
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut page_ids = Vec::new();
        for line in lines {
            let content = format!("BT /F1 12 Tf 72 720 Td ({line}) Tj ET");
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            });
            page_ids.push(page_id);
        }

        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| Object::from(*id)).collect::<Vec<_>>(),
            "Count" => page_ids.len() as i64,
        });
        for id in &page_ids {
            if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(*id) {
                dict.set("Parent", pages_id);
            }
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn extracts_text_from_every_page() {
        let bytes = make_test_pdf(&["Attestation de travail", "Signature RH"]);
        let text = PdfTextExtractor.extract_text(&bytes).unwrap();
        assert!(text.contains("Attestation"), "got: {text}");
        assert!(text.contains("Signature"), "got: {text}");
    }

    #[test]
    fn garbage_bytes_are_a_parsing_error() {
        assert!(matches!(
            PdfTextExtractor.extract_text(b"not a pdf"),
            Err(ClassificationError::PdfParsing(_))
        ));
    }
}
