use crate::error::IngestError;
use crate::models::{PageText, PdfDocument};
use lopdf::Document;
use tracing::debug;

pub trait PdfExtractor {
    fn extract_pages(&self, document: &PdfDocument) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, document: &PdfDocument) -> Result<Vec<PageText>, IngestError> {
        let parse_error = |error: lopdf::Error| IngestError::PdfParse {
            document: document.name.clone(),
            reason: error.to_string(),
        };

        let pdf = Document::load_mem(&document.bytes).map_err(parse_error)?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in pdf.get_pages() {
            let text = pdf.extract_text(&[page_no]).map_err(parse_error)?;
            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        Ok(pages)
    }
}

/// Concatenates the text of every page of every document, in upload order.
///
/// No separator is inserted between pages or documents. The first document that
/// cannot be read aborts the whole extraction.
pub fn extract_text<E>(documents: &[PdfDocument], extractor: &E) -> Result<String, IngestError>
where
    E: PdfExtractor + ?Sized,
{
    if documents.is_empty() {
        return Err(IngestError::NoDocuments);
    }

    let mut text = String::new();
    for document in documents {
        let pages = extractor.extract_pages(document)?;
        debug!(document = %document.name, pages = pages.len(), "extracted pdf");
        for page in pages {
            text.push_str(&page.text);
        }
    }

    Ok(text)
}


#[cfg(test)]
mod tests {
    use super::fixtures::pdf_with_pages;
    use super::*;

    struct StaticExtractor;

    impl PdfExtractor for StaticExtractor {
        fn extract_pages(&self, document: &PdfDocument) -> Result<Vec<PageText>, IngestError> {
            if document.name == "broken.pdf" {
                return Err(IngestError::PdfParse {
                    document: document.name.clone(),
                    reason: "corrupt xref".to_string(),
                });
            }
            let text = String::from_utf8_lossy(&document.bytes).to_string();
            Ok(text
                .split('|')
                .enumerate()
                .map(|(index, page)| PageText {
                    number: index as u32 + 1,
                    text: page.to_string(),
                })
                .collect())
        }
    }

    #[test]
    fn pages_are_concatenated_in_upload_order_without_separator() {
        let documents = vec![
            PdfDocument::new("a.pdf", b"one|two".to_vec()),
            PdfDocument::new("b.pdf", b"three".to_vec()),
        ];

        let text = extract_text(&documents, &StaticExtractor).unwrap();
        assert_eq!(text, "onetwothree");
    }

    #[test]
    fn failing_document_is_named_in_the_error() {
        let documents = vec![
            PdfDocument::new("a.pdf", b"fine".to_vec()),
            PdfDocument::new("broken.pdf", Vec::new()),
        ];

        match extract_text(&documents, &StaticExtractor) {
            Err(IngestError::PdfParse { document, .. }) => assert_eq!(document, "broken.pdf"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn empty_document_set_is_rejected() {
        assert!(matches!(
            extract_text(&[], &StaticExtractor),
            Err(IngestError::NoDocuments)
        ));
    }

    #[test]
    fn lopdf_rejects_garbage_bytes() {
        let document = PdfDocument::new("garbage.pdf", b"%PDF-1.4\n%broken".to_vec());
        let error = LopdfExtractor.extract_pages(&document).unwrap_err();
        assert!(error.to_string().contains("garbage.pdf"));
    }

    #[test]
    fn lopdf_reads_every_page_in_order() {
        let bytes = pdf_with_pages(&["Hello first page", "Hello second page"]);
        let document = PdfDocument::new("built.pdf", bytes);

        let pages = LopdfExtractor.extract_pages(&document).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert!(pages[0].text.contains("first"));
        assert!(pages[1].text.contains("second"));
    }
}
