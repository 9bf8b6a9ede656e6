//! PDF text extraction.
//!
//! Each page becomes one retrieval unit carrying page metadata. Embedded
//! page images are exported to the configured directory as a side effect;
//! they are not part of the retrievable text.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};
use serde_json::Value;
use tracing::{debug, warn};

use super::ExtractedBlock;
use crate::types::RagError;

/// Extracts one text block per page from a PDF body.
///
/// A document with no pages, or whose pages carry no extractable text at
/// all, is a hard failure rather than a silent empty result.
pub fn extract_pdf(body: &[u8], image_dir: &Path) -> Result<Vec<ExtractedBlock>, RagError> {
    let document = Document::load_mem(body)
        .map_err(|err| RagError::Extraction(format!("malformed pdf: {err}")))?;

    let pages = document.get_pages();
    if pages.is_empty() {
        return Err(RagError::Extraction("pdf contains no pages".to_string()));
    }
    let page_count = pages.len();
    let (title, author) = document_info(&document);

    let mut blocks = Vec::with_capacity(page_count);
    for (page_number, page_id) in &pages {
        if let Err(err) = export_page_images(&document, *page_id, *page_number, image_dir) {
            warn!(page = page_number, error = %err, "image export failed for page");
        }

        let text = match document.extract_text(&[*page_number]) {
            Ok(text) => text,
            Err(err) => {
                debug!(page = page_number, error = %err, "no text stream on page");
                continue;
            }
        };
        let text = text.trim().to_string();
        if text.is_empty() {
            continue;
        }

        let block = ExtractedBlock::new(text)
            .with_field("page", Value::from(*page_number))
            .with_field("page_count", Value::from(page_count))
            .with_field("title", title.clone())
            .with_field("author", author.clone());
        blocks.push(block);
    }

    if blocks.is_empty() {
        return Err(RagError::Extraction(
            "pdf yielded no extractable text".to_string(),
        ));
    }
    Ok(blocks)
}

/// Title and author from the trailer Info dictionary; `Null` when absent so
/// the metadata normalization step can blank them uniformly.
fn document_info(document: &Document) -> (Value, Value) {
    let info = document
        .trailer
        .get(b"Info")
        .ok()
        .map(|object| resolve(document, object))
        .and_then(|object| object.as_dict().ok());

    let field = |key: &[u8]| -> Value {
        info.and_then(|dict| dict.get(key).ok())
            .map(|object| resolve(document, object))
            .and_then(|object| match object {
                Object::String(bytes, _) => Some(Value::String(decode_pdf_string(bytes))),
                _ => None,
            })
            .unwrap_or(Value::Null)
    };

    (field(b"Title"), field(b"Author"))
}

fn export_page_images(
    document: &Document,
    page_id: ObjectId,
    page_number: u32,
    image_dir: &Path,
) -> Result<(), RagError> {
    let (inline_resources, resource_ids) = document.get_page_resources(page_id);

    let mut dictionaries: Vec<&Dictionary> = Vec::new();
    if let Some(dictionary) = inline_resources {
        dictionaries.push(dictionary);
    }
    for id in resource_ids {
        if let Ok(dictionary) = document.get_object(id).and_then(Object::as_dict) {
            dictionaries.push(dictionary);
        }
    }

    let mut index = 0usize;
    for dictionary in dictionaries {
        let Ok(xobjects) = dictionary.get(b"XObject") else {
            continue;
        };
        let Ok(xobjects) = resolve(document, xobjects).as_dict() else {
            continue;
        };
        for (_name, value) in xobjects.iter() {
            let Ok(stream) = resolve(document, value).as_stream() else {
                continue;
            };
            let is_image = stream
                .dict
                .get(b"Subtype")
                .ok()
                .and_then(|object| match object {
                    Object::Name(name) => Some(name.as_slice() == b"Image"),
                    _ => None,
                })
                .unwrap_or(false);
            if !is_image {
                continue;
            }

            std::fs::create_dir_all(image_dir)?;
            let extension = image_extension(&stream.dict);
            let path = image_dir.join(format!("page{page_number}_img{index}.{extension}"));
            std::fs::write(&path, &stream.content)?;
            debug!(path = %path.display(), "exported embedded image");
            index += 1;
        }
    }
    Ok(())
}

fn image_extension(dictionary: &Dictionary) -> &'static str {
    let filter_matches = |target: &[u8]| {
        dictionary
            .get(b"Filter")
            .ok()
            .map(|object| match object {
                Object::Name(name) => name.as_slice() == target,
                Object::Array(items) => items.iter().any(|item| match item {
                    Object::Name(name) => name.as_slice() == target,
                    _ => false,
                }),
                _ => false,
            })
            .unwrap_or(false)
    };

    if filter_matches(b"DCTDecode") {
        "jpg"
    } else if filter_matches(b"JPXDecode") {
        "jp2"
    } else {
        "bin"
    }
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => document.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

/// PDF text strings are either UTF-16BE with a BOM or PDFDocEncoding; the
/// latter is close enough to Latin-1 for lossy UTF-8 handling.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&utf16)
    } else {
        String::from_utf8_lossy(bytes).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Stream, dictionary};
    use tempfile::tempdir;

    fn sample_pdf(lines: &[&str]) -> Vec<u8> {
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

        let mut kids: Vec<Object> = Vec::new();
        for line in lines {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 600.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*line)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().unwrap(),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
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

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn extracts_one_block_per_page() {
        let dir = tempdir().unwrap();
        let body = sample_pdf(&["Alpha page text", "Beta page text"]);
        let blocks = extract_pdf(&body, dir.path()).unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].text.contains("Alpha page text"));
        assert!(blocks[1].text.contains("Beta page text"));
        assert_eq!(blocks[0].metadata.get("page"), Some(&Value::from(1u32)));
        assert_eq!(
            blocks[0].metadata.get("page_count"),
            Some(&Value::from(2usize))
        );
        assert_eq!(blocks[0].metadata.get("title"), Some(&Value::Null));
    }

    #[test]
    fn malformed_pdf_is_an_extraction_error() {
        let dir = tempdir().unwrap();
        let result = extract_pdf(b"not a pdf at all", dir.path());
        assert!(matches!(result, Err(RagError::Extraction(_))));
    }

    #[test]
    fn pdf_without_pages_is_an_extraction_error() {
        let dir = tempdir().unwrap();
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut body = Vec::new();
        doc.save_to(&mut body).unwrap();

        let result = extract_pdf(&body, dir.path());
        assert!(matches!(result, Err(RagError::Extraction(_))));
    }

    #[test]
    fn utf16_strings_decode() {
        let bytes = [0xFE, 0xFF, 0x00, b'H', 0x00, b'i'];
        assert_eq!(decode_pdf_string(&bytes), "Hi");
    }
}
