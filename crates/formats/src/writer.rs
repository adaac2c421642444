//! Corpus writers mirroring the input formats

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::reader::CorpusFormat;
use crate::Result;
use rapidsift_core::Document;

/// Write documents in the given format.
///
/// Text output is one document per line (internal newlines flattened to
/// spaces); `.jsonl` paths get one object per line, other JSON paths a
/// pretty-printed array.
pub fn write_documents(path: &Path, documents: &[Document], format: CorpusFormat) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        CorpusFormat::Text => {
            for doc in documents {
                let flat = doc.text.replace(['\n', '\r'], " ");
                writeln!(writer, "{flat}")?;
            }
        }
        CorpusFormat::Json => {
            if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
                for doc in documents {
                    serde_json::to_writer(&mut writer, doc)?;
                    writeln!(writer)?;
                }
            } else {
                serde_json::to_writer_pretty(&mut writer, documents)?;
                writeln!(writer)?;
            }
        }
    }

    writer.flush()?;
    info!("Wrote {} documents to {}", documents.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_documents;

    fn sample() -> Vec<Document> {
        vec![
            Document::new("a", "first document\nwith a newline"),
            Document::with_url("b", "second document", "https://example.com/b"),
        ]
    }

    #[test]
    fn test_text_output_one_line_per_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        write_documents(&path, &sample(), CorpusFormat::Text).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "first document with a newline");
    }

    #[test]
    fn test_jsonl_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let docs = sample();
        write_documents(&path, &docs, CorpusFormat::Json).unwrap();

        let back = read_documents(&path, None).unwrap();
        assert_eq!(back, docs);
    }

    #[test]
    fn test_json_array_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let docs = sample();
        write_documents(&path, &docs, CorpusFormat::Json).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.trim_start().starts_with('['));
        let back = read_documents(&path, None).unwrap();
        assert_eq!(back, docs);
    }
}
