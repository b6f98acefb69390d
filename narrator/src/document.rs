// Document discovery and paragraph extraction

use crate::error::PipelineError;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

/// File extensions that can be narrated.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "epub", "docx"];

// Attribute groups exclude `/` so self-closing `<w:p .../>` never opens a match.
static DOCX_PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<w:p(?:\s[^>/]*)?>(.*?)</w:p>").expect("valid paragraph regex")
});
static DOCX_TEXT_OR_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<w:t(?:\s[^>/]*)?>(.*?)</w:t>|<w:(?:tab|br|cr)\s*/>")
        .expect("valid run regex")
});
static XML_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("valid entity regex")
});

/// One document to narrate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentJob {
    /// Stable identifier; names the progress log and segment directory
    pub id: String,
    /// Input document
    pub source: PathBuf,
    /// Final WAV file
    pub output: PathBuf,
}

impl DocumentJob {
    /// Build a job whose id is derived from the source path.
    pub fn new(source: impl Into<PathBuf>, output: impl Into<PathBuf>) -> io::Result<Self> {
        let source = source.into();
        let id = document_id(&source)?;
        Ok(Self {
            id,
            source,
            output: output.into(),
        })
    }
}

/// `<sanitised stem>-<8 hex chars of sha256(canonical path)>`.
///
/// The source must exist so that its canonical path can be resolved.
pub fn document_id(source: &Path) -> io::Result<String> {
    let canonical = fs::canonicalize(source)?;
    let digest = Sha256::digest(canonical.to_string_lossy().as_bytes());
    let hash: String = digest.iter().take(4).map(|b| format!("{:02x}", b)).collect();

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut sanitised: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(48)
        .collect();
    if sanitised.is_empty() {
        sanitised.push_str("document");
    }

    Ok(format!("{}-{}", sanitised, hash))
}

/// Whether `path` has an extension this crate can extract.
pub fn is_supported(path: &Path) -> bool {
    extension(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

fn extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

/// Expand input paths into jobs.
///
/// Directories are walked recursively for supported files (sorted by name);
/// files given explicitly must have a supported extension. Outputs land in
/// `output_dir` or next to the source as `<stem>.wav`; when two sources would
/// share an output the later one is named after its document id instead.
pub fn collect_jobs(inputs: &[PathBuf], output_dir: Option<&Path>) -> io::Result<Vec<DocumentJob>> {
    let mut sources = Vec::new();

    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() && is_supported(entry.path()) {
                    sources.push(entry.into_path());
                }
            }
        } else if is_supported(input) {
            sources.push(input.clone());
        } else if !input.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", input.display()),
            ));
        } else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "{} is not a supported document (expected one of: {})",
                    input.display(),
                    SUPPORTED_EXTENSIONS.join(", ")
                ),
            ));
        }
    }

    let mut outputs = HashSet::new();
    let mut jobs = Vec::with_capacity(sources.len());
    for source in sources {
        let dir = match output_dir {
            Some(dir) => dir.to_path_buf(),
            None => source.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        let mut job = DocumentJob::new(&source, dir.join(format!("{}.wav", stem)))?;
        if !outputs.insert(job.output.clone()) {
            job.output = dir.join(format!("{}.wav", job.id));
            log::warn!(
                "{} shares an output name with another input; writing {}",
                source.display(),
                job.output.display()
            );
            outputs.insert(job.output.clone());
        }
        jobs.push(job);
    }

    Ok(jobs)
}

/// Extract the document's paragraphs in reading order.
pub fn extract_paragraphs(path: &Path) -> Result<Vec<String>, PipelineError> {
    let extraction = |message: String| PipelineError::Extraction {
        path: path.to_path_buf(),
        message,
    };

    match extension(path).as_deref() {
        Some("txt") | Some("md") => {
            let text = fs::read_to_string(path).map_err(|e| extraction(e.to_string()))?;
            Ok(split_blocks(&text))
        }
        Some("epub") => read_epub(path).map_err(extraction),
        Some("docx") => read_docx(path).map_err(extraction),
        _ => Err(extraction("unsupported file type".to_string())),
    }
}

/// Split plain text on blank lines; lines inside a block are joined.
fn split_blocks(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }

    paragraphs
}

fn read_epub(path: &Path) -> Result<Vec<String>, String> {
    let mut doc = epub::doc::EpubDoc::new(path).map_err(|e| format!("Failed to open EPUB: {}", e))?;

    let mut paragraphs = Vec::new();
    let spine = doc.spine.clone();
    for spine_item in spine.iter() {
        if let Some((content_bytes, _mime)) = doc.get_resource(&spine_item.idref) {
            let html = String::from_utf8_lossy(&content_bytes);
            let text = html2text::from_read(html.as_bytes(), 1000);
            paragraphs.extend(split_blocks(&text));
        }
    }

    Ok(paragraphs)
}

fn read_docx(path: &Path) -> Result<Vec<String>, String> {
    let file = fs::File::open(path).map_err(|e| e.to_string())?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| format!("Not a DOCX archive: {}", e))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| format!("Missing word/document.xml: {}", e))?
        .read_to_string(&mut xml)
        .map_err(|e| e.to_string())?;

    Ok(docx_paragraphs(&xml))
}

/// One paragraph per `<w:p>`, text from its `<w:t>` runs.
fn docx_paragraphs(xml: &str) -> Vec<String> {
    DOCX_PARAGRAPH
        .captures_iter(xml)
        .map(|paragraph| {
            let body = &paragraph[1];
            let mut text = String::new();
            for run in DOCX_TEXT_OR_BREAK.captures_iter(body) {
                match run.get(1) {
                    Some(t) => text.push_str(&decode_entities(t.as_str())),
                    None => text.push(' '),
                }
            }
            text.trim().to_string()
        })
        .filter(|p| !p.is_empty())
        .collect()
}

fn decode_entities(text: &str) -> String {
    XML_ENTITY
        .replace_all(text, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => {
                    let code = if let Some(hex) = entity.strip_prefix("#x") {
                        u32::from_str_radix(hex, 16).ok()
                    } else if let Some(dec) = entity.strip_prefix('#') {
                        dec.parse().ok()
                    } else {
                        None
                    };
                    code.and_then(char::from_u32)
                }
            };
            decoded.map(String::from).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_docx(path: &Path, document_xml: &str) {
        let file = fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(document_xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn test_split_blocks() {
        let text = "First line\ncontinues here.\n\n\nSecond paragraph.\r\n  \r\nThird.";
        assert_eq!(
            split_blocks(text),
            vec!["First line continues here.", "Second paragraph.", "Third."]
        );
        assert!(split_blocks("\n\n  \n").is_empty());
    }

    #[test]
    fn test_extract_plain_text() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.md");
        fs::write(&path, "# Başlık\n\nBir paragraf.\nDevamı.\n").unwrap();

        let paragraphs = extract_paragraphs(&path).unwrap();
        assert_eq!(paragraphs, vec!["# Başlık", "Bir paragraf. Devamı."]);
    }

    #[test]
    fn test_extract_docx() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("kitap.docx");
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p w:rsidR="00A1"><w:pPr><w:pStyle w:val="Title"/></w:pPr><w:r><w:t>Tom &amp; Jerry</w:t></w:r></w:p>
<w:p><w:r><w:t xml:space="preserve">Bir </w:t></w:r><w:r><w:t>cümle.</w:t><w:tab/><w:t>&#304;kinci &#x3c;b&#x3e;.</w:t></w:r></w:p>
<w:p/>
<w:p><w:r><w:t></w:t></w:r></w:p>
</w:body></w:document>"#;
        write_docx(&path, xml);

        let paragraphs = extract_paragraphs(&path).unwrap();
        assert_eq!(paragraphs, vec!["Tom & Jerry", "Bir cümle. İkinci <b>."]);
    }

    #[test]
    fn test_extract_docx_self_closing_paragraph_stays_separate() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bos.docx");
        let xml = r#"<w:document><w:body>
<w:p w:rsidR="00B2"/>
<w:p><w:r><w:t>Birinci.</w:t></w:r></w:p>
<w:p w:rsidR="00B3" w:rsidRDefault="00B3"/>
<w:p w:rsidR="00B4"><w:r><w:t w:rsidR="1"/><w:t>İkinci.</w:t></w:r></w:p>
</w:body></w:document>"#;
        write_docx(&path, xml);

        let paragraphs = extract_paragraphs(&path).unwrap();
        assert_eq!(paragraphs, vec!["Birinci.", "İkinci."]);
    }

    #[test]
    fn test_extract_docx_not_a_zip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.docx");
        fs::write(&path, "plain text pretending").unwrap();

        let err = extract_paragraphs(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Extraction { .. }));
    }

    #[test]
    fn test_extract_unsupported() {
        let err = extract_paragraphs(Path::new("/tmp/song.mp3")).unwrap_err();
        assert!(err.to_string().contains("unsupported file type"));
    }

    #[test]
    fn test_decode_entities_leaves_unknown() {
        assert_eq!(decode_entities("a &amp; b &nbsp; c"), "a & b &nbsp; c");
        assert_eq!(decode_entities("&#65;&#x42;"), "AB");
    }

    #[test]
    fn test_document_id_is_stable_and_unique() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("My Book (v2).txt");
        let sub = temp_dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        let b = sub.join("My Book (v2).txt");
        fs::write(&a, "x").unwrap();
        fs::write(&b, "x").unwrap();

        let id_a = document_id(&a).unwrap();
        assert_eq!(id_a, document_id(&a).unwrap());
        assert!(id_a.starts_with("My_Book__v2_-"));
        assert_eq!(id_a.len(), "My_Book__v2_-".len() + 8);
        assert_ne!(id_a, document_id(&b).unwrap());
    }

    #[test]
    fn test_document_id_requires_existing_source() {
        assert!(document_id(Path::new("/definitely/not/here.txt")).is_err());
    }

    #[test]
    fn test_collect_jobs_walks_directories() {
        let temp_dir = TempDir::new().unwrap();
        let books = temp_dir.path().join("books");
        fs::create_dir_all(books.join("nested")).unwrap();
        fs::write(books.join("b.txt"), "b").unwrap();
        fs::write(books.join("a.docx"), "a").unwrap();
        fs::write(books.join("cover.png"), "png").unwrap();
        fs::write(books.join("nested").join("c.md"), "c").unwrap();

        let jobs = collect_jobs(&[books.clone()], None).unwrap();
        let sources: Vec<_> = jobs.iter().map(|j| j.source.clone()).collect();
        assert_eq!(
            sources,
            vec![books.join("a.docx"), books.join("b.txt"), books.join("nested").join("c.md")]
        );
        assert_eq!(jobs[2].output, books.join("nested").join("c.wav"));
    }

    #[test]
    fn test_collect_jobs_output_dir_and_collisions() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("out");
        let first = temp_dir.path().join("story.txt");
        let second = temp_dir.path().join("story.md");
        fs::write(&first, "1").unwrap();
        fs::write(&second, "2").unwrap();

        let jobs = collect_jobs(&[first, second], Some(&out)).unwrap();
        assert_eq!(jobs[0].output, out.join("story.wav"));
        assert_eq!(jobs[1].output, out.join(format!("{}.wav", jobs[1].id)));
    }

    #[test]
    fn test_collect_jobs_rejects_unsupported_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("song.mp3");
        fs::write(&path, "x").unwrap();

        let err = collect_jobs(&[path], None).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
