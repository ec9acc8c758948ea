//! Corpus ingestion: load a markdown FAQ and split it into documents.

use super::Document;
use crate::error::{KallError, Result};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info, instrument};

/// Where a corpus comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum CorpusSource {
    /// Fetched over HTTP(S).
    Url(url::Url),
    /// Read from the local filesystem.
    File(std::path::PathBuf),
}

impl CorpusSource {
    /// Interpret a configured source string.
    pub fn parse(source: &str) -> Result<Self> {
        let source = source.trim();
        if source.is_empty() {
            return Err(KallError::Corpus("Corpus source is empty".to_string()));
        }

        match url::Url::parse(source) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(Self::Url(url)),
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(Self::File)
                .map_err(|_| KallError::Corpus(format!("Invalid file URL: {}", source))),
            Ok(url) if url.scheme().len() > 1 => Err(KallError::Corpus(format!(
                "Unsupported corpus scheme: {}",
                url.scheme()
            ))),
            // Plain paths (including Windows drive letters) fail to parse or
            // parse with a one-letter scheme.
            _ => Ok(Self::File(shellexpand::tilde(source).to_string().into())),
        }
    }

    /// Read the raw corpus text.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<String> {
        match self {
            Self::Url(url) => {
                info!("Fetching corpus from {}", url);
                let response = reqwest::get(url.clone()).await?.error_for_status()?;
                Ok(response.text().await?)
            }
            Self::File(path) => {
                info!("Reading corpus from {:?}", path);
                read_file(path).await
            }
        }
    }
}

async fn read_file(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| KallError::Corpus(format!("Failed to read {}: {}", path.display(), e)))
}

fn section_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n##").expect("valid section regex"))
}

/// Split markdown into one document per `##` section.
///
/// Text before the first heading becomes its own document. Blank
/// sections are dropped.
pub fn split_sections(text: &str) -> Vec<Document> {
    let mut starts: Vec<usize> = section_boundary().find_iter(text).map(|m| m.start()).collect();
    starts.insert(0, 0);
    starts.dedup();

    let mut documents = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        let section = text[start..end].trim();
        if !section.is_empty() {
            documents.push(Document::new(section));
        }
    }

    debug!("Split corpus into {} sections", documents.len());
    documents
}

/// Load and split a corpus from a configured source string.
pub async fn load(source: &str) -> Result<Vec<Document>> {
    let text = CorpusSource::parse(source)?.fetch().await?;
    let documents = split_sections(&text);
    if documents.is_empty() {
        return Err(KallError::Corpus(format!("No documents found in {}", source)));
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAQ: &str = "Swiss Air FAQ\n\n## Booking\n\nHow do I book?\n\n## Cancellation\n\nCan I cancel?\n### Fees\nThere is a fee.\n";

    #[test]
    fn test_split_sections() {
        let docs = split_sections(FAQ);
        assert_eq!(docs.len(), 4);
        assert_eq!(docs[0].content, "Swiss Air FAQ");
        assert_eq!(docs[0].title, None);
        assert_eq!(docs[1].title.as_deref(), Some("Booking"));
        assert!(docs[2].content.starts_with("## Cancellation"));
        assert_eq!(docs[3].title.as_deref(), Some("Fees"));
    }

    #[test]
    fn test_split_leading_heading_and_blank_input() {
        let docs = split_sections("\n## A\none\n\n##\n\n## B\ntwo");
        let titles: Vec<_> = docs.iter().map(|d| d.title.clone()).collect();
        assert_eq!(
            titles,
            vec![Some("A".to_string()), None, Some("B".to_string())]
        );
        assert_eq!(docs[0].content, "## A\none");
        assert_eq!(docs[1].content, "##");
        assert!(split_sections("   \n").is_empty());
    }

    #[test]
    fn test_parse_source() {
        assert!(matches!(
            CorpusSource::parse("https://example.com/faq.md").unwrap(),
            CorpusSource::Url(_)
        ));
        assert_eq!(
            CorpusSource::parse("./faq.md").unwrap(),
            CorpusSource::File("./faq.md".into())
        );
        assert!(CorpusSource::parse("ftp://example.com/faq.md").is_err());
        assert!(CorpusSource::parse("  ").is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faq.md");
        std::fs::write(&path, FAQ).unwrap();

        let docs = load(path.to_str().unwrap()).await.unwrap();
        assert_eq!(docs.len(), 4);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let result = load("/definitely/not/here/faq.md").await;
        assert!(matches!(result, Err(KallError::Corpus(_))));
    }
}
