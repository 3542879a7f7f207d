//! crates/pollen_pages_core/src/archive.rs
//!
//! Packages a finished book into a zip archive: one text entry per page,
//! the page's illustration (or a placeholder explaining why it is missing),
//! and a manifest.

use crate::{
    domain::{Book, Page},
    error::ArchiveError,
    ports::ImageService,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::io::{Cursor, Write};
use std::sync::Arc;
use tracing::{info, warn};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

/// Folder name used when the title has no usable characters.
pub const DEFAULT_FOLDER: &str = "storybook";

pub const MANIFEST_FILE: &str = "manifest.txt";

/// Derives the archive's top-level folder from a book title: characters
/// other than alphanumerics and whitespace are dropped and whitespace runs
/// become a single `_`.
pub fn folder_name(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    let name = kept.split_whitespace().collect::<Vec<_>>().join("_");
    if name.is_empty() {
        DEFAULT_FOLDER.to_string()
    } else {
        name
    }
}

fn page_text(page: &Page) -> String {
    format!(
        "Page {}\n\n{}\n\n---\nIllustration prompt: {}\n",
        page.page_number, page.text, page.illustration_prompt
    )
}

fn manifest(book: &Book, exported_at: DateTime<Utc>) -> String {
    format!(
        "Title: {}\nPages: {}\nGenerated: {}\nExported: {}\nCreated with PollenPages\n",
        book.title,
        book.pages.len(),
        book.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        exported_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

/// What was fetched for one page's illustration.
enum Illustration {
    Image(Bytes),
    Missing(String),
}

/// Builds zip archives of books, fetching illustrations through the
/// `ImageService` port.
#[derive(Clone)]
pub struct BookArchiver {
    images: Arc<dyn ImageService>,
}

impl BookArchiver {
    pub fn new(images: Arc<dyn ImageService>) -> Self {
        Self { images }
    }

    /// Produces the archive bytes. Image fetch failures degrade to a
    /// `page<N>_error.txt` entry; only packaging failures are errors.
    pub async fn archive(&self, book: &Book) -> Result<Vec<u8>, ArchiveError> {
        let mut illustrations = Vec::with_capacity(book.pages.len());
        for page in &book.pages {
            illustrations.push(self.fetch_illustration(page).await);
        }
        let bytes = write_archive(book, &illustrations, Utc::now())?;
        info!(pages = book.pages.len(), size = bytes.len(), "Archive built.");
        Ok(bytes)
    }

    async fn fetch_illustration(&self, page: &Page) -> Illustration {
        let Some(url) = page.image_url.as_deref() else {
            return Illustration::Missing("no illustration was generated for this page".to_string());
        };
        match self.images.fetch_image(url).await {
            Ok(bytes) if !bytes.is_empty() => Illustration::Image(bytes),
            Ok(_) => Illustration::Missing("the image service returned an empty body".to_string()),
            Err(e) => {
                warn!(page = page.page_number, "Illustration fetch failed: {}", e);
                Illustration::Missing(e.to_string())
            }
        }
    }
}

fn write_archive(
    book: &Book,
    illustrations: &[Illustration],
    exported_at: DateTime<Utc>,
) -> Result<Vec<u8>, ArchiveError> {
    let folder = folder_name(&book.title);
    let text_options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let image_options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.add_directory(format!("{folder}/"), SimpleFileOptions::default())?;

    // Entries are named by position; model-supplied page numbers may repeat.
    for (index, (page, illustration)) in book.pages.iter().zip(illustrations).enumerate() {
        let n = index + 1;

        zip.start_file(format!("{folder}/page{n}.txt"), text_options)?;
        zip.write_all(page_text(page).as_bytes())?;

        match illustration {
            Illustration::Image(bytes) => {
                zip.start_file(format!("{folder}/page{n}.png"), image_options)?;
                zip.write_all(bytes)?;
            }
            Illustration::Missing(reason) => {
                zip.start_file(format!("{folder}/page{n}_error.txt"), text_options)?;
                zip.write_all(
                    format!("The illustration for page {n} could not be fetched.\nReason: {reason}\n")
                        .as_bytes(),
                )?;
            }
        }
    }

    zip.start_file(format!("{folder}/{MANIFEST_FILE}"), text_options)?;
    zip.write_all(manifest(book, exported_at).as_bytes())?;

    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;
    use std::io::Read;
    use zip::ZipArchive;

    /// Serves a fixed PNG-ish body for every URL except those containing "broken".
    struct FakeImages;

    #[async_trait]
    impl ImageService for FakeImages {
        async fn fetch_image(&self, url: &str) -> PortResult<Bytes> {
            if url.contains("broken") {
                Err(PortError::Upstream { status: 502 })
            } else {
                Ok(Bytes::from_static(b"\x89PNG fake"))
            }
        }
    }

    fn book(urls: &[Option<&str>]) -> Book {
        Book {
            title: "The Brave   Little Fox!".into(),
            pages: urls
                .iter()
                .enumerate()
                .map(|(i, url)| {
                    let mut page = Page::new(i as u32 + 1, format!("Story {}", i + 1), "a fox".into());
                    page.image_url = url.map(str::to_string);
                    page
                })
                .collect(),
            generated_at: Utc::now(),
        }
    }

    fn entry_names(bytes: Vec<u8>) -> Vec<String> {
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    #[test]
    fn folder_name_strips_and_collapses() {
        assert_eq!(folder_name("The Brave   Little Fox!"), "The_Brave_Little_Fox");
        assert_eq!(folder_name("  Émile's\tday "), "Émiles_day");
        assert_eq!(folder_name("?!"), DEFAULT_FOLDER);
        assert_eq!(folder_name(""), DEFAULT_FOLDER);
    }

    #[tokio::test]
    async fn every_page_gets_text_and_image_or_placeholder() {
        let archiver = BookArchiver::new(Arc::new(FakeImages));
        let book = book(&[Some("https://img/1"), Some("https://img/broken"), None]);
        let mut names = entry_names(archiver.archive(&book).await.unwrap());
        names.sort();

        let folder = "The_Brave_Little_Fox";
        let mut expected = vec![
            format!("{folder}/"),
            format!("{folder}/manifest.txt"),
            format!("{folder}/page1.png"),
            format!("{folder}/page1.txt"),
            format!("{folder}/page2.txt"),
            format!("{folder}/page2_error.txt"),
            format!("{folder}/page3.txt"),
            format!("{folder}/page3_error.txt"),
        ];
        expected.sort();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn entry_counts_match_page_count() {
        let archiver = BookArchiver::new(Arc::new(FakeImages));
        let book = book(&[Some("https://img/1"), Some("https://img/broken"), Some("https://img/3"), Some("https://img/broken")]);
        let names = entry_names(archiver.archive(&book).await.unwrap());

        let pages = names.iter().filter(|n| n.ends_with(".txt") && !n.ends_with("_error.txt") && !n.ends_with(MANIFEST_FILE)).count();
        let images = names.iter().filter(|n| n.ends_with(".png")).count();
        let placeholders = names.iter().filter(|n| n.ends_with("_error.txt")).count();
        let manifests = names.iter().filter(|n| n.ends_with(MANIFEST_FILE)).count();

        assert_eq!(pages, 4);
        assert_eq!(images, 2);
        assert_eq!(placeholders, 2);
        assert_eq!(images + placeholders, 4);
        assert_eq!(manifests, 1);
    }

    #[tokio::test]
    async fn repeated_page_numbers_still_archive() {
        let archiver = BookArchiver::new(Arc::new(FakeImages));
        let mut book = book(&[Some("https://img/1"), Some("https://img/broken")]);
        for page in &mut book.pages {
            page.page_number = 1;
        }
        let names = entry_names(archiver.archive(&book).await.unwrap());

        let folder = "The_Brave_Little_Fox";
        assert!(names.contains(&format!("{folder}/page1.txt")));
        assert!(names.contains(&format!("{folder}/page1.png")));
        assert!(names.contains(&format!("{folder}/page2.txt")));
        assert!(names.contains(&format!("{folder}/page2_error.txt")));
    }

    #[tokio::test]
    async fn page_and_manifest_contents() {
        let archiver = BookArchiver::new(Arc::new(FakeImages));
        let book = book(&[Some("https://img/1")]);
        let bytes = archiver.archive(&book).await.unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

        let mut page = String::new();
        archive
            .by_name("The_Brave_Little_Fox/page1.txt")
            .unwrap()
            .read_to_string(&mut page)
            .unwrap();
        assert!(page.contains("Story 1"));
        assert!(page.contains("Illustration prompt: a fox"));

        let mut manifest = String::new();
        archive
            .by_name("The_Brave_Little_Fox/manifest.txt")
            .unwrap()
            .read_to_string(&mut manifest)
            .unwrap();
        assert!(manifest.contains("Title: The Brave   Little Fox!"));
        assert!(manifest.contains("Pages: 1"));
        assert!(manifest.contains("Generated: "));

        let mut image = Vec::new();
        archive
            .by_name("The_Brave_Little_Fox/page1.png")
            .unwrap()
            .read_to_end(&mut image)
            .unwrap();
        assert_eq!(image, b"\x89PNG fake");
    }
}
