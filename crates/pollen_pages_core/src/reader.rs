//! crates/pollen_pages_core/src/reader.rs
//!
//! The reader state: the active book, the page cursor, and the
//! "generation in progress" flag.

use crate::{
    domain::{Book, Page},
    error::GenerationError,
};

/// Owns the active book and the cursor into it.
///
/// The cursor is always a valid index into the active book's pages, or 0
/// when no book is installed.
#[derive(Debug, Default)]
pub struct ReaderState {
    book: Option<Book>,
    cursor: usize,
    generating: bool,
}

impl ReaderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn book(&self) -> Option<&Book> {
        self.book.as_ref()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current_page(&self) -> Option<&Page> {
        self.book.as_ref()?.pages.get(self.cursor)
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    fn page_count(&self) -> usize {
        self.book.as_ref().map_or(0, |book| book.pages.len())
    }

    //=====================================================================================
    // Navigation
    //=====================================================================================

    /// Moves to the next page. Returns `false` (and does nothing) on the last page.
    pub fn next_page(&mut self) -> bool {
        if self.cursor + 1 < self.page_count() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    /// Moves to the previous page. Returns `false` (and does nothing) on the first page.
    pub fn prev_page(&mut self) -> bool {
        if self.cursor > 0 {
            self.cursor -= 1;
            true
        } else {
            false
        }
    }

    /// Jumps to `index`. Out-of-range indexes are ignored.
    pub fn jump_to_page(&mut self, index: usize) -> bool {
        if index < self.page_count() {
            self.cursor = index;
            true
        } else {
            false
        }
    }

    //=====================================================================================
    // Generation lifecycle
    //=====================================================================================

    /// Marks a generation as started. Rejects a second concurrent attempt.
    pub fn begin_generation(&mut self) -> Result<(), GenerationError> {
        if self.generating {
            return Err(GenerationError::GenerationInProgress);
        }
        self.generating = true;
        Ok(())
    }

    /// Clears the in-flight flag without touching the book.
    pub fn abort_generation(&mut self) {
        self.generating = false;
    }

    /// Installs a finished book, resets the cursor, and clears the in-flight flag.
    pub fn install(&mut self, book: Book) {
        self.book = Some(book);
        self.cursor = 0;
        self.generating = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn book(pages: u32) -> Book {
        Book {
            title: "T".into(),
            pages: (1..=pages)
                .map(|n| Page::new(n, format!("text {n}"), format!("prompt {n}")))
                .collect(),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn navigation_stays_in_bounds() {
        let mut reader = ReaderState::new();
        reader.install(book(3));

        assert!(!reader.prev_page());
        assert_eq!(reader.cursor(), 0);

        assert!(reader.next_page());
        assert!(reader.next_page());
        assert!(!reader.next_page());
        assert_eq!(reader.cursor(), 2);
        assert_eq!(reader.current_page().unwrap().page_number, 3);

        assert!(!reader.jump_to_page(3));
        assert!(!reader.jump_to_page(usize::MAX));
        assert_eq!(reader.cursor(), 2);

        assert!(reader.jump_to_page(1));
        assert_eq!(reader.cursor(), 1);
    }

    #[test]
    fn navigation_without_book_is_noop() {
        let mut reader = ReaderState::new();
        assert!(!reader.next_page());
        assert!(!reader.prev_page());
        assert!(!reader.jump_to_page(0));
        assert!(reader.current_page().is_none());
    }

    #[test]
    fn install_resets_cursor() {
        let mut reader = ReaderState::new();
        reader.install(book(4));
        reader.jump_to_page(3);
        reader.install(book(2));
        assert_eq!(reader.cursor(), 0);
        assert_eq!(reader.book().unwrap().pages.len(), 2);
    }

    #[test]
    fn second_generation_is_rejected() {
        let mut reader = ReaderState::new();
        reader.begin_generation().unwrap();
        assert!(matches!(
            reader.begin_generation(),
            Err(GenerationError::GenerationInProgress)
        ));
        reader.abort_generation();
        assert!(reader.begin_generation().is_ok());
    }
}
