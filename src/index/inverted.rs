//! Inverted index: for each word ID, where it occurs.
//!
//! Two projections are kept side by side: the full positional hit sets and
//! the plain file-ID sets used for fast conjunctive intersection. Every
//! mutation updates both, so `files(w)` is always exactly the set of file
//! IDs appearing in `postings(w)`.

use ahash::{AHashMap, AHashSet};

use crate::error::{FindexError, Result};
use crate::index::{FileId, Posting, WordId};

#[derive(Debug, Default)]
pub struct InvertedIndex {
    postings: AHashMap<WordId, AHashSet<Posting>>,
    files: AHashMap<WordId, AHashSet<FileId>>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        InvertedIndex::default()
    }

    /// Insert one positional hit, updating both projections.
    pub fn add_posting(&mut self, word_id: WordId, posting: Posting) {
        self.postings.entry(word_id).or_default().insert(posting);
        self.files.entry(word_id).or_default().insert(posting.file_id);
    }

    /// Drop every hit of `word_id` in `file_id` from both projections.
    ///
    /// The word's sets stay allocated even when they become empty; word IDs
    /// live forever once created.
    pub fn clear_word_file(&mut self, word_id: WordId, file_id: FileId) -> Result<()> {
        let hits = self
            .postings
            .get_mut(&word_id)
            .ok_or(FindexError::UnknownWord)?;
        hits.retain(|posting| posting.file_id != file_id);

        if let Some(file_set) = self.files.get_mut(&word_id) {
            file_set.remove(&file_id);
        }

        Ok(())
    }

    /// All positional hits of a word.
    pub fn postings(&self, word_id: WordId) -> Result<&AHashSet<Posting>> {
        self.postings.get(&word_id).ok_or(FindexError::UnknownWord)
    }

    /// The file-ID projection of a word.
    pub fn files(&self, word_id: WordId) -> Result<&AHashSet<FileId>> {
        self.files.get(&word_id).ok_or(FindexError::UnknownWord)
    }

    pub fn contains(&self, word_id: WordId) -> bool {
        self.files.contains_key(&word_id)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn clear(&mut self) {
        self.postings.clear();
        self.files.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projection_consistent(index: &InvertedIndex, word_id: WordId) -> bool {
        let from_hits: AHashSet<FileId> = index
            .postings(word_id)
            .unwrap()
            .iter()
            .map(|posting| posting.file_id)
            .collect();
        from_hits == *index.files(word_id).unwrap()
    }

    #[test]
    fn test_add_updates_both_projections() {
        let mut index = InvertedIndex::new();
        index.add_posting(1, Posting::new(10, 1));
        index.add_posting(1, Posting::new(10, 4));
        index.add_posting(1, Posting::new(11, 2));

        assert_eq!(index.postings(1).unwrap().len(), 3);
        assert_eq!(index.files(1).unwrap().len(), 2);
        assert!(projection_consistent(&index, 1));
    }

    #[test]
    fn test_clear_word_file() {
        let mut index = InvertedIndex::new();
        index.add_posting(1, Posting::new(10, 1));
        index.add_posting(1, Posting::new(10, 3));
        index.add_posting(1, Posting::new(11, 2));

        index.clear_word_file(1, 10).unwrap();

        assert_eq!(index.postings(1).unwrap().len(), 1);
        assert!(!index.files(1).unwrap().contains(&10));
        assert!(projection_consistent(&index, 1));
    }

    #[test]
    fn test_clear_keeps_empty_sets() {
        let mut index = InvertedIndex::new();
        index.add_posting(1, Posting::new(10, 1));
        index.clear_word_file(1, 10).unwrap();

        assert!(index.contains(1));
        assert!(index.postings(1).unwrap().is_empty());
        assert!(index.files(1).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_word() {
        let mut index = InvertedIndex::new();
        assert!(matches!(index.clear_word_file(5, 1), Err(FindexError::UnknownWord)));
        assert!(matches!(index.postings(5), Err(FindexError::UnknownWord)));
        assert!(matches!(index.files(5), Err(FindexError::UnknownWord)));
    }
}
