//! Forward index: for each file ID, the set of word IDs occurring in it.

use ahash::{AHashMap, AHashSet};

use crate::error::{FindexError, Result};
use crate::index::{FileId, WordId};

/// `FileId -> Set<WordId>` map.
///
/// Removing a file distinguishes between erasing the key ([`remove_file`])
/// and keeping the key with an emptied set ([`clear_file`]); the latter is
/// what tombstoning uses so the file ID stays valid for a later re-add.
///
/// [`remove_file`]: ForwardIndex::remove_file
/// [`clear_file`]: ForwardIndex::clear_file
#[derive(Debug, Default)]
pub struct ForwardIndex {
    files: AHashMap<FileId, AHashSet<WordId>>,
}

impl ForwardIndex {
    pub fn new() -> Self {
        ForwardIndex::default()
    }

    /// Record a single word ID for a file.
    pub fn add_word(&mut self, file_id: FileId, word_id: WordId) {
        self.files.entry(file_id).or_default().insert(word_id);
    }

    /// Merge a whole word-ID set into a file's entry.
    pub fn merge_words(&mut self, file_id: FileId, word_ids: AHashSet<WordId>) {
        let entry = self.files.entry(file_id).or_default();
        if entry.is_empty() {
            *entry = word_ids;
        } else {
            entry.extend(word_ids);
        }
    }

    /// Erase a file's key entirely.
    pub fn remove_file(&mut self, file_id: FileId) -> Result<()> {
        self.files.remove(&file_id).ok_or(FindexError::UnknownFile)?;
        Ok(())
    }

    /// Empty a file's word-ID set but keep the key.
    pub fn clear_file(&mut self, file_id: FileId) -> Result<()> {
        self.files
            .get_mut(&file_id)
            .ok_or(FindexError::UnknownFile)?
            .clear();
        Ok(())
    }

    /// The word-ID set of a file.
    pub fn words(&self, file_id: FileId) -> Result<&AHashSet<WordId>> {
        self.files.get(&file_id).ok_or(FindexError::UnknownFile)
    }

    pub fn contains(&self, file_id: FileId) -> bool {
        self.files.contains_key(&file_id)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }
}
