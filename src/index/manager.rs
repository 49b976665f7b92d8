//! The index manager: composes the interning tables with the forward and
//! inverted indexes under one outer reader/writer lock.
//!
//! Every mutating operation takes the outer write lock for the whole
//! critical section, so readers always observe the composite invariants:
//! the file-set projection matches the positional hits, forward entries
//! cover the inverted ones, and positions per file form a dense `1..=N`
//! range in document order.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use log::debug;
use parking_lot::RwLock;

use crate::analysis;
use crate::error::{FindexError, Result};
use crate::index::forward::ForwardIndex;
use crate::index::inverted::InvertedIndex;
use crate::index::table::{IdRegistry, Interner};
use crate::index::{FileId, Posting, WordId};
use crate::storage::Storage;

/// The result of a conjunctive query.
///
/// `files` maps every matching file ID to its indexed (lower-cased) path.
/// `postings` holds the matching files' positional hits for each queried
/// word; it stays empty for files-only queries. Both are unordered.
#[derive(Debug, Default)]
pub struct SearchMatches {
    pub files: AHashMap<FileId, String>,
    pub postings: AHashSet<Posting>,
}

/// All interned state, guarded as one unit by the outer lock.
#[derive(Default)]
struct IndexInner {
    words: Interner<WordId, String>,
    files: Interner<FileId, String>,
    present: IdRegistry<FileId, bool>,
    forward: ForwardIndex,
    inverted: InvertedIndex,
}

impl IndexInner {
    /// `(present, id)` for an already lower-cased path. `(false, 0)` when
    /// the path was never seen, `(false, id)` when it is tombstoned.
    fn status(&self, lowered_path: &str) -> (bool, FileId) {
        let file_id = self.files.id_or_zero(lowered_path);
        let present =
            file_id != 0 && self.present.get_opt(file_id).copied().unwrap_or(false);
        (present, file_id)
    }

    /// Intern a brand-new path, or revive a tombstoned ID.
    fn activate_file(&mut self, lowered_path: &str, file_id: FileId) -> Result<FileId> {
        if file_id == 0 {
            let file_id = self.files.insert(lowered_path.to_string())?;
            let presence_id = self.present.insert(true);
            // The files interner and the presence table advance in lockstep.
            debug_assert_eq!(presence_id, file_id);
            Ok(file_id)
        } else {
            self.present.set(file_id, true)?;
            Ok(file_id)
        }
    }

    /// Feed a file's tokens into both indexes, assigning positions 1..=N.
    fn index_tokens(&mut self, file_id: FileId, tokens: Vec<String>) -> Result<()> {
        let mut word_ids = AHashSet::with_capacity(tokens.len());

        for (ordinal, token) in tokens.into_iter().enumerate() {
            let word_id = match self.words.id_or_zero(token.as_str()) {
                0 => self.words.insert(token)?,
                id => id,
            };
            self.inverted
                .add_posting(word_id, Posting::new(file_id, ordinal as u32 + 1));
            word_ids.insert(word_id);
        }

        self.forward.merge_words(file_id, word_ids);
        Ok(())
    }

    /// Undo a file's contribution to both indexes, keeping its keys alive.
    fn unindex_file(&mut self, file_id: FileId) -> Result<()> {
        let word_ids: Vec<WordId> = self.forward.words(file_id)?.iter().copied().collect();
        for word_id in word_ids {
            self.inverted.clear_word_file(word_id, file_id)?;
        }
        self.forward.clear_file(file_id)?;
        Ok(())
    }
}

/// The concurrent full-text index over a blob-storage corpus.
pub struct FileIndex {
    inner: RwLock<IndexInner>,
    storage: Arc<dyn Storage>,
}

impl FileIndex {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        FileIndex {
            inner: RwLock::new(IndexInner::default()),
            storage,
        }
    }

    /// The blob storage this index reads file bodies from.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Whether the path is currently indexed, along with its file ID.
    ///
    /// Returns `(false, 0)` for an unknown path and `(false, id)` for a
    /// tombstoned one; the distinction is not visible over the wire.
    pub fn status(&self, path: &str) -> (bool, FileId) {
        let lowered = analysis::to_lower(path);
        self.inner.read().status(&lowered)
    }

    /// Whether the path is currently indexed.
    pub fn contains(&self, path: &str) -> bool {
        self.status(path).0
    }

    /// Read a file body straight from storage at the case-folded path;
    /// the index lock is never taken and the index is not consulted.
    pub fn file_content(&self, path: &str) -> Result<Vec<u8>> {
        let lowered = analysis::to_lower(path);
        self.storage.read(&lowered)
    }

    /// Number of indexed (non-tombstoned) files.
    pub fn file_count(&self) -> usize {
        let inner = self.inner.read();
        (1..=inner.present.len() as FileId)
            .filter(|&id| inner.present.get_opt(id).copied().unwrap_or(false))
            .count()
    }

    /// Number of interned words.
    pub fn word_count(&self) -> usize {
        self.inner.read().words.len()
    }

    /// Read, tokenize and index a file already present in storage.
    pub fn add_file(&self, path: &str) -> Result<()> {
        let lowered = analysis::to_lower(path);
        if self.inner.read().status(&lowered).0 {
            return Err(FindexError::AlreadyIndexed);
        }

        let body = String::from_utf8(self.storage.read(&lowered)?)?;
        let tokens = analysis::tokenize(&body);
        self.commit_add(&lowered, tokens)
    }

    /// Write a new file body to storage, then index it.
    pub fn add_file_with_body(&self, path: &str, body: &str) -> Result<()> {
        let lowered = analysis::to_lower(path);
        if self.inner.read().status(&lowered).0 {
            return Err(FindexError::AlreadyIndexed);
        }

        self.storage.write(&lowered, body.as_bytes())?;
        let tokens = analysis::tokenize(body);
        self.commit_add(&lowered, tokens)
    }

    fn commit_add(&self, lowered_path: &str, tokens: Vec<String>) -> Result<()> {
        let mut inner = self.inner.write();

        // Re-check under the write lock; another writer may have won.
        let (present, file_id) = inner.status(lowered_path);
        if present {
            return Err(FindexError::AlreadyIndexed);
        }

        let file_id = inner.activate_file(lowered_path, file_id)?;
        inner.index_tokens(file_id, tokens)?;
        debug!("indexed {lowered_path:?} as file {file_id}");
        Ok(())
    }

    /// Tombstone a file: its postings disappear, its ID and path stay
    /// interned so a later re-add reuses them.
    pub fn remove_file(&self, path: &str) -> Result<()> {
        let lowered = analysis::to_lower(path);
        let mut inner = self.inner.write();

        let (present, file_id) = inner.status(&lowered);
        if !present {
            return Err(FindexError::UnknownFile);
        }

        inner.unindex_file(file_id)?;
        inner.present.set(file_id, false)?;
        debug!("removed {lowered:?} (file {file_id})");
        Ok(())
    }

    /// Re-read a file from storage and replace its indexed contents.
    ///
    /// The body is read and tokenized outside the lock; the removal of the
    /// old postings and the insertion of the new ones happen in a single
    /// write-locked critical section.
    pub fn modify_file(&self, path: &str) -> Result<()> {
        let lowered = analysis::to_lower(path);
        if !self.inner.read().status(&lowered).0 {
            return Err(FindexError::UnknownFile);
        }

        let body = String::from_utf8(self.storage.read(&lowered)?)?;
        let tokens = analysis::tokenize(&body);

        let mut inner = self.inner.write();
        let (present, file_id) = inner.status(&lowered);
        if !present {
            return Err(FindexError::UnknownFile);
        }

        inner.unindex_file(file_id)?;
        inner.index_tokens(file_id, tokens)?;
        debug!("reindexed {lowered:?} (file {file_id})");
        Ok(())
    }

    /// Drop every file, word, posting and interned ID.
    pub fn clear_all(&self) {
        let mut inner = self.inner.write();
        inner.inverted.clear();
        inner.forward.clear();
        inner.words.clear();
        inner.files.clear();
        inner.present.clear();
    }

    /// Conjunctive, case-insensitive query: which files contain *all* of
    /// `words`, and (optionally) at which positions.
    ///
    /// Fails with `NoMatch` when `words` is empty, when any word is absent
    /// from the corpus, or when no single file contains all of them.
    pub fn search(&self, words: &[String], with_postings: bool) -> Result<SearchMatches> {
        let lowered: AHashSet<String> =
            words.iter().map(|word| analysis::to_lower(word)).collect();
        if lowered.is_empty() {
            return Err(FindexError::NoMatch);
        }

        let inner = self.inner.read();

        let mut per_file_count: AHashMap<FileId, usize> = AHashMap::new();
        let mut per_file_postings: AHashMap<FileId, AHashSet<Posting>> = AHashMap::new();

        for word in &lowered {
            let word_id = inner.words.id_or_zero(word.as_str());
            if word_id == 0 {
                return Err(FindexError::NoMatch);
            }

            let file_set = inner.inverted.files(word_id)?;
            if file_set.is_empty() {
                // Interned once, but currently occurs in no file.
                return Err(FindexError::NoMatch);
            }
            for &file_id in file_set {
                *per_file_count.entry(file_id).or_insert(0) += 1;
            }

            if with_postings {
                for &posting in inner.inverted.postings(word_id)? {
                    per_file_postings
                        .entry(posting.file_id)
                        .or_default()
                        .insert(posting);
                }
            }
        }

        let required = lowered.len();
        let mut matches = SearchMatches::default();

        for (&file_id, &count) in &per_file_count {
            if count != required {
                continue;
            }
            matches.files.insert(file_id, inner.files.value(file_id)?.clone());
            if with_postings {
                if let Some(postings) = per_file_postings.remove(&file_id) {
                    matches.postings.extend(postings);
                }
            }
        }

        if matches.files.is_empty() {
            return Err(FindexError::NoMatch);
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn index_with(files: &[(&str, &str)]) -> FileIndex {
        let storage = Arc::new(MemoryStorage::new());
        for (path, body) in files {
            storage.write(path, body.as_bytes()).unwrap();
        }
        let index = FileIndex::new(storage);
        for (path, _) in files {
            index.add_file(path).unwrap();
        }
        index
    }

    fn query(words: &[&str]) -> Vec<String> {
        words.iter().map(|word| word.to_string()).collect()
    }

    #[test]
    fn test_add_and_status() {
        let index = index_with(&[("a.txt", "Hello world")]);

        assert_eq!(index.status("a.txt"), (true, 1));
        assert_eq!(index.status("A.TXT"), (true, 1));
        assert_eq!(index.status("missing.txt"), (false, 0));
        assert_eq!(index.file_count(), 1);
        assert_eq!(index.word_count(), 2);
    }

    #[test]
    fn test_double_add_rejected() {
        let index = index_with(&[("a.txt", "Hello world")]);
        assert!(matches!(index.add_file("a.txt"), Err(FindexError::AlreadyIndexed)));
        assert!(matches!(
            index.add_file_with_body("a.txt", "other"),
            Err(FindexError::AlreadyIndexed)
        ));
    }

    #[test]
    fn test_add_with_body_writes_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let index = FileIndex::new(storage.clone());

        index.add_file_with_body("Dir/New.txt", "Fresh Content").unwrap();

        // Path is canonicalized to lower case; body is stored verbatim.
        assert_eq!(storage.read("dir/new.txt").unwrap(), b"Fresh Content");
        assert!(index.contains("dir/new.txt"));
        // Content reads fold the path the same way the add did.
        assert_eq!(index.file_content("Dir/New.txt").unwrap(), b"Fresh Content");
        assert!(matches!(
            index.add_file_with_body("dir/other.txt", "x"),
            Ok(())
        ));
    }

    #[test]
    fn test_add_with_body_rejects_existing_blob() {
        let storage = Arc::new(MemoryStorage::new());
        storage.write("busy.txt", b"already here").unwrap();
        let index = FileIndex::new(storage);

        assert!(matches!(
            index.add_file_with_body("busy.txt", "body"),
            Err(FindexError::AlreadyOnDisk)
        ));
        assert!(!index.contains("busy.txt"));
    }

    #[test]
    fn test_add_missing_file_aborts_cleanly() {
        let storage = Arc::new(MemoryStorage::new());
        let index = FileIndex::new(storage);

        assert!(matches!(index.add_file("ghost.txt"), Err(FindexError::Io(_))));
        assert_eq!(index.status("ghost.txt"), (false, 0));
        assert_eq!(index.word_count(), 0);
    }

    #[test]
    fn test_search_single_word() {
        let index = index_with(&[("a.txt", "Hello world"), ("b.txt", "hello there")]);

        let matches = index.search(&query(&["hello"]), false).unwrap();
        let mut paths: Vec<&str> = matches.files.values().map(String::as_str).collect();
        paths.sort();
        assert_eq!(paths, vec!["a.txt", "b.txt"]);
        assert!(matches.postings.is_empty());
    }

    #[test]
    fn test_search_conjunction() {
        let index = index_with(&[("a.txt", "Hello world"), ("b.txt", "hello there")]);

        let matches = index.search(&query(&["hello", "world"]), false).unwrap();
        assert_eq!(matches.files.len(), 1);
        assert!(matches.files.values().any(|path| path == "a.txt"));
    }

    #[test]
    fn test_search_positions() {
        let index = index_with(&[("a.txt", "Hello world"), ("b.txt", "hello there")]);

        let matches = index.search(&query(&["hello", "world"]), true).unwrap();
        let file_id = *matches.files.keys().next().unwrap();

        let mut positions: Vec<u32> = matches
            .postings
            .iter()
            .map(|posting| {
                assert_eq!(posting.file_id, file_id);
                posting.position
            })
            .collect();
        positions.sort();
        assert_eq!(positions, vec![1, 2]);
    }

    #[test]
    fn test_search_case_insensitive() {
        let index = index_with(&[("a.txt", "Hello World")]);

        let lower = index.search(&query(&["hello"]), true).unwrap();
        let upper = index.search(&query(&["HELLO"]), true).unwrap();
        assert_eq!(lower.files.len(), upper.files.len());
        assert_eq!(lower.postings, upper.postings);
    }

    #[test]
    fn test_search_no_match() {
        let index = index_with(&[("a.txt", "Hello world")]);

        assert!(matches!(
            index.search(&query(&["absent"]), false),
            Err(FindexError::NoMatch)
        ));
        assert!(matches!(
            index.search(&query(&["hello", "absent"]), false),
            Err(FindexError::NoMatch)
        ));
        assert!(matches!(index.search(&[], false), Err(FindexError::NoMatch)));
    }

    #[test]
    fn test_remove_then_search() {
        let index = index_with(&[("a.txt", "Hello world"), ("b.txt", "hello there")]);

        index.remove_file("b.txt").unwrap();

        assert!(!index.contains("b.txt"));
        let matches = index.search(&query(&["hello"]), false).unwrap();
        assert_eq!(matches.files.len(), 1);
        assert!(matches!(
            index.search(&query(&["there"]), false),
            Err(FindexError::NoMatch)
        ));
    }

    #[test]
    fn test_remove_unknown() {
        let index = index_with(&[("a.txt", "Hello world")]);
        assert!(matches!(index.remove_file("nope.txt"), Err(FindexError::UnknownFile)));

        index.remove_file("a.txt").unwrap();
        // Tombstoned counts as not present.
        assert!(matches!(index.remove_file("a.txt"), Err(FindexError::UnknownFile)));
    }

    #[test]
    fn test_readd_reuses_file_id() {
        let index = index_with(&[("a.txt", "Hello world"), ("b.txt", "hello there")]);

        let (_, id_before) = index.status("b.txt");
        index.remove_file("b.txt").unwrap();
        let (present, id_tombstoned) = index.status("b.txt");
        assert!(!present);
        assert_eq!(id_tombstoned, id_before);

        index.modify_file("b.txt").unwrap_err();
        index.add_file("b.txt").unwrap();
        assert_eq!(index.status("b.txt"), (true, id_before));
    }

    #[test]
    fn test_modify_reassigns_positions() {
        let storage = Arc::new(MemoryStorage::new());
        storage.write("a.txt", b"Hello world").unwrap();
        let index = FileIndex::new(storage.clone());
        index.add_file("a.txt").unwrap();

        // Swap the word order on disk and reindex.
        storage.put("a.txt", b"world hello");
        index.modify_file("a.txt").unwrap();

        let matches = index.search(&query(&["hello"]), true).unwrap();
        let positions: Vec<u32> =
            matches.postings.iter().map(|posting| posting.position).collect();
        assert_eq!(positions, vec![2]);
    }

    #[test]
    fn test_empty_file() {
        let index = index_with(&[("empty.txt", ""), ("a.txt", "word")]);

        assert!(index.contains("empty.txt"));
        let matches = index.search(&query(&["word"]), false).unwrap();
        assert_eq!(matches.files.len(), 1);
    }

    #[test]
    fn test_positions_dense() {
        let index = index_with(&[("a.txt", "one two three two one")]);

        let matches = index
            .search(&query(&["one", "two", "three"]), true)
            .unwrap();
        let mut positions: Vec<u32> =
            matches.postings.iter().map(|posting| posting.position).collect();
        positions.sort();
        assert_eq!(positions, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_clear_all() {
        let index = index_with(&[("a.txt", "Hello world")]);
        index.clear_all();

        assert_eq!(index.status("a.txt"), (false, 0));
        assert_eq!(index.word_count(), 0);
        assert_eq!(index.file_count(), 0);
    }

    #[test]
    fn test_composite_invariants_after_mutations() {
        let storage = Arc::new(MemoryStorage::new());
        for (path, body) in [
            ("a.txt", "alpha beta gamma"),
            ("b.txt", "beta gamma delta"),
            ("c.txt", "gamma delta alpha"),
        ] {
            storage.write(path, body.as_bytes()).unwrap();
        }
        let index = FileIndex::new(storage.clone());
        for path in ["a.txt", "b.txt", "c.txt"] {
            index.add_file(path).unwrap();
        }

        index.remove_file("b.txt").unwrap();
        storage.put("c.txt", b"alpha alpha epsilon");
        index.modify_file("c.txt").unwrap();
        index.add_file("b.txt").unwrap();

        let inner = index.inner.read();
        for word_id in 1..=inner.words.len() as WordId {
            let from_hits: AHashSet<FileId> = inner
                .inverted
                .postings(word_id)
                .unwrap()
                .iter()
                .map(|posting| posting.file_id)
                .collect();
            // Projection matches the hits exactly.
            assert_eq!(&from_hits, inner.inverted.files(word_id).unwrap());

            // Every hit is covered by the forward index.
            for file_id in from_hits {
                assert!(inner.forward.words(file_id).unwrap().contains(&word_id));
            }
        }
    }
}
