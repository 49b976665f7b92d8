//! Interning tables mapping monotonically assigned numeric IDs to values.
//!
//! Two flavours exist: the double-sided [`Interner`] keeps a value-to-ID
//! mapping next to the ID-to-value one and rejects duplicate values, while
//! the single-sided [`IdRegistry`] only maps IDs to values and allows
//! in-place replacement. Both hand out IDs starting at 1; `0` is the
//! "absent" sentinel everywhere in the crate.
//!
//! The tables themselves are plain data. Locking is supplied by whatever
//! composes them (the index manager's outer lock, the write-task registry).

use std::borrow::Borrow;
use std::hash::Hash;

use ahash::AHashMap;

use crate::error::{FindexError, Result};

mod sealed {
    pub trait Sealed {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
}

/// An unsigned integer usable as a table ID.
pub trait SequentialId: sealed::Sealed + Copy + Eq + Hash {
    /// The reserved "absent" sentinel.
    const ZERO: Self;
    /// The first ID a table hands out.
    const FIRST: Self;
    /// The ID following `self`.
    #[must_use]
    fn next(self) -> Self;
}

impl SequentialId for u32 {
    const ZERO: Self = 0;
    const FIRST: Self = 1;
    fn next(self) -> Self {
        self + 1
    }
}

impl SequentialId for u64 {
    const ZERO: Self = 0;
    const FIRST: Self = 1;
    fn next(self) -> Self {
        self + 1
    }
}

/// Double-sided interning table: `Id -> Value` plus `Value -> Id`.
#[derive(Debug, Clone)]
pub struct Interner<I, V> {
    by_id: AHashMap<I, V>,
    by_value: AHashMap<V, I>,
    next_id: I,
}

impl<I: SequentialId, V: Clone + Eq + Hash> Interner<I, V> {
    pub fn new() -> Self {
        Interner {
            by_id: AHashMap::new(),
            by_value: AHashMap::new(),
            next_id: I::FIRST,
        }
    }

    /// Intern a new value and return its freshly assigned ID.
    pub fn insert(&mut self, value: V) -> Result<I> {
        if self.by_value.contains_key(&value) {
            return Err(FindexError::DuplicateValue);
        }

        let id = self.next_id;
        self.next_id = id.next();
        self.by_value.insert(value.clone(), id);
        self.by_id.insert(id, value);

        Ok(id)
    }

    /// Remove an entry by ID.
    pub fn remove_id(&mut self, id: I) -> Result<V> {
        let value = self.by_id.remove(&id).ok_or(FindexError::UnknownId)?;
        self.by_value.remove(&value);
        Ok(value)
    }

    /// Remove an entry by value.
    pub fn remove_value<Q>(&mut self, value: &Q) -> Result<I>
    where
        V: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let id = self.by_value.remove(value).ok_or(FindexError::UnknownValue)?;
        self.by_id.remove(&id);
        Ok(id)
    }

    /// Look up the value for an ID.
    pub fn value(&self, id: I) -> Result<&V> {
        self.by_id.get(&id).ok_or(FindexError::UnknownId)
    }

    /// Look up the ID for a value.
    pub fn id_of<Q>(&self, value: &Q) -> Result<I>
    where
        V: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.by_value.get(value).copied().ok_or(FindexError::UnknownValue)
    }

    /// Look up the ID for a value, returning the `0` sentinel when absent.
    pub fn id_or_zero<Q>(&self, value: &Q) -> I
    where
        V: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.by_value.get(value).copied().unwrap_or(I::ZERO)
    }

    pub fn contains_id(&self, id: I) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn contains_value<Q>(&self, value: &Q) -> bool
    where
        V: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.by_value.contains_key(value)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Drop every entry and restart ID assignment from 1.
    pub fn clear(&mut self) {
        self.by_id.clear();
        self.by_value.clear();
        self.next_id = I::FIRST;
    }
}

impl<I: SequentialId, V: Clone + Eq + Hash> Default for Interner<I, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-sided table: `Id -> Value` with in-place replacement.
#[derive(Debug, Clone)]
pub struct IdRegistry<I, V> {
    entries: AHashMap<I, V>,
    next_id: I,
}

impl<I: SequentialId, V> IdRegistry<I, V> {
    pub fn new() -> Self {
        IdRegistry {
            entries: AHashMap::new(),
            next_id: I::FIRST,
        }
    }

    /// Store a new value and return its freshly assigned ID.
    pub fn insert(&mut self, value: V) -> I {
        let id = self.next_id;
        self.next_id = id.next();
        self.entries.insert(id, value);
        id
    }

    /// Replace the value stored under an existing ID.
    pub fn set(&mut self, id: I, value: V) -> Result<()> {
        match self.entries.get_mut(&id) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(FindexError::UnknownId),
        }
    }

    /// Remove an entry by ID.
    pub fn remove(&mut self, id: I) -> Result<V> {
        self.entries.remove(&id).ok_or(FindexError::UnknownId)
    }

    pub fn get(&self, id: I) -> Result<&V> {
        self.entries.get(&id).ok_or(FindexError::UnknownId)
    }

    pub fn get_opt(&self, id: I) -> Option<&V> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: I) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry and restart ID assignment from 1.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_id = I::FIRST;
    }
}

impl<I: SequentialId, V> Default for IdRegistry<I, V> {
    fn default() -> Self {
        Self::new()
    }
}
