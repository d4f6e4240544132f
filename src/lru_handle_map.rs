//! LruHandleMap: structural layer with stable handles, recency order and a
//! fixed capacity.
//!
//! Entries live in a generational `SlotMap`; a `HashTable` indexes them by a
//! caller-supplied `u64` hash, and a doubly linked list threaded through the
//! slots keeps them in recency order (head = most recently used). Hashes are
//! computed by the caller once and stored with the entry, so the map never
//! hashes keys itself and rehashing never calls into user code. Lookups
//! still compare full keys with `Eq`, so two keys with equal hashes stay
//! distinct entries. The index only filters by a few hash bits, so every
//! lookup compares the stored hash too.

use crate::reentrancy::DebugReentrancy;
use core::borrow::Borrow;
use core::num::NonZeroUsize;
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct EntryHandle(DefaultKey);

impl EntryHandle {
    pub(crate) fn new(k: DefaultKey) -> Self {
        EntryHandle(k)
    }
    pub(crate) fn raw_handle(&self) -> DefaultKey {
        self.0
    }

    pub fn key<'a, K: Eq, V>(&self, map: &'a LruHandleMap<K, V>) -> Option<&'a K> {
        map.handle_key(*self)
    }

    pub fn value<'a, K: Eq, V>(&self, map: &'a LruHandleMap<K, V>) -> Option<&'a V> {
        map.handle_value(*self)
    }
}

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
    prev: Option<DefaultKey>,
    next: Option<DefaultKey>,
}

/// Slot storage plus the recency list threaded through it.
struct Recency<K, V> {
    slots: SlotMap<DefaultKey, Entry<K, V>>,
    head: Option<DefaultKey>,
    tail: Option<DefaultKey>,
}

impl<K, V> Recency<K, V> {
    fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            head: None,
            tail: None,
        }
    }

    fn link_front(&mut self, k: DefaultKey) {
        let old_head = self.head;
        if let Some(e) = self.slots.get_mut(k) {
            e.prev = None;
            e.next = old_head;
        }
        match old_head.and_then(|h| self.slots.get_mut(h)) {
            Some(h) => h.prev = Some(k),
            None => self.tail = Some(k),
        }
        self.head = Some(k);
    }

    fn unlink(&mut self, k: DefaultKey) {
        let (prev, next) = match self.slots.get(k) {
            Some(e) => (e.prev, e.next),
            None => return,
        };
        match prev.and_then(|p| self.slots.get_mut(p)) {
            Some(p) => p.next = next,
            None => self.head = next,
        }
        match next.and_then(|n| self.slots.get_mut(n)) {
            Some(n) => n.prev = prev,
            None => self.tail = prev,
        }
        if let Some(e) = self.slots.get_mut(k) {
            e.prev = None;
            e.next = None;
        }
    }
}

pub struct LruHandleMap<K, V> {
    index: HashTable<DefaultKey>,
    entries: Recency<K, V>,
    capacity: NonZeroUsize,
    reentrancy: DebugReentrancy,
}

#[derive(Debug)]
pub enum InsertError {
    DuplicateKey,
}

/// Outcome of a successful insert: the new entry's handle and the entry
/// pushed out to stay within capacity, if any.
#[derive(Debug)]
pub struct Inserted<K, V> {
    pub handle: EntryHandle,
    pub evicted: Option<(K, V)>,
}

// Unlink a slot from both the recency list and the index. The structure is
// consistent again when this returns; dropping the pair may reenter.
fn take_slot<K, V>(
    index: &mut HashTable<DefaultKey>,
    entries: &mut Recency<K, V>,
    k: DefaultKey,
) -> Option<(K, V)> {
    entries.unlink(k);
    let entry = entries.slots.remove(k)?;
    if let Ok(occupied) = index.find_entry(entry.hash, |&kk| kk == k) {
        occupied.remove();
    }
    Some((entry.key, entry.value))
}

/// Iterator over entries from most to least recently used.
pub struct Iter<'a, K, V> {
    slots: &'a SlotMap<DefaultKey, Entry<K, V>>,
    cur: Option<DefaultKey>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (EntryHandle, &'a K, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let k = self.cur?;
        let e = self.slots.get(k)?;
        self.cur = e.next;
        Some((EntryHandle::new(k), &e.key, &e.value))
    }
}

impl<K, V> LruHandleMap<K, V>
where
    K: Eq,
{
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            index: HashTable::new(),
            entries: Recency::new(),
            capacity,
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.slots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.slots.is_empty()
    }
    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    pub fn find<Q>(&self, hash: u64, q: &Q) -> Option<EntryHandle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let _g = self.reentrancy.enter();
        let slots = &self.entries.slots;
        self.index
            .find(hash, |&k| {
                slots
                    .get(k)
                    .map(|e| e.hash == hash && e.key.borrow() == q)
                    .unwrap_or(false)
            })
            .map(|&k| EntryHandle::new(k))
    }

    pub fn contains_key<Q>(&self, hash: u64, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.find(hash, q).is_some()
    }

    /// Mark an entry most recently used and return its value.
    pub fn touch(&mut self, handle: EntryHandle) -> Option<&V> {
        let _g = self.reentrancy.enter();
        let k = handle.raw_handle();
        if !self.entries.slots.contains_key(k) {
            return None;
        }
        if self.entries.head != Some(k) {
            self.entries.unlink(k);
            self.entries.link_front(k);
        }
        self.entries.slots.get(k).map(|e| &e.value)
    }

    /// Insert as most recently used. When the map is full, the least recently
    /// used entry is unlinked and handed back in `Inserted::evicted`.
    pub fn insert(&mut self, hash: u64, key: K, value: V) -> Result<Inserted<K, V>, InsertError> {
        let _g = self.reentrancy.enter();
        let entries = &mut self.entries;
        let k = match self.index.entry(
            hash,
            |&kk| {
                entries
                    .slots
                    .get(kk)
                    .map(|e| e.hash == hash && e.key == key)
                    .unwrap_or(false)
            },
            |&kk| entries.slots.get(kk).map(|e| e.hash).unwrap_or(0),
        ) {
            hashbrown::hash_table::Entry::Occupied(_) => return Err(InsertError::DuplicateKey),
            hashbrown::hash_table::Entry::Vacant(v) => {
                let k = entries.slots.insert(Entry {
                    key,
                    value,
                    hash,
                    prev: None,
                    next: None,
                });
                let _ = v.insert(k);
                k
            }
        };
        self.entries.link_front(k);

        let evicted = if self.entries.slots.len() > self.capacity.get() {
            match self.entries.tail {
                Some(lru) if lru != k => take_slot(&mut self.index, &mut self.entries, lru),
                _ => None,
            }
        } else {
            None
        };

        Ok(Inserted {
            handle: EntryHandle::new(k),
            evicted,
        })
    }

    pub fn remove(&mut self, handle: EntryHandle) -> Option<(K, V)> {
        let _g = self.reentrancy.enter();
        take_slot(&mut self.index, &mut self.entries, handle.raw_handle())
    }

    /// Remove every entry matching `pred`, returning them in recency order.
    pub fn remove_where<F>(&mut self, mut pred: F) -> Vec<(K, V)>
    where
        F: FnMut(&K, &V) -> bool,
    {
        let _g = self.reentrancy.enter();
        let doomed: Vec<DefaultKey> = {
            let slots = &self.entries.slots;
            let mut out = Vec::new();
            let mut cur = self.entries.head;
            while let Some(k) = cur {
                let Some(e) = slots.get(k) else { break };
                if pred(&e.key, &e.value) {
                    out.push(k);
                }
                cur = e.next;
            }
            out
        };
        doomed
            .into_iter()
            .filter_map(|k| take_slot(&mut self.index, &mut self.entries, k))
            .collect()
    }

    /// Unlink the least recently used entry.
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        let _g = self.reentrancy.enter();
        let lru = self.entries.tail?;
        take_slot(&mut self.index, &mut self.entries, lru)
    }

    /// Handle of the least recently used entry, without touching it.
    pub fn peek_lru(&self) -> Option<EntryHandle> {
        self.entries.tail.map(EntryHandle::new)
    }

    /// Remove every entry, most recently used first.
    pub fn drain(&mut self) -> Vec<(K, V)> {
        self.remove_where(|_, _| true)
    }

    pub(crate) fn handle_key(&self, h: EntryHandle) -> Option<&K> {
        let _g = self.reentrancy.enter();
        self.entries.slots.get(h.raw_handle()).map(|e| &e.key)
    }

    pub(crate) fn handle_value(&self, h: EntryHandle) -> Option<&V> {
        let _g = self.reentrancy.enter();
        self.entries.slots.get(h.raw_handle()).map(|e| &e.value)
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: &self.entries.slots,
            cur: self.entries.head,
        }
    }
}
