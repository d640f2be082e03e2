// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! An arena-backed skiplist used by the memtable.
//!
//! This is a concurrent-read / single-writer ordered map: any number of
//! threads may iterate or look up keys while at most one thread inserts.
//! There are no updates or deletes — the memtable never needs either,
//! since a duplicate `(vin, timestamp)` key is resolved by the caller
//! before insertion (see [`crate::memtable::MemTable`]).
//!
//! The design follows the classic LevelDB skiplist: only forward links
//! are stored per level, and backward iteration is implemented by
//! re-walking from the head to find the predecessor of the current node.
//! Link publication uses release stores; readers use acquire loads, so a
//! reader that begins its search after an insert's top-level release is
//! guaranteed to observe the new node, and an in-flight reader still sees
//! a consistent (possibly stale) snapshot at each level it visits.

#![allow(unsafe_code)]

use crate::arena::Arena;
use std::alloc::Layout;
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU32, AtomicUsize, Ordering as AtomicOrdering};

/// Maximum tower height, per spec.
pub const MAX_HEIGHT: usize = 12;

// `key`/`value` are left uninitialized for the head sentinel node (which
// is never read as a real entry) and initialized for every node inserted
// via `new_node`. Using `MaybeUninit` here (rather than requiring a valid
// K/V bit pattern, e.g. via `mem::zeroed`) keeps the sentinel construction
// sound for types like `String`/`Vec<u8>` that forbid an all-zero layout.
struct NodeHeader<K, V> {
    key: MaybeUninit<K>,
    value: MaybeUninit<V>,
    height: u32,
}

/// A raw, non-owning pointer to a node allocated in the arena.
struct NodePtr<K, V>(*mut u8, PhantomData<(K, V)>);

impl<K, V> Clone for NodePtr<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<K, V> Copy for NodePtr<K, V> {}

impl<K, V> PartialEq for NodePtr<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl<K, V> Eq for NodePtr<K, V> {}

impl<K, V> NodePtr<K, V> {
    fn null() -> Self {
        Self(ptr::null_mut(), PhantomData)
    }

    fn is_null(self) -> bool {
        self.0.is_null()
    }

    fn header(self) -> *mut NodeHeader<K, V> {
        self.0.cast()
    }

    fn height(self) -> usize {
        unsafe { (*self.header()).height as usize }
    }

    fn key(self) -> &'static K {
        unsafe { (*self.header()).key.assume_init_ref() }
    }

    fn value(self) -> &'static V {
        unsafe { (*self.header()).value.assume_init_ref() }
    }

    fn next_slot(self, level: usize) -> *const AtomicPtr<u8> {
        debug_assert!(level < self.height());
        let header_layout = Layout::new::<NodeHeader<K, V>>();
        let next_layout = Layout::new::<AtomicPtr<u8>>();
        let (_combined, offset) = header_layout.extend(next_layout).expect("layout");
        unsafe { self.0.add(offset).cast::<AtomicPtr<u8>>().add(level) }
    }

    fn load_next(self, level: usize) -> NodePtr<K, V> {
        let raw = unsafe { (*self.next_slot(level)).load(AtomicOrdering::Acquire) };
        NodePtr(raw, PhantomData)
    }

    fn store_next_release(self, level: usize, next: NodePtr<K, V>) {
        unsafe { (*self.next_slot(level)).store(next.0, AtomicOrdering::Release) };
    }

    fn store_next_relaxed(self, level: usize, next: NodePtr<K, V>) {
        unsafe { (*self.next_slot(level)).store(next.0, AtomicOrdering::Relaxed) };
    }
}

fn node_layout<K, V>(height: usize) -> (Layout, usize) {
    let header_layout = Layout::new::<NodeHeader<K, V>>();
    let next_layout = Layout::array::<AtomicPtr<u8>>(height).expect("next array layout");
    header_layout.extend(next_layout).expect("node layout")
}

/// A position bundle returned by `find`, reusable by `insert_with_hint`.
pub struct Hint<K, V> {
    curr: NodePtr<K, V>,
    prev: [NodePtr<K, V>; MAX_HEIGHT],
}

impl<K, V> Default for Hint<K, V> {
    fn default() -> Self {
        Self {
            curr: NodePtr::null(),
            prev: [NodePtr::null(); MAX_HEIGHT],
        }
    }
}

/// Concurrent-read / single-writer ordered map.
pub struct SkipList<K, V> {
    arena: Arena,
    head: NodePtr<K, V>,
    max_height: AtomicUsize,
    seed: AtomicU32,
    len: AtomicUsize,
}

// SAFETY: mutation of node links happens through atomics with
// acquire/release ordering; the arena itself is only ever touched by the
// single writer that owns `&mut SkipList` at construction / insert time,
// which the caller is responsible for serializing (documented contract).
unsafe impl<K: Send, V: Send> Send for SkipList<K, V> {}
unsafe impl<K: Sync, V: Sync> Sync for SkipList<K, V> {}

impl<K, V> SkipList<K, V> {
    /// Creates an empty skiplist.
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let head = Self::alloc_head_tail(&mut arena);
        Self {
            arena,
            head,
            max_height: AtomicUsize::new(1),
            seed: AtomicU32::new(0x1234_5678),
            len: AtomicUsize::new(0),
        }
    }

    fn alloc_head_tail(arena: &mut Arena) -> NodePtr<K, V> {
        let (layout, _) = node_layout::<K, V>(MAX_HEIGHT);
        let ptr = arena.aligned_alloc(layout.size(), layout.align());
        let node = NodePtr::<K, V>(ptr, PhantomData);
        // The head's key/value are never read: `find_greater_or_equal`
        // always starts by inspecting `head.next(..)`, never `head` itself.
        unsafe {
            ptr::write(
                node.header(),
                NodeHeader {
                    key: MaybeUninit::uninit(),
                    value: MaybeUninit::uninit(),
                    height: MAX_HEIGHT as u32,
                },
            );
        }
        for level in 0..MAX_HEIGHT {
            node.store_next_relaxed(level, NodePtr::null());
        }
        node
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.len.load(AtomicOrdering::Relaxed)
    }

    /// Whether the skiplist has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn max_height(&self) -> usize {
        self.max_height.load(AtomicOrdering::Relaxed)
    }

    fn random_height(&self) -> usize {
        // Xorshift32, matching the branching-factor-4 growth in spec.md §4.2.
        let mut x = self.seed.load(AtomicOrdering::Relaxed);
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.seed.store(x, AtomicOrdering::Relaxed);

        let mut height = 1usize;
        while height < MAX_HEIGHT && (x.wrapping_add(height as u32) % 4 == 0) {
            height += 1;
            x ^= x << 1;
        }
        height
    }
}

impl<K: Ord, V> SkipList<K, V> {
    fn key_is_after(&self, key: &K, node: NodePtr<K, V>) -> bool {
        !node.is_null() && node.key().cmp(key) == Ordering::Less
    }

    /// Finds the first node whose key is `>= key`, optionally recording the
    /// per-level predecessor into `prev`.
    fn find_greater_or_equal(&self, key: &K, mut prev: Option<&mut [NodePtr<K, V>; MAX_HEIGHT]>) -> NodePtr<K, V> {
        let mut x = self.head;
        let mut level = self.max_height() - 1;
        loop {
            let next = x.load_next(level);
            if self.key_is_after(key, next) {
                x = next;
            } else {
                if let Some(prev) = prev.as_deref_mut() {
                    prev[level] = x;
                }
                if level == 0 {
                    return next;
                }
                level -= 1;
            }
        }
    }

    fn find_less_than(&self, key: &K) -> NodePtr<K, V> {
        let mut x = self.head;
        let mut level = self.max_height() - 1;
        loop {
            let next = x.load_next(level);
            if next.is_null() || next.key().cmp(key) != Ordering::Less {
                if level == 0 {
                    return x;
                }
                level -= 1;
            } else {
                x = next;
            }
        }
    }

    fn find_last(&self) -> NodePtr<K, V> {
        let mut x = self.head;
        let mut level = self.max_height() - 1;
        loop {
            let next = x.load_next(level);
            if next.is_null() {
                if level == 0 {
                    return x;
                }
                level -= 1;
            } else {
                x = next;
            }
        }
    }

    fn new_node(&mut self, key: K, value: V, height: usize) -> NodePtr<K, V> {
        let (layout, _) = node_layout::<K, V>(height);
        let ptr = self.arena.aligned_alloc(layout.size(), layout.align());
        let node = NodePtr::<K, V>(ptr, PhantomData);
        unsafe {
            ptr::write(
                node.header(),
                NodeHeader {
                    key: MaybeUninit::new(key),
                    value: MaybeUninit::new(value),
                    height: height as u32,
                },
            );
        }
        for level in 0..height {
            node.store_next_relaxed(level, NodePtr::null());
        }
        node
    }

    /// Returns whether `key` is present.
    pub fn contains(&self, key: &K) -> bool {
        let x = self.find_greater_or_equal(key, None);
        !x.is_null() && x.key().cmp(key) == Ordering::Equal
    }

    /// Looks up `key`, recording the search path into `hint` so a
    /// subsequent [`SkipList::insert_with_hint`] can skip re-descending the
    /// tower. Returns whether an exact match was found.
    pub fn find(&self, key: &K, hint: &mut Hint<K, V>) -> bool {
        let x = self.find_greater_or_equal(key, Some(&mut hint.prev));
        hint.curr = x;
        !x.is_null() && x.key().cmp(key) == Ordering::Equal
    }

    /// Inserts `key`/`value`. The caller must ensure `key` is not already
    /// present (duplicate insertion is not supported — see
    /// [`crate::memtable::MemTable`] for last-writer-wins semantics built
    /// on top via [`SkipList::find`] + [`SkipList::insert_with_hint`]).
    ///
    /// # Safety contract
    /// Must not be called concurrently with another `insert`/
    /// `insert_with_hint` call (single-writer).
    pub fn insert(&mut self, key: K, value: V) {
        let mut prev = [self.head; MAX_HEIGHT];
        self.find_greater_or_equal(&key, Some(&mut prev));
        self.insert_at(key, value, &mut prev);
    }

    /// Inserts using a hint previously produced by [`SkipList::find`] on
    /// the same key, avoiding the redundant descent.
    pub fn insert_with_hint(&mut self, key: K, value: V, hint: &mut Hint<K, V>) {
        self.insert_at(key, value, &mut hint.prev);
    }

    fn insert_at(&mut self, key: K, value: V, prev: &mut [NodePtr<K, V>; MAX_HEIGHT]) {
        let height = self.random_height();
        let max_height = self.max_height();
        if height > max_height {
            for slot in prev.iter_mut().take(height).skip(max_height) {
                *slot = self.head;
            }
            self.max_height.store(height, AtomicOrdering::Relaxed);
        }

        let node = self.new_node(key, value, height);
        for level in 0..height {
            node.store_next_relaxed(level, prev[level].load_next(level));
            prev[level].store_next_release(level, node);
        }
        self.len.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Forward iterator starting at the first entry.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            list: self,
            node: self.head.load_next(0),
        }
    }

    /// A cursor supporting forward/backward movement and seeking.
    pub fn cursor(&self) -> Cursor<'_, K, V> {
        Cursor {
            list: self,
            node: NodePtr::null(),
        }
    }
}

impl<K, V> Default for SkipList<K, V>
where
    K: Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for SkipList<K, V> {
    fn drop(&mut self) {
        if !std::mem::needs_drop::<K>() && !std::mem::needs_drop::<V>() {
            return;
        }
        // The head sentinel's key/value are never initialized and must not
        // be dropped; every other node was written via `new_node`.
        let mut node = self.head.load_next(0);
        while !node.is_null() {
            let next = node.load_next(0);
            unsafe {
                let header = node.header();
                ptr::drop_in_place((*header).key.as_mut_ptr());
                ptr::drop_in_place((*header).value.as_mut_ptr());
            }
            node = next;
        }
    }
}

/// Forward-only iterator over all entries in ascending key order.
pub struct Iter<'a, K, V> {
    list: &'a SkipList<K, V>,
    node: NodePtr<K, V>,
}

impl<'a, K: Ord, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.node.is_null() {
            return None;
        }
        let item = (self.node.key(), self.node.value());
        self.node = self.node.load_next(0);
        let _ = &self.list;
        Some(item)
    }
}

/// A bidirectional cursor over the skiplist, supporting `seek`.
pub struct Cursor<'a, K, V> {
    list: &'a SkipList<K, V>,
    node: NodePtr<K, V>,
}

impl<'a, K: Ord, V> Cursor<'a, K, V> {
    /// Whether the cursor is positioned on a valid entry.
    pub fn valid(&self) -> bool {
        !self.node.is_null()
    }

    /// The current entry, if valid.
    pub fn current(&self) -> Option<(&'a K, &'a V)> {
        self.valid().then(|| (self.node.key(), self.node.value()))
    }

    /// Advances to the next entry.
    pub fn next(&mut self) {
        debug_assert!(self.valid());
        self.node = self.node.load_next(0);
    }

    /// Moves to the previous entry.
    pub fn prev(&mut self) {
        debug_assert!(self.valid());
        let pred = self.list.find_less_than(self.node.key());
        self.node = if pred == self.list.head { NodePtr::null() } else { pred };
    }

    /// Positions at the first entry whose key is `>= target`.
    pub fn seek(&mut self, target: &K) {
        self.node = self.list.find_greater_or_equal(target, None);
    }

    /// Positions at the first entry.
    pub fn seek_to_first(&mut self) {
        self.node = self.list.head.load_next(0);
    }

    /// Positions at the last entry.
    pub fn seek_to_last(&mut self) {
        let last = self.list.find_last();
        self.node = if last == self.list.head { NodePtr::null() } else { last };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_contains() {
        let mut list: SkipList<u32, u32> = SkipList::new();
        for k in [5u32, 1, 3, 2, 4] {
            list.insert(k, k * 10);
        }
        for k in [1u32, 2, 3, 4, 5] {
            assert!(list.contains(&k));
        }
        assert!(!list.contains(&6));
    }

    #[test]
    fn iteration_is_sorted_and_unique() {
        let mut list: SkipList<u32, u32> = SkipList::new();
        for k in [5u32, 1, 3, 2, 4, 3].into_iter() {
            if !list.contains(&k) {
                list.insert(k, k);
            }
        }
        let keys: Vec<_> = list.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn cursor_forward_and_backward() {
        let mut list: SkipList<u32, u32> = SkipList::new();
        for k in 0..20u32 {
            list.insert(k, k);
        }
        let mut cursor = list.cursor();
        cursor.seek_to_first();
        let mut forward = vec![];
        while cursor.valid() {
            forward.push(*cursor.current().unwrap().0);
            cursor.next();
        }
        assert_eq!(forward, (0..20).collect::<Vec<_>>());

        cursor.seek_to_last();
        let mut backward = vec![];
        while cursor.valid() {
            backward.push(*cursor.current().unwrap().0);
            cursor.prev();
        }
        assert_eq!(backward, (0..20).rev().collect::<Vec<_>>());
    }

    #[test]
    fn seek_lands_on_first_ge() {
        let mut list: SkipList<u32, u32> = SkipList::new();
        for k in [0u32, 10, 20, 30] {
            list.insert(k, k);
        }
        let mut cursor = list.cursor();
        cursor.seek(&15);
        assert_eq!(cursor.current().map(|(k, _)| *k), Some(20));
    }

    #[test]
    fn find_and_insert_with_hint_avoids_duplicate() {
        let mut list: SkipList<u32, u32> = SkipList::new();
        list.insert(1, 100);
        let mut hint = Hint::default();
        let found = list.find(&1, &mut hint);
        assert!(found);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn random_insert_order_yields_sorted_iteration() {
        use rand::seq::SliceRandom;

        let mut keys: Vec<u32> = (0..2_000).collect();
        keys.shuffle(&mut rand::rng());

        let mut list: SkipList<u32, u32> = SkipList::new();
        for &k in &keys {
            list.insert(k, k);
        }

        let observed: Vec<_> = list.iter().map(|(k, _)| *k).collect();
        assert_eq!(observed, (0..2_000).collect::<Vec<_>>());
    }
}
