use alloc::boxed::Box;
use core::sync::atomic::{AtomicUsize, Ordering};

/// End-of-list marker.
const NIL: usize = usize::MAX;

/// Successor link of every page, shared by all free lists.
///
/// Link `i` is only meaningful while page `i` is free, and is only touched by
/// whoever holds the lock of the list page `i` is on. The shard lock orders the
/// accesses, so relaxed loads and stores are enough.
pub(crate) struct Links {
    next: Box<[AtomicUsize]>,
}

impl Links {
    pub fn new(pages: usize) -> Self {
        Self {
            next: (0..pages).map(|_| AtomicUsize::new(NIL)).collect(),
        }
    }

    #[inline]
    fn get(&self, index: usize) -> usize {
        self.next[index].load(Ordering::Relaxed)
    }

    #[inline]
    fn set(&self, index: usize, next: usize) {
        self.next[index].store(next, Ordering::Relaxed);
    }
}

/// LIFO stack of free page indices, threaded through [`Links`].
///
/// The most recently freed page is handed out first.
#[derive(Debug)]
pub(crate) struct FreeList {
    head: usize,
    len: usize,
}

impl FreeList {
    pub const fn new() -> Self {
        Self { head: NIL, len: 0 }
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub fn push(&mut self, links: &Links, index: usize) {
        links.set(index, self.head);
        self.head = index;
        self.len += 1;
    }

    pub fn pop(&mut self, links: &Links) -> Option<usize> {
        if self.head == NIL {
            return None;
        }
        let index = self.head;
        self.head = links.get(index);
        links.set(index, NIL);
        self.len -= 1;
        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_most_recently_pushed_first() {
        let links = Links::new(4);
        let mut list = FreeList::new();
        for i in [2, 0, 3] {
            list.push(&links, i);
        }
        assert_eq!(list.len(), 3);
        assert_eq!(list.pop(&links), Some(3));
        assert_eq!(list.pop(&links), Some(0));
        assert_eq!(list.pop(&links), Some(2));
        assert_eq!(list.pop(&links), None);
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn lists_share_links_without_interfering() {
        let links = Links::new(4);
        let mut a = FreeList::new();
        let mut b = FreeList::new();
        a.push(&links, 0);
        b.push(&links, 1);
        a.push(&links, 2);
        b.push(&links, 3);

        // Move a page from one list to the other.
        let moved = a.pop(&links).unwrap();
        b.push(&links, moved);

        assert_eq!(a.pop(&links), Some(0));
        assert_eq!(a.pop(&links), None);
        assert_eq!(b.pop(&links), Some(2));
        assert_eq!(b.pop(&links), Some(3));
        assert_eq!(b.pop(&links), Some(1));
        assert_eq!(b.pop(&links), None);
    }
}
