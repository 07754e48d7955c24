//! Recency order for the memory tier.
//!
//! Entries are linked newest to oldest through [`SlotId`]s into a
//! [`SlotArena`], so a handle stays valid while its entry moves around and no
//! `unsafe` is needed.
//!
//! ```text
//!   newest ─► [id_4] ◄──► [id_1] ◄──► [id_7] ◄── oldest (next victim)
//! ```
//!
//! Everything except iteration and draining is O(1).

use crate::ds::slot_arena::{SlotArena, SlotId};

#[derive(Debug)]
struct Link<T> {
    value: T,
    newer: Option<SlotId>,
    older: Option<SlotId>,
}

#[derive(Debug)]
pub struct RecencyList<T> {
    links: SlotArena<Link<T>>,
    newest: Option<SlotId>,
    oldest: Option<SlotId>,
}

impl<T> RecencyList<T> {
    pub fn new() -> Self {
        Self {
            links: SlotArena::new(),
            newest: None,
            oldest: None,
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn newest(&self) -> Option<&T> {
        self.get(self.newest?)
    }

    pub fn oldest(&self) -> Option<&T> {
        self.get(self.oldest?)
    }

    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.links.get(id).map(|link| &link.value)
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        self.links.get_mut(id).map(|link| &mut link.value)
    }

    /// Newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let mut cursor = self.newest;
        std::iter::from_fn(move || {
            let link = self.links.get(cursor?)?;
            cursor = link.older;
            Some(&link.value)
        })
    }

    /// Adds `value` as the newest entry.
    pub fn push_newest(&mut self, value: T) -> SlotId {
        let id = self.links.insert(Link {
            value,
            newer: None,
            older: None,
        });
        self.link_as_newest(id);
        id
    }

    pub fn pop_oldest(&mut self) -> Option<T> {
        self.remove(self.oldest?)
    }

    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        self.unlink(id)?;
        self.links.remove(id).map(|link| link.value)
    }

    /// Marks `id` as the newest entry. Returns `false` for a stale handle.
    pub fn touch(&mut self, id: SlotId) -> bool {
        if self.newest == Some(id) {
            return true;
        }
        if self.unlink(id).is_none() {
            return false;
        }
        self.link_as_newest(id);
        true
    }

    /// Empties the list, returning values oldest first.
    pub fn drain_oldest_first(&mut self) -> Vec<T> {
        let mut drained = Vec::with_capacity(self.len());
        while let Some(value) = self.pop_oldest() {
            drained.push(value);
        }
        self.links.clear();
        drained
    }

    fn unlink(&mut self, id: SlotId) -> Option<()> {
        let link = self.links.get_mut(id)?;
        let (newer, older) = (link.newer.take(), link.older.take());

        match newer.and_then(|n| self.links.get_mut(n)) {
            Some(newer_link) => newer_link.older = older,
            None => self.newest = older,
        }
        match older.and_then(|o| self.links.get_mut(o)) {
            Some(older_link) => older_link.newer = newer,
            None => self.oldest = newer,
        }
        Some(())
    }

    fn link_as_newest(&mut self, id: SlotId) {
        let previous = self.newest;
        let Some(link) = self.links.get_mut(id) else {
            return;
        };
        link.newer = None;
        link.older = previous;

        match previous.and_then(|p| self.links.get_mut(p)) {
            Some(previous_link) => previous_link.newer = Some(id),
            None => self.oldest = Some(id),
        }
        self.newest = Some(id);
    }

    /// Walks the chain both ways and checks it against the arena.
    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        let mut seen = 0usize;
        let mut expected_newer = None;
        let mut cursor = self.newest;
        while let Some(id) = cursor {
            let link = self.links.get(id).expect("linked entry missing from arena");
            assert_eq!(link.newer, expected_newer, "broken newer link");
            expected_newer = Some(id);
            cursor = link.older;
            seen += 1;
            assert!(seen <= self.len(), "cycle in recency list");
        }
        assert_eq!(self.oldest, expected_newer, "oldest does not end the chain");
        assert_eq!(seen, self.len());
    }
}

impl<T> Default for RecencyList<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order<T: Copy>(list: &RecencyList<T>) -> Vec<T> {
        list.iter().copied().collect()
    }

    #[test]
    fn pushes_are_ordered_newest_first() {
        let mut list = RecencyList::new();
        for n in 1..=3 {
            list.push_newest(n);
        }
        assert_eq!(order(&list), vec![3, 2, 1]);
        assert_eq!(list.newest(), Some(&3));
        assert_eq!(list.oldest(), Some(&1));
        list.debug_validate_invariants();
    }

    #[test]
    fn touch_promotes_without_duplicating() {
        let mut list = RecencyList::new();
        let oldest = list.push_newest('x');
        list.push_newest('y');
        list.push_newest('z');

        assert!(list.touch(oldest));
        assert_eq!(order(&list), vec!['x', 'z', 'y']);
        assert!(list.touch(oldest));
        assert_eq!(list.len(), 3);
        list.debug_validate_invariants();
    }

    #[test]
    fn removal_from_any_position() {
        let mut list = RecencyList::new();
        let first = list.push_newest(10);
        let middle = list.push_newest(20);
        let last = list.push_newest(30);

        assert_eq!(list.remove(middle), Some(20));
        assert_eq!(order(&list), vec![30, 10]);
        list.debug_validate_invariants();

        assert_eq!(list.remove(last), Some(30));
        assert_eq!(list.newest(), Some(&10));
        assert_eq!(list.remove(first), Some(10));
        assert!(list.is_empty());
        assert_eq!(list.oldest(), None);

        assert!(!list.touch(first));
        assert_eq!(list.remove(first), None);
        list.debug_validate_invariants();
    }

    #[test]
    fn eviction_side_is_the_oldest() {
        let mut list = RecencyList::new();
        let a = list.push_newest("a");
        list.push_newest("b");
        list.touch(a);
        assert_eq!(list.pop_oldest(), Some("b"));
        assert_eq!(list.pop_oldest(), Some("a"));
        assert_eq!(list.pop_oldest(), None);
    }

    #[test]
    fn drain_yields_oldest_first() {
        let mut list = RecencyList::new();
        list.push_newest(1);
        let two = list.push_newest(2);
        list.push_newest(3);
        if let Some(value) = list.get_mut(two) {
            *value = 22;
        }
        assert_eq!(list.drain_oldest_first(), vec![1, 22, 3]);
        assert!(list.is_empty());
        list.push_newest(4);
        list.debug_validate_invariants();
    }
}
