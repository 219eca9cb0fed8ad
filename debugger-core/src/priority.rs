// Priority-ordered listener list
//
// Elements are kept sorted by descending priority; elements sharing a
// priority stay in insertion order, so iteration is deterministic.

/// A list of elements sorted by priority, highest first. Ties preserve
/// insertion order.
#[derive(Debug, Clone)]
pub struct PriorityList<T> {
    entries: Vec<Entry<T>>,
}

#[derive(Debug, Clone)]
struct Entry<T> {
    priority: u16,
    element: T,
}

impl<T> Default for PriorityList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PriorityList<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert an element at its priority position, after any existing
    /// elements of equal priority.
    pub fn add(&mut self, element: T, priority: u16) {
        let at = self
            .entries
            .partition_point(|entry| entry.priority >= priority);
        self.entries.insert(at, Entry { priority, element });
    }

    /// Remove the first element the predicate matches. Returns whether
    /// anything was removed.
    pub fn remove_where<F>(&mut self, mut matches: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        match self.entries.iter().position(|e| matches(&e.element)) {
            Some(at) => {
                self.entries.remove(at);
                true
            }
            None => false,
        }
    }

    /// Iterate elements in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|e| &e.element)
    }

    /// Iterate (priority, element) pairs in dispatch order.
    pub fn iter_with_priority(&self) -> impl Iterator<Item = (u16, &T)> {
        self.entries.iter().map(|e| (e.priority, &e.element))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_descending_priority_regardless_of_insertion() {
        let mut list = PriorityList::new();
        list.add("mid", 500);
        list.add("high", 900);
        list.add("low", 100);

        let order: Vec<_> = list.iter().copied().collect();
        assert_eq!(order, vec!["high", "mid", "low"]);
    }

    #[test]
    fn equal_priorities_keep_insertion_order() {
        let mut list = PriorityList::new();
        list.add("first", 500);
        list.add("second", 500);
        list.add("third", 500);
        list.add("top", 501);

        let order: Vec<_> = list.iter().copied().collect();
        assert_eq!(order, vec!["top", "first", "second", "third"]);
    }

    #[test]
    fn remove_where_drops_only_first_match() {
        let mut list = PriorityList::new();
        list.add("a", 10);
        list.add("b", 20);
        list.add("a", 30);

        assert!(list.remove_where(|e| *e == "a"));
        let order: Vec<_> = list.iter().copied().collect();
        assert_eq!(order, vec!["b", "a"]);

        assert!(!list.remove_where(|e| *e == "zzz"));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn iter_with_priority_exposes_bands() {
        let mut list = PriorityList::new();
        list.add("normal", 512);
        list.add("breakpoint", 1000);

        let pairs: Vec<_> = list.iter_with_priority().map(|(p, _)| p).collect();
        assert_eq!(pairs, vec![1000, 512]);
    }
}
