//! Insertion-ordered set used for bundle leaf lists
//!
//! Bundle resolution appends leaves for inclusion patterns and removes them
//! again for later exclusion patterns. The resulting order must follow the
//! pattern list exactly, so the set keeps an explicit sequence next to a
//! membership index.

use std::collections::HashSet;
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct OrderedSet<T> {
    items: Vec<T>,
    members: HashSet<T>,
}

impl<T: Clone + Eq + Hash> OrderedSet<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            members: HashSet::new(),
        }
    }

    /// Append `item` unless it is already present. Returns whether it was added.
    pub fn insert(&mut self, item: T) -> bool {
        if self.members.contains(&item) {
            return false;
        }
        self.members.insert(item.clone());
        self.items.push(item);
        true
    }

    /// Remove `item` if present, keeping the order of the rest.
    pub fn remove(&mut self, item: &T) -> bool {
        if !self.members.remove(item) {
            return false;
        }
        if let Some(index) = self.items.iter().position(|i| i == item) {
            self.items.remove(index);
        }
        true
    }

    pub fn contains(&self, item: &T) -> bool {
        self.members.contains(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Clone + Eq + Hash> Default for OrderedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Eq + Hash> FromIterator<T> for OrderedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for item in iter {
            set.insert(item);
        }
        set
    }
}
