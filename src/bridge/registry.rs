//! Link registry
//!
//! Maps a destination name to the external handle opened for it. Lookups
//! are concurrent; enumeration returns links in registration order so a poll
//! tick visits them deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

struct Entry<H: ?Sized> {
    seq: u64,
    handle: Arc<H>,
}

pub struct LinkRegistry<H: ?Sized> {
    links: DashMap<String, Entry<H>>,
    next_seq: AtomicU64,
}

impl<H: ?Sized> LinkRegistry<H> {
    pub fn new() -> Self {
        Self {
            links: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Record a handle, returning the one it replaced
    pub fn insert(&self, name: &str, handle: Arc<H>) -> Option<Arc<H>> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.links
            .insert(name.to_string(), Entry { seq, handle })
            .map(|previous| previous.handle)
    }

    pub fn get(&self, name: &str) -> Option<Arc<H>> {
        self.links.get(name).map(|entry| entry.handle.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.links.contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<H>> {
        self.links.remove(name).map(|(_, entry)| entry.handle)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// All links in registration order
    pub fn snapshot(&self) -> Vec<(String, Arc<H>)> {
        let mut entries: Vec<(u64, String, Arc<H>)> = self
            .links
            .iter()
            .map(|entry| (entry.seq, entry.key().clone(), entry.handle.clone()))
            .collect();
        entries.sort_by_key(|(seq, _, _)| *seq);
        entries
            .into_iter()
            .map(|(_, name, handle)| (name, handle))
            .collect()
    }

    /// Remove every link, returning them in registration order
    pub fn drain(&self) -> Vec<(String, Arc<H>)> {
        let entries = self.snapshot();
        for (name, _) in &entries {
            self.links.remove(name);
        }
        entries
    }
}

impl<H: ?Sized> Default for LinkRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_in_registration_order() {
        let registry: LinkRegistry<str> = LinkRegistry::new();
        registry.insert("c", Arc::from("1"));
        registry.insert("a", Arc::from("2"));
        registry.insert("b", Arc::from("3"));

        let names: Vec<String> = registry.snapshot().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_replace_and_remove() {
        let registry: LinkRegistry<str> = LinkRegistry::new();
        assert!(registry.insert("q", Arc::from("first")).is_none());
        let previous = registry.insert("q", Arc::from("second"));
        assert_eq!(previous.as_deref(), Some("first"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("q").as_deref(), Some("second"));

        assert!(registry.remove("q").is_some());
        assert!(registry.is_empty());
        assert!(registry.get("q").is_none());
    }

    #[test]
    fn test_drain_empties() {
        let registry: LinkRegistry<str> = LinkRegistry::new();
        registry.insert("x", Arc::from("1"));
        registry.insert("y", Arc::from("2"));

        let drained = registry.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].0, "x");
        assert!(registry.is_empty());
    }
}
