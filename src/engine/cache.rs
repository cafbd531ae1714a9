//! Evaluation result cache.
//!
//! Entries are keyed by node identity plus the serialized active constraint.
//! The cache is derived data: clearing it at any point only costs time.
//!
//! Inserting speech for a newer revision of a document evicts that document's
//! older entries. Entries of dropped documents stay until `clear`; callers that
//! keep one engine across many documents clear it between them.

use std::collections::HashMap;

use crate::audio::SpeechSegment;
use crate::dom::NodeIdentity;

type CacheKey = (NodeIdentity, String);

/// Hit/miss counters since the cache was created or last cleared.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

#[derive(Debug)]
pub struct SpeechCache {
    entries: HashMap<CacheKey, Vec<SpeechSegment>>,
    /// Newest revision seen per document id.
    revisions: HashMap<u64, u64>,
    hits: usize,
    misses: usize,
    enabled: bool,
}

impl SpeechCache {
    pub fn new(enabled: bool) -> Self {
        SpeechCache { entries: HashMap::new(), revisions: HashMap::new(), hits: 0, misses: 0, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.clear();
        }
    }

    pub fn get(&mut self, node: NodeIdentity, dynamic: &str) -> Option<Vec<SpeechSegment>> {
        if !self.enabled {
            return None;
        }
        // Borrowed tuple keys are not expressible for `HashMap::get`.
        match self.entries.get(&(node, dynamic.to_string())) {
            Some(segments) => {
                self.hits += 1;
                Some(segments.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, node: NodeIdentity, dynamic: &str, segments: &[SpeechSegment]) {
        if !self.enabled {
            return;
        }
        let latest = self.revisions.entry(node.document).or_insert(node.revision);
        if node.revision < *latest {
            return;
        }
        if node.revision > *latest {
            *latest = node.revision;
            self.entries.retain(|(key, _), _| key.document != node.document || key.revision >= node.revision);
        }
        self.entries.insert((node, dynamic.to_string()), segments.to_vec());
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.revisions.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats { hits: self.hits, misses: self.misses, entries: self.entries.len() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    #[test]
    fn newer_revisions_evict_older_entries_of_the_same_document() {
        let mut doc = Document::parse("<a><b/></a>").unwrap();
        let other = Document::parse("<c/>").unwrap();
        let mut cache = SpeechCache::new(true);
        let speech = [SpeechSegment::text("x")];

        let root = doc.document_element().unwrap();
        let old_root = root.identity();
        cache.insert(old_root, "en.mathspeak.default", &speech);
        cache.insert(root.child_elements().next().unwrap().identity(), "en.mathspeak.default", &speech);
        cache.insert(other.document_element().unwrap().identity(), "en.mathspeak.default", &speech);
        assert_eq!(cache.len(), 3);

        let id = doc.document_element().unwrap().id();
        doc.set_attribute(id, "k", "v");
        cache.insert(doc.document_element().unwrap().identity(), "en.mathspeak.default", &speech);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(old_root, "en.mathspeak.default"), None);

        // Late writes for a superseded revision are ignored.
        cache.insert(old_root, "en.mathspeak.brief", &speech);
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }
}
