/*!
 * Cross-batch terminology glossary.
 *
 * The glossary maps case-sensitive source terms to their translations. It
 * grows automatically from the terminology blocks of batch responses, where
 * the first translation seen for a term wins and is never replaced, and can
 * be corrected explicitly by the user. Every mutation is persisted as one
 * JSON object under the `proper_nouns` key.
 */

use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::GlossaryError;
use crate::segments::SegmentStore;
use crate::storage::{GLOSSARY_KEY, KeyValueStore};

/// Persisted source-term -> translation map
#[derive(Clone)]
pub struct GlossaryIndex {
    entries: BTreeMap<String, String>,
    store: Arc<dyn KeyValueStore>,
}

impl GlossaryIndex {
    /// Load the glossary from the store
    ///
    /// Absent, unreadable or malformed data yields an empty glossary.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let entries = match store.get(GLOSSARY_KEY) {
            Ok(Some(json)) => Self::decode(&json),
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!("Failed to read glossary, starting empty: {}", e);
                BTreeMap::new()
            }
        };

        debug!("Loaded glossary with {} entries", entries.len());
        Self { entries, store }
    }

    fn decode(json: &str) -> BTreeMap<String, String> {
        match serde_json::from_str::<serde_json::Value>(json) {
            Ok(serde_json::Value::Object(map)) => map
                .into_iter()
                .filter_map(|(term, value)| match value {
                    serde_json::Value::String(translation) => Some((term, translation)),
                    _ => None,
                })
                .collect(),
            Ok(_) => {
                warn!("Persisted glossary is not a JSON object, starting empty");
                BTreeMap::new()
            }
            Err(e) => {
                warn!("Persisted glossary is malformed, starting empty: {}", e);
                BTreeMap::new()
            }
        }
    }

    /// Every entry, ordered by term
    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn get(&self, term: &str) -> Option<&str> {
        self.entries.get(term).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Subset of `all` whose terms occur in any of the candidate texts
    ///
    /// Matching is a case-insensitive substring test against the
    /// concatenation of the candidates.
    pub fn filter_relevant<S: AsRef<str>>(
        candidate_texts: &[S],
        all: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let haystack = candidate_texts
            .iter()
            .map(|t| t.as_ref())
            .collect::<Vec<_>>()
            .join("\n")
            .to_lowercase();

        all.iter()
            .filter(|(term, _)| !term.is_empty() && haystack.contains(&term.to_lowercase()))
            .map(|(term, translation)| (term.clone(), translation.clone()))
            .collect()
    }

    /// Entries of this glossary relevant to the candidate texts
    pub fn relevant_to<S: AsRef<str>>(&self, candidate_texts: &[S]) -> BTreeMap<String, String> {
        Self::filter_relevant(candidate_texts, &self.entries)
    }

    /// Insert the terms not yet known and return exactly those
    ///
    /// Existing keys are never overwritten. A persistence failure is logged
    /// and the in-memory glossary keeps the accepted terms.
    pub fn merge_new(&mut self, delta: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut accepted = BTreeMap::new();

        for (term, translation) in delta {
            let term = term.trim();
            let translation = translation.trim();
            if term.is_empty() || translation.is_empty() || self.entries.contains_key(term) {
                continue;
            }
            self.entries.insert(term.to_string(), translation.to_string());
            accepted.insert(term.to_string(), translation.to_string());
        }

        if !accepted.is_empty() {
            info!("Glossary accepted {} new terms", accepted.len());
            if let Err(e) = self.persist() {
                warn!("Failed to persist glossary: {}", e);
            }
        }

        accepted
    }

    /// Overwrite a term's translation and propagate the change
    ///
    /// Every literal occurrence of the previous translation in accepted
    /// segment translations is replaced by `new_translation`. A term that was
    /// not in the glossary is simply inserted. Returns the number of segments
    /// changed.
    pub fn rename(
        &mut self,
        original: &str,
        new_translation: &str,
        segments: &mut SegmentStore,
    ) -> Result<usize, GlossaryError> {
        let original = Self::validate_term(original)?;
        let previous = self.entries.insert(original.to_string(), new_translation.to_string());

        let changed = match previous.as_deref() {
            Some(old) => segments.replace_in_translations(old, new_translation),
            None => 0,
        };

        info!(
            "Renamed glossary term '{}' to '{}' ({} segments updated)",
            original, new_translation, changed
        );
        self.persist()?;
        Ok(changed)
    }

    /// Set a term's translation without touching any segment
    pub fn update(&mut self, original: &str, translation: &str) -> Result<(), GlossaryError> {
        let original = Self::validate_term(original)?;
        self.entries.insert(original.to_string(), translation.to_string());
        self.persist()
    }

    /// Remove a term; returns its translation if it existed
    pub fn remove(&mut self, original: &str) -> Result<Option<String>, GlossaryError> {
        let removed = self.entries.remove(original);
        if removed.is_some() {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Remove every term
    pub fn clear(&mut self) -> Result<(), GlossaryError> {
        self.entries.clear();
        self.store.remove(GLOSSARY_KEY)?;
        Ok(())
    }

    fn validate_term(term: &str) -> Result<&str, GlossaryError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(GlossaryError::EmptyTerm);
        }
        Ok(term)
    }

    fn persist(&self) -> Result<(), GlossaryError> {
        let json = serde_json::to_string(&self.entries)?;
        self.store.set(GLOSSARY_KEY, &json)?;
        Ok(())
    }
}
