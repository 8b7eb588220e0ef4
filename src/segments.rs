/*!
 * Ordered segment storage.
 *
 * A segment is one indexed unit of source text that needs its own
 * translation. The store keeps segments in document order, guarantees index
 * uniqueness and is the only place translations are written back to.
 */

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::TranslationError;
use crate::subtitle_processor::SubtitleEntry;

/// Text surfaced for a segment the model did not return
pub const TRANSLATION_MISSING: &str = "translation missing";

/// Text surfaced for a segment whose batch failed at the transport level
pub const TRANSLATION_ERROR: &str = "translation error";

/// A single indexed unit of text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Source-assigned index, unique within a store
    pub index: usize,

    /// Original text
    pub source_text: String,

    /// Accepted translation, or a sentinel after a failed attempt
    #[serde(default)]
    pub translated_text: Option<String>,

    /// True until a translation has been accepted
    #[serde(default = "default_missing")]
    pub missing: bool,
}

fn default_missing() -> bool {
    true
}

impl Segment {
    /// Create an untranslated segment
    pub fn new(index: usize, source_text: impl Into<String>) -> Self {
        Self {
            index,
            source_text: source_text.into(),
            translated_text: None,
            missing: true,
        }
    }

    /// Create a segment that already carries an accepted translation
    pub fn translated(index: usize, source_text: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            index,
            source_text: source_text.into(),
            translated_text: Some(translation.into()),
            missing: false,
        }
    }

    /// Text shown on the read path: the translation, or the sentinel in its place
    pub fn display_text(&self) -> &str {
        match &self.translated_text {
            Some(text) => text,
            None => TRANSLATION_MISSING,
        }
    }

    /// The accepted translation, if any
    pub fn accepted_translation(&self) -> Option<&str> {
        if self.missing {
            None
        } else {
            self.translated_text.as_deref()
        }
    }
}

/// Ordered collection of segments keyed by their index
#[derive(Debug, Clone, Default)]
pub struct SegmentStore {
    segments: Vec<Segment>,
    positions: HashMap<usize, usize>,
}

impl SegmentStore {
    /// Build a store from segments in document order
    pub fn new(segments: Vec<Segment>) -> Result<Self, TranslationError> {
        let mut positions = HashMap::with_capacity(segments.len());
        for (pos, segment) in segments.iter().enumerate() {
            if positions.insert(segment.index, pos).is_some() {
                return Err(TranslationError::DuplicateIndex(segment.index));
            }
        }
        Ok(Self { segments, positions })
    }

    /// Build a store of untranslated segments from parsed subtitle entries
    pub fn from_subtitles(entries: &[SubtitleEntry]) -> Result<Self, TranslationError> {
        Self::new(
            entries
                .iter()
                .map(|entry| Segment::new(entry.seq_num, entry.text.clone()))
                .collect(),
        )
    }

    /// Build a store whose segments are already translated with the given texts
    ///
    /// Used when an existing translated file is loaded for glossary repair.
    pub fn from_translated_subtitles(entries: &[SubtitleEntry]) -> Result<Self, TranslationError> {
        Self::new(
            entries
                .iter()
                .map(|entry| Segment::translated(entry.seq_num, entry.text.clone(), entry.text.clone()))
                .collect(),
        )
    }

    /// All segments in document order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Look up a segment by index
    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.positions.get(&index).map(|&pos| &self.segments[pos])
    }

    /// Position of an index in document order
    pub fn position_of(&self, index: usize) -> Option<usize> {
        self.positions.get(&index).copied()
    }

    fn get_mut(&mut self, index: usize) -> Result<&mut Segment, TranslationError> {
        let pos = self
            .positions
            .get(&index)
            .copied()
            .ok_or(TranslationError::UnknownIndex(index))?;
        Ok(&mut self.segments[pos])
    }

    /// Accept a translation for a segment
    pub fn set_translation(&mut self, index: usize, text: impl Into<String>) -> Result<(), TranslationError> {
        let segment = self.get_mut(index)?;
        segment.translated_text = Some(text.into());
        segment.missing = false;
        Ok(())
    }

    /// Force a segment to the missing sentinel
    pub fn mark_missing(&mut self, index: usize) -> Result<(), TranslationError> {
        let segment = self.get_mut(index)?;
        segment.translated_text = Some(TRANSLATION_MISSING.to_string());
        segment.missing = true;
        Ok(())
    }

    /// Force a segment to the error sentinel, unless it already holds a translation
    ///
    /// Returns whether the segment was changed.
    pub fn mark_error_if_untranslated(&mut self, index: usize) -> Result<bool, TranslationError> {
        let segment = self.get_mut(index)?;
        if !segment.missing {
            return Ok(false);
        }
        segment.translated_text = Some(TRANSLATION_ERROR.to_string());
        segment.missing = true;
        Ok(true)
    }

    /// Segments still lacking an accepted translation, in document order
    pub fn missing_segments(&self) -> Vec<Segment> {
        self.segments.iter().filter(|s| s.missing).cloned().collect()
    }

    pub fn missing_count(&self) -> usize {
        self.segments.iter().filter(|s| s.missing).count()
    }

    /// True when every segment has an accepted translation
    pub fn is_complete(&self) -> bool {
        !self.segments.is_empty() && self.missing_count() == 0
    }

    /// Neighbours of a segment in document order
    pub fn neighbours(&self, index: usize) -> (Option<&Segment>, Option<&Segment>) {
        match self.position_of(index) {
            Some(pos) => (
                pos.checked_sub(1).map(|p| &self.segments[p]),
                self.segments.get(pos + 1),
            ),
            None => (None, None),
        }
    }

    /// Replace every literal occurrence of `old` with `new` in accepted translations
    ///
    /// Returns the number of segments whose text changed. An empty `old` is a no-op.
    pub fn replace_in_translations(&mut self, old: &str, new: &str) -> usize {
        if old.is_empty() || old == new {
            return 0;
        }

        let mut changed = 0;
        for segment in self.segments.iter_mut().filter(|s| !s.missing) {
            if let Some(text) = segment.translated_text.as_mut() {
                if text.contains(old) {
                    *text = text.replace(old, new);
                    changed += 1;
                }
            }
        }
        debug!("Replaced '{}' with '{}' in {} segments", old, new, changed);
        changed
    }

    /// Remove a segment and renumber the remainder sequentially from 1
    pub fn remove(&mut self, index: usize) -> Result<Segment, TranslationError> {
        let pos = self
            .positions
            .get(&index)
            .copied()
            .ok_or(TranslationError::UnknownIndex(index))?;
        let removed = self.segments.remove(pos);
        self.renumber();
        Ok(removed)
    }

    /// Assign sequential indices 1..=n in document order
    pub fn renumber(&mut self) {
        self.positions.clear();
        for (pos, segment) in self.segments.iter_mut().enumerate() {
            segment.index = pos + 1;
            self.positions.insert(segment.index, pos);
        }
    }
}
