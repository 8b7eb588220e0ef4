/*!
 * Batch planning.
 *
 * Splits the ordered segment sequence into fixed-size windows and attaches
 * a bounded slice of neighbouring segments on each side. The neighbours are
 * read-only context: they are shown to the model for coherence but are never
 * translated as part of that window.
 */

use serde::Serialize;

use crate::errors::TranslationError;
use crate::segments::Segment;

/// A bounded group of segments sent together in one model request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
    /// Segments to translate, in order
    pub items: Vec<Segment>,

    /// Segments immediately before `items`, context only
    pub pre_context: Vec<Segment>,

    /// Segments immediately after `items`, context only
    pub post_context: Vec<Segment>,
}

impl Batch {
    /// Indices of the segments to translate, in order
    pub fn item_indices(&self) -> Vec<usize> {
        self.items.iter().map(|s| s.index).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Source texts of every segment the request shows the model
    pub fn visible_texts(&self) -> Vec<&str> {
        self.pre_context
            .iter()
            .chain(&self.items)
            .chain(&self.post_context)
            .map(|s| s.source_text.as_str())
            .collect()
    }
}

/// Splits segments into windows with surrounding context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlanner {
    batch_size: usize,
    context_size: usize,
}

impl BatchPlanner {
    /// Create a planner; `batch_size` must be positive
    pub fn new(batch_size: usize, context_size: usize) -> Result<Self, TranslationError> {
        if batch_size == 0 {
            return Err(TranslationError::InvalidBatchSize(batch_size));
        }
        Ok(Self {
            batch_size,
            context_size,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn context_size(&self) -> usize {
        self.context_size
    }

    /// Number of batches `plan` will produce for `segment_count` segments
    pub fn batch_count(&self, segment_count: usize) -> usize {
        segment_count.div_ceil(self.batch_size)
    }

    /// Plan batches over `segments` in order
    pub fn plan(&self, segments: &[Segment]) -> Vec<Batch> {
        let total = segments.len();

        segments
            .chunks(self.batch_size)
            .enumerate()
            .map(|(i, window)| {
                let start = i * self.batch_size;
                let end = start + window.len();

                let pre_start = start.saturating_sub(self.context_size);
                let post_end = (end + self.context_size).min(total);

                Batch {
                    items: window.to_vec(),
                    pre_context: segments[pre_start..start].to_vec(),
                    post_context: segments[end..post_end].to_vec(),
                }
            })
            .collect()
    }
}
