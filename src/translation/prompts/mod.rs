/*!
 * Prompt construction for subtitle translation.
 *
 * This module provides:
 * - The four-section system prompt for batch requests
 * - The user prompt rendering of a batch and its context
 * - Prompts for single-segment retranslation
 */

pub mod templates;

// Re-export main types
pub use templates::{
    CONTEXT_SENTINEL, POST_CONTEXT_HEADER, PRE_CONTEXT_HEADER, PromptBuilder, PromptTemplate, SINGLE_SEGMENT_LEAD,
    TRANSLATE_HEADER,
};
