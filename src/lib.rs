/*!
 * # subtx - batch subtitle translation with strict index integrity
 *
 * A Rust library for translating long subtitle files through LLM chat
 * completion endpoints, where every output line must map back to exactly one
 * input line.
 *
 * ## Features
 *
 * - Bounded batches with read-only context on both sides
 * - Index-tagged prompts and a tolerant response parser that never fails
 * - Detection of dropped, duplicated, invented and merged indices
 * - A persisted proper-noun glossary shared across batches
 * - Cooperative cancellation and progress snapshots
 * - Retry of missing segments and single-segment retranslation
 * - DeepSeek, OpenAI, Anthropic and LM Studio clients
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `segments`: Indexed segment store, the single write target of a job
 * - `translation`: The batch translation engine:
 *   - `translation::batch`: Batch planning
 *   - `translation::prompts`: Prompt construction
 *   - `translation::parser`: Response parsing and reconciliation
 *   - `translation::glossary`: Cross-batch terminology
 *   - `translation::orchestrator`: The sequential batch loop
 * - `providers`: Chat model clients behind the `ModelCaller` trait
 * - `storage`: Namespaced key-value persistence (memory and SQLite)
 * - `subtitle_processor`: SRT parsing and writing
 * - `app_config`: Configuration management
 * - `app_controller`: File and folder workflow
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 */

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod app_config;
pub mod app_controller;
pub mod errors;
pub mod language_utils;
pub mod providers;
pub mod segments;
pub mod storage;
pub mod subtitle_processor;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{AppError, GlossaryError, ProviderError, StorageError, TranslationError};
pub use language_utils::{get_language_name, language_codes_match};
pub use providers::{ChatMessage, ModelCaller};
pub use segments::{Segment, SegmentStore, TRANSLATION_ERROR, TRANSLATION_MISSING};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore};
pub use subtitle_processor::{SubtitleCollection, SubtitleEntry};
pub use translation::{GlossaryIndex, TranslationOrchestrator, TranslationState};
