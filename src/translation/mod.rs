/*!
 * Batch translation engine.
 *
 * Translates an ordered sequence of indexed segments through a chat model
 * while keeping every output tied to exactly one input index. It is split
 * into several submodules:
 *
 * - `batch`: Batch planning with surrounding context
 * - `prompts`: System and user prompt construction
 * - `parser`: Response parsing and anomaly detection
 * - `glossary`: Cross-batch terminology
 * - `state`: Observable progress and stop control
 * - `orchestrator`: The batch loop tying everything together
 */

// Re-export main types for easier usage
pub use self::batch::{Batch, BatchPlanner};
pub use self::glossary::GlossaryIndex;
pub use self::orchestrator::{OrchestratorOptions, ProgressCallback, RunReport, TranslationOrchestrator};
pub use self::parser::{Anomaly, ParsedResponse, ResponseParser, TERMINOLOGY_SENTINEL};
pub use self::prompts::{PromptBuilder, PromptTemplate};
pub use self::state::{Progress, StateHandle, TranslationState};

// Submodules
pub mod batch;
pub mod glossary;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod state;
