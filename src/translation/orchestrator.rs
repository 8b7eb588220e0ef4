/*!
 * Batch translation orchestrator.
 *
 * Drives one job from start to finish:
 * 1. plan batches over the target segments
 * 2. per batch, filter the glossary, build the prompts and call the model
 * 3. parse and reconcile the reply, write results into the segment store
 * 4. merge newly discovered terms, report progress, cool down
 *
 * Batches run strictly one after another. A failed batch never fails the
 * job: its untranslated segments get the error sentinel and the loop moves
 * on. A stop request is honoured at the next batch boundary and never
 * interrupts a model call in flight.
 */

use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::TranslationError;
use crate::providers::{ChatMessage, ModelCaller};
use crate::segments::{Segment, SegmentStore};
use crate::translation::batch::{Batch, BatchPlanner};
use crate::translation::glossary::GlossaryIndex;
use crate::translation::parser::{Anomaly, ResponseParser};
use crate::translation::prompts::PromptBuilder;
use crate::translation::state::{StateHandle, TranslationState};

/// Callback receiving a state snapshot after every batch
pub type ProgressCallback = Arc<dyn Fn(&TranslationState) + Send + Sync>;

/// Tunables of a translation job
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorOptions {
    /// Segments per request; must be positive
    pub batch_size: usize,
    /// Context segments on each side of a batch
    pub context_size: usize,
    /// Pause after a successful batch
    pub success_delay: Duration,
    /// Pause after a failed batch
    pub failure_delay: Duration,
    pub source_language: String,
    pub target_language: String,
    /// Replaces the default behaviour instruction
    pub custom_instruction: Option<String>,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            context_size: 5,
            success_delay: Duration::from_millis(500),
            failure_delay: Duration::from_millis(1000),
            source_language: "en".to_string(),
            target_language: "zh".to_string(),
            custom_instruction: None,
        }
    }
}

impl OrchestratorOptions {
    /// Same options without inter-batch pauses
    pub fn without_delays(mut self) -> Self {
        self.success_delay = Duration::ZERO;
        self.failure_delay = Duration::ZERO;
        self
    }
}

/// What happened during one run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Indices the run was asked to translate
    pub targets: Vec<usize>,
    pub batches_planned: usize,
    pub batches_attempted: usize,
    pub batches_failed: usize,
    /// Segments of this run that ended with an accepted translation
    pub translated: usize,
    /// Segments of this run still missing afterwards
    pub missing: usize,
    /// Every structural anomaly seen, in batch order
    pub anomalies: Vec<Anomaly>,
    /// Glossary terms accepted during the run
    pub accepted_terms: BTreeMap<String, String>,
    /// True when the run ended on a stop request
    pub stopped: bool,
}

/// Sequential batch translation driver
pub struct TranslationOrchestrator {
    options: OrchestratorOptions,
    prompts: PromptBuilder,
    glossary: GlossaryIndex,
    state: StateHandle,
    progress_callback: Option<ProgressCallback>,
}

impl TranslationOrchestrator {
    /// Create an orchestrator; rejects a zero batch size
    pub fn new(options: OrchestratorOptions, glossary: GlossaryIndex) -> Result<Self, TranslationError> {
        BatchPlanner::new(options.batch_size, options.context_size)?;
        let prompts = PromptBuilder::new(&options.source_language, &options.target_language)
            .with_custom_instruction(options.custom_instruction.as_deref());

        Ok(Self {
            options,
            prompts,
            glossary,
            state: StateHandle::new(),
            progress_callback: None,
        })
    }

    /// Call `callback` with a state snapshot after each batch
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&TranslationState) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Use an externally owned state handle
    pub fn with_state(mut self, state: StateHandle) -> Self {
        self.state = state;
        self
    }

    /// Handle for observing progress and requesting a stop
    pub fn state(&self) -> StateHandle {
        self.state.clone()
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    pub fn glossary(&self) -> &GlossaryIndex {
        &self.glossary
    }

    pub fn glossary_mut(&mut self) -> &mut GlossaryIndex {
        &mut self.glossary
    }

    /// Translate every segment of the store
    pub async fn translate_all(
        &mut self,
        store: &mut SegmentStore,
        caller: &dyn ModelCaller,
    ) -> Result<RunReport, TranslationError> {
        let targets = store.segments().to_vec();
        let (batch_size, context_size) = (self.options.batch_size, self.options.context_size);
        self.run(store, &targets, caller, batch_size, context_size).await
    }

    /// Feed every segment still flagged missing through a fresh run
    ///
    /// `batch_size` and `context_size` default to the configured values.
    pub async fn retry_missing(
        &mut self,
        store: &mut SegmentStore,
        caller: &dyn ModelCaller,
        batch_size: Option<usize>,
        context_size: Option<usize>,
    ) -> Result<RunReport, TranslationError> {
        let targets = store.missing_segments();
        info!("Retrying {} missing segments", targets.len());
        self.run(
            store,
            &targets,
            caller,
            batch_size.unwrap_or(self.options.batch_size),
            context_size.unwrap_or(self.options.context_size),
        )
        .await
    }

    /// Translate `targets` in batches, writing results into `store`
    ///
    /// Validation errors (zero batch size, unknown or duplicate target
    /// indices, a run already active) are returned before any state changes.
    /// Once running, only the per-segment sentinels report failures.
    pub async fn run(
        &mut self,
        store: &mut SegmentStore,
        targets: &[Segment],
        caller: &dyn ModelCaller,
        batch_size: usize,
        context_size: usize,
    ) -> Result<RunReport, TranslationError> {
        let planner = BatchPlanner::new(batch_size, context_size)?;
        Self::check_targets(store, targets)?;

        let _guard = self.state.begin(targets.len())?;

        let batches = planner.plan(targets);
        let mut report = RunReport {
            targets: targets.iter().map(|s| s.index).collect(),
            batches_planned: batches.len(),
            ..RunReport::default()
        };

        info!(
            "Translating {} segments in {} batches with {} (batch size {}, context {})",
            targets.len(),
            batches.len(),
            caller.name(),
            batch_size,
            context_size
        );

        for (i, batch) in batches.iter().enumerate() {
            if self.state.should_stop() {
                info!("Stop requested, skipping the remaining {} batches", batches.len() - i);
                report.stopped = true;
                break;
            }

            self.state
                .set_message(format!("Translating batch {}/{}", i + 1, batches.len()));
            report.batches_attempted += 1;

            let succeeded = self.translate_batch(store, batch, caller, &mut report).await?;
            if !succeeded {
                report.batches_failed += 1;
            }

            let snapshot = self.state.advance(batch.len());
            if let Some(callback) = &self.progress_callback {
                callback(&snapshot);
            }

            let is_last = i + 1 == batches.len();
            let delay = if succeeded {
                self.options.success_delay
            } else {
                self.options.failure_delay
            };
            if !is_last && !delay.is_zero() && !self.state.should_stop() {
                tokio::time::sleep(delay).await;
            }
        }

        // A stop that arrived during the final batch still ends the job
        report.stopped |= self.state.should_stop();

        for index in &report.targets {
            match store.get(*index) {
                Some(segment) if !segment.missing => report.translated += 1,
                _ => report.missing += 1,
            }
        }

        info!(
            "Run finished: {} translated, {} missing, {}/{} batches failed{}",
            report.translated,
            report.missing,
            report.batches_failed,
            report.batches_attempted,
            if report.stopped { " (stopped)" } else { "" }
        );

        Ok(report)
    }

    /// Translate one batch; returns whether the model call succeeded
    async fn translate_batch(
        &mut self,
        store: &mut SegmentStore,
        batch: &Batch,
        caller: &dyn ModelCaller,
        report: &mut RunReport,
    ) -> Result<bool, TranslationError> {
        let expected = batch.item_indices();
        let relevant = self.glossary.relevant_to(&batch.visible_texts());
        let (system_prompt, user_prompt) = self.prompts.build(batch, &relevant);

        debug!(
            "Batch {:?}..{:?}: {} items, {} context, {} glossary terms",
            expected.first(),
            expected.last(),
            batch.items.len(),
            batch.pre_context.len() + batch.post_context.len(),
            relevant.len()
        );

        let messages = [ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)];
        let raw = match caller.call(&messages).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("Batch {:?} failed: {}", expected, e);
                for index in &expected {
                    store.mark_error_if_untranslated(*index)?;
                }
                return Ok(false);
            }
        };

        let parsed = ResponseParser::parse(&raw);
        let mut anomalies = parsed.anomalies.clone();
        anomalies.extend(ResponseParser::reconcile(&expected, &parsed));

        for index in &expected {
            match parsed.translations.get(index) {
                Some(text) if !text.is_empty() => store.set_translation(*index, text.as_str())?,
                _ => store.mark_missing(*index)?,
            }
        }

        for anomaly in &anomalies {
            warn!("Response anomaly: {}", anomaly);
        }
        report.anomalies.extend(anomalies);

        let accepted = self.glossary.merge_new(&parsed.glossary_delta);
        for (term, translation) in &accepted {
            debug!("New glossary term: {} -> {}", term, translation);
        }
        report.accepted_terms.extend(accepted);

        Ok(true)
    }

    /// Translate a single segment again, optionally showing its neighbours
    ///
    /// On success the trimmed reply becomes the segment's translation. On
    /// failure the segment is left untouched and the error is returned.
    pub async fn retranslate_segment(
        &self,
        store: &mut SegmentStore,
        index: usize,
        with_context: bool,
        caller: &dyn ModelCaller,
    ) -> Result<String, TranslationError> {
        let segment = store.get(index).cloned().ok_or(TranslationError::UnknownIndex(index))?;

        let (previous, next) = if with_context {
            let (p, n) = store.neighbours(index);
            (p.cloned(), n.cloned())
        } else {
            (None, None)
        };
        let previous_translation = previous.as_ref().and_then(|p| p.accepted_translation());

        let messages = [
            ChatMessage::system(self.prompts.single_segment_system_prompt()),
            ChatMessage::user(self.prompts.single_segment_user_prompt(
                &segment,
                previous.as_ref(),
                previous_translation,
                next.as_ref(),
            )),
        ];

        let reply = caller.call(&messages).await?;
        let translation = reply.trim();
        if translation.is_empty() {
            return Err(TranslationError::EmptyTranslation(index));
        }

        store.set_translation(index, translation)?;
        info!("Retranslated segment {}", index);
        Ok(translation.to_string())
    }

    fn check_targets(store: &SegmentStore, targets: &[Segment]) -> Result<(), TranslationError> {
        let mut seen = HashSet::with_capacity(targets.len());
        for segment in targets {
            if store.get(segment.index).is_none() {
                return Err(TranslationError::UnknownIndex(segment.index));
            }
            if !seen.insert(segment.index) {
                return Err(TranslationError::DuplicateIndex(segment.index));
            }
        }
        Ok(())
    }
}
