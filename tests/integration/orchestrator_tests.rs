/*!
 * End-to-end tests of batch translation runs against the mock model
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use subtx::errors::TranslationError;
use subtx::providers::{MockProvider, ModelCaller};
use subtx::segments::{TRANSLATION_ERROR, TRANSLATION_MISSING};
use subtx::translation::{Anomaly, TranslationOrchestrator};

use crate::common;

fn build_orchestrator(batch_size: usize, context_size: usize) -> TranslationOrchestrator {
    TranslationOrchestrator::new(common::fast_options(batch_size, context_size), common::empty_glossary())
        .expect("valid options")
}

#[tokio::test]
async fn test_translateAll_with23Segments_shouldCallOncePerBatch() {
    common::init_logging();
    let mut store = common::numbered_store(23);
    let provider = MockProvider::working();
    let mut orchestrator = build_orchestrator(10, 5);

    let report = orchestrator.translate_all(&mut store, &provider).await.unwrap();

    assert_eq!(
        provider.requested_indices(),
        vec![(1..=10).collect::<Vec<_>>(), (11..=20).collect(), (21..=23).collect()]
    );
    assert_eq!(report.batches_planned, 3);
    assert_eq!(report.translated, 23);
    assert_eq!(report.missing, 0);
    assert!(report.anomalies.is_empty());
    assert!(store.is_complete());
    assert_eq!(store.get(17).unwrap().display_text(), format!("TR:{}", common::line_text(17)));
}

#[tokio::test]
async fn test_translateAll_shouldShowContextButNeverRequestIt() {
    let mut store = common::numbered_store(23);
    let provider = MockProvider::working();
    let mut orchestrator = build_orchestrator(10, 5);

    orchestrator.translate_all(&mut store, &provider).await.unwrap();

    let calls = provider.calls();
    let second_user_prompt = &calls[1][1].content;
    assert!(second_user_prompt.contains(&format!("[CONTEXT] [6] {}", common::line_text(6))));
    assert!(second_user_prompt.contains(&format!("[CONTEXT] [21] {}", common::line_text(21))));
    assert!(second_user_prompt.contains(&format!("[CONTEXT] [23] {}", common::line_text(23))));
    assert!(!second_user_prompt.contains("[CONTEXT] [5]"));
    assert!(!second_user_prompt.contains("[CONTEXT] [11]"));
    assert!(!second_user_prompt.contains("[CONTEXT] [24]"));
}

#[tokio::test]
async fn test_translateAll_withStopDuringFinalBatch_shouldReportStopped() {
    let mut store = common::numbered_store(10);
    let provider = MockProvider::dropping([3]);
    let orchestrator = build_orchestrator(10, 0);
    let stopper = orchestrator.state();
    let mut orchestrator = orchestrator.with_progress_callback(move |_| stopper.request_stop());

    let report = orchestrator.translate_all(&mut store, &provider).await.unwrap();

    assert!(report.stopped);
    assert_eq!(report.batches_attempted, 1);
    assert_eq!(report.missing, 1);
    assert!(!orchestrator.state().is_translating());
}

#[tokio::test]
async fn test_translateAll_withStopAfterFirstBatch_shouldSkipTheRest() {
    let mut store = common::numbered_store(23);
    let provider = MockProvider::working();
    let orchestrator = build_orchestrator(10, 5);
    let state = orchestrator.state();
    let stopper = state.clone();
    let mut orchestrator = orchestrator.with_progress_callback(move |_| stopper.request_stop());

    let report = orchestrator.translate_all(&mut store, &provider).await.unwrap();

    assert_eq!(provider.call_count(), 1);
    assert!(report.stopped);
    assert_eq!(report.batches_attempted, 1);
    assert!(!state.is_translating());
    assert_eq!(store.missing_count(), 13);
    assert!((11..=23).all(|i| store.get(i).unwrap().missing));
}

#[tokio::test]
async fn test_translateAll_shouldReportProgressAfterEveryBatch() {
    let mut store = common::numbered_store(23);
    let provider = MockProvider::working();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let mut orchestrator = build_orchestrator(10, 2)
        .with_progress_callback(move |state| recorder.lock().push(state.progress.current));

    orchestrator.translate_all(&mut store, &provider).await.unwrap();

    assert_eq!(*seen.lock(), vec![10, 20, 23]);
    let final_state = orchestrator.state().snapshot();
    assert_eq!(final_state.progress.percentage, 100);
    assert!(!final_state.is_translating);
}

#[tokio::test]
async fn test_translateAll_withMissingIndices_shouldFlagThem() {
    let mut store = common::numbered_store(3);
    let provider = MockProvider::working().with_scripted_reply("[1] A\n[3] C");
    let mut orchestrator = build_orchestrator(10, 0);

    let report = orchestrator.translate_all(&mut store, &provider).await.unwrap();

    assert_eq!(report.missing, 1);
    assert_eq!(report.anomalies, vec![Anomaly::MissingIndex { index: 2 }]);
    assert_eq!(store.get(1).unwrap().display_text(), "A");
    assert_eq!(store.get(2).unwrap().display_text(), TRANSLATION_MISSING);
    assert_eq!(store.get(3).unwrap().display_text(), "C");
}

#[tokio::test]
async fn test_translateAll_withDuplicateIndex_shouldKeepLastOccurrence() {
    let mut store = common::numbered_store(1);
    let provider = MockProvider::working().with_scripted_reply("[1] A\n[1] B");
    let mut orchestrator = build_orchestrator(5, 0);

    let report = orchestrator.translate_all(&mut store, &provider).await.unwrap();

    assert!(report.anomalies.contains(&Anomaly::DuplicateIndex { index: 1 }));
    assert_eq!(store.get(1).unwrap().display_text(), "B");
}

#[tokio::test]
async fn test_translateAll_withEmbeddedMarker_shouldStoreMergedTextAndFlagNext() {
    let mut store = common::numbered_store(2);
    let provider = MockProvider::working().with_scripted_reply("[1] Hello [2] World");
    let mut orchestrator = build_orchestrator(5, 0);

    let report = orchestrator.translate_all(&mut store, &provider).await.unwrap();

    assert!(report.anomalies.iter().any(|a| matches!(a, Anomaly::EmbeddedMarker { index: 1, .. })));
    assert!(report.anomalies.contains(&Anomaly::MissingIndex { index: 2 }));
    assert_eq!(store.get(1).unwrap().display_text(), "Hello [2] World");
    assert!(store.get(2).unwrap().missing);
}

#[tokio::test]
async fn test_translateAll_withExtraIndex_shouldIgnoreIt() {
    let mut store = common::numbered_store(1);
    let provider = MockProvider::working().with_scripted_reply("[1] A\n[99] stray");
    let mut orchestrator = build_orchestrator(5, 0);

    let report = orchestrator.translate_all(&mut store, &provider).await.unwrap();

    assert_eq!(report.anomalies, vec![Anomaly::ExtraIndex { index: 99 }]);
    assert_eq!(store.len(), 1);
    assert!(store.get(99).is_none());
}

#[tokio::test]
async fn test_translateAll_withFailingBatch_shouldMarkErrorAndContinue() {
    let mut store = common::numbered_store(23);
    let provider = MockProvider::failing_on([2]);
    let mut orchestrator = build_orchestrator(10, 5);

    let report = orchestrator.translate_all(&mut store, &provider).await.unwrap();

    assert_eq!(provider.call_count(), 3);
    assert_eq!(report.batches_failed, 1);
    assert_eq!(report.translated, 13);
    assert_eq!(report.missing, 10);
    assert!((11..=20).all(|i| store.get(i).unwrap().display_text() == TRANSLATION_ERROR));
    assert!(!store.get(21).unwrap().missing);
}

#[tokio::test]
async fn test_translateAll_withTerms_shouldGrowGlossaryAndInjectIt() {
    let mut store = subtx::SegmentStore::new(vec![
        subtx::Segment::new(1, "Caesar crossed the river."),
        subtx::Segment::new(2, "Nobody followed."),
        subtx::Segment::new(3, "Caesar smiled."),
    ])
    .unwrap();
    let provider = MockProvider::working().with_terms(&[("Caesar", "凯撒")]);
    let mut orchestrator = build_orchestrator(1, 0);

    let report = orchestrator.translate_all(&mut store, &provider).await.unwrap();

    assert_eq!(report.accepted_terms.len(), 1);
    assert_eq!(orchestrator.glossary().get("Caesar"), Some("凯撒"));

    let calls = provider.calls();
    let system_prompts: Vec<&str> = calls.iter().map(|c| c[0].content.as_str()).collect();
    assert!(!system_prompts[0].contains("凯撒"));
    assert!(!system_prompts[1].contains("凯撒"));
    assert!(system_prompts[2].contains("凯撒"));
}

#[tokio::test]
async fn test_translateAll_withExistingGlossaryTerm_shouldNotOverwriteIt() {
    let mut store = common::numbered_store(2);
    let mut glossary = common::empty_glossary();
    glossary.merge_new(&[("Line".to_string(), "Linea".to_string())].into_iter().collect());
    let provider = MockProvider::working().with_terms(&[("Line", "Zeile")]);
    let mut orchestrator = TranslationOrchestrator::new(common::fast_options(5, 0), glossary).unwrap();

    let report = orchestrator.translate_all(&mut store, &provider).await.unwrap();

    assert!(report.accepted_terms.is_empty());
    assert_eq!(orchestrator.glossary().get("Line"), Some("Linea"));
}

#[tokio::test]
async fn test_run_withInvalidTargets_shouldFailBeforeAnyCall() {
    let mut store = common::numbered_store(3);
    let provider = MockProvider::working();
    let mut orchestrator = build_orchestrator(5, 0);

    let unknown = vec![subtx::Segment::new(42, "ghost")];
    let duplicate = vec![store.get(1).unwrap().clone(), store.get(1).unwrap().clone()];
    let targets = store.segments().to_vec();

    assert!(matches!(
        orchestrator.run(&mut store, &unknown, &provider, 5, 0).await,
        Err(TranslationError::UnknownIndex(42))
    ));
    assert!(matches!(
        orchestrator.run(&mut store, &duplicate, &provider, 5, 0).await,
        Err(TranslationError::DuplicateIndex(1))
    ));
    assert!(matches!(
        orchestrator.run(&mut store, &targets, &provider, 0, 0).await,
        Err(TranslationError::InvalidBatchSize(0))
    ));
    assert_eq!(provider.call_count(), 0);
    assert!(!orchestrator.state().is_translating());
}

#[test]
fn test_orchestrator_new_withZeroBatchSize_shouldFail() {
    let result = TranslationOrchestrator::new(common::fast_options(0, 5), common::empty_glossary());

    assert!(matches!(result, Err(TranslationError::InvalidBatchSize(0))));
}

/// Counts calls and answers every batch with nothing
struct SilentModel {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl ModelCaller for SilentModel {
    async fn call(&self, _messages: &[subtx::ChatMessage]) -> Result<String, subtx::ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("I cannot help with that.".to_string())
    }

    fn name(&self) -> &str {
        "Silent"
    }
}

#[test]
fn test_translateAll_withUnusableReplies_shouldLeaveEverythingMissing() {
    let mut store = common::numbered_store(4);
    let model = SilentModel {
        calls: AtomicUsize::new(0),
    };
    let mut orchestrator = build_orchestrator(2, 1);

    let report = tokio_test::block_on(orchestrator.translate_all(&mut store, &model)).unwrap();

    assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.missing, 4);
    assert_eq!(report.batches_failed, 0);
    assert!(store.segments().iter().all(|s| s.display_text() == TRANSLATION_MISSING));
}
