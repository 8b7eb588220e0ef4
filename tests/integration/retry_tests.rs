/*!
 * Tests for retrying missing segments and single-segment retranslation
 */

use subtx::errors::{ProviderError, TranslationError};
use subtx::providers::MockProvider;
use subtx::translation::TranslationOrchestrator;

use crate::common;

#[tokio::test]
async fn test_retryMissing_shouldOnlyRequestMissingSegments() {
    common::init_logging();
    let mut store = common::numbered_store(6);
    let mut orchestrator = TranslationOrchestrator::new(common::fast_options(10, 2), common::empty_glossary()).unwrap();

    let first = orchestrator
        .translate_all(&mut store, &MockProvider::dropping([2, 5]))
        .await
        .unwrap();
    assert_eq!(first.missing, 2);

    let second_model = MockProvider::working().with_prefix("R:");
    let retry = orchestrator.retry_missing(&mut store, &second_model, None, None).await.unwrap();

    assert_eq!(second_model.requested_indices(), vec![vec![2, 5]]);
    assert_eq!(retry.targets, vec![2, 5]);
    assert_eq!(retry.translated, 2);
    assert!(store.is_complete());
    assert_eq!(store.get(5).unwrap().display_text(), format!("R:{}", common::line_text(5)));
    assert_eq!(store.get(4).unwrap().display_text(), format!("TR:{}", common::line_text(4)));
}

#[tokio::test]
async fn test_retryMissing_withOverrides_shouldUseGivenBatchSize() {
    let mut store = common::numbered_store(5);
    let mut orchestrator = TranslationOrchestrator::new(common::fast_options(10, 0), common::empty_glossary()).unwrap();
    let model = MockProvider::working();

    let report = orchestrator.retry_missing(&mut store, &model, Some(2), Some(0)).await.unwrap();

    assert_eq!(report.batches_planned, 3);
    assert_eq!(model.requested_indices(), vec![vec![1, 2], vec![3, 4], vec![5]]);
}

#[tokio::test]
async fn test_retryMissing_withNothingMissing_shouldNotCallModel() {
    let mut store = common::numbered_store(3);
    let mut orchestrator = TranslationOrchestrator::new(common::fast_options(10, 0), common::empty_glossary()).unwrap();
    orchestrator.translate_all(&mut store, &MockProvider::working()).await.unwrap();

    let model = MockProvider::working();
    let report = orchestrator.retry_missing(&mut store, &model, None, None).await.unwrap();

    assert_eq!(model.call_count(), 0);
    assert_eq!(report.batches_planned, 0);
    assert_eq!(report.missing, 0);
}

#[tokio::test]
async fn test_retryMissing_shouldRecoverErroredBatch() {
    let mut store = common::numbered_store(4);
    let mut orchestrator = TranslationOrchestrator::new(common::fast_options(2, 0), common::empty_glossary()).unwrap();
    orchestrator.translate_all(&mut store, &MockProvider::failing_on([1])).await.unwrap();
    assert_eq!(store.missing_count(), 2);

    orchestrator.retry_missing(&mut store, &MockProvider::working(), None, None).await.unwrap();

    assert!(store.is_complete());
}

#[tokio::test]
async fn test_retranslateSegment_withContext_shouldShowNeighbours() {
    let mut store = common::numbered_store(3);
    store.set_translation(1, "Ligne 1").unwrap();
    let orchestrator = TranslationOrchestrator::new(common::fast_options(10, 0), common::empty_glossary()).unwrap();
    let model = MockProvider::working();

    let translation = orchestrator.retranslate_segment(&mut store, 2, true, &model).await.unwrap();

    assert_eq!(translation, format!("TR:{}", common::line_text(2)));
    assert_eq!(store.get(2).unwrap().display_text(), translation);
    assert!(!store.get(2).unwrap().missing);

    let user_prompt = &model.calls()[0][1].content;
    assert!(user_prompt.contains(&format!("[CONTEXT] {}", common::line_text(1))));
    assert!(user_prompt.contains("[CONTEXT] (translated) Ligne 1"));
    assert!(user_prompt.contains(&format!("[CONTEXT] {}", common::line_text(3))));
}

#[tokio::test]
async fn test_retranslateSegment_withoutContext_shouldSendOnlyTheSegment() {
    let mut store = common::numbered_store(3);
    let orchestrator = TranslationOrchestrator::new(common::fast_options(10, 0), common::empty_glossary()).unwrap();
    let model = MockProvider::working();

    orchestrator.retranslate_segment(&mut store, 2, false, &model).await.unwrap();

    let user_prompt = &model.calls()[0][1].content;
    assert!(!user_prompt.contains("[CONTEXT]"));
    assert!(user_prompt.contains(&common::line_text(2)));
}

#[tokio::test]
async fn test_retranslateSegment_withProviderError_shouldLeaveSegmentUntouched() {
    let mut store = common::numbered_store(2);
    store.set_translation(1, "Ligne 1").unwrap();
    let orchestrator = TranslationOrchestrator::new(common::fast_options(10, 0), common::empty_glossary()).unwrap();
    let model = MockProvider::working().with_scripted_error(ProviderError::ConnectionError("reset".to_string()));

    let result = orchestrator.retranslate_segment(&mut store, 1, true, &model).await;

    assert!(matches!(result, Err(TranslationError::Provider(ProviderError::ConnectionError(_)))));
    assert_eq!(store.get(1).unwrap().display_text(), "Ligne 1");
}

#[tokio::test]
async fn test_retranslateSegment_withEmptyReply_shouldFail() {
    let mut store = common::numbered_store(2);
    let orchestrator = TranslationOrchestrator::new(common::fast_options(10, 0), common::empty_glossary()).unwrap();

    let result = orchestrator
        .retranslate_segment(&mut store, 2, false, &MockProvider::empty())
        .await;

    assert!(matches!(result, Err(TranslationError::EmptyTranslation(2))));
    assert!(store.get(2).unwrap().missing);
}

#[tokio::test]
async fn test_retranslateSegment_withUnknownIndex_shouldFail() {
    let mut store = common::numbered_store(2);
    let orchestrator = TranslationOrchestrator::new(common::fast_options(10, 0), common::empty_glossary()).unwrap();
    let model = MockProvider::working();

    let result = orchestrator.retranslate_segment(&mut store, 9, false, &model).await;

    assert!(matches!(result, Err(TranslationError::UnknownIndex(9))));
    assert_eq!(model.call_count(), 0);
}
