/*!
 * File-level workflow tests: SRT in, translated SRT out
 */

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use subtx::app_config::{Config, TranslationProvider};
use subtx::app_controller::{Controller, FileOutcome, FolderSummary};
use subtx::errors::ProviderError;
use subtx::providers::{ChatMessage, MockProvider, ModelCaller};
use subtx::segments::TRANSLATION_MISSING;
use subtx::storage::KeyValueStore;
use subtx::subtitle_processor::SubtitleCollection;

use crate::common;

fn test_config() -> Config {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::LMStudio;
    config.translation.common.batch_size = 3;
    config.translation.common.context_size = 1;
    config.translation.common.success_delay_ms = 0;
    config.translation.common.failure_delay_ms = 0;
    config
}

fn controller_with(provider: &MockProvider, store: Arc<dyn KeyValueStore>) -> Controller {
    Controller::with_parts(test_config(), store, Arc::new(provider.clone()))
}

/// Raises the stop flag while answering, like a Ctrl-C during a model call
struct InterruptedModel {
    inner: MockProvider,
    stop_flag: Arc<AtomicBool>,
}

#[async_trait]
impl ModelCaller for InterruptedModel {
    async fn call(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.inner.call(messages).await
    }

    fn name(&self) -> &str {
        "Interrupted"
    }
}

fn interrupted_controller(provider: &MockProvider) -> Controller {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let model = InterruptedModel {
        inner: provider.clone(),
        stop_flag: stop_flag.clone(),
    };
    Controller::with_parts(test_config(), common::memory_store(), Arc::new(model)).with_stop_flag(stop_flag)
}

#[tokio::test]
async fn test_controller_run_shouldWriteTranslatedFileNextToOutputDir() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "movie.en.srt", 7)?;
    let provider = MockProvider::working();
    let controller = controller_with(&provider, common::memory_store());

    let outcome = controller.run(&input, temp_dir.path(), false).await?;

    let FileOutcome::Translated { output, report } = outcome else {
        panic!("expected a translated outcome");
    };
    assert_eq!(output, temp_dir.path().join("movie.zh.srt"));
    assert_eq!(report.translated, 7);
    assert_eq!(provider.call_count(), 3);

    let written = SubtitleCollection::load(&output)?;
    let source = SubtitleCollection::load(&input)?;
    assert_eq!(written.entries.len(), 7);
    assert_eq!(written.entries[4].text, format!("TR:{}", common::line_text(5)));
    assert_eq!(written.entries[4].start_time_ms, source.entries[4].start_time_ms);
    assert_eq!(written.entries[4].end_time_ms, source.entries[4].end_time_ms);
    Ok(())
}

#[tokio::test]
async fn test_controller_run_withExistingOutput_shouldSkipUnlessForced() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "movie.srt", 2)?;
    let provider = MockProvider::working();
    let controller = controller_with(&provider, common::memory_store());

    controller.run(&input, temp_dir.path(), false).await?;
    let second = controller.run(&input, temp_dir.path(), false).await?;
    assert!(matches!(second, FileOutcome::Skipped { .. }));
    assert_eq!(provider.call_count(), 1);

    let forced = controller.run(&input, temp_dir.path(), true).await?;
    assert!(matches!(forced, FileOutcome::Translated { .. }));
    assert_eq!(provider.call_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_controller_run_shouldRetryMissingSegmentsOnce() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "movie.srt", 3)?;
    let provider = MockProvider::working().with_scripted_reply("[1] Uno\n[3] Tre");
    let controller = controller_with(&provider, common::memory_store());

    let outcome = controller.run(&input, temp_dir.path(), false).await?;

    let FileOutcome::Translated { output, report } = outcome else {
        panic!("expected a translated outcome");
    };
    assert_eq!(provider.requested_indices(), vec![vec![1, 2, 3], vec![2]]);
    assert_eq!(report.missing, 0);
    let texts: Vec<String> = SubtitleCollection::load(&output)?
        .entries
        .into_iter()
        .map(|e| e.text)
        .collect();
    assert_eq!(texts, vec!["Uno".to_string(), format!("TR:{}", common::line_text(2)), "Tre".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_controller_run_withSilentModel_shouldWriteMissingSentinel() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "movie.srt", 2)?;
    let provider = MockProvider::empty();
    let controller = controller_with(&provider, common::memory_store());

    let outcome = controller.run(&input, temp_dir.path(), false).await?;

    let FileOutcome::Translated { output, report } = outcome else {
        panic!("expected a translated outcome");
    };
    assert_eq!(report.missing, 2);
    let written = SubtitleCollection::load(&output)?;
    assert!(written.entries.iter().all(|e| e.text == TRANSLATION_MISSING));
    Ok(())
}

#[tokio::test]
async fn test_controller_run_shouldPersistDiscoveredTerms() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "movie.srt", 2)?;
    let store = common::memory_store();
    let provider = MockProvider::working().with_terms(&[("Line", "Linea")]);
    let controller = controller_with(&provider, store.clone());

    controller.run(&input, temp_dir.path(), false).await?;

    assert_eq!(controller.glossary().get("Line"), Some("Linea"));
    assert_eq!(subtx::GlossaryIndex::load(store).get("Line"), Some("Linea"));
    Ok(())
}

#[tokio::test]
async fn test_controller_runFolder_shouldSkipExistingTranslations() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let season = temp_dir.path().join("season1");
    std::fs::create_dir_all(&season)?;
    common::create_test_subtitle(temp_dir.path(), "a.srt", 2)?;
    common::create_test_subtitle(&season, "b.en.srt", 2)?;
    common::create_test_subtitle(&season, "b.zh.srt", 2)?;
    common::create_test_file(temp_dir.path(), "notes.txt", "not a subtitle")?;
    let provider = MockProvider::working();
    let controller = controller_with(&provider, common::memory_store());

    let summary = controller.run_folder(temp_dir.path(), false).await?;

    // b.zh.srt is never an input and already counts as b.en.srt's output
    assert_eq!(
        summary,
        FolderSummary {
            translated: 1,
            skipped: 1,
            failed: 0
        }
    );
    assert!(temp_dir.path().join("a.zh.srt").exists());
    assert_eq!(provider.call_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_controller_runFolder_withInvalidFile_shouldCountFailure() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    common::create_test_subtitle(temp_dir.path(), "good.srt", 1)?;
    common::create_test_file(temp_dir.path(), "broken.srt", "this is not srt")?;
    let controller = controller_with(&MockProvider::working(), common::memory_store());

    let summary = controller.run_folder(temp_dir.path(), false).await?;

    assert_eq!(summary.translated, 1);
    assert_eq!(summary.failed, 1);
    Ok(())
}

#[tokio::test]
async fn test_controller_run_withMissingInput_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let controller = controller_with(&MockProvider::working(), common::memory_store());

    let result = controller.run(&temp_dir.path().join("nope.srt"), temp_dir.path(), false).await;

    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn test_renameGlossaryTerm_shouldRewriteTranslatedFile() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "movie.srt", 3)?;
    let store = common::memory_store();
    let provider = MockProvider::working().with_prefix("Roma: ").with_terms(&[("Line", "Roma")]);
    let controller = controller_with(&provider, store.clone());
    controller.run(&input, temp_dir.path(), false).await?;
    let translated = temp_dir.path().join("movie.zh.srt");

    let mut glossary = controller.glossary();
    let changed = Controller::rename_glossary_term(&mut glossary, "Line", "罗马", Some(&translated))?;

    assert_eq!(changed, 3);
    assert_eq!(subtx::GlossaryIndex::load(store).get("Line"), Some("罗马"));
    let rewritten = SubtitleCollection::load(&translated)?;
    assert_eq!(rewritten.entries[0].text, format!("罗马: {}", common::line_text(1)));
    assert_eq!(rewritten.entries.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_controller_run_withStopDuringOnlyBatch_shouldSkipRetryAndWritePartial() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "movie.srt", 3)?;
    let provider = MockProvider::dropping([2]);
    let controller = interrupted_controller(&provider);

    let outcome = controller.run(&input, temp_dir.path(), false).await?;

    let FileOutcome::Translated { output, report } = outcome else {
        panic!("expected a translated outcome");
    };
    assert!(report.stopped);
    assert_eq!(report.missing, 1);
    assert_eq!(provider.call_count(), 1);
    let written = SubtitleCollection::load(&output)?;
    assert_eq!(written.entries[1].text, TRANSLATION_MISSING);
    Ok(())
}

#[tokio::test]
async fn test_controller_runFolder_withStopDuringFirstFile_shouldNotStartNextFile() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    common::create_test_subtitle(temp_dir.path(), "a.srt", 2)?;
    common::create_test_subtitle(temp_dir.path(), "b.srt", 2)?;
    let provider = MockProvider::working();
    let controller = interrupted_controller(&provider);

    let summary = controller.run_folder(temp_dir.path(), false).await?;

    assert_eq!(summary.translated, 1);
    assert!(temp_dir.path().join("a.zh.srt").exists());
    assert!(!temp_dir.path().join("b.zh.srt").exists());
    assert_eq!(provider.call_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_controller_runFolder_withStopAlreadyRequested_shouldProcessNothing() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    common::create_test_subtitle(temp_dir.path(), "a.srt", 2)?;
    let provider = MockProvider::working();
    let controller = controller_with(&provider, common::memory_store());
    controller.stop_flag().store(true, Ordering::SeqCst);

    let summary = controller.run_folder(temp_dir.path(), false).await?;

    assert_eq!(summary, FolderSummary::default());
    assert_eq!(provider.call_count(), 0);
    Ok(())
}
