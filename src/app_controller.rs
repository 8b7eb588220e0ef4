use anyhow::{Context, Result, anyhow};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use walkdir::WalkDir;

use crate::app_config::{Config, StorageConfig};
use crate::language_utils;
use crate::providers::{self, ModelCaller};
use crate::segments::SegmentStore;
use crate::storage::{KeyValueStore, Settings, SqliteStore};
use crate::subtitle_processor::SubtitleCollection;
use crate::translation::{GlossaryIndex, RunReport, StateHandle, TranslationOrchestrator};

// @module: Application controller for subtitle files

/// What happened to one input file
#[derive(Debug)]
pub enum FileOutcome {
    /// Translation written to `output`
    Translated { output: PathBuf, report: RunReport },
    /// Output already existed and overwriting was not requested
    Skipped { output: PathBuf },
}

/// Counters of a folder run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FolderSummary {
    pub translated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Main application controller for subtitle translation
pub struct Controller {
    // @field: App configuration, with persisted settings applied
    config: Config,
    // @field: Namespaced persistence
    store: Arc<dyn KeyValueStore>,
    // @field: Model client
    caller: Arc<dyn ModelCaller>,
    // @field: Progress bars of the current invocation
    multi_progress: MultiProgress,
    // @field: Whether Ctrl-C requests a cooperative stop
    handle_interrupts: bool,
    // @field: Set once a stop was requested; outlives individual runs
    stop_requested: Arc<AtomicBool>,
}

impl Controller {
    // @method: Create a controller backed by the configured database and provider
    pub fn with_config(mut config: Config) -> Result<Self> {
        let store = Self::open_store(&config.storage)?;
        config.apply_settings(&Settings::new(store.clone()));
        config.validate().context("Configuration validation failed")?;

        let caller = providers::from_config(&config.translation);
        Ok(Self {
            config,
            store,
            caller,
            multi_progress: MultiProgress::new(),
            handle_interrupts: true,
            stop_requested: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Create a controller from ready-made collaborators, without progress
    /// bars or signal handling
    pub fn with_parts(config: Config, store: Arc<dyn KeyValueStore>, caller: Arc<dyn ModelCaller>) -> Self {
        Self {
            config,
            store,
            caller,
            multi_progress: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            handle_interrupts: false,
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Open the persistence store described by `storage`
    pub fn open_store(storage: &StorageConfig) -> Result<Arc<dyn KeyValueStore>> {
        let store = match &storage.db_path {
            Some(path) => SqliteStore::open(path, &storage.namespace),
            None => SqliteStore::open_default(&storage.namespace),
        }
        .context("Failed to open the settings database")?;
        Ok(Arc::new(store))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn settings(&self) -> Settings {
        Settings::new(self.store.clone())
    }

    /// Glossary as currently persisted
    pub fn glossary(&self) -> GlossaryIndex {
        GlossaryIndex::load(self.store.clone())
    }

    /// Share an externally owned stop flag
    pub fn with_stop_flag(mut self, stop_requested: Arc<AtomicBool>) -> Self {
        self.stop_requested = stop_requested;
        self
    }

    /// Flag that stops the current and every following file once set
    ///
    /// The running file ends at its next batch boundary and its partial
    /// result is still written.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_requested.clone()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Install the Ctrl-C handler for one invocation
    ///
    /// The first Ctrl-C requests a cooperative stop, a second one exits.
    fn listen_for_interrupts(&self) -> Option<JoinHandle<()>> {
        if !self.handle_interrupts {
            return None;
        }
        let stop_requested = self.stop_requested.clone();
        Some(tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if stop_requested.swap(true, Ordering::SeqCst) {
                    error!("Second interrupt received, exiting");
                    std::process::exit(130);
                }
                warn!("Interrupt received, stopping after the current batch (press Ctrl-C again to exit)");
            }
        }))
    }

    /// Translate one SRT file into `output_dir`
    pub async fn run(&self, input_file: &Path, output_dir: &Path, force_overwrite: bool) -> Result<FileOutcome> {
        let listener = self.listen_for_interrupts();
        let outcome = self.translate_file(input_file, output_dir, force_overwrite).await;
        if let Some(listener) = listener {
            listener.abort();
        }
        outcome
    }

    async fn translate_file(&self, input_file: &Path, output_dir: &Path, force_overwrite: bool) -> Result<FileOutcome> {
        if !input_file.is_file() {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }

        let output_path = output_dir.join(Self::get_subtitle_output_filename(input_file, &self.config.target_language));
        if output_path.exists() && !force_overwrite {
            warn!(
                "Skipping {}, translation already exists (use -f to force overwrite)",
                input_file.display()
            );
            return Ok(FileOutcome::Skipped { output: output_path });
        }

        let start_time = Instant::now();
        let subtitles = SubtitleCollection::load(input_file)?;
        let mut segments = subtitles.to_segment_store()?;

        info!(
            "Translating {} ({} entries) with {} - {}",
            input_file.display(),
            segments.len(),
            self.config.translation.provider.display_name(),
            self.config.translation.get_model()
        );

        let report = self.translate_segments(&mut segments).await?;

        subtitles.with_translations(&segments).write_to_srt(&output_path)?;

        if report.stopped {
            warn!("Translation stopped early, partial result written to {}", output_path.display());
        } else if !segments.is_complete() {
            warn!(
                "{} entries could not be translated, see the sentinel lines in {}",
                segments.missing_count(),
                output_path.display()
            );
        }
        info!(
            "Success: {} ({})",
            output_path.display(),
            Self::format_duration(start_time.elapsed())
        );

        Ok(FileOutcome::Translated {
            output: output_path,
            report,
        })
    }

    /// Run the orchestrator over `segments`, then the configured retry rounds
    async fn translate_segments(&self, segments: &mut SegmentStore) -> Result<RunReport> {
        let progress_bar = self.multi_progress.add(ProgressBar::new(segments.len() as u64));
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} segments ({percent}%) {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));

        let pb = progress_bar.clone();
        let state = StateHandle::new();
        let stopper = state.clone();
        let stop_requested = self.stop_requested.clone();
        let mut orchestrator = TranslationOrchestrator::new(self.config.orchestrator_options(), self.glossary())?
            .with_state(state)
            .with_progress_callback(move |snapshot| {
                if stop_requested.load(Ordering::SeqCst) {
                    stopper.request_stop();
                }
                pb.set_length(snapshot.progress.total as u64);
                pb.set_position(snapshot.progress.current as u64);
                pb.set_message(snapshot.current_message.clone());
            });

        let caller = self.caller.as_ref();
        let mut report = orchestrator.translate_all(segments, caller).await;

        let rounds = self.config.translation.common.retry_rounds;
        for round in 1..=rounds {
            let Ok(previous) = &report else { break };
            if previous.stopped || self.is_stop_requested() || segments.missing_count() == 0 {
                break;
            }

            info!("Retry round {}/{} for {} missing segments", round, rounds, segments.missing_count());
            progress_bar.reset();
            report = match orchestrator.retry_missing(segments, caller, None, None).await {
                Ok(retry) => report.map(|first| Self::merge_reports(first, retry)),
                Err(e) => Err(e),
            };
        }

        progress_bar.finish_and_clear();

        let mut report = report?;
        report.stopped |= self.is_stop_requested();
        Ok(report)
    }

    /// Fold a retry round into the report of the first pass
    fn merge_reports(mut first: RunReport, retry: RunReport) -> RunReport {
        first.batches_planned += retry.batches_planned;
        first.batches_attempted += retry.batches_attempted;
        first.batches_failed += retry.batches_failed;
        first.translated += retry.translated;
        first.missing = retry.missing;
        first.anomalies.extend(retry.anomalies);
        first.accepted_terms.extend(retry.accepted_terms);
        first.stopped = retry.stopped;
        first
    }

    /// Translate every `.srt` file below `input_dir`, next to its source
    ///
    /// Files that already are translations into the target language are not
    /// picked up as inputs.
    pub async fn run_folder(&self, input_dir: &Path, force_overwrite: bool) -> Result<FolderSummary> {
        let start_time = Instant::now();

        if !input_dir.is_dir() {
            return Err(anyhow!("Input directory does not exist: {:?}", input_dir));
        }

        let subtitle_files = Self::find_subtitle_files(input_dir, &self.config.target_language);
        if subtitle_files.is_empty() {
            return Err(anyhow!("No subtitle files found in directory: {:?}", input_dir));
        }

        let folder_pb = self.multi_progress.add(ProgressBar::new(subtitle_files.len() as u64));
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        folder_pb.set_style(style.progress_chars("█▓▒░"));

        let listener = self.listen_for_interrupts();
        let mut summary = FolderSummary::default();
        for subtitle_file in &subtitle_files {
            if self.is_stop_requested() {
                folder_pb.abandon_with_message("Stopped");
                info!("Stop requested, not processing the remaining files");
                break;
            }

            let file_name = subtitle_file
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            folder_pb.set_message(format!("Processing: {}", file_name));

            let output_dir = subtitle_file.parent().unwrap_or(input_dir);
            match self.translate_file(subtitle_file, output_dir, force_overwrite).await {
                Ok(FileOutcome::Translated { .. }) => summary.translated += 1,
                Ok(FileOutcome::Skipped { .. }) => summary.skipped += 1,
                Err(e) => {
                    error!("Error processing file {}: {:#}", file_name, e);
                    summary.failed += 1;
                }
            }
            folder_pb.inc(1);
        }
        if let Some(listener) = listener {
            listener.abort();
        }
        folder_pb.finish_and_clear();

        info!(
            "Folder processing completed: {} translated, {} skipped, {} errors ({})",
            summary.translated,
            summary.skipped,
            summary.failed,
            Self::format_duration(start_time.elapsed())
        );

        Ok(summary)
    }

    fn find_subtitle_files(input_dir: &Path, target_language: &str) -> Vec<PathBuf> {
        let translated_suffix = format!(".{}.srt", target_language.to_lowercase());
        let mut files: Vec<PathBuf> = WalkDir::new(input_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("srt"))
            })
            .filter(|p| {
                !p.file_name()
                    .map(|f| f.to_string_lossy().to_lowercase())
                    .is_some_and(|name| name.ends_with(&translated_suffix))
            })
            .collect();
        files.sort();
        files
    }

    /// Change a glossary term and propagate it into a translated SRT file
    ///
    /// Returns the number of subtitle entries changed in `translated_srt`.
    pub fn rename_glossary_term(
        glossary: &mut GlossaryIndex,
        original: &str,
        new_translation: &str,
        translated_srt: Option<&Path>,
    ) -> Result<usize> {
        let Some(path) = translated_srt else {
            glossary.rename(original, new_translation, &mut SegmentStore::default())?;
            return Ok(0);
        };

        let subtitles = SubtitleCollection::load(path)?;
        let mut segments = subtitles.to_translated_segment_store()?;
        let changed = glossary.rename(original, new_translation, &mut segments)?;
        if changed > 0 {
            subtitles.with_translations(&segments).write_to_srt(path)?;
        }
        Ok(changed)
    }

    /// Output filename for `input_file`: `<stem>.<target>.srt`
    ///
    /// A trailing language code in the stem (`movie.en.srt`) is replaced
    /// rather than stacked.
    pub fn get_subtitle_output_filename(input_file: &Path, target_language: &str) -> String {
        let stem = input_file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());

        let base = match stem.rsplit_once('.') {
            Some((base, code))
                if !base.is_empty() && code.len() <= 3 && language_utils::validate_language_code(code).is_ok() =>
            {
                base.to_string()
            }
            _ => stem,
        };

        format!("{}.{}.srt", base, target_language)
    }

    // Format duration in a human-readable format
    fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
