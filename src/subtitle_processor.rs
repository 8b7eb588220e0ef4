use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::TranslationError;
use crate::segments::SegmentStore;

// @module: SRT ingestion and output

// @const: SRT timestamp line
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2}):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d{2}):(\d{2}):(\d{2})[,.](\d{3})")
        .expect("timestamp regex")
});

// @struct: Single subtitle entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleEntry {
    // @field: Sequence number, used as the segment index
    pub seq_num: usize,

    // @field: Start time in ms
    pub start_time_ms: u64,

    // @field: End time in ms
    pub end_time_ms: u64,

    // @field: Subtitle text, possibly multi-line
    pub text: String,
}

impl SubtitleEntry {
    pub fn new(seq_num: usize, start_time_ms: u64, end_time_ms: u64, text: String) -> Self {
        SubtitleEntry {
            seq_num,
            start_time_ms,
            end_time_ms,
            text,
        }
    }

    // @creates: Validated subtitle entry
    // @validates: Time range and non-empty text
    pub fn new_validated(seq_num: usize, start_time_ms: u64, end_time_ms: u64, text: String) -> Result<Self> {
        if end_time_ms < start_time_ms {
            return Err(anyhow!(
                "Invalid time range: end time {} < start time {}",
                end_time_ms,
                start_time_ms
            ));
        }

        let trimmed_text = text.trim();
        if trimmed_text.is_empty() {
            return Err(anyhow!("Empty subtitle text for entry {}", seq_num));
        }

        Ok(SubtitleEntry {
            seq_num,
            start_time_ms,
            end_time_ms,
            text: trimmed_text.to_string(),
        })
    }

    /// Parse an SRT timestamp (HH:MM:SS,mmm) to milliseconds
    pub fn parse_timestamp(timestamp: &str) -> Result<u64> {
        let parts: Vec<&str> = timestamp.trim().split(&[':', ',', '.'][..]).collect();

        if parts.len() != 4 {
            return Err(anyhow!("Invalid timestamp format: {}", timestamp));
        }

        let hours: u64 = parts[0].parse().context("Failed to parse hours")?;
        let minutes: u64 = parts[1].parse().context("Failed to parse minutes")?;
        let seconds: u64 = parts[2].parse().context("Failed to parse seconds")?;
        let millis: u64 = parts[3].parse().context("Failed to parse milliseconds")?;

        if minutes >= 60 || seconds >= 60 || millis >= 1000 {
            return Err(anyhow!("Invalid time components in timestamp: {}", timestamp));
        }

        Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
    }

    pub fn format_start_time(&self) -> String {
        Self::format_timestamp(self.start_time_ms)
    }

    pub fn format_end_time(&self) -> String {
        Self::format_timestamp(self.end_time_ms)
    }

    /// Format milliseconds as an SRT timestamp (HH:MM:SS,mmm)
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }
}

impl fmt::Display for SubtitleEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.seq_num)?;
        writeln!(f, "{} --> {}", self.format_start_time(), self.format_end_time())?;
        writeln!(f, "{}", self.text)?;
        writeln!(f)
    }
}

/// Subtitle entries of one file, in file order
#[derive(Debug, Clone)]
pub struct SubtitleCollection {
    /// File the entries were read from
    pub source_file: PathBuf,

    pub entries: Vec<SubtitleEntry>,
}

impl SubtitleCollection {
    pub fn new(source_file: PathBuf, entries: Vec<SubtitleEntry>) -> Self {
        SubtitleCollection { source_file, entries }
    }

    /// Read and parse an SRT file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let entries = Self::parse_srt_file(path)?;
        debug!("Loaded {} subtitle entries from {}", entries.len(), path.display());
        Ok(Self::new(path.to_path_buf(), entries))
    }

    fn parse_srt_file(path: &Path) -> Result<Vec<SubtitleEntry>> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read subtitle file: {}", path.display()))?;
        Self::parse_srt_string(&content)
            .with_context(|| format!("Failed to parse subtitle file: {}", path.display()))
    }

    /// Parse SRT text into entries
    ///
    /// File order and sequence numbers are preserved. Files whose numbering
    /// repeats are renumbered 1..=n so every entry keeps a unique index.
    pub fn parse_srt_string(content: &str) -> Result<Vec<SubtitleEntry>> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        let mut entries = Vec::new();

        let mut current_seq_num: Option<usize> = None;
        let mut current_times: Option<(u64, u64)> = None;
        let mut current_text = String::new();

        let mut flush = |seq_num: Option<usize>, times: Option<(u64, u64)>, text: &mut String| {
            if let (Some(seq_num), Some((start_ms, end_ms))) = (seq_num, times) {
                match SubtitleEntry::new_validated(seq_num, start_ms, end_ms, text.clone()) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => warn!("Skipping invalid subtitle entry {}: {}", seq_num, e),
                }
            }
            text.clear();
        };

        for (line_number, line) in content.lines().enumerate() {
            let trimmed = line.trim();

            if trimmed.is_empty() {
                if current_times.is_some() {
                    flush(current_seq_num.take(), current_times.take(), &mut current_text);
                }
                continue;
            }

            if current_seq_num.is_none() && current_text.is_empty() {
                if let Ok(num) = trimmed.parse::<usize>() {
                    current_seq_num = Some(num);
                    continue;
                }
            }

            if current_seq_num.is_some() && current_times.is_none() {
                if let Some(caps) = TIMESTAMP_REGEX.captures(trimmed) {
                    current_times = Some((Self::timestamp_from_captures(&caps, 1), Self::timestamp_from_captures(&caps, 5)));
                    continue;
                }
            }

            if current_times.is_some() {
                if !current_text.is_empty() {
                    current_text.push('\n');
                }
                current_text.push_str(trimmed);
            } else {
                warn!("Unexpected text at line {} before sequence number or timestamp: {}", line_number + 1, trimmed);
            }
        }
        flush(current_seq_num, current_times, &mut current_text);

        if entries.is_empty() {
            return Err(anyhow!("No valid subtitle entries were found in the SRT content"));
        }

        let mut seen = HashSet::with_capacity(entries.len());
        if !entries.iter().all(|entry| seen.insert(entry.seq_num)) {
            warn!("Subtitle numbering repeats, renumbering {} entries", entries.len());
            for (i, entry) in entries.iter_mut().enumerate() {
                entry.seq_num = i + 1;
            }
        }

        Ok(entries)
    }

    fn timestamp_from_captures(caps: &regex::Captures, start_idx: usize) -> u64 {
        let part = |offset: usize| -> u64 {
            caps.get(start_idx + offset)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0)
        };
        (part(0) * 3600 + part(1) * 60 + part(2)) * 1000 + part(3)
    }

    /// Untranslated segments, one per entry
    pub fn to_segment_store(&self) -> Result<SegmentStore, TranslationError> {
        SegmentStore::from_subtitles(&self.entries)
    }

    /// Segments whose texts are treated as accepted translations
    pub fn to_translated_segment_store(&self) -> Result<SegmentStore, TranslationError> {
        SegmentStore::from_translated_subtitles(&self.entries)
    }

    /// Copy of this collection with each entry's text replaced by its
    /// segment's read-path text
    ///
    /// Entries with no segment in `store` keep their original text.
    pub fn with_translations(&self, store: &SegmentStore) -> Self {
        let entries = self
            .entries
            .iter()
            .map(|entry| {
                let text = match store.get(entry.seq_num) {
                    Some(segment) => segment.display_text().to_string(),
                    None => {
                        warn!("No segment for subtitle {}, keeping source text", entry.seq_num);
                        entry.text.clone()
                    }
                };
                SubtitleEntry { text, ..entry.clone() }
            })
            .collect();
        Self::new(self.source_file.clone(), entries)
    }

    /// Render the collection as SRT text
    pub fn to_srt_string(&self) -> String {
        self.entries.iter().map(|entry| entry.to_string()).collect()
    }

    /// Write subtitles to an SRT file, creating parent directories
    pub fn write_to_srt<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let mut file = File::create(path)
            .with_context(|| format!("Failed to create subtitle file: {}", path.display()))?;
        file.write_all(self.to_srt_string().as_bytes())
            .with_context(|| format!("Failed to write subtitle file: {}", path.display()))?;

        Ok(())
    }
}

impl fmt::Display for SubtitleCollection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Subtitle Collection")?;
        writeln!(f, "Source: {:?}", self.source_file)?;
        writeln!(f, "Entries: {}", self.entries.len())
    }
}
