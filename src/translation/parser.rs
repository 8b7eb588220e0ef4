/*!
 * Response parsing for batch translations.
 *
 * Turns free-text model output back into a strict index -> translation map.
 * The model is asked to emit one `[<index>] text` block per segment followed
 * by an optional terminology section. Nothing here trusts that contract: the
 * parser scans every marker position, records whatever looks wrong as an
 * `Anomaly`, and never fails.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Header line separating translations from the terminology block
pub const TERMINOLOGY_SENTINEL: &str = "### Proper Nouns:";

/// Regex for matching index markers anywhere in the text
static INDEX_MARKER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d+)\]").expect("Invalid index marker regex"));

/// Regex for one `term: translation` line in the fallback terminology grammar
static TERM_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*[-*]?\s*"?([^":：]+?)"?\s*[:：]\s*"?(.*?)"?\s*,?\s*$"#)
        .expect("Invalid terminology line regex")
});

/// A structural defect detected in parsed model output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Anomaly {
    /// An expected index is absent from the response
    MissingIndex { index: usize },

    /// The same index appeared more than once; the last occurrence wins
    DuplicateIndex { index: usize },

    /// The response contains an index that was not requested
    ExtraIndex { index: usize },

    /// Content under one marker contains another marker (merge defect)
    EmbeddedMarker { index: usize, content: String },
}

impl Anomaly {
    /// Stable identifier of the anomaly kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingIndex { .. } => "missing-index",
            Self::DuplicateIndex { .. } => "duplicate-index",
            Self::ExtraIndex { .. } => "extra-index",
            Self::EmbeddedMarker { .. } => "embedded-marker",
        }
    }

    /// Index the anomaly refers to
    pub fn index(&self) -> usize {
        match self {
            Self::MissingIndex { index }
            | Self::DuplicateIndex { index }
            | Self::ExtraIndex { index }
            | Self::EmbeddedMarker { index, .. } => *index,
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.kind(), self.index())
    }
}

/// One index marker found in the translation region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerMatch {
    /// Numeric value of the marker
    pub index: usize,
    /// Byte offset of the `[` within the translation region
    pub start: usize,
    /// Byte offset just past the `]`
    pub end: usize,
    /// Whether the marker opens a line (only whitespace before it on its line)
    pub line_start: bool,
}

/// Output of a single parse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    /// Index -> translated content
    pub translations: BTreeMap<usize, String>,

    /// Terms discovered by the model, source term -> translation
    pub glossary_delta: BTreeMap<String, String>,

    /// Structural defects found while parsing
    pub anomalies: Vec<Anomaly>,
}

impl ParsedResponse {
    pub fn is_empty(&self) -> bool {
        self.translations.is_empty() && self.glossary_delta.is_empty()
    }
}

/// Parser for batch translation responses
pub struct ResponseParser;

impl ResponseParser {
    /// Parse raw model output
    ///
    /// Never fails: unusable input yields an empty map.
    pub fn parse(raw: &str) -> ParsedResponse {
        let (translation_region, terminology_region) = Self::split_regions(raw);

        let mut parsed = ParsedResponse::default();
        Self::collect_translations(translation_region, &mut parsed);

        if let Some(region) = terminology_region {
            parsed.glossary_delta = Self::parse_terminology(region);
        }

        debug!(
            "Parsed response: {} translations, {} terms, {} anomalies",
            parsed.translations.len(),
            parsed.glossary_delta.len(),
            parsed.anomalies.len()
        );

        parsed
    }

    /// Split raw output at the terminology sentinel
    pub fn split_regions(raw: &str) -> (&str, Option<&str>) {
        match raw.find(TERMINOLOGY_SENTINEL) {
            Some(pos) => (&raw[..pos], Some(&raw[pos + TERMINOLOGY_SENTINEL.len()..])),
            None => (raw, None),
        }
    }

    /// Every marker in `region`, in order of appearance
    pub fn scan_markers(region: &str) -> Vec<MarkerMatch> {
        INDEX_MARKER_REGEX
            .captures_iter(region)
            .filter_map(|cap| {
                let whole = cap.get(0)?;
                let index = cap.get(1)?.as_str().parse::<usize>().ok()?;
                let line_begin = region[..whole.start()].rfind('\n').map_or(0, |p| p + 1);
                let line_start = region[line_begin..whole.start()].trim().is_empty();
                Some(MarkerMatch {
                    index,
                    start: whole.start(),
                    end: whole.end(),
                    line_start,
                })
            })
            .collect()
    }

    fn collect_translations(region: &str, parsed: &mut ParsedResponse) {
        let markers = Self::scan_markers(region);

        // Segment boundaries: markers opening a line, plus the first marker
        // wherever it sits so a chatty preamble on the same line is tolerated.
        let anchors: Vec<&MarkerMatch> = markers
            .iter()
            .enumerate()
            .filter(|(i, m)| *i == 0 || m.line_start)
            .map(|(_, m)| m)
            .collect();

        for (i, anchor) in anchors.iter().enumerate() {
            let content_end = anchors.get(i + 1).map_or(region.len(), |next| next.start);
            let body = &region[anchor.end..content_end];
            let body = body.strip_prefix(' ').unwrap_or(body);
            let content = Self::strip_trailing_fences(body.trim()).to_string();

            if INDEX_MARKER_REGEX.is_match(&content) {
                parsed.anomalies.push(Anomaly::EmbeddedMarker {
                    index: anchor.index,
                    content: content.clone(),
                });
            }

            if parsed.translations.insert(anchor.index, content).is_some() {
                parsed.anomalies.push(Anomaly::DuplicateIndex { index: anchor.index });
            }
        }
    }

    /// Drop markdown code fence lines trailing the content of a segment
    fn strip_trailing_fences(content: &str) -> &str {
        let mut content = content;
        while let Some((rest, last)) = content.rsplit_once('\n') {
            if !last.trim().starts_with("```") {
                break;
            }
            content = rest.trim_end();
        }
        if content.starts_with("```") && !content.contains('\n') {
            return "";
        }
        content
    }

    /// Parse the terminology block into term -> translation pairs
    ///
    /// The canonical payload is a single JSON object. Output that is not a
    /// valid object falls back to one `term: translation` pair per line.
    /// Malformed entries are skipped either way.
    pub fn parse_terminology(region: &str) -> BTreeMap<String, String> {
        let mut terms = BTreeMap::new();

        if let Some(object) = Self::json_object_slice(region) {
            if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(object) {
                for (term, value) in map {
                    if let serde_json::Value::String(translation) = value {
                        Self::insert_term(&mut terms, &term, &translation);
                    }
                }
                return terms;
            }
        }

        for line in region.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("```") || line == "{" || line == "}" {
                continue;
            }
            if let Some(cap) = TERM_LINE_REGEX.captures(line) {
                let term = cap.get(1).map_or("", |m| m.as_str());
                let translation = cap.get(2).map_or("", |m| m.as_str());
                Self::insert_term(&mut terms, term, translation);
            }
        }

        terms
    }

    fn json_object_slice(region: &str) -> Option<&str> {
        let open = region.find('{')?;
        let close = region.rfind('}')?;
        (close > open).then(|| &region[open..=close])
    }

    fn insert_term(terms: &mut BTreeMap<String, String>, term: &str, translation: &str) {
        let term = term.trim();
        let translation = translation.trim();
        if !term.is_empty() && !translation.is_empty() {
            terms.insert(term.to_string(), translation.to_string());
        }
    }

    /// Compare requested indices against a parse result
    ///
    /// Yields `MissingIndex` for every requested index absent from the
    /// translations and `ExtraIndex` for every returned index nobody asked for.
    pub fn reconcile(expected: &[usize], parsed: &ParsedResponse) -> Vec<Anomaly> {
        let expected_set: BTreeSet<usize> = expected.iter().copied().collect();

        let missing = expected_set
            .iter()
            .filter(|index| !parsed.translations.contains_key(index))
            .map(|&index| Anomaly::MissingIndex { index });

        let extra = parsed
            .translations
            .keys()
            .filter(|index| !expected_set.contains(index))
            .map(|&index| Anomaly::ExtraIndex { index });

        missing.chain(extra).collect()
    }

    /// Render translations in the wire format the parser accepts
    pub fn render(translations: &BTreeMap<usize, String>, terms: &BTreeMap<String, String>) -> String {
        let mut out = String::new();
        for (index, text) in translations {
            out.push_str(&format!("[{}] {}\n", index, text));
        }
        if !terms.is_empty() {
            out.push('\n');
            out.push_str(TERMINOLOGY_SENTINEL);
            out.push('\n');
            out.push_str(&serde_json::to_string(terms).unwrap_or_else(|_| "{}".to_string()));
            out.push('\n');
        }
        out
    }
}
