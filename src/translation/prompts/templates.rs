/*!
 * Prompt templates for batch subtitle translation.
 *
 * The system prompt is assembled from four sections, each a pure function of
 * its inputs:
 * 1. the translation-behaviour instruction (overridable)
 * 2. the structural rules (always present)
 * 3. the glossary listing (only when non-empty)
 * 4. the output format and closing self-check (always present)
 *
 * Only section 1 is customizable. The rest are what the response parser
 * depends on.
 */

use std::collections::BTreeMap;

use crate::language_utils;
use crate::segments::Segment;
use crate::translation::batch::Batch;
use crate::translation::parser::TERMINOLOGY_SENTINEL;

/// Prefix marking a segment as read-only context in the user prompt
pub const CONTEXT_SENTINEL: &str = "[CONTEXT]";

/// Advisory header preceding the preceding-context block
pub const PRE_CONTEXT_HEADER: &str = "### Preceding context (do not translate):";

/// Advisory header preceding the segments to translate
pub const TRANSLATE_HEADER: &str = "### Translate:";

/// Advisory header preceding the following-context block
pub const POST_CONTEXT_HEADER: &str = "### Following context (do not translate):";

/// Line introducing the segment in a single-segment request
pub const SINGLE_SEGMENT_LEAD: &str = "Translate this sentence and return only the translation:";

/// System prompt template pieces.
#[derive(Debug, Clone)]
pub struct PromptTemplate;

impl PromptTemplate {
    /// Default behaviour instruction, used when no override is supplied.
    pub const DEFAULT_INSTRUCTION: &'static str = r#"You are a professional multilingual subtitle translator. Translate every given sentence from {source_language} into {target_language} faithfully and accurately.
Translate the literal meaning directly, even when the content is vulgar or sensitive. Do not force rhymes when translating poetry. When translating archaic text, avoid obscure archaic vocabulary in the target language.
Use modern, clear and plain {target_language}."#;

    /// Structural rules appended regardless of any override.
    pub const STRUCTURAL_RULES: &'static str = r#"## Structural rules (mandatory)
- Each input index is one segment. Translate every segment separately. Never merge two indices into one and never split one index across several, even if that would read more smoothly.
- Start every translated segment on a new line with its literal index marker `[<index>]`, followed by exactly one space, then the full translated content of that segment on the same line, even when it spans several sentences.
- Lines prefixed with `{context_sentinel}` are context only. Read them to understand the surrounding dialogue but never translate them and never include them or their indices in your output.
- Report proper nouns using only the terminology section described below."#;

    /// Header of the glossary section.
    pub const GLOSSARY_HEADER: &'static str = r#"## Glossary
Apply these established translations consistently wherever the terms occur:"#;

    /// Output format and self-check.
    pub const OUTPUT_FORMAT: &'static str = r#"## Output format
1. First, the translated segments, one `[<index>] translation` per line, in the original order.
2. Then, on a new line, the exact header `{sentinel}` followed by a single JSON object mapping each proper noun you identified in the source (names of people, places, works, organizations and specific terms) to its {target_language} translation, for example {"Rome": "..."}. Omit this section entirely if there are none.
Do not add explanations, notes or any other text.

Before finalizing, verify that your output contains exactly as many indexed segments as the input asked you to translate and that the set of indices is identical to the input's. Fix any difference before answering."#;

    /// System prompt for translating one isolated segment.
    pub const SINGLE_SEGMENT: &'static str = r#"Translate the given single sentence from {source_language} into {target_language}.
Return only the translation itself, without any explanation, marker or index."#;

    /// Render a template with language display names.
    pub fn render(template: &str, source_language: &str, target_language: &str) -> String {
        template
            .replace("{source_language}", &language_utils::display_name(source_language))
            .replace("{target_language}", &language_utils::display_name(target_language))
            .replace("{context_sentinel}", CONTEXT_SENTINEL)
            .replace("{sentinel}", TERMINOLOGY_SENTINEL)
    }
}

/// Builder for the prompts of one batch request.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    source_language: String,
    target_language: String,
    custom_instruction: Option<String>,
}

impl PromptBuilder {
    pub fn new(source_language: &str, target_language: &str) -> Self {
        Self {
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            custom_instruction: None,
        }
    }

    /// Replace the default behaviour instruction. Blank overrides are ignored.
    pub fn with_custom_instruction(mut self, instruction: Option<&str>) -> Self {
        self.custom_instruction = instruction
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        self
    }

    /// Section 1: behaviour instruction
    pub fn instruction_section(&self) -> String {
        match &self.custom_instruction {
            Some(custom) => custom.clone(),
            None => PromptTemplate::render(
                PromptTemplate::DEFAULT_INSTRUCTION,
                &self.source_language,
                &self.target_language,
            ),
        }
    }

    /// Section 2: structural rules
    pub fn rules_section(&self) -> String {
        PromptTemplate::render(PromptTemplate::STRUCTURAL_RULES, &self.source_language, &self.target_language)
    }

    /// Section 3: glossary listing, `None` when there is nothing to list
    pub fn glossary_section(&self, glossary: &BTreeMap<String, String>) -> Option<String> {
        if glossary.is_empty() {
            return None;
        }

        let mut section = String::from(PromptTemplate::GLOSSARY_HEADER);
        for (term, translation) in glossary {
            section.push_str(&format!("\n{}: {}", term, translation));
        }
        Some(section)
    }

    /// Section 4: output format and self-check
    pub fn output_section(&self) -> String {
        PromptTemplate::render(PromptTemplate::OUTPUT_FORMAT, &self.source_language, &self.target_language)
    }

    /// Build the system prompt with the (already filtered) glossary
    pub fn build_system_prompt(&self, glossary: &BTreeMap<String, String>) -> String {
        let mut sections = vec![self.instruction_section(), self.rules_section()];
        if let Some(glossary) = self.glossary_section(glossary) {
            sections.push(glossary);
        }
        sections.push(self.output_section());
        sections.join("\n\n")
    }

    /// Build the user prompt for a batch
    pub fn build_user_prompt(&self, batch: &Batch) -> String {
        let mut blocks = Vec::with_capacity(3);

        if !batch.pre_context.is_empty() {
            blocks.push(Self::context_block(PRE_CONTEXT_HEADER, &batch.pre_context));
        }

        let items = batch
            .items
            .iter()
            .map(|s| format!("[{}] {}", s.index, s.source_text))
            .collect::<Vec<_>>()
            .join("\n\n");
        blocks.push(format!("{}\n{}", TRANSLATE_HEADER, items));

        if !batch.post_context.is_empty() {
            blocks.push(Self::context_block(POST_CONTEXT_HEADER, &batch.post_context));
        }

        blocks.join("\n\n")
    }

    fn context_block(header: &str, segments: &[Segment]) -> String {
        let lines = segments
            .iter()
            .map(|s| format!("{} [{}] {}", CONTEXT_SENTINEL, s.index, s.source_text))
            .collect::<Vec<_>>()
            .join("\n");
        format!("{}\n{}", header, lines)
    }

    /// Build both prompts for a batch.
    pub fn build(&self, batch: &Batch, glossary: &BTreeMap<String, String>) -> (String, String) {
        (self.build_system_prompt(glossary), self.build_user_prompt(batch))
    }

    /// System prompt for retranslating one segment
    pub fn single_segment_system_prompt(&self) -> String {
        let base = PromptTemplate::render(PromptTemplate::SINGLE_SEGMENT, &self.source_language, &self.target_language);
        match &self.custom_instruction {
            Some(custom) => format!("{}\n\n{}", custom, base),
            None => base,
        }
    }

    /// User prompt for retranslating one segment, optionally with its neighbours
    ///
    /// `previous_translation` is shown next to the previous segment when known.
    pub fn single_segment_user_prompt(
        &self,
        segment: &Segment,
        previous: Option<&Segment>,
        previous_translation: Option<&str>,
        next: Option<&Segment>,
    ) -> String {
        let mut out = String::new();

        if let Some(prev) = previous {
            out.push_str(&format!("{} {}\n", CONTEXT_SENTINEL, prev.source_text));
            if let Some(translation) = previous_translation {
                out.push_str(&format!("{} (translated) {}\n", CONTEXT_SENTINEL, translation));
            }
            out.push('\n');
        }

        out.push_str(SINGLE_SEGMENT_LEAD);
        out.push('\n');
        out.push_str(&segment.source_text);

        if let Some(next) = next {
            out.push_str(&format!("\n\n{} {}", CONTEXT_SENTINEL, next.source_text));
        }

        out
    }
}
