/*!
 * Mock provider implementations for testing.
 *
 * This module provides a mock model that answers batch prompts by echoing
 * the requested segments in the marker wire format:
 * - `MockProvider::working()` - Always succeeds with every requested index
 * - `MockProvider::dropping(..)` - Omits the given indices from its replies
 * - `MockProvider::failing_on(..)` - Fails the given call numbers
 * - `MockProvider::failing()` - Always fails with an error
 *
 * Scripted raw replies and a terminology block can be layered on top, and
 * every received conversation is recorded for inspection.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::ProviderError;
use crate::providers::{ChatMessage, ModelCaller};
use crate::translation::parser::ResponseParser;
use crate::translation::prompts::{POST_CONTEXT_HEADER, SINGLE_SEGMENT_LEAD, TRANSLATE_HEADER};

/// Behavior mode for the mock provider
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a proper translation
    Working,
    /// Succeeds but leaves out these indices
    DropIndices(BTreeSet<usize>),
    /// Fails on these 1-based call numbers, works otherwise
    FailOnCalls(BTreeSet<usize>),
    /// Always fails with an error
    Failing,
    /// Returns empty response
    Empty,
}

/// Mock provider for testing translation behavior
#[derive(Debug, Clone)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Prepended to each echoed source text
    prefix: String,
    /// Terminology block appended to batch replies
    terms: BTreeMap<String, String>,
    /// Raw replies served before the behavior kicks in
    scripted: Arc<Mutex<VecDeque<Result<String, ProviderError>>>>,
    /// Request counter shared between clones
    request_count: Arc<AtomicUsize>,
    /// Every conversation received
    calls: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            prefix: "TR:".to_string(),
            terms: BTreeMap::new(),
            scripted: Arc::new(Mutex::new(VecDeque::new())),
            request_count: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock that omits the given indices
    pub fn dropping(indices: impl IntoIterator<Item = usize>) -> Self {
        Self::new(MockBehavior::DropIndices(indices.into_iter().collect()))
    }

    /// Create a mock failing on the given 1-based call numbers
    pub fn failing_on(calls: impl IntoIterator<Item = usize>) -> Self {
        Self::new(MockBehavior::FailOnCalls(calls.into_iter().collect()))
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that returns empty responses
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Set the prefix put in front of echoed source text
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// Append a terminology block with these terms to batch replies
    pub fn with_terms(mut self, terms: &[(&str, &str)]) -> Self {
        self.terms = terms.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        self
    }

    /// Queue a raw reply served verbatim by the next call
    pub fn with_scripted_reply(self, reply: &str) -> Self {
        self.scripted.lock().push_back(Ok(reply.to_string()));
        self
    }

    /// Queue an error returned by the next call
    pub fn with_scripted_error(self, error: ProviderError) -> Self {
        self.scripted.lock().push_back(Err(error));
        self
    }

    /// Number of calls received so far
    pub fn call_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Conversations received so far
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().clone()
    }

    /// Indices requested in each batch call, in call order
    pub fn requested_indices(&self) -> Vec<Vec<usize>> {
        self.calls()
            .iter()
            .filter_map(|messages| messages.iter().find(|m| m.role == "user"))
            .map(|m| Self::requested_segments(&m.content).keys().copied().collect())
            .collect()
    }

    /// Index -> source text of the translate block of a batch user prompt
    pub fn requested_segments(user_prompt: &str) -> BTreeMap<usize, String> {
        let Some(start) = user_prompt.find(TRANSLATE_HEADER) else {
            return BTreeMap::new();
        };
        let block = &user_prompt[start + TRANSLATE_HEADER.len()..];
        let block = match block.find(POST_CONTEXT_HEADER) {
            Some(end) => &block[..end],
            None => block,
        };
        ResponseParser::parse(block).translations
    }

    fn batch_reply(&self, user_prompt: &str, dropped: &BTreeSet<usize>) -> String {
        let translations: BTreeMap<usize, String> = Self::requested_segments(user_prompt)
            .into_iter()
            .filter(|(index, _)| !dropped.contains(index))
            .map(|(index, text)| (index, format!("{}{}", self.prefix, text)))
            .collect();
        ResponseParser::render(&translations, &self.terms)
    }

    fn single_reply(&self, user_prompt: &str) -> String {
        let source = user_prompt
            .split_once(SINGLE_SEGMENT_LEAD)
            .map(|(_, rest)| rest.trim_start_matches('\n'))
            .and_then(|rest| rest.split("\n\n").next())
            .unwrap_or_default();
        format!("{}{}", self.prefix, source.trim())
    }
}

#[async_trait]
impl ModelCaller for MockProvider {
    async fn call(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let call_number = self.request_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.lock().push(messages.to_vec());

        if let Some(scripted) = self.scripted.lock().pop_front() {
            return scripted;
        }

        let user_prompt = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let no_drops = BTreeSet::new();
        let dropped = match &self.behavior {
            MockBehavior::Failing => {
                return Err(ProviderError::ApiError {
                    message: "Simulated provider failure".to_string(),
                    status_code: 500,
                });
            }
            MockBehavior::FailOnCalls(calls) if calls.contains(&call_number) => {
                return Err(ProviderError::ApiError {
                    message: format!("Simulated failure (request #{})", call_number),
                    status_code: 503,
                });
            }
            MockBehavior::Empty => return Ok(String::new()),
            MockBehavior::DropIndices(indices) => indices,
            MockBehavior::Working | MockBehavior::FailOnCalls(_) => &no_drops,
        };

        if user_prompt.contains(TRANSLATE_HEADER) {
            Ok(self.batch_reply(user_prompt, dropped))
        } else {
            Ok(self.single_reply(user_prompt))
        }
    }

    fn name(&self) -> &str {
        "Mock"
    }
}
