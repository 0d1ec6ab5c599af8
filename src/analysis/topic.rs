/*!
 * Conversation topic classification.
 *
 * A rule pass counts references to men in the dialogue. Clear cases are
 * decided by rule; the rest go to the LLM when one is configured, with answers
 * cached by a SHA-256 of the conversation text. Anything the LLM cannot settle
 * is treated as not being about a man.
 */

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::analysis::gender::tokenize;
use crate::analysis::model::{AboutMale, CharacterSet, Conversation, TopicMethod, TopicVerdict};
use crate::analysis::names::NameTable;
use crate::analysis::prompts;
use crate::errors::ConfigError;
use crate::providers::{CompletionRequest, Provider, Sampling};

const MALE_INDICATORS: &[&str] = &[
    "he", "him", "his", "himself", "boy", "boys", "man", "men", "guy", "guys", "father", "dad", "daddy",
    "brother", "uncle", "son", "husband", "boyfriend", "grandpa", "grandfather", "mr", "sir",
];

/// Capitalized words that are names in the table but usually not names in dialogue
const NAME_STOPLIST: &[&str] = &[
    "will", "mark", "bill", "frank", "art", "rob", "pat", "grant", "chase", "jack", "sue", "joe",
];

/// Words in character keys that say nothing about who is meant
const GENERIC_KEY_WORDS: &[&str] = &[
    "the", "old", "young", "big", "little", "first", "second", "third", "other", "dr", "doctor",
    "officer", "guard", "voice", "agent",
];

const DEFAULT_MALE_PHRASES: &[&str] = &[
    "my boyfriend", "your boyfriend", "her boyfriend", "my husband", "your husband", "her husband",
    "my ex", "that guy", "this guy", "he said", "he told me", "he loves", "in love with him",
    "date with him", "marry him",
];

/// Topic classification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Male references per token at or above which a conversation is about a man
    #[serde(default = "default_about_threshold")]
    pub about_threshold: f32,

    /// Ratio at or below which a conversation is clearly not about a man
    #[serde(default)]
    pub clear_threshold: f32,

    /// Phrases that make a conversation about a man on their own
    #[serde(default = "default_male_phrases")]
    pub male_phrases: Vec<String>,

    /// Largest female share for a capitalized word to count as a man's name
    #[serde(default = "default_male_name_share")]
    pub male_name_share: f32,

    /// Minimum confidence an LLM answer needs to be accepted
    #[serde(default = "default_llm_min_confidence")]
    pub llm_min_confidence: f32,

    /// Transcript length cap for the topic prompt
    #[serde(default = "default_llm_max_chars")]
    pub llm_max_chars: usize,
}

fn default_about_threshold() -> f32 {
    0.1
}

fn default_male_phrases() -> Vec<String> {
    DEFAULT_MALE_PHRASES.iter().map(|p| p.to_string()).collect()
}

fn default_male_name_share() -> f32 {
    0.15
}

fn default_llm_min_confidence() -> f32 {
    0.6
}

fn default_llm_max_chars() -> usize {
    4000
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            about_threshold: default_about_threshold(),
            clear_threshold: 0.0,
            male_phrases: default_male_phrases(),
            male_name_share: default_male_name_share(),
            llm_min_confidence: default_llm_min_confidence(),
            llm_max_chars: default_llm_max_chars(),
        }
    }
}

impl TopicConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.about_threshold > 0.0 && self.about_threshold <= 1.0) {
            return Err(ConfigError::invalid("analysis.topic.about_threshold", "must be in (0, 1]"));
        }
        if self.clear_threshold < 0.0 || self.clear_threshold >= self.about_threshold {
            return Err(ConfigError::invalid(
                "analysis.topic.clear_threshold",
                "must be non-negative and below about_threshold",
            ));
        }
        if !(0.0..=0.5).contains(&self.male_name_share) {
            return Err(ConfigError::invalid("analysis.topic.male_name_share", "must be within 0..=0.5"));
        }
        if !(0.0..=1.0).contains(&self.llm_min_confidence) {
            return Err(ConfigError::invalid("analysis.topic.llm_min_confidence", "must be within 0..=1"));
        }
        if self.llm_max_chars == 0 {
            return Err(ConfigError::invalid("analysis.topic.llm_max_chars", "must be positive"));
        }
        Ok(())
    }
}

/// Bounded cache of LLM topic answers, oldest entries evicted first
#[derive(Debug)]
pub struct LlmResponseCache {
    capacity: usize,
    inner: RwLock<CacheInner>,
}

#[derive(Debug, Default)]
struct CacheInner {
    answers: HashMap<String, (bool, f32)>,
    order: VecDeque<String>,
}

impl LlmResponseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: RwLock::new(CacheInner::default()),
        }
    }

    /// Cache key for a conversation text
    pub fn key_for(text: &str) -> String {
        format!("{:x}", Sha256::digest(text.as_bytes()))
    }

    pub fn get(&self, key: &str) -> Option<(bool, f32)> {
        self.inner.read().answers.get(key).copied()
    }

    pub fn insert(&self, key: String, answer: (bool, f32)) {
        let mut inner = self.inner.write();
        if inner.answers.insert(key.clone(), answer).is_some() {
            return;
        }
        inner.order.push_back(key);
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.answers.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LlmResponseCache {
    fn default() -> Self {
        Self::new(128)
    }
}

/// Outcome of the rule pass
#[derive(Debug, Clone, PartialEq)]
pub struct RuleAssessment {
    pub male_references: usize,
    pub tokens: usize,
    pub matched_phrase: Option<String>,
    pub about_male: AboutMale,
}

impl RuleAssessment {
    pub fn ratio(&self) -> f32 {
        if self.tokens == 0 {
            0.0
        } else {
            self.male_references as f32 / self.tokens as f32
        }
    }
}

/// Classifies whether qualifying conversations are about a man
#[derive(Debug)]
pub struct TopicClassifier {
    config: TopicConfig,
    names: Arc<NameTable>,
    provider: Option<Arc<dyn Provider>>,
    llm_timeout: Duration,
    sampling: Sampling,
    cache: Arc<LlmResponseCache>,
}

impl TopicClassifier {
    pub fn new(config: TopicConfig, names: Arc<NameTable>) -> Self {
        Self {
            config,
            names,
            provider: None,
            llm_timeout: Duration::from_secs(30),
            sampling: Sampling::default(),
            cache: Arc::new(LlmResponseCache::default()),
        }
    }

    /// Enable LLM confirmation for indeterminate conversations
    pub fn with_llm(mut self, provider: Arc<dyn Provider>, timeout: Duration, cache: Arc<LlmResponseCache>) -> Self {
        self.provider = Some(provider);
        self.llm_timeout = timeout;
        self.cache = cache;
        self
    }

    /// Temperature and token limit for LLM requests
    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    /// Count male references and apply the thresholds
    pub fn assess(&self, conversation: &Conversation, characters: &CharacterSet) -> RuleAssessment {
        let male_keys: HashSet<String> = characters
            .males()
            .flat_map(|c| c.key.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .filter(|t| !GENERIC_KEY_WORDS.contains(&t.as_str()))
            .collect();

        let mut tokens = 0;
        let mut male_references = 0;
        let mut normalized = Vec::new();
        for line in &conversation.lines {
            for word in line.text.split_whitespace() {
                let capitalized = word
                    .trim_start_matches(|c: char| !c.is_alphanumeric())
                    .starts_with(char::is_uppercase);
                for token in tokenize(word) {
                    tokens += 1;
                    if self.is_male_reference(&token, capitalized, &male_keys) {
                        male_references += 1;
                    }
                    normalized.push(token);
                }
            }
        }

        let haystack = format!(" {} ", normalized.join(" "));
        let matched_phrase = self
            .config
            .male_phrases
            .iter()
            .find(|phrase| {
                let needle = tokenize(phrase).join(" ");
                !needle.is_empty() && haystack.contains(&format!(" {} ", needle))
            })
            .cloned();

        let mut assessment = RuleAssessment {
            male_references,
            tokens,
            matched_phrase,
            about_male: AboutMale::Indeterminate,
        };
        let ratio = assessment.ratio();
        assessment.about_male = if assessment.matched_phrase.is_some() || ratio >= self.config.about_threshold {
            AboutMale::Yes
        } else if ratio <= self.config.clear_threshold {
            AboutMale::No
        } else {
            AboutMale::Indeterminate
        };
        assessment
    }

    fn is_male_reference(&self, token: &str, capitalized: bool, male_keys: &HashSet<String>) -> bool {
        if MALE_INDICATORS.contains(&token) || male_keys.contains(token) {
            return true;
        }
        capitalized
            && !NAME_STOPLIST.contains(&token)
            && self
                .names
                .female_share(token)
                .is_some_and(|share| share <= self.config.male_name_share)
    }

    /// Classify one conversation
    pub async fn classify(
        &self,
        conversation_index: usize,
        conversation: &Conversation,
        characters: &CharacterSet,
    ) -> TopicVerdict {
        let assessment = self.assess(conversation, characters);
        debug!(
            "Conversation {}: {} male references in {} tokens, phrase {:?} -> {:?}",
            conversation_index,
            assessment.male_references,
            assessment.tokens,
            assessment.matched_phrase,
            assessment.about_male
        );

        match assessment.about_male {
            AboutMale::Yes => TopicVerdict {
                conversation_index,
                about_male: AboutMale::Yes,
                method: TopicMethod::Rule,
                confidence: if assessment.matched_phrase.is_some() {
                    0.9
                } else {
                    (0.6 + assessment.ratio()).min(0.95)
                },
            },
            AboutMale::No => TopicVerdict {
                conversation_index,
                about_male: AboutMale::No,
                method: TopicMethod::Rule,
                confidence: 0.8,
            },
            AboutMale::Indeterminate => {
                self.classify_with_llm(conversation_index, conversation, characters)
                    .await
            }
        }
    }

    async fn classify_with_llm(
        &self,
        conversation_index: usize,
        conversation: &Conversation,
        characters: &CharacterSet,
    ) -> TopicVerdict {
        let fallback = TopicVerdict {
            conversation_index,
            about_male: AboutMale::No,
            method: TopicMethod::Default,
            confidence: 0.5,
        };
        let Some(provider) = &self.provider else {
            return fallback;
        };

        let transcript: String = conversation.transcript().chars().take(self.config.llm_max_chars).collect();
        let key = LlmResponseCache::key_for(&transcript);

        let answer = match self.cache.get(&key) {
            Some(answer) => {
                debug!("Topic answer for conversation {} served from cache", conversation_index);
                Some(answer)
            }
            None => {
                let answer = self.ask(provider.as_ref(), &transcript, characters).await;
                if let Some(answer) = answer {
                    self.cache.insert(key, answer);
                }
                answer
            }
        };

        match answer {
            Some((about, confidence)) if confidence >= self.config.llm_min_confidence => TopicVerdict {
                conversation_index,
                about_male: if about { AboutMale::Yes } else { AboutMale::No },
                method: TopicMethod::Llm,
                confidence,
            },
            _ => fallback,
        }
    }

    async fn ask(&self, provider: &dyn Provider, transcript: &str, characters: &CharacterSet) -> Option<(bool, f32)> {
        let males: Vec<&str> = characters.males().map(|c| c.name.as_str()).collect();
        let request = self
            .sampling
            .apply(CompletionRequest::new(prompts::topic_prompt(transcript, &males)).system(prompts::SYSTEM_PROMPT));

        match tokio::time::timeout(self.llm_timeout, provider.complete(request)).await {
            Ok(Ok(response)) => {
                let parsed = prompts::parse_topic_response(&response.text);
                if parsed.is_none() {
                    debug!("Unusable LLM topic answer: {:?}", response.text);
                }
                parsed
            }
            Ok(Err(e)) => {
                warn!("LLM topic classification failed: {}", e);
                None
            }
            Err(_) => {
                warn!("LLM topic classification timed out after {:?}", self.llm_timeout);
                None
            }
        }
    }
}
