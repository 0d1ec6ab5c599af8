/*!
 * Script analysis pipeline.
 *
 * parse → classify characters → extract conversations → classify topics →
 * aggregate. Every stage is total: malformed scripts degrade to an empty or
 * failing result instead of an error.
 */

pub mod conversation;
pub mod gender;
pub mod model;
pub mod names;
pub mod parser;
pub mod prompts;
pub mod topic;
pub mod verdict;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use crate::app_config::AnalysisConfig;
use crate::providers::{Provider, Sampling};
use crate::sources::RawScript;

use self::conversation::{ConversationExtractor, qualifying};
use self::gender::{GenderClassifier, ScriptContext};
use self::model::CharacterSet;
use self::names::NameTable;
use self::parser::ScriptParser;
use self::topic::{LlmResponseCache, TopicClassifier};
pub use self::verdict::{BechdelResult, Provenance};

/// Runs the analysis stages over script text
#[derive(Debug, Clone)]
pub struct BechdelAnalyzer {
    config: AnalysisConfig,
    names: Arc<NameTable>,
    provider: Option<Arc<dyn Provider>>,
    llm_timeout: Duration,
    sampling: Sampling,
    llm_cache: Arc<LlmResponseCache>,
}

impl BechdelAnalyzer {
    pub fn new(config: &AnalysisConfig, names: Arc<NameTable>) -> Self {
        Self {
            config: config.clone(),
            names,
            provider: None,
            llm_timeout: Duration::from_secs(30),
            sampling: Sampling::default(),
            llm_cache: Arc::new(LlmResponseCache::default()),
        }
    }

    /// Use an LLM for unresolved genders and indeterminate topics
    pub fn with_llm(mut self, provider: Arc<dyn Provider>, timeout: Duration, cache: Arc<LlmResponseCache>) -> Self {
        self.provider = Some(provider);
        self.llm_timeout = timeout;
        self.llm_cache = cache;
        self
    }

    /// Temperature and token limit for every LLM request
    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    /// Classify every speaker in order of first appearance
    pub async fn characters(&self, lines: &[model::DialogueLine]) -> CharacterSet {
        let context = ScriptContext::from_lines(lines);
        let mut classifier = GenderClassifier::new(self.config.gender.clone(), Arc::clone(&self.names));
        if let Some(provider) = &self.provider {
            classifier = classifier
                .with_llm(Arc::clone(provider), self.llm_timeout)
                .with_sampling(self.sampling);
        }

        let mut characters = CharacterSet::new();
        for line in lines {
            let (Some(name), Some(key)) = (&line.speaker, &line.speaker_key) else {
                continue;
            };
            if characters.contains(key) {
                continue;
            }
            characters.insert(classifier.classify(name, key, &context).await);
        }
        characters
    }

    /// Analyze raw script text
    pub async fn analyze_text(&self, text: &str) -> BechdelResult {
        let lines = ScriptParser::new().parse(text);
        let characters = self.characters(&lines).await;

        let conversations = ConversationExtractor::new(self.config.conversation.clone()).extract(&lines, &characters);
        let qualifying = qualifying(&conversations, &characters);

        let mut topic_classifier = TopicClassifier::new(self.config.topic.clone(), Arc::clone(&self.names));
        if let Some(provider) = &self.provider {
            topic_classifier = topic_classifier
                .with_llm(Arc::clone(provider), self.llm_timeout, Arc::clone(&self.llm_cache))
                .with_sampling(self.sampling);
        }

        let mut topics = Vec::with_capacity(qualifying.len());
        for (index, conversation) in qualifying.iter().enumerate() {
            topics.push(topic_classifier.classify(index, conversation, &characters).await);
        }

        debug!(
            "{} lines, {} characters, {} conversations, {} qualifying",
            lines.len(),
            characters.len(),
            conversations.len(),
            qualifying.len()
        );

        let result = verdict::aggregate(&characters, qualifying.len(), &topics);
        info!(
            "Bechdel test {} ({} female characters, {} qualifying conversations)",
            if result.passes_test { "passed" } else { "failed" },
            result.female_characters.len(),
            result.qualifying_conversations
        );
        result
    }

    /// Analyze an acquired script, recording its provenance
    pub async fn analyze_script(&self, script: &RawScript) -> BechdelResult {
        self.analyze_text(&script.text)
            .await
            .with_provenance(script.source.clone(), script.url.clone())
    }
}
