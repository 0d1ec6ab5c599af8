/*!
 * Character gender classification.
 *
 * Evidence is tried in a fixed order and the first conclusive source wins:
 * 1. Gendered titles and role words in the name ("MRS. ROBINSON", "WAITRESS")
 * 2. First-name table, exact then fuzzy
 * 3. Pronouns in stage directions that mention the character
 * 4. Name endings (optional, low confidence)
 * 5. LLM opinion (optional, thresholded)
 *
 * Results are memoized per normalized key for the lifetime of the classifier,
 * which is one analysis run.
 */

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::analysis::model::{Character, DialogueLine, Evidence, Gender};
use crate::analysis::names::NameTable;
use crate::analysis::prompts;
use crate::errors::ConfigError;
use crate::providers::{CompletionRequest, Provider, Sampling};

const FEMALE_TERMS: &[&str] = &[
    "mrs", "miss", "ms", "madam", "madame", "mme", "lady", "queen", "princess", "duchess", "countess",
    "sister", "mother", "mom", "mum", "mommy", "aunt", "auntie", "grandma", "grandmother", "granny",
    "girl", "woman", "women", "wife", "daughter", "niece", "girlfriend", "bride", "widow", "waitress",
    "actress", "stewardess", "hostess", "nun", "maid", "housewife", "policewoman", "businesswoman",
];

const MALE_TERMS: &[&str] = &[
    "mr", "sir", "lord", "king", "prince", "duke", "brother", "father", "dad", "daddy", "uncle",
    "grandpa", "grandfather", "boy", "man", "men", "guy", "husband", "son", "nephew", "boyfriend",
    "groom", "widower", "waiter", "actor", "steward", "host", "monk", "priest", "butler", "gentleman",
    "policeman", "fireman", "businessman", "cowboy",
];

const FEMALE_CUES: &[&str] = &[
    "she", "her", "hers", "herself", "girl", "woman", "lady", "mother", "sister", "aunt", "daughter",
    "wife", "girlfriend", "mrs", "miss", "ms",
];

const MALE_CUES: &[&str] = &[
    "he", "him", "his", "himself", "boy", "man", "guy", "father", "brother", "uncle", "son", "husband",
    "boyfriend", "mr", "sir",
];

const FEMALE_ENDINGS: &[&str] = &["a", "ie", "y", "i"];
const FEMALE_ENDING_EXCEPTIONS: &[&str] = &["by", "ey", "dy", "ty"];
const MALE_ENDINGS: &[&str] = &["son", "ton", "er", "or", "en"];

/// Configuration for gender classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenderConfig {
    /// Share one gender needs in the name table to be accepted
    #[serde(default = "default_majority_threshold")]
    pub majority_threshold: f32,

    /// Minimum normalized similarity for a fuzzy name match
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f32,

    /// Names shorter than this are matched exactly only
    #[serde(default = "default_fuzzy_min_length")]
    pub fuzzy_min_length: usize,

    /// How many times more cues one gender needs than the other
    #[serde(default = "default_cue_dominance_ratio")]
    pub cue_dominance_ratio: f32,

    /// Minimum number of cues for the winning gender
    #[serde(default = "default_min_cues")]
    pub min_cues: usize,

    /// Fall back to name endings before asking the LLM
    #[serde(default = "default_true")]
    pub use_name_endings: bool,

    /// Minimum confidence an LLM answer needs to be accepted
    #[serde(default = "default_llm_min_confidence")]
    pub llm_min_confidence: f32,

    /// Upper bound on context characters sent with a gender prompt
    #[serde(default = "default_llm_context_chars")]
    pub llm_context_chars: usize,
}

fn default_majority_threshold() -> f32 {
    0.85
}

fn default_fuzzy_threshold() -> f32 {
    0.85
}

fn default_fuzzy_min_length() -> usize {
    5
}

fn default_cue_dominance_ratio() -> f32 {
    2.0
}

fn default_min_cues() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_llm_min_confidence() -> f32 {
    0.7
}

fn default_llm_context_chars() -> usize {
    1500
}

impl Default for GenderConfig {
    fn default() -> Self {
        Self {
            majority_threshold: default_majority_threshold(),
            fuzzy_threshold: default_fuzzy_threshold(),
            fuzzy_min_length: default_fuzzy_min_length(),
            cue_dominance_ratio: default_cue_dominance_ratio(),
            min_cues: default_min_cues(),
            use_name_endings: true,
            llm_min_confidence: default_llm_min_confidence(),
            llm_context_chars: default_llm_context_chars(),
        }
    }
}

impl GenderConfig {
    /// Check ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.5..=1.0).contains(&self.majority_threshold) {
            return Err(ConfigError::invalid(
                "analysis.gender.majority_threshold",
                "must be between 0.5 and 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.fuzzy_threshold) || self.fuzzy_threshold == 0.0 {
            return Err(ConfigError::invalid("analysis.gender.fuzzy_threshold", "must be in (0, 1]"));
        }
        if self.cue_dominance_ratio < 1.0 {
            return Err(ConfigError::invalid("analysis.gender.cue_dominance_ratio", "must be at least 1.0"));
        }
        if self.min_cues == 0 {
            return Err(ConfigError::invalid("analysis.gender.min_cues", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.llm_min_confidence) {
            return Err(ConfigError::invalid("analysis.gender.llm_min_confidence", "must be within 0..=1"));
        }
        Ok(())
    }
}

/// Script text indexed for gender cues
#[derive(Debug, Clone, Default)]
pub struct ScriptContext {
    /// Stage-direction sentences as lower-case tokens, with the original text
    directions: Vec<(Vec<String>, String)>,
    /// Dialogue by speaker key
    dialogue: HashMap<String, Vec<String>>,
}

impl ScriptContext {
    /// Index parsed lines
    pub fn from_lines(lines: &[DialogueLine]) -> Self {
        let mut context = Self::default();
        for line in lines {
            match &line.speaker_key {
                Some(key) => context
                    .dialogue
                    .entry(key.clone())
                    .or_default()
                    .push(line.text.clone()),
                None => {
                    for sentence in line.text.split(['.', '!', '?', ';']) {
                        let tokens = tokenize(sentence);
                        if !tokens.is_empty() {
                            context.directions.push((tokens, sentence.trim().to_string()));
                        }
                    }
                }
            }
        }
        context
    }

    /// Stage-direction sentences that mention every token of `key`
    fn mentions<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a (Vec<String>, String)> + 'a {
        let name_tokens: Vec<&str> = key.split_whitespace().collect();
        self.directions
            .iter()
            .filter(move |(tokens, _)| !name_tokens.is_empty() && name_tokens.iter().all(|n| tokens.iter().any(|t| t == n)))
    }

    /// (female, male) cue counts in sentences mentioning `key`
    pub fn pronoun_cues(&self, key: &str) -> (usize, usize) {
        let mut female = 0;
        let mut male = 0;
        for (tokens, _) in self.mentions(key) {
            female += tokens.iter().filter(|t| FEMALE_CUES.contains(&t.as_str())).count();
            male += tokens.iter().filter(|t| MALE_CUES.contains(&t.as_str())).count();
        }
        (female, male)
    }

    /// Context text for an LLM prompt, bounded by `max_chars`
    pub fn character_context(&self, key: &str, max_chars: usize) -> String {
        let mut parts: Vec<&str> = self.mentions(key).map(|(_, text)| text.as_str()).collect();
        if let Some(lines) = self.dialogue.get(key) {
            parts.extend(lines.iter().map(String::as_str));
        }

        let mut context = String::new();
        for part in parts {
            if context.len() + part.len() + 1 > max_chars {
                break;
            }
            context.push_str(part);
            context.push('\n');
        }
        context
    }
}

/// Lower-case word tokens, possessive "'s" dropped
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '’'))
        .map(|w| w.trim_matches(|c| c == '\'' || c == '’'))
        .filter(|w| !w.is_empty())
        .map(|w| {
            let lower = w.to_lowercase();
            lower
                .strip_suffix("'s")
                .or_else(|| lower.strip_suffix("’s"))
                .map(str::to_string)
                .unwrap_or_else(|| lower.clone())
        })
        .collect()
}

/// Gender classifier for one analysis run
#[derive(Debug)]
pub struct GenderClassifier {
    config: GenderConfig,
    names: Arc<NameTable>,
    provider: Option<Arc<dyn Provider>>,
    llm_timeout: Duration,
    sampling: Sampling,
    memo: HashMap<String, Character>,
}

impl GenderClassifier {
    pub fn new(config: GenderConfig, names: Arc<NameTable>) -> Self {
        Self {
            config,
            names,
            provider: None,
            llm_timeout: Duration::from_secs(30),
            sampling: Sampling::default(),
            memo: HashMap::new(),
        }
    }

    /// Enable the LLM fallback
    pub fn with_llm(mut self, provider: Arc<dyn Provider>, timeout: Duration) -> Self {
        self.provider = Some(provider);
        self.llm_timeout = timeout;
        self
    }

    /// Temperature and token limit for LLM requests
    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    /// Classify a speaker; repeated calls with the same key return the first result
    pub async fn classify(&mut self, name: &str, key: &str, context: &ScriptContext) -> Character {
        if let Some(character) = self.memo.get(key) {
            return character.clone();
        }

        let character = match self.classify_by_rules(name, key, context) {
            Some(character) => character,
            None => self.classify_with_llm(name, key, context).await,
        };

        debug!(
            "Classified {} as {} ({:.2}, {:?})",
            character.name, character.gender, character.confidence, character.evidence
        );
        self.memo.insert(key.to_string(), character.clone());
        character
    }

    /// Everything but the LLM; `None` when no rule was conclusive
    pub fn classify_by_rules(&self, name: &str, key: &str, context: &ScriptContext) -> Option<Character> {
        let tokens: Vec<&str> = key.split_whitespace().collect();
        let labelled = |gender: Gender, confidence: f32, evidence: Evidence| Character {
            name: name.to_string(),
            key: key.to_string(),
            gender,
            confidence,
            evidence,
        };

        // Gendered titles and role words
        for token in &tokens {
            if FEMALE_TERMS.contains(token) {
                return Some(labelled(Gender::Female, 0.95, Evidence::GenderedTerm { term: token.to_string() }));
            }
            if MALE_TERMS.contains(token) {
                return Some(labelled(Gender::Male, 0.95, Evidence::GenderedTerm { term: token.to_string() }));
            }
        }

        // Name table: exact hits on any token first, then fuzzy
        let table_hit = tokens
            .iter()
            .find_map(|t| self.names.lookup(t, 1.0, usize::MAX))
            .or_else(|| {
                tokens
                    .iter()
                    .find_map(|t| self.names.lookup(t, self.config.fuzzy_threshold, self.config.fuzzy_min_length))
            });
        if let Some(hit) = table_hit {
            let evidence = Evidence::NameTable {
                matched: hit.name.clone(),
                female_share: hit.female_share,
                fuzzy: hit.is_fuzzy(),
            };
            if hit.female_share >= self.config.majority_threshold {
                return Some(labelled(Gender::Female, hit.female_share * hit.similarity, evidence));
            }
            if 1.0 - hit.female_share >= self.config.majority_threshold {
                return Some(labelled(Gender::Male, (1.0 - hit.female_share) * hit.similarity, evidence));
            }
            debug!("Name table is split on {} ({:.2} female)", hit.name, hit.female_share);
        }

        // Pronouns around mentions in stage directions
        let (female, male) = context.pronoun_cues(key);
        let ratio = self.config.cue_dominance_ratio;
        let cue_confidence = |winner: usize| 0.5 + 0.4 * winner as f32 / (female + male) as f32;
        if female >= self.config.min_cues && female as f32 > male as f32 * ratio {
            return Some(labelled(Gender::Female, cue_confidence(female), Evidence::ContextualCue { female, male }));
        }
        if male >= self.config.min_cues && male as f32 > female as f32 * ratio {
            return Some(labelled(Gender::Male, cue_confidence(male), Evidence::ContextualCue { female, male }));
        }

        if self.config.use_name_endings {
            if let Some(first) = tokens.first().filter(|t| t.chars().count() >= 3) {
                if let Some((gender, suffix)) = gender_from_ending(first) {
                    return Some(labelled(gender, 0.55, Evidence::NameEnding { suffix: suffix.to_string() }));
                }
            }
        }

        None
    }

    async fn classify_with_llm(&self, name: &str, key: &str, context: &ScriptContext) -> Character {
        let unknown = Character::unknown(name, key);
        let Some(provider) = &self.provider else {
            return unknown;
        };

        let prompt = prompts::gender_prompt(name, &context.character_context(key, self.config.llm_context_chars));
        let request = self.sampling.apply(CompletionRequest::new(prompt).system(prompts::SYSTEM_PROMPT));

        let response = match tokio::time::timeout(self.llm_timeout, provider.complete(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("LLM gender detection failed for {}: {}", name, e);
                return unknown;
            }
            Err(_) => {
                warn!("LLM gender detection timed out for {}", name);
                return unknown;
            }
        };

        match prompts::parse_gender_response(&response.text) {
            Some((gender, confidence)) if gender != Gender::Unknown && confidence >= self.config.llm_min_confidence => {
                Character {
                    name: name.to_string(),
                    key: key.to_string(),
                    gender,
                    confidence,
                    evidence: Evidence::LlmOpinion { confidence },
                }
            }
            Some(_) => unknown,
            None => {
                debug!("Unusable LLM gender answer for {}: {:?}", name, response.text);
                unknown
            }
        }
    }
}

fn gender_from_ending(name: &str) -> Option<(Gender, &'static str)> {
    if let Some(suffix) = FEMALE_ENDINGS.iter().find(|s| name.ends_with(*s)) {
        if !FEMALE_ENDING_EXCEPTIONS.iter().any(|s| name.ends_with(s)) {
            return Some((Gender::Female, *suffix));
        }
    }
    MALE_ENDINGS
        .iter()
        .find(|s| name.ends_with(*s))
        .map(|suffix| (Gender::Male, *suffix))
}
