/*!
 * Artifacts passed between analysis stages.
 *
 * Each stage consumes the previous stage's output and produces a new value;
 * nothing here is mutated after construction except `CharacterSet` while
 * it is being built.
 */

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One unit of parsed script text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueLine {
    /// Scene the line belongs to, counted from 0
    pub scene_index: usize,

    /// Speaker cue as printed, absent for stage directions and sluglines
    pub speaker: Option<String>,

    /// Normalized speaker key
    pub speaker_key: Option<String>,

    /// Dialogue or direction text
    pub text: String,

    /// Position in the parsed sequence
    pub line_index: usize,
}

impl DialogueLine {
    /// Whether the line has a speaker
    pub fn is_attributed(&self) -> bool {
        self.speaker_key.is_some()
    }
}

/// Character gender label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
    Unknown,
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Female => write!(f, "female"),
            Self::Male => write!(f, "male"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// What a gender label was based on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    /// First-name table lookup
    NameTable {
        /// Table entry that matched
        matched: String,
        /// Female share recorded for that entry
        female_share: f32,
        /// Whether the match was approximate
        fuzzy: bool,
    },
    /// A gendered title or role word in the name, e.g. "MRS." or "WAITRESS"
    GenderedTerm { term: String },
    /// Pronouns in stage directions that mention the character
    ContextualCue { female: usize, male: usize },
    /// Name ending heuristic
    NameEnding { suffix: String },
    /// Language model answer
    LlmOpinion { confidence: f32 },
    /// Nothing conclusive
    None,
}

/// A speaking character and its gender classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    /// Display name, as first printed without cue extensions
    pub name: String,
    /// Normalized key
    pub key: String,
    pub gender: Gender,
    /// Confidence in [0, 1]
    pub confidence: f32,
    pub evidence: Evidence,
}

impl Character {
    /// An unclassified character
    pub fn unknown(name: &str, key: &str) -> Self {
        Self {
            name: name.to_string(),
            key: key.to_string(),
            gender: Gender::Unknown,
            confidence: 0.0,
            evidence: Evidence::None,
        }
    }

    pub fn is_female(&self) -> bool {
        self.gender == Gender::Female
    }

    pub fn is_male(&self) -> bool {
        self.gender == Gender::Male
    }
}

/// Characters keyed by normalized name, in order of first appearance
#[derive(Debug, Clone, Default)]
pub struct CharacterSet {
    characters: Vec<Character>,
    index: HashMap<String, usize>,
}

impl CharacterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a character; a key that is already present is left unchanged
    pub fn insert(&mut self, character: Character) {
        if self.index.contains_key(&character.key) {
            return;
        }
        self.index.insert(character.key.clone(), self.characters.len());
        self.characters.push(character);
    }

    pub fn get(&self, key: &str) -> Option<&Character> {
        self.index.get(key).map(|&i| &self.characters[i])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn gender_of(&self, key: &str) -> Gender {
        self.get(key).map_or(Gender::Unknown, |c| c.gender)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Character> {
        self.characters.iter()
    }

    /// Female characters in order of first appearance
    pub fn females(&self) -> impl Iterator<Item = &Character> {
        self.characters.iter().filter(|c| c.is_female())
    }

    /// Male characters in order of first appearance
    pub fn males(&self) -> impl Iterator<Item = &Character> {
        self.characters.iter().filter(|c| c.is_male())
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}

impl FromIterator<Character> for CharacterSet {
    fn from_iter<I: IntoIterator<Item = Character>>(iter: I) -> Self {
        let mut set = Self::new();
        for character in iter {
            set.insert(character);
        }
        set
    }
}

/// A run of attributed lines within one scene
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub scene_index: usize,
    /// Attributed lines in script order
    pub lines: Vec<DialogueLine>,
    /// Distinct speaker keys in order of first line
    pub participants: Vec<String>,
}

impl Conversation {
    /// Build from attributed lines, deriving the participant list
    pub fn from_lines(scene_index: usize, lines: Vec<DialogueLine>) -> Self {
        let mut participants: Vec<String> = Vec::new();
        for key in lines.iter().filter_map(|l| l.speaker_key.as_ref()) {
            if !participants.contains(key) {
                participants.push(key.clone());
            }
        }
        Self {
            scene_index,
            lines,
            participants,
        }
    }

    /// Dialogue text only, one line per turn
    pub fn dialogue_text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Transcript with speaker names, for prompts
    pub fn transcript(&self) -> String {
        self.lines
            .iter()
            .map(|l| format!("{}: {}", l.speaker.as_deref().unwrap_or("?"), l.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of distinct female participants
    pub fn female_participants(&self, characters: &CharacterSet) -> usize {
        self.participants
            .iter()
            .filter(|key| characters.gender_of(key) == Gender::Female)
            .count()
    }
}

/// Three-way topic label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AboutMale {
    Yes,
    No,
    Indeterminate,
}

/// How a topic label was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicMethod {
    Rule,
    Llm,
    Default,
}

/// Topic decision for one qualifying conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicVerdict {
    pub conversation_index: usize,
    pub about_male: AboutMale,
    pub method: TopicMethod,
    pub confidence: f32,
}

impl TopicVerdict {
    /// Whether this conversation counts towards passing
    pub fn is_clear_of_men(&self) -> bool {
        self.about_male != AboutMale::Yes
    }
}
