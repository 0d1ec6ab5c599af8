/*!
 * Conversation extraction.
 *
 * A conversation is a run of attributed lines inside one scene. Stage
 * directions between turns are tolerated as long as the positional gap stays
 * within the configured turn-gap; a scene change always ends the run.
 */

use log::debug;
use serde::{Deserialize, Serialize};

use crate::analysis::model::{CharacterSet, Conversation, DialogueLine};
use crate::errors::ConfigError;

/// Conversation grouping settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Largest line-index distance between consecutive turns of one conversation
    #[serde(default = "default_max_turn_gap")]
    pub max_turn_gap: usize,

    /// Runs longer than this are split
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
}

fn default_max_turn_gap() -> usize {
    3
}

fn default_max_lines() -> usize {
    50
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_turn_gap: default_max_turn_gap(),
            max_lines: default_max_lines(),
        }
    }
}

impl ConversationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_turn_gap == 0 {
            return Err(ConfigError::invalid("analysis.conversation.max_turn_gap", "must be at least 1"));
        }
        if self.max_lines < 2 {
            return Err(ConfigError::invalid("analysis.conversation.max_lines", "must be at least 2"));
        }
        Ok(())
    }
}

/// Groups dialogue lines into conversations
#[derive(Debug, Clone, Default)]
pub struct ConversationExtractor {
    config: ConversationConfig,
}

impl ConversationExtractor {
    pub fn new(config: ConversationConfig) -> Self {
        Self { config }
    }

    /// All conversations with at least two distinct participants, in script order.
    /// Lines whose speaker is not in `characters` are ignored.
    pub fn extract(&self, lines: &[DialogueLine], characters: &CharacterSet) -> Vec<Conversation> {
        let mut conversations = Vec::new();
        let mut run: Vec<DialogueLine> = Vec::new();

        let attributed = lines
            .iter()
            .filter(|l| l.speaker_key.as_deref().is_some_and(|k| characters.contains(k)));

        for line in attributed {
            if let Some(last) = run.last() {
                let gap = line.line_index.saturating_sub(last.line_index);
                if line.scene_index != last.scene_index
                    || gap > self.config.max_turn_gap
                    || run.len() >= self.config.max_lines
                {
                    self.close_run(&mut run, &mut conversations);
                }
            }
            run.push(line.clone());
        }
        self.close_run(&mut run, &mut conversations);

        debug!("Extracted {} conversations from {} lines", conversations.len(), lines.len());
        conversations
    }

    fn close_run(&self, run: &mut Vec<DialogueLine>, conversations: &mut Vec<Conversation>) {
        let Some(first) = run.first() else {
            return;
        };
        let conversation = Conversation::from_lines(first.scene_index, std::mem::take(run));
        if conversation.participants.len() >= 2 {
            conversations.push(conversation);
        }
    }
}

/// Conversations with at least two distinct female participants
pub fn qualifying(conversations: &[Conversation], characters: &CharacterSet) -> Vec<Conversation> {
    conversations
        .iter()
        .filter(|c| c.female_participants(characters) >= 2)
        .cloned()
        .collect()
}
