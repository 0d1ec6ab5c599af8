/*!
 * Prompt templates for LLM-assisted classification.
 *
 * Both prompts ask for a small JSON object; the response parsers also accept
 * the bare one-word answers many local models produce instead.
 */

use serde::Deserialize;

use crate::analysis::model::Gender;

/// System prompt shared by both classification tasks
pub const SYSTEM_PROMPT: &str = "You are a careful film script analyst. \
Answer only with the JSON object requested, without commentary.";

const GENDER_TEMPLATE: &str = r#"Analyze the character name and context to determine the character's likely gender.
Focus only on clear gender indicators.

Character Name: {character_name}
Context:
{context}

Respond with JSON: {"gender": "female" | "male" | "unknown", "confidence": <0.0-1.0>}"#;

const TOPIC_TEMPLATE: &str = r#"Analyze this conversation between female characters and decide whether it is primarily about a man or a male character.
Consider mentions of men, male pronouns and masculine terms, but a passing mention is not enough.

Male characters in this script: {male_characters}

Conversation:
{dialogue}

Respond with JSON: {"about_male": true | false, "confidence": <0.0-1.0>}"#;

/// Confidence assigned to bare one-word answers
pub const BARE_ANSWER_CONFIDENCE: f32 = 0.75;

/// Render the gender prompt
pub fn gender_prompt(character_name: &str, context: &str) -> String {
    let context = if context.trim().is_empty() {
        format!("Character named {} in a script.", character_name)
    } else {
        context.to_string()
    };
    GENDER_TEMPLATE
        .replace("{character_name}", character_name)
        .replace("{context}", &context)
}

/// Render the topic prompt
pub fn topic_prompt(dialogue: &str, male_characters: &[&str]) -> String {
    let males = if male_characters.is_empty() {
        "none known".to_string()
    } else {
        male_characters.join(", ")
    };
    TOPIC_TEMPLATE
        .replace("{male_characters}", &males)
        .replace("{dialogue}", dialogue)
}

#[derive(Debug, Deserialize)]
struct GenderAnswer {
    gender: String,
    #[serde(default = "default_answer_confidence")]
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct TopicAnswer {
    about_male: bool,
    #[serde(default = "default_answer_confidence")]
    confidence: f32,
}

fn default_answer_confidence() -> f32 {
    BARE_ANSWER_CONFIDENCE
}

/// First `{...}` span in a response, models like to wrap JSON in prose
fn json_span(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

/// Parse a gender answer into a label and confidence
pub fn parse_gender_response(response: &str) -> Option<(Gender, f32)> {
    if let Some(answer) = json_span(response).and_then(|span| serde_json::from_str::<GenderAnswer>(span).ok()) {
        let gender = match answer.gender.trim().to_lowercase().as_str() {
            "female" => Gender::Female,
            "male" => Gender::Male,
            _ => Gender::Unknown,
        };
        return Some((gender, answer.confidence.clamp(0.0, 1.0)));
    }

    let word = first_word(response)?;
    match word.as_str() {
        "female" => Some((Gender::Female, BARE_ANSWER_CONFIDENCE)),
        "male" => Some((Gender::Male, BARE_ANSWER_CONFIDENCE)),
        "unknown" => Some((Gender::Unknown, 0.0)),
        _ => None,
    }
}

/// Parse a topic answer into (about male, confidence)
pub fn parse_topic_response(response: &str) -> Option<(bool, f32)> {
    if let Some(answer) = json_span(response).and_then(|span| serde_json::from_str::<TopicAnswer>(span).ok()) {
        return Some((answer.about_male, answer.confidence.clamp(0.0, 1.0)));
    }

    match first_word(response)?.as_str() {
        "true" | "yes" => Some((true, BARE_ANSWER_CONFIDENCE)),
        "false" | "no" => Some((false, BARE_ANSWER_CONFIDENCE)),
        _ => None,
    }
}

fn first_word(response: &str) -> Option<String> {
    response
        .split(|c: char| !c.is_alphabetic())
        .find(|w| !w.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parseGenderResponse_withJson_shouldReadConfidence() {
        let parsed = parse_gender_response(r#"Sure: {"gender": "Female", "confidence": 0.92}"#);
        assert_eq!(parsed, Some((Gender::Female, 0.92)));
    }

    #[test]
    fn test_parseGenderResponse_withBareWord_shouldUseDefaultConfidence() {
        assert_eq!(parse_gender_response("male."), Some((Gender::Male, BARE_ANSWER_CONFIDENCE)));
        assert_eq!(parse_gender_response("I cannot tell"), None);
    }

    #[test]
    fn test_parseTopicResponse_shouldAcceptJsonAndBareAnswers() {
        assert_eq!(
            parse_topic_response(r#"{"about_male": false, "confidence": 0.8}"#),
            Some((false, 0.8))
        );
        assert_eq!(parse_topic_response("True"), Some((true, BARE_ANSWER_CONFIDENCE)));
        assert_eq!(parse_topic_response("{broken"), None);
    }

    #[test]
    fn test_topicPrompt_shouldListMaleCharacters() {
        let prompt = topic_prompt("SARAH: Hi", &["NEO", "JOHN"]);
        assert!(prompt.contains("NEO, JOHN"));
        assert!(prompt.contains("SARAH: Hi"));
    }
}
