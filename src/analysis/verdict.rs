/*!
 * Bechdel verdict aggregation.
 */

use serde::{Deserialize, Serialize};

use crate::analysis::model::{CharacterSet, TopicVerdict};

pub const REASON_FEW_FEMALES: &str = "fewer than two female characters";
pub const REASON_NO_CONVERSATION: &str = "no conversation between female characters found";
pub const REASON_ALL_ABOUT_MEN: &str = "all female-female conversations are about a male character";

/// Where an analyzed script came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: String,
    pub url: String,
}

/// Final analysis outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BechdelResult {
    pub passes_test: bool,

    /// Female character names in order of first appearance
    pub female_characters: Vec<String>,

    #[serde(rename = "num_female_conversations")]
    pub qualifying_conversations: usize,

    pub failure_reasons: Vec<String>,

    #[serde(flatten, default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

impl BechdelResult {
    pub fn with_provenance(mut self, source: impl Into<String>, url: impl Into<String>) -> Self {
        self.provenance = Some(Provenance {
            source: source.into(),
            url: url.into(),
        });
        self
    }
}

/// Apply the three rules. `topics` holds one verdict per qualifying conversation.
pub fn aggregate(characters: &CharacterSet, qualifying_conversations: usize, topics: &[TopicVerdict]) -> BechdelResult {
    let female_characters: Vec<String> = characters.females().map(|c| c.name.clone()).collect();

    let mut failure_reasons = Vec::new();
    if female_characters.len() < 2 {
        failure_reasons.push(REASON_FEW_FEMALES.to_string());
    }
    if qualifying_conversations == 0 {
        failure_reasons.push(REASON_NO_CONVERSATION.to_string());
    } else if !topics.iter().any(TopicVerdict::is_clear_of_men) {
        failure_reasons.push(REASON_ALL_ABOUT_MEN.to_string());
    }

    BechdelResult {
        passes_test: failure_reasons.is_empty(),
        female_characters,
        qualifying_conversations,
        failure_reasons,
        provenance: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::model::{AboutMale, Character, Evidence, Gender, TopicMethod};

    fn cast(females: usize) -> CharacterSet {
        (0..females)
            .map(|i| Character {
                name: format!("WOMAN {}", i + 1),
                key: format!("woman {}", i + 1),
                gender: Gender::Female,
                confidence: 1.0,
                evidence: Evidence::None,
            })
            .collect()
    }

    fn topic(about_male: AboutMale) -> TopicVerdict {
        TopicVerdict {
            conversation_index: 0,
            about_male,
            method: TopicMethod::Rule,
            confidence: 0.8,
        }
    }

    #[test]
    fn test_aggregate_withCleanConversation_shouldPass() {
        let result = aggregate(&cast(2), 2, &[topic(AboutMale::Yes), topic(AboutMale::No)]);
        assert!(result.passes_test);
        assert!(result.failure_reasons.is_empty());
        assert_eq!(result.female_characters, vec!["WOMAN 1", "WOMAN 2"]);
    }

    #[test]
    fn test_aggregate_withOneFemale_shouldListBothReasons() {
        let result = aggregate(&cast(1), 0, &[]);
        assert!(!result.passes_test);
        assert_eq!(result.failure_reasons, vec![REASON_FEW_FEMALES, REASON_NO_CONVERSATION]);
    }

    #[test]
    fn test_aggregate_withOnlyMaleTopics_shouldGiveThirdReason() {
        let result = aggregate(&cast(2), 1, &[topic(AboutMale::Yes)]);
        assert_eq!(result.failure_reasons, vec![REASON_ALL_ABOUT_MEN]);
    }

    #[test]
    fn test_serialize_shouldUseWireNames() {
        let result = aggregate(&cast(2), 1, &[topic(AboutMale::No)]).with_provenance("imsdb", "https://imsdb.com/x");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["passes_test"], true);
        assert_eq!(json["num_female_conversations"], 1);
        assert_eq!(json["source"], "imsdb");

        let bare = serde_json::to_value(aggregate(&cast(0), 0, &[])).unwrap();
        assert!(bare.get("source").is_none());
    }
}
