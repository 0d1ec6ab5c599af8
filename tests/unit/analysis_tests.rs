/*!
 * Tests for the analysis stages working on parsed fixtures
 */

use std::sync::Arc;

use bechdel::analysis::conversation::{ConversationConfig, ConversationExtractor, qualifying};
use bechdel::analysis::gender::{GenderClassifier, GenderConfig, ScriptContext};
use bechdel::analysis::model::{AboutMale, Evidence, Gender, TopicMethod};
use bechdel::analysis::names::NameTable;
use bechdel::analysis::parser::parse;
use bechdel::analysis::topic::{TopicClassifier, TopicConfig};
use bechdel::analysis::BechdelAnalyzer;
use bechdel::app_config::AnalysisConfig;

use crate::common::scripts;

#[test]
fn test_parse_missionScript_shouldFindSpeakersAndScenes() {
    let lines = parse(scripts::MISSION);
    let speakers: Vec<_> = lines.iter().filter_map(|l| l.speaker_key.as_deref()).collect();
    assert_eq!(speakers, vec!["trinity", "oracle", "trinity", "oracle", "neo", "trinity"]);

    let neo = lines.iter().find(|l| l.speaker_key.as_deref() == Some("neo")).unwrap();
    let oracle = lines.iter().find(|l| l.speaker_key.as_deref() == Some("oracle")).unwrap();
    assert!(neo.scene_index > oracle.scene_index);
}

#[tokio::test]
async fn test_characters_missionScript_shouldUseStageDirectionCues() {
    let analyzer = BechdelAnalyzer::new(&AnalysisConfig::default(), Arc::new(NameTable::builtin()));
    let characters = analyzer.characters(&parse(scripts::MISSION)).await;

    assert_eq!(characters.gender_of("trinity"), Gender::Female);
    assert_eq!(characters.gender_of("oracle"), Gender::Female);
    assert_eq!(characters.gender_of("neo"), Gender::Male);
    assert!(matches!(
        characters.get("oracle").unwrap().evidence,
        Evidence::ContextualCue { .. }
    ));
}

#[tokio::test]
async fn test_classify_withInjectedTable_shouldUseTableVersionData() {
    let table = Arc::new(NameTable::from_pairs("test-1", [("trinity", 0.97), ("neo", 0.02)]));
    assert_eq!(table.version(), "test-1");
    let mut classifier = GenderClassifier::new(GenderConfig::default(), table);
    let context = ScriptContext::default();

    let trinity = classifier.classify("TRINITY", "trinity", &context).await;
    let neo = classifier.classify("NEO", "neo", &context).await;

    assert_eq!(trinity.gender, Gender::Female);
    assert_eq!(neo.gender, Gender::Male);
}

#[tokio::test]
async fn test_classify_withSplitTableEntry_shouldFallThroughToCues() {
    let lines = parse("Robin loads her rifle.\n\nROBIN\nReady.");
    let context = ScriptContext::from_lines(&lines);
    let mut classifier = GenderClassifier::new(GenderConfig::default(), Arc::new(NameTable::builtin()));

    let robin = classifier.classify("ROBIN", "robin", &context).await;
    assert_eq!(robin.gender, Gender::Female);
    assert_eq!(robin.evidence, Evidence::ContextualCue { female: 1, male: 0 });
}

#[tokio::test]
async fn test_classify_withoutNameEndings_shouldStayUnknown() {
    let config = GenderConfig {
        use_name_endings: false,
        ..GenderConfig::default()
    };
    let mut classifier = GenderClassifier::new(config, Arc::new(NameTable::builtin()));

    let dozer = classifier.classify("DOZER", "dozer", &ScriptContext::default()).await;
    assert_eq!(dozer.gender, Gender::Unknown);
    assert_eq!(dozer.evidence, Evidence::None);
}

#[tokio::test]
async fn test_qualifying_shouldNeverContainFewerThanTwoWomen() {
    let analyzer = BechdelAnalyzer::new(&AnalysisConfig::default(), Arc::new(NameTable::builtin()));
    let lines = parse(scripts::MISSION);
    let characters = analyzer.characters(&lines).await;

    let conversations = ConversationExtractor::default().extract(&lines, &characters);
    let qualifying = qualifying(&conversations, &characters);

    assert_eq!(conversations.len(), 2);
    assert_eq!(qualifying.len(), 1);
    for conversation in &qualifying {
        assert!(conversation.female_participants(&characters) >= 2);
    }
}

#[tokio::test]
async fn test_extract_withTightTurnGap_shouldSplitAroundDirections() {
    let script = "INT. HALL - DAY\n\nANNA\nHi.\n\nAnna waits.\n\nShe sighs.\n\nMARIA\nHello.";
    let analyzer = BechdelAnalyzer::new(&AnalysisConfig::default(), Arc::new(NameTable::builtin()));
    let lines = parse(script);
    let characters = analyzer.characters(&lines).await;

    let loose = ConversationExtractor::default().extract(&lines, &characters);
    let tight = ConversationExtractor::new(ConversationConfig {
        max_turn_gap: 1,
        ..ConversationConfig::default()
    })
    .extract(&lines, &characters);

    assert_eq!(loose.len(), 1);
    assert!(tight.is_empty());
}

#[tokio::test]
async fn test_topic_johnsPlan_shouldBeAboutMaleByRule() {
    let analyzer = BechdelAnalyzer::new(&AnalysisConfig::default(), Arc::new(NameTable::builtin()));
    let lines = parse(scripts::JOHNS_PLAN);
    let characters = analyzer.characters(&lines).await;
    let conversations = ConversationExtractor::default().extract(&lines, &characters);
    let classifier = TopicClassifier::new(TopicConfig::default(), Arc::new(NameTable::builtin()));

    let verdict = classifier.classify(0, &conversations[0], &characters).await;

    assert_eq!(verdict.about_male, AboutMale::Yes);
    assert_eq!(verdict.method, TopicMethod::Rule);
}

#[tokio::test]
async fn test_topic_withCustomPhrase_shouldMatchPhrase() {
    let analyzer = BechdelAnalyzer::new(&AnalysisConfig::default(), Arc::new(NameTable::builtin()));
    let script = "INT. CAR - NIGHT\n\nSARAH\nThe new quarterback is all anyone talks about.\n\nMARIA\nTrue.";
    let lines = parse(script);
    let characters = analyzer.characters(&lines).await;
    let conversations = ConversationExtractor::default().extract(&lines, &characters);

    let config = TopicConfig {
        male_phrases: vec!["new quarterback".to_string()],
        ..TopicConfig::default()
    };
    let assessment = TopicClassifier::new(config, Arc::new(NameTable::builtin())).assess(&conversations[0], &characters);

    assert_eq!(assessment.matched_phrase.as_deref(), Some("new quarterback"));
    assert_eq!(assessment.about_male, AboutMale::Yes);
}
