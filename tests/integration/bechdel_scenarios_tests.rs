/*!
 * End-to-end Bechdel verdicts on script text
 */

use std::sync::Arc;
use std::time::Duration;

use bechdel::analysis::names::NameTable;
use bechdel::analysis::topic::LlmResponseCache;
use bechdel::analysis::verdict::{REASON_ALL_ABOUT_MEN, REASON_FEW_FEMALES, REASON_NO_CONVERSATION};
use bechdel::analysis::BechdelAnalyzer;
use bechdel::app_config::AnalysisConfig;
use bechdel::providers::Sampling;
use bechdel::providers::mock::MockProvider;

use crate::common::scripts;

fn analyzer() -> BechdelAnalyzer {
    BechdelAnalyzer::new(&AnalysisConfig::default(), Arc::new(NameTable::builtin()))
}

#[tokio::test]
async fn test_analyze_trinityAndOracleOnMission_shouldPass() {
    let result = analyzer().analyze_text(scripts::MISSION).await;

    assert!(result.passes_test);
    assert!(result.failure_reasons.is_empty());
    assert_eq!(result.female_characters, vec!["TRINITY", "ORACLE"]);
    assert_eq!(result.qualifying_conversations, 1);
}

#[tokio::test]
async fn test_analyze_sarahAndMariaOnJohnsPlan_shouldFailOnTopicOnly() {
    let result = analyzer().analyze_text(scripts::JOHNS_PLAN).await;

    assert!(!result.passes_test);
    assert_eq!(result.failure_reasons, vec![REASON_ALL_ABOUT_MEN]);
    assert_eq!(result.female_characters, vec!["SARAH", "MARIA"]);
}

#[tokio::test]
async fn test_analyze_singleWoman_shouldGiveFirstTwoReasons() {
    let result = analyzer().analyze_text(scripts::SINGLE_WOMAN).await;

    assert!(!result.passes_test);
    assert_eq!(result.failure_reasons, vec![REASON_FEW_FEMALES, REASON_NO_CONVERSATION]);
}

#[tokio::test]
async fn test_analyze_addingCleanConversation_shouldFlipToPass() {
    let failing = analyzer().analyze_text(scripts::JOHNS_PLAN).await;
    let extended = format!("{}{}", scripts::JOHNS_PLAN, scripts::LAB_SCENE);
    let passing = analyzer().analyze_text(&extended).await;

    assert!(!failing.passes_test);
    assert!(passing.passes_test);
    assert_eq!(passing.qualifying_conversations, 2);
}

#[tokio::test]
async fn test_analyze_withFailingLlm_shouldMatchRulesOnly() {
    let provider = Arc::new(MockProvider::failing());
    let with_llm = analyzer()
        .with_llm(provider, Duration::from_secs(1), Arc::new(LlmResponseCache::new(16)))
        .analyze_text(scripts::MISSION)
        .await;
    let rules_only = analyzer().analyze_text(scripts::MISSION).await;

    assert_eq!(with_llm, rules_only);
}

#[tokio::test]
async fn test_analyze_withSampling_shouldApplyLimitsToEveryLlmRequest() {
    let provider = Arc::new(MockProvider::empty());
    analyzer()
        .with_llm(provider.clone(), Duration::from_secs(1), Arc::new(LlmResponseCache::new(16)))
        .with_sampling(Sampling {
            temperature: 0.2,
            max_tokens: 200,
        })
        .analyze_text("INT. BRIDGE - NIGHT\n\nZOG\nReport.\n\nKREX\nAll clear.")
        .await;

    let requests = provider.requests();
    assert!(!requests.is_empty());
    for request in requests {
        assert_eq!(request.temperature, 0.2);
        assert_eq!(request.max_tokens, 200);
    }
}

#[tokio::test]
async fn test_analyze_withGarbage_shouldNotPanic() {
    let result = analyzer().analyze_text("\u{0}\u{1}(((:::\n\n\n)))").await;
    assert!(!result.passes_test);
    assert!(result.female_characters.is_empty());
}

#[tokio::test]
async fn test_result_json_shouldUseWireFieldNames() {
    let result = analyzer().analyze_text(scripts::MISSION).await;
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["passes_test"], true);
    assert_eq!(json["num_female_conversations"], 1);
    assert_eq!(json["female_characters"][0], "TRINITY");
    assert!(json["failure_reasons"].as_array().unwrap().is_empty());
}
