//! PubTator client against the scripted transport, plus one live smoke test.
//!
//! Live test: cargo test --package treatmap-ingestion --test test_pubtator_client -- --ignored --nocapture

use std::sync::Arc;
use std::time::Duration;
use treatmap_common::ConceptKind;
use treatmap_config::PubTatorConfig;
use treatmap_ingestion::PubTatorClient;
use treatmap_test_utils::{MockTransport, AUTOCOMPLETE_PATH, RELATIONS_PATH, SEARCH_PATH};

const METFORMIN: &str = "@CHEMICAL_metformin";
const T2D: &str = "@DISEASE_type_2_diabetes";

fn metformin_mock() -> MockTransport {
    MockTransport::new()
        .with_autocomplete("metformin", &[("metformin", METFORMIN), ("metformin glucuronide", "@CHEMICAL_metformin_glucuronide")])
        .with_relations(
            METFORMIN,
            &[
                (METFORMIN, "@DISEASE_obesity", 30),
                (METFORMIN, T2D, 120),
                (METFORMIN, "@DISEASE_pcos", 30),
                (METFORMIN, T2D, 7),
            ],
        )
        .with_search(METFORMIN, T2D, &[(&["101", "102"], 3), (&["103"], 3)])
}

#[tokio::test(start_paused = true)]
async fn test_mixed_calls_share_one_rate_gate() {
    let mock = Arc::new(metformin_mock());
    let client = PubTatorClient::new(mock.clone(), &PubTatorConfig::default());

    let res = client.resolve_entities("metformin", Some(ConceptKind::Chemical), Some(5)).await.unwrap();
    assert_eq!(res.total_count, 2);
    let rel = client
        .related_entities(METFORMIN, "treat", ConceptKind::Disease, Some(25))
        .await
        .unwrap();
    let hits = client.paginated_search(METFORMIN, T2D, 1, 100, 10).await.unwrap();
    assert_eq!(hits.pmids().collect::<Vec<_>>(), vec!["101", "102", "103"]);
    assert_eq!(rel.related_ids(), vec![T2D, "@DISEASE_obesity", "@DISEASE_pcos"]);

    let calls = mock.calls();
    assert_eq!(mock.calls_to(AUTOCOMPLETE_PATH), 2);
    assert_eq!(mock.calls_to(RELATIONS_PATH), 1);
    assert_eq!(mock.calls_to(SEARCH_PATH), 2);
    for pair in calls.windows(2) {
        assert!(pair[1].at - pair[0].at >= Duration::from_millis(500), "calls closer than 0.5s");
    }
}

#[tokio::test(start_paused = true)]
async fn test_throttled_relations_recover_within_retry_budget() {
    let mock = Arc::new(metformin_mock().fail_with_status(RELATIONS_PATH, 429, 2));
    let client = PubTatorClient::new(mock.clone(), &PubTatorConfig::default());

    let rel = client
        .related_entities(METFORMIN, "treat", ConceptKind::Disease, None)
        .await
        .unwrap();
    assert_eq!(rel.total_unique, 3);
    assert_eq!(mock.calls_to(RELATIONS_PATH), 3);
}

#[tokio::test(start_paused = true)]
async fn test_throttled_relations_beyond_budget_are_empty() {
    let mock = Arc::new(metformin_mock().fail_with_status(RELATIONS_PATH, 503, 3));
    let client = PubTatorClient::new(mock.clone(), &PubTatorConfig::default());

    let rel = client
        .related_entities(METFORMIN, "treat", ConceptKind::Disease, None)
        .await
        .unwrap();
    assert!(rel.edges.is_empty());
    assert_eq!(rel.total_unique, 0);
    assert_eq!(mock.calls_to(RELATIONS_PATH), 3);
}

#[tokio::test]
#[ignore] // Requires network access
async fn test_live_metformin_relations() {
    let client = PubTatorClient::from_config(&PubTatorConfig::default()).expect("client");

    let res = client
        .resolve_entities("metformin", Some(ConceptKind::Chemical), Some(10))
        .await
        .expect("autocomplete failed");
    println!("Resolved {} of {} matches", res.entities.len(), res.total_count);
    for e in &res.entities {
        println!("  {} -> {}", e.display_name, e.id);
    }

    let rel = client
        .related_entities(METFORMIN, "treat", ConceptKind::Disease, Some(10))
        .await
        .expect("relations failed");
    println!("Top diseases: {:?}", rel.related_ids());

    assert!(!res.entities.is_empty(), "Should resolve metformin");
}
