//! Full pipeline runs against the scripted PubTator transport.

use chrono::Local;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;
use treatmap_common::ConceptKind;
use treatmap_config::{PipelineConfig, PubTatorConfig};
use treatmap_ingestion::PubTatorClient;
use treatmap_pipeline::{DropReason, DropRecord, Pipeline, PipelineReport, RunContext, StaticSeeds};
use treatmap_test_utils::{MockTransport, AUTOCOMPLETE_PATH, RELATIONS_PATH, SEARCH_PATH};

const METFORMIN: &str = "@CHEMICAL_metformin";
const T2D: &str = "@DISEASE_type_2_diabetes";

async fn run(mock: &Arc<MockTransport>, cfg: PipelineConfig, seeds: &[&str]) -> (PipelineReport, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let client = PubTatorClient::new(mock.clone(), &PubTatorConfig::default());
    let ctx = RunContext::with_run_id(dir.path(), "20260101_120000", Local::now()).unwrap();
    let report = Pipeline::new(client, cfg)
        .run(&StaticSeeds::new(seeds.iter().copied()), &ctx)
        .await
        .unwrap();
    (report, dir)
}

#[tokio::test(start_paused = true)]
async fn test_metformin_end_to_end() {
    let mock = Arc::new(
        MockTransport::new()
            .with_autocomplete("metformin", &[("metformin", METFORMIN)])
            .with_relations(METFORMIN, &[(METFORMIN, T2D, 50)])
            .with_search(METFORMIN, T2D, &[(&["30000001", "30000002", "30000003"], 3)]),
    );
    let (report, _dir) = run(&mock, PipelineConfig::default(), &["metformin"]).await;
    let a = &report.artifact;

    assert_eq!(a.seeds, vec!["metformin"]);
    assert_eq!(a.resolutions.len(), 1);
    assert_eq!(a.resolutions[0].entity_ids, vec![METFORMIN]);
    assert_eq!(a.resolutions[0].total_entity_ids, 1);

    assert_eq!(a.indications.len(), 1);
    let ind = &a.indications[0];
    assert_eq!(ind.seed, "metformin");
    assert_eq!(ind.anchor_id, METFORMIN);
    assert_eq!(ind.counterpart_ids, vec![T2D]);

    assert_eq!(ind.evidence.len(), 1);
    let ev = &ind.evidence[0];
    assert_eq!(ev.drug_id, METFORMIN);
    assert_eq!(ev.disease_id, T2D);
    assert_eq!(ev.disease_name, "type 2 diabetes");
    assert_eq!(ev.pmids, vec!["30000001", "30000002", "30000003"]);
    assert_eq!(ev.total_articles, 3);
    assert_eq!(ev.pages_fetched, 1);
    assert!(a.dropped.is_empty());
    assert!(a.finished_at.is_some());

    assert_eq!(mock.calls_to(AUTOCOMPLETE_PATH), 1);
    assert_eq!(mock.calls_to(RELATIONS_PATH), 1);
    assert_eq!(mock.calls_to(SEARCH_PATH), 1);

    let csv = std::fs::read_to_string(&report.csv_path).unwrap();
    assert_eq!(
        csv.lines().collect::<Vec<_>>(),
        vec![
            "drug_name,drug_id,disease_name,disease_id,pmid_count,total_articles",
            "metformin,@CHEMICAL_metformin,type 2 diabetes,@DISEASE_type_2_diabetes,3,3",
        ]
    );
    let reloaded = treatmap_pipeline::PipelineArtifact::read_json(&report.json_path).unwrap();
    assert_eq!(&reloaded, a);
    assert!(report.json_path.ends_with("pipeline_20260101_120000/pipeline_20260101_120000.json"));
}

#[tokio::test(start_paused = true)]
async fn test_entity_without_relations_is_dropped_and_never_searched() {
    let mock = Arc::new(
        MockTransport::new()
            .with_autocomplete(
                "metformin",
                &[("metformin", METFORMIN), ("metformin hydrochloride", "@CHEMICAL_metformin_hcl")],
            )
            .with_relations(METFORMIN, &[(METFORMIN, T2D, 50)])
            .with_relations("@CHEMICAL_metformin_hcl", &[])
            .with_search(METFORMIN, T2D, &[(&["1"], 1)]),
    );
    let (report, _dir) = run(&mock, PipelineConfig::default(), &["metformin"]).await;
    let a = &report.artifact;

    assert_eq!(
        a.dropped,
        vec![DropRecord {
            seed: "metformin".into(),
            entity_id: Some("@CHEMICAL_metformin_hcl".into()),
            reason: DropReason::NoRelations,
        }]
    );
    assert_eq!(a.indications.len(), 1);
    assert_eq!(mock.calls_to(RELATIONS_PATH), 2);
    assert_eq!(mock.search_calls_mentioning("@CHEMICAL_metformin_hcl"), 0);
    assert_eq!(mock.search_calls_mentioning(METFORMIN), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unresolved_seed_is_dropped_after_lowercase_retry() {
    let mock = Arc::new(
        MockTransport::new()
            .with_autocomplete("metformin", &[("metformin", METFORMIN)])
            .with_relations(METFORMIN, &[(METFORMIN, T2D, 50)]),
    );
    let (report, _dir) = run(&mock, PipelineConfig::default(), &["Xyzzyamine", "METFORMIN"]).await;
    let a = &report.artifact;

    assert_eq!(
        a.dropped,
        vec![DropRecord { seed: "Xyzzyamine".into(), entity_id: None, reason: DropReason::Unresolved }]
    );
    assert!(a.indications.iter().all(|i| i.seed != "Xyzzyamine"));

    // "METFORMIN" resolves through its lowercase form
    assert_eq!(a.resolutions.len(), 1);
    assert_eq!(a.resolutions[0].seed, "METFORMIN");
    assert_eq!(a.resolutions[0].entity_ids, vec![METFORMIN]);

    let queries: Vec<String> = mock
        .calls()
        .iter()
        .filter(|c| c.path == AUTOCOMPLETE_PATH)
        .filter_map(|c| c.param("query").map(String::from))
        .collect();
    assert_eq!(queries, vec!["Xyzzyamine", "xyzzyamine", "METFORMIN", "metformin"]);
    assert!(mock.calls().iter().filter(|c| c.path == AUTOCOMPLETE_PATH).all(|c| c.param("concept") == Some("CHEMICAL")));
}

#[tokio::test(start_paused = true)]
async fn test_pmids_are_deduplicated_and_capped() {
    let mock = Arc::new(
        MockTransport::new()
            .with_autocomplete("metformin", &[("metformin", METFORMIN)])
            .with_relations(METFORMIN, &[(METFORMIN, T2D, 50)])
            .with_search(
                METFORMIN,
                T2D,
                &[(&["1", "2", "2"], 9), (&["3", "1", "4"], 9), (&["5", "6", "7"], 9)],
            ),
    );
    let cfg = PipelineConfig { max_pmids: 4, ..Default::default() };
    let (report, _dir) = run(&mock, cfg, &["metformin"]).await;
    let ev = &report.artifact.indications[0].evidence[0];

    assert_eq!(ev.pmids, vec!["1", "2", "3", "4"]);
    assert_eq!(ev.total_articles, 9);
    assert_eq!(ev.pages_fetched, 2);
    assert_eq!(report.artifact.limits.max_pmids, 4);
}

#[tokio::test(start_paused = true)]
async fn test_disease_anchor_records_drug_and_disease_ids() {
    let mock = Arc::new(
        MockTransport::new()
            .with_autocomplete("type 2 diabetes", &[("type 2 diabetes", T2D)])
            .with_relations(T2D, &[(METFORMIN, T2D, 50), ("@CHEMICAL_glyburide", T2D, 20)])
            .with_search(METFORMIN, T2D, &[(&["1"], 1)])
            .with_search("@CHEMICAL_glyburide", T2D, &[(&["2"], 1)]),
    );
    let cfg = PipelineConfig { anchor: ConceptKind::Disease, ..Default::default() };
    let (report, _dir) = run(&mock, cfg, &["type 2 diabetes"]).await;
    let a = &report.artifact;

    assert_eq!(mock.calls()[0].param("concept"), Some("DISEASE"));
    assert_eq!(mock.calls()[1].param("e2"), Some("chemical"));
    assert_eq!(a.indications[0].counterpart_ids, vec![METFORMIN, "@CHEMICAL_glyburide"]);
    let pairs: Vec<(&str, &str)> = a.indications[0]
        .evidence
        .iter()
        .map(|e| (e.drug_id.as_str(), e.disease_id.as_str()))
        .collect();
    assert_eq!(pairs, vec![(METFORMIN, T2D), ("@CHEMICAL_glyburide", T2D)]);
    assert_eq!(
        a.chat_lines(),
        vec!["metformin treats type 2 diabetes. PMIDs: 1", "glyburide treats type 2 diabetes. PMIDs: 2"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failing_calls_do_not_abort_the_run() {
    let mock = Arc::new(
        MockTransport::new()
            .with_autocomplete("metformin", &[("metformin", METFORMIN)])
            .with_relations(METFORMIN, &[(METFORMIN, T2D, 50)])
            .fail_with_status(SEARCH_PATH, 500, 3),
    );
    let (report, _dir) = run(&mock, PipelineConfig::default(), &["metformin"]).await;
    let ev = &report.artifact.indications[0].evidence[0];
    assert!(ev.pmids.is_empty());
    assert_eq!(ev.total_articles, 0);
    assert!(report.csv_path.exists());
}

#[tokio::test(start_paused = true)]
async fn test_strict_client_still_keeps_partial_evidence() {
    let mock = Arc::new(
        MockTransport::new()
            .with_autocomplete("metformin", &[("metformin", METFORMIN)])
            .with_relations(METFORMIN, &[(METFORMIN, T2D, 50)])
            .with_search(METFORMIN, T2D, &[(&["1", "2"], 6), (&["3", "4"], 6), (&["5", "6"], 6)])
            .pass_through(SEARCH_PATH, 1)
            .fail_with_status(SEARCH_PATH, 400, 1),
    );
    let dir = tempfile::tempdir().unwrap();
    let client = PubTatorClient::new(mock.clone(), &PubTatorConfig::default()).with_strict(true);
    let ctx = RunContext::with_run_id(dir.path(), "20260101_120000", Local::now()).unwrap();
    let report = Pipeline::new(client, PipelineConfig::default())
        .run(&StaticSeeds::new(["metformin"]), &ctx)
        .await
        .unwrap();

    let ev = &report.artifact.indications[0].evidence[0];
    assert_eq!(ev.pmids, vec!["1", "2"]);
    assert_eq!(ev.total_articles, 6);
    assert_eq!(ev.pages_fetched, 1);
}
