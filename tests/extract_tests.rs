//! End-to-end extraction against an in-memory object store.

mod common;

use crate::common::{funded, Harness, BASE, OTHER, TARGET};
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use org_pub_ids::records::{output_rows, PublicationRecord};
use org_pub_ids::{ExtractError, ExtractOptions, MissingPartition, PartitionDiscovery};

// =============================================================================
// Test Helpers
// =============================================================================

/// Two years, each written once in integer form and once in float form.
async fn seed_two_years(harness: &Harness) {
    harness
        .put_partition(
            "year=2019",
            "part-0.parquet",
            &[funded("10.1/2019-a", Some("19001"), &[TARGET]), funded("10.1/2019-b", Some("19002"), &[OTHER])],
        )
        .await;
    harness
        .put_partition(
            "year=2019.0",
            "part-0.parquet",
            &[funded("10.1/2019f-a", Some("19101"), &[OTHER])],
        )
        .await;
    harness
        .put_partition(
            "year=2020",
            "part-0.parquet",
            &[funded("10.1/2020-a", Some("20001"), &[TARGET]), funded("10.1/2020-b", Some("20002"), &[OTHER])],
        )
        .await;
    harness
        .put_partition(
            "year=2020.0",
            "part-0.parquet",
            &[funded("10.1/2020f-a", Some("20101"), &[OTHER])],
        )
        .await;
}

fn skip_missing() -> ExtractOptions {
    ExtractOptions {
        on_missing: MissingPartition::Skip,
        ..ExtractOptions::default()
    }
}

async fn object_bytes(harness: &Harness, key: &str) -> Vec<u8> {
    harness
        .store
        .get(&ObjectPath::from(key))
        .await
        .expect("get output")
        .bytes()
        .await
        .expect("read output")
        .to_vec()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn merges_matching_rows_in_visitation_order() {
    let harness = Harness::new();
    seed_two_years(&harness).await;

    let merged = harness
        .pipeline(ExtractOptions::default())
        .extract(BASE, 2019, 2020, TARGET)
        .await
        .unwrap();

    let rows = output_rows(&merged).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.grid_id.as_deref() == Some(TARGET)));
    assert_eq!(rows[0].doi.as_deref(), Some("10.1/2019-a"));
    assert_eq!(rows[1].doi.as_deref(), Some("10.1/2020-a"));
    assert_eq!(rows[1].pmcid.as_deref(), Some("PMC20001"));
}

#[tokio::test]
async fn multi_funded_record_and_missing_pmid() {
    let harness = Harness::new();
    harness
        .put_partition(
            "year=2018",
            "part-0.parquet",
            &[
                funded("10.1/both", Some("1"), &[OTHER, TARGET, TARGET]),
                funded("10.1/no-pmid", None, &[TARGET]),
                PublicationRecord {
                    doi: Some("10.1/unfunded".into()),
                    funding: Some(vec![]),
                    pmid: Some("3".into()),
                    pmcid: None,
                },
            ],
        )
        .await;

    let merged = harness
        .pipeline(skip_missing())
        .extract(BASE, 2018, 2018, TARGET)
        .await
        .unwrap();

    let rows = output_rows(&merged).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.doi.as_deref() == Some("10.1/both")));
    assert!(rows.iter().all(|r| r.pmid.is_some()));
}

#[tokio::test]
async fn objects_within_a_partition_are_read_in_path_order() {
    let harness = Harness::new();
    harness
        .put_partition("year=2019", "part-1.parquet", &[funded("10.1/second", Some("2"), &[TARGET])])
        .await;
    harness
        .put_partition("year=2019", "part-0.parquet", &[funded("10.1/first", Some("1"), &[TARGET])])
        .await;
    harness
        .put_partition("year=2019", "_SUCCESS", &[funded("10.1/marker", Some("9"), &[TARGET])])
        .await;

    let merged = harness
        .pipeline(skip_missing())
        .extract(BASE, 2019, 2019, TARGET)
        .await
        .unwrap();

    let dois: Vec<String> = output_rows(&merged)
        .unwrap()
        .into_iter()
        .filter_map(|r| r.doi)
        .collect();
    assert_eq!(dois, vec!["10.1/first", "10.1/second"]);
}

#[tokio::test]
async fn missing_partition_fails_by_default() {
    let harness = Harness::new();
    harness
        .put_partition("year=2019", "part-0.parquet", &[funded("10.1/a", Some("1"), &[TARGET])])
        .await;

    let err = harness
        .pipeline(ExtractOptions::default())
        .extract(BASE, 2019, 2019, TARGET)
        .await
        .unwrap_err();

    match err {
        ExtractError::PartitionNotFound { location } => assert_eq!(location, "s3://corpus/pubs/year=2019.0/"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_partition_can_be_skipped() {
    let harness = Harness::new();
    harness
        .put_partition("year=2019.0", "part-0.parquet", &[funded("10.1/a", Some("1"), &[TARGET])])
        .await;

    let merged = harness
        .pipeline(skip_missing())
        .extract(BASE, 2019, 2020, TARGET)
        .await
        .unwrap();

    assert_eq!(merged.num_rows(), 1);
}

#[tokio::test]
async fn listing_discovery_only_visits_existing_partitions() {
    let harness = Harness::new();
    harness
        .put_partition("year=2019.0", "part-0.parquet", &[funded("10.1/a", Some("1"), &[TARGET])])
        .await;
    harness
        .put_partition("year=2021", "part-0.parquet", &[funded("10.1/b", Some("2"), &[TARGET])])
        .await;
    harness
        .put_partition("year=2030", "part-0.parquet", &[funded("10.1/late", Some("3"), &[TARGET])])
        .await;

    let pipeline = harness.pipeline(ExtractOptions {
        discovery: PartitionDiscovery::List,
        ..ExtractOptions::default()
    });

    let locations = pipeline.locations(BASE, 2019, 2021).await.unwrap();
    assert_eq!(locations, vec!["s3://corpus/pubs/year=2019.0/", "s3://corpus/pubs/year=2021/"]);

    let merged = pipeline.extract(BASE, 2019, 2021, TARGET).await.unwrap();
    let dois: Vec<String> = output_rows(&merged)
        .unwrap()
        .into_iter()
        .filter_map(|r| r.doi)
        .collect();
    assert_eq!(dois, vec!["10.1/a", "10.1/b"]);
}

#[tokio::test]
async fn no_matches_writes_empty_table() {
    let harness = Harness::new();
    seed_two_years(&harness).await;

    let (written, rows) = harness
        .pipeline(ExtractOptions::default())
        .extract_to(BASE, "s3://corpus/out/empty.parquet", 2019, 2020, "grid.0000.0")
        .await
        .unwrap();
    assert_eq!(rows, 0);
    assert_eq!(written, "s3://corpus/out/empty.parquet");

    let batches = harness
        .gateway
        .read(&written, &["doi", "grid_id", "pmid", "pmcid"])
        .await
        .unwrap();
    assert!(batches.iter().all(|b| b.num_rows() == 0));
}

#[tokio::test]
async fn repeated_runs_write_identical_bytes() {
    let harness = Harness::new();
    seed_two_years(&harness).await;
    let pipeline = harness.pipeline(ExtractOptions::default());

    for out in ["s3://corpus/out/run-1.parquet", "s3://corpus/out/run-2.parquet"] {
        pipeline.extract_to(BASE, out, 2019, 2020, TARGET).await.unwrap();
    }

    let first = object_bytes(&harness, "out/run-1.parquet").await;
    let second = object_bytes(&harness, "out/run-2.parquet").await;
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[tokio::test]
async fn concurrent_reads_match_sequential_output() {
    let harness = Harness::new();
    seed_two_years(&harness).await;

    let sequential = harness
        .pipeline(ExtractOptions::default())
        .extract(BASE, 2019, 2020, TARGET)
        .await
        .unwrap();
    let concurrent = harness
        .pipeline(ExtractOptions {
            max_concurrent_reads: 4,
            transform_threads: Some(2),
            ..ExtractOptions::default()
        })
        .extract(BASE, 2019, 2020, TARGET)
        .await
        .unwrap();

    assert_eq!(sequential, concurrent);
}

#[tokio::test]
async fn directory_output_gets_part_file() {
    let harness = Harness::new();
    seed_two_years(&harness).await;

    let (written, rows) = harness
        .pipeline(ExtractOptions::default())
        .extract_to(BASE, "s3://corpus/out/", 2019, 2020, TARGET)
        .await
        .unwrap();

    assert_eq!(rows, 2);
    assert_eq!(written, "s3://corpus/out/part-00000.parquet");
    assert!(!object_bytes(&harness, "out/part-00000.parquet").await.is_empty());
}
