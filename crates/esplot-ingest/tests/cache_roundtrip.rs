//! Parse → cache → read-back behaviour across the whole ingest crate

use esplot_ingest::{CacheError, IngestError, Ingestor, ParseError};
use esplot_test_utils::{channel_file_json, path_string, sample_csv, write_json, write_text};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[tokio::test]
async fn reparse_after_removal_yields_equal_preview() {
    let dir = tempfile::tempdir().unwrap();
    let path = path_string(&write_json(
        dir.path(),
        "run.json",
        &channel_file_json(1, &["V1", "P1", "Q1"], 16),
    ));
    let cache_dir = dir.path().join("cache");
    let ingestor = Ingestor::new();

    let first = ingestor.parse(&path, &cache_dir).await.unwrap();
    ingestor.cache().remove_cache(&cache_dir).await.unwrap();
    assert!(!cache_dir.exists());

    let second = ingestor.parse(&path, &cache_dir).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn concurrent_reparse_of_same_target_stays_readable() {
    let dir = tempfile::tempdir().unwrap();
    let path = path_string(&write_json(
        dir.path(),
        "run.json",
        &channel_file_json(1, &["V1", "V2"], 64),
    ));
    let cache_dir = dir.path().join("cache");
    let ingestor = Ingestor::new();

    let (a, b) = tokio::join!(
        ingestor.parse(&path, &cache_dir),
        ingestor.parse(&path, &cache_dir)
    );
    assert_eq!(a.unwrap(), b.unwrap());

    let preview = ingestor.cache().read_preview(&cache_dir).await.unwrap();
    for descriptor in &preview.content.series {
        let values = ingestor
            .cache()
            .read_series(&cache_dir, &descriptor.id)
            .await
            .unwrap();
        assert_eq!(values.len(), 64);
    }
}

#[tokio::test]
async fn csv_preview_ids_resolve() {
    let dir = tempfile::tempdir().unwrap();
    let path = path_string(&write_text(
        dir.path(),
        "table.csv",
        &sample_csv(&["Voltage (kV)", "Current (A)", "Angle"], 10),
    ));
    let cache_dir = dir.path().join("cache");
    let ingestor = Ingestor::new();

    let preview = ingestor.parse(&path, &cache_dir).await.unwrap();
    for descriptor in &preview.content.series {
        let series = ingestor
            .cache()
            .read_channel_series(&cache_dir, &descriptor.id)
            .await
            .unwrap();
        assert_eq!(&series.channel.id, &descriptor.id);
        assert_eq!(series.channel.len(), series.x.len());
    }
}

#[tokio::test]
async fn failed_parse_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = path_string(&write_json(
        dir.path(),
        "future.json",
        &channel_file_json(7, &["V1"], 4),
    ));
    let cache_dir = dir.path().join("cache");

    let err = Ingestor::new().parse(&path, &cache_dir).await.unwrap_err();
    assert!(matches!(
        err,
        IngestError::Parse(ParseError::UnsupportedSchemaVersion { version: 7, .. })
    ));
    assert!(!cache_dir.exists());
}

#[tokio::test]
async fn series_of_unparsed_directory_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = Ingestor::new()
        .cache()
        .read_series(dir.path(), &esplot_test_utils::channel_id("V1"))
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::SeriesNotFound { .. }));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_preview_and_series_ids_agree(
        ids in prop::collection::btree_set("[A-Za-z][A-Za-z0-9 _\\[\\]-]{0,12}", 1..6),
        len in 1usize..20,
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        let path = path_string(&write_json(
            dir.path(),
            "run.json",
            &channel_file_json(1, &ids, len),
        ));
        let cache_dir = dir.path().join("cache");

        runtime.block_on(async {
            let ingestor = Ingestor::new();
            let preview = ingestor.parse(&path, &cache_dir).await.unwrap();

            let preview_ids: Vec<&str> =
                preview.content.series.iter().map(|s| s.id.as_str()).collect();
            prop_assert_eq!(&preview_ids, &ids);

            for descriptor in &preview.content.series {
                let values = ingestor
                    .cache()
                    .read_series(&cache_dir, &descriptor.id)
                    .await
                    .unwrap();
                prop_assert_eq!(values.len(), len);
            }

            let unknown = esplot_test_utils::channel_id("__not_a_series__");
            let missing = ingestor.cache().read_series(&cache_dir, &unknown).await;
            let is_not_found = matches!(missing, Err(CacheError::SeriesNotFound { .. }));
            prop_assert!(is_not_found);
            Ok::<(), TestCaseError>(())
        })?;
    }
}
