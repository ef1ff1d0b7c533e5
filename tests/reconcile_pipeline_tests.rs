use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cp7_recon::{
    AppConfig, CanonicalKey, HttpLookupClient, LocalityMatch, LookupOutcome, PersistStatus,
    PostalLookup, ReconError, Reconciler, TableStore, Value, normalize,
};
use httpmock::prelude::*;
use serde_json::json;
use tempfile::TempDir;

const SUCCESS: &str = "codigo_postal_base";
const ERRORS: &str = "codigo_postal_erro_404";

/// Answers from a fixed table and records every key it was asked about.
#[derive(Default)]
struct ScriptedLookup {
    answers: HashMap<String, Answer>,
    asked: Mutex<Vec<String>>,
}

#[derive(Clone)]
enum Answer {
    Found(&'static str, &'static str),
    NotFound,
    Status(u16),
}

impl ScriptedLookup {
    fn with(mut self, key: &str, answer: Answer) -> Self {
        self.answers.insert(key.to_string(), answer);
        self
    }
}

#[async_trait]
impl PostalLookup for ScriptedLookup {
    async fn lookup(&self, key: &CanonicalKey) -> LookupOutcome {
        self.asked.lock().unwrap().push(key.to_string());
        match self.answers.get(key.as_str()).cloned() {
            Some(Answer::Found(locality, region)) => LookupOutcome::Found(LocalityMatch {
                key: key.clone(),
                baseline_key: key.to_string(),
                locality: locality.to_string(),
                region: region.to_string(),
            }),
            Some(Answer::NotFound) => LookupOutcome::NotFound { key: key.clone() },
            Some(Answer::Status(status)) => LookupOutcome::OtherError {
                key: key.clone(),
                status: Some(status),
            },
            None => LookupOutcome::OtherError {
                key: key.clone(),
                status: None,
            },
        }
    }
}

fn config(dir: &Path, concurrency: usize) -> AppConfig {
    let vars: HashMap<&str, String> = HashMap::from([
        ("BASE_URL", "http://lookup.invalid/cp".to_string()),
        ("STORE_PATH", dir.join("store.snapshot").display().to_string()),
        ("SOURCE_DIR", dir.display().to_string()),
        ("SOURCE_PATTERN", "cp7_*.csv".to_string()),
        ("LOOKUP_CONCURRENCY", concurrency.to_string()),
    ]);
    AppConfig::from_vars(|name| vars.get(name).cloned()).unwrap()
}

fn write_source(dir: &Path, codes: &[&str]) {
    let mut content = String::from("CP7,Localidade\n");
    for code in codes {
        content.push_str(&format!("{code},x\n"));
    }
    std::fs::write(dir.join("cp7_data.csv"), content).unwrap();
}

fn text_rows(rows: &[Vec<Value>]) -> Vec<Vec<Option<String>>> {
    rows.iter()
        .map(|row| row.iter().map(|v| v.as_text().map(str::to_string)).collect())
        .collect()
}

#[tokio::test]
async fn test_end_to_end_found_and_not_found() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), &["1000-100", "9999-999"]);
    let config = config(dir.path(), 1);

    let lookup = Arc::new(
        ScriptedLookup::default()
            .with("1000100", Answer::Found("Lisboa", "Lisboa"))
            .with("9999999", Answer::NotFound),
    );
    let store = Arc::new(TableStore::open(&config.store_path).unwrap());
    let summary = Reconciler::new(&config, lookup.clone(), store.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.records, 2);
    assert_eq!(summary.found, 1);
    assert_eq!(summary.not_found, 1);
    assert_eq!(summary.other_errors, 0);
    assert_eq!(*lookup.asked.lock().unwrap(), vec!["1000100", "9999999"]);

    let success = store.table(SUCCESS).await.unwrap();
    assert_eq!(
        success.columns(),
        &["codigo_postal_clean", "codigo_postal_baseline", "concelho", "distrito"]
    );
    assert_eq!(
        text_rows(success.rows()),
        vec![vec![
            None,
            Some("1000100".to_string()),
            Some("Lisboa".to_string()),
            Some("Lisboa".to_string()),
        ]]
    );

    let errors = store.table(ERRORS).await.unwrap();
    assert_eq!(
        text_rows(errors.rows()),
        vec![vec![Some("9999999".to_string()), None]]
    );

    // The snapshot on disk carries the same tables
    let reopened = TableStore::open(&config.store_path).unwrap();
    assert_eq!(reopened.table(ERRORS).await.unwrap().row_count(), 1);
}

#[tokio::test]
async fn test_other_error_is_discarded_and_does_not_stop_the_run() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), &["1111-111", "1000-100", "2222-222", "9999-999"]);
    let config = config(dir.path(), 2);

    let lookup = Arc::new(
        ScriptedLookup::default()
            .with("1111111", Answer::Status(500))
            .with("1000100", Answer::Found("Lisboa", "Lisboa"))
            .with("9999999", Answer::NotFound),
    );
    let store = Arc::new(TableStore::in_memory());
    let summary = Reconciler::new(&config, lookup.clone(), store.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.records, 4);
    assert_eq!(summary.other_errors, 2);
    assert_eq!(summary.found + summary.not_found + summary.other_errors, 4);
    assert_eq!(lookup.asked.lock().unwrap().len(), 4);

    let success = store.table(SUCCESS).await.unwrap();
    let errors = store.table(ERRORS).await.unwrap();
    assert_eq!(success.row_count(), 1);
    assert_eq!(errors.row_count(), 1);
    for table in [&success, &errors] {
        for row in table.rows() {
            assert!(!row.contains(&Value::text("1111111")));
            assert!(!row.contains(&Value::text("2222222")));
        }
    }
}

#[tokio::test]
async fn test_run_without_not_found_keeps_previous_error_table() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), 1);
    let store = Arc::new(TableStore::open(&config.store_path).unwrap());

    write_source(dir.path(), &["9999-999"]);
    let first = Arc::new(ScriptedLookup::default().with("9999999", Answer::NotFound));
    Reconciler::new(&config, first, store.clone())
        .run()
        .await
        .unwrap();

    write_source(dir.path(), &["1000-100"]);
    let second = Arc::new(ScriptedLookup::default().with("1000100", Answer::Found("Lisboa", "Lisboa")));
    let summary = Reconciler::new(&config, second, store.clone())
        .run()
        .await
        .unwrap();

    let error_report = summary.tables.iter().find(|r| r.table == ERRORS).unwrap();
    assert_eq!(error_report.status, PersistStatus::Skipped);

    let errors = store.table(ERRORS).await.unwrap();
    assert_eq!(text_rows(errors.rows()), vec![vec![Some("9999999".to_string()), None]]);
}

#[tokio::test]
async fn test_missing_source_fails_before_any_lookup() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), 1);
    let lookup = Arc::new(ScriptedLookup::default());

    let err = Reconciler::new(&config, lookup.clone(), Arc::new(TableStore::in_memory()))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, ReconError::SourceNotFound(_)));
    assert!(lookup.asked.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_source_without_code_column_is_rejected() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("cp7_data.csv"), "CP4,CP3\n1000,100\n").unwrap();
    let config = config(dir.path(), 1);

    let err = Reconciler::new(
        &config,
        Arc::new(ScriptedLookup::default()),
        Arc::new(TableStore::in_memory()),
    )
    .run()
    .await
    .unwrap_err();

    assert!(matches!(err, ReconError::MissingColumn(c) if c == "CP7"));
}

/// Answers slower for earlier keys so responses complete out of order.
struct SlowFirstLookup;

#[async_trait]
impl PostalLookup for SlowFirstLookup {
    async fn lookup(&self, key: &CanonicalKey) -> LookupOutcome {
        let n: u64 = key.as_str()[..1].parse().unwrap();
        tokio::time::sleep(Duration::from_millis(10 * (10 - n))).await;
        if n % 2 == 0 {
            LookupOutcome::NotFound { key: key.clone() }
        } else {
            LookupOutcome::Found(LocalityMatch {
                key: key.clone(),
                baseline_key: key.to_string(),
                locality: format!("L{n}"),
                region: "R".to_string(),
            })
        }
    }
}

#[tokio::test]
async fn test_bucket_order_is_stable_under_concurrency() {
    let dir = TempDir::new().unwrap();
    let codes = [
        "1000-000", "2000-000", "3000-000", "4000-000", "5000-000", "6000-000", "7000-000",
    ];
    write_source(dir.path(), &codes);
    let config = config(dir.path(), 8);

    let store = Arc::new(TableStore::in_memory());
    Reconciler::new(&config, Arc::new(SlowFirstLookup), store.clone())
        .run()
        .await
        .unwrap();

    let success = store.table(SUCCESS).await.unwrap();
    let localities: Vec<Option<String>> = text_rows(success.rows())
        .into_iter()
        .map(|row| row[2].clone())
        .collect();
    assert_eq!(
        localities,
        ["L1", "L3", "L5", "L7"].map(|s| Some(s.to_string())).to_vec()
    );

    let errors = store.table(ERRORS).await.unwrap();
    let keys: Vec<Option<String>> = text_rows(errors.rows())
        .into_iter()
        .map(|row| row[0].clone())
        .collect();
    assert_eq!(
        keys,
        [normalize("2000-000"), normalize("4000-000"), normalize("6000-000")]
            .map(|k| Some(k.into_inner()))
            .to_vec()
    );
}

#[tokio::test]
async fn test_pipeline_against_http_service() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/cp/1000100").query_param("json", "1");
            then.status(200).json_body(json!({
                "CP": "1000-100",
                "Concelho": "Lisboa",
                "Distrito": "Lisboa"
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/cp/9999999");
            then.status(404);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/cp/1111111");
            then.status(503);
        })
        .await;

    let dir = TempDir::new().unwrap();
    write_source(dir.path(), &["1000-100", "1111-111", "9999-999"]);
    let config = config(dir.path(), 4);

    let lookup = Arc::new(HttpLookupClient::new(&server.url("/cp")).unwrap());
    let store = Arc::new(TableStore::in_memory());
    let summary = Reconciler::new(&config, lookup, store.clone())
        .run()
        .await
        .unwrap();

    assert_eq!((summary.found, summary.not_found, summary.other_errors), (1, 1, 1));
    let success = store.table(SUCCESS).await.unwrap();
    assert_eq!(success.rows()[0][1], Value::text("1000-100"));
    let errors = store.table(ERRORS).await.unwrap();
    assert_eq!(errors.rows()[0][0], Value::text("9999999"));
}
