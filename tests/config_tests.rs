//! Configuration loading, environment overrides and building cores from config.

mod common;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use common::{keyed, payload_key, wait_until, CollectingHandler};
use conduit_core::config::{ConfigLoader, ConfigurationError};
use conduit_core::consumer::{ConsumerCore, HandlerErrorPolicy};
use conduit_core::messaging::{InMemoryBroker, Pushable};
use conduit_core::producer::ProducerCore;
use tempfile::Builder;

fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

const FULL_YAML: &str = r#"
topic: notify:email
processors: 2
fetch_workers: 1
channel_capacity: 64
batch_process:
  batch: 2
  timeout_ms: 5000
backoff:
  immediate_retries: 5
  base_delay_ms: 50
  max_delay_ms: 2000
  multiplier: 1.5
on_handler_error: escalate
drop_expired: true
shutdown_timeout_ms: 1500
"#;

#[test]
fn test_full_yaml_round_trip() {
    let file = write_config(".yaml", FULL_YAML);
    let config = ConfigLoader::load_file_without_env(file.path()).unwrap();

    assert_eq!(config.topic, "notify:email");
    assert_eq!(config.processors, 2);
    assert_eq!(config.fetch_workers, Some(1));
    assert_eq!(config.channel_capacity, 64);
    assert_eq!(config.batch_window().batch_size, 2);
    assert_eq!(config.batch_window().timeout, Duration::from_secs(5));
    assert_eq!(config.backoff_policy().immediate_retries, 5);
    assert_eq!(config.backoff_policy().base_delay, Duration::from_millis(50));
    assert_eq!(config.on_handler_error, HandlerErrorPolicy::Escalate);
    assert!(config.drop_expired);
    assert_eq!(config.shutdown_timeout(), Duration::from_millis(1500));
}

#[test]
fn test_environment_overrides_file_values() {
    let file = write_config(".yaml", "topic: from-file\nprocessors: 2\n");

    std::env::set_var("CONDUIT__PROCESSORS", "9");
    std::env::set_var("CONDUIT__BATCH_PROCESS__BATCH", "5");
    let loaded = ConfigLoader::load_file(file.path());
    std::env::remove_var("CONDUIT__PROCESSORS");
    std::env::remove_var("CONDUIT__BATCH_PROCESS__BATCH");

    let config = loaded.unwrap();
    assert_eq!(config.topic, "from-file");
    assert_eq!(config.processors, 9);
    assert_eq!(config.batch_process.batch, 5);
}

#[test]
fn test_invalid_values_fail_fast() {
    let file = write_config(".yaml", "topic: t\nprocessors: 0\n");
    let err = ConfigLoader::load_file_without_env(file.path()).unwrap_err();
    assert!(matches!(err, ConfigurationError::InvalidValue { .. }));

    let file = write_config(".json", r#"{"topic": "t", "backoff": {"multiplier": 0.5}}"#);
    let err = ConfigLoader::load_file_without_env(file.path()).unwrap_err();
    assert!(matches!(err, ConfigurationError::InvalidValue { .. }));
}

#[test]
fn test_zero_batch_only_matters_with_windowed_stage() {
    let file = write_config(".yaml", "topic: t\nbatch_process:\n  batch: 0\n");
    let config = ConfigLoader::load_file_without_env(file.path()).unwrap();

    assert!(ProducerCore::from_config(&config).is_ok());
    assert!(ConsumerCore::builder_from_config(&config, CollectingHandler::new())
        .build()
        .is_ok());

    let err = ConsumerCore::builder_from_config(&config, CollectingHandler::new())
        .deduplicate(payload_key)
        .build()
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::InvalidValue { .. }));
}

#[tokio::test]
async fn test_cores_built_from_loaded_config_work_together() {
    let file = write_config(
        ".yaml",
        "topic: orders\nprocessors: 1\nbatch_process:\n  batch: 3\n  timeout_ms: 10000\n",
    );
    let config = ConfigLoader::load_file_without_env(file.path()).unwrap();

    let broker = Arc::new(InMemoryBroker::new("orders"));
    let producer = ProducerCore::from_config(&config).unwrap();
    for key in ["a", "b", "a"] {
        producer.send(broker.as_ref(), keyed(key, "")).await.unwrap();
    }
    assert_eq!(broker.len(), 3);

    let handler = CollectingHandler::new();
    let core = ConsumerCore::builder_from_config(&config, handler.clone())
        .deduplicate(payload_key)
        .build()
        .unwrap();

    let handle = core.spawn(broker.clone());
    assert!(wait_until(Duration::from_secs(5), || handler.count() == 2).await);
    handle.shutdown_and_join(config.shutdown_timeout()).await.unwrap();

    let payloads: Vec<String> = handler
        .messages()
        .iter()
        .map(|message| message.decode().unwrap())
        .collect();
    assert_eq!(payloads, vec!["a", "b"]);

    // Nothing else may sneak in after the drain
    broker.push(&keyed("late", "late")).await.unwrap();
    assert_eq!(handler.count(), 2);
}
