//! Config module tests

use std::time::Duration;

use super::*;

#[test]
fn test_substitute_env_vars_simple() {
    std::env::set_var("VL_TEST_VAR_SIMPLE", "hello");
    let result = substitute_env_vars("value = \"${VL_TEST_VAR_SIMPLE}\"");
    assert_eq!(result, "value = \"hello\"");
    std::env::remove_var("VL_TEST_VAR_SIMPLE");
}

#[test]
fn test_substitute_env_vars_with_default() {
    std::env::remove_var("VL_TEST_VAR_UNSET");
    let result = substitute_env_vars("value = \"${VL_TEST_VAR_UNSET:-fallback}\"");
    assert_eq!(result, "value = \"fallback\"");

    std::env::set_var("VL_TEST_VAR_SET", "env_value");
    let result = substitute_env_vars("value = \"${VL_TEST_VAR_SET:-fallback}\"");
    assert_eq!(result, "value = \"env_value\"");
    std::env::remove_var("VL_TEST_VAR_SET");
}

#[test]
fn test_substitute_env_vars_missing_no_default() {
    std::env::remove_var("VL_TEST_VAR_MISSING");
    let result = substitute_env_vars("value = \"${VL_TEST_VAR_MISSING}\"");
    assert_eq!(result, "value = \"\"");
}

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.log.level, "info");
    assert!(!config.metrics.enabled);
    assert_eq!(config.metrics.bind.port(), 9464);
    assert!(config.bridge.is_empty());
}

#[test]
fn test_parse_bridge_config() {
    let toml = r##"
[log]
level = "debug"

[[bridge]]
name = "orders-mq"
kind = "queue_manager"
url = "mq://mq.example.com"
username = "app"
poll_interval = "2s"
receive_timeout = "100ms"

[bridge.options]
queue_manager = "QM1"

[[bridge.links]]
local = "local.orders"
remote = "ORDERS.IN"
direction = "in"

[[bridge.links]]
local = "shipments/#"
remote = "SHIPMENTS.OUT"
direction = "out"

[[bridge]]
name = "alerts"
kind = "notification"
url = "https://sns.eu-west-1.amazonaws.com"
enabled = false

[bridge.options]
topic_arn = "arn:aws:sns:eu-west-1:123456789012:alerts"
"##;

    let config = Config::parse(toml).unwrap();
    assert_eq!(config.log.level, "debug");
    assert_eq!(config.bridge.len(), 2);

    let mq = &config.bridge[0];
    assert_eq!(mq.kind, BridgeKind::QueueManager);
    assert_eq!(mq.parse_url(), ("mq.example.com".to_string(), 1414));
    assert_eq!(mq.poll_interval, Duration::from_secs(2));
    assert_eq!(mq.receive_timeout, Duration::from_millis(100));
    assert_eq!(mq.connect_timeout, Duration::from_secs(30));
    assert_eq!(mq.option("queue_manager").as_deref(), Some("QM1"));
    assert_eq!(mq.inbound_links().count(), 1);
    assert_eq!(mq.outbound_links().count(), 1);

    let sns = &config.bridge[1];
    assert!(!sns.enabled);
    assert_eq!(config.enabled_bridges().count(), 1);
}

#[test]
fn test_option_value_types() {
    let toml = r#"
[[bridge]]
name = "log"
kind = "pubsub"
url = "pulsar://localhost"

[bridge.options]
subscription_name = "vibelink"
batching = true
max_pending = 500
ratio = 0.5
"#;

    let config = Config::parse(toml).unwrap();
    let options = &config.bridge[0].options;
    assert_eq!(options["batching"], OptionValue::Boolean(true));
    assert_eq!(options["max_pending"], OptionValue::Integer(500));
    assert_eq!(options["ratio"], OptionValue::Float(0.5));
    assert_eq!(config.bridge[0].option("max_pending").as_deref(), Some("500"));
}

#[test]
fn test_duplicate_bridge_name() {
    let toml = r#"
[[bridge]]
name = "a"
url = "localhost"

[[bridge]]
name = "a"
url = "localhost"
"#;
    assert!(matches!(
        Config::parse(toml),
        Err(ConfigError::Validation(msg)) if msg.contains("duplicate")
    ));
}

#[test]
fn test_filter_on_outbound_link_rejected() {
    let toml = r#"
[[bridge]]
name = "a"
url = "localhost"

[[bridge.links]]
local = "orders"
direction = "out"
filter = "qty > 1"
"#;
    assert!(matches!(Config::parse(toml), Err(ConfigError::Validation(_))));
}

#[test]
fn test_wildcard_inbound_link_rejected() {
    let toml = r#"
[[bridge]]
name = "a"
url = "localhost"

[[bridge.links]]
local = "orders/#"
remote = "ORDERS"
direction = "in"
"#;
    assert!(matches!(Config::parse(toml), Err(ConfigError::Validation(_))));
}

#[test]
fn test_empty_link_name_rejected() {
    let toml = r#"
[[bridge]]
name = "a"
url = "localhost"

[[bridge.links]]
local = ""
"#;
    assert!(matches!(Config::parse(toml), Err(ConfigError::Validation(_))));
}

#[test]
fn test_receive_timeout_must_fit_poll_interval() {
    let toml = r#"
[[bridge]]
name = "a"
kind = "queue_manager"
url = "localhost"
poll_interval = "1s"
receive_timeout = "1s"
"#;
    assert!(matches!(Config::parse(toml), Err(ConfigError::Validation(_))));

    let toml = r#"
[[bridge]]
name = "a"
kind = "queue_manager"
url = "localhost"
poll_interval = "0s"
"#;
    assert!(matches!(Config::parse(toml), Err(ConfigError::Validation(_))));
}

#[test]
fn test_load_config_with_env_substitution() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("vibelink.toml");

    std::env::set_var("VL_TEST_MQ_HOST", "mq.internal");

    let config_content = r#"
[[bridge]]
name = "mq"
kind = "queue_manager"
url = "mq://${VL_TEST_MQ_HOST}:${VL_TEST_MQ_PORT:-1420}"

[bridge.options]
queue_manager = "${VL_TEST_QM:-QM1}"
"#;

    std::fs::write(&config_path, config_content).unwrap();

    let config = Config::load(&config_path).unwrap();
    assert_eq!(config.bridge.len(), 1);
    assert_eq!(
        config.bridge[0].parse_url(),
        ("mq.internal".to_string(), 1420)
    );
    assert_eq!(config.bridge[0].option("queue_manager").as_deref(), Some("QM1"));

    std::env::remove_var("VL_TEST_MQ_HOST");
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.log.level, "info");
    assert!(config.bridge.is_empty());
}
