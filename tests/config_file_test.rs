use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use pixrelay::config::{ConfigLoader, RelayConfig};
use pixrelay::error::RelayError;
use pixrelay::orchestrator::Orchestrator;
use pixrelay::registry::CapabilityRegistry;
use pixrelay::types::ProviderKind;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn loads_providers_from_file_and_builds_an_orchestrator() {
    let file = write_config(
        r#"{
            "providers": [
                {"type": "openai", "api_key": "sk-1", "url": "https://images.example.com/v1",
                 "default_model": "gpt-image-1", "retry_count": 0},
                {"type": "doubao", "access_key_id": "AK", "secret_access_key": "SK",
                 "region": "cn-beijing", "timeout_secs": 120}
            ],
            "retry_base_delay_ms": 500,
            "fallback_to_default": false
        }"#,
    );

    let relay = RelayConfig::from_file(file.path()).await.unwrap();
    let mut loader = ConfigLoader::new();
    let configs = loader.load(&relay).unwrap();

    assert_eq!(configs.len(), 2);
    assert_eq!(configs[0].kind(), ProviderKind::OpenAi);
    assert_eq!(configs[0].url, "https://images.example.com/v1");
    assert_eq!(configs[0].retry_count, 0);
    assert_eq!(
        configs[0].openai().map(|s| s.default_model.as_str()),
        Some("gpt-image-1")
    );
    assert_eq!(configs[1].url, "https://visual.volcengineapi.com");
    assert_eq!(configs[1].timeout, Duration::from_secs(120));
    assert_eq!(configs[1].doubao().map(|s| s.region.as_str()), Some("cn-beijing"));

    let orchestrator = Orchestrator::builder()
        .with_default_adapters(Arc::new(CapabilityRegistry::new()))
        .configs(configs)
        .base_delay(relay.base_delay())
        .fallback_to_default(relay.fallback_to_default)
        .build();
    assert_eq!(orchestrator.base_delay(), Duration::from_millis(500));
    assert!(orchestrator.adapter(ProviderKind::OpenAi).is_some());
    assert!(orchestrator.adapter(ProviderKind::Doubao).is_some());

    // Reloading the same file issues fresh indices.
    let reloaded = loader
        .load(&RelayConfig::from_file(file.path()).await.unwrap())
        .unwrap();
    orchestrator.reload_configs(reloaded);
    let indices: Vec<usize> = orchestrator
        .configs_snapshot()
        .iter()
        .map(|c| c.index)
        .collect();
    assert_eq!(indices, vec![2, 3]);
}

#[tokio::test]
async fn missing_and_malformed_files_are_configuration_errors() {
    let err = RelayConfig::from_file("/definitely/not/here.json")
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::ConfigurationError(ref m) if m.contains("cannot read")));

    let file = write_config("{ not json");
    let err = RelayConfig::from_file(file.path()).await.unwrap_err();
    assert!(matches!(err, RelayError::ConfigurationError(ref m) if m.contains("invalid configuration")));

    let file = write_config(r#"{"providers": [{"type": "doubao", "access_key_id": "AK"}]}"#);
    assert!(RelayConfig::from_file(file.path()).await.is_err());
}
