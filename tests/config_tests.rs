use loqa_calls::config::Config;
use loqa_calls::turn_taking::TimingProfiles;
use std::time::Duration;
use tempfile::TempDir;

fn write_config(dir: &TempDir, contents: &str) -> String {
    let path = dir.path().join("loqa-calls.toml");
    std::fs::write(&path, contents).unwrap();
    path.to_string_lossy().to_string()
}

#[test]
fn test_partial_file_keeps_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[audit]
batch_size = 10

[conversation]
utc_offset = "-05:00"
"#,
    );

    let cfg = Config::load(&path).unwrap();
    assert_eq!(cfg.audit.batch_size, 10);
    assert_eq!(cfg.audit.fallback_capacity, 1_000);
    assert_eq!(cfg.conversation.utc_offset, "-05:00");
    assert_eq!(cfg.conversation.max_tool_rounds, 4);
    assert_eq!(cfg.prefetch.max_concurrent, 3);
    assert_eq!(cfg.prefetch.timeout(), Duration::from_millis(4_000));
    assert_eq!(cfg.service.http.port, 3030);
    assert_eq!(cfg.nats.events_subject, "calls.events");
}

#[test]
fn test_workflow_profiles_override_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[turn_taking]
silence_ms = 5000

[turn_taking.profiles.intake]
silence_ms = 12000
"#,
    );

    let cfg = Config::load(&path).unwrap();
    let profiles = TimingProfiles::from_config(&cfg.turn_taking);

    let intake = profiles.resolve(Some("intake"));
    assert_eq!(intake.silence, Duration::from_millis(12_000));
    assert_eq!(intake.timeout, Duration::from_millis(20_000));

    let default = profiles.resolve(Some("booking"));
    assert_eq!(default.silence, Duration::from_millis(5_000));
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent");
    assert!(Config::load(&path.to_string_lossy()).is_err());
}

#[test]
fn test_bundled_config_loads() {
    let cfg = Config::load("config/loqa-calls").unwrap();
    assert_eq!(cfg.service.name, "loqa-calls");
    assert_eq!(cfg.nats.model_subject, "llm.chat");
    assert!(cfg.turn_taking.profiles.contains_key("intake"));
}
