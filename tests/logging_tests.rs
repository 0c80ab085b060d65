use wende::config::LoggingConfig;
use wende::logging::{
    LogContext, get_logger, get_logger_with_context, init_logging, parse_log_level,
};

#[test]
fn init_logging_writes_rolling_file_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = LoggingConfig {
        file: dir.path().join("wende.log").to_string_lossy().to_string(),
        console_output: false,
        json_format: true,
        ..LoggingConfig::default()
    };

    init_logging(&config).unwrap();
    get_logger("logging_test").info("hello");
    get_logger_with_context(LogContext::new("logging_test").with_session_id("s-1".into()))
        .warn("with session");

    // Second call is a no-op
    init_logging(&config).unwrap();

    if std::env::var_os("WENDE_DISABLE_FILE_LOG").is_some() {
        return;
    }
    let created = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .any(|e| e.file_name().to_string_lossy().starts_with("wende"));
    assert!(created);
}

#[test]
fn log_levels_are_case_insensitive() {
    assert_eq!(parse_log_level("trace").unwrap(), tracing::Level::TRACE);
    assert_eq!(parse_log_level("Warning").unwrap(), tracing::Level::WARN);
    assert!(parse_log_level("verbose").is_err());
}
