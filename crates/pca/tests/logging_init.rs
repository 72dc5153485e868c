use pca::Error;
use pca::config::LoggingConfig;

#[test]
fn second_init_is_an_error_not_a_panic() {
    let config = LoggingConfig::default();
    let first = pca::logging::init(&config);
    // RUST_LOG may hold directives we cannot control; only a filter error
    // is acceptable besides success.
    if let Err(err) = &first {
        assert!(matches!(err, Error::LogFilter(_)), "unexpected: {err}");
        return;
    }
    let second = pca::logging::init(&config);
    assert!(matches!(second, Err(Error::Logging(_))));
}

#[test]
fn bad_filter_is_reported() {
    let config = LoggingConfig {
        filter: "pca=notalevel".into(),
        ..LoggingConfig::default()
    };
    if std::env::var("RUST_LOG").is_err() {
        assert!(matches!(
            pca::logging::env_filter(&config),
            Err(Error::LogFilter(_))
        ));
    }
}
