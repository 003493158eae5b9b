use super::*;
use tempfile::TempDir;

#[test]
fn default_config_is_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
}

#[test]
fn load_from_missing_file_returns_defaults() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = Config::load_from(dir.path()).expect("should load defaults");
    assert_eq!(config, Config::default());
}

#[test]
fn save_and_load_round_trip() {
    let dir = TempDir::new().expect("should create temp dir");

    let mut config = Config::default();
    config.embedding.provider = ProviderKind::Local;
    config.embedding.dimension = 128;
    config.chunking.max_tokens = 256;
    config.retrieval.limit = 5;

    config.save_to(dir.path()).expect("should save config");
    let loaded = Config::load_from(dir.path()).expect("should load config");

    assert_eq!(loaded, config);
}

#[test]
fn load_rejects_invalid_toml() {
    let dir = TempDir::new().expect("should create temp dir");
    std::fs::write(dir.path().join("config.toml"), "not = [valid")
        .expect("should write config file");

    assert!(Config::load_from(dir.path()).is_err());
}

#[test]
fn load_rejects_invalid_values() {
    let dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        dir.path().join("config.toml"),
        "[embedding]\nbatch_size = 0\n",
    )
    .expect("should write config file");

    assert!(Config::load_from(dir.path()).is_err());
}

#[test]
fn partial_config_fills_defaults() {
    let dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        dir.path().join("config.toml"),
        "[embedding]\nprovider = \"local\"\n",
    )
    .expect("should write config file");

    let config = Config::load_from(dir.path()).expect("should load config");
    assert_eq!(config.embedding.provider, ProviderKind::Local);
    assert_eq!(config.embedding.dimension, DEFAULT_EMBEDDING_DIMENSION);
    assert_eq!(config.retrieval.limit, 10);
}

#[test]
fn model_endpoint_joins_base_and_model() {
    let config = EmbeddingConfig {
        endpoint: "https://example.com/models/".to_string(),
        model: "my-model".to_string(),
        ..EmbeddingConfig::default()
    };

    let url = config.model_endpoint().expect("should build endpoint URL");
    assert_eq!(url.as_str(), "https://example.com/models/my-model");
}

#[test]
fn embedding_validation_bounds() {
    let mut config = EmbeddingConfig {
        model: "  ".to_string(),
        ..EmbeddingConfig::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidModel(_))
    ));

    config.model = "model".to_string();
    config.batch_size = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidBatchSize(0))
    ));

    config.batch_size = 16;
    config.dimension = 8;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidEmbeddingDimension(8))
    ));

    config.dimension = 384;
    config.endpoint = "not a url".to_string();
    assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));
}

#[test]
fn http_store_requires_endpoint() {
    let config = StoreConfig {
        backend: StoreKind::Http,
        endpoint: None,
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::MissingStoreEndpoint)
    ));

    let config = StoreConfig {
        backend: StoreKind::Http,
        endpoint: Some("http://localhost:18000".to_string()),
    };
    assert!(config.validate().is_ok());
}

#[test]
fn chunking_overlap_must_be_smaller_than_max() {
    let mut config = Config::default();
    config.chunking.max_tokens = 64;
    config.chunking.overlap_tokens = 64;

    assert!(matches!(
        config.validate(),
        Err(ConfigError::OverlapTooLarge(64, 64))
    ));
}

#[test]
fn retrieval_validation_bounds() {
    let mut config = RetrievalConfig {
        limit: 0,
        ..RetrievalConfig::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidLimit(0))
    ));

    config.limit = 10;
    config.min_similarity = 1.5;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidSimilarity(_))
    ));
}
