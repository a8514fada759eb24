use streamweld::{ConfigError, DedupConfig, RecordHandler, RecordSender, SendError, SequenceFromKey};

struct NullSender;

impl RecordSender for NullSender {
    fn open(&self) -> Result<(), SendError> {
        Ok(())
    }

    fn send(&self, _record: streamweld::OutboundRecord) -> Result<(), SendError> {
        Ok(())
    }

    fn close(&self) {}
}

#[test]
fn zero_sources_is_rejected() {
    assert_eq!(
        DedupConfig::new(0).validate(),
        Err(ConfigError::NoSources(0))
    );
}

#[test]
fn zero_check_interval_is_rejected() {
    assert_eq!(
        DedupConfig::new(2).with_check_interval_ms(0).validate(),
        Err(ConfigError::ZeroCheckInterval)
    );
}

#[test]
fn handler_construction_validates_the_configuration() {
    assert_eq!(
        RecordHandler::new(DedupConfig::new(0), SequenceFromKey, NullSender).err(),
        Some(ConfigError::NoSources(0))
    );
}

#[test]
fn defaults_apply_to_sparse_documents() {
    let config: DedupConfig = serde_json::from_value(serde_json::json!({
        "source_count": 3,
    }))
    .unwrap();

    assert_eq!(config, DedupConfig::new(3));
    assert_eq!(config.gap_timeout_ms, 5_000);
    assert_eq!(config.check_interval_ms, 100);
    assert!(!config.ordered_capture);
    assert!(config.header_prefix.is_empty());
    config.validate().unwrap();
}

#[test]
fn full_documents_round_trip() {
    let config = DedupConfig::new(2)
        .with_gap_timeout_ms(250)
        .with_ordered_capture(true)
        .with_header_prefix("weld.")
        .with_check_interval_ms(20);

    let encoded = serde_json::to_value(&config).unwrap();
    let decoded: DedupConfig = serde_json::from_value(encoded).unwrap();
    assert_eq!(decoded, config);
}
