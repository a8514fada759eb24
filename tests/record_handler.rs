use std::sync::{Arc, Mutex};
use streamweld::{
    Assignment, CapturedRecord, DedupConfig, OutboundRecord, RecordHandler, RecordSender,
    SendError, SequenceFromKey,
};

const PARTITION_0: u32 = 0;
const PARTITION_1: u32 = 1;
const SOURCE_0: u32 = 0;
const SOURCE_1: u32 = 1;

#[derive(Clone, Default)]
struct RecordingSender {
    sent: Arc<Mutex<Vec<OutboundRecord>>>,
}

impl RecordingSender {
    fn values(&self) -> Vec<u64> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|record| decode_value(record))
            .collect()
    }

    fn values_for(&self, partition: u32) -> Vec<u64> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.partition == partition)
            .map(|record| decode_value(record))
            .collect()
    }
}

fn decode_value(record: &OutboundRecord) -> u64 {
    String::from_utf8(record.value.clone())
        .unwrap()
        .parse()
        .unwrap()
}

impl RecordSender for RecordingSender {
    fn open(&self) -> Result<(), SendError> {
        Ok(())
    }

    fn send(&self, record: OutboundRecord) -> Result<(), SendError> {
        self.sent.lock().unwrap().push(record);
        Ok(())
    }

    fn close(&self) {}
}

fn record(partition: u32, sequence: u64) -> CapturedRecord {
    CapturedRecord::new(partition, sequence.to_string()).with_key(sequence.to_be_bytes())
}

fn started_handler(
    source_count: u32,
    sender: RecordingSender,
) -> RecordHandler<SequenceFromKey, RecordingSender> {
    let config = DedupConfig::new(source_count).with_gap_timeout_ms(100);
    let handler = RecordHandler::new(config, SequenceFromKey, sender).unwrap();
    handler.start().unwrap();
    handler.assigned(&Assignment::new([PARTITION_0, PARTITION_1], source_count));
    handler
}

#[test]
fn one_partition_one_source_no_gaps() {
    let sender = RecordingSender::default();
    let handler = started_handler(1, sender.clone());

    for sequence in 100..=103 {
        handler.handle(record(PARTITION_0, sequence), SOURCE_0).unwrap();
    }

    assert_eq!(sender.values(), vec![100, 101, 102, 103]);
}

#[test]
fn two_sources_interleaved_no_gaps() {
    let sender = RecordingSender::default();
    let handler = started_handler(2, sender.clone());

    handler.handle(record(PARTITION_0, 100), SOURCE_0).unwrap();
    handler.handle(record(PARTITION_0, 101), SOURCE_0).unwrap();

    handler.handle(record(PARTITION_0, 100), SOURCE_1).unwrap();
    handler.handle(record(PARTITION_0, 101), SOURCE_1).unwrap();
    handler.handle(record(PARTITION_0, 102), SOURCE_1).unwrap();
    handler.handle(record(PARTITION_0, 103), SOURCE_1).unwrap();

    handler.handle(record(PARTITION_0, 102), SOURCE_0).unwrap();
    handler.handle(record(PARTITION_0, 103), SOURCE_0).unwrap();

    assert_eq!(sender.values(), vec![100, 101, 102, 103]);
}

#[test]
fn reingesting_forwarded_records_never_repeats_a_send() {
    let sender = RecordingSender::default();
    let handler = started_handler(2, sender.clone());

    for sequence in 100..=103 {
        handler.handle(record(PARTITION_0, sequence), SOURCE_0).unwrap();
    }
    // replay the full range on both sources
    for sequence in 100..=103 {
        handler.handle(record(PARTITION_0, sequence), SOURCE_0).unwrap();
        handler.handle(record(PARTITION_0, sequence), SOURCE_1).unwrap();
    }

    assert_eq!(sender.values(), vec![100, 101, 102, 103]);
    assert_eq!(handler.telemetry().snapshot().duplicates_dropped, 8);
}

#[test]
fn delivered_sequences_strictly_increase_per_partition() {
    let sender = RecordingSender::default();
    let handler = started_handler(2, sender.clone());

    // deliberately disordered cross-source arrival
    handler.handle(record(PARTITION_0, 100), SOURCE_1).unwrap();
    handler.handle(record(PARTITION_0, 102), SOURCE_0).unwrap();
    handler.handle(record(PARTITION_0, 101), SOURCE_1).unwrap();
    handler.handle(record(PARTITION_0, 100), SOURCE_0).unwrap();
    handler.handle(record(PARTITION_0, 103), SOURCE_1).unwrap();
    handler.handle(record(PARTITION_0, 102), SOURCE_1).unwrap();

    let values = sender.values();
    assert_eq!(values, vec![100, 101, 102, 103]);
    assert!(values.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn partitions_produce_independent_streams() {
    let sender = RecordingSender::default();
    let handler = started_handler(2, sender.clone());

    for &partition in &[PARTITION_0, PARTITION_1] {
        handler.handle(record(partition, 100), SOURCE_0).unwrap();
        handler.handle(record(partition, 101), SOURCE_0).unwrap();

        handler.handle(record(partition, 100), SOURCE_1).unwrap();
        handler.handle(record(partition, 101), SOURCE_1).unwrap();
        handler.handle(record(partition, 102), SOURCE_1).unwrap();
        handler.handle(record(partition, 103), SOURCE_1).unwrap();

        handler.handle(record(partition, 102), SOURCE_0).unwrap();
        handler.handle(record(partition, 103), SOURCE_0).unwrap();
    }

    assert_eq!(sender.values_for(PARTITION_0), vec![100, 101, 102, 103]);
    assert_eq!(sender.values_for(PARTITION_1), vec![100, 101, 102, 103]);
    assert_eq!(sender.values().len(), 8);
}

#[test]
fn unassigned_partition_is_created_lazily() {
    let sender = RecordingSender::default();
    let config = DedupConfig::new(1);
    let handler = RecordHandler::new(config, SequenceFromKey, sender.clone()).unwrap();
    handler.start().unwrap();

    // no assignment at all; the first record seeds the baseline
    handler.handle(record(7, 500), SOURCE_0).unwrap();
    handler.handle(record(7, 501), SOURCE_0).unwrap();

    assert_eq!(sender.values_for(7), vec![500, 501]);
    assert_eq!(handler.partition_ids(), vec![7]);
}
