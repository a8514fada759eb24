use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use streamweld::{
    Assignment, CacheMaintenanceTimer, CapturedRecord, DedupConfig, OutboundRecord, RecordHandler,
    RecordSender, SendError, SequenceFromKey,
};

const PARTITION_0: u32 = 0;
const SOURCE_0: u32 = 0;

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
            .map(|record| {
                String::from_utf8(record.value.clone())
                    .unwrap()
                    .parse()
                    .unwrap()
            })
            .collect()
    }
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

#[test]
fn timer_resolves_stalled_gaps_without_further_ingestion() {
    let sender = RecordingSender::default();
    // two configured sources but only one delivering, so only the timeout
    // fallback can resolve the gap
    let config = DedupConfig::new(2)
        .with_gap_timeout_ms(50)
        .with_check_interval_ms(10);
    let handler =
        Arc::new(RecordHandler::new(config, SequenceFromKey, sender.clone()).unwrap());
    handler.start().unwrap();
    handler.assigned(&Assignment::new([PARTITION_0], 2));

    handler.handle(record(PARTITION_0, 100), SOURCE_0).unwrap();
    handler.handle(record(PARTITION_0, 103), SOURCE_0).unwrap();
    handler.handle(record(PARTITION_0, 104), SOURCE_0).unwrap();
    assert_eq!(sender.values(), vec![100]);

    let timer = CacheMaintenanceTimer::start(Arc::clone(&handler)).unwrap();
    thread::sleep(Duration::from_millis(200));
    timer.stop();

    assert_eq!(sender.values(), vec![100, 103, 104]);
    assert_eq!(handler.telemetry().snapshot().gaps_resolved_timeout, 1);
}

#[test]
fn stopped_timer_runs_no_further_passes() {
    let sender = RecordingSender::default();
    let config = DedupConfig::new(2)
        .with_gap_timeout_ms(10)
        .with_check_interval_ms(10);
    let handler =
        Arc::new(RecordHandler::new(config, SequenceFromKey, sender.clone()).unwrap());
    handler.start().unwrap();
    handler.assigned(&Assignment::new([PARTITION_0], 2));

    let timer = CacheMaintenanceTimer::start(Arc::clone(&handler)).unwrap();
    timer.stop();

    handler.handle(record(PARTITION_0, 100), SOURCE_0).unwrap();
    handler.handle(record(PARTITION_0, 103), SOURCE_0).unwrap();
    thread::sleep(Duration::from_millis(100));

    // the gap is timed out but nothing drove resolution
    assert_eq!(sender.values(), vec![100]);
    handler.check_cache(PARTITION_0).unwrap();
    assert_eq!(sender.values(), vec![100, 103]);
}
