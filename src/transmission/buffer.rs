/// Bounded FIFO of readings waiting for the collector
use std::collections::VecDeque;

use log::{debug, warn};

use crate::models::BufferedEntry;
use crate::transmission::Transport;

pub struct TransmissionBuffer {
    entries: VecDeque<BufferedEntry>,
    capacity: usize,
    evicted: u64,
    delivered: u64,
}

impl TransmissionBuffer {
    /// A zero capacity is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        TransmissionBuffer {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
            delivered: 0,
        }
    }

    /// Append an entry, evicting the oldest when full
    pub fn enqueue(&mut self, entry: BufferedEntry) {
        if self.entries.len() >= self.capacity {
            if let Some(dropped) = self.entries.pop_front() {
                self.evicted += 1;
                warn!(
                    "Buffer full ({}), evicted reading #{}",
                    self.capacity, dropped.reading.sequence
                );
            }
        }
        self.entries.push_back(entry);
    }

    /// One delivery pass, oldest first
    ///
    /// Stops at the first failed send so the remaining entries keep their order
    /// for the next cycle. Returns how many entries were delivered.
    pub async fn flush<T: Transport>(&mut self, transport: &mut T) -> usize {
        let mut sent = 0;
        while let Some(entry) = self.entries.front() {
            if !transport.send(entry).await {
                debug!(
                    "Send of reading #{} failed, {} entries stay queued",
                    entry.reading.sequence,
                    self.entries.len()
                );
                break;
            }
            self.entries.pop_front();
            sent += 1;
        }
        self.delivered += sent as u64;
        sent
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries dropped to make room since startup
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn iter(&self) -> impl Iterator<Item = &BufferedEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{BatteryLevel, BatteryState, CompensatedReading};
    use time::OffsetDateTime;

    /// Transport that replays scripted results and records what it accepted
    pub(crate) struct ScriptedTransport {
        pub results: VecDeque<bool>,
        pub default: bool,
        pub accepted: Vec<u64>,
        pub attempts: usize,
    }

    impl ScriptedTransport {
        pub(crate) fn new(results: &[bool], default: bool) -> Self {
            ScriptedTransport {
                results: results.iter().copied().collect(),
                default,
                accepted: Vec::new(),
                attempts: 0,
            }
        }
    }

    impl Transport for ScriptedTransport {
        async fn send(&mut self, entry: &BufferedEntry) -> bool {
            self.attempts += 1;
            let ok = self.results.pop_front().unwrap_or(self.default);
            if ok {
                self.accepted.push(entry.reading.sequence);
            }
            ok
        }
    }

    pub(crate) fn entry(sequence: u64) -> BufferedEntry {
        let now = OffsetDateTime::now_utc();
        BufferedEntry {
            reading: CompensatedReading {
                sequence,
                captured_at: now,
                temperature: 21.0,
                pressure: 1010.0,
                humidity: 45.0,
                dew_point: Some(8.7),
                sea_level_pressure: 1032.0,
                altitude: 27.0,
            },
            battery: BatteryState {
                raw_adc: 36000,
                voltage: 3.9,
                percentage: 70.0,
                level: BatteryLevel::Normal,
            },
            error_count: 0,
            uptime_secs: sequence * 300,
            enqueued_at: now,
        }
    }

    fn sequences(buffer: &TransmissionBuffer) -> Vec<u64> {
        buffer.iter().map(|e| e.reading.sequence).collect()
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut buffer = TransmissionBuffer::new(3);
        for seq in 1..=4 {
            buffer.enqueue(entry(seq));
            assert!(buffer.size() <= 3);
        }
        assert_eq!(sequences(&buffer), vec![2, 3, 4]);
        assert!(buffer.is_full());
        assert_eq!(buffer.evicted(), 1);
    }

    #[tokio::test]
    async fn test_failed_flush_leaves_buffer_unchanged() {
        let mut buffer = TransmissionBuffer::new(3);
        for seq in 1..=4 {
            buffer.enqueue(entry(seq));
        }

        let mut down = ScriptedTransport::new(&[], false);
        assert_eq!(buffer.flush(&mut down).await, 0);
        assert_eq!(down.attempts, 1);
        assert_eq!(sequences(&buffer), vec![2, 3, 4]);

        let mut up = ScriptedTransport::new(&[], true);
        assert_eq!(buffer.flush(&mut up).await, 3);
        assert_eq!(up.accepted, vec![2, 3, 4]);
        assert_eq!(buffer.size(), 0);
        assert_eq!(buffer.delivered(), 3);
    }

    #[tokio::test]
    async fn test_flush_stops_at_first_failure() {
        let mut buffer = TransmissionBuffer::new(5);
        for seq in 1..=5 {
            buffer.enqueue(entry(seq));
        }

        let mut flaky = ScriptedTransport::new(&[true, true, false], true);
        assert_eq!(buffer.flush(&mut flaky).await, 2);
        assert_eq!(flaky.attempts, 3);
        assert_eq!(flaky.accepted, vec![1, 2]);
        assert_eq!(sequences(&buffer), vec![3, 4, 5]);

        // Next pass resumes with the entry that failed
        assert_eq!(buffer.flush(&mut flaky).await, 3);
        assert_eq!(flaky.accepted, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_flush_on_empty_buffer_sends_nothing() {
        let mut buffer = TransmissionBuffer::new(2);
        let mut transport = ScriptedTransport::new(&[], true);
        assert_eq!(buffer.flush(&mut transport).await, 0);
        assert_eq!(transport.attempts, 0);
        assert!(!buffer.is_full());
    }
}
