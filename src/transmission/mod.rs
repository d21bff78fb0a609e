pub mod buffer;
pub mod collector;

pub use buffer::TransmissionBuffer;
pub use collector::PostgresCollector;

use crate::models::BufferedEntry;

/// Delivery capability for buffered readings
///
/// `true` means the collector confirmed the entry. Ordinary network failures
/// map to `false`, never to a panic.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send(&mut self, entry: &BufferedEntry) -> bool;
}
