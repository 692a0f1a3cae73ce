//! Timestamped telemetry cells
//!
//! Each telemetry category lives in its own cell with its own lock, so a
//! writer in one category never blocks a reader in another. Values are
//! replaced wholesale and readers get a clone, never a torn value.

use drone_shared::Channel;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tokio::time::{Duration, Instant};

/// A value and the instant it was recorded
#[derive(Debug, Clone, PartialEq)]
pub struct Timestamped<T> {
    pub value: T,
    pub timestamp: Instant,
}

impl<T> Timestamped<T> {
    /// Stamp `value` with the current instant
    pub fn new(value: T) -> Self {
        Self {
            value,
            timestamp: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.timestamp)
    }

    pub fn is_stale(&self, threshold: Duration) -> bool {
        self.age() >= threshold
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Timestamped<U> {
        Timestamped {
            value: f(self.value),
            timestamp: self.timestamp,
        }
    }
}

/// Cache cell for one telemetry category
#[derive(Debug)]
pub struct TimestampedCell<T> {
    inner: RwLock<Option<Timestamped<T>>>,
}

impl<T> Default for TimestampedCell<T> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }
}

impl<T: Clone> TimestampedCell<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest value, `None` if never written
    pub fn read(&self) -> Option<Timestamped<T>> {
        self.inner.read().clone()
    }

    /// Replace the value, stamping the current instant
    pub fn write(&self, value: T) {
        *self.inner.write() = Some(Timestamped::new(value));
    }

    pub fn clear(&self) {
        *self.inner.write() = None;
    }
}

impl<T: Clone + Default> TimestampedCell<T> {
    /// Claim a refresh if the cell is empty or older than `threshold`.
    ///
    /// On a claim the cell is restamped immediately (keeping the current
    /// value, or a default placeholder), so at most one refresh is
    /// outstanding per threshold window. The caller then issues the read
    /// and writes the real value when it arrives.
    pub fn claim_refresh(&self, threshold: Duration) -> bool {
        let mut inner = self.inner.write();
        let stale = inner
            .as_ref()
            .map(|current| current.is_stale(threshold))
            .unwrap_or(true);
        if !stale {
            return false;
        }
        let placeholder = inner.take().map(|current| current.value).unwrap_or_default();
        *inner = Some(Timestamped::new(placeholder));
        true
    }
}

/// Cache cells for a per-channel telemetry category, one lock per category
#[derive(Debug)]
pub struct ChannelCells<T> {
    inner: RwLock<BTreeMap<Channel, Timestamped<T>>>,
}

impl<T> Default for ChannelCells<T> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<T: Clone> ChannelCells<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, channel: Channel) -> Option<Timestamped<T>> {
        self.inner.read().get(&channel).cloned()
    }

    pub fn write(&self, channel: Channel, value: T) {
        self.inner.write().insert(channel, Timestamped::new(value));
    }

    pub fn clear(&self, channel: Channel) {
        self.inner.write().remove(&channel);
    }

    /// Channels with a value, ascending
    pub fn channels(&self) -> Vec<Channel> {
        self.inner.read().keys().copied().collect()
    }
}

impl<T: Clone + Default> ChannelCells<T> {
    /// Per-channel form of [`TimestampedCell::claim_refresh`]
    pub fn claim_refresh(&self, channel: Channel, threshold: Duration) -> bool {
        let mut inner = self.inner.write();
        let stale = inner
            .get(&channel)
            .map(|current| current.is_stale(threshold))
            .unwrap_or(true);
        if !stale {
            return false;
        }
        let placeholder = inner
            .remove(&channel)
            .map(|current| current.value)
            .unwrap_or_default();
        inner.insert(channel, Timestamped::new(placeholder));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_read_returns_latest_write() {
        let cell = TimestampedCell::new();
        assert!(cell.read().is_none());

        cell.write(1u32);
        tokio::time::advance(Duration::from_millis(10)).await;
        cell.write(2u32);

        let value = cell.read().unwrap();
        assert_eq!(value.value, 2);
        assert_eq!(value.age(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_staleness_threshold_is_inclusive() {
        let cell = TimestampedCell::new();
        cell.write("auto".to_string());

        tokio::time::advance(Duration::from_millis(4999)).await;
        assert!(!cell.read().unwrap().is_stale(Duration::from_secs(5)));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cell.read().unwrap().is_stale(Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_refresh_once_per_window() {
        let cell: TimestampedCell<u32> = TimestampedCell::new();
        let threshold = Duration::from_secs(5);

        // Empty cells are claimed and stamped with a placeholder
        assert!(cell.claim_refresh(threshold));
        assert_eq!(cell.read().unwrap().value, 0);

        let mut claims = 0;
        for _ in 0..49 {
            tokio::time::advance(Duration::from_millis(100)).await;
            if cell.claim_refresh(threshold) {
                claims += 1;
            }
        }
        assert_eq!(claims, 0);

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(cell.claim_refresh(threshold));
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_keeps_current_value() {
        let cell = TimestampedCell::new();
        cell.write(7u32);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(cell.claim_refresh(Duration::from_secs(5)));
        assert_eq!(cell.read().unwrap().value, 7);
    }

    #[test]
    fn test_channel_cells_are_independent() {
        let cells = ChannelCells::new();
        cells.write(1, "one");
        cells.write(0, "zero");

        assert_eq!(cells.read(0).unwrap().value, "zero");
        assert_eq!(cells.read(1).unwrap().value, "one");
        assert!(cells.read(2).is_none());
        assert_eq!(cells.channels(), vec![0, 1]);

        cells.clear(0);
        assert!(cells.read(0).is_none());
    }

    #[test]
    fn test_held_writer_does_not_block_other_cells() {
        let battery = TimestampedCell::new();
        let gimbal = TimestampedCell::new();
        battery.write(80u8);
        gimbal.write(-12i32);

        let _writer = battery.inner.write();
        assert!(battery.inner.try_read().is_none());
        assert_eq!(gimbal.read().map(|g| g.value), Some(-12));
        gimbal.write(0);
        assert_eq!(gimbal.read().map(|g| g.value), Some(0));
    }

    #[test]
    fn test_concurrent_writers_never_tear() {
        let cell = Arc::new(TimestampedCell::new());
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let cell = cell.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        cell.write((n, n));
                    }
                })
            })
            .collect();

        for _ in 0..1000 {
            if let Some(value) = cell.read() {
                assert_eq!(value.value.0, value.value.1);
            }
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
