use chrono::{DateTime, Utc};

/// A message as stored in, and delivered from, the event log.
#[derive(Debug, Clone, PartialEq)]
pub struct BusMessage {
    pub topic: String,
    pub partition: u32,
    /// Position within the partition. Strictly increasing in publish order,
    /// not necessarily dense.
    pub offset: i64,
    pub key: String,
    pub payload: Vec<u8>,
    pub published_at: DateTime<Utc>,
}

impl BusMessage {
    /// Returns the payload as UTF-8 text, lossily.
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Picks the partition for a key.
///
/// FNV-1a over the key bytes, so the mapping is identical across processes
/// and builds. Every message with the same key lands on the same partition.
pub fn partition_for(key: &str, partitions: u32) -> u32 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;

    let partitions = partitions.max(1);
    let hash = key.bytes().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(PRIME)
    });
    (hash % u64::from(partitions)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_same_partition() {
        assert_eq!(partition_for("7", 8), partition_for("7", 8));
    }

    #[test]
    fn partition_within_range() {
        for i in 0..1000 {
            assert!(partition_for(&i.to_string(), 8) < 8);
        }
    }

    #[test]
    fn payload_str_is_lossy() {
        let message = BusMessage {
            topic: "t".to_string(),
            partition: 0,
            offset: 1,
            key: "7".to_string(),
            payload: vec![b'7', 0xff],
            published_at: Utc::now(),
        };
        assert_eq!(message.payload_str(), "7\u{fffd}");
    }

    #[test]
    fn zero_partitions_treated_as_one() {
        assert_eq!(partition_for("anything", 0), 0);
    }

    #[test]
    fn keys_spread_across_partitions() {
        let used: std::collections::HashSet<u32> =
            (0..100).map(|i| partition_for(&i.to_string(), 4)).collect();
        assert_eq!(used.len(), 4);
    }
}
