use bytes::Bytes;
use silo_storage::MemoryBackend;

pub const BASE_URL: &str = "http://store.test/bucket";

/// Fresh in-memory store issuing URLs under [`BASE_URL`].
pub fn memory_store() -> MemoryBackend {
    MemoryBackend::new(BASE_URL).expect("valid base url")
}

/// Generate deterministic test data using a seeded pseudo-random generator.
/// Same seed produces same output (reproducible tests)
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    // Simple LCG
    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_bytes_reproducible() {
        assert_eq!(seeded_bytes(42, 100), seeded_bytes(42, 100));
        assert_ne!(seeded_bytes(42, 100), seeded_bytes(43, 100));
        assert_eq!(seeded_bytes(1, 13).len(), 13);
    }
}
