//! zstd compression of tail buffers.

use std::io;

/// zstd level used for snapshots (0 selects the library default)
pub const COMPRESSION_LEVEL: i32 = zstd::DEFAULT_COMPRESSION_LEVEL;

pub fn compress(raw: &[u8]) -> io::Result<Vec<u8>> {
    zstd::encode_all(raw, COMPRESSION_LEVEL)
}

pub fn decompress(compressed: &[u8]) -> io::Result<Vec<u8>> {
    zstd::decode_all(compressed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_log_text_shrinks() {
        let raw = "2024-09-02T10:00:00 INFO request served in 3ms\n".repeat(200);
        let packed = compress(raw.as_bytes()).unwrap();
        assert!(packed.len() < raw.len());
        assert_eq!(decompress(&packed).unwrap(), raw.as_bytes());
    }

    #[test]
    fn test_garbage_fails_to_decompress() {
        assert!(decompress(b"definitely not a zstd frame").is_err());
    }

    proptest! {
        #[test]
        fn prop_round_trip_is_exact(raw in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let packed = compress(&raw).unwrap();
            prop_assert_eq!(decompress(&packed).unwrap(), raw);
        }
    }
}
