//! Property-based tests for the bit sink.
//!
//! Verifies that whatever goes through the buffered sink comes out of the
//! file byte-for-byte, across block boundaries, patches, and the JPEG
//! stuffing rules.

use proptest::prelude::*;

use mjpeg_avi::BitSink;

/// Reference model of JPEG byte-stuffing for a big-endian 32-bit value.
fn stuffed(value: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(8);
    for byte in value.to_be_bytes() {
        out.push(byte);
        if byte == 0xFF {
            out.push(0);
        }
    }
    out
}

proptest! {
    /// Arbitrary byte vectors written through the sink equal the file image.
    #[test]
    fn put_bytes_image_equality(data in prop::collection::vec(any::<u8>(), 0..4096)) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let mut sink = BitSink::create(&path).unwrap();
        sink.put_bytes(&data);
        prop_assert_eq!(sink.pos(), data.len() as u64);
        sink.close();

        prop_assert_eq!(std::fs::read(&path).unwrap(), data);
    }

    /// Splitting a write into two arbitrary pieces changes nothing on disk.
    #[test]
    fn put_bytes_split_invariance(
        data in prop::collection::vec(any::<u8>(), 1..2048),
        split in any::<prop::sample::Index>()
    ) {
        let cut = split.index(data.len());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let mut sink = BitSink::create(&path).unwrap();
        sink.put_bytes(&data[..cut]);
        sink.put_bytes(&data[cut..]);
        sink.close();

        prop_assert_eq!(std::fs::read(&path).unwrap(), data);
    }

    /// `jput` matches the stuffing model, one value after another.
    #[test]
    fn jput_matches_model(values in prop::collection::vec(any::<u32>(), 1..64)) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let mut sink = BitSink::create(&path).unwrap();
        let mut expected = Vec::new();
        for &value in &values {
            sink.jput(value);
            expected.extend(stuffed(value));
        }
        sink.close();

        prop_assert_eq!(std::fs::read(&path).unwrap(), expected);
    }

    /// `jflush` emits at most 8 bytes and leaves no bare 0xFF at the end.
    #[test]
    fn jflush_output_is_bounded_and_stuffed(value in any::<u32>(), bit_idx in 0u32..=32) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let mut sink = BitSink::create(&path).unwrap();
        sink.jflush(value, bit_idx);
        sink.close();

        let bytes = std::fs::read(&path).unwrap();
        prop_assert!(bytes.len() <= 8);
        // every 0xFF is followed by a stuffed zero
        for (i, &b) in bytes.iter().enumerate() {
            if b == 0xFF {
                prop_assert_eq!(bytes.get(i + 1).copied(), Some(0));
            }
        }
    }

    /// Patching a resident or flushed position rewrites exactly 4 bytes
    /// and leaves the write position alone.
    #[test]
    fn patch_int_rewrites_in_place(
        count in 4usize..12_000,
        target in any::<prop::sample::Index>(),
        value in any::<u32>()
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let mut sink = BitSink::create(&path).unwrap();
        for i in 0..count {
            sink.put_int(i as u32);
        }
        let slot = target.index(count) as u64 * 4;
        let pos_before = sink.pos();
        sink.patch_int(value, slot);
        prop_assert_eq!(sink.pos(), pos_before);
        sink.close();

        let bytes = std::fs::read(&path).unwrap();
        prop_assert_eq!(bytes.len(), count * 4);
        for i in 0..count {
            let got = u32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
            if i as u64 * 4 == slot {
                prop_assert_eq!(got, value);
            } else {
                prop_assert_eq!(got, i as u32);
            }
        }
    }
}
