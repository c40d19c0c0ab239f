//! Round-trip tests for the delta-coded UV trace decoder
//!
//! A small encoder writes absolute values as 16-bit deltas, falling back to a
//! resync whenever a delta does not fit (or would collide with the escape
//! token). Decoding its output must give back the original values.

use rainbow::uv::{
    decode_delta_trace, decode_delta_trace_indexed, index_records, ESCAPE_TOKEN,
    RECORD_HEADER_LEN,
};
use rainbow::DecodeError;

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode one record of absolute channel values
fn encode_record(buf: &mut Vec<u8>, time: u32, values: &[i32]) {
    buf.extend_from_slice(b"REC\0");
    buf.extend_from_slice(&time.to_le_bytes());
    buf.extend_from_slice(&[0u8; 14]);

    let mut accum: i64 = 0;
    for &value in values {
        let delta = i64::from(value) - accum;
        match i16::try_from(delta) {
            Ok(delta) if delta != ESCAPE_TOKEN => buf.extend_from_slice(&delta.to_le_bytes()),
            _ => {
                buf.extend_from_slice(&ESCAPE_TOKEN.to_le_bytes());
                buf.extend_from_slice(&value.to_le_bytes());
            }
        }
        accum = i64::from(value);
    }
}

/// Encode a whole trace after `offset` bytes of padding
fn encode_trace(offset: usize, records: &[(u32, Vec<i32>)]) -> Vec<u8> {
    let mut buf = vec![0x5A; offset];
    for (time, values) in records {
        encode_record(&mut buf, *time, values);
    }
    buf
}

// ============================================================================
// Concrete cases
// ============================================================================

#[test]
fn test_resync_scenario() {
    let buf = encode_trace(0, &[(60, vec![10, 100_000, 100_005])]);

    let trace = decode_delta_trace(&buf, 0, 1, 3).unwrap();
    assert_eq!(trace.times, vec![60]);
    assert_eq!(trace.intensities.row(0), &[10, 100_000, 100_005]);
}

#[test]
fn test_encoder_uses_escape_for_min_delta() {
    // 0 -> -32768 is a representable i16 delta but must be escaped
    let buf = encode_trace(0, &[(0, vec![-32768, -32767])]);
    assert_eq!(buf.len(), RECORD_HEADER_LEN + 2 + 4 + 2);

    let trace = decode_delta_trace(&buf, 0, 1, 2).unwrap();
    assert_eq!(trace.intensities.row(0), &[-32768, -32767]);
}

#[test]
fn test_shapes_follow_parameters() {
    let records: Vec<(u32, Vec<i32>)> = (0..25u32)
        .map(|t| (t * 400, (0..7).map(|c| (t as i32) * 1000 - c * 50_000).collect()))
        .collect();
    let buf = encode_trace(512, &records);

    let trace = decode_delta_trace(&buf, 512, 25, 7).unwrap();
    assert_eq!(trace.num_records(), 25);
    assert_eq!(trace.num_channels(), 7);
    assert_eq!(trace.times.len(), 25);
    assert_eq!(trace.intensities.shape(), (25, 7));
}

#[test]
fn test_index_skips_resync_payloads() {
    let buf = encode_trace(16, &[(1, vec![0, 70_000]), (2, vec![1, 2])]);

    let offsets = index_records(&buf, 16, 2, 2).unwrap();
    assert_eq!(offsets, vec![16, 16 + RECORD_HEADER_LEN + 2 + 2 + 4]);
}

#[test]
fn test_more_records_than_encoded() {
    let buf = encode_trace(0, &[(1, vec![1, 2, 3])]);

    let err = decode_delta_trace(&buf, 0, 2, 3).unwrap_err();
    assert!(matches!(err, DecodeError::OutOfBounds { .. }));
}

// ============================================================================
// Property-based tests
// ============================================================================

mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn trace_strategy() -> impl Strategy<Value = (usize, Vec<(u32, Vec<i32>)>)> {
        (0usize..8, 0usize..40).prop_flat_map(|(channels, records)| {
            let record = (
                any::<u32>(),
                prop::collection::vec(
                    prop_oneof![
                        3 => -2_000i32..2_000,
                        1 => any::<i32>(),
                    ],
                    channels,
                ),
            );
            (Just(channels), prop::collection::vec(record, records))
        })
    }

    proptest! {
        /// Any trace the encoder writes decodes back to its values
        #[test]
        fn test_roundtrip((channels, records) in trace_strategy(), offset in 0usize..64) {
            let buf = encode_trace(offset, &records);

            let trace = decode_delta_trace(&buf, offset as u32, records.len() as u32, channels as u32)
                .unwrap();

            prop_assert_eq!(trace.intensities.shape(), (records.len(), channels));
            for (row, (time, values)) in records.iter().enumerate() {
                prop_assert_eq!(trace.times[row], *time);
                let expected: Vec<i64> = values.iter().map(|&v| i64::from(v)).collect();
                prop_assert_eq!(trace.intensities.row(row), expected.as_slice());
            }
        }

        /// The indexed path agrees with the sequential path
        #[test]
        fn test_indexed_matches_sequential((channels, records) in trace_strategy()) {
            let buf = encode_trace(0, &records);
            let n = records.len() as u32;

            let sequential = decode_delta_trace(&buf, 0, n, channels as u32).unwrap();
            let indexed = decode_delta_trace_indexed(&buf, 0, n, channels as u32).unwrap();
            prop_assert_eq!(sequential, indexed);
        }

        /// Cutting bytes off the end of a non-empty trace is always reported
        #[test]
        fn test_truncation_is_out_of_bounds(
            (channels, records) in trace_strategy(),
            cut in 1usize..16,
        ) {
            prop_assume!(!records.is_empty());
            let mut buf = encode_trace(0, &records);
            let cut = cut.min(buf.len());
            buf.truncate(buf.len() - cut);

            let result = decode_delta_trace(&buf, 0, records.len() as u32, channels as u32);
            prop_assert!(
                matches!(result, Err(DecodeError::OutOfBounds { .. })),
                "expected OutOfBounds, got {:?}",
                result
            );
        }

        /// Arbitrary bytes never panic the decoder
        #[test]
        fn test_arbitrary_bytes(
            bytes in prop::collection::vec(any::<u8>(), 0..512),
            offset in 0u32..600,
            records in 0u32..20,
            channels in 0u32..20,
        ) {
            let _ = decode_delta_trace(&bytes, offset, records, channels);
            let _ = decode_delta_trace_indexed(&bytes, offset, records, channels);
        }
    }
}
