//! Property tests for the peak-list densifier

use rainbow::ms::{decode_packed_intensity, decode_peak_list, quantize_mz};
use rainbow::DecodeError;

// ============================================================================
// Helper Functions
// ============================================================================

type Scan = (u32, Vec<(u16, u16)>);

/// Write a scan block at `offset`, with the start word pointing at the
/// first byte after it.
fn encode_peak_list(offset: usize, scans: &[Scan]) -> Vec<u8> {
    let mut buf = vec![0u8; offset];
    let start = offset + 2;
    buf.extend_from_slice(&((start as u16 + 2) / 2).to_be_bytes());
    for (index, (time, pairs)) in scans.iter().enumerate() {
        if index > 0 {
            buf.extend_from_slice(&[0xEE; 10]);
        }
        buf.extend_from_slice(&[0x01, 0x02]);
        buf.extend_from_slice(&time.to_be_bytes());
        buf.extend_from_slice(&[0u8; 6]);
        buf.extend_from_slice(&(pairs.len() as u16).to_be_bytes());
        buf.extend_from_slice(&[0u8; 4]);
        for &(code, packed) in pairs {
            buf.extend_from_slice(&code.to_be_bytes());
            buf.extend_from_slice(&packed.to_be_bytes());
        }
    }
    buf.extend_from_slice(&[0xEE; 10]);
    buf
}

#[test]
fn test_offset_block() {
    let scans = vec![(30_000, vec![(2000, 1), (2001, 2)]), (90_000, vec![(2020, 3)])];
    let buf = encode_peak_list(40, &scans);

    // 2000 and 2001 both round to m/z 100 and are summed
    let spectra = decode_peak_list(&buf, 40, 2, 0).unwrap();
    assert_eq!(spectra.times, vec![0.5, 1.5]);
    assert_eq!(spectra.mzs, vec![100.0, 101.0]);
    assert_eq!(spectra.intensities.row(0), &[3.0, 0.0]);
    assert_eq!(spectra.intensities.row(1), &[0.0, 3.0]);
}

#[test]
fn test_precision_changes_axis() {
    let scans = vec![(0, vec![(2000, 1), (2001, 1), (2003, 1)])];
    let buf = encode_peak_list(0, &scans);

    assert_eq!(decode_peak_list(&buf, 0, 1, 0).unwrap().mzs, vec![100.0]);
    assert_eq!(
        decode_peak_list(&buf, 0, 1, 2).unwrap().mzs,
        vec![100.0, 100.05, 100.15]
    );
}

#[test]
fn test_truncated_pairs() {
    let scans = vec![(0, vec![(2000, 1); 8])];
    let mut buf = encode_peak_list(0, &scans);
    buf.truncate(buf.len() - 10 - 3);

    let err = decode_peak_list(&buf, 0, 1, 0).unwrap_err();
    assert!(matches!(err, DecodeError::OutOfBounds { .. }));
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn scans_strategy() -> impl Strategy<Value = Vec<Scan>> {
        let pair = (1800u16..2400, any::<u16>());
        let scan = (any::<u32>(), prop::collection::vec(pair, 0..30));
        prop::collection::vec(scan, 1..12)
    }

    proptest! {
        /// Decoding the same buffer twice gives identical arrays
        #[test]
        fn test_idempotent(scans in scans_strategy(), precision in 0u32..4) {
            let buf = encode_peak_list(0, &scans);
            let n = scans.len() as u32;

            let first = decode_peak_list(&buf, 0, n, precision).unwrap();
            let second = decode_peak_list(&buf, 0, n, precision).unwrap();
            prop_assert_eq!(first, second);
        }

        /// Every peak lands in its scan's row; nothing is overwritten
        #[test]
        fn test_row_sums_preserved(scans in scans_strategy(), precision in 0u32..3) {
            let buf = encode_peak_list(0, &scans);
            let spectra = decode_peak_list(&buf, 0, scans.len() as u32, precision).unwrap();

            prop_assert_eq!(spectra.intensities.shape(), (scans.len(), spectra.mzs.len()));
            for (row, (_, pairs)) in scans.iter().enumerate() {
                let expected: f64 = pairs
                    .iter()
                    .map(|&(_, packed)| decode_packed_intensity(packed) as f64)
                    .sum();
                let actual: f64 = spectra.intensities.row(row).iter().sum();
                prop_assert_eq!(actual, expected);
            }
        }

        /// The axis is strictly increasing and holds exactly the decoded m/z set
        #[test]
        fn test_axis_is_unique_set(scans in scans_strategy(), precision in 0u32..3) {
            let buf = encode_peak_list(0, &scans);
            let spectra = decode_peak_list(&buf, 0, scans.len() as u32, precision).unwrap();

            prop_assert!(spectra.mzs.windows(2).all(|w| w[0] < w[1]));

            let mut expected: Vec<f64> = scans
                .iter()
                .flat_map(|(_, pairs)| pairs.iter().map(|&(code, _)| quantize_mz(code, precision)))
                .collect();
            expected.sort_by(f64::total_cmp);
            expected.dedup();
            prop_assert_eq!(spectra.mzs, expected);
        }

        /// Arbitrary bytes never panic the decoder
        #[test]
        fn test_arbitrary_bytes(
            bytes in prop::collection::vec(any::<u8>(), 0..512),
            offset in 0u32..520,
            scans in 0u32..16,
            precision in 0u32..20,
        ) {
            let _ = decode_peak_list(&bytes, offset, scans, precision);
        }
    }
}
