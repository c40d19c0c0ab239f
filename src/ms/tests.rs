use super::*;

/// Build a peak-list buffer whose start word sits at offset 0 and whose
/// scans begin right after it.
fn build_peak_list(scans: &[(u32, Vec<(u16, u16)>)], with_last_trailer: bool) -> Vec<u8> {
    let mut buf = Vec::new();
    // start = 2 * 2 - 2 = 2
    buf.extend_from_slice(&2u16.to_be_bytes());
    for (index, (time, pairs)) in scans.iter().enumerate() {
        buf.extend_from_slice(&[0x11; SCAN_HEADER_LEN]);
        buf.extend_from_slice(&time.to_be_bytes());
        buf.extend_from_slice(&[0x22; SCAN_META_LEN]);
        buf.extend_from_slice(&(pairs.len() as u16).to_be_bytes());
        buf.extend_from_slice(&[0x33; SCAN_PAD_LEN]);
        for &(code, packed) in pairs {
            buf.extend_from_slice(&code.to_be_bytes());
            buf.extend_from_slice(&packed.to_be_bytes());
        }
        if index + 1 < scans.len() || with_last_trailer {
            buf.extend_from_slice(&[0x44; SCAN_TRAILER_LEN]);
        }
    }
    buf
}

#[test]
fn test_decode_packed_intensity() {
    assert_eq!(decode_packed_intensity(0b01_00000000000001), 8);
    assert_eq!(decode_packed_intensity(0x3FFF), 0x3FFF);
    assert_eq!(decode_packed_intensity(0b10_00000000000011), 3 * 64);
    assert_eq!(decode_packed_intensity(0xFFFF), 0x3FFF << 9);
}

#[test]
fn test_quantize_mz() {
    assert_eq!(quantize_mz(2000, 0), 100.0);
    assert_eq!(quantize_mz(2002, 1), 100.1);
    assert_eq!(quantize_mz(2002, 0), 100.0);
    assert_eq!(quantize_mz(2010, 0), 101.0); // 100.5 rounds away from zero
    assert_eq!(quantize_mz(2003, 2), 100.15);
}

#[test]
fn test_decode_two_scans() {
    let buf = build_peak_list(
        &[
            (60_000, vec![(2000, 10), (4000, 0b01_00000000000001)]),
            (120_000, vec![(3000, 7)]),
        ],
        false,
    );

    let spectra = decode_peak_list(&buf, 0, 2, 0).unwrap();
    assert_eq!(spectra.times, vec![1.0, 2.0]);
    assert_eq!(spectra.mzs, vec![100.0, 150.0, 200.0]);
    assert_eq!(spectra.intensities.shape(), (2, 3));
    assert_eq!(spectra.intensities.row(0), &[10.0, 0.0, 8.0]);
    assert_eq!(spectra.intensities.row(1), &[0.0, 7.0, 0.0]);
}

#[test]
fn test_rounding_collisions_are_summed() {
    // 2000/20 = 100.0 and 2004/20 = 100.2 both round to 100 at precision 0
    let buf = build_peak_list(&[(0, vec![(2000, 5), (2004, 6)])], true);

    let spectra = decode_peak_list(&buf, 0, 1, 0).unwrap();
    assert_eq!(spectra.mzs, vec![100.0]);
    assert_eq!(spectra.intensities.row(0), &[11.0]);

    let spectra = decode_peak_list(&buf, 0, 1, 1).unwrap();
    assert_eq!(spectra.mzs, vec![100.0, 100.2]);
    assert_eq!(spectra.intensities.row(0), &[5.0, 6.0]);
}

#[test]
fn test_zero_scans() {
    let spectra = decode_peak_list(&[], 0, 0, 0).unwrap();
    assert!(spectra.times.is_empty());
    assert!(spectra.mzs.is_empty());
    assert_eq!(spectra.intensities.rows(), 0);
}

#[test]
fn test_scan_without_peaks() {
    let buf = build_peak_list(&[(0, vec![]), (60_000, vec![(2000, 1)]), (0, vec![])], false);

    let spectra = decode_peak_list(&buf, 0, 3, 0).unwrap();
    assert_eq!(spectra.num_scans(), 3);
    assert_eq!(spectra.mzs, vec![100.0]);
    assert_eq!(spectra.intensities.row(0), &[0.0]);
    assert_eq!(spectra.intensities.row(1), &[1.0]);
    assert_eq!(spectra.intensities.row(2), &[0.0]);
}

#[test]
fn test_all_scans_empty() {
    let buf = build_peak_list(&[(0, vec![]), (0, vec![])], false);

    let spectra = decode_peak_list(&buf, 0, 2, 3).unwrap();
    assert!(spectra.mzs.is_empty());
    assert_eq!(spectra.intensities.shape(), (2, 0));
}

#[test]
fn test_truncated_pairs_fail() {
    let mut buf = build_peak_list(&[(0, vec![(2000, 1), (2020, 1)])], false);
    buf.truncate(buf.len() - 1);

    let err = decode_peak_list(&buf, 0, 1, 0).unwrap_err();
    assert!(matches!(err, DecodeError::OutOfBounds { .. }));
}

#[test]
fn test_more_scans_than_present_fail() {
    let buf = build_peak_list(&[(0, vec![(2000, 1)])], true);
    let err = decode_peak_list(&buf, 0, 2, 0).unwrap_err();
    assert!(matches!(err, DecodeError::OutOfBounds { .. }));
}

#[test]
fn test_zero_start_word_is_invalid() {
    let mut buf = build_peak_list(&[(0, vec![])], false);
    buf[0] = 0;
    buf[1] = 0;
    let err = decode_peak_list(&buf, 0, 1, 0).unwrap_err();
    assert!(matches!(err, DecodeError::InvalidArgument(_)));
}

#[test]
fn test_large_precision_is_clamped() {
    let buf = build_peak_list(&[(0, vec![(2001, 1), (2003, 2)])], false);

    let clamped = decode_peak_list(&buf, 0, 1, MAX_PRECISION).unwrap();
    for precision in [MAX_PRECISION + 1, 22, u32::MAX] {
        let spectra = decode_peak_list(&buf, 0, 1, precision).unwrap();
        assert!(spectra.mzs.iter().all(|mz| mz.is_finite()));
        assert_eq!(spectra, clamped);
    }
    assert_eq!(quantize_mz(2001, u32::MAX), quantize_mz(2001, MAX_PRECISION));
}

#[test]
fn test_zero_scans_still_checks_offset() {
    let err = decode_peak_list(&[0u8; 4], 8, 0, 0).unwrap_err();
    assert!(matches!(err, DecodeError::OutOfBounds { offset: 8, .. }));

    // an offset at the very end reads nothing and is accepted
    let spectra = decode_peak_list(&[0u8; 4], 4, 0, 0).unwrap();
    assert_eq!(spectra.intensities.shape(), (0, 0));
}

#[test]
fn test_start_word_relocates_scan_block() {
    // data offset 4 holds the start word; scans begin at 4 * 2 - 2 = 6
    let mut buf = vec![0u8; 4];
    buf.extend_from_slice(&4u16.to_be_bytes());
    let tail = build_peak_list(&[(60_000, vec![(2000, 3)])], false);
    buf.extend_from_slice(&tail[2..]);

    let spectra = decode_peak_list(&buf, 4, 1, 0).unwrap();
    assert_eq!(spectra.times, vec![1.0]);
    assert_eq!(spectra.intensities.row(0), &[3.0]);
}

#[test]
fn test_decoding_is_repeatable() {
    let buf = build_peak_list(
        &[
            (1, vec![(5000, 1), (2000, 2), (3000, 0xC001)]),
            (2, vec![(3000, 4), (5000, 0x4002)]),
        ],
        false,
    );

    let first = decode_peak_list(&buf, 0, 2, 1).unwrap();
    let second = decode_peak_list(&buf, 0, 2, 1).unwrap();
    assert_eq!(first, second);
}
