#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let (params, buffer) = data.split_at(4);
    let offset = u32::from(params[0]);
    let scans = u32::from(u16::from_le_bytes([params[1], params[2]]));
    let precision = u32::from(params[3] % 4);

    if let Ok(spectra) = rainbow::ms::decode_peak_list(buffer, offset, scans, precision) {
        assert_eq!(
            spectra.intensities.shape(),
            (spectra.times.len(), spectra.mzs.len())
        );
    }
});
