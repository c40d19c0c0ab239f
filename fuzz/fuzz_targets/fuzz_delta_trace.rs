#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The first six bytes pick the parameters, the rest is the buffer
    if data.len() < 6 {
        return;
    }
    let (params, buffer) = data.split_at(6);
    let offset = u32::from(params[0]) * 4;
    let records = u32::from(u16::from_le_bytes([params[1], params[2]]));
    let channels = u32::from(u16::from_le_bytes([params[3], params[4]]));

    // Either path must fail cleanly or agree with the other
    let sequential = rainbow::uv::decode_delta_trace(buffer, offset, records, channels);
    if params[5] & 1 == 1 {
        let indexed = rainbow::uv::decode_delta_trace_indexed(buffer, offset, records, channels);
        assert_eq!(sequential.is_ok(), indexed.is_ok());
        if let (Ok(a), Ok(b)) = (sequential, indexed) {
            assert_eq!(a, b);
        }
    }
});
