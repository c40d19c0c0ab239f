#![no_main]

use libfuzzer_sys::fuzz_target;
use rainbow::masslynx::{
    decode_analog_trace, decode_func, parse_chrom_info, parse_func_index, parse_func_info,
};

fuzz_target!(|data: &[u8]| {
    // Use the first 22-byte multiple as the index, the rest as pair data
    if data.is_empty() {
        return;
    }
    let split = (usize::from(data[0]) * 22).min(data.len() - 1);
    let (idx, dat) = data[1..].split_at(split);

    if let Ok(index) = parse_func_index(idx) {
        if let Ok(width) = index.pair_width(dat.len()) {
            let info = parse_func_info(data).ok();
            let _ = decode_func(dat, &index, width, 2, None, info.as_ref().and_then(|r| r.last()));
        }
    }
    let _ = decode_analog_trace(data);
    let _ = parse_chrom_info(data);
});
