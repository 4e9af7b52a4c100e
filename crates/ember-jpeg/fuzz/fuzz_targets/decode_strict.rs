#![no_main]
use ember_jpeg::ember_core::options::DecoderOptions;
use ember_jpeg::JpegDecoder;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // keep allocations small
    let options = DecoderOptions::new_strict()
        .set_max_width(4096)
        .set_max_height(4096)
        .set_use_threads(false);

    let mut decoder = JpegDecoder::new_with_options(data, options);

    if decoder.decode_headers().is_ok() {
        let _ = decoder.decode();
    }
});
