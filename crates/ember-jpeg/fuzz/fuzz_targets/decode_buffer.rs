#![no_main]
use ember_jpeg::JpegDecoder;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut decoder = JpegDecoder::new(data);
    let _ = decoder.decode();
});
