#![no_main]

use frankenengine_live_edit::expression_extractor::extract;
use frankenengine_live_edit::parser::ParserLimits;
use libfuzzer_sys::fuzz_target;

const MAX_INPUT_BYTES: usize = 4096;

fuzz_target!(|data: &[u8]| {
    if data.len() > MAX_INPUT_BYTES {
        return;
    }
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let limits = ParserLimits::default();
    let Ok(first) = extract(text, limits) else {
        return;
    };
    assert!(text.contains(&first.text));
    let second = extract(&first.text, limits).expect("extracted text re-extracts");
    assert_eq!(second.text, first.text);
});
