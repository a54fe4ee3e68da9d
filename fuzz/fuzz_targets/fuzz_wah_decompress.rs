#![no_main]

use hoot::bitmap::wah;
use libfuzzer_sys::fuzz_target;

fn trimmed(words: &[u32]) -> &[u32] {
    let end = words.iter().rposition(|&w| w != 0).map_or(0, |i| i + 1);
    &words[..end]
}

fuzz_target!(|tokens: Vec<u32>| {
    // Run lengths are capped so a single token cannot request gigabytes
    let tokens: Vec<u32> = tokens
        .into_iter()
        .map(|t| if t & wah::RUN_FLAG != 0 { t & (wah::RUN_FLAG | wah::ONES_FLAG | 0xFFFF) } else { t })
        .collect();

    // Decoding arbitrary tokens must not panic, and re-encoding the result
    // must decode to the same members
    let words = wah::decompress(&tokens);
    let again = wah::decompress(&wah::compress(&words));
    assert_eq!(trimmed(&again), trimmed(&words));
});
