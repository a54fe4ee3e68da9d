//! Word-Aligned Hybrid (WAH) run-length codec.
//!
//! The dense bitmap is scanned 31 bits at a time through a window that may
//! straddle two 32-bit words. Every token in the output is one of:
//!
//! - a literal (top bit clear) holding the 31 window bits verbatim
//! - a zero run `0x8000_0000 | count`
//! - a one run `0xC000_0000 | count`
//!
//! Run counts are measured in bits. Bits are addressed most-significant
//! first within a word, matching [`AdaptiveBitset`](super::AdaptiveBitset).

/// Marks a token as a run rather than a literal
pub const RUN_FLAG: u32 = 0x8000_0000;
/// Marks a run token as a run of ones
pub const ONES_FLAG: u32 = 0x4000_0000;
/// Largest bit count a single run token can carry
pub const MAX_RUN: u32 = 0x3FFF_FFFF;
/// Value of a literal window with every bit set
pub const LITERAL_MASK: u32 = 0x7FFF_FFFF;

const WINDOW: usize = 31;

/// Read the 31-bit window starting at `bit`. Bits past the end read as zero.
#[inline]
fn take_31_bits(data: &[u32], bit: usize) -> u32 {
    let word = bit / 32;
    let off = bit % 32;
    let hi = data.get(word).copied().unwrap_or(0) as u64;
    let lo = data.get(word + 1).copied().unwrap_or(0) as u64;
    let joined = (hi << 32) | lo;
    ((joined >> (33 - off)) as u32) & LITERAL_MASK
}

#[inline]
fn flush_run(out: &mut Vec<u32>, count: &mut u32, ones: bool) {
    if *count > 0 {
        let flag = if ones { RUN_FLAG | ONES_FLAG } else { RUN_FLAG };
        out.push(flag | *count);
        *count = 0;
    }
}

/// Compress a dense word array into WAH tokens
pub fn compress(data: &[u32]) -> Vec<u32> {
    let mut out = Vec::new();
    let mut zeros = 0u32;
    let mut ones = 0u32;
    let total = data.len() * 32;
    let mut bit = 0;

    while bit < total {
        let window = take_31_bits(data, bit);
        bit += WINDOW;

        match window {
            0 => {
                flush_run(&mut out, &mut ones, true);
                if zeros + WINDOW as u32 > MAX_RUN {
                    flush_run(&mut out, &mut zeros, false);
                }
                zeros += WINDOW as u32;
            }
            LITERAL_MASK => {
                flush_run(&mut out, &mut zeros, false);
                if ones + WINDOW as u32 > MAX_RUN {
                    flush_run(&mut out, &mut ones, true);
                }
                ones += WINDOW as u32;
            }
            literal => {
                flush_run(&mut out, &mut ones, true);
                flush_run(&mut out, &mut zeros, false);
                out.push(literal);
            }
        }
    }

    flush_run(&mut out, &mut ones, true);
    flush_run(&mut out, &mut zeros, false);
    out
}

#[inline]
fn ensure_len(out: &mut Vec<u32>, len: usize) {
    if out.len() < len {
        out.resize(len, 0);
    }
}

fn write_31_bits(out: &mut Vec<u32>, bit: usize, value: u32) {
    let word = bit / 32;
    let off = bit % 32;
    ensure_len(out, word + 2);

    let joined = ((value & LITERAL_MASK) as u64) << (33 - off);
    out[word] |= (joined >> 32) as u32;
    out[word + 1] |= joined as u32;
}

fn write_ones(out: &mut Vec<u32>, start: usize, count: usize) {
    let end = start + count;
    ensure_len(out, end.div_ceil(32));

    let mut bit = start;
    while bit < end {
        let word = bit / 32;
        let off = bit % 32;
        let span = (32 - off).min(end - bit);
        let mask = if span == 32 {
            u32::MAX
        } else {
            ((1u32 << span) - 1) << (32 - off - span)
        };
        out[word] |= mask;
        bit += span;
    }
}

/// Expand WAH tokens back into a dense word array.
///
/// The output is sized to cover the last literal or one-run written; a
/// trailing zero run does not extend it.
pub fn decompress(tokens: &[u32]) -> Vec<u32> {
    let mut out = Vec::new();
    let mut bit = 0usize;
    let mut end = 0usize;

    for &token in tokens {
        if token & RUN_FLAG == 0 {
            write_31_bits(&mut out, bit, token);
            bit += WINDOW;
            end = bit;
        } else {
            let count = (token & MAX_RUN) as usize;
            if token & ONES_FLAG != 0 && count > 0 {
                write_ones(&mut out, bit, count);
                end = bit + count;
            }
            bit += count;
        }
    }

    out.resize(end.div_ceil(32), 0);
    out
}

/// Value of bit `index` read straight from the token stream
pub fn bit_at(tokens: &[u32], index: u32) -> bool {
    let index = index as usize;
    let mut bit = 0usize;
    for &token in tokens {
        let span = if token & RUN_FLAG == 0 {
            WINDOW
        } else {
            (token & MAX_RUN) as usize
        };
        if index < bit + span {
            return if token & RUN_FLAG == 0 {
                token & (1u32 << (WINDOW - 1 - (index - bit))) != 0
            } else {
                token & ONES_FLAG != 0
            };
        }
        bit += span;
    }
    false
}
