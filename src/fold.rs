//! ASCII case-folding for the case-insensitive literal fast path.
//!
//! Case-insensitive literal search lower-cases both the pattern and a copy
//! of each chunk, searches the copy, and reports offsets against the
//! original bytes. The fold is a pure byte-level ASCII transform: `A`-`Z`
//! map to `a`-`z`, every other byte passes through untouched. Full Unicode
//! case-folding is the regex engine's job, never this module's.
//!
//! Uses platform-specific SIMD intrinsics:
//! - x86_64: SSE2 (16 bytes/iteration)
//! - aarch64: NEON (16 bytes/iteration)
//! - Other: scalar fallback

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

#[cfg(target_arch = "aarch64")]
use std::arch::aarch64::*;

/// Lower-case `text` into `out`, 16 bytes per SSE2 iteration.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
unsafe fn lower_into_x86(text: &[u8], out: &mut Vec<u8>) {
    out.clear();
    out.reserve(text.len());

    let len = text.len();
    let simd_end = len - (len % 16);

    let upper_a = _mm_set1_epi8(b'A' as i8 - 1);
    let upper_z = _mm_set1_epi8(b'Z' as i8 + 1);
    let case_bit = _mm_set1_epi8(32);

    let mut i = 0;
    while i < simd_end {
        let block = _mm_loadu_si128(text.as_ptr().add(i) as *const __m128i);

        // Uppercase iff 'A'-1 < byte < 'Z'+1; add the case bit to those.
        let gt_a = _mm_cmpgt_epi8(block, upper_a);
        let lt_z = _mm_cmplt_epi8(block, upper_z);
        let is_upper = _mm_and_si128(gt_a, lt_z);
        let folded = _mm_add_epi8(block, _mm_and_si128(case_bit, is_upper));

        let old_len = out.len();
        out.set_len(old_len + 16);
        _mm_storeu_si128(out.as_mut_ptr().add(old_len) as *mut __m128i, folded);

        i += 16;
    }

    for &byte in &text[i..] {
        out.push(byte.to_ascii_lowercase());
    }
}

/// Lower-case `text` into `out`, 16 bytes per NEON iteration.
#[cfg(target_arch = "aarch64")]
unsafe fn lower_into_arm(text: &[u8], out: &mut Vec<u8>) {
    out.clear();
    out.reserve(text.len());

    let len = text.len();
    let simd_end = len - (len % 16);

    let upper_a = vdupq_n_u8(b'A' - 1);
    let upper_z = vdupq_n_u8(b'Z' + 1);
    let case_bit = vdupq_n_u8(32);

    let mut i = 0;
    while i < simd_end {
        let block = vld1q_u8(text.as_ptr().add(i));

        let gt_a = vcgtq_u8(block, upper_a);
        let lt_z = vcltq_u8(block, upper_z);
        let is_upper = vandq_u8(gt_a, lt_z);
        let folded = vaddq_u8(block, vandq_u8(case_bit, is_upper));

        let old_len = out.len();
        out.set_len(old_len + 16);
        vst1q_u8(out.as_mut_ptr().add(old_len), folded);

        i += 16;
    }

    for &byte in &text[i..] {
        out.push(byte.to_ascii_lowercase());
    }
}

/// Scalar fold, used on other architectures and for short inputs where
/// SIMD setup costs more than it saves.
#[inline(always)]
pub fn ascii_lower_scalar(text: &[u8], out: &mut Vec<u8>) {
    out.clear();
    out.reserve(text.len());
    for &byte in text {
        out.push(byte.to_ascii_lowercase());
    }
}

/// Lower-case `text` into `out` with the best implementation for the
/// current CPU. The result is always identical to [`ascii_lower_scalar`].
///
/// # Example
/// ```
/// use searchy::fold::ascii_lower_into;
///
/// let mut out = Vec::new();
/// ascii_lower_into(b"With Sherlock", &mut out);
/// assert_eq!(&out, b"with sherlock");
/// ```
pub fn ascii_lower_into(text: &[u8], out: &mut Vec<u8>) {
    if text.len() < 64 {
        ascii_lower_scalar(text, out);
        return;
    }

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("sse2") {
            unsafe { lower_into_x86(text, out) };
            return;
        }
        ascii_lower_scalar(text, out);
    }

    #[cfg(target_arch = "aarch64")]
    {
        unsafe { lower_into_arm(text, out) };
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        ascii_lower_scalar(text, out);
    }
}
