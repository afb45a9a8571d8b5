//! Barcode format validation and sequential-run detection.

use crate::settings::Symbology;

/// Validate a barcode against the outlet's expected symbology.
///
/// `Any` is a format check only: non-empty printable ASCII up to 64 chars.
/// `Ean13` requires 13 digits with a valid mod-10 check digit. `Code39`
/// restricts to the Code 39 character set.
pub fn validate_barcode(symbology: Symbology, code: &str) -> bool {
    match symbology {
        Symbology::Any => is_plausible_format(code),
        Symbology::Ean13 => is_valid_ean13(code),
        Symbology::Code39 => is_valid_code39(code),
    }
}

fn is_plausible_format(code: &str) -> bool {
    !code.is_empty() && code.len() <= 64 && code.bytes().all(|b| (0x21..=0x7e).contains(&b))
}

fn is_valid_ean13(code: &str) -> bool {
    if code.len() != 13 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let digits: Vec<i64> = code.bytes().map(|b| i64::from(b - b'0')).collect();
    // Odd positions (0-based even index) weigh 1, even positions weigh 3.
    let sum: i64 = digits[..12]
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
        .sum();
    let check = (10 - sum % 10) % 10;
    digits[12] == check
}

fn is_valid_code39(code: &str) -> bool {
    const CHARSET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-. $/+%";
    !code.is_empty() && code.len() <= 64 && code.chars().all(|c| CHARSET.contains(c))
}

/// Split a barcode into its non-numeric prefix and trailing numeric suffix.
/// Returns None when the code has no trailing digits.
pub fn split_numeric_suffix(code: &str) -> Option<(&str, u64)> {
    let digits_start = code
        .rfind(|c: char| !c.is_ascii_digit())
        .map_or(0, |i| i + c_len(code, i));
    if digits_start >= code.len() {
        return None;
    }
    let suffix: u64 = code[digits_start..].parse().ok()?;
    Some((&code[..digits_start], suffix))
}

// Byte length of the char starting at index i, so suffix splitting stays on
// a char boundary for non-ASCII prefixes.
fn c_len(code: &str, i: usize) -> usize {
    code[i..].chars().next().map_or(1, char::len_utf8)
}

/// Whether `codes` is one unbroken ascending run: every code shares the same
/// prefix and each numeric suffix is exactly one more than the previous.
pub fn is_sequential_run(codes: &[&str]) -> bool {
    if codes.len() < 2 {
        return false;
    }
    let Some((prefix, first)) = split_numeric_suffix(codes[0]) else {
        return false;
    };
    codes[1..].iter().enumerate().all(|(i, code)| {
        // A run past u64::MAX cannot continue.
        let expected = match first.checked_add(i as u64 + 1) {
            Some(n) => n,
            None => return false,
        };
        split_numeric_suffix(code)
            .map(|(p, n)| p == prefix && n == expected)
            .unwrap_or(false)
    })
}
