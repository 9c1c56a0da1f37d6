//! Stock-code normalization, per spec.md §3 and §8's round-trip laws.

/// Normalize any reasonable representation of a CN instrument code into the
/// canonical 6-digit zero-padded form.
///
/// Strips `sh`/`sz`/`SH`/`SZ`/`bj`/`BJ` prefixes and `.SH`/`.SZ`/`.BJ`
/// suffixes, discards any remaining non-digit characters, then left-pads
/// with zeros to 6 digits. `normalize_code(normalize_code(x)) ==
/// normalize_code(x)` holds because the output is always 6 ASCII digits,
/// which this function maps to itself.
#[must_use]
pub fn normalize_code(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    let stripped = lower
        .strip_prefix("sh")
        .or_else(|| lower.strip_prefix("sz"))
        .or_else(|| lower.strip_prefix("bj"))
        .unwrap_or(&lower);
    let digits: String = stripped.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return "000000".to_string();
    }
    if digits.len() >= 6 {
        digits[digits.len() - 6..].to_string()
    } else {
        format!("{digits:0>6}")
    }
}

/// Derive the Yahoo-style `full_symbol` from a normalized 6-digit code, per
/// spec.md §3's invariant table. Rewriting this rule is a breaking change.
#[must_use]
pub fn full_symbol(code6: &str) -> String {
    format!("{code6}.{}", exchange_suffix(code6))
}

/// Return just the exchange suffix (`SS`, `SZ`, or `BJ`) for a normalized
/// 6-digit code, based on its prefix.
#[must_use]
pub fn exchange_suffix(code6: &str) -> &'static str {
    let prefix1 = &code6[..1.min(code6.len())];
    let prefix2 = &code6[..2.min(code6.len())];
    match prefix2 {
        "60" | "68" | "90" => "SS",
        "00" | "30" | "20" => "SZ",
        _ => match prefix1 {
            "8" | "4" => "BJ",
            _ => "SZ",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_idempotent() {
        for raw in ["sz000001", "000001", "1", "SZ.000001"] {
            let once = normalize_code(raw);
            assert_eq!(once, "000001", "input {raw}");
            assert_eq!(normalize_code(&once), once);
        }
    }

    #[test]
    fn full_symbol_derivation() {
        assert_eq!(full_symbol("600036"), "600036.SS");
        assert_eq!(full_symbol("000001"), "000001.SZ");
        assert_eq!(full_symbol("430001"), "430001.BJ");
    }
}
