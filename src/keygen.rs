//! License key and order number generation.
//!
//! Keys follow `PREFIX-PROD4-DUR-XXXX-XXXX`, e.g. `MGMA-APEX-LT-K7WX-9QRT`.
//! Random segments are drawn from a 32-symbol alphabet that excludes the
//! visually ambiguous I, O, 0 and 1. No collision check is done at
//! generation time; the unique index on `license_key` catches the 32^-8
//! case instead of letting it corrupt data.

use rand::Rng;

const SECONDS_PER_DAY: i64 = 86400;

/// 32 symbols, ambiguous characters excluded.
const KEY_ALPHABET: &str = "ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

fn random_segment(len: usize) -> String {
    let chars: Vec<char> = KEY_ALPHABET.chars().collect();
    let mut rng = rand::thread_rng();
    (0..len).map(|_| chars[rng.gen_range(0..chars.len())]).collect()
}

/// Map a human duration label to its key segment.
///
/// "Lifetime Access" -> LT, "30 Days" -> 30D, "7 Days" -> 7D,
/// anything else (including "24 Hours" / "1 Day") -> 1D.
pub fn duration_code(duration: &str) -> &'static str {
    let lower = duration.to_lowercase();
    if lower.contains("lifetime") {
        "LT"
    } else if lower.contains("30") {
        "30D"
    } else if lower.contains('7') {
        "7D"
    } else {
        "1D"
    }
}

/// Seconds of access granted by a duration label. None = perpetual.
pub fn duration_seconds(duration: &str) -> Option<i64> {
    match duration_code(duration) {
        "LT" => None,
        "30D" => Some(30 * SECONDS_PER_DAY),
        "7D" => Some(7 * SECONDS_PER_DAY),
        _ => Some(SECONDS_PER_DAY),
    }
}

/// Generate a license key: `PREFIX-PROD4-DUR-XXXX-XXXX`.
///
/// PROD4 is the first four characters of the product slug, uppercased;
/// shorter slugs use the whole slug.
pub fn generate_license_key(prefix: &str, product_slug: &str, duration: &str) -> String {
    let product_part: String = product_slug
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(4)
        .collect::<String>()
        .to_uppercase();

    format!(
        "{}-{}-{}-{}-{}",
        prefix,
        product_part,
        duration_code(duration),
        random_segment(4),
        random_segment(4),
    )
}

/// Generate a human-readable order number: `ORD-XXXXXX`.
pub fn generate_order_number() -> String {
    format!("ORD-{}", random_segment(6))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_codes() {
        assert_eq!(duration_code("Lifetime Access"), "LT");
        assert_eq!(duration_code("lifetime"), "LT");
        assert_eq!(duration_code("30 Days"), "30D");
        assert_eq!(duration_code("30-day plan"), "30D");
        assert_eq!(duration_code("7 Days"), "7D");
        assert_eq!(duration_code("1 Week (7 days)"), "7D");
        assert_eq!(duration_code("24 Hours"), "1D");
        assert_eq!(duration_code("1 Day"), "1D");
        assert_eq!(duration_code(""), "1D");
    }

    #[test]
    fn test_duration_seconds() {
        assert_eq!(duration_seconds("Lifetime Access"), None);
        assert_eq!(duration_seconds("30 Days"), Some(30 * 86400));
        assert_eq!(duration_seconds("7 Days"), Some(7 * 86400));
        assert_eq!(duration_seconds("24 Hours"), Some(86400));
    }

    #[test]
    fn test_key_format_lifetime_apex() {
        let key = generate_license_key("MGMA", "apex", "Lifetime Access");
        let parts: Vec<&str> = key.split('-').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0], "MGMA");
        assert_eq!(parts[1], "APEX");
        assert_eq!(parts[2], "LT");
        for segment in &parts[3..] {
            assert_eq!(segment.len(), 4);
            assert!(segment
                .chars()
                .all(|c| KEY_ALPHABET.contains(c)));
        }
    }

    #[test]
    fn test_key_truncates_long_slug() {
        let key = generate_license_key("MGMA", "warzone-unlock", "30 Days");
        assert!(key.starts_with("MGMA-WARZ-30D-"));
    }

    #[test]
    fn test_key_short_slug_uses_whole_slug() {
        let key = generate_license_key("MGMA", "rx", "7 Days");
        assert!(key.starts_with("MGMA-RX-7D-"));
    }

    #[test]
    fn test_key_strips_non_alphanumeric() {
        let key = generate_license_key("MGMA", "r-6", "1 Day");
        assert!(key.starts_with("MGMA-R6-1D-"));
    }

    #[test]
    fn test_alphabet_excludes_ambiguous() {
        for c in ['I', 'O', '0', '1'] {
            assert!(!KEY_ALPHABET.contains(c));
        }
        assert_eq!(KEY_ALPHABET.len(), 32);
    }

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number();
        assert!(number.starts_with("ORD-"));
        assert_eq!(number.len(), 10);
    }

    #[test]
    fn test_keys_are_random() {
        let a = generate_license_key("MGMA", "apex", "Lifetime");
        let b = generate_license_key("MGMA", "apex", "Lifetime");
        assert_ne!(a, b);
    }
}
