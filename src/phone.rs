//! Phone number canonicalization for submission and formatting for display.
//!
//! Canonical form is `+<country code><digits>` with no punctuation. Numbers
//! entered without a leading `+` are assumed to be North American (`+1`).

const DEFAULT_COUNTRY_CODE: &str = "+1";

/// Convert user input into canonical dialable form.
pub fn to_canonical(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    match trimmed.strip_prefix('+') {
        Some(rest) => format!("+{}", digits(rest)),
        None => format!("{}{}", DEFAULT_COUNTRY_CODE, digits(trimmed)),
    }
}

/// Render a canonical number for humans.
///
/// `+1` numbers with ten national digits become `(XXX) XXX-XXXX`. Other `+`
/// numbers are shown as a three character prefix followed by the remaining
/// digits split in half (first half rounded up). This is a display heuristic,
/// not real national grouping. Anything else is returned unchanged.
pub fn to_display(canonical: &str) -> String {
    if canonical.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = canonical.chars().collect();

    if canonical.starts_with(DEFAULT_COUNTRY_CODE) && chars.len() == 12 {
        let area: String = chars[2..5].iter().collect();
        let exchange: String = chars[5..8].iter().collect();
        let line: String = chars[8..].iter().collect();
        return format!("({}) {}-{}", area, exchange, line);
    }

    if canonical.starts_with('+') {
        let split = chars.len().min(3);
        let country: String = chars[..split].iter().collect();
        let rest = &chars[split..];
        let mid = rest.len().div_ceil(2);
        let first: String = rest[..mid].iter().collect();
        let second: String = rest[mid..].iter().collect();
        return format!("{} {} {}", country, first, second);
    }

    canonical.to_string()
}

fn digits(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_from_us_formatting() {
        assert_eq!(to_canonical("(703) 939-7628"), "+17039397628");
        assert_eq!(to_canonical("  703.939.7628 "), "+17039397628");
    }

    #[test]
    fn test_canonical_keeps_explicit_country_code() {
        assert_eq!(to_canonical("+34 444 48 888"), "+3444448888");
        assert_eq!(to_canonical("+1 (703) 939-7628"), "+17039397628");
    }

    #[test]
    fn test_canonical_empty_input() {
        assert_eq!(to_canonical(""), "");
        assert_eq!(to_canonical("   "), "");
    }

    #[test]
    fn test_display_us_number() {
        assert_eq!(to_display("+17039397628"), "(703) 939-7628");
        assert_eq!(to_display("+12025550143"), "(202) 555-0143");
    }

    #[test]
    fn test_display_international_number_splits_in_half() {
        assert_eq!(to_display("+3444448888"), "+34 4444 8888");
        // odd remainder: first group takes the extra digit
        assert_eq!(to_display("+44207946095"), "+44 20794 6095");
    }

    #[test]
    fn test_display_us_prefix_with_wrong_length_uses_generic_rule() {
        assert_eq!(to_display("+1703939762"), "+17 0393 9762");
    }

    #[test]
    fn test_display_passes_other_shapes_through() {
        assert_eq!(to_display(""), "");
        assert_eq!(to_display("7039397628"), "7039397628");
        assert_eq!(to_display("ext. 12"), "ext. 12");
    }

    #[test]
    fn test_display_short_and_non_ascii_input_does_not_panic() {
        assert_eq!(to_display("+"), "+  ");
        assert_eq!(to_display("+1"), "+1  ");
        assert_eq!(to_display("+1é3"), "+1é 3 ");
    }

    #[test]
    fn test_round_trip_us_input() {
        let canonical = to_canonical("(703) 939-7628");
        assert_eq!(to_display(&canonical), "(703) 939-7628");
    }
}
