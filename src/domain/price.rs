//! Localized price normalization
//!
//! Catalog prices arrive as Brazilian-formatted strings (`R$ 1.234,56`),
//! sometimes carrying a stray `Â` left over from a Latin-1/UTF-8 mix-up
//! around the non-breaking space. Parsing never fails: anything that does
//! not yield a finite number becomes `0.0`, which callers treat as "no price".

/// Currency marker stripped before parsing.
const CURRENCY_MARKER: &str = "R$";

/// Mojibake remnant of a non-breaking space decoded with the wrong charset.
const MOJIBAKE_ARTIFACT: char = 'Â';

/// Normalize a localized price string into a decimal value.
///
/// Returns `0.0` for empty, malformed or non-finite input.
#[must_use]
pub fn parse_price(raw: &str) -> f64 {
    let normalized = raw
        .replace(CURRENCY_MARKER, "")
        .replace(MOJIBAKE_ARTIFACT, "")
        .replace('.', "")
        .replace(',', ".");

    // Installment text sometimes precedes the amount; the value is the last token.
    let Some(token) = normalized.split_whitespace().last() else {
        return 0.0;
    };

    match token.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("R$ 1.234,56", 1234.56)]
    #[case("R$Â 941,16", 941.16)]
    #[case("R$ 1.000", 1000.0)]
    #[case("  R$ 599,99  ", 599.99)]
    #[case("R$\u{a0}2.199,90", 2199.90)]
    #[case("10x de R$ 99,90", 99.90)]
    fn parses_localized_prices(#[case] raw: &str, #[case] expected: f64) {
        let parsed = parse_price(raw);
        assert!((parsed - expected).abs() < 1e-9, "{raw:?} -> {parsed}");
    }

    #[rstest]
    #[case("R$ abc")]
    #[case("")]
    #[case("   ")]
    #[case("R$")]
    #[case("R$ inf")]
    #[case("NaN")]
    fn unparseable_input_yields_zero(#[case] raw: &str) {
        assert_eq!(parse_price(raw), 0.0);
    }
}
