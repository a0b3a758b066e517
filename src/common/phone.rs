//! Recipient number normalization.

/// Digits in a national subscriber number.
pub const NATIONAL_NUMBER_LEN: usize = 10;

/// Reduce a raw phone number to its national digits.
///
/// Non-digits are dropped, then a leading `country_code` is stripped only
/// when what remains is exactly a national number. A bare
/// 10-digit input is returned as-is, so numbers that happen to start with
/// the country code digits are left alone.
pub fn normalize(raw: &str, country_code: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() == NATIONAL_NUMBER_LEN {
        return digits;
    }

    if !country_code.is_empty() && digits.len() == country_code.len() + NATIONAL_NUMBER_LEN {
        if let Some(rest) = digits.strip_prefix(country_code) {
            return rest.to_string();
        }
    }

    digits
}

/// Normalize and accept only a full national number.
pub fn national_number(raw: &str, country_code: &str) -> Option<String> {
    let number = normalize(raw, country_code);
    (number.len() == NATIONAL_NUMBER_LEN).then_some(number)
}
