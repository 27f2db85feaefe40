use url::Url;
use validator::ValidateEmail;

/// Longest correlation id the gateway accepts in subscription metadata
pub const MAX_CUSTOM_ID_LEN: usize = 255;

/// Largest checkout total, in cents, accepted for one billing cycle
pub const MAX_CHECKOUT_TOTAL_CENTS: i64 = 1_000_000_000;

/// Validates that the input looks like a valid email address
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email.validate_email()
}

/// Validates a Brazilian CPF: exactly 11 digits once punctuation is stripped.
pub fn is_valid_cpf(cpf: &str) -> bool {
    let digits: String = cpf.chars().filter(|c| !matches!(c, '.' | '-' | ' ')).collect();
    digits.len() == 11 && digits.chars().all(|c| c.is_ascii_digit())
}

/// Strips everything but digits (CPF, phone number, zip code).
pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Validates an ISO birth date (`YYYY-MM-DD`)
pub fn is_valid_birth_date(value: &str) -> bool {
    chrono::NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").is_ok()
}

/// True for a finite, strictly positive, whole number.
pub fn is_positive_integral(value: f64) -> bool {
    value.is_finite() && value > 0.0 && value.fract() == 0.0 && value <= i64::MAX as f64
}

/// `value * amount` when it fits under `MAX_CHECKOUT_TOTAL_CENTS`.
pub fn checkout_total(value: i64, amount: i64) -> Option<i64> {
    value
        .checked_mul(amount)
        .filter(|total| (1..=MAX_CHECKOUT_TOTAL_CENTS).contains(total))
}

/// Sanitizes an opaque correlation id for gateway metadata.
/// Rules:
/// - Only ASCII letters, digits, `-`, `_` and `.` survive
/// - Truncated to 255 characters
/// - Empty after sanitization means no id
pub fn sanitize_custom_id(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .take(MAX_CUSTOM_ID_LEN)
        .collect();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Returns the URL only if it parses and uses the `https` scheme.
pub fn https_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match Url::parse(raw) {
        Ok(url) if url.scheme() == "https" && url.host_str().is_some() => Some(url.to_string()),
        _ => None,
    }
}
