use regex::Regex;
use std::sync::OnceLock;

/// Accepts `local@domain.tld`; a bare `local@domain` is rejected.
pub fn email_is_valid(email: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"));
    re.is_match(email)
}

/// Strips spaces, dashes, parentheses, and plus signs, then requires 10 to 15
/// digits and nothing else. Returns the digit-only form.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let stripped: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '+'))
        .collect();

    if stripped.is_empty() || !stripped.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if !(10..=15).contains(&stripped.len()) {
        return None;
    }
    Some(stripped)
}
