//! User-facing wording for the invite-code flow.

use shared::error::{ApiException, ErrorCode};

/// Fixed title and body for each way an invite acceptance can be turned
/// down. Codes outside the pairing family return `None`.
pub fn pairing_denial(code: ErrorCode) -> Option<(&'static str, &'static str)> {
    match code {
        ErrorCode::InviteNotFound => Some((
            "Invite not found",
            "Double-check the code and ask your partner to read it out again.",
        )),
        ErrorCode::InviteAlreadyUsed => Some((
            "Invite already used",
            "That code has been spent. Ask your partner for a fresh one.",
        )),
        ErrorCode::InviteSelfUse => Some((
            "That's your own code",
            "Share it with your partner instead of entering it yourself.",
        )),
        ErrorCode::AlreadyPaired => Some((
            "Already paired",
            "One of you is already connected to a partner.",
        )),
        _ => None,
    }
}

/// Title and body to show for a failed acceptance. Known denials get their
/// fixed wording; anything else keeps the server's message verbatim.
pub fn describe_failure(error: &ApiException) -> (String, String) {
    match pairing_denial(error.code) {
        Some((title, body)) => (title.to_string(), body.to_string()),
        None => ("Pairing failed".to_string(), error.message.clone()),
    }
}

/// Cheap local check that the text looks like an invite code, so obvious
/// typos never reach the server. Matching the real code is still the
/// server's call.
pub fn is_invite_code_shaped(code: &str) -> bool {
    let code = code.trim().to_uppercase();
    let Some(suffix) = code.strip_prefix("LOVE-") else {
        return false;
    };
    suffix.len() == 4
        && suffix
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

#[cfg(test)]
#[path = "tests/pairing_tests.rs"]
mod tests;
