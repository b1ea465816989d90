use rand::Rng;
use time::{Duration, OffsetDateTime};

/// OTP codes stay valid for five minutes after issue.
pub const OTP_TTL: Duration = Duration::minutes(5);

/// Random 6-digit code; the range keeps the leading digit non-zero.
pub fn generate() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..=999_999);
    code.to_string()
}

pub fn expiry_from(now: OffsetDateTime) -> OffsetDateTime {
    now + OTP_TTL
}

pub fn is_expired(expires_at: OffsetDateTime, now: OffsetDateTime) -> bool {
    now > expires_at
}

/// A stored OTP matches only when present, non-empty and byte-equal.
pub fn matches(stored: Option<&str>, submitted: &str) -> bool {
    match stored {
        Some(s) => !s.is_empty() && s == submitted,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_code_is_six_digits() {
        for _ in 0..100 {
            let code = generate();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn expiry_window_is_five_minutes() {
        let now = OffsetDateTime::now_utc();
        let expires = expiry_from(now);
        assert_eq!(expires - now, Duration::minutes(5));
    }

    #[test]
    fn code_within_window_is_not_expired() {
        let now = OffsetDateTime::now_utc();
        let expires = expiry_from(now);
        assert!(!is_expired(expires, now + Duration::minutes(4)));
        // Exactly at the boundary still passes; only strictly past rejects
        assert!(!is_expired(expires, expires));
        assert!(is_expired(expires, expires + Duration::seconds(1)));
    }

    #[test]
    fn expired_code_is_rejected_even_when_matching() {
        let now = OffsetDateTime::now_utc();
        let expires = expiry_from(now);
        let later = now + Duration::minutes(6);
        assert!(matches(Some("123456"), "123456"));
        assert!(is_expired(expires, later));
    }

    #[test]
    fn cleared_or_mismatched_codes_do_not_match() {
        assert!(!matches(None, "123456"));
        assert!(!matches(Some(""), ""));
        assert!(!matches(Some("123456"), "654321"));
    }
}
