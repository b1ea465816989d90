//! HTML bodies for the three transactional emails. The `{{email}}` and
//! `{{otp}}` placeholders are substituted with plain string replacement.

pub const WELCOME_SUBJECT: &str = "Welcome to MedTriage";
pub const VERIFY_SUBJECT: &str = "Account Verification OTP";
pub const RESET_SUBJECT: &str = "Password Reset OTP";

const WELCOME_TEMPLATE: &str = r#"<html>
  <body style="font-family: sans-serif;">
    <h2>Welcome to MedTriage</h2>
    <p>Your account <b>{{email}}</b> has been created.</p>
    <p>Verify your email from the account page to unlock all features.</p>
  </body>
</html>"#;

const VERIFY_TEMPLATE: &str = r#"<html>
  <body style="font-family: sans-serif;">
    <h2>Verify your account</h2>
    <p>Use this code to verify <b>{{email}}</b>:</p>
    <p style="font-size: 24px; letter-spacing: 4px;"><b>{{otp}}</b></p>
    <p>The code expires in 5 minutes.</p>
  </body>
</html>"#;

const RESET_TEMPLATE: &str = r#"<html>
  <body style="font-family: sans-serif;">
    <h2>Password reset</h2>
    <p>A password reset was requested for <b>{{email}}</b>. Your code:</p>
    <p style="font-size: 24px; letter-spacing: 4px;"><b>{{otp}}</b></p>
    <p>The code expires in 5 minutes. Ignore this email if you did not ask for it.</p>
  </body>
</html>"#;

pub fn welcome(email: &str) -> String {
    WELCOME_TEMPLATE.replace("{{email}}", email)
}

pub fn verify_otp(email: &str, otp: &str) -> String {
    VERIFY_TEMPLATE
        .replace("{{email}}", email)
        .replace("{{otp}}", otp)
}

pub fn reset_otp(email: &str, otp: &str) -> String {
    RESET_TEMPLATE
        .replace("{{email}}", email)
        .replace("{{otp}}", otp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welcome_substitutes_email() {
        let body = welcome("a@b.com");
        assert!(body.contains("a@b.com"));
        assert!(!body.contains("{{email}}"));
    }

    #[test]
    fn otp_templates_substitute_both_placeholders() {
        for body in [verify_otp("a@b.com", "123456"), reset_otp("a@b.com", "654321")] {
            assert!(body.contains("a@b.com"));
            assert!(!body.contains("{{email}}"));
            assert!(!body.contains("{{otp}}"));
        }
        assert!(verify_otp("x@y.z", "111222").contains("111222"));
        assert!(reset_otp("x@y.z", "333444").contains("333444"));
    }
}
