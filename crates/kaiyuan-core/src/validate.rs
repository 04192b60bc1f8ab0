use crate::models::{LoginRequest, PasswordLoginRequest, RegisterRequest};

pub const USERNAME_MAX_LEN: usize = 64;
pub const PASSWORD_MIN_LEN: usize = 6;

/// Lookup key for emails: surrounding whitespace dropped, ASCII lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Loose shape check: one `@`, non-empty local part, a dot somewhere in the domain.
pub fn is_valid_email(email: &str) -> bool {
    let e = email.trim();
    if e.chars().any(char::is_whitespace) {
        return false;
    }

    match e.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

pub fn validate_login(req: &LoginRequest) -> Result<(), &'static str> {
    if req.code.trim().is_empty() {
        return Err("Invalid request. Please try again later.");
    }
    Ok(())
}

pub fn validate_password_login(req: &PasswordLoginRequest) -> Result<(), &'static str> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err("Invalid input data");
    }
    Ok(())
}

pub fn validate_register(req: &RegisterRequest) -> Result<(), &'static str> {
    let username = req.username.trim();
    if username.is_empty() || username.chars().count() > USERNAME_MAX_LEN {
        return Err("Username must be 1-64 characters");
    }
    if !is_valid_email(&req.email) {
        return Err("Invalid email address");
    }
    if req.password.chars().count() < PASSWORD_MIN_LEN {
        return Err("Password must be at least 6 characters");
    }
    Ok(())
}
