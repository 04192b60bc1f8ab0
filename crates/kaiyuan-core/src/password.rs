use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use std::sync::OnceLock;

/// Password hashing for password-bearing accounts.
///
/// New hashes are Argon2id in PHC string format. Accounts migrated from the
/// previous backend still carry bcrypt hashes (`$2a$`, `$2b$`, `$2y$`); those
/// verify through [`verify_password`] unchanged.
///
/// Params are expressed as:
/// - m_cost: memory cost in KiB
/// - t_cost: iterations
/// - p_cost: parallelism
const DEFAULT_M_COST_KIB: u32 = 19_456;
const DEFAULT_T_COST: u32 = 2;
const DEFAULT_P_COST: u32 = 1;

const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

fn argon2() -> anyhow::Result<Argon2<'static>> {
    let params = Params::new(DEFAULT_M_COST_KIB, DEFAULT_T_COST, DEFAULT_P_COST, None)
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 parameters: {e}"))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a plaintext password and return a PHC-encoded Argon2id hash string.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let argon2 = argon2()?;
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?
        .to_string();

    Ok(hash)
}

pub fn is_legacy_bcrypt_hash(password_hash: &str) -> bool {
    BCRYPT_PREFIXES.iter().any(|p| password_hash.starts_with(p))
}

/// Verify a plaintext password against a stored hash.
///
/// Returns:
/// - Ok(true)  if password matches
/// - Ok(false) if password does not match
/// - Err(_)    if the stored hash is malformed
pub fn verify_password(password: &str, password_hash: &str) -> anyhow::Result<bool> {
    if is_legacy_bcrypt_hash(password_hash) {
        return bcrypt::verify(password, password_hash)
            .map_err(|e| anyhow::anyhow!("Failed to verify bcrypt hash: {e}"));
    }

    let parsed = PasswordHash::new(password_hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;
    let argon2 = argon2()?;

    match argon2.verify_password(password.as_bytes(), &parsed) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Failed to verify password: {e}")),
    }
}

static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

/// Argon2id hash of a throwaway password, built once with the same params as
/// real hashes.
fn dummy_hash() -> Option<&'static str> {
    DUMMY_HASH
        .get_or_init(|| hash_password("kaiyuan-dummy-password").ok())
        .as_deref()
}

/// Run a full Argon2 verification whose outcome is discarded.
///
/// Login paths that reject before reaching a stored hash call this so that
/// their latency matches a wrong-password rejection.
pub fn verify_against_dummy(password: &str) {
    if let Some(hash) = dummy_hash() {
        let _ = verify_password(password, hash);
    }
}
