//! Password policy: verification against stored material, migration rules and
//! hashing.
//!
//! New hashes are Argon2id PHC strings with a fixed work factor:
//! 19 MiB of memory, 2 passes, 1 lane. Legacy bcrypt material
//! (`$2a$`, `$2b$`, `$2y$`) still verifies and is upgraded for superadmins.
//!
//! Request paths use the `*_async` variants, which run the hashing work on
//! the blocking thread pool.

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use tracing::warn;

use super::models::{looks_hashed, PasswordMaterial, Role};

pub const HASH_MEMORY_KIB: u32 = 19 * 1024;
pub const HASH_ITERATIONS: u32 = 2;
pub const HASH_PARALLELISM: u32 = 1;

#[derive(Clone, Copy, Debug, Default)]
pub struct PasswordPolicy;

impl PasswordPolicy {
    /// Check a supplied password against stored material.
    ///
    /// Plaintext material is compared for equality; hashed material is
    /// verified. Unsupported hash schemes never match.
    #[must_use]
    pub fn verify(&self, supplied: &str, stored: &PasswordMaterial) -> bool {
        match stored {
            PasswordMaterial::Plaintext(plain) => plain == supplied,
            PasswordMaterial::Hashed(hash) => verify_hash(supplied, hash),
        }
    }

    /// Only superadmin passwords are upgraded on login: plaintext and legacy
    /// bcrypt material become Argon2id. `user` accounts keep plaintext.
    #[must_use]
    pub fn needs_migration(&self, stored: &PasswordMaterial, role: Role) -> bool {
        let legacy = match stored {
            PasswordMaterial::Plaintext(_) => true,
            PasswordMaterial::Hashed(hash) => is_bcrypt(hash),
        };
        legacy && role == Role::Superadmin
    }

    /// Salted hash of `plain`.
    ///
    /// # Errors
    /// Returns an error if the hasher cannot be built or hashing fails.
    pub fn hash(&self, plain: &str) -> Result<PasswordMaterial> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = hasher()?
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| anyhow!("failed to hash password: {e}"))?;

        Ok(PasswordMaterial::Hashed(hash.to_string()))
    }

    /// Material to persist for a freshly supplied password.
    ///
    /// Superadmin passwords are hashed. Other roles keep plaintext unless the
    /// plaintext itself would be read back as a hash.
    ///
    /// # Errors
    /// Returns an error if hashing fails.
    pub fn material_for(&self, role: Role, plain: &str) -> Result<PasswordMaterial> {
        if role == Role::Superadmin || looks_hashed(plain) {
            self.hash(plain)
        } else {
            Ok(PasswordMaterial::Plaintext(plain.to_string()))
        }
    }

    /// [`Self::verify`] on the blocking pool.
    ///
    /// # Errors
    /// Returns an error if the blocking task fails to complete.
    pub async fn verify_async(&self, supplied: &str, stored: &PasswordMaterial) -> Result<bool> {
        let (policy, supplied, stored) = (*self, supplied.to_string(), stored.clone());
        offload(move || Ok(policy.verify(&supplied, &stored))).await
    }

    /// [`Self::hash`] on the blocking pool.
    ///
    /// # Errors
    /// Returns an error if hashing or the blocking task fails.
    pub async fn hash_async(&self, plain: &str) -> Result<PasswordMaterial> {
        let (policy, plain) = (*self, plain.to_string());
        offload(move || policy.hash(&plain)).await
    }

    /// [`Self::material_for`] on the blocking pool.
    ///
    /// # Errors
    /// Returns an error if hashing or the blocking task fails.
    pub async fn material_for_async(&self, role: Role, plain: &str) -> Result<PasswordMaterial> {
        let (policy, plain) = (*self, plain.to_string());
        offload(move || policy.material_for(role, &plain)).await
    }
}

async fn offload<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .context("password hashing task failed")?
}

fn is_bcrypt(hash: &str) -> bool {
    ["$2a$", "$2b$", "$2y$"]
        .iter()
        .any(|prefix| hash.starts_with(prefix))
}

fn hasher() -> Result<Argon2<'static>> {
    let params = Params::new(HASH_MEMORY_KIB, HASH_ITERATIONS, HASH_PARALLELISM, None)
        .map_err(|e| anyhow!("invalid argon2 parameters: {e}"))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

fn verify_hash(supplied: &str, hash: &str) -> bool {
    if is_bcrypt(hash) {
        return match bcrypt::verify(supplied, hash) {
            Ok(matched) => matched,
            Err(e) => {
                warn!("Unable to verify stored bcrypt hash: {e}");
                false
            }
        };
    }

    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Stored password hash is not a PHC string: {e}");
            return false;
        }
    };

    // parameters come from the stored hash, not from the current work factor
    match Argon2::default().verify_password(supplied.as_bytes(), &parsed) {
        Ok(()) => true,
        Err(argon2::password_hash::Error::Password) => false,
        Err(e) => {
            warn!("Unable to verify stored password hash: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    #[test]
    fn plaintext_material_matches_by_equality() {
        let stored = PasswordMaterial::Plaintext("secret".to_string());
        assert!(PasswordPolicy.verify("secret", &stored));
        assert!(!PasswordPolicy.verify("Secret", &stored));
    }

    #[test]
    fn hash_produces_argon2id_and_verifies() -> Result<()> {
        let hashed = PasswordPolicy.hash("correct horse")?;
        let PasswordMaterial::Hashed(value) = &hashed else {
            anyhow::bail!("expected hashed material");
        };
        assert!(value.starts_with("$argon2id$v=19$m=19456,t=2,p=1$"));
        assert!(PasswordPolicy.verify("correct horse", &hashed));
        assert!(!PasswordPolicy.verify("wrong horse", &hashed));
        Ok(())
    }

    #[test]
    fn literal_hash_string_does_not_match_hashed_material() -> Result<()> {
        let hashed = PasswordPolicy.hash("secret")?;
        let literal = hashed.as_stored().to_string();
        assert!(!PasswordPolicy.verify(&literal, &hashed));
        Ok(())
    }

    #[test]
    fn salts_differ_between_hashes() -> Result<()> {
        let first = PasswordPolicy.hash("same")?;
        let second = PasswordPolicy.hash("same")?;
        assert_ne!(first.as_stored(), second.as_stored());
        Ok(())
    }

    #[test]
    fn legacy_bcrypt_material_verifies() -> Result<()> {
        let stored = PasswordMaterial::from_stored(bcrypt::hash("secret", 4)?);
        assert!(!stored.is_plaintext());
        assert!(PasswordPolicy.verify("secret", &stored));
        assert!(!PasswordPolicy.verify("Secret", &stored));
        assert!(!PasswordPolicy.verify(stored.as_stored(), &stored));
        Ok(())
    }

    #[test]
    fn malformed_bcrypt_material_never_matches() {
        let stored = PasswordMaterial::from_stored("$2b$10$notarealbcrypthash".to_string());
        assert!(!PasswordPolicy.verify("$2b$10$notarealbcrypthash", &stored));
        assert!(!PasswordPolicy.verify("anything", &stored));
    }

    #[test]
    fn unsupported_hash_scheme_never_matches() {
        let stored = PasswordMaterial::from_stored("$md5$salt$digest".to_string());
        assert!(!stored.is_plaintext());
        assert!(!PasswordPolicy.verify("$md5$salt$digest", &stored));
        assert!(!PasswordPolicy.verify("anything", &stored));
    }

    #[test]
    fn bcrypt_superadmin_material_migrates() -> Result<()> {
        let legacy = PasswordMaterial::from_stored(bcrypt::hash("pw", 4)?);
        assert!(PasswordPolicy.needs_migration(&legacy, Role::Superadmin));
        assert!(!PasswordPolicy.needs_migration(&legacy, Role::Temp));
        assert!(!PasswordPolicy.needs_migration(&legacy, Role::User));
        Ok(())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn hashing_yields_the_async_worker() -> Result<()> {
        let ticked = Arc::new(AtomicBool::new(false));
        let flag = ticked.clone();
        tokio::spawn(async move { flag.store(true, Ordering::SeqCst) });

        let hashed = PasswordPolicy.hash_async("pw").await?;
        assert!(ticked.load(Ordering::SeqCst));
        assert!(PasswordPolicy.verify_async("pw", &hashed).await?);
        assert!(!PasswordPolicy.verify_async("nope", &hashed).await?);
        Ok(())
    }

    #[test]
    fn only_plaintext_superadmin_material_migrates() -> Result<()> {
        let plain = PasswordMaterial::Plaintext("pw".to_string());
        let hashed = PasswordPolicy.hash("pw")?;

        assert!(PasswordPolicy.needs_migration(&plain, Role::Superadmin));
        assert!(!PasswordPolicy.needs_migration(&plain, Role::User));
        assert!(!PasswordPolicy.needs_migration(&plain, Role::Temp));
        assert!(!PasswordPolicy.needs_migration(&hashed, Role::Superadmin));
        Ok(())
    }

    #[test]
    fn material_for_keeps_role_asymmetry() -> Result<()> {
        assert!(PasswordPolicy.material_for(Role::User, "pw")?.is_plaintext());
        assert!(!PasswordPolicy
            .material_for(Role::Superadmin, "pw")?
            .is_plaintext());
        Ok(())
    }

    #[test]
    fn material_for_hashes_ambiguous_plaintext() -> Result<()> {
        let material = PasswordPolicy.material_for(Role::User, "$x$looks-like-a-hash")?;
        assert!(!material.is_plaintext());
        assert!(PasswordPolicy.verify("$x$looks-like-a-hash", &material));
        Ok(())
    }
}
