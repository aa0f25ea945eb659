//! Authentication: password hashing, opaque session tokens and the manager
//! tying them to the user store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use anyhow::Result;
use rand::Rng;
use rand_distr::Alphanumeric;
use serde::{Deserialize, Serialize};

use crate::library::{LibraryError, LibraryResult, LibraryStore, User};

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct AuthTokenValue(pub String);

impl AuthTokenValue {
    pub fn generate() -> AuthTokenValue {
        let rng = rand::rng();
        let random_string: String = rng
            .sample_iter(&Alphanumeric)
            .take(64)
            .map(char::from)
            .collect();
        AuthTokenValue(random_string)
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct AuthToken {
    pub user_id: String,
    pub created: SystemTime,
    pub value: AuthTokenValue,
}

mod homelib_argon2 {
    use anyhow::{anyhow, Result};
    use argon2::{
        password_hash::{
            rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        },
        Argon2,
    };

    pub fn generate_b64_salt() -> String {
        SaltString::generate(&mut OsRng).to_string()
    }

    pub fn hash<T: AsRef<str>>(plain: &[u8], b64_salt: T) -> Result<String> {
        let argon2 = Argon2::default();
        let salt = SaltString::from_b64(b64_salt.as_ref()).map_err(|err| anyhow!("{}", err))?;
        let hash_string = argon2
            .hash_password(plain, &salt)
            .map_err(|err| anyhow!("{}", err))?
            .to_string();
        Ok(hash_string)
    }

    pub fn verify<T: AsRef<str>>(plain_pw: &[u8], target_hash: T) -> Result<bool> {
        let argon2 = Argon2::default();
        let password_hash =
            PasswordHash::new(target_hash.as_ref()).map_err(|err| anyhow!("{}", err))?;
        Ok(argon2.verify_password(plain_pw, &password_hash).is_ok())
    }
}

/// The hashing scheme for stored passwords. An enum so a future scheme can
/// coexist with argon2 hashes already on disk; the PHC string stored per
/// user self-describes its parameters and salt.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub enum HomelibHasher {
    Argon2,
}

impl HomelibHasher {
    pub fn hash(&self, plain: &[u8]) -> Result<String> {
        match self {
            HomelibHasher::Argon2 => {
                homelib_argon2::hash(plain, homelib_argon2::generate_b64_salt())
            }
        }
    }

    pub fn verify<T: AsRef<str>>(&self, plain_pw: T, target_hash: T) -> Result<bool> {
        match self {
            HomelibHasher::Argon2 => {
                homelib_argon2::verify(plain_pw.as_ref().as_bytes(), target_hash)
            }
        }
    }
}

/// Signup, login and token verification over the shared user store. Tokens
/// are opaque in-memory values; restarting the server invalidates them all.
pub struct AuthManager {
    library: Arc<dyn LibraryStore>,
    tokens: Mutex<HashMap<AuthTokenValue, AuthToken>>,
    hasher: HomelibHasher,
}

impl AuthManager {
    pub fn new(library: Arc<dyn LibraryStore>) -> Self {
        AuthManager {
            library,
            tokens: Mutex::new(HashMap::new()),
            hasher: HomelibHasher::Argon2,
        }
    }

    pub fn signup(&self, login: &str, password: &str) -> LibraryResult<User> {
        if password.is_empty() {
            return Err(LibraryError::EmptyField { field: "password" });
        }
        let password_hash = self.hasher.hash(password.as_bytes())?;
        self.library.create_user(login, &password_hash)
    }

    /// Issues a fresh token on success. `Ok(None)` covers both an unknown
    /// login and a wrong password, indistinguishably.
    pub fn login(&self, login: &str, password: &str) -> LibraryResult<Option<AuthTokenValue>> {
        let Some(user) = self.library.get_user_by_login(login)? else {
            return Ok(None);
        };
        if !self.hasher.verify(password, user.password_hash.as_str())? {
            return Ok(None);
        }
        let token = AuthToken {
            user_id: user.id,
            created: SystemTime::now(),
            value: AuthTokenValue::generate(),
        };
        let value = token.value.clone();
        self.tokens.lock().unwrap().insert(value.clone(), token);
        Ok(Some(value))
    }

    /// Drops the token; unknown tokens are a no-op.
    pub fn logout(&self, token: &AuthTokenValue) {
        self.tokens.lock().unwrap().remove(token);
    }

    pub fn verify_token(&self, token: &AuthTokenValue) -> Option<AuthToken> {
        self.tokens.lock().unwrap().get(token).cloned()
    }

    /// Verifies the old password before storing the new hash; the store
    /// bumps the user version.
    pub fn change_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> LibraryResult<User> {
        if new_password.is_empty() {
            return Err(LibraryError::EmptyField { field: "newPassword" });
        }
        let user = self.library.get_user(user_id)?;
        if !self
            .hasher
            .verify(old_password, user.password_hash.as_str())?
        {
            return Err(LibraryError::WrongPassword);
        }
        let new_hash = self.hasher.hash(new_password.as_bytes())?;
        self.library.update_user_password(user_id, &new_hash)
    }
}
