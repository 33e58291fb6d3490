//! Account records and the credential lifecycle. The store keeps the public
//! user row separate from its credential so hashes never travel with user
//! data, and persists as a JSON document rather than talking to a database.
//!
//! Rows written before hashing was introduced hold the password itself; those
//! are detected by length, accepted once, and transparently re-hashed on the
//! owner's next successful sign-in.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::passwords::{self, PasswordHashError};

/// Minimum accepted password length at creation and change time.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Stored values longer than this are salted hashes; anything shorter is a
/// legacy plaintext row awaiting upgrade. A hash is always 64 characters, so
/// the two ranges cannot collide.
const LEGACY_PLAINTEXT_MAX: usize = 20;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("login must not be empty")]
    EmptyLogin,
    #[error("login '{0}' is already taken")]
    LoginTaken(String),
    #[error("no account with login '{0}'")]
    UnknownLogin(String),
    #[error("password must be at least 6 characters")]
    PasswordTooShort,
    #[error(transparent)]
    Hashing(#[from] PasswordHashError),
    #[error("store file unreadable or unwritable: {0}")]
    Storage(String),
    #[error("store parse failed: {0}")]
    Parse(String),
}

/// Account roles as they exist in the library's role table. The feature
/// permissions attached to each role live with the UI, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Administrator,
    Librarian,
    Reader,
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Administrator => "Administrator",
            Role::Librarian => "Librarian",
            Role::Reader => "Reader",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "administrator" => Some(Role::Administrator),
            "librarian" => Some(Role::Librarian),
            "reader" => Some(Role::Reader),
            _ => None,
        }
    }
}

/// Public view of an account. Never carries credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u32,
    pub full_name: String,
    pub login: String,
    pub role: Role,
}

/// One stored credential: the login it belongs to and the opaque salted hash.
/// Written at account creation or password change, immutable in between, and
/// never decoded back into a plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub identifier: String,
    pub salted_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AccountRecord {
    user: User,
    credential: CredentialRecord,
}

/// In-memory account map keyed by login, with JSON snapshots on disk.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountStore {
    next_id: u32,
    accounts: BTreeMap<String, AccountRecord>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            accounts: BTreeMap::new(),
        }
    }

    /// Creates an account with a freshly hashed credential. Rejects duplicate
    /// logins and passwords below the minimum length.
    pub fn create_user(
        &mut self,
        full_name: &str,
        login: &str,
        password: &str,
        role: Role,
    ) -> Result<User, AccountError> {
        if login.trim().is_empty() {
            return Err(AccountError::EmptyLogin);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AccountError::PasswordTooShort);
        }
        if self.accounts.contains_key(login) {
            return Err(AccountError::LoginTaken(login.to_string()));
        }

        let salted_hash = passwords::hash_password(password)?;
        let user = User {
            id: self.next_id,
            full_name: full_name.to_string(),
            login: login.to_string(),
            role,
        };
        self.next_id += 1;
        self.accounts.insert(
            login.to_string(),
            AccountRecord {
                user: user.clone(),
                credential: CredentialRecord {
                    identifier: login.to_string(),
                    salted_hash,
                },
            },
        );
        Ok(user)
    }

    /// Checks a login/password pair. Unknown logins and wrong passwords both
    /// come back as `Ok(None)`; only hashing and storage problems are errors.
    /// A legacy plaintext row that matches is re-hashed in place before the
    /// user is returned.
    pub fn authenticate(
        &mut self,
        login: &str,
        password: &str,
    ) -> Result<Option<User>, AccountError> {
        let record = match self.accounts.get_mut(login) {
            Some(record) => record,
            None => return Ok(None),
        };

        let stored = record.credential.salted_hash.clone();
        let valid = if stored.len() > LEGACY_PLAINTEXT_MAX {
            passwords::verify_password(password, &stored)?
        } else {
            let matched = passwords::constant_time_eq(password.as_bytes(), stored.as_bytes());
            if matched {
                record.credential.salted_hash = passwords::hash_password(password)?;
            }
            matched
        };

        if valid {
            Ok(Some(record.user.clone()))
        } else {
            Ok(None)
        }
    }

    /// Replaces an account's credential with a hash under a fresh salt.
    pub fn change_password(&mut self, login: &str, new_password: &str) -> Result<(), AccountError> {
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AccountError::PasswordTooShort);
        }
        let record = self
            .accounts
            .get_mut(login)
            .ok_or_else(|| AccountError::UnknownLogin(login.to_string()))?;
        record.credential.salted_hash = passwords::hash_password(new_password)?;
        Ok(())
    }

    pub fn user(&self, login: &str) -> Option<&User> {
        self.accounts.get(login).map(|record| &record.user)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Reads a store snapshot from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AccountError> {
        let raw = fs::read_to_string(path).map_err(|e| AccountError::Storage(format!("{e}")))?;
        serde_json::from_str(&raw).map_err(|e| AccountError::Parse(format!("{e}")))
    }

    /// Writes the store as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AccountError> {
        let raw =
            serde_json::to_string_pretty(self).map_err(|e| AccountError::Parse(format!("{e}")))?;
        fs::write(path, raw).map_err(|e| AccountError::Storage(format!("{e}")))
    }
}

impl Default for AccountStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{AccountError, AccountRecord, AccountStore, CredentialRecord, Role, User};
    use tempfile::NamedTempFile;

    fn store_with_admin() -> AccountStore {
        let mut store = AccountStore::new();
        store
            .create_user("Anna Schmidt", "anna", "Passw0rd!", Role::Administrator)
            .expect("user creation should succeed");
        store
    }

    fn insert_legacy_row(store: &mut AccountStore, login: &str, plaintext: &str) {
        let user = User {
            id: store.next_id,
            full_name: "Legacy Row".to_string(),
            login: login.to_string(),
            role: Role::Librarian,
        };
        store.next_id += 1;
        store.accounts.insert(
            login.to_string(),
            AccountRecord {
                user,
                credential: CredentialRecord {
                    identifier: login.to_string(),
                    salted_hash: plaintext.to_string(),
                },
            },
        );
    }

    #[test]
    fn creates_and_authenticates_users() {
        let mut store = store_with_admin();
        let user = store
            .authenticate("anna", "Passw0rd!")
            .expect("authentication should run")
            .expect("credentials should match");
        assert_eq!(user.id, 1);
        assert_eq!(user.role, Role::Administrator);
        assert!(store
            .authenticate("anna", "wrong-password")
            .expect("authentication should run")
            .is_none());
    }

    #[test]
    fn unknown_login_is_not_an_error() {
        let mut store = store_with_admin();
        assert!(store
            .authenticate("nobody", "Passw0rd!")
            .expect("authentication should run")
            .is_none());
    }

    #[test]
    fn rejects_duplicate_logins() {
        let mut store = store_with_admin();
        let err = store
            .create_user("Second Anna", "anna", "0therPass", Role::Reader)
            .unwrap_err();
        assert!(matches!(err, AccountError::LoginTaken(_)));
    }

    #[test]
    fn rejects_short_passwords_and_empty_logins() {
        let mut store = AccountStore::new();
        assert!(matches!(
            store.create_user("B", "bob", "12345", Role::Reader),
            Err(AccountError::PasswordTooShort)
        ));
        assert!(matches!(
            store.create_user("B", "  ", "123456", Role::Reader),
            Err(AccountError::EmptyLogin)
        ));
        assert!(matches!(
            store.change_password("bob", "short"),
            Err(AccountError::PasswordTooShort)
        ));
    }

    #[test]
    fn change_password_invalidates_the_old_one() {
        let mut store = store_with_admin();
        store
            .change_password("anna", "NewSecret9")
            .expect("password change should succeed");
        assert!(store
            .authenticate("anna", "Passw0rd!")
            .expect("authentication should run")
            .is_none());
        assert!(store
            .authenticate("anna", "NewSecret9")
            .expect("authentication should run")
            .is_some());
    }

    #[test]
    fn change_password_requires_a_known_login() {
        let mut store = AccountStore::new();
        assert!(matches!(
            store.change_password("ghost", "longenough"),
            Err(AccountError::UnknownLogin(_))
        ));
    }

    #[test]
    fn upgrades_legacy_plaintext_rows_on_login() {
        let mut store = AccountStore::new();
        insert_legacy_row(&mut store, "old-timer", "plain-pw");

        let user = store
            .authenticate("old-timer", "plain-pw")
            .expect("authentication should run")
            .expect("legacy password should match");
        assert_eq!(user.login, "old-timer");

        let upgraded = &store.accounts["old-timer"].credential.salted_hash;
        assert_eq!(upgraded.len(), 64);
        assert!(store
            .authenticate("old-timer", "plain-pw")
            .expect("authentication should run")
            .is_some());
    }

    #[test]
    fn failed_legacy_login_leaves_the_row_untouched() {
        let mut store = AccountStore::new();
        insert_legacy_row(&mut store, "old-timer", "plain-pw");
        assert!(store
            .authenticate("old-timer", "guess")
            .expect("authentication should run")
            .is_none());
        assert_eq!(store.accounts["old-timer"].credential.salted_hash, "plain-pw");
    }

    #[test]
    fn corrupt_hashed_value_surfaces_as_an_error() {
        let mut store = AccountStore::new();
        insert_legacy_row(&mut store, "broken", "x");
        store.accounts.get_mut("broken").unwrap().credential.salted_hash =
            "definitely-not-base64-but-longer-than-twenty".to_string();
        let err = store.authenticate("broken", "anything").unwrap_err();
        assert!(matches!(err, AccountError::Hashing(_)));
    }

    #[test]
    fn saves_and_reloads_the_store() {
        let mut store = store_with_admin();
        store
            .create_user("Boris Ivanov", "boris", "Sekret7", Role::Librarian)
            .expect("user creation should succeed");

        let file = NamedTempFile::new().expect("temp file");
        store.save(file.path()).expect("save should succeed");

        let mut reloaded = AccountStore::load(file.path()).expect("load should succeed");
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded
            .authenticate("boris", "Sekret7")
            .expect("authentication should run")
            .is_some());

        let next = reloaded
            .create_user("Third", "third", "p4ssword", Role::Reader)
            .expect("user creation should succeed");
        assert_eq!(next.id, 3);
    }

    #[test]
    fn load_reports_parse_failures() {
        let file = NamedTempFile::new().expect("temp file");
        std::fs::write(file.path(), b"not json").unwrap();
        let err = AccountStore::load(file.path()).unwrap_err();
        assert!(matches!(err, AccountError::Parse(_)));
    }
}
