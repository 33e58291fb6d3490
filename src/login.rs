//! Throttled login flow: after enough consecutive failures the flow arms a
//! captcha, and every later attempt must answer it before the credentials are
//! even checked. A wrong captcha answer burns the challenge and issues a new
//! one without counting as a password attempt.

use crate::accounts::{AccountError, AccountStore, User};
use crate::captcha::CaptchaChallenge;

/// Consecutive failed attempts after which a captcha is required.
pub const CAPTCHA_THRESHOLD: u32 = 3;

/// Expected results of one sign-in attempt. None of these are errors;
/// hashing and storage failures surface separately as [`AccountError`].
#[derive(Debug)]
pub enum LoginOutcome {
    Success(User),
    InvalidCredentials { attempts: u32 },
    CaptchaRequired,
    CaptchaMismatch,
}

/// Wraps an [`AccountStore`] with failure counting and captcha arming.
pub struct LoginFlow {
    store: AccountStore,
    failed_attempts: u32,
    captcha: Option<CaptchaChallenge>,
}

impl LoginFlow {
    pub fn new(store: AccountStore) -> Self {
        Self {
            store,
            failed_attempts: 0,
            captcha: None,
        }
    }

    /// The armed challenge, if any. Render or display it to the user before
    /// the next attempt.
    pub fn captcha(&self) -> Option<&CaptchaChallenge> {
        self.captcha.as_ref()
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Runs one sign-in attempt. While a captcha is armed, `captcha_input`
    /// must hold a correct answer or the credentials are not checked at all.
    pub fn attempt(
        &mut self,
        login: &str,
        password: &str,
        captcha_input: Option<&str>,
    ) -> Result<LoginOutcome, AccountError> {
        if let Some(challenge) = &self.captcha {
            match captcha_input {
                None => return Ok(LoginOutcome::CaptchaRequired),
                Some(input) => {
                    if !challenge.verify(input) {
                        self.captcha = Some(CaptchaChallenge::generate());
                        return Ok(LoginOutcome::CaptchaMismatch);
                    }
                }
            }
        }

        match self.store.authenticate(login, password)? {
            Some(user) => {
                self.failed_attempts = 0;
                self.captcha = None;
                Ok(LoginOutcome::Success(user))
            }
            None => {
                self.failed_attempts += 1;
                if self.failed_attempts >= CAPTCHA_THRESHOLD {
                    self.captcha = Some(CaptchaChallenge::generate());
                }
                Ok(LoginOutcome::InvalidCredentials {
                    attempts: self.failed_attempts,
                })
            }
        }
    }

    /// Clears the failure counter and any armed captcha, e.g. when the login
    /// screen is dismissed.
    pub fn reset(&mut self) {
        self.failed_attempts = 0;
        self.captcha = None;
    }

    pub fn store(&self) -> &AccountStore {
        &self.store
    }

    pub fn into_store(self) -> AccountStore {
        self.store
    }
}
