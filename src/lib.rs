//! Login security core for the Bibliotek library manager, extracted from the
//! desktop application so the credential handling stays small and auditable.
//! Covers credential hashing, account records, captcha challenges, and the
//! throttled login flow that ties them together.

pub mod accounts;
pub mod captcha;
pub mod crypto;
pub mod login;
