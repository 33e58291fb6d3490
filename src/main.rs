//! Minimal CLI over the login stack. Commands are intentionally small and
//! auditable so operators can see exactly how credentials are handled.

use std::env;
use std::fs;
use std::path::Path;

use bibliotek_auth::accounts::{AccountError, AccountStore, Role};
use bibliotek_auth::captcha::CaptchaChallenge;
use bibliotek_auth::crypto::passwords::{hash_password, verify_password};

fn print_usage() {
    eprintln!("Commands:\n  hash-password <plaintext>\n  verify-password <plaintext> <stored-base64>\n  create-user <store.json> <full-name> <login> <password> <administrator|librarian|reader>\n  authenticate <store.json> <login> <password>\n  change-password <store.json> <login> <new-password>\n  new-captcha <out.png>");
}

fn load_or_new_store(path: &str) -> Result<AccountStore, AccountError> {
    if Path::new(path).exists() {
        AccountStore::load(path)
    } else {
        Ok(AccountStore::new())
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        return;
    }

    match args[1].as_str() {
        "hash-password" => {
            if args.len() != 3 {
                return print_usage();
            }
            match hash_password(&args[2]) {
                Ok(stored) => println!("{stored}"),
                Err(err) => eprintln!("hashing failed: {err}"),
            }
        }
        "verify-password" => {
            if args.len() != 4 {
                return print_usage();
            }
            match verify_password(&args[2], &args[3]) {
                Ok(matches) => println!("{}", if matches { "match" } else { "no-match" }),
                Err(err) => eprintln!("verification failed: {err}"),
            }
        }
        "create-user" => {
            if args.len() != 7 {
                return print_usage();
            }
            let role = match Role::from_str(&args[6]) {
                Some(role) => role,
                None => return eprintln!("unknown role: {}", args[6]),
            };
            let mut store = match load_or_new_store(&args[2]) {
                Ok(store) => store,
                Err(err) => return eprintln!("store load failed: {err}"),
            };
            match store.create_user(&args[3], &args[4], &args[5], role) {
                Ok(user) => {
                    if let Err(err) = store.save(&args[2]) {
                        return eprintln!("store save failed: {err}");
                    }
                    println!("created user {} with id {}", user.login, user.id);
                }
                Err(err) => eprintln!("user creation failed: {err}"),
            }
        }
        "authenticate" => {
            if args.len() != 5 {
                return print_usage();
            }
            let mut store = match AccountStore::load(&args[2]) {
                Ok(store) => store,
                Err(err) => return eprintln!("store load failed: {err}"),
            };
            match store.authenticate(&args[3], &args[4]) {
                Ok(Some(user)) => {
                    // A matching legacy row was re-hashed; keep the upgrade.
                    if let Err(err) = store.save(&args[2]) {
                        return eprintln!("store save failed: {err}");
                    }
                    println!("welcome {} ({})", user.full_name, user.role.display_name());
                }
                Ok(None) => println!("invalid login or password"),
                Err(err) => eprintln!("authentication failed: {err}"),
            }
        }
        "change-password" => {
            if args.len() != 5 {
                return print_usage();
            }
            let mut store = match AccountStore::load(&args[2]) {
                Ok(store) => store,
                Err(err) => return eprintln!("store load failed: {err}"),
            };
            match store.change_password(&args[3], &args[4]) {
                Ok(()) => {
                    if let Err(err) = store.save(&args[2]) {
                        return eprintln!("store save failed: {err}");
                    }
                    println!("password updated for {}", args[3]);
                }
                Err(err) => eprintln!("password change failed: {err}"),
            }
        }
        "new-captcha" => {
            if args.len() != 3 {
                return print_usage();
            }
            let challenge = CaptchaChallenge::generate();
            match challenge.render_png() {
                Ok(png) => match fs::write(&args[2], png) {
                    Ok(()) => println!("{}", challenge.text()),
                    Err(err) => eprintln!("could not write image: {err}"),
                },
                Err(err) => eprintln!("captcha rendering failed: {err}"),
            }
        }
        _ => print_usage(),
    }
}
