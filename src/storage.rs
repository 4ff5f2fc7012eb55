use std::io::{self, Write};

use anyhow::{Context, Result};
use keyring::Entry;
use reportctl::Credentials;
use tracing::debug;

/// Keyring service name passwords are stored under, keyed by username.
const KEYRING_SERVICE: &str = "reportctl";

/// Resolves the password for `username`.
///
/// An explicit password wins. Otherwise the system keyring is consulted, and
/// failing that the user is prompted; a prompted password is saved for next time.
pub fn load_credentials(username: &str, password: Option<String>) -> Result<Credentials> {
    if let Some(password) = password {
        return Ok(Credentials::new(username, password));
    }

    let entry = Entry::new(KEYRING_SERVICE, username).context("unable to open the keyring")?;
    match entry.get_password() {
        Ok(password) => {
            debug!(username, "using password from keyring");
            Ok(Credentials::new(username, password))
        }
        Err(keyring::Error::NoEntry) => {
            let password = interactive_prompt(&format!("the password for {username}"))?;
            entry
                .set_password(&password)
                .context("unable to save the password to the keyring")?;
            Ok(Credentials::new(username, password))
        }
        Err(err) => Err(err).context("unable to read the password from the keyring"),
    }
}

/// Removes any stored password for `username`.
pub fn forget(username: &str) -> Result<()> {
    let entry = Entry::new(KEYRING_SERVICE, username).context("unable to open the keyring")?;
    match entry.delete_password() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(err) => Err(err).context("unable to delete the stored password"),
    }
}

/// Quick and dirty function to read a line from the user.
fn interactive_prompt(prompt_type: &str) -> Result<String> {
    let mut response = String::new();
    eprint!("Please enter {prompt_type}: ");
    io::stderr().flush()?;
    io::stdin()
        .read_line(&mut response)
        .context("unable to read from stdin")?;

    // Remove the trailing newline (and carriage return, on Windows).
    Ok(response.trim_end_matches(['\r', '\n']).to_string())
}
