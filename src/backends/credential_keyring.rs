//! Credential-storage helpers for the catalog session token.

use keyring::Entry;

use crate::config::CatalogConfig;

const CATALOG_SERVICE_NAME: &str = "songvault.catalog";
const SESSION_ACCOUNT_NAME: &str = "session";

fn session_entry() -> Result<Entry, String> {
    Entry::new(CATALOG_SERVICE_NAME, SESSION_ACCOUNT_NAME)
        .map_err(|err| format!("failed to create keyring entry for catalog session: {err}"))
}

fn keyring_error_hint(error: &str) -> Option<String> {
    if error.contains("org.freedesktop.DBus.Error.ServiceUnknown") {
        return Some(
            "no Secret Service provider is available. Start GNOME Keyring or KeePassXC Secret Service, or set `catalog.session_token` in the config file."
                .to_string(),
        );
    }
    None
}

fn format_keyring_error(operation: &str, error: &str) -> String {
    let base = format!("{operation} failed in system keyring: {error}");
    match keyring_error_hint(error) {
        Some(hint) => format!("{base}. Hint: {hint}"),
        None => base,
    }
}

/// Saves the catalog session token into the OS keyring.
pub fn set_session_token(token: &str) -> Result<(), String> {
    let entry = session_entry()?;
    entry.set_password(token).map_err(|err| {
        let detail = format!("failed to set keyring password: {err}");
        format_keyring_error("save catalog session", detail.as_str())
    })
}

/// Loads the catalog session token from the OS keyring.
pub fn get_session_token() -> Result<Option<String>, String> {
    let entry = session_entry()?;
    match entry.get_password() {
        Ok(token) => Ok(Some(token)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => {
            let detail = format!("failed to get keyring password: {err}");
            Err(format_keyring_error("load catalog session", detail.as_str()))
        }
    }
}

/// Picks the configured token, falling back to the keyring when the config leaves it empty.
pub fn resolve_session_token(config: &CatalogConfig) -> Result<String, String> {
    if !config.session_token.is_empty() {
        return Ok(config.session_token.clone());
    }
    get_session_token()?
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| {
            "no catalog session token: set `catalog.session_token` or run `songvault set-credential`"
                .to_string()
        })
}
