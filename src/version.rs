use crate::errors::{LedgerError, Result};
use crate::types::AppVersion;

/// App version check result
#[derive(Debug, Clone)]
pub struct AppVersionCheck {
    pub needs_update: bool,
    pub current_version: String,
    pub minimum_version: String,
}

/// Check the device app against the minimum supported version
pub fn check_app_version(current: AppVersion, minimum: &str) -> Result<AppVersionCheck> {
    let minimum = semver::Version::parse(minimum)
        .map_err(|e| LedgerError::Config(format!("invalid minimum app version {:?}: {}", minimum, e)))?;

    let needs_update = current.to_semver() < minimum;
    if needs_update {
        log::warn!("Starknet app {} is older than the supported minimum {}", current, minimum);
    }

    Ok(AppVersionCheck {
        needs_update,
        current_version: current.to_string(),
        minimum_version: minimum.to_string(),
    })
}
