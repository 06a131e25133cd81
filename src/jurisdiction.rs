//! Refuses to talk to the exchange from a region it blocks.
//!
//! Any request from a blocked jurisdiction gets the account banned, so this
//! runs before every command and an unknown location counts as blocked.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::JurisdictionConfig;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum JurisdictionError {
    #[error(
        "If you make a request from a blocked jurisdiction, dydx will permanently ban you \
         and shut down your account. Shutting down now to prevent this. (detected timezone: {timezone})"
    )]
    Blocked { timezone: String },
    #[error("could not determine jurisdiction; refusing to continue")]
    Lookup(#[source] reqwest::Error),
    #[error("IP location response carried no timezone; refusing to continue")]
    MissingTimezone,
}

#[derive(Debug, Deserialize)]
struct IpLocation {
    #[serde(default)]
    timezone: Option<String>,
}

/// Allow only when the reported timezone contains `allowed`.
pub fn evaluate_timezone(timezone: Option<&str>, allowed: &str) -> Result<(), JurisdictionError> {
    let timezone = timezone
        .filter(|tz| !tz.is_empty())
        .ok_or(JurisdictionError::MissingTimezone)?;
    if timezone.contains(allowed) {
        Ok(())
    } else {
        Err(JurisdictionError::Blocked {
            timezone: timezone.to_string(),
        })
    }
}

/// Look up the egress IP's timezone and check it against the allow pattern.
pub async fn check_ip_location(config: &JurisdictionConfig) -> Result<(), JurisdictionError> {
    let location: IpLocation = Client::new()
        .get(&config.ip_location_url)
        .timeout(LOOKUP_TIMEOUT)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(JurisdictionError::Lookup)?
        .json()
        .await
        .map_err(JurisdictionError::Lookup)?;
    debug!(timezone = ?location.timezone, "IP location resolved");

    evaluate_timezone(location.timezone.as_deref(), &config.allowed_timezone)?;
    info!("Jurisdiction check passed");
    Ok(())
}
