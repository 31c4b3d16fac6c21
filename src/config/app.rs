//! Application configuration loaded from environment variables.
//!
//! All settings have workable defaults so test harnesses can run without a
//! populated environment. `.env` loading is the binary's concern (dotenvy).

use crate::errors::{Error, Result};
use chrono::{Duration, FixedOffset};
use std::env;
use std::path::PathBuf;

/// Runtime settings shared across core operations
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// UTC offset of the deployment timezone; same-day and season rules are
    /// evaluated against this offset
    pub timezone: FixedOffset,
    /// Slack added on both sides of an equipment reservation window
    pub reservation_buffer: Duration,
    /// Destination file for the newsletter email-list export
    pub email_list_path: PathBuf,
    /// Served equipment-points guide
    pub equipment_points_pdf_path: PathBuf,
    /// Served volunteer waiver
    pub volunteer_waiver_pdf_path: PathBuf,
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Eastern standard time, matching the original deployment
        #[allow(clippy::unwrap_used)]
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        Self {
            timezone: tz,
            reservation_buffer: Duration::hours(1),
            email_list_path: PathBuf::from("data/email_list.txt"),
            equipment_points_pdf_path: PathBuf::from("media/guides/equipment_points.pdf"),
            volunteer_waiver_pdf_path: PathBuf::from("media/guides/volunteer_waiver.pdf"),
            debug: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from the environment, falling back to defaults
    /// for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(raw) = env::var("TIME_ZONE_OFFSET") {
            config.timezone = parse_offset(&raw)?;
        }
        if let Ok(raw) = env::var("EQUIPMENT_RESERVATION_BUFFER_MINUTES") {
            let minutes: i64 = raw.parse().map_err(|_| Error::Config {
                message: format!("invalid EQUIPMENT_RESERVATION_BUFFER_MINUTES: {raw}"),
            })?;
            if minutes < 0 {
                return Err(Error::Config {
                    message: "reservation buffer must be non-negative".to_string(),
                });
            }
            config.reservation_buffer = Duration::minutes(minutes);
        }
        if let Ok(raw) = env::var("EMAIL_LIST_PATH") {
            config.email_list_path = PathBuf::from(raw);
        }
        if let Ok(raw) = env::var("EQUIPMENT_POINTS_PDF_PATH") {
            config.equipment_points_pdf_path = PathBuf::from(raw);
        }
        if let Ok(raw) = env::var("VOLUNTEER_WAIVER_PDF_PATH") {
            config.volunteer_waiver_pdf_path = PathBuf::from(raw);
        }
        if let Ok(raw) = env::var("DEBUG") {
            config.debug = matches!(raw.as_str(), "1" | "true" | "True");
        }

        Ok(config)
    }
}

/// Parses a `+HH:MM` / `-HH:MM` offset string.
fn parse_offset(raw: &str) -> Result<FixedOffset> {
    let err = || Error::Config {
        message: format!("invalid TIME_ZONE_OFFSET: {raw}"),
    };

    let (sign, rest) = match raw.split_at_checked(1) {
        Some(("+", rest)) => (1, rest),
        Some(("-", rest)) => (-1, rest),
        _ => return Err(err()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(err)?;
    let hours: i32 = hours.parse().map_err(|_| err())?;
    let minutes: i32 = minutes.parse().map_err(|_| err())?;
    if hours > 23 || minutes > 59 {
        return Err(err());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(err)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_offset() {
        assert_eq!(
            parse_offset("-05:00").unwrap(),
            FixedOffset::west_opt(5 * 3600).unwrap()
        );
        assert_eq!(
            parse_offset("+01:30").unwrap(),
            FixedOffset::east_opt(3600 + 1800).unwrap()
        );
        assert!(parse_offset("05:00").is_err());
        assert!(parse_offset("-25:00").is_err());
        assert!(parse_offset("garbage").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.reservation_buffer, Duration::hours(1));
        assert!(!config.debug);
    }
}
