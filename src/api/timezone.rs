//! Time zone selection.
//!
//! [`crate::MantisClient::set_time_zone`] decides which zone the user works
//! in and hands it to a [`TimeZoneSink`]. The default sink changes the time
//! zone of the whole process; tests and embedders that need isolation can
//! inject their own.

use std::str::FromStr;

use tracing::debug;

/// Zone applied when neither the user nor the instance provides a valid one.
pub const DEFAULT_TIME_ZONE: &str = "America/Los_Angeles";

/// Receives the time zone selected for the session.
pub trait TimeZoneSink: Send + Sync {
    /// Apply `zone`. Returns `false` if the zone is not supported.
    fn apply(&self, zone: &str) -> bool;
}

/// Whether `zone` is a known IANA time zone identifier.
pub fn is_known_time_zone(zone: &str) -> bool {
    chrono_tz::Tz::from_str(zone.trim()).is_ok()
}

/// Sets the `TZ` environment variable of the current process.
///
/// This mutates process-wide state and must not race with other threads
/// reading or writing the environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessTimeZone;

impl TimeZoneSink for ProcessTimeZone {
    fn apply(&self, zone: &str) -> bool {
        let zone = zone.trim();
        if !is_known_time_zone(zone) {
            return false;
        }

        debug!(zone, "Setting process time zone");
        std::env::set_var("TZ", zone);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_known_time_zones() {
        assert!(is_known_time_zone("Europe/Berlin"));
        assert!(is_known_time_zone(DEFAULT_TIME_ZONE));
        assert!(is_known_time_zone("UTC"));
        assert!(!is_known_time_zone(""));
        assert!(!is_known_time_zone("Mars/Olympus_Mons"));
    }

    #[test]
    #[serial]
    fn test_process_time_zone_sets_tz() {
        let previous = std::env::var("TZ").ok();

        assert!(ProcessTimeZone.apply("Asia/Tokyo"));
        assert_eq!(std::env::var("TZ").unwrap(), "Asia/Tokyo");

        assert!(!ProcessTimeZone.apply("Not/AZone"));
        assert_eq!(std::env::var("TZ").unwrap(), "Asia/Tokyo");

        match previous {
            Some(value) => std::env::set_var("TZ", value),
            None => std::env::remove_var("TZ"),
        }
    }
}
