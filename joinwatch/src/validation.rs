/// Validation of configuration values
use thiserror::Error;

/// Smallest player count that can be used as a threshold.
pub const MIN_THRESHOLD: u32 = 1;
/// Source servers top out at 100 slots.
pub const MAX_THRESHOLD: u32 = 100;
pub const MIN_TIMER_MINUTES: u32 = 1;
/// One week.
pub const MAX_TIMER_MINUTES: u32 = 7 * 24 * 60;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid mode \"{0}\". The possible values are: \"all\", \"threshold\"")]
    InvalidMode(String),

    #[error("Server address cannot be empty")]
    ServerAddressEmpty,

    #[error("Server address \"{0}\" has an invalid port")]
    ServerAddressInvalidPort(String),

    #[error("\"{name}\"'s value \"{value}\" was less than the min value \"{min}\"")]
    BelowMinimum {
        name: &'static str,
        value: u32,
        min: u32,
    },

    #[error("\"{name}\"'s value \"{value}\" was greater than the max value \"{max}\"")]
    AboveMaximum {
        name: &'static str,
        value: u32,
        max: u32,
    },

    #[error("Timer bucket name cannot be empty")]
    BucketEmpty,
}

/// Which mode a `MODE` value selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    All,
    Threshold,
}

/// Validates the operating mode
///
/// Rules:
/// - "all" (or "presence") notifies on every new player
/// - "threshold" notifies when the count reaches the threshold
/// - Case-insensitive, surrounding whitespace ignored
pub fn validate_mode(mode: &str) -> Result<ModeKind, ValidationError> {
    match mode.trim().to_ascii_lowercase().as_str() {
        "all" | "presence" => Ok(ModeKind::All),
        "threshold" => Ok(ModeKind::Threshold),
        _ => Err(ValidationError::InvalidMode(mode.to_string())),
    }
}

/// Validates a game server address
///
/// Rules:
/// - Cannot be empty
/// - If a port is given after the last ':', it must be a valid port number
pub fn validate_server_address(address: &str) -> Result<(), ValidationError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ValidationError::ServerAddressEmpty);
    }

    // host:port or [v6]:port; bare IPv6 literals have no port to check
    if address.parse::<std::net::Ipv6Addr>().is_ok() {
        return Ok(());
    }
    if let Some((host, port)) = address.rsplit_once(':') {
        if host.is_empty() {
            return Err(ValidationError::ServerAddressEmpty);
        }
        if port.parse::<u16>().map_or(true, |p| p == 0) {
            return Err(ValidationError::ServerAddressInvalidPort(address.to_string()));
        }
    }

    Ok(())
}

fn validate_range(name: &'static str, value: u32, min: u32, max: u32) -> Result<u32, ValidationError> {
    if value < min {
        return Err(ValidationError::BelowMinimum { name, value, min });
    }
    if value > max {
        return Err(ValidationError::AboveMaximum { name, value, max });
    }
    Ok(value)
}

/// Validates the player count threshold (1 to 100 inclusive)
pub fn validate_threshold(value: u32) -> Result<u32, ValidationError> {
    validate_range("PLAYER_COUNT_THRESHOLD", value, MIN_THRESHOLD, MAX_THRESHOLD)
}

/// Validates the cooldown in minutes (1 minute to one week inclusive)
pub fn validate_timer_minutes(value: u32) -> Result<u32, ValidationError> {
    validate_range(
        "THRESHOLD_TIMER_MINUTES",
        value,
        MIN_TIMER_MINUTES,
        MAX_TIMER_MINUTES,
    )
}

/// Validates the bucket the timer is stored in
pub fn validate_bucket(bucket: &str) -> Result<(), ValidationError> {
    if bucket.trim().is_empty() {
        return Err(ValidationError::BucketEmpty);
    }
    Ok(())
}
