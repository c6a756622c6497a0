//! Notification subjects and bodies.
//!
//! Each mode has exactly one template; [`Notification`] carries the data
//! for one of them, so a mode can only ever render its own.

use crate::clock::TimePoint;
use crate::snapshot::PlayerName;

/// Marks notifications as urgent so mail and push clients surface them.
pub const SUBJECT_PREFIX: &str = "[URGENT]";

pub const PROJECT_NAME: &str = "joinwatch";

/// A notification about the server roster.
#[derive(Debug, Clone, Copy)]
pub enum Notification<'a> {
    /// New players showed up (all mode).
    PlayersJoined {
        server_name: &'a str,
        address: &'a str,
        count: u32,
        joined: &'a [PlayerName],
    },
    /// The player count reached the threshold (threshold mode).
    ThresholdReached {
        threshold: u32,
        server_name: &'a str,
        address: &'a str,
        count: u32,
        players: &'a [PlayerName],
        next_check: &'a TimePoint,
    },
}

impl Notification<'_> {
    pub fn subject(&self) -> String {
        match self {
            Notification::PlayersJoined { .. } => {
                format!("{}Player has joined the server", SUBJECT_PREFIX)
            }
            Notification::ThresholdReached { .. } => {
                format!("{}Player count has reached the threshold", SUBJECT_PREFIX)
            }
        }
    }

    pub fn render(&self) -> String {
        match *self {
            Notification::PlayersJoined {
                server_name,
                address,
                count,
                joined,
            } => format!(
                "Player has joined the server\n\n\
                 Server name: {}\n\
                 IP: {}\n\
                 Player count: {}\n\n\
                 Player names:\n{}",
                server_name,
                address,
                count,
                numbered(joined)
            ),
            Notification::ThresholdReached {
                threshold,
                server_name,
                address,
                count,
                players,
                next_check,
            } => format!(
                "The player count has reached the threshold: {}\n\n\
                 Server name: {}\n\
                 IP: {}\n\
                 Player count: {}\n\n\
                 Player names:\n{}\n\n\
                 The next check will happen after {}\n",
                threshold,
                server_name,
                address,
                count,
                numbered(players),
                next_check
            ),
        }
    }
}

/// "1: name" per line, each line newline-terminated.
fn numbered(names: &[PlayerName]) -> String {
    names
        .iter()
        .enumerate()
        .map(|(idx, name)| format!("{}: {}\n", idx + 1, name))
        .collect()
}

pub fn timer_created_subject() -> String {
    format!("{}No timer file found", SUBJECT_PREFIX)
}

pub fn timer_created_message(target: &TimePoint) -> String {
    format!(
        "No timer file was found. Created one with the time {} and saved it.",
        target
    )
}

pub fn error_subject() -> String {
    format!("{}{} had an error", SUBJECT_PREFIX, PROJECT_NAME)
}
