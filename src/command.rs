//! Discrete commands the host relays to the engine.

use std::{convert::Infallible, fmt, str::FromStr};

/// A one-shot instruction for the engine, addressed by its kebab-case name.
///
/// The camera rotations are the commands every engine is expected to understand.
/// Anything else travels as [`Command::Named`] and it is up to the engine to accept
/// or reject it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    RotateCameraLeft,
    RotateCameraRight,
    Named(String),
}

impl Command {
    pub fn name(&self) -> &str {
        match self {
            Command::RotateCameraLeft => "rotate-camera-left",
            Command::RotateCameraRight => "rotate-camera-right",
            Command::Named(name) => name,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Command {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "rotate-camera-left" => Command::RotateCameraLeft,
            "rotate-camera-right" => Command::RotateCameraRight,
            other => Command::Named(other.to_string()),
        })
    }
}

impl From<&str> for Command {
    fn from(name: &str) -> Self {
        match name.parse() {
            Ok(command) => command,
            Err(never) => match never {},
        }
    }
}
