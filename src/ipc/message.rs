//! Line-oriented control messages exchanged over a worker's stdio.

use std::fmt::{Display, Formatter};

/// Environment variable naming the slot a worker process occupies.
///
/// Set by the master on fork; its presence selects the worker role.
pub const WORKER_SLOT_ENV: &str = "CLUSTER_KEEPER_WORKER_SLOT";

/// A single control line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Worker → master: ready to serve.
    Online,
    /// Worker → master: closing its control channel.
    Disconnect,
    /// Master → worker: stop accepting work and exit when done.
    Quit,
}

impl ControlMessage {
    /// Wire form, without the trailing newline.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Disconnect => "disconnect",
            Self::Quit => "quit",
        }
    }

    /// Parse one line; anything that is not a control message yields `None`.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "online" => Some(Self::Online),
            "disconnect" => Some(Self::Disconnect),
            "quit" => Some(Self::Quit),
            _ => None,
        }
    }

    /// Wire form with the trailing newline.
    #[must_use]
    pub fn to_line(self) -> String {
        format!("{}\n", self.as_str())
    }
}

impl Display for ControlMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
