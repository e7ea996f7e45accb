//! Connection handshake notifications from the remote app

use tracing::{info, warn};

/// Remote API version this companion understands
pub const API_VERSION: i32 = 0;

/// Where users can get a companion matching a newer remote
pub const COMPANION_DOWNLOAD_URL: &str = "https://virtuoso-vr.com/remote-control/";

/// Session-level notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Connected {
        remote_version: i32,
        /// Remote speaks a newer API than [`API_VERSION`]
        newer_than_local: bool,
    },
    Disconnected,
}

/// Handle a `connect` notification. A newer remote is a warning, never a rejection.
pub fn handle_connect(remote_version: i32) -> SessionEvent {
    info!("Remote sent connection message (API version {})", remote_version);

    let newer_than_local = remote_version > API_VERSION;
    if newer_than_local {
        warn!(
            "Remote API version {} is newer than this companion ({}), it may not work as intended",
            remote_version, API_VERSION
        );
        warn!(
            "You can find the latest supported companions at {}",
            COMPANION_DOWNLOAD_URL
        );
    }

    SessionEvent::Connected {
        remote_version,
        newer_than_local,
    }
}

/// Handle a `disconnect` notification
pub fn handle_disconnect() -> SessionEvent {
    info!("Remote sent disconnection message");
    SessionEvent::Disconnected
}
