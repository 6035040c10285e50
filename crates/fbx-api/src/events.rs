// Status-change notifications.
//
// Observability only: subscribers (UI, logging) learn what the flow is
// doing, but control decisions are always made against the owned state,
// never against the event stream.

use std::fmt;

/// Buffered events per subscriber before the oldest are dropped.
pub const EVENT_CHANNEL_SIZE: usize = 64;

/// A state transition worth telling observers about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    /// Waiting for the user to confirm on the appliance.
    ApplicationPending,
    /// Registration reached its terminal success state.
    ApplicationGranted,
    /// The confirmation window elapsed; registration restarts fresh.
    ApplicationTimeout,
    /// The user refused the authorization request.
    ApplicationDenied,
    /// The appliance reported a status this client does not recognize.
    ApplicationUnknown,
    /// Discovery or registration failed at the transport level.
    ApplicationError,
    /// A session was opened.
    SessionOpened,
    /// The session was closed by an explicit logout.
    SessionClosed,
    /// The client was disconnected.
    Disconnected,
}

impl StatusEvent {
    /// Dotted wire name, stable for log consumers.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApplicationPending => "application.pending",
            Self::ApplicationGranted => "application.granted",
            Self::ApplicationTimeout => "application.timeout",
            Self::ApplicationDenied => "application.denied",
            Self::ApplicationUnknown => "application.unknown",
            Self::ApplicationError => "application.error",
            Self::SessionOpened => "session.opened",
            Self::SessionClosed => "session.closed",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
