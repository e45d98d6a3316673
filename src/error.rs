use core::fmt;

/// Errors returned synchronously by the connection manager.
///
/// Once a request has been accepted, further failures are only reported through the
/// [EventSink](crate::EventSink).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WlanError {
    /// A parameter was missing, malformed or referred to an unknown network.
    InvalidArgument,
    /// The profile store or a result buffer is full.
    NoMemory,
    /// The operation isn't valid in the current state of the interface.
    StateError,
    /// The radio or the manager failed internally.
    ActionError,
    /// The feature isn't available in this build.
    NotSupported,
}
impl WlanError {
    pub(crate) const fn into_code(self) -> u8 {
        match self {
            Self::InvalidArgument => 1,
            Self::NoMemory => 2,
            Self::StateError => 3,
            Self::ActionError => 4,
            Self::NotSupported => 5,
        }
    }
    pub(crate) const fn from_code(code: u8) -> Self {
        match code {
            1 => Self::InvalidArgument,
            2 => Self::NoMemory,
            3 => Self::StateError,
            5 => Self::NotSupported,
            _ => Self::ActionError,
        }
    }
}
impl fmt::Display for WlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidArgument => "invalid argument",
            Self::NoMemory => "out of memory",
            Self::StateError => "operation not allowed in current state",
            Self::ActionError => "internal or driver failure",
            Self::NotSupported => "not supported",
        })
    }
}

pub type WlanResult<T> = Result<T, WlanError>;

