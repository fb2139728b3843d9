use std::fmt;

/// Result type with the runner's [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
/// Runner error.
pub enum Error {
    /// The runner (or the resource behind it) was disposed, it will never run again
    Disposed,
    /// An argument could not be turned into something sensible
    InvalidArgument(&'static str),
    /// No scheduler was given and there is no ambient tokio runtime to fall back on
    NoScheduler,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Disposed => write!(f, "Cannot use a disposed runner"),
            Error::InvalidArgument(reason) => write!(f, "Invalid argument: {reason}"),
            Error::NoScheduler => write!(f, "No scheduler available, not inside a tokio runtime"),
        }
    }
}

impl std::error::Error for Error {}
