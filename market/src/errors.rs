use std::{fmt, io};

#[derive(Debug)]
pub enum SimError {
    Io(io::Error),
    PoisonedLock,
    Config(String),
    Logic(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Io(e) => write!(f, "IO error: {}", e),
            SimError::PoisonedLock => write!(f, "Mutex was poisoned"),
            SimError::Config(s) => write!(f, "Config error: {}", s),
            SimError::Logic(s) => write!(f, "Logic error: {}", s),
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::Io(e) => Some(e),
            SimError::PoisonedLock => None,
            SimError::Config(_) => None,
            SimError::Logic(_) => None,
        }
    }
}

impl From<io::Error> for SimError {
    fn from(err: io::Error) -> Self {
        SimError::Io(err)
    }
}

// A poisoned lock means a worker died mid-operation; the simulation
// cannot continue without its synchronization primitives.
impl<T> From<std::sync::PoisonError<T>> for SimError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        SimError::PoisonedLock
    }
}
