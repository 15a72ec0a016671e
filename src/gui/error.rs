use std::{error::Error, fmt::Display};

/// The endpoint selector could not drive the terminal.
#[derive(Debug)]
pub enum SelectorError {
    /// Raw mode, the alternate screen or drawing failed.
    IOError(std::io::Error),
}

impl Display for SelectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectorError::IOError(error) => write!(f, "endpoint selector failed: {}", error),
        }
    }
}

impl Error for SelectorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SelectorError::IOError(error) => Some(error),
        }
    }
}

impl From<std::io::Error> for SelectorError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}
