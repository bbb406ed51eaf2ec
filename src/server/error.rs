//! You can find the errors that can occur during server startup here

use std::fmt::{Display, Formatter};
use std::io;

/// The errors that can occur during server startup
#[derive(Debug)]
pub enum StartServerError {
    /// IO error that can occur
    IO(io::Error),
    /// The secret key from the configuration file is not valid base64
    InvalidSecretKeyEncoding(base64::DecodeError),
    /// The secret key is unusable for signing session cookies,
    /// e.g. because it is too short
    InvalidSecretKey,
}

impl Display for StartServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StartServerError::IO(err) => write!(f, "{err}"),
            StartServerError::InvalidSecretKeyEncoding(err) => {
                write!(f, "Invalid base64 in SecretKey: {err}")
            }
            StartServerError::InvalidSecretKey => {
                write!(f, "Invalid SecretKey, generate one with the keygen command")
            }
        }
    }
}

impl From<io::Error> for StartServerError {
    fn from(value: io::Error) -> Self {
        Self::IO(value)
    }
}

impl From<base64::DecodeError> for StartServerError {
    fn from(value: base64::DecodeError) -> Self {
        Self::InvalidSecretKeyEncoding(value)
    }
}
