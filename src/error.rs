use thiserror::Error as ThisError;

/// Main error type for the library.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Used when the user pass a logical invalid parameter to a function.
    #[error("Parameter error: {0}")]
    InvalidParameter(String),
    #[error("Assertion error: {0}")]
    Assertion(String),
}

impl Error {
    /// Create a error with the kind `InvalidParameter`.
    /// # Arguments
    /// * `msg` - The error message.
    pub fn invalid_parameter<T: ToString>(msg: T) -> Self {
        Error::InvalidParameter(msg.to_string())
    }

    /// Create a error with the kind `Assertion`.
    pub fn assertion<T: ToString>(msg: T) -> Self {
        Error::Assertion(msg.to_string())
    }
}
