use std::io;

use thiserror::Error;

/// Convenience alias for results carrying an [`Error`] over link error `I`.
pub type Result<T, I> = std::result::Result<T, Error<I>>;

/// Fatal failure of an acquisition run.
#[derive(Error, Debug)]
pub enum Error<I: std::error::Error> {
    /// The GPIB link failed while talking to the supply.
    #[error("instrument communication failed: {0}")]
    Link(#[source] I),
    /// The supply answered, but the response could not be parsed.
    #[error("unparseable instrument response: {0:?}")]
    Decode(String),
    /// The output data file could not be written.
    #[error("data file error: {0}")]
    File(#[from] io::Error),
}

impl<I: std::error::Error> Error<I> {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Link(_) | Error::Decode(_) => 5,
            Error::File(_) => 4,
        }
    }
}
