use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid phone number: {input:?}")]
    InvalidPhone { input: String },
}

impl Error {
    #[must_use]
    pub fn invalid_phone(input: impl Into<String>) -> Self {
        Self::InvalidPhone {
            input: input.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
