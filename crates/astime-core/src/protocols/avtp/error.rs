use thiserror::Error;

/// Errors returned by AVTP header decoding.
///
/// # Examples
/// ```text
/// use astime_core::AvtpError;
///
/// let err = AvtpError::TooShort { needed: 24, actual: 10 };
/// assert!(err.to_string().contains("payload too short"));
/// ```
#[derive(Debug, Error)]
pub enum AvtpError {
    #[error("payload too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
}
