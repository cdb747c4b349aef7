use thiserror::Error;

/// Errors returned by link-layer decoding.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("unsupported link type {0}")]
    UnsupportedLinktype(i32),
    #[error("ethernet slice error: {0}")]
    Ethernet(String),
    #[error("VLAN slice error: {0}")]
    Vlan(String),
    #[error("more than {max} stacked VLAN tags")]
    TooManyTags { max: usize },
}
