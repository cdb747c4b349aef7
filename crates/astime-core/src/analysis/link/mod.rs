pub mod error;
pub mod layout;
pub mod parser;

pub use parser::{LinkFrame, parse_link_frame};
