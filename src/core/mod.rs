//! Core types shared across the pipeline: the error taxonomy and the
//! cancellation token.

pub mod cancel;
pub mod error;

pub use cancel::Cancellation;
pub use error::{user_friendly_error, ErrorContext, GokError};
