//! Small shared helpers

pub mod mime;

pub use mime::guess_mime;
