//! Capability traits

pub mod image;

pub use image::{ImageAdapter, response_to_elements};
