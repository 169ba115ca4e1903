//! OpenAI-compatible image provider
//!
//! Speaks the OpenAI Images API (`/images/generations`, `/images/edits`,
//! `/images/variations`) and lists models through `/models`.

pub mod adapter;
pub mod transformers;

pub use adapter::OpenAiImageAdapter;
pub use transformers::ModelClass;
