//! Provider adapters
//!
//! - openai: OpenAI-compatible Images API
//! - doubao: Volcengine visual API with signed requests and async edit tasks

pub mod doubao;
pub mod openai;

pub use doubao::DoubaoImageAdapter;
pub use openai::OpenAiImageAdapter;
