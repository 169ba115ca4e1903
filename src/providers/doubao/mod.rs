//! Doubao image provider (Volcengine visual API)
//!
//! Every call is an HMAC-SHA256 signed `POST {url}?Action=...&Version=2022-08-31`.
//! Text-to-image runs synchronously; edits are submitted as asynchronous tasks
//! and polled until they finish.

pub mod adapter;
pub mod codes;
pub mod signer;
pub mod task;

pub use adapter::DoubaoImageAdapter;
pub use signer::{RequestSigner, SignableRequest, SignedRequest};
pub use task::{TaskState, TaskStatus, drive_task, transition};
