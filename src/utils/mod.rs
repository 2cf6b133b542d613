//! Shared helpers.
//!
//! - [`normalize_text`], [`normalize_doi`]: canonical forms used for comparison
//! - [`within_single_edit`]: tolerant string equality used by deduplication
//! - [`truncate_chars`]: char-safe truncation for prompts and log output
//! - [`RetryConfig`], [`with_retry`]: exponential backoff for model provider calls

pub mod retry;
pub mod text;

pub use retry::{with_retry, RetryConfig, TransientError};
pub use text::{char_prefix, normalize_doi, normalize_text, truncate_chars, within_single_edit};
