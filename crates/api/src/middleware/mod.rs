//! Cross-cutting request plumbing.

pub mod logging;
