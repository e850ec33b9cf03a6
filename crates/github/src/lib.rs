//! GitHub-facing boundary: webhook signature verification and payload
//! extraction. The rest of the system never sees a raw HTTP request.

pub mod webhook;

pub use webhook::GitHubEvent;
