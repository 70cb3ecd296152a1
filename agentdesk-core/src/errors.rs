//! Error types for `agentdesk_core`.
//!
//! All library failures are funnelled through [`AgentDeskError`], which uses
//! `thiserror` for `Display` and `Error` derives.  Item-level failures during
//! snapshot assembly (one bad window, one bad element) are never surfaced
//! through this type -- they are logged and the item is skipped.  Only
//! failures that make an operation meaningless reach the caller.

use thiserror::Error;

/// Top-level error type for the `agentdesk_core` library.
///
/// Each variant corresponds to a distinct subsystem.
#[derive(Debug, Error)]
pub enum AgentDeskError {
    /// Windowing / accessibility platform call failure.
    #[error("PlatformError: {0}")]
    PlatformError(String),

    /// Accessibility tree traversal or structural-address lookup failure.
    #[error("TreeError: {0}")]
    TreeError(String),

    /// Screen capture or image encoding failure.
    #[error("CaptureError: {0}")]
    CaptureError(String),

    /// Input injection failure (mouse / keyboard).
    #[error("InputError: {0}")]
    InputError(String),

    /// Shell command runner failure.
    #[error("ShellError: {0}")]
    ShellError(String),

    /// The platform does not provide this capability (e.g. multi-desktop
    /// enumeration on OS versions without it).  Callers branch on this to
    /// fall back to a documented default instead of failing.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

#[cfg(windows)]
impl From<windows::core::Error> for AgentDeskError {
    fn from(err: windows::core::Error) -> Self {
        AgentDeskError::PlatformError(format!("Windows COM error: {err}"))
    }
}
