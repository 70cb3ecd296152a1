//! `agentdesk_core` -- desktop automation surface for agent tooling.
//!
//! Turns a live desktop session into structured, addressable state (window
//! list, flattened accessibility tree, annotated screenshot) and executes
//! the inverse direction: input actions targeted by structural address or
//! coordinates.
//!
//! The core is platform-generic: everything OS-specific sits behind the
//! [`platform::Platform`] and [`platform::Control`] traits.  The Windows
//! backend (UI Automation + Win32) compiles only on Windows; the rest of
//! the crate, including the full test suite, builds anywhere.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`errors`] | `AgentDeskError` enum via `thiserror` |
//! | [`geometry`] | Screen-space bounding boxes |
//! | [`platform`] | OS capability traits + Windows backend |
//! | [`window`] | Window classification and active-window resolution |
//! | [`tree`] | Accessibility tree walk and structural addressing |
//! | [`annotate`] | Numbered bounding-box screenshot annotation |
//! | [`desktop`] | Snapshot assembly and input actions |
//! | [`fuzzy`] | Name matching for app launch / window switch |
//! | [`shell`] | Shell command execution with timeout |
//! | [`system_info`] | Host telemetry via `sysinfo` |

pub mod annotate;
pub mod desktop;
pub mod errors;
pub mod fuzzy;
pub mod geometry;
pub mod platform;
pub mod shell;
pub mod system_info;
pub mod tree;
pub mod window;
