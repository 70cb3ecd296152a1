//! Window classification and active-window resolution.
//!
//! The enumerator (a [`Platform`] capability) yields every visible
//! top-level surface; [`classify_windows`] filters that set down to real
//! application windows, and [`resolve_active_window`] reconciles it with
//! the OS foreground control.

use std::collections::HashSet;

use serde::Serialize;

use crate::geometry::BoundingBox;
use crate::platform::{Control, ControlKind, Handle, Platform};

/// Executable names treated as browsers.  Browser windows get the DOM
/// extraction path in the tree walker.
const BROWSER_PROCESS_NAMES: &[&str] = &[
    "chrome.exe",
    "msedge.exe",
    "firefox.exe",
    "brave.exe",
    "opera.exe",
    "vivaldi.exe",
    "iexplore.exe",
];

/// Windows with less area than this are treated as invisible slivers.
const MIN_WINDOW_AREA: i64 = 10;

pub fn is_browser_process(process_name: &str) -> bool {
    let lowered = process_name.to_ascii_lowercase();
    BROWSER_PROCESS_NAMES
        .iter()
        .any(|b| lowered == *b || b.trim_end_matches(".exe") == lowered)
}

/// Window display state, resolved with priority
/// minimized > maximized > visible(normal) > hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WindowStatus {
    Normal,
    Minimized,
    Maximized,
    Hidden,
}

pub fn window_status<C: Control>(control: &C) -> WindowStatus {
    if control.is_minimized() {
        WindowStatus::Minimized
    } else if control.is_maximized() {
        WindowStatus::Maximized
    } else if control.is_visible() {
        WindowStatus::Normal
    } else {
        WindowStatus::Hidden
    }
}

/// Owned snapshot of one top-level application surface.
///
/// Constructed fresh on every snapshot and never mutated afterwards.
/// There is no cross-snapshot identity guarantee beyond the raw handle.
#[derive(Debug, Clone, Serialize)]
pub struct Window {
    pub name: String,
    /// Enumeration order, a z-order proxy.
    pub depth: usize,
    pub status: WindowStatus,
    pub bounding_box: BoundingBox,
    pub handle: Handle,
    pub process_id: u32,
    pub is_browser: bool,
}

/// Overlay heuristic: certain GPU/overlay-injection software registers
/// invisible always-on-top windows that pollute enumeration.  A surface
/// with zero child controls, or whose name carries the literal "Overlay"
/// marker, is not a window.
pub fn is_overlay<C: Control>(control: &C) -> bool {
    control.children().is_empty() || control.name().trim().contains("Overlay")
}

fn is_browser_window<P: Platform>(platform: &P, control: &P::Control) -> bool {
    platform
        .process_name(control.process_id())
        .is_some_and(|name| is_browser_process(&name))
}

/// Filter candidate handles into real application windows.
///
/// Returns the accepted window list plus the set of handles it consumed;
/// the caller subtracts the consumed set from the candidates to obtain the
/// overlay-level handles that still participate in the accessibility walk.
/// A handle that fails to resolve is logged and skipped -- one bad handle
/// never aborts the batch.
pub fn classify_windows<P: Platform>(
    platform: &P,
    handles: &[Handle],
) -> (Vec<Window>, HashSet<Handle>) {
    let mut windows = Vec::new();
    let mut accepted = HashSet::new();

    for (depth, &handle) in handles.iter().enumerate() {
        let control = match platform.control_from_handle(handle) {
            Ok(control) => control,
            Err(err) => {
                log::warn!("skipping handle {handle}: {err}");
                continue;
            }
        };

        if is_overlay(&control) {
            continue;
        }

        if !matches!(control.kind(), ControlKind::Window | ControlKind::Pane) {
            continue;
        }

        // A real resizable app window supports both minimize and maximize.
        let caps = match control.window_capabilities() {
            Some(caps) => caps,
            None => continue,
        };
        if !caps.can_minimize || !caps.can_maximize {
            continue;
        }

        let status = window_status(&control);
        let bounding_box = control.bounding_box();
        // Empty bounds are legitimate only while minimized.
        if bounding_box.is_empty() && status != WindowStatus::Minimized {
            continue;
        }

        accepted.insert(handle);
        windows.push(Window {
            name: control.name(),
            depth,
            status,
            bounding_box,
            handle,
            process_id: control.process_id(),
            is_browser: is_browser_window(platform, &control),
        });
    }

    (windows, accepted)
}

/// Quick visibility check used by callers outside the snapshot pipeline.
pub fn is_window_visible<C: Control>(control: &C) -> bool {
    window_status(control) != WindowStatus::Minimized
        && !is_overlay(control)
        && control.bounding_box().area() > MIN_WINDOW_AREA
}

/// Ascend from an arbitrary element to its top-level ancestor, stopping
/// just below the desktop root.
fn top_level_of<P: Platform>(platform: &P, control: P::Control) -> P::Control {
    let root_handle = platform
        .root_control()
        .map(|root| root.handle())
        .unwrap_or(0);
    let mut current = control;
    loop {
        match current.parent() {
            Some(parent) if parent.handle() != root_handle => current = parent,
            _ => return current,
        }
    }
}

/// Determine the true foreground window among the classified `windows`.
///
/// The desktop background holding the foreground means "no active window"
/// (a normal state, not an error).  A foreground control missing from
/// `windows` -- e.g. excluded by the classifier for lacking the maximize
/// capability -- is synthesized into a minimal [`Window`] so callers
/// always get a name for whatever is focused.  Any failure degrades to
/// `None` with a logged warning; a missing active window must never abort
/// snapshot assembly.
pub fn resolve_active_window<P: Platform>(platform: &P, windows: &[Window]) -> Option<Window> {
    let handle = match platform.foreground_handle() {
        Ok(handle) if handle != 0 => handle,
        Ok(_) => return None,
        Err(err) => {
            log::warn!("foreground query failed: {err}");
            return None;
        }
    };

    let control = match platform.control_from_handle(handle) {
        Ok(control) => control,
        Err(err) => {
            log::warn!("foreground handle {handle} vanished: {err}");
            return None;
        }
    };
    let top = top_level_of(platform, control);

    if platform.is_desktop_background(&top) {
        return None;
    }

    let top_handle = top.handle();
    if let Some(window) = windows.iter().find(|w| w.handle == top_handle) {
        return Some(window.clone());
    }

    // Foreground control legitimately a window but dropped by the
    // classifier; synthesize a minimal record from the raw control.
    Some(Window {
        name: top.name(),
        depth: 0,
        status: window_status(&top),
        bounding_box: top.bounding_box(),
        handle: top_handle,
        process_id: top.process_id(),
        is_browser: is_browser_window(platform, &top),
    })
}
