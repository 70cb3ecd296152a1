//! The desktop service: snapshot assembly plus input actions.
//!
//! [`Desktop`] owns a [`Platform`] backend and the last published
//! snapshot.  Snapshots are immutable once published ([`Arc`] swap under
//! a write lock), so readers never observe a half-built state.  Input
//! actions serialise on a separate gate -- injected events interleaved
//! from two callers would corrupt both gestures.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use image::RgbaImage;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::annotate::{annotate, encode_png, fit_scale, layout_annotations, scale_image};
use crate::errors::AgentDeskError;
use crate::fuzzy;
use crate::platform::{
    CaretPosition, Control, Handle, MouseButton, Platform, ScrollAxis, ScrollDirection,
    VirtualDesktop,
};
use crate::shell;
use crate::system_info;
use crate::tree::element::{TreeElementNode, TreeState};
use crate::tree::{build_tree_state, resolve_xpath};
use crate::window::{classify_windows, resolve_active_window, Window, WindowStatus};

/// Screenshot cap; larger captures are down-scaled to fit.
const MAX_IMAGE_WIDTH: u32 = 1920;
const MAX_IMAGE_HEIGHT: u32 = 1080;

// Settle delays between injecting an event and the UI reacting to it.
const CLICK_SETTLE: Duration = Duration::from_millis(100);
const DRAG_SETTLE: Duration = Duration::from_millis(600);
const SCROLL_SETTLE: Duration = Duration::from_millis(100);
const CLEAR_SETTLE: Duration = Duration::from_millis(500);
const SELECT_SETTLE: Duration = Duration::from_millis(500);

const APP_LAUNCH_TIMEOUT: Duration = Duration::from_secs(10);
const APP_LAUNCH_POLL: Duration = Duration::from_millis(500);
const LAUNCH_SUGGESTIONS: usize = 5;

/// What a snapshot should include beyond the window / element lists.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotOptions {
    /// Capture a screenshot.
    pub use_vision: bool,
    /// Draw numbered element boxes onto the screenshot.
    pub use_annotation: bool,
    /// Extract browser document text when the active window is a browser.
    pub use_dom: bool,
    /// PNG-encode the screenshot instead of keeping raw pixels.
    pub as_bytes: bool,
    /// Extra down-scale multiplier applied before the size cap.
    pub scale: f64,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            use_vision: false,
            use_annotation: false,
            use_dom: false,
            as_bytes: false,
            scale: 1.0,
        }
    }
}

/// Captured screen content in the representation the caller asked for.
pub enum Screenshot {
    Image(RgbaImage),
    Png(Vec<u8>),
}

/// One immutable snapshot of the desktop.
#[derive(Serialize)]
pub struct DesktopState {
    pub active_window: Option<Window>,
    /// Classified application windows, active window excluded.
    pub windows: Vec<Window>,
    pub active_desktop: VirtualDesktop,
    pub all_desktops: Vec<VirtualDesktop>,
    pub tree_state: TreeState,
    #[serde(skip)]
    pub screenshot: Option<Screenshot>,
}

/// Outcome of one action, phrased for the external agent.  `status` is
/// zero on success, non-zero for a descriptive refusal.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse {
    pub text: String,
    pub status: i32,
}

impl ToolResponse {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: 0,
        }
    }

    pub fn err(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: 1,
        }
    }

    pub fn is_err(&self) -> bool {
        self.status != 0
    }
}

pub struct Desktop<P: Platform> {
    platform: P,
    state: RwLock<Option<Arc<DesktopState>>>,
    input_gate: Mutex<()>,
}

impl<P: Platform> Desktop<P> {
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            state: RwLock::new(None),
            input_gate: Mutex::new(()),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    #[cfg(test)]
    fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Assemble and publish a fresh snapshot.
    ///
    /// Enumeration failure is the one hard error here; everything
    /// downstream degrades per component (no active window, default
    /// desktop descriptor, skipped dead handles).
    pub fn get_state(
        &self,
        options: &SnapshotOptions,
    ) -> Result<Arc<DesktopState>, AgentDeskError> {
        let candidates = self.platform.enumerate_candidate_handles()?;
        let (mut windows, accepted) = classify_windows(&self.platform, &candidates);
        let active_window = resolve_active_window(&self.platform, &windows);

        let active_handle = active_window.as_ref().map(|w| w.handle);
        if let Some(handle) = active_handle {
            windows.retain(|w| w.handle != handle);
        }

        // Candidates the classifier rejected are overlay-level surfaces
        // (toolbars, popups) that still carry interactive elements.
        let other_handles: Vec<Handle> = candidates
            .iter()
            .copied()
            .filter(|h| !accepted.contains(h) && Some(*h) != active_handle)
            .collect();

        let (active_desktop, all_desktops) = self.desktops();

        let active_is_browser = active_window.as_ref().is_some_and(|w| w.is_browser);
        let tree_state = build_tree_state(
            &self.platform,
            active_handle,
            &other_handles,
            options.use_dom,
            active_is_browser,
        );

        let screenshot = if options.use_vision {
            Some(self.capture(options, &tree_state)?)
        } else {
            None
        };

        let state = Arc::new(DesktopState {
            active_window,
            windows,
            active_desktop,
            all_desktops,
            tree_state,
            screenshot,
        });
        *self.state.write() = Some(Arc::clone(&state));
        Ok(state)
    }

    /// The last published snapshot, if any.
    pub fn last_state(&self) -> Option<Arc<DesktopState>> {
        self.state.read().clone()
    }

    fn desktops(&self) -> (VirtualDesktop, Vec<VirtualDesktop>) {
        let current = match self.platform.current_desktop() {
            Ok(desktop) => desktop,
            Err(AgentDeskError::Unsupported(_)) => VirtualDesktop::default_desktop(),
            Err(err) => {
                log::warn!("current desktop query failed: {err}");
                VirtualDesktop::default_desktop()
            }
        };
        let all = match self.platform.all_desktops() {
            Ok(all) => all,
            Err(AgentDeskError::Unsupported(_)) => vec![current.clone()],
            Err(err) => {
                log::warn!("desktop enumeration failed: {err}");
                vec![current.clone()]
            }
        };
        (current, all)
    }

    fn capture(
        &self,
        options: &SnapshotOptions,
        tree_state: &TreeState,
    ) -> Result<Screenshot, AgentDeskError> {
        let raw = self.platform.capture_screen()?;
        let screen = self.platform.virtual_screen_rect();

        let image = if options.use_annotation {
            let annotations =
                layout_annotations(&tree_state.interactive_nodes, (screen.left, screen.top));
            annotate(&raw, &annotations)
        } else {
            raw
        };

        let scale = options.scale.clamp(0.01, 1.0)
            * fit_scale(
                image.width(),
                image.height(),
                MAX_IMAGE_WIDTH,
                MAX_IMAGE_HEIGHT,
            );
        let image = scale_image(&image, scale);

        if options.as_bytes {
            Ok(Screenshot::Png(encode_png(&image)?))
        } else {
            Ok(Screenshot::Image(image))
        }
    }

    /// Element record for a positional label from the last snapshot.
    pub fn element_from_label(&self, label: usize) -> Result<TreeElementNode, AgentDeskError> {
        let state = self.last_state().ok_or_else(|| {
            AgentDeskError::TreeError("no snapshot captured yet".into())
        })?;
        state
            .tree_state
            .interactive_nodes
            .get(label)
            .cloned()
            .ok_or_else(|| {
                AgentDeskError::TreeError(format!(
                    "label {label} is out of range ({} elements in the last snapshot)",
                    state.tree_state.interactive_nodes.len()
                ))
            })
    }

    /// Click target for a labelled element.
    ///
    /// Re-resolves the element's structural address against the live tree
    /// so the coordinates survive a window move since the snapshot; the
    /// recorded bounds are the fallback when the address no longer binds.
    pub fn coordinates_from_label(&self, label: usize) -> Result<(i32, i32), AgentDeskError> {
        let element = self.element_from_label(label)?;
        let root = self.platform.root_control()?;
        match resolve_xpath(&root, &element.xpath) {
            Some(control) => Ok(control.bounding_box().center()),
            None => {
                log::warn!(
                    "element {label} ({}) no longer resolves; using recorded bounds",
                    element.xpath
                );
                Ok(element.bounding_box.center())
            }
        }
    }

    // -- input actions ----------------------------------------------------

    pub fn click(
        &self,
        x: i32,
        y: i32,
        button: MouseButton,
        clicks: u32,
    ) -> Result<ToolResponse, AgentDeskError> {
        let _gate = self.input_gate.lock();
        self.platform.click(x, y, button, clicks)?;
        thread::sleep(CLICK_SETTLE);
        let what = match clicks {
            2 => "Double-clicked",
            3 => "Triple-clicked",
            _ => "Clicked",
        };
        Ok(ToolResponse::ok(format!("{what} at ({x}, {y})")))
    }

    pub fn move_to(&self, x: i32, y: i32) -> Result<ToolResponse, AgentDeskError> {
        let _gate = self.input_gate.lock();
        self.platform.move_cursor(x, y)?;
        Ok(ToolResponse::ok(format!("Moved cursor to ({x}, {y})")))
    }

    /// Drag with the left button held from the current cursor position.
    pub fn drag(&self, to: (i32, i32)) -> Result<ToolResponse, AgentDeskError> {
        let _gate = self.input_gate.lock();
        self.platform.drag(to.0, to.1)?;
        thread::sleep(DRAG_SETTLE);
        Ok(ToolResponse::ok(format!(
            "Dragged to ({}, {})",
            to.0, to.1
        )))
    }

    pub fn scroll(
        &self,
        at: Option<(i32, i32)>,
        axis: ScrollAxis,
        direction: ScrollDirection,
        times: u32,
    ) -> Result<ToolResponse, AgentDeskError> {
        let _gate = self.input_gate.lock();
        if let Some((x, y)) = at {
            self.platform.move_cursor(x, y)?;
        }
        self.platform.scroll_wheel(axis, direction, times)?;
        thread::sleep(SCROLL_SETTLE);
        Ok(ToolResponse::ok(format!(
            "Scrolled {direction:?} {times} time(s)"
        )))
    }

    /// Click to focus, place the caret, optionally clear the field, type,
    /// optionally submit.
    pub fn type_text(
        &self,
        x: i32,
        y: i32,
        text: &str,
        caret: CaretPosition,
        clear: bool,
        press_enter: bool,
    ) -> Result<ToolResponse, AgentDeskError> {
        let _gate = self.input_gate.lock();
        self.type_at(x, y, text, caret, clear, press_enter)?;
        Ok(ToolResponse::ok(format!(
            "Typed {:?} at ({x}, {y})",
            text
        )))
    }

    /// Focus-click + type sequence.  Caller holds the input gate.
    fn type_at(
        &self,
        x: i32,
        y: i32,
        text: &str,
        caret: CaretPosition,
        clear: bool,
        press_enter: bool,
    ) -> Result<(), AgentDeskError> {
        self.platform.click(x, y, MouseButton::Left, 1)?;
        thread::sleep(CLICK_SETTLE);
        match caret {
            CaretPosition::Start => self.platform.press_key("home")?,
            CaretPosition::End => self.platform.press_key("end")?,
            CaretPosition::Idle => {}
        }
        if clear {
            self.platform.hotkey(&["ctrl", "a"])?;
            self.platform.press_key("backspace")?;
            thread::sleep(CLEAR_SETTLE);
        }
        self.platform.type_text(text)?;
        if press_enter {
            self.platform.press_key("enter")?;
        }
        Ok(())
    }

    /// Click each location in sequence, optionally holding Ctrl so the
    /// clicks accumulate into one selection.
    pub fn multi_select(
        &self,
        locations: &[(i32, i32)],
        hold_ctrl: bool,
    ) -> Result<ToolResponse, AgentDeskError> {
        let _gate = self.input_gate.lock();
        if hold_ctrl {
            self.platform.key_down("ctrl")?;
        }
        let clicks = (|| {
            for &(x, y) in locations {
                self.platform.click(x, y, MouseButton::Left, 1)?;
                thread::sleep(SELECT_SETTLE);
            }
            Ok(())
        })();
        if hold_ctrl {
            self.platform.key_up("ctrl")?;
        }
        clicks?;
        Ok(ToolResponse::ok(format!(
            "Selected {} location(s)",
            locations.len()
        )))
    }

    /// Clear and re-type each `(x, y, text)` field in order.
    pub fn multi_edit(&self, edits: &[(i32, i32, &str)]) -> Result<ToolResponse, AgentDeskError> {
        let _gate = self.input_gate.lock();
        for &(x, y, text) in edits {
            self.type_at(x, y, text, CaretPosition::Idle, true, false)?;
        }
        Ok(ToolResponse::ok(format!(
            "Edited {} field(s)",
            edits.len()
        )))
    }

    pub fn press_key(&self, key: &str) -> Result<ToolResponse, AgentDeskError> {
        let _gate = self.input_gate.lock();
        self.platform.press_key(key)?;
        Ok(ToolResponse::ok(format!("Pressed {key}")))
    }

    /// Key combination given as `"ctrl+shift+t"`.
    pub fn shortcut(&self, combo: &str) -> Result<ToolResponse, AgentDeskError> {
        let keys: Vec<&str> = combo
            .split('+')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .collect();
        if keys.is_empty() {
            return Err(AgentDeskError::InputError(format!(
                "empty key combination {combo:?}"
            )));
        }
        let _gate = self.input_gate.lock();
        self.platform.hotkey(&keys)?;
        Ok(ToolResponse::ok(format!("Pressed {}", keys.join("+"))))
    }

    /// Move / resize the foreground window.  `None` keeps the current
    /// position or size.
    pub fn resize_active_window(
        &self,
        position: Option<(i32, i32)>,
        size: Option<(i32, i32)>,
    ) -> Result<ToolResponse, AgentDeskError> {
        let handle = self.platform.foreground_handle()?;
        if handle == 0 {
            return Ok(ToolResponse::err("No active window to move or resize"));
        }
        let control = self.platform.control_from_handle(handle)?;
        match crate::window::window_status(&control) {
            WindowStatus::Minimized => {
                return Ok(ToolResponse::err(
                    "Active window is minimized; restore it before resizing",
                ))
            }
            WindowStatus::Maximized => {
                return Ok(ToolResponse::err(
                    "Active window is maximized; restore it before resizing",
                ))
            }
            _ => {}
        }

        let bounds = control.bounding_box();
        let (x, y) = position.unwrap_or((bounds.left, bounds.top));
        let (width, height) = size.unwrap_or((bounds.width(), bounds.height()));
        self.platform.move_window(handle, x, y, width, height)?;
        Ok(ToolResponse::ok(format!(
            "Window placed at ({x}, {y}) size {width}x{height}"
        )))
    }

    /// Bring the window best matching `name` to the foreground.
    ///
    /// Matches against the last snapshot (active window included),
    /// refreshing it first when none exists or its window list is empty.
    pub fn switch_to(&self, name: &str) -> Result<ToolResponse, AgentDeskError> {
        let state = match self.last_state() {
            Some(state) if state.active_window.is_some() || !state.windows.is_empty() => state,
            _ => self.get_state(&SnapshotOptions::default())?,
        };
        let windows: Vec<&Window> = state
            .active_window
            .iter()
            .chain(state.windows.iter())
            .collect();
        let found = fuzzy::best_match(name, &windows, |w| w.name.as_str(), fuzzy::MATCH_CUTOFF);
        let Some((window, _)) = found else {
            return Ok(ToolResponse::err(format!(
                "No open window matches {name:?}"
            )));
        };

        if window.status == WindowStatus::Minimized {
            self.platform.restore_window(window.handle)?;
        } else {
            self.platform.set_foreground(window.handle)?;
        }
        Ok(ToolResponse::ok(format!(
            "Switched to {:?}",
            window.name
        )))
    }

    /// True when an open window matches `name`.
    pub fn is_app_running(&self, name: &str) -> Result<bool, AgentDeskError> {
        let candidates = self.platform.enumerate_candidate_handles()?;
        let (windows, _) = classify_windows(&self.platform, &candidates);
        Ok(fuzzy::best_match(name, &windows, |w| w.name.as_str(), fuzzy::RUNNING_CUTOFF).is_some())
    }

    /// Launch an installed app by fuzzy name and wait for its window.
    pub fn launch(&self, name: &str) -> Result<ToolResponse, AgentDeskError> {
        let apps = self.platform.installed_apps()?;
        let found = fuzzy::best_match(name, &apps, |a| a.name.as_str(), fuzzy::MATCH_CUTOFF);
        let Some((app, _)) = found else {
            let near = fuzzy::suggestions(name, &apps, |a| a.name.as_str(), LAUNCH_SUGGESTIONS);
            return Ok(ToolResponse::err(format!(
                "No installed app matches {name:?}. Closest: {}",
                near.join(", ")
            )));
        };

        let app = app.clone();
        let pid = self.platform.launch_app(&app)?;
        if self.wait_for_window(pid, &app.name) {
            Ok(ToolResponse::ok(format!("Launched {:?}", app.name)))
        } else {
            Ok(ToolResponse::ok(format!(
                "Launched {:?}; no window appeared within {}s",
                app.name,
                APP_LAUNCH_TIMEOUT.as_secs()
            )))
        }
    }

    /// Poll the window list until one belongs to `pid` or matches `name`.
    fn wait_for_window(&self, pid: u32, name: &str) -> bool {
        let deadline = Instant::now() + APP_LAUNCH_TIMEOUT;
        loop {
            if let Ok(candidates) = self.platform.enumerate_candidate_handles() {
                let (windows, _) = classify_windows(&self.platform, &candidates);
                let found = windows.iter().any(|w| {
                    (pid != 0 && w.process_id == pid)
                        || fuzzy::score(name, &w.name) >= fuzzy::RUNNING_CUTOFF
                });
                if found {
                    return true;
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(APP_LAUNCH_POLL);
        }
    }

    /// Run a shell command on behalf of the agent.  `timeout` defaults to
    /// [`shell::DEFAULT_TIMEOUT`].
    pub fn execute_command(
        &self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<(String, i32), AgentDeskError> {
        shell::execute_command(command, timeout.unwrap_or(shell::DEFAULT_TIMEOUT))
    }

    /// Host summary line (OS, CPU, memory).
    pub fn system_info(&self) -> String {
        system_info::summary()
    }
}
