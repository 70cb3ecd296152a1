//! Platform capability interface consumed by the snapshot engine.
//!
//! The core never talks to an accessibility API directly.  It consumes the
//! [`Platform`] and [`Control`] traits, which a backend implements with
//! whatever windowing / accessibility layer the target OS provides.  The
//! Windows backend lives in [`windows`] (compiled only on Windows); tests
//! run against a synthetic in-memory tree in `fake`.

#[cfg(test)]
pub(crate) mod fake;
#[cfg(windows)]
pub mod windows;

use serde::Serialize;

use crate::errors::AgentDeskError;
use crate::geometry::BoundingBox;

/// Opaque platform surface identifier (HWND on Windows).
///
/// Unique among concurrently enumerated windows, but the OS may reuse a
/// handle after a window closes -- callers must not cache handles across
/// long delays.
pub type Handle = isize;

/// Control role, mirroring the UI Automation control-type vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ControlKind {
    AppBar,
    Button,
    Calendar,
    CheckBox,
    ComboBox,
    Custom,
    DataGrid,
    DataItem,
    Document,
    Edit,
    Group,
    Header,
    HeaderItem,
    Hyperlink,
    Image,
    List,
    ListItem,
    MenuBar,
    Menu,
    MenuItem,
    Pane,
    ProgressBar,
    RadioButton,
    ScrollBar,
    SemanticZoom,
    Separator,
    Slider,
    Spinner,
    SplitButton,
    StatusBar,
    Tab,
    TabItem,
    Table,
    Text,
    Thumb,
    TitleBar,
    ToolBar,
    ToolTip,
    Tree,
    TreeItem,
    Window,
    Unknown,
}

impl ControlKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlKind::AppBar => "AppBar",
            ControlKind::Button => "Button",
            ControlKind::Calendar => "Calendar",
            ControlKind::CheckBox => "CheckBox",
            ControlKind::ComboBox => "ComboBox",
            ControlKind::Custom => "Custom",
            ControlKind::DataGrid => "DataGrid",
            ControlKind::DataItem => "DataItem",
            ControlKind::Document => "Document",
            ControlKind::Edit => "Edit",
            ControlKind::Group => "Group",
            ControlKind::Header => "Header",
            ControlKind::HeaderItem => "HeaderItem",
            ControlKind::Hyperlink => "Hyperlink",
            ControlKind::Image => "Image",
            ControlKind::List => "List",
            ControlKind::ListItem => "ListItem",
            ControlKind::MenuBar => "MenuBar",
            ControlKind::Menu => "Menu",
            ControlKind::MenuItem => "MenuItem",
            ControlKind::Pane => "Pane",
            ControlKind::ProgressBar => "ProgressBar",
            ControlKind::RadioButton => "RadioButton",
            ControlKind::ScrollBar => "ScrollBar",
            ControlKind::SemanticZoom => "SemanticZoom",
            ControlKind::Separator => "Separator",
            ControlKind::Slider => "Slider",
            ControlKind::Spinner => "Spinner",
            ControlKind::SplitButton => "SplitButton",
            ControlKind::StatusBar => "StatusBar",
            ControlKind::Tab => "Tab",
            ControlKind::TabItem => "TabItem",
            ControlKind::Table => "Table",
            ControlKind::Text => "Text",
            ControlKind::Thumb => "Thumb",
            ControlKind::TitleBar => "TitleBar",
            ControlKind::ToolBar => "ToolBar",
            ControlKind::ToolTip => "ToolTip",
            ControlKind::Tree => "Tree",
            ControlKind::TreeItem => "TreeItem",
            ControlKind::Window => "Window",
            ControlKind::Unknown => "Unknown",
        }
    }

    /// Parse the textual form used inside structural addresses.
    pub fn from_name(name: &str) -> Option<ControlKind> {
        Some(match name {
            "AppBar" => ControlKind::AppBar,
            "Button" => ControlKind::Button,
            "Calendar" => ControlKind::Calendar,
            "CheckBox" => ControlKind::CheckBox,
            "ComboBox" => ControlKind::ComboBox,
            "Custom" => ControlKind::Custom,
            "DataGrid" => ControlKind::DataGrid,
            "DataItem" => ControlKind::DataItem,
            "Document" => ControlKind::Document,
            "Edit" => ControlKind::Edit,
            "Group" => ControlKind::Group,
            "Header" => ControlKind::Header,
            "HeaderItem" => ControlKind::HeaderItem,
            "Hyperlink" => ControlKind::Hyperlink,
            "Image" => ControlKind::Image,
            "List" => ControlKind::List,
            "ListItem" => ControlKind::ListItem,
            "MenuBar" => ControlKind::MenuBar,
            "Menu" => ControlKind::Menu,
            "MenuItem" => ControlKind::MenuItem,
            "Pane" => ControlKind::Pane,
            "ProgressBar" => ControlKind::ProgressBar,
            "RadioButton" => ControlKind::RadioButton,
            "ScrollBar" => ControlKind::ScrollBar,
            "SemanticZoom" => ControlKind::SemanticZoom,
            "Separator" => ControlKind::Separator,
            "Slider" => ControlKind::Slider,
            "Spinner" => ControlKind::Spinner,
            "SplitButton" => ControlKind::SplitButton,
            "StatusBar" => ControlKind::StatusBar,
            "Tab" => ControlKind::Tab,
            "TabItem" => ControlKind::TabItem,
            "Table" => ControlKind::Table,
            "Text" => ControlKind::Text,
            "Thumb" => ControlKind::Thumb,
            "TitleBar" => ControlKind::TitleBar,
            "ToolBar" => ControlKind::ToolBar,
            "ToolTip" => ControlKind::ToolTip,
            "Tree" => ControlKind::Tree,
            "TreeItem" => ControlKind::TreeItem,
            "Window" => ControlKind::Window,
            "Unknown" => ControlKind::Unknown,
            _ => return None,
        })
    }

    /// Roles the walker treats as clickable / typeable.
    pub fn is_interactive(self) -> bool {
        matches!(
            self,
            ControlKind::Button
                | ControlKind::CheckBox
                | ControlKind::ComboBox
                | ControlKind::DataItem
                | ControlKind::Edit
                | ControlKind::HeaderItem
                | ControlKind::Hyperlink
                | ControlKind::ListItem
                | ControlKind::MenuItem
                | ControlKind::RadioButton
                | ControlKind::Slider
                | ControlKind::Spinner
                | ControlKind::SplitButton
                | ControlKind::TabItem
                | ControlKind::TreeItem
        )
    }
}

/// Window-pattern capabilities, used as the "real resizable app window"
/// signal by the classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowCaps {
    pub can_minimize: bool,
    pub can_maximize: bool,
}

/// Scroll-pattern state of a scrollable region.
///
/// Percentages are `0.0..=100.0`; a non-scrollable axis reports `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScrollInfo {
    pub vertical_percent: Option<f64>,
    pub horizontal_percent: Option<f64>,
}

/// One launchable application as listed by the platform.
#[derive(Debug, Clone, Serialize)]
pub struct AppEntry {
    pub name: String,
    pub app_id: String,
}

/// Virtual-desktop descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualDesktop {
    pub id: String,
    pub name: String,
}

impl VirtualDesktop {
    /// Fallback descriptor for platforms without multi-desktop support.
    pub fn default_desktop() -> Self {
        Self {
            id: "00000000-0000-0000-0000-000000000000".into(),
            name: "Default Desktop".into(),
        }
    }
}

/// Where to place the caret after focusing a text field, before typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaretPosition {
    /// Jump to the start of the field (Home).
    Start,
    /// Leave the caret where the focus click put it.
    #[default]
    Idle,
    /// Jump to the end of the field (End).
    End,
}

impl CaretPosition {
    pub fn parse(name: &str) -> CaretPosition {
        match name {
            "start" => CaretPosition::Start,
            "end" => CaretPosition::End,
            _ => CaretPosition::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn parse(name: &str) -> MouseButton {
        match name {
            "right" => MouseButton::Right,
            "middle" => MouseButton::Middle,
            _ => MouseButton::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAxis {
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

/// One live accessibility element.
///
/// Implementations are cheap handles (COM pointers, `Rc` nodes), cloned
/// freely during traversal.  Property reads may race against the UI; they
/// return best-effort values rather than errors.
pub trait Control: Clone {
    /// Native top-level surface handle, `0` for non-window elements.
    fn handle(&self) -> Handle;
    fn name(&self) -> String;
    fn class_name(&self) -> String;
    fn kind(&self) -> ControlKind;
    fn bounding_box(&self) -> BoundingBox;
    fn children(&self) -> Vec<Self>;
    fn parent(&self) -> Option<Self>;
    fn process_id(&self) -> u32;
    /// Identity test against another live element (runtime-id comparison on
    /// UIA).  Used for sibling-index computation, never across snapshots.
    fn same_as(&self, other: &Self) -> bool;
    fn is_minimized(&self) -> bool;
    fn is_maximized(&self) -> bool;
    fn is_visible(&self) -> bool;
    fn is_enabled(&self) -> bool;
    fn is_offscreen(&self) -> bool;
    /// `Some` when the element supports the window pattern.
    fn window_capabilities(&self) -> Option<WindowCaps>;
    /// `Some` when the element supports the scroll pattern.
    fn scroll_info(&self) -> Option<ScrollInfo>;
    /// Current textual value (value pattern), if any.
    fn text_value(&self) -> Option<String>;
}

/// The full windowing / input / capture capability surface the core needs
/// from an OS backend.
pub trait Platform {
    type Control: Control;

    /// Every top-level, currently-visible surface on the active virtual
    /// desktop, plus always-relevant system chrome (desktop background,
    /// taskbars).  Enumeration order is preserved and doubles as the
    /// z-order proxy.  Handles that become invalid mid-enumeration are
    /// silently skipped.
    fn enumerate_candidate_handles(&self) -> Result<Vec<Handle>, AgentDeskError>;

    fn control_from_handle(&self, handle: Handle) -> Result<Self::Control, AgentDeskError>;
    fn root_control(&self) -> Result<Self::Control, AgentDeskError>;
    fn foreground_handle(&self) -> Result<Handle, AgentDeskError>;
    fn control_from_cursor(&self) -> Result<Self::Control, AgentDeskError>;
    fn cursor_position(&self) -> (i32, i32);

    /// True when `control` is the desktop background surface (no active
    /// window exists when it holds the foreground).
    fn is_desktop_background(&self, control: &Self::Control) -> bool;

    /// Executable name for a process id, if the process is still alive.
    fn process_name(&self, pid: u32) -> Option<String>;

    // Window management.
    fn move_window(
        &self,
        handle: Handle,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<(), AgentDeskError>;
    fn set_foreground(&self, handle: Handle) -> Result<(), AgentDeskError>;
    fn restore_window(&self, handle: Handle) -> Result<(), AgentDeskError>;
    fn minimize_window(&self, handle: Handle) -> Result<(), AgentDeskError>;

    // Capture.
    fn capture_screen(&self) -> Result<image::RgbaImage, AgentDeskError>;
    /// Bounding rectangle of the virtual screen (all monitors).  The origin
    /// can be negative on multi-monitor setups.
    fn virtual_screen_rect(&self) -> BoundingBox;

    // Input injection.  Implementations inject raw events; pacing between
    // distinct physical actions is owned by the Desktop service.
    fn click(
        &self,
        x: i32,
        y: i32,
        button: MouseButton,
        clicks: u32,
    ) -> Result<(), AgentDeskError>;
    fn move_cursor(&self, x: i32, y: i32) -> Result<(), AgentDeskError>;
    fn scroll_wheel(
        &self,
        axis: ScrollAxis,
        direction: ScrollDirection,
        times: u32,
    ) -> Result<(), AgentDeskError>;
    /// Drag from the current cursor position to `(x, y)` with the left
    /// button held.
    fn drag(&self, x: i32, y: i32) -> Result<(), AgentDeskError>;
    fn type_text(&self, text: &str) -> Result<(), AgentDeskError>;
    fn press_key(&self, key: &str) -> Result<(), AgentDeskError>;
    /// Hold / release one key, for gestures that span several events
    /// (ctrl-held multi-select).
    fn key_down(&self, key: &str) -> Result<(), AgentDeskError>;
    fn key_up(&self, key: &str) -> Result<(), AgentDeskError>;
    fn hotkey(&self, keys: &[&str]) -> Result<(), AgentDeskError>;

    // Multi-desktop queries.  Backends without support return
    // `AgentDeskError::Unsupported`; the snapshot assembler falls back to
    // [`VirtualDesktop::default_desktop`].
    fn current_desktop(&self) -> Result<VirtualDesktop, AgentDeskError>;
    fn all_desktops(&self) -> Result<Vec<VirtualDesktop>, AgentDeskError>;

    // App launching.
    fn installed_apps(&self) -> Result<Vec<AppEntry>, AgentDeskError>;
    /// Launch an app; returns the new process id when known, else `0`.
    fn launch_app(&self, app: &AppEntry) -> Result<u32, AgentDeskError>;
}
