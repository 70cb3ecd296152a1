//! Windows backend: UI Automation + Win32.
//!
//! [`WindowsPlatform`] implements [`Platform`] with live (non-cached) UIA
//! elements.  Everything COM-side lives in a shared [`UiaContext`]; the
//! guard, automation object and tree walker are created once and the
//! controls hold an `Rc` to them.

mod capture;
mod com;
mod input;

use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;
use std::rc::Rc;

use windows::core::{w, Interface, PCWSTR};
use windows::Win32::Foundation::{BOOL, HWND, LPARAM, POINT, TRUE};
use windows::Win32::System::Com::{CoCreateInstance, CLSCTX_ALL, CLSCTX_INPROC_SERVER};
use windows::Win32::UI::Accessibility::{
    CUIAutomation, IUIAutomation, IUIAutomationElement, IUIAutomationScrollPattern,
    IUIAutomationTreeWalker, IUIAutomationValuePattern, IUIAutomationWindowPattern,
    UIA_AppBarControlTypeId, UIA_ButtonControlTypeId, UIA_CalendarControlTypeId,
    UIA_CheckBoxControlTypeId, UIA_ComboBoxControlTypeId, UIA_CustomControlTypeId,
    UIA_DataGridControlTypeId, UIA_DataItemControlTypeId, UIA_DocumentControlTypeId,
    UIA_EditControlTypeId, UIA_GroupControlTypeId, UIA_HeaderControlTypeId,
    UIA_HeaderItemControlTypeId, UIA_HyperlinkControlTypeId, UIA_ImageControlTypeId,
    UIA_ListControlTypeId, UIA_ListItemControlTypeId, UIA_MenuBarControlTypeId,
    UIA_MenuControlTypeId, UIA_MenuItemControlTypeId, UIA_PaneControlTypeId,
    UIA_ProgressBarControlTypeId, UIA_RadioButtonControlTypeId, UIA_ScrollBarControlTypeId,
    UIA_ScrollPatternId, UIA_SemanticZoomControlTypeId, UIA_SeparatorControlTypeId,
    UIA_SliderControlTypeId, UIA_SpinnerControlTypeId, UIA_SplitButtonControlTypeId,
    UIA_StatusBarControlTypeId, UIA_TabControlTypeId, UIA_TabItemControlTypeId,
    UIA_TableControlTypeId, UIA_TextControlTypeId, UIA_ThumbControlTypeId,
    UIA_TitleBarControlTypeId, UIA_ToolBarControlTypeId, UIA_ToolTipControlTypeId,
    UIA_TreeControlTypeId, UIA_TreeItemControlTypeId, UIA_ValuePatternId,
    UIA_WindowControlTypeId, UIA_WindowPatternId, UIA_CONTROLTYPE_ID,
};
use windows::Win32::UI::HiDpi::{SetProcessDpiAwareness, PROCESS_PER_MONITOR_DPI_AWARE};
use windows::Win32::UI::Shell::{IVirtualDesktopManager, VirtualDesktopManager};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, FindWindowW, GetClassNameW, GetCursorPos, GetForegroundWindow,
    GetWindowLongW, GetWindowTextLengthW, IsIconic, IsWindowVisible, IsZoomed, MoveWindow,
    SetForegroundWindow, ShowWindow, GWL_EXSTYLE, GWL_STYLE, SW_MINIMIZE, SW_RESTORE,
    WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW, WS_VISIBLE,
};

use crate::errors::AgentDeskError;
use crate::geometry::BoundingBox;
use crate::platform::{
    AppEntry, Control, ControlKind, Handle, MouseButton, Platform, ScrollAxis, ScrollDirection,
    ScrollInfo, VirtualDesktop, WindowCaps,
};
use crate::shell;
use crate::system_info;

use com::ComGuard;

const MAX_CHILDREN_PER_NODE: usize = 512;

/// `ScrollPattern` reports this for a non-scrollable axis.
const UIA_NO_SCROLL: f64 = -1.0;

fn control_kind(id: UIA_CONTROLTYPE_ID) -> ControlKind {
    match id {
        x if x == UIA_AppBarControlTypeId => ControlKind::AppBar,
        x if x == UIA_ButtonControlTypeId => ControlKind::Button,
        x if x == UIA_CalendarControlTypeId => ControlKind::Calendar,
        x if x == UIA_CheckBoxControlTypeId => ControlKind::CheckBox,
        x if x == UIA_ComboBoxControlTypeId => ControlKind::ComboBox,
        x if x == UIA_CustomControlTypeId => ControlKind::Custom,
        x if x == UIA_DataGridControlTypeId => ControlKind::DataGrid,
        x if x == UIA_DataItemControlTypeId => ControlKind::DataItem,
        x if x == UIA_DocumentControlTypeId => ControlKind::Document,
        x if x == UIA_EditControlTypeId => ControlKind::Edit,
        x if x == UIA_GroupControlTypeId => ControlKind::Group,
        x if x == UIA_HeaderControlTypeId => ControlKind::Header,
        x if x == UIA_HeaderItemControlTypeId => ControlKind::HeaderItem,
        x if x == UIA_HyperlinkControlTypeId => ControlKind::Hyperlink,
        x if x == UIA_ImageControlTypeId => ControlKind::Image,
        x if x == UIA_ListControlTypeId => ControlKind::List,
        x if x == UIA_ListItemControlTypeId => ControlKind::ListItem,
        x if x == UIA_MenuBarControlTypeId => ControlKind::MenuBar,
        x if x == UIA_MenuControlTypeId => ControlKind::Menu,
        x if x == UIA_MenuItemControlTypeId => ControlKind::MenuItem,
        x if x == UIA_PaneControlTypeId => ControlKind::Pane,
        x if x == UIA_ProgressBarControlTypeId => ControlKind::ProgressBar,
        x if x == UIA_RadioButtonControlTypeId => ControlKind::RadioButton,
        x if x == UIA_ScrollBarControlTypeId => ControlKind::ScrollBar,
        x if x == UIA_SemanticZoomControlTypeId => ControlKind::SemanticZoom,
        x if x == UIA_SeparatorControlTypeId => ControlKind::Separator,
        x if x == UIA_SliderControlTypeId => ControlKind::Slider,
        x if x == UIA_SpinnerControlTypeId => ControlKind::Spinner,
        x if x == UIA_SplitButtonControlTypeId => ControlKind::SplitButton,
        x if x == UIA_StatusBarControlTypeId => ControlKind::StatusBar,
        x if x == UIA_TabControlTypeId => ControlKind::Tab,
        x if x == UIA_TabItemControlTypeId => ControlKind::TabItem,
        x if x == UIA_TableControlTypeId => ControlKind::Table,
        x if x == UIA_TextControlTypeId => ControlKind::Text,
        x if x == UIA_ThumbControlTypeId => ControlKind::Thumb,
        x if x == UIA_TitleBarControlTypeId => ControlKind::TitleBar,
        x if x == UIA_ToolBarControlTypeId => ControlKind::ToolBar,
        x if x == UIA_ToolTipControlTypeId => ControlKind::ToolTip,
        x if x == UIA_TreeControlTypeId => ControlKind::Tree,
        x if x == UIA_TreeItemControlTypeId => ControlKind::TreeItem,
        x if x == UIA_WindowControlTypeId => ControlKind::Window,
        _ => ControlKind::Unknown,
    }
}

fn hwnd(handle: Handle) -> HWND {
    HWND(handle as *mut core::ffi::c_void)
}

/// Wheel-delta sign for `SendInput`: a positive `MOUSEEVENTF_WHEEL`
/// delta scrolls up, a positive `MOUSEEVENTF_HWHEEL` delta scrolls
/// right.
fn wheel_sign(direction: ScrollDirection) -> i32 {
    match direction {
        ScrollDirection::Up | ScrollDirection::Right => 1,
        ScrollDirection::Down | ScrollDirection::Left => -1,
    }
}

fn read_class_name(hwnd: HWND) -> String {
    let mut buf = [0u16; 256];
    let len = unsafe { GetClassNameW(hwnd, &mut buf) };
    if len <= 0 {
        return String::new();
    }
    OsString::from_wide(&buf[..len as usize])
        .to_string_lossy()
        .into_owned()
}

/// Normal top-level application window: visible, activatable, not a tool
/// window.
fn is_alt_tab_window(hwnd: HWND) -> bool {
    let style = unsafe { GetWindowLongW(hwnd, GWL_STYLE) } as u32;
    let ex_style = unsafe { GetWindowLongW(hwnd, GWL_EXSTYLE) } as u32;
    if style & WS_VISIBLE.0 == 0 {
        return false;
    }
    if ex_style & WS_EX_TOOLWINDOW.0 != 0 {
        return false;
    }
    if ex_style & WS_EX_NOACTIVATE.0 != 0 {
        return false;
    }
    true
}

unsafe extern "system" fn enum_callback(handle: HWND, lparam: LPARAM) -> BOOL {
    let handles = unsafe { &mut *(lparam.0 as *mut Vec<HWND>) };
    if unsafe { IsWindowVisible(handle) }.as_bool()
        && is_alt_tab_window(handle)
        && unsafe { GetWindowTextLengthW(handle) } > 0
    {
        handles.push(handle);
    }
    TRUE
}

/// Shared COM state; created once, referenced by every control.
struct UiaContext {
    _com: ComGuard,
    uia: IUIAutomation,
    walker: IUIAutomationTreeWalker,
    desktop_manager: Option<IVirtualDesktopManager>,
}

#[derive(Clone)]
pub struct WinControl {
    ctx: Rc<UiaContext>,
    element: IUIAutomationElement,
}

impl WinControl {
    fn window_pattern(&self) -> Option<IUIAutomationWindowPattern> {
        unsafe { self.element.GetCurrentPattern(UIA_WindowPatternId) }
            .ok()
            .and_then(|p| p.cast().ok())
    }
}

impl Control for WinControl {
    fn handle(&self) -> Handle {
        unsafe { self.element.CurrentNativeWindowHandle() }
            .map(|h| h.0 as Handle)
            .unwrap_or(0)
    }

    fn name(&self) -> String {
        unsafe { self.element.CurrentName() }
            .map(|b| b.to_string())
            .unwrap_or_default()
    }

    fn class_name(&self) -> String {
        unsafe { self.element.CurrentClassName() }
            .map(|b| b.to_string())
            .unwrap_or_default()
    }

    fn kind(&self) -> ControlKind {
        unsafe { self.element.CurrentControlType() }
            .map(control_kind)
            .unwrap_or(ControlKind::Unknown)
    }

    fn bounding_box(&self) -> BoundingBox {
        unsafe { self.element.CurrentBoundingRectangle() }
            .map(|r| BoundingBox::new(r.left, r.top, r.right, r.bottom))
            .unwrap_or_default()
    }

    fn children(&self) -> Vec<Self> {
        let mut out = Vec::new();
        let mut next = unsafe { self.ctx.walker.GetFirstChildElement(&self.element) }.ok();
        while let Some(element) = next {
            out.push(WinControl {
                ctx: Rc::clone(&self.ctx),
                element: element.clone(),
            });
            if out.len() >= MAX_CHILDREN_PER_NODE {
                break;
            }
            next = unsafe { self.ctx.walker.GetNextSiblingElement(&element) }.ok();
        }
        out
    }

    fn parent(&self) -> Option<Self> {
        unsafe { self.ctx.walker.GetParentElement(&self.element) }
            .ok()
            .map(|element| WinControl {
                ctx: Rc::clone(&self.ctx),
                element,
            })
    }

    fn process_id(&self) -> u32 {
        unsafe { self.element.CurrentProcessId() }
            .map(|pid| pid as u32)
            .unwrap_or(0)
    }

    fn same_as(&self, other: &Self) -> bool {
        unsafe { self.ctx.uia.CompareElements(&self.element, &other.element) }
            .map(|b| b.as_bool())
            .unwrap_or(false)
    }

    fn is_minimized(&self) -> bool {
        let handle = self.handle();
        handle != 0 && unsafe { IsIconic(hwnd(handle)) }.as_bool()
    }

    fn is_maximized(&self) -> bool {
        let handle = self.handle();
        handle != 0 && unsafe { IsZoomed(hwnd(handle)) }.as_bool()
    }

    fn is_visible(&self) -> bool {
        let handle = self.handle();
        if handle != 0 {
            unsafe { IsWindowVisible(hwnd(handle)) }.as_bool()
        } else {
            !self.is_offscreen()
        }
    }

    fn is_enabled(&self) -> bool {
        unsafe { self.element.CurrentIsEnabled() }
            .map(|b| b.as_bool())
            .unwrap_or(false)
    }

    fn is_offscreen(&self) -> bool {
        unsafe { self.element.CurrentIsOffscreen() }
            .map(|b| b.as_bool())
            .unwrap_or(false)
    }

    fn window_capabilities(&self) -> Option<WindowCaps> {
        let pattern = self.window_pattern()?;
        let can_minimize = unsafe { pattern.CurrentCanMinimize() }.ok()?.as_bool();
        let can_maximize = unsafe { pattern.CurrentCanMaximize() }.ok()?.as_bool();
        Some(WindowCaps {
            can_minimize,
            can_maximize,
        })
    }

    fn scroll_info(&self) -> Option<ScrollInfo> {
        let pattern: IUIAutomationScrollPattern =
            unsafe { self.element.GetCurrentPattern(UIA_ScrollPatternId) }
                .ok()?
                .cast()
                .ok()?;

        let axis = |scrollable: windows::core::Result<BOOL>,
                    percent: windows::core::Result<f64>|
         -> Option<f64> {
            if !scrollable.ok()?.as_bool() {
                return None;
            }
            let value = percent.ok()?;
            if value == UIA_NO_SCROLL {
                None
            } else {
                Some(value)
            }
        };

        unsafe {
            Some(ScrollInfo {
                vertical_percent: axis(
                    pattern.CurrentVerticallyScrollable(),
                    pattern.CurrentVerticalScrollPercent(),
                ),
                horizontal_percent: axis(
                    pattern.CurrentHorizontallyScrollable(),
                    pattern.CurrentHorizontalScrollPercent(),
                ),
            })
        }
    }

    fn text_value(&self) -> Option<String> {
        let pattern: IUIAutomationValuePattern =
            unsafe { self.element.GetCurrentPattern(UIA_ValuePatternId) }
                .ok()?
                .cast()
                .ok()?;
        unsafe { pattern.CurrentValue() }.ok().map(|b| b.to_string())
    }
}

pub struct WindowsPlatform {
    ctx: Rc<UiaContext>,
}

impl WindowsPlatform {
    pub fn new() -> Result<Self, AgentDeskError> {
        // Per-monitor DPI awareness so UIA rectangles line up with capture
        // pixels.  Fails harmlessly when the process already declared it.
        if let Err(err) = unsafe { SetProcessDpiAwareness(PROCESS_PER_MONITOR_DPI_AWARE) } {
            log::debug!("SetProcessDpiAwareness: {err}");
        }

        let com = ComGuard::init()?;
        let uia: IUIAutomation =
            unsafe { CoCreateInstance(&CUIAutomation, None, CLSCTX_INPROC_SERVER) }?;
        let walker = unsafe { uia.ControlViewWalker() }?;
        let desktop_manager: Option<IVirtualDesktopManager> =
            unsafe { CoCreateInstance(&VirtualDesktopManager, None, CLSCTX_ALL) }.ok();

        Ok(Self {
            ctx: Rc::new(UiaContext {
                _com: com,
                uia,
                walker,
                desktop_manager,
            }),
        })
    }

    fn wrap(&self, element: IUIAutomationElement) -> WinControl {
        WinControl {
            ctx: Rc::clone(&self.ctx),
            element,
        }
    }

    fn on_current_desktop(&self, handle: HWND) -> bool {
        match &self.ctx.desktop_manager {
            Some(manager) => unsafe { manager.IsWindowOnCurrentVirtualDesktop(handle) }
                .map(|b| b.as_bool())
                .unwrap_or(true),
            None => true,
        }
    }
}

impl Platform for WindowsPlatform {
    type Control = WinControl;

    fn enumerate_candidate_handles(&self) -> Result<Vec<Handle>, AgentDeskError> {
        let mut raw: Vec<HWND> = Vec::with_capacity(64);
        unsafe {
            EnumWindows(
                Some(enum_callback),
                LPARAM(&mut raw as *mut Vec<HWND> as isize),
            )
        }
        .map_err(|e| AgentDeskError::PlatformError(format!("EnumWindows failed: {e}")))?;

        let mut handles: Vec<Handle> = raw
            .into_iter()
            .filter(|&h| self.on_current_desktop(h))
            .map(|h| h.0 as Handle)
            .collect();

        // System chrome never appears in the Alt+Tab list but always
        // participates in the snapshot.
        let chrome: [PCWSTR; 3] = [
            w!("Progman"),
            w!("Shell_TrayWnd"),
            w!("Shell_SecondaryTrayWnd"),
        ];
        for class in chrome {
            if let Ok(found) = unsafe { FindWindowW(class, PCWSTR::null()) } {
                let handle = found.0 as Handle;
                if handle != 0 && !handles.contains(&handle) {
                    handles.push(handle);
                }
            }
        }

        Ok(handles)
    }

    fn control_from_handle(&self, handle: Handle) -> Result<Self::Control, AgentDeskError> {
        let element = unsafe { self.ctx.uia.ElementFromHandle(hwnd(handle)) }?;
        Ok(self.wrap(element))
    }

    fn root_control(&self) -> Result<Self::Control, AgentDeskError> {
        let element = unsafe { self.ctx.uia.GetRootElement() }?;
        Ok(self.wrap(element))
    }

    fn foreground_handle(&self) -> Result<Handle, AgentDeskError> {
        Ok(unsafe { GetForegroundWindow() }.0 as Handle)
    }

    fn control_from_cursor(&self) -> Result<Self::Control, AgentDeskError> {
        let (x, y) = self.cursor_position();
        let element = unsafe { self.ctx.uia.ElementFromPoint(POINT { x, y }) }?;
        Ok(self.wrap(element))
    }

    fn cursor_position(&self) -> (i32, i32) {
        let mut point = POINT::default();
        if unsafe { GetCursorPos(&mut point) }.is_err() {
            return (0, 0);
        }
        (point.x, point.y)
    }

    fn is_desktop_background(&self, control: &Self::Control) -> bool {
        let handle = control.handle();
        if handle == 0 {
            return false;
        }
        let class = read_class_name(hwnd(handle));
        class == "Progman" || class == "WorkerW"
    }

    fn process_name(&self, pid: u32) -> Option<String> {
        system_info::process_name(pid)
    }

    fn move_window(
        &self,
        handle: Handle,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<(), AgentDeskError> {
        unsafe { MoveWindow(hwnd(handle), x, y, width, height, true) }
            .map_err(|e| AgentDeskError::PlatformError(format!("MoveWindow failed: {e}")))
    }

    fn set_foreground(&self, handle: Handle) -> Result<(), AgentDeskError> {
        if unsafe { SetForegroundWindow(hwnd(handle)) }.as_bool() {
            Ok(())
        } else {
            Err(AgentDeskError::PlatformError(format!(
                "SetForegroundWindow refused for handle {handle}"
            )))
        }
    }

    fn restore_window(&self, handle: Handle) -> Result<(), AgentDeskError> {
        unsafe {
            let _ = ShowWindow(hwnd(handle), SW_RESTORE);
        }
        self.set_foreground(handle)
    }

    fn minimize_window(&self, handle: Handle) -> Result<(), AgentDeskError> {
        unsafe {
            let _ = ShowWindow(hwnd(handle), SW_MINIMIZE);
        }
        Ok(())
    }

    fn capture_screen(&self) -> Result<image::RgbaImage, AgentDeskError> {
        capture::capture_virtual_screen()
    }

    fn virtual_screen_rect(&self) -> BoundingBox {
        capture::virtual_screen_rect()
    }

    fn click(
        &self,
        x: i32,
        y: i32,
        button: MouseButton,
        clicks: u32,
    ) -> Result<(), AgentDeskError> {
        input::send_click(x, y, button, clicks)
    }

    fn move_cursor(&self, x: i32, y: i32) -> Result<(), AgentDeskError> {
        input::send_mouse_move(x, y)
    }

    fn scroll_wheel(
        &self,
        axis: ScrollAxis,
        direction: ScrollDirection,
        times: u32,
    ) -> Result<(), AgentDeskError> {
        let sign = wheel_sign(direction);
        input::send_scroll(sign * times.max(1) as i32, axis == ScrollAxis::Horizontal)
    }

    fn drag(&self, x: i32, y: i32) -> Result<(), AgentDeskError> {
        input::send_drag(x, y)
    }

    fn type_text(&self, text: &str) -> Result<(), AgentDeskError> {
        input::send_text(text)
    }

    fn press_key(&self, key: &str) -> Result<(), AgentDeskError> {
        input::send_key(input::vk_from_name(key)?)
    }

    fn key_down(&self, key: &str) -> Result<(), AgentDeskError> {
        input::send_key_down(input::vk_from_name(key)?)
    }

    fn key_up(&self, key: &str) -> Result<(), AgentDeskError> {
        input::send_key_up(input::vk_from_name(key)?)
    }

    fn hotkey(&self, keys: &[&str]) -> Result<(), AgentDeskError> {
        let vk_codes: Vec<u16> = keys
            .iter()
            .map(|k| input::vk_from_name(k))
            .collect::<Result<_, _>>()?;
        input::send_hotkey(&vk_codes)
    }

    fn current_desktop(&self) -> Result<VirtualDesktop, AgentDeskError> {
        let manager = self.ctx.desktop_manager.as_ref().ok_or_else(|| {
            AgentDeskError::Unsupported("virtual desktop manager".into())
        })?;
        let foreground = unsafe { GetForegroundWindow() };
        let id = unsafe { manager.GetWindowDesktopId(foreground) }.map_err(|e| {
            AgentDeskError::Unsupported(format!("desktop id unavailable: {e}"))
        })?;
        Ok(VirtualDesktop {
            id: format!("{id:?}"),
            name: "Desktop".to_owned(),
        })
    }

    fn all_desktops(&self) -> Result<Vec<VirtualDesktop>, AgentDeskError> {
        // IVirtualDesktopManager exposes per-window queries only; full
        // enumeration needs undocumented interfaces.
        Err(AgentDeskError::Unsupported(
            "virtual desktop enumeration".into(),
        ))
    }

    fn installed_apps(&self) -> Result<Vec<AppEntry>, AgentDeskError> {
        let (output, code) = shell::execute_command(
            "Get-StartApps | ConvertTo-Csv -NoTypeInformation",
            shell::DEFAULT_TIMEOUT,
        )?;
        if code != 0 {
            return Err(AgentDeskError::ShellError(format!(
                "Get-StartApps exited with {code}: {output}"
            )));
        }
        Ok(parse_start_apps_csv(&output))
    }

    fn launch_app(&self, app: &AppEntry) -> Result<u32, AgentDeskError> {
        let command = format!(
            "Start-Process \"shell:AppsFolder\\{}\"",
            app.app_id.replace('"', "")
        );
        let (output, code) = shell::execute_command(&command, shell::DEFAULT_TIMEOUT)?;
        if code != 0 {
            return Err(AgentDeskError::ShellError(format!(
                "launch of {:?} failed ({code}): {output}",
                app.name
            )));
        }
        // Start-Process on an AppsFolder target does not report a pid; the
        // caller falls back to name-matching the new window.
        Ok(0)
    }
}

/// Parse `Get-StartApps | ConvertTo-Csv` output: a `"Name","AppID"` header
/// followed by quoted rows.
fn parse_start_apps_csv(output: &str) -> Vec<AppEntry> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let line = line.trim_end_matches('\r');
            let mut fields = Vec::with_capacity(2);
            let mut current = String::new();
            let mut in_quotes = false;
            let mut chars = line.chars().peekable();
            while let Some(c) = chars.next() {
                match c {
                    '"' if in_quotes && chars.peek() == Some(&'"') => {
                        chars.next();
                        current.push('"');
                    }
                    '"' => in_quotes = !in_quotes,
                    ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
                    _ => current.push(c),
                }
            }
            fields.push(current);
            match fields.as_slice() {
                [name, app_id] if !name.is_empty() && !app_id.is_empty() => Some(AppEntry {
                    name: name.clone(),
                    app_id: app_id.clone(),
                }),
                _ => None,
            }
        })
        .collect()
}
