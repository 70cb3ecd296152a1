//! Synthetic in-memory platform used by the unit tests.
//!
//! `FakeControl` is an `Rc`-linked tree node implementing [`Control`];
//! `FakePlatform` serves a fixed candidate list, a scripted foreground
//! handle and a solid-colour screen, and records every injected input
//! event so tests can assert action sequencing.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use image::RgbaImage;

use crate::errors::AgentDeskError;
use crate::geometry::BoundingBox;
use crate::platform::{
    AppEntry, Control, ControlKind, Handle, MouseButton, Platform, ScrollAxis, ScrollDirection,
    ScrollInfo, VirtualDesktop, WindowCaps,
};

pub struct FakeNode {
    pub handle: Handle,
    pub name: RefCell<String>,
    pub class_name: String,
    pub kind: ControlKind,
    pub bounds: Cell<BoundingBox>,
    pub pid: u32,
    pub minimized: Cell<bool>,
    pub maximized: Cell<bool>,
    pub visible: Cell<bool>,
    pub enabled: bool,
    pub offscreen: bool,
    pub caps: Option<WindowCaps>,
    pub scroll: Option<ScrollInfo>,
    pub text: Option<String>,
    parent: RefCell<Weak<FakeNode>>,
    children: RefCell<Vec<FakeControl>>,
}

#[derive(Clone)]
pub struct FakeControl(pub Rc<FakeNode>);

impl FakeControl {
    pub fn new(handle: Handle, name: &str, kind: ControlKind) -> Self {
        FakeControl(Rc::new(FakeNode {
            handle,
            name: RefCell::new(name.to_owned()),
            class_name: String::new(),
            kind,
            bounds: Cell::new(BoundingBox::default()),
            pid: 0,
            minimized: Cell::new(false),
            maximized: Cell::new(false),
            visible: Cell::new(true),
            enabled: true,
            offscreen: false,
            caps: None,
            scroll: None,
            text: None,
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
        }))
    }

    pub fn with(
        handle: Handle,
        name: &str,
        kind: ControlKind,
        mutate: impl FnOnce(&mut FakeNodeSpec),
    ) -> Self {
        let mut spec = FakeNodeSpec::default();
        mutate(&mut spec);
        FakeControl(Rc::new(FakeNode {
            handle,
            name: RefCell::new(name.to_owned()),
            class_name: spec.class_name,
            kind,
            bounds: Cell::new(spec.bounds),
            pid: spec.pid,
            minimized: Cell::new(spec.minimized),
            maximized: Cell::new(spec.maximized),
            visible: Cell::new(spec.visible),
            enabled: spec.enabled,
            offscreen: spec.offscreen,
            caps: spec.caps,
            scroll: spec.scroll,
            text: spec.text,
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
        }))
    }

    pub fn add_child(&self, child: FakeControl) -> FakeControl {
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        self.0.children.borrow_mut().push(child.clone());
        child
    }

    fn find_by_handle(&self, handle: Handle) -> Option<FakeControl> {
        if self.0.handle == handle {
            return Some(self.clone());
        }
        for child in self.0.children.borrow().iter() {
            if let Some(found) = child.find_by_handle(handle) {
                return Some(found);
            }
        }
        None
    }
}

/// Mutable construction knobs for [`FakeControl::with`].
pub struct FakeNodeSpec {
    pub class_name: String,
    pub bounds: BoundingBox,
    pub pid: u32,
    pub minimized: bool,
    pub maximized: bool,
    pub visible: bool,
    pub enabled: bool,
    pub offscreen: bool,
    pub caps: Option<WindowCaps>,
    pub scroll: Option<ScrollInfo>,
    pub text: Option<String>,
}

impl Default for FakeNodeSpec {
    fn default() -> Self {
        Self {
            class_name: String::new(),
            bounds: BoundingBox::default(),
            pid: 0,
            minimized: false,
            maximized: false,
            visible: true,
            enabled: true,
            offscreen: false,
            caps: None,
            scroll: None,
            text: None,
        }
    }
}

impl Control for FakeControl {
    fn handle(&self) -> Handle {
        self.0.handle
    }

    fn name(&self) -> String {
        self.0.name.borrow().clone()
    }

    fn class_name(&self) -> String {
        self.0.class_name.clone()
    }

    fn kind(&self) -> ControlKind {
        self.0.kind
    }

    fn bounding_box(&self) -> BoundingBox {
        self.0.bounds.get()
    }

    fn children(&self) -> Vec<Self> {
        self.0.children.borrow().clone()
    }

    fn parent(&self) -> Option<Self> {
        self.0.parent.borrow().upgrade().map(FakeControl)
    }

    fn process_id(&self) -> u32 {
        self.0.pid
    }

    fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn is_minimized(&self) -> bool {
        self.0.minimized.get()
    }

    fn is_maximized(&self) -> bool {
        self.0.maximized.get()
    }

    fn is_visible(&self) -> bool {
        self.0.visible.get()
    }

    fn is_enabled(&self) -> bool {
        self.0.enabled
    }

    fn is_offscreen(&self) -> bool {
        self.0.offscreen
    }

    fn window_capabilities(&self) -> Option<WindowCaps> {
        self.0.caps
    }

    fn scroll_info(&self) -> Option<ScrollInfo> {
        self.0.scroll
    }

    fn text_value(&self) -> Option<String> {
        self.0.text.clone()
    }
}

pub struct FakePlatform {
    pub root: FakeControl,
    pub candidates: Vec<Handle>,
    pub foreground: Cell<Handle>,
    pub desktop_background: Handle,
    /// `None` simulates an OS without multi-desktop support.
    pub desktops: Option<(VirtualDesktop, Vec<VirtualDesktop>)>,
    pub screen: BoundingBox,
    pub apps: Vec<AppEntry>,
    pub process_names: HashMap<u32, String>,
    pub events: RefCell<Vec<String>>,
    pub cursor: Cell<(i32, i32)>,
    pub fail_enumeration: Cell<bool>,
}

impl FakePlatform {
    /// Root pane with no windows; tests attach children and candidates.
    pub fn new() -> Self {
        let root = FakeControl::with(1, "Desktop Root", ControlKind::Pane, |s| {
            s.bounds = BoundingBox::new(0, 0, 1920, 1080);
        });
        FakePlatform {
            root,
            candidates: Vec::new(),
            foreground: Cell::new(0),
            desktop_background: 0,
            desktops: Some((
                VirtualDesktop {
                    id: "d1".into(),
                    name: "Desktop 1".into(),
                },
                vec![
                    VirtualDesktop {
                        id: "d1".into(),
                        name: "Desktop 1".into(),
                    },
                    VirtualDesktop {
                        id: "d2".into(),
                        name: "Desktop 2".into(),
                    },
                ],
            )),
            screen: BoundingBox::new(0, 0, 1920, 1080),
            apps: Vec::new(),
            process_names: HashMap::new(),
            events: RefCell::new(Vec::new()),
            cursor: Cell::new((0, 0)),
            fail_enumeration: Cell::new(false),
        }
    }

    fn record(&self, event: String) {
        self.events.borrow_mut().push(event);
    }

    pub fn recorded(&self) -> Vec<String> {
        self.events.borrow().clone()
    }
}

impl Platform for FakePlatform {
    type Control = FakeControl;

    fn enumerate_candidate_handles(&self) -> Result<Vec<Handle>, AgentDeskError> {
        if self.fail_enumeration.get() {
            return Err(AgentDeskError::PlatformError(
                "enumeration unavailable".into(),
            ));
        }
        Ok(self.candidates.clone())
    }

    fn control_from_handle(&self, handle: Handle) -> Result<Self::Control, AgentDeskError> {
        self.root
            .find_by_handle(handle)
            .ok_or_else(|| AgentDeskError::PlatformError(format!("no control for handle {handle}")))
    }

    fn root_control(&self) -> Result<Self::Control, AgentDeskError> {
        Ok(self.root.clone())
    }

    fn foreground_handle(&self) -> Result<Handle, AgentDeskError> {
        Ok(self.foreground.get())
    }

    fn control_from_cursor(&self) -> Result<Self::Control, AgentDeskError> {
        Ok(self.root.clone())
    }

    fn cursor_position(&self) -> (i32, i32) {
        self.cursor.get()
    }

    fn is_desktop_background(&self, control: &Self::Control) -> bool {
        control.handle() == self.desktop_background || control.class_name() == "Progman"
    }

    fn process_name(&self, pid: u32) -> Option<String> {
        self.process_names.get(&pid).cloned()
    }

    fn move_window(
        &self,
        handle: Handle,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<(), AgentDeskError> {
        let control = self.control_from_handle(handle)?;
        control
            .0
            .bounds
            .set(BoundingBox::new(x, y, x + width, y + height));
        self.record(format!("move_window({handle},{x},{y},{width},{height})"));
        Ok(())
    }

    fn set_foreground(&self, handle: Handle) -> Result<(), AgentDeskError> {
        self.control_from_handle(handle)?;
        self.foreground.set(handle);
        self.record(format!("set_foreground({handle})"));
        Ok(())
    }

    fn restore_window(&self, handle: Handle) -> Result<(), AgentDeskError> {
        let control = self.control_from_handle(handle)?;
        control.0.minimized.set(false);
        self.foreground.set(handle);
        self.record(format!("restore_window({handle})"));
        Ok(())
    }

    fn minimize_window(&self, handle: Handle) -> Result<(), AgentDeskError> {
        let control = self.control_from_handle(handle)?;
        control.0.minimized.set(true);
        self.record(format!("minimize_window({handle})"));
        Ok(())
    }

    fn capture_screen(&self) -> Result<RgbaImage, AgentDeskError> {
        let w = self.screen.width().max(1) as u32;
        let h = self.screen.height().max(1) as u32;
        Ok(RgbaImage::from_pixel(w, h, image::Rgba([30, 30, 30, 255])))
    }

    fn virtual_screen_rect(&self) -> BoundingBox {
        self.screen
    }

    fn click(
        &self,
        x: i32,
        y: i32,
        button: MouseButton,
        clicks: u32,
    ) -> Result<(), AgentDeskError> {
        self.cursor.set((x, y));
        self.record(format!("click({x},{y},{button:?},{clicks})"));
        Ok(())
    }

    fn move_cursor(&self, x: i32, y: i32) -> Result<(), AgentDeskError> {
        self.cursor.set((x, y));
        self.record(format!("move_cursor({x},{y})"));
        Ok(())
    }

    fn scroll_wheel(
        &self,
        axis: ScrollAxis,
        direction: ScrollDirection,
        times: u32,
    ) -> Result<(), AgentDeskError> {
        self.record(format!("scroll({axis:?},{direction:?},{times})"));
        Ok(())
    }

    fn drag(&self, x: i32, y: i32) -> Result<(), AgentDeskError> {
        self.cursor.set((x, y));
        self.record(format!("drag({x},{y})"));
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<(), AgentDeskError> {
        self.record(format!("type_text({text})"));
        Ok(())
    }

    fn press_key(&self, key: &str) -> Result<(), AgentDeskError> {
        self.record(format!("press_key({key})"));
        Ok(())
    }

    fn key_down(&self, key: &str) -> Result<(), AgentDeskError> {
        self.record(format!("key_down({key})"));
        Ok(())
    }

    fn key_up(&self, key: &str) -> Result<(), AgentDeskError> {
        self.record(format!("key_up({key})"));
        Ok(())
    }

    fn hotkey(&self, keys: &[&str]) -> Result<(), AgentDeskError> {
        self.record(format!("hotkey({})", keys.join("+")));
        Ok(())
    }

    fn current_desktop(&self) -> Result<VirtualDesktop, AgentDeskError> {
        self.desktops
            .as_ref()
            .map(|(current, _)| current.clone())
            .ok_or_else(|| AgentDeskError::Unsupported("virtual desktops".into()))
    }

    fn all_desktops(&self) -> Result<Vec<VirtualDesktop>, AgentDeskError> {
        self.desktops
            .as_ref()
            .map(|(_, all)| all.clone())
            .ok_or_else(|| AgentDeskError::Unsupported("virtual desktops".into()))
    }

    fn installed_apps(&self) -> Result<Vec<AppEntry>, AgentDeskError> {
        Ok(self.apps.clone())
    }

    fn launch_app(&self, app: &AppEntry) -> Result<u32, AgentDeskError> {
        self.record(format!("launch_app({})", app.app_id));
        Ok(0)
    }
}
