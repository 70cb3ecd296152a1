//! Keyboard and mouse injection via Win32 `SendInput`.
//!
//! `SendInput` batches multiple events atomically; every gesture here is
//! injected as a single call so other processes cannot interleave events
//! into the middle of it.

use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_KEYUP, KEYEVENTF_UNICODE, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_HWHEEL,
    MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP,
    MOUSEEVENTF_MOVE, MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_VIRTUALDESK,
    MOUSEEVENTF_WHEEL, MOUSEINPUT, MOUSE_EVENT_FLAGS, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetSystemMetrics, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN,
    SM_YVIRTUALSCREEN,
};

use crate::errors::AgentDeskError;
use crate::platform::MouseButton;

/// Maximum text length to prevent unbounded allocation.
const MAX_TEXT_LENGTH: usize = 10_000;

/// Maximum hotkey combo length (no real hotkey uses more than 5-6 keys).
const MAX_HOTKEY_KEYS: usize = 8;

/// One wheel notch in `mouseData` units.
const WHEEL_DELTA: i32 = 120;

const INPUT_SIZE: i32 = std::mem::size_of::<INPUT>() as i32;

/// Flags for absolute mouse positioning on the virtual desktop.
const ABSOLUTE_MOVE: MOUSE_EVENT_FLAGS =
    MOUSE_EVENT_FLAGS(MOUSEEVENTF_ABSOLUTE.0 | MOUSEEVENTF_MOVE.0 | MOUSEEVENTF_VIRTUALDESK.0);

fn screen_geometry() -> (i32, i32, i32, i32) {
    unsafe {
        let x = GetSystemMetrics(SM_XVIRTUALSCREEN);
        let y = GetSystemMetrics(SM_YVIRTUALSCREEN);
        let w = GetSystemMetrics(SM_CXVIRTUALSCREEN);
        let h = GetSystemMetrics(SM_CYVIRTUALSCREEN);
        // GetSystemMetrics returns 0 on failure.
        if w > 0 && h > 0 {
            (x, y, w, h)
        } else {
            (0, 0, 1920, 1080)
        }
    }
}

/// Pixel coordinates to 0..65535 normalised virtual-desktop space.
///
/// The virtual-screen origin can be negative on multi-monitor setups
/// where a monitor sits left of or above the primary.
fn normalise_coords(x: i32, y: i32) -> (i32, i32) {
    let (origin_x, origin_y, screen_w, screen_h) = screen_geometry();
    if screen_w <= 1 || screen_h <= 1 {
        return (0, 0);
    }
    let abs_x = (((x - origin_x) as i64 * 65535) / (screen_w as i64 - 1)).clamp(0, 65535) as i32;
    let abs_y = (((y - origin_y) as i64 * 65535) / (screen_h as i64 - 1)).clamp(0, 65535) as i32;
    (abs_x, abs_y)
}

fn unicode_key_input(scan_code: u16, key_up: bool) -> INPUT {
    let flags = if key_up {
        KEYEVENTF_UNICODE | KEYEVENTF_KEYUP
    } else {
        KEYEVENTF_UNICODE
    };
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(0),
                wScan: scan_code,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn virtual_key_input(vk: u16, key_up: bool) -> INPUT {
    let flags = if key_up {
        KEYEVENTF_KEYUP
    } else {
        KEYBD_EVENT_FLAGS(0)
    };
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(vk),
                wScan: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn mouse_input(abs_x: i32, abs_y: i32, data: i32, flags: MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: abs_x,
                dy: abs_y,
                // Win32 treats mouseData as signed for wheel events; `as u32`
                // is a bitwise reinterpret preserving the sign bits.
                mouseData: data as u32,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn inject(inputs: &[INPUT], what: &str) -> Result<(), AgentDeskError> {
    let sent = unsafe { SendInput(inputs, INPUT_SIZE) };
    if sent as usize == inputs.len() {
        Ok(())
    } else {
        Err(AgentDeskError::InputError(format!(
            "SendInput injected {sent}/{} events for {what}",
            inputs.len()
        )))
    }
}

/// Virtual-key code for a key name as agents write them ("ctrl", "f5", "a").
pub fn vk_from_name(name: &str) -> Result<u16, AgentDeskError> {
    let lowered = name.trim().to_ascii_lowercase();
    let vk = match lowered.as_str() {
        "ctrl" | "control" => 0x11,
        "alt" => 0x12,
        "shift" => 0x10,
        "win" | "windows" | "cmd" => 0x5B,
        "enter" | "return" => 0x0D,
        "tab" => 0x09,
        "esc" | "escape" => 0x1B,
        "space" => 0x20,
        "backspace" => 0x08,
        "delete" | "del" => 0x2E,
        "insert" => 0x2D,
        "home" => 0x24,
        "end" => 0x23,
        "pageup" => 0x21,
        "pagedown" => 0x22,
        "up" => 0x26,
        "down" => 0x28,
        "left" => 0x25,
        "right" => 0x27,
        "printscreen" => 0x2C,
        "capslock" => 0x14,
        "menu" | "apps" => 0x5D,
        _ => {
            if let Some(n) = lowered.strip_prefix('f').and_then(|n| n.parse::<u16>().ok()) {
                if (1..=24).contains(&n) {
                    return Ok(0x6F + n);
                }
            }
            let mut chars = lowered.chars();
            match (chars.next(), chars.next()) {
                (Some(c @ 'a'..='z'), None) => c.to_ascii_uppercase() as u16,
                (Some(c @ '0'..='9'), None) => c as u16,
                _ => {
                    return Err(AgentDeskError::InputError(format!(
                        "unknown key name {name:?}"
                    )))
                }
            }
        }
    };
    Ok(vk)
}

/// Type Unicode text via `KEYEVENTF_UNICODE` events.
pub fn send_text(text: &str) -> Result<(), AgentDeskError> {
    if text.is_empty() {
        return Ok(());
    }
    if text.len() > MAX_TEXT_LENGTH {
        return Err(AgentDeskError::InputError(format!(
            "text exceeds {MAX_TEXT_LENGTH} bytes"
        )));
    }
    let chars: Vec<u16> = text.encode_utf16().collect();
    let mut inputs = Vec::with_capacity(chars.len() * 2);
    for &ch in &chars {
        inputs.push(unicode_key_input(ch, false));
        inputs.push(unicode_key_input(ch, true));
    }
    inject(&inputs, "text")
}

/// Tap one key (down + up).
pub fn send_key(vk: u16) -> Result<(), AgentDeskError> {
    let inputs = [virtual_key_input(vk, false), virtual_key_input(vk, true)];
    inject(&inputs, "key")
}

/// Press a key without releasing it.
pub fn send_key_down(vk: u16) -> Result<(), AgentDeskError> {
    inject(&[virtual_key_input(vk, false)], "key down")
}

/// Release a previously pressed key.
pub fn send_key_up(vk: u16) -> Result<(), AgentDeskError> {
    inject(&[virtual_key_input(vk, true)], "key up")
}

/// Press all keys in order, release in reverse, in one atomic call.
pub fn send_hotkey(vk_codes: &[u16]) -> Result<(), AgentDeskError> {
    if vk_codes.is_empty() || vk_codes.len() > MAX_HOTKEY_KEYS {
        return Err(AgentDeskError::InputError(format!(
            "hotkey must have 1..={MAX_HOTKEY_KEYS} keys, got {}",
            vk_codes.len()
        )));
    }
    let mut inputs = Vec::with_capacity(vk_codes.len() * 2);
    for &vk in vk_codes {
        inputs.push(virtual_key_input(vk, false));
    }
    for &vk in vk_codes.iter().rev() {
        inputs.push(virtual_key_input(vk, true));
    }
    inject(&inputs, "hotkey")
}

/// Click at absolute screen coordinates, `clicks` times.
pub fn send_click(x: i32, y: i32, button: MouseButton, clicks: u32) -> Result<(), AgentDeskError> {
    let (abs_x, abs_y) = normalise_coords(x, y);
    let (down, up) = match button {
        MouseButton::Left => (MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP),
        MouseButton::Right => (MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP),
        MouseButton::Middle => (MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP),
    };

    let mut inputs = vec![mouse_input(abs_x, abs_y, 0, ABSOLUTE_MOVE)];
    for _ in 0..clicks.max(1) {
        inputs.push(mouse_input(
            abs_x,
            abs_y,
            0,
            MOUSE_EVENT_FLAGS(MOUSEEVENTF_ABSOLUTE.0 | MOUSEEVENTF_VIRTUALDESK.0 | down.0),
        ));
        inputs.push(mouse_input(
            abs_x,
            abs_y,
            0,
            MOUSE_EVENT_FLAGS(MOUSEEVENTF_ABSOLUTE.0 | MOUSEEVENTF_VIRTUALDESK.0 | up.0),
        ));
    }
    inject(&inputs, "click")
}

/// Move the cursor without clicking.
pub fn send_mouse_move(x: i32, y: i32) -> Result<(), AgentDeskError> {
    let (abs_x, abs_y) = normalise_coords(x, y);
    inject(&[mouse_input(abs_x, abs_y, 0, ABSOLUTE_MOVE)], "move")
}

/// Scroll `notches` wheel notches at the current cursor position.
/// Positive scrolls up / left per Win32 conventions are handled by sign.
pub fn send_scroll(notches: i32, horizontal: bool) -> Result<(), AgentDeskError> {
    let flag = if horizontal {
        MOUSEEVENTF_HWHEEL
    } else {
        MOUSEEVENTF_WHEEL
    };
    // Move and wheel must stay separate INPUT events; combining
    // MOUSEEVENTF_MOVE with a wheel flag is undefined.
    inject(&[mouse_input(0, 0, notches * WHEEL_DELTA, flag)], "scroll")
}

/// Drag from the current cursor position to `(x, y)` with the left button
/// held.  The caller positions the cursor at the origin first.
pub fn send_drag(x: i32, y: i32) -> Result<(), AgentDeskError> {
    let (abs_x, abs_y) = normalise_coords(x, y);
    let inputs = [
        mouse_input(0, 0, 0, MOUSEEVENTF_LEFTDOWN),
        mouse_input(abs_x, abs_y, 0, ABSOLUTE_MOVE),
        mouse_input(
            abs_x,
            abs_y,
            0,
            MOUSE_EVENT_FLAGS(ABSOLUTE_MOVE.0 | MOUSEEVENTF_LEFTUP.0),
        ),
    ];
    inject(&inputs, "drag")
}
