//! Virtual-screen capture via GDI `BitBlt`.
//!
//! GDI works everywhere the desktop session does, including Remote
//! Desktop sessions and VMs without a GPU, and a full-desktop grab is a
//! one-shot operation where frame-duplication throughput buys nothing.
//! The virtual screen spans all monitors; its origin can be negative.

use image::RgbaImage;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, SRCCOPY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetSystemMetrics, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN,
    SM_YVIRTUALSCREEN,
};

use crate::errors::AgentDeskError;
use crate::geometry::BoundingBox;

/// Bounding rectangle of the virtual screen (all monitors).
pub fn virtual_screen_rect() -> BoundingBox {
    unsafe {
        let x = GetSystemMetrics(SM_XVIRTUALSCREEN);
        let y = GetSystemMetrics(SM_YVIRTUALSCREEN);
        let w = GetSystemMetrics(SM_CXVIRTUALSCREEN);
        let h = GetSystemMetrics(SM_CYVIRTUALSCREEN);
        if w > 0 && h > 0 {
            BoundingBox::new(x, y, x + w, y + h)
        } else {
            BoundingBox::new(0, 0, 1920, 1080)
        }
    }
}

/// Capture the whole virtual screen as RGBA pixels.
pub fn capture_virtual_screen() -> Result<RgbaImage, AgentDeskError> {
    let rect = virtual_screen_rect();
    let width = rect.width();
    let height = rect.height();

    unsafe {
        let screen_dc = GetDC(HWND(std::ptr::null_mut()));
        if screen_dc.is_invalid() {
            return Err(AgentDeskError::CaptureError("GetDC(NULL) failed".into()));
        }

        let result = (|| -> Result<RgbaImage, AgentDeskError> {
            let mem_dc = CreateCompatibleDC(screen_dc);
            if mem_dc.is_invalid() {
                return Err(AgentDeskError::CaptureError(
                    "CreateCompatibleDC failed".into(),
                ));
            }
            let bitmap = CreateCompatibleBitmap(screen_dc, width, height);
            if bitmap.is_invalid() {
                let _ = DeleteDC(mem_dc);
                return Err(AgentDeskError::CaptureError(
                    "CreateCompatibleBitmap failed".into(),
                ));
            }

            let old_bitmap = SelectObject(mem_dc, bitmap);

            // Source offset is the virtual-screen origin.
            BitBlt(
                mem_dc, 0, 0, width, height, screen_dc, rect.left, rect.top, SRCCOPY,
            )
            .map_err(|e| {
                SelectObject(mem_dc, old_bitmap);
                let _ = DeleteObject(bitmap);
                let _ = DeleteDC(mem_dc);
                AgentDeskError::CaptureError(format!("BitBlt failed: {e}"))
            })?;

            let pixel_count = (width as usize) * (height as usize);
            let mut pixels = vec![0u8; pixel_count * 4];

            let bmi = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: width,
                    // Negative height = top-down bitmap (row 0 at top).
                    biHeight: -height,
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    biSizeImage: 0,
                    biXPelsPerMeter: 0,
                    biYPelsPerMeter: 0,
                    biClrUsed: 0,
                    biClrImportant: 0,
                },
                bmiColors: [Default::default()],
            };

            let lines = GetDIBits(
                mem_dc,
                bitmap,
                0,
                height as u32,
                Some(pixels.as_mut_ptr() as *mut _),
                &bmi as *const _ as *mut _,
                DIB_RGB_COLORS,
            );

            SelectObject(mem_dc, old_bitmap);
            let _ = DeleteObject(bitmap);
            let _ = DeleteDC(mem_dc);

            if lines == 0 {
                return Err(AgentDeskError::CaptureError("GetDIBits failed".into()));
            }

            // GDI yields BGRA with alpha 0; swap to RGBA and force opaque.
            for chunk in pixels.chunks_exact_mut(4) {
                chunk.swap(0, 2);
                chunk[3] = 255;
            }

            RgbaImage::from_raw(width as u32, height as u32, pixels).ok_or_else(|| {
                AgentDeskError::CaptureError("pixel buffer size mismatch".into())
            })
        })();

        ReleaseDC(HWND(std::ptr::null_mut()), screen_dc);
        result
    }
}
