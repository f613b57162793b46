//! Desktop overlay mount target
//!
//! Hosts the background in a layered, click-through, non-activating popup
//! window kept at the bottom of the z-order, so it sits behind every other
//! window like a page background sits behind its content. Frames are pushed
//! with `UpdateLayeredWindow` for flicker-free per-pixel alpha.

use std::ffi::c_void;

use tiny_skia::Pixmap;
use windows::Win32::Foundation::{COLORREF, HWND, LPARAM, LRESULT, POINT, SIZE, WPARAM};
use windows::Win32::Graphics::Gdi::{
    AC_SRC_ALPHA, AC_SRC_OVER, BI_RGB, BITMAPINFO, BITMAPINFOHEADER, BLENDFUNCTION,
    CreateCompatibleDC, CreateDIBSection, DIB_RGB_COLORS, DeleteDC, DeleteObject, GetDC, HGDIOBJ,
    ReleaseDC, SelectObject,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, HWND_BOTTOM, MSG,
    PM_REMOVE, PeekMessageW, RegisterClassW, SW_SHOWNOACTIVATE, SWP_NOACTIVATE, SWP_NOMOVE,
    SWP_NOSIZE, SetWindowPos, ShowWindow, TranslateMessage, ULW_ALPHA, UpdateLayeredWindow,
    WNDCLASSW, WS_EX_LAYERED, WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW, WS_EX_TRANSPARENT, WS_POPUP,
};
use windows::core::{PCWSTR, w};

use crate::domain::core::{Rect, Viewport};
use crate::platform::mount::{MountError, MountTarget, SurfaceId, SurfaceSpec};

const CLASS_NAME: PCWSTR = w!("ContactBackdropSurface");

#[derive(Debug)]
struct OverlaySurface {
    id: SurfaceId,
    hwnd: HWND,
    rect: Rect,
}

/// Mount target backed by a layered desktop window
#[derive(Debug)]
pub struct OverlayMount {
    origin: (i32, i32),
    next_id: u64,
    surface: Option<OverlaySurface>,
}

impl OverlayMount {
    /// Mount target whose surface's top-left corner is at `x`, `y`
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            origin: (x, y),
            next_id: 0,
            surface: None,
        }
    }

    fn attached(&self, id: SurfaceId) -> Result<&OverlaySurface, MountError> {
        self.surface
            .as_ref()
            .filter(|surface| surface.id == id)
            .ok_or(MountError::UnknownSurface(id))
    }

    fn register_window_class() -> Result<(), MountError> {
        unsafe extern "system" fn surface_window_proc(
            hwnd: HWND,
            msg: u32,
            wparam: WPARAM,
            lparam: LPARAM,
        ) -> LRESULT {
            unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
        }

        let hinstance = unsafe { GetModuleHandleW(None) }
            .map_err(|e| MountError::Platform(format!("GetModuleHandleW: {e}")))?;

        let wc = WNDCLASSW {
            lpfnWndProc: Some(surface_window_proc),
            hInstance: hinstance.into(),
            lpszClassName: CLASS_NAME,
            ..Default::default()
        };

        // A zero atom after the first attach means the class already exists.
        unsafe { RegisterClassW(&wc) };
        Ok(())
    }

    fn create_window(rect: Rect, spec: &SurfaceSpec) -> Result<HWND, MountError> {
        let hinstance = unsafe { GetModuleHandleW(None) }
            .map_err(|e| MountError::Platform(format!("GetModuleHandleW: {e}")))?;

        let mut ex_style = WS_EX_LAYERED | WS_EX_NOACTIVATE | WS_EX_TOOLWINDOW;
        if spec.click_through {
            ex_style |= WS_EX_TRANSPARENT;
        }

        let hwnd = unsafe {
            CreateWindowExW(
                ex_style,
                CLASS_NAME,
                w!("Contact Backdrop"),
                WS_POPUP,
                rect.x,
                rect.y,
                rect.w,
                rect.h,
                None,
                None,
                hinstance,
                None,
            )
        };

        if hwnd.0 == 0 {
            return Err(MountError::Platform("CreateWindowExW failed".into()));
        }
        Ok(hwnd)
    }

    /// Present the pixmap via UpdateLayeredWindow
    fn present_pixmap(surface: &OverlaySurface, pixmap: &Pixmap) -> Result<(), MountError> {
        use std::slice;

        let width = pixmap.width() as i32;
        let height = pixmap.height() as i32;

        unsafe {
            let screen_dc = GetDC(HWND(0));
            if screen_dc.0 == 0 {
                return Err(MountError::Platform("GetDC failed".into()));
            }

            let memory_dc = CreateCompatibleDC(screen_dc);
            if memory_dc.0 == 0 {
                ReleaseDC(HWND(0), screen_dc);
                return Err(MountError::Platform("CreateCompatibleDC failed".into()));
            }

            let mut bitmap_info = BITMAPINFO::default();
            bitmap_info.bmiHeader = BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width,
                biHeight: -height,
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            };

            let mut pixel_ptr: *mut c_void = std::ptr::null_mut();
            let dib = match CreateDIBSection(
                memory_dc,
                &bitmap_info,
                DIB_RGB_COLORS,
                &mut pixel_ptr,
                None,
                0,
            ) {
                Ok(bitmap) => bitmap,
                Err(e) => {
                    DeleteDC(memory_dc);
                    ReleaseDC(HWND(0), screen_dc);
                    return Err(MountError::Platform(format!("CreateDIBSection: {e}")));
                }
            };
            let dib_object: HGDIOBJ = dib.into();

            if pixel_ptr.is_null() {
                DeleteObject(dib_object);
                DeleteDC(memory_dc);
                ReleaseDC(HWND(0), screen_dc);
                return Err(MountError::Platform("DIB section has no pixels".into()));
            }

            {
                // tiny-skia stores premultiplied RGBA, GDI expects BGRA.
                let dst = slice::from_raw_parts_mut(pixel_ptr as *mut u8, pixmap.data().len());
                for (dst, src) in dst.chunks_exact_mut(4).zip(pixmap.data().chunks_exact(4)) {
                    dst[0] = src[2];
                    dst[1] = src[1];
                    dst[2] = src[0];
                    dst[3] = src[3];
                }
            }

            let old_bitmap = SelectObject(memory_dc, dib_object);
            if old_bitmap.0 == 0 {
                DeleteObject(dib_object);
                DeleteDC(memory_dc);
                ReleaseDC(HWND(0), screen_dc);
                return Err(MountError::Platform("SelectObject failed".into()));
            }

            let size = SIZE {
                cx: width,
                cy: height,
            };
            let dst_point = POINT {
                x: surface.rect.x,
                y: surface.rect.y,
            };
            let src_point = POINT { x: 0, y: 0 };
            let blend = BLENDFUNCTION {
                BlendOp: AC_SRC_OVER as u8,
                BlendFlags: 0,
                SourceConstantAlpha: 255,
                AlphaFormat: AC_SRC_ALPHA as u8,
            };

            let update_result = UpdateLayeredWindow(
                surface.hwnd,
                screen_dc,
                Some(&dst_point),
                Some(&size),
                memory_dc,
                Some(&src_point),
                COLORREF(0),
                Some(&blend),
                ULW_ALPHA,
            );

            SelectObject(memory_dc, old_bitmap);
            DeleteObject(dib_object);
            DeleteDC(memory_dc);
            ReleaseDC(HWND(0), screen_dc);

            update_result.map_err(|e| MountError::Platform(format!("UpdateLayeredWindow: {e}")))
        }
    }
}

impl MountTarget for OverlayMount {
    fn attach(&mut self, spec: SurfaceSpec) -> Result<SurfaceId, MountError> {
        if let Some(existing) = &self.surface {
            return Err(MountError::Occupied(existing.id));
        }

        Self::register_window_class()?;
        let rect = Rect::at(self.origin.0, self.origin.1, spec.viewport);
        let hwnd = Self::create_window(rect, &spec)?;

        unsafe {
            ShowWindow(hwnd, SW_SHOWNOACTIVATE);
            if let Err(e) = SetWindowPos(
                hwnd,
                HWND_BOTTOM,
                0,
                0,
                0,
                0,
                SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
            ) {
                log::warn!("Failed to lower background window: {}", e);
            }
        }

        self.next_id += 1;
        let id = SurfaceId(self.next_id);
        self.surface = Some(OverlaySurface { id, hwnd, rect });
        log::debug!("Overlay surface {:?} created at {:?}", id, rect);
        Ok(id)
    }

    fn resize(&mut self, surface: SurfaceId, viewport: Viewport) -> Result<(), MountError> {
        let attached = self.attached(surface)?;
        let rect = Rect::at(attached.rect.x, attached.rect.y, viewport);
        unsafe {
            SetWindowPos(
                attached.hwnd,
                HWND_BOTTOM,
                rect.x,
                rect.y,
                rect.w,
                rect.h,
                SWP_NOACTIVATE,
            )
        }
        .map_err(|e| MountError::Platform(format!("SetWindowPos: {e}")))?;

        if let Some(attached) = self.surface.as_mut() {
            attached.rect = rect;
        }
        Ok(())
    }

    fn present(&mut self, surface: SurfaceId, frame: &Pixmap) -> Result<(), MountError> {
        let attached = self.attached(surface)?;
        Self::present_pixmap(attached, frame)
    }

    fn detach(&mut self, surface: SurfaceId) -> Result<(), MountError> {
        self.attached(surface)?;
        if let Some(attached) = self.surface.take() {
            unsafe { DestroyWindow(attached.hwnd) }
                .map_err(|e| MountError::Platform(format!("DestroyWindow: {e}")))?;
        }
        Ok(())
    }
}

impl Drop for OverlayMount {
    fn drop(&mut self) {
        if let Some(surface) = self.surface.take() {
            unsafe {
                DestroyWindow(surface.hwnd).ok();
            }
        }
    }
}

/// Dispatches pending window messages of the current thread
pub fn pump_messages() {
    let mut msg = MSG::default();
    unsafe {
        while PeekMessageW(&mut msg, HWND(0), 0, 0, PM_REMOVE).as_bool() {
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}
