//! Platform side of the overlay: work-area queries and stacking order.
//! Native calls are used where available; everything else goes through the
//! Bevy window (winit underneath).

use crate::bounds::{resolve_work_area, BoundsSource, KnownBounds, MonitorBounds};
use crate::desktop::DesktopLayer;
use crate::error::PetError;
use bevy::prelude::*;
use bevy::window::WindowLevel;

/// The OS notion of the usable work area (screen minus task bars).
pub struct PlatformWorkArea;

impl BoundsSource for PlatformWorkArea {
    fn name(&self) -> &'static str {
        "platform work area"
    }

    #[cfg(windows)]
    fn query(&self) -> Result<MonitorBounds, PetError> {
        win32::work_area()
    }

    #[cfg(not(windows))]
    fn query(&self) -> Result<MonitorBounds, PetError> {
        Err(PetError::platform(
            "work area query",
            "not supported on this platform",
        ))
    }
}

/// Union of monitor rectangles given as (origin, size).
pub fn virtual_screen<I>(monitors: I) -> Option<MonitorBounds>
where
    I: IntoIterator<Item = (IVec2, UVec2)>,
{
    monitors
        .into_iter()
        .map(|(origin, size)| MonitorBounds::from_origin_size(origin, size))
        .reduce(MonitorBounds::union)
}

/// Where the pet may roam: the OS work area, else every monitor together,
/// else the fixed fallback. The monitor the window is on is not asked on
/// its own, so a multi-monitor desktop is never cut down to one screen.
pub fn resolve_overlay_bounds<I>(monitors: I) -> MonitorBounds
where
    I: IntoIterator<Item = (IVec2, UVec2)>,
{
    let all = KnownBounds {
        name: "virtual screen",
        bounds: virtual_screen(monitors),
    };
    resolve_work_area(&[&PlatformWorkArea, &all])
}

/// The overlay window as seen by the z-order maintainer.
pub struct OverlayWindow<'a> {
    pub window: &'a mut Window,
    #[cfg(windows)]
    pub hwnd: Option<windows::Win32::Foundation::HWND>,
}

impl DesktopLayer for OverlayWindow<'_> {
    fn send_to_back(&mut self) -> Result<(), PetError> {
        #[cfg(windows)]
        if let Some(hwnd) = self.hwnd {
            match win32::send_to_back(hwnd) {
                Ok(()) => return Ok(()),
                Err(err) => warn!("{err}; falling back to window level"),
            }
        }
        self.window.window_level = WindowLevel::AlwaysOnBottom;
        Ok(())
    }

    fn is_at_back(&self) -> Result<bool, PetError> {
        #[cfg(windows)]
        if let Some(hwnd) = self.hwnd {
            if let Ok(placed) = win32::is_at_back(hwnd) {
                return Ok(placed);
            }
        }
        Ok(self.window.visible && self.window.window_level == WindowLevel::AlwaysOnBottom)
    }
}

#[cfg(windows)]
pub use win32::hwnd_of;

#[cfg(windows)]
mod win32 {
    use crate::bounds::MonitorBounds;
    use crate::error::PetError;
    use raw_window_handle::{HasWindowHandle, RawWindowHandle};
    use std::ffi::c_void;
    use windows::Win32::Foundation::{HWND, RECT};
    use windows::Win32::UI::WindowsAndMessaging::{
        GetClassNameW, GetWindow, GetWindowLongPtrW, IsWindowVisible, SetWindowLongPtrW,
        SetWindowPos, SystemParametersInfoW, GWL_EXSTYLE, GW_HWNDNEXT, HWND_BOTTOM,
        SPI_GETWORKAREA, SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSIZE,
        SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS, WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW,
    };

    // Shell windows that sit below everything, the overlay included.
    const SHELL_CLASSES: [&str; 2] = ["Progman", "WorkerW"];

    pub fn hwnd_of(window: &impl HasWindowHandle) -> Option<HWND> {
        match window.window_handle().ok()?.as_raw() {
            RawWindowHandle::Win32(handle) => Some(HWND(handle.hwnd.get() as *mut c_void)),
            _ => None,
        }
    }

    pub fn work_area() -> Result<MonitorBounds, PetError> {
        let mut rect = RECT::default();
        unsafe {
            SystemParametersInfoW(
                SPI_GETWORKAREA,
                0,
                Some(&mut rect as *mut RECT as *mut c_void),
                SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS(0),
            )
        }
        .map_err(|e| PetError::platform("SystemParametersInfoW", e))?;
        Ok(MonitorBounds {
            left: rect.left,
            top: rect.top,
            right: rect.right,
            bottom: rect.bottom,
        })
    }

    /// Tool-window + no-activate styles keep it off the task bar and out of
    /// focus, then it goes to the bottom of the stack.
    pub fn send_to_back(hwnd: HWND) -> Result<(), PetError> {
        unsafe {
            let style = GetWindowLongPtrW(hwnd, GWL_EXSTYLE);
            let wanted = style | (WS_EX_TOOLWINDOW.0 | WS_EX_NOACTIVATE.0) as isize;
            if wanted != style {
                SetWindowLongPtrW(hwnd, GWL_EXSTYLE, wanted);
            }
            SetWindowPos(
                hwnd,
                HWND_BOTTOM,
                0,
                0,
                0,
                0,
                SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
            )
        }
        .map_err(|e| PetError::platform("SetWindowPos", e))
    }

    pub fn is_at_back(hwnd: HWND) -> Result<bool, PetError> {
        unsafe {
            if !IsWindowVisible(hwnd).as_bool() {
                return Ok(false);
            }
            let mut below = GetWindow(hwnd, GW_HWNDNEXT);
            while let Ok(next) = below {
                if next.0.is_null() {
                    break;
                }
                if IsWindowVisible(next).as_bool() && !is_shell(next) {
                    return Ok(false);
                }
                below = GetWindow(next, GW_HWNDNEXT);
            }
        }
        Ok(true)
    }

    fn is_shell(hwnd: HWND) -> bool {
        let mut buf = [0u16; 64];
        let len = unsafe { GetClassNameW(hwnd, &mut buf) }.max(0) as usize;
        let class = String::from_utf16_lossy(&buf[..len]);
        SHELL_CLASSES.contains(&class.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_screen_spans_all_monitors() {
        let screen = virtual_screen([
            (IVec2::new(0, 0), UVec2::new(1920, 1080)),
            (IVec2::new(1920, -200), UVec2::new(1080, 1920)),
        ]);
        assert_eq!(
            screen,
            Some(MonitorBounds {
                left: 0,
                top: -200,
                right: 3000,
                bottom: 1720
            })
        );
        assert_eq!(virtual_screen(Vec::new()), None);
    }

    #[cfg(not(windows))]
    #[test]
    fn work_area_query_fails_off_windows() {
        assert!(PlatformWorkArea.query().is_err());
    }

    #[cfg(not(windows))]
    #[test]
    fn overlay_bounds_span_every_monitor() {
        let bounds = resolve_overlay_bounds([
            (IVec2::new(0, 0), UVec2::new(1920, 1080)),
            (IVec2::new(-1280, 0), UVec2::new(1280, 1024)),
        ]);
        assert_eq!(
            bounds,
            MonitorBounds {
                left: -1280,
                top: 0,
                right: 1920,
                bottom: 1080
            }
        );
        assert_eq!(resolve_overlay_bounds(Vec::new()), MonitorBounds::FALLBACK);
    }

    #[test]
    fn window_level_fallback_places_and_verifies() {
        let mut window = Window {
            window_level: WindowLevel::Normal,
            ..default()
        };
        let mut overlay = OverlayWindow {
            window: &mut window,
            #[cfg(windows)]
            hwnd: None,
        };
        assert!(!overlay.is_at_back().unwrap());
        overlay.send_to_back().unwrap();
        assert!(overlay.is_at_back().unwrap());
    }
}
