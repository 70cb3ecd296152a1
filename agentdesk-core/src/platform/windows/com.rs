//! COM apartment RAII guard.
//!
//! The `PhantomData<*const ()>` field makes the guard `!Send` + `!Sync`;
//! a COM apartment belongs to the thread that initialised it.

use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_MULTITHREADED};

use crate::errors::AgentDeskError;

/// Calls `CoUninitialize` on `Drop` when a balancing call is required.
///
/// Instantiate once per thread that touches UI Automation.
#[must_use = "ComGuard must be kept alive for the duration of COM usage"]
pub struct ComGuard {
    should_uninit: bool,
    _not_send: std::marker::PhantomData<*const ()>,
}

impl ComGuard {
    /// Initialise (or join) the thread's MTA COM apartment.
    ///
    /// `RPC_E_CHANGED_MODE` means the thread already has an STA apartment:
    /// COM is usable, but we must not call `CoUninitialize` since our
    /// initialisation did not take effect.
    pub fn init() -> Result<Self, AgentDeskError> {
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };

        match hr.0 as u32 {
            // S_OK (newly initialised) or S_FALSE (already initialised).
            0x0 | 0x1 => Ok(Self {
                should_uninit: true,
                _not_send: std::marker::PhantomData,
            }),
            0x8001_0106 => {
                log::warn!("CoInitializeEx: thread already has an STA apartment");
                Ok(Self {
                    should_uninit: false,
                    _not_send: std::marker::PhantomData,
                })
            }
            other => Err(AgentDeskError::PlatformError(format!(
                "CoInitializeEx failed: HRESULT 0x{other:08X}"
            ))),
        }
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        if self.should_uninit {
            unsafe { CoUninitialize() };
        }
    }
}
