//! Platform integrations
//!
//! Surfaces the background can be mounted on and the HTTP transport used
//! for form delivery. Win32 code is confined to `overlay`.

pub mod mount;
#[cfg(windows)]
pub mod overlay;
pub mod webhook;
