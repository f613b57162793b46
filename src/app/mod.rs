//! Application orchestration layer
//!
//! Owns the contact form: its submission state machine, the controller
//! that talks to the webhook and the notifications shown to the user.

pub mod controller;
pub mod notify;
pub mod state;
