//! Background tasks.
//!
//! Both tasks tick immediately on spawn and stop when the shutdown watch
//! channel flips.

pub mod audit_poll;
pub mod sweep;

pub use audit_poll::spawn_audit_poll_task;
pub use sweep::spawn_sweep_task;
