//! Admin control surface

pub mod admin;

pub use admin::{AuditRecord, CommandOutcome, ControlCommand, ControlMode, ControlState, ControlStore};
