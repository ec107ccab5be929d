//! Gatekeeper module: membership onboarding gate and admin overrides.

pub mod admin;
pub mod gate;

pub use admin::AdminActions;
pub use gate::{GateConfig, MembershipGate};
