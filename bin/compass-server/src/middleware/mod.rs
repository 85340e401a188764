//! HTTP middleware stack.

pub mod cors;
pub mod session;
pub mod trace;
