//! Application layer - interaction helpers and the extraction workflow
//! that coordinate the browser session with the persistence step.

pub mod interaction;
pub mod session;
