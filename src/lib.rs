//! Daily goal time tracker. One goal at a time accrues time, progress is kept per local day and
//! saved often enough that quitting, sleeping or losing the session costs at most a minute.
//!
//! [engine] drives the timer, [goals] persists the goals, [cli] is a thin command line host.

pub mod cli;
pub mod engine;
pub mod fs;
pub mod goals;
pub mod utils;
