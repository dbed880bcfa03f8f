//! Control core for UFCS Parallel Load Compensation: computes the bus-current
//! command for the companion path and runs the enable state machine.
#![cfg_attr(not(test), no_std)]

// must come first so the macros are visible to the other modules
#[macro_use]
mod fmt;

pub mod config;
pub mod plc;
pub mod shared_state;
pub mod shell;
