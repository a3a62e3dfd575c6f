#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

// Shared logic for the power-cycle test rig.
//
// This crate stays portable across MCU firmware and host tooling by avoiding
// the Rust standard library and exposing abstractions the other crates adopt.

pub mod actuator;
pub mod automaton;
pub mod repl;
pub mod sampling;
pub mod telemetry;
