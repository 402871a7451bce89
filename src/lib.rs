//! cinder-evm — an interpreter for EVM bytecode.
//!
//! Executes contract code on a 256-bit-word stack machine against a mutable
//! world-state snapshot and returns the resulting stack, return payload,
//! emitted logs, and a success flag. Gas is treated as an unbounded
//! resource; precompiles, signatures, and consensus are out of scope.

pub mod fixture;

pub mod vm;
