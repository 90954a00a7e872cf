//! City Traffic Library
//!
//! A procedural city with pedestrians and vehicles that can run headless or
//! feed a renderer through read-only snapshots.

pub mod simulation;
