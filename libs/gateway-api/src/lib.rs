//! Wire models shared by the NEXUS gateway HTTP surface.

pub mod models;
