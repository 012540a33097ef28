//! Cloud portals driven through [`crate::session::ScrapedSessionAdapter`]

pub mod camera;
pub mod thermostat;

pub use camera::{CameraCloud, CameraDevice};
pub use thermostat::{PortalLocation, ThermostatPortal};
