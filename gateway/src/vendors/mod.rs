//! Stateless vendor adapters: fetch, reshape, time out

pub mod flights;
pub mod shelly;
pub mod weather;

pub use flights::FlightFeed;
pub use shelly::{RelayClient, RelayReading};
pub use weather::WeatherClient;
