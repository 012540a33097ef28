//! Stateful scraped sessions against cloud portals
//!
//! A [`ScrapedSessionAdapter`] drives one [`SessionProvider`] through a
//! login handshake and a per-device fetch, caching the aggregate.

pub mod adapter;
pub mod client;
pub mod cookies;
pub mod markers;
pub mod provider;
pub mod transport;

pub use adapter::{AdapterPolicy, AggregateResult, CycleTicket, Freshness, ScrapedSessionAdapter};
pub use client::{Session, SessionState};
pub use cookies::CookieJar;
pub use markers::{ExtractedFields, MarkerSet};
pub use provider::SessionProvider;
pub use transport::{ReqwestTransport, Transport, UpstreamRequest, UpstreamResponse};
