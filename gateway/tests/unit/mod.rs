//! Unit tests for the NEXUS gateway

mod fakes;
mod test_adapter;
mod test_router;
mod test_storage;
