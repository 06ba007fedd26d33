//! Integration test crate wiring.

mod mock_server;
mod session_flow;
