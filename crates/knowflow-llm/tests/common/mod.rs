//! Shared helpers for HTTP client tests

pub mod mock_server;
