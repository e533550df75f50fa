//! Server internals for the `revoice` binary, exposed as a library so
//! integration tests can drive the router directly.

pub mod server;
