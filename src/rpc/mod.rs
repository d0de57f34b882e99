//! RPC façade: Unix-domain socket transport, request dispatch, and the
//! typed client stub library (spec §4.6).

pub mod client;
pub mod proto;
pub mod server;

pub use client::Client;
pub use proto::{Req, Resp, RpcError};
pub use server::{serve, AppState};
