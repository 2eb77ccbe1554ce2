//! QuickFT: a gzip+base64 framed file transfer service over TCP,
//! supporting SEND (upload), RECEIVE (download), and DELETE operations.

pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod paths;
pub mod protocol;
pub mod result_code;
pub mod server;

pub use client::Client;
pub use config::Config;
pub use error::{Error, Result};
pub use result_code::ResultCode;
pub use server::Server;
