//! Framework-neutral HTTP delivery adapter.
//!
//! Maps a method, a path (with optional query string) and a JSON body onto
//! billing engine calls, and engine results onto a status code and a JSON
//! body. Any HTTP server can sit in front of [`LoanHandler::handle`].

pub mod handler;

pub use handler::{LoanHandler, Method, Request, Response};

/// Status codes produced by the adapter.
pub mod status {
    pub const OK: u16 = 200;
    pub const BAD_REQUEST: u16 = 400;
    pub const NOT_FOUND: u16 = 404;
    pub const REQUEST_TIMEOUT: u16 = 408;
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
}
