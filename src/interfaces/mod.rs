//! Delivery adapters: the HTTP request mapping and the CSV request scripts
//! the command line feeds through it.

pub mod csv;
pub mod http;
