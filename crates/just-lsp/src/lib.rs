// lib.rs: library half of the just-lsp server.
//
// main.rs only handles arguments and logging setup; everything else lives
// here so integration tests can drive the server over in-memory streams.

pub mod backend;
pub mod config;
pub mod dispatcher;
pub mod document_store;
pub mod handlers;
pub mod index;
pub mod parser;
pub mod state;
pub mod transport;
pub mod utf16;
