pub mod mcp;
pub mod session;
pub mod sweep;
pub mod ws_server;
