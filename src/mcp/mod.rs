//! MCP protocol surface
//!
//! JSON-RPC message types, method dispatch and the two transports
//! (stdio and HTTP/SSE) that carry them.

pub mod handler;
pub mod jsonrpc;
pub mod sse;
pub mod stdio;

pub use handler::{McpHandler, PROTOCOL_VERSION, SERVER_NAME};
pub use jsonrpc::{JsonRpcRequest, JsonRpcResponse, RpcError};
pub use sse::{router, run_sse};
pub use stdio::run_stdio;
