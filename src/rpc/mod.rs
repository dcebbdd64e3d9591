//! JSON-RPC surface of the model server.
//!
//! Messages are newline-delimited JSON-RPC 2.0. Requests are routed by
//! [`Gateway`] to the workspace index, the scope resolver and the
//! synchronization engine; engine notifications are forwarded to every
//! connection whose clients subscribed to the model.

mod gateway;
mod jsonrpc;

pub use gateway::{Connection, Gateway, methods};
pub use jsonrpc::{
    INTERNAL_ERROR, INVALID_MODEL, INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION,
    METHOD_NOT_FOUND, NOT_FOUND, NotificationMessage, PARSE_ERROR, PERSISTENCE_FAILURE, Request,
    RequestId, Response, RpcError,
};
