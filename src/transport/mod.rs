//! Transport boundary: outbound request/reply to named peers, inbound
//! dispatch of decoded wire messages onto a bound server.
//!
//! The core treats every outbound call as fallible and every failure as
//! recoverable; the trait keeps the engine testable against an in-memory
//! implementation while the HTTP implementation carries real traffic.

mod http;

pub use http::{
    FIND_SUCCESSOR_PATH, FINGER_TABLE_PATH, GET_PREDECESSOR_PATH, GET_SUCCESSOR_PATH,
    HttpTransport, JOIN_PATH, NOTIFY_PATH, START_PATH, STOP_PATH, router,
};

use crate::error::Result;
use crate::message::{
    FindSuccessorRequest, FindSuccessorResponse, GetPredecessorResponse, NotifyRequest,
    NotifyResponse,
};
use async_trait::async_trait;

/// Outbound request/reply to other ring members. Implementations are shared
/// across tasks and bound every call with a timeout.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Ask `host` for the successor of `req.id`. The destination is named
    /// explicitly; `req.host` stays the semantic requester field.
    async fn send_find_successor(
        &self,
        host: &str,
        req: FindSuccessorRequest,
    ) -> Result<FindSuccessorResponse>;

    /// Deliver a notify to `req.target_host`.
    async fn send_notify(&self, req: NotifyRequest) -> Result<NotifyResponse>;

    /// Read the predecessor of `host`; `Error::NoPredecessor` when unset.
    async fn send_get_predecessor(&self, host: &str) -> Result<GetPredecessorResponse>;

    /// Read the successor of `host`.
    async fn send_get_successor(&self, host: &str) -> Result<FindSuccessorResponse>;
}
