//! HTTP transport: a reqwest client for outbound calls and an axum router
//! dispatching inbound requests onto a bound server.
//!
//! Requests and responses travel as binary message payloads under a private
//! content type. Handler errors surface as status codes: malformed payloads
//! are 4xx and never touch node state.

use crate::error::{Error, Result};
use crate::message::{
    FindSuccessorRequest, FindSuccessorResponse, GetPredecessorResponse, NotifyRequest,
    NotifyResponse,
};
use crate::server::Server;
use crate::transport::Transport;
use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use prost::Message;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const FIND_SUCCESSOR_PATH: &str = "/findSuccessor";
pub const NOTIFY_PATH: &str = "/notify";
pub const GET_PREDECESSOR_PATH: &str = "/getPredecessor";
pub const GET_SUCCESSOR_PATH: &str = "/getSuccessor";
pub const JOIN_PATH: &str = "/join";
pub const START_PATH: &str = "/start";
pub const STOP_PATH: &str = "/stop";
pub const FINGER_TABLE_PATH: &str = "/getFingerTable";

const CONTENT_TYPE: &str = "chord.protobuf";

/// Outbound calls give up after this long; the next maintenance tick retries.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> HttpTransport {
        HttpTransport::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> HttpTransport {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("http client");
        HttpTransport { client }
    }

    async fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        let resp = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE.as_str(), CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{url}: {e}")))?;
        Self::read_body(url, resp).await
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{url}: {e}")))?;
        Self::read_body(url, resp).await
    }

    async fn read_body(url: &str, resp: reqwest::Response) -> Result<Vec<u8>> {
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("{url}: status {status}")));
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("{url}: {e}")))?;
        Ok(body.to_vec())
    }
}

impl Default for HttpTransport {
    fn default() -> HttpTransport {
        HttpTransport::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_find_successor(
        &self,
        host: &str,
        req: FindSuccessorRequest,
    ) -> Result<FindSuccessorResponse> {
        let url = format!("{host}{FIND_SUCCESSOR_PATH}");
        let body = self.post(&url, req.encode_to_vec()).await?;
        Ok(FindSuccessorResponse::decode(body.as_slice())?)
    }

    async fn send_notify(&self, req: NotifyRequest) -> Result<NotifyResponse> {
        let url = format!("{}{NOTIFY_PATH}", req.target_host);
        let body = self.post(&url, req.encode_to_vec()).await?;
        Ok(NotifyResponse::decode(body.as_slice())?)
    }

    async fn send_get_predecessor(&self, host: &str) -> Result<GetPredecessorResponse> {
        let url = format!("{host}{GET_PREDECESSOR_PATH}");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{url}: {e}")))?;
        // This endpoint reports "no predecessor yet" as 404; keep it apart
        // from real transport failure so stabilize can proceed quietly.
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NoPredecessor);
        }
        let body = Self::read_body(&url, resp).await?;
        Ok(GetPredecessorResponse::decode(body.as_slice())?)
    }

    async fn send_get_successor(&self, host: &str) -> Result<FindSuccessorResponse> {
        let url = format!("{host}{GET_SUCCESSOR_PATH}");
        let body = self.get(&url).await?;
        Ok(FindSuccessorResponse::decode(body.as_slice())?)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Decode(_) | Error::Encode(_) => StatusCode::BAD_REQUEST,
            Error::NoPredecessor => StatusCode::NOT_FOUND,
            Error::AlreadyRunning | Error::AlreadyStopped => StatusCode::CONFLICT,
            Error::ServerStopped => StatusCode::SERVICE_UNAVAILABLE,
            Error::Transport(_) => StatusCode::BAD_GATEWAY,
            Error::NoSuccessor => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Install the wire routes onto a router bound to `server`.
pub fn router(server: Arc<Server>) -> Router {
    Router::new()
        .route(FIND_SUCCESSOR_PATH, post(find_successor))
        .route(NOTIFY_PATH, post(notify))
        .route(GET_PREDECESSOR_PATH, get(get_predecessor))
        .route(GET_SUCCESSOR_PATH, get(get_successor))
        .route(JOIN_PATH, post(join))
        .route(START_PATH, post(start))
        .route(STOP_PATH, post(stop))
        .route(FINGER_TABLE_PATH, get(finger_table))
        .with_state(server)
}

fn proto_body(msg: &impl Message) -> Response {
    (
        [(header::CONTENT_TYPE, CONTENT_TYPE)],
        msg.encode_to_vec(),
    )
        .into_response()
}

async fn find_successor(
    State(server): State<Arc<Server>>,
    body: Bytes,
) -> std::result::Result<Response, Error> {
    let req = FindSuccessorRequest::decode(body.as_ref())?;
    let resp = server.find_successor(&req).await?;
    debug!("host {}'s successor for the queried id is {}", req.host, resp.host);
    Ok(proto_body(&resp))
}

async fn notify(
    State(server): State<Arc<Server>>,
    body: Bytes,
) -> std::result::Result<Response, Error> {
    let req = NotifyRequest::decode(body.as_ref())?;
    let resp = server.notify(req).await?;
    Ok(proto_body(&resp))
}

async fn get_predecessor(
    State(server): State<Arc<Server>>,
) -> std::result::Result<Response, Error> {
    let resp = server.get_predecessor().await?;
    Ok(proto_body(&resp))
}

async fn get_successor(State(server): State<Arc<Server>>) -> Response {
    proto_body(&server.get_successor().await)
}

#[derive(Deserialize)]
struct JoinParams {
    host: String,
}

async fn join(
    State(server): State<Arc<Server>>,
    Query(params): Query<JoinParams>,
) -> std::result::Result<StatusCode, Error> {
    server.join(&params.host).await?;
    Ok(StatusCode::OK)
}

async fn start(State(server): State<Arc<Server>>) -> std::result::Result<StatusCode, Error> {
    server.start().await?;
    Ok(StatusCode::OK)
}

async fn stop(State(server): State<Arc<Server>>) -> std::result::Result<StatusCode, Error> {
    server.stop().await?;
    Ok(StatusCode::OK)
}

async fn finger_table(State(server): State<Arc<Server>>) -> Response {
    Json(server.finger_table().await).into_response()
}
