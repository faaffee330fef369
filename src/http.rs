//! HTTP API: ride history, lock control, live events over WebSocket or SSE
//! and, in test mode, feed injection.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use futures::{Sink, SinkExt, Stream, StreamExt};
use realtime::{Error, HttpError, Publisher, bad_request, not_found};
use ride::{Hub, LockStatus, RideDetail, RideManager, RideQuery, RideSummary};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::info;

use crate::messaging::ShadowDocument;
use crate::provider::AppContext;

pub type HttpResult<T> = Result<T, HttpError>;

/// Payloads queued for the feed. Shared with the stdin reader in `main`.
pub type FeedSender = mpsc::Sender<Result<Vec<u8>, std::io::Error>>;

const DEFAULT_PAGE: usize = 1;
const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 100;

pub struct AppState<P: Publisher> {
    pub manager: Arc<RideManager<AppContext<P>>>,
    /// Present only in test mode.
    pub feed: Option<FeedSender>,
}

pub fn router<P: Publisher + 'static>(state: AppState<P>) -> Router {
    let test_mode = state.feed.is_some();
    let mut router = Router::new()
        .route("/ping", get(ping))
        .route("/api/rides", get(list_rides::<P>))
        .route("/api/rides/{id}", get(ride_detail::<P>))
        .route("/api/getLockStatus", get(get_lock_status::<P>))
        .route("/api/setLockStatus", post(set_lock_status::<P>))
        .route("/api/live", get(live::<P>))
        .route("/ws", get(websocket::<P>));
    if test_mode {
        router = router.route("/api/test/location_update", post(location_update::<P>));
    }
    router.with_state(Arc::new(state))
}

async fn ping() -> Json<Value> {
    Json(json!({"message": "pong"}))
}

#[derive(Debug, Default, Deserialize)]
pub struct RidesParams {
    page: Option<String>,
    limit: Option<String>,
    date: Option<String>,
}

impl RidesParams {
    fn page(&self) -> usize {
        self.page.as_deref().and_then(|p| p.parse().ok()).filter(|p| *p >= 1).unwrap_or(DEFAULT_PAGE)
    }

    fn limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|l| l.parse().ok())
            .filter(|l| (1..=MAX_LIMIT).contains(l))
            .unwrap_or(DEFAULT_LIMIT)
    }

    fn date(&self) -> Result<Option<NaiveDate>, Error> {
        match self.date.as_deref() {
            None | Some("") => Ok(None),
            Some(date) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map(Some)
                .map_err(|_| bad_request!("invalid date format, use YYYY-MM-DD")),
        }
    }
}

async fn list_rides<P: Publisher>(
    State(state): State<Arc<AppState<P>>>, Query(params): Query<RidesParams>,
) -> HttpResult<Json<Vec<RideSummary>>> {
    let date = params.date()?;
    let rides = state.manager.provider().rides(params.page(), params.limit(), date).await?;
    Ok(Json(rides))
}

async fn ride_detail<P: Publisher>(
    State(state): State<Arc<AppState<P>>>, Path(id): Path<String>,
) -> HttpResult<Json<RideDetail>> {
    let ride_id = id.parse::<i64>().map_err(|_| bad_request!("invalid ride id: {}", id))?;
    let Some(ride) = state.manager.provider().ride(ride_id).await? else {
        return Err(not_found!("ride {} not found", ride_id).into());
    };
    Ok(Json(ride))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LockStatusBody {
    status: LockStatus,
}

async fn get_lock_status<P: Publisher>(
    State(state): State<Arc<AppState<P>>>,
) -> Json<LockStatusBody> {
    Json(LockStatusBody { status: state.manager.lock_status().await })
}

#[derive(Debug, Deserialize)]
struct LockStatusRequest {
    status: String,
}

async fn set_lock_status<P: Publisher>(
    State(state): State<Arc<AppState<P>>>, body: String,
) -> HttpResult<Json<LockStatusBody>> {
    let request: LockStatusRequest = serde_json::from_str(&body)
        .map_err(|err| bad_request!("invalid request body: {}", err))?;
    let status = request.status.parse::<LockStatus>()?;

    state.manager.set_lock_status(status).await;
    state.manager.provider().publish_lock_status(status).await?;

    info!(%status, "lock status updated");
    Ok(Json(LockStatusBody { status }))
}

async fn live<P: Publisher>(
    State(state): State<Arc<AppState<P>>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.manager.provider().hub().subscribe();
    info!(observer = subscription.id, "live observer connected");

    let frames = futures::stream::unfold(subscription, |mut subscription| async move {
        let frame = subscription.recv().await?;
        Some((Ok(Event::default().data(&*frame)), subscription))
    });
    Sse::new(frames).keep_alive(KeepAlive::default())
}

async fn websocket<P: Publisher + 'static>(
    State(state): State<Arc<AppState<P>>>, upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| async move {
        let (outgoing, incoming) = socket.split();
        relay(state.manager.provider().hub(), outgoing, incoming).await;
    })
}

/// Forward hub frames as text messages until the observer goes away.
async fn relay<Tx, Rx, E>(hub: &Hub, mut outgoing: Tx, incoming: Rx)
where
    Tx: Sink<WsMessage> + Unpin,
    Rx: Stream<Item = Result<WsMessage, E>>,
{
    let mut subscription = hub.subscribe();
    let observer = subscription.id;
    info!(observer, "websocket observer connected");

    let mut incoming = std::pin::pin!(incoming);
    loop {
        tokio::select! {
            frame = subscription.recv() => {
                let Some(frame) = frame else { break };
                if outgoing.send(WsMessage::Text((&*frame).into())).await.is_err() {
                    break;
                }
            }
            message = incoming.next() => match message {
                Some(Ok(WsMessage::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    hub.unsubscribe(observer);
    info!(observer, "websocket observer disconnected");
}

async fn location_update<P: Publisher>(
    State(state): State<Arc<AppState<P>>>, body: String,
) -> HttpResult<Json<Value>> {
    let document: ShadowDocument =
        serde_json::from_str(&body).map_err(|err| bad_request!("{}", err))?;
    if document.state.desired.timestamp.is_empty() {
        return Err(bad_request!("state.desired.timestamp is required").into());
    }

    let Some(feed) = &state.feed else {
        return Err(not_found!("test mode is disabled").into());
    };
    let payload = serde_json::to_vec(&document).map_err(Error::from)?;
    feed.try_send(Ok(payload))
        .map_err(|err| Error::Internal(format!("queueing location update: {err}")))?;

    Ok(Json(json!({"message": "location update queued"})))
}
