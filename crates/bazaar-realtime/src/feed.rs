//! WebSocket change feed.
//!
//! After connecting, the client sends one subscribe frame scoped to the
//! user's rows. The server then pushes one JSON frame per row change:
//!
//! ```json
//! {"type": "INSERT", "table": "notifications", "record": {...}, "old_record": null}
//! ```

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use bazaar_core::error::{AppError, ErrorKind};
use bazaar_core::result::AppResult;
use bazaar_core::types::id::{NotificationId, UserId};
use bazaar_entity::notification::Notification;

use crate::backend::ChangeStream;
use crate::event::ChangeEvent;

/// Raw change frame.
#[derive(Debug, Deserialize)]
struct ChangeFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
}

/// Key columns of a deleted row.
#[derive(Debug, Deserialize)]
struct DeletedRow {
    id: NotificationId,
}

/// Realtime endpoint with the project key appended as an encoded query pair.
pub fn feed_url(realtime_url: &str, api_key: &str) -> AppResult<String> {
    let mut url = reqwest::Url::parse(realtime_url).map_err(|e| {
        AppError::with_source(
            ErrorKind::Configuration,
            format!("Invalid realtime URL '{realtime_url}': {e}"),
            e,
        )
    })?;
    url.query_pairs_mut().append_pair("apikey", api_key);
    Ok(url.into())
}

/// Connect and subscribe to the user's notification changes.
pub async fn connect(
    realtime_url: &str,
    api_key: &str,
    bearer: &str,
    user: UserId,
) -> AppResult<ChangeStream> {
    let url = feed_url(realtime_url, api_key)?;

    let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::ServiceUnavailable,
                format!("Change feed connection failed: {e}"),
                e,
            )
        })?;

    let subscribe = json!({
        "event": "subscribe",
        "table": "notifications",
        "filter": format!("user_id=eq.{user}"),
        "access_token": bearer,
    });
    socket
        .send(Message::Text(subscribe.to_string().into()))
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::ServiceUnavailable,
                format!("Change feed subscribe failed: {e}"),
                e,
            )
        })?;
    debug!(user_id = %user, "Subscribed to notification changes");

    let stream = socket.filter_map(move |frame| async move {
        match frame {
            Ok(Message::Text(text)) => parse_change(text.as_str(), user).map(Ok),
            Ok(_) => None,
            Err(e) => Some(Err(AppError::with_source(
                ErrorKind::ServiceUnavailable,
                format!("Change feed dropped: {e}"),
                e,
            ))),
        }
    });

    Ok(Box::pin(stream))
}

/// Decode one text frame. Frames that are not notification row changes
/// for `user` yield `None`.
pub fn parse_change(text: &str, user: UserId) -> Option<ChangeEvent> {
    let frame: ChangeFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(error = %e, "Ignoring non-change frame");
            return None;
        }
    };

    if frame.table.as_deref().is_some_and(|table| table != "notifications") {
        return None;
    }

    let event = match frame.kind.to_ascii_uppercase().as_str() {
        "INSERT" => ChangeEvent::Insert {
            record: decode_record(frame.record?)?,
        },
        "UPDATE" => ChangeEvent::Update {
            record: decode_record(frame.record?)?,
        },
        "DELETE" => {
            let row: DeletedRow = serde_json::from_value(frame.old_record?)
                .inspect_err(|e| warn!(error = %e, "Delete frame without a usable id"))
                .ok()?;
            return Some(ChangeEvent::Delete { id: row.id });
        }
        other => {
            debug!(kind = other, "Ignoring change frame");
            return None;
        }
    };

    let foreign = match &event {
        ChangeEvent::Insert { record } | ChangeEvent::Update { record } => record.user_id != user,
        ChangeEvent::Delete { .. } => false,
    };
    if foreign {
        warn!(id = %event.notification_id(), "Dropping change for another user");
        return None;
    }

    Some(event)
}

fn decode_record(value: Value) -> Option<Notification> {
    serde_json::from_value(value)
        .inspect_err(|e| warn!(error = %e, "Malformed notification record"))
        .ok()
}
