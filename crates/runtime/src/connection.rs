//! DevTools WebSocket connection.
//!
//! Implements the request/response correlation layer on top of the socket:
//!
//! 1. `send()` allocates an id and registers a oneshot sender
//! 2. The command is serialized and written to the socket
//! 3. The reader task routes replies by id and broadcasts events
//! 4. The caller awaits its reply, bounded by the command timeout
//!
//! When the socket closes every pending command fails with
//! [`DriverError::Closed`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::{DriverError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;
type Reply = std::result::Result<Value, ErrorBody>;

const EVENT_CAPACITY: usize = 256;

/// Outgoing command.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
	pub id: u64,
	pub method: String,
	pub params: Value,
}

/// Error object carried by a failed reply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorBody {
	pub code: i64,
	pub message: String,
}

/// Reply to a command, correlated by `id`.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
	pub id: u64,
	#[serde(default)]
	pub result: Option<Value>,
	#[serde(default)]
	pub error: Option<ErrorBody>,
}

/// Unsolicited notification from the browser.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
	pub method: String,
	#[serde(default)]
	pub params: Value,
}

/// Incoming frame; replies carry an `id`, events do not.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Incoming {
	Response(Response),
	Event(Event),
}

/// Correlating DevTools client bound to one target.
pub struct Connection {
	next_id: AtomicU64,
	pending: Pending,
	writer: tokio::sync::Mutex<SplitSink<WsStream, WsMessage>>,
	events: broadcast::Sender<Event>,
	reader: JoinHandle<()>,
	command_timeout: Duration,
}

impl Connection {
	/// Connects to a target's `webSocketDebuggerUrl`.
	pub async fn connect(ws_url: &str, command_timeout: Duration) -> Result<Self> {
		let (stream, _) = tokio_tungstenite::connect_async(ws_url).await.map_err(|e| DriverError::Connection {
			url: ws_url.to_string(),
			reason: e.to_string(),
		})?;
		let (writer, reader) = stream.split();

		let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
		let (events, _) = broadcast::channel(EVENT_CAPACITY);

		let reader = tokio::spawn(read_loop(reader, Arc::clone(&pending), events.clone()));
		debug!(target = "stockwatch.cdp", url = ws_url, "devtools connection established");

		Ok(Self {
			next_id: AtomicU64::new(1),
			pending,
			writer: tokio::sync::Mutex::new(writer),
			events,
			reader,
			command_timeout,
		})
	}

	/// Subscribes to events emitted after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<Event> {
		self.events.subscribe()
	}

	/// Sends `method` and awaits its result.
	pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
		let id = self.next_id.fetch_add(1, Ordering::SeqCst);
		let request = Request {
			id,
			method: method.to_string(),
			params,
		};
		let json = serde_json::to_string(&request).map_err(|e| DriverError::Protocol(format!("failed to serialize {method}: {e}")))?;

		let (tx, rx) = oneshot::channel();
		self.pending.lock().insert(id, tx);

		debug!(target = "stockwatch.cdp", id, method, "send");
		let write = self.writer.lock().await.send(WsMessage::Text(json.into())).await;
		if let Err(e) = write {
			self.pending.lock().remove(&id);
			return Err(DriverError::Protocol(format!("failed to write {method}: {e}")));
		}

		let reply = match tokio::time::timeout(self.command_timeout, rx).await {
			Ok(Ok(reply)) => reply,
			Ok(Err(_)) => return Err(DriverError::Closed),
			Err(_) => {
				self.pending.lock().remove(&id);
				return Err(DriverError::Timeout {
					method: method.to_string(),
					duration: self.command_timeout,
				});
			}
		};

		reply.map_err(|e| {
			if e.code == CLOSED_CODE {
				DriverError::Closed
			} else {
				DriverError::Cdp {
					code: e.code,
					message: e.message,
				}
			}
		})
	}

	/// Sends a close frame and stops reading. The browser keeps running.
	pub async fn disconnect(&self) {
		if let Err(e) = self.writer.lock().await.close().await {
			debug!(target = "stockwatch.cdp", error = %e, "close frame not sent");
		}
		self.reader.abort();
	}

	/// Waits for the next event named `method`, up to `timeout`.
	pub async fn wait_for_event(&self, events: &mut broadcast::Receiver<Event>, method: &str, timeout: Duration) -> Result<Event> {
		let wait = async {
			loop {
				match events.recv().await {
					Ok(event) if event.method == method => return Ok(event),
					Ok(_) => continue,
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						debug!(target = "stockwatch.cdp", skipped, "event receiver lagged");
						continue;
					}
					Err(broadcast::error::RecvError::Closed) => return Err(DriverError::Closed),
				}
			}
		};

		tokio::time::timeout(timeout, wait).await.map_err(|_| DriverError::Timeout {
			method: method.to_string(),
			duration: timeout,
		})?
	}
}

impl Drop for Connection {
	fn drop(&mut self) {
		self.reader.abort();
	}
}

const CLOSED_CODE: i64 = -1;

async fn read_loop(mut reader: SplitStream<WsStream>, pending: Pending, events: broadcast::Sender<Event>) {
	while let Some(frame) = reader.next().await {
		let text = match frame {
			Ok(WsMessage::Text(t)) => t.to_string(),
			Ok(WsMessage::Binary(b)) => match String::from_utf8(b.to_vec()) {
				Ok(s) => s,
				Err(_) => continue,
			},
			Ok(WsMessage::Close(_)) => {
				debug!(target = "stockwatch.cdp", "socket closed by browser");
				break;
			}
			Ok(_) => continue,
			Err(e) => {
				warn!(target = "stockwatch.cdp", error = %e, "socket read failed");
				break;
			}
		};

		match parse_incoming(&text) {
			Some(Incoming::Response(response)) => {
				let Some(tx) = pending.lock().remove(&response.id) else {
					debug!(target = "stockwatch.cdp", id = response.id, "reply for unknown id");
					continue;
				};
				let reply = match response.error {
					Some(error) => Err(error),
					None => Ok(response.result.unwrap_or(Value::Null)),
				};
				let _ = tx.send(reply);
			}
			Some(Incoming::Event(event)) => {
				let _ = events.send(event);
			}
			None => warn!(target = "stockwatch.cdp", "unparseable devtools frame"),
		}
	}

	for (_, tx) in pending.lock().drain() {
		let _ = tx.send(Err(ErrorBody {
			code: CLOSED_CODE,
			message: "connection closed".to_string(),
		}));
	}
}

/// Parses one frame into a reply or an event.
pub fn parse_incoming(text: &str) -> Option<Incoming> {
	serde_json::from_str(text).ok()
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn request_serializes_id_method_params() {
		let request = Request {
			id: 7,
			method: "Runtime.evaluate".into(),
			params: json!({ "expression": "1 + 1", "returnByValue": true }),
		};
		let value = serde_json::to_value(&request).unwrap();
		assert_eq!(value["id"], 7);
		assert_eq!(value["method"], "Runtime.evaluate");
		assert_eq!(value["params"]["returnByValue"], true);
	}

	#[test]
	fn frames_with_id_are_replies() {
		match parse_incoming(r#"{"id":3,"result":{"frameId":"F"}}"#) {
			Some(Incoming::Response(r)) => {
				assert_eq!(r.id, 3);
				assert_eq!(r.result.unwrap()["frameId"], "F");
				assert!(r.error.is_none());
			}
			other => panic!("expected response, got {other:?}"),
		}
	}

	#[test]
	fn error_replies_keep_code_and_message() {
		match parse_incoming(r#"{"id":4,"error":{"code":-32000,"message":"Cannot navigate"}}"#) {
			Some(Incoming::Response(r)) => assert_eq!(
				r.error,
				Some(ErrorBody {
					code: -32000,
					message: "Cannot navigate".into()
				})
			),
			other => panic!("expected response, got {other:?}"),
		}
	}

	#[test]
	fn frames_without_id_are_events() {
		match parse_incoming(r#"{"method":"Page.loadEventFired","params":{"timestamp":1.5}}"#) {
			Some(Incoming::Event(e)) => {
				assert_eq!(e.method, "Page.loadEventFired");
				assert_eq!(e.params["timestamp"], 1.5);
			}
			other => panic!("expected event, got {other:?}"),
		}
	}

	#[test]
	fn event_without_params_defaults_to_null() {
		match parse_incoming(r#"{"method":"Page.domContentEventFired"}"#) {
			Some(Incoming::Event(e)) => assert_eq!(e.params, Value::Null),
			other => panic!("expected event, got {other:?}"),
		}
	}

	#[test]
	fn garbage_is_rejected() {
		assert!(parse_incoming("not json").is_none());
		assert!(parse_incoming(r#"{"params":{}}"#).is_none());
	}
}
