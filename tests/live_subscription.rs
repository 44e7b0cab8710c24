//! End-to-end tests through the public API against an in-process server.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use bolts_client::{Client, ConnectionStatus, Error, FnFetcher, SubscriptionStatus};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Helpers
// ============================================================================

const WAIT: Duration = Duration::from_secs(5);

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("bolts_client=debug"))
        .with_test_writer()
        .try_init();
}

/// Server that acknowledges every subscribe and forwards pushes from the test.
struct AutoAckServer {
    url: String,
    push: mpsc::UnboundedSender<Value>,
    requests: mpsc::UnboundedReceiver<Value>,
}

impl AutoAckServer {
    async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("ws://{}", listener.local_addr()?);
        let (push, mut push_rx) = mpsc::unbounded_channel::<Value>();
        let (requests_tx, requests) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(socket) = accept_async(stream).await else {
                return;
            };
            let (mut write, mut read) = socket.split();
            let mut next_id = 0u32;

            loop {
                tokio::select! {
                    frame = read.next() => {
                        let Some(Ok(Message::Text(text))) = frame else { return };
                        let Ok(request) = serde_json::from_str::<Value>(&text) else { continue };
                        if request["messageType"] == "subscribeRequest" {
                            next_id += 1;
                            let ack = json!({
                                "messageType": "subscribeResponse",
                                "requestID": request["requestID"],
                                "subscriptionID": format!("sub-{next_id}"),
                            });
                            if write.send(Message::Text(ack.to_string().into())).await.is_err() {
                                return;
                            }
                        }
                        let _ = requests_tx.send(request);
                    }
                    Some(value) = push_rx.recv() => {
                        if write.send(Message::Text(value.to_string().into())).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok(Self {
            url,
            push,
            requests,
        })
    }

    async fn next_request(&mut self) -> Result<Value> {
        timeout(WAIT, self.requests.recv())
            .await
            .context("timed out waiting for a request")?
            .context("server stopped")
    }

    fn notify(&self, subscription_id: &str) {
        let _ = self.push.send(json!({
            "messageType": "subscriptionNotification",
            "subscriptionID": subscription_id,
        }));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_subscription_becomes_active_and_invalidates() -> Result<()> {
    init_logging();
    let mut server = AutoAckServer::start().await?;
    let client = Client::builder().url(server.url.clone()).build()?;

    let invalidations = Arc::new(AtomicUsize::new(0));
    let subscription = client.subscribe(["motd"], {
        let invalidations = Arc::clone(&invalidations);
        move || {
            invalidations.fetch_add(1, Ordering::SeqCst);
        }
    });

    let request = server.next_request().await?;
    assert_eq!(request["urlPath"], json!(["motd"]));

    let status = timeout(WAIT, subscription.wait_for_status(|s| s.is_active())).await?;
    assert_eq!(status, SubscriptionStatus::Active);
    assert_eq!(
        subscription.subscription_id().map(|id| id.as_str().to_owned()),
        Some("sub-1".to_owned())
    );
    tokio_test::assert_ok!(subscription.check());

    server.notify("sub-1");
    timeout(WAIT, async {
        while invalidations.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;

    subscription.close();
    let request = server.next_request().await?;
    assert_eq!(request["messageType"], "unsubscribeRequest");
    assert_eq!(request["subscriptionID"], "sub-1");
    Ok(())
}

#[tokio::test]
async fn test_query_with_query_params() -> Result<()> {
    init_logging();
    let mut server = AutoAckServer::start().await?;
    let client = Client::builder().url(server.url.clone()).build()?;

    let mut query = client.query(
        bolts_client::SubscriptionTarget::new(["doc", "42"]).with_query("rev", "3"),
        FnFetcher::new(|| async { Ok::<_, Error>(vec![1u8, 2, 3]) }),
    );

    let request = server.next_request().await?;
    assert_eq!(request["urlPath"], json!(["doc", "42"]));
    assert_eq!(request["queryParams"], json!([{ "name": "rev", "value": "3" }]));

    let state = timeout(WAIT, query.wait_for(|s| s.data.is_some())).await?;
    assert_eq!(state.data, Some(vec![1, 2, 3]));
    assert_eq!(state.fetch_count, 1);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_server_times_out_requests() -> Result<()> {
    init_logging();
    let port = {
        let spare = std::net::TcpListener::bind("127.0.0.1:0")?;
        spare.local_addr()?.port()
    };

    let client = Client::builder()
        .url(format!("ws://127.0.0.1:{port}"))
        .connect_timeout(Duration::from_millis(100))
        .build()?;

    let err = tokio_test::assert_err!(
        client
            .request(bolts_client::ClientRequest::subscribe(["motd"]))
            .await
    );
    assert!(err.is_timeout() || matches!(err, Error::ConnectionClosed), "{err}");
    assert_ne!(client.status(), ConnectionStatus::Open);
    Ok(())
}
