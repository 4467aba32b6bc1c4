use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::SinkExt;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use url::Url;
use uutispuro_core::config::FeedConfig;
use uutispuro_core::feed::{
    ConnectionState, FeedSocket, FeedTransport, RenderedItem, WsTransport,
};
use uutispuro_core::{
    FeedClient, FeedError, FeedPage, Locale, NewsItem, SharedContainer, VisibleList,
};

fn item_json(id: u32) -> serde_json::Value {
    json!({
        "id": format!("id{id}"),
        "rssTitle": format!("Uutinen {id}"),
        "rssLink": format!("https://example.com/{id}"),
        "pubDate": "2017-11-19T08:05:00Z",
        "rssSource": "Yle",
        "category": {"categoryName": "Kotimaa", "categoryEnName": "Domestic"}
    })
}

fn page_json(ids: &[u32]) -> String {
    json!({ "news": ids.iter().map(|id| item_json(*id)).collect::<Vec<_>>() }).to_string()
}

fn visible(ids: &[u32]) -> VisibleList {
    VisibleList::from_items(ids.iter().map(|id| {
        let item: NewsItem = serde_json::from_value(item_json(*id)).unwrap();
        RenderedItem::new(&item, Locale::Fi)
    }))
}

async fn wait_for_ids(container: &SharedContainer<VisibleList>, expected: &[&str]) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if container.lock().ids() == expected {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "container stuck at {:?}",
            container.lock().ids()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Websocket server that plays one script per accepted connection. A script
/// ending in `None` closes the connection; otherwise it stays open.
async fn spawn_server(scripts: Vec<Vec<Option<String>>>) -> (Url, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
    let (paths_tx, paths_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for script in scripts {
            let (stream, _) = listener.accept().await.unwrap();
            let paths_tx = paths_tx.clone();
            let echo_protocol = move |request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
                let _ = paths_tx.send(request.uri().path().to_string());
                if let Some(protocol) = request.headers().get("Sec-WebSocket-Protocol") {
                    response
                        .headers_mut()
                        .insert("Sec-WebSocket-Protocol", protocol.clone());
                }
                Ok(response)
            };
            let mut ws = tokio_tungstenite::accept_hdr_async(stream, echo_protocol)
                .await
                .unwrap();
            let mut keep_open = true;
            for step in script {
                match step {
                    Some(payload) => ws.send(Message::Text(payload.into())).await.unwrap(),
                    None => {
                        ws.close(None).await.ok();
                        keep_open = false;
                        break;
                    }
                }
            }
            if keep_open {
                tokio::spawn(async move {
                    use futures_util::StreamExt;
                    while let Some(Ok(_)) = ws.next().await {}
                });
            }
        }
    });

    (origin, paths_rx)
}

#[tokio::test]
async fn pushed_page_is_merged_into_visible_list() {
    let (origin, mut paths) = spawn_server(vec![vec![
        Some(page_json(&[9, 8, 7, 6, 5])),
        Some("not json".to_string()),
        Some(json!({"news": []}).to_string()),
    ]])
    .await;
    let container = SharedContainer::new(visible(&[7, 6, 5, 4, 3]));

    let handle = FeedClient::new(WsTransport, origin, container.clone(), &FeedConfig::default())
        .start("/fi")
        .unwrap()
        .expect("/fi is a feed page");

    wait_for_ids(&container, &["id9", "id8", "id7", "id6", "id5"]).await;
    assert_eq!(paths.recv().await.as_deref(), Some("/ws/fi"));
    assert_eq!(handle.state(), ConnectionState::Open);
    assert_eq!(handle.locale(), Locale::Fi);

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn closed_connection_reconnects_and_keeps_merging() {
    let (origin, mut paths) = spawn_server(vec![
        vec![Some(page_json(&[5, 4, 3, 2, 1])), None],
        vec![Some(page_json(&[7, 6, 5, 4, 3]))],
    ])
    .await;
    let container = SharedContainer::new(VisibleList::new());

    let handle = FeedClient::new(WsTransport, origin, container.clone(), &FeedConfig::default())
        .with_reconnect_delay(Duration::from_millis(50))
        .start("/en")
        .unwrap()
        .unwrap();

    wait_for_ids(&container, &["id7", "id6", "id5", "id4", "id3"]).await;
    assert_eq!(paths.recv().await.as_deref(), Some("/ws/en"));
    assert_eq!(paths.recv().await.as_deref(), Some("/ws/en"));

    let labels: Vec<String> = container
        .lock()
        .items()
        .map(|item| item.category_label.clone())
        .collect();
    assert!(labels.iter().all(|label| label == "Domestic"));

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn other_pages_get_no_live_feed() {
    let container = SharedContainer::new(VisibleList::new());
    let origin = Url::parse("http://127.0.0.1:9").unwrap();

    for page in ["/", "/fi/category/digi/0", "/en/"] {
        let client = FeedClient::new(WsTransport, origin.clone(), container.clone(), &FeedConfig::default());
        assert!(client.start(page).unwrap().is_none(), "{page} must not start a feed");
    }
}

#[tokio::test]
async fn server_without_subprotocol_is_accepted() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                use futures_util::StreamExt;
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                if ws.send(Message::Text(page_json(&[3, 2, 1]).into())).await.is_err() {
                    return;
                }
                while let Some(Ok(_)) = ws.next().await {}
            });
        }
    });

    let url = uutispuro_core::feed::websocket_url(&origin, Locale::Fi).unwrap();
    let mut socket = WsTransport.connect(&url).await.unwrap();
    let payload = socket.next_text().await.unwrap().unwrap();
    assert_eq!(FeedPage::parse(&payload).unwrap().newest_id(), Some("id3"));

    let container = SharedContainer::new(VisibleList::new());
    let handle = FeedClient::new(WsTransport, origin, container.clone(), &FeedConfig::default())
        .start("/fi")
        .unwrap()
        .unwrap();
    let mut state = handle.watch_state();
    tokio::time::timeout(Duration::from_secs(5), async {
        while *state.borrow_and_update() != ConnectionState::Open {
            state.changed().await.unwrap();
        }
    })
    .await
    .expect("feed connection opens");
    wait_for_ids(&container, &["id3", "id2", "id1"]).await;
    handle.stop().await.unwrap();
}

struct ScriptedSocket {
    messages: VecDeque<Result<String, FeedError>>,
}

#[async_trait]
impl FeedSocket for ScriptedSocket {
    async fn next_text(&mut self) -> Option<Result<String, FeedError>> {
        match self.messages.pop_front() {
            Some(message) => Some(message),
            None => std::future::pending().await,
        }
    }
}

/// Refuses the first `failures` connects, then hands out a socket with one page.
#[derive(Clone)]
struct FlakyTransport {
    failures: usize,
    attempts: Arc<Mutex<Vec<Instant>>>,
}

#[async_trait]
impl FeedTransport for FlakyTransport {
    type Socket = ScriptedSocket;

    async fn connect(&self, _url: &Url) -> Result<ScriptedSocket, FeedError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(Instant::now());
            attempts.len()
        };
        if attempt <= self.failures {
            return Err(FeedError::Socket(
                tokio_tungstenite::tungstenite::Error::ConnectionClosed,
            ));
        }
        Ok(ScriptedSocket {
            messages: VecDeque::from([Ok(page_json(&[2, 1]))]),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn failed_connects_retry_at_fixed_interval_forever() {
    let attempts = Arc::new(Mutex::new(Vec::new()));
    let transport = FlakyTransport {
        failures: 3,
        attempts: attempts.clone(),
    };
    let container = SharedContainer::new(VisibleList::new());
    let origin = Url::parse("https://www.uutispuro.fi").unwrap();

    let handle = FeedClient::new(transport, origin, container.clone(), &FeedConfig::default())
        .start("/fi")
        .unwrap()
        .unwrap();
    assert_eq!(handle.url().as_str(), "wss://www.uutispuro.fi/ws/fi");

    let mut state = handle.watch_state();
    while *state.borrow_and_update() != ConnectionState::Open {
        state.changed().await.unwrap();
    }
    wait_for_ids(&container, &["id2", "id1"]).await;

    let attempts = attempts.lock().unwrap().clone();
    assert_eq!(attempts.len(), 4);
    for pair in attempts.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::from_secs(8));
    }

    handle.stop().await.unwrap();
}

/// First socket delivers one page and then fails; later sockets stay quiet
/// after their page.
#[derive(Clone)]
struct BreakingTransport {
    attempts: Arc<Mutex<Vec<Instant>>>,
}

#[async_trait]
impl FeedTransport for BreakingTransport {
    type Socket = ScriptedSocket;

    async fn connect(&self, _url: &Url) -> Result<ScriptedSocket, FeedError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(Instant::now());
            attempts.len()
        };
        let messages = if attempt == 1 {
            VecDeque::from([
                Ok(page_json(&[2, 1])),
                Err(FeedError::Socket(
                    tokio_tungstenite::tungstenite::Error::ConnectionClosed,
                )),
            ])
        } else {
            VecDeque::from([Ok(page_json(&[4, 3]))])
        };
        Ok(ScriptedSocket { messages })
    }
}

#[tokio::test(start_paused = true)]
async fn stream_error_schedules_exactly_one_reconnect() {
    let attempts = Arc::new(Mutex::new(Vec::new()));
    let transport = BreakingTransport {
        attempts: attempts.clone(),
    };
    let container = SharedContainer::new(VisibleList::new());
    let origin = Url::parse("https://www.uutispuro.fi").unwrap();

    let handle = FeedClient::new(transport, origin, container.clone(), &FeedConfig::default())
        .start("/en")
        .unwrap()
        .unwrap();

    tokio::time::sleep(Duration::from_secs(60)).await;

    let attempts = attempts.lock().unwrap().clone();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[1] - attempts[0], Duration::from_secs(8));
    assert_eq!(container.lock().ids(), vec!["id4", "id3", "id2", "id1"]);
    assert_eq!(handle.state(), ConnectionState::Open);

    handle.stop().await.unwrap();
}
