use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::connection::{ConnectionManager, ConnectionState};
use super::transport::{websocket_url, FeedSocket, FeedTransport};
use super::{ContainerPort, FeedMerger, FeedPage, Locale, SharedContainer};
use crate::config::FeedConfig;
use crate::error::FeedError;

/// Live news ticker for one page.
pub struct FeedClient<T: FeedTransport, C: ContainerPort> {
    transport: T,
    origin: Url,
    container: SharedContainer<C>,
    capacity: usize,
    reconnect_delay: Duration,
}

/// Running feed connection. Dropping it tears the connection down the same
/// way closing the page would.
pub struct FeedClientHandle {
    locale: Locale,
    url: Url,
    cancel_tx: broadcast::Sender<()>,
    state_rx: watch::Receiver<ConnectionState>,
    join: JoinHandle<()>,
}

impl FeedClientHandle {
    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Receiver that sees every connection state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub async fn stop(self) -> Result<(), tokio::task::JoinError> {
        let _ = self.cancel_tx.send(());
        self.join.await
    }
}

impl<T: FeedTransport, C: ContainerPort + 'static> FeedClient<T, C> {
    pub fn new(transport: T, origin: Url, container: SharedContainer<C>, config: &FeedConfig) -> Self {
        Self {
            transport,
            origin,
            container,
            capacity: config.visible_capacity,
            reconnect_delay: config.reconnect_delay(),
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Connects when `page_path` is a feed-bearing page (`/fi` or `/en`);
    /// any other page gets no live feed and `Ok(None)`.
    pub fn start(self, page_path: &str) -> Result<Option<FeedClientHandle>, FeedError> {
        let Some(locale) = Locale::from_feed_page(page_path) else {
            debug!(page_path, "not a feed page, live feed disabled");
            return Ok(None);
        };
        let url = websocket_url(&self.origin, locale)?;

        let (cancel_tx, cancel_rx) = broadcast::channel(1);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Closed);
        let merger = FeedMerger::new(locale, self.capacity);
        let session = Session {
            transport: self.transport,
            container: self.container,
            merger,
            reconnect_delay: self.reconnect_delay,
            url: url.clone(),
            state_tx,
        };
        let join = tokio::spawn(session.run(cancel_rx));

        Ok(Some(FeedClientHandle {
            locale,
            url,
            cancel_tx,
            state_rx,
            join,
        }))
    }
}

struct Session<T: FeedTransport, C: ContainerPort> {
    transport: T,
    container: SharedContainer<C>,
    merger: FeedMerger,
    reconnect_delay: Duration,
    url: Url,
    state_tx: watch::Sender<ConnectionState>,
}

impl<T: FeedTransport, C: ContainerPort> Session<T, C> {
    async fn run(mut self, mut cancel_rx: broadcast::Receiver<()>) {
        let mut conn: ConnectionManager<T::Socket> = ConnectionManager::new(self.reconnect_delay);

        'session: loop {
            conn.begin_connect();
            self.publish(&conn);

            let connected = tokio::select! {
                _ = cancel_rx.recv() => break 'session,
                result = self.transport.connect(&self.url) => result,
            };

            match connected {
                Ok(socket) => {
                    conn.opened(socket);
                    self.publish(&conn);
                    info!(url = %self.url, "feed connection open");

                    while let Some(socket) = conn.socket_mut() {
                        let next = tokio::select! {
                            _ = cancel_rx.recv() => break 'session,
                            next = socket.next_text() => next,
                        };
                        match next {
                            Some(Ok(payload)) => self.handle_message(&payload),
                            Some(Err(err)) => {
                                warn!(url = %self.url, error = %err, "feed connection error");
                                conn.errored();
                                break;
                            }
                            None => break,
                        }
                    }
                }
                Err(err) => {
                    warn!(url = %self.url, error = %err, "feed connection failed");
                    conn.errored();
                }
            }

            if conn.closed() {
                info!(url = %self.url, delay = ?self.reconnect_delay, "feed connection closed, reconnect scheduled");
            }
            self.publish(&conn);

            tokio::select! {
                _ = cancel_rx.recv() => break 'session,
                _ = conn.wait_reconnect() => {}
            }
        }

        conn.shutdown();
        self.publish(&conn);
        info!(url = %self.url, "feed client stopped");
    }

    fn publish(&self, conn: &ConnectionManager<T::Socket>) {
        self.state_tx.send_replace(conn.state());
    }

    fn handle_message(&mut self, payload: &str) {
        let page = match FeedPage::parse(payload) {
            Ok(page) => page,
            Err(err) => {
                warn!(error = %err, "ignoring malformed feed payload");
                return;
            }
        };
        if page.is_empty() {
            debug!("empty feed page");
            return;
        }

        let report = {
            let mut container = self.container.lock();
            self.merger.apply(&page, &mut *container)
        };
        if report.changed() {
            info!(
                inserted = report.inserted.len(),
                evicted = report.evicted.len(),
                "feed updated"
            );
        }
    }
}
