use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Sleep};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
}

/// Connection lifecycle of one feed page: current state, the live socket and
/// the reconnect timer.
///
/// The timer only exists while `Closed`. Every transition takes `&mut self`,
/// so setting and clearing it cannot interleave with close or error handling.
pub struct ConnectionManager<S> {
    state: ConnectionState,
    reconnect_delay: Duration,
    pending_timer: Option<Pin<Box<Sleep>>>,
    socket: Option<S>,
}

impl<S> ConnectionManager<S> {
    pub fn new(reconnect_delay: Duration) -> Self {
        Self {
            state: ConnectionState::Closed,
            reconnect_delay,
            pending_timer: None,
            socket: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn has_pending_timer(&self) -> bool {
        self.pending_timer.is_some()
    }

    pub fn socket_mut(&mut self) -> Option<&mut S> {
        self.socket.as_mut()
    }

    pub fn begin_connect(&mut self) {
        self.pending_timer = None;
        self.state = ConnectionState::Connecting;
    }

    pub fn opened(&mut self, socket: S) {
        self.pending_timer = None;
        self.socket = Some(socket);
        self.state = ConnectionState::Open;
    }

    pub fn errored(&mut self) {
        if self.pending_timer.take().is_some() {
            debug!("cleared stray reconnect timer");
        }
    }

    /// Drops the socket and arms the reconnect timer unless one is already
    /// pending. Returns whether a new timer was armed.
    pub fn closed(&mut self) -> bool {
        self.socket = None;
        self.state = ConnectionState::Closed;
        if self.pending_timer.is_some() {
            return false;
        }
        self.pending_timer = Some(Box::pin(sleep(self.reconnect_delay)));
        true
    }

    /// Page teardown: drops the socket and any pending timer without
    /// scheduling a reconnect.
    pub fn shutdown(&mut self) {
        self.socket = None;
        self.pending_timer = None;
        self.state = ConnectionState::Closed;
    }

    /// Waits for the pending timer to fire, then forgets it. Returns
    /// immediately when nothing is pending.
    pub async fn wait_reconnect(&mut self) {
        if let Some(timer) = self.pending_timer.as_mut() {
            timer.await;
        }
        self.pending_timer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn close_arms_exactly_one_timer() {
        let mut conn: ConnectionManager<()> = ConnectionManager::new(Duration::from_secs(8));
        conn.begin_connect();
        conn.opened(());

        assert!(conn.closed());
        assert!(conn.has_pending_timer());
        assert!(!conn.closed(), "second close must not arm another timer");
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn error_then_close_schedules_once() {
        let mut conn: ConnectionManager<()> = ConnectionManager::new(Duration::from_secs(8));
        conn.closed();
        conn.errored();
        assert!(!conn.has_pending_timer());
        assert!(conn.closed());
    }

    #[tokio::test(start_paused = true)]
    async fn open_clears_pending_timer() {
        let mut conn = ConnectionManager::new(Duration::from_secs(8));
        conn.closed();
        conn.opened("socket");
        assert!(!conn.has_pending_timer());
        assert_eq!(conn.socket_mut(), Some(&mut "socket"));
        assert_eq!(conn.state(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_leaves_nothing_pending() {
        let mut conn = ConnectionManager::new(Duration::from_secs(8));
        conn.opened(1u8);
        conn.shutdown();
        assert!(!conn.has_pending_timer());
        assert!(conn.socket_mut().is_none());
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_fires_after_fixed_delay() {
        let mut conn: ConnectionManager<()> = ConnectionManager::new(Duration::from_secs(8));
        let start = Instant::now();
        conn.closed();
        conn.wait_reconnect().await;
        assert_eq!(start.elapsed(), Duration::from_secs(8));
        assert!(!conn.has_pending_timer());

        conn.begin_connect();
        assert_eq!(conn.state(), ConnectionState::Connecting);
    }
}
