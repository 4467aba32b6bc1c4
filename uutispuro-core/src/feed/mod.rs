//! Live news feed: server-pushed pages merged into a bounded on-page list,
//! with a fixed-interval reconnect loop.

mod client;
mod connection;
mod container;
mod locale;
mod merge;
mod model;
mod render;
mod transport;

pub use client::{FeedClient, FeedClientHandle};
pub use connection::{ConnectionManager, ConnectionState};
pub use container::{ContainerPort, SharedContainer, VisibleList};
pub use locale::Locale;
pub use merge::{FeedMerger, MergeReport};
pub use model::{Category, FeedPage, NewsItem};
pub use render::{format_published, RenderedItem};
pub use transport::{websocket_url, FeedSocket, FeedTransport, WsSocket, WsTransport};
