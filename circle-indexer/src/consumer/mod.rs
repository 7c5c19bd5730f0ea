pub mod live;
pub mod messages;
pub mod rest;
pub mod source;

pub use live::{stream_url, LiveTail, LiveTailHandle, ReconnectBackoff};
pub use messages::{MirrorLinks, MirrorMessage, MirrorPage, StreamMessage};
pub use rest::MirrorRestClient;
pub use source::{MirrorNodeSource, MirrorSource};
