//! # esplot-contract
//!
//! The typed boundary between the esplot host and its presentation
//! surfaces.
//!
//! - [`Request`] / [`Channel`]: the closed catalog of request channels,
//!   each with fixed argument and output types
//! - [`Event`] / [`EventChannel`]: the closed catalog of host events
//! - [`dispatch`]: host-side routing onto a [`RequestHandler`]
//! - [`SurfaceRegistry`]: best-effort fan-out of events to live surfaces
//! - [`SurfaceApi`]: the whitelisted facade a surface is given
//!
//! Messages are JSON on the wire:
//!
//! ```json
//! {"channel": "openChannelFile", "args": {"path": "/data/run1.json"}}
//! {"ok": null}
//! {"event": "fileOpenFailed", "payload": {"path": "/data/run1.json", "reason": "truncated", "message": "..."}}
//! ```

pub mod broadcast;
pub mod channels;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod reply;
pub mod surface;

pub use broadcast::{SurfaceId, SurfaceRegistry, DEFAULT_EVENT_BUFFER};
pub use channels::{Channel, PathArgs, Request, SeriesArgs, CHANNEL_NAMES};
pub use dispatch::{dispatch, dispatch_json, RequestHandler};
pub use error::{ContractError, ContractResult};
pub use events::{
    on, Event, EventChannel, EventKind, FailureReason, FileOpenFailed, LastOpenedFile,
};
pub use reply::{ErrorKind, ErrorPayload, Reply};
pub use surface::{EventSubscription, HostLink, SurfaceApi};

/// Contract version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
