//! ESPlot host state
//!
//! The two pieces of state the host owns, both persisted in one
//! [`JsonStore`]:
//!
//! - [`CacheIndex`]: which cache directory holds the artifacts of a source path
//! - [`OpenedFilesState`]: opened paths, most recent first, with change subscriptions
//!
//! "Cached" and "listed as open" are independent facts: closing a file
//! removes its index entry but leaves the opened list alone.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cache_index;
pub mod error;
pub mod opened_files;
pub mod store;

pub use cache_index::CacheIndex;
pub use error::{StoreError, StoreResult};
pub use opened_files::{merge_opened, OpenedFilesState, Subscription};
pub use store::{JsonStore, STATE_FILE};

use std::path::Path;
use std::sync::Arc;

/// Open the store under `data_dir` and build both state views on it
///
/// # Errors
/// Returns [`StoreError`] if the store cannot be opened
pub fn open_state(data_dir: &Path) -> StoreResult<(CacheIndex, OpenedFilesState)> {
    let store = Arc::new(JsonStore::open_in(data_dir)?);
    Ok((
        CacheIndex::new(Arc::clone(&store)),
        OpenedFilesState::new(store),
    ))
}
