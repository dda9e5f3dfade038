//! Local projection of the user's notes and tags: the state tree, its
//! transition table, the single-writer container and the command procedures
//! that reconcile it with the remote store.

pub mod commands;
pub mod selection;
pub mod state;
pub mod store;
pub mod transitions;
pub mod write_queue;

pub use commands::{CommandContext, SyncEvent, TagRename, DEFAULT_TAG_RENAME_WINDOW};
pub use state::{AppState, AuthStatus, Dialog, DialogRequest, ListView};
pub use store::Store;
pub use transitions::{reduce, Action};
pub use write_queue::{Coalesce, WriteQueue};
