//! Deploy, pull, delete and list operations for shipwright.
//!
//! The [`Dispatcher`] resolves target names against a workspace and runs
//! every plugin registered for each target, sharing one cancellation token
//! across the whole operation. File callbacks can be turned into
//! [`TransferEvent`]s on a channel and folded into a [`TransferProgress`].

mod dispatcher;
mod events;
mod operation;
mod selection;

pub use dispatcher::Dispatcher;
pub use events::{ChannelObserver, TransferEvent, TransferProgress, TransferSummary};
pub use operation::{DeployOperation, TransferError};
pub use selection::{FileSelection, FileSelectionBuilder};
