//! Draft autosaving: the snapshot an editor works on, where it gets persisted, and the
//! coordinator deciding when.

mod coordinator;
mod endpoint;
mod snapshot;

pub use coordinator::{Autosave, AutosaveBuilder, AutosaveConfig, SaveStatus};
pub use endpoint::{HttpEndpoint, Identity, Persist, SaveError};
pub use snapshot::{AutosaveRequest, DraftSnapshot, Seo};
