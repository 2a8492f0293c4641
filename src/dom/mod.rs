pub mod snapshot;

pub use snapshot::{render_snapshot, ANNOTATE_SCRIPT, REF_ATTRIBUTE};
