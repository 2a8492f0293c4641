pub mod outcome;
pub mod resolver;
pub mod session;

#[cfg(feature = "chrome")]
pub mod chrome;

#[cfg(feature = "chrome")]
pub use chrome::ChromeBrowser;
pub use outcome::Outcome;
pub use resolver::{ElementReference, ResolvedElement};
pub use session::{execute_safely, BrowserSession, SnapshotRecord};
