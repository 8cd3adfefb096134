//! flagwatch-core: polling notification core
//!
//! Periodically asks a status endpoint which categories changed since the
//! last known watermarks, and fans the answer out to registered handlers.
//!
//! # Main Entry Points
//!
//! - [`poller`] - The poll/dispatch/sleep cycle
//! - [`dispatch`] - Per-category handler registry
//! - [`store`] - Watermark persistence (memory or one JSON file per category)
//! - [`source`] - The status endpoint abstraction and its HTTP binding
//! - [`clock`] - Delay selection between polls

pub mod clock;
pub mod dispatch;
pub mod errors;
pub mod logging;
pub mod poller;
pub mod source;
pub mod store;
pub mod types;

pub use clock::{Backoff, RetryPolicy};
pub use dispatch::{DispatchReport, Dispatcher, Handler, HandlerError, HandlerFailure};
pub use errors::{FlagwatchError, FlagwatchResult};
pub use poller::{PollOutcome, Poller, PollerConfig};
pub use source::{HttpSource, SourceError, StatusSource};
pub use store::{
    FileStore, MemoryStore, Monotonicity, SetOutcome, StoreError, WatermarkRecord, WatermarkStore,
};
pub use types::{
    Category, Indicator, InvalidCategoryName, StatusRequest, StatusResponse, Watermark,
};

// Re-export config types the core is built from
pub use flagwatch_config::{FlagwatchConfig, HandlerErrorPolicy, RetryStrategy};

// Re-export logging initialization
pub use logging::init_logging;
