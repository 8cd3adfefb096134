//! Routing of poll results to per-category handlers.

pub mod errors;

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use flagwatch_config::HandlerErrorPolicy;
use tracing::{debug, error, warn};

use crate::types::{Category, Indicator, StatusResponse};

pub use errors::HandlerError;

/// Callback invoked when a category reports an update.
///
/// Implemented for any `Fn(&Category, Indicator) -> Result<(), HandlerError>`.
pub trait Handler: Send + Sync {
    fn handle(&self, category: &Category, indicator: Indicator) -> Result<(), HandlerError>;
}

impl<F> Handler for F
where
    F: Fn(&Category, Indicator) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, category: &Category, indicator: Indicator) -> Result<(), HandlerError> {
        self(category, indicator)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub category: Category,
    pub error: HandlerError,
}

/// What happened during one [`Dispatcher::dispatch`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers that ran and returned `Ok`.
    pub invoked: Vec<Category>,
    /// Updated categories that had no handler.
    pub unhandled: Vec<String>,
    pub failed: Vec<HandlerFailure>,
    /// `true` when the abort policy stopped dispatch early.
    pub aborted: bool,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Maps categories to handlers.
///
/// Handlers may be registered while a poller is dispatching; each dispatch
/// works on the handler set as it was when the dispatch began.
pub struct Dispatcher {
    handlers: RwLock<BTreeMap<Category, Arc<dyn Handler>>>,
    policy: HandlerErrorPolicy,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(HandlerErrorPolicy::default())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("categories", &self.read().keys().collect::<Vec<_>>())
            .field("policy", &self.policy)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(policy: HandlerErrorPolicy) -> Self {
        Self {
            handlers: RwLock::new(BTreeMap::new()),
            policy,
        }
    }

    pub fn policy(&self) -> HandlerErrorPolicy {
        self.policy
    }

    /// Associate `handler` with `category`, replacing any previous handler.
    ///
    /// Returns `true` if a handler was replaced.
    pub fn register(&self, category: Category, handler: impl Handler + 'static) -> bool {
        debug!(event = "core.dispatch.handler_registered", category = %category);
        self.write()
            .insert(category, Arc::new(handler))
            .is_some()
    }

    /// Returns `true` if a handler was removed.
    pub fn unregister(&self, category: &str) -> bool {
        self.write().remove(category).is_some()
    }

    pub fn has_handler(&self, category: &str) -> bool {
        self.read().contains_key(category)
    }

    /// Invoke the handler of every category that is present and set in `result`.
    ///
    /// Categories without a handler are skipped. Handler errors and panics are
    /// caught. What happens next depends on the [`HandlerErrorPolicy`].
    pub fn dispatch(&self, result: &StatusResponse) -> DispatchReport {
        let handlers = self.read().clone();
        let mut report = DispatchReport::default();

        for (name, indicator) in &result.updates {
            if !indicator.is_set() {
                continue;
            }

            let Some((category, handler)) = handlers.get_key_value(name.as_str()) else {
                debug!(event = "core.dispatch.unhandled", category = %name);
                report.unhandled.push(name.clone());
                continue;
            };

            match invoke(handler.as_ref(), category, *indicator) {
                Ok(()) => report.invoked.push(category.clone()),
                Err(e) => {
                    warn!(
                        event = "core.dispatch.handler_failed",
                        category = %category,
                        error = %e,
                    );
                    report.failed.push(HandlerFailure {
                        category: category.clone(),
                        error: e,
                    });

                    if self.policy == HandlerErrorPolicy::Abort {
                        error!(
                            event = "core.dispatch.aborted",
                            category = %category,
                            "Skipping remaining categories for this result"
                        );
                        report.aborted = true;
                        break;
                    }
                }
            }
        }

        report
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<Category, Arc<dyn Handler>>> {
        match self.handlers.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!(event = "core.dispatch.lock_poisoned");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<Category, Arc<dyn Handler>>> {
        match self.handlers.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!(event = "core.dispatch.lock_poisoned");
                poisoned.into_inner()
            }
        }
    }
}

fn invoke(
    handler: &dyn Handler,
    category: &Category,
    indicator: Indicator,
) -> Result<(), HandlerError> {
    match catch_unwind(AssertUnwindSafe(|| handler.handle(category, indicator))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Err(HandlerError::Panicked(message))
        }
    }
}
