use std::sync::Arc;

use harness_bridge_model::RunContext;
use parking_lot::Mutex;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("Run {0} has already started, the run context cannot be changed until it stops")]
    RunInProgress(String),
}

/// Holds the process-wide [RunContext].
///
/// Updates replace the whole context at once, so a reader always sees one complete version. While
/// a run is in progress the context is sealed and updates are rejected.
#[derive(Debug, Default)]
pub struct RunContextStore {
    inner: Mutex<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    current: Arc<RunContext>,
    sealed: bool,
}

impl RunContextStore {
    pub fn new(initial: RunContext) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                current: Arc::new(initial),
                sealed: false,
            }),
        }
    }

    pub fn get(&self) -> Arc<RunContext> {
        self.inner.lock().current.clone()
    }

    /// Replace the context. Last writer wins.
    pub fn set(&self, context: RunContext) -> Result<Arc<RunContext>, ContextError> {
        let mut inner = self.inner.lock();
        if inner.sealed {
            return Err(ContextError::RunInProgress(inner.current.run_id.clone()));
        }

        inner.current = Arc::new(context);
        Ok(inner.current.clone())
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.lock().sealed
    }

    /// Capture the context for a run that is starting and reject updates until [Self::unseal].
    pub(crate) fn seal(&self) -> Arc<RunContext> {
        let mut inner = self.inner.lock();
        inner.sealed = true;
        inner.current.clone()
    }

    pub(crate) fn unseal(&self) {
        self.inner.lock().sealed = false;
    }
}
