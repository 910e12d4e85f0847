mod engine;
mod shutdown;

pub mod prelude {
    pub use crate::engine::{
        CounterValue, EngineError, LoadEngine, RequestCounters, AGGREGATED_ENTRY_NAME,
    };
    pub use crate::shutdown::{StopHandle, StopListener, StopSignalError};
}
