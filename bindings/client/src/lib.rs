mod client;
mod error;
mod transport;

pub mod prelude {
    pub use crate::client::{
        ControlPlaneClient, METRICS_PATH, METRICS_TIMEOUT, TEST_START_PATH, TEST_START_TIMEOUT,
        TEST_STOP_PATH, TEST_STOP_TIMEOUT, TOKEN_HEADER,
    };
    pub use crate::error::{ControlPlaneError, TransportError};
    pub use crate::transport::{HttpTransport, PostRequest, Transport, TransportResponse};
}
