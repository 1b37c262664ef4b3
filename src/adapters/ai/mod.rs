//! AI vendor adapters.
//!
//! Implementations of the vendor channel ports.
//!
//! ## Available Adapters
//!
//! - `SparkConnector` - iFlytek Spark chat websocket
//! - `MockVendorConnector` - Scripted vendor for testing

mod mock_connector;
mod spark_auth;
mod spark_connector;
mod spark_frames;

pub use mock_connector::{MockReply, MockVendorConnector};
pub use spark_auth::SparkUrlSigner;
pub use spark_connector::{SparkConfig, SparkConnector};
pub use spark_frames::{decode_response, ChatParameters, RequestFrame, FINAL_STATUS};
