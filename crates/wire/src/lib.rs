pub mod codec;
pub mod connection;
pub mod error;
pub mod types;

pub use codec::{Codec, ReadOutcome, ReadStatus};
pub use connection::{Connection, Connector};
pub use error::{Result, WireError};
pub use types::*;
