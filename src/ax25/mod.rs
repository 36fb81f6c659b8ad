mod address;
mod error;
mod frame;
pub mod kiss;

pub use address::Address;
pub use error::Ax25Error;
pub use frame::Frame;
pub use kiss::{DecodeError, KissDecoder};
