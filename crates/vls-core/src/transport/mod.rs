//! Transport selection and channel establishment.
//!
//! The run mode is turned into a [`TransportStrategy`] exactly once; the
//! [`ConnectionFactory`] then opens the channel described by it.

mod connection;
mod mode;
mod selector;

pub use connection::{
    ChannelReader, ChannelWriter, ConnectionFactory, ConnectionHandle, ServerChannel,
    ServerConnection,
};
pub use mode::RunMode;
pub use selector::{TransportSelector, TransportStrategy};
