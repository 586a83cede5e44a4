//! Types shared between the link layer and its callers.

pub mod channel;
pub mod state;

pub use channel::{AddressError, ChannelAddress};
pub use state::ChannelState;
