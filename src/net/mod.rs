//! Snapshot codec for actors simulated on another peer. Transport is left
//! to the embedding application.

pub mod codec;
pub mod wire;

pub use codec::{wire_time, NetSendThrottle, NetUpdate, NetworkCodec, NET_BUFFER_LEN};
pub use wire::{LightMask, NetMask, VehicleState};
