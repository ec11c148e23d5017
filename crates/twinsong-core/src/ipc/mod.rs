//! Kernel IPC: framed-JSON codec and message types.

pub mod codec;
pub mod protocol;

pub use codec::{read_frame, read_frame_async, write_frame, write_frame_async};
pub use protocol::{KernelRequest, KernelResponse};
