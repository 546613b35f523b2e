//! MicroZed UDP image protocol.
//! Host-driven: no I/O; host passes datagrams and receives outcomes.

pub mod chunk;
pub mod header;
pub mod integrity;
pub mod protocol;
pub mod reassembly;

pub use chunk::{split_into_datagrams, SplitError};
pub use header::{decode_header, encode_datagram, encode_header, FrameHeader, HeaderDecodeError};
pub use protocol::{Command, CommandParseError, HEADER_SIZE, MAGIC, VERSION};
pub use reassembly::{
    Abandoned, CompletedFrame, EngineStats, IgnoreReason, InFlightStatus, Outcome, Reassembler,
};
