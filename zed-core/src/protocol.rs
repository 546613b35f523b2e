//! MicroZed wire protocol: constants and control-channel commands.

use std::fmt;

/// Sentinel carried in every image datagram header.
pub const MAGIC: u16 = 0xCAFE;

/// Current image protocol version.
pub const VERSION: u8 = 1;

/// Size of the fixed frame header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Payload bytes per chunk used by the board sender.
pub const DEFAULT_CHUNK_SIZE: usize = 1400;

/// Board control server UDP port.
pub const DEFAULT_CTRL_PORT: u16 = 50000;

/// Port the board streams images to when `Request_img` has no argument.
pub const DEFAULT_IMAGE_PORT: u16 = 50001;

/// Reply sent by the board when a command succeeded.
pub const REPLY_OK: &str = "OK\n";

/// Reply sent by the board for unknown or failed commands.
pub const REPLY_ERR: &str = "ERR\n";

const LED_ON: &str = "LedOn";
const LED_OFF: &str = "LedOff";
const REQUEST_IMG: &str = "Request_img";

/// Control-channel commands. Encoding is plain ASCII, one command per datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    LedOn,
    LedOff,
    /// Ask the board to stream its image to the requester's IP at `port`.
    RequestImage { port: u16 },
}

impl Command {
    /// ASCII form sent on the control channel.
    pub fn to_wire(&self) -> String {
        match self {
            Command::LedOn => LED_ON.to_string(),
            Command::LedOff => LED_OFF.to_string(),
            Command::RequestImage { port } => format!("{} {}", REQUEST_IMG, port),
        }
    }

    /// Parse a received command. Trailing CR/LF are stripped first.
    pub fn parse(text: &str) -> Result<Command, CommandParseError> {
        let text = text.trim_end_matches(['\r', '\n']);
        match text {
            LED_ON => return Ok(Command::LedOn),
            LED_OFF => return Ok(Command::LedOff),
            _ => {}
        }
        let Some(rest) = text.strip_prefix(REQUEST_IMG) else {
            return Err(CommandParseError::Unknown(text.to_string()));
        };
        if !rest.is_empty() && !rest.starts_with(' ') {
            return Err(CommandParseError::Unknown(text.to_string()));
        }
        let arg = rest.trim_start_matches(' ');
        if arg.is_empty() {
            return Ok(Command::RequestImage {
                port: DEFAULT_IMAGE_PORT,
            });
        }
        match arg.parse::<u16>() {
            Ok(port) if port != 0 => Ok(Command::RequestImage { port }),
            _ => Err(CommandParseError::BadPort(arg.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

/// Error parsing a control command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandParseError {
    #[error("unknown command: {0:?}")]
    Unknown(String),
    #[error("invalid image port: {0:?}")]
    BadPort(String),
}

/// Decode a board reply for display: lossy UTF-8, surrounding whitespace trimmed.
pub fn decode_reply(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}
