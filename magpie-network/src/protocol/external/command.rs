//! The twelve-byte, NUL-padded ASCII command field.

use std::convert::TryFrom;

/// Every message command this node understands.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Command {
    Version,
    Verack,
    Addr,
    Inv,
    GetData,
    NotFound,
    GetBlocks,
    GetHeaders,
    Headers,
    Tx,
    Block,
    GetAddr,
    MemPool,
    Ping,
    Pong,
    Reject,
    Alert,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Version => "version",
            Command::Verack => "verack",
            Command::Addr => "addr",
            Command::Inv => "inv",
            Command::GetData => "getdata",
            Command::NotFound => "notfound",
            Command::GetBlocks => "getblocks",
            Command::GetHeaders => "getheaders",
            Command::Headers => "headers",
            Command::Tx => "tx",
            Command::Block => "block",
            Command::GetAddr => "getaddr",
            Command::MemPool => "mempool",
            Command::Ping => "ping",
            Command::Pong => "pong",
            Command::Reject => "reject",
            Command::Alert => "alert",
        }
    }

    /// The command as it appears on the wire.
    pub fn bytes(&self) -> [u8; 12] {
        let mut bytes = [0u8; 12];
        let name = self.name().as_bytes();
        bytes[..name.len()].copy_from_slice(name);
        bytes
    }

    /// Parse a frame's command field. `None` means an unknown command:
    /// the frame is skipped without penalizing the peer.
    pub fn parse(bytes: &[u8; 12]) -> Option<Command> {
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(12);
        Command::try_from(&bytes[..end]).ok()
    }
}

impl TryFrom<&[u8]> for Command {
    type Error = ();

    fn try_from(name: &[u8]) -> Result<Command, ()> {
        match name {
            b"version" => Ok(Command::Version),
            b"verack" => Ok(Command::Verack),
            b"addr" => Ok(Command::Addr),
            b"inv" => Ok(Command::Inv),
            b"getdata" => Ok(Command::GetData),
            b"notfound" => Ok(Command::NotFound),
            b"getblocks" => Ok(Command::GetBlocks),
            b"getheaders" => Ok(Command::GetHeaders),
            b"headers" => Ok(Command::Headers),
            b"tx" => Ok(Command::Tx),
            b"block" => Ok(Command::Block),
            b"getaddr" => Ok(Command::GetAddr),
            b"mempool" => Ok(Command::MemPool),
            b"ping" => Ok(Command::Ping),
            b"pong" => Ok(Command::Pong),
            b"reject" => Ok(Command::Reject),
            b"alert" => Ok(Command::Alert),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_wire_form() {
        for command in [
            Command::Version,
            Command::Verack,
            Command::GetHeaders,
            Command::Alert,
        ] {
            assert_eq!(Command::parse(&command.bytes()), Some(command));
        }
    }

    #[test]
    fn unknown_commands_are_none() {
        let mut bytes = [0u8; 12];
        bytes[..7].copy_from_slice(b"filterx");
        assert_eq!(Command::parse(&bytes), None);
    }
}
