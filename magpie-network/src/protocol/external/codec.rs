//! A Tokio codec mapping byte streams to message streams.

use std::fmt;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use magpie_chain::block::{self, Block};
use magpie_chain::parameters::Coin;
use magpie_chain::serialization::{sha256d, SerializationError as Error};
use magpie_chain::transaction::Transaction;
use magpie_chain::{WireDeserialize, WireSerialize};

use crate::constants;
use crate::meta_addr::MetaAddr;

use super::command::Command;
use super::inv::InventoryHash;
use super::message::{Alert, GetBlocks, GetHeaders, Message, RejectReason, Version};
use super::types::{Magic, Nonce, ProtocolVersion};

/// The length of a message frame header.
const HEADER_LEN: usize = 24usize;

/// A codec which produces messages from byte streams and vice versa.
pub struct Codec {
    builder: Builder,
    state: DecodeState,
}

/// A builder for specifying [`Codec`] options.
pub struct Builder {
    /// The network magic to accept and emit.
    magic: Magic,
    /// The protocol version to speak when encoding/decoding.
    version: ProtocolVersion,
    /// The maximum allowable message body length.
    max_len: usize,
}

impl Codec {
    /// Return a builder for constructing a [`Codec`].
    pub fn builder() -> Builder {
        Builder {
            magic: Magic::from(Coin::bitcoin()),
            version: ProtocolVersion(constants::CURRENT_VERSION),
            max_len: constants::MAX_PROTOCOL_MESSAGE_LEN,
        }
    }
}

impl Builder {
    /// Finalize the builder and return a [`Codec`].
    pub fn finish(self) -> Codec {
        Codec {
            builder: self,
            state: DecodeState::Head,
        }
    }

    /// Configure the codec for the given [`Coin`]'s magic.
    pub fn for_coin(mut self, coin: &Coin) -> Self {
        self.magic = Magic::from(coin);
        self.version = ProtocolVersion(coin.protocol_version);
        self
    }

    /// Configure the codec's maximum accepted body size, in bytes.
    pub fn with_max_body_len(mut self, len: usize) -> Self {
        self.max_len = len;
        self
    }
}

// ======== Encoding =========

impl Encoder<Message> for Codec {
    type Error = Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut body = Vec::new();
        self.write_body(&item, &mut body)?;

        if body.len() > self.builder.max_len {
            return Err(Error::Parse("body length exceeded maximum size"));
        }

        let command = item.command();
        trace!(%item, len = body.len(), "encoding message");

        let mut header = [0u8; HEADER_LEN];
        let mut header_writer = Cursor::new(&mut header[..]);
        header_writer.write_all(&self.builder.magic.0[..])?;
        header_writer.write_all(&command.bytes())?;
        header_writer.write_u32::<LittleEndian>(body.len() as u32)?;
        header_writer.write_all(&sha256d::Checksum::from(&body[..]).0)?;

        dst.reserve(HEADER_LEN + body.len());
        dst.extend_from_slice(&header);
        dst.extend_from_slice(&body);

        Ok(())
    }
}

impl Codec {
    /// Write the body of the message into the given writer. Writing the
    /// body first lets the header carry its checksum.
    fn write_body<W: Write>(&self, msg: &Message, mut writer: W) -> Result<(), Error> {
        match msg {
            Message::Version(version) => version.wire_serialize(&mut writer)?,
            Message::Verack => { /* Empty payload */ }
            Message::Addr(addrs) => addrs.wire_serialize(&mut writer)?,
            Message::Inv(hashes) => hashes.wire_serialize(&mut writer)?,
            Message::GetData(hashes) => hashes.wire_serialize(&mut writer)?,
            Message::NotFound(hashes) => hashes.wire_serialize(&mut writer)?,
            Message::GetBlocks(get_blocks) => {
                self.builder.version.wire_serialize(&mut writer)?;
                get_blocks.wire_serialize(&mut writer)?;
            }
            Message::GetHeaders(get_headers) => {
                self.builder.version.wire_serialize(&mut writer)?;
                get_headers.wire_serialize(&mut writer)?;
            }
            Message::Headers(headers) => headers.wire_serialize(&mut writer)?,
            Message::Tx(transaction) => transaction.wire_serialize(&mut writer)?,
            Message::Block(block) => block.wire_serialize(&mut writer)?,
            Message::GetAddr => { /* Empty payload */ }
            Message::Mempool => { /* Empty payload */ }
            Message::Ping(nonce) => nonce.wire_serialize(&mut writer)?,
            Message::Pong(nonce) => nonce.wire_serialize(&mut writer)?,
            Message::Reject {
                message,
                ccode,
                reason,
                data,
            } => {
                message.wire_serialize(&mut writer)?;
                writer.write_u8(*ccode as u8)?;
                reason.wire_serialize(&mut writer)?;
                if let Some(data) = data {
                    writer.write_all(data)?;
                }
            }
            Message::Alert(alert) => alert.wire_serialize(&mut writer)?,
        }
        Ok(())
    }
}

// ======== Decoding =========

enum DecodeState {
    Head,
    Body {
        body_len: usize,
        /// `None` means an unknown command whose body will be skipped.
        command: Option<Command>,
        checksum: sha256d::Checksum,
    },
}

impl fmt::Debug for DecodeState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeState::Head => write!(f, "DecodeState::Head"),
            DecodeState::Body {
                body_len,
                command,
                checksum,
            } => f
                .debug_struct("DecodeState::Body")
                .field("body_len", &body_len)
                .field("command", &command)
                .field("checksum", &checksum)
                .finish(),
        }
    }
}

impl Decoder for Codec {
    type Item = Message;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.state {
            DecodeState::Head => {
                // Wait until the whole frame header is buffered.
                if src.len() < HEADER_LEN {
                    return Ok(None);
                }

                let header = src.split_to(HEADER_LEN);
                let mut header_reader = Cursor::new(&header);
                let magic = Magic(<[u8; 4]>::wire_deserialize(&mut header_reader)?);
                let command_bytes = <[u8; 12]>::wire_deserialize(&mut header_reader)?;
                let body_len = header_reader.read_u32::<LittleEndian>()? as usize;
                let checksum = sha256d::Checksum(<[u8; 4]>::wire_deserialize(&mut header_reader)?);

                if magic != self.builder.magic {
                    return Err(Error::BadFormat {
                        field: "magic",
                        reason: "wrong network magic",
                    });
                }
                if body_len > self.builder.max_len {
                    return Err(Error::BadFormat {
                        field: "length",
                        reason: "body length exceeded maximum size",
                    });
                }

                // An unknown command is not an error; its body is read
                // and discarded, without penalizing the peer.
                let command = Command::parse(&command_bytes);
                if command.is_none() {
                    trace!(command = ?String::from_utf8_lossy(&command_bytes), "unknown command");
                }

                src.reserve(body_len + HEADER_LEN);
                self.state = DecodeState::Body {
                    body_len,
                    command,
                    checksum,
                };

                // Recurse to attempt body decoding.
                self.decode(src)
            }
            DecodeState::Body {
                body_len,
                command,
                checksum,
            } => {
                if src.len() < body_len {
                    // Wait for the whole body.
                    return Ok(None);
                }

                let body = src.split_to(body_len);
                self.state = DecodeState::Head;

                let command = match command {
                    Some(command) => command,
                    // Unknown command: skip the frame and try the next.
                    None => return self.decode(src),
                };

                // A frame whose checksum does not match is never parsed;
                // the error closes the connection.
                if checksum != sha256d::Checksum::from(&body[..]) {
                    return Err(Error::BadFormat {
                        field: "checksum",
                        reason: "message checksum does not match computed checksum",
                    });
                }

                let mut body_reader = Cursor::new(&body);
                let msg = self.read_body(command, &mut body_reader)?;
                trace!(%msg, "decoded message");
                Ok(Some(msg))
            }
        }
    }
}

impl Codec {
    fn read_body<R: Read>(&self, command: Command, mut reader: R) -> Result<Message, Error> {
        Ok(match command {
            Command::Version => Message::Version(Version::wire_deserialize(&mut reader)?),
            Command::Verack => Message::Verack,
            Command::Addr => {
                let addrs = <Vec<MetaAddr>>::wire_deserialize(&mut reader)?;
                if addrs.len() > constants::MAX_ADDR_PER_MESSAGE {
                    return Err(Error::BadFormat {
                        field: "addr_list",
                        reason: "more addresses than the message cap",
                    });
                }
                Message::Addr(addrs)
            }
            Command::Inv => Message::Inv(self.read_inventory(&mut reader)?),
            Command::GetData => Message::GetData(self.read_inventory(&mut reader)?),
            Command::NotFound => Message::NotFound(self.read_inventory(&mut reader)?),
            Command::GetBlocks => {
                // The leading version field is historical; it is read and
                // not enforced.
                let _version = ProtocolVersion::wire_deserialize(&mut reader)?;
                let get_blocks = GetBlocks::wire_deserialize(&mut reader)?;
                if get_blocks.block_locator_hashes.is_empty() {
                    return Err(Error::BadFormat {
                        field: "block_locator_hashes",
                        reason: "locator must name at least one hash",
                    });
                }
                Message::GetBlocks(get_blocks)
            }
            Command::GetHeaders => {
                let _version = ProtocolVersion::wire_deserialize(&mut reader)?;
                let get_headers = GetHeaders::wire_deserialize(&mut reader)?;
                if get_headers.block_locator_hashes.is_empty() {
                    return Err(Error::BadFormat {
                        field: "block_locator_hashes",
                        reason: "locator must name at least one hash",
                    });
                }
                Message::GetHeaders(get_headers)
            }
            Command::Headers => {
                Message::Headers(<Vec<block::CountedHeader>>::wire_deserialize(&mut reader)?)
            }
            Command::Tx => Message::Tx(<Arc<Transaction>>::wire_deserialize(&mut reader)?),
            Command::Block => Message::Block(<Arc<Block>>::wire_deserialize(&mut reader)?),
            Command::GetAddr => Message::GetAddr,
            Command::MemPool => Message::Mempool,
            Command::Ping => Message::Ping(Nonce::wire_deserialize(&mut reader)?),
            Command::Pong => Message::Pong(Nonce::wire_deserialize(&mut reader)?),
            Command::Reject => self.read_reject(&mut reader)?,
            Command::Alert => Message::Alert(Alert::wire_deserialize(&mut reader)?),
        })
    }

    fn read_inventory<R: Read>(&self, mut reader: R) -> Result<Vec<InventoryHash>, Error> {
        let hashes = <Vec<InventoryHash>>::wire_deserialize(&mut reader)?;
        if hashes.len() > constants::MAX_INV_PER_MESSAGE {
            return Err(Error::BadFormat {
                field: "inventory",
                reason: "more entries than the message cap",
            });
        }
        Ok(hashes)
    }

    fn read_reject<R: Read>(&self, mut reader: R) -> Result<Message, Error> {
        Ok(Message::Reject {
            message: String::wire_deserialize(&mut reader)?,
            ccode: RejectReason::from_code(reader.read_u8()?).ok_or(Error::BadFormat {
                field: "ccode",
                reason: "unknown reject code",
            })?,
            reason: String::wire_deserialize(&mut reader)?,
            // There is no length field; rejected-object hashes are simply
            // the trailing 32 bytes when present.
            data: <[u8; 32]>::wire_deserialize(&mut reader).ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::prelude::*;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::super::types::PeerServices;

    fn test_version() -> Message {
        Message::Version(Version::new(
            ProtocolVersion(constants::CURRENT_VERSION),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 6)), 8333),
            PeerServices::NODE_NETWORK,
            PeerServices::NODE_NETWORK,
            SocketAddr::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7)), 8333),
            Nonce(0x9082_4908_8927_9238),
            "/magpie:0.2.0(bitcoin)/".to_owned(),
            block::Height(540_000),
            true,
        ))
    }

    async fn encode(msg: Message) -> Vec<u8> {
        let mut bytes = Vec::new();
        {
            let mut fw = FramedWrite::new(&mut bytes, Codec::builder().finish());
            fw.send(msg).await.expect("message should serialize");
        }
        bytes
    }

    async fn decode_one(bytes: &[u8]) -> Result<Message, Error> {
        let mut fr = FramedRead::new(Cursor::new(bytes), Codec::builder().finish());
        fr.next().await.expect("a message should be available")
    }

    #[tokio::test]
    async fn version_message_round_trip() {
        let msg = test_version();
        let bytes = encode(msg.clone()).await;
        assert_eq!(decode_one(&bytes).await.unwrap(), msg);
    }

    #[tokio::test]
    async fn frame_layout() {
        let bytes = encode(Message::Ping(Nonce(0x1122_3344_5566_7788))).await;
        // magic + command + length + checksum + 8-byte nonce
        assert_eq!(bytes.len(), 24 + 8);
        assert_eq!(&bytes[0..4], &[0xf9, 0xbe, 0xb4, 0xd9]);
        assert_eq!(&bytes[4..16], b"ping\0\0\0\0\0\0\0\0");
        assert_eq!(&bytes[16..20], &[8, 0, 0, 0]);
    }

    #[tokio::test]
    async fn checksum_flip_is_rejected() {
        let mut bytes = encode(test_version()).await;
        bytes[20] ^= 0x01; // first checksum byte
        assert!(decode_one(&bytes).await.is_err());
    }

    #[tokio::test]
    async fn payload_flip_is_rejected() {
        let mut bytes = encode(test_version()).await;
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert!(decode_one(&bytes).await.is_err());
    }

    #[tokio::test]
    async fn wrong_magic_is_rejected() {
        let mut bytes = encode(Message::Verack).await;
        bytes[0] ^= 0x01;
        assert!(decode_one(&bytes).await.is_err());
    }

    #[tokio::test]
    async fn unknown_command_is_skipped() {
        // A frame with an unknown command, followed by a ping: the ping
        // must still come through, without an intervening error.
        let mut unknown = Vec::new();
        unknown.extend_from_slice(&[0xf9, 0xbe, 0xb4, 0xd9]);
        unknown.extend_from_slice(b"filterload\0\0");
        unknown.extend_from_slice(&[3, 0, 0, 0]);
        unknown.extend_from_slice(&sha256d::Checksum::from(&[1u8, 2, 3][..]).0);
        unknown.extend_from_slice(&[1, 2, 3]);

        let ping = encode(Message::Ping(Nonce(7))).await;
        unknown.extend_from_slice(&ping);

        let mut fr = FramedRead::new(Cursor::new(&unknown), Codec::builder().finish());
        let first = fr.next().await.expect("a message").unwrap();
        assert_eq!(first, Message::Ping(Nonce(7)));
    }

    #[tokio::test]
    async fn oversized_frame_is_refused() {
        let bytes = encode(Message::Ping(Nonce(7))).await;
        let mut fr = FramedRead::new(
            Cursor::new(&bytes),
            Codec::builder().with_max_body_len(7).finish(),
        );
        assert!(fr.next().await.expect("a result").is_err());
    }

    #[tokio::test]
    async fn assorted_round_trips() {
        use chrono::TimeZone;
        use magpie_chain::WireDeserializeInto;

        let addr = MetaAddr::new(
            SocketAddr::new(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1)), 8333),
            PeerServices::NODE_NETWORK,
            chrono::Utc.timestamp_opt(1_400_000_000, 0).single().unwrap(),
        );
        // The Bitcoin block 1 coinbase, as a stand-in transaction.
        let coinbase: Arc<Transaction> = hex::decode(
            "01000000010000000000000000000000000000000000000000000000000000000000000000ffffff\
             ff0704ffff001d0104ffffffff0100f2052a0100000043410496b538e853519c726a2c91e61ec116\
             00ae1390813a627c66fb8be7947be63c52da7589379515d4e0a604f8141781e62294721166bf621e\
             73a82cbf2342c858eeac00000000",
        )
        .unwrap()
        .as_slice()
        .wire_deserialize_into()
        .map(Arc::new)
        .unwrap();
        let messages = vec![
            Message::Verack,
            Message::GetAddr,
            Message::Mempool,
            Message::Addr(vec![addr]),
            Message::Inv(vec![
                InventoryHash::Block(block::Hash([0xab; 32])),
                InventoryHash::Tx(magpie_chain::transaction::Hash([0xcd; 32])),
            ]),
            Message::NotFound(vec![InventoryHash::Block(block::Hash([0x01; 32]))]),
            Message::GetHeaders(GetHeaders {
                block_locator_hashes: vec![block::Hash([0x11; 32])],
                stop_hash: None,
            }),
            Message::GetBlocks(GetBlocks {
                block_locator_hashes: vec![block::Hash([0x22; 32]), block::Hash([0x33; 32])],
                stop_hash: Some(block::Hash([0x44; 32])),
            }),
            Message::Headers(vec![block::CountedHeader {
                header: magpie_chain::parameters::Coin::bitcoin().genesis.header(),
                transaction_count: 0,
            }]),
            Message::GetData(vec![InventoryHash::Tx(coinbase.hash())]),
            Message::Tx(coinbase.clone()),
            Message::Block(Arc::new(Block {
                header: magpie_chain::parameters::Coin::bitcoin().genesis.header(),
                transactions: vec![coinbase],
            })),
            Message::Pong(Nonce(99)),
            Message::Reject {
                message: "tx".to_owned(),
                ccode: RejectReason::Duplicate,
                reason: "duplicate".to_owned(),
                data: Some([0x55; 32]),
            },
            Message::Alert(Alert {
                payload: vec![1, 2, 3],
                signature: vec![4, 5, 6],
            }),
        ];
        for msg in messages {
            let bytes = encode(msg.clone()).await;
            assert_eq!(decode_one(&bytes).await.unwrap(), msg, "{}", msg);
        }
    }

    #[tokio::test]
    async fn empty_locator_is_bad_format() {
        let msg = Message::GetHeaders(GetHeaders {
            block_locator_hashes: vec![],
            stop_hash: None,
        });
        let bytes = encode(msg).await;
        assert!(matches!(
            decode_one(&bytes).await,
            Err(Error::BadFormat { field, .. }) if field == "block_locator_hashes"
        ));
    }
}
