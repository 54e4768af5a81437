//! Coin parameter records.
//!
//! A `Coin` is plain data plus two function fields (proof-of-work selector
//! and subsidy schedule); adding a chain means adding a table entry, not a
//! type.

use chrono::{TimeZone, Utc};
use lazy_static::lazy_static;

use crate::amount::{Amount, COIN};
use crate::block::{self, merkle, Header, Height};
use crate::work::{CompactDifficulty, ProofOfWork};

/// The alert public key baked into this software, accepted alongside each
/// coin's own key.
pub const VENDOR_ALERT_KEY: &str =
    "045e4dd6dab7e1db2c2754053adf610c02819f93b4fa79d2f3ba19964521b798096c9629226801994c2141a48d00b826973b7028cad5bbd1f219ac91c3a3e00ee5";

/// The genesis block of a coin, as parameter data.
#[derive(Clone, Debug)]
pub struct Genesis {
    pub version: u32,
    /// Identity hash of the genesis header, in stored (little-endian) order.
    pub hash: block::Hash,
    pub merkle_root: merkle::Root,
    pub timestamp: u32,
    pub bits: CompactDifficulty,
    pub nonce: u32,
}

impl Genesis {
    /// Reconstruct the genesis header from its parameters.
    pub fn header(&self) -> Header {
        Header::new(
            self.version,
            block::Hash::zero(),
            self.merkle_root,
            Utc.timestamp_opt(self.timestamp as i64, 0)
                .single()
                .expect("genesis timestamp is valid"),
            self.bits,
            self.nonce,
        )
    }
}

/// Immutable configuration describing one Bitcoin-family chain.
#[derive(Clone)]
pub struct Coin {
    pub name: &'static str,
    pub symbols: &'static [&'static str],
    pub dns_seeds: &'static [(&'static str, u16)],
    pub port: u16,
    pub protocol_version: u32,
    pub magic: [u8; 4],
    /// Version byte for pay-to-pubkey-hash addresses.
    pub address_version: u8,
    /// Version byte for pay-to-script-hash addresses.
    pub script_address: u8,
    pub genesis: Genesis,
    pub proof_of_work: ProofOfWork,
    /// The block subsidy schedule, by height.
    pub subsidy: fn(Height) -> Amount,
    /// The coin's alert-signing public key, hex-encoded.
    pub alert_public_key: &'static str,
}

impl Coin {
    pub fn bitcoin() -> &'static Coin {
        &BITCOIN
    }

    pub fn litecoin() -> &'static Coin {
        &LITECOIN
    }

    /// Look up a coin by name (as given on the command line).
    pub fn from_name(name: &str) -> Option<&'static Coin> {
        match name {
            "bitcoin" => Some(&BITCOIN),
            "litecoin" => Some(&LITECOIN),
            _ => None,
        }
    }

    /// Permitted freshly-issued value for a block at `height`.
    pub fn block_subsidy(&self, height: Height) -> Amount {
        (self.subsidy)(height)
    }
}

impl std::fmt::Debug for Coin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Coin").field(&self.name).finish()
    }
}

/// 50 coins, halving every 210 000 blocks.
fn bitcoin_subsidy(height: Height) -> Amount {
    let halvings = height.0 / 210_000;
    if halvings >= 64 {
        return Amount::zero();
    }
    Amount::from_sat((50 * COIN) >> halvings)
}

/// 50 coins, halving every 840 000 blocks.
fn litecoin_subsidy(height: Height) -> Amount {
    let halvings = height.0 / 840_000;
    if halvings >= 64 {
        return Amount::zero();
    }
    Amount::from_sat((50 * COIN) >> halvings)
}

fn stored_hash(hex: &str) -> block::Hash {
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(hex, &mut bytes).expect("parameter hash is valid hex");
    block::Hash(bytes)
}

fn stored_root(hex: &str) -> merkle::Root {
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(hex, &mut bytes).expect("parameter root is valid hex");
    merkle::Root(bytes)
}

lazy_static! {
    pub static ref BITCOIN: Coin = Coin {
        name: "bitcoin",
        symbols: &["BTC", "XBT"],
        dns_seeds: &[
            ("seed.bitcoin.sipa.be", 8333),
            ("dnsseed.bluematt.me", 8333),
            ("dnsseed.bitcoin.dashjr.org", 8333),
            ("seed.bitcoinstats.com", 8333),
            ("seed.bitnodes.io", 8333),
            ("bitseed.xf2.org", 8333),
        ],
        port: 8333,
        protocol_version: 70002,
        magic: [0xf9, 0xbe, 0xb4, 0xd9],
        address_version: 0,
        script_address: 5,
        genesis: Genesis {
            version: 1,
            hash: stored_hash(
                "6fe28c0ab6f1b372c1a6a246ae63f74f931e8365e15a089c68d6190000000000"
            ),
            merkle_root: stored_root(
                "3ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a"
            ),
            timestamp: 1231006505,
            bits: CompactDifficulty(486604799),
            nonce: 2083236893,
        },
        proof_of_work: ProofOfWork::Sha256d,
        subsidy: bitcoin_subsidy,
        alert_public_key: "04fc9702847840aaf195de8442ebecedf5b095cdbb9bc716bda9110971b28a49e0ead8564ff0db22209e0374782c093bb899692d524e9d6a6956e7c5ecbcd68284",
    };

    pub static ref LITECOIN: Coin = Coin {
        name: "litecoin",
        symbols: &["LTC"],
        dns_seeds: &[
            ("dnsseed.litecointools.com", 9333),
            ("dnsseed.litecoinpool.org", 9333),
            ("dnsseed.ltc.xurious.com", 9333),
        ],
        port: 9333,
        protocol_version: 70002,
        magic: [0xfb, 0xc0, 0xb6, 0xdb],
        address_version: 48,
        script_address: 5,
        genesis: Genesis {
            version: 1,
            hash: stored_hash(
                "e2bf047e7e5a191aa4ef34d314979dc9986e0f19251edaba5940fd1fe365a712"
            ),
            merkle_root: stored_root(
                "d9ced4ed1130f7b7faad9be25323ffafa33232a17c3edf6cfd97bee6bafbdd97"
            ),
            timestamp: 1317972665,
            bits: CompactDifficulty(504365040),
            nonce: 2084524493,
        },
        proof_of_work: ProofOfWork::Scrypt,
        subsidy: litecoin_subsidy,
        alert_public_key: "040184710fa689ad5023690c80f3a49c8f13f8d45b8c857fbcbc8bc4a8e4d3eb4b10f4d4604fa08dce601aaf0f470216fe1b51850b4acf21b179c45070ac7b03a9",
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WireSerialize;

    #[test]
    fn bitcoin_genesis_header_hashes_to_its_parameter() {
        let genesis = &Coin::bitcoin().genesis;
        let header = genesis.header();
        assert_eq!(header.hash(), genesis.hash);
        assert_eq!(header.wire_serialize_to_vec().unwrap().len(), 80);
    }

    #[test]
    fn bitcoin_subsidy_schedule() {
        let coin = Coin::bitcoin();
        assert_eq!(coin.block_subsidy(Height(0)), Amount::from_sat(50 * COIN));
        assert_eq!(
            coin.block_subsidy(Height(210_000)),
            Amount::from_sat(25 * COIN)
        );
        assert_eq!(
            coin.block_subsidy(Height(420_000)),
            Amount::from_sat(1_250_000_000)
        );
        // After the 64th halving there is nothing left to issue.
        assert_eq!(
            coin.block_subsidy(Height(64 * 210_000)),
            Amount::zero()
        );
    }

    #[test]
    fn coins_resolve_by_name() {
        assert_eq!(Coin::from_name("bitcoin").unwrap().port, 8333);
        assert_eq!(Coin::from_name("litecoin").unwrap().port, 9333);
        assert!(Coin::from_name("dogecoin").is_none());
    }
}
