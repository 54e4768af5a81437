//! Chain parameters: the `Coin` record that selects a concrete network.

mod coin;

pub use coin::{Coin, Genesis, BITCOIN, LITECOIN, VENDOR_ALERT_KEY};
