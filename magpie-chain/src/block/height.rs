use crate::{SerializationError, WireDeserialize, WireSerialize};

/// The height of a block in its chain: the number of blocks between it and
/// the genesis block (which has height 0).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Height(pub u32);

impl Height {
    pub const MIN: Height = Height(0);

    pub fn next(self) -> Height {
        Height(self.0 + 1)
    }
}

impl WireSerialize for Height {
    fn wire_serialize<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error> {
        self.0.wire_serialize(target)
    }
}

impl WireDeserialize for Height {
    fn wire_deserialize<R: std::io::Read>(reader: R) -> Result<Self, SerializationError> {
        Ok(Height(u32::wire_deserialize(reader)?))
    }
}
