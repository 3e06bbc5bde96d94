use std::fmt;

/// A block height on the best chain.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Height(pub u32);

impl Height {
    /// The height of the genesis block.
    pub const MIN: Height = Height(0);

    pub fn next(self) -> Height {
        Height(self.0 + 1)
    }

    pub fn previous(self) -> Option<Height> {
        self.0.checked_sub(1).map(Height)
    }
}

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u32> for Height {
    fn from(height: u32) -> Height {
        Height(height)
    }
}
