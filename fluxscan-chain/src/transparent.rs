//! Transparent (Bitcoin-inherited) transaction structures.

mod address;
mod script;

pub use address::Address;
pub use script::{Script, ScriptType};

use std::io;

use crate::{
    amount::Amount,
    serialization::{ByteCursor, FluxSerialize, ParseError},
    transaction,
};

/// A reference to a particular transaction output.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct OutPoint {
    /// The transaction that created the output being referenced.
    pub hash: transaction::Hash,

    /// The index of the referenced output within that transaction.
    pub index: u32,
}

impl OutPoint {
    pub const fn len() -> usize {
        36
    }

    pub(crate) fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self, ParseError> {
        Ok(OutPoint {
            hash: transaction::Hash(cursor.read_array::<32>("outpoint txid")?),
            index: cursor.read_u32_le("outpoint index")?,
        })
    }
}

impl FluxSerialize for OutPoint {
    fn flux_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        self.hash.0.flux_serialize(&mut writer)?;
        self.index.flux_serialize(&mut writer)
    }
}

/// The synthetic previous-output index used by coinbase inputs.
const COINBASE_INDEX: u32 = u32::MAX;

/// A transparent input to a transaction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Input {
    /// A reference to an output of a previous transaction.
    PrevOut {
        outpoint: OutPoint,
        unlock_script: Script,
        sequence: u32,
    },
    /// New coins created by the block reward.
    ///
    /// Recognized by the marker shape: an all-zero previous txid and a
    /// previous index of `0xFFFFFFFF`.
    Coinbase {
        /// Free data inserted by the block producer.
        data: Vec<u8>,
        sequence: u32,
    },
}

impl Input {
    pub(crate) fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self, ParseError> {
        let prev_hash = cursor.read_array::<32>("input prev txid")?;
        let prev_index = cursor.read_u32_le("input prev index")?;
        let script = cursor.read_var_bytes("input script")?;
        let sequence = cursor.read_u32_le("input sequence")?;

        if prev_hash == [0u8; 32] && prev_index == COINBASE_INDEX {
            Ok(Input::Coinbase {
                data: script.to_vec(),
                sequence,
            })
        } else {
            Ok(Input::PrevOut {
                outpoint: OutPoint {
                    hash: transaction::Hash(prev_hash),
                    index: prev_index,
                },
                unlock_script: Script(script.to_vec()),
                sequence,
            })
        }
    }

    /// The outpoint this input spends, unless it is a coinbase input.
    pub fn outpoint(&self) -> Option<OutPoint> {
        match self {
            Input::PrevOut { outpoint, .. } => Some(*outpoint),
            Input::Coinbase { .. } => None,
        }
    }

    pub fn is_coinbase(&self) -> bool {
        matches!(self, Input::Coinbase { .. })
    }
}

impl FluxSerialize for Input {
    fn flux_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        match self {
            Input::PrevOut {
                outpoint,
                unlock_script,
                sequence,
            } => {
                outpoint.flux_serialize(&mut writer)?;
                unlock_script.0.flux_serialize(&mut writer)?;
                sequence.flux_serialize(&mut writer)
            }
            Input::Coinbase { data, sequence } => {
                [0u8; 32].flux_serialize(&mut writer)?;
                COINBASE_INDEX.flux_serialize(&mut writer)?;
                data.clone().flux_serialize(&mut writer)?;
                sequence.flux_serialize(&mut writer)
            }
        }
    }
}

/// A transparent output of a transaction.
///
/// The unspent outputs of the global ledger are the UTXO set; each output
/// is an indivisible unit of value locked by a script.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Output {
    pub value: Amount,
    pub lock_script: Script,
}

impl Output {
    pub(crate) fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self, ParseError> {
        Ok(Output {
            value: Amount::from_units(cursor.read_i64_le("output value")?),
            lock_script: Script(cursor.read_var_bytes("output script")?.to_vec()),
        })
    }

    /// The address this output pays, if its script has a standard
    /// address-bearing form.
    pub fn address(&self, network: crate::parameters::Network) -> Option<Address> {
        self.lock_script.address(network)
    }
}

impl FluxSerialize for Output {
    fn flux_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        self.value.units().flux_serialize(&mut writer)?;
        self.lock_script.0.flux_serialize(&mut writer)
    }
}
