//! Transactions and transaction-related structures.

mod hash;
mod parse;
mod shielded;


pub use hash::Hash;
pub use parse::SAPLING_VERSION_GROUP_ID;
pub use shielded::{
    JoinSplit, ShieldedFlow, ShieldedOutput, ShieldedSpend, GROTH16_PROOF_LEN, PHGR13_PROOF_LEN,
    SAPLING_ERA_CIPHERTEXT_LEN, SAPLING_ERA_JOINSPLIT_LEN, SAPLING_OUTPUT_LEN, SAPLING_SPEND_LEN,
    SPROUT_CIPHERTEXT_LEN, SPROUT_JOINSPLIT_LEN,
};

use tracing::warn;

use crate::{
    amount::Amount,
    fluxnode::{self, OperationKind},
    transparent::{Input, Output},
};

/// The JoinSplit authorization carried when a transaction has JoinSplits.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JoinSplitAuth {
    pub pubkey: [u8; 32],
    pub sig: [u8; 64],
}

/// A Flux transaction.
///
/// Each wire version gets its own variant with its own decoder; the batch
/// indexer only touches the shared capability surface below, so a layout
/// change in one variant cannot misalign another.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Transaction {
    /// Version 1: transparent-only.
    Legacy {
        inputs: Vec<Input>,
        outputs: Vec<Output>,
        lock_time: u32,
    },
    /// Version 2: transparent plus Sprout JoinSplits.
    Sprout {
        inputs: Vec<Input>,
        outputs: Vec<Output>,
        lock_time: u32,
        joinsplits: Vec<JoinSplit>,
        joinsplit_auth: Option<JoinSplitAuth>,
    },
    /// Version 4 (overwintered, Sapling group): transparent, Sapling
    /// spends/outputs, and Sapling-era JoinSplits.
    Sapling {
        inputs: Vec<Input>,
        outputs: Vec<Output>,
        lock_time: u32,
        expiry_height: u32,
        value_balance: Amount,
        shielded_spends: Vec<ShieldedSpend>,
        shielded_outputs: Vec<ShieldedOutput>,
        joinsplits: Vec<JoinSplit>,
        joinsplit_auth: Option<JoinSplitAuth>,
        binding_sig: Option<[u8; 64]>,
    },
    /// Version 3, 5 or 6 fluxnode START registration.
    NodeStart(fluxnode::Start),
    /// Version 3, 5 or 6 fluxnode CONFIRMATION.
    NodeConfirm(fluxnode::Confirm),
}

impl Transaction {
    /// The wire version number (low 31 bits).
    pub fn version(&self) -> u32 {
        match self {
            Transaction::Legacy { .. } => 1,
            Transaction::Sprout { .. } => 2,
            Transaction::Sapling { .. } => 4,
            Transaction::NodeStart(start) => start.version,
            Transaction::NodeConfirm(confirm) => confirm.version,
        }
    }

    /// The transparent inputs. Empty for fluxnode operations.
    pub fn inputs(&self) -> &[Input] {
        match self {
            Transaction::Legacy { inputs, .. }
            | Transaction::Sprout { inputs, .. }
            | Transaction::Sapling { inputs, .. } => inputs,
            Transaction::NodeStart(_) | Transaction::NodeConfirm(_) => &[],
        }
    }

    /// The transparent outputs. Empty for fluxnode operations.
    pub fn outputs(&self) -> &[Output] {
        match self {
            Transaction::Legacy { outputs, .. }
            | Transaction::Sprout { outputs, .. }
            | Transaction::Sapling { outputs, .. } => outputs,
            Transaction::NodeStart(_) | Transaction::NodeConfirm(_) => &[],
        }
    }

    pub fn lock_time(&self) -> Option<u32> {
        match self {
            Transaction::Legacy { lock_time, .. }
            | Transaction::Sprout { lock_time, .. }
            | Transaction::Sapling { lock_time, .. } => Some(*lock_time),
            Transaction::NodeStart(_) | Transaction::NodeConfirm(_) => None,
        }
    }

    pub fn expiry_height(&self) -> Option<u32> {
        match self {
            Transaction::Sapling { expiry_height, .. } => Some(*expiry_height),
            _ => None,
        }
    }

    /// Whether the first input carries the coinbase marker.
    pub fn is_coinbase(&self) -> bool {
        matches!(self.inputs().first(), Some(Input::Coinbase { .. }))
    }

    /// Whether this transaction touches a shielded pool.
    pub fn is_shielded(&self) -> bool {
        match self {
            Transaction::Sprout { joinsplits, .. } => !joinsplits.is_empty(),
            Transaction::Sapling {
                value_balance,
                shielded_spends,
                shielded_outputs,
                joinsplits,
                ..
            } => {
                *value_balance != Amount::ZERO
                    || !shielded_spends.is_empty()
                    || !shielded_outputs.is_empty()
                    || !joinsplits.is_empty()
            }
            _ => false,
        }
    }

    /// The fluxnode operation kind, if this is a node transaction.
    pub fn node_op_kind(&self) -> Option<OperationKind> {
        match self {
            Transaction::NodeStart(_) => Some(OperationKind::Start),
            Transaction::NodeConfirm(_) => Some(OperationKind::Confirm),
            _ => None,
        }
    }

    /// The daemon-rule txid for fluxnode operations, which hash a
    /// signature-excluded serialization instead of the raw bytes.
    pub fn node_txid(&self) -> Option<Hash> {
        match self {
            Transaction::NodeStart(start) => Some(start.txid()),
            Transaction::NodeConfirm(confirm) => Some(confirm.txid()),
            _ => None,
        }
    }

    /// Soft-extract the shielded flow scalars for fee and supply math.
    ///
    /// Returns `None` for transactions with no shielded activity, and drops
    /// the whole record with a warning when any scalar exceeds the
    /// plausible-supply ceiling, so a misdecoded value can never reach the
    /// supply accounting.
    pub fn shielded_flow(&self) -> Option<ShieldedFlow> {
        if !self.is_shielded() {
            return None;
        }

        let (joinsplits, value_balance) = match self {
            Transaction::Sprout { joinsplits, .. } => (joinsplits.as_slice(), Amount::ZERO),
            Transaction::Sapling {
                joinsplits,
                value_balance,
                ..
            } => (joinsplits.as_slice(), *value_balance),
            _ => return None,
        };

        let flow = ShieldedFlow {
            vpub_old: joinsplits.iter().map(|js| js.vpub_old).sum(),
            vpub_new: joinsplits.iter().map(|js| js.vpub_new).sum(),
            value_balance,
        };

        if !flow.is_plausible() {
            warn!(
                vpub_old = flow.vpub_old.units(),
                vpub_new = flow.vpub_new.units(),
                value_balance = flow.value_balance.units(),
                "dropping implausible shielded flow record"
            );
            return None;
        }

        Some(flow)
    }

    /// The sum of transparent output values.
    pub fn output_total(&self) -> Amount {
        self.outputs().iter().map(|output| output.value).sum()
    }
}
