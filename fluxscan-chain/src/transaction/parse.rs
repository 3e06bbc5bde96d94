//! Byte-level decoding for all transaction versions, so the whole layout
//! logic lives in one place.

use crate::{
    amount::Amount,
    fluxnode,
    serialization::{ByteCursor, ParseError},
    transparent::{Input, Output},
};

use super::{
    shielded::{SAPLING_ERA_CIPHERTEXT_LEN, SPROUT_CIPHERTEXT_LEN},
    JoinSplit, JoinSplitAuth, ShieldedOutput, ShieldedSpend, Transaction,
};

/// The version group id required alongside overwintered version 4.
pub const SAPLING_VERSION_GROUP_ID: u32 = 0x892F_2085;

const OVERWINTER_BIT: u32 = 1 << 31;

// Sanity caps. An honest block never approaches these; corrupt counts
// must fail before preallocation.
const MAX_INPUT_COUNT: u64 = 100_000;
const MAX_OUTPUT_COUNT: u64 = 100_000;
const MAX_JOINSPLIT_COUNT: u64 = 100;
const MAX_SHIELDED_COUNT: u64 = 1_000;

/// Limit blind preallocation from attacker-controlled counts.
const PREALLOC_LIMIT: usize = 1024;

impl Transaction {
    /// Decode one transaction, advancing the cursor exactly past its
    /// serialized bytes.
    ///
    /// Field presence is never inferred from lookahead: version 4 always
    /// decodes `value_balance` and both shielded counts, and the trailing
    /// signatures appear exactly when their count fields say so.
    pub fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self, ParseError> {
        let version_position = cursor.position();
        let version_raw = cursor.read_u32_le("transaction version")?;
        let overwintered = version_raw & OVERWINTER_BIT != 0;
        let version = version_raw & !OVERWINTER_BIT;

        if overwintered {
            let group_position = cursor.position();
            let version_group_id = cursor.read_u32_le("version group id")?;
            if version != 4 || version_group_id != SAPLING_VERSION_GROUP_ID {
                return Err(ParseError::Malformed {
                    field: "version group id",
                    position: group_position,
                    reason: "expected version 4 with the Sapling version group",
                });
            }
            return parse_sapling(cursor);
        }

        match version {
            1 => parse_legacy(cursor),
            2 => parse_sprout(cursor),
            3 | 5 | 6 => match fluxnode::parse(cursor, version)? {
                fluxnode::Operation::Start(start) => Ok(Transaction::NodeStart(start)),
                fluxnode::Operation::Confirm(confirm) => Ok(Transaction::NodeConfirm(confirm)),
            },
            _ => Err(ParseError::Malformed {
                field: "transaction version",
                position: version_position,
                reason: "unsupported transaction version",
            }),
        }
    }
}

fn parse_inputs(cursor: &mut ByteCursor<'_>) -> Result<Vec<Input>, ParseError> {
    let count = cursor.read_count(MAX_INPUT_COUNT, "input count")?;
    let mut inputs = Vec::with_capacity(count.min(PREALLOC_LIMIT));
    for _ in 0..count {
        inputs.push(Input::parse(cursor)?);
    }
    Ok(inputs)
}

fn parse_outputs(cursor: &mut ByteCursor<'_>) -> Result<Vec<Output>, ParseError> {
    let count = cursor.read_count(MAX_OUTPUT_COUNT, "output count")?;
    let mut outputs = Vec::with_capacity(count.min(PREALLOC_LIMIT));
    for _ in 0..count {
        outputs.push(Output::parse(cursor)?);
    }
    Ok(outputs)
}

fn parse_joinsplits(
    cursor: &mut ByteCursor<'_>,
    ciphertext_len: usize,
) -> Result<(Vec<JoinSplit>, Option<JoinSplitAuth>), ParseError> {
    let count = cursor.read_count(MAX_JOINSPLIT_COUNT, "joinsplit count")?;
    let mut joinsplits = Vec::with_capacity(count);
    for _ in 0..count {
        joinsplits.push(JoinSplit::parse(cursor, ciphertext_len)?);
    }

    let auth = if count > 0 {
        Some(JoinSplitAuth {
            pubkey: cursor.read_array::<32>("joinsplit pubkey")?,
            sig: cursor.read_array::<64>("joinsplit signature")?,
        })
    } else {
        None
    };

    Ok((joinsplits, auth))
}

fn parse_legacy(cursor: &mut ByteCursor<'_>) -> Result<Transaction, ParseError> {
    Ok(Transaction::Legacy {
        inputs: parse_inputs(cursor)?,
        outputs: parse_outputs(cursor)?,
        lock_time: cursor.read_u32_le("lock time")?,
    })
}

fn parse_sprout(cursor: &mut ByteCursor<'_>) -> Result<Transaction, ParseError> {
    let inputs = parse_inputs(cursor)?;
    let outputs = parse_outputs(cursor)?;
    let lock_time = cursor.read_u32_le("lock time")?;
    let (joinsplits, joinsplit_auth) = parse_joinsplits(cursor, SPROUT_CIPHERTEXT_LEN)?;

    Ok(Transaction::Sprout {
        inputs,
        outputs,
        lock_time,
        joinsplits,
        joinsplit_auth,
    })
}

fn parse_sapling(cursor: &mut ByteCursor<'_>) -> Result<Transaction, ParseError> {
    let inputs = parse_inputs(cursor)?;
    let outputs = parse_outputs(cursor)?;
    let lock_time = cursor.read_u32_le("lock time")?;
    let expiry_height = cursor.read_u32_le("expiry height")?;

    // value_balance and both counts are unconditional in version 4.
    let value_balance = Amount::from_units(cursor.read_i64_le("value balance")?);

    let spend_count = cursor.read_count(MAX_SHIELDED_COUNT, "shielded spend count")?;
    let mut shielded_spends = Vec::with_capacity(spend_count.min(PREALLOC_LIMIT));
    for _ in 0..spend_count {
        shielded_spends.push(ShieldedSpend::parse(cursor)?);
    }

    let output_count = cursor.read_count(MAX_SHIELDED_COUNT, "shielded output count")?;
    let mut shielded_outputs = Vec::with_capacity(output_count.min(PREALLOC_LIMIT));
    for _ in 0..output_count {
        shielded_outputs.push(ShieldedOutput::parse(cursor)?);
    }

    let (joinsplits, joinsplit_auth) = parse_joinsplits(cursor, SAPLING_ERA_CIPHERTEXT_LEN)?;

    let binding_sig = if !shielded_spends.is_empty() || !shielded_outputs.is_empty() {
        Some(cursor.read_array::<64>("binding signature")?)
    } else {
        None
    };

    Ok(Transaction::Sapling {
        inputs,
        outputs,
        lock_time,
        expiry_height,
        value_balance,
        shielded_spends,
        shielded_outputs,
        joinsplits,
        joinsplit_auth,
        binding_sig,
    })
}
