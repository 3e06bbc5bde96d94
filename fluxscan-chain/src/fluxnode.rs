//! Fluxnode operation transactions.
//!
//! Version 3, 5 and 6 transactions carry no transparent value transfer;
//! their payload registers (START) or confirms (CONFIRMATION) a
//! participating node. The daemon computes their txid over a serialization
//! that excludes the signature vectors and any delegate payload, and this
//! module reproduces that serialization exactly.

use std::io;

use crate::{
    serialization::{sha256d, write_compact_size, ByteCursor, FluxSerialize, ParseError},
    transaction,
    transparent::OutPoint,
};

/// The operation selector (`nType`) values.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum OperationKind {
    Start,
    Confirm,
}

impl OperationKind {
    pub const fn n_type(self) -> u8 {
        match self {
            OperationKind::Start => 2,
            OperationKind::Confirm => 4,
        }
    }
}

/// Version 6 feature word bits.
mod features {
    /// Plain pay-to-public-key-hash collateral.
    pub const NORMAL: u32 = 0x01;
    /// Pay-to-script-hash collateral with a redeem script.
    pub const P2SH: u32 = 0x02;
    /// The payload carries a delegate-key section.
    pub const DELEGATES: u32 = 0x0100;
}

/// A fluxnode START registration payload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Start {
    /// The transaction version that carried this operation (3, 5 or 6).
    pub version: u32,
    /// The raw version 6 feature word, when present.
    pub feature_flags: Option<u32>,
    /// The collateral UTXO backing the node.
    pub collateral: OutPoint,
    /// Present unless the collateral is P2SH.
    pub collateral_pubkey: Option<Vec<u8>>,
    /// Present only for P2SH collateral.
    pub redeem_script: Option<Vec<u8>>,
    pub node_pubkey: Vec<u8>,
    pub sig_time: u32,
    /// Excluded from the txid serialization.
    pub signature: Vec<u8>,
    /// Delegate keys, when the version 6 delegates bit is set and in use.
    /// Excluded from the txid serialization.
    pub delegate_keys: Vec<Vec<u8>>,
}

/// A fluxnode CONFIRMATION payload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Confirm {
    /// The transaction version that carried this operation (3, 5 or 6).
    pub version: u32,
    /// The raw version 6 feature word, when present.
    pub feature_flags: Option<u32>,
    pub collateral: OutPoint,
    pub sig_time: u32,
    /// Benchmark tier code: 1 CUMULUS, 2 NIMBUS, 3 STRATUS.
    pub benchmark_tier: i8,
    pub benchmark_sig_time: u32,
    pub update_type: i8,
    pub ip: String,
    /// Excluded from the txid serialization.
    pub signature: Vec<u8>,
    /// Excluded from the txid serialization.
    pub benchmark_signature: Vec<u8>,
}

/// A parsed fluxnode operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Operation {
    Start(Start),
    Confirm(Confirm),
}

/// The sanity cap on delegate keys in a START payload.
const MAX_DELEGATE_KEYS: u64 = 100;

/// Parse the operation payload of a version 3, 5 or 6 transaction.
///
/// The cursor must sit just past the 4-byte transaction version; version 6
/// carries a 4-byte feature word before the 1-byte operation selector.
pub fn parse(cursor: &mut ByteCursor<'_>, version: u32) -> Result<Operation, ParseError> {
    let feature_flags = if version == 6 {
        Some(cursor.read_u32_le("fluxnode feature flags")?)
    } else {
        None
    };

    let n_type_position = cursor.position();
    let n_type = cursor.read_u8("fluxnode operation type")?;
    match n_type {
        2 => Start::parse(cursor, version, feature_flags).map(Operation::Start),
        4 => Confirm::parse(cursor, version, feature_flags).map(Operation::Confirm),
        _ => Err(ParseError::Malformed {
            field: "fluxnode operation type",
            position: n_type_position,
            reason: "expected START (2) or CONFIRMATION (4)",
        }),
    }
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Start(_) => OperationKind::Start,
            Operation::Confirm(_) => OperationKind::Confirm,
        }
    }

    pub fn collateral(&self) -> OutPoint {
        match self {
            Operation::Start(start) => start.collateral,
            Operation::Confirm(confirm) => confirm.collateral,
        }
    }

    pub fn txid(&self) -> transaction::Hash {
        match self {
            Operation::Start(start) => start.txid(),
            Operation::Confirm(confirm) => confirm.txid(),
        }
    }
}

impl Start {
    /// Whether the version 6 feature word selects P2SH collateral.
    ///
    /// The raw values 1 and 2 are equivalent to the corresponding bits.
    fn is_p2sh(feature_flags: Option<u32>) -> bool {
        matches!(feature_flags, Some(flags) if flags & features::P2SH != 0)
    }

    fn has_delegates(feature_flags: Option<u32>) -> bool {
        matches!(feature_flags, Some(flags) if flags & features::DELEGATES != 0)
    }

    fn parse(
        cursor: &mut ByteCursor<'_>,
        version: u32,
        feature_flags: Option<u32>,
    ) -> Result<Self, ParseError> {
        let collateral = OutPoint::parse(cursor)?;

        let (collateral_pubkey, redeem_script, node_pubkey) = if Self::is_p2sh(feature_flags) {
            let node_pubkey = cursor.read_var_bytes("fluxnode pubkey")?.to_vec();
            let redeem_script = cursor.read_var_bytes("fluxnode redeem script")?.to_vec();
            (None, Some(redeem_script), node_pubkey)
        } else {
            let collateral_pubkey = cursor.read_var_bytes("collateral pubkey")?.to_vec();
            let node_pubkey = cursor.read_var_bytes("fluxnode pubkey")?.to_vec();
            (Some(collateral_pubkey), None, node_pubkey)
        };

        let sig_time = cursor.read_u32_le("fluxnode sig time")?;
        let signature = cursor.read_var_bytes("fluxnode signature")?.to_vec();

        let mut delegate_keys = Vec::new();
        if Self::has_delegates(feature_flags) {
            let using_delegates = cursor.read_u8("using delegates")?;
            if using_delegates == 1 {
                let count = cursor.read_count(MAX_DELEGATE_KEYS, "delegate key count")?;
                for _ in 0..count {
                    delegate_keys.push(cursor.read_var_bytes("delegate key")?.to_vec());
                }
            }
        }

        Ok(Start {
            version,
            feature_flags,
            collateral,
            collateral_pubkey,
            redeem_script,
            node_pubkey,
            sig_time,
            signature,
            delegate_keys,
        })
    }

    /// The daemon's txid for this operation: double-SHA256 over the
    /// payload with the signature and delegate sections left out.
    pub fn txid(&self) -> transaction::Hash {
        let mut writer = sha256d::Writer::default();
        self.hash_serialize(&mut writer)
            .expect("hash writes are infallible");
        transaction::Hash(writer.finish())
    }

    fn hash_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        self.version.flux_serialize(&mut writer)?;
        if let Some(flags) = self.feature_flags {
            flags.flux_serialize(&mut writer)?;
        }
        OperationKind::Start.n_type().flux_serialize(&mut writer)?;
        self.collateral.flux_serialize(&mut writer)?;
        if let Some(redeem_script) = &self.redeem_script {
            self.node_pubkey.flux_serialize(&mut writer)?;
            redeem_script.flux_serialize(&mut writer)?;
        } else {
            self.collateral_pubkey
                .clone()
                .unwrap_or_default()
                .flux_serialize(&mut writer)?;
            self.node_pubkey.flux_serialize(&mut writer)?;
        }
        self.sig_time.flux_serialize(&mut writer)
    }
}

impl Confirm {
    fn parse(
        cursor: &mut ByteCursor<'_>,
        version: u32,
        feature_flags: Option<u32>,
    ) -> Result<Self, ParseError> {
        Ok(Confirm {
            version,
            feature_flags,
            collateral: OutPoint::parse(cursor)?,
            sig_time: cursor.read_u32_le("confirmation sig time")?,
            benchmark_tier: cursor.read_i8("benchmark tier")?,
            benchmark_sig_time: cursor.read_u32_le("benchmark sig time")?,
            update_type: cursor.read_i8("confirmation update type")?,
            ip: cursor.read_var_string("fluxnode ip")?,
            signature: cursor.read_var_bytes("confirmation signature")?.to_vec(),
            benchmark_signature: cursor.read_var_bytes("benchmark signature")?.to_vec(),
        })
    }

    /// The daemon's txid for this operation: double-SHA256 over the
    /// payload with both signatures left out.
    pub fn txid(&self) -> transaction::Hash {
        let mut writer = sha256d::Writer::default();
        self.hash_serialize(&mut writer)
            .expect("hash writes are infallible");
        transaction::Hash(writer.finish())
    }

    fn hash_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        self.version.flux_serialize(&mut writer)?;
        if let Some(flags) = self.feature_flags {
            flags.flux_serialize(&mut writer)?;
        }
        OperationKind::Confirm.n_type().flux_serialize(&mut writer)?;
        self.collateral.flux_serialize(&mut writer)?;
        self.sig_time.flux_serialize(&mut writer)?;
        self.benchmark_tier.flux_serialize(&mut writer)?;
        self.benchmark_sig_time.flux_serialize(&mut writer)?;
        self.update_type.flux_serialize(&mut writer)?;
        self.ip.flux_serialize(&mut writer)
    }
}

/// Serialize a START payload body in wire order (everything after the
/// version and feature word). Used to build test vectors.
pub fn serialize_start_body<W: io::Write>(start: &Start, mut writer: W) -> Result<(), io::Error> {
    OperationKind::Start.n_type().flux_serialize(&mut writer)?;
    start.collateral.flux_serialize(&mut writer)?;
    if let Some(redeem_script) = &start.redeem_script {
        start.node_pubkey.flux_serialize(&mut writer)?;
        redeem_script.flux_serialize(&mut writer)?;
    } else {
        start
            .collateral_pubkey
            .clone()
            .unwrap_or_default()
            .flux_serialize(&mut writer)?;
        start.node_pubkey.flux_serialize(&mut writer)?;
    }
    start.sig_time.flux_serialize(&mut writer)?;
    start.signature.flux_serialize(&mut writer)?;
    if Start::has_delegates(start.feature_flags) {
        let using = u8::from(!start.delegate_keys.is_empty());
        using.flux_serialize(&mut writer)?;
        if using == 1 {
            write_compact_size(&mut writer, start.delegate_keys.len() as u64)?;
            for key in &start.delegate_keys {
                key.flux_serialize(&mut writer)?;
            }
        }
    }
    Ok(())
}

/// Serialize a CONFIRMATION payload body in wire order. Used to build test
/// vectors.
pub fn serialize_confirm_body<W: io::Write>(
    confirm: &Confirm,
    mut writer: W,
) -> Result<(), io::Error> {
    OperationKind::Confirm.n_type().flux_serialize(&mut writer)?;
    confirm.collateral.flux_serialize(&mut writer)?;
    confirm.sig_time.flux_serialize(&mut writer)?;
    confirm.benchmark_tier.flux_serialize(&mut writer)?;
    confirm.benchmark_sig_time.flux_serialize(&mut writer)?;
    confirm.update_type.flux_serialize(&mut writer)?;
    confirm.ip.flux_serialize(&mut writer)?;
    confirm.signature.flux_serialize(&mut writer)?;
    confirm.benchmark_signature.flux_serialize(&mut writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Hash;

    fn sample_start(feature_flags: Option<u32>, version: u32) -> Start {
        Start {
            version,
            feature_flags,
            collateral: OutPoint {
                hash: Hash([0x0F; 32]),
                index: 1,
            },
            collateral_pubkey: Some(vec![0x02; 33]),
            redeem_script: None,
            node_pubkey: vec![0x03; 33],
            sig_time: 1_650_000_000,
            signature: vec![0x30; 71],
            delegate_keys: Vec::new(),
        }
    }

    fn roundtrip_start(start: &Start) -> Operation {
        let mut body = Vec::new();
        if let Some(flags) = start.feature_flags {
            body.extend_from_slice(&flags.to_le_bytes());
        }
        serialize_start_body(start, &mut body).unwrap();

        let mut cursor = ByteCursor::new(&body);
        let op = parse(&mut cursor, start.version).unwrap();
        assert!(cursor.is_empty());
        op
    }

    #[test]
    fn start_v5_roundtrip() {
        let start = sample_start(None, 5);
        assert_eq!(roundtrip_start(&start), Operation::Start(start));
    }

    #[test]
    fn start_v6_p2sh_roundtrip() {
        let start = Start {
            collateral_pubkey: None,
            redeem_script: Some(vec![0x51; 24]),
            ..sample_start(Some(features::P2SH), 6)
        };
        assert_eq!(roundtrip_start(&start), Operation::Start(start));
    }

    #[test]
    fn start_v6_delegates_roundtrip() {
        let start = Start {
            delegate_keys: vec![vec![0x04; 33], vec![0x05; 33]],
            ..sample_start(Some(features::NORMAL | features::DELEGATES), 6)
        };
        assert_eq!(roundtrip_start(&start), Operation::Start(start));
    }

    #[test]
    fn start_txid_ignores_signature_and_delegates() {
        let start = sample_start(Some(features::NORMAL | features::DELEGATES), 6);
        let mut resigned = start.clone();
        resigned.signature = vec![0x42; 71];
        resigned.delegate_keys = vec![vec![0x09; 33]];

        assert_eq!(start.txid(), resigned.txid());

        // The collateral is hashed, so a different outpoint changes the txid.
        let mut moved = start;
        moved.collateral.index = 2;
        assert_ne!(moved.txid(), resigned.txid());
    }

    #[test]
    fn confirm_roundtrip_and_txid_excludes_signatures() {
        let confirm = Confirm {
            version: 6,
            feature_flags: Some(features::NORMAL),
            collateral: OutPoint {
                hash: Hash([0xAA; 32]),
                index: 0,
            },
            sig_time: 1_660_000_000,
            benchmark_tier: 3,
            benchmark_sig_time: 1_660_000_100,
            update_type: 0,
            ip: "203.0.113.7:16125".to_string(),
            signature: vec![0x11; 65],
            benchmark_signature: vec![0x22; 65],
        };

        let mut body = confirm.feature_flags.unwrap().to_le_bytes().to_vec();
        serialize_confirm_body(&confirm, &mut body).unwrap();

        let mut cursor = ByteCursor::new(&body);
        let parsed = parse(&mut cursor, 6).unwrap();
        assert!(cursor.is_empty());
        assert_eq!(parsed, Operation::Confirm(confirm.clone()));

        let mut resigned = confirm.clone();
        resigned.signature = vec![0x77; 65];
        resigned.benchmark_signature = vec![0x88; 65];
        assert_eq!(confirm.txid(), resigned.txid());

        let mut changed = confirm;
        changed.ip = "203.0.113.8:16125".to_string();
        assert_ne!(changed.txid(), resigned.txid());
    }

    #[test]
    fn unknown_n_type_is_rejected() {
        // version 5, nType 3
        let body = [0x03u8];
        let mut cursor = ByteCursor::new(&body);

        assert!(matches!(
            parse(&mut cursor, 5),
            Err(ParseError::Malformed {
                field: "fluxnode operation type",
                ..
            })
        ));
    }
}
