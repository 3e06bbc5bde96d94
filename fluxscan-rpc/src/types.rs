//! Response shapes for the daemon RPC methods the indexer consumes.
//!
//! Fields the ingestion pipeline never reads are left out; serde ignores
//! the rest of the daemon's output.

use serde::Deserialize;

/// `getblock <hash> 2`: a block with embedded transaction objects.
#[derive(Clone, Debug, Deserialize)]
pub struct VerboseBlock {
    pub hash: String,
    pub height: u32,
    pub version: u32,
    pub merkleroot: String,
    pub time: u32,
    pub size: u64,
    pub difficulty: f64,
    pub chainwork: String,
    #[serde(default)]
    pub previousblockhash: Option<String>,
    #[serde(default)]
    pub nextblockhash: Option<String>,
    pub tx: Vec<VerboseTx>,
}

/// A transaction object embedded in a verbose block.
///
/// The daemon omits `hex` for some transaction kinds (fluxnode operations
/// among them); ingestion never relies on it and slices the raw block
/// instead.
#[derive(Clone, Debug, Deserialize)]
pub struct VerboseTx {
    pub txid: String,
    pub version: u32,
    #[serde(default)]
    pub hex: Option<String>,
    #[serde(default)]
    pub vin: Vec<VerboseVin>,
    #[serde(default)]
    pub vout: Vec<VerboseVout>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VerboseVin {
    #[serde(default)]
    pub coinbase: Option<String>,
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub vout: Option<u32>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VerboseVout {
    pub value: f64,
    pub n: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: VerboseScriptPubKey,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VerboseScriptPubKey {
    pub hex: String,
    #[serde(rename = "type")]
    pub script_type: String,
    #[serde(default)]
    pub addresses: Vec<String>,
}

/// `getblockchaininfo`.
#[derive(Clone, Debug, Deserialize)]
pub struct BlockchainInfo {
    pub chain: String,
    pub blocks: u32,
    pub headers: u32,
    pub bestblockhash: String,
    pub difficulty: f64,
    #[serde(default)]
    pub verificationprogress: f64,
}

/// `getnetworkinfo`.
#[derive(Clone, Debug, Deserialize)]
pub struct NetworkInfo {
    pub version: u64,
    pub subversion: String,
    pub protocolversion: u64,
    pub connections: u64,
}

/// `getmempoolinfo`.
#[derive(Clone, Debug, Deserialize)]
pub struct MempoolInfo {
    pub size: u64,
    pub bytes: u64,
    #[serde(default)]
    pub usage: u64,
}
