use std::fmt;

use crate::parameters::Network;

use super::Address;

// Script opcodes the classifier needs.
const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xA9;
const OP_EQUAL: u8 = 0x87;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xAC;
const OP_RETURN: u8 = 0x6A;

/// An encoding of a transparent lock script.
#[derive(Clone, Default, Eq, PartialEq, Hash)]
pub struct Script(pub Vec<u8>);

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Script")
            .field(&hex::encode(&self.0))
            .finish()
    }
}

/// The standard form of a lock script.
///
/// The two hash-based forms are reconstructible: the address alone is
/// enough to regenerate the script bytes, so the store keeps an empty
/// `script_pubkey` for them.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ScriptType {
    PayToPublicKeyHash,
    PayToScriptHash,
    PayToPublicKey,
    NullData,
    NonStandard,
}

impl ScriptType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ScriptType::PayToPublicKeyHash => "pubkeyhash",
            ScriptType::PayToScriptHash => "scripthash",
            ScriptType::PayToPublicKey => "pubkey",
            ScriptType::NullData => "nulldata",
            ScriptType::NonStandard => "nonstandard",
        }
    }

    /// Whether the script bytes can be regenerated from the address alone.
    pub const fn is_reconstructible(self) -> bool {
        matches!(
            self,
            ScriptType::PayToPublicKeyHash | ScriptType::PayToScriptHash
        )
    }

    pub fn from_str_name(name: &str) -> ScriptType {
        match name {
            "pubkeyhash" => ScriptType::PayToPublicKeyHash,
            "scripthash" => ScriptType::PayToScriptHash,
            "pubkey" => ScriptType::PayToPublicKey,
            "nulldata" => ScriptType::NullData,
            _ => ScriptType::NonStandard,
        }
    }
}

impl Script {
    /// Classify this script's standard form.
    pub fn script_type(&self) -> ScriptType {
        let bytes = &self.0;
        if self.p2pkh_hash().is_some() {
            ScriptType::PayToPublicKeyHash
        } else if self.p2sh_hash().is_some() {
            ScriptType::PayToScriptHash
        } else if self.p2pk_key().is_some() {
            ScriptType::PayToPublicKey
        } else if bytes.first() == Some(&OP_RETURN) {
            ScriptType::NullData
        } else {
            ScriptType::NonStandard
        }
    }

    /// The address this script pays, for the standard address-bearing forms.
    ///
    /// Pay-to-public-key scripts resolve to the same address their key's
    /// pay-to-public-key-hash form would use.
    pub fn address(&self, network: Network) -> Option<Address> {
        if let Some(hash) = self.p2pkh_hash() {
            Some(Address::PayToPublicKeyHash {
                network,
                pub_key_hash: hash,
            })
        } else if let Some(hash) = self.p2sh_hash() {
            Some(Address::PayToScriptHash {
                network,
                script_hash: hash,
            })
        } else {
            self.p2pk_key().map(|key| Address::PayToPublicKeyHash {
                network,
                pub_key_hash: Address::hash_payload(key),
            })
        }
    }

    // OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG
    fn p2pkh_hash(&self) -> Option<[u8; 20]> {
        let bytes = &self.0;
        if bytes.len() == 25
            && bytes[0] == OP_DUP
            && bytes[1] == OP_HASH160
            && bytes[2] == 0x14
            && bytes[23] == OP_EQUALVERIFY
            && bytes[24] == OP_CHECKSIG
        {
            let mut hash = [0u8; 20];
            hash.copy_from_slice(&bytes[3..23]);
            Some(hash)
        } else {
            None
        }
    }

    // OP_HASH160 <20> OP_EQUAL
    fn p2sh_hash(&self) -> Option<[u8; 20]> {
        let bytes = &self.0;
        if bytes.len() == 23 && bytes[0] == OP_HASH160 && bytes[1] == 0x14 && bytes[22] == OP_EQUAL
        {
            let mut hash = [0u8; 20];
            hash.copy_from_slice(&bytes[2..22]);
            Some(hash)
        } else {
            None
        }
    }

    // <33|65-byte key push> OP_CHECKSIG
    fn p2pk_key(&self) -> Option<&[u8]> {
        let bytes = &self.0;
        match bytes.len() {
            35 if bytes[0] == 33 && bytes[34] == OP_CHECKSIG => Some(&bytes[1..34]),
            67 if bytes[0] == 65 && bytes[66] == OP_CHECKSIG => Some(&bytes[1..66]),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p2pkh_script(hash: [u8; 20]) -> Script {
        let mut bytes = vec![OP_DUP, OP_HASH160, 0x14];
        bytes.extend_from_slice(&hash);
        bytes.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        Script(bytes)
    }

    #[test]
    fn classify_p2pkh() {
        let script = p2pkh_script([0x42; 20]);

        assert_eq!(script.script_type(), ScriptType::PayToPublicKeyHash);
        assert!(script.script_type().is_reconstructible());

        let address = script.address(Network::Mainnet).unwrap();
        assert_eq!(address.to_lock_script(), script);
    }

    #[test]
    fn classify_p2sh() {
        let mut bytes = vec![OP_HASH160, 0x14];
        bytes.extend_from_slice(&[0x37; 20]);
        bytes.push(OP_EQUAL);
        let script = Script(bytes);

        assert_eq!(script.script_type(), ScriptType::PayToScriptHash);

        let address = script.address(Network::Mainnet).unwrap();
        assert_eq!(address.to_lock_script(), script);
    }

    #[test]
    fn classify_p2pk_compressed() {
        let mut bytes = vec![33];
        bytes.extend_from_slice(&[0x02; 33]);
        bytes.push(OP_CHECKSIG);
        let script = Script(bytes);

        assert_eq!(script.script_type(), ScriptType::PayToPublicKey);
        // P2PK resolves to an address but can't be rebuilt from it.
        assert!(!script.script_type().is_reconstructible());
        assert!(script.address(Network::Mainnet).is_some());
    }

    #[test]
    fn classify_nulldata_and_nonstandard() {
        assert_eq!(
            Script(vec![OP_RETURN, 0x04, 0xDE, 0xAD, 0xBE, 0xEF]).script_type(),
            ScriptType::NullData
        );
        assert_eq!(Script(vec![0x51]).script_type(), ScriptType::NonStandard);
        assert_eq!(Script(Vec::new()).script_type(), ScriptType::NonStandard);

        assert!(Script(vec![0x51]).address(Network::Mainnet).is_none());
    }

    #[test]
    fn script_type_names_roundtrip() {
        for script_type in [
            ScriptType::PayToPublicKeyHash,
            ScriptType::PayToScriptHash,
            ScriptType::PayToPublicKey,
            ScriptType::NullData,
            ScriptType::NonStandard,
        ] {
            assert_eq!(ScriptType::from_str_name(script_type.as_str()), script_type);
        }
    }
}
