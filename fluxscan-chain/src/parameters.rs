//! Chain parameters and activation regimes.

use serde::{Deserialize, Serialize};

use crate::amount::{Amount, COIN};

/// The first block version that carries a proof-of-node header.
pub const PON_MIN_BLOCK_VERSION: u32 = 100;

/// An address format network.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

/// One Equihash parameter era: from `activation_height` on, solutions are
/// at most `max_solution_len` bytes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct EquihashRegime {
    pub activation_height: u32,
    pub max_solution_len: usize,
}

/// Consensus-layout parameters the parser and indexer need.
///
/// The Equihash regime boundaries changed twice on mainnet as the chain
/// switched parameter sets; they are configuration, not constants, so a
/// deployment against a fork or testnet can override them.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkParams {
    pub network: Network,

    /// Solution-length eras in ascending activation order.
    pub equihash_regimes: Vec<EquihashRegime>,

    /// The deepest reorg the indexer will follow before halting.
    pub max_reorg_depth: u32,

    /// Optional deeper reorg bound during the PoN stabilization window,
    /// as `(start_height, end_height, depth)`.
    pub pon_reorg_window: Option<(u32, u32, u32)>,
}

impl Default for NetworkParams {
    fn default() -> Self {
        NetworkParams::mainnet()
    }
}

impl NetworkParams {
    pub fn mainnet() -> Self {
        NetworkParams {
            network: Network::Mainnet,
            equihash_regimes: vec![
                // Equihash (200, 9)
                EquihashRegime {
                    activation_height: 0,
                    max_solution_len: 1344,
                },
                // Equihash (144, 5)
                EquihashRegime {
                    activation_height: 125_100,
                    max_solution_len: 100,
                },
                // ZelHash (125, 4)
                EquihashRegime {
                    activation_height: 372_500,
                    max_solution_len: 52,
                },
            ],
            max_reorg_depth: 100,
            pon_reorg_window: Some((2_020_000, 2_025_000, 5_000)),
        }
    }

    /// The maximum Equihash solution length at `height`.
    ///
    /// With no height available, the most permissive regime applies.
    pub fn max_solution_len(&self, height: Option<u32>) -> usize {
        let height = match height {
            Some(height) => height,
            None => {
                return self
                    .equihash_regimes
                    .iter()
                    .map(|regime| regime.max_solution_len)
                    .max()
                    .unwrap_or(1344)
            }
        };
        self.equihash_regimes
            .iter()
            .filter(|regime| regime.activation_height <= height)
            .last()
            .map(|regime| regime.max_solution_len)
            .unwrap_or(1344)
    }

    /// The reorg depth bound in force at `height`.
    pub fn max_reorg_depth(&self, height: u32) -> u32 {
        if let Some((start, end, depth)) = self.pon_reorg_window {
            if (start..=end).contains(&height) {
                return depth;
            }
        }
        self.max_reorg_depth
    }
}

/// A fluxnode collateral tier.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Cumulus,
    Nimbus,
    Stratus,
}

impl Tier {
    /// The required collateral for this tier.
    pub const fn collateral(self) -> Amount {
        match self {
            Tier::Cumulus => Amount::from_coins(1_000),
            Tier::Nimbus => Amount::from_coins(12_500),
            Tier::Stratus => Amount::from_coins(40_000),
        }
    }

    /// Recognize a tier from a collateral UTXO's value, with a one-coin
    /// tolerance either way.
    pub fn from_collateral(value: Amount) -> Option<Tier> {
        [Tier::Cumulus, Tier::Nimbus, Tier::Stratus]
            .into_iter()
            .find(|tier| {
                (value.units() - tier.collateral().units()).abs() <= COIN
            })
    }

    /// The tier encoded in a confirmation's benchmark field.
    pub fn from_benchmark_code(code: i8) -> Option<Tier> {
        match code {
            1 => Some(Tier::Cumulus),
            2 => Some(Tier::Nimbus),
            3 => Some(Tier::Stratus),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Tier::Cumulus => "CUMULUS",
            Tier::Nimbus => "NIMBUS",
            Tier::Stratus => "STRATUS",
        }
    }
}
