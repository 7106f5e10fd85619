//! Shard weight lists loaded from configuration.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, ToolkitError};
use crate::shard::{Shard, ShardRouter};

// == Shard Weights ==
/// Ordered `(name, weight)` pairs, written as `name:weight,name:weight`.
///
/// A bare name without `:weight` gets weight 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardWeights(Vec<(String, u64)>);

impl ShardWeights {
    pub fn new(entries: Vec<(String, u64)>) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &[(String, u64)] {
        &self.0
    }

    pub fn total(&self) -> u64 {
        self.0.iter().fold(0u64, |sum, (_, w)| sum.saturating_add(*w))
    }

    /// Builds a router, creating each backend handle from its name.
    pub fn build_router<H, F>(&self, mut connect: F) -> Result<ShardRouter<H>>
    where
        F: FnMut(&str) -> Result<H>,
    {
        let shards = self
            .0
            .iter()
            .map(|(name, weight)| Ok(Shard::new(name.clone(), *weight, connect(name)?)))
            .collect::<Result<Vec<_>>>()?;
        ShardRouter::new(shards)
    }
}

impl FromStr for ShardWeights {
    type Err = ToolkitError;

    fn from_str(s: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, weight) = match part.split_once(':') {
                Some((name, weight)) => {
                    let weight = weight.trim().parse::<u64>().map_err(|_| {
                        ToolkitError::InvalidConfig(format!("invalid weight in shard entry '{part}'"))
                    })?;
                    (name.trim(), weight)
                }
                None => (part, 1),
            };
            if name.is_empty() {
                return Err(ToolkitError::InvalidConfig(format!(
                    "missing name in shard entry '{part}'"
                )));
            }
            entries.push((name.to_string(), weight));
        }
        Ok(Self(entries))
    }
}

impl fmt::Display for ShardWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, weight)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{name}:{weight}")?;
        }
        Ok(())
    }
}
