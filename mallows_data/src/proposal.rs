use std::fmt;
use std::str::FromStr;

use mallows_stats::ParseError;
use serde::{Deserialize, Serialize};

/// How latent complete rankings are proposed for partially ranked users
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LatentRankProposal {
    /// Uniformly random placement of the unranked items
    Uniform,
    /// Sequential placement of the unranked items near their consensus
    /// ranks. Only defined for a single cluster.
    Pseudo,
}

impl Default for LatentRankProposal {
    fn default() -> Self {
        Self::Uniform
    }
}

impl fmt::Display for LatentRankProposal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Uniform => "uniform",
            Self::Pseudo => "pseudo",
        };
        write!(f, "{s}")
    }
}

impl FromStr for LatentRankProposal {
    type Err = ParseError<String>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uniform" => Ok(Self::Uniform),
            "pseudo" => Ok(Self::Pseudo),
            _ => Err(ParseError(s.to_owned())),
        }
    }
}
