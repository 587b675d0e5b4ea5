use core::fmt::{self, Display};
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifies a collaborator. Thin newtype so the wire grammar, the log, and
/// the `Vector` map all agree on ordering and hashing without accidentally
/// mixing user ids up with unrelated `u64`s.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct UserId(pub u64);

impl Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl FromStr for UserId {
    type Err = core::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> { Ok(UserId(s.parse()?)) }
}

impl From<u64> for UserId {
    fn from(value: u64) -> Self { UserId(value) }
}
