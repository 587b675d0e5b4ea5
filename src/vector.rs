use std::collections::BTreeMap;
use std::fmt::{self, Debug, Display};
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::user_id::UserId;

/// Error produced when parsing the canonical `"u1:n1;u2:n2"` vector grammar.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VectorParseError {
    #[error("malformed vector component `{0}`, expected `user:count`")]
    MalformedComponent(String),

    #[error("invalid user id in component `{0}`")]
    InvalidUser(String),

    #[error("invalid count in component `{0}`")]
    InvalidCount(String),
}

/// A logical clock: one monotonically increasing counter per user.
///
/// A user absent from the map reads as `0`; zero-valued entries are
/// semantically absent and are never stored, so two vectors with the same
/// observable components compare structurally equal.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Vector(BTreeMap<UserId, u64>);

impl Vector {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Reads a user's component, defaulting to 0 when absent.
    #[must_use]
    pub fn get(&self, user: UserId) -> u64 { self.0.get(&user).copied().unwrap_or(0) }

    /// Returns the users with a non-zero component, sorted ascending by id.
    #[must_use]
    pub fn users(&self) -> impl Iterator<Item = UserId> + '_ { self.0.keys().copied() }

    /// Returns a new vector with `user`'s component adjusted by `by`.
    ///
    /// Panics in debug builds if the adjustment would make a component
    /// negative; that indicates a caller bug, not a recoverable error.
    #[must_use]
    pub fn incr(&self, user: UserId, by: i64) -> Self {
        let current = self.get(user) as i64;
        let updated = current + by;
        debug_assert!(updated >= 0, "vector component for {user} would go negative");
        let updated = updated.max(0) as u64;

        let mut map = self.0.clone();
        if updated == 0 {
            map.remove(&user);
        } else {
            map.insert(user, updated);
        }
        Vector(map)
    }

    /// Componentwise sum.
    #[must_use]
    pub fn add(&self, other: &Vector) -> Self {
        let mut result = self.clone();
        for user in other.users() {
            result = result.incr(user, other.get(user) as i64);
        }
        result
    }

    /// `true` iff `self[u] <= other[u]` for every user `u`.
    #[must_use]
    pub fn causally_before(&self, other: &Vector) -> bool {
        self.0.keys().chain(other.0.keys()).all(|&user| self.get(user) <= other.get(user))
    }

    #[must_use]
    pub fn equals(&self, other: &Vector) -> bool {
        self.causally_before(other) && other.causally_before(self)
    }

    /// Componentwise max; the join of the causal-order lattice.
    #[must_use]
    pub fn least_common_successor(a: &Vector, b: &Vector) -> Self {
        let mut result = Vector::new();
        for &user in a.0.keys().chain(b.0.keys()) {
            let max = a.get(user).max(b.get(user));
            if max > 0 {
                result.0.insert(user, max);
            }
        }
        result
    }
}

impl Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (user, count) in &self.0 {
            if !first {
                write!(f, ";")?;
            }
            write!(f, "{user}:{count}")?;
            first = false;
        }
        Ok(())
    }
}

impl Debug for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Vector({self})") }
}

impl FromStr for Vector {
    type Err = VectorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut map = BTreeMap::new();
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Vector(map));
        }

        for component in trimmed.split(';') {
            let (user_part, count_part) = component
                .split_once(':')
                .ok_or_else(|| VectorParseError::MalformedComponent(component.to_owned()))?;

            let user: UserId = user_part
                .parse()
                .map_err(|_| VectorParseError::InvalidUser(component.to_owned()))?;
            let count: u64 = count_part
                .parse()
                .map_err(|_| VectorParseError::InvalidCount(component.to_owned()))?;

            if count > 0 {
                map.insert(user, count);
            }
        }

        Ok(Vector(map))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    #[test]
    fn incr_is_additive() {
        let v = Vector::new().incr(UserId(1), 2).incr(UserId(1), 3);
        assert_eq!(v.get(UserId(1)), 5);
    }

    #[test]
    fn causally_before_is_reflexive() {
        let v = Vector::new().incr(UserId(1), 4);
        assert!(v.causally_before(&v));
    }

    #[test]
    fn equals_requires_mutual_causal_order() {
        let a = Vector::new().incr(UserId(1), 1).incr(UserId(2), 2);
        let b = Vector::new().incr(UserId(2), 2).incr(UserId(1), 1);
        assert!(a.equals(&b));

        let c = a.incr(UserId(1), 1);
        assert!(!a.equals(&c));
        assert!(a.causally_before(&c));
    }

    #[test]
    fn least_common_successor_is_componentwise_max() {
        let a = Vector::new().incr(UserId(1), 5).incr(UserId(2), 1);
        let b = Vector::new().incr(UserId(1), 2).incr(UserId(2), 7);
        let lcs = Vector::least_common_successor(&a, &b);
        assert_eq!(lcs.get(UserId(1)), 5);
        assert_eq!(lcs.get(UserId(2)), 7);
    }

    #[test_case("1:2;3:4", &[(1, 2), (3, 4)])]
    #[test_case("", &[])]
    #[test_case("7:1", &[(7, 1)])]
    fn parses_canonical_form(input: &str, expected: &[(u64, u64)]) {
        let vector: Vector = input.parse().unwrap();
        for &(user, count) in expected {
            assert_eq!(vector.get(UserId(user)), count);
        }
    }

    #[test]
    fn round_trips_through_display() {
        let v = Vector::new().incr(UserId(3), 4).incr(UserId(1), 2);
        let printed = v.to_string();
        assert_eq!(printed, "1:2;3:4");
        let parsed: Vector = printed.parse().unwrap();
        assert!(parsed.equals(&v));
    }

    #[test]
    fn rejects_malformed_component() {
        assert!("1-2".parse::<Vector>().is_err());
        assert!("x:2".parse::<Vector>().is_err());
        assert!("1:y".parse::<Vector>().is_err());
    }
}
