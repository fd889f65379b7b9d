use serde::{Serialize, Deserialize};
use std::collections::HashMap;

/// Direction of a single vote. Travels as `"+"` / `"-"` on the wire; reading
/// accepts whatever [`TryFrom<&str>`] accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Direction {
    #[serde(rename = "+")]
    Up,
    #[serde(rename = "-")]
    Down,
}

impl Direction {
    pub const fn weight(self) -> i64 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "+",
            Direction::Down => "-",
        }
    }
}

impl TryFrom<&str> for Direction {
    type Error = String;

    fn try_from(v: &str) -> Result<Self, String> {
        match v.trim() {
            "+" => Ok(Direction::Up),
            "-" => Ok(Direction::Down),
            s if s.eq_ignore_ascii_case("up") => Ok(Direction::Up),
            s if s.eq_ignore_ascii_case("down") => Ok(Direction::Down),
            _ => Err(v.to_string()),
        }
    }
}

impl TryFrom<String> for Direction {
    type Error = String;

    fn try_from(v: String) -> Result<Self, String> {
        Direction::try_from(v.as_str())
    }
}

/// Votes cast on one entity, keyed by voter. A voter holds at most one direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteRecord {
    votes: HashMap<String, Direction>,
}

impl VoteRecord {
    pub fn get(&self, voter_id: &str) -> Option<Direction> {
        self.votes.get(voter_id).copied()
    }

    pub fn insert(&mut self, voter_id: impl Into<String>, direction: Direction) -> Option<Direction> {
        self.votes.insert(voter_id.into(), direction)
    }

    pub fn remove(&mut self, voter_id: &str) -> Option<Direction> {
        self.votes.remove(voter_id)
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    pub fn total(&self) -> i64 {
        self.votes.values().fold(0, |total, direction| total + direction.weight())
    }

    pub fn tally_for(&self, voter_id: &str) -> Tally {
        Tally {
            total: self.total(),
            voted: self.get(voter_id),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, Direction)> for VoteRecord {
    fn from_iter<I: IntoIterator<Item = (K, Direction)>>(iter: I) -> Self {
        Self {
            votes: iter.into_iter().map(|(k, d)| (k.into(), d)).collect(),
        }
    }
}

/// Every vote record, keyed by entity. This is the whole persisted state.
pub type Ledger = HashMap<String, VoteRecord>;

/// Net score of an entity from the perspective of one voter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub total: i64,
    #[serde(with = "voted_flag")]
    pub voted: Option<Direction>,
}

// `voted` is the caller's direction, or literal `false` when they have not voted.
mod voted_flag {
    use super::Direction;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(voted: &Option<Direction>, serializer: S) -> Result<S::Ok, S::Error> {
        match voted {
            Some(direction) => direction.serialize(serializer),
            None => serializer.serialize_bool(false),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Direction>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Flag {
            Cast(Direction),
            NotCast(bool),
        }

        match Flag::deserialize(deserializer)? {
            Flag::Cast(direction) => Ok(Some(direction)),
            Flag::NotCast(false) => Ok(None),
            Flag::NotCast(true) => Err(D::Error::custom("voted must be a direction or false")),
        }
    }
}
