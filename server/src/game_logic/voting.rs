use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const SKIP: &str = "skip";

/// A ballot: another player's id, or the `"skip"` sentinel.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub enum VoteChoice {
    Skip,
    Player(Uuid),
}

impl fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteChoice::Skip => f.write_str(SKIP),
            VoteChoice::Player(id) => write!(f, "{}", id),
        }
    }
}

impl FromStr for VoteChoice {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case(SKIP) {
            Ok(VoteChoice::Skip)
        } else {
            Uuid::parse_str(trimmed).map(VoteChoice::Player)
        }
    }
}

impl TryFrom<String> for VoteChoice {
    type Error = uuid::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VoteChoice> for String {
    fn from(choice: VoteChoice) -> Self {
        choice.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Ejected(Uuid),
    /// Two or more choices share the highest count.
    Tie,
    /// Nobody voted, or skip won outright.
    NoEjection,
}

pub fn tally<'a, I>(ballots: I) -> VoteOutcome
where
    I: IntoIterator<Item = &'a VoteChoice>,
{
    let mut counts: HashMap<VoteChoice, usize> = HashMap::new();
    for ballot in ballots {
        *counts.entry(*ballot).or_insert(0) += 1;
    }

    let Some(max) = counts.values().copied().max() else {
        return VoteOutcome::NoEjection;
    };

    let mut leaders = counts
        .into_iter()
        .filter(|(_, count)| *count == max)
        .map(|(choice, _)| choice);

    match (leaders.next(), leaders.next()) {
        (Some(VoteChoice::Player(id)), None) => VoteOutcome::Ejected(id),
        (Some(VoteChoice::Skip), None) | (None, _) => VoteOutcome::NoEjection,
        (Some(_), Some(_)) => VoteOutcome::Tie,
    }
}
