//! Domain model shared by the engine and the client crate.

use crate::Error;
use serde::{Deserialize, Serialize};

/// Presentation status of a list, used for grouping on the board.
///
/// Persisted as an integer tag (`Todo = 0`, `Waiting = 1`, `Done = 2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum CardStatus {
    Todo,
    Waiting,
    Done,
}

impl From<CardStatus> for u8 {
    fn from(status: CardStatus) -> u8 {
        match status {
            CardStatus::Todo => 0,
            CardStatus::Waiting => 1,
            CardStatus::Done => 2,
        }
    }
}

impl TryFrom<u8> for CardStatus {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self, Error> {
        match tag {
            0 => Ok(CardStatus::Todo),
            1 => Ok(CardStatus::Waiting),
            2 => Ok(CardStatus::Done),
            other => Err(Error::InvalidCardStatus(other)),
        }
    }
}
