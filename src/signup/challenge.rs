//! Arithmetic human check. Generation is a pure function of the RNG so a new
//! challenge only appears when the flow asks for one.

use rand::Rng;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct HumanChallenge {
    pub first: u8,
    pub second: u8,
    #[serde(skip)]
    pub answer: String,
}

impl HumanChallenge {
    #[must_use]
    pub fn new(first: u8, second: u8) -> Self {
        Self {
            first,
            second,
            answer: (u16::from(first) + u16::from(second)).to_string(),
        }
    }

    /// Question shown to the user.
    #[must_use]
    pub fn question(&self) -> String {
        format!("What is {} + {}?", self.first, self.second)
    }

    /// Compares the trimmed answer with the expected decimal sum.
    #[must_use]
    pub fn accepts(&self, answer: &str) -> bool {
        answer.trim() == self.answer
    }
}

/// Two small random operands: the first in `3..=8`, the second in `2..=7`.
pub fn new_challenge<R: Rng + ?Sized>(rng: &mut R) -> HumanChallenge {
    HumanChallenge::new(rng.gen_range(3..=8), rng.gen_range(2..=7))
}
