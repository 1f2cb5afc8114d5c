//! Reward confirmations.

use serde::{Deserialize, Serialize};

use super::{AccountContribution, ConfirmationNumber, Dining};

/// Receipt for a reward credited to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardConfirmation {
    /// Number identifying the recorded reward.
    pub confirmation_number: ConfirmationNumber,
    /// Contribution that was made.
    pub contribution: AccountContribution,
    /// Dining event that triggered the reward.
    pub dining: Dining,
}
