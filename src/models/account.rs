//! Member accounts, their beneficiaries, and reward contributions.

use serde::{Deserialize, Serialize};

use super::{AccountNumber, MonetaryAmount, Percentage};
use crate::error::{Result, RewardsError};

/// A person who receives a share of every contribution made to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Beneficiary {
    /// Beneficiary name, unique within its account.
    pub name: String,
    /// Share of each contribution allocated to this beneficiary.
    pub allocation_percentage: Percentage,
    /// Total savings accumulated so far.
    #[serde(default)]
    pub savings: MonetaryAmount,
}

impl Beneficiary {
    /// Creates a beneficiary with no savings.
    #[inline]
    #[must_use]
    pub fn new<N: Into<String>>(name: N, allocation_percentage: Percentage) -> Self {
        Self {
            name: name.into(),
            allocation_percentage,
            savings: MonetaryAmount::zero(),
        }
    }
}

/// A member account in the reward network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Account number.
    pub number: AccountNumber,
    /// Account holder name.
    pub name: String,
    /// Credit cards charged to this account.
    #[serde(default)]
    pub credit_cards: Vec<String>,
    /// Beneficiaries sharing the account's rewards.
    #[serde(default)]
    pub beneficiaries: Vec<Beneficiary>,
}

impl Account {
    /// Creates an account with no credit cards and no beneficiaries.
    #[inline]
    #[must_use]
    pub fn new<N: Into<String>>(number: AccountNumber, name: N) -> Self {
        Self {
            number,
            name: name.into(),
            credit_cards: Vec::new(),
            beneficiaries: Vec::new(),
        }
    }

    /// Associates a credit card number with the account.
    #[inline]
    pub fn add_credit_card<C: Into<String>>(&mut self, card: C) {
        let card = card.into();
        if !self.credit_cards.contains(&card) {
            self.credit_cards.push(card);
        }
    }

    /// Returns `true` if the card is charged to this account.
    #[inline]
    #[must_use]
    pub fn has_credit_card(&self, card: &str) -> bool {
        self.credit_cards.iter().any(|known| known == card)
    }

    /// Returns the beneficiary with the given name, if any.
    #[inline]
    #[must_use]
    pub fn beneficiary(&self, name: &str) -> Option<&Beneficiary> {
        self.beneficiaries.iter().find(|b| b.name == name)
    }

    /// Adds a beneficiary with an explicit allocation.
    ///
    /// # Errors
    ///
    /// Returns [`RewardsError::InvalidAccount`] if a beneficiary with the
    /// same name already exists.
    #[inline]
    pub fn add_beneficiary_with_allocation<N: Into<String>>(
        &mut self,
        name: N,
        allocation_percentage: Percentage,
    ) -> Result<()> {
        let name = name.into();
        if self.beneficiary(&name).is_some() {
            return Err(RewardsError::InvalidAccount(format!(
                "account {} already has a beneficiary named {name:?}",
                self.number
            )));
        }
        self.beneficiaries
            .push(Beneficiary::new(name, allocation_percentage));
        Ok(())
    }

    /// Adds a beneficiary without rebalancing existing allocations.
    ///
    /// The first beneficiary receives 100%, later ones 0%.
    ///
    /// # Errors
    ///
    /// Returns [`RewardsError::InvalidAccount`] if a beneficiary with the
    /// same name already exists.
    #[inline]
    pub fn add_beneficiary<N: Into<String>>(&mut self, name: N) -> Result<()> {
        let allocation = if self.beneficiaries.is_empty() {
            Percentage::one()
        } else {
            Percentage::zero()
        };
        self.add_beneficiary_with_allocation(name, allocation)
    }

    /// Removes a beneficiary and returns it.
    ///
    /// Only the sole beneficiary or one with a zero allocation can be
    /// removed; anything else would leave allocations that no longer sum to
    /// 100%.
    ///
    /// # Errors
    ///
    /// Returns [`RewardsError::NotFound`] if no such beneficiary exists, or
    /// [`RewardsError::RebalanceUnsupported`] if removing it would require
    /// redistributing its allocation.
    #[inline]
    pub fn remove_beneficiary(&mut self, name: &str) -> Result<Beneficiary> {
        let position = self
            .beneficiaries
            .iter()
            .position(|b| b.name == name)
            .ok_or_else(|| RewardsError::not_found("beneficiary", name))?;
        let sole = self.beneficiaries.len() == 1;
        let unallocated = self
            .beneficiaries
            .get(position)
            .is_some_and(|b| b.allocation_percentage.is_zero());
        if !sole && !unallocated {
            return Err(RewardsError::RebalanceUnsupported {
                beneficiary: name.to_owned(),
            });
        }
        Ok(self.beneficiaries.remove(position))
    }

    /// Returns `true` if the beneficiary allocations add up to exactly 100%.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let total: rust_decimal::Decimal = self
            .beneficiaries
            .iter()
            .map(|b| b.allocation_percentage.as_decimal())
            .sum();
        !self.beneficiaries.is_empty() && total == Percentage::one().as_decimal()
    }

    /// Splits `amount` across the beneficiaries and credits their savings.
    ///
    /// # Errors
    ///
    /// Returns [`RewardsError::InvalidAccount`] if the allocations do not
    /// add up to 100%.
    #[inline]
    pub fn make_contribution(&mut self, amount: MonetaryAmount) -> Result<AccountContribution> {
        if !self.is_valid() {
            return Err(RewardsError::InvalidAccount(format!(
                "allocations of account {} do not add up to 100%",
                self.number
            )));
        }
        let distributions = self
            .beneficiaries
            .iter_mut()
            .map(|beneficiary| {
                let share = amount * beneficiary.allocation_percentage;
                beneficiary.savings += share;
                Distribution {
                    beneficiary: beneficiary.name.clone(),
                    amount: share,
                    percentage: beneficiary.allocation_percentage,
                    total_savings: beneficiary.savings,
                }
            })
            .collect();
        Ok(AccountContribution {
            account_number: self.number.clone(),
            amount,
            distributions,
        })
    }
}

/// One beneficiary's share of an [`AccountContribution`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    /// Beneficiary that received the share.
    pub beneficiary: String,
    /// Amount credited.
    pub amount: MonetaryAmount,
    /// Allocation used to compute the amount.
    pub percentage: Percentage,
    /// Beneficiary savings after the credit.
    pub total_savings: MonetaryAmount,
}

/// The result of crediting a reward to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountContribution {
    /// Account that received the contribution.
    pub account_number: AccountNumber,
    /// Total amount contributed.
    pub amount: MonetaryAmount,
    /// Per-beneficiary breakdown.
    pub distributions: Vec<Distribution>,
}

impl AccountContribution {
    /// Returns the distribution made to the named beneficiary.
    #[inline]
    #[must_use]
    pub fn distribution(&self, beneficiary: &str) -> Option<&Distribution> {
        self.distributions
            .iter()
            .find(|d| d.beneficiary == beneficiary)
    }
}
