//! Balance aggregation.

use std::collections::BTreeMap;

use lexledger_shared::types::CurrencyCode;
use rust_decimal::Decimal;

use super::error::AdvanceError;
use super::types::{Advance, AdvanceStatus, BalanceSummary, CurrencyBalance};

/// Sums remaining balances per currency.
///
/// Only live, balance-tracked entries that have not been refunded count.
/// Depleted entries contribute zero, so they are harmless either way.
pub struct BalanceAggregator;

impl BalanceAggregator {
    /// Returns true if the entry contributes to a balance.
    #[must_use]
    pub fn counts(advance: &Advance) -> bool {
        advance.is_live()
            && advance.kind.is_balance_tracked()
            && advance.status != AdvanceStatus::Refunded
    }

    /// Builds a per-currency summary, ordered by currency code.
    ///
    /// When `currency` is set the summary always has exactly one row for it,
    /// zero if nothing matched.
    ///
    /// # Errors
    ///
    /// Returns `AdvanceError::AmountOverflow` if a currency total leaves the
    /// decimal range.
    pub fn summarize<'a, I>(
        entries: I,
        currency: Option<&CurrencyCode>,
    ) -> Result<BalanceSummary, AdvanceError>
    where
        I: IntoIterator<Item = &'a Advance>,
    {
        let mut totals: BTreeMap<CurrencyCode, Decimal> = BTreeMap::new();
        if let Some(code) = currency {
            totals.insert(code.clone(), Decimal::ZERO);
        }

        for advance in entries {
            if !Self::counts(advance) {
                continue;
            }
            if currency.is_some_and(|code| code != &advance.currency) {
                continue;
            }
            let total = totals.entry(advance.currency.clone()).or_default();
            *total = total
                .checked_add(advance.balance_remaining)
                .ok_or_else(|| AdvanceError::AmountOverflow(advance.currency.clone()))?;
        }

        Ok(BalanceSummary {
            balances: totals
                .into_iter()
                .map(|(currency, balance)| CurrencyBalance { currency, balance })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advance::types::AdvanceKind;
    use chrono::{NaiveDate, Utc};
    use lexledger_shared::types::{AdvanceId, ClientId};
    use rust_decimal_macros::dec;

    fn entry(kind: AdvanceKind, currency: &str, balance: Decimal) -> Advance {
        let now = Utc::now();
        Advance {
            id: AdvanceId::new(),
            kind,
            client_id: Some(ClientId::new()),
            matter_id: None,
            lawyer_id: None,
            amount: dec!(1000.00),
            currency: currency.parse().unwrap(),
            balance_remaining: balance,
            status: AdvanceStatus::Active,
            date_received: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            description: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn test_sums_per_currency_in_code_order() {
        let entries = vec![
            entry(AdvanceKind::ClientRetainer, "USD", dec!(600.00)),
            entry(AdvanceKind::ClientRetainer, "EUR", dec!(50.00)),
            entry(AdvanceKind::ClientRetainer, "USD", dec!(400.00)),
        ];
        let summary = BalanceAggregator::summarize(&entries, None).unwrap();
        assert_eq!(summary.balances.len(), 2);
        assert_eq!(summary.balances[0].currency.as_str(), "EUR");
        assert_eq!(summary.balances[0].balance, dec!(50.00));
        assert_eq!(summary.balances[1].balance, dec!(1000.00));
    }

    #[test]
    fn test_skips_refunded_deleted_and_fee_payments() {
        let mut refunded = entry(AdvanceKind::ClientRetainer, "USD", dec!(100.00));
        refunded.status = AdvanceStatus::Refunded;
        let mut deleted = entry(AdvanceKind::ClientRetainer, "USD", dec!(100.00));
        deleted.deleted_at = Some(Utc::now());
        let fee = entry(AdvanceKind::FeePaymentFixed, "USD", Decimal::ZERO);
        let live = entry(AdvanceKind::ClientRetainer, "USD", dec!(25.00));

        let usd: CurrencyCode = "USD".parse().unwrap();
        let summary =
            BalanceAggregator::summarize(&[refunded, deleted, fee, live], Some(&usd)).unwrap();
        assert_eq!(summary.total(&usd), dec!(25.00));
    }

    #[test]
    fn test_requested_currency_always_present() {
        let entries = vec![entry(AdvanceKind::ClientRetainer, "EUR", dec!(10.00))];
        let usd: CurrencyCode = "USD".parse().unwrap();
        let summary = BalanceAggregator::summarize(&entries, Some(&usd)).unwrap();
        assert_eq!(summary.balances.len(), 1);
        assert_eq!(summary.balances[0].currency, usd);
        assert_eq!(summary.balances[0].balance, Decimal::ZERO);
    }

    #[test]
    fn test_total_past_decimal_range_is_an_error() {
        let entries = vec![
            entry(AdvanceKind::ClientRetainer, "USD", Decimal::MAX),
            entry(AdvanceKind::ClientRetainer, "USD", dec!(1.00)),
        ];
        let err = BalanceAggregator::summarize(&entries, None).unwrap_err();
        assert!(matches!(err, AdvanceError::AmountOverflow(code) if code.as_str() == "USD"));
    }

    #[test]
    fn test_empty_is_empty() {
        let summary = BalanceAggregator::summarize(std::iter::empty(), None).unwrap();
        assert!(summary.balances.is_empty());
    }
}
