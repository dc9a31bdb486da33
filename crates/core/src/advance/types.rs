//! Ledger entry domain types.
//!
//! An "advance" is any entry in the advance & retainer ledger: prepaid client
//! funds, cash the firm hands to a lawyer, or a received fee payment.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use lexledger_shared::types::{
    AdvanceId, AllocationId, ClientId, CurrencyCode, LawyerId, MatterId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceKind {
    /// Client-prepaid fund against future fees.
    ClientRetainer,
    /// Client-prepaid fund earmarked for reimbursable expenses.
    ClientExpenseAdvance,
    /// Firm cash given to a lawyer.
    LawyerAdvance,
    /// Fixed-fee payment received.
    FeePaymentFixed,
    /// Consultation fee payment received.
    FeePaymentConsultation,
    /// Success fee payment received.
    FeePaymentSuccess,
    /// Milestone fee payment received.
    FeePaymentMilestone,
    /// Any other fee payment received.
    FeePaymentOther,
}

impl AdvanceKind {
    /// Every kind, in wire order.
    pub const ALL: [Self; 8] = [
        Self::ClientRetainer,
        Self::ClientExpenseAdvance,
        Self::LawyerAdvance,
        Self::FeePaymentFixed,
        Self::FeePaymentConsultation,
        Self::FeePaymentSuccess,
        Self::FeePaymentMilestone,
        Self::FeePaymentOther,
    ];

    /// Returns true if the entry holds a prepaid fund with a remaining balance.
    #[must_use]
    pub const fn is_balance_tracked(self) -> bool {
        matches!(
            self,
            Self::ClientRetainer | Self::ClientExpenseAdvance | Self::LawyerAdvance
        )
    }

    /// Returns true for the `fee_payment_*` kinds.
    #[must_use]
    pub const fn is_fee_payment(self) -> bool {
        !self.is_balance_tracked()
    }

    /// Returns true if the kind is scoped to a client (everything but lawyer advances).
    #[must_use]
    pub const fn is_client_scoped(self) -> bool {
        !matches!(self, Self::LawyerAdvance)
    }

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClientRetainer => "client_retainer",
            Self::ClientExpenseAdvance => "client_expense_advance",
            Self::LawyerAdvance => "lawyer_advance",
            Self::FeePaymentFixed => "fee_payment_fixed",
            Self::FeePaymentConsultation => "fee_payment_consultation",
            Self::FeePaymentSuccess => "fee_payment_success",
            Self::FeePaymentMilestone => "fee_payment_milestone",
            Self::FeePaymentOther => "fee_payment_other",
        }
    }
}

impl FromStr for AdvanceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown advance kind: {s}"))
    }
}

impl std::fmt::Display for AdvanceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvanceStatus {
    /// Funds available (or, for fee payments, simply recorded).
    Active,
    /// Remaining balance reached zero through deductions.
    Depleted,
    /// Funds returned to the payer; terminal.
    Refunded,
}

impl AdvanceStatus {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Depleted => "depleted",
            Self::Refunded => "refunded",
        }
    }
}

impl FromStr for AdvanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "depleted" => Ok(Self::Depleted),
            "refunded" => Ok(Self::Refunded),
            _ => Err(format!("Unknown advance status: {s}")),
        }
    }
}

impl std::fmt::Display for AdvanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advance {
    /// Entry ID.
    pub id: AdvanceId,
    /// Entry kind (immutable).
    pub kind: AdvanceKind,
    /// Client the funds belong to (immutable).
    pub client_id: Option<ClientId>,
    /// Matter the entry is scoped to (immutable).
    pub matter_id: Option<MatterId>,
    /// Lawyer holding the funds (immutable).
    pub lawyer_id: Option<LawyerId>,
    /// Original amount (immutable).
    pub amount: Decimal,
    /// Currency code (immutable, never converted).
    pub currency: CurrencyCode,
    /// Funds still available; always zero for fee payments.
    pub balance_remaining: Decimal,
    /// Lifecycle status.
    pub status: AdvanceStatus,
    /// Date the funds were received.
    pub date_received: NaiveDate,
    /// Free-text description.
    pub description: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Advance {
    /// Returns true unless the entry has been soft-deleted.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Returns the amount consumed so far.
    #[must_use]
    pub fn consumed(&self) -> Decimal {
        if self.kind.is_balance_tracked() {
            self.amount - self.balance_remaining
        } else {
            self.amount
        }
    }

    /// Deterministic deduction order: oldest receipt first, then creation, then id.
    #[must_use]
    pub fn age_order(&self, other: &Self) -> Ordering {
        self.date_received
            .cmp(&other.date_received)
            .then_with(|| self.created_at.cmp(&other.created_at))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Input for creating a ledger entry ("receive funds" or "record fee payment").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAdvance {
    /// Entry kind.
    pub kind: AdvanceKind,
    /// Client ID.
    pub client_id: Option<ClientId>,
    /// Matter ID.
    pub matter_id: Option<MatterId>,
    /// Lawyer ID.
    pub lawyer_id: Option<LawyerId>,
    /// Amount received (must be positive).
    pub amount: Decimal,
    /// Currency code.
    pub currency: String,
    /// Date received; defaults to today.
    pub date_received: Option<NaiveDate>,
    /// Free-text description.
    pub description: Option<String>,
}

/// Requested changes to an existing entry.
///
/// Descriptive fields may change freely. Financial and scoping fields are
/// accepted only when they repeat the stored value, so that a client sending
/// the whole entry back succeeds while an actual change is rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvancePatch {
    /// New description.
    pub description: Option<String>,
    /// New date received.
    pub date_received: Option<NaiveDate>,
    /// Immutable; must equal the stored value if present.
    pub kind: Option<AdvanceKind>,
    /// Immutable; must equal the stored value if present.
    pub client_id: Option<ClientId>,
    /// Immutable; must equal the stored value if present.
    pub matter_id: Option<MatterId>,
    /// Immutable; must equal the stored value if present.
    pub lawyer_id: Option<LawyerId>,
    /// Immutable; must equal the stored value if present.
    pub amount: Option<Decimal>,
    /// Immutable; must equal the stored value if present.
    pub currency: Option<String>,
}

/// Descriptive changes that survived validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataUpdate {
    /// New description; `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// New date received.
    pub date_received: Option<NaiveDate>,
}

impl MetadataUpdate {
    /// Returns true if nothing would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.date_received.is_none()
    }

    /// Applies the update to an entry.
    pub fn apply_to(&self, advance: &mut Advance, now: DateTime<Utc>) {
        if let Some(description) = &self.description {
            advance.description.clone_from(description);
        }
        if let Some(date) = self.date_received {
            advance.date_received = date;
        }
        advance.updated_at = now;
    }
}

/// Filter options for listing entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvanceFilter {
    /// Filter by client.
    pub client_id: Option<ClientId>,
    /// Filter by matter.
    pub matter_id: Option<MatterId>,
    /// Filter by lawyer.
    pub lawyer_id: Option<LawyerId>,
    /// Filter by kind.
    pub kind: Option<AdvanceKind>,
    /// Filter by status.
    pub status: Option<AdvanceStatus>,
    /// Filter by currency.
    pub currency: Option<CurrencyCode>,
    /// Received on or after.
    pub date_from: Option<NaiveDate>,
    /// Received on or before.
    pub date_to: Option<NaiveDate>,
    /// Include soft-deleted entries.
    #[serde(default)]
    pub include_deleted: bool,
}

impl AdvanceFilter {
    /// Returns true if the entry satisfies every set criterion.
    #[must_use]
    pub fn matches(&self, advance: &Advance) -> bool {
        (self.include_deleted || advance.is_live())
            && self.client_id.is_none_or(|id| advance.client_id == Some(id))
            && self.matter_id.is_none_or(|id| advance.matter_id == Some(id))
            && self.lawyer_id.is_none_or(|id| advance.lawyer_id == Some(id))
            && self.kind.is_none_or(|kind| advance.kind == kind)
            && self.status.is_none_or(|status| advance.status == status)
            && self
                .currency
                .as_ref()
                .is_none_or(|currency| &advance.currency == currency)
            && self.date_from.is_none_or(|from| advance.date_received >= from)
            && self.date_to.is_none_or(|to| advance.date_received <= to)
    }
}

/// One deduction event against an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Allocation ID.
    pub id: AllocationId,
    /// Entry the funds came from.
    pub advance_id: AdvanceId,
    /// Amount deducted.
    pub amount: Decimal,
    /// Optional note (e.g. the expense or invoice it paid for).
    pub note: Option<String>,
    /// When the deduction happened.
    pub created_at: DateTime<Utc>,
}

/// Which entry a deduction draws from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeductionTarget {
    /// An explicit entry.
    Entry(AdvanceId),
    /// The oldest active entry matching a selector.
    Oldest(AdvanceSelector),
}

/// Selector resolving to the oldest active entry of a kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceSelector {
    /// Entry kind.
    pub kind: AdvanceKind,
    /// Client the entry must belong to.
    pub client_id: Option<ClientId>,
    /// Matter the entry must be scoped to; `None` means a client-wide entry.
    /// Ignored for lawyer advances.
    pub matter_id: Option<MatterId>,
    /// Lawyer the entry must belong to.
    pub lawyer_id: Option<LawyerId>,
}

impl AdvanceSelector {
    /// Returns true if the entry is a live, active candidate for this selector.
    #[must_use]
    pub fn matches(&self, advance: &Advance) -> bool {
        advance.is_live()
            && advance.status == AdvanceStatus::Active
            && advance.kind == self.kind
            && (!self.kind.is_client_scoped() || advance.matter_id == self.matter_id)
            && self.client_id.is_none_or(|id| advance.client_id == Some(id))
            && self.lawyer_id.is_none_or(|id| advance.lawyer_id == Some(id))
    }

    /// Picks the oldest matching entry.
    pub fn pick<'a, I>(&self, candidates: I) -> Option<&'a Advance>
    where
        I: IntoIterator<Item = &'a Advance>,
    {
        candidates
            .into_iter()
            .filter(|advance| self.matches(advance))
            .min_by(|a, b| a.age_order(b))
    }

    /// Human-readable description for error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut parts = vec![format!("kind={}", self.kind)];
        if let Some(id) = self.client_id {
            parts.push(format!("client={id}"));
        }
        match self.matter_id {
            Some(id) => parts.push(format!("matter={id}")),
            None if self.kind.is_client_scoped() => parts.push("matter=none".to_string()),
            None => {}
        }
        if let Some(id) = self.lawyer_id {
            parts.push(format!("lawyer={id}"));
        }
        parts.join(", ")
    }
}

/// A requested deduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeductionRequest {
    /// Entry to draw from.
    pub target: DeductionTarget,
    /// Amount to deduct (validated positive, two decimals).
    pub amount: Decimal,
    /// Optional note stored on the allocation row.
    pub note: Option<String>,
}

/// Result of a successful deduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeductionOutcome {
    /// The entry after the deduction.
    pub advance: Advance,
    /// The audit row appended.
    pub allocation: Allocation,
}

/// Balance for one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyBalance {
    /// Currency code.
    pub currency: CurrencyCode,
    /// Sum of remaining balances.
    pub balance: Decimal,
}

/// Balances grouped by currency, ordered by currency code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSummary {
    /// One row per currency.
    pub balances: Vec<CurrencyBalance>,
}

impl BalanceSummary {
    /// Returns the balance for a currency, zero if absent.
    #[must_use]
    pub fn total(&self, currency: &CurrencyCode) -> Decimal {
        self.balances
            .iter()
            .find(|row| &row.currency == currency)
            .map_or(Decimal::ZERO, |row| row.balance)
    }
}

/// Summary card figures for a client (and optionally one matter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientFundsSummary {
    /// Client ID.
    pub client_id: ClientId,
    /// Matter ID, if the summary is matter-scoped.
    pub matter_id: Option<MatterId>,
    /// Remaining retainer funds.
    pub retainer: BalanceSummary,
    /// Remaining expense-advance funds.
    pub expense_advance: BalanceSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn advance(kind: AdvanceKind, date: NaiveDate) -> Advance {
        let now = Utc::now();
        Advance {
            id: AdvanceId::new(),
            kind,
            client_id: Some(ClientId::new()),
            matter_id: None,
            lawyer_id: None,
            amount: dec!(100.00),
            currency: "USD".parse().unwrap(),
            balance_remaining: dec!(100.00),
            status: AdvanceStatus::Active,
            date_received: date,
            description: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn test_kind_wire_names_roundtrip() {
        for kind in AdvanceKind::ALL {
            assert_eq!(kind.as_str().parse::<AdvanceKind>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert!("retainer".parse::<AdvanceKind>().is_err());
    }

    #[test]
    fn test_balance_tracked_kinds() {
        assert!(AdvanceKind::ClientRetainer.is_balance_tracked());
        assert!(AdvanceKind::ClientExpenseAdvance.is_balance_tracked());
        assert!(AdvanceKind::LawyerAdvance.is_balance_tracked());
        assert!(AdvanceKind::FeePaymentSuccess.is_fee_payment());
        assert!(!AdvanceKind::LawyerAdvance.is_client_scoped());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("depleted".parse::<AdvanceStatus>().unwrap(), AdvanceStatus::Depleted);
        assert!("closed".parse::<AdvanceStatus>().is_err());
    }

    #[test]
    fn test_filter_excludes_deleted_by_default() {
        let mut entry = advance(
            AdvanceKind::ClientRetainer,
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        );
        entry.deleted_at = Some(Utc::now());

        assert!(!AdvanceFilter::default().matches(&entry));
        let filter = AdvanceFilter {
            include_deleted: true,
            ..Default::default()
        };
        assert!(filter.matches(&entry));
    }

    #[test]
    fn test_filter_date_range_is_inclusive() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let entry = advance(AdvanceKind::ClientRetainer, date);
        let filter = AdvanceFilter {
            date_from: Some(date),
            date_to: Some(date),
            ..Default::default()
        };
        assert!(filter.matches(&entry));

        let filter = AdvanceFilter {
            date_from: date.succ_opt(),
            ..Default::default()
        };
        assert!(!filter.matches(&entry));
    }

    #[test]
    fn test_selector_picks_oldest_active() {
        let client = ClientId::new();
        let mut older = advance(
            AdvanceKind::ClientRetainer,
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        );
        let mut newer = advance(
            AdvanceKind::ClientRetainer,
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
        );
        let mut oldest_refunded =
            advance(AdvanceKind::ClientRetainer, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        older.client_id = Some(client);
        newer.client_id = Some(client);
        oldest_refunded.client_id = Some(client);
        oldest_refunded.status = AdvanceStatus::Refunded;

        let selector = AdvanceSelector {
            kind: AdvanceKind::ClientRetainer,
            client_id: Some(client),
            matter_id: None,
            lawyer_id: None,
        };
        let entries = [newer.clone(), oldest_refunded, older.clone()];
        assert_eq!(selector.pick(&entries).map(|a| a.id), Some(older.id));
    }

    #[test]
    fn test_selector_matter_must_match_exactly() {
        let client = ClientId::new();
        let matter = MatterId::new();
        let mut scoped = advance(
            AdvanceKind::ClientRetainer,
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        );
        scoped.client_id = Some(client);
        scoped.matter_id = Some(matter);

        let client_wide = AdvanceSelector {
            kind: AdvanceKind::ClientRetainer,
            client_id: Some(client),
            matter_id: None,
            lawyer_id: None,
        };
        assert!(!client_wide.matches(&scoped));

        let matter_scoped = AdvanceSelector {
            matter_id: Some(matter),
            ..client_wide
        };
        assert!(matter_scoped.matches(&scoped));
    }

    #[test]
    fn test_balance_summary_total() {
        let usd: CurrencyCode = "USD".parse().unwrap();
        let eur: CurrencyCode = "EUR".parse().unwrap();
        let summary = BalanceSummary {
            balances: vec![CurrencyBalance {
                currency: usd.clone(),
                balance: dec!(600.00),
            }],
        };
        assert_eq!(summary.total(&usd), dec!(600.00));
        assert_eq!(summary.total(&eur), Decimal::ZERO);
    }
}
