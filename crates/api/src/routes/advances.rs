//! Advance & retainer ledger routes.
//!
//! Amounts are accepted as JSON numbers or strings and always returned as
//! strings with two decimals.

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::{DateTime, NaiveDate, Utc};
use lexledger_core::advance::{
    Advance, AdvanceFilter, AdvanceKind, AdvancePatch, AdvanceStatus, Allocation, BalanceSummary,
    ClientFundsSummary, DeductionOutcome, LawyerBalance, NewAdvance, Settlement,
};
use lexledger_shared::types::{
    AdvanceId, AllocationId, ClientId, CurrencyCode, LawyerId, MatterId, format_amount,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::error::{json_rejection, map_advance_error, path_rejection, query_rejection};
use crate::AppState;

/// Creates the advance routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/advances", get(list_advances).post(create_advance))
        .route(
            "/advances/{id}",
            get(get_advance).put(update_advance).delete(delete_advance),
        )
        .route("/advances/{id}/purge", delete(purge_advance))
        .route("/advances/{id}/refund", post(refund_advance))
        .route("/advances/{id}/allocations", get(list_allocations))
        .route("/advances/allocate", post(allocate))
        .route("/advances/deduct-retainer", post(deduct_retainer))
        .route("/advances/client-retainer", get(client_retainer))
        .route(
            "/advances/client-expense-advance",
            get(client_expense_advance),
        )
        .route("/advances/lawyer-advance", get(lawyer_advance))
        .route("/advances/client-summary", get(client_summary))
        .route("/advances/lawyer-balance", get(lawyer_balance))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a ledger entry.
#[derive(Debug, Deserialize)]
pub struct CreateAdvanceRequest {
    /// Entry kind.
    #[serde(alias = "advance_type")]
    pub kind: AdvanceKind,
    /// Client ID.
    pub client_id: Option<ClientId>,
    /// Matter ID.
    pub matter_id: Option<MatterId>,
    /// Lawyer ID.
    pub lawyer_id: Option<LawyerId>,
    /// Amount received.
    pub amount: Decimal,
    /// Currency code.
    pub currency: String,
    /// Date received; defaults to today.
    pub date_received: Option<NaiveDate>,
    /// Description.
    pub description: Option<String>,
}

impl From<CreateAdvanceRequest> for NewAdvance {
    fn from(req: CreateAdvanceRequest) -> Self {
        Self {
            kind: req.kind,
            client_id: req.client_id,
            matter_id: req.matter_id,
            lawyer_id: req.lawyer_id,
            amount: req.amount,
            currency: req.currency,
            date_received: req.date_received,
            description: req.description,
        }
    }
}

/// Request body for updating a ledger entry.
///
/// Immutable fields may be echoed back unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateAdvanceRequest {
    /// New description.
    pub description: Option<String>,
    /// New date received.
    pub date_received: Option<NaiveDate>,
    /// Entry kind.
    #[serde(alias = "advance_type")]
    pub kind: Option<AdvanceKind>,
    /// Client ID.
    pub client_id: Option<ClientId>,
    /// Matter ID.
    pub matter_id: Option<MatterId>,
    /// Lawyer ID.
    pub lawyer_id: Option<LawyerId>,
    /// Amount.
    pub amount: Option<Decimal>,
    /// Currency code.
    pub currency: Option<String>,
}

impl From<UpdateAdvanceRequest> for AdvancePatch {
    fn from(req: UpdateAdvanceRequest) -> Self {
        Self {
            description: req.description,
            date_received: req.date_received,
            kind: req.kind,
            client_id: req.client_id,
            matter_id: req.matter_id,
            lawyer_id: req.lawyer_id,
            amount: req.amount,
            currency: req.currency,
        }
    }
}

/// Request body for deducting from an explicit entry.
#[derive(Debug, Deserialize)]
pub struct AllocateRequest {
    /// Entry to deduct from.
    pub advance_id: AdvanceId,
    /// Amount to deduct.
    pub amount: Decimal,
    /// Note stored on the allocation row.
    pub note: Option<String>,
}

/// Request body for deducting from a client's oldest matching entry.
#[derive(Debug, Deserialize)]
pub struct DeductRetainerRequest {
    /// Client ID.
    pub client_id: ClientId,
    /// Matter ID; absent selects a client-wide entry.
    pub matter_id: Option<MatterId>,
    /// `client_retainer` or `client_expense_advance`.
    #[serde(alias = "kind")]
    pub advance_type: AdvanceKind,
    /// Amount to deduct.
    pub amount: Decimal,
    /// Note stored on the allocation row.
    pub note: Option<String>,
}

/// Query for client balance lookups.
#[derive(Debug, Deserialize)]
pub struct ClientBalanceQuery {
    /// Client ID.
    pub client_id: ClientId,
    /// Restrict to one matter.
    pub matter_id: Option<MatterId>,
    /// Restrict to one currency.
    pub currency: Option<CurrencyCode>,
}

/// Query for lawyer lookups.
#[derive(Debug, Deserialize)]
pub struct LawyerQuery {
    /// Lawyer ID.
    pub lawyer_id: LawyerId,
    /// Currency.
    pub currency: Option<CurrencyCode>,
}

/// Query for the client summary card.
#[derive(Debug, Deserialize)]
pub struct ClientSummaryQuery {
    /// Client ID.
    pub client_id: ClientId,
    /// Restrict to one matter.
    pub matter_id: Option<MatterId>,
}

/// Response for a ledger entry.
#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    /// Entry ID.
    pub id: AdvanceId,
    /// Entry kind.
    pub kind: AdvanceKind,
    /// Client ID.
    pub client_id: Option<ClientId>,
    /// Matter ID.
    pub matter_id: Option<MatterId>,
    /// Lawyer ID.
    pub lawyer_id: Option<LawyerId>,
    /// Original amount.
    pub amount: String,
    /// Currency code.
    pub currency: String,
    /// Funds still available.
    pub balance_remaining: String,
    /// Lifecycle status.
    pub status: AdvanceStatus,
    /// Date received.
    pub date_received: NaiveDate,
    /// Description.
    pub description: Option<String>,
    /// Created at timestamp.
    pub created_at: String,
    /// Updated at timestamp.
    pub updated_at: String,
    /// Deleted at timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
}

impl From<&Advance> for AdvanceResponse {
    fn from(a: &Advance) -> Self {
        Self {
            id: a.id,
            kind: a.kind,
            client_id: a.client_id,
            matter_id: a.matter_id,
            lawyer_id: a.lawyer_id,
            amount: format_amount(a.amount),
            currency: a.currency.to_string(),
            balance_remaining: format_amount(a.balance_remaining),
            status: a.status,
            date_received: a.date_received,
            description: a.description.clone(),
            created_at: a.created_at.to_rfc3339(),
            updated_at: a.updated_at.to_rfc3339(),
            deleted_at: a.deleted_at.as_ref().map(DateTime::<Utc>::to_rfc3339),
        }
    }
}

/// Response for an allocation audit row.
#[derive(Debug, Serialize)]
pub struct AllocationResponse {
    /// Allocation ID.
    pub id: AllocationId,
    /// Entry the funds came from.
    pub advance_id: AdvanceId,
    /// Amount deducted.
    pub amount: String,
    /// Note.
    pub note: Option<String>,
    /// Created at timestamp.
    pub created_at: String,
}

impl From<&Allocation> for AllocationResponse {
    fn from(a: &Allocation) -> Self {
        Self {
            id: a.id,
            advance_id: a.advance_id,
            amount: format_amount(a.amount),
            note: a.note.clone(),
            created_at: a.created_at.to_rfc3339(),
        }
    }
}

/// Response for a deduction.
#[derive(Debug, Serialize)]
pub struct DeductionResponse {
    /// The entry after the deduction.
    pub advance: AdvanceResponse,
    /// The allocation row appended.
    pub allocation: AllocationResponse,
}

impl From<&DeductionOutcome> for DeductionResponse {
    fn from(outcome: &DeductionOutcome) -> Self {
        Self {
            advance: AdvanceResponse::from(&outcome.advance),
            allocation: AllocationResponse::from(&outcome.allocation),
        }
    }
}

/// One currency's balance.
#[derive(Debug, Serialize)]
pub struct CurrencyBalanceResponse {
    /// Currency code.
    pub currency: String,
    /// Remaining balance.
    pub balance: String,
}

/// Balance lookup response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Client ID, for client lookups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
    /// Matter ID, when the lookup was matter-scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matter_id: Option<MatterId>,
    /// Lawyer ID, for lawyer lookups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lawyer_id: Option<LawyerId>,
    /// One row per currency.
    pub balances: Vec<CurrencyBalanceResponse>,
}

fn balance_rows(summary: &BalanceSummary) -> Vec<CurrencyBalanceResponse> {
    summary
        .balances
        .iter()
        .map(|row| CurrencyBalanceResponse {
            currency: row.currency.to_string(),
            balance: format_amount(row.balance),
        })
        .collect()
}

/// Client summary card response.
#[derive(Debug, Serialize)]
pub struct ClientSummaryResponse {
    /// Client ID.
    pub client_id: ClientId,
    /// Matter ID.
    pub matter_id: Option<MatterId>,
    /// Remaining retainer funds.
    pub retainer: Vec<CurrencyBalanceResponse>,
    /// Remaining expense-advance funds.
    pub expense_advance: Vec<CurrencyBalanceResponse>,
}

impl From<&ClientFundsSummary> for ClientSummaryResponse {
    fn from(s: &ClientFundsSummary) -> Self {
        Self {
            client_id: s.client_id,
            matter_id: s.matter_id,
            retainer: balance_rows(&s.retainer),
            expense_advance: balance_rows(&s.expense_advance),
        }
    }
}

/// Lawyer reimbursement response.
#[derive(Debug, Serialize)]
pub struct LawyerBalanceResponse {
    /// Lawyer ID.
    pub lawyer_id: LawyerId,
    /// Currency of every figure.
    pub currency: String,
    /// Sum of original lawyer advance amounts.
    pub total_advanced: String,
    /// Unspent firm cash.
    pub balance_from_advances: String,
    /// Out-of-pocket expenses.
    pub expenses_paid: String,
    /// Larger of advance funds consumed and out-of-pocket expenses.
    pub total_spent: String,
    /// Total advanced minus total spent.
    pub net_balance: String,
    /// Who owes whom.
    pub settlement: Settlement,
}

impl From<&LawyerBalance> for LawyerBalanceResponse {
    fn from(b: &LawyerBalance) -> Self {
        Self {
            lawyer_id: b.lawyer_id,
            currency: b.currency.to_string(),
            total_advanced: format_amount(b.total_advanced),
            balance_from_advances: format_amount(b.balance_from_advances),
            expenses_paid: format_amount(b.expenses_paid),
            total_spent: format_amount(b.total_spent),
            net_balance: format_amount(b.net_balance),
            settlement: b.settlement,
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/advances` - List entries matching the query filters.
async fn list_advances(
    State(state): State<AppState>,
    query: Result<Query<AdvanceFilter>, QueryRejection>,
) -> Response {
    let Query(filter) = match query {
        Ok(q) => q,
        Err(r) => return query_rejection(&r),
    };

    match state.service.list_advances(&filter).await {
        Ok(advances) => {
            let response: Vec<AdvanceResponse> =
                advances.iter().map(AdvanceResponse::from).collect();
            (StatusCode::OK, Json(json!({ "advances": response }))).into_response()
        }
        Err(e) => map_advance_error(&e),
    }
}

/// POST `/advances` - Receive funds or record a fee payment.
async fn create_advance(
    State(state): State<AppState>,
    payload: Result<Json<CreateAdvanceRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(p) => p,
        Err(r) => return json_rejection(&r),
    };

    match state.service.add_advance(&payload.into()).await {
        Ok(advance) => (StatusCode::CREATED, Json(AdvanceResponse::from(&advance))).into_response(),
        Err(e) => map_advance_error(&e),
    }
}

/// GET `/advances/{id}` - Get a live entry.
async fn get_advance(
    State(state): State<AppState>,
    id: Result<Path<AdvanceId>, PathRejection>,
) -> Response {
    let Path(id) = match id {
        Ok(p) => p,
        Err(r) => return path_rejection(&r),
    };

    match state.service.get_advance(id).await {
        Ok(advance) => (StatusCode::OK, Json(AdvanceResponse::from(&advance))).into_response(),
        Err(e) => map_advance_error(&e),
    }
}

/// PUT `/advances/{id}` - Update descriptive fields.
async fn update_advance(
    State(state): State<AppState>,
    id: Result<Path<AdvanceId>, PathRejection>,
    payload: Result<Json<UpdateAdvanceRequest>, JsonRejection>,
) -> Response {
    let Path(id) = match id {
        Ok(p) => p,
        Err(r) => return path_rejection(&r),
    };
    let Json(payload) = match payload {
        Ok(p) => p,
        Err(r) => return json_rejection(&r),
    };

    match state.service.update_advance(id, &payload.into()).await {
        Ok(advance) => (StatusCode::OK, Json(AdvanceResponse::from(&advance))).into_response(),
        Err(e) => map_advance_error(&e),
    }
}

/// DELETE `/advances/{id}` - Soft delete.
async fn delete_advance(
    State(state): State<AppState>,
    id: Result<Path<AdvanceId>, PathRejection>,
) -> Response {
    let Path(id) = match id {
        Ok(p) => p,
        Err(r) => return path_rejection(&r),
    };

    match state.service.delete_advance(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => map_advance_error(&e),
    }
}

/// DELETE `/advances/{id}/purge` - Hard delete a soft-deleted entry.
async fn purge_advance(
    State(state): State<AppState>,
    id: Result<Path<AdvanceId>, PathRejection>,
) -> Response {
    let Path(id) = match id {
        Ok(p) => p,
        Err(r) => return path_rejection(&r),
    };

    match state.service.purge_advance(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => map_advance_error(&e),
    }
}

/// POST `/advances/{id}/refund` - Mark an entry refunded.
async fn refund_advance(
    State(state): State<AppState>,
    id: Result<Path<AdvanceId>, PathRejection>,
) -> Response {
    let Path(id) = match id {
        Ok(p) => p,
        Err(r) => return path_rejection(&r),
    };

    match state.service.refund_advance(id).await {
        Ok(advance) => (StatusCode::OK, Json(AdvanceResponse::from(&advance))).into_response(),
        Err(e) => map_advance_error(&e),
    }
}

/// GET `/advances/{id}/allocations` - Deduction audit rows, oldest first.
async fn list_allocations(
    State(state): State<AppState>,
    id: Result<Path<AdvanceId>, PathRejection>,
) -> Response {
    let Path(id) = match id {
        Ok(p) => p,
        Err(r) => return path_rejection(&r),
    };

    match state.service.list_allocations(id).await {
        Ok(allocations) => {
            let response: Vec<AllocationResponse> =
                allocations.iter().map(AllocationResponse::from).collect();
            (StatusCode::OK, Json(json!({ "allocations": response }))).into_response()
        }
        Err(e) => map_advance_error(&e),
    }
}

/// POST `/advances/allocate` - Deduct from an explicit entry.
async fn allocate(
    State(state): State<AppState>,
    payload: Result<Json<AllocateRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(p) => p,
        Err(r) => return json_rejection(&r),
    };

    match state
        .service
        .deduct_from_advance(payload.advance_id, payload.amount, payload.note)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(DeductionResponse::from(&outcome))).into_response(),
        Err(e) => map_advance_error(&e),
    }
}

/// POST `/advances/deduct-retainer` - Deduct from the oldest matching client entry.
async fn deduct_retainer(
    State(state): State<AppState>,
    payload: Result<Json<DeductRetainerRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(p) => p,
        Err(r) => return json_rejection(&r),
    };

    match state
        .service
        .deduct_retainer(
            payload.client_id,
            payload.matter_id,
            payload.advance_type,
            payload.amount,
            payload.note,
        )
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(DeductionResponse::from(&outcome))).into_response(),
        Err(e) => map_advance_error(&e),
    }
}

/// GET `/advances/client-retainer` - Remaining retainer funds.
async fn client_retainer(
    State(state): State<AppState>,
    query: Result<Query<ClientBalanceQuery>, QueryRejection>,
) -> Response {
    let Query(q) = match query {
        Ok(q) => q,
        Err(r) => return query_rejection(&r),
    };

    let result = state
        .service
        .get_client_retainer(q.client_id, q.matter_id, q.currency.as_ref())
        .await;
    client_balance_response(&q, result)
}

/// GET `/advances/client-expense-advance` - Remaining expense-advance funds.
async fn client_expense_advance(
    State(state): State<AppState>,
    query: Result<Query<ClientBalanceQuery>, QueryRejection>,
) -> Response {
    let Query(q) = match query {
        Ok(q) => q,
        Err(r) => return query_rejection(&r),
    };

    let result = state
        .service
        .get_client_expense_advance(q.client_id, q.matter_id, q.currency.as_ref())
        .await;
    client_balance_response(&q, result)
}

fn client_balance_response(
    q: &ClientBalanceQuery,
    result: Result<BalanceSummary, lexledger_core::AdvanceError>,
) -> Response {
    match result {
        Ok(summary) => (
            StatusCode::OK,
            Json(BalanceResponse {
                client_id: Some(q.client_id),
                matter_id: q.matter_id,
                lawyer_id: None,
                balances: balance_rows(&summary),
            }),
        )
            .into_response(),
        Err(e) => map_advance_error(&e),
    }
}

/// GET `/advances/lawyer-advance` - Remaining firm cash held by a lawyer.
async fn lawyer_advance(
    State(state): State<AppState>,
    query: Result<Query<LawyerQuery>, QueryRejection>,
) -> Response {
    let Query(q) = match query {
        Ok(q) => q,
        Err(r) => return query_rejection(&r),
    };

    match state
        .service
        .get_lawyer_advance(q.lawyer_id, q.currency.as_ref())
        .await
    {
        Ok(summary) => (
            StatusCode::OK,
            Json(BalanceResponse {
                client_id: None,
                matter_id: None,
                lawyer_id: Some(q.lawyer_id),
                balances: balance_rows(&summary),
            }),
        )
            .into_response(),
        Err(e) => map_advance_error(&e),
    }
}

/// GET `/advances/client-summary` - Retainer and expense-advance balances together.
async fn client_summary(
    State(state): State<AppState>,
    query: Result<Query<ClientSummaryQuery>, QueryRejection>,
) -> Response {
    let Query(q) = match query {
        Ok(q) => q,
        Err(r) => return query_rejection(&r),
    };

    match state.service.client_summary(q.client_id, q.matter_id).await {
        Ok(summary) => {
            (StatusCode::OK, Json(ClientSummaryResponse::from(&summary))).into_response()
        }
        Err(e) => map_advance_error(&e),
    }
}

/// GET `/advances/lawyer-balance` - Reimbursement figures for a lawyer.
async fn lawyer_balance(
    State(state): State<AppState>,
    query: Result<Query<LawyerQuery>, QueryRejection>,
) -> Response {
    let Query(q) = match query {
        Ok(q) => q,
        Err(r) => return query_rejection(&r),
    };

    match state
        .service
        .compute_lawyer_balance(q.lawyer_id, q.currency)
        .await
    {
        Ok(balance) => {
            (StatusCode::OK, Json(LawyerBalanceResponse::from(&balance))).into_response()
        }
        Err(e) => map_advance_error(&e),
    }
}
