//! Expense routes: the expense-advance bridge and expense listing.

use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use lexledger_core::advance::{Expense, ExpenseFilter, ExpenseFunding, ExpenseRecorded, NewExpense};
use lexledger_shared::types::{AdvanceId, ClientId, ExpenseId, LawyerId, MatterId, format_amount};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::advances::DeductionResponse;
use super::error::{json_rejection, map_advance_error, query_rejection};
use crate::AppState;

/// Creates the expense routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/advances/expense-with-deduction",
            post(expense_with_deduction),
        )
        .route("/expenses", get(list_expenses))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for recording an expense and charging it to an advance.
#[derive(Debug, Deserialize)]
pub struct ExpenseWithDeductionRequest {
    /// Client ID.
    pub client_id: Option<ClientId>,
    /// Matter ID.
    pub matter_id: Option<MatterId>,
    /// Lawyer ID.
    pub lawyer_id: Option<LawyerId>,
    /// Amount spent.
    pub amount: Decimal,
    /// Currency code.
    pub currency: String,
    /// Description.
    pub description: String,
    /// Expense date; defaults to today.
    pub expense_date: Option<NaiveDate>,
    /// Whether the lawyer paid out of pocket.
    #[serde(default)]
    pub paid_by_lawyer: bool,
    /// Funding source; defaults to `{"source": "none"}`.
    #[serde(default = "no_funding")]
    pub funding: ExpenseFunding,
}

const fn no_funding() -> ExpenseFunding {
    ExpenseFunding::None
}

impl From<ExpenseWithDeductionRequest> for NewExpense {
    fn from(req: ExpenseWithDeductionRequest) -> Self {
        Self {
            client_id: req.client_id,
            matter_id: req.matter_id,
            lawyer_id: req.lawyer_id,
            amount: req.amount,
            currency: req.currency,
            description: req.description,
            expense_date: req.expense_date,
            paid_by_lawyer: req.paid_by_lawyer,
            funding: req.funding,
        }
    }
}

/// Response for an expense.
#[derive(Debug, Serialize)]
pub struct ExpenseResponse {
    /// Expense ID.
    pub id: ExpenseId,
    /// Client ID.
    pub client_id: Option<ClientId>,
    /// Matter ID.
    pub matter_id: Option<MatterId>,
    /// Lawyer ID.
    pub lawyer_id: Option<LawyerId>,
    /// Amount spent.
    pub amount: String,
    /// Currency code.
    pub currency: String,
    /// Description.
    pub description: String,
    /// Expense date.
    pub expense_date: NaiveDate,
    /// Whether the lawyer paid out of pocket.
    pub paid_by_lawyer: bool,
    /// Entry the expense was charged to.
    pub advance_id: Option<AdvanceId>,
    /// Created at timestamp.
    pub created_at: String,
}

impl From<&Expense> for ExpenseResponse {
    fn from(e: &Expense) -> Self {
        Self {
            id: e.id,
            client_id: e.client_id,
            matter_id: e.matter_id,
            lawyer_id: e.lawyer_id,
            amount: format_amount(e.amount),
            currency: e.currency.to_string(),
            description: e.description.clone(),
            expense_date: e.expense_date,
            paid_by_lawyer: e.paid_by_lawyer,
            advance_id: e.advance_id,
            created_at: e.created_at.to_rfc3339(),
        }
    }
}

/// Response for the expense-advance bridge.
#[derive(Debug, Serialize)]
pub struct ExpenseRecordedResponse {
    /// The persisted expense.
    pub expense: ExpenseResponse,
    /// The deduction, when the expense was funded from an advance.
    pub deduction: Option<DeductionResponse>,
}

impl From<&ExpenseRecorded> for ExpenseRecordedResponse {
    fn from(r: &ExpenseRecorded) -> Self {
        Self {
            expense: ExpenseResponse::from(&r.expense),
            deduction: r.deduction.as_ref().map(DeductionResponse::from),
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/advances/expense-with-deduction` - Record an expense and its deduction atomically.
async fn expense_with_deduction(
    State(state): State<AppState>,
    payload: Result<Json<ExpenseWithDeductionRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(p) => p,
        Err(r) => return json_rejection(&r),
    };

    match state
        .service
        .add_expense_with_deduction(&payload.into())
        .await
    {
        Ok(recorded) => (
            StatusCode::CREATED,
            Json(ExpenseRecordedResponse::from(&recorded)),
        )
            .into_response(),
        Err(e) => map_advance_error(&e),
    }
}

/// GET `/expenses` - List recorded expenses.
async fn list_expenses(
    State(state): State<AppState>,
    query: Result<Query<ExpenseFilter>, QueryRejection>,
) -> Response {
    let Query(filter) = match query {
        Ok(q) => q,
        Err(r) => return query_rejection(&r),
    };

    match state.service.list_expenses(&filter).await {
        Ok(expenses) => {
            let response: Vec<ExpenseResponse> =
                expenses.iter().map(ExpenseResponse::from).collect();
            (StatusCode::OK, Json(json!({ "expenses": response }))).into_response()
        }
        Err(e) => map_advance_error(&e),
    }
}
