//! Core types and data structures for the branch finance engine

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Which side of the books a financial title lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TitleKind {
    /// Money the branch owes (accounts payable)
    Payable,
    /// Money owed to the branch (accounts receivable)
    Receivable,
}

impl TitleKind {
    /// Terminal status reached when the title is settled
    pub fn settled_status(&self) -> TitleStatus {
        match self {
            TitleKind::Payable => TitleStatus::Paid,
            TitleKind::Receivable => TitleStatus::Received,
        }
    }

    /// Ledger direction of a settlement of this kind
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            TitleKind::Payable => TransactionType::Expense,
            TitleKind::Receivable => TransactionType::Income,
        }
    }

    /// Whether settling this kind brings money into the branch
    pub fn is_income(&self) -> bool {
        matches!(self, TitleKind::Receivable)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TitleKind::Payable => "account payable",
            TitleKind::Receivable => "account receivable",
        }
    }
}

/// Lifecycle status of a payable or receivable.
///
/// `Pending` is the only non-terminal state. `Paid` applies to payables,
/// `Received` to receivables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TitleStatus {
    Pending,
    Paid,
    Received,
    Cancelled,
}

impl TitleStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, TitleStatus::Paid | TitleStatus::Received)
    }
}

/// Module that originated a financial title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OriginType {
    Hr,
    Maintenance,
    Stock,
    Manual,
}

/// Direction of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Income,
    Expense,
}

/// Reason recorded for a manual balance adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentType {
    ManualAdjustment,
    InitialBalance,
    Correction,
}

/// Caller identity used for audit fields and authorization decisions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub is_admin: bool,
}

impl Actor {
    pub fn new(id: impl Into<String>, is_admin: bool) -> Self {
        Self {
            id: id.into(),
            is_admin,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(id, true)
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::new(id, false)
    }
}

/// Running cash balance of one branch. Exactly one row exists per branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchBalance {
    pub id: String,
    /// Unique per row
    pub branch_id: String,
    /// May be negative; overdraft is a valid state
    pub balance: BigDecimal,
    pub updated_at: NaiveDateTime,
}

impl BranchBalance {
    /// Create a zero balance for a branch
    pub fn new(branch_id: String, now: NaiveDateTime) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            branch_id,
            balance: BigDecimal::from(0),
            updated_at: now,
        }
    }

    /// Apply a signed movement to the balance
    pub fn apply_delta(&mut self, amount: &BigDecimal, is_income: bool, now: NaiveDateTime) {
        if is_income {
            self.balance += amount;
        } else {
            self.balance -= amount;
        }
        self.updated_at = now;
    }
}

/// Immutable audit row written by a manual balance adjustment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceAdjustment {
    pub id: String,
    pub branch_balance_id: String,
    pub previous_balance: BigDecimal,
    pub new_balance: BigDecimal,
    pub adjustment_type: AdjustmentType,
    pub reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub created_by: String,
}

/// Balance row together with its most recent adjustments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub balance: BranchBalance,
    pub recent_adjustments: Vec<BalanceAdjustment>,
}

/// Result of a balance sufficiency check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceCheck {
    pub sufficient: bool,
    pub current_balance: BigDecimal,
}

/// Account payable or account receivable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialTitle {
    pub id: String,
    pub kind: TitleKind,
    pub description: String,
    /// Always positive
    pub amount: BigDecimal,
    pub due_date: NaiveDate,
    /// Payment date for payables, receipt date for receivables
    pub settlement_date: Option<NaiveDate>,
    pub status: TitleStatus,
    pub origin_type: Option<OriginType>,
    pub origin_id: Option<String>,
    pub document_number: Option<String>,
    pub notes: Option<String>,
    pub company_id: String,
    pub branch_id: String,
    pub financial_transaction_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub created_by: Option<String>,
    pub updated_at: NaiveDateTime,
    pub updated_by: Option<String>,
    pub deleted_at: Option<NaiveDateTime>,
    pub deleted_by: Option<String>,
}

impl FinancialTitle {
    /// Create a new pending title
    pub fn new(
        kind: TitleKind,
        input: NewTitle,
        company_id: String,
        created_by: String,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            description: input.description,
            amount: input.amount,
            due_date: input.due_date,
            settlement_date: None,
            status: TitleStatus::Pending,
            origin_type: input.origin_type,
            origin_id: input.origin_id,
            document_number: input.document_number,
            notes: input.notes,
            company_id,
            branch_id: input.branch_id,
            financial_transaction_id: None,
            created_at: now,
            created_by: Some(created_by.clone()),
            updated_at: now,
            updated_by: Some(created_by),
            deleted_at: None,
            deleted_by: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Stamp the audit fields for a modification
    pub fn touch(&mut self, actor_id: &str, now: NaiveDateTime) {
        self.updated_at = now;
        self.updated_by = Some(actor_id.to_string());
    }
}

/// Input for creating a payable or receivable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTitle {
    pub description: String,
    pub amount: BigDecimal,
    pub due_date: NaiveDate,
    pub branch_id: String,
    /// Must match the branch's company when given
    pub company_id: Option<String>,
    pub origin_type: Option<OriginType>,
    pub origin_id: Option<String>,
    pub document_number: Option<String>,
    pub notes: Option<String>,
}

impl NewTitle {
    /// Minimal manual title
    pub fn new(
        description: impl Into<String>,
        amount: BigDecimal,
        due_date: NaiveDate,
        branch_id: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            amount,
            due_date,
            branch_id: branch_id.into(),
            company_id: None,
            origin_type: Some(OriginType::Manual),
            origin_id: None,
            document_number: None,
            notes: None,
        }
    }
}

/// Partial update of a pending title
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TitleUpdate {
    pub description: Option<String>,
    pub amount: Option<BigDecimal>,
    pub due_date: Option<NaiveDate>,
    pub document_number: Option<String>,
    pub notes: Option<String>,
}

/// Settlement payload for `pay`/`receive`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettleRequest {
    /// Defaults to today
    pub settlement_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Immutable ledger entry created exactly once per settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialTransaction {
    pub id: String,
    pub transaction_type: TransactionType,
    pub amount: BigDecimal,
    pub description: String,
    pub transaction_date: NaiveDate,
    pub origin_type: Option<OriginType>,
    pub origin_id: Option<String>,
    pub document_number: Option<String>,
    pub company_id: String,
    pub branch_id: String,
    pub created_at: NaiveDateTime,
    pub created_by: String,
}

impl FinancialTransaction {
    /// Build the ledger entry that settles `title`
    pub fn for_settlement(
        title: &FinancialTitle,
        date: NaiveDate,
        created_by: &str,
        now: NaiveDateTime,
    ) -> Self {
        let prefix = match title.kind {
            TitleKind::Payable => "Payment",
            TitleKind::Receivable => "Receipt",
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            transaction_type: title.kind.transaction_type(),
            amount: title.amount.clone(),
            description: format!("{}: {}", prefix, title.description),
            transaction_date: date,
            origin_type: title.origin_type,
            origin_id: title.origin_id.clone(),
            document_number: title.document_number.clone(),
            company_id: title.company_id.clone(),
            branch_id: title.branch_id.clone(),
            created_at: now,
            created_by: created_by.to_string(),
        }
    }
}

/// Filters shared by title listings and summaries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TitleFilter {
    pub branch_id: Option<String>,
    pub company_id: Option<String>,
    pub status: Option<TitleStatus>,
    pub origin_type: Option<OriginType>,
    pub due_from: Option<NaiveDate>,
    pub due_to: Option<NaiveDate>,
    /// Case-insensitive match on description or document number
    pub search: Option<String>,
}

impl TitleFilter {
    pub fn for_branch(branch_id: impl Into<String>) -> Self {
        Self {
            branch_id: Some(branch_id.into()),
            ..Self::default()
        }
    }

    /// Whether a (non-deleted) title passes this filter
    pub fn matches(&self, title: &FinancialTitle) -> bool {
        if let Some(ref branch_id) = self.branch_id {
            if &title.branch_id != branch_id {
                return false;
            }
        }
        if let Some(ref company_id) = self.company_id {
            if &title.company_id != company_id {
                return false;
            }
        }
        if self.status.is_some_and(|s| s != title.status) {
            return false;
        }
        if self.origin_type.is_some() && self.origin_type != title.origin_type {
            return false;
        }
        if self.due_from.is_some_and(|from| title.due_date < from) {
            return false;
        }
        if self.due_to.is_some_and(|to| title.due_date > to) {
            return false;
        }
        if let Some(ref search) = self.search {
            let needle = search.to_lowercase();
            let in_description = title.description.to_lowercase().contains(&needle);
            let in_document = title
                .document_number
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_description && !in_document {
                return false;
            }
        }
        true
    }
}

/// One-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit }
    }

    /// Clamp to sane bounds: page >= 1, 1 <= limit <= max_limit
    pub fn normalized(&self, max_limit: u32) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.clamp(1, max_limit.max(1)),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.limit as usize
    }
}

/// A page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Slice an already ordered collection
    pub fn from_vec(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len() as u64;
        let items: Vec<T> = all
            .into_iter()
            .skip(request.offset())
            .take(request.limit as usize)
            .collect();
        let total_pages = if request.limit == 0 {
            0
        } else {
            total.div_ceil(request.limit as u64) as u32
        };
        Self {
            items,
            total,
            page: request.page,
            limit: request.limit,
            total_pages,
        }
    }
}

/// Grouped sum and count for one status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusAggregate {
    pub status: TitleStatus,
    pub total: BigDecimal,
    pub count: u64,
}

/// Sum and count for one status bucket of a summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTotals {
    pub total: BigDecimal,
    pub count: u64,
}

impl Default for StatusTotals {
    fn default() -> Self {
        Self {
            total: BigDecimal::from(0),
            count: 0,
        }
    }
}

/// Summary of one title kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleSummary {
    pub kind: TitleKind,
    pub pending: StatusTotals,
    /// Paid for payables, received for receivables
    pub settled: StatusTotals,
    pub cancelled: StatusTotals,
    pub items: Page<FinancialTitle>,
}

/// Combined payable and receivable summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSummary {
    pub payables: TitleSummary,
    pub receivables: TitleSummary,
    /// Pending payable total
    pub total_payable: BigDecimal,
    /// Pending receivable total
    pub total_receivable: BigDecimal,
    /// total_receivable - total_payable
    pub net_balance: BigDecimal,
}

/// Company branch (owned by an external module)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub name: String,
    pub company_id: String,
}

/// Employee record as seen by the finance engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub name: String,
    pub company_id: String,
    pub branch_id: String,
    pub monthly_salary: Option<BigDecimal>,
    pub active: bool,
    pub deleted_at: Option<NaiveDateTime>,
}

impl Employee {
    /// Salary when present and positive
    pub fn payable_salary(&self) -> Option<&BigDecimal> {
        self.monthly_salary
            .as_ref()
            .filter(|salary| **salary > BigDecimal::from(0))
    }
}

/// Benefit catalogue entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benefit {
    pub id: String,
    pub name: String,
    pub daily_cost: BigDecimal,
    /// Portion paid by the employee
    pub employee_value: BigDecimal,
    pub include_weekends: bool,
}

/// Link between an employee and a benefit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeBenefit {
    pub id: String,
    pub employee_id: String,
    pub benefit_id: String,
    pub active: bool,
    pub deleted_at: Option<NaiveDateTime>,
}

/// Active benefit link joined with its benefit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenefitAssignment {
    pub link: EmployeeBenefit,
    pub benefit: Benefit,
}

/// Errors that can occur in the finance engine
#[derive(Debug, thiserror::Error)]
pub enum FinanceError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Duplicate record: {0}")]
    Duplicate(String),
}

/// Result type for finance operations
pub type FinanceResult<T> = Result<T, FinanceError>;
