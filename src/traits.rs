//! Traits for storage abstraction and external collaborators

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use crate::types::*;
use crate::utils::validation::validate_positive_amount;

/// Storage abstraction for the finance engine
///
/// Read queries live here; every write goes through a [`StorageTransaction`]
/// obtained from [`FinanceStorage::begin`], so multi-row writes either all
/// land or none do. A relational backend maps `begin` to `BEGIN` and
/// `lock_branch_balance` to `SELECT ... FOR UPDATE`.
#[async_trait]
pub trait FinanceStorage: Send + Sync {
    type Tx: StorageTransaction;

    /// Open a new transaction
    async fn begin(&self) -> FinanceResult<Self::Tx>;

    /// Get the balance row of a branch, if it exists
    async fn get_branch_balance(&self, branch_id: &str) -> FinanceResult<Option<BranchBalance>>;

    /// List adjustments of a balance row, newest first
    async fn list_adjustments(
        &self,
        branch_balance_id: &str,
        page: PageRequest,
    ) -> FinanceResult<Page<BalanceAdjustment>>;

    /// Get a non-deleted title by ID
    async fn get_title(&self, kind: TitleKind, id: &str) -> FinanceResult<Option<FinancialTitle>>;

    /// Find a non-deleted title by its document number within a branch
    async fn find_title_by_document(
        &self,
        kind: TitleKind,
        branch_id: &str,
        document_number: &str,
    ) -> FinanceResult<Option<FinancialTitle>>;

    /// List non-deleted titles ordered by due date
    async fn find_titles(
        &self,
        kind: TitleKind,
        filter: &TitleFilter,
        page: PageRequest,
    ) -> FinanceResult<Page<FinancialTitle>>;

    /// Sum and count non-deleted titles grouped by status
    async fn aggregate_titles(
        &self,
        kind: TitleKind,
        filter: &TitleFilter,
    ) -> FinanceResult<Vec<StatusAggregate>>;

    /// Get a ledger entry by ID
    async fn get_transaction(&self, id: &str) -> FinanceResult<Option<FinancialTransaction>>;

    /// List ledger entries of a branch, newest first
    async fn list_transactions(
        &self,
        branch_id: &str,
        page: PageRequest,
    ) -> FinanceResult<Page<FinancialTransaction>>;
}

/// Unit of work against the finance store
///
/// Dropping a transaction without calling [`StorageTransaction::commit`]
/// rolls back every write made through it.
#[async_trait]
pub trait StorageTransaction: Send {
    /// Read and lock the balance row of a branch until commit
    async fn lock_branch_balance(&mut self, branch_id: &str)
        -> FinanceResult<Option<BranchBalance>>;

    /// Insert a balance row; fails with `Duplicate` if the branch already has one
    async fn insert_branch_balance(&mut self, balance: &BranchBalance) -> FinanceResult<()>;

    /// Overwrite an existing balance row
    async fn update_branch_balance(&mut self, balance: &BranchBalance) -> FinanceResult<()>;

    /// Append an adjustment audit row
    async fn insert_adjustment(&mut self, adjustment: &BalanceAdjustment) -> FinanceResult<()>;

    /// Read a non-deleted title inside the transaction
    async fn get_title(&mut self, kind: TitleKind, id: &str)
        -> FinanceResult<Option<FinancialTitle>>;

    /// Insert a title; fails with `Duplicate` when a non-deleted title of the
    /// same kind and branch already carries the same document number
    async fn insert_title(&mut self, title: &FinancialTitle) -> FinanceResult<()>;

    /// Overwrite an existing title
    async fn update_title(&mut self, title: &FinancialTitle) -> FinanceResult<()>;

    /// Append a ledger entry
    async fn insert_transaction(&mut self, transaction: &FinancialTransaction)
        -> FinanceResult<()>;

    /// Make every write visible
    async fn commit(self) -> FinanceResult<()>;
}

/// Read access to branches, employees and benefits owned by other modules
#[async_trait]
pub trait StaffDirectory: Send + Sync {
    /// Get a non-deleted branch
    async fn get_branch(&self, branch_id: &str) -> FinanceResult<Option<Branch>>;

    /// Get a non-deleted employee
    async fn get_employee(&self, employee_id: &str) -> FinanceResult<Option<Employee>>;

    /// List active, non-deleted employees, optionally for one branch
    async fn list_active_employees(&self, branch_id: Option<&str>)
        -> FinanceResult<Vec<Employee>>;

    /// Active, non-deleted benefit links for a set of employees, in one query
    async fn list_active_benefits(
        &self,
        employee_ids: &[String],
    ) -> FinanceResult<Vec<BenefitAssignment>>;
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Wall clock in UTC
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Utc::now().naive_utc()
    }
}

/// Clock pinned to a fixed instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl FixedClock {
    /// Midday of the given date; `None` for an invalid date
    pub fn on(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(12, 0, 0))
            .map(FixedClock)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Trait for implementing custom title validation rules
pub trait TitleValidator: Send + Sync {
    /// Validate a title before it is created
    fn validate_new(&self, title: &NewTitle) -> FinanceResult<()>;

    /// Validate a patch before it is applied to a pending title
    fn validate_update(&self, update: &TitleUpdate) -> FinanceResult<()>;
}

/// Default title validator with basic rules
pub struct DefaultTitleValidator;

impl TitleValidator for DefaultTitleValidator {
    fn validate_new(&self, title: &NewTitle) -> FinanceResult<()> {
        if title.description.trim().is_empty() {
            return Err(FinanceError::Validation(
                "Description cannot be empty".to_string(),
            ));
        }

        validate_positive_amount(&title.amount)
    }

    fn validate_update(&self, update: &TitleUpdate) -> FinanceResult<()> {
        if let Some(ref description) = update.description {
            if description.trim().is_empty() {
                return Err(FinanceError::Validation(
                    "Description cannot be empty".to_string(),
                ));
            }
        }

        if let Some(ref amount) = update.amount {
            validate_positive_amount(amount)?;
        }

        Ok(())
    }
}
