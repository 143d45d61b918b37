//! In-memory storage implementation for testing

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::traits::*;
use crate::types::*;

/// Point at which the next transaction fails, for atomicity tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    InsertTransaction,
    UpdateBalance,
    InsertTitle,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct FinanceState {
    /// Keyed by branch ID, which makes the row unique per branch
    balances: HashMap<String, BranchBalance>,
    adjustments: Vec<BalanceAdjustment>,
    titles: HashMap<String, FinancialTitle>,
    transactions: Vec<FinancialTransaction>,
}

impl FinanceState {
    fn live_title(&self, kind: TitleKind, id: &str) -> Option<&FinancialTitle> {
        self.titles
            .get(id)
            .filter(|t| t.kind == kind && !t.is_deleted())
    }

    fn document_taken(&self, title: &FinancialTitle) -> bool {
        let Some(ref document_number) = title.document_number else {
            return false;
        };
        self.titles.values().any(|t| {
            t.id != title.id
                && t.kind == title.kind
                && !t.is_deleted()
                && t.branch_id == title.branch_id
                && t.document_number.as_ref() == Some(document_number)
        })
    }

    fn filtered_titles(&self, kind: TitleKind, filter: &TitleFilter) -> Vec<FinancialTitle> {
        let mut titles: Vec<FinancialTitle> = self
            .titles
            .values()
            .filter(|t| t.kind == kind && !t.is_deleted() && filter.matches(t))
            .cloned()
            .collect();
        titles.sort_by(|a, b| {
            a.due_date
                .cmp(&b.due_date)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        titles
    }
}

#[derive(Debug, Default)]
struct DirectoryState {
    branches: HashMap<String, Branch>,
    employees: HashMap<String, Employee>,
    benefits: HashMap<String, Benefit>,
    employee_benefits: Vec<EmployeeBenefit>,
}

/// In-memory storage implementation for testing and development
///
/// Holds both the financial state and a seeded staff directory. A
/// transaction takes the financial state lock for its whole lifetime, which
/// serializes writers the way row locks would on a relational store.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    state: Arc<Mutex<FinanceState>>,
    directory: Arc<RwLock<DirectoryState>>,
    failure: Arc<RwLock<Option<FailurePoint>>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FinanceState::default())),
            directory: Arc::new(RwLock::new(DirectoryState::default())),
            failure: Arc::new(RwLock::new(None)),
        }
    }

    /// Make the next transaction fail at the given point
    pub fn fail_next(&self, point: FailurePoint) {
        if let Ok(mut failure) = self.failure.write() {
            *failure = Some(point);
        }
    }

    /// Register a branch
    pub fn add_branch(&self, branch: Branch) {
        if let Ok(mut directory) = self.directory.write() {
            directory.branches.insert(branch.id.clone(), branch);
        }
    }

    /// Register or replace an employee
    pub fn add_employee(&self, employee: Employee) {
        if let Ok(mut directory) = self.directory.write() {
            directory.employees.insert(employee.id.clone(), employee);
        }
    }

    /// Register a benefit
    pub fn add_benefit(&self, benefit: Benefit) {
        if let Ok(mut directory) = self.directory.write() {
            directory.benefits.insert(benefit.id.clone(), benefit);
        }
    }

    /// Link a benefit to an employee
    pub fn add_employee_benefit(&self, link: EmployeeBenefit) {
        if let Ok(mut directory) = self.directory.write() {
            directory.employee_benefits.push(link);
        }
    }

    /// Number of balance rows stored for a branch
    pub async fn balance_rows(&self, branch_id: &str) -> usize {
        let state = self.state.lock().await;
        state
            .balances
            .values()
            .filter(|b| b.branch_id == branch_id)
            .count()
    }

    /// Every title including soft-deleted ones
    pub async fn all_titles(&self, kind: TitleKind) -> Vec<FinancialTitle> {
        let state = self.state.lock().await;
        state
            .titles
            .values()
            .filter(|t| t.kind == kind)
            .cloned()
            .collect()
    }

    /// Number of ledger entries across all branches
    pub async fn transaction_count(&self) -> usize {
        self.state.lock().await.transactions.len()
    }

    fn read_directory<T>(&self, f: impl FnOnce(&DirectoryState) -> T) -> FinanceResult<T> {
        self.directory
            .read()
            .map(|directory| f(&directory))
            .map_err(|_| FinanceError::Storage("Directory lock poisoned".to_string()))
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Transaction over [`MemoryStorage`]: writes go to a staged copy that
/// replaces the shared state on commit
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<FinanceState>,
    staged: FinanceState,
    failure: Option<FailurePoint>,
}

impl MemoryTransaction {
    fn check_failure(&self, point: FailurePoint) -> FinanceResult<()> {
        if self.failure == Some(point) {
            return Err(FinanceError::Storage(format!(
                "Injected failure at {:?}",
                point
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageTransaction for MemoryTransaction {
    async fn lock_branch_balance(
        &mut self,
        branch_id: &str,
    ) -> FinanceResult<Option<BranchBalance>> {
        Ok(self.staged.balances.get(branch_id).cloned())
    }

    async fn insert_branch_balance(&mut self, balance: &BranchBalance) -> FinanceResult<()> {
        if self.staged.balances.contains_key(&balance.branch_id) {
            return Err(FinanceError::Duplicate(format!(
                "Balance for branch '{}' already exists",
                balance.branch_id
            )));
        }
        self.staged
            .balances
            .insert(balance.branch_id.clone(), balance.clone());
        Ok(())
    }

    async fn update_branch_balance(&mut self, balance: &BranchBalance) -> FinanceResult<()> {
        self.check_failure(FailurePoint::UpdateBalance)?;
        match self.staged.balances.get_mut(&balance.branch_id) {
            Some(existing) => {
                *existing = balance.clone();
                Ok(())
            }
            None => Err(FinanceError::NotFound(format!(
                "Balance for branch '{}'",
                balance.branch_id
            ))),
        }
    }

    async fn insert_adjustment(&mut self, adjustment: &BalanceAdjustment) -> FinanceResult<()> {
        self.staged.adjustments.push(adjustment.clone());
        Ok(())
    }

    async fn get_title(
        &mut self,
        kind: TitleKind,
        id: &str,
    ) -> FinanceResult<Option<FinancialTitle>> {
        Ok(self.staged.live_title(kind, id).cloned())
    }

    async fn insert_title(&mut self, title: &FinancialTitle) -> FinanceResult<()> {
        self.check_failure(FailurePoint::InsertTitle)?;
        if self.staged.titles.contains_key(&title.id) {
            return Err(FinanceError::Duplicate(format!(
                "Title '{}' already exists",
                title.id
            )));
        }
        if self.staged.document_taken(title) {
            return Err(FinanceError::Duplicate(format!(
                "Document number '{}' already used in branch '{}'",
                title.document_number.as_deref().unwrap_or_default(),
                title.branch_id
            )));
        }
        self.staged.titles.insert(title.id.clone(), title.clone());
        Ok(())
    }

    async fn update_title(&mut self, title: &FinancialTitle) -> FinanceResult<()> {
        if !self.staged.titles.contains_key(&title.id) {
            return Err(FinanceError::NotFound(format!(
                "{} '{}'",
                title.kind.label(),
                title.id
            )));
        }
        if self.staged.document_taken(title) {
            return Err(FinanceError::Duplicate(format!(
                "Document number '{}' already used in branch '{}'",
                title.document_number.as_deref().unwrap_or_default(),
                title.branch_id
            )));
        }
        self.staged.titles.insert(title.id.clone(), title.clone());
        Ok(())
    }

    async fn insert_transaction(
        &mut self,
        transaction: &FinancialTransaction,
    ) -> FinanceResult<()> {
        self.check_failure(FailurePoint::InsertTransaction)?;
        self.staged.transactions.push(transaction.clone());
        Ok(())
    }

    async fn commit(self) -> FinanceResult<()> {
        self.check_failure(FailurePoint::Commit)?;
        let MemoryTransaction {
            mut guard, staged, ..
        } = self;
        *guard = staged;
        Ok(())
    }
}

#[async_trait]
impl FinanceStorage for MemoryStorage {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> FinanceResult<MemoryTransaction> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        let failure = self
            .failure
            .write()
            .map_err(|_| FinanceError::Storage("Failure lock poisoned".to_string()))?
            .take();
        Ok(MemoryTransaction {
            guard,
            staged,
            failure,
        })
    }

    async fn get_branch_balance(&self, branch_id: &str) -> FinanceResult<Option<BranchBalance>> {
        Ok(self.state.lock().await.balances.get(branch_id).cloned())
    }

    async fn list_adjustments(
        &self,
        branch_balance_id: &str,
        page: PageRequest,
    ) -> FinanceResult<Page<BalanceAdjustment>> {
        let state = self.state.lock().await;
        // Insertion order is chronological; newest first
        let adjustments: Vec<BalanceAdjustment> = state
            .adjustments
            .iter()
            .rev()
            .filter(|a| a.branch_balance_id == branch_balance_id)
            .cloned()
            .collect();
        Ok(Page::from_vec(adjustments, page))
    }

    async fn get_title(&self, kind: TitleKind, id: &str) -> FinanceResult<Option<FinancialTitle>> {
        Ok(self.state.lock().await.live_title(kind, id).cloned())
    }

    async fn find_title_by_document(
        &self,
        kind: TitleKind,
        branch_id: &str,
        document_number: &str,
    ) -> FinanceResult<Option<FinancialTitle>> {
        let state = self.state.lock().await;
        Ok(state
            .titles
            .values()
            .find(|t| {
                t.kind == kind
                    && !t.is_deleted()
                    && t.branch_id == branch_id
                    && t.document_number.as_deref() == Some(document_number)
            })
            .cloned())
    }

    async fn find_titles(
        &self,
        kind: TitleKind,
        filter: &TitleFilter,
        page: PageRequest,
    ) -> FinanceResult<Page<FinancialTitle>> {
        let state = self.state.lock().await;
        Ok(Page::from_vec(state.filtered_titles(kind, filter), page))
    }

    async fn aggregate_titles(
        &self,
        kind: TitleKind,
        filter: &TitleFilter,
    ) -> FinanceResult<Vec<StatusAggregate>> {
        let state = self.state.lock().await;
        let mut groups: HashMap<TitleStatus, (BigDecimal, u64)> = HashMap::new();

        for title in state
            .titles
            .values()
            .filter(|t| t.kind == kind && !t.is_deleted() && filter.matches(t))
        {
            let entry = groups
                .entry(title.status)
                .or_insert_with(|| (BigDecimal::from(0), 0));
            entry.0 += &title.amount;
            entry.1 += 1;
        }

        Ok(groups
            .into_iter()
            .map(|(status, (total, count))| StatusAggregate {
                status,
                total,
                count,
            })
            .collect())
    }

    async fn get_transaction(&self, id: &str) -> FinanceResult<Option<FinancialTransaction>> {
        let state = self.state.lock().await;
        Ok(state.transactions.iter().find(|t| t.id == id).cloned())
    }

    async fn list_transactions(
        &self,
        branch_id: &str,
        page: PageRequest,
    ) -> FinanceResult<Page<FinancialTransaction>> {
        let state = self.state.lock().await;
        let transactions: Vec<FinancialTransaction> = state
            .transactions
            .iter()
            .rev()
            .filter(|t| t.branch_id == branch_id)
            .cloned()
            .collect();
        Ok(Page::from_vec(transactions, page))
    }
}

#[async_trait]
impl StaffDirectory for MemoryStorage {
    async fn get_branch(&self, branch_id: &str) -> FinanceResult<Option<Branch>> {
        self.read_directory(|d| d.branches.get(branch_id).cloned())
    }

    async fn get_employee(&self, employee_id: &str) -> FinanceResult<Option<Employee>> {
        self.read_directory(|d| {
            d.employees
                .get(employee_id)
                .filter(|e| e.deleted_at.is_none())
                .cloned()
        })
    }

    async fn list_active_employees(
        &self,
        branch_id: Option<&str>,
    ) -> FinanceResult<Vec<Employee>> {
        self.read_directory(|d| {
            let mut employees: Vec<Employee> = d
                .employees
                .values()
                .filter(|e| e.active && e.deleted_at.is_none())
                .filter(|e| branch_id.is_none_or(|b| e.branch_id == b))
                .cloned()
                .collect();
            employees.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
            employees
        })
    }

    async fn list_active_benefits(
        &self,
        employee_ids: &[String],
    ) -> FinanceResult<Vec<BenefitAssignment>> {
        self.read_directory(|d| {
            d.employee_benefits
                .iter()
                .filter(|link| link.active && link.deleted_at.is_none())
                .filter(|link| employee_ids.contains(&link.employee_id))
                .filter_map(|link| {
                    d.benefits.get(&link.benefit_id).map(|benefit| BenefitAssignment {
                        link: link.clone(),
                        benefit: benefit.clone(),
                    })
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn payable(document: &str) -> FinancialTitle {
        let mut input = NewTitle::new(
            "Fuel",
            BigDecimal::from(10),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            "branch-1",
        );
        input.document_number = Some(document.to_string());
        FinancialTitle::new(
            TitleKind::Payable,
            input,
            "company-1".to_string(),
            "user-1".to_string(),
            SystemClock.now(),
        )
    }

    #[tokio::test]
    async fn test_uncommitted_transaction_rolls_back() {
        let storage = MemoryStorage::new();
        {
            let mut tx = storage.begin().await.unwrap();
            tx.insert_title(&payable("NF-1")).await.unwrap();
        }
        assert!(storage.all_titles(TitleKind::Payable).await.is_empty());

        let mut tx = storage.begin().await.unwrap();
        tx.insert_title(&payable("NF-1")).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(storage.all_titles(TitleKind::Payable).await.len(), 1);
    }

    #[tokio::test]
    async fn test_document_number_unique_among_live_titles() {
        let storage = MemoryStorage::new();
        let mut tx = storage.begin().await.unwrap();
        let mut first = payable("NF-1");
        tx.insert_title(&first).await.unwrap();

        let duplicate = tx.insert_title(&payable("NF-1")).await;
        assert!(matches!(duplicate, Err(FinanceError::Duplicate(_))));

        // Receivables have their own namespace
        let mut receivable = payable("NF-1");
        receivable.kind = TitleKind::Receivable;
        tx.insert_title(&receivable).await.unwrap();

        // Soft-deleted rows release the number
        first.deleted_at = Some(SystemClock.now());
        tx.update_title(&first).await.unwrap();
        tx.insert_title(&payable("NF-1")).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let storage = MemoryStorage::new();
        storage.fail_next(FailurePoint::Commit);

        let tx = storage.begin().await.unwrap();
        assert!(matches!(tx.commit().await, Err(FinanceError::Storage(_))));

        let tx = storage.begin().await.unwrap();
        assert!(tx.commit().await.is_ok());
    }

    #[tokio::test]
    async fn test_aggregate_groups_by_status() {
        let storage = MemoryStorage::new();
        let mut tx = storage.begin().await.unwrap();
        tx.insert_title(&payable("A")).await.unwrap();
        tx.insert_title(&payable("B")).await.unwrap();
        let mut cancelled = payable("C");
        cancelled.status = TitleStatus::Cancelled;
        tx.insert_title(&cancelled).await.unwrap();
        tx.commit().await.unwrap();

        let groups = storage
            .aggregate_titles(TitleKind::Payable, &TitleFilter::default())
            .await
            .unwrap();
        let pending = groups
            .iter()
            .find(|g| g.status == TitleStatus::Pending)
            .unwrap();
        assert_eq!(pending.count, 2);
        assert_eq!(pending.total, BigDecimal::from(20));
        assert_eq!(groups.len(), 2);
    }
}
