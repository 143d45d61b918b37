//! Per-branch cash balance and its adjustment history

use bigdecimal::BigDecimal;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::traits::*;
use crate::types::*;

/// Owner of every branch balance.
///
/// Balances are created lazily on first access and only ever change through
/// [`WalletLedger::adjust_balance`] (absolute, admin-only, audited) or a
/// signed delta applied by [`WalletLedger::update_balance`] and settlements.
pub struct WalletLedger<S: FinanceStorage> {
    storage: S,
    directory: Arc<dyn StaffDirectory>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl<S: FinanceStorage + Clone> Clone for WalletLedger<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            directory: Arc::clone(&self.directory),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
        }
    }
}

impl<S: FinanceStorage> WalletLedger<S> {
    /// Create a new wallet ledger
    pub fn new(storage: S, directory: Arc<dyn StaffDirectory>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(storage, directory, clock, EngineConfig::default())
    }

    /// Create a new wallet ledger with custom configuration
    pub fn with_config(
        storage: S,
        directory: Arc<dyn StaffDirectory>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            storage,
            directory,
            clock,
            config,
        }
    }

    /// Get the balance of a branch, creating a zero balance on first access
    pub async fn get_or_create_balance(&self, branch_id: &str) -> FinanceResult<BalanceSnapshot> {
        let balance = match self.storage.get_branch_balance(branch_id).await? {
            Some(balance) => balance,
            None => self.create_balance(branch_id).await?,
        };
        self.snapshot(balance).await
    }

    async fn create_balance(&self, branch_id: &str) -> FinanceResult<BranchBalance> {
        self.require_branch(branch_id).await?;

        let mut tx = self.storage.begin().await?;
        if let Some(existing) = tx.lock_branch_balance(branch_id).await? {
            return Ok(existing);
        }

        let balance = BranchBalance::new(branch_id.to_string(), self.clock.now());
        match tx.insert_branch_balance(&balance).await {
            Ok(()) => {
                tx.commit().await?;
                tracing::info!(branch_id = %branch_id, "Created branch balance");
                Ok(balance)
            }
            // Another caller created it first; theirs is the row
            Err(FinanceError::Duplicate(_)) => {
                drop(tx);
                self.storage
                    .get_branch_balance(branch_id)
                    .await?
                    .ok_or_else(|| {
                        FinanceError::Storage(format!(
                            "Balance for branch '{}' vanished after conflict",
                            branch_id
                        ))
                    })
            }
            Err(e) => Err(e),
        }
    }

    /// Set the balance of a branch to an absolute value, recording an adjustment
    pub async fn adjust_balance(
        &self,
        branch_id: &str,
        new_balance: BigDecimal,
        adjustment_type: AdjustmentType,
        reason: Option<String>,
        actor: &Actor,
    ) -> FinanceResult<BalanceSnapshot> {
        if !actor.is_admin {
            tracing::warn!(
                branch_id = %branch_id,
                actor_id = %actor.id,
                "Rejected balance adjustment from non-admin"
            );
            return Err(FinanceError::Forbidden(
                "Only administrators can adjust branch balances".to_string(),
            ));
        }

        let mut tx = self.storage.begin().await?;
        let mut balance = self.ensure_balance_in(&mut tx, branch_id).await?;

        let adjustment = BalanceAdjustment {
            id: uuid::Uuid::new_v4().to_string(),
            branch_balance_id: balance.id.clone(),
            previous_balance: balance.balance.clone(),
            new_balance: new_balance.clone(),
            adjustment_type,
            reason,
            created_at: self.clock.now(),
            created_by: actor.id.clone(),
        };

        balance.balance = new_balance;
        balance.updated_at = adjustment.created_at;

        tx.insert_adjustment(&adjustment).await?;
        tx.update_branch_balance(&balance).await?;
        tx.commit().await?;

        tracing::info!(
            branch_id = %branch_id,
            actor_id = %actor.id,
            previous_balance = %adjustment.previous_balance,
            new_balance = %adjustment.new_balance,
            adjustment_type = ?adjustment.adjustment_type,
            "Adjusted branch balance"
        );

        self.snapshot(balance).await
    }

    /// Apply a signed movement: `+amount` for income, `-amount` otherwise.
    /// The balance may go negative.
    pub async fn update_balance(
        &self,
        branch_id: &str,
        amount: &BigDecimal,
        is_income: bool,
    ) -> FinanceResult<()> {
        let mut tx = self.storage.begin().await?;
        self.apply_delta_in(&mut tx, branch_id, amount, is_income)
            .await?;
        tx.commit().await
    }

    /// Whether the branch holds at least `amount`
    pub async fn check_sufficient_balance(
        &self,
        branch_id: &str,
        amount: &BigDecimal,
    ) -> FinanceResult<BalanceCheck> {
        let snapshot = self.get_or_create_balance(branch_id).await?;
        let current_balance = snapshot.balance.balance;
        Ok(BalanceCheck {
            sufficient: *amount == BigDecimal::from(0) || current_balance >= *amount,
            current_balance,
        })
    }

    /// Adjustment history of a branch, newest first
    pub async fn get_adjustment_history(
        &self,
        branch_id: &str,
        page: PageRequest,
    ) -> FinanceResult<Page<BalanceAdjustment>> {
        let snapshot = self.get_or_create_balance(branch_id).await?;
        self.storage
            .list_adjustments(
                &snapshot.balance.id,
                page.normalized(self.config.max_page_size),
            )
            .await
    }

    /// Lock the balance row inside `tx`, creating it when missing
    pub(crate) async fn ensure_balance_in(
        &self,
        tx: &mut S::Tx,
        branch_id: &str,
    ) -> FinanceResult<BranchBalance> {
        if let Some(balance) = tx.lock_branch_balance(branch_id).await? {
            return Ok(balance);
        }

        self.require_branch(branch_id).await?;
        let balance = BranchBalance::new(branch_id.to_string(), self.clock.now());
        tx.insert_branch_balance(&balance).await?;
        tracing::info!(branch_id = %branch_id, "Created branch balance");
        Ok(balance)
    }

    /// Apply a signed movement inside `tx`
    pub(crate) async fn apply_delta_in(
        &self,
        tx: &mut S::Tx,
        branch_id: &str,
        amount: &BigDecimal,
        is_income: bool,
    ) -> FinanceResult<BranchBalance> {
        let mut balance = self.ensure_balance_in(tx, branch_id).await?;
        let previous = balance.balance.clone();
        balance.apply_delta(amount, is_income, self.clock.now());
        tx.update_branch_balance(&balance).await?;

        tracing::debug!(
            branch_id = %branch_id,
            amount = %amount,
            is_income,
            previous_balance = %previous,
            new_balance = %balance.balance,
            "Applied balance delta"
        );

        Ok(balance)
    }

    async fn require_branch(&self, branch_id: &str) -> FinanceResult<Branch> {
        self.directory
            .get_branch(branch_id)
            .await?
            .ok_or_else(|| FinanceError::NotFound(format!("Branch '{}'", branch_id)))
    }

    async fn snapshot(&self, balance: BranchBalance) -> FinanceResult<BalanceSnapshot> {
        let recent = self
            .storage
            .list_adjustments(
                &balance.id,
                PageRequest::new(1, self.config.recent_adjustments_limit.max(1)),
            )
            .await?;
        Ok(BalanceSnapshot {
            balance,
            recent_adjustments: recent.items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::{FailurePoint, MemoryStorage};

    fn wallet() -> (MemoryStorage, WalletLedger<MemoryStorage>) {
        let storage = MemoryStorage::new();
        storage.add_branch(Branch {
            id: "branch-1".to_string(),
            name: "Matriz".to_string(),
            company_id: "company-1".to_string(),
        });
        let directory: Arc<dyn StaffDirectory> = Arc::new(storage.clone());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(2024, 3, 15).unwrap());
        (storage.clone(), WalletLedger::new(storage, directory, clock))
    }

    #[tokio::test]
    async fn test_lazy_creation() {
        let (storage, wallet) = wallet();

        let snapshot = wallet.get_or_create_balance("branch-1").await.unwrap();
        assert_eq!(snapshot.balance.balance, BigDecimal::from(0));
        assert!(snapshot.recent_adjustments.is_empty());

        wallet.get_or_create_balance("branch-1").await.unwrap();
        assert_eq!(storage.balance_rows("branch-1").await, 1);
    }

    #[tokio::test]
    async fn test_unknown_branch() {
        let (_, wallet) = wallet();
        let result = wallet.get_or_create_balance("missing").await;
        assert!(matches!(result, Err(FinanceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_adjust_requires_admin() {
        let (_, wallet) = wallet();
        let result = wallet
            .adjust_balance(
                "branch-1",
                BigDecimal::from(500),
                AdjustmentType::ManualAdjustment,
                None,
                &Actor::user("clerk"),
            )
            .await;
        assert!(matches!(result, Err(FinanceError::Forbidden(_))));

        let snapshot = wallet.get_or_create_balance("branch-1").await.unwrap();
        assert_eq!(snapshot.balance.balance, BigDecimal::from(0));
    }

    #[tokio::test]
    async fn test_adjust_sets_absolute_balance() {
        let (_, wallet) = wallet();
        let admin = Actor::admin("admin");

        wallet
            .adjust_balance(
                "branch-1",
                BigDecimal::from(10000),
                AdjustmentType::InitialBalance,
                Some("Opening".to_string()),
                &admin,
            )
            .await
            .unwrap();
        let snapshot = wallet
            .adjust_balance(
                "branch-1",
                BigDecimal::from(7500),
                AdjustmentType::Correction,
                None,
                &admin,
            )
            .await
            .unwrap();

        assert_eq!(snapshot.balance.balance, BigDecimal::from(7500));
        assert_eq!(snapshot.recent_adjustments.len(), 2);
        let latest = &snapshot.recent_adjustments[0];
        assert_eq!(latest.previous_balance, BigDecimal::from(10000));
        assert_eq!(latest.new_balance, BigDecimal::from(7500));
        assert_eq!(latest.adjustment_type, AdjustmentType::Correction);
        assert_eq!(latest.created_by, "admin");
        assert_eq!(latest.created_at, FixedClock::on(2024, 3, 15).unwrap().now());
        assert_eq!(snapshot.balance.updated_at, latest.created_at);
    }

    #[tokio::test]
    async fn test_failed_adjustment_leaves_no_audit_row() {
        let (storage, wallet) = wallet();
        wallet.get_or_create_balance("branch-1").await.unwrap();

        storage.fail_next(FailurePoint::UpdateBalance);
        let result = wallet
            .adjust_balance(
                "branch-1",
                BigDecimal::from(100),
                AdjustmentType::ManualAdjustment,
                None,
                &Actor::admin("admin"),
            )
            .await;
        assert!(matches!(result, Err(FinanceError::Storage(_))));

        let history = wallet
            .get_adjustment_history("branch-1", PageRequest::new(1, 10))
            .await
            .unwrap();
        assert_eq!(history.total, 0);
    }

    #[tokio::test]
    async fn test_update_balance_allows_overdraft() {
        let (_, wallet) = wallet();

        wallet
            .update_balance("branch-1", &BigDecimal::from(300), true)
            .await
            .unwrap();
        wallet
            .update_balance("branch-1", &BigDecimal::from(1000), false)
            .await
            .unwrap();

        let snapshot = wallet.get_or_create_balance("branch-1").await.unwrap();
        assert_eq!(snapshot.balance.balance, BigDecimal::from(-700));
    }

    #[tokio::test]
    async fn test_check_sufficient_balance() {
        let (_, wallet) = wallet();
        wallet
            .adjust_balance(
                "branch-1",
                BigDecimal::from(10000),
                AdjustmentType::InitialBalance,
                None,
                &Actor::admin("admin"),
            )
            .await
            .unwrap();

        let check = wallet
            .check_sufficient_balance("branch-1", &BigDecimal::from(15000))
            .await
            .unwrap();
        assert!(!check.sufficient);
        assert_eq!(check.current_balance, BigDecimal::from(10000));

        let check = wallet
            .check_sufficient_balance("branch-1", &BigDecimal::from(10000))
            .await
            .unwrap();
        assert!(check.sufficient);
    }

    #[tokio::test]
    async fn test_zero_amount_is_always_sufficient() {
        let (_, wallet) = wallet();
        wallet
            .update_balance("branch-1", &BigDecimal::from(50), false)
            .await
            .unwrap();

        let check = wallet
            .check_sufficient_balance("branch-1", &BigDecimal::from(0))
            .await
            .unwrap();
        assert!(check.sufficient);
        assert_eq!(check.current_balance, BigDecimal::from(-50));
    }

    #[tokio::test]
    async fn test_negative_amount_compares_against_balance() {
        let (_, wallet) = wallet();
        wallet
            .update_balance("branch-1", &BigDecimal::from(50), false)
            .await
            .unwrap();

        let check = wallet
            .check_sufficient_balance("branch-1", &BigDecimal::from(-10))
            .await
            .unwrap();
        assert!(!check.sufficient);

        let check = wallet
            .check_sufficient_balance("branch-1", &BigDecimal::from(-60))
            .await
            .unwrap();
        assert!(check.sufficient);
    }
}
