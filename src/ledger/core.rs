//! Main engine that wires the wallet, settlement and payroll services together

use bigdecimal::BigDecimal;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::ledger::{SettlementEngine, WalletLedger};
use crate::payroll::{CostAggregator, CostSummary, EmployeeCost, PayrollGenerator, PayrollRequest, PayrollResult};
use crate::traits::*;
use crate::types::*;

/// Finance back-office for a multi-branch company.
///
/// Every service shares the same storage handle, staff directory and clock.
pub struct FinanceEngine<S: FinanceStorage> {
    settlements: SettlementEngine<S>,
    costs: CostAggregator,
    payroll: PayrollGenerator<S>,
}

impl<S: FinanceStorage + Clone> FinanceEngine<S> {
    /// Create a new engine with the system clock and default configuration
    pub fn new(storage: S, directory: Arc<dyn StaffDirectory>) -> Self {
        Self::with_config(storage, directory, EngineConfig::default(), Arc::new(SystemClock))
    }

    /// Create a new engine with custom configuration and clock
    pub fn with_config(
        storage: S,
        directory: Arc<dyn StaffDirectory>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let settlements = SettlementEngine::with_config(
            storage.clone(),
            Arc::clone(&directory),
            Arc::clone(&clock),
            config.clone(),
        );
        let costs = CostAggregator::new(Arc::clone(&directory), Arc::clone(&clock));
        let payroll = PayrollGenerator::new(
            storage,
            settlements.clone(),
            costs.clone(),
            directory,
            clock,
            config,
        );

        Self {
            settlements,
            costs,
            payroll,
        }
    }

    /// Replace the title validator used by manual title operations
    pub fn with_validator(mut self, validator: Arc<dyn TitleValidator>) -> Self {
        self.settlements = self.settlements.with_validator(validator);
        self
    }
}

impl<S: FinanceStorage> FinanceEngine<S> {
    pub fn wallet(&self) -> &WalletLedger<S> {
        self.settlements.wallet()
    }

    pub fn settlements(&self) -> &SettlementEngine<S> {
        &self.settlements
    }

    pub fn costs(&self) -> &CostAggregator {
        &self.costs
    }

    pub fn payroll(&self) -> &PayrollGenerator<S> {
        &self.payroll
    }

    // Wallet operations
    /// Get the balance of a branch, creating it on first access
    pub async fn get_balance(&self, branch_id: &str) -> FinanceResult<BalanceSnapshot> {
        self.wallet().get_or_create_balance(branch_id).await
    }

    /// Set the balance of a branch to an absolute value (admins only)
    pub async fn adjust_balance(
        &self,
        branch_id: &str,
        new_balance: BigDecimal,
        adjustment_type: AdjustmentType,
        reason: Option<String>,
        actor: &Actor,
    ) -> FinanceResult<BalanceSnapshot> {
        self.wallet()
            .adjust_balance(branch_id, new_balance, adjustment_type, reason, actor)
            .await
    }

    // Title operations
    /// Create a pending account payable
    pub async fn create_payable(&self, input: NewTitle, actor: &Actor) -> FinanceResult<FinancialTitle> {
        self.settlements.create(TitleKind::Payable, input, actor).await
    }

    /// Create a pending account receivable
    pub async fn create_receivable(&self, input: NewTitle, actor: &Actor) -> FinanceResult<FinancialTitle> {
        self.settlements
            .create(TitleKind::Receivable, input, actor)
            .await
    }

    /// Pay an account payable, debiting the branch balance
    pub async fn pay(&self, id: &str, request: SettleRequest, actor: &Actor) -> FinanceResult<FinancialTitle> {
        self.settlements.pay(id, request, actor).await
    }

    /// Receive an account receivable, crediting the branch balance
    pub async fn receive(
        &self,
        id: &str,
        request: SettleRequest,
        actor: &Actor,
    ) -> FinanceResult<FinancialTitle> {
        self.settlements.receive(id, request, actor).await
    }

    /// Payables and receivables totals for a filter
    pub async fn get_financial_summary(&self, filter: &TitleFilter) -> FinanceResult<FinancialSummary> {
        self.settlements.get_financial_summary(filter).await
    }

    // Payroll operations
    /// Cost breakdown of one employee for the current month
    pub async fn employee_cost(&self, employee_id: &str) -> FinanceResult<EmployeeCost> {
        self.costs.employee_cost(employee_id).await
    }

    /// Cost totals across active employees, optionally for one branch
    pub async fn cost_summary(&self, branch_id: Option<&str>) -> FinanceResult<CostSummary> {
        self.costs.summary(branch_id).await
    }

    /// Generate the payroll payables of a branch for a month
    pub async fn process_payroll(
        &self,
        request: PayrollRequest,
        actor: &Actor,
    ) -> FinanceResult<PayrollResult> {
        self.payroll.process(request, actor).await
    }

    /// What a payroll run would do, without writing anything
    pub async fn payroll_preview(
        &self,
        month: u32,
        year: i32,
        branch_id: Option<&str>,
    ) -> FinanceResult<PayrollResult> {
        self.payroll.preview(month, year, branch_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;
    use chrono::NaiveDate;

    fn setup() -> (MemoryStorage, FinanceEngine<MemoryStorage>) {
        let storage = MemoryStorage::new();
        storage.add_branch(Branch {
            id: "branch-1".to_string(),
            name: "Depot".to_string(),
            company_id: "company-1".to_string(),
        });
        let clock = Arc::new(FixedClock::on(2024, 3, 15).unwrap());
        let engine = FinanceEngine::with_config(
            storage.clone(),
            Arc::new(storage.clone()),
            EngineConfig::default(),
            clock,
        );
        (storage, engine)
    }

    #[tokio::test]
    async fn test_engine_round_trip() {
        let (_, engine) = setup();
        let admin = Actor::admin("admin");

        engine
            .adjust_balance(
                "branch-1",
                BigDecimal::from(500),
                AdjustmentType::InitialBalance,
                None,
                &admin,
            )
            .await
            .unwrap();

        let due = NaiveDate::from_ymd_opt(2024, 3, 30).unwrap();
        let receivable = engine
            .create_receivable(
                NewTitle::new("Freight", BigDecimal::from(300), due, "branch-1"),
                &admin,
            )
            .await
            .unwrap();
        let payable = engine
            .create_payable(
                NewTitle::new("Tyres", BigDecimal::from(800), due, "branch-1"),
                &admin,
            )
            .await
            .unwrap();

        let summary = engine
            .get_financial_summary(&TitleFilter::for_branch("branch-1"))
            .await
            .unwrap();
        assert_eq!(summary.net_balance, BigDecimal::from(-500));

        assert!(engine
            .pay(&payable.id, SettleRequest::default(), &admin)
            .await
            .is_err());

        engine
            .receive(&receivable.id, SettleRequest::default(), &admin)
            .await
            .unwrap();
        engine
            .pay(&payable.id, SettleRequest::default(), &admin)
            .await
            .unwrap();

        let balance = engine.get_balance("branch-1").await.unwrap();
        assert_eq!(balance.balance.balance, BigDecimal::from(0));
        assert_eq!(balance.recent_adjustments.len(), 1);
    }
}
