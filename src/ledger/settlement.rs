//! Accounts payable / receivable lifecycle and settlement

use bigdecimal::BigDecimal;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::ledger::WalletLedger;
use crate::traits::*;
use crate::types::*;

/// Operations that require a title to still be pending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Settle,
    Cancel,
    Update,
    Remove,
}

/// Reject anything but `Pending`, with a message specific to the source state
fn ensure_pending(title: &FinancialTitle, operation: Operation) -> FinanceResult<()> {
    let label = title.kind.label();
    let message = match (title.status, operation) {
        (TitleStatus::Pending, _) => return Ok(()),
        (TitleStatus::Cancelled, Operation::Settle) | (TitleStatus::Cancelled, Operation::Cancel) => {
            format!("This {} is already cancelled", label)
        }
        (TitleStatus::Cancelled, Operation::Update) => {
            format!("Cannot update a cancelled {}", label)
        }
        (TitleStatus::Cancelled, Operation::Remove) => {
            format!("Cannot delete a cancelled {}", label)
        }
        (settled, Operation::Settle) => {
            format!("This {} is already settled ({:?})", label, settled)
        }
        (TitleStatus::Paid, Operation::Cancel) => {
            format!("Cannot cancel an {} that has already been paid", label)
        }
        (_, Operation::Cancel) => {
            format!("Cannot cancel an {} that has already been received", label)
        }
        (_, Operation::Update) => format!("Cannot update a settled {}", label),
        (_, Operation::Remove) => format!("Cannot delete a settled {}", label),
    };
    Err(FinanceError::InvalidState(message))
}

/// Lifecycle engine for payables and receivables.
///
/// Settlement writes the ledger entry, the status change and the balance
/// movement in one storage transaction.
pub struct SettlementEngine<S: FinanceStorage> {
    storage: S,
    wallet: WalletLedger<S>,
    directory: Arc<dyn StaffDirectory>,
    clock: Arc<dyn Clock>,
    validator: Arc<dyn TitleValidator>,
    config: EngineConfig,
}

impl<S: FinanceStorage + Clone> Clone for SettlementEngine<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            wallet: self.wallet.clone(),
            directory: Arc::clone(&self.directory),
            clock: Arc::clone(&self.clock),
            validator: Arc::clone(&self.validator),
            config: self.config.clone(),
        }
    }
}

impl<S: FinanceStorage + Clone> SettlementEngine<S> {
    /// Create a new settlement engine
    pub fn new(storage: S, directory: Arc<dyn StaffDirectory>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(storage, directory, clock, EngineConfig::default())
    }

    /// Create a new settlement engine with custom configuration
    pub fn with_config(
        storage: S,
        directory: Arc<dyn StaffDirectory>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let wallet = WalletLedger::with_config(
            storage.clone(),
            Arc::clone(&directory),
            Arc::clone(&clock),
            config.clone(),
        );
        Self {
            storage,
            wallet,
            directory,
            clock,
            validator: Arc::new(DefaultTitleValidator),
            config,
        }
    }

    /// Replace the title validator
    pub fn with_validator(mut self, validator: Arc<dyn TitleValidator>) -> Self {
        self.validator = validator;
        self
    }
}

impl<S: FinanceStorage> SettlementEngine<S> {
    /// Wallet used for balance checks and movements
    pub fn wallet(&self) -> &WalletLedger<S> {
        &self.wallet
    }

    /// Create a pending payable or receivable
    pub async fn create(
        &self,
        kind: TitleKind,
        input: NewTitle,
        actor: &Actor,
    ) -> FinanceResult<FinancialTitle> {
        self.validator.validate_new(&input)?;

        let branch = self
            .directory
            .get_branch(&input.branch_id)
            .await?
            .ok_or_else(|| FinanceError::NotFound(format!("Branch '{}'", input.branch_id)))?;

        if let Some(ref company_id) = input.company_id {
            if *company_id != branch.company_id {
                return Err(FinanceError::Validation(format!(
                    "Branch '{}' does not belong to company '{}'",
                    branch.id, company_id
                )));
            }
        }

        let title = FinancialTitle::new(
            kind,
            input,
            branch.company_id,
            actor.id.clone(),
            self.clock.now(),
        );

        let mut tx = self.storage.begin().await?;
        self.insert_pending_in(&mut tx, &title).await?;
        tx.commit().await?;

        tracing::info!(
            title_id = %title.id,
            kind = ?kind,
            branch_id = %title.branch_id,
            amount = %title.amount,
            "Created {}",
            kind.label()
        );

        Ok(title)
    }

    /// Insert a pending title inside `tx`; `Duplicate` signals a document
    /// number already in use
    pub(crate) async fn insert_pending_in(
        &self,
        tx: &mut S::Tx,
        title: &FinancialTitle,
    ) -> FinanceResult<()> {
        if title.status != TitleStatus::Pending {
            return Err(FinanceError::InvalidState(format!(
                "New {} must start pending",
                title.kind.label()
            )));
        }
        tx.insert_title(title).await
    }

    /// Get a title by ID
    pub async fn find_one(&self, kind: TitleKind, id: &str) -> FinanceResult<FinancialTitle> {
        self.storage
            .get_title(kind, id)
            .await?
            .ok_or_else(|| FinanceError::NotFound(format!("{} '{}'", kind.label(), id)))
    }

    /// List titles matching a filter
    pub async fn find_all(
        &self,
        kind: TitleKind,
        filter: &TitleFilter,
        page: Option<PageRequest>,
    ) -> FinanceResult<Page<FinancialTitle>> {
        let page = page
            .unwrap_or_else(|| self.config.default_page())
            .normalized(self.config.max_page_size);
        self.storage.find_titles(kind, filter, page).await
    }

    /// Patch a pending title
    pub async fn update(
        &self,
        kind: TitleKind,
        id: &str,
        update: TitleUpdate,
        actor: &Actor,
    ) -> FinanceResult<FinancialTitle> {
        self.validator.validate_update(&update)?;

        let mut tx = self.storage.begin().await?;
        let mut title = self.load_in(&mut tx, kind, id).await?;
        ensure_pending(&title, Operation::Update)?;

        if let Some(description) = update.description {
            title.description = description;
        }
        if let Some(amount) = update.amount {
            title.amount = amount;
        }
        if let Some(due_date) = update.due_date {
            title.due_date = due_date;
        }
        if let Some(document_number) = update.document_number {
            title.document_number = Some(document_number);
        }
        if let Some(notes) = update.notes {
            title.notes = Some(notes);
        }
        title.touch(&actor.id, self.clock.now());

        tx.update_title(&title).await?;
        tx.commit().await?;

        tracing::info!(title_id = %title.id, kind = ?kind, "Updated {}", kind.label());
        Ok(title)
    }

    /// Soft delete a pending title
    pub async fn remove(&self, kind: TitleKind, id: &str, actor: &Actor) -> FinanceResult<FinancialTitle> {
        let mut tx = self.storage.begin().await?;
        let mut title = self.load_in(&mut tx, kind, id).await?;
        ensure_pending(&title, Operation::Remove)?;

        title.touch(&actor.id, self.clock.now());
        title.deleted_at = Some(title.updated_at);
        title.deleted_by = Some(actor.id.clone());

        tx.update_title(&title).await?;
        tx.commit().await?;

        tracing::info!(title_id = %title.id, kind = ?kind, "Deleted {}", kind.label());
        Ok(title)
    }

    /// Move a pending title to `Cancelled`
    pub async fn cancel(&self, kind: TitleKind, id: &str, actor: &Actor) -> FinanceResult<FinancialTitle> {
        let mut tx = self.storage.begin().await?;
        let mut title = self.load_in(&mut tx, kind, id).await?;
        if let Err(e) = ensure_pending(&title, Operation::Cancel) {
            tracing::warn!(title_id = %id, status = ?title.status, "Rejected cancellation");
            return Err(e);
        }

        title.status = TitleStatus::Cancelled;
        title.touch(&actor.id, self.clock.now());

        tx.update_title(&title).await?;
        tx.commit().await?;

        tracing::info!(title_id = %title.id, kind = ?kind, "Cancelled {}", kind.label());
        Ok(title)
    }

    /// Pay an account payable
    pub async fn pay(&self, id: &str, request: SettleRequest, actor: &Actor) -> FinanceResult<FinancialTitle> {
        self.settle(TitleKind::Payable, id, request, actor).await
    }

    /// Receive an account receivable. Receiving never requires funds.
    pub async fn receive(
        &self,
        id: &str,
        request: SettleRequest,
        actor: &Actor,
    ) -> FinanceResult<FinancialTitle> {
        self.settle(TitleKind::Receivable, id, request, actor).await
    }

    async fn settle(
        &self,
        kind: TitleKind,
        id: &str,
        request: SettleRequest,
        actor: &Actor,
    ) -> FinanceResult<FinancialTitle> {
        let title = self.find_one(kind, id).await?;
        if let Err(e) = ensure_pending(&title, Operation::Settle) {
            tracing::warn!(title_id = %id, status = ?title.status, "Rejected settlement");
            return Err(e);
        }

        if kind == TitleKind::Payable {
            let check = self
                .wallet
                .check_sufficient_balance(&title.branch_id, &title.amount)
                .await?;
            if !check.sufficient {
                return Err(insufficient(&title, &check.current_balance));
            }
        }

        let mut tx = self.storage.begin().await?;

        // Re-read under the transaction so a concurrent settlement loses
        let mut title = self.load_in(&mut tx, kind, id).await?;
        ensure_pending(&title, Operation::Settle)?;

        if kind == TitleKind::Payable {
            let balance = self.wallet.ensure_balance_in(&mut tx, &title.branch_id).await?;
            if balance.balance < title.amount {
                return Err(insufficient(&title, &balance.balance));
            }
        }

        let date = request
            .settlement_date
            .unwrap_or_else(|| self.clock.today());
        let transaction =
            FinancialTransaction::for_settlement(&title, date, &actor.id, self.clock.now());
        tx.insert_transaction(&transaction).await?;

        title.status = kind.settled_status();
        title.settlement_date = Some(date);
        title.financial_transaction_id = Some(transaction.id.clone());
        if let Some(notes) = request.notes {
            title.notes = Some(notes);
        }
        title.touch(&actor.id, self.clock.now());
        tx.update_title(&title).await?;

        let balance = self
            .wallet
            .apply_delta_in(&mut tx, &title.branch_id, &title.amount, kind.is_income())
            .await?;

        tx.commit().await?;

        tracing::info!(
            title_id = %title.id,
            kind = ?kind,
            branch_id = %title.branch_id,
            amount = %title.amount,
            transaction_id = %transaction.id,
            new_balance = %balance.balance,
            "Settled {}",
            kind.label()
        );

        Ok(title)
    }

    /// Totals per status plus a page of matching titles
    pub async fn get_summary(
        &self,
        kind: TitleKind,
        filter: &TitleFilter,
        page: Option<PageRequest>,
    ) -> FinanceResult<TitleSummary> {
        let aggregates = self.storage.aggregate_titles(kind, filter).await?;

        let mut pending = StatusTotals::default();
        let mut settled = StatusTotals::default();
        let mut cancelled = StatusTotals::default();
        for aggregate in aggregates {
            let bucket = match aggregate.status {
                TitleStatus::Pending => &mut pending,
                TitleStatus::Paid | TitleStatus::Received => &mut settled,
                TitleStatus::Cancelled => &mut cancelled,
            };
            bucket.total += aggregate.total;
            bucket.count += aggregate.count;
        }

        let items = self.find_all(kind, filter, page).await?;

        Ok(TitleSummary {
            kind,
            pending,
            settled,
            cancelled,
            items,
        })
    }

    /// Payables and receivables side by side with the pending net position
    pub async fn get_financial_summary(&self, filter: &TitleFilter) -> FinanceResult<FinancialSummary> {
        let payables = self.get_summary(TitleKind::Payable, filter, None).await?;
        let receivables = self.get_summary(TitleKind::Receivable, filter, None).await?;

        let total_payable = payables.pending.total.clone();
        let total_receivable = receivables.pending.total.clone();
        let net_balance = &total_receivable - &total_payable;

        Ok(FinancialSummary {
            payables,
            receivables,
            total_payable,
            total_receivable,
            net_balance,
        })
    }

    /// Get a ledger entry by ID
    pub async fn get_transaction(&self, id: &str) -> FinanceResult<FinancialTransaction> {
        self.storage
            .get_transaction(id)
            .await?
            .ok_or_else(|| FinanceError::NotFound(format!("Financial transaction '{}'", id)))
    }

    /// Ledger entries of a branch, newest first
    pub async fn list_transactions(
        &self,
        branch_id: &str,
        page: Option<PageRequest>,
    ) -> FinanceResult<Page<FinancialTransaction>> {
        let page = page
            .unwrap_or_else(|| self.config.default_page())
            .normalized(self.config.max_page_size);
        self.storage.list_transactions(branch_id, page).await
    }

    async fn load_in(&self, tx: &mut S::Tx, kind: TitleKind, id: &str) -> FinanceResult<FinancialTitle> {
        tx.get_title(kind, id)
            .await?
            .ok_or_else(|| FinanceError::NotFound(format!("{} '{}'", kind.label(), id)))
    }
}

fn insufficient(title: &FinancialTitle, current: &BigDecimal) -> FinanceError {
    tracing::warn!(
        title_id = %title.id,
        branch_id = %title.branch_id,
        amount = %title.amount,
        current_balance = %current,
        "Rejected payment: insufficient balance"
    );
    FinanceError::InvalidState(format!(
        "Insufficient balance: branch has {}, payment requires {}",
        current, title.amount
    ))
}
