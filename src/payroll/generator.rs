//! Monthly payroll generation into accounts payable

use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::ledger::SettlementEngine;
use crate::payroll::CostAggregator;
use crate::traits::*;
use crate::types::*;
use crate::utils::calendar::{month_index, previous_month};

/// Input of a payroll run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollRequest {
    pub branch_id: String,
    pub month: u32,
    pub year: i32,
    pub due_date: NaiveDate,
}

/// Outcome for one employee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayrollEntryStatus {
    Created,
    AlreadyExists,
    SkippedNoSalary,
}

/// Per-employee line of a payroll run or preview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollEntry {
    pub employee_id: String,
    pub employee_name: String,
    pub salary: Option<BigDecimal>,
    pub benefit_cost: BigDecimal,
    /// salary + benefit_cost
    pub amount: BigDecimal,
    pub document_number: Option<String>,
    pub status: PayrollEntryStatus,
    /// Payable created by this run
    pub title_id: Option<String>,
}

/// Totals of a payroll run.
///
/// For previews `created` counts the employees that would get a new payable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollResult {
    pub month: u32,
    pub year: i32,
    pub branch_id: Option<String>,
    pub total_employees: u64,
    pub created: u64,
    pub already_exists: u64,
    pub skipped_no_salary: u64,
    /// Sum of the amounts of created (or to-be-created) payables
    pub total_amount: BigDecimal,
    pub details: Vec<PayrollEntry>,
}

impl PayrollResult {
    fn new(month: u32, year: i32, branch_id: Option<String>) -> Self {
        Self {
            month,
            year,
            branch_id,
            total_employees: 0,
            created: 0,
            already_exists: 0,
            skipped_no_salary: 0,
            total_amount: BigDecimal::from(0),
            details: Vec::new(),
        }
    }

    fn record(&mut self, entry: PayrollEntry) {
        self.total_employees += 1;
        match entry.status {
            PayrollEntryStatus::Created => {
                self.created += 1;
                self.total_amount += &entry.amount;
            }
            PayrollEntryStatus::AlreadyExists => self.already_exists += 1,
            PayrollEntryStatus::SkippedNoSalary => self.skipped_no_salary += 1,
        }
        self.details.push(entry);
    }
}

/// Deterministic payable key of an employee's payroll for a month
pub fn payroll_document_number(prefix: &str, month: u32, year: i32, employee_id: &str) -> String {
    format!("{}-{:02}/{:04}-{}", prefix, month, year, employee_id)
}

/// Materializes one pending HR payable per salaried employee and month.
///
/// Re-running a period is a no-op: the document number is unique per branch
/// and a uniqueness violation on insert counts as "already exists".
pub struct PayrollGenerator<S: FinanceStorage> {
    storage: S,
    settlements: SettlementEngine<S>,
    costs: CostAggregator,
    directory: Arc<dyn StaffDirectory>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl<S: FinanceStorage> PayrollGenerator<S> {
    /// Create a new payroll generator
    pub fn new(
        storage: S,
        settlements: SettlementEngine<S>,
        costs: CostAggregator,
        directory: Arc<dyn StaffDirectory>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            storage,
            settlements,
            costs,
            directory,
            clock,
            config,
        }
    }

    /// Accept only the current month or the one before it
    pub fn validate_reference_period(&self, month: u32, year: i32) -> FinanceResult<()> {
        let today = self.clock.today();
        let (previous_year, previous) = previous_month(today.year(), today.month());

        let out_of_range = || {
            FinanceError::InvalidState(format!(
                "Reference period {:02}/{} is out of allowed range: only {:02}/{} or {:02}/{} can be processed",
                month,
                year,
                previous,
                previous_year,
                today.month(),
                today.year()
            ))
        };

        if !(1..=12).contains(&month) {
            return Err(out_of_range());
        }

        let distance = month_index(today.year(), today.month()) - month_index(year, month);
        if !(0..=1).contains(&distance) {
            return Err(out_of_range());
        }

        Ok(())
    }

    fn document_number(&self, month: u32, year: i32, employee_id: &str) -> String {
        payroll_document_number(&self.config.payroll_document_prefix, month, year, employee_id)
    }

    /// Benefit assignments of all employees, grouped by employee
    async fn benefits_by_employee(
        &self,
        employees: &[Employee],
    ) -> FinanceResult<HashMap<String, Vec<BenefitAssignment>>> {
        let ids: Vec<String> = employees
            .iter()
            .filter(|e| e.payable_salary().is_some())
            .map(|e| e.id.clone())
            .collect();

        let mut grouped: HashMap<String, Vec<BenefitAssignment>> = HashMap::new();
        if ids.is_empty() {
            return Ok(grouped);
        }

        for assignment in self.directory.list_active_benefits(&ids).await? {
            grouped
                .entry(assignment.link.employee_id.clone())
                .or_default()
                .push(assignment);
        }
        Ok(grouped)
    }

    /// Price an employee; `None` when there is no salary.
    ///
    /// Benefits are priced over the working days of the clock's current month,
    /// the same figure `CostAggregator` reports, whatever the reference period.
    fn price(
        &self,
        employee: &Employee,
        benefits: &HashMap<String, Vec<BenefitAssignment>>,
    ) -> Option<(BigDecimal, BigDecimal)> {
        let salary = employee.payable_salary()?;
        let today = self.clock.today();
        let assignments = benefits
            .get(&employee.id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let benefit_cost: BigDecimal = self
            .costs
            .benefit_lines(assignments, today.year(), today.month())
            .iter()
            .map(|line| &line.monthly_cost)
            .sum();
        let amount = salary + &benefit_cost;
        Some((benefit_cost, amount))
    }

    fn skipped(employee: &Employee) -> PayrollEntry {
        PayrollEntry {
            employee_id: employee.id.clone(),
            employee_name: employee.name.clone(),
            salary: employee.monthly_salary.clone(),
            benefit_cost: BigDecimal::from(0),
            amount: BigDecimal::from(0),
            document_number: None,
            status: PayrollEntryStatus::SkippedNoSalary,
            title_id: None,
        }
    }

    /// Generate the payroll payables of a branch for a month
    pub async fn process(&self, request: PayrollRequest, actor: &Actor) -> FinanceResult<PayrollResult> {
        let PayrollRequest {
            branch_id,
            month,
            year,
            due_date,
        } = request;

        self.validate_reference_period(month, year)?;

        let branch = self
            .directory
            .get_branch(&branch_id)
            .await?
            .ok_or_else(|| FinanceError::NotFound(format!("Branch '{}'", branch_id)))?;

        let employees = self.directory.list_active_employees(Some(&branch_id)).await?;
        let benefits = self.benefits_by_employee(&employees).await?;

        let mut result = PayrollResult::new(month, year, Some(branch_id.clone()));
        let now = self.clock.now();
        let mut tx = self.storage.begin().await?;

        for employee in &employees {
            let Some((benefit_cost, amount)) = self.price(employee, &benefits) else {
                tracing::debug!(employee_id = %employee.id, "Skipping employee without salary");
                result.record(Self::skipped(employee));
                continue;
            };

            let document_number = self.document_number(month, year, &employee.id);
            let input = NewTitle {
                description: format!(
                    "Folha de pagamento {:02}/{} - {}",
                    month, year, employee.name
                ),
                amount: amount.clone(),
                due_date,
                branch_id: branch_id.clone(),
                company_id: None,
                origin_type: Some(OriginType::Hr),
                origin_id: Some(employee.id.clone()),
                document_number: Some(document_number.clone()),
                notes: None,
            };
            let title = FinancialTitle::new(
                TitleKind::Payable,
                input,
                branch.company_id.clone(),
                actor.id.clone(),
                now,
            );

            let (status, title_id) = match self.settlements.insert_pending_in(&mut tx, &title).await {
                Ok(()) => (PayrollEntryStatus::Created, Some(title.id.clone())),
                Err(FinanceError::Duplicate(_)) => (PayrollEntryStatus::AlreadyExists, None),
                Err(e) => return Err(e),
            };

            tracing::debug!(
                employee_id = %employee.id,
                document_number = %document_number,
                amount = %amount,
                status = ?status,
                "Payroll entry"
            );

            result.record(PayrollEntry {
                employee_id: employee.id.clone(),
                employee_name: employee.name.clone(),
                salary: employee.monthly_salary.clone(),
                benefit_cost,
                amount,
                document_number: Some(document_number),
                status,
                title_id,
            });
        }

        tx.commit().await?;

        tracing::info!(
            branch_id = %branch_id,
            month,
            year,
            total_employees = result.total_employees,
            created = result.created,
            already_exists = result.already_exists,
            skipped_no_salary = result.skipped_no_salary,
            total_amount = %result.total_amount,
            "Processed payroll"
        );

        Ok(result)
    }

    /// What `process` would do for a period, without writing anything
    pub async fn preview(
        &self,
        month: u32,
        year: i32,
        branch_id: Option<&str>,
    ) -> FinanceResult<PayrollResult> {
        crate::utils::validation::validate_month(month)?;

        let employees = self.directory.list_active_employees(branch_id).await?;
        let benefits = self.benefits_by_employee(&employees).await?;
        let mut result = PayrollResult::new(month, year, branch_id.map(str::to_string));

        for employee in &employees {
            let Some((benefit_cost, amount)) = self.price(employee, &benefits) else {
                result.record(Self::skipped(employee));
                continue;
            };

            let document_number = self.document_number(month, year, &employee.id);
            let existing = self
                .storage
                .find_title_by_document(TitleKind::Payable, &employee.branch_id, &document_number)
                .await?;

            let (status, title_id) = match existing {
                Some(title) => (PayrollEntryStatus::AlreadyExists, Some(title.id)),
                None => (PayrollEntryStatus::Created, None),
            };

            result.record(PayrollEntry {
                employee_id: employee.id.clone(),
                employee_name: employee.name.clone(),
                salary: employee.monthly_salary.clone(),
                benefit_cost,
                amount,
                document_number: Some(document_number),
                status,
                title_id,
            });
        }

        Ok(result)
    }
}
