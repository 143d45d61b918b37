//! Employee cost aggregation (salary + benefits + employer taxes)

use bigdecimal::BigDecimal;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::tax::{ContributionBreakdown, TaxCalculator};
use crate::traits::*;
use crate::types::*;
use crate::utils::calendar::working_days;

/// Monthly cost of one benefit for one employee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenefitCostLine {
    pub benefit_id: String,
    pub name: String,
    pub daily_cost: BigDecimal,
    pub working_days: u32,
    /// daily_cost * working_days
    pub monthly_cost: BigDecimal,
    /// Co-payment borne by the employee (informational)
    pub employee_value: BigDecimal,
    pub include_weekends: bool,
}

/// Full monthly cost of one employee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeCost {
    pub employee_id: String,
    pub name: String,
    pub branch_id: String,
    pub year: i32,
    pub month: u32,
    pub salary: BigDecimal,
    pub benefits: Vec<BenefitCostLine>,
    pub monthly_benefit_cost: BigDecimal,
    /// employer INSS + FGTS
    pub total_tax_cost: BigDecimal,
    /// salary + monthly_benefit_cost + total_tax_cost
    pub total_monthly_cost: BigDecimal,
    pub total_annual_cost: BigDecimal,
    pub contributions: ContributionBreakdown,
}

/// Cost totals across every active employee in scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostSummary {
    pub branch_id: Option<String>,
    pub year: i32,
    pub month: u32,
    pub employee_count: u64,
    pub total_salaries: BigDecimal,
    pub total_benefit_cost: BigDecimal,
    pub total_tax_cost: BigDecimal,
    pub total_monthly_cost: BigDecimal,
    pub total_annual_cost: BigDecimal,
}

/// Working-day counts for one month, for both weekend policies
#[derive(Debug, Clone, Copy)]
struct MonthDays {
    weekdays: u32,
    all_days: u32,
}

impl MonthDays {
    fn new(year: i32, month: u32) -> Self {
        Self {
            weekdays: working_days(year, month, false, &[]),
            all_days: working_days(year, month, true, &[]),
        }
    }

    fn for_benefit(&self, benefit: &Benefit) -> u32 {
        if benefit.include_weekends {
            self.all_days
        } else {
            self.weekdays
        }
    }
}

/// Turns directory data into per-employee and fleet-wide cost figures.
/// Read-only.
#[derive(Clone)]
pub struct CostAggregator {
    directory: Arc<dyn StaffDirectory>,
    clock: Arc<dyn Clock>,
    tax: TaxCalculator,
}

impl CostAggregator {
    /// Create a new cost aggregator with the standard contribution table
    pub fn new(directory: Arc<dyn StaffDirectory>, clock: Arc<dyn Clock>) -> Self {
        Self::with_tax_calculator(directory, clock, TaxCalculator::new())
    }

    pub fn with_tax_calculator(
        directory: Arc<dyn StaffDirectory>,
        clock: Arc<dyn Clock>,
        tax: TaxCalculator,
    ) -> Self {
        Self {
            directory,
            clock,
            tax,
        }
    }

    pub fn tax(&self) -> &TaxCalculator {
        &self.tax
    }

    fn current_period(&self) -> (i32, u32) {
        let today = self.clock.today();
        (today.year(), today.month())
    }

    /// Price each benefit assignment for the given month
    pub fn benefit_lines(
        &self,
        assignments: &[BenefitAssignment],
        year: i32,
        month: u32,
    ) -> Vec<BenefitCostLine> {
        let days = MonthDays::new(year, month);
        Self::price_benefits(assignments, days)
    }

    fn price_benefits<'a>(
        assignments: impl IntoIterator<Item = &'a BenefitAssignment>,
        days: MonthDays,
    ) -> Vec<BenefitCostLine> {
        assignments
            .into_iter()
            .map(|assignment| {
                let benefit = &assignment.benefit;
                let working_days = days.for_benefit(benefit);
                BenefitCostLine {
                    benefit_id: benefit.id.clone(),
                    name: benefit.name.clone(),
                    daily_cost: benefit.daily_cost.clone(),
                    working_days,
                    monthly_cost: &benefit.daily_cost * BigDecimal::from(working_days),
                    employee_value: benefit.employee_value.clone(),
                    include_weekends: benefit.include_weekends,
                }
            })
            .collect()
    }

    /// Sum of active benefit costs of one employee for a month
    pub async fn monthly_benefit_cost(
        &self,
        employee_id: &str,
        year: i32,
        month: u32,
    ) -> FinanceResult<BigDecimal> {
        let assignments = self
            .directory
            .list_active_benefits(&[employee_id.to_string()])
            .await?;
        Ok(self
            .benefit_lines(&assignments, year, month)
            .iter()
            .map(|line| &line.monthly_cost)
            .sum())
    }

    /// Cost breakdown of one employee for the current month
    pub async fn employee_cost(&self, employee_id: &str) -> FinanceResult<EmployeeCost> {
        let employee = self
            .directory
            .get_employee(employee_id)
            .await?
            .ok_or_else(|| FinanceError::NotFound(format!("Employee '{}'", employee_id)))?;

        let assignments = self
            .directory
            .list_active_benefits(&[employee.id.clone()])
            .await?;
        let (year, month) = self.current_period();

        Ok(self.build_employee_cost(&employee, &assignments, MonthDays::new(year, month), year, month))
    }

    fn build_employee_cost<'a>(
        &self,
        employee: &Employee,
        assignments: impl IntoIterator<Item = &'a BenefitAssignment>,
        days: MonthDays,
        year: i32,
        month: u32,
    ) -> EmployeeCost {
        let salary = employee
            .monthly_salary
            .clone()
            .unwrap_or_else(|| BigDecimal::from(0));
        let benefits = Self::price_benefits(assignments, days);
        let monthly_benefit_cost: BigDecimal = benefits.iter().map(|b| &b.monthly_cost).sum();
        let total_tax_cost = self.tax.employer_tax_cost(&salary);
        let total_monthly_cost = &salary + &monthly_benefit_cost + &total_tax_cost;
        let total_annual_cost = &total_monthly_cost * BigDecimal::from(12);

        EmployeeCost {
            employee_id: employee.id.clone(),
            name: employee.name.clone(),
            branch_id: employee.branch_id.clone(),
            year,
            month,
            contributions: self.tax.breakdown(&salary),
            salary,
            benefits,
            monthly_benefit_cost,
            total_tax_cost,
            total_monthly_cost,
            total_annual_cost,
        }
    }

    /// Totals across all active employees, optionally for one branch.
    ///
    /// Benefits for every employee are fetched in a single directory call.
    pub async fn summary(&self, branch_id: Option<&str>) -> FinanceResult<CostSummary> {
        let employees = self.directory.list_active_employees(branch_id).await?;
        let ids: Vec<String> = employees.iter().map(|e| e.id.clone()).collect();
        let assignments = if ids.is_empty() {
            Vec::new()
        } else {
            self.directory.list_active_benefits(&ids).await?
        };

        let mut by_employee: HashMap<&str, Vec<&BenefitAssignment>> = HashMap::new();
        for assignment in &assignments {
            by_employee
                .entry(assignment.link.employee_id.as_str())
                .or_default()
                .push(assignment);
        }

        let (year, month) = self.current_period();
        let days = MonthDays::new(year, month);

        let mut summary = CostSummary {
            branch_id: branch_id.map(str::to_string),
            year,
            month,
            employee_count: 0,
            total_salaries: BigDecimal::from(0),
            total_benefit_cost: BigDecimal::from(0),
            total_tax_cost: BigDecimal::from(0),
            total_monthly_cost: BigDecimal::from(0),
            total_annual_cost: BigDecimal::from(0),
        };

        for employee in &employees {
            let links = by_employee
                .get(employee.id.as_str())
                .map(Vec::as_slice)
                .unwrap_or_default();
            let cost = self.build_employee_cost(employee, links.iter().copied(), days, year, month);

            summary.employee_count += 1;
            summary.total_salaries += &cost.salary;
            summary.total_benefit_cost += &cost.monthly_benefit_cost;
            summary.total_tax_cost += &cost.total_tax_cost;
            summary.total_monthly_cost += &cost.total_monthly_cost;
            summary.total_annual_cost += &cost.total_annual_cost;
        }

        tracing::debug!(
            branch_id = ?branch_id,
            employees = summary.employee_count,
            total_monthly_cost = %summary.total_monthly_cost,
            "Computed cost summary"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;
    use std::str::FromStr;

    fn d(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn seed() -> MemoryStorage {
        let storage = MemoryStorage::new();
        for (id, name, branch, salary) in [
            ("emp-1", "Ana", "branch-1", Some("5000")),
            ("emp-2", "Bruno", "branch-1", Some("2000")),
            ("emp-3", "Carla", "branch-2", None),
        ] {
            storage.add_employee(Employee {
                id: id.to_string(),
                name: name.to_string(),
                company_id: "company-1".to_string(),
                branch_id: branch.to_string(),
                monthly_salary: salary.map(d),
                active: true,
                deleted_at: None,
            });
        }
        storage.add_benefit(Benefit {
            id: "vr".to_string(),
            name: "Vale refeição".to_string(),
            daily_cost: d("30"),
            employee_value: d("0"),
            include_weekends: false,
        });
        storage.add_benefit(Benefit {
            id: "vt".to_string(),
            name: "Vale transporte".to_string(),
            daily_cost: d("10"),
            employee_value: d("6"),
            include_weekends: true,
        });
        for (id, employee, benefit, active) in [
            ("l1", "emp-1", "vr", true),
            ("l2", "emp-1", "vt", true),
            ("l3", "emp-2", "vr", false),
        ] {
            storage.add_employee_benefit(EmployeeBenefit {
                id: id.to_string(),
                employee_id: employee.to_string(),
                benefit_id: benefit.to_string(),
                active,
                deleted_at: None,
            });
        }
        storage
    }

    fn aggregator(storage: &MemoryStorage) -> CostAggregator {
        // March 2024: 21 weekdays, 31 days
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(2024, 3, 5).unwrap());
        CostAggregator::new(Arc::new(storage.clone()), clock)
    }

    #[tokio::test]
    async fn test_employee_cost() {
        let storage = seed();
        let cost = aggregator(&storage).employee_cost("emp-1").await.unwrap();

        assert_eq!(cost.benefits.len(), 2);
        // 30 * 21 + 10 * 31
        assert_eq!(cost.monthly_benefit_cost, d("940"));
        assert_eq!(cost.total_tax_cost, d("1400"));
        assert_eq!(cost.total_monthly_cost, d("7340"));
        assert_eq!(cost.total_annual_cost, d("88080"));
        assert_eq!(cost.contributions.employee_inss, d("700.00"));
    }

    #[tokio::test]
    async fn test_inactive_benefits_are_ignored() {
        let storage = seed();
        let cost = aggregator(&storage).employee_cost("emp-2").await.unwrap();
        assert!(cost.benefits.is_empty());
        assert_eq!(cost.total_monthly_cost, d("2560"));
    }

    #[tokio::test]
    async fn test_missing_employee() {
        let storage = seed();
        let result = aggregator(&storage).employee_cost("ghost").await;
        assert!(matches!(result, Err(FinanceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_summary_matches_per_employee_detail() {
        let storage = seed();
        let aggregator = aggregator(&storage);

        let branch = aggregator.summary(Some("branch-1")).await.unwrap();
        assert_eq!(branch.employee_count, 2);
        assert_eq!(branch.total_salaries, d("7000"));
        assert_eq!(branch.total_monthly_cost, d("9900"));
        assert_eq!(branch.total_annual_cost, d("118800"));

        let all = aggregator.summary(None).await.unwrap();
        assert_eq!(all.employee_count, 3);
        assert_eq!(all.total_monthly_cost, d("9900"));
    }

    #[tokio::test]
    async fn test_monthly_benefit_cost_for_other_period() {
        let storage = seed();
        // February 2024: 21 weekdays, 29 days
        let cost = aggregator(&storage)
            .monthly_benefit_cost("emp-1", 2024, 2)
            .await
            .unwrap();
        assert_eq!(cost, d("920"));
    }
}
