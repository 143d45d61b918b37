//! INSS and FGTS contribution engine
//!
//! Employee INSS follows the progressive table: each bracket applies its
//! nominal rate to the whole salary and subtracts a flat deduction. From the
//! flat-rate threshold upward the employee pays 14% of the full salary with
//! no deduction and no ceiling.

use bigdecimal::{BigDecimal, RoundingMode};
use serde::{Deserialize, Serialize};

/// One row of the progressive employee INSS table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InssBracket {
    /// Lower bound (inclusive)
    pub min: BigDecimal,
    /// Upper bound (inclusive)
    pub max: BigDecimal,
    /// Nominal rate in percent (e.g. 7.5)
    pub rate: BigDecimal,
    /// Flat amount subtracted after applying the rate
    pub deduction: BigDecimal,
}

impl InssBracket {
    fn new(min: BigDecimal, max: BigDecimal, rate: BigDecimal, deduction: BigDecimal) -> Self {
        Self {
            min,
            max,
            rate,
            deduction,
        }
    }
}

/// Full contribution breakdown for one gross salary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionBreakdown {
    pub gross_salary: BigDecimal,
    pub employee_inss: BigDecimal,
    pub employee_inss_rate: BigDecimal,
    pub employer_inss: BigDecimal,
    pub fgts: BigDecimal,
    /// gross_salary - employee_inss
    pub net_salary: BigDecimal,
    /// gross_salary + employer_inss + fgts
    pub employer_cost: BigDecimal,
}

/// Payroll contribution calculator
#[derive(Debug, Clone)]
pub struct TaxCalculator {
    brackets: Vec<InssBracket>,
    /// Salaries at or above this pay `flat_rate` on the whole amount
    flat_rate_threshold: BigDecimal,
    flat_rate: BigDecimal,
    employer_inss_rate: BigDecimal,
    fgts_rate: BigDecimal,
}

impl Default for TaxCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl TaxCalculator {
    /// Calculator loaded with the current contribution table
    pub fn new() -> Self {
        let brackets = vec![
            InssBracket::new(dec(0, 2), dec(151800, 2), dec(75, 1), dec(0, 2)),
            InssBracket::new(dec(151801, 2), dec(279388, 2), dec(9, 0), dec(2277, 2)),
            InssBracket::new(dec(279389, 2), dec(419083, 2), dec(12, 0), dec(10659, 2)),
            InssBracket::new(dec(419084, 2), dec(815741, 2), dec(14, 0), dec(19040, 2)),
        ];

        Self {
            brackets,
            flat_rate_threshold: dec(419084, 2),
            flat_rate: dec(14, 0),
            employer_inss_rate: dec(20, 2),
            fgts_rate: dec(8, 2),
        }
    }

    /// Progressive brackets in ascending order
    pub fn brackets(&self) -> &[InssBracket] {
        &self.brackets
    }

    /// Bracket that covers `salary`. Values that fall between two bounds
    /// (sub-cent gaps) land in the next bracket up.
    fn bracket_for(&self, salary: &BigDecimal) -> Option<&InssBracket> {
        self.brackets.iter().find(|b| *salary <= b.max)
    }

    /// Employee INSS contribution, rounded to cents
    pub fn employee_inss(&self, salary: &BigDecimal) -> BigDecimal {
        let zero = BigDecimal::from(0);
        if *salary <= zero {
            return zero;
        }

        if *salary >= self.flat_rate_threshold {
            return round_cents(&(salary * &self.flat_rate / BigDecimal::from(100)));
        }

        match self.bracket_for(salary) {
            Some(bracket) => {
                let amount = salary * &bracket.rate / BigDecimal::from(100) - &bracket.deduction;
                let rounded = round_cents(&amount);
                if rounded < zero {
                    zero
                } else {
                    rounded
                }
            }
            None => zero,
        }
    }

    /// Nominal rate (in percent) of the bracket the salary falls into
    pub fn employee_inss_bracket_rate(&self, salary: &BigDecimal) -> BigDecimal {
        if *salary <= BigDecimal::from(0) {
            return BigDecimal::from(0);
        }

        if *salary >= self.flat_rate_threshold {
            return self.flat_rate.clone();
        }

        self.bracket_for(salary)
            .map(|b| b.rate.clone())
            .unwrap_or_else(|| BigDecimal::from(0))
    }

    /// Employer INSS: 20% of gross
    pub fn employer_inss(&self, salary: &BigDecimal) -> BigDecimal {
        if *salary <= BigDecimal::from(0) {
            return BigDecimal::from(0);
        }
        salary * &self.employer_inss_rate
    }

    /// FGTS deposit: 8% of gross
    pub fn fgts(&self, salary: &BigDecimal) -> BigDecimal {
        if *salary <= BigDecimal::from(0) {
            return BigDecimal::from(0);
        }
        salary * &self.fgts_rate
    }

    /// Employer-side tax cost (employer INSS + FGTS)
    pub fn employer_tax_cost(&self, salary: &BigDecimal) -> BigDecimal {
        self.employer_inss(salary) + self.fgts(salary)
    }

    /// Every contribution for a gross salary
    pub fn breakdown(&self, salary: &BigDecimal) -> ContributionBreakdown {
        let employee_inss = self.employee_inss(salary);
        let employer_inss = self.employer_inss(salary);
        let fgts = self.fgts(salary);

        ContributionBreakdown {
            gross_salary: salary.clone(),
            employee_inss_rate: self.employee_inss_bracket_rate(salary),
            net_salary: salary - &employee_inss,
            employer_cost: salary + &employer_inss + &fgts,
            employee_inss,
            employer_inss,
            fgts,
        }
    }
}

/// Round to two decimal places, half up
pub fn round_cents(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(2, RoundingMode::HalfUp)
}

fn dec(digits: i64, scale: i64) -> BigDecimal {
    BigDecimal::new(digits.into(), scale)
}
