//! Validation utilities

use crate::traits::*;
use crate::types::*;
use bigdecimal::BigDecimal;

/// Validate that an amount is positive
pub fn validate_positive_amount(amount: &BigDecimal) -> FinanceResult<()> {
    if *amount <= BigDecimal::from(0) {
        Err(FinanceError::Validation(
            "Amount must be positive".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Validate a title description
pub fn validate_description(description: &str) -> FinanceResult<()> {
    if description.trim().is_empty() {
        return Err(FinanceError::Validation(
            "Description cannot be empty".to_string(),
        ));
    }

    if description.len() > 500 {
        return Err(FinanceError::Validation(
            "Description cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate a document number (invoice, bill, payroll key)
pub fn validate_document_number(document_number: &str) -> FinanceResult<()> {
    if document_number.trim().is_empty() {
        return Err(FinanceError::Validation(
            "Document number cannot be empty".to_string(),
        ));
    }

    if document_number.len() > 100 {
        return Err(FinanceError::Validation(
            "Document number cannot exceed 100 characters".to_string(),
        ));
    }

    // Alphanumerics plus the separators used by invoice and payroll keys
    if !document_number
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '/' | '.'))
    {
        return Err(FinanceError::Validation(
            "Document number can only contain alphanumeric characters, dashes, underscores, slashes and dots"
                .to_string(),
        ));
    }

    Ok(())
}

/// Validate a calendar month number
pub fn validate_month(month: u32) -> FinanceResult<()> {
    if !(1..=12).contains(&month) {
        return Err(FinanceError::Validation(format!(
            "Month must be between 1 and 12, got {}",
            month
        )));
    }
    Ok(())
}

/// Stricter title validator that also checks lengths and document numbers
pub struct EnhancedTitleValidator;

impl TitleValidator for EnhancedTitleValidator {
    fn validate_new(&self, title: &NewTitle) -> FinanceResult<()> {
        DefaultTitleValidator.validate_new(title)?;
        validate_description(&title.description)?;

        if let Some(ref document_number) = title.document_number {
            validate_document_number(document_number)?;
        }

        if title.branch_id.trim().is_empty() {
            return Err(FinanceError::Validation(
                "Branch ID cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_update(&self, update: &TitleUpdate) -> FinanceResult<()> {
        DefaultTitleValidator.validate_update(update)?;

        if let Some(ref description) = update.description {
            validate_description(description)?;
        }

        if let Some(ref document_number) = update.document_number {
            validate_document_number(document_number)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_document_number_rules() {
        assert!(validate_document_number("FOLHA-03/2024-emp-1").is_ok());
        assert!(validate_document_number("NF 123").is_err());
        assert!(validate_document_number("  ").is_err());
    }

    #[test]
    fn test_default_validator_requires_positive_amounts() {
        assert!(validate_positive_amount(&BigDecimal::from(1)).is_ok());
        assert!(validate_positive_amount(&BigDecimal::from(0)).is_err());

        let due = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let title = NewTitle::new("Diesel", BigDecimal::from(-5), due, "branch-1");
        assert!(matches!(
            DefaultTitleValidator.validate_new(&title),
            Err(FinanceError::Validation(ref m)) if m == "Amount must be positive"
        ));

        let update = TitleUpdate {
            amount: Some(BigDecimal::from(-1)),
            ..TitleUpdate::default()
        };
        assert!(DefaultTitleValidator.validate_update(&update).is_err());
    }

    #[test]
    fn test_month_rules() {
        assert!(validate_month(1).is_ok());
        assert!(validate_month(12).is_ok());
        assert!(validate_month(0).is_err());
        assert!(validate_month(13).is_err());
    }

    #[test]
    fn test_enhanced_validator() {
        let due = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let mut title = NewTitle::new("Tyres", BigDecimal::from(900), due, "branch-1");
        assert!(EnhancedTitleValidator.validate_new(&title).is_ok());

        title.amount = BigDecimal::from(0);
        assert!(matches!(
            EnhancedTitleValidator.validate_new(&title),
            Err(FinanceError::Validation(_))
        ));

        let update = TitleUpdate {
            description: Some("x".repeat(501)),
            ..TitleUpdate::default()
        };
        assert!(EnhancedTitleValidator.validate_update(&update).is_err());
    }
}
