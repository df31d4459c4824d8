//! Storage adapters implementing the loan repository port, and clocks.

pub mod clock;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;

use crate::domain::loan::{BillingSchedule, Loan, ScheduleEntry};
use crate::error::{LoanError, Result};
use rust_decimal::Decimal;

/// A schedule must hold exactly one row per week, weeks `1..=duration`.
pub(crate) fn check_schedule(duration_weeks: u32, schedule: &[ScheduleEntry]) -> Result<()> {
    let contiguous = schedule.len() == duration_weeks as usize
        && schedule
            .iter()
            .zip(1..=duration_weeks)
            .all(|(entry, week)| entry.week == week);
    if contiguous {
        Ok(())
    } else {
        Err(LoanError::persistence(
            "failed to create billing schedules",
            format!("expected weeks 1..={duration_weeks}"),
        ))
    }
}

/// Optimistic concurrency check on the balance a writer based its update on.
pub(crate) fn check_outstanding(stored: &Loan, expected: Decimal) -> Result<()> {
    if stored.outstanding == expected {
        Ok(())
    } else {
        Err(LoanError::Conflict(stored.id))
    }
}

/// A loan update may only touch that loan's own schedule rows.
pub(crate) fn check_same_loan(loan: &Loan, schedule: &BillingSchedule) -> Result<()> {
    if schedule.loan_id == loan.id {
        Ok(())
    } else {
        Err(LoanError::Validation(format!(
            "billing schedule of loan {} cannot be updated with loan {}",
            schedule.loan_id, loan.id
        )))
    }
}
