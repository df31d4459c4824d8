use crate::domain::numeric;
use crate::error::{LoanError, Result};
use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type LoanId = u64;
pub type BorrowerId = u64;

/// Days between consecutive installments.
pub const DAYS_PER_WEEK: u64 = 7;
/// Overdue installments at which a loan counts as delinquent.
pub const DELINQUENCY_THRESHOLD: u32 = 2;
/// Longest loan term accepted at origination (30 years).
pub const MAX_DURATION_WEEKS: u32 = 1560;

/// A loan as persisted. Monetary fields are exact decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub borrower_id: BorrowerId,
    pub amount: Decimal,
    /// Flat rate as a fraction of the principal (10% is `0.10`).
    pub interest_rate: Decimal,
    pub duration_weeks: u32,
    pub outstanding: Decimal,
    pub delinquent_weeks: u32,
    pub installment_amount: Decimal,
}

impl Loan {
    pub fn is_settled(&self) -> bool {
        self.outstanding.is_zero()
    }

    /// Deducts a payment, clamping at zero since the rounded-up final
    /// installment may exceed what is left.
    pub fn apply_payment(&mut self, amount: Decimal) {
        self.outstanding = (self.outstanding - amount).max(Decimal::ZERO);
    }
}

/// A loan about to be originated; the store assigns its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLoan {
    pub borrower_id: BorrowerId,
    pub amount: Decimal,
    pub interest_rate: Decimal,
    pub duration_weeks: u32,
    pub outstanding: Decimal,
    pub installment_amount: Decimal,
}

/// One week's installment of a loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingSchedule {
    pub loan_id: LoanId,
    pub week: u32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub paid: bool,
}

impl BillingSchedule {
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.paid && self.due_date < today
    }
}

/// A schedule row generated at origination, before the loan has an id.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    pub week: u32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
}

/// Sum of overdue unpaid installments, as reported by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct DelinquentAggregate {
    pub loan_id: LoanId,
    pub total_week: u32,
    pub amount: Decimal,
}

/// Delinquency status of a loan. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckDelinquentAmount {
    pub loan_id: LoanId,
    pub total_week: u32,
    pub amount: Decimal,
    pub is_delinquent: bool,
}

impl CheckDelinquentAmount {
    /// The result for a loan with nothing overdue.
    pub fn clear(loan_id: LoanId) -> Self {
        Self {
            loan_id,
            total_week: 0,
            amount: Decimal::ZERO,
            is_delinquent: false,
        }
    }
}

impl From<DelinquentAggregate> for CheckDelinquentAmount {
    fn from(aggregate: DelinquentAggregate) -> Self {
        Self {
            loan_id: aggregate.loan_id,
            is_delinquent: aggregate.total_week >= DELINQUENCY_THRESHOLD,
            total_week: aggregate.total_week,
            amount: aggregate.amount,
        }
    }
}

/// Listing projection joining a loan with its borrower.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanWithBorrower {
    pub loan_id: LoanId,
    pub borrower_id: BorrowerId,
    pub borrower_name: String,
    pub amount: Decimal,
    pub interest_rate: Decimal,
    pub duration_weeks: u32,
    pub outstanding: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Borrower {
    pub id: BorrowerId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewBorrower {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Figures fixed at origination.
#[derive(Debug, Clone, PartialEq)]
pub struct Amortization {
    pub interest_rate: Decimal,
    pub interest_amount: Decimal,
    pub total_owed: Decimal,
    pub installment: Decimal,
}

impl Amortization {
    /// Computes interest, total owed and the weekly installment, rounded up
    /// to whole currency units so that `installment * weeks >= total_owed`.
    pub fn compute(principal: Decimal, interest_rate_percent: u32, weeks: u32) -> Result<Self> {
        if principal <= Decimal::ZERO {
            return Err(LoanError::Validation(
                "loan amount must be positive".to_string(),
            ));
        }
        if interest_rate_percent > 100 {
            return Err(LoanError::Validation(
                "interest rate must be between 0 and 100".to_string(),
            ));
        }
        check_duration(weeks)?;

        let interest_rate = Decimal::from(interest_rate_percent) / Decimal::ONE_HUNDRED;
        let interest_amount = principal.checked_mul(interest_rate).ok_or_else(overflow)?;
        let total_owed = principal.checked_add(interest_amount).ok_or_else(overflow)?;
        let installment = installment_for(total_owed, weeks)?;

        Ok(Self {
            interest_rate,
            interest_amount,
            total_owed,
            installment,
        })
    }

    /// Builds the weekly rows; week `n` falls due `7 * n` days after `start`.
    /// Fails before building anything if the last due date is not representable.
    pub fn schedule(&self, weeks: u32, start: NaiveDate) -> Result<Vec<ScheduleEntry>> {
        check_duration(weeks)?;
        due_date(start, weeks)?;
        (1..=weeks)
            .map(|week| {
                Ok(ScheduleEntry {
                    week,
                    amount: self.installment,
                    due_date: due_date(start, week)?,
                })
            })
            .collect()
    }
}

fn check_duration(weeks: u32) -> Result<()> {
    if weeks == 0 {
        return Err(LoanError::Validation(
            "duration must be at least one week".to_string(),
        ));
    }
    if weeks > MAX_DURATION_WEEKS {
        return Err(LoanError::Validation(format!(
            "duration must not exceed {MAX_DURATION_WEEKS} weeks"
        )));
    }
    Ok(())
}

fn due_date(start: NaiveDate, week: u32) -> Result<NaiveDate> {
    start
        .checked_add_days(Days::new(DAYS_PER_WEEK * u64::from(week)))
        .ok_or_else(|| LoanError::Validation(format!("due date of week {week} is out of range")))
}

fn overflow() -> LoanError {
    LoanError::Validation("loan amount is out of range".to_string())
}

/// Exact ceiling of `total_owed / weeks`.
///
/// Uses the float bridge while the total is within safe precision and pure
/// decimal division beyond it; either way the result is checked against
/// exact decimal products.
fn installment_for(total_owed: Decimal, week_count: u32) -> Result<Decimal> {
    let weeks = Decimal::from(week_count);
    let mut installment = if numeric::is_within_safe_precision(total_owed) {
        let per_week = numeric::to_binary_float(Some(total_owed))? / f64::from(week_count);
        numeric::from_binary_float(numeric::ceil_to_unit(per_week))?
    } else {
        total_owed.checked_div(weeks).ok_or_else(overflow)?.ceil()
    };

    while installment.checked_mul(weeks).ok_or_else(overflow)? < total_owed {
        installment += Decimal::ONE;
    }
    while installment > Decimal::ONE && (installment - Decimal::ONE) * weeks >= total_owed {
        installment -= Decimal::ONE;
    }
    Ok(installment)
}
