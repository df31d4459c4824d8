use super::loan::{
    BillingSchedule, BorrowerId, DelinquentAggregate, Loan, LoanId, LoanWithBorrower, NewBorrower,
    NewLoan, ScheduleEntry,
};
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Persistence contract for loans and their billing schedules.
///
/// Every method is one atomic unit: on error nothing it would have written
/// is visible. Writes that follow a read of the loan carry the outstanding
/// balance the caller saw and fail with `LoanError::Conflict` if it changed
/// in between.
#[async_trait]
pub trait LoanRepository: Send + Sync {
    async fn create_borrower(&self, borrower: NewBorrower) -> Result<BorrowerId>;

    async fn get_loan(&self, loan_id: LoanId) -> Result<Option<Loan>>;

    async fn list_loans_with_borrower(&self, limit: u32, offset: u32)
    -> Result<Vec<LoanWithBorrower>>;

    /// Inserts the loan together with its full schedule.
    async fn create_loan(&self, loan: NewLoan, schedule: Vec<ScheduleEntry>) -> Result<LoanId>;

    /// Writes the loan and the paid flag of one schedule row together.
    async fn update_loan(
        &self,
        loan: &Loan,
        expected_outstanding: Decimal,
        schedule: &BillingSchedule,
    ) -> Result<()>;

    async fn create_billing_schedule(&self, schedule: BillingSchedule) -> Result<()>;

    /// Nearest unpaid row: the smallest week with `paid == false`.
    async fn get_billing_schedule(&self, loan_id: LoanId) -> Result<Option<BillingSchedule>>;

    async fn update_billing_schedule(&self, schedule: &BillingSchedule) -> Result<()>;

    /// Count and sum of unpaid rows due before `as_of`; `None` when there are none.
    async fn delinquent_aggregate(
        &self,
        loan_id: LoanId,
        as_of: NaiveDate,
    ) -> Result<Option<DelinquentAggregate>>;

    /// Writes the loan and settles every row overdue at `as_of`.
    async fn reset_repayment_schedule(
        &self,
        loan: &Loan,
        expected_outstanding: Decimal,
        as_of: NaiveDate,
    ) -> Result<()>;
}

pub type LoanRepositoryBox = Box<dyn LoanRepository>;

/// Source of the current calendar date.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

pub type ClockBox = Box<dyn Clock>;
