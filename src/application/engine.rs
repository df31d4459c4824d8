use crate::application::context::RequestContext;
use crate::domain::loan::{
    Amortization, BillingSchedule, BorrowerId, CheckDelinquentAmount, LoanId, LoanWithBorrower,
    NewBorrower, NewLoan,
};
use crate::domain::ports::{ClockBox, LoanRepositoryBox};
use crate::error::{LoanError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info};

/// Input for originating a loan.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateLoanRequest {
    pub borrower_id: BorrowerId,
    pub amount: Decimal,
    /// Whole percent, 0 to 100.
    pub interest_rate: u32,
    pub duration_weeks: u32,
}

/// What a successful payment settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// One regular installment; the schedule row of `week` is now paid.
    Installment { week: u32 },
    /// Arrears covering `weeks` overdue installments.
    ArrearsSettled { weeks: u32 },
}

/// Reply text for any accepted payment.
pub const PAYMENT_SUCCESSFUL: &str = "payment successful";

/// The loan billing engine.
///
/// Holds no loan state of its own: every operation reads what it needs from
/// the repository and writes back through one atomic repository call, so the
/// engine can be shared between concurrent requests.
pub struct BillingEngine {
    repository: LoanRepositoryBox,
    clock: ClockBox,
}

impl BillingEngine {
    /// Creates a new `BillingEngine` over a repository and a date source.
    pub fn new(repository: LoanRepositoryBox, clock: ClockBox) -> Self {
        Self { repository, clock }
    }

    pub async fn register_borrower(
        &self,
        ctx: &RequestContext,
        borrower: NewBorrower,
    ) -> Result<BorrowerId> {
        ctx.run(self.repository.create_borrower(borrower)).await
    }

    /// Remaining balance of a loan.
    pub async fn get_outstanding(&self, ctx: &RequestContext, loan_id: LoanId) -> Result<Decimal> {
        ctx.run(async {
            let loan = self
                .repository
                .get_loan(loan_id)
                .await?
                .ok_or(LoanError::LoanNotFound(loan_id))?;
            Ok(loan.outstanding)
        })
        .await
    }

    /// Overdue installments of a loan as of today.
    ///
    /// A loan with nothing overdue, including an unknown loan, is reported as
    /// not delinquent rather than as an error.
    pub async fn is_delinquent(
        &self,
        ctx: &RequestContext,
        loan_id: LoanId,
    ) -> Result<CheckDelinquentAmount> {
        ctx.run(self.check_delinquency(loan_id, self.clock.today()))
            .await
    }

    /// Applies a payment to a loan.
    ///
    /// Rules, first match wins:
    /// 1. a settled loan rejects every payment;
    /// 2. a delinquent loan accepts exactly the arrears amount, which settles
    ///    all overdue weeks;
    /// 3. otherwise the payment must equal the installment and settles the
    ///    nearest unpaid week.
    ///
    /// Amounts are compared as exact decimals.
    pub async fn make_payment(
        &self,
        ctx: &RequestContext,
        loan_id: LoanId,
        amount: Decimal,
    ) -> Result<PaymentOutcome> {
        ctx.run(self.apply_payment(loan_id, amount)).await
    }

    pub async fn get_loans_with_borrower(
        &self,
        ctx: &RequestContext,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<LoanWithBorrower>> {
        ctx.run(self.repository.list_loans_with_borrower(limit, offset))
            .await
    }

    /// Originates a loan and its weekly schedule as one unit.
    pub async fn create_loan(
        &self,
        ctx: &RequestContext,
        request: CreateLoanRequest,
    ) -> Result<LoanId> {
        let amortization = Amortization::compute(
            request.amount,
            request.interest_rate,
            request.duration_weeks,
        )?;
        let schedule = amortization.schedule(request.duration_weeks, self.clock.today())?;
        let loan = NewLoan {
            borrower_id: request.borrower_id,
            amount: request.amount,
            interest_rate: amortization.interest_rate,
            duration_weeks: request.duration_weeks,
            outstanding: amortization.total_owed,
            installment_amount: amortization.installment,
        };

        let loan_id = ctx.run(self.repository.create_loan(loan, schedule)).await?;
        info!(
            loan_id,
            borrower_id = request.borrower_id,
            total_owed = %amortization.total_owed,
            installment = %amortization.installment,
            "loan originated"
        );
        Ok(loan_id)
    }

    pub async fn update_billing_schedule(
        &self,
        ctx: &RequestContext,
        schedule: &BillingSchedule,
    ) -> Result<()> {
        ctx.run(self.repository.update_billing_schedule(schedule))
            .await
    }

    async fn check_delinquency(
        &self,
        loan_id: LoanId,
        today: NaiveDate,
    ) -> Result<CheckDelinquentAmount> {
        Ok(self
            .repository
            .delinquent_aggregate(loan_id, today)
            .await?
            .map(CheckDelinquentAmount::from)
            .unwrap_or_else(|| CheckDelinquentAmount::clear(loan_id)))
    }

    async fn apply_payment(&self, loan_id: LoanId, amount: Decimal) -> Result<PaymentOutcome> {
        let mut loan = self
            .repository
            .get_loan(loan_id)
            .await?
            .ok_or(LoanError::LoanNotFound(loan_id))?;
        if loan.is_settled() {
            debug!(loan_id, "payment rejected: loan already settled");
            return Err(LoanError::AlreadyPaid);
        }

        let today = self.clock.today();
        let check = self.check_delinquency(loan_id, today).await?;
        let expected_outstanding = loan.outstanding;

        if check.is_delinquent {
            if amount != check.amount {
                debug!(loan_id, %amount, arrears = %check.amount, "payment rejected: arrears mismatch");
                return Err(LoanError::ArrearsMismatch {
                    required: check.amount,
                });
            }
            loan.apply_payment(amount);
            loan.delinquent_weeks = 0;
            self.repository
                .reset_repayment_schedule(&loan, expected_outstanding, today)
                .await?;
            info!(loan_id, %amount, weeks = check.total_week, outstanding = %loan.outstanding, "arrears settled");
            return Ok(PaymentOutcome::ArrearsSettled {
                weeks: check.total_week,
            });
        }

        if amount != loan.installment_amount {
            debug!(loan_id, %amount, installment = %loan.installment_amount, "payment rejected: installment mismatch");
            return Err(LoanError::InstallmentMismatch {
                required: loan.installment_amount,
            });
        }
        let mut nearest = self
            .repository
            .get_billing_schedule(loan_id)
            .await?
            .ok_or(LoanError::ScheduleNotFound(loan_id))?;
        let settles_overdue = u32::from(nearest.is_overdue(today));
        nearest.paid = true;

        loan.apply_payment(amount);
        loan.delinquent_weeks = check.total_week.saturating_sub(settles_overdue);
        self.repository
            .update_loan(&loan, expected_outstanding, &nearest)
            .await?;
        info!(loan_id, %amount, week = nearest.week, outstanding = %loan.outstanding, "installment paid");
        Ok(PaymentOutcome::Installment { week: nearest.week })
    }
}
