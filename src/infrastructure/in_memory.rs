use super::{check_outstanding, check_same_loan, check_schedule};
use crate::domain::loan::{
    BillingSchedule, Borrower, BorrowerId, DelinquentAggregate, Loan, LoanId, LoanWithBorrower,
    NewBorrower, NewLoan, ScheduleEntry,
};
use crate::domain::ports::LoanRepository;
use crate::error::{LoanError, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    borrowers: BTreeMap<BorrowerId, Borrower>,
    loans: BTreeMap<LoanId, Loan>,
    schedules: BTreeMap<(LoanId, u32), BillingSchedule>,
    last_borrower_id: BorrowerId,
    last_loan_id: LoanId,
}

impl Tables {
    fn loan_schedule_mut(
        &mut self,
        loan_id: LoanId,
    ) -> impl Iterator<Item = &mut BillingSchedule> {
        self.schedules
            .range_mut((loan_id, 0)..=(loan_id, u32::MAX))
            .map(|(_, row)| row)
    }

    fn loan_schedule(&self, loan_id: LoanId) -> impl Iterator<Item = &BillingSchedule> {
        self.schedules
            .range((loan_id, 0)..=(loan_id, u32::MAX))
            .map(|(_, row)| row)
    }

    fn stored_loan(&mut self, loan_id: LoanId) -> Result<&mut Loan> {
        self.loans
            .get_mut(&loan_id)
            .ok_or(LoanError::LoanNotFound(loan_id))
    }
}

/// A thread-safe in-memory loan store.
///
/// All tables sit behind one `Arc<RwLock<..>>`, so each atomic unit runs
/// under a single write guard and checks everything before mutating.
/// Clones share the same data.
#[derive(Default, Clone)]
pub struct InMemoryLoanRepository {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryLoanRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoanRepository for InMemoryLoanRepository {
    async fn create_borrower(&self, borrower: NewBorrower) -> Result<BorrowerId> {
        let mut tables = self.tables.write().await;
        tables.last_borrower_id += 1;
        let id = tables.last_borrower_id;
        let now = Utc::now();
        tables.borrowers.insert(
            id,
            Borrower {
                id,
                name: borrower.name,
                email: borrower.email,
                phone: borrower.phone,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn get_loan(&self, loan_id: LoanId) -> Result<Option<Loan>> {
        let tables = self.tables.read().await;
        Ok(tables.loans.get(&loan_id).cloned())
    }

    async fn list_loans_with_borrower(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<LoanWithBorrower>> {
        let tables = self.tables.read().await;
        Ok(tables
            .loans
            .values()
            .filter_map(|loan| {
                let borrower = tables.borrowers.get(&loan.borrower_id)?;
                Some(LoanWithBorrower {
                    loan_id: loan.id,
                    borrower_id: borrower.id,
                    borrower_name: borrower.name.clone(),
                    amount: loan.amount,
                    interest_rate: loan.interest_rate,
                    duration_weeks: loan.duration_weeks,
                    outstanding: loan.outstanding,
                })
            })
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn create_loan(&self, loan: NewLoan, schedule: Vec<ScheduleEntry>) -> Result<LoanId> {
        let mut tables = self.tables.write().await;
        if !tables.borrowers.contains_key(&loan.borrower_id) {
            return Err(LoanError::BorrowerNotFound(loan.borrower_id));
        }
        check_schedule(loan.duration_weeks, &schedule)?;

        tables.last_loan_id += 1;
        let id = tables.last_loan_id;
        tables.loans.insert(
            id,
            Loan {
                id,
                borrower_id: loan.borrower_id,
                amount: loan.amount,
                interest_rate: loan.interest_rate,
                duration_weeks: loan.duration_weeks,
                outstanding: loan.outstanding,
                delinquent_weeks: 0,
                installment_amount: loan.installment_amount,
            },
        );
        for entry in schedule {
            tables.schedules.insert(
                (id, entry.week),
                BillingSchedule {
                    loan_id: id,
                    week: entry.week,
                    amount: entry.amount,
                    due_date: entry.due_date,
                    paid: false,
                },
            );
        }
        Ok(id)
    }

    async fn update_loan(
        &self,
        loan: &Loan,
        expected_outstanding: Decimal,
        schedule: &BillingSchedule,
    ) -> Result<()> {
        check_same_loan(loan, schedule)?;
        let mut tables = self.tables.write().await;
        check_outstanding(tables.stored_loan(loan.id)?, expected_outstanding)?;
        if !tables
            .schedules
            .contains_key(&(schedule.loan_id, schedule.week))
        {
            return Err(LoanError::ScheduleNotFound(schedule.loan_id));
        }

        let stored = tables.stored_loan(loan.id)?;
        stored.outstanding = loan.outstanding;
        stored.delinquent_weeks = loan.delinquent_weeks;
        if let Some(row) = tables
            .schedules
            .get_mut(&(schedule.loan_id, schedule.week))
        {
            row.paid = schedule.paid;
        }
        if loan.is_settled() {
            tables.loan_schedule_mut(loan.id).for_each(|row| row.paid = true);
        }
        Ok(())
    }

    async fn create_billing_schedule(&self, schedule: BillingSchedule) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.stored_loan(schedule.loan_id)?;
        let key = (schedule.loan_id, schedule.week);
        if tables.schedules.contains_key(&key) {
            return Err(LoanError::persistence(
                "failed to create billing schedule",
                format!(
                    "week {} already exists for loan {}",
                    schedule.week, schedule.loan_id
                ),
            ));
        }
        tables.schedules.insert(key, schedule);
        Ok(())
    }

    async fn get_billing_schedule(&self, loan_id: LoanId) -> Result<Option<BillingSchedule>> {
        let tables = self.tables.read().await;
        Ok(tables.loan_schedule(loan_id).find(|row| !row.paid).cloned())
    }

    async fn update_billing_schedule(&self, schedule: &BillingSchedule) -> Result<()> {
        let mut tables = self.tables.write().await;
        let row = tables
            .schedules
            .get_mut(&(schedule.loan_id, schedule.week))
            .ok_or(LoanError::ScheduleNotFound(schedule.loan_id))?;
        row.paid = schedule.paid;
        Ok(())
    }

    async fn delinquent_aggregate(
        &self,
        loan_id: LoanId,
        as_of: NaiveDate,
    ) -> Result<Option<DelinquentAggregate>> {
        let tables = self.tables.read().await;
        let (total_week, amount) = tables
            .loan_schedule(loan_id)
            .filter(|row| row.is_overdue(as_of))
            .fold((0u32, Decimal::ZERO), |(weeks, sum), row| {
                (weeks + 1, sum + row.amount)
            });
        Ok((total_week > 0).then_some(DelinquentAggregate {
            loan_id,
            total_week,
            amount,
        }))
    }

    async fn reset_repayment_schedule(
        &self,
        loan: &Loan,
        expected_outstanding: Decimal,
        as_of: NaiveDate,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let stored = tables.stored_loan(loan.id)?;
        check_outstanding(stored, expected_outstanding)?;
        stored.outstanding = loan.outstanding;
        stored.delinquent_weeks = loan.delinquent_weeks;

        let settled = loan.is_settled();
        for row in tables.loan_schedule_mut(loan.id) {
            if settled || row.is_overdue(as_of) {
                row.paid = true;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_borrower() -> NewBorrower {
        NewBorrower {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: "555-0100".to_string(),
        }
    }

    fn new_loan(borrower_id: BorrowerId, weeks: u32) -> NewLoan {
        NewLoan {
            borrower_id,
            amount: dec!(400),
            interest_rate: dec!(0.25),
            duration_weeks: weeks,
            outstanding: dec!(500),
            installment_amount: dec!(100),
        }
    }

    fn weekly(weeks: u32) -> Vec<ScheduleEntry> {
        (1..=weeks)
            .map(|week| ScheduleEntry {
                week,
                amount: dec!(100),
                due_date: date(2024, 1, 1) + chrono::Days::new(7 * u64::from(week)),
            })
            .collect()
    }

    async fn seeded() -> (InMemoryLoanRepository, LoanId) {
        let store = InMemoryLoanRepository::new();
        let borrower = store.create_borrower(new_borrower()).await.unwrap();
        let loan_id = store
            .create_loan(new_loan(borrower, 5), weekly(5))
            .await
            .unwrap();
        (store, loan_id)
    }

    #[tokio::test]
    async fn test_create_loan_with_schedule() {
        let (store, loan_id) = seeded().await;

        let loan = store.get_loan(loan_id).await.unwrap().unwrap();
        assert_eq!(loan.outstanding, dec!(500));
        assert_eq!(loan.delinquent_weeks, 0);

        let nearest = store.get_billing_schedule(loan_id).await.unwrap().unwrap();
        assert_eq!(nearest.week, 1);
        assert_eq!(nearest.due_date, date(2024, 1, 8));
        assert!(!nearest.paid);

        assert!(store.get_loan(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_loan_rejects_unknown_borrower() {
        let store = InMemoryLoanRepository::new();
        let result = store.create_loan(new_loan(7, 5), weekly(5)).await;
        assert!(matches!(result, Err(LoanError::BorrowerNotFound(7))));
    }

    #[tokio::test]
    async fn test_failed_schedule_leaves_no_loan() {
        let store = InMemoryLoanRepository::new();
        let borrower = store.create_borrower(new_borrower()).await.unwrap();

        let mut broken = weekly(5);
        broken[3].week = 2;
        let result = store.create_loan(new_loan(borrower, 5), broken).await;
        assert!(matches!(result, Err(LoanError::Persistence { .. })));

        assert!(store.get_loan(1).await.unwrap().is_none());
        assert!(store.get_billing_schedule(1).await.unwrap().is_none());
        assert!(store.list_loans_with_borrower(10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_loan_marks_row_paid() {
        let (store, loan_id) = seeded().await;
        let mut loan = store.get_loan(loan_id).await.unwrap().unwrap();
        let mut row = store.get_billing_schedule(loan_id).await.unwrap().unwrap();

        loan.apply_payment(dec!(100));
        row.paid = true;
        store.update_loan(&loan, dec!(500), &row).await.unwrap();

        let stored = store.get_loan(loan_id).await.unwrap().unwrap();
        assert_eq!(stored.outstanding, dec!(400));
        let nearest = store.get_billing_schedule(loan_id).await.unwrap().unwrap();
        assert_eq!(nearest.week, 2);
    }

    #[tokio::test]
    async fn test_update_loan_detects_stale_outstanding() {
        let (store, loan_id) = seeded().await;
        let mut loan = store.get_loan(loan_id).await.unwrap().unwrap();
        let mut row = store.get_billing_schedule(loan_id).await.unwrap().unwrap();
        loan.apply_payment(dec!(100));
        row.paid = true;

        let result = store.update_loan(&loan, dec!(450), &row).await;
        assert!(matches!(result, Err(LoanError::Conflict(id)) if id == loan_id));

        let stored = store.get_loan(loan_id).await.unwrap().unwrap();
        assert_eq!(stored.outstanding, dec!(500));
        let nearest = store.get_billing_schedule(loan_id).await.unwrap().unwrap();
        assert_eq!(nearest.week, 1);
    }

    #[tokio::test]
    async fn test_delinquent_aggregate() {
        let (store, loan_id) = seeded().await;

        // Week 1 is due on the 8th; nothing is overdue on that day.
        let none = store
            .delinquent_aggregate(loan_id, date(2024, 1, 8))
            .await
            .unwrap();
        assert!(none.is_none());

        let aggregate = store
            .delinquent_aggregate(loan_id, date(2024, 1, 16))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(aggregate.total_week, 2);
        assert_eq!(aggregate.amount, dec!(200));

        assert!(
            store
                .delinquent_aggregate(42, date(2030, 1, 1))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_reset_repayment_schedule_settles_overdue_rows() {
        let (store, loan_id) = seeded().await;
        let mut loan = store.get_loan(loan_id).await.unwrap().unwrap();
        loan.apply_payment(dec!(200));

        store
            .reset_repayment_schedule(&loan, dec!(500), date(2024, 1, 16))
            .await
            .unwrap();

        let nearest = store.get_billing_schedule(loan_id).await.unwrap().unwrap();
        assert_eq!(nearest.week, 3);
        assert_eq!(
            store.get_loan(loan_id).await.unwrap().unwrap().outstanding,
            dec!(300)
        );
        assert!(
            store
                .delinquent_aggregate(loan_id, date(2024, 1, 16))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_billing_schedule_rows() {
        let (store, loan_id) = seeded().await;

        let duplicate = BillingSchedule {
            loan_id,
            week: 5,
            amount: dec!(100),
            due_date: date(2024, 2, 5),
            paid: false,
        };
        assert!(store.create_billing_schedule(duplicate).await.is_err());

        let extra = BillingSchedule {
            loan_id,
            week: 6,
            amount: dec!(100),
            due_date: date(2024, 2, 12),
            paid: false,
        };
        store.create_billing_schedule(extra.clone()).await.unwrap();

        let paid = BillingSchedule {
            week: 1,
            paid: true,
            ..extra
        };
        store.update_billing_schedule(&paid).await.unwrap();
        let nearest = store.get_billing_schedule(loan_id).await.unwrap().unwrap();
        assert_eq!(nearest.week, 2);

        let missing = BillingSchedule { week: 9, ..paid };
        assert!(matches!(
            store.update_billing_schedule(&missing).await,
            Err(LoanError::ScheduleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_loans_with_borrower_paginates() {
        let store = InMemoryLoanRepository::new();
        let borrower = store.create_borrower(new_borrower()).await.unwrap();
        for _ in 0..3 {
            store
                .create_loan(new_loan(borrower, 5), weekly(5))
                .await
                .unwrap();
        }

        let page = store.list_loans_with_borrower(2, 1).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].loan_id, 2);
        assert_eq!(page[1].loan_id, 3);
        assert_eq!(page[0].borrower_name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_update_loan_rejects_row_of_other_loan() {
        let (store, first) = seeded().await;
        let second = store.create_loan(new_loan(1, 5), weekly(5)).await.unwrap();

        let mut loan = store.get_loan(first).await.unwrap().unwrap();
        let mut other_row = store.get_billing_schedule(second).await.unwrap().unwrap();
        loan.apply_payment(dec!(100));
        other_row.paid = true;

        let result = store.update_loan(&loan, dec!(500), &other_row).await;
        assert!(matches!(result, Err(LoanError::Validation(_))));
        assert_eq!(store.get_loan(first).await.unwrap().unwrap().outstanding, dec!(500));
        assert_eq!(
            store.get_billing_schedule(second).await.unwrap().unwrap().week,
            1
        );
    }

    #[tokio::test]
    async fn test_settling_update_pays_remaining_rows() {
        let (store, loan_id) = seeded().await;
        let mut loan = store.get_loan(loan_id).await.unwrap().unwrap();
        let mut row = store.get_billing_schedule(loan_id).await.unwrap().unwrap();
        loan.apply_payment(dec!(500));
        row.paid = true;

        store.update_loan(&loan, dec!(500), &row).await.unwrap();
        assert!(store.get_billing_schedule(loan_id).await.unwrap().is_none());
        assert!(
            store
                .delinquent_aggregate(loan_id, date(2030, 1, 1))
                .await
                .unwrap()
                .is_none()
        );
    }
}
