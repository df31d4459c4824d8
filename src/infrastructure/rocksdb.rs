use super::{check_outstanding, check_same_loan, check_schedule};
use crate::domain::loan::{
    BillingSchedule, Borrower, BorrowerId, DelinquentAggregate, Loan, LoanId, LoanWithBorrower,
    NewBorrower, NewLoan, ScheduleEntry,
};
use crate::domain::ports::LoanRepository;
use crate::error::{LoanError, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for borrower records.
pub const CF_BORROWERS: &str = "borrowers";
/// Column Family for loan records.
pub const CF_LOANS: &str = "loans";
/// Column Family for schedule rows, keyed by loan id then week.
pub const CF_SCHEDULES: &str = "billing_schedules";
/// Column Family for id sequences.
pub const CF_META: &str = "meta";

const SEQ_BORROWER: &[u8] = b"seq:borrower";
const SEQ_LOAN: &[u8] = b"seq:loan";

/// A persistent loan store backed by RocksDB.
///
/// Every atomic unit is a single `WriteBatch`. Writers additionally hold an
/// async mutex so that the optimistic outstanding check and the batch that
/// follows it cannot interleave with another writer.
///
/// `Clone` shares the underlying `Arc<DB>` and the writer mutex.
#[derive(Clone)]
pub struct RocksDBLoanRepository {
    db: Arc<DB>,
    writer: Arc<Mutex<()>>,
}

fn storage(context: &'static str) -> impl FnOnce(rocksdb::Error) -> LoanError {
    move |e| LoanError::persistence(context, e)
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| LoanError::persistence("serialization error", e))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| LoanError::persistence("deserialization error", e))
}

fn schedule_key(loan_id: LoanId, week: u32) -> Vec<u8> {
    let mut key = loan_id.to_be_bytes().to_vec();
    key.extend_from_slice(&week.to_be_bytes());
    key
}

impl RocksDBLoanRepository {
    /// Opens or creates a RocksDB instance at `path`, creating any missing
    /// column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_BORROWERS, CF_LOANS, CF_SCHEDULES, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)
            .map_err(storage("failed to open database"))?;

        Ok(Self {
            db: Arc::new(db),
            writer: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            LoanError::persistence(
                "missing column family",
                format!("column family {name} not found"),
            )
        })
    }

    fn read<T: DeserializeOwned>(&self, cf_name: &'static str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(cf, key)
            .map_err(storage("failed to read record"))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn next_id(&self, sequence: &[u8]) -> Result<u64> {
        let cf = self.cf(CF_META)?;
        let last = match self
            .db
            .get_cf(cf, sequence)
            .map_err(storage("failed to read sequence"))?
        {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    LoanError::persistence("corrupt sequence", "expected 8 bytes")
                })?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        Ok(last + 1)
    }

    fn schedule_rows(&self, loan_id: LoanId) -> Result<Vec<BillingSchedule>> {
        let cf = self.cf(CF_SCHEDULES)?;
        let prefix = loan_id.to_be_bytes();
        let mut rows = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, value) = item.map_err(storage("failed to scan billing schedules"))?;
            if !key.starts_with(&prefix) {
                break;
            }
            rows.push(decode(&value)?);
        }
        Ok(rows)
    }

    fn stored_loan(&self, loan_id: LoanId) -> Result<Loan> {
        self.read(CF_LOANS, &loan_id.to_be_bytes())?
            .ok_or(LoanError::LoanNotFound(loan_id))
    }

    fn put_loan(&self, batch: &mut WriteBatch, loan: &Loan) -> Result<()> {
        batch.put_cf(self.cf(CF_LOANS)?, loan.id.to_be_bytes(), encode(loan)?);
        Ok(())
    }

    fn put_schedule(&self, batch: &mut WriteBatch, row: &BillingSchedule) -> Result<()> {
        batch.put_cf(
            self.cf(CF_SCHEDULES)?,
            schedule_key(row.loan_id, row.week),
            encode(row)?,
        );
        Ok(())
    }

    fn commit(&self, batch: WriteBatch, context: &'static str) -> Result<()> {
        self.db.write(batch).map_err(storage(context))
    }
}

#[async_trait]
impl LoanRepository for RocksDBLoanRepository {
    async fn create_borrower(&self, borrower: NewBorrower) -> Result<BorrowerId> {
        let _guard = self.writer.lock().await;
        let id = self.next_id(SEQ_BORROWER)?;
        let now = Utc::now();
        let record = Borrower {
            id,
            name: borrower.name,
            email: borrower.email,
            phone: borrower.phone,
            created_at: now,
            updated_at: now,
        };

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_BORROWERS)?, id.to_be_bytes(), encode(&record)?);
        batch.put_cf(self.cf(CF_META)?, SEQ_BORROWER, id.to_be_bytes());
        self.commit(batch, "failed to create borrower")?;
        Ok(id)
    }

    async fn get_loan(&self, loan_id: LoanId) -> Result<Option<Loan>> {
        self.read(CF_LOANS, &loan_id.to_be_bytes())
    }

    async fn list_loans_with_borrower(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<LoanWithBorrower>> {
        let cf = self.cf(CF_LOANS)?;
        let mut result = Vec::new();
        let mut skipped = 0;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            if result.len() >= limit as usize {
                break;
            }
            let (_key, value) = item.map_err(storage("failed to get loans with borrower"))?;
            let loan: Loan = decode(&value)?;
            let Some(borrower) =
                self.read::<Borrower>(CF_BORROWERS, &loan.borrower_id.to_be_bytes())?
            else {
                continue;
            };
            if skipped < offset {
                skipped += 1;
                continue;
            }
            result.push(LoanWithBorrower {
                loan_id: loan.id,
                borrower_id: borrower.id,
                borrower_name: borrower.name,
                amount: loan.amount,
                interest_rate: loan.interest_rate,
                duration_weeks: loan.duration_weeks,
                outstanding: loan.outstanding,
            });
        }
        Ok(result)
    }

    async fn create_loan(&self, loan: NewLoan, schedule: Vec<ScheduleEntry>) -> Result<LoanId> {
        let _guard = self.writer.lock().await;
        if self
            .read::<Borrower>(CF_BORROWERS, &loan.borrower_id.to_be_bytes())?
            .is_none()
        {
            return Err(LoanError::BorrowerNotFound(loan.borrower_id));
        }
        check_schedule(loan.duration_weeks, &schedule)?;

        let id = self.next_id(SEQ_LOAN)?;
        let record = Loan {
            id,
            borrower_id: loan.borrower_id,
            amount: loan.amount,
            interest_rate: loan.interest_rate,
            duration_weeks: loan.duration_weeks,
            outstanding: loan.outstanding,
            delinquent_weeks: 0,
            installment_amount: loan.installment_amount,
        };

        let mut batch = WriteBatch::default();
        self.put_loan(&mut batch, &record)?;
        for entry in schedule {
            self.put_schedule(
                &mut batch,
                &BillingSchedule {
                    loan_id: id,
                    week: entry.week,
                    amount: entry.amount,
                    due_date: entry.due_date,
                    paid: false,
                },
            )?;
        }
        batch.put_cf(self.cf(CF_META)?, SEQ_LOAN, id.to_be_bytes());
        self.commit(batch, "failed to commit loan creation")?;
        Ok(id)
    }

    async fn update_loan(
        &self,
        loan: &Loan,
        expected_outstanding: Decimal,
        schedule: &BillingSchedule,
    ) -> Result<()> {
        check_same_loan(loan, schedule)?;
        let _guard = self.writer.lock().await;
        let mut stored = self.stored_loan(loan.id)?;
        check_outstanding(&stored, expected_outstanding)?;
        let mut row: BillingSchedule = self
            .read(CF_SCHEDULES, &schedule_key(schedule.loan_id, schedule.week))?
            .ok_or(LoanError::ScheduleNotFound(schedule.loan_id))?;

        stored.outstanding = loan.outstanding;
        stored.delinquent_weeks = loan.delinquent_weeks;
        row.paid = schedule.paid;

        let mut batch = WriteBatch::default();
        self.put_loan(&mut batch, &stored)?;
        self.put_schedule(&mut batch, &row)?;
        if stored.is_settled() {
            for mut rest in self.schedule_rows(loan.id)? {
                if !rest.paid && rest.week != row.week {
                    rest.paid = true;
                    self.put_schedule(&mut batch, &rest)?;
                }
            }
        }
        self.commit(batch, "failed to commit loan update")
    }

    async fn create_billing_schedule(&self, schedule: BillingSchedule) -> Result<()> {
        let _guard = self.writer.lock().await;
        self.stored_loan(schedule.loan_id)?;
        let key = schedule_key(schedule.loan_id, schedule.week);
        if self.read::<BillingSchedule>(CF_SCHEDULES, &key)?.is_some() {
            return Err(LoanError::persistence(
                "failed to create billing schedule",
                format!(
                    "week {} already exists for loan {}",
                    schedule.week, schedule.loan_id
                ),
            ));
        }
        let mut batch = WriteBatch::default();
        self.put_schedule(&mut batch, &schedule)?;
        self.commit(batch, "failed to create billing schedule")
    }

    async fn get_billing_schedule(&self, loan_id: LoanId) -> Result<Option<BillingSchedule>> {
        Ok(self
            .schedule_rows(loan_id)?
            .into_iter()
            .find(|row| !row.paid))
    }

    async fn update_billing_schedule(&self, schedule: &BillingSchedule) -> Result<()> {
        let _guard = self.writer.lock().await;
        let mut row: BillingSchedule = self
            .read(CF_SCHEDULES, &schedule_key(schedule.loan_id, schedule.week))?
            .ok_or(LoanError::ScheduleNotFound(schedule.loan_id))?;
        row.paid = schedule.paid;
        let mut batch = WriteBatch::default();
        self.put_schedule(&mut batch, &row)?;
        self.commit(batch, "failed to update billing schedule")
    }

    async fn delinquent_aggregate(
        &self,
        loan_id: LoanId,
        as_of: NaiveDate,
    ) -> Result<Option<DelinquentAggregate>> {
        let (total_week, amount) = self
            .schedule_rows(loan_id)?
            .iter()
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
        let _guard = self.writer.lock().await;
        let mut stored = self.stored_loan(loan.id)?;
        check_outstanding(&stored, expected_outstanding)?;
        stored.outstanding = loan.outstanding;
        stored.delinquent_weeks = loan.delinquent_weeks;

        let mut batch = WriteBatch::default();
        self.put_loan(&mut batch, &stored)?;
        let settled = stored.is_settled();
        for mut row in self.schedule_rows(loan.id)? {
            if !row.paid && (settled || row.is_overdue(as_of)) {
                row.paid = true;
                self.put_schedule(&mut batch, &row)?;
            }
        }
        self.commit(batch, "failed to commit repayment schedule reset")
    }
}
