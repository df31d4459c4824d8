use rust_decimal::Decimal;
use thiserror::Error;

/// Broad classes of failure, used by the delivery layer to pick a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Rejected,
    NotFound,
    Conflict,
    Persistence,
    DeadlineExceeded,
}

#[derive(Error, Debug)]
pub enum LoanError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("loan is already fully paid")]
    AlreadyPaid,
    #[error("please repay the arrears amount first, for: {required:.2}")]
    ArrearsMismatch { required: Decimal },
    #[error("payment amount not equal to installment amount: {required:.2}")]
    InstallmentMismatch { required: Decimal },
    #[error("loan {0} not found")]
    LoanNotFound(u64),
    #[error("borrower {0} not found")]
    BorrowerNotFound(u64),
    #[error("no unpaid billing schedule for loan {0}")]
    ScheduleNotFound(u64),
    #[error("loan {0} was modified concurrently, please retry")]
    Conflict(u64),
    #[error("conversion error: {0}")]
    Conversion(String),
    #[error("request deadline exceeded")]
    DeadlineExceeded,
    #[error("{context}: {source}")]
    Persistence {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoanError {
    /// Wraps a storage failure with a short description of what was attempted.
    pub fn persistence(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Persistence {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::AlreadyPaid
            | Self::ArrearsMismatch { .. }
            | Self::InstallmentMismatch { .. } => ErrorKind::Rejected,
            Self::LoanNotFound(_) | Self::BorrowerNotFound(_) | Self::ScheduleNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Self::Conversion(_) | Self::Persistence { .. } | Self::Csv(_) | Self::Io(_) => {
                ErrorKind::Persistence
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, LoanError>;
