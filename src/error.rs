use crate::models::Role;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    /// A business rule refused the action before anything was written.
    #[error("{0}")]
    Rule(String),
    #[error("login required")]
    Unauthorized,
    #[error("requires {} role or higher", .required.label())]
    Forbidden { required: Role },
    #[error("{action} failed: {source}")]
    Storage {
        action: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("spreadsheet error: {0}")]
    Csv(#[from] csv::Error),
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("token signing failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("{0}")]
    Exhausted(String),
}

impl From<rusqlite::Error> for AppError {
    fn from(source: rusqlite::Error) -> Self {
        AppError::Storage {
            action: "database operation",
            source,
        }
    }
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn rule(message: impl Into<String>) -> Self {
        AppError::Rule(message.into())
    }

    /// Stable code for the wire protocol.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "bad_params",
            AppError::NotFound(_) => "not_found",
            AppError::Rule(_) => "rule_violation",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden { .. } => "forbidden",
            AppError::Storage { .. } => "db_failed",
            AppError::Io(_) => "io_failed",
            AppError::Csv(_) => "csv_failed",
            AppError::Hash(_) | AppError::Token(_) => "auth_failed",
            AppError::Exhausted(_) => "id_exhausted",
        }
    }
}

/// Relabels a storage failure with the action that was in progress.
pub trait Context<T> {
    fn during(self, action: &'static str) -> AppResult<T>;
}

impl<T> Context<T> for AppResult<T> {
    fn during(self, action: &'static str) -> AppResult<T> {
        self.map_err(|e| match e {
            AppError::Storage { source, .. } => {
                log::error!("{action} failed: {source}");
                AppError::Storage { action, source }
            }
            other => other,
        })
    }
}

impl<T> Context<T> for Result<T, rusqlite::Error> {
    fn during(self, action: &'static str) -> AppResult<T> {
        self.map_err(AppError::from).during(action)
    }
}
