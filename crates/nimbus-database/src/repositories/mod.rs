//! PostgreSQL implementations of the repository traits.

pub mod file;
pub mod share;
pub mod user;
pub mod version;

pub use file::PgFileRepository;
pub use share::PgShareRepository;
pub use user::PgUserRepository;
pub use version::PgVersionRepository;

use nimbus_core::error::{AppError, ErrorKind};

/// Map a sqlx error, turning unique violations into conflicts.
pub(crate) fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| {
        let unique = matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
        if unique {
            AppError::with_source(ErrorKind::Conflict, format!("{context}: duplicate entry"), e)
        } else {
            AppError::with_source(ErrorKind::Database, context, e)
        }
    }
}
