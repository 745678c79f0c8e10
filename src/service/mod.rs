pub mod import;
pub mod regions;
pub mod scoring;

use sqlx::{Postgres, Transaction};

use crate::model::apperror::{ApplicationError, ErrorType};

/**
 * Commits the transaction when the work succeeded and rolls it back otherwise.
 *
 * # Arguments
 * `transaction`: The transaction the work ran in.
 * `result`: The outcome of the work.
 *
 * # Returns
 * The outcome of the work, or the commit/rollback failure.
 */
pub(crate) async fn finish_transaction<T>(transaction: Transaction<'_, Postgres>, result: Result<T, ApplicationError>) -> Result<T, ApplicationError> {
    match result {
        Ok(value) => {
            transaction.commit().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to commit transaction: {err}")))?;
            Ok(value)
        }
        Err(err) => {
            transaction.rollback().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to rollback transaction: {err}")))?;
            Err(err)
        }
    }
}
