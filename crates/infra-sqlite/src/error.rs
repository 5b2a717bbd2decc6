// sqlx::Error -> AppError mapping with structured SQLite messages

use herald_core::error::AppError;

pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            // https://www.sqlite.org/rescode.html
            Some(code) => {
                let code_str = code.as_ref();
                match code_str {
                    "2067" | "1555" => AppError::Database(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "275" | "1299" => AppError::Database(format!(
                        "Constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "5" => AppError::Database(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => AppError::Database(format!("Database full: {}", db_err.message())),
                    _ => AppError::Database(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            }
            None => AppError::Database(format!("Database error: {}", db_err.message())),
        },
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => AppError::Database(format!("Column not found: {}", col)),
        sqlx::Error::PoolClosed => AppError::Database("Connection pool closed".to_string()),
        _ => AppError::Database(err.to_string()),
    }
}

/// Same mapping, reported as a queue failure
pub(crate) fn map_queue_error(err: sqlx::Error) -> AppError {
    match map_sqlx_error(err) {
        AppError::Database(msg) => AppError::Queue(msg),
        other => other,
    }
}
