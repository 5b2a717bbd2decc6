//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use herald_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const THROTTLED: i32 = 4003;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
    pub const DELIVERY_ERROR: i32 = 5002;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    let code = match &err {
        AppError::Validation(_) | AppError::Domain(_) | AppError::Serialization(_) => {
            code::VALIDATION_ERROR
        }
        AppError::NotFound(_) => code::NOT_FOUND,
        AppError::Conflict(_) | AppError::InvalidState(_) => code::CONFLICT,
        AppError::Database(_) => code::DB_ERROR,
        AppError::Queue(_) => code::DELIVERY_ERROR,
        AppError::Config(_) => code::INTERNAL_ERROR,
    };

    // Variant prefixes stay out of client-facing messages
    let message = match err {
        AppError::Validation(msg)
        | AppError::NotFound(msg)
        | AppError::Conflict(msg)
        | AppError::InvalidState(msg)
        | AppError::Database(msg)
        | AppError::Queue(msg)
        | AppError::Config(msg) => msg,
        other => other.to_string(),
    };

    ErrorObjectOwned::owned(code, message, None::<()>)
}

pub fn throttled() -> ErrorObjectOwned {
    ErrorObjectOwned::owned(
        code::THROTTLED,
        "Rate limit exceeded. Please slow down.",
        None::<()>,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(to_rpc_error(AppError::Validation("x".into())).code(), 4000);
        assert_eq!(to_rpc_error(AppError::NotFound("x".into())).code(), 4001);
        assert_eq!(to_rpc_error(AppError::InvalidState("x".into())).code(), 4002);
        assert_eq!(to_rpc_error(AppError::Conflict("x".into())).code(), 4002);
        assert_eq!(to_rpc_error(AppError::Database("x".into())).code(), 5001);
        assert_eq!(to_rpc_error(AppError::Queue("x".into())).code(), 5002);
        assert_eq!(to_rpc_error(AppError::Config("x".into())).code(), 5000);
        assert_eq!(throttled().code(), 4003);
    }

    #[test]
    fn test_message_has_no_variant_prefix() {
        let err = to_rpc_error(AppError::Validation("content is required".into()));
        assert_eq!(err.message(), "content is required");
    }
}
