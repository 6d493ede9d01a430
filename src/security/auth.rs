use poem::Request;
use crate::error::AppError;

pub const OPERATOR_HEADER: &str = "X-Operator-Id";

/// The operator acting on the request. Blank values count as missing.
pub fn extract_operator_id(req: &Request) -> Result<String, AppError> {
    req.header(OPERATOR_HEADER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .ok_or(AppError::Unauthorized)
}
