//! Result type alias for session operations.

use super::session_error::SessionError;

/// Type alias for Results using SessionError.
///
/// # Example
///
/// ```ignore
/// use market_session::error::SessionResult;
///
/// fn shop_orders() -> SessionResult<RequestDescriptor> {
///     RequestDescriptor::get("/orders/shop")
/// }
/// ```
pub type SessionResult<T> = Result<T, SessionError>;
