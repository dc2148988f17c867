//! Helpers for failures that are reported but not propagated.

/// Extension for `Result`s whose error is logged and discarded.
///
/// For failures that are worth reporting but not actionable at the call
/// site, such as a task handle that fails to join during shutdown.
pub trait ResultLogExt<T, E> {
    /// Logs the error at error level with `context` and discards it.
    fn ok_or_log(self, context: &str) -> Option<T>;

    /// Logs the error at warn level with `context` and discards it.
    fn ok_or_warn(self, context: &str) -> Option<T>;
}

impl<T, E> ResultLogExt<T, E> for std::result::Result<T, E>
where
    E: std::error::Error,
{
    fn ok_or_log(self, context: &str) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::error!("{context}: {err}");
                None
            }
        }
    }

    fn ok_or_warn(self, context: &str) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::warn!("{context}: {err}");
                None
            }
        }
    }
}
