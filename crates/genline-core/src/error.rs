use http::StatusCode;

/// Error that knows how it should look to an API client
///
/// Before a response is committed it becomes a status code and JSON
/// body. Inside an open stream it becomes an in-band error event.
pub trait HttpError: std::error::Error {
    fn status_code(&self) -> StatusCode;

    /// Stable category such as `rate_limit_error` or `not_found_error`
    fn error_type(&self) -> &str;

    /// Wording shown to clients; never carries upstream secrets or bodies
    fn client_message(&self) -> String;
}
