//! Standardized broker reply decoding.
//!
//! Every control request is answered by a message whose first component is
//! the decimal status code; remaining components are diagnostic payload
//! (for listings, one entry per component).

use svr_core::{ParseStatusError, Status};
use thiserror::Error;

use crate::Message;

/// Errors raised when a reply does not follow the response shape.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ResponseError {
    /// The reply had no components at all.
    #[error("response carried no status component")]
    Empty,

    /// The first component was not a known decimal status code.
    #[error("response status is malformed: {0}")]
    BadStatus(#[from] ParseStatusError),
}

/// Decodes the status code of a broker reply.
pub fn parse_response(message: &Message) -> Result<Status, ResponseError> {
    let first = message.component(0).ok_or(ResponseError::Empty)?;
    Ok(first.parse::<Status>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_response_parses() {
        let reply = Message::response(Status::Success, []);
        assert_eq!(parse_response(&reply).unwrap(), Status::Success);
    }

    #[test]
    fn error_response_parses() {
        let reply = Message::response(Status::NoSuchSource, ["cam9".to_string()]);
        assert_eq!(parse_response(&reply).unwrap(), Status::NoSuchSource);
    }

    #[test]
    fn empty_response_is_rejected() {
        let reply = Message::from_components(Vec::new());
        assert_eq!(parse_response(&reply).unwrap_err(), ResponseError::Empty);
    }

    #[test]
    fn non_numeric_status_is_rejected() {
        let reply = Message::from_components(vec!["ok".to_string()]);
        assert!(matches!(
            parse_response(&reply).unwrap_err(),
            ResponseError::BadStatus(_)
        ));
    }
}
