//! Logical control message: string components plus an optional payload.

use svr_core::Status;

/// A decoded control message.
///
/// Components are UTF-8 strings; the first is the command verb for requests
/// and the status code for responses. The payload, when present, is opaque
/// to this layer. All storage is owned and released as a unit on drop.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[must_use = "messages are built to be sent or inspected"]
pub struct Message {
    components: Vec<String>,
    payload: Option<Vec<u8>>,
}

impl Message {
    /// Builds a message from raw components.
    pub fn from_components(components: Vec<String>) -> Self {
        Self {
            components,
            payload: None,
        }
    }

    /// Builds a request message: the verb followed by its arguments.
    pub fn request<'a>(verb: &str, args: impl IntoIterator<Item = &'a str>) -> Self {
        let mut components = vec![verb.to_string()];
        components.extend(args.into_iter().map(str::to_string));
        Self {
            components,
            payload: None,
        }
    }

    /// Builds a response message: the status code followed by diagnostic or
    /// listing components.
    pub fn response(status: Status, extra: impl IntoIterator<Item = String>) -> Self {
        let mut components = vec![status.to_string()];
        components.extend(extra);
        Self {
            components,
            payload: None,
        }
    }

    /// Attaches an owned payload (used when decoding received frames).
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// All components in order.
    #[must_use]
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Returns component `index`, if present.
    #[must_use]
    pub fn component(&self, index: usize) -> Option<&str> {
        self.components.get(index).map(String::as_str)
    }

    /// The first component, conventionally the verb of a request.
    #[must_use]
    pub fn verb(&self) -> Option<&str> {
        self.component(0)
    }

    /// The opaque payload, if any.
    #[must_use]
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Consumes the message, returning its payload.
    #[must_use]
    pub fn into_payload(self) -> Option<Vec<u8>> {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_places_verb_first() {
        let message = Message::request("Source.open", ["client", "cam1"]);
        assert_eq!(message.verb(), Some("Source.open"));
        assert_eq!(message.component(1), Some("client"));
        assert_eq!(message.component(2), Some("cam1"));
        assert_eq!(message.component(3), None);
        assert_eq!(message.payload(), None);
    }

    #[test]
    fn response_renders_status_as_decimal() {
        let message = Message::response(Status::NameClash, ["cam1".to_string()]);
        assert_eq!(message.component(0), Some("6"));
        assert_eq!(message.component(1), Some("cam1"));
    }

    #[test]
    fn payload_round_trips() {
        let message = Message::request("Data", ["cam1"]).with_payload(vec![1, 2, 3]);
        assert_eq!(message.payload(), Some(&[1, 2, 3][..]));
        assert_eq!(message.into_payload(), Some(vec![1, 2, 3]));
    }
}
