use serde::Serialize;

/// One frame of a `text/event-stream` response.
#[derive(Debug, PartialEq)]
pub struct ServerSentEvent<T> {
    pub id: Option<String>,
    pub event: Option<String>,
    pub data: Option<T>,
}

impl<T> ServerSentEvent<T>
where
    T: Serialize,
{
    pub fn data(data: T) -> Self {
        ServerSentEvent {
            id: None,
            event: None,
            data: Some(data),
        }
    }

    pub fn with_id(mut self, id: impl ToString) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_event(mut self, event: &str) -> Self {
        self.event = Some(event.to_string());
        self
    }

    /// Encodes the frame including the blank line that terminates it.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        let mut frame = String::new();
        if let Some(id) = &self.id {
            push_field(&mut frame, "id", id);
        }
        if let Some(event) = &self.event {
            push_field(&mut frame, "event", event);
        }
        if let Some(data) = &self.data {
            push_field(&mut frame, "data", &serde_json::to_string(data)?);
        }
        frame.push('\n');
        Ok(frame)
    }
}

// Multi-line values are split into one field per line
fn push_field(frame: &mut String, name: &str, value: &str) {
    for line in value.lines() {
        frame.push_str(name);
        frame.push_str(": ");
        frame.push_str(line);
        frame.push('\n');
    }
}
