//! Line-oriented decoder for `text/event-stream` bodies.

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Accumulates `event:`/`data:` lines and dispatches an event on each blank
/// line. Comment lines and unknown fields are ignored.
#[derive(Debug)]
pub struct SseDecoder {
    event_name: String,
    data: String,
    has_data: bool,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            event_name: "message".to_string(),
            data: String::new(),
            has_data: false,
        }
    }

    pub fn push_line(&mut self, line: &str) -> Option<SseEvent> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        if let Some(name) = line.strip_prefix("event:") {
            self.event_name = name.trim().to_string();
        } else if let Some(data) = line.strip_prefix("data:") {
            let data = data.strip_prefix(' ').unwrap_or(data);
            if self.has_data {
                self.data.push('\n');
            }
            self.data.push_str(data);
            self.has_data = true;
        }
        None
    }

    /// Flushes an event left pending when the body ends without a trailing
    /// blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        self.dispatch()
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if !self.has_data {
            self.event_name = "message".to_string();
            return None;
        }
        let event = SseEvent {
            event: std::mem::replace(&mut self.event_name, "message".to_string()),
            data: std::mem::take(&mut self.data),
        };
        self.has_data = false;
        Some(event)
    }
}
