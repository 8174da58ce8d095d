use serde_json::Value;

/// Textual content of a spreadsheet cell that was exported as JSON.
pub trait CellText {
    fn cell_text(&self) -> String;
}

impl CellText for Value {
    fn cell_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.trim().to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Array(_) | Value::Object(_) => self.to_string(),
        }
    }
}

impl CellText for Option<&Value> {
    fn cell_text(&self) -> String {
        self.map(Value::cell_text).unwrap_or_default()
    }
}
