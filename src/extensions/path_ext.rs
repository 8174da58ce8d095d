use std::path::Path;

pub trait InputLabel {
    /// Name an input file is referred to by in logs.
    fn input_label(&self) -> &str;
}

impl InputLabel for Path {
    fn input_label(&self) -> &str {
        self.file_name().and_then(|name| name.to_str()).filter(|name| !name.is_empty()).unwrap_or("input")
    }
}
