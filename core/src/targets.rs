pub const API: &str = "api";
pub const REALTIME: &str = "realtime";
pub const FORMS: &str = "forms";
pub const UI: &str = "ui";
pub const STORAGE: &str = "storage";
