pub mod format;
pub mod hierarchy;
pub mod reference;
pub mod required;

pub use format::{validate, validate_all};
pub use reference::CrossReference;
pub use required::{check_required, check_required_fields, check_unique};
