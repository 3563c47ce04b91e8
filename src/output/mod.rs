pub mod json;
pub mod table;

pub use json::render_json;
pub use table::render_records_table;
