pub mod console;
pub mod dashboard;
