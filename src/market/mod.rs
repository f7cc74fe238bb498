pub mod alerts;
pub mod global;
pub mod paginator;
pub mod refresh;
pub mod scanner;
pub mod table;

#[cfg(test)]
pub(crate) mod testing;
