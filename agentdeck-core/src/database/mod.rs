pub mod connection;
pub mod entities;
pub mod migrations;
pub mod schema_gate;

#[cfg(test)]
pub mod test_utils;
