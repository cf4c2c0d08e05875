pub mod data_loader;
pub mod error;
pub mod outcome;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_server;
