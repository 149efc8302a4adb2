pub mod config_io;
pub mod gateway;
pub mod local_store;
pub mod lock;
pub mod remote;

#[cfg(test)]
pub(crate) mod fake_remote;
