mod builder;
mod executor;
mod layout;
mod receipts;
mod status_db;

pub use builder::{CommandBuilder, PortBuilder};
pub use executor::{perform, ActionOutcome, ActionResult, InstallSummary, KeepGoing};
pub use layout::{default_root, InstallLayout};
pub use receipts::{read_install_receipts, remove_install_receipt, write_install_receipt};
pub use status_db::StatusDb;

#[cfg(test)]
mod tests;
