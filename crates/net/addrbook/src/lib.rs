//! Address book of known peer addresses.
//!
//! [`FileAddressBook`] keeps the book in memory and writes it back as JSON
//! on [`AddressBook::save`](seeder_node_api::AddressBook::save). Entries are
//! kept in address order so that saving an unchanged book always produces
//! the same bytes.

mod book;
mod known;
mod routable;

use thiserror::Error;

pub use book::FileAddressBook;
pub use known::KnownAddress;
pub use routable::is_routable;

#[derive(Debug, Error)]
pub enum AddressBookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
}
