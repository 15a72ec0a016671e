//! Terminal UI for picking an output endpoint when none was given.

mod error;
mod port_selector;

pub use error::SelectorError;
pub use port_selector::port_selector;
