pub mod apply;
pub mod config;
pub mod error;
pub mod io;
pub mod mutate;
pub mod oracle;
pub mod paths;
pub mod pin;
pub mod precommit;
pub mod process;
pub mod update;
pub mod validate;
pub mod version;

pub use error::{PinError, Result};
