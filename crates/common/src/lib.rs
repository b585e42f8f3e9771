//! Shared building blocks for the fedinet workspace.
//!
//! - **Configuration**: layered settings via [`Config`]
//! - **Error handling**: the federation error taxonomy via [`AppError`] and [`AppResult`]
//! - **Cryptography**: RSA signing over canonical activity bytes
//! - **ID generation**: ULID-based identifiers via [`IdGenerator`]
//!
//! # Example
//!
//! ```no_run
//! use fedinet_common::{AppResult, Config, IdGenerator};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id = IdGenerator::new().generate();
//!     println!("{} issued {id}", config.federation.instance_name);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod id;

pub use config::Config;
pub use crypto::{RsaKeypair, generate_rsa_keypair};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
