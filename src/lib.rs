//! TSS Signer Library
//!
//! Turns signatures from an external threshold-signing backend into
//! Ethereum artifacts.
//!
//! # Architecture
//!
//! - **signing**: digest construction, signing backends, recovery-id resolution
//! - **tx**: signed transaction assembly and broadcast
//! - **pipeline**: runs one request end to end
//! - **config** / **cli**: startup configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use tss_signer::pipeline::Finalizer;
//! use tss_signer::signing::RemoteSigner;
//!
//! let finalizer = Finalizer::new(RemoteSigner::new(backend_config)?, Some(expected));
//! let artifact = finalizer.sign_message(b"Hello World")?;
//! println!("{}", artifact.signature);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod signing;
pub mod tx;
pub mod types;
pub mod utils;

pub use error::{ErrorCode, TssError, TssResult};
pub use utils::{keccak256, to_checksum_address};
