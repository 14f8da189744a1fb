//! Signed access to the CDS open API.

mod client;
mod envelope;
mod request;
pub mod signer;

pub use client::{ApiClient, RawResponse};
pub use envelope::{Envelope, EnvelopeSchema};
pub use request::CloudRequest;
pub use signer::Signer;
