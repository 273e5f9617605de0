//! External service clients and derived credentials.

pub mod artifacts;
pub mod payment;

pub use artifacts::{ArtifactSigner, DownloadSigner, SignerError};
pub use payment::{PaymentError, PaymentOrder, PaymentProcessor, RazorpayClient};
