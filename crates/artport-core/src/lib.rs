//! HTTP/HTTPS artifact transport: peek, get and put against a remote
//! repository, with safe resume, interruptible sockets, pooled connections
//! and typed failures.

pub mod cancel;
pub mod checksum;
pub mod classify;
pub mod config;
pub mod factory;
pub mod logging;
pub mod pool;
pub mod resource;
pub mod resume;
pub mod retry;
pub mod route;
pub mod sink;
pub mod socket;
pub mod transfer;
pub mod validators;

pub use cancel::CancelToken;
pub use checksum::{ChecksumAlgorithm, ExpectedChecksum};
pub use classify::{TransferError, TransferOutcome, Transferred};
pub use config::TransportConfig;
pub use factory::{NoTransporter, TransporterFactory};
pub use resource::{InvalidResource, RemoteResource, Repository};
pub use resume::{can_resume, ResumeToken};
pub use transfer::{BodySource, HttpTransporter, TransferListener, TransferRequest};
pub use validators::Validators;
