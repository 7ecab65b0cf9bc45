//! Per-call inputs: what to transfer, how to verify it, how to stop it.

use std::fs::File;
use std::io::{self, Cursor};
use std::path::PathBuf;
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::checksum::ExpectedChecksum;
use crate::resource::RemoteResource;

use super::handler::UploadReader;
use super::listener::{NoopListener, TransferListener};

/// One peek/get/put call. Build a fresh request per call; the operation is
/// chosen by the transporter method it is passed to.
#[derive(Clone)]
pub struct TransferRequest {
    resource: RemoteResource,
    checksum: Option<ExpectedChecksum>,
    listener: Arc<dyn TransferListener>,
    cancel: CancelToken,
}

impl TransferRequest {
    pub fn new(resource: RemoteResource) -> Self {
        Self {
            resource,
            checksum: None,
            listener: Arc::new(NoopListener),
            cancel: CancelToken::new(),
        }
    }

    /// Verify the downloaded body. Ignored by peek and put.
    pub fn with_checksum(mut self, checksum: ExpectedChecksum) -> Self {
        self.checksum = Some(checksum);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn TransferListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn resource(&self) -> &RemoteResource {
        &self.resource
    }

    pub fn checksum(&self) -> Option<&ExpectedChecksum> {
        self.checksum.as_ref()
    }

    pub fn listener(&self) -> &Arc<dyn TransferListener> {
        &self.listener
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}

impl std::fmt::Debug for TransferRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferRequest")
            .field("resource", &self.resource)
            .field("checksum", &self.checksum)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

/// Upload body. Re-openable, so a retried or rewound upload resends it whole.
#[derive(Debug, Clone)]
pub enum BodySource {
    Bytes(Arc<[u8]>),
    File(PathBuf),
}

impl BodySource {
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        BodySource::Bytes(Arc::from(data.into()))
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        BodySource::File(path.into())
    }

    pub fn len(&self) -> io::Result<u64> {
        match self {
            BodySource::Bytes(b) => Ok(b.len() as u64),
            BodySource::File(p) => Ok(std::fs::metadata(p)?.len()),
        }
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    pub(crate) fn open(&self) -> io::Result<Box<dyn UploadReader>> {
        match self {
            BodySource::Bytes(b) => Ok(Box::new(Cursor::new(Arc::clone(b)))),
            BodySource::File(p) => Ok(Box::new(File::open(p)?)),
        }
    }
}
