//! Capability interface for user-chosen files.
//!
//! The attachment pipeline never touches the filesystem or a browser blob
//! directly; it is handed something implementing [`FileResource`]. The
//! declared media type and name are all classification ever looks at.

use std::fmt::Debug;
use std::io;

use bytes::Bytes;
use futures::future::BoxFuture;

/// Future returned by [`FileResource::read`].
pub type ResourceFuture<'a> = BoxFuture<'a, io::Result<Bytes>>;

pub trait FileResource: Debug + Send + Sync {
    /// File name as chosen by the user (no directory components).
    fn name(&self) -> &str;

    /// Declared media type, e.g. `image/png`. May be empty.
    fn media_type(&self) -> &str;

    /// Size in bytes.
    fn size(&self) -> u64;

    /// Locally resolvable reference used for preview and download links.
    fn locator(&self) -> String;

    /// Read the full contents (download affordance).
    fn read(&self) -> ResourceFuture<'_>;
}
