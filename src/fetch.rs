//! Download a single S3 object to local disk.
//!
//! The object is streamed into a `.part` file next to the destination and renamed into
//! place only once every byte has been written, so a failed download never leaves a
//! truncated file behind at the destination path.

use crate::error::{Error, Result};

use aws_sdk_s3::{Client, types};
use std::{ffi, fmt, future::Future, io, path, pin::Pin};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default size of the copy buffer.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Location of an object: bucket and key.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct ObjectRef {
    /// The bucket name.
    pub bucket: String,
    /// The object key, including any prefix.
    pub key: String,
}

impl ObjectRef {
    /// Create a reference from a bucket and a key.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.bucket.is_empty() {
            return Err(Error::invalid("bucket must not be empty"));
        }
        if self.key.is_empty() {
            return Err(Error::invalid("object key must not be empty"));
        }
        Ok(())
    }
}

/// Readable object contents.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// An opened object body and the metadata needed to check it.
pub struct ObjectBody {
    /// The object contents. Read errors are reported as transport failures.
    pub body: ObjectReader,
    /// `Content-Length` reported by the service.
    pub content_length: Option<i64>,
    /// Entity tag reported by the service.
    pub e_tag: Option<String>,
}

impl ObjectBody {
    /// Wrap a reader with no metadata.
    pub fn new(body: impl AsyncRead + Send + 'static) -> Self {
        Self {
            body: Box::pin(body),
            content_length: None,
            e_tag: None,
        }
    }
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBody")
            .field("content_length", &self.content_length)
            .field("e_tag", &self.e_tag)
            .finish_non_exhaustive()
    }
}

/// Backend that opens an object for reading.
///
/// Implemented for [`aws_sdk_s3::Client`].
pub trait ObjectSource {
    /// Open the object body. With `verify_checksum` the body is validated against the
    /// stored checksum while it streams.
    fn open_object(
        &self,
        object: &ObjectRef,
        verify_checksum: bool,
    ) -> impl Future<Output = Result<ObjectBody>> + Send;
}

impl ObjectSource for Client {
    async fn open_object(&self, object: &ObjectRef, verify_checksum: bool) -> Result<ObjectBody> {
        let output = self
            .get_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .set_checksum_mode(verify_checksum.then_some(types::ChecksumMode::Enabled))
            .send()
            .await?;
        Ok(ObjectBody {
            content_length: output.content_length,
            e_tag: output.e_tag,
            ..ObjectBody::new(output.body.into_async_read())
        })
    }
}

/// Download options.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchOptions {
    /// Size of the copy buffer in bytes. Zero is treated as one.
    pub chunk_size: usize,
    /// Ask the service for checksum validation of the body.
    pub verify_checksum: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            verify_checksum: true,
        }
    }
}

/// Result of a completed download.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchOutcome {
    /// Where the object was written.
    pub path: path::PathBuf,
    /// Number of bytes written.
    pub bytes: u64,
    /// `Content-Length` reported by the service.
    pub content_length: Option<i64>,
    /// Entity tag reported by the service.
    pub e_tag: Option<String>,
}

/// Fetch object operation.
///
/// ```rust,no_run
/// use aws_sdk_s3::Client;
/// use drive_data::fetch;
///
/// # async fn example(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
/// let fetch_object = fetch::FetchObject {
///     object: fetch::ObjectRef::new(
///         "p3na-18gus.3101.027",
///         "video-files/Recfile P3 Edge 20181120 104743 Webcam Driver Outputiplimage.m4v",
///     ),
///     destination: "driver.m4v".into(),
///     options: Default::default(),
/// };
/// let outcome = fetch_object.send(client).await?;
/// println!("Wrote {} bytes to {}", outcome.bytes, outcome.path.display());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FetchObject {
    /// The object to download.
    pub object: ObjectRef,
    /// The local file to create or overwrite.
    pub destination: path::PathBuf,
    /// Download options.
    pub options: FetchOptions,
}

impl FetchObject {
    /// Execute the download.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "drive_data.fetch",
            skip_all,
            fields(bucket = %self.object.bucket, key = %self.object.key),
            err
        )
    )]
    pub async fn send<S: ObjectSource>(&self, source: &S) -> Result<FetchOutcome> {
        self.object.validate()?;
        let staging = staging_path(&self.destination)?;
        let object = source
            .open_object(&self.object, self.options.verify_checksum)
            .await?;
        let chunk_size = self.options.chunk_size.max(1);
        let content_length = object.content_length;
        let e_tag = object.e_tag;
        let written =
            write_staged(object.body, content_length, &staging, &self.destination, chunk_size)
                .await;
        let bytes = match written {
            Ok(bytes) => bytes,
            Err(error) => {
                discard(&staging).await;
                return Err(error);
            }
        };
        Ok(FetchOutcome {
            path: self.destination.clone(),
            bytes,
            content_length,
            e_tag,
        })
    }
}

fn staging_path(destination: &path::Path) -> Result<path::PathBuf> {
    let file_name = destination.file_name().ok_or_else(|| {
        Error::invalid(format!(
            "destination {} does not name a file",
            destination.display()
        ))
    })?;
    let mut staging_name = ffi::OsString::from(file_name);
    staging_name.push(".part");
    Ok(destination.with_file_name(staging_name))
}

async fn write_staged(
    mut body: ObjectReader,
    content_length: Option<i64>,
    staging: &path::Path,
    destination: &path::Path,
    chunk_size: usize,
) -> Result<u64> {
    let mut file = fs::File::create(staging)
        .await
        .map_err(|error| Error::io(staging, error))?;
    let bytes = copy_chunks(&mut body, &mut file, chunk_size)
        .await
        .map_err(|error| error.into_error(staging))?;
    file.flush()
        .await
        .map_err(|error| Error::io(staging, error))?;
    file.sync_all()
        .await
        .map_err(|error| Error::io(staging, error))?;
    drop(file);
    if let Some(expected) = content_length.and_then(|length| u64::try_from(length).ok()) {
        if bytes != expected {
            return Err(Error::transport(format!(
                "truncated download: expected {expected} bytes, received {bytes}"
            )));
        }
    }
    fs::rename(staging, destination)
        .await
        .map_err(|error| Error::io(destination, error))?;
    Ok(bytes)
}

async fn discard(staging: &path::Path) {
    match fs::remove_file(staging).await {
        Ok(()) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        #[cfg(feature = "tracing")]
        Err(error) => tracing::warn!(
            path = %staging.display(),
            %error,
            "failed to remove partial download"
        ),
        #[cfg(not(feature = "tracing"))]
        Err(_) => {}
    }
}

/// Which side of a copy failed.
#[derive(Debug)]
pub(crate) enum CopyError {
    Read(io::Error),
    Write(io::Error),
}

impl CopyError {
    fn into_error(self, path: &path::Path) -> Error {
        match self {
            Self::Read(error) => Error::transport(format!("failed to read object body: {error}")),
            Self::Write(error) => Error::io(path, error),
        }
    }
}

/// Copy `reader` into `writer` through a buffer of `chunk_size` bytes.
pub(crate) async fn copy_chunks<R, W>(
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
) -> std::result::Result<u64, CopyError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0; chunk_size];
    let mut total = 0_u64;
    loop {
        let read = reader.read(&mut buffer).await.map_err(CopyError::Read)?;
        if read == 0 {
            break;
        }
        writer
            .write_all(&buffer[..read])
            .await
            .map_err(CopyError::Write)?;
        total += read as u64;
    }
    #[cfg(feature = "tracing")]
    tracing::debug!(bytes = total, chunk_size, "copied object body");
    Ok(total)
}
