use crate::error::{Result, UploadError};
use bytes::Bytes;
use futures_util::stream::{self, Stream};
use futures_util::future::Either;
use std::{
    io,
    path::{Path, PathBuf},
};
use tokio_util::io::ReaderStream;

/// 上报进度时使用的分块大小。
pub(crate) const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Clone, Debug)]
pub enum FileSource {
    Path(PathBuf),
    Memory(Bytes),
}

/// 待上传的单个文件。批次内以文件名区分，重名时后者的进度记录会覆盖前者。
#[derive(Clone, Debug)]
pub struct UploadFile {
    name: String,
    source: FileSource,
}

impl UploadFile {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| {
                UploadError::Config(format!("{} has no file name", path.display()))
            })?;
        Ok(Self {
            name,
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    pub fn from_bytes(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            source: FileSource::Memory(content.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    pub async fn size(&self) -> io::Result<u64> {
        match &self.source {
            FileSource::Path(path) => Ok(tokio::fs::metadata(path).await?.len()),
            FileSource::Memory(bytes) => Ok(bytes.len() as u64),
        }
    }

    /// 整个文件读入内存。
    pub async fn read_all(&self) -> io::Result<Bytes> {
        match &self.source {
            FileSource::Path(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
            FileSource::Memory(bytes) => Ok(bytes.clone()),
        }
    }

    /// 按块读取，磁盘文件不会整体载入内存。
    pub async fn open_stream(
        &self,
    ) -> io::Result<impl Stream<Item = io::Result<Bytes>> + Send + Sync + 'static> {
        match &self.source {
            FileSource::Path(path) => {
                let file = tokio::fs::File::open(path).await?;
                Ok(Either::Left(ReaderStream::with_capacity(file, CHUNK_SIZE)))
            }
            FileSource::Memory(bytes) => Ok(Either::Right(chunked(bytes.clone()))),
        }
    }
}

pub(crate) fn chunked(
    bytes: Bytes,
) -> impl Stream<Item = io::Result<Bytes>> + Send + Sync + 'static {
    let chunks: Vec<io::Result<Bytes>> = (0..bytes.len())
        .step_by(CHUNK_SIZE)
        .map(|start| Ok(bytes.slice(start..(start + CHUNK_SIZE).min(bytes.len()))))
        .collect();
    stream::iter(chunks)
}
