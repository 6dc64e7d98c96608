//! Mapped log buffer creation and access
//!
//! A log buffer file holds three term buffers followed by one metadata
//! page. The mapping is shared with the publisher process: the publisher
//! appends frames and advances the tail counters, subscribers only read.

use std::{
    ffi::CString,
    fs::{File, OpenOptions},
    os::fd::{AsRawFd, OwnedFd, RawFd},
    os::unix::fs::OpenOptionsExt,
    path::PathBuf,
};

use memmap2::{MmapMut, MmapOptions};
use nix::{
    sys::memfd::{memfd_create, MemFdCreateFlag},
    unistd::ftruncate,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MonetError, Result};

use super::descriptor::{
    check_term_length, compute_log_length, LogMetadata, LOG_META_DATA_LENGTH, PARTITION_COUNT,
    TERM_MIN_LENGTH,
};

/// Types of backing storage for a log buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackingType {
    /// File-backed log buffer, shareable by path
    FileBacked,
    /// Anonymous memory file descriptor (Linux-specific)
    #[cfg(target_os = "linux")]
    MemFd,
}

impl Default for BackingType {
    fn default() -> Self {
        Self::FileBacked
    }
}

impl BackingType {
    /// Check if this backing type is supported on the current platform
    pub fn is_supported(&self) -> bool {
        match self {
            BackingType::FileBacked => true,
            #[cfg(target_os = "linux")]
            BackingType::MemFd => true,
        }
    }

    /// Get a human-readable name for the backing type
    pub fn name(&self) -> &'static str {
        match self {
            BackingType::FileBacked => "file-backed",
            #[cfg(target_os = "linux")]
            BackingType::MemFd => "memfd",
        }
    }
}

/// Configuration for creating or opening a mapped log buffer
#[derive(Debug, Clone)]
pub struct LogBufferConfig {
    /// Name of the log buffer
    pub name: String,
    /// Length in bytes of each of the three term buffers
    pub term_length: i32,
    /// Term id the stream starts with
    pub initial_term_id: i32,
    /// Correlation id assigned to the log by the driver
    pub correlation_id: i64,
    /// Backing type for the log file
    pub backing_type: BackingType,
    /// Optional file path for file-backed logs
    pub file_path: Option<PathBuf>,
    /// Whether to create the log if it doesn't exist
    pub create: bool,
    /// Permissions for the log file (Unix permissions)
    pub permissions: u32,
}

impl Default for LogBufferConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            term_length: 64 * 1024,
            initial_term_id: 0,
            correlation_id: 0,
            backing_type: BackingType::default(),
            file_path: None,
            create: true,
            permissions: 0o644,
        }
    }
}

impl LogBufferConfig {
    /// Create a new log buffer configuration
    pub fn new(name: impl Into<String>, term_length: i32) -> Self {
        Self {
            name: name.into(),
            term_length,
            ..Default::default()
        }
    }

    /// Set the initial term id
    pub fn with_initial_term_id(mut self, initial_term_id: i32) -> Self {
        self.initial_term_id = initial_term_id;
        self
    }

    /// Set the correlation id
    pub fn with_correlation_id(mut self, correlation_id: i64) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Set the backing type
    pub fn with_backing_type(mut self, backing_type: BackingType) -> Self {
        self.backing_type = backing_type;
        self
    }

    /// Set the file path for file-backed logs
    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Set whether to create the log if it doesn't exist
    pub fn with_create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(MonetError::invalid_parameter(
                "name",
                "log buffer name cannot be empty",
            ));
        }

        check_term_length(self.term_length)?;

        if !self.backing_type.is_supported() {
            return Err(MonetError::invalid_parameter(
                "backing_type",
                format!(
                    "backing type {} is not supported on this platform",
                    self.backing_type.name()
                ),
            ));
        }

        if !self.create {
            match self.backing_type {
                BackingType::FileBacked if self.file_path.is_none() => {
                    return Err(MonetError::invalid_parameter(
                        "file_path",
                        "file path must be specified for existing file-backed logs",
                    ));
                }
                #[cfg(target_os = "linux")]
                BackingType::MemFd => {
                    return Err(MonetError::invalid_parameter(
                        "backing_type",
                        "memfd logs cannot be reopened by name",
                    ));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Get the default file path for this log buffer
    pub fn default_file_path(&self) -> PathBuf {
        self.file_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("/tmp/monet_{}.logbuffer", self.name)))
    }
}

/// A memory-mapped log buffer shared between a publisher and subscribers
#[derive(Debug)]
pub struct MappedLogBuffer {
    /// Name of the log buffer
    name: String,
    /// Memory-mapped log
    mmap: MmapMut,
    /// Length in bytes of each term buffer
    term_length: i32,
    /// Optional file handle for file-backed logs
    _file: Option<File>,
    /// Owned file descriptor for memfd logs
    _owned_fd: Option<OwnedFd>,
    /// Raw file descriptor
    fd: RawFd,
}

impl MappedLogBuffer {
    /// Create or open a mapped log buffer
    ///
    /// When `config.create` is set, the backing file is created, sized to
    /// three terms plus the metadata page, and its metadata block is
    /// initialized. Otherwise an existing file is opened and its metadata
    /// validated against the mapped length.
    pub fn new(config: LogBufferConfig) -> Result<Self> {
        config.validate()?;

        let (file, owned_fd, fd, length) = if config.create {
            let length = compute_log_length(config.term_length);
            let (file, owned_fd, fd) = Self::create_backing(&config, length)?;
            (file, owned_fd, fd, length)
        } else {
            let path = config.default_file_path();
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&path)
                .map_err(|e| MonetError::from_io(e, "Failed to open existing log file"))?;
            let length = file
                .metadata()
                .map_err(|e| MonetError::from_io(e, "Failed to stat log file"))?
                .len() as usize;

            if length < compute_log_length(TERM_MIN_LENGTH) {
                return Err(MonetError::memory(format!(
                    "log file too short to hold a log: {} bytes",
                    length
                )));
            }

            let fd = file.as_raw_fd();
            (Some(file), None, fd, length)
        };

        let mmap = Self::create_mapping(&file, &owned_fd, length)?;

        let mut log = Self {
            name: config.name.clone(),
            mmap,
            term_length: config.term_length,
            _file: file,
            _owned_fd: owned_fd,
            fd,
        };

        if config.create {
            unsafe { log.metadata_mut() }.init(
                config.term_length,
                config.initial_term_id,
                config.correlation_id,
            );
        } else {
            log.metadata().validate(length)?;
            log.term_length = log.metadata().term_length;
        }

        debug!(
            name = %log.name,
            term_length = log.term_length,
            length,
            backing = config.backing_type.name(),
            created = config.create,
            "mapped log buffer"
        );

        Ok(log)
    }

    /// Create the backing storage for a new log
    fn create_backing(
        config: &LogBufferConfig,
        length: usize,
    ) -> Result<(Option<File>, Option<OwnedFd>, RawFd)> {
        match config.backing_type {
            BackingType::FileBacked => Self::create_file_backing(config, length),
            #[cfg(target_os = "linux")]
            BackingType::MemFd => Self::create_memfd_backing(config, length),
        }
    }

    /// Create file-backed storage
    fn create_file_backing(
        config: &LogBufferConfig,
        length: usize,
    ) -> Result<(Option<File>, Option<OwnedFd>, RawFd)> {
        let path = config.default_file_path();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(config.permissions)
            .open(&path)
            .map_err(|e| MonetError::from_io(e, "Failed to create log file"))?;

        file.set_len(length as u64)
            .map_err(|e| MonetError::from_io(e, "Failed to set log file size"))?;

        let fd = file.as_raw_fd();
        Ok((Some(file), None, fd))
    }

    /// Create memfd-backed storage
    #[cfg(target_os = "linux")]
    fn create_memfd_backing(
        config: &LogBufferConfig,
        length: usize,
    ) -> Result<(Option<File>, Option<OwnedFd>, RawFd)> {
        let name_cstr = CString::new(config.name.clone())
            .map_err(|_| MonetError::invalid_parameter("name", "name contains null bytes"))?;

        let owned_fd = memfd_create(&name_cstr, MemFdCreateFlag::MFD_CLOEXEC)
            .map_err(|e| MonetError::platform(format!("Failed to create memfd: {}", e)))?;

        let raw_fd = owned_fd.as_raw_fd();

        ftruncate(&owned_fd, length as i64)
            .map_err(|e| MonetError::platform(format!("Failed to set memfd size: {}", e)))?;

        Ok((None, Some(owned_fd), raw_fd))
    }

    /// Create the memory mapping over the backing storage
    fn create_mapping(
        file: &Option<File>,
        owned_fd: &Option<OwnedFd>,
        length: usize,
    ) -> Result<MmapMut> {
        match (file, owned_fd) {
            (Some(f), _) => unsafe {
                MmapOptions::new()
                    .len(length)
                    .map_mut(f)
                    .map_err(|e| MonetError::from_io(e, "Failed to map log file"))
            },
            (None, Some(fd)) => unsafe {
                MmapOptions::new()
                    .len(length)
                    .map_mut(fd)
                    .map_err(|e| MonetError::from_io(e, "Failed to map memfd log"))
            },
            (None, None) => Err(MonetError::platform(
                "no file or owned fd available for mapping",
            )),
        }
    }

    /// Name of the log buffer
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length in bytes of each term buffer
    pub fn term_length(&self) -> i32 {
        self.term_length
    }

    /// Total mapped length in bytes
    pub fn length(&self) -> usize {
        self.mmap.len()
    }

    /// Raw file descriptor of the backing storage
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Read-only pointer to the term buffer at `index`
    pub fn term_buffer(&self, index: usize) -> *const u8 {
        debug_assert!(index < PARTITION_COUNT);
        unsafe { self.mmap.as_ptr().add(index * self.term_length as usize) }
    }

    /// Mutable pointer to the term buffer at `index`
    ///
    /// # Safety
    ///
    /// Caller must be the sole writer of the addressed term region and must
    /// publish frame lengths with release ordering.
    pub unsafe fn term_buffer_mut(&self, index: usize) -> *mut u8 {
        debug_assert!(index < PARTITION_COUNT);
        self.mmap.as_ptr().add(index * self.term_length as usize) as *mut u8
    }

    /// Reference to the metadata block trailing the term buffers
    pub fn metadata(&self) -> &LogMetadata {
        let offset = self.mmap.len() - LOG_META_DATA_LENGTH;
        unsafe { &*(self.mmap.as_ptr().add(offset) as *const LogMetadata) }
    }

    /// Mutable reference to the metadata block
    ///
    /// # Safety
    ///
    /// Caller must have exclusive access to the mapping, which only holds
    /// during log creation before the mapping is shared.
    unsafe fn metadata_mut(&mut self) -> &mut LogMetadata {
        let offset = self.mmap.len() - LOG_META_DATA_LENGTH;
        &mut *(self.mmap.as_mut_ptr().add(offset) as *mut LogMetadata)
    }
}

impl Drop for MappedLogBuffer {
    fn drop(&mut self) {
        debug!(name = %self.name, "unmapping log buffer");

        if self._file.is_none() && self._owned_fd.is_none() && self.fd != -1 {
            #[cfg(target_os = "linux")]
            unsafe {
                libc::close(self.fd);
            }
        }
    }
}

unsafe impl Send for MappedLogBuffer {}
unsafe impl Sync for MappedLogBuffer {}
