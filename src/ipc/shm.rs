/*!
 * Shared Mapping Backend
 * Named shared-memory mappings over the host primitive (POSIX shm)
 */

#[cfg(unix)]
pub(crate) use self::posix::ShmMapping;

#[cfg(not(unix))]
pub(crate) use self::stub::ShmMapping;

#[cfg(unix)]
mod posix {
    use crate::core::{CoreResult, ErrorModule, Status, StatusCode};
    use log::warn;
    use nix::errno::Errno;
    use nix::fcntl::OFlag;
    use nix::sys::mman::{mmap, munmap, shm_open, shm_unlink, MapFlags, ProtFlags};
    use nix::sys::stat::Mode;
    use nix::unistd::ftruncate;
    use std::ffi::c_void;
    use std::num::NonZeroUsize;
    use std::ptr::NonNull;

    fn ipc_status(code: StatusCode, message: impl Into<String>) -> Status {
        Status::with_module(code, message, ErrorModule::Ipc, 0)
    }

    /// A mapped named shared-memory object.
    ///
    /// The creating side owns the name and unlinks it on drop; attaching
    /// sides only unmap their view.
    pub(crate) struct ShmMapping {
        name: String,
        owner: bool,
        ptr: NonNull<c_void>,
        len: usize,
    }

    // The mapping is plain bytes; all concurrent access goes through the
    // atomics placed into it by the channel layer.
    unsafe impl Send for ShmMapping {}

    impl ShmMapping {
        /// Create a new named object of `len` bytes, failing if it exists
        pub(crate) fn create(name: &str, len: usize) -> CoreResult<Self> {
            let fd = match shm_open(
                name,
                OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
                Mode::S_IRUSR | Mode::S_IWUSR,
            ) {
                Ok(fd) => fd,
                Err(Errno::EEXIST) => {
                    return Err(ipc_status(
                        StatusCode::AlreadyInitialized,
                        "channel already exists, server should be unique",
                    ))
                }
                Err(e) => {
                    return Err(ipc_status(StatusCode::IoError, format!("shm_open failed: {}", e)))
                }
            };

            if let Err(e) = ftruncate(&fd, len as i64) {
                let _ = shm_unlink(name);
                return Err(ipc_status(StatusCode::IoError, format!("ftruncate failed: {}", e)));
            }

            let ptr = Self::map(&fd, len).inspect_err(|_| {
                let _ = shm_unlink(name);
            })?;

            Ok(Self { name: name.to_string(), owner: true, ptr, len })
        }

        /// Attach to an existing named object, mapping `len` bytes
        pub(crate) fn open(name: &str, len: usize) -> CoreResult<Self> {
            let fd = match shm_open(name, OFlag::O_RDWR, Mode::empty()) {
                Ok(fd) => fd,
                Err(Errno::ENOENT) => {
                    return Err(ipc_status(
                        StatusCode::NotFound,
                        "shared mapping not found, server not ready",
                    ))
                }
                Err(e) => {
                    return Err(ipc_status(StatusCode::IoError, format!("shm_open failed: {}", e)))
                }
            };

            let ptr = Self::map(&fd, len)?;
            Ok(Self { name: name.to_string(), owner: false, ptr, len })
        }

        fn map(fd: &std::os::fd::OwnedFd, len: usize) -> CoreResult<NonNull<c_void>> {
            let length = NonZeroUsize::new(len)
                .ok_or_else(|| ipc_status(StatusCode::InvalidArgument, "mapping size is zero"))?;
            unsafe {
                mmap(
                    None,
                    length,
                    ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                    MapFlags::MAP_SHARED,
                    fd,
                    0,
                )
            }
            .map_err(|e| ipc_status(StatusCode::IoError, format!("mmap failed: {}", e)))
        }

        pub(crate) fn as_mut_ptr(&self) -> *mut u8 {
            self.ptr.as_ptr() as *mut u8
        }

        pub(crate) fn len(&self) -> usize {
            self.len
        }
    }

    impl Drop for ShmMapping {
        fn drop(&mut self) {
            if let Err(e) = unsafe { munmap(self.ptr, self.len) } {
                warn!("munmap of '{}' failed: {}", self.name, e);
            }
            if self.owner {
                if let Err(e) = shm_unlink(self.name.as_str()) {
                    warn!("shm_unlink of '{}' failed: {}", self.name, e);
                }
            }
        }
    }
}

#[cfg(not(unix))]
mod stub {
    use crate::core::{CoreResult, ErrorModule, Status, StatusCode};
    use std::convert::Infallible;

    /// Hosts without a named shared-memory primitive get no channel backend.
    pub(crate) struct ShmMapping {
        never: Infallible,
    }

    impl ShmMapping {
        pub(crate) fn create(_name: &str, _len: usize) -> CoreResult<Self> {
            Err(Self::unsupported())
        }

        pub(crate) fn open(_name: &str, _len: usize) -> CoreResult<Self> {
            Err(Self::unsupported())
        }

        pub(crate) fn as_mut_ptr(&self) -> *mut u8 {
            match self.never {}
        }

        pub(crate) fn len(&self) -> usize {
            match self.never {}
        }

        fn unsupported() -> Status {
            Status::with_module(
                StatusCode::Unsupported,
                "shared-memory channels are not supported on this host",
                ErrorModule::Ipc,
                0,
            )
        }
    }
}
