/// Use mimalloc as the global allocator. Faster than glibc malloc for the
/// many small allocations the run writer and merge line decoders make,
/// with better thread-local caching under the background merge threads.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod common;
pub mod error;
pub mod generate;
pub mod sort;

pub use error::Error;
