//! Backend implementations.

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(all(feature = "posix", unix))]
pub mod posix;

#[cfg(feature = "winlocal")]
pub mod winlocal;

/// Registers all compiled backends with the factory.
///
/// This should be called automatically when the library is used,
/// but can also be called explicitly if needed.
pub fn register_all() {
    #[cfg(feature = "mock")]
    mock::register();

    #[cfg(all(feature = "posix", unix))]
    posix::register();

    #[cfg(feature = "winlocal")]
    winlocal::register();
}
