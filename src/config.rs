//! Host State
//!
//! Process-wide values the interposer reads on every call. Everything is
//! zero / empty at boot and lives as long as the system does.
//!
//! # Producers
//! - The host kernel calls [`HostState::configure`] once during boot
//! - The network subsystem calls [`HostState::mark_network_funcs_started`]
//! - The operator console flips [`Features`] at runtime

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use bitflags::bitflags;

bitflags! {
    /// Rule families the operator can switch off.
    ///
    /// A disabled family behaves as if no rule matched.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct Features: u32 {
        /// Region and language emulation on the configuration services.
        const LANGUAGE_EMULATION = 1 << 0;
        /// Custom handling of fatal error throws.
        const ERROR_THROW_HOOK = 1 << 1;
        /// Keep network management from pausing the network stack.
        const NDM_WORKAROUND = 1 << 2;
        /// Serve the boot logo from removable storage when present.
        const LOGO_REDIRECT = 1 << 3;
        /// Learn service names from connect responses.
        const SERVICE_TRACKING = 1 << 4;
        /// Ask the plugin supervisor about watched operations.
        const PLUGIN_WATCH = 1 << 5;
        /// Plugin wake-up and home-menu events.
        const PLUGIN_EVENTS = 1 << 6;
    }
}

/// Packed kernel version word.
///
/// Major in bits 24..31, minor in 16..23, revision in 8..15.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(transparent)]
pub struct KernelVersion(u32);

impl KernelVersion {
    pub const fn new(major: u8, minor: u8, revision: u8) -> Self {
        Self(((major as u32) << 24) | ((minor as u32) << 16) | ((revision as u32) << 8))
    }

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn major(self) -> u8 {
        (self.0 >> 24) as u8
    }

    #[inline]
    pub const fn minor(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[inline]
    pub const fn revision(self) -> u8 {
        (self.0 >> 8) as u8
    }
}

/// Shared state consulted by the interposer.
#[derive(Debug)]
pub struct HostState {
    network_funcs_started: AtomicBool,
    boot_module_count: AtomicU32,
    kernel_version: AtomicU32,
    features: AtomicU32,
}

impl HostState {
    /// Boot-time state: no milestone, no boot modules, version zero, all features on.
    pub const fn new() -> Self {
        Self {
            network_funcs_started: AtomicBool::new(false),
            boot_module_count: AtomicU32::new(0),
            kernel_version: AtomicU32::new(0),
            features: AtomicU32::new(Features::all().bits()),
        }
    }

    /// Record the boot module count and running kernel version.
    pub fn configure(&self, boot_modules: u32, version: KernelVersion) {
        self.boot_module_count.store(boot_modules, Ordering::Relaxed);
        self.kernel_version.store(version.raw(), Ordering::Relaxed);
        log::info!(
            "host configured: {} boot modules, kernel {}.{}.{}",
            boot_modules,
            version.major(),
            version.minor(),
            version.revision()
        );
    }

    /// One-way: network functions have started at least once.
    pub fn mark_network_funcs_started(&self) {
        if !self.network_funcs_started.swap(true, Ordering::AcqRel) {
            log::info!("network functions started");
        }
    }

    #[inline]
    pub fn network_funcs_started(&self) -> bool {
        self.network_funcs_started.load(Ordering::Acquire)
    }

    #[inline]
    pub fn boot_module_count(&self) -> u32 {
        self.boot_module_count.load(Ordering::Relaxed)
    }

    /// Whether `pid` belongs to a process launched after boot.
    #[inline]
    pub fn is_application_pid(&self, pid: u32) -> bool {
        pid >= self.boot_module_count()
    }

    #[inline]
    pub fn kernel_version(&self) -> KernelVersion {
        KernelVersion::from_raw(self.kernel_version.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn features(&self) -> Features {
        Features::from_bits_truncate(self.features.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn is_enabled(&self, feature: Features) -> bool {
        self.features().contains(feature)
    }

    pub fn set_features(&self, features: Features) {
        self.features.store(features.bits(), Ordering::Relaxed);
    }

    /// Switch one feature family on or off.
    pub fn toggle(&self, feature: Features, enabled: bool) {
        if enabled {
            self.features.fetch_or(feature.bits(), Ordering::Relaxed);
        } else {
            self.features.fetch_and(!feature.bits(), Ordering::Relaxed);
        }
    }
}

impl Default for HostState {
    fn default() -> Self {
        Self::new()
    }
}
