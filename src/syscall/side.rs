//! Side Features
//!
//! Services the interposer routes into but does not implement: language
//! emulation, the error-throw override, and the plugin loader's runtime
//! state. The host wires these up; the engine only decides when to call them.

use crate::ipc::{CommandBuffer, ResultCode};

/// Plugin loader runtime state, as reported by the loader.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum PluginState {
    /// No plugin loaded.
    #[default]
    None,
    /// A plugin is running alongside the application.
    Running,
    /// The application is suspended in the home menu.
    InHome,
    /// The plugin is shutting down.
    Exiting,
}

/// Hooks into side features.
pub trait SideFeatures {
    /// Answer a configuration-service command with emulated region or
    /// language data.
    ///
    /// Returns the result to hand back if the command was answered, or
    /// `None` to let the real service handle it.
    fn emulate_language(&self, cmdbuf: &mut CommandBuffer) -> Option<ResultCode>;

    /// Inspect a fatal error throw. Returns `true` if it was consumed.
    fn intercept_throw(&self, cmdbuf: &mut CommandBuffer) -> bool;

    fn plugin_state(&self) -> PluginState;

    /// Signal the event the plugin loader waits on while in the home menu.
    fn signal_home_event(&self);

    /// Resume the application thread the plugin loader parked.
    fn wake_app_thread(&self);
}

/// Side features that are not installed: nothing is emulated or consumed.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSideFeatures;

impl SideFeatures for NoSideFeatures {
    fn emulate_language(&self, _cmdbuf: &mut CommandBuffer) -> Option<ResultCode> {
        None
    }

    fn intercept_throw(&self, _cmdbuf: &mut CommandBuffer) -> bool {
        false
    }

    fn plugin_state(&self) -> PluginState {
        PluginState::None
    }

    fn signal_home_event(&self) {}

    fn wake_app_thread(&self) {}
}
