//! Command Rules
//!
//! The classifier is a table keyed by (command header, service name).
//! Rows are checked in order and the first full match wins; rules never
//! stack. A miss means the request goes through untouched.

use crate::config::{Features, HostState};
use crate::ipc::CommandBuffer;
use crate::session::ServiceName;

use super::delegate::WatchedOp;

/// Command headers the interposer knows about.
pub mod commands {
    /// ndm:u EnterExclusiveState
    pub const NDM_ENTER_EXCLUSIVE_STATE: u32 = 0x0001_0042;
    /// ndm:u LeaveExclusiveState
    pub const NDM_LEAVE_EXCLUSIVE_STATE: u32 = 0x0002_0002;
    /// ndm:u SuspendScheduler
    pub const NDM_SUSPEND_SCHEDULER: u32 = 0x0008_0040;
    /// ndm:u ResumeScheduler
    pub const NDM_RESUME_SCHEDULER: u32 = 0x0009_0000;

    /// cfg GetConfigInfoBlk2
    pub const CFG_GET_CONFIG_BLK2: u32 = 0x0001_0082;
    /// cfg SecureInfoGetRegion
    pub const CFG_SECURE_INFO_GET_REGION: u32 = 0x0002_0000;
    /// cfg:s / cfg:i GetConfigInfoBlk4
    pub const CFG_GET_CONFIG_BLK4: u32 = 0x0401_0082;
    /// cfg:s / cfg:i GetConfigInfoBlk8
    pub const CFG_GET_CONFIG_BLK8: u32 = 0x0402_0082;
    /// cfg:s / cfg:i SecureInfoGetRegion
    pub const CFG_SECURE_INFO_GET_REGION_S: u32 = 0x0406_0000;
    /// cfg:i GetConfigInfoBlk4
    pub const CFG_I_GET_CONFIG_BLK4: u32 = 0x0801_0082;
    /// cfg:i GetConfigInfoBlk8
    pub const CFG_I_GET_CONFIG_BLK8: u32 = 0x0802_0082;
    /// cfg:i SecureInfoGetRegion
    pub const CFG_I_SECURE_INFO_GET_REGION: u32 = 0x0816_0000;

    /// err:f Throw
    pub const ERRF_THROW: u32 = 0x0001_0800;

    /// srv: GetServiceHandle
    pub const SRV_GET_SERVICE_HANDLE: u32 = 0x0005_0100;
    /// srv: PublishToSubscriber
    pub const SRV_PUBLISH_TO_SUBSCRIBER: u32 = 0x000C_0080;
    /// APT ReceiveParameter
    pub const APT_RECEIVE_PARAMETER: u32 = 0x000D_0080;

    /// fs:USER OpenFileDirectly
    pub const FS_OPEN_FILE_DIRECTLY: u32 = 0x0803_0204;
    /// fs:USER DeleteFile
    pub const FS_DELETE_FILE: u32 = 0x0804_0142;
    /// fs:USER DeleteDirectoryRecursively
    pub const FS_DELETE_DIRECTORY_RECURSIVELY: u32 = 0x0807_0142;
    /// soc:U connect
    pub const SOC_CONNECT: u32 = 0x0006_0084;
    /// cam:u StartCapture
    pub const CAM_START_CAPTURE: u32 = 0x0001_0040;
}

/// Notification id the plugin loader publishes to wake the application.
pub const PLUGIN_WAKE_NOTIFICATION: u32 = 0x1002;

/// APT ReceiveParameter app id of the home menu.
pub const APT_HOME_MENU_APP_ID: u32 = 0x300;

/// Kernel minor version from which `srv:pm` stopped serving handle lookups.
pub const SRV_PM_LAST_MINOR: u8 = 39;

/// How a rule matches the service name.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ServiceMatch {
    Exact(&'static str),
    /// Any name starting with this prefix.
    Prefix(&'static str),
}

impl ServiceMatch {
    pub fn matches(self, name: &ServiceName) -> bool {
        match self {
            Self::Exact(expected) => name.matches(expected),
            Self::Prefix(prefix) => name.starts_with(prefix),
        }
    }
}

/// Extra condition a rule needs beyond the (header, service) pair.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Guard {
    Always,
    /// Network functions have started and the caller is an application.
    NdmWorkaround,
    /// Payload word 1 equals this value.
    Word1Equals(u32),
    /// Running kernel minor version below this value.
    KernelMinorBelow(u8),
}

/// What to do with a matched request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Action {
    /// Answer with a canned success reply; no real call.
    Synthesize,
    /// Wake the parked application thread, then answer like `Synthesize`.
    WakeAppThread,
    /// Hand the request to language emulation.
    LanguageEmulation,
    /// Hand the request to the error-throw hook.
    ErrorThrow,
    /// Call, then register the returned session under the requested name.
    TrackServiceSession,
    /// Call, then wake the plugin loader on home-menu parameters.
    WatchAppletParameter,
    /// Try the boot logo from removable storage, fall back to the original.
    RedirectLogo,
    /// Ask the plugin supervisor.
    Delegate(WatchedOp),
}

impl Action {
    /// Feature family the action belongs to.
    pub const fn feature(self) -> Features {
        match self {
            Self::Synthesize => Features::NDM_WORKAROUND,
            Self::WakeAppThread | Self::WatchAppletParameter => Features::PLUGIN_EVENTS,
            Self::LanguageEmulation => Features::LANGUAGE_EMULATION,
            Self::ErrorThrow => Features::ERROR_THROW_HOOK,
            Self::TrackServiceSession => Features::SERVICE_TRACKING,
            Self::RedirectLogo => Features::LOGO_REDIRECT,
            Self::Delegate(_) => Features::PLUGIN_WATCH,
        }
    }
}

/// One row of the classifier table.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Rule {
    pub header: u32,
    pub services: &'static [ServiceMatch],
    pub guard: Guard,
    pub action: Action,
}

const NDM: &[ServiceMatch] = &[ServiceMatch::Exact("ndm:u")];
const CFG_ANY: &[ServiceMatch] = &[
    ServiceMatch::Exact("cfg:u"),
    ServiceMatch::Exact("cfg:s"),
    ServiceMatch::Exact("cfg:i"),
];
const CFG_PRIVILEGED: &[ServiceMatch] = &[ServiceMatch::Exact("cfg:s"), ServiceMatch::Exact("cfg:i")];
const CFG_INIT: &[ServiceMatch] = &[ServiceMatch::Exact("cfg:i")];
const FS_USER: &[ServiceMatch] = &[ServiceMatch::Exact("fs:USER")];

const fn rule(header: u32, services: &'static [ServiceMatch], guard: Guard, action: Action) -> Rule {
    Rule { header, services, guard, action }
}

const TABLE: [Rule; 22] = {
    use commands::*;
    use Action::*;
    use Guard::*;

    [
        rule(NDM_ENTER_EXCLUSIVE_STATE, NDM, NdmWorkaround, Synthesize),
        rule(NDM_LEAVE_EXCLUSIVE_STATE, NDM, NdmWorkaround, Synthesize),
        rule(NDM_SUSPEND_SCHEDULER, NDM, NdmWorkaround, Synthesize),
        rule(NDM_RESUME_SCHEDULER, NDM, NdmWorkaround, Synthesize),
        rule(CFG_GET_CONFIG_BLK2, CFG_ANY, Always, LanguageEmulation),
        rule(CFG_SECURE_INFO_GET_REGION, CFG_ANY, Always, LanguageEmulation),
        rule(CFG_GET_CONFIG_BLK4, CFG_PRIVILEGED, Always, LanguageEmulation),
        rule(CFG_GET_CONFIG_BLK8, CFG_PRIVILEGED, Always, LanguageEmulation),
        rule(CFG_SECURE_INFO_GET_REGION_S, CFG_PRIVILEGED, Always, LanguageEmulation),
        rule(CFG_I_GET_CONFIG_BLK4, CFG_PRIVILEGED, Always, LanguageEmulation),
        rule(CFG_I_GET_CONFIG_BLK8, CFG_INIT, Always, LanguageEmulation),
        rule(CFG_I_SECURE_INFO_GET_REGION, CFG_INIT, Always, LanguageEmulation),
        rule(ERRF_THROW, &[ServiceMatch::Exact("err:f")], Always, ErrorThrow),
        rule(SRV_GET_SERVICE_HANDLE, &[ServiceMatch::Exact("srv:")], Always, TrackServiceSession),
        rule(
            SRV_GET_SERVICE_HANDLE,
            &[ServiceMatch::Exact("srv:pm")],
            KernelMinorBelow(SRV_PM_LAST_MINOR),
            TrackServiceSession,
        ),
        rule(
            SRV_PUBLISH_TO_SUBSCRIBER,
            &[ServiceMatch::Exact("srv:")],
            Word1Equals(PLUGIN_WAKE_NOTIFICATION),
            WakeAppThread,
        ),
        rule(
            APT_RECEIVE_PARAMETER,
            &[ServiceMatch::Prefix("APT:")],
            Word1Equals(APT_HOME_MENU_APP_ID),
            WatchAppletParameter,
        ),
        rule(FS_OPEN_FILE_DIRECTLY, FS_USER, Always, RedirectLogo),
        rule(FS_DELETE_FILE, FS_USER, Always, Delegate(WatchedOp::DeleteFile)),
        rule(FS_DELETE_DIRECTORY_RECURSIVELY, FS_USER, Always, Delegate(WatchedOp::DeleteDirectory)),
        rule(SOC_CONNECT, &[ServiceMatch::Exact("soc:U")], Always, Delegate(WatchedOp::SocketConnect)),
        rule(CAM_START_CAPTURE, &[ServiceMatch::Exact("cam:u")], Always, Delegate(WatchedOp::CameraCapture)),
    ]
};

/// The classifier table, in precedence order.
pub static RULES: &[Rule] = &TABLE;

impl Rule {
    fn matches_service(&self, name: &ServiceName) -> bool {
        self.services.iter().any(|pattern| pattern.matches(name))
    }

    fn guard_holds(&self, cmdbuf: &CommandBuffer, pid: u32, host: &HostState) -> bool {
        match self.guard {
            Guard::Always => true,
            Guard::NdmWorkaround => host.network_funcs_started() && host.is_application_pid(pid),
            Guard::Word1Equals(value) => cmdbuf.word(1) == value,
            Guard::KernelMinorBelow(minor) => host.kernel_version().minor() < minor,
        }
    }
}

/// Pick the rule for a request, if any.
///
/// Pure: the same (name, buffer, pid, host state) always yields the same row.
/// Requests on sessions with no known name never match.
pub fn classify(
    name: Option<&ServiceName>,
    cmdbuf: &CommandBuffer,
    pid: u32,
    host: &HostState,
) -> Option<&'static Rule> {
    let name = name?;
    let header = cmdbuf.header().raw();

    RULES.iter().find(|rule| {
        rule.header == header
            && rule.matches_service(name)
            && rule.guard_holds(cmdbuf, pid, host)
            && host.is_enabled(rule.action.feature())
    })
}
