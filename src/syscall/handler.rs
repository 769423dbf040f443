//! Synchronous Request Hook
//!
//! Entry point that runs in place of the kernel's synchronous request
//! primitive.
//!
//! # Flow
//! ```text
//! resolve handle ─┬─ not a client session ─────────────────────┐
//!                 └─ lookup name ─ classify ─┬─ miss ──────────┤
//!                                            └─ apply rule ─┬──┤ Forward: real call
//!                                                           └──┴ Complete: return result
//! ```
//!
//! # Guarantees
//! - The caller gets exactly one result: the real call's, or a synthesized success
//! - Every borrowed object reference is released before the forwarded call
//! - Rewrites that may not apply are undone from a snapshot before forwarding

use log::{debug, trace, warn};

use crate::cap::{self, Handle, SessionId};
use crate::config::HostState;
use crate::ipc::{CommandBuffer, ResultCode};
use crate::session::{ServiceName, SessionRegistry};

use super::context::ThreadContext;
use super::delegate::{Gateway, Verdict};
use super::rules::{self, Action};
use super::side::{PluginState, SideFeatures};
use super::validate;

/// Archive id of the SD card.
const ARCHIVE_SDMC: u32 = 9;
/// Empty archive path.
const PATH_TYPE_EMPTY: u32 = 1;
/// ASCII file path.
const PATH_TYPE_ASCII: u32 = 3;

/// Size of the file path buffer saved around the logo redirect.
pub const LOGO_PATH_LEN: usize = 0x14;
/// Offset of the file name inside the boot logo's binary path.
const LOGO_NAME_OFFSET: usize = 12;
/// Words of the OpenFileDirectly request (header, 8 normal, 4 translate).
const OPEN_FILE_WORDS: usize = 13;
/// Word holding the file path pointer.
const OPEN_FILE_PATH_WORD: usize = 12;
/// Replacement path on removable storage.
pub const LOGO_SD_PATH: &[u8] = b"/luma/logo.bin\0";

/// APT parameter command that answers a running plugin's request.
const APPLET_COMMAND_RESPONSE: u32 = 3;

/// What happens to the request after interception.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Disposition {
    /// Issue the (possibly rewritten) request to its real service.
    Forward,
    /// The request was answered; return this result.
    Complete(ResultCode),
}

/// The interposition engine.
pub struct Interposer<'a, S: SideFeatures + ?Sized> {
    sessions: &'a SessionRegistry,
    host: &'a HostState,
    side: &'a S,
}

impl<'a, S: SideFeatures + ?Sized> Interposer<'a, S> {
    pub fn new(sessions: &'a SessionRegistry, host: &'a HostState, side: &'a S) -> Self {
        Self { sessions, host, side }
    }

    /// Hook entry: intercept one synchronous request on `handle`.
    ///
    /// Returns the same kind of result the real primitive would.
    pub fn send_sync_request<C: ThreadContext + ?Sized>(
        &self,
        ctx: &C,
        handle: Handle,
        cmdbuf: &mut CommandBuffer,
    ) -> ResultCode {
        match self.intercept(ctx, handle, cmdbuf) {
            Disposition::Complete(res) => res,
            Disposition::Forward => ctx.send_sync_request(handle, cmdbuf),
        }
    }

    /// The kernel destroyed `session`; drop its name.
    pub fn on_session_destroyed(&self, session: SessionId) {
        if let Some(record) = self.sessions.remove(session) {
            trace!("session {:#x} ({}) destroyed", session.raw(), record.name);
        }
    }

    /// Decide what to do with a request, applying any rewrite in place.
    pub fn intercept<C: ThreadContext + ?Sized>(
        &self,
        ctx: &C,
        handle: Handle,
        cmdbuf: &mut CommandBuffer,
    ) -> Disposition {
        let (_session_ref, session) = match cap::resolve_client_session(ctx, handle) {
            Ok(resolved) => resolved,
            Err(err) => {
                trace!("handle {:#x}: {}, passing through", handle.raw(), err);
                return Disposition::Forward;
            }
        };

        let name = self.sessions.lookup(session);
        let pid = ctx.pid();
        let Some(rule) = rules::classify(name.as_ref(), cmdbuf, pid, self.host) else {
            return Disposition::Forward;
        };

        debug!(
            "pid {} {:?} on {}: {:?}",
            pid,
            cmdbuf.header(),
            name.as_ref().map(ServiceName::as_str).unwrap_or("?"),
            rule.action
        );

        self.apply(rule.action, ctx, handle, cmdbuf)
    }

    fn apply<C: ThreadContext + ?Sized>(
        &self,
        action: Action,
        ctx: &C,
        handle: Handle,
        cmdbuf: &mut CommandBuffer,
    ) -> Disposition {
        match action {
            Action::Synthesize => synthesize_reply(cmdbuf),
            Action::WakeAppThread => {
                self.side.wake_app_thread();
                synthesize_reply(cmdbuf)
            }
            Action::LanguageEmulation => match self.side.emulate_language(cmdbuf) {
                Some(res) => Disposition::Complete(res),
                None => Disposition::Forward,
            },
            Action::ErrorThrow => {
                if self.side.intercept_throw(cmdbuf) {
                    Disposition::Complete(ResultCode::SUCCESS)
                } else {
                    Disposition::Forward
                }
            }
            Action::TrackServiceSession => self.track_service_session(ctx, handle, cmdbuf),
            Action::WatchAppletParameter => self.watch_applet_parameter(ctx, handle, cmdbuf),
            Action::RedirectLogo => redirect_logo(ctx, handle, cmdbuf),
            Action::Delegate(op) => match Gateway::new(self.sessions).delegate(ctx, op, cmdbuf) {
                Verdict::Handled => Disposition::Complete(ResultCode::SUCCESS),
                Verdict::Allow | Verdict::Unavailable => Disposition::Forward,
            },
        }
    }

    /// Issue a connect-to-service request and learn the returned session's name.
    ///
    /// Request words 1-2 carry the 8-byte service name; reply word 3 carries
    /// the new client handle.
    fn track_service_session<C: ThreadContext + ?Sized>(
        &self,
        ctx: &C,
        handle: Handle,
        cmdbuf: &mut CommandBuffer,
    ) -> Disposition {
        let name = ServiceName::from_bytes(&cmdbuf.bytes_le::<8>(1));

        let res = ctx.send_sync_request(handle, cmdbuf);
        if res.is_failure() {
            // Older kernels leave the output slot untouched on error; a stale
            // value there would later be closed as if it were ours.
            cmdbuf.set_word(3, 0);
            return Disposition::Complete(res);
        }

        let returned = Handle::from_raw(cmdbuf.word(3));
        match (name, cap::resolve_client_session(ctx, returned)) {
            (Some(name), Ok((_returned_ref, session))) => self.sessions.add(session, name),
            (None, _) => trace!("service handle {:#x} has no name", returned.raw()),
            (Some(name), Err(err)) => trace!("{} handle {:#x}: {}", name, returned.raw(), err),
        }

        Disposition::Complete(res)
    }

    /// Issue APT ReceiveParameter and wake the plugin loader when the home
    /// menu hands control back.
    fn watch_applet_parameter<C: ThreadContext + ?Sized>(
        &self,
        ctx: &C,
        handle: Handle,
        cmdbuf: &mut CommandBuffer,
    ) -> Disposition {
        let res = ctx.send_sync_request(handle, cmdbuf);
        if res.is_success() {
            let command = cmdbuf.word(3);
            let wake = match self.side.plugin_state() {
                PluginState::Running => command == APPLET_COMMAND_RESPONSE,
                // Any parameter delivered while parked in the home menu means
                // the application is being resumed.
                PluginState::InHome => true,
                PluginState::None | PluginState::Exiting => false,
            };
            if wake {
                debug!("applet command {} wakes plugin loader", command);
                self.side.signal_home_event();
            }
        }
        Disposition::Complete(res)
    }
}

/// Answer with `(command id, 1, 0)` and a zero result word.
fn synthesize_reply(cmdbuf: &mut CommandBuffer) -> Disposition {
    cmdbuf.set_header(cmdbuf.header().result_only_reply());
    cmdbuf.set_word(1, 0);
    Disposition::Complete(ResultCode::SUCCESS)
}

/// Try to open the boot logo from the SD card instead of the title's archive.
///
/// If the redirected open fails, both the request words and the path
/// buffer are put back exactly and the original request is forwarded.
fn redirect_logo<C: ThreadContext + ?Sized>(
    ctx: &C,
    handle: Handle,
    cmdbuf: &mut CommandBuffer,
) -> Disposition {
    let path_ptr = cmdbuf.word(OPEN_FILE_PATH_WORD);
    let original_path = match validate::validate_user_pointer(path_ptr, LOGO_PATH_LEN as u32)
        .and_then(|range| validate::read_array::<_, LOGO_PATH_LEN>(ctx, range))
    {
        Ok(path) => path,
        Err(fault) => {
            trace!("open path {:#x}: {}", path_ptr, fault);
            return Disposition::Forward;
        }
    };

    if &original_path[LOGO_NAME_OFFSET..LOGO_NAME_OFFSET + 5] != b"logo\0" {
        return Disposition::Forward;
    }

    let original = cmdbuf.snapshot::<OPEN_FILE_WORDS>();
    cmdbuf.set_word(2, ARCHIVE_SDMC);
    cmdbuf.set_word(3, PATH_TYPE_EMPTY);
    cmdbuf.set_word(5, PATH_TYPE_ASCII);

    if let Err(fault) = ctx.write(path_ptr, LOGO_SD_PATH) {
        warn!("cannot rewrite logo path at {:#x}: {}", path_ptr, fault);
        cmdbuf.restore(&original);
        return Disposition::Forward;
    }

    let res = ctx.send_sync_request(handle, cmdbuf);
    if res.is_success() && cmdbuf.word(1) == 0 {
        debug!("boot logo served from SD");
        return Disposition::Complete(res);
    }

    cmdbuf.restore(&original);
    if let Err(fault) = ctx.write(path_ptr, &original_path) {
        warn!("cannot restore logo path at {:#x}: {}", path_ptr, fault);
    }
    Disposition::Forward
}
