//! Plugin Supervisor Delegation
//!
//! Some operations are not decided by the interposer at all. The request is
//! re-encoded for the plugin supervisor (`plg:ldr`), sent as a nested call on
//! a handle opened just for it, and the supervisor's reply decides whether
//! the original request still goes to its real service.
//!
//! # Supervisor Protocol
//! ```text
//! request:  [0] header (100, 2 + n, 0)
//!           [1] caller pid
//!           [2] watched operation
//!           [3..3+n] operation arguments
//! reply:    [1] result code
//!           [2] handled flag (non-zero: the supervisor answered the call)
//! ```

use log::{debug, trace, warn};

use crate::cap::OwnedHandle;
use crate::ipc::{CommandBuffer, CommandHeader, WordSnapshot};
use crate::session::SessionRegistry;

use super::context::ThreadContext;
use super::validate::{self, regions, MemoryFault, UserMemory};

/// Service name of the plugin supervisor.
pub const SUPERVISOR_SERVICE: &str = "plg:ldr";

/// Command id of the supervisor's watch request.
pub const SUPERVISOR_WATCH_COMMAND: u16 = 100;

/// Words saved before the request is re-encoded.
pub const SAVED_WORDS: usize = 8;

/// UTF-16 path type in file-system requests.
const PATH_TYPE_UTF16: u32 = 4;

/// Operations the supervisor can watch.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u32)]
pub enum WatchedOp {
    DeleteFile = 0,
    DeleteDirectory = 1,
    SocketConnect = 2,
    CameraCapture = 3,
}

/// Outcome of a delegation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Verdict {
    /// No supervisor, or the request could not be re-encoded. The buffer
    /// was never touched.
    Unavailable,
    /// The supervisor failed or declined. The original request was restored.
    Allow,
    /// The supervisor answered the call; the original must not be sent.
    Handled,
}

/// Why a request could not be re-encoded.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EncodeError {
    /// File-system path descriptor is not a non-empty UTF-16 path.
    BadPath,
    /// Socket address pointer failed validation or could not be read.
    BadAddress(MemoryFault),
}

impl core::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BadPath => write!(f, "unsupported path descriptor"),
            Self::BadAddress(fault) => write!(f, "socket address: {}", fault),
        }
    }
}

/// A re-encoded supervisor request: the operation and up to two arguments.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SupervisorRequest {
    op: WatchedOp,
    args: [u32; 2],
    arg_count: usize,
}

impl SupervisorRequest {
    fn new(op: WatchedOp, args: &[u32]) -> Self {
        let mut request = Self { op, args: [0; 2], arg_count: args.len().min(2) };
        request.args[..request.arg_count].copy_from_slice(&args[..request.arg_count]);
        request
    }

    /// Build the supervisor request from the caller's original words.
    ///
    /// - delete file / directory: `[4]` path type, `[5]` path size, `[7]` path pointer
    /// - socket connect: `[6]` points at a `sockaddr_in`; its address word is forwarded
    /// - camera capture: no arguments
    pub fn encode<M: UserMemory + ?Sized>(
        op: WatchedOp,
        original: &WordSnapshot<SAVED_WORDS>,
        memory: &M,
    ) -> Result<Self, EncodeError> {
        match op {
            WatchedOp::DeleteFile | WatchedOp::DeleteDirectory => {
                let (path_type, size, pointer) = (original.word(4), original.word(5), original.word(7));
                if path_type != PATH_TYPE_UTF16 || size == 0 || pointer == 0 {
                    return Err(EncodeError::BadPath);
                }
                Ok(Self::new(op, &[pointer, size]))
            }
            WatchedOp::SocketConnect => {
                let addr = original.word(6).wrapping_add(4);
                let address = validate::validate_user_range(addr, 4, regions::APPLICATION_DATA)
                    .and_then(|range| validate::read_u32(memory, range))
                    .map_err(EncodeError::BadAddress)?;
                Ok(Self::new(op, &[address]))
            }
            WatchedOp::CameraCapture => Ok(Self::new(op, &[])),
        }
    }

    pub fn header(&self) -> CommandHeader {
        CommandHeader::new(SUPERVISOR_WATCH_COMMAND, 2 + self.arg_count as u32, 0)
    }

    /// Write the request over the command buffer.
    fn write_to(&self, cmdbuf: &mut CommandBuffer, pid: u32) {
        cmdbuf.set_header(self.header());
        cmdbuf.set_word(1, pid);
        cmdbuf.set_word(2, self.op as u32);
        for (i, &arg) in self.args[..self.arg_count].iter().enumerate() {
            cmdbuf.set_word(3 + i, arg);
        }
    }
}

/// Nested calls to the plugin supervisor.
pub struct Gateway<'a> {
    sessions: &'a SessionRegistry,
}

impl<'a> Gateway<'a> {
    pub fn new(sessions: &'a SessionRegistry) -> Self {
        Self { sessions }
    }

    /// Ask the supervisor about `op` on behalf of the calling process.
    ///
    /// On any verdict other than [`Verdict::Handled`] the command buffer
    /// holds the caller's original request. The supervisor handle is
    /// closed before this returns.
    pub fn delegate<C: ThreadContext + ?Sized>(
        &self,
        ctx: &C,
        op: WatchedOp,
        cmdbuf: &mut CommandBuffer,
    ) -> Verdict {
        let Some(supervisor) = self.sessions.lookup_first(SUPERVISOR_SERVICE) else {
            trace!("{:?}: supervisor not running", op);
            return Verdict::Unavailable;
        };

        let original = cmdbuf.snapshot::<SAVED_WORDS>();
        let request = match SupervisorRequest::encode(op, &original, ctx) {
            Ok(request) => request,
            Err(err) => {
                debug!("{:?}: not delegated ({})", op, err);
                return Verdict::Unavailable;
            }
        };

        let handle = match OwnedHandle::open(ctx, supervisor.session) {
            Ok(handle) => handle,
            Err(res) => {
                warn!("cannot open {} session: {}", SUPERVISOR_SERVICE, res);
                return Verdict::Unavailable;
            }
        };

        let pid = ctx.pid();
        request.write_to(cmdbuf, pid);
        let res = ctx.send_sync_request(handle.handle(), cmdbuf);

        if res.is_success() && cmdbuf.word(2) != 0 {
            debug!("{:?} from pid {} handled by supervisor", op, pid);
            Verdict::Handled
        } else {
            trace!("{:?} from pid {}: supervisor declined ({})", op, pid, res);
            cmdbuf.restore(&original);
            Verdict::Allow
        }
    }
}
