//! Test doubles for the kernel seams.
//!
//! - [`FakeObject`]: reference-counted object that records every acquire/release
//! - [`FakeKernel`]: handle table, scripted transport and sparse user memory
//! - [`RecordingSide`]: side features with scripted answers and call counters

use std::boxed::Box;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::vec::Vec;

use crate::cap::{AutoObject, Handle, HandleTable, ObjectKind, SessionId};
use crate::ipc::{CommandBuffer, ResultCode};
use crate::syscall::{MemoryFault, PluginState, SideFeatures, SyncTransport, ThreadContext, UserMemory};

/// Reference-counted object with acquisition bookkeeping.
pub struct FakeObject {
    kind: ObjectKind,
    refcount: AtomicUsize,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl FakeObject {
    /// A live object owned once by its handle table.
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            refcount: AtomicUsize::new(1),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    pub fn client_session(parent: SessionId) -> Self {
        Self::new(ObjectKind::ClientSession { parent })
    }

    pub fn refcount(&self) -> usize {
        self.refcount.load(Ordering::SeqCst)
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Every acquisition has been matched by exactly one release.
    pub fn is_balanced(&self) -> bool {
        self.acquired() == self.released() && self.refcount() == 1
    }
}

impl AutoObject for FakeObject {
    fn kind(&self) -> ObjectKind {
        self.kind
    }

    fn increment_ref(&self) {
        self.refcount.fetch_add(1, Ordering::SeqCst);
        self.acquired.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement_ref(&self) {
        self.refcount.fetch_sub(1, Ordering::SeqCst);
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sparse byte-addressed memory; unmapped bytes fault.
#[derive(Default)]
pub struct FakeMemory {
    bytes: RefCell<BTreeMap<u32, u8>>,
}

impl FakeMemory {
    pub fn map(&self, addr: u32, data: &[u8]) {
        let mut bytes = self.bytes.borrow_mut();
        for (i, &b) in data.iter().enumerate() {
            bytes.insert(addr + i as u32, b);
        }
    }

    /// Read back mapped bytes; unmapped ones read as zero.
    pub fn bytes(&self, addr: u32, len: usize) -> Vec<u8> {
        let bytes = self.bytes.borrow();
        (0..len as u32)
            .map(|i| bytes.get(&(addr + i)).copied().unwrap_or(0))
            .collect()
    }
}

impl UserMemory for FakeMemory {
    fn read(&self, addr: u32, out: &mut [u8]) -> Result<(), MemoryFault> {
        let bytes = self.bytes.borrow();
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = *bytes.get(&(addr + i as u32)).ok_or(MemoryFault::Unmapped)?;
        }
        Ok(())
    }

    fn write(&self, addr: u32, data: &[u8]) -> Result<(), MemoryFault> {
        let mut bytes = self.bytes.borrow_mut();
        if (0..data.len() as u32).any(|i| !bytes.contains_key(&(addr + i))) {
            return Err(MemoryFault::Unmapped);
        }
        for (i, &b) in data.iter().enumerate() {
            bytes.insert(addr + i as u32, b);
        }
        Ok(())
    }
}

/// Where a recorded request was sent.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Target {
    /// A handle the caller already had.
    Handle(Handle),
    /// A handle the interposer opened to this session.
    Session(SessionId),
}

/// One request seen by the fake transport, as it was on entry.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub target: Target,
    pub request: CommandBuffer,
}

type Responder<'a> = Box<dyn FnMut(&mut CommandBuffer, &FakeMemory) -> ResultCode + 'a>;

/// A single-thread kernel for one calling process.
pub struct FakeKernel<'a> {
    pid: u32,
    objects: RefCell<Vec<(Handle, &'a dyn AutoObject)>>,
    next_handle: Cell<u32>,
    opened: RefCell<Vec<(Handle, SessionId)>>,
    opened_total: Cell<usize>,
    open_failure: Cell<Option<ResultCode>>,
    handle_responders: RefCell<Vec<(Handle, Responder<'a>)>>,
    session_responders: RefCell<Vec<(SessionId, Responder<'a>)>>,
    calls: RefCell<Vec<RecordedCall>>,
    memory: FakeMemory,
}

impl<'a> FakeKernel<'a> {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            objects: RefCell::new(Vec::new()),
            next_handle: Cell::new(0x100),
            opened: RefCell::new(Vec::new()),
            opened_total: Cell::new(0),
            open_failure: Cell::new(None),
            handle_responders: RefCell::new(Vec::new()),
            session_responders: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            memory: FakeMemory::default(),
        }
    }

    fn allocate_handle(&self) -> Handle {
        let raw = self.next_handle.get();
        self.next_handle.set(raw + 1);
        Handle::from_raw(raw)
    }

    /// Put an object in the handle table.
    pub fn insert(&self, object: &'a dyn AutoObject) -> Handle {
        let handle = self.allocate_handle();
        self.objects.borrow_mut().push((handle, object));
        handle
    }

    /// Script the reply for requests on a caller handle.
    pub fn on_handle<F>(&self, handle: Handle, responder: F)
    where
        F: FnMut(&mut CommandBuffer, &FakeMemory) -> ResultCode + 'a,
    {
        self.handle_responders.borrow_mut().push((handle, Box::new(responder)));
    }

    /// Script the reply for requests on handles opened to a session.
    pub fn on_session<F>(&self, session: SessionId, responder: F)
    where
        F: FnMut(&mut CommandBuffer, &FakeMemory) -> ResultCode + 'a,
    {
        self.session_responders.borrow_mut().push((session, Box::new(responder)));
    }

    /// Make every `open_session` fail with `res`.
    pub fn fail_open(&self, res: ResultCode) {
        self.open_failure.set(Some(res));
    }

    pub fn map(&self, addr: u32, data: &[u8]) {
        self.memory.map(addr, data);
    }

    pub fn memory(&self) -> &FakeMemory {
        &self.memory
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    /// Handles opened by the interposer and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.opened.borrow().len()
    }

    pub fn opened_total(&self) -> usize {
        self.opened_total.get()
    }
}

impl HandleTable for FakeKernel<'_> {
    fn lookup_object(&self, handle: Handle) -> Option<&dyn AutoObject> {
        let object = self
            .objects
            .borrow()
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|&(_, object)| object)?;
        object.increment_ref();
        Some(object)
    }

    fn open_session(&self, session: SessionId) -> Result<Handle, ResultCode> {
        if let Some(res) = self.open_failure.get() {
            return Err(res);
        }
        let handle = self.allocate_handle();
        self.opened.borrow_mut().push((handle, session));
        self.opened_total.set(self.opened_total.get() + 1);
        Ok(handle)
    }

    fn close_handle(&self, handle: Handle) {
        let mut opened = self.opened.borrow_mut();
        let index = opened.iter().position(|(h, _)| *h == handle);
        assert!(index.is_some(), "closing unknown handle {:?}", handle);
        if let Some(index) = index {
            opened.remove(index);
        }
    }
}

impl SyncTransport for FakeKernel<'_> {
    fn send_sync_request(&self, handle: Handle, cmdbuf: &mut CommandBuffer) -> ResultCode {
        let session = self
            .opened
            .borrow()
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|&(_, session)| session);
        let target = session.map_or(Target::Handle(handle), Target::Session);
        self.calls.borrow_mut().push(RecordedCall {
            target,
            request: cmdbuf.clone(),
        });

        match target {
            Target::Handle(handle) => {
                let mut responders = self.handle_responders.borrow_mut();
                match responders.iter_mut().find(|(h, _)| *h == handle) {
                    Some((_, respond)) => respond(cmdbuf, &self.memory),
                    None => ResultCode::SUCCESS,
                }
            }
            Target::Session(session) => {
                let mut responders = self.session_responders.borrow_mut();
                match responders.iter_mut().find(|(s, _)| *s == session) {
                    Some((_, respond)) => respond(cmdbuf, &self.memory),
                    None => ResultCode::SUCCESS,
                }
            }
        }
    }
}

impl UserMemory for FakeKernel<'_> {
    fn read(&self, addr: u32, out: &mut [u8]) -> Result<(), MemoryFault> {
        self.memory.read(addr, out)
    }

    fn write(&self, addr: u32, data: &[u8]) -> Result<(), MemoryFault> {
        self.memory.write(addr, data)
    }
}

impl ThreadContext for FakeKernel<'_> {
    fn pid(&self) -> u32 {
        self.pid
    }
}

/// Side features with scripted answers.
#[derive(Default)]
pub struct RecordingSide {
    pub language_answer: Cell<Option<ResultCode>>,
    pub consume_throws: Cell<bool>,
    pub state: Cell<PluginState>,
    pub language_calls: Cell<usize>,
    pub throw_calls: Cell<usize>,
    pub home_events: Cell<usize>,
    pub wakes: Cell<usize>,
}

impl SideFeatures for RecordingSide {
    fn emulate_language(&self, cmdbuf: &mut CommandBuffer) -> Option<ResultCode> {
        self.language_calls.set(self.language_calls.get() + 1);
        let res = self.language_answer.get()?;
        cmdbuf.set_header(cmdbuf.header().result_only_reply());
        cmdbuf.set_word(1, res.raw() as u32);
        Some(res)
    }

    fn intercept_throw(&self, _cmdbuf: &mut CommandBuffer) -> bool {
        self.throw_calls.set(self.throw_calls.get() + 1);
        self.consume_throws.get()
    }

    fn plugin_state(&self) -> PluginState {
        self.state.get()
    }

    fn signal_home_event(&self) {
        self.home_events.set(self.home_events.get() + 1);
    }

    fn wake_app_thread(&self) {
        self.wakes.set(self.wakes.get() + 1);
    }
}
