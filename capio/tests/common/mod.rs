//! Shared fixtures for the end-to-end tests: an in-memory directory-tree
//! transport, a pipe pair that signals readiness through mock kernel
//! events, and stub transports for startup-table decoding.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::string::String;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::vec::Vec;

use ringbuf::{
    traits::{Consumer as _, Observer as _, Producer as _, Split as _},
    HeapCons, HeapProd, HeapRb,
};

use capio::dir::encode_dirent;
use capio::io::{ReadDirCmd, SetAttr};
use capio::transports::TransportFactory;
use capio::{Io, IoRef, IoState, Mode, NodeAttr, OFlags, Transport, Whence};
use capio::events::Events;
use capio::io::AttrFlags;
use capio_kernel::mock::MockKernel;
use capio_kernel::{Handle, Kernel, Signals, Status};

// ---------------------------------------------------------------------------
// In-memory directory tree

pub struct FileNode {
    data: Mutex<Vec<u8>>,
    mtime: AtomicU64,
    closes: AtomicUsize,
}

impl FileNode {
    fn new() -> Arc<Self> {
        Arc::new(FileNode {
            data: Mutex::new(Vec::new()),
            mtime: AtomicU64::new(0),
            closes: AtomicUsize::new(0),
        })
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn mtime(&self) -> u64 {
        self.mtime.load(Ordering::SeqCst)
    }
}

pub struct DirNode {
    parent: Weak<DirNode>,
    entries: Mutex<BTreeMap<String, Node>>,
}

#[derive(Clone)]
enum Node {
    Dir(Arc<DirNode>),
    File(Arc<FileNode>),
}

fn walk(start: Arc<DirNode>, comps: &[&str]) -> Result<Arc<DirNode>, Status> {
    let mut dir = start;
    for comp in comps {
        dir = match *comp {
            "" | "." => dir,
            ".." => dir.parent.upgrade().unwrap_or(dir),
            name => match dir.entries.lock().unwrap().get(name) {
                Some(Node::Dir(d)) => d.clone(),
                Some(Node::File(_)) => return Err(Status::NotDir),
                None => return Err(Status::NotFound),
            },
        };
    }
    Ok(dir)
}

fn resolve_parent(start: &Arc<DirNode>, path: &str) -> Result<(Arc<DirNode>, String), Status> {
    let comps: Vec<&str> = path
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();
    let Some((leaf, dirs)) = comps.split_last() else {
        return Err(Status::InvalidArgs);
    };
    if *leaf == ".." {
        return Err(Status::InvalidArgs);
    }
    let dir = walk(start.clone(), dirs)?;
    Ok((dir, (*leaf).to_string()))
}

/// A shared in-memory tree; hand out its root as a directory transport.
#[derive(Clone)]
pub struct MemFs {
    root: Arc<DirNode>,
}

impl MemFs {
    pub fn new() -> Self {
        MemFs {
            root: Arc::new_cyclic(|weak| DirNode {
                parent: weak.clone(),
                entries: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    pub fn root_transport(&self) -> IoRef {
        Io::new(DirTransport::new(self.root.clone()))
    }

    /// The file node behind `path`, for asserting on close counts and
    /// timestamps from outside the descriptor layer.
    pub fn file_node(&self, path: &str) -> Option<Arc<FileNode>> {
        let (dir, leaf) = resolve_parent(&self.root, path).ok()?;
        let result = match dir.entries.lock().unwrap().get(&leaf) {
            Some(Node::File(f)) => Some(f.clone()),
            _ => None,
        };
        result
    }
}

pub struct DirTransport {
    node: Arc<DirNode>,
    cursor: Mutex<usize>,
}

impl DirTransport {
    pub fn new(node: Arc<DirNode>) -> Self {
        DirTransport {
            node,
            cursor: Mutex::new(0),
        }
    }
}

impl Transport for DirTransport {
    fn open(&self, path: &str, flags: OFlags, mode: Mode) -> Result<IoRef, Status> {
        let comps: Vec<&str> = path.split('/').collect();
        let (dirs, last) = comps.split_at(comps.len() - 1);
        let last = last[0];
        let dir = walk(self.node.clone(), dirs)?;

        match last {
            "" | "." | ".." => {
                let target = walk(dir, &[last])?;
                Ok(Io::new(DirTransport::new(target)))
            }
            name => {
                let mut entries = dir.entries.lock().unwrap();
                match entries.get(name) {
                    Some(Node::Dir(d)) => {
                        if flags.contains(OFlags::CREAT) && flags.contains(OFlags::EXCL) {
                            return Err(Status::AlreadyExists);
                        }
                        Ok(Io::new(DirTransport::new(d.clone())))
                    }
                    Some(Node::File(f)) => {
                        if flags.contains(OFlags::CREAT) && flags.contains(OFlags::EXCL) {
                            return Err(Status::AlreadyExists);
                        }
                        if flags.contains(OFlags::DIRECTORY) {
                            return Err(Status::NotDir);
                        }
                        if flags.contains(OFlags::TRUNC) {
                            f.data.lock().unwrap().clear();
                        }
                        Ok(Io::new(FileTransport::new(f.clone())))
                    }
                    None => {
                        if !flags.contains(OFlags::CREAT) {
                            return Err(Status::NotFound);
                        }
                        if mode.contains(Mode::DIR) {
                            let parent = Arc::downgrade(&dir);
                            let new = Arc::new(DirNode {
                                parent,
                                entries: Mutex::new(BTreeMap::new()),
                            });
                            entries.insert(name.to_string(), Node::Dir(new.clone()));
                            Ok(Io::new(DirTransport::new(new)))
                        } else {
                            let file = FileNode::new();
                            entries.insert(name.to_string(), Node::File(file.clone()));
                            Ok(Io::new(FileTransport::new(file)))
                        }
                    }
                }
            }
        }
    }

    fn stat(&self) -> Result<NodeAttr, Status> {
        Ok(NodeAttr {
            mode: Mode::DIR.bits() | 0o755,
            nlink: 1,
            ..NodeAttr::default()
        })
    }

    fn readdir(&self, cmd: ReadDirCmd, buf: &mut [u8]) -> Result<usize, Status> {
        let mut cursor = self.cursor.lock().unwrap();
        if matches!(cmd, ReadDirCmd::Reset) {
            *cursor = 0;
        }
        let entries = self.node.entries.lock().unwrap();
        let mut written = 0;
        for (i, (name, node)) in entries.iter().enumerate() {
            if i < *cursor {
                continue;
            }
            let entry_type = match node {
                Node::Dir(_) => 4,
                Node::File(_) => 8,
            };
            match encode_dirent(&mut buf[written..], entry_type, name) {
                Some(n) => {
                    written += n;
                    *cursor = i + 1;
                }
                None => break,
            }
        }
        Ok(written)
    }

    fn unlink(&self, name: &str) -> Result<(), Status> {
        let mut entries = self.node.entries.lock().unwrap();
        entries.remove(name).map(|_| ()).ok_or(Status::NotFound)
    }

    fn rename(&self, old: &str, new: &str) -> Result<(), Status> {
        let (old_dir, old_leaf) = resolve_parent(&self.node, old)?;
        let (new_dir, new_leaf) = resolve_parent(&self.node, new)?;
        let node = old_dir
            .entries
            .lock()
            .unwrap()
            .remove(&old_leaf)
            .ok_or(Status::NotFound)?;
        new_dir.entries.lock().unwrap().insert(new_leaf, node);
        Ok(())
    }

    fn link(&self, old: &str, new: &str) -> Result<(), Status> {
        let (old_dir, old_leaf) = resolve_parent(&self.node, old)?;
        let node = old_dir
            .entries
            .lock()
            .unwrap()
            .get(&old_leaf)
            .cloned()
            .ok_or(Status::NotFound)?;
        if matches!(node, Node::Dir(_)) {
            return Err(Status::NotSupported);
        }
        let (new_dir, new_leaf) = resolve_parent(&self.node, new)?;
        let mut entries = new_dir.entries.lock().unwrap();
        if entries.contains_key(&new_leaf) {
            return Err(Status::AlreadyExists);
        }
        entries.insert(new_leaf, node);
        Ok(())
    }
}

pub struct FileTransport {
    file: Arc<FileNode>,
    pos: Mutex<usize>,
}

impl FileTransport {
    fn new(file: Arc<FileNode>) -> Self {
        FileTransport {
            file,
            pos: Mutex::new(0),
        }
    }
}

impl Transport for FileTransport {
    fn read(&self, buf: &mut [u8]) -> Result<usize, Status> {
        let data = self.file.data.lock().unwrap();
        let mut pos = self.pos.lock().unwrap();
        let n = buf.len().min(data.len().saturating_sub(*pos));
        buf[..n].copy_from_slice(&data[*pos..*pos + n]);
        *pos += n;
        Ok(n)
    }

    fn write(&self, buf: &[u8]) -> Result<usize, Status> {
        let mut data = self.file.data.lock().unwrap();
        let mut pos = self.pos.lock().unwrap();
        if *pos > data.len() {
            data.resize(*pos, 0);
        }
        let end = *pos + buf.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[*pos..end].copy_from_slice(buf);
        *pos = end;
        Ok(buf.len())
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, Status> {
        let data = self.file.data.lock().unwrap();
        let offset = offset as usize;
        let n = buf.len().min(data.len().saturating_sub(offset));
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        Ok(n)
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize, Status> {
        let mut data = self.file.data.lock().unwrap();
        let end = offset as usize + buf.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[offset as usize..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn seek(&self, offset: i64, whence: Whence) -> Result<u64, Status> {
        let data_len = self.file.data.lock().unwrap().len() as i64;
        let mut pos = self.pos.lock().unwrap();
        let base = match whence {
            Whence::Set => 0,
            Whence::Current => *pos as i64,
            Whence::End => data_len,
        };
        let new = base + offset;
        if new < 0 {
            return Err(Status::OutOfRange);
        }
        *pos = new as usize;
        Ok(new as u64)
    }

    fn stat(&self) -> Result<NodeAttr, Status> {
        Ok(NodeAttr {
            mode: 0o644,
            size: self.file.data.lock().unwrap().len() as u64,
            nlink: 1,
            modify_time: self.file.mtime(),
            ..NodeAttr::default()
        })
    }

    fn setattr(&self, attr: &SetAttr) -> Result<(), Status> {
        if attr.valid.contains(AttrFlags::MTIME) {
            self.file.mtime.store(attr.modify_time, Ordering::SeqCst);
        }
        Ok(())
    }

    fn truncate(&self, len: u64) -> Result<(), Status> {
        self.file.data.lock().unwrap().resize(len as usize, 0);
        Ok(())
    }

    fn sync(&self) -> Result<(), Status> {
        Ok(())
    }

    fn close(&self) -> Result<(), Status> {
        self.file.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pipes over mock kernel events

const PIPE_CAPACITY: usize = 4096;

/// Observation side-channel for a [`mem_pipe`] pair.
pub struct PipeProbe {
    pub read_wait_begins: Arc<AtomicUsize>,
    pub read_wait_ends: Arc<AtomicUsize>,
}

pub struct PipeReadEnd {
    kernel: &'static MockKernel,
    cons: Mutex<HeapCons<u8>>,
    event: Handle,
    peer_event: Handle,
    closed: Arc<AtomicBool>,
    peer_closed: Arc<AtomicBool>,
    wait_begins: Arc<AtomicUsize>,
    wait_ends: Arc<AtomicUsize>,
}

impl Transport for PipeReadEnd {
    fn read(&self, buf: &mut [u8]) -> Result<usize, Status> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut cons = self.cons.lock().unwrap();
        let n = cons.pop_slice(buf);
        if n == 0 {
            if self.peer_closed.load(Ordering::Acquire) {
                // Re-read so nothing sent between the pop and the flag
                // check is lost.
                return Ok(cons.pop_slice(buf));
            }
            return Err(Status::ShouldWait);
        }
        if cons.is_empty() {
            self.kernel
                .signal(self.event, Signals::READABLE, Signals::empty());
        }
        self.kernel
            .signal(self.peer_event, Signals::empty(), Signals::WRITABLE);
        Ok(n)
    }

    fn close(&self) -> Result<(), Status> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.kernel
            .signal(self.peer_event, Signals::empty(), Signals::PEER_CLOSED);
        self.kernel.handle_close(self.event)
    }

    fn wait_begin(&self, events: Events) -> Option<(Handle, Signals)> {
        self.wait_begins.fetch_add(1, Ordering::SeqCst);
        let mut signals = Signals::PEER_CLOSED;
        if events.contains(Events::IN) {
            signals |= Signals::READABLE;
        }
        Some((self.event, signals))
    }

    fn wait_end(&self, pending: Signals) -> Events {
        self.wait_ends.fetch_add(1, Ordering::SeqCst);
        let mut events = Events::empty();
        if pending.contains(Signals::READABLE) {
            events |= Events::IN;
        }
        if pending.contains(Signals::PEER_CLOSED) {
            events |= Events::HUP;
        }
        events
    }
}

pub struct PipeWriteEnd {
    kernel: &'static MockKernel,
    prod: Mutex<HeapProd<u8>>,
    event: Handle,
    peer_event: Handle,
    closed: Arc<AtomicBool>,
    peer_closed: Arc<AtomicBool>,
}

impl Transport for PipeWriteEnd {
    fn write(&self, buf: &[u8]) -> Result<usize, Status> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.closed.load(Ordering::Acquire) || self.peer_closed.load(Ordering::Acquire) {
            return Err(Status::RemoteClosed);
        }
        let mut prod = self.prod.lock().unwrap();
        let n = prod.push_slice(buf);
        if n == 0 {
            return Err(Status::ShouldWait);
        }
        self.kernel
            .signal(self.peer_event, Signals::empty(), Signals::READABLE);
        if prod.vacant_len() == 0 {
            self.kernel
                .signal(self.event, Signals::WRITABLE, Signals::empty());
        }
        Ok(n)
    }

    fn close(&self) -> Result<(), Status> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.kernel
            .signal(self.peer_event, Signals::empty(), Signals::PEER_CLOSED);
        self.kernel.handle_close(self.event)
    }

    fn wait_begin(&self, events: Events) -> Option<(Handle, Signals)> {
        let mut signals = Signals::PEER_CLOSED;
        if events.contains(Events::OUT) {
            signals |= Signals::WRITABLE;
        }
        Some((self.event, signals))
    }

    fn wait_end(&self, pending: Signals) -> Events {
        let mut events = Events::empty();
        if pending.contains(Signals::WRITABLE) {
            events |= Events::OUT;
        }
        if pending.contains(Signals::PEER_CLOSED) {
            events |= Events::ERR;
        }
        events
    }
}

/// A connected in-memory pipe whose readiness flows through mock kernel
/// event objects, so waits traverse `object_wait_one`/`object_wait_many`
/// for real.
pub fn mem_pipe(kernel: &'static MockKernel) -> (IoRef, IoRef, PipeProbe) {
    let rb = HeapRb::<u8>::new(PIPE_CAPACITY);
    let (prod, cons) = rb.split();
    let read_event = kernel.new_event(Signals::empty());
    let write_event = kernel.new_event(Signals::WRITABLE);
    let read_closed = Arc::new(AtomicBool::new(false));
    let write_closed = Arc::new(AtomicBool::new(false));
    let begins = Arc::new(AtomicUsize::new(0));
    let ends = Arc::new(AtomicUsize::new(0));

    let read = Io::new(PipeReadEnd {
        kernel,
        cons: Mutex::new(cons),
        event: read_event,
        peer_event: write_event,
        closed: read_closed.clone(),
        peer_closed: write_closed.clone(),
        wait_begins: begins.clone(),
        wait_ends: ends.clone(),
    });
    let write = Io::new(PipeWriteEnd {
        kernel,
        prod: Mutex::new(prod),
        event: write_event,
        peer_event: read_event,
        closed: write_closed,
        peer_closed: read_closed,
    });
    (
        read,
        write,
        PipeProbe {
            read_wait_begins: begins,
            read_wait_ends: ends,
        },
    )
}

// ---------------------------------------------------------------------------
// Startup stubs and factory

/// A transport that only remembers which handles it was built from and
/// counts closes; enough to observe startup-table decoding.
pub struct StubTransport {
    kernel: &'static MockKernel,
    pub handles: Vec<Handle>,
    closes: Arc<AtomicUsize>,
}

impl Transport for StubTransport {
    fn close(&self) -> Result<(), Status> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        for &handle in &self.handles {
            if handle.is_valid() {
                let _ = self.kernel.handle_close(handle);
            }
        }
        Ok(())
    }
}

pub struct TestFactory {
    pub kernel: &'static MockKernel,
    /// Closes observed across every stub this factory built.
    pub stub_closes: Arc<AtomicUsize>,
}

impl TestFactory {
    pub fn new(kernel: &'static MockKernel) -> Self {
        TestFactory {
            kernel,
            stub_closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn stub(&self, handles: Vec<Handle>) -> IoRef {
        Io::new(StubTransport {
            kernel: self.kernel,
            handles,
            closes: self.stub_closes.clone(),
        })
    }
}

impl TransportFactory for TestFactory {
    fn remote(&self, object: Handle, event: Handle) -> Result<IoRef, Status> {
        Ok(self.stub(vec![object, event]))
    }

    fn pipe(&self, handle: Handle) -> Result<IoRef, Status> {
        Ok(self.stub(vec![handle]))
    }

    fn logger(&self, handle: Handle) -> Result<IoRef, Status> {
        Ok(self.stub(vec![handle]))
    }

    fn pipe_pair(&self) -> Result<(IoRef, IoRef), Status> {
        let (read, write, _probe) = mem_pipe(self.kernel);
        Ok((read, write))
    }
}

// ---------------------------------------------------------------------------
// Assembled states

pub struct TestEnv {
    pub state: &'static IoState,
    pub kernel: &'static MockKernel,
    pub factory: &'static TestFactory,
    pub fs: MemFs,
}

/// A state with an in-memory tree as root and cwd `/`.
pub fn fs_env() -> TestEnv {
    let kernel = MockKernel::install();
    let factory: &'static TestFactory = Box::leak(Box::new(TestFactory::new(kernel)));
    let state: &'static IoState = Box::leak(Box::new(IoState::new(kernel, factory)));
    let fs = MemFs::new();
    state.install_root(fs.root_transport());
    state.chdir("/").expect("chdir to fresh root");
    TestEnv {
        state,
        kernel,
        factory,
        fs,
    }
}
