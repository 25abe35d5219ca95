use serde_json::Value;
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use crate::backend::{pending, Backend, BackendEvent, EventBus, EventKind, Pending, Subscription};
use crate::error::{Result, ViewError};
use crate::protocol::{self, Call, Incoming};
use crate::treemap::{BreadcrumbItem, NodeId};

/// Called from the reader thread after each inbound message, e.g. to request a repaint.
pub type Waker = Arc<dyn Fn() + Send + Sync>;

type Completion = Box<dyn FnOnce(Result<Value>) + Send>;

#[derive(Default)]
struct Inflight {
    closed: bool,
    calls: HashMap<u64, Completion>,
}

/// Backend living in a child process, spoken to over stdio.
///
/// Requests are queued to a writer thread and a reader thread decodes replies
/// and events, so no call ever blocks the UI thread on the backend's pipes.
pub struct ProcessBackend {
    outbox: Sender<(u64, String)>,
    next_id: AtomicU64,
    inflight: Arc<Mutex<Inflight>>,
    bus: EventBus,
    child: Option<Child>,
}

impl ProcessBackend {
    /// Launch `argv[0]` with the remaining arguments.
    pub fn spawn(argv: &[String], waker: Option<Waker>) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| ViewError::Config("backend command must not be empty".into()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ViewError::Backend("backend stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ViewError::Backend("backend stdout unavailable".into()))?;

        log::info!("Started backend {} (pid {})", program, child.id());

        let mut backend = Self::connect(BufReader::new(stdout), stdin, waker);
        backend.child = Some(child);
        Ok(backend)
    }

    /// Speak the protocol over an arbitrary stream pair.
    pub fn connect<R, W>(reader: R, writer: W, waker: Option<Waker>) -> Self
    where
        R: BufRead + Send + 'static,
        W: Write + Send + 'static,
    {
        let inflight = Arc::new(Mutex::new(Inflight::default()));
        let bus = EventBus::new();
        let (outbox, queued) = mpsc::channel();

        let writer_inflight = inflight.clone();
        thread::spawn(move || write_loop(writer, queued, &writer_inflight));

        let reader_inflight = inflight.clone();
        let reader_bus = bus.clone();
        thread::spawn(move || read_loop(reader, &reader_inflight, &reader_bus, waker.as_ref()));

        Self {
            outbox,
            next_id: AtomicU64::new(1),
            inflight,
            bus,
            child: None,
        }
    }

    fn call<T: Send + 'static>(&self, call: Call, decode: fn(Value) -> Result<T>) -> Pending<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (resolver, pending) = pending();

        {
            let mut inflight = lock(&self.inflight);
            if inflight.closed {
                drop(inflight);
                resolver.resolve(Err(ViewError::Disconnected));
                return pending;
            }
            inflight.calls.insert(
                id,
                Box::new(move |outcome: Result<Value>| resolver.resolve(outcome.and_then(decode))),
            );
        }

        log::debug!("-> {} (#{})", call.name(), id);
        let queued = protocol::encode_request(id, &call).and_then(|line| {
            self.outbox
                .send((id, line))
                .map_err(|_| ViewError::Disconnected)
        });
        if let Err(err) = queued {
            log::error!("Failed to send {} to backend: {}", call.name(), err);
            fail(&self.inflight, id, err);
        }

        pending
    }
}

impl Drop for ProcessBackend {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Backend for ProcessBackend {
    fn subscribe(&self, kind: EventKind, tx: Sender<BackendEvent>) -> Subscription {
        self.bus.subscribe(kind, tx)
    }

    fn start_scan(&self, root: &str, min_size_kb: u64) -> Pending<()> {
        self.call(
            Call::StartScan {
                root: root.to_string(),
                min_size_kb,
            },
            |_| Ok(()),
        )
    }

    fn set_zoom(&self, node: NodeId) -> Pending<()> {
        self.call(Call::SetZoom { node_id: node }, |_| Ok(()))
    }

    fn get_parent_node(&self) -> Pending<Option<NodeId>> {
        self.call(Call::GetParentNode, protocol::decode_result::<Option<NodeId>>)
    }

    fn get_home_dir(&self) -> Pending<String> {
        self.call(Call::GetHomeDir, protocol::decode_result::<String>)
    }

    fn get_breadcrumbs(&self) -> Pending<Vec<BreadcrumbItem>> {
        self.call(Call::GetBreadcrumbs, protocol::decode_breadcrumbs)
    }
}

fn write_loop<W: Write>(mut writer: W, queued: Receiver<(u64, String)>, inflight: &Mutex<Inflight>) {
    for (id, line) in queued {
        if let Err(err) = write_line(&mut writer, &line) {
            log::error!("Failed to write request #{} to backend: {}", id, err);
            fail(inflight, id, err.into());
        }
    }
}

fn write_line<W: Write>(writer: &mut W, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Complete request `id` with `err`, if it is still outstanding.
fn fail(inflight: &Mutex<Inflight>, id: u64, err: ViewError) {
    let completion = lock(inflight).calls.remove(&id);
    if let Some(complete) = completion {
        complete(Err(err));
    }
}

fn read_loop<R: BufRead>(reader: R, inflight: &Mutex<Inflight>, bus: &EventBus, waker: Option<&Waker>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                log::error!("Backend stream error: {}", err);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match protocol::decode_line(line) {
            Ok(Incoming::Reply(reply)) => {
                let id = reply.id;
                let completion = lock(inflight).calls.remove(&id);
                match completion {
                    Some(complete) => complete(reply.into_result()),
                    None => log::warn!("Reply for unknown request #{}", id),
                }
            }
            Ok(Incoming::Event(event)) => {
                log::trace!("<- {:?} event", event.kind());
                bus.emit(event);
            }
            Err(err) => log::warn!("Skipping malformed backend message: {}", err),
        }

        if let Some(wake) = waker {
            wake();
        }
    }

    log::info!("Backend stream closed");
    let orphaned: Vec<Completion> = {
        let mut inflight = lock(inflight);
        inflight.closed = true;
        inflight.calls.drain().map(|(_, complete)| complete).collect()
    };
    for complete in orphaned {
        complete(Err(ViewError::Disconnected));
    }
    if let Some(wake) = waker {
        wake();
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::treemap::ScanProgress;
    use std::io::{self, Read};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc::{self, Receiver};
    use std::time::{Duration, Instant};

    /// Blocking reader fed line by line from the test.
    struct ScriptedReader {
        rx: Receiver<String>,
        buf: Vec<u8>,
        pos: usize,
    }

    impl Read for ScriptedReader {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            if self.pos >= self.buf.len() {
                match self.rx.recv() {
                    Ok(chunk) => {
                        self.buf = chunk.into_bytes();
                        self.pos = 0;
                    }
                    Err(_) => return Ok(0),
                }
            }
            let n = out.len().min(self.buf.len() - self.pos);
            out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    fn harness(waker: Option<Waker>) -> (ProcessBackend, mpsc::Sender<String>, SharedBuf) {
        let (tx, rx) = mpsc::channel();
        let reader = BufReader::new(ScriptedReader {
            rx,
            buf: Vec::new(),
            pos: 0,
        });
        let out = SharedBuf::default();
        (ProcessBackend::connect(reader, out.clone(), waker), tx, out)
    }

    fn wait_for<T>(pending: &mut Pending<T>) -> Result<T> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(outcome) = pending.poll() {
                return outcome;
            }
            assert!(Instant::now() < deadline, "backend call never completed");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn wait_for_lines(out: &SharedBuf, count: usize) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let lines = out.lines();
            if lines.len() >= count {
                return lines;
            }
            assert!(Instant::now() < deadline, "request never written");
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Writer whose every write blocks until the test lets it through.
    struct StalledWriter(Receiver<()>);

    impl Write for StalledWriter {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0
                .recv()
                .map(|_| data.len())
                .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _data: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn idle_reader() -> (mpsc::Sender<String>, BufReader<ScriptedReader>) {
        let (tx, rx) = mpsc::channel();
        let reader = BufReader::new(ScriptedReader {
            rx,
            buf: Vec::new(),
            pos: 0,
        });
        (tx, reader)
    }

    #[test]
    fn test_query_roundtrip() {
        let (backend, feed, out) = harness(None);
        let mut parent = backend.get_parent_node();
        assert!(parent.poll().is_none(), "must not complete before the reply");

        assert_eq!(wait_for_lines(&out, 1), vec![r#"{"id":1,"call":{"command":"get_parent_node"}}"#]);

        feed.send("{\"id\":1,\"result\":5}\n".into()).unwrap();
        assert_eq!(wait_for(&mut parent).unwrap(), Some(NodeId(5)));
    }

    #[test]
    fn test_replies_matched_by_id() {
        let (backend, feed, _out) = harness(None);
        let mut home = backend.get_home_dir();
        let mut zoom = backend.set_zoom(NodeId(3));

        feed.send("{\"id\":2,\"error\":\"Invalid node ID\"}\n".into()).unwrap();
        feed.send("{\"id\":1,\"result\":\"/home/user\"}\n".into()).unwrap();

        assert!(matches!(wait_for(&mut zoom), Err(ViewError::Backend(m)) if m == "Invalid node ID"));
        assert_eq!(wait_for(&mut home).unwrap(), "/home/user");
    }

    #[test]
    fn test_events_reach_subscriber_and_wake() {
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = wakes.clone();
        let waker: Waker = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let (backend, feed, _out) = harness(Some(waker));

        let (tx, rx) = mpsc::channel();
        let _sub = backend.subscribe(EventKind::ScanProgress, tx);

        feed.send("garbage line\n".into()).unwrap();
        feed.send("{\"event\":\"scan_progress\",\"payload\":{\"files\":10,\"dirs\":2,\"errors\":0}}\n".into())
            .unwrap();

        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(
            event,
            BackendEvent::ScanProgress(ScanProgress {
                files: 10,
                dirs: 2,
                errors: 0
            })
        );
        let deadline = Instant::now() + Duration::from_secs(5);
        while wakes.load(Ordering::SeqCst) < 2 {
            assert!(Instant::now() < deadline, "waker not called for every line");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_disconnect_fails_outstanding_and_later_calls() {
        let (backend, feed, _out) = harness(None);
        let mut outstanding = backend.start_scan("/data", 0);
        drop(feed);

        assert!(matches!(wait_for(&mut outstanding), Err(ViewError::Disconnected)));
        let mut late = backend.get_home_dir();
        assert!(matches!(wait_for(&mut late), Err(ViewError::Disconnected)));
    }

    #[test]
    fn test_calls_return_while_backend_stops_reading() {
        let (_feed, reader) = idle_reader();
        let (release, stalled) = mpsc::channel();
        let backend = ProcessBackend::connect(reader, StalledWriter(stalled), None);

        let started = Instant::now();
        let mut scan = backend.start_scan("/data", 0);
        let mut zoom = backend.set_zoom(NodeId(2));
        let mut home = backend.get_home_dir();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(scan.poll().is_none());
        assert!(zoom.poll().is_none());
        assert!(home.poll().is_none());
        drop(release);
    }

    #[test]
    fn test_write_failure_fails_the_call() {
        let (_feed, reader) = idle_reader();
        let backend = ProcessBackend::connect(reader, BrokenWriter, None);

        let mut zoom = backend.set_zoom(NodeId(4));
        assert!(matches!(wait_for(&mut zoom), Err(ViewError::Io(_))));
    }

    #[test]
    fn test_spawn_rejects_empty_command() {
        assert!(matches!(ProcessBackend::spawn(&[], None), Err(ViewError::Config(_))));
    }

    #[test]
    fn test_spawn_missing_program_is_io_error() {
        let argv = vec!["spacescout-definitely-not-installed".to_string()];
        assert!(matches!(ProcessBackend::spawn(&argv, None), Err(ViewError::Io(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_spawned_child_answers() {
        let argv: Vec<String> = [
            "sh",
            "-c",
            r#"read line; echo '{"id":1,"result":"/home/tester"}'; read line"#,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let backend = ProcessBackend::spawn(&argv, None).unwrap();
        let mut home = backend.get_home_dir();
        assert_eq!(wait_for(&mut home).unwrap(), "/home/tester");
    }
}
