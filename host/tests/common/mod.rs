//! Shared test helpers for integration tests.
//!
//! Integration tests drive the host the way a compiled managed program does:
//! a fake entry function receives the `OpsTable`, allocates through its
//! callbacks, and calls hosted functions by ordinal with `#[repr(C)]`
//! argument records. `run_program` wires a Rust closure in as that entry
//! function.

#![allow(dead_code)]

use std::any::Any;
use std::cell::RefCell;
use std::ffi::c_void;
use std::io::{self, Cursor, Write};
use std::mem::MaybeUninit;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::rc::Rc;

use sigil_host::{HostIo, RunOutcome};
use sigil_hostapi::abi::{AllocRequest, DeallocRequest, Utf8Message};
use sigil_hostapi::hosted::{
    HashArgs, LineArgs, PublicKeyArgs, SignArgs, StdinLineResult, VerifyArgs,
};
use sigil_hostapi::{BufferAllocator, HostConfig, HostedFn, OpsTable, RocList, RocStr};

// ── Captured output ──

/// Writer whose contents stay readable after it is boxed into `HostIo`.
#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

// ── Allocation through the ops table ──

/// Allocates through the `alloc` / `dealloc` callbacks.
pub struct OpsAllocator<'a> {
    ops: &'a OpsTable,
}

impl BufferAllocator for OpsAllocator<'_> {
    fn allocate(&mut self, size: usize, alignment: usize) -> *mut u8 {
        let mut request = AllocRequest {
            alignment,
            length: size,
            answer: ptr::null_mut(),
        };
        unsafe { (self.ops.alloc)(&mut request, self.ops.env) };
        request.answer as *mut u8
    }

    unsafe fn deallocate(&mut self, ptr: *mut u8, alignment: usize) {
        let mut request = DeallocRequest {
            alignment,
            ptr: ptr as *mut c_void,
        };
        (self.ops.dealloc)(&mut request, self.ops.env);
    }
}

// ── Fake managed program ──

/// View of the host from inside the fake entry function.
pub struct Program<'a> {
    ops: &'a OpsTable,
    args: Option<RocList<RocStr>>,
}

impl<'a> Program<'a> {
    pub fn ops(&self) -> &'a OpsTable {
        self.ops
    }

    pub fn allocator(&self) -> OpsAllocator<'a> {
        OpsAllocator { ops: self.ops }
    }

    /// Read argv and release the argument list.
    pub fn take_args(&mut self) -> Vec<String> {
        let Some(args) = self.args.take() else {
            return Vec::new();
        };
        let mut alloc = self.allocator();
        unsafe {
            let texts = args.as_slice().iter().map(|s| s.to_string_lossy()).collect();
            for item in args.as_slice() {
                ptr::read(item).release_in(&mut alloc);
            }
            args.release_in(&mut alloc);
            texts
        }
    }

    /// Call a hosted function by ordinal.
    ///
    /// # Safety
    /// `A` and `R` must be the argument and result layouts of `function`.
    pub unsafe fn call<A, R>(&self, function: HostedFn, args: &mut A) -> R {
        let entry = self
            .ops
            .hosted_fns
            .get(function.ordinal() as u32)
            .expect("hosted function missing from table");
        let mut ret = MaybeUninit::<R>::uninit();
        entry(
            self.ops,
            ret.as_mut_ptr() as *mut c_void,
            args as *mut A as *mut c_void,
        );
        ret.assume_init()
    }

    pub fn bytes(&self, data: &[u8]) -> RocList<u8> {
        RocList::from_slice_in(&mut self.allocator(), data)
    }

    pub fn str(&self, text: &str) -> RocStr {
        RocStr::from_str_in(&mut self.allocator(), text)
    }

    /// Copy a list out and release it.
    pub fn consume_bytes(&self, list: RocList<u8>) -> Vec<u8> {
        unsafe {
            let data = list.as_slice().to_vec();
            list.release_in(&mut self.allocator());
            data
        }
    }

    pub fn consume_str(&self, text: RocStr) -> String {
        unsafe {
            let data = text.to_string_lossy();
            text.release_in(&mut self.allocator());
            data
        }
    }

    pub fn dbg(&self, text: &str) {
        let message = Utf8Message {
            bytes: text.as_ptr(),
            len: text.len(),
        };
        unsafe { (self.ops.dbg)(&message, self.ops.env) };
    }

    pub fn expect_failed(&self, text: &str) {
        let message = Utf8Message {
            bytes: text.as_ptr(),
            len: text.len(),
        };
        unsafe { (self.ops.expect_failed)(&message, self.ops.env) };
    }

    // ── Hosted function wrappers ──

    pub fn public_key(&self, secret_key: &[u8]) -> Vec<u8> {
        let mut args = PublicKeyArgs {
            secret_key: self.bytes(secret_key),
        };
        let result = unsafe { self.call(HostedFn::SchnorrPublicKey, &mut args) };
        self.consume_bytes(args.secret_key);
        self.consume_bytes(result)
    }

    pub fn sign(&self, secret_key: &[u8], digest: &[u8]) -> Vec<u8> {
        let mut args = SignArgs {
            secret_key: self.bytes(secret_key),
            digest: self.bytes(digest),
        };
        let result = unsafe { self.call(HostedFn::SchnorrSign, &mut args) };
        self.consume_bytes(args.secret_key);
        self.consume_bytes(args.digest);
        self.consume_bytes(result)
    }

    pub fn verify(&self, public_key: &[u8], digest: &[u8], signature: &[u8]) -> bool {
        let mut args = VerifyArgs {
            public_key: self.bytes(public_key),
            digest: self.bytes(digest),
            signature: self.bytes(signature),
        };
        let valid: bool = unsafe { self.call(HostedFn::SchnorrVerify, &mut args) };
        self.consume_bytes(args.public_key);
        self.consume_bytes(args.digest);
        self.consume_bytes(args.signature);
        valid
    }

    pub fn hash_binary(&self, message: &[u8]) -> Vec<u8> {
        let mut args = HashArgs {
            message: self.bytes(message),
        };
        let result = unsafe { self.call(HostedFn::Sha256HashBinary, &mut args) };
        self.consume_bytes(args.message);
        self.consume_bytes(result)
    }

    pub fn hash_hex(&self, message: &[u8]) -> String {
        let mut args = HashArgs {
            message: self.bytes(message),
        };
        let result = unsafe { self.call(HostedFn::Sha256HashHex, &mut args) };
        self.consume_bytes(args.message);
        self.consume_str(result)
    }

    pub fn stdout_line(&self, text: &str) {
        self.write_line(HostedFn::StdoutLine, self.str(text));
    }

    pub fn stderr_line(&self, text: &str) {
        self.write_line(HostedFn::StderrLine, self.str(text));
    }

    /// Pass an already built string (heap or inline) to a line writer.
    pub fn write_line(&self, function: HostedFn, line: RocStr) {
        let mut args = LineArgs { line };
        unsafe { self.call::<_, ()>(function, &mut args) };
        self.consume_str(args.line);
    }

    /// Raise `crashed`. Never returns.
    pub fn crashed(&self, text: &str) {
        let message = Utf8Message {
            bytes: text.as_ptr(),
            len: text.len(),
        };
        unsafe { (self.ops.crashed)(&message, self.ops.env) };
    }

    /// Read one line and report whether the host returned it inline.
    pub fn stdin_line_raw(&self) -> (Option<String>, bool) {
        let result: StdinLineResult = unsafe { self.call(HostedFn::StdinLine, &mut ()) };
        let inline = result.line.is_inline();
        let end_of_file = result.end_of_file;
        let line = self.consume_str(result.line);
        (if end_of_file { None } else { Some(line) }, inline)
    }

    /// `None` at end of input.
    pub fn stdin_line(&self) -> Option<String> {
        let result: StdinLineResult = unsafe { self.call(HostedFn::StdinLine, &mut ()) };
        let end_of_file = result.end_of_file;
        let line = self.consume_str(result.line);
        if end_of_file {
            assert!(line.is_empty());
            None
        } else {
            Some(line)
        }
    }

    /// Release anything the program did not consume itself.
    fn finish(&mut self) {
        self.take_args();
    }
}

// ── Running a program ──

type Body = Box<dyn FnOnce(&mut Program<'_>) -> i32>;

thread_local! {
    static BODY: RefCell<Option<Body>> = RefCell::new(None);
    static PANIC: RefCell<Option<Box<dyn Any + Send>>> = RefCell::new(None);
}

unsafe extern "C" fn fake_entry(ops: *const OpsTable, ret: *mut c_void, args: *mut c_void) {
    let body = BODY.with(|slot| slot.borrow_mut().take());
    let mut program = Program {
        ops: &*ops,
        args: Some(ptr::read(args as *const RocList<RocStr>)),
    };
    let code = match body {
        Some(body) => match panic::catch_unwind(AssertUnwindSafe(|| body(&mut program))) {
            Ok(code) => code,
            Err(payload) => {
                PANIC.with(|slot| *slot.borrow_mut() = Some(payload));
                0
            }
        },
        None => 0,
    };
    program.finish();
    (ret as *mut i32).write(code);
}

/// Result of one fake program run.
pub struct Run<T> {
    pub outcome: RunOutcome,
    pub value: T,
    pub stdout: String,
    pub stderr: String,
}

/// Run `body` as the managed program with the given argv and stdin.
///
/// The body returns the program's exit code plus any value the test wants
/// to inspect afterwards. Panics inside the body are re-raised here.
pub fn run_program<T, F>(argv: &[&str], stdin: &str, body: F) -> Run<T>
where
    T: 'static,
    F: FnOnce(&mut Program<'_>) -> (i32, T) + 'static,
{
    let stdout = SharedBuf::default();
    let stderr = SharedBuf::default();
    let io = HostIo {
        stdin: Box::new(Cursor::new(stdin.as_bytes().to_vec())),
        stdout: Box::new(stdout.clone()),
        stderr: Box::new(stderr.clone()),
    };
    let (outcome, value) = run_with_io(argv, io, body);
    Run {
        outcome,
        value,
        stdout: stdout.text(),
        stderr: stderr.text(),
    }
}

/// Like [`run_program`], but with caller-supplied streams.
pub fn run_with_io<T, F>(argv: &[&str], io: HostIo, body: F) -> (RunOutcome, T)
where
    T: 'static,
    F: FnOnce(&mut Program<'_>) -> (i32, T) + 'static,
{
    let value = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&value);
    let wrapped: Body = Box::new(move |program: &mut Program<'_>| {
        let (code, result) = body(program);
        *slot.borrow_mut() = Some(result);
        code
    });
    BODY.with(|b| *b.borrow_mut() = Some(wrapped));

    let outcome = sigil_host::run(fake_entry, argv, io, &HostConfig::default())
        .expect("host setup");

    if let Some(payload) = PANIC.with(|p| p.borrow_mut().take()) {
        panic::resume_unwind(payload);
    }
    let value = value.borrow_mut().take().expect("program body did not run");
    (outcome, value)
}

// ── Process-terminating paths ──

/// Set in the child process to the name of the test it should act out.
pub const CHILD_ENV: &str = "SIGIL_TEST_CHILD";

/// True when this process is the child spawned for `test_name`.
pub fn is_child(test_name: &str) -> bool {
    std::env::var(CHILD_ENV).map_or(false, |name| name == test_name)
}

/// Re-run this test binary filtered to `test_name`, marked as the child.
pub fn spawn_child(test_name: &str) -> std::process::Output {
    let exe = std::env::current_exe().expect("test binary path");
    std::process::Command::new(exe)
        .args([test_name, "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, test_name)
        .output()
        .expect("spawn child test process")
}

/// Hex string to bytes.
pub fn unhex(s: &str) -> Vec<u8> {
    hex::decode(s).expect("valid hex")
}
