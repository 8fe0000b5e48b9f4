//! The `execve` interception pipeline.
//!
//! [`handle_execve`] runs once per syscall entry. It only touches the caller's
//! memory and the event channel through the two traits below, which the eBPF
//! program implements over the tracepoint context and the `EVENTS` ring buffer.

use crate::{Credentials, HijackEvent, ProgramName, TARGET};

/// The current syscall and the process issuing it.
pub trait ExecveContext {
    fn pid_tgid(&self) -> u64;

    fn uid_gid(&self) -> u64;

    /// Best-effort copy of the path at argument 0 into `dst`. On failure `dst`
    /// keeps whatever was copied, possibly nothing.
    fn read_filename(&self, dst: &mut ProgramName);

    /// Writes all of `src` over the path at argument 0.
    fn write_filename(&self, src: &ProgramName) -> bool;
}

/// Reserve/submit side of a bounded, non-blocking channel.
pub trait EventChannel {
    type Slot: EventSlot;

    /// `None` when the channel cannot take another record right now.
    fn reserve(&self) -> Option<Self::Slot>;
}

/// A reserved record. Must be submitted exactly once.
pub trait EventSlot {
    fn write(&mut self, event: HijackEvent);

    fn submit(self);
}

/// What the handler did for one invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    RootCaller,
    NameTooShort,
    NoMatch,
    Hijacked {
        pid: u32,
        /// Rewritten path as committed (or attempted).
        rewritten: ProgramName,
        written: bool,
        reported: bool,
    },
}

pub fn handle_execve<C, E>(ctx: &C, events: &E) -> Outcome
where
    C: ExecveContext,
    E: EventChannel,
{
    let pid = (ctx.pid_tgid() >> 32) as u32;
    if Credentials::from_raw(ctx.uid_gid()).is_root() {
        return Outcome::RootCaller;
    }

    let mut name = ProgramName::empty();
    ctx.read_filename(&mut name);
    let requested = name;
    name.terminate();

    if name.is_degenerate() {
        return Outcome::NameTooShort;
    }
    if !name.matches(&TARGET) {
        return Outcome::NoMatch;
    }

    name.hijack();
    let written = ctx.write_filename(&name);

    // Reported only if the channel has room; the rewrite stands either way.
    let reported = match events.reserve() {
        Some(mut slot) => {
            slot.write(HijackEvent::new(written, pid, &requested));
            slot.submit();
            true
        }
        None => false,
    };

    Outcome::Hijacked {
        pid,
        rewritten: name,
        written,
        reported,
    }
}
