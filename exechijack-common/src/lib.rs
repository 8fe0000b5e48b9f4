#![cfg_attr(not(any(test, feature = "user")), no_std)]

pub mod handler;
pub mod name;

pub use handler::{handle_execve, EventChannel, EventSlot, ExecveContext, Outcome};
pub use name::{ProgramName, REPLACEMENT_SUFFIX, TARGET};

/// Width of every program name buffer, matching the kernel's `TASK_COMM_LEN`.
pub const TASK_COMM_LEN: usize = 16;

/// Size in bytes of the `EVENTS` ring buffer.
pub const EVENTS_BYTE_SIZE: u32 = 256 * 1024;

/// Byte offset of `filename` (argument 0) in the `sys_enter_execve` record.
pub const FILENAME_OFFSET: usize = 16;

/// Record published for every hijack attempt.
///
/// Layout is shared verbatim with the userspace reader: `success` at offset 0
/// (padded to 4), `pid` at 4, `comm` at 8.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HijackEvent {
    pub success: bool,
    pub pid: u32,
    pub comm: [u8; TASK_COMM_LEN],
}

impl HijackEvent {
    /// `comm` is taken from `requested`, the path as the caller passed it.
    pub fn new(success: bool, pid: u32, requested: &ProgramName) -> Self {
        Self {
            success,
            pid,
            comm: *requested.as_bytes(),
        }
    }
}

#[cfg(feature = "user")]
unsafe impl aya::Pod for HijackEvent {}

/// Calling process credentials as returned by `bpf_get_current_uid_gid`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Credentials(u64);

impl Credentials {
    pub const fn from_raw(uid_gid: u64) -> Self {
        Self(uid_gid)
    }

    pub const fn uid(&self) -> u32 {
        self.0 as u32
    }

    pub const fn gid(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Both ids zero.
    pub const fn is_root(&self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_layout_matches_wire_format() {
        assert_eq!(core::mem::size_of::<HijackEvent>(), 24);
        assert_eq!(core::mem::offset_of!(HijackEvent, success), 0);
        assert_eq!(core::mem::offset_of!(HijackEvent, pid), 4);
        assert_eq!(core::mem::offset_of!(HijackEvent, comm), 8);
    }

    #[test]
    fn credentials_split() {
        let creds = Credentials::from_raw((1001u64 << 32) | 1000);
        assert_eq!(creds.uid(), 1000);
        assert_eq!(creds.gid(), 1001);
        assert!(!creds.is_root());
    }

    #[test]
    fn root_needs_both_ids_zero() {
        assert!(Credentials::from_raw(0).is_root());
        // uid 0 with a non-root group is not bypassed
        assert!(!Credentials::from_raw(5u64 << 32).is_root());
        assert!(!Credentials::from_raw(5).is_root());
    }

    #[test]
    fn event_copies_requested_name() {
        let name = ProgramName::from_path(b"/usr/sbin/df");
        let event = HijackEvent::new(true, 42, &name);
        assert!(event.success);
        assert_eq!(event.pid, 42);
        assert_eq!(&event.comm, name.as_bytes());
    }
}
