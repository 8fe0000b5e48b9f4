//! Userspace side of the `EVENTS` ring buffer.

use std::mem::{offset_of, size_of};

use aya::maps::{MapData, RingBuf};
use exechijack_common::{HijackEvent, TASK_COMM_LEN};
use tokio::io::unix::AsyncFd;
use tracing::{error, info, warn};

use crate::store::ReportStorage;

/// Decodes one ring buffer record, or `None` if it is too short to hold a
/// [`HijackEvent`].
pub fn decode_event(bytes: &[u8]) -> Option<HijackEvent> {
    if bytes.len() < size_of::<HijackEvent>() {
        return None;
    }
    let success = bytes[offset_of!(HijackEvent, success)] != 0;
    let pid_at = offset_of!(HijackEvent, pid);
    let pid: u32 = bytemuck::pod_read_unaligned(&bytes[pid_at..pid_at + size_of::<u32>()]);
    let comm_at = offset_of!(HijackEvent, comm);
    let mut comm = [0u8; TASK_COMM_LEN];
    comm.copy_from_slice(&bytes[comm_at..comm_at + TASK_COMM_LEN]);
    Some(HijackEvent { success, pid, comm })
}

/// Drains the ring buffer until its descriptor fails, storing every record.
pub async fn drain_events(ring_buf: RingBuf<MapData>, storage: ReportStorage) {
    let mut async_fd = match AsyncFd::new(ring_buf) {
        Ok(fd) => fd,
        Err(err) => {
            error!("Failed to register ring buffer with the runtime: {:?}", err);
            return;
        }
    };

    loop {
        let mut guard = match async_fd.readable_mut().await {
            Ok(guard) => guard,
            Err(err) => {
                error!("Ring buffer poll failed: {:?}", err);
                return;
            }
        };

        let ring = guard.get_inner_mut();
        while let Some(item) = ring.next() {
            let Some(event) = decode_event(&item) else {
                warn!(len = item.len(), "Discarding short ring buffer record");
                continue;
            };
            drop(item);

            let report = storage.record(&event).await;
            info!(
                seq = report.seq,
                pid = report.pid,
                success = report.success,
                requested = %report.requested,
                "Exec hijack reported"
            );
        }
        guard.clear_ready();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exechijack_common::ProgramName;

    fn encode(event: &HijackEvent) -> Vec<u8> {
        let mut bytes = vec![0u8; size_of::<HijackEvent>()];
        bytes[0] = event.success as u8;
        bytes[4..8].copy_from_slice(&event.pid.to_ne_bytes());
        bytes[8..].copy_from_slice(&event.comm);
        bytes
    }

    #[test]
    fn decodes_record_written_by_the_handler() {
        let event = HijackEvent::new(true, 31337, &ProgramName::from_path(b"/usr/sbin/df"));
        assert_eq!(decode_event(&encode(&event)), Some(event));
    }

    #[test]
    fn padding_bytes_are_ignored() {
        let event = HijackEvent::new(false, 9, &ProgramName::from_path(b"/usr/sbin/df"));
        let mut bytes = encode(&event);
        bytes[1..4].copy_from_slice(&[0xAA; 3]);
        assert_eq!(decode_event(&bytes), Some(event));
    }

    #[test]
    fn short_record_is_rejected() {
        assert_eq!(decode_event(&[1, 0, 0, 0, 5]), None);
        assert_eq!(decode_event(&[]), None);
    }
}
