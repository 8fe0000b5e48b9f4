use std::net::SocketAddr;

use anyhow::Context as _;
use aya::maps::RingBuf;
use aya::programs::TracePoint;
use aya::EbpfLoader;
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

mod drain;
mod server;
mod store;

use drain::drain_events;
use server::start_http_server;
use store::{ReportStorage, DEFAULT_MAX_REPORTS};

#[derive(Debug, Parser)]
#[command(about = "Rewrites execve of a fixed target binary and reports each hijack")]
struct Opt {
    /// Parent pid written to the program's TARGET_PPID global.
    #[arg(long, default_value_t = 0)]
    target_ppid: i32,

    /// Address for the report API.
    #[arg(long, default_value = "0.0.0.0:3000")]
    listen: SocketAddr,

    /// Number of hijack reports kept in memory.
    #[arg(long, default_value_t = DEFAULT_MAX_REPORTS)]
    max_reports: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting execve hijack monitor");

    // Bump the memlock rlimit. This is needed for older kernels that don't use the
    // new memcg based accounting, see https://lwn.net/Articles/837122/
    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret != 0 {
        warn!("remove limit on locked memory failed, ret is: {ret}");
    }

    if opt.target_ppid != 0 {
        warn!(
            target_ppid = opt.target_ppid,
            "TARGET_PPID is set but the handler does not filter on it"
        );
    }

    // The global may be optimised out of the object since nothing reads it, so
    // it is not required to exist.
    let mut ebpf = EbpfLoader::new()
        .set_global("TARGET_PPID", &opt.target_ppid, false)
        .load(aya::include_bytes_aligned!(concat!(
            env!("OUT_DIR"),
            "/exechijack"
        )))?;
    if let Err(e) = aya_log::EbpfLogger::init(&mut ebpf) {
        // This can happen if you remove all log statements from your eBPF program.
        warn!("failed to initialize eBPF logger: {e}");
    }
    let program: &mut TracePoint = ebpf
        .program_mut("exechijack")
        .context("exechijack program not found")?
        .try_into()?;
    program.load()?;
    program.attach("syscalls", "sys_enter_execve")?;

    info!("eBPF program loaded and attached to syscalls/sys_enter_execve");

    let storage = ReportStorage::new(opt.max_reports);

    let ring_buf = RingBuf::try_from(ebpf.take_map("EVENTS").context("EVENTS map not found")?)?;
    let drain_handle = tokio::spawn(drain_events(ring_buf, storage.clone()));

    let server_handle = start_http_server(storage, opt.listen).await?;

    info!("Waiting for Ctrl-C...");
    signal::ctrl_c().await?;
    info!("Exiting...");

    server_handle.abort();
    drain_handle.abort();
    // Dropping `ebpf` detaches the tracepoint.
    drop(ebpf);
    Ok(())
}
