// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Usage:
//   demo_region w <key> <interval_ms>   (writer: stamps a counter into the region)
//   demo_region r <key> <interval_ms>   (reader: prints what it finds)
//   demo_region rm <key>                (remove the region and its lock)
//
// The region is 64 bytes at <key>, its lock at <key> + 1. The writer creates
// it and removes it again on SIGINT / SIGTERM.
// Set RUST_LOG=sysv_ipc=debug to trace every kernel call.

#[cfg(target_os = "linux")]
fn main() {
    env_logger::init();
    demo::run();
}

#[cfg(not(target_os = "linux"))]
fn main() {
    eprintln!("demo_region: System V IPC is only wired up on Linux");
    std::process::exit(1);
}

#[cfg(target_os = "linux")]
mod demo {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    use sysv_ipc::{RegionManager, ResourceKey, SysV};

    const REGION_SIZE: usize = 64;

    static QUIT: AtomicBool = AtomicBool::new(false);

    extern "C" fn on_signal(_: libc::c_int) {
        QUIT.store(true, Ordering::Release);
    }

    fn install_quit_handler() {
        unsafe {
            libc::signal(libc::SIGINT, on_signal as *const () as libc::sighandler_t);
            libc::signal(libc::SIGTERM, on_signal as *const () as libc::sighandler_t);
        }
    }

    fn usage() -> ! {
        eprintln!("usage: demo_region w <key> <interval_ms>");
        eprintln!("       demo_region r <key> <interval_ms>");
        eprintln!("       demo_region rm <key>");
        std::process::exit(1);
    }

    fn arg<T: std::str::FromStr>(args: &[String], i: usize) -> T {
        args.get(i)
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| usage())
    }

    fn do_write(mgr: &RegionManager<SysV>, key: ResourceKey, interval_ms: u64) {
        if let Err(e) = mgr.create(REGION_SIZE, key) {
            eprintln!("write: create failed: {e}");
            std::process::exit(1);
        }
        let mut n = 0u64;
        while !QUIT.load(Ordering::Acquire) {
            let mut buf = [0u8; REGION_SIZE];
            let text = format!("stamp {n}");
            buf[..text.len()].copy_from_slice(text.as_bytes());
            match mgr.write(key, &buf) {
                Ok(()) => println!("write: {text}"),
                Err(e) => eprintln!("write: {e}"),
            }
            n += 1;
            thread::sleep(Duration::from_millis(interval_ms));
        }
        if let Err(e) = mgr.destroy(REGION_SIZE, key) {
            eprintln!("write: destroy failed: {e}");
        }
    }

    fn do_read(mgr: &RegionManager<SysV>, key: ResourceKey, interval_ms: u64) {
        while !QUIT.load(Ordering::Acquire) {
            match mgr.read_vec(key, REGION_SIZE) {
                Ok(buf) => {
                    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
                    println!("read: {}", String::from_utf8_lossy(&buf[..end]));
                }
                Err(e) if e.is_absent() => println!("read: waiting for region {key}..."),
                Err(e) => eprintln!("read: {e}"),
            }
            thread::sleep(Duration::from_millis(interval_ms));
        }
    }

    pub fn run() {
        let args: Vec<String> = std::env::args().collect();
        if args.len() < 3 {
            usage();
        }
        install_quit_handler();

        let key = ResourceKey::new(arg(&args, 2));
        let mgr = RegionManager::new(SysV::new());

        match args[1].as_str() {
            "w" => do_write(&mgr, key, arg(&args, 3)),
            "r" => do_read(&mgr, key, arg(&args, 3)),
            "rm" => {
                if let Err(e) = mgr.destroy(1, key) {
                    eprintln!("rm: {e}");
                    std::process::exit(1);
                }
            }
            _ => usage(),
        }
    }
}
