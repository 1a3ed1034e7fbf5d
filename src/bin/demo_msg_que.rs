// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Usage:
//   demo_msg_que s <key> <type>                (sender, one message per stdin line)
//   demo_msg_que r <key> <type> <interval_ms>  (receiver, polls without blocking)
//   demo_msg_que rm <key>                      (remove the queue)
//
// Lines longer than the channel capacity are reported and skipped, never cut.
// Set RUST_LOG=sysv_ipc=debug to trace every kernel call.

#[cfg(target_os = "linux")]
fn main() {
    env_logger::init();
    demo::run();
}

#[cfg(not(target_os = "linux"))]
fn main() {
    eprintln!("demo_msg_que: System V IPC is only wired up on Linux");
    std::process::exit(1);
}

#[cfg(target_os = "linux")]
mod demo {
    use std::io::BufRead;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    use sysv_ipc::{MessageQueue, Received, ResourceKey, SysV};

    static QUIT: AtomicBool = AtomicBool::new(false);

    extern "C" fn on_signal(_: libc::c_int) {
        QUIT.store(true, Ordering::Release);
    }

    fn usage() -> ! {
        eprintln!("usage: demo_msg_que s <key> <type>");
        eprintln!("       demo_msg_que r <key> <type> <interval_ms>");
        eprintln!("       demo_msg_que rm <key>");
        std::process::exit(1);
    }

    fn arg<T: std::str::FromStr>(args: &[String], i: usize) -> T {
        args.get(i)
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| usage())
    }

    fn do_send(que: &MessageQueue<SysV>, key: ResourceKey, mtype: i64) {
        if let Err(e) = que.create(key) {
            eprintln!("send: create failed: {e}");
            std::process::exit(1);
        }
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match que.send(key, mtype, line.as_bytes()) {
                Ok(()) => println!("send: {} bytes", line.len()),
                Err(e) => eprintln!("send: {e}"),
            }
        }
    }

    fn do_recv(que: &MessageQueue<SysV>, key: ResourceKey, mtype: i64, interval_ms: u64) {
        unsafe {
            libc::signal(libc::SIGINT, on_signal as *const () as libc::sighandler_t);
            libc::signal(libc::SIGTERM, on_signal as *const () as libc::sighandler_t);
        }
        while !QUIT.load(Ordering::Acquire) {
            match que.receive(key, mtype) {
                Ok(Received::Message(msg)) => {
                    println!("recv: {}", String::from_utf8_lossy(msg.payload()));
                    continue;
                }
                Ok(Received::Empty) => {}
                Err(e) if e.is_absent() => println!("recv: waiting for queue {key}..."),
                Err(e) => {
                    eprintln!("recv: {e}");
                    std::process::exit(1);
                }
            }
            thread::sleep(Duration::from_millis(interval_ms));
        }
    }

    pub fn run() {
        let args: Vec<String> = std::env::args().collect();
        if args.len() < 3 {
            usage();
        }

        let key = ResourceKey::new(arg(&args, 2));
        let que = MessageQueue::new(SysV::new());

        match args[1].as_str() {
            "s" => do_send(&que, key, arg(&args, 3)),
            "r" => do_recv(&que, key, arg(&args, 3), arg(&args, 4)),
            "rm" => {
                if let Err(e) = que.destroy(key) {
                    eprintln!("rm: {e}");
                    std::process::exit(1);
                }
            }
            _ => usage(),
        }
    }
}
