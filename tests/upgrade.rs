//! End-to-end upgrades of the demo binary.
#![cfg(all(unix, feature = "demo"))]

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serial_test::serial;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};

const DEMO: &str = env!("CARGO_BIN_EXE_gracevisor-demo");

#[derive(Debug)]
struct Ready {
    generation: u64,
    pid: i32,
    http: String,
    admin: String,
}

impl Ready {
    fn parse(line: &str) -> Option<Self> {
        let mut fields = line.strip_prefix("ready ")?.split_whitespace();
        let mut value = |key: &str| {
            fields
                .next()
                .and_then(|f| f.strip_prefix(key))
                .and_then(|f| f.strip_prefix('='))
                .map(str::to_string)
        };
        Some(Self {
            generation: value("generation")?.parse().ok()?,
            pid: value("pid")?.parse().ok()?,
            http: value("http")?,
            admin: value("admin")?,
        })
    }
}

struct Demo {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

impl Demo {
    fn spawn(extra: &[&str]) -> Self {
        let mut child = Command::new(DEMO)
            .args([
                "--http-addr",
                "127.0.0.1:0",
                "--admin-addr",
                "127.0.0.1:0",
                "--slow-ms",
                "500",
                "--upgrade-timeout-secs",
                "10",
            ])
            .args(extra)
            .env("RUST_LOG", "warn")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .expect("demo binary should start");
        let stdout = child.stdout.take().expect("stdout is piped");
        Self {
            child,
            lines: BufReader::new(stdout).lines(),
        }
    }

    /// Next `ready ...` line printed by any generation sharing the pipe.
    async fn ready(&mut self) -> Ready {
        tokio::time::timeout(Duration::from_secs(20), async {
            loop {
                let line = self
                    .lines
                    .next_line()
                    .await
                    .expect("read stdout")
                    .expect("demo closed stdout before becoming ready");
                if let Some(ready) = Ready::parse(&line) {
                    return ready;
                }
            }
        })
        .await
        .expect("no ready line in time")
    }
}

fn client() -> reqwest::Client {
    // A fresh connection per request, so draining never hits a pooled socket.
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}

fn signal(pid: i32, sig: Signal) {
    kill(Pid::from_raw(pid), sig).expect("signal demo");
}

/// Orphaned successors may linger as zombies until reaped; those count as gone.
fn alive(pid: i32) -> bool {
    if kill(Pid::from_raw(pid), None::<Signal>).is_err() {
        return false;
    }
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => !stat.contains(") Z "),
        Err(_) => true,
    }
}

async fn wait_gone(pid: i32) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while alive(pid) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("process did not exit");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn sighup_hands_over_without_refusing_connections() {
    let mut demo = Demo::spawn(&[]);
    let first = demo.ready().await;
    assert_eq!(first.generation, 1);

    let client = client();
    let app = format!("http://{}", first.http);

    let stop = Arc::new(AtomicBool::new(false));
    let failures = Arc::new(AtomicUsize::new(0));
    let served_by_successor = Arc::new(AtomicBool::new(false));
    let load = tokio::spawn({
        let (client, app) = (client.clone(), app.clone());
        let (stop, failures, seen) = (stop.clone(), failures.clone(), served_by_successor.clone());
        async move {
            while !stop.load(Ordering::SeqCst) {
                match client.get(format!("{app}/")).send().await {
                    Ok(resp) => {
                        let body = resp.text().await.unwrap_or_default();
                        if body.contains("generation 2") {
                            seen.store(true, Ordering::SeqCst);
                        }
                    }
                    Err(_) => {
                        failures.fetch_add(1, Ordering::SeqCst);
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
    });

    let slow = tokio::spawn({
        let (client, app) = (client.clone(), app.clone());
        async move { client.get(format!("{app}/slow")).send().await?.text().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    signal(first.pid, Signal::SIGHUP);
    let second = demo.ready().await;
    assert_eq!(second.generation, 2);
    assert_ne!(second.pid, first.pid);
    assert_eq!(second.http, first.http);
    assert_eq!(second.admin, first.admin);

    assert_eq!(slow.await.unwrap().unwrap(), "slow done by generation 1\n");

    let status = tokio::time::timeout(Duration::from_secs(10), demo.child.wait())
        .await
        .expect("previous generation did not exit")
        .unwrap();
    assert!(status.success(), "previous generation exited with {status}");

    tokio::time::sleep(Duration::from_millis(200)).await;
    stop.store(true, Ordering::SeqCst);
    load.await.unwrap();

    assert_eq!(failures.load(Ordering::SeqCst), 0);
    assert!(served_by_successor.load(Ordering::SeqCst));

    let health = client
        .get(format!("http://{}/healthz", second.admin))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(health, "ok\n");

    signal(second.pid, Signal::SIGTERM);
    wait_gone(second.pid).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn failed_successor_leaves_the_parent_serving() {
    let mut demo = Demo::spawn(&["--exit-at-generation", "2"]);
    let first = demo.ready().await;
    let client = client();
    let admin = format!("http://{}", first.admin);

    let resp = client.post(format!("{admin}/upgrade")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 409);
    assert!(resp.text().await.unwrap().contains("exited before becoming ready"));

    let state = client
        .get(format!("{admin}/state"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(state, "failed\n");

    // A failed upgrade does not block the next attempt.
    let retry = client.post(format!("{admin}/upgrade")).send().await.unwrap();
    assert_eq!(retry.status().as_u16(), 409);
    assert!(retry.text().await.unwrap().contains("exited before becoming ready"));

    let hello = client
        .get(format!("http://{}/", first.http))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(hello.contains("generation 1"));

    signal(first.pid, Signal::SIGTERM);
    let status = tokio::time::timeout(Duration::from_secs(10), demo.child.wait())
        .await
        .expect("demo did not exit")
        .unwrap();
    assert!(status.success());
}
