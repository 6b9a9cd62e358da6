//! Every registered driver honors the same add/build/search contract, and
//! the CLI drives the mmap driver end to end.

use fts::driver::{Driver, DriverOptions, DriverRegistry, IpcDriver, MmapDriver};
use fts::index::Profile;
use fts::server::IndexServer;
use fts::FtsError;
use std::fs;
use std::process::Command;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn options(dir: &TempDir, profile: Profile) -> DriverOptions {
    DriverOptions {
        profile,
        socket_path: dir.path().join("absent.sock"),
        io_timeout: Duration::from_secs(5),
        segment_dir: dir.path().join("segments"),
    }
}

fn docs() -> Vec<String> {
    ["hello world", "hello there", "world peace"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn hit_ids(driver: &dyn Driver, query: &str) -> Vec<u32> {
    let mut ids: Vec<_> = driver
        .search(query, 10)
        .unwrap()
        .iter()
        .map(|h| h.doc_id)
        .collect();
    ids.sort();
    ids
}

#[test]
fn registered_drivers_share_one_contract() {
    let registry = DriverRegistry::with_defaults();
    for profile in Profile::ALL {
        let dir = TempDir::new().unwrap();
        for name in registry.names() {
            let driver = registry.open(name, &options(&dir, profile)).unwrap();
            assert_eq!(driver.add_documents(&docs()).unwrap(), vec![0, 1, 2], "{name}");
            driver.build().unwrap();

            assert_eq!(hit_ids(driver.as_ref(), "hello"), vec![0, 1], "{name}");
            assert_eq!(hit_ids(driver.as_ref(), "peace"), vec![2], "{name}");
            assert!(driver.search("nothing", 10).unwrap().is_empty(), "{name}");
            assert_eq!(driver.search("hello world", 1).unwrap().len(), 1, "{name}");
            assert_eq!(driver.stats().unwrap().doc_count, 3, "{name}");

            driver.close().unwrap();
            assert!(matches!(driver.search("hello", 10), Err(FtsError::Closed)), "{name}");
        }
    }
}

#[test]
fn indexed_drivers_reject_search_before_build() {
    let dir = TempDir::new().unwrap();
    let registry = DriverRegistry::with_defaults();
    for name in ["speed", "balanced", "compact", "ffi"] {
        let driver = registry.open(name, &options(&dir, Profile::Speed)).unwrap();
        driver.add_document("early").unwrap();
        assert!(matches!(driver.search("early", 5), Err(FtsError::NotBuilt)), "{name}");
        driver.build().unwrap();
        assert!(matches!(driver.add_document("late"), Err(FtsError::AlreadyBuilt)), "{name}");
    }
}

#[test]
fn ipc_driver_prefers_a_live_server() {
    let dir = TempDir::new().unwrap();
    let server = IndexServer::new(
        Profile::Compact,
        dir.path().join("fts.sock"),
        Duration::from_secs(5),
    );
    let listener = server.bind().unwrap();
    let handle = {
        let server = Arc::clone(&server);
        thread::spawn(move || server.serve(listener).unwrap())
    };

    let driver = IpcDriver::connect(server.socket_path(), Duration::from_secs(5));
    assert!(driver.is_remote());
    driver.add_documents(&docs()).unwrap();
    driver.build().unwrap();
    assert_eq!(hit_ids(&driver, "world"), vec![0, 2]);
    driver.close().unwrap();

    // The server's index outlives the session
    let second = IpcDriver::connect(server.socket_path(), Duration::from_secs(5));
    assert_eq!(second.stats().unwrap().doc_count, 3);
    assert!(matches!(second.build(), Err(FtsError::AlreadyBuilt)));
    second.close().unwrap();

    server.stop();
    handle.join().unwrap();
}

#[test]
fn mmap_segments_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let seg_dir = dir.path().join("segments");
    {
        let driver = MmapDriver::open(&seg_dir, Profile::Balanced).unwrap();
        driver.add_documents(&docs()).unwrap();
        driver.build().unwrap();
    }
    let driver = MmapDriver::open(&seg_dir, Profile::Balanced).unwrap();
    assert_eq!(driver.segment_count(), 1);
    assert_eq!(hit_ids(&driver, "hello"), vec![0, 1]);
    assert_eq!(driver.add_document("hello again").unwrap(), 3);
    assert_eq!(hit_ids(&driver, "hello"), vec![0, 1, 3]);
}

#[test]
fn cli_indexes_and_searches() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("docs.jsonl");
    fs::write(
        &data,
        "{\"text\": \"hello world\"}\n{\"text\": \"hello there\"}\n{\"text\": \"world peace\"}\n",
    )
    .unwrap();
    let seg_dir = dir.path().join("segments");
    let config = dir.path().join("config.json");

    let fts = || {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_fts"));
        cmd.arg("--config").arg(&config).arg("--no-color");
        cmd
    };

    let out = fts()
        .args(["index", "--profile", "compact", "--dir"])
        .arg(&seg_dir)
        .arg(&data)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(seg_dir.join("seg_0000.fts").exists());

    let out = fts()
        .args(["search", "--dir"])
        .arg(&seg_dir)
        .arg("peace")
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert_eq!(stdout.lines().count(), 1);
    assert!(stdout.contains("doc 2"));

    let out = fts().args(["bench", "--driver", "nope"]).output().unwrap();
    assert!(!out.status.success());
}
