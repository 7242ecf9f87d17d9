// tests/transfer.rs
use anyhow::Result;
use ironpipe::prelude::*;
use ironpipe::testing::*;
use std::fs;
use std::path::Path;

fn seed_local(ts: &TestSession, names: &[&str]) -> Result<String> {
    let dir = ts.local_dir().join("src");
    fs::create_dir_all(&dir)?;
    for n in names {
        fs::write(dir.join(n), format!("contents of {n}"))?;
    }
    Ok(dir.display().to_string())
}

fn seed_remote(ts: &TestSession, path: &str) -> Result<()> {
    for h in TEST_HOSTS {
        let p = ts.host_path(h, path);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&p, format!("{h}:{path}"))?;
    }
    Ok(())
}

#[test]
fn upload_copies_matches_to_every_host() -> Result<()> {
    let ts = TestSession::new()?;
    let src = seed_local(&ts, &["a.txt", "b.txt", "c.csv"])?;
    let out = ts.gather(&upload(TEST_CLUSTER, "/data/in", [format!("{src}/*.txt")]))?;
    assert!(out.is_empty());
    for h in TEST_HOSTS {
        assert_eq!(fs::read_to_string(ts.host_path(h, "/data/in/a.txt"))?, "contents of a.txt");
        assert!(ts.host_path(h, "/data/in/b.txt").is_file());
        assert!(!ts.host_path(h, "/data/in/c.csv").exists());
    }
    Ok(())
}

#[test]
fn upload_configuration_errors() -> Result<()> {
    let ts = TestSession::new()?;
    let src = seed_local(&ts, &["a.txt"])?;
    assert_eq!(
        ts.gather(&upload(TEST_CLUSTER, "data/in", [format!("{src}/a.txt")]))
            .unwrap_err()
            .to_string(),
        "Target directory must be absolute: data/in"
    );
    assert_eq!(
        ts.gather(&upload(TEST_CLUSTER, "/data", [format!("{src}/*.nothing")]))
            .unwrap_err()
            .to_string(),
        "No qualifying paths"
    );
    assert_eq!(
        ts.gather(&upload("nowhere", "/data", [format!("{src}/a.txt")]))
            .unwrap_err()
            .to_string(),
        "nowhere is not a Cluster"
    );
    Ok(())
}

#[test]
fn upload_failures_are_per_file_and_per_host() -> Result<()> {
    let ts = TestSession::with_unreachable(&["beta"])?;
    let src = seed_local(&ts, &["a.txt", "b.txt"])?;
    let out = ts.gather(&upload(TEST_CLUSTER, "/drop", [format!("{src}/*")]))?;
    assert_eq!(out.len(), 2);
    assert_all(&out, |v| matches!(v, Value::Error(e) if e.host == Some(Host::new("beta"))));
    assert!(ts.host_path("alpha", "/drop/a.txt").is_file());
    assert!(ts.host_path("gamma", "/drop/b.txt").is_file());
    Ok(())
}

#[test]
fn download_lands_under_per_host_directories() -> Result<()> {
    let ts = TestSession::new()?;
    seed_remote(&ts, "/logs/app.log")?;
    seed_remote(&ts, "/logs/db.log")?;
    let target = ts.local_dir().join("fetched");
    let out = ts.gather(&download(
        target.display().to_string(),
        TEST_CLUSTER,
        ["/logs/*.log"],
    ))?;
    assert!(out.is_empty());
    for h in TEST_HOSTS {
        let got = fs::read_to_string(target.join(h).join("app.log"))?;
        assert_eq!(got, format!("{h}:/logs/app.log"));
        assert!(target.join(h).join("db.log").is_file());
    }
    Ok(())
}

#[test]
fn download_missing_files_are_reported_per_host() -> Result<()> {
    let ts = TestSession::new()?;
    seed_remote(&ts, "/logs/app.log")?;
    let target = ts.local_dir().join("fetched");
    let out = ts.gather(&download(
        target.display().to_string(),
        TEST_CLUSTER,
        ["/logs/app.log", "/nothing/*"],
    ))?;
    assert_eq!(out.len(), 3);
    for e in errors_of(&out) {
        assert_eq!(e.message, "/nothing/*: No such file or directory");
        assert!(e.host.is_some());
    }
    for h in TEST_HOSTS {
        assert!(Path::new(&target.join(h).join("app.log")).is_file());
    }
    Ok(())
}

#[test]
fn download_requires_sources() -> Result<()> {
    let ts = TestSession::new()?;
    let none: [&str; 0] = [];
    assert_eq!(
        ts.gather(&download("/tmp/unused", TEST_CLUSTER, none)).unwrap_err().to_string(),
        "No remote files specified"
    );
    Ok(())
}
