// tests/fork_remote.rs
use anyhow::Result;
use ironpipe::prelude::*;
use ironpipe::testing::*;
use std::collections::BTreeMap;
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

/// Run `f` on its own thread and fail if it has not returned within `secs`.
fn within<T, F>(secs: u64, f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(Duration::from_secs(secs))
        .expect("command did not finish in time")
}

/// A template whose single step waits until `parties` branches reach it.
fn rendezvous(parties: usize) -> Template {
    let barrier = Arc::new(Barrier::new(parties));
    Template::new(&["u"], move |_| {
        let barrier = Arc::clone(&barrier);
        Ok(generate(1, 0) | map(move |x| {
            barrier.wait();
            Ok(x.clone())
        }))
    })
}

fn offset_by_unit() -> Template {
    Template::new(&["i"], |b| {
        let i = b.get("i")?.clone();
        Ok(generate(3, b.param("i")?) | map(move |x| Ok(Value::tuple([i.clone(), x.clone()]))))
    })
}

/// Per-unit subsequences, keyed by each row's first field.
fn by_unit(rows: &[Value]) -> BTreeMap<String, Vec<Value>> {
    let mut m: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for r in rows {
        let f = r.fields();
        m.entry(f[0].to_string()).or_default().push(Value::from_fields(f[1..].to_vec()));
    }
    m
}

#[test]
fn fork_over_count_preserves_branch_order() -> Result<()> {
    let s = Session::new(SessionConfig::default());
    let out = s.gather(&fork(Fanout::count(3), offset_by_unit()))?;
    assert_eq!(out.len(), 9);
    let units = by_unit(&out);
    assert_eq!(units["0"], ints([0, 1, 2]));
    assert_eq!(units["1"], ints([1, 2, 3]));
    assert_eq!(units["2"], ints([2, 3, 4]));
    Ok(())
}

#[test]
fn fork_over_labels_and_zero_parameter_templates() -> Result<()> {
    let s = Session::new(SessionConfig::default());
    let labels = Fanout::labels([Value::from("a"), Value::from("b")]);
    let out = s.gather(&fork(labels, generate(2, 0)))?;
    assert_collections_unordered_equal(&out, &ints([0, 1, 0, 1]));
    Ok(())
}

#[test]
fn fork_over_cluster_receives_hosts() -> Result<()> {
    let ts = TestSession::new()?;
    let echo = Template::new(&["h"], |b| Ok(values([b.get("h")?.clone()])));
    let out = ts.gather(&fork(Fanout::cluster(TEST_CLUSTER), echo))?;
    let hosts: Vec<Value> = TEST_HOSTS.iter().map(|h| Value::Host(Host::new(*h))).collect();
    assert_collections_unordered_equal(&out, &hosts);
    Ok(())
}

#[test]
fn fork_configuration_errors() {
    let s = Session::new(SessionConfig::default());
    let two = Template::new(&["a", "b"], |_| Ok(generate(1, 0)));
    assert_eq!(
        s.gather(&fork(Fanout::count(2), two)).unwrap_err().to_string(),
        "fork pipeline must have no more than one parameter"
    );
    assert_eq!(
        s.gather(&fork(Fanout::count(-1), generate(1, 0))).unwrap_err().to_string(),
        "count must be non-negative"
    );
    assert_eq!(
        s.gather(&fork(Fanout::cluster("nowhere"), generate(1, 0))).unwrap_err().to_string(),
        "nowhere is not a Cluster"
    );
}

#[test]
fn fork_branch_setup_failure_is_fatal() {
    let s = Session::new(SessionConfig::default());
    let flaky = Template::new(&["i"], |b| {
        let n = if b.get("i")? == &Value::Int(2) { 0 } else { 1 };
        Ok(generate(3, 0) | head(n))
    });
    let err = s.gather(&fork(Fanout::count(3), flaky)).unwrap_err();
    assert_eq!(err.to_string(), "head: n must not be 0");
}

#[test]
fn downstream_stop_cancels_unbounded_branches() -> Result<()> {
    let s = Session::new(SessionConfig::default());
    let out = s.gather(&(fork(Fanout::count(4), generate(0, 0)) | head(5)))?;
    assert_eq!(out.len(), 5);
    Ok(())
}

#[test]
fn silent_branches_stop_once_downstream_is_done() -> Result<()> {
    let out = within(10, || {
        let s = Session::new(SessionConfig::default());
        let one_or_none = Template::new(&["i"], |b| {
            Ok(if b.get("i")? == &Value::Int(0) {
                generate(1, 42)
            } else {
                generate(0, 0) | select(|_| Ok(false))
            })
        });
        s.gather(&(fork(Fanout::count(2), one_or_none) | head(1)))
    })?;
    assert_collections_equal(&out, &ints([42]));
    Ok(())
}

#[test]
fn nested_forks_stop_with_the_outer_one() -> Result<()> {
    let out = within(10, || {
        let s = Session::new(SessionConfig::default());
        let quiet = generate(0, 0) | select(|_| Ok(false));
        let inner = Template::new(&["i"], move |b| {
            Ok(if b.get("i")? == &Value::Int(0) {
                values(ints([7]))
            } else {
                fork(Fanout::count(2), quiet.clone())
            })
        });
        s.gather(&(fork(Fanout::count(2), inner) | head(1)))
    })?;
    assert_collections_equal(&out, &ints([7]));
    Ok(())
}

#[test]
fn fork_units_run_concurrently() -> Result<()> {
    let out = within(10, || {
        let s = Session::new(SessionConfig::default());
        s.gather(&fork(Fanout::count(3), rendezvous(3)))
    })?;
    assert_collections_equal(&out, &ints([0, 0, 0]));
    Ok(())
}

#[test]
fn remote_hosts_run_concurrently() -> Result<()> {
    let out = within(10, || -> Result<Vec<Value>> {
        let ts = TestSession::new()?;
        Ok(ts.gather(&remote(TEST_CLUSTER, rendezvous(TEST_HOSTS.len())))?)
    })?;
    assert_eq!(out.len(), TEST_HOSTS.len());
    assert_no_errors(&out);
    Ok(())
}

#[test]
fn non_finite_floats_survive_the_wire() -> Result<()> {
    let ts = TestSession::new()?;
    let specials = [f64::INFINITY, f64::NEG_INFINITY, f64::NAN].map(Value::float);
    let out = ts.gather(&remote(TEST_CLUSTER, values(specials.clone())))?;
    assert_no_errors(&out);
    for h in TEST_HOSTS {
        assert_eq!(by_unit(&out)[h], specials.to_vec());
    }
    Ok(())
}

#[test]
fn remote_tags_output_with_host() -> Result<()> {
    let ts = TestSession::new()?;
    let out = ts.gather(&remote(TEST_CLUSTER, generate(2, 0)))?;
    assert_eq!(out.len(), 6);
    let hosts = by_unit(&out);
    for h in TEST_HOSTS {
        assert_eq!(hosts[h], ints([0, 1]));
    }
    assert!(out.iter().all(|r| matches!(r.fields()[0], Value::Host(_))));
    Ok(())
}

#[test]
fn remote_prefixes_tuples_and_binds_the_host() -> Result<()> {
    let ts = TestSession::new()?;
    let whoami = Template::new(&["h"], |b| {
        Ok(values([Value::tuple([b.get("h")?.clone(), Value::Int(1)])]))
    });
    let out = ts.gather(&remote(TEST_CLUSTER, whoami))?;
    for row in &out {
        let f = row.fields();
        assert_eq!(f.len(), 3);
        assert_eq!(f[0], f[1]);
        assert_eq!(f[2], Value::Int(1));
    }
    Ok(())
}

#[test]
fn unreachable_host_becomes_one_tagged_error() -> Result<()> {
    let ts = TestSession::with_unreachable(&["beta"])?;
    let out = ts.gather(&remote(TEST_CLUSTER, generate(2, 0)))?;
    assert_eq!(out.len(), 5);
    let errors = errors_of(&out);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].host, Some(Host::new("beta")));
    assert!(errors[0].message.contains("connection refused"));
    Ok(())
}

#[test]
fn host_local_setup_failure_does_not_abort_siblings() -> Result<()> {
    let ts = TestSession::new()?;
    let picky = Template::new(&["h"], |b| {
        let n = if b.get("h")? == &Value::Host(Host::new("gamma")) { 0 } else { 1 };
        Ok(generate(5, 7) | head(n))
    });
    let out = ts.gather(&remote(TEST_CLUSTER, picky))?;
    assert_eq!(out.len(), 3);
    let errors = errors_of(&out);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].host, Some(Host::new("gamma")));
    assert_eq!(errors[0].message, "head: n must not be 0");
    assert_eq!(errors[0].to_string(), "Error(gamma: head: n must not be 0)");
    Ok(())
}

#[test]
fn remote_configuration_errors() -> Result<()> {
    let ts = TestSession::new()?;
    assert_eq!(
        ts.gather(&remote("nowhere", generate(1, 0))).unwrap_err().to_string(),
        "nowhere is not a Cluster"
    );
    let two = Template::new(&["a", "b"], |_| Ok(generate(1, 0)));
    assert_eq!(
        ts.gather(&remote(TEST_CLUSTER, two)).unwrap_err().to_string(),
        "remote pipeline must have no more than one parameter"
    );
    Ok(())
}

#[test]
fn concurrent_branches_append_to_one_reservoir() -> Result<()> {
    let s = Session::new(SessionConfig::default());
    let writer = Template::new(&["i"], |_| Ok(generate(100, 0) | store_append("acc")));
    assert!(s.gather(&fork(Fanout::count(8), writer))?.is_empty());
    assert_eq!(s.reservoir("acc")?.len(), 800);
    let total = s.first(&(load("acc") | reduce(vec![Slot::from(r_plus())])))?;
    assert_eq!(total, Value::Int(8 * 4950));
    Ok(())
}
