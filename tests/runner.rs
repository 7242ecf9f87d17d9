// tests/runner.rs
use anyhow::Result;
use ironpipe::prelude::*;
use ironpipe::runner::Instance;
use ironpipe::testing::*;
use ironpipe::{CancelToken, Emit, Flow, Op, OpSpec, RunState};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
struct Counters {
    setup: AtomicUsize,
    received: AtomicUsize,
    flushed: AtomicUsize,
    cleaned: AtomicUsize,
}

/// Pass-through stage that counts its lifecycle hooks.
struct Counting(Arc<Counters>);

impl OpSpec for Counting {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn instantiate(&self) -> Box<dyn Op> {
        Box::new(CountingOp(Arc::clone(&self.0)))
    }
}

struct CountingOp(Arc<Counters>);

impl Op for CountingOp {
    fn setup(&mut self, _env: &ironpipe::Env) -> ironpipe::error::Result<()> {
        self.0.setup.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn receive(&mut self, x: Value, out: &mut dyn Emit) -> ironpipe::error::Result<Flow> {
        self.0.received.fetch_add(1, Ordering::SeqCst);
        out.emit(x)
    }

    fn flush(&mut self, _out: &mut dyn Emit) -> ironpipe::error::Result<Flow> {
        self.0.flushed.fetch_add(1, Ordering::SeqCst);
        Ok(Flow::Continue)
    }

    fn cleanup(&mut self) {
        self.0.cleaned.fetch_add(1, Ordering::SeqCst);
    }
}

fn counting() -> (Pipeline, Arc<Counters>) {
    let c = Arc::new(Counters::default());
    (Pipeline::of(Counting(Arc::clone(&c))), c)
}

#[test]
fn completion_reaches_every_stage_once_after_truncation() -> Result<()> {
    let s = Session::new(SessionConfig::default());
    let (before, c1) = counting();
    let (after, c2) = counting();
    let out = s.gather(&(generate(0, 0) | before | head(3) | after))?;
    assert_collections_equal(&out, &ints(0..3));

    for c in [&c1, &c2] {
        assert_eq!(c.setup.load(Ordering::SeqCst), 1);
        assert_eq!(c.flushed.load(Ordering::SeqCst), 1);
        assert_eq!(c.cleaned.load(Ordering::SeqCst), 1);
    }
    assert_eq!(c1.received.load(Ordering::SeqCst), 3);
    Ok(())
}

#[test]
fn setup_failure_produces_nothing_and_cleans_up() {
    let s = Session::new(SessionConfig::default());
    let (p, c) = counting();
    let mut seen = 0;
    let mut sink = |_: Value| -> ironpipe::error::Result<Flow> {
        seen += 1;
        Ok(Flow::Continue)
    };
    let err = s.run_with(&(generate(5, 0) | p | head(0)), &mut sink).unwrap_err();
    assert_eq!(err.to_string(), "head: n must not be 0");
    assert_eq!(seen, 0);
    assert_eq!(c.received.load(Ordering::SeqCst), 0);
    assert_eq!(c.cleaned.load(Ordering::SeqCst), 1);
}

#[test]
fn instance_states() -> Result<()> {
    let env = test_env();
    let mut inst: Instance = generate(2, 0).instantiate();
    assert_eq!(inst.state(), RunState::Constructed);
    inst.validate(&env)?;
    assert_eq!(inst.state(), RunState::Validated);
    let mut rows = Vec::new();
    let mut sink = |x: Value| -> ironpipe::error::Result<Flow> {
        rows.push(x);
        Ok(Flow::Continue)
    };
    inst.run(&mut sink)?;
    assert_eq!(inst.state(), RunState::Completed);
    assert!(inst.run(&mut sink).is_err());
    assert_eq!(rows, ints([0, 1]));

    let mut bad = head(2).instantiate();
    assert!(bad.validate(&env).is_err());
    assert_eq!(bad.state(), RunState::Failed);
    Ok(())
}

#[test]
fn fed_instance_flushes_on_finish() -> Result<()> {
    let env = test_env();
    let mut inst = (reverse() | head(2)).prepare_fed(&env)?;
    let mut rows = Vec::new();
    let mut sink = |x: Value| -> ironpipe::error::Result<Flow> {
        rows.push(x);
        Ok(Flow::Continue)
    };
    for i in 0..4 {
        let _ = inst.feed(Value::Int(i), &mut sink)?;
    }
    inst.finish(&mut sink)?;
    assert_eq!(rows, ints([3, 2]));
    Ok(())
}

#[test]
fn child_tokens_follow_their_parent() {
    let parent = CancelToken::new();
    let child = parent.child();
    child.child().cancel();
    assert!(!child.is_cancelled());
    parent.cancel();
    assert!(child.is_cancelled());
    assert!(child.child().is_cancelled());
}

#[test]
fn cancelled_environment_stops_every_delivery() -> Result<()> {
    let (env, token) = test_env().cancellable();
    let (counted, counters) = counting();
    let p = generate(0, 0) | counted;
    let mut inst = p.prepare(&env)?;
    token.cancel();
    let mut seen = 0;
    let mut sink = |_: Value| -> ironpipe::error::Result<Flow> {
        seen += 1;
        Ok(Flow::Continue)
    };
    inst.run(&mut sink)?;
    assert_eq!(seen, 0);
    assert_eq!(counters.received.load(Ordering::SeqCst), 0);
    assert_eq!(counters.flushed.load(Ordering::SeqCst), 1);
    assert_eq!(inst.state(), RunState::Completed);
    Ok(())
}
