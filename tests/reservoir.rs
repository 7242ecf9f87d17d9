// tests/reservoir.rs
use anyhow::Result;
use ironpipe::prelude::*;
use ironpipe::testing::*;

fn session() -> Session {
    Session::new(SessionConfig::default())
}

fn is_even() -> impl Fn(&Value) -> std::result::Result<bool, ErrorValue> + Send + Sync + 'static {
    |x| Ok(x.as_int().is_some_and(|n| n % 2 == 0))
}

#[test]
fn store_then_load() -> Result<()> {
    let s = session();
    assert!(s.gather(&(generate(3, 0) | store("r")))?.is_empty());
    assert_collections_equal(&s.gather(&load("r"))?, &ints([0, 1, 2]));

    s.gather(&(generate(2, 10) | store("r")))?;
    assert_collections_equal(&s.gather(&load("r"))?, &ints([10, 11]));

    s.gather(&(generate(1, 20) | store_append("r")))?;
    assert_collections_equal(&s.gather(&load("r"))?, &ints([10, 11, 20]));
    Ok(())
}

#[test]
fn every_handle_shares_one_buffer() -> Result<()> {
    let s = session();
    s.reservoir("shared")?.append(Value::Int(1));
    s.reservoir("shared")?.extend(ints([2, 3]));
    assert_collections_equal(&s.gather(&load("shared"))?, &ints([1, 2, 3]));
    s.set_var("plain", 1);
    assert!(matches!(s.reservoir("plain"), Err(CommandError::NotAReservoir(_))));
    Ok(())
}

#[test]
fn loading_an_unused_name_is_empty() -> Result<()> {
    let s = session();
    assert!(s.gather(&load("fresh"))?.is_empty());
    Ok(())
}

#[test]
fn names_must_be_identifiers_bound_to_reservoirs() {
    let s = session();
    assert_eq!(
        s.gather(&(generate(1, 0) | store("/tmp/out.txt"))).unwrap_err().to_string(),
        "/tmp/out.txt is not an identifier"
    );
    s.set_var("v", 1);
    let err = s.gather(&load("v")).unwrap_err();
    assert!(matches!(err, CommandError::NotAReservoir(_)));
    assert_eq!(err.to_string(), "v is not a Reservoir");
}

#[test]
fn reservoir_names_can_be_variables() -> Result<()> {
    let s = session();
    s.set_var("target", "acc");
    s.gather(&(generate(2, 0) | store(Param::var("target"))))?;
    assert_eq!(s.reservoir("acc")?.snapshot(), ints([0, 1]));
    Ok(())
}

#[test]
fn errors_are_stored_too() -> Result<()> {
    let s = session();
    s.gather(&(values([Value::Int(1), Value::error("bad row")]) | store("mixed")))?;
    let back = s.gather(&load("mixed"))?;
    assert_eq!(back.len(), 2);
    assert_error_containing(&back, "bad row");
    Ok(())
}

#[test]
fn tee_copies_into_every_branch() -> Result<()> {
    let s = session();
    let p = generate(5, 0) | tee(vec![select(is_even()) | store("evens"), store("all")]);
    assert_collections_equal(&s.gather(&p)?, &ints(0..5));
    assert_eq!(s.reservoir("evens")?.snapshot(), ints([0, 2, 4]));
    assert_eq!(s.reservoir("all")?.snapshot(), ints(0..5));

    assert_eq!(
        s.gather(&(generate(1, 0) | tee(vec![]))).unwrap_err().to_string(),
        "No pipelines"
    );
    Ok(())
}

#[test]
fn ifthen_and_ifelse_route_matches() -> Result<()> {
    let s = session();
    let out = s.gather(&(generate(5, 0) | ifthen(is_even(), store("then"))))?;
    assert_collections_equal(&out, &ints(0..5));
    assert_eq!(s.reservoir("then")?.snapshot(), ints([0, 2, 4]));

    let out = s.gather(&(generate(5, 0) | ifelse(is_even(), store("else"))))?;
    assert_collections_equal(&out, &ints([1, 3]));
    assert_eq!(s.reservoir("else")?.snapshot(), ints([0, 2, 4]));
    Ok(())
}

#[test]
fn durable_reservoirs_survive_the_session() -> Result<()> {
    let ts = TestSession::new()?;
    let dir = ts.reservoir_dir();
    ts.gather(&(generate(3, 5) | store("kept")))?;
    let tmp = ts.close()?;
    assert!(dir.join("kept.jsonl").is_file());

    let reopened = Session::new(SessionConfig::default().with_reservoir_dir(&dir));
    assert_collections_equal(&reopened.gather(&load("kept"))?, &ints([5, 6, 7]));
    drop(tmp);
    Ok(())
}
