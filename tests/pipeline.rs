// tests/pipeline.rs
use anyhow::Result;
use ironpipe::prelude::*;
use ironpipe::testing::*;

fn session() -> Session {
    Session::new(SessionConfig::default())
}

#[test]
fn generate_counts_from_start() -> Result<()> {
    let s = session();
    assert_collections_equal(&s.gather(&generate(5, 3))?, &ints(3..8));
    assert_collections_equal(&s.gather(&generate(1, -4))?, &ints([-4]));
    Ok(())
}

#[test]
fn unbounded_source_is_truncated_by_head() -> Result<()> {
    let s = session();
    let out = s.gather(&(generate(0, 0) | head(4)))?;
    assert_collections_equal(&out, &ints(0..4));
    Ok(())
}

#[test]
fn padded_output() -> Result<()> {
    let s = session();
    let out = s.gather(&generate_padded(3, 8, 2))?;
    assert_eq!(out, vec![Value::from("08"), Value::from("09"), Value::from("10")]);
    Ok(())
}

#[test]
fn padding_conflicts_are_fatal() {
    let s = session();
    let msg = |p: Pipeline| s.gather(&p).unwrap_err().to_string();
    assert_eq!(
        msg(generate_padded(0, 0, 3)),
        "Padding 3 incompatible with unbounded output"
    );
    assert_eq!(msg(generate_padded(5, -1, 3)), "Padding incompatible with start < 0");
    assert_eq!(msg(generate_padded(11, 0, 1)), "Padding 1 too small");
    assert_eq!(msg(generate(-1, 0)), "count must be non-negative");
}

#[test]
fn non_source_cannot_lead() {
    let s = session();
    let err = s.gather(&(map(|x| Ok(x.clone())) | head(1))).unwrap_err();
    assert!(matches!(err, CommandError::NotFirst { .. }));
    assert_eq!(err.to_string(), "map cannot be the first operator in a pipeline");
}

#[test]
fn display_lists_stages() {
    let p = generate(3, 0) | map(|x| x.neg()) | sort();
    assert_eq!(p.to_string(), "gen | map | sort");
    assert_eq!(p.len(), 3);
}

#[test]
fn element_faults_flow_as_data() -> Result<()> {
    let s = session();
    let p = generate(4, 0) | map(|x| Value::Int(6).floor_div(x));
    let out = s.gather(&p)?;
    assert_eq!(out.len(), 4);
    assert_error_containing(&out, "division by zero");
    assert_eq!(&out[1..], &ints([6, 3, 2])[..]);
    Ok(())
}

#[test]
fn head_and_tail_variants() -> Result<()> {
    let s = session();
    assert_collections_equal(&s.gather(&(generate(5, 0) | head(-2)))?, &ints([2, 3, 4]));
    assert_collections_equal(&s.gather(&(generate(5, 0) | tail(2)))?, &ints([3, 4]));
    assert_collections_equal(&s.gather(&(generate(5, 0) | tail(-2)))?, &ints([0, 1, 2]));
    assert_eq!(
        s.gather(&(generate(5, 0) | head(0))).unwrap_err().to_string(),
        "head: n must not be 0"
    );
    Ok(())
}

#[test]
fn select_reverse_sort_unique() -> Result<()> {
    let s = session();
    let odd = select(|x| Ok(x.as_int().is_some_and(|n| n % 2 == 1)));
    assert_collections_equal(&s.gather(&(generate(6, 0) | odd | reverse()))?, &ints([5, 3, 1]));

    let mixed = values(ints([3, 1, 3, 2, 1, 1]));
    assert_collections_equal(&s.gather(&(mixed.clone() | sort()))?, &ints([1, 1, 1, 2, 3, 3]));
    assert_collections_equal(&s.gather(&(mixed.clone() | unique()))?, &ints([3, 1, 2]));
    assert_collections_equal(
        &s.gather(&(mixed | unique_consecutive()))?,
        &ints([3, 1, 3, 2, 1]),
    );
    Ok(())
}

#[test]
fn sort_by_key_and_incomparable_kinds() -> Result<()> {
    let s = session();
    let p = generate(5, 0) | sort_by(|x| x.neg());
    assert_collections_equal(&s.gather(&p)?, &ints([4, 3, 2, 1, 0]));

    let bad = values([Value::Int(1), Value::from("a")]) | sort();
    assert!(s.gather(&bad).unwrap_err().to_string().contains("not supported"));
    Ok(())
}

#[test]
fn sort_by_key_faults_pass_through() -> Result<()> {
    let s = session();
    let p = values([Value::Int(3), Value::from("x"), Value::Int(1)]) | sort_by(|x| x.neg());
    let out = s.gather(&p)?;
    assert_eq!(out.len(), 3);
    assert!(out[0].is_error());
    assert_eq!(out[1..].to_vec(), ints([3, 1]));
    Ok(())
}

#[test]
fn unique_reports_unhashable_elements() -> Result<()> {
    let s = session();
    let p = values([Value::Int(1), Value::list(ints([1, 2])), Value::Int(1)]) | unique();
    let out = s.gather(&p)?;
    assert_eq!(out.len(), 2);
    assert_eq!(out[0], Value::Int(1));
    assert_error_containing(&out, "is not hashable");
    Ok(())
}

#[test]
fn expand_and_squish() -> Result<()> {
    let s = session();
    let rows = values([tuple([1, 2, 3])]);
    assert_collections_equal(&s.gather(&(rows.clone() | expand(None)))?, &ints([1, 2, 3]));
    assert_eq!(s.gather(&(rows | squish(r_plus())))?, ints([6]));

    let nested = values([Value::tuple([Value::from("k"), Value::list(ints([7, 8]))])]);
    assert_eq!(
        s.gather(&(nested | expand(Some(1))))?,
        vec![
            Value::tuple([Value::from("k"), Value::Int(7)]),
            Value::tuple([Value::from("k"), Value::Int(8)]),
        ]
    );
    Ok(())
}

#[test]
fn pipelines_rerun_with_fresh_state() -> Result<()> {
    let s = session();
    let p = generate(3, 0) | reduce(vec![Slot::from(r_plus())]);
    assert_eq!(s.gather(&p)?, ints([3]));
    assert_eq!(s.gather(&p)?, ints([3]));
    Ok(())
}

#[test]
fn deferred_and_variable_parameters() -> Result<()> {
    let s = session();
    s.set_var("N", 4);
    let p = generate(Param::var("N"), Param::deferred(|env| {
        env.lookup("N").map_or(Ok(Value::Int(0)), |n| n.mul(&Value::Int(10)))
    }));
    assert_collections_equal(&s.gather(&p)?, &ints(40..44));

    s.set_var("N", "many");
    assert_eq!(
        s.gather(&generate(Param::var("N"), 0)).unwrap_err().to_string(),
        "count cannot be converted to int"
    );
    Ok(())
}
