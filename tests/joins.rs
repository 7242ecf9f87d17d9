// tests/joins.rs
use anyhow::Result;
use ironpipe::prelude::*;
use ironpipe::testing::*;

fn session() -> Session {
    Session::new(SessionConfig::default())
}

fn left() -> Pipeline {
    values([tuple([0, 0]), tuple([1, -1]), tuple([2, -2]), tuple([3, -3])])
}

fn right() -> Pipeline {
    values([tuple([0, 0]), tuple([1, 100]), tuple([2, 200])])
}

#[test]
fn inner_join() -> Result<()> {
    let s = session();
    let out = s.gather(&(left() | join(right())))?;
    assert_collections_equal(&out, &[tuple([0, 0, 0]), tuple([1, -1, 100]), tuple([2, -2, 200])]);
    Ok(())
}

#[test]
fn left_outer_join_keeps_unmatched_rows_unpadded() -> Result<()> {
    let s = session();
    let out = s.gather(&(left() | join_keep(right())))?;
    assert_collections_equal(
        &out,
        &[tuple([0, 0, 0]), tuple([1, -1, 100]), tuple([2, -2, 200]), tuple([3, -3])],
    );
    Ok(())
}

#[test]
fn duplicate_right_keys_cross() -> Result<()> {
    let s = session();
    let r = values([tuple([1, 10]), tuple([1, 11])]);
    let out = s.gather(&(values([tuple([1, 5]), tuple([1, 6])]) | join(r)))?;
    assert_collections_equal(
        &out,
        &[tuple([1, 5, 10]), tuple([1, 5, 11]), tuple([1, 6, 10]), tuple([1, 6, 11])],
    );
    Ok(())
}

#[test]
fn wider_keys() -> Result<()> {
    let s = session();
    let opts = JoinOptions {
        key_width: 2,
        ..JoinOptions::default()
    };
    let l = values([tuple([1, 2, 3]), tuple([1, 9, 4])]);
    let r = values([tuple([1, 2, 30])]);
    assert_eq!(s.gather(&(l | join_with(r, opts)))?, vec![tuple([1, 2, 3, 30])]);
    Ok(())
}

#[test]
fn right_side_can_be_a_full_pipeline() -> Result<()> {
    let s = session();
    let squares = generate(4, 0) | map(|x| Ok(Value::tuple([x.clone(), x.mul(x)?])));
    let out = s.gather(&(generate(6, 2) | join(squares)))?;
    assert_collections_equal(&out, &[tuple([2, 4]), tuple([3, 9])]);
    Ok(())
}

#[test]
fn unhashable_keys_are_fatal() {
    let s = session();
    let bad_right = values([Value::tuple([Value::list(ints([1])), Value::Int(0)])]);
    let err = s.gather(&(left() | join(bad_right))).unwrap_err();
    assert!(matches!(err, CommandError::Unhashable(_)));

    let bad_left = values([Value::tuple([Value::list(ints([1])), Value::Int(0)])]);
    let err = s.gather(&(bad_left | join(right()))).unwrap_err();
    assert!(err.to_string().ends_with("is not hashable"));
}

#[test]
fn errors_pass_through_both_sides() -> Result<()> {
    let s = session();
    let l = values([tuple([1, 1]), Value::error("left fault")]);
    let r = values([tuple([1, 2]), Value::error("right fault")]);
    let out = s.gather(&(l | join(r)))?;
    assert_eq!(out.len(), 3);
    assert_eq!(out[0], tuple([1, 1, 2]));
    assert_error_containing(&out, "left fault");
    assert_error_containing(&out, "right fault");
    Ok(())
}
