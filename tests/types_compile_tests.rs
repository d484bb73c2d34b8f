// ABOUTME: Trybuild runner for compile-time type safety tests.
// ABOUTME: Verifies that invalid type usage and rollout transitions fail to compile.

#[test]
fn id_types_not_interchangeable() {
    let t = trybuild::TestCases::new();
    t.compile_fail("tests/compile_fail/id_not_interchangeable.rs");
}

#[test]
fn finish_not_available_on_candidate() {
    let t = trybuild::TestCases::new();
    t.compile_fail("tests/compile_fail/finish_on_candidate.rs");
}

#[test]
fn start_not_available_before_rotation() {
    let t = trybuild::TestCases::new();
    t.compile_fail("tests/compile_fail/start_before_rotate.rs");
}
