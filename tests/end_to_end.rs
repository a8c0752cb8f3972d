//! End-to-end scenarios: feed source text to the public `interpret` API and
//! assert on exactly what landed in the captured writer, byte for byte.

use loxide::InterpretError;

fn run(source: &str) -> (Result<(), InterpretError>, String) {
  let mut out = Vec::new();
  let result = loxide::interpret(source, &mut out);
  (result, String::from_utf8(out).expect("print output is always valid UTF-8"))
}

#[test]
fn prints_arithmetic_result() {
  let (result, out) = run("print 2 + 2;");
  assert!(result.is_ok());
  assert_eq!(out, "4\n");
}

#[test]
fn concatenates_strings() {
  let (result, out) = run(r#"print "hi" + " " + "there";"#);
  assert!(result.is_ok());
  assert_eq!(out, "hi there\n");
}

#[test]
fn nested_block_scopes_see_enclosing_locals() {
  let (result, out) = run("var a = 0; var b = 1; { var c = 2; print a; print b; print c; }");
  assert!(result.is_ok());
  assert_eq!(out, "0\n1\n2\n");
}

#[test]
fn recursive_function_call() {
  let (result, out) = run("fun count(n) { if (n > 1) count(n - 1); print n; } count(3);");
  assert!(result.is_ok());
  assert_eq!(out, "1\n2\n3\n");
}

#[test]
fn closure_keeps_capturing_after_enclosing_function_returns() {
  let src = "fun make() { var x = 0; fun inc() { x = x + 1; return x; } return inc; } \
             var c = make(); print c(); print c(); print c();";
  let (result, out) = run(src);
  assert!(result.is_ok());
  assert_eq!(out, "1\n2\n3\n");
}

#[test]
fn super_call_reaches_overridden_base_method() {
  let src = "class A { greet() { print \"A\"; } } \
             class B < A { greet() { super.greet(); print \"B\"; } } \
             B().greet();";
  let (result, out) = run(src);
  assert!(result.is_ok());
  assert_eq!(out, "A\nB\n");
}

#[test]
fn adding_number_and_string_is_a_runtime_error() {
  let (result, out) = run(r#"1 + "x";"#);
  assert!(matches!(result, Err(InterpretError::Runtime(_))));
  assert_eq!(out, "");
}

#[test]
fn reading_a_local_in_its_own_initializer_is_a_compile_error() {
  let (result, _) = run("{ var a = a; }");
  assert!(matches!(result, Err(InterpretError::Compile)));
}

#[test]
fn the_same_pattern_at_global_scope_silently_yields_nil() {
  let (result, out) = run("var a = a; print a;");
  assert!(result.is_ok());
  assert_eq!(out, "nil\n");
}
