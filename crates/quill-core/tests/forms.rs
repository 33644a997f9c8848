mod common;

use common::{eval, eval_in, eval_ok, int, interpreter, list};
use quill_core::value::RegexValue;
use quill_core::{ErrorKind, Key, QuillError, Span, Syntax, Value};

#[test]
fn conditionals_pick_the_right_branch() {
    assert_eq!(eval_ok("(IF (< 1 2) :yes :no)"), Value::Keyword("yes".into()));
    assert_eq!(eval_ok("(IF false :yes)"), Value::Nil);
    assert_eq!(eval_ok("(COND ((= 1 2) :a) ((= 1 1) :b) (true :c))"), Value::Keyword("b".into()));
    assert_eq!(eval_ok("(COND (false 1))"), Value::Nil);
    assert_eq!(eval_ok("(COND (7))"), int(7));
    assert_eq!(eval_ok("(WHEN true 1 2)"), int(2));
    assert_eq!(eval_ok("(WHEN nil 1 2)"), Value::Nil);
    assert_eq!(eval_ok("(UNLESS nil :ran)"), Value::Keyword("ran".into()));
}

#[test]
fn lowercase_form_names_resolve() {
    assert_eq!(eval_ok("(if true 1 2)"), int(1));
    assert_eq!(eval_ok("(progn 1 2 3)"), int(3));
}

#[test]
fn and_or_short_circuit() {
    assert_eq!(eval_ok("(AND 1 2 3)"), int(3));
    assert_eq!(eval_ok("(AND)"), Value::Bool(true));
    assert_eq!(eval_ok("(AND 1 nil (undefined-function))"), Value::Nil);
    assert_eq!(eval_ok("(OR nil false 7)"), int(7));
    assert_eq!(eval_ok("(OR 1 (undefined-function))"), int(1));
    assert_eq!(eval_ok("(OR)"), Value::Nil);
}

#[test]
fn quote_returns_syntax_unevaluated() {
    assert_eq!(eval_ok("(QUOTE foo)"), Value::Symbol("foo".into()));
    assert_eq!(eval_ok("'bar"), Value::Symbol("bar".into()));
    assert_eq!(eval_ok("'(1 2)"), list(vec![int(1), int(2)]));
    assert_eq!(eval_ok("()"), list(vec![]));
}

#[test]
fn while_loops_until_the_test_fails() {
    let src = r#"
        (SETQ i 0)
        (SETQ acc 0)
        (WHILE (< i 5)
          (SETQ acc (+ acc i))
          (SETQ i (+ i 1)))
        acc
    "#;
    assert_eq!(eval_ok(src), int(10));
}

#[test]
fn foreach_walks_a_list_and_returns_its_result() {
    let src = r#"
        (SETQ total 0)
        (FOREACH (x '(1 2 3) total)
          (SETQ total (+ total x)))
    "#;
    assert_eq!(eval_ok(src), int(6));
}

#[test]
fn foreach_variable_is_nil_after_the_loop() {
    assert_eq!(eval_ok("(FOREACH (x '(1 2) x))"), Value::Nil);
    assert_eq!(eval_ok("(FOREACH (c \"ab\" :done) c)"), Value::Keyword("done".into()));
}

#[test]
fn foreach_rejects_non_sequences() {
    let err = eval("(FOREACH (x 5) x)").unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::TypeException));
}

#[test]
fn let_binds_sequentially() {
    assert_eq!(
        eval_ok("(LET ((a 1) (b (+ a 1))) (LIST a b))"),
        list(vec![int(1), int(2)])
    );
    assert_eq!(eval_ok("(LET (a) a)"), Value::Nil);
}

#[test]
fn let_bindings_do_not_leak() {
    let err = eval("(LET ((scoped 1)) scoped) scoped").unwrap_err();
    assert!(matches!(err, QuillError::UnboundVariable(_)));
}

#[test]
fn dlet_destructures_lists() {
    assert_eq!(
        eval_ok("(DLET (a b &REST r) '(1 2 3 4) (LIST a b r))"),
        list(vec![int(1), int(2), list(vec![int(3), int(4)])])
    );
    assert_eq!(
        eval_ok("(DLET (a b) '(1) (LIST a b))"),
        list(vec![int(1), Value::Nil])
    );
    assert_eq!(eval_ok("(DLET (a &REST r) nil r)"), list(vec![]));
}

#[test]
fn dlet_requires_a_list() {
    let err = eval("(DLET (a) 3 a)").unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::TypeException));
}

#[test]
fn setq_writes_the_root_and_setv_the_nearest_binding() {
    let src = r#"
        (SETQ x 1)
        (LET ((x 10))
          (SETQ x 2)
          x)
    "#;
    assert_eq!(eval_ok(src), int(10));

    let src = r#"
        (SETQ x 1)
        (LET ((x 10))
          (SETQ x 2))
        x
    "#;
    assert_eq!(eval_ok(src), int(2));

    let src = r#"
        (SETQ y 1)
        (LET ((y 10))
          (SETV y 20))
        y
    "#;
    assert_eq!(eval_ok(src), int(1));

    let src = r#"
        (LET ((z 1))
          (LET ()
            (SETV z 5))
          z)
    "#;
    assert_eq!(eval_ok(src), int(5));
}

#[test]
fn malformed_forms_fail_at_compile_time() {
    for src in ["(IF)", "(QUOTE a b)", "(LET x)", "(SETQ a)", "(FOREACH x)"] {
        let err = eval(src).unwrap_err();
        assert!(
            matches!(err, QuillError::Compile(_)),
            "{} should not compile, got {}",
            src,
            err
        );
    }
}

#[test]
fn compile_errors_carry_the_offending_position() {
    let err = eval("(PROGN\n  (IF))").unwrap_err();
    let span = err.span().expect("compile error has a span");
    assert_eq!(span.line, 2);
    assert_eq!(span.col, 3);
}

#[test]
fn foreach_walks_map_values() {
    let rt = interpreter();
    let scores = [("ann", 3), ("bob", 4), ("cy", 5)]
        .into_iter()
        .map(|(name, n)| {
            let key = Key::from_value(&Value::Keyword(name.into())).unwrap();
            (key, int(n))
        })
        .collect();
    rt.root().define("scores", Value::Map(scores)).unwrap();
    let src = r#"
        (SETQ total 0)
        (FOREACH (s scores total)
          (SETQ total (+ total s)))
    "#;
    assert_eq!(eval_in(&rt, src).unwrap(), int(12));
    assert_eq!(Key::from_value(&Value::Int(1)), Some(Key::Number(1)));
    assert_eq!(Key::from_value(&Value::Nil), None);
}

#[test]
fn regex_leaves_evaluate_to_themselves() {
    let rt = interpreter();
    let regex = Value::Regex(RegexValue::new("^a+b$").unwrap());
    let value = rt.eval(&Syntax::leaf(regex.clone(), Span::default())).unwrap();
    assert_eq!(value, regex);
    let Value::Regex(compiled) = value else {
        panic!("expected a regex value");
    };
    assert!(compiled.regex.is_match("aab"));
    assert!(!compiled.regex.is_match("ba"));
    assert!(RegexValue::new("(").is_err());
}
