mod common;

use common::{eval, eval_in, eval_ok, int, interpreter, list};
use quill_core::{ErrorKind, QuillError, Value};

#[test]
fn closures_capture_their_defining_scope() {
    let src = r#"
        (SETQ make (LET ((x 1)) (LAMBDA () x)))
        (FUNCALL make)
    "#;
    assert_eq!(eval_ok(src), int(1));

    let src = r#"
        (SETQ make (LET ((x 2)) (LAMBDA () x)))
        (make)
    "#;
    assert_eq!(eval_ok(src), int(2));
}

#[test]
fn closures_keep_private_state() {
    let src = r#"
        (DEFUN make-counter ()
          (LET ((n 0))
            (LAMBDA () (SETV n (+ n 1)))))
        (SETQ c (make-counter))
        (c)
        (c)
        (c)
    "#;
    assert_eq!(eval_ok(src), int(3));
}

#[test]
fn defun_and_recursion() {
    let src = r#"
        (DEFUN fact (n)
          (IF (<= n 1)
              1
              (* n (fact (- n 1)))))
        (fact 10)
    "#;
    assert_eq!(eval_ok(src), int(3628800));
}

#[test]
fn redefinition_is_seen_by_existing_callers() {
    let src = r#"
        (DEFUN inner () 1)
        (DEFUN outer () (inner))
        (DEFUN inner () 2)
        (outer)
    "#;
    assert_eq!(eval_ok(src), int(2));
}

#[test]
fn optional_arguments_take_defaults() {
    let rt = interpreter();
    eval_in(&rt, "(DEFUN opt (a &OPTIONAL (b 5) c) (LIST a b c))").unwrap();
    assert_eq!(
        eval_in(&rt, "(opt 1)").unwrap(),
        list(vec![int(1), int(5), Value::Nil])
    );
    assert_eq!(
        eval_in(&rt, "(opt 1 2 3)").unwrap(),
        list(vec![int(1), int(2), int(3)])
    );
}

#[test]
fn defaults_see_earlier_parameters() {
    let src = r#"
        (DEFUN doubled (a &OPTIONAL (b (* a 2))) b)
        (doubled 4)
    "#;
    assert_eq!(eval_ok(src), int(8));
}

#[test]
fn supplied_p_reports_whether_an_argument_was_given() {
    let rt = interpreter();
    eval_in(&rt, "(DEFUN sp (&OPTIONAL (b 5 b-p)) (LIST b b-p))").unwrap();
    assert_eq!(
        eval_in(&rt, "(sp)").unwrap(),
        list(vec![int(5), Value::Bool(false)])
    );
    assert_eq!(
        eval_in(&rt, "(sp 5)").unwrap(),
        list(vec![int(5), Value::Bool(true)])
    );
}

#[test]
fn keyword_arguments() {
    let rt = interpreter();
    eval_in(&rt, "(DEFUN kw (a &KEY (k 10) m) (LIST a k m))").unwrap();
    assert_eq!(
        eval_in(&rt, "(kw 1 :m 3)").unwrap(),
        list(vec![int(1), int(10), int(3)])
    );
    assert_eq!(
        eval_in(&rt, "(kw 1 :m 3 :k 4)").unwrap(),
        list(vec![int(1), int(4), int(3)])
    );

    let err = eval_in(&rt, "(kw 1 :z 3)").unwrap_err();
    assert!(matches!(err, QuillError::Binding(_)), "got {}", err);
    assert!(err.message().contains("unknown keyword argument"));

    let err = eval_in(&rt, "(kw 1 :m)").unwrap_err();
    assert!(matches!(err, QuillError::Binding(_)), "got {}", err);

    let err = eval_in(&rt, "(kw 1 :m 1 :m 2)").unwrap_err();
    assert!(err.message().contains("supplied twice"));
}

#[test]
fn other_keys_can_be_allowed() {
    let src = r#"
        (DEFUN loose (&KEY a &ALLOW-OTHER-KEYS) a)
        (loose :b 2 :a 1)
    "#;
    assert_eq!(eval_ok(src), int(1));
}

#[test]
fn rest_collects_the_remaining_arguments() {
    let rt = interpreter();
    eval_in(&rt, "(DEFUN r (a &REST more) more)").unwrap();
    assert_eq!(eval_in(&rt, "(r 1 2 3)").unwrap(), list(vec![int(2), int(3)]));
    assert_eq!(eval_in(&rt, "(r 1)").unwrap(), list(vec![]));
}

#[test]
fn required_after_optional_binds_from_the_end() {
    let rt = interpreter();
    eval_in(&rt, "(DEFUN mao (a &OPTIONAL b &REQUIRED c) (LIST a b c))").unwrap();
    assert_eq!(
        eval_in(&rt, "(mao 1 2)").unwrap(),
        list(vec![int(1), Value::Nil, int(2)])
    );
    assert_eq!(
        eval_in(&rt, "(mao 1 2 3)").unwrap(),
        list(vec![int(1), int(2), int(3)])
    );
}

#[test]
fn arity_is_checked() {
    let rt = interpreter();
    eval_in(&rt, "(DEFUN square (x) (* x x))").unwrap();
    assert_eq!(eval_in(&rt, "(square 7)").unwrap(), int(49));
    for src in ["(square)", "(square 1 2)"] {
        let err = eval_in(&rt, src).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::ArityException), "{}", src);
    }
}

#[test]
fn lazy_arguments_are_evaluated_at_most_once() {
    let rt = interpreter();
    let src = r#"
        (SETQ count 0)
        (DEFUN bump () (SETQ count (+ count 1)) count)
        (DEFUN twice (&LAZY x) (+ x x))
        (DEFUN ignore (&LAZY x) :ignored)
    "#;
    eval_in(&rt, src).unwrap();
    assert_eq!(eval_in(&rt, "(twice (bump))").unwrap(), int(2));
    assert_eq!(eval_in(&rt, "count").unwrap(), int(1));
    assert_eq!(
        eval_in(&rt, "(ignore (bump))").unwrap(),
        Value::Keyword("ignored".into())
    );
    assert_eq!(eval_in(&rt, "count").unwrap(), int(1));
}

#[test]
fn return_leaves_the_function_early() {
    let rt = interpreter();
    eval_in(
        &rt,
        "(DEFUN sign (x) (WHEN (> x 0) (RETURN :positive)) :other)",
    )
    .unwrap();
    assert_eq!(eval_in(&rt, "(sign 1)").unwrap(), Value::Keyword("positive".into()));
    assert_eq!(eval_in(&rt, "(sign -1)").unwrap(), Value::Keyword("other".into()));
    assert_eq!(eval_in(&rt, "(RETURN 9)").unwrap(), int(9));
}

#[test]
fn return_only_leaves_the_innermost_function() {
    let src = r#"
        (DEFUN inner () (RETURN 1) 2)
        (DEFUN outer () (+ (inner) 10))
        (outer)
    "#;
    assert_eq!(eval_ok(src), int(11));
}

#[test]
fn pipe_threads_through_the_first_argument() {
    assert_eq!(eval_ok("(-> 5 (+ 1) (* 2))"), int(12));
    assert_eq!(eval_ok("(-> 5 (- 1))"), int(4));
    let src = r#"
        (DEFUN square (x) (* x x))
        (-> 4 square)
    "#;
    assert_eq!(eval_ok(src), int(16));
}

#[test]
fn pipe_honours_the_declared_position() {
    let src = r#"
        (DEFUN sub-from (a &PIPE b) (- a b))
        (-> 3 (sub-from 10))
    "#;
    assert_eq!(eval_ok(src), int(7));
}

#[test]
fn function_values_can_be_passed_around() {
    let src = r#"
        (DEFUN square (x) (* x x))
        (FUNCALL (FUNCTION square) 3)
    "#;
    assert_eq!(eval_ok(src), int(9));
    assert_eq!(eval_ok("(APPLY (FUNCTION +) 1 '(2 3))"), int(6));
    assert_eq!(eval_ok("(APPLY (FUNCTION LIST) nil)"), list(vec![]));
    assert_eq!(eval_ok("(FUNCALL (LAMBDA (a b) (- a b)) 10 4)"), int(6));
}

#[test]
fn apply_needs_a_trailing_list() {
    let err = eval("(APPLY (FUNCTION +) 1 2)").unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::TypeException));
}

#[test]
fn calling_unknown_names_fails() {
    let err = eval("(no-such-thing 1)").unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::UndefinedFunctionException));
    let err = eval("(SETQ five 5) (five)").unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::TypeException));
}

#[test]
fn bad_parameter_lists_do_not_compile() {
    for src in [
        "(LAMBDA (a a) a)",
        "(LAMBDA (&REST a &REST b) a)",
        "(LAMBDA (&FROB a) a)",
        "(LAMBDA (&PIPE) 1)",
    ] {
        let err = eval(src).unwrap_err();
        assert!(matches!(err, QuillError::Compile(_)), "{} gave {}", src, err);
    }
}
