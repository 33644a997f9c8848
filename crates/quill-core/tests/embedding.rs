mod common;

use std::io::Write;
use std::sync::Arc;
use std::thread;

use common::{eval_in, int, interpreter, list, read_one, strict_options};
use quill_core::{
    Backtrace, BuiltinKind, EvalOptions, HostObject, Interpreter, MissingVariable, QuillError,
    Value,
};

#[derive(Debug)]
struct Countdown(i32);

impl HostObject for Countdown {
    fn type_name(&self) -> &str {
        "countdown"
    }

    fn iter(&self) -> Option<Box<dyn Iterator<Item = Value> + '_>> {
        Some(Box::new((1..=self.0).rev().map(Value::Int)))
    }
}

#[test]
fn host_natives_are_callable_by_name() {
    let rt = interpreter();
    rt.register_native(
        "host-add",
        &["a", "&OPTIONAL", "b"],
        "Adds b (default 100) to a.",
        |_, _, args| {
            let a = args[0].as_i64().unwrap_or(0);
            let b = if args[1].is_nil() { 100 } else { args[1].as_i64().unwrap_or(0) };
            Ok(Value::Long(a + b))
        },
    )
    .unwrap();
    assert_eq!(eval_in(&rt, "(host-add 1)").unwrap(), Value::Long(101));
    assert_eq!(eval_in(&rt, "(HOST-ADD 1 2)").unwrap(), Value::Long(3));
    assert_eq!(
        rt.documentation("host-add").as_deref(),
        Some("Adds b (default 100) to a.")
    );
}

#[test]
fn invalid_native_signatures_are_rejected() {
    let rt = interpreter();
    let result = rt.register_native("broken", &["&REST", "a", "&REST", "b"], "", |_, _, _| {
        Ok(Value::Nil)
    });
    assert!(result.is_err());
    assert!(rt.lookup("broken").is_none());
}

#[test]
fn host_can_call_language_functions() {
    let rt = interpreter();
    let Value::Function(triple) = eval_in(&rt, "(LAMBDA (x) (* x 3))").unwrap() else {
        panic!("LAMBDA did not produce a function");
    };
    let mut bt = Backtrace::new();
    assert_eq!(rt.call(&mut bt, &triple, vec![int(5)]).unwrap(), int(15));
    assert!(bt.is_empty());

    let err = rt.call(&mut bt, &triple, vec![]).unwrap_err();
    assert!(matches!(err, QuillError::Binding(_)));
}

#[test]
fn defun_docstrings_are_recorded() {
    let rt = interpreter();
    eval_in(&rt, r#"(DEFUN documented (x) "Adds one." (+ x 1))"#).unwrap();
    assert_eq!(rt.documentation("DOCUMENTED").as_deref(), Some("Adds one."));
    assert_eq!(eval_in(&rt, "(documented 1)").unwrap(), int(2));
    assert!(rt.function_names().contains(&"DOCUMENTED".to_string()));
    assert!(rt.documentation("if").is_some());
    assert!(rt.documentation("no-such-thing").is_none());

    eval_in(&rt, r#"(DEFUN only-string () "just a value")"#).unwrap();
    assert_eq!(rt.documentation("only-string"), None);
    assert_eq!(eval_in(&rt, "(only-string)").unwrap(), Value::string("just a value"));
}

#[test]
fn defun_can_replace_builtin_functions() {
    let rt = interpreter();
    eval_in(&rt, "(DEFUN not (x) :shadowed)").unwrap();
    assert_eq!(eval_in(&rt, "(NOT true)").unwrap(), Value::Keyword("shadowed".into()));
    assert!(matches!(
        rt.lookup("not").map(|b| b.kind),
        Some(BuiltinKind::Function(_))
    ));
}

#[test]
fn host_objects_can_be_iterated() {
    let rt = interpreter();
    rt.root()
        .define("countdown", Value::Object(Arc::new(Countdown(3))))
        .unwrap();
    let src = r#"
        (SETQ total 0)
        (FOREACH (n countdown total)
          (SETQ total (+ total n)))
    "#;
    assert_eq!(eval_in(&rt, src).unwrap(), int(6));
}

#[test]
fn lenient_policy_reads_unknown_variables_as_nil() {
    let rt = Interpreter::new(strict_options().with_missing_variable(MissingVariable::Nil));
    assert_eq!(eval_in(&rt, "never-bound").unwrap(), Value::Nil);
    assert_eq!(eval_in(&rt, "(LIST never-bound)").unwrap(), list(vec![Value::Nil]));
    assert!(eval_in(&rt, "(never-defined)").is_err());
}

#[test]
fn options_load_from_a_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "missing-variable = \"nil\"").unwrap();
    writeln!(file, "max-depth = 32").unwrap();
    let options = EvalOptions::load(file.path()).unwrap();
    assert_eq!(options.missing_variable, MissingVariable::Nil);
    assert_eq!(options.max_depth, 32);

    let rt = Interpreter::new(options);
    assert_eq!(eval_in(&rt, "unknown").unwrap(), Value::Nil);
}

#[test]
fn bad_option_files_are_rejected() {
    assert!(EvalOptions::from_toml_str("max-depth = 0").is_err());
    assert!(EvalOptions::from_toml_str("colour = \"blue\"").is_err());
    assert!(EvalOptions::from_toml_str("missing-variable = \"maybe\"").is_err());
    assert!(EvalOptions::load(std::path::Path::new("/definitely/not/here.toml")).is_err());
}

#[test]
fn threads_share_definitions_but_not_backtraces() {
    let rt = interpreter();
    eval_in(
        &rt,
        "(DEFUN fact (n) (IF (<= n 1) 1 (* n (fact (- n 1)))))",
    )
    .unwrap();

    let handles: Vec<_> = (1..=4)
        .map(|n| {
            let rt = rt.clone();
            thread::spawn(move || {
                let form = read_one(&format!("(fact {})", n + 4));
                rt.eval(&form)
            })
        })
        .collect();
    let results: Vec<Value> = handles
        .into_iter()
        .map(|h| h.join().expect("worker panicked").expect("evaluation failed"))
        .collect();
    assert_eq!(results, vec![int(120), int(720), int(5040), int(40320)]);
}

#[test]
fn definitions_from_one_clone_are_visible_in_another() {
    let rt = interpreter();
    let other = rt.clone();
    eval_in(&rt, "(SETQ shared 41) (DEFUN next () (+ shared 1))").unwrap();
    assert_eq!(eval_in(&other, "(next)").unwrap(), int(42));
}
