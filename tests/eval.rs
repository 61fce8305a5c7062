use lisp::{Kind, LispError, Machine, MachineConfig, Value};

fn setup() -> (Machine, Value) {
    let mut m = Machine::new(MachineConfig::default()).unwrap();
    let env = m.make_core_env().unwrap();
    (m, env)
}

fn run(m: &mut Machine, env: Value, src: &str) -> String {
    match m.eval_str(src, env) {
        Ok(val) => m.render(val),
        Err(e) => panic!("{} failed: {}", src, e),
    }
}

#[test]
fn quote_returns_its_argument_unevaluated() {
    let (mut m, env) = setup();
    assert_eq!(run(&mut m, env, "(quote (a b))"), "(a b)");
    assert_eq!(run(&mut m, env, "'(undefined-fn x)"), "(undefined-fn x)");
}

#[test]
fn if_picks_a_branch() {
    let (mut m, env) = setup();
    assert_eq!(run(&mut m, env, "(if nil 'one 'two)"), "two");
    assert_eq!(run(&mut m, env, "(if t 'one 'two)"), "one");
    assert_eq!(run(&mut m, env, "(if t 'one)"), "one");
    assert_eq!(run(&mut m, env, "(if nil 'one)"), "nil");
    // the branch not taken is never evaluated
    assert_eq!(run(&mut m, env, "(if t 'one (no-such-function))"), "one");
}

#[test]
fn closures_bind_their_arguments() {
    let (mut m, env) = setup();
    assert_eq!(run(&mut m, env, "((lambda (x) x) 'five)"), "five");
    assert_eq!(run(&mut m, env, "((lambda (x y) (cons y x)) 'one 'two)"), "(two . one)");
    assert_eq!(run(&mut m, env, "((lambda args args) 'a 'b 'c)"), "(a b c)");
    assert_eq!(run(&mut m, env, "((lambda (a . rest) rest) 'a 'b 'c)"), "(b c)");
    assert_eq!(run(&mut m, env, "((lambda ((a b) c) (cons b c)) '(x y) 'z)"), "(y . z)");
    assert_eq!(run(&mut m, env, "((lambda ()))"), "nil");
}

#[test]
fn closures_capture_their_defining_environment() {
    let (mut m, env) = setup();
    let src = "(def make-const (lambda (v) (lambda () v)))
               (def k (make-const 'kept))
               (def v 'global)
               (k)";
    assert_eq!(run(&mut m, env, src), "kept");
}

#[test]
fn def_inside_a_closure_stays_local() {
    let (mut m, env) = setup();
    let src = "(def x 'outer)
               ((lambda () (def x 'inner) x))";
    assert_eq!(run(&mut m, env, src), "inner");
    assert_eq!(run(&mut m, env, "x"), "outer");
}

#[test]
fn argument_count_mismatches_fail() {
    let (mut m, env) = setup();
    assert!(matches!(
        m.eval_str("((lambda (x y) x) 'a)", env),
        Err(LispError::Bind(_))
    ));
    assert!(matches!(
        m.eval_str("((lambda (x) x) 'a 'b)", env),
        Err(LispError::Bind(_))
    ));
}

#[test]
fn macros_receive_unevaluated_arguments() {
    let (mut m, env) = setup();
    let src = "(def my-quote (syntax (x) (cons 'quote (cons x nil))))
               (my-quote (never called))";
    assert_eq!(run(&mut m, env, src), "(never called)");
}

#[test]
fn macro_expansion_is_evaluated_in_the_caller_environment() {
    let (mut m, env) = setup();
    let src = "(def swap (syntax (a b) `(cons ,b ,a)))
               ((lambda (p q) (swap p q)) 'first 'second)";
    assert_eq!(run(&mut m, env, src), "(second . first)");
}

#[test]
fn macros_can_define_things() {
    let (mut m, env) = setup();
    let src = "(def defn (syntax (name params . body)
                 `(def ,name (lambda ,params ,@body))))
               (defn pair-up (a b) (cons a b))
               (pair-up 'x 'y)";
    assert_eq!(run(&mut m, env, src), "(x . y)");
}

#[test]
fn gensyms_make_fresh_temporaries() {
    let (mut m, env) = setup();
    let src = "(def g1 (gensym)) (def g2 (gensym)) (cons (eq g1 g2) (eq g1 g1))";
    assert_eq!(run(&mut m, env, src), "(nil . t)");
}

#[test]
fn backquote_splices_and_substitutes() {
    let (mut m, env) = setup();
    let src = "(def two 'b)
               (def rest '(c d))
               `(a ,two ,@rest)";
    assert_eq!(run(&mut m, env, src), "(a b c d)");
    assert_eq!(run(&mut m, env, "`(x (y ,two) . z)"), "(x (y b) . z)");
    assert_eq!(run(&mut m, env, "(equal `(p (q r)) '(p (q r)))"), "t");
}

#[test]
fn equal_is_structural_and_eq_is_identity() {
    let (mut m, env) = setup();
    assert_eq!(run(&mut m, env, "(equal (cons 'a 'b) (cons 'a 'b))"), "t");
    assert_eq!(run(&mut m, env, "(eq (cons 'a 'b) (cons 'a 'b))"), "nil");
    assert_eq!(run(&mut m, env, "(def p (cons 'a 'b)) (eq p p)"), "t");
    assert_eq!(run(&mut m, env, "(equal '(a (b)) '(a (c)))"), "nil");
}

#[test]
fn errors_leave_the_machine_usable() {
    let (mut m, env) = setup();
    assert_eq!(
        m.eval_str("undefined", env),
        Err(LispError::Unbound("undefined".into()))
    );
    assert!(matches!(m.eval_str("(car 'x)", env), Err(LispError::Type(_))));
    assert!(matches!(m.eval_str("(cons 'a)", env), Err(LispError::Arity { .. })));
    assert_eq!(run(&mut m, env, "(cons 'still 'working)"), "(still . working)");
}

#[test]
fn env_reflection() {
    let (mut m, env) = setup();
    assert_eq!(run(&mut m, env, "(eq *env* *env*)"), "t");
    assert_eq!(run(&mut m, env, "((lambda () (eq *env* *env*)))"), "t");
    let inner = m.eval_str("((lambda () *env*))", env).unwrap();
    assert_ne!(inner, env);
}

#[test]
fn cons_budget_is_fatal() {
    let mut m = Machine::new(MachineConfig {
        max_conses: Some(200),
        ..MachineConfig::default()
    })
    .unwrap();
    let env = m.make_core_env().unwrap();
    let err = m
        .eval_str(
            "(def grow (lambda (xs) (grow (cons 'x xs)))) (grow nil)",
            env,
        )
        .unwrap_err();
    assert_eq!(err, LispError::BudgetExceeded { arena: "cons" });
    assert!(err.is_fatal());
}

#[test]
fn deep_non_tail_recursion_hits_the_depth_limit() {
    let (mut m, env) = setup();
    let src = "(def nest (lambda (xs) (cons 'x (nest xs)))) (nest nil)";
    assert_eq!(m.eval_str(src, env), Err(LispError::DepthExceeded));
    assert_eq!(run(&mut m, env, "(cons 'after 'overflow)"), "(after . overflow)");
}

#[test]
fn long_tail_recursive_loops_run_in_constant_depth() {
    let mut m = Machine::new(MachineConfig {
        max_depth: 50,
        ..MachineConfig::default()
    })
    .unwrap();
    let env = m.make_core_env().unwrap();
    let src = "(def count-down (lambda (xs) (if xs (count-down (cdr xs)) 'done)))
               (def long '(a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a
                           a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a
                           a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a))
               (count-down long)";
    let val = m.eval_str(src, env).unwrap();
    assert_eq!(m.render(val), "done");
}

#[test]
fn println_goes_to_the_stdout_stream() {
    let (mut m, env) = setup();
    m.streams.redirect_stdout();
    run(&mut m, env, "(println 'hello \"world\")");
    let out = m
        .streams
        .take_buffer(lisp::stream::StreamTable::STDOUT)
        .unwrap();
    assert_eq!(out, b"hello \"world\"\n");
}

#[test]
fn closures_print_even_with_many_closures_in_scope() {
    let (mut m, env) = setup();
    let src = "(def f (lambda () nil))
               (def g (lambda () nil))
               (def h (lambda () nil))
               (def k (syntax (x) x))
               f";
    let text = run(&mut m, env, src);
    assert!(text.starts_with("(lit clo "), "{}", text);
    assert!(text.contains("..."), "{}", text);
}

#[test]
fn arity_errors_can_name_a_closure() {
    let (mut m, env) = setup();
    let src = "(def f (lambda () nil))
               (def g (lambda () nil))
               (def h (lambda () nil))
               (cons f)";
    match m.eval_str(src, env) {
        Err(LispError::Arity { problem, call }) => {
            assert_eq!(problem, "not enough");
            assert!(call.starts_with("(cons (lit clo "), "{}", call);
        }
        other => panic!("expected an arity error, got {:?}", other),
    }
}

#[test]
fn hand_built_values_are_rejected_not_panicked_on() {
    let (mut m, env) = setup();
    let stray_pair = Value::new(Kind::Cons, 999);
    let stray_string = Value::new(Kind::String, 999);
    assert!(matches!(m.eval(stray_pair, env), Err(LispError::Type(_))));
    assert!(matches!(m.string_bytes(stray_string), Err(LispError::Type(_))));
    assert!(matches!(m.heap.car_val(stray_pair), Err(LispError::Type(_))));
    assert_eq!(m.render(stray_pair), "#:<invalid cons 999>");

    let call = m.heap.list(&[Value::new(Kind::Builtin, 77)]).unwrap();
    assert!(matches!(m.eval(call, env), Err(LispError::Type(_))));
}
