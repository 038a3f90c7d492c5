use super::*;

#[test]
fn arithmetic_and_coercion_follow_script_rules() -> Result<()> {
    assert_eq!(eval_number("1 + 2 * 3 - 4 / 2")?, 5.0);
    assert_eq!(eval_string("'1' + 2 + 3")?, "123");
    assert_eq!(eval_number("'6' * '7'")?, 42.0);
    assert_eq!(eval_number("2 ** 10 % 1000")?, 24.0);
    assert_eq!(eval_number("-7 >> 1")?, -4.0);
    assert_eq!(eval_number("-1 >>> 28")?, 15.0);
    assert_eq!(eval_string("String(0.1 + 0.2)")?, "0.30000000000000004");
    assert_eq!(eval_string("String(1 / 0) + ',' + String(-1 / 0)")?, "Infinity,-Infinity");
    assert!(eval_bool("null == undefined && null !== undefined && NaN !== NaN")?);
    assert!(eval_bool("'10' == 10 && '' == 0 && !('a' == 0)")?);
    Ok(())
}

#[test]
fn typeof_reports_every_kind() -> Result<()> {
    assert_eq!(
        eval_string(
            "[typeof 1, typeof 'a', typeof true, typeof undefined, typeof null, \
             typeof {}, typeof [], typeof function () {}, typeof notDeclared].join()"
        )?,
        "number,string,boolean,undefined,object,object,object,function,undefined"
    );
    Ok(())
}

#[test]
fn closures_capture_their_scope() -> Result<()> {
    let source = r#"
        function counter() {
          let count = 0;
          return { next: () => ++count, peek() { return count; } };
        }
        const a = counter();
        const b = counter();
        a.next(); a.next(); b.next();
        a.peek() * 10 + b.peek();
    "#;
    assert_eq!(eval_number(source)?, 21.0);
    Ok(())
}

#[test]
fn let_in_for_loops_binds_per_iteration() -> Result<()> {
    let source = r#"
        var fns = [];
        for (let i = 0; i < 3; i++) fns.push(() => i);
        var shared = [];
        for (var j = 0; j < 3; j++) shared.push(() => j);
        fns.map(f => f()).join() + '|' + shared.map(f => f()).join();
    "#;
    assert_eq!(eval_string(source)?, "0,1,2|3,3,3");
    Ok(())
}

#[test]
fn hoisting_makes_functions_and_vars_visible_early() -> Result<()> {
    let source = r#"
        var before = typeof later + ':' + String(hoisted);
        function later() { return 1; }
        var hoisted = 5;
        before;
    "#;
    assert_eq!(eval_string(source)?, "function:undefined");
    Ok(())
}

#[test]
fn const_reassignment_and_tdz_like_misuse_throw() -> Result<()> {
    let err = eval("const x = 1; x = 2;").expect_err("const assignment must fail");
    match err {
        Error::ScriptRuntime(message) => assert!(message.contains("TypeError"), "{message}"),
        other => panic!("unexpected error: {other:?}"),
    }
    let err = eval("missing + 1").expect_err("unknown identifier must fail");
    match err {
        Error::ScriptRuntime(message) => {
            assert!(message.contains("ReferenceError"), "{message}");
            assert!(message.contains("missing"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}

#[test]
fn control_flow_statements_work() -> Result<()> {
    let source = r#"
        var out = [];
        outer: for (var i = 0; i < 3; i++) {
          for (var j = 0; j < 3; j++) {
            if (j === 1) continue outer;
            if (i === 2) break outer;
            out.push(i + '' + j);
          }
        }
        var k = 0;
        do { k++; } while (k < 5);
        var w = 10;
        while (true) { if (--w < 7) break; }
        switch (k) {
          case 4: out.push('four');
          case 5: out.push('five');
          case 6: out.push('six'); break;
          default: out.push('default');
        }
        out.push(w);
        out.join(' ');
    "#;
    assert_eq!(eval_string(source)?, "00 10 five six 6");
    Ok(())
}

#[test]
fn for_in_and_for_of_iterate() -> Result<()> {
    let source = r#"
        var keys = [];
        var obj = { a: 1, b: 2 };
        for (var key in obj) keys.push(key);
        var total = 0;
        for (const n of [1, 2, 3]) total += n;
        var chars = [];
        for (const ch of 'hé') chars.push(ch);
        keys.join() + '|' + total + '|' + chars.join('-');
    "#;
    assert_eq!(eval_string(source)?, "a,b|6|h-é");
    Ok(())
}

#[test]
fn try_catch_finally_ordering() -> Result<()> {
    let source = r#"
        var log = [];
        function run() {
          try {
            log.push('try');
            throw new RangeError('bad');
          } catch (e) {
            log.push(e.name + ':' + e.message);
            return 'from-catch';
          } finally {
            log.push('finally');
          }
        }
        log.push(run());
        try { null.x; } catch (e) { log.push(e instanceof TypeError); }
        try { throw 'plain'; } catch (e) { log.push(e); }
        try { log.push('no error'); } catch { log.push('never'); }
        log.join('|');
    "#;
    assert_eq!(
        eval_string(source)?,
        "try|RangeError:bad|finally|from-catch|true|plain|no error"
    );
    Ok(())
}

#[test]
fn finally_return_overrides_throw() -> Result<()> {
    let source = r#"
        function f() { try { throw new Error('x'); } finally { return 'kept'; } }
        f();
    "#;
    assert_eq!(eval_string(source)?, "kept");
    Ok(())
}

#[test]
fn this_binding_follows_call_shape() -> Result<()> {
    let source = r#"
        var obj = {
          name: 'obj',
          regular() { return this.name; },
          arrow() { return (() => this.name)(); },
        };
        var detached = obj.regular;
        [obj.regular(), obj.arrow(), typeof detached.call({ name: 'other' })].join();
    "#;
    assert_eq!(eval_string(source)?, "obj,obj,string");
    Ok(())
}

#[test]
fn parameters_support_defaults_rest_and_arguments() -> Result<()> {
    let source = r#"
        function f(a, b = a * 2, ...rest) {
          return [a, b, rest.length, arguments.length].join();
        }
        f(1) + '|' + f(1, 5, 7, 8, 9);
    "#;
    assert_eq!(eval_string(source)?, "1,2,0,1|1,5,3,5");
    Ok(())
}

#[test]
fn spread_and_object_literal_features() -> Result<()> {
    let source = r#"
        var key = 'dyn';
        var base = { a: 1, b: 2 };
        var copy = { ...base, b: 3, [key + 'amic']: true, short: key };
        var store = { _v: 1, get v() { return this._v * 10; }, set v(x) { this._v = x; } };
        store.v = 4;
        var nums = [1, ...[2, 3], 4];
        [copy.a, copy.b, copy.dynamic, copy.short, store.v, Math.max(...nums)].join();
    "#;
    assert_eq!(eval_string(source)?, "1,3,true,dyn,40,4");
    Ok(())
}

#[test]
fn constructors_and_prototype_chains() -> Result<()> {
    let source = r#"
        function Point(x, y) { this.x = x; this.y = y; }
        Point.prototype.sum = function () { return this.x + this.y; };
        var p = new Point(2, 3);
        [p.sum(), p instanceof Point, p.constructor === Point,
         Object.getPrototypeOf(p) === Point.prototype, 'sum' in p,
         p.hasOwnProperty('sum')].join();
    "#;
    assert_eq!(eval_string(source)?, "5,true,true,true,true,false");
    Ok(())
}

#[test]
fn optional_chaining_and_nullish_operators() -> Result<()> {
    let source = r#"
        var o = { inner: { value: 0 } , fn: null };
        var a = o.missing?.deep.deeper;
        var b = o.inner?.value ?? 'fallback';
        var c = o.fn?.();
        var d = null;
        d ??= 'set';
        var e = 0;
        e ||= 7;
        var f = 1;
        f &&= 9;
        [String(a), b, String(c), d, e, f].join();
    "#;
    assert_eq!(eval_string(source)?, "undefined,0,undefined,set,7,9");
    Ok(())
}

#[test]
fn template_literals_interpolate_expressions() -> Result<()> {
    let source = r#"
        var name = 'page';
        var n = 3;
        `${name}: ${n * 2} items\n${[1, 2].map(x => `<${x}>`).join('')}`;
    "#;
    assert_eq!(eval_string(source)?, "page: 6 items\n<1><2>");
    Ok(())
}

#[test]
fn update_delete_and_in_operators() -> Result<()> {
    let source = r#"
        var o = { a: 1, b: 2 };
        var before = o.a++;
        var after = ++o.a;
        delete o.b;
        var arr = [1, 2, 3];
        arr.length = 1;
        [before, after, 'b' in o, arr.length, void 0 === undefined].join();
    "#;
    assert_eq!(eval_string(source)?, "1,3,false,1,true");
    Ok(())
}

#[test]
fn automatic_semicolon_insertion_handles_newlines() -> Result<()> {
    let source = "var a = 1\nvar b = a\n++b\nfunction f() {\n  return\n  42\n}\n[a, b, String(f())].join()";
    assert_eq!(eval_string(source)?, "1,2,undefined");
    Ok(())
}

#[test]
fn deep_recursion_throws_range_error() -> Result<()> {
    let mut interpreter = Interpreter::with_max_call_depth(64);
    let err = interpreter
        .run("function f(n) { return f(n + 1); } f(0);", "deep")
        .expect_err("runaway recursion must fail");
    match err {
        Error::ScriptRuntime(message) => {
            assert!(message.starts_with("deep: Uncaught RangeError"), "{message}");
            assert!(message.contains("Maximum call stack size exceeded"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let caught = interpreter.run(
        "function g() { return g(); } var seen = 'no'; try { g(); } catch (e) { seen = e.name; } seen",
        "caught",
    )?;
    assert_eq!(caught, HostValue::from("RangeError"));
    Ok(())
}

#[test]
fn bounded_recursion_below_the_limit_succeeds() -> Result<()> {
    let mut interpreter = Interpreter::with_max_call_depth(2000);
    let value = interpreter.run(
        "function depth(n) { return n === 0 ? 0 : 1 + depth(n - 1); } depth(1500);",
        "ok",
    )?;
    assert_eq!(value, HostValue::Number(1500.0));
    Ok(())
}

#[test]
fn syntax_errors_are_parse_errors_with_origin() {
    for source in ["var = 1;", "function (", "if (a { }", "'unterminated", "a +* b"] {
        match Interpreter::new().run(source, "bad.js") {
            Err(Error::ScriptParse(message)) => {
                assert!(message.starts_with("bad.js:"), "{message}");
            }
            other => panic!("{source:?} should be a parse error, got {other:?}"),
        }
    }
}

#[test]
fn globals_persist_between_runs_of_one_interpreter() -> Result<()> {
    let mut interpreter = Interpreter::new();
    interpreter.run("var shared = 1; let scoped = 2; function bump() { shared++; }", "first")?;
    interpreter.run("bump(); bump();", "second")?;
    assert_eq!(interpreter.run("shared + scoped", "third")?, HostValue::Number(5.0));
    Ok(())
}

#[test]
fn host_bindings_expose_values_methods_and_accessors() -> Result<()> {
    use std::cell::RefCell;
    use std::rc::Rc;

    let stored = Rc::new(RefCell::new(String::from("initial")));
    let reader = stored.clone();
    let writer = stored.clone();
    let host = HostObject::new()
        .with_value("version", 3.0)
        .with_method("echo", |args| {
            Ok(HostValue::String(
                args.iter().map(HostValue::to_display_string).collect::<Vec<_>>().join("+"),
            ))
        })
        .with_method("fail", |_| Err(HostError::type_error("host said no")))
        .with_accessor(
            "state",
            move |_| Ok(HostValue::String(reader.borrow().clone())),
            Some(Rc::new(move |args: &[HostValue]| -> std::result::Result<HostValue, HostError> {
                *writer.borrow_mut() = args.first().map(HostValue::to_display_string).unwrap_or_default();
                Ok(HostValue::Undefined)
            })),
        );

    let mut interpreter = Interpreter::new();
    interpreter.bind("host", HostValue::Object(host))?;
    let value = interpreter.run(
        r#"
        var seen = host.state;
        host.state = 'changed';
        var caught;
        try { host.fail(); } catch (e) { caught = e instanceof TypeError && e.message; }
        [host.version, host.echo(1, 'a', [2, 3], null), seen, caught].join('|');
        "#,
        "host",
    )?;
    assert_eq!(value, HostValue::from("3|1+a+2,3+null|initial|host said no"));
    assert_eq!(stored.borrow().as_str(), "changed");
    Ok(())
}

#[test]
fn dropping_the_interpreter_frees_cyclic_script_state() -> Result<()> {
    use std::rc::Rc;

    let marker = Rc::new(());
    let held = marker.clone();
    let host = HostObject::new().with_method("touch", move |_| {
        Ok(HostValue::Number(Rc::strong_count(&held) as f64))
    });

    let mut interpreter = Interpreter::new();
    interpreter.bind("host", HostValue::Object(host))?;
    interpreter.run(
        r#"
        function recurse() { return recurse; }
        var node = { host: host, touch: host.touch };
        node.self = node;
        var bound = recurse.bind(node, node);
        var nested = (function () { var inner = () => inner; return inner; })();
        node.touch();
        "#,
        "cycles",
    )?;
    assert!(interpreter.heap.live_objects() > 0);
    assert_eq!(Rc::strong_count(&marker), 2);

    drop(interpreter);
    assert_eq!(Rc::strong_count(&marker), 1);
    Ok(())
}
