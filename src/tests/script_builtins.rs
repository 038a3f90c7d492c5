use super::*;

#[test]
fn array_methods_cover_common_pipelines() -> Result<()> {
    let source = r#"
        var items = [5, 1, 10, 2];
        var sorted = items.slice().sort();
        var numeric = items.slice().sort((a, b) => a - b);
        var doubled = items.filter(n => n > 1).map(n => n * 2);
        var total = items.reduce((acc, n) => acc + n, 0);
        var spliced = items.slice();
        var removed = spliced.splice(1, 2, 'x');
        [sorted.join(), numeric.join(), doubled.join(), total,
         spliced.join(), removed.join(), items.indexOf(10), items.includes(3),
         items.find(n => n > 4), items.findIndex(n => n > 100),
         [[1, [2]], 3].flat(2).join(), [1, 2].flatMap(n => [n, n]).join(),
         items.at(-1), Array.isArray(items), Array.from('ab').join('+')].join(' | ');
    "#;
    assert_eq!(
        eval_string(source)?,
        "1,10,2,5 | 1,2,5,10 | 10,20,4 | 18 | 5,x,2 | 1,10 | 2 | false | 5 | -1 | 1,2,3 | 1,1,2,2 | 2 | true | a+b"
    );
    Ok(())
}

#[test]
fn sort_is_stable_and_propagates_comparator_errors() -> Result<()> {
    let source = r#"
        var rows = [{k: 1, v: 'a'}, {k: 0, v: 'b'}, {k: 1, v: 'c'}, {k: 0, v: 'd'}];
        rows.sort((x, y) => x.k - y.k).map(r => r.v).join('');
    "#;
    assert_eq!(eval_string(source)?, "bdac");

    let thrown = eval_string(
        "var m = 'none'; try { [2, 1].sort(() => { throw new Error('cmp'); }); } catch (e) { m = e.message; } m",
    )?;
    assert_eq!(thrown, "cmp");
    Ok(())
}

#[test]
fn string_methods_are_char_aware() -> Result<()> {
    let source = r#"
        var s = '  Héllo, World  ';
        var t = s.trim();
        [t.length, t.toUpperCase(), t.slice(-5), t.substring(7, 1), t.charAt(1),
         t.indexOf('o'), t.lastIndexOf('o'), t.split(', ').join('/'),
         'ab'.padStart(4, '-'), 'ab'.padEnd(5, 'xy'), 'na'.repeat(3),
         'a-b-c'.replaceAll('-', '+'), t.startsWith('Hé'), t.endsWith('ld'),
         'é'.normalize('NFC').length].join(' | ');
    "#;
    assert_eq!(
        eval_string(source)?,
        "12 | HÉLLO, WORLD | World | éllo,  | é | 4 | 8 | Héllo/World | --ab | abxyx | nanana | a+b+c | true | true | 1"
    );
    Ok(())
}

#[test]
fn replace_supports_patterns_and_callbacks() -> Result<()> {
    let source = r#"
        var date = '2024-03-15';
        var swapped = date.replace(/(\d+)-(\d+)-(\d+)/, '$3/$2/$1');
        var named = date.replace(/(?<y>\d+)-(?<m>\d+)/, '$<m>.$<y>');
        var upper = 'a1b22c'.replace(/\d+/g, m => '[' + m.length + ']');
        var literal = 'x.y.z'.replace('.', '$$');
        var whole = 'cat'.replace(/a/, "<$&|$`|$'>");
        [swapped, named, upper, literal, whole].join(' ');
    "#;
    assert_eq!(
        eval_string(source)?,
        "15/03/2024 03.2024-15 a[1]b[2]c x$y.z c<a|c|t>t"
    );
    Ok(())
}

#[test]
fn regexp_exec_tracks_last_index_and_groups() -> Result<()> {
    let source = r#"
        var re = /(?<word>[a-z]+)(\d)/g;
        var text = 'ab1 cd2 ef3';
        var seen = [];
        var m;
        while ((m = re.exec(text)) !== null) {
          seen.push(m.groups.word + m[2] + '@' + m.index + '>' + re.lastIndex);
        }
        var sticky = /a/y;
        sticky.lastIndex = 1;
        [seen.join(' '), re.lastIndex, sticky.test('ba'), sticky.test('ba'),
         String(/x/gi), 'A-b-C'.split(/-/).length, 'abc'.search(/c/),
         'a1b2'.match(/\d/g).join(''), /^h.llo$/i.test('HELLO')].join(' | ');
    "#;
    assert_eq!(
        eval_string(source)?,
        "ab1@0>3 cd2@4>7 ef3@8>11 | 0 | true | false | /x/gi | 3 | 2 | 12 | true"
    );
    Ok(())
}

#[test]
fn invalid_regexp_is_a_syntax_error() -> Result<()> {
    let name = eval_string("var n; try { new RegExp('(unclosed'); } catch (e) { n = e.name; } n")?;
    assert_eq!(name, "SyntaxError");
    Ok(())
}

#[test]
fn number_formatting_matches_script_output() -> Result<()> {
    let source = r#"
        [(2.5).toFixed(0), (1.005).toFixed(2), (-0).toFixed(1), (1234.5678).toFixed(2),
         (255).toString(16), (255).toString(2), (0.5).toString(2),
         (123.456).toPrecision(4), (1e21).toString(), String(1e-7), String(-1e-7),
         Number('  42  '), Number('0x1f'), Number(''), String(Number('1e')),
         Number.isInteger(5.0), Number.isSafeInteger(2 ** 53)].join(' ');
    "#;
    assert_eq!(
        eval_string(source)?,
        "3 1.00 0.0 1234.57 ff 11111111 0.1 123.5 1e+21 1e-7 -1e-7 42 31 0 NaN true false"
    );
    Ok(())
}

#[test]
fn math_helpers_follow_script_rounding() -> Result<()> {
    let source = r#"
        [Math.round(-2.5), Math.round(2.5), Math.round(-0.4) === 0, Math.trunc(-4.7),
         Math.sign(-3), Math.max(), Math.min(), Math.hypot(3, 4), Math.cbrt(27),
         Math.abs(-7.5), Math.floor(-0.5), Math.ceil(0.2)].join(' ');
    "#;
    assert_eq!(
        eval_string(source)?,
        "-2 3 true -4 -1 -Infinity Infinity 5 3 7.5 -1 1"
    );

    let random = eval_bool(
        "var ok = true; for (var i = 0; i < 200; i++) { var r = Math.random(); ok = ok && r >= 0 && r < 1; } ok",
    )?;
    assert!(random);
    Ok(())
}

#[test]
fn global_parse_functions_accept_prefixes() -> Result<()> {
    let source = r#"
        [parseInt('42px'), parseInt('  -0x1A'), parseInt('101', 2), String(parseInt('z')),
         parseFloat('3.14abc'), parseFloat('.5'), parseFloat('-Infinityx'),
         isNaN('abc'), isFinite('12'), encodeURIComponent('a b&c/é'),
         decodeURIComponent('%E2%9C%93'), encodeURI('https://x.test/a b?q=1&r=é')].join(' ');
    "#;
    assert_eq!(
        eval_string(source)?,
        "42 -26 5 NaN 3.14 0.5 -Infinity true true a%20b%26c%2F%C3%A9 \u{2713} https://x.test/a%20b?q=1&r=%C3%A9"
    );

    let err = eval_string("var n; try { decodeURIComponent('%E0%A4%A'); } catch (e) { n = e.name; } n")?;
    assert_eq!(err, "URIError");
    Ok(())
}

#[test]
fn json_stringify_handles_options_and_cycles() -> Result<()> {
    let source = r#"
        var value = { b: [1, 'two', null, undefined, () => 1], a: { nested: true },
                      skip: undefined, n: NaN, date: { toJSON() { return 'iso'; } } };
        [JSON.stringify(value),
         JSON.stringify({ x: 1, y: 2, z: 3 }, ['z', 'x']),
         JSON.stringify({ x: 1, y: 'drop' }, (k, v) => typeof v === 'string' ? undefined : v),
         JSON.stringify([1, { a: 2 }], null, 2),
         JSON.stringify('q"\u0001'),
         String(JSON.stringify(undefined))].join('\n');
    "#;
    assert_eq!(
        eval_string(source)?,
        concat!(
            r#"{"b":[1,"two",null,null,null],"a":{"nested":true},"n":null,"date":"iso"}"#,
            "\n",
            r#"{"z":3,"x":1}"#,
            "\n",
            r#"{"x":1}"#,
            "\n",
            "[\n  1,\n  {\n    \"a\": 2\n  }\n]",
            "\n",
            r#""q\"\u0001""#,
            "\n",
            "undefined"
        )
    );

    let cycle = eval_string(
        "var o = {}; o.self = o; var m; try { JSON.stringify(o); } catch (e) { m = e.name + ': ' + e.message; } m",
    )?;
    assert_eq!(cycle, "TypeError: Converting circular structure to JSON");
    Ok(())
}

#[test]
fn json_parse_builds_values_and_applies_reviver() -> Result<()> {
    let source = r#"
        var parsed = JSON.parse('{"a":[1,2,{"b":"\\u00e9\\ud83d\\ude00"}],"n":-1.5e2,"t":true,"z":null}');
        var revived = JSON.parse('{"a":1,"b":{"c":2}}', (k, v) => typeof v === 'number' ? v * 10 : v);
        [parsed.a.length, parsed.a[2].b, parsed.n, parsed.t, parsed.z === null,
         revived.a, revived.b.c].join(' ');
    "#;
    assert_eq!(eval_string(source)?, "3 \u{e9}\u{1f600} -150 true true 10 20");

    for bad in ["'{a:1}'", "'[1,]'", "'01'", "''", "'\"unterminated'"] {
        let name = eval_string(&format!(
            "var n = 'ok'; try {{ JSON.parse({bad}); }} catch (e) {{ n = e.name; }} n"
        ))?;
        assert_eq!(name, "SyntaxError", "JSON.parse({bad})");
    }
    Ok(())
}

#[test]
fn object_helpers_expose_own_properties() -> Result<()> {
    let source = r#"
        var proto = { inherited: 1 };
        var o = Object.create(proto);
        o.b = 2;
        o.a = 1;
        Object.defineProperty(o, 'hidden', { value: 3, enumerable: false });
        var merged = Object.assign({}, o, { c: 3 });
        [Object.keys(o).join(), Object.values(o).join(), o.hidden, o.inherited,
         Object.keys(merged).join(), JSON.stringify(Object.entries({ x: 1 })),
         Object.fromEntries([['k', 'v']]).k, proto.isPrototypeOf(o),
         String({}), Object.prototype.toString.call([])].join(' | ');
    "#;
    assert_eq!(
        eval_string(source)?,
        "b,a | 2,1 | 3 | 1 | b,a,c | [[\"x\",1]] | v | true | [object Object] | [object Array]"
    );
    Ok(())
}

#[test]
fn function_bind_call_and_apply_fix_this_and_arguments() -> Result<()> {
    let source = r#"
        function describe(greeting, mark) { return greeting + ' ' + this.name + mark; }
        var who = { name: 'Ada' };
        var bound = describe.bind(who, 'Hi');
        [bound('!'), describe.call(who, 'Yo', '?'), describe.apply(who, ['Hey', '.']),
         bound.length, typeof bound].join(' | ');
    "#;
    assert_eq!(eval_string(source)?, "Hi Ada! | Yo Ada? | Hey Ada. | 1 | function");
    Ok(())
}

#[test]
fn error_constructors_produce_typed_errors() -> Result<()> {
    let source = r#"
        var errors = [new Error('a'), new TypeError('b'), RangeError('c'),
                      new SyntaxError('d'), new ReferenceError('e')];
        var withCause = new Error('outer', { cause: 'inner' });
        [errors.map(e => e.name + ':' + e.message + ':' + (e instanceof Error)).join(','),
         String(errors[1]), withCause.cause, new Error().message === ''].join(' | ');
    "#;
    assert_eq!(
        eval_string(source)?,
        "Error:a:true,TypeError:b:true,RangeError:c:true,SyntaxError:d:true,ReferenceError:e:true | TypeError: b | inner | true"
    );
    Ok(())
}

#[test]
fn uncaught_error_objects_report_name_and_message() {
    match eval("throw new TypeError('boom');") {
        Err(Error::ScriptRuntime(message)) => assert_eq!(message, "test: Uncaught TypeError: boom"),
        other => panic!("unexpected result: {other:?}"),
    }
    match eval("throw 42;") {
        Err(Error::ScriptRuntime(message)) => assert_eq!(message, "test: Uncaught 42"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn returned_values_convert_to_host_values() -> Result<()> {
    assert_eq!(eval("[1, 'a', null, true]")?.to_display_string(), "1,a,,true");
    match eval("({ a: 1, b: 'x' })")? {
        HostValue::Object(object) => {
            assert_eq!(object.property_names(), vec!["a".to_string(), "b".to_string()]);
        }
        other => panic!("expected object, got {other:?}"),
    }
    assert_eq!(eval("/ab+c/gi")?, HostValue::from("/ab+c/gi"));
    assert_eq!(eval("undefined")?, HostValue::Undefined);
    Ok(())
}
