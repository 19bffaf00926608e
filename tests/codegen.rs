use moonwalk::codegen::JsGenerator;
use pretty_assertions::assert_eq;

fn js(source: &str) -> String {
    let chunk = moonwalk::parse(source).unwrap();
    JsGenerator::new().generate(&chunk)
}

/// The generated program without the runtime prelude.
fn body(source: &str) -> String {
    let out = js(source);
    let prelude_len = js("").len();
    out[prelude_len..].to_string()
}

#[test]
fn prelude_defines_builtins() {
    let out = js("");
    for name in ["print", "pairs", "ipairs"] {
        assert!(out.contains(&format!("const {name} = ")), "{name} missing");
    }
}

#[test]
fn locals_and_calls() {
    assert_eq!(body("local a = 1"), "let a = 1;\n");
    assert_eq!(body("local a, b = 1"), "let a = 1, b;\n");
    assert_eq!(body("print(1 + 2 * 3)"), "print((1 + (2 * 3)));\n");
    assert_eq!(body("a, b = b, a"), "[a, b] = [b, a];\n");
}

#[test]
fn operators_map_to_javascript() {
    assert_eq!(
        body("local b = a == 1 and not c or d ~= e"),
        "let b = (((a === 1) && (!c)) || (d !== e));\n"
    );
    assert_eq!(
        body("local s = \"x\" .. #t .. 2 ^ -n"),
        "let s = (\"\" + \"x\" + (\"\" + t.length + (2 ** (-n))));\n"
    );
    assert_eq!(body("local z = nil"), "let z = undefined;\n");
}

#[test]
fn repeat_becomes_loop_with_trailing_break() {
    assert_eq!(
        body("local x = 0 repeat x = x + 1 until x > 3"),
        "let x = 0;\nfor (;;) {\n    x = (x + 1);\n    if ((x > 3)) break;\n}\n"
    );
}

#[test]
fn numeric_for() {
    assert_eq!(
        body("for i = 0, 3 do print(i) end"),
        "for (let i = 0; i < 3; i += 1) {\n    print(i);\n}\n"
    );
}

#[test]
fn generic_for_calls_the_iterator() {
    assert_eq!(
        body("for k, v in pairs(t) do print(k) end"),
        "for (const $iter = pairs(t);;) {\n    const $value = $iter();\n    if ($value[0] === undefined) break;\n    let k = $value[0], v = $value[1];\n    print(k);\n}\n"
    );
}

#[test]
fn tables_number_positional_fields_from_zero() {
    assert_eq!(
        body("local t = { 1, x = 2, [k] = 3, 4 }"),
        "let t = {\"0\": 1, \"x\": 2, [k]: 3, \"1\": 4};\n"
    );
}

#[test]
fn functions() {
    assert_eq!(
        body("local function add(a, b) return a + b end"),
        "let add = function (a, b) {\n    return (a + b);\n};\n"
    );
    assert_eq!(
        body("function obj:get() return self.v end"),
        "obj.get = function (self) {\n    return self.v;\n};\n"
    );
    assert_eq!(body("obj:m(1)"), "$method(obj, \"m\", 1);\n");
}

#[test]
fn if_chain() {
    assert_eq!(
        body("if a then x() elseif b then y() else z() end"),
        "if (a) {\n    x();\n} else if (b) {\n    y();\n} else {\n    z();\n}\n"
    );
}

#[test]
fn comments_are_kept() {
    let out = body("-- hi\nlocal a = 1 --[[ multi\nline ]]");
    assert_eq!(out, "// hi\n/* multi\nline */\nlet a = 1;\n");
}

#[test]
fn strings_are_escaped() {
    assert_eq!(body("local s = [[say \"hi\"\n]]"), "let s = \"say \\\"hi\\\"\\n\";\n");
}

#[test]
fn redeclared_locals_open_a_nested_block() {
    assert_eq!(
        body("local x = 1 local x = x + 1 print(x)"),
        "let x = 1;\nconst $local1 = (x + 1);\n{\n    let x = $local1;\n    print(x);\n}\n"
    );
    assert_eq!(
        body("local print = 1"),
        "const $local1 = 1;\n{\n    let print = $local1;\n}\n"
    );
    assert_eq!(
        body("local function f(a) local a = a end"),
        "let f = function (a) {\n    const $local1 = a;\n    {\n        let a = $local1;\n    }\n};\n"
    );
    assert_eq!(
        body("local function f() end local function f() end"),
        "let f = function () {\n};\n{\n    let f = function () {\n    };\n}\n"
    );
}

#[test]
fn loop_variables_can_be_shadowed() {
    assert_eq!(
        body("for k in pairs(t) do local k = 1 end"),
        "for (const $iter = pairs(t);;) {\n    const $value = $iter();\n    if ($value[0] === undefined) break;\n    let k = $value[0];\n    const $local1 = 1;\n    {\n        let k = $local1;\n    }\n}\n"
    );
    assert_eq!(
        body("repeat local a = 1 local a = 2 until a"),
        "for (;;) {\n    let a = 1;\n    const $local1 = 2;\n    {\n        let a = $local1;\n        if (a) break;\n    }\n}\n"
    );
}
