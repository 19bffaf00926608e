mod common;

use common::{capturing, output_of};
use moonwalk::interpreter::{Interpreter, Val};
use pretty_assertions::assert_eq;

fn s(text: &str) -> Option<Val> {
    Some(Val::String(text.into()))
}

fn n(num: f64) -> Option<Val> {
    Some(Val::Num(num))
}

#[test]
fn locals_in_do_blocks_stay_inside() {
    let mut interp = Interpreter::new();
    interp
        .run(
            "
local x = 1
do
  local x = 2
  local y = 3
end
",
        )
        .unwrap();

    assert_eq!(interp.get_global("x"), n(1.0));
    assert_eq!(interp.get_global("y"), None);
}

#[test]
fn shadowing_does_not_mutate_outer() {
    let mut interp = Interpreter::new();
    interp
        .run(
            "
local x = \"outer\"
local seen
do
  local x = \"inner\"
  seen = x
end
",
        )
        .unwrap();

    assert_eq!(interp.get_global("x"), s("outer"));
    assert_eq!(interp.get_global("seen"), s("inner"));
}

#[test]
fn numeric_for_excludes_end() {
    let mut interp = Interpreter::new();
    interp
        .run(
            "
local visited = \"\"
for i = 0, 3 do visited = visited .. i end

local sum = 0
for i = 1, 10, 3 do sum = sum + i end
",
        )
        .unwrap();

    assert_eq!(interp.get_global("visited"), s("012"));
    assert_eq!(interp.get_global("sum"), n(12.0));
}

#[test]
fn repeat_runs_at_least_once() {
    let mut interp = Interpreter::new();
    interp
        .run(
            "
local n = 0
repeat n = n + 1 until true

local i = 0
repeat
  local done = i >= 2
  i = i + 1
until done
",
        )
        .unwrap();

    assert_eq!(interp.get_global("n"), n(1.0));
    assert_eq!(interp.get_global("i"), n(3.0));
}

#[test]
fn while_with_break() {
    let mut interp = Interpreter::new();
    interp
        .run(
            "
local i = 0
while true do
  i = i + 1
  if i == 5 then break end
end
",
        )
        .unwrap();

    assert_eq!(interp.get_global("i"), n(5.0));
}

#[test]
fn break_leaves_only_the_inner_loop() {
    let mut interp = Interpreter::new();
    interp
        .run(
            "
local count = 0
for i = 0, 3 do
  for j = 0, 3 do
    if j == 1 then break end
    count = count + 1
  end
end
",
        )
        .unwrap();

    assert_eq!(interp.get_global("count"), n(3.0));
}

#[test]
fn if_elseif_else() {
    let mut interp = Interpreter::new();
    interp
        .run(
            "
local function classify(x)
  if x < 0 then
    return \"negative\"
  elseif x == 0 then
    return \"zero\"
  elseif x < 10 then
    return \"small\"
  else
    return \"large\"
  end
end
local a, b, c, d = classify(-1), classify(0), classify(5), classify(50)
",
        )
        .unwrap();

    assert_eq!(interp.get_global("a"), s("negative"));
    assert_eq!(interp.get_global("b"), s("zero"));
    assert_eq!(interp.get_global("c"), s("small"));
    assert_eq!(interp.get_global("d"), s("large"));
}

#[test]
fn closures_outlive_their_call() {
    let mut interp = Interpreter::new();
    interp
        .run(
            "
local function counter()
  local n = 0
  return function()
    n = n + 1
    return n
  end
end
local c = counter()
local other = counter()
c()
c()
local result = c()
local fresh = other()
",
        )
        .unwrap();

    assert_eq!(interp.get_global("result"), n(3.0));
    assert_eq!(interp.get_global("fresh"), n(1.0));
}

#[test]
fn loop_closures_capture_their_iteration() {
    let mut interp = Interpreter::new();
    interp
        .run(
            "
local fns = {}
for i = 1, 4 do
  fns[i] = function() return i end
end
local a = fns[1]()
local b = fns[3]()
",
        )
        .unwrap();

    assert_eq!(interp.get_global("a"), n(1.0));
    assert_eq!(interp.get_global("b"), n(3.0));
}

#[test]
fn recursion() {
    let mut interp = Interpreter::new();
    interp
        .run(
            "
local function fib(n)
  if n < 2 then return n end
  return fib(n - 1) + fib(n - 2)
end
local r = fib(15)
",
        )
        .unwrap();

    assert_eq!(interp.get_global("r"), n(610.0));
}

#[test]
fn missing_arguments_are_nil() {
    let mut interp = Interpreter::new();
    interp
        .run(
            "
local function second(a, b) return b end
local r = second(1)
local extra = second(1, 2, 3)
",
        )
        .unwrap();

    assert_eq!(interp.get_global("r"), Some(Val::Nil));
    assert_eq!(interp.get_global("extra"), n(2.0));
}

#[test]
fn print_evaluates_arguments() {
    assert_eq!(output_of("print(1+2*3)"), "7\n");
    assert_eq!(output_of("print(\"a\", 1, nil, true, 2.5)"), "a\t1\tnil\ttrue\t2.5\n");
    assert_eq!(output_of("print()"), "\n");
}

#[test]
fn tables() {
    let mut interp = Interpreter::new();
    interp
        .run(
            "
local t = { 10, 20, x = \"ex\", [5] = \"five\" }
local a, b, c, d = t[1], t[2], t.x, t[5]
local missing = t.nope

local mixed = { [1] = \"key\", \"pos\" }
local first = mixed[1]
",
        )
        .unwrap();

    assert_eq!(interp.get_global("a"), n(10.0));
    assert_eq!(interp.get_global("b"), n(20.0));
    assert_eq!(interp.get_global("c"), s("ex"));
    assert_eq!(interp.get_global("d"), s("five"));
    assert_eq!(interp.get_global("missing"), Some(Val::Nil));
    assert_eq!(interp.get_global("first"), s("pos"));
}

#[test]
fn pairs_follows_insertion_order() {
    let out = output_of(
        "
local t = { b = 1, a = 2, c = 3 }
t.a = nil
t.d = 4
for k, v in pairs(t) do print(k, v) end
",
    );

    assert_eq!(out, "b\t1\nc\t3\nd\t4\n");
}

#[test]
fn ipairs_stops_at_first_hole() {
    let out = output_of(
        "
local t = { \"a\", \"b\", \"c\" }
t[5] = \"e\"
for i, v in ipairs(t) do print(i, v) end
",
    );

    assert_eq!(out, "1\ta\n2\tb\n3\tc\n");
}

#[test]
fn function_iterators() {
    let mut interp = Interpreter::new();
    interp
        .run(
            "
local n = 0
local function three()
  n = n + 1
  if n <= 3 then return n end
end
local total = 0
for v in three do total = total + v end
",
        )
        .unwrap();

    assert_eq!(interp.get_global("total"), n(6.0));
}

#[test]
fn return_from_inside_a_loop() {
    let mut interp = Interpreter::new();
    interp
        .run(
            "
local function find(t, want)
  for i, v in ipairs(t) do
    if v == want then return i end
  end
  return nil
end
local idx = find({ \"a\", \"b\", \"c\" }, \"b\")
local none = find({}, \"b\")
",
        )
        .unwrap();

    assert_eq!(interp.get_global("idx"), n(2.0));
    assert_eq!(interp.get_global("none"), Some(Val::Nil));
}

#[test]
fn methods_receive_self() {
    let mut interp = Interpreter::new();
    interp
        .run(
            "
local account = { balance = 100 }
function account:deposit(v)
  self.balance = self.balance + v
end
account:deposit(50)
local b = account.balance

local m = { inner = {} }
function m.inner.twice(x) return x * 2 end
local r = m.inner.twice(21)
",
        )
        .unwrap();

    assert_eq!(interp.get_global("b"), n(150.0));
    assert_eq!(interp.get_global("r"), n(42.0));
}

#[test]
fn multiple_assignment_evaluates_right_side_first() {
    let mut interp = Interpreter::new();
    interp
        .run(
            "
local a, b = 1, 2
a, b = b, a
local c, d = 1
",
        )
        .unwrap();

    assert_eq!(interp.get_global("a"), n(2.0));
    assert_eq!(interp.get_global("b"), n(1.0));
    assert_eq!(interp.get_global("d"), Some(Val::Nil));
}

#[test]
fn logical_operators_short_circuit() {
    let mut interp = Interpreter::new();
    interp
        .run(
            "
local calls = 0
local function bump() calls = calls + 1 return true end
local a = false and bump()
local b = true or bump()
local c = nil or \"default\"
local d = 1 and 2
local e = 0 and \"zero is truthy\"
",
        )
        .unwrap();

    assert_eq!(interp.get_global("calls"), n(0.0));
    assert_eq!(interp.get_global("a"), Some(Val::Bool(false)));
    assert_eq!(interp.get_global("b"), Some(Val::Bool(true)));
    assert_eq!(interp.get_global("c"), s("default"));
    assert_eq!(interp.get_global("d"), n(2.0));
    assert_eq!(interp.get_global("e"), s("zero is truthy"));
}

#[test]
fn strings() {
    let mut interp = Interpreter::new();
    interp
        .run(
            "
local joined = \"ab\" .. \"cd\" .. 1.5
local len = #joined
local long = [==[a]]b]==]
local raw = 'no \\n escapes'
",
        )
        .unwrap();

    assert_eq!(interp.get_global("joined"), s("abcd1.5"));
    assert_eq!(interp.get_global("len"), n(7.0));
    assert_eq!(interp.get_global("long"), s("a]]b"));
    assert_eq!(interp.get_global("raw"), s("no \\n escapes"));
}

#[test]
fn equality_is_typed() {
    let mut interp = Interpreter::new();
    interp
        .run(
            "
local coerced = 1 == \"1\"
local t = {}
local same = t == t
local different = {} == {}
local f = print
local fn_same = f == print
",
        )
        .unwrap();

    assert_eq!(interp.get_global("coerced"), Some(Val::Bool(false)));
    assert_eq!(interp.get_global("same"), Some(Val::Bool(true)));
    assert_eq!(interp.get_global("different"), Some(Val::Bool(false)));
    assert_eq!(interp.get_global("fn_same"), Some(Val::Bool(true)));
}

#[test]
fn chunk_result_and_persistent_locals() {
    let mut interp = Interpreter::new();
    assert_eq!(interp.run("return 1 + 1"), Ok(Val::Num(2.0)));
    assert_eq!(interp.run("local x = 40"), Ok(Val::Nil));
    interp.run("x = x + 2").unwrap();
    assert_eq!(interp.get_global("x"), n(42.0));
}

#[test]
fn registered_natives_are_callable() {
    let (mut interp, out) = capturing();
    interp.register_native("double", |args| match args.first() {
        Some(Val::Num(x)) => Ok(Val::Num(x * 2.0)),
        _ => Ok(Val::Nil),
    });
    interp.run("print(double(21), double())").unwrap();

    assert_eq!(out.text(), "42\tnil\n");
}
