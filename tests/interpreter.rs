#[cfg(test)]
mod interpreter_tests {
    use tlox as lox;

    use lox::error::Reporter;
    use lox::interpreter::Interpreter;
    use lox::parser::Parser;
    use lox::resolver::Resolver;
    use lox::scanner::Scanner;
    use lox::token::Token;

    struct Run {
        output: String,
        had_error: bool,
        had_runtime_error: bool,
        diagnostics: Vec<String>,
    }

    /// Drive the whole pipeline against a captured output buffer, the way
    /// the file runner does.
    fn interpret(source: &str) -> Run {
        let reporter = Reporter::new();

        let tokens: Vec<Token> = Scanner::new(source.as_bytes())
            .filter_map(|result| match result {
                Ok(token) => Some(token),
                Err(error) => {
                    reporter.error(&error);
                    None
                }
            })
            .collect();

        let mut parser = Parser::new(tokens, &reporter);
        let statements = parser.parse();

        let mut output: Vec<u8> = Vec::new();

        if !reporter.had_error() {
            let mut interpreter = Interpreter::new(&mut output);

            let mut resolver = Resolver::new(&mut interpreter, &reporter);
            resolver.resolve(&statements);

            if !reporter.had_error() {
                interpreter.interpret(&statements, &reporter);
            }
        }

        Run {
            output: String::from_utf8(output).expect("interpreter output is UTF-8"),
            had_error: reporter.had_error(),
            had_runtime_error: reporter.had_runtime_error(),
            diagnostics: reporter.diagnostics(),
        }
    }

    fn assert_prints(source: &str, expected: &str) {
        let run = interpret(source);

        assert!(!run.had_error, "static errors: {:?}", run.diagnostics);
        assert!(
            !run.had_runtime_error,
            "runtime errors: {:?}",
            run.diagnostics
        );
        assert_eq!(run.output, expected);
    }

    #[test]
    fn test_interpreter_01_arithmetic() {
        assert_prints("print 1 + 2 * 3;", "7\n");
    }

    #[test]
    fn test_interpreter_02_closure_counter() {
        assert_prints(
            "fun makeCounter() { var n = 0; fun c() { n = n + 1; return n; } return c; }\n\
             var c = makeCounter(); print c(); print c(); print c();",
            "1\n2\n3\n",
        );
    }

    #[test]
    fn test_interpreter_03_inheritance_super_init_and_getter() {
        assert_prints(
            "class A { init(x) { this.x = x; } show -> this.x; }\n\
             class B < A { init(x, y) { super(x); this.y = y; } }\n\
             var b = B(1, 2); print b.show; print b.y;",
            "1\n2\n",
        );
    }

    #[test]
    fn test_interpreter_04_static_method_metaclass() {
        assert_prints("class M { static id() { return M; } } print M.id() == M;", "true\n");
    }

    #[test]
    fn test_interpreter_05_static_this_is_the_class() {
        assert_prints(
            "class M { static id() { return this; } } print M.id() == M;",
            "true\n",
        );
    }

    #[test]
    fn test_interpreter_06_self_initializer_is_static_error() {
        let run = interpret("{ var x = x; }");

        assert!(run.had_error);
        assert!(run
            .diagnostics
            .iter()
            .any(|d| d.contains("Can't read local variable in it's own initializer")));
        assert_eq!(run.output, "");
    }

    #[test]
    fn test_interpreter_07_arity_mismatch_is_runtime_error() {
        let run = interpret("fun f(a, b) {} f(1);");

        assert!(!run.had_error);
        assert!(run.had_runtime_error);
        assert!(run
            .diagnostics
            .iter()
            .any(|d| d.contains("Expected 2 arguments but got1.")));
    }

    #[test]
    fn test_interpreter_08_for_with_continue_runs_increment_once() {
        assert_prints(
            "for (var i = 0; i < 3; i = i + 1) { if (i == 1) continue; print i; }",
            "0\n2\n",
        );
    }

    #[test]
    fn test_interpreter_09_break_exits_loop() {
        assert_prints(
            "for (var i = 0; i < 10; i = i + 1) { if (i == 3) break; print i; }",
            "0\n1\n2\n",
        );
    }

    #[test]
    fn test_interpreter_10_return_unwinds_through_loops() {
        assert_prints(
            "fun f() { while (true) { return 7; } } print f();",
            "7\n",
        );
    }

    #[test]
    fn test_interpreter_11_short_circuit() {
        assert_prints(
            "fun boom() { print \"boom\"; return true; }\n\
             print false and boom();\n\
             print true or boom();",
            "false\ntrue\n",
        );
    }

    #[test]
    fn test_interpreter_12_logical_returns_operand() {
        assert_prints("print nil or \"fallback\"; print 1 and 2;", "fallback\n2\n");
    }

    #[test]
    fn test_interpreter_13_string_coercing_plus() {
        assert_prints(
            "print \"n = \" + 4; print 2 + \"!\" ; print \"a\" + \"b\";",
            "n = 4\n2!\nab\n",
        );
    }

    #[test]
    fn test_interpreter_14_plus_type_error() {
        let run = interpret("print true + 1;");

        assert!(run.had_runtime_error);
        assert!(run
            .diagnostics
            .iter()
            .any(|d| d.contains("Operands must be two numbers or two strings.")));
    }

    #[test]
    fn test_interpreter_15_mixed_comparison_is_lexicographic() {
        // Both sides stringify: "10" < "9" because '1' < '9'.
        assert_prints("print 10 < \"9\"; print \"abc\" < \"abd\";", "true\ntrue\n");
    }

    #[test]
    fn test_interpreter_16_comparison_type_error() {
        let run = interpret("print nil < 1;");

        assert!(run.had_runtime_error);
        assert!(run
            .diagnostics
            .iter()
            .any(|d| d.contains("Only strings or numbers are comparable")));
    }

    #[test]
    fn test_interpreter_17_division_by_zero_is_infinity() {
        assert_prints("print 1 / 0; print -1 / 0;", "Infinity\n-Infinity\n");
    }

    #[test]
    fn test_interpreter_18_modulo() {
        assert_prints("print 7 % 3; print 10 % 2;", "1\n0\n");
    }

    #[test]
    fn test_interpreter_19_equality_rules() {
        assert_prints(
            "print nil == nil; print nil == false; print \"\" == false; print 1 == 1; print \"a\" == \"a\";",
            "true\nfalse\nfalse\ntrue\ntrue\n",
        );
    }

    #[test]
    fn test_interpreter_20_truthiness() {
        assert_prints(
            "print !nil; print !false; print !0; print !\"\";",
            "true\ntrue\nfalse\nfalse\n",
        );
    }

    #[test]
    fn test_interpreter_21_ternary_and_comma() {
        assert_prints("print true ? 1 : 2; print (1, 2);", "1\n2\n");
    }

    #[test]
    fn test_interpreter_22_assignment_is_an_expression() {
        assert_prints("var a = 1; print a = 2; print a;", "2\n2\n");
    }

    #[test]
    fn test_interpreter_23_lambdas() {
        assert_prints(
            "var twice = fun (x) { return x * 2; };\n\
             var inc = fun (x) -> x + 1;\n\
             print twice(21); print inc(1);",
            "42\n2\n",
        );
    }

    #[test]
    fn test_interpreter_24_closure_captures_by_reference() {
        assert_prints(
            "var x = 1; fun show() { print x; } x = 2; show();",
            "2\n",
        );
    }

    #[test]
    fn test_interpreter_25_block_scoping_and_shadowing() {
        assert_prints(
            "var a = \"outer\"; { var a = \"inner\"; print a; } print a;",
            "inner\nouter\n",
        );
    }

    #[test]
    fn test_interpreter_26_uninitialized_read_is_runtime_error() {
        let run = interpret("var x; print x;");

        assert!(run.had_runtime_error);
        assert!(run
            .diagnostics
            .iter()
            .any(|d| d.contains("Variable used before initialization")));
    }

    #[test]
    fn test_interpreter_27_uninitialized_then_assigned_ok() {
        assert_prints("var x; x = 3; print x;", "3\n");
    }

    #[test]
    fn test_interpreter_28_undefined_variable_runtime_error() {
        let run = interpret("print missing;");

        assert!(run.had_runtime_error);
        assert!(run
            .diagnostics
            .iter()
            .any(|d| d.contains("Undefined variable 'missing'.")));
    }

    #[test]
    fn test_interpreter_29_calling_non_callable() {
        let run = interpret("var x = 1; x();");

        assert!(run.had_runtime_error);
        assert!(run
            .diagnostics
            .iter()
            .any(|d| d.contains("Can only call functions and classes")));
    }

    #[test]
    fn test_interpreter_30_method_binding() {
        assert_prints(
            "class Greeter { init(name) { this.name = name; } greet() { return \"hi \" + this.name; } }\n\
             var g = Greeter(\"ada\");\n\
             var m = g.greet;\n\
             print m();",
            "hi ada\n",
        );
    }

    #[test]
    fn test_interpreter_31_method_lookup_walks_superclass_chain() {
        assert_prints(
            "class A { m() { return \"A.m\"; } }\n\
             class B < A {}\n\
             class C < B {}\n\
             print C().m();",
            "A.m\n",
        );
    }

    #[test]
    fn test_interpreter_32_super_method_dispatch() {
        assert_prints(
            "class A { m() { return \"A\"; } }\n\
             class B < A { m() { return \"B+\" + super.m(); } }\n\
             print B().m();",
            "B+A\n",
        );
    }

    #[test]
    fn test_interpreter_33_fields_shadow_methods() {
        assert_prints(
            "class C { m() { return \"method\"; } }\n\
             var c = C();\n\
             c.m = \"field\";\n\
             print c.m;",
            "field\n",
        );
    }

    #[test]
    fn test_interpreter_34_unknown_property() {
        let run = interpret("class C {} print C().nope;");

        assert!(run.had_runtime_error);
        assert!(run
            .diagnostics
            .iter()
            .any(|d| d.contains("Undefined property 'nope'.")));
    }

    #[test]
    fn test_interpreter_35_set_on_non_instance() {
        let run = interpret("var x = 1; x.field = 2;");

        assert!(run.had_runtime_error);
        assert!(run
            .diagnostics
            .iter()
            .any(|d| d.contains("Only instances have fields.")));
    }

    #[test]
    fn test_interpreter_36_initializer_with_bare_return_still_yields_instance() {
        assert_prints(
            "class C { init() { this.v = 1; return; } } var c = C(); print c.v;",
            "1\n",
        );
    }

    #[test]
    fn test_interpreter_37_class_arity_follows_init() {
        let run = interpret("class C { init(a) { this.a = a; } } C();");

        assert!(run.had_runtime_error);
        assert!(run
            .diagnostics
            .iter()
            .any(|d| d.contains("Expected 1 arguments but got0.")));
    }

    #[test]
    fn test_interpreter_38_superclass_must_be_a_class() {
        let run = interpret("var NotAClass = 1; class C < NotAClass {}");

        assert!(run.had_runtime_error);
        assert!(run
            .diagnostics
            .iter()
            .any(|d| d.contains("Superclass must be a class.")));
    }

    #[test]
    fn test_interpreter_39_stringification() {
        assert_prints(
            "print nil; print true; print 7; print 2.5; print \"s\";\n\
             fun f() {} print f;\n\
             var l = fun (x) -> x; print l(1) == 1; print l;\n\
             class K {} print K;",
            "nil\ntrue\n7\n2.5\ns\n<fn f>\ntrue\n<lambda>\n<class K>\n",
        );
    }

    #[test]
    fn test_interpreter_40_instance_field_dump() {
        assert_prints(
            "class Point { init(x, y) { this.x = x; this.y = y; } }\n\
             print Point(1, 2);",
            "<Point> { x: 1, y: 2 }\n",
        );
    }

    #[test]
    fn test_interpreter_41_cyclic_instance_dump() {
        assert_prints(
            "class Node { init() { this.next = nil; } }\n\
             var n = Node(); n.next = n;\n\
             print n;",
            "<Node> { next: <Node> {...} }\n",
        );
    }

    #[test]
    fn test_interpreter_42_number_native() {
        assert_prints(
            "print number(\"42\") + 1; print number(\"oops\"); print number(5);",
            "43\nnil\nnil\n",
        );
    }

    #[test]
    fn test_interpreter_43_number_round_trips_stringification() {
        assert_prints(
            "print number(\"2.5\") == 2.5; print number(\"7\") == 7;",
            "true\ntrue\n",
        );
    }

    #[test]
    fn test_interpreter_44_exit_stops_silently() {
        let run = interpret("print 1; exit(); print 2;");

        assert!(!run.had_error);
        assert!(!run.had_runtime_error);
        assert_eq!(run.output, "1\n");
    }

    #[test]
    fn test_interpreter_45_runtime_error_stops_interpretation() {
        let run = interpret("print 1; print -\"x\"; print 2;");

        assert!(run.had_runtime_error);
        assert_eq!(run.output, "1\n");
        assert!(run
            .diagnostics
            .iter()
            .any(|d| d.contains("Operand must be a number.")));
    }

    #[test]
    fn test_interpreter_46_getter_runs_at_property_read() {
        assert_prints(
            "class Circle {\n\
               init(r) { this.r = r; }\n\
               area -> 3 * this.r * this.r;\n\
             }\n\
             var c = Circle(2);\n\
             print c.area;",
            "12\n",
        );
    }

    #[test]
    fn test_interpreter_47_nested_closures_share_slots() {
        assert_prints(
            "fun outer() {\n\
               var n = 0;\n\
               fun bump() { n = n + 1; }\n\
               fun read() { return n; }\n\
               bump(); bump();\n\
               return read();\n\
             }\n\
             print outer();",
            "2\n",
        );
    }

    #[test]
    fn test_interpreter_48_while_loop() {
        assert_prints(
            "var i = 0; while (i < 3) { print i; i = i + 1; }",
            "0\n1\n2\n",
        );
    }

    #[test]
    fn test_interpreter_49_comma_evaluates_left_to_right() {
        assert_prints("var a = 0; print (a = 1, a + 1);", "2\n");
    }

    #[test]
    fn test_interpreter_50_same_program_same_output() {
        let source = "for (var i = 0; i < 3; i = i + 1) print i * i;";

        let first = interpret(source);
        let second = interpret(source);

        assert_eq!(first.output, second.output);
        assert_eq!(first.output, "0\n1\n4\n");
    }
}
