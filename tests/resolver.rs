#[cfg(test)]
mod resolver_tests {
    use tlox as lox;

    use lox::error::Reporter;
    use lox::interpreter::Interpreter;
    use lox::parser::Parser;
    use lox::resolver::Resolver;
    use lox::scanner::Scanner;
    use lox::token::Token;

    /// Run the front-end through resolution and hand back the sink.
    fn analyze(source: &str) -> Reporter {
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

        assert!(!reporter.had_error(), "test source must parse cleanly");

        let mut output: Vec<u8> = Vec::new();
        let mut interpreter = Interpreter::new(&mut output);

        let mut resolver = Resolver::new(&mut interpreter, &reporter);
        resolver.resolve(&statements);

        reporter
    }

    fn assert_diagnostic(source: &str, fragment: &str) {
        let reporter = analyze(source);

        assert!(reporter.had_error(), "expected a resolve error");
        assert!(
            reporter
                .diagnostics()
                .iter()
                .any(|d| d.contains(fragment)),
            "no diagnostic containing {:?} in {:?}",
            fragment,
            reporter.diagnostics()
        );
    }

    fn assert_clean(source: &str) {
        let reporter = analyze(source);

        assert!(
            !reporter.had_error(),
            "unexpected diagnostics: {:?}",
            reporter.diagnostics()
        );
    }

    #[test]
    fn test_resolver_01_self_initializer() {
        assert_diagnostic(
            "{ var x = x; }",
            "Can't read local variable in it's own initializer",
        );
    }

    #[test]
    fn test_resolver_02_duplicate_declaration() {
        assert_diagnostic(
            "{ var a = 1; var a = 2; print a; }",
            "Already a variable with this name in this scope",
        );
    }

    #[test]
    fn test_resolver_03_top_level_return() {
        assert_diagnostic("return 1;", "Can't return from top-level code.");
    }

    #[test]
    fn test_resolver_04_return_value_from_initializer() {
        assert_diagnostic(
            "class C { init() { return 1; } }",
            "Can't return a value from an initializer",
        );
    }

    #[test]
    fn test_resolver_05_bare_return_from_initializer_ok() {
        assert_clean("class C { init() { return; } }");
    }

    #[test]
    fn test_resolver_06_break_outside_loop() {
        assert_diagnostic("break;", "Can't use 'break' outside a loop.");
    }

    #[test]
    fn test_resolver_07_continue_outside_loop() {
        assert_diagnostic("continue;", "Can't use 'continue' outside a loop.");
    }

    #[test]
    fn test_resolver_08_break_inside_nested_function_is_outside() {
        assert_diagnostic(
            "while (true) { fun f() { break; } f(); }",
            "Can't use 'break' outside a loop.",
        );
    }

    #[test]
    fn test_resolver_09_this_outside_class() {
        assert_diagnostic("print this;", "Can't use 'this' outside of a class");
    }

    #[test]
    fn test_resolver_10_super_outside_class() {
        assert_diagnostic(
            "fun f() { return super.m; } f();",
            "Can't use 'super' outside of a class.",
        );
    }

    #[test]
    fn test_resolver_11_super_without_superclass() {
        assert_diagnostic(
            "class C { m() { return super.m; } }",
            "Can't use 'super' in a class with no superclass.",
        );
    }

    #[test]
    fn test_resolver_12_inherit_from_itself() {
        assert_diagnostic("class C < C {}", "A class can't inherit from itself.");
    }

    #[test]
    fn test_resolver_13_unused_local_reported() {
        assert_diagnostic("{ var x = 5; }", "Local variable x is not used");
    }

    #[test]
    fn test_resolver_14_read_local_not_reported() {
        assert_clean("{ var x = 5; print x; }");
    }

    #[test]
    fn test_resolver_15_unused_parameters_allowed() {
        // Parameters are part of the signature; an unused one must not turn
        // a valid program into a static error.
        assert_clean("fun f(a, b) {} f(1, 2);");
    }

    #[test]
    fn test_resolver_16_super_call_outside_initializer() {
        assert_diagnostic(
            "class A {} class B < A { m() { super(); } }",
            "Can't call 'super' constructor outside of an initializer.",
        );
    }

    #[test]
    fn test_resolver_17_classes_with_inheritance_resolve() {
        assert_clean(
            "class A { init(x) { this.x = x; } show -> this.x; }\n\
             class B < A { init(x, y) { super(x); this.y = y; } }\n\
             var b = B(1, 2); print b.show; print b.y;",
        );
    }

    #[test]
    fn test_resolver_18_static_method_this_allowed() {
        assert_clean("class M { static id() { return this; } } print M.id();");
    }

    #[test]
    fn test_resolver_19_globals_forward_reference() {
        // Top-level declarations may be referenced before their textual
        // definition from inside a function body.
        assert_clean("fun f() { return g(); } fun g() { return 1; } print f();");
    }

    #[test]
    fn test_resolver_20_shadowing_in_inner_scope_ok() {
        assert_clean("var a = 1; { var a = 2; print a; } print a;");
    }
}
