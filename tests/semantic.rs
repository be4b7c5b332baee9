use alanc::{
    ast::{Ast, ExprKind, Statement},
    error::{Category, Diagnostic, Severity},
    lex::{self, Identifier},
    parse,
    semantic::{self, SymbolTable, Type},
    source::Source,
};

use pretty_assertions::assert_eq;

fn analyze(text: &str) -> (Ast, SymbolTable, Vec<Diagnostic>) {
    let source = Source::new("test.alan", text);
    let (tokens, diagnostics) = lex::tokenize(&source);
    assert!(diagnostics.is_empty(), "unexpected lexer diagnostics");

    let (cst, diagnostics) = parse::parse(&tokens);
    assert!(diagnostics.is_empty(), "unexpected parser diagnostics");

    semantic::analyze(&cst)
}

fn errors(diagnostics: &[Diagnostic]) -> Vec<(Category, u32, u32)> {
    let mut errors: Vec<_> = diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.is_error())
        .map(|diagnostic| (diagnostic.category(), diagnostic.line(), diagnostic.column()))
        .collect();

    errors.sort_by_key(|&(_, line, column)| (line, column));
    errors
}

fn warnings(diagnostics: &[Diagnostic]) -> Vec<String> {
    diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.severity() == Severity::Warning)
        .map(|diagnostic| diagnostic.message().to_owned())
        .collect()
}

fn id(letter: char) -> Identifier {
    Identifier::new(letter).unwrap()
}

#[test]
fn one_error_per_undeclared_use() {
    let (_, _, diagnostics) = analyze("{ a = b + b print(c) }$");

    assert_eq!(
        errors(&diagnostics),
        vec![
            (Category::Declaration, 1, 3),
            (Category::Declaration, 1, 7),
            (Category::Declaration, 1, 11),
            (Category::Declaration, 1, 19),
        ]
    );
}

#[test]
fn inner_declarations_shadow_outer_ones() {
    let (ast, symbols, diagnostics) = analyze("{ int a { string a a = \"x\" } a = 1 }$");

    assert_eq!(errors(&diagnostics), vec![]);
    assert_eq!(symbols.scopes().len(), 2);

    let outer = &ast.body().statements;
    let inner = match &outer[1] {
        Statement::Block(block) => &block.statements,
        other => panic!("expected a block, found {:?}", other),
    };

    let target_scope = |statement: &Statement| match statement {
        Statement::Assignment { target, .. } => target.val().scope.map(|scope| scope.index()),
        other => panic!("expected an assignment, found {:?}", other),
    };

    assert_eq!(target_scope(&inner[1]), Some(1));
    assert_eq!(target_scope(&outer[2]), Some(0));

    let (scope, entry) = symbols
        .lookup(symbols.scopes()[1].id(), id('a'))
        .unwrap();

    assert_eq!(scope.index(), 1);
    assert_eq!(entry.typ(), Type::String);
}

#[test]
fn single_redeclaration_error_at_second_declaration() {
    let (_, _, diagnostics) = analyze("{\n  int a\n  int a\n  { int a }\n}$");

    assert_eq!(errors(&diagnostics), vec![(Category::Declaration, 3, 7)]);

    let error = diagnostics.iter().find(|d| d.is_error()).unwrap();
    assert_eq!(
        error.message(),
        "Identifier `a` was already declared in this scope on line 2"
    );
}

#[test]
fn string_plus_int_is_one_type_error() {
    let (ast, _, diagnostics) = analyze("{ print(\"abc\" + 5) }$");

    assert_eq!(errors(&diagnostics), vec![(Category::Type, 1, 9)]);
    assert_eq!(
        diagnostics[0].message(),
        "Type mismatch: operator `+` cannot be applied to `string` and `int`"
    );

    match &ast.body().statements[0] {
        Statement::Print(value) => {
            assert_eq!(value.val().typ, Type::Error);
            assert!(matches!(value.val().kind, ExprKind::Binary(..)));
        }

        other => panic!("expected print, found {:?}", other),
    }
}

#[test]
fn error_type_does_not_cascade() {
    let (_, _, diagnostics) = analyze("{ int a a = (\"abc\" + 5) + 1 if a == (\"x\" + 2) {} }$");

    let errors = errors(&diagnostics);
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|&(category, _, _)| category == Category::Type));
}

#[test]
fn type_rules() {
    let cases = [
        ("{ int a a = true }$", Some("Type mismatch: cannot assign `boolean` to `a`, which is declared as `int`")),
        ("{ if 5 {} }$", Some("Type mismatch: expected `boolean` condition, found `int`")),
        ("{ while \"x\" {} }$", Some("Type mismatch: expected `boolean` condition, found `string`")),
        ("{ print(!3) }$", Some("Type mismatch: operator `!` cannot be applied to `int`")),
        ("{ print(1 == true) }$", Some("Type mismatch: operator `==` cannot be applied to `int` and `boolean`")),
        ("{ print(true && 1) }$", Some("Type mismatch: operator `&&` cannot be applied to `boolean` and `int`")),
        ("{ print(\"a\" == \"b\") }$", None),
        ("{ print(true != (1 == 2)) }$", None),
        ("{ print(!false || true && false) }$", None),
        ("{ print(1 + 2 + 3) }$", None),
    ];

    for (text, expected) in cases {
        let (_, _, diagnostics) = analyze(text);
        let messages: Vec<_> = diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| d.message())
            .collect();

        assert_eq!(messages, expected.into_iter().collect::<Vec<_>>(), "{}", text);
    }
}

#[test]
fn usage_warnings() {
    let (_, _, diagnostics) = analyze(
        "{ int a int b b = 1 int c print(c) int d d = 1 print(d) int e print(e) e = 2 }$",
    );

    assert_eq!(errors(&diagnostics), vec![]);
    assert_eq!(
        warnings(&diagnostics),
        vec![
            "Variable `a` is declared but never used",
            "Variable `b` is assigned but its value is never used",
            "Variable `c` is used but never initialized",
            "Variable `e` may be used before it is initialized",
        ]
    );
}

#[test]
fn self_referencing_assignment_reads_before_init() {
    let (_, symbols, diagnostics) = analyze("{ int a a = a + 1 }$");

    let entry = symbols.scopes()[0].get(id('a')).unwrap();
    assert!(entry.is_initialized());
    assert!(entry.is_used());
    assert!(entry.is_used_before_init());

    assert_eq!(
        warnings(&diagnostics),
        vec!["Variable `a` may be used before it is initialized"]
    );
}

#[test]
fn scopes_follow_blocks() {
    let (ast, symbols, _) = analyze("{ int a { int b } if true { int c } while false { } }$");

    let parents: Vec<_> = symbols
        .scopes()
        .iter()
        .map(|scope| (scope.id().index(), scope.parent().map(|p| p.index())))
        .collect();

    assert_eq!(
        parents,
        vec![(0, None), (1, Some(0)), (2, Some(0)), (3, Some(0))]
    );

    assert_eq!(ast.body().scope.index(), 0);
    assert!(symbols.lookup(symbols.scopes()[2].id(), id('b')).is_none());
    assert!(symbols.lookup(symbols.scopes()[2].id(), id('a')).is_some());
}

#[test]
fn ast_rendering() {
    let (ast, _, _) = analyze("{ int a a = 1 + 2 print(a == 3) }$");

    let expected = "\
<Program>
-<Block #0>
--<VarDecl>
---[int]
---[a]
--<Assign>
---[a]
---<+ : int>
----[1]
----[2]
--<Print>
---<== : boolean>
----[a]
----[3]
";

    assert_eq!(ast.to_string(), expected);
}

#[test]
fn symbol_table_listing() {
    let (_, symbols, _) = analyze("{\n  int a\n  a = 1\n  { boolean b print(b) }\n}$");

    let expected = "\
Name  Scope Type     Line  Col   Initialized  Used
a     0     int      2     7     yes          no
b     1     boolean  4     13    no           yes
";

    assert_eq!(symbols.to_string(), expected);
}

#[test]
fn analysis_is_deterministic() {
    let text = "{ int a string s a = 1 + a s = \"q\" if s == \"q\" { boolean a a = !true print(a) } }$";

    let (first_ast, _, first) = analyze(text);
    let (second_ast, _, second) = analyze(text);

    assert_eq!(first_ast.to_string(), second_ast.to_string());
    assert_eq!(
        first.iter().map(ToString::to_string).collect::<Vec<_>>(),
        second.iter().map(ToString::to_string).collect::<Vec<_>>()
    );
}
