use alanc::{
    error::{Category, Diagnostic},
    lex::{self, Token},
    parse::{self, Child, Cst, Rule},
    source::{Located, Source},
};

use pretty_assertions::assert_eq;

fn tokens(text: &str) -> Vec<Located<Token>> {
    let source = Source::new("test.alan", text);
    let (mut tokens, diagnostics) = lex::tokenize(&source);
    assert!(diagnostics.is_empty(), "unexpected lexer diagnostics");

    // El Eof final no forma parte de ningún programa
    tokens.pop();
    tokens
}

fn parse(text: &str) -> (Cst, Vec<Diagnostic>) {
    parse::parse(&tokens(text))
}

fn statements(cst: &Cst) -> Vec<Rule> {
    cst.node(Rule::Block)
        .and_then(|block| block.node(Rule::StatementList))
        .into_iter()
        .flat_map(|list| list.nodes())
        .filter_map(|statement| statement.nodes().next())
        .map(Cst::rule)
        .collect()
}

#[test]
fn leaves_are_exactly_the_tokens() {
    let text = r#"{
        int a
        string s
        a = 1 + 2 + a
        s = "hello world"
        while (a != 9) { a = 1 + a }
        if !(true == false) || a == 3 && false { print(s) }
        { boolean b b = true print(b) }
    }$"#;

    let tokens = tokens(text);
    let (cst, diagnostics) = parse::parse(&tokens);

    assert!(diagnostics.is_empty());

    let leaves: Vec<_> = cst.terminals().cloned().collect();
    assert_eq!(leaves, tokens);
}

#[test]
fn statement_kinds() {
    let (cst, diagnostics) = parse("{ int a a = 1 print(a) while true {} if false {} {} }$");

    assert!(diagnostics.is_empty());
    assert_eq!(cst.rule(), Rule::Program);
    assert_eq!(
        statements(&cst),
        vec![
            Rule::VarDecl,
            Rule::AssignmentStatement,
            Rule::PrintStatement,
            Rule::WhileStatement,
            Rule::IfStatement,
            Rule::Block,
        ]
    );
}

#[test]
fn tree_rendering() {
    let (cst, _) = parse("{ print(\"ab\") }$");

    let expected = "\
<Program>
-<Block>
--[{]
--<Statement List>
---<Statement>
----<Print Statement>
-----[print]
-----[(]
-----<Expr>
------<Or Expr>
-------<And Expr>
--------<Boolean Expr>
---------<Int Expr>
----------<Unary Expr>
-----------<Primary>
------------<String Expr>
-------------[\"]
-------------<Char List>
--------------[a]
--------------[b]
-------------[\"]
-----[)]
--[}]
-[$]
";

    assert_eq!(cst.to_string(), expected);
}

#[test]
fn plus_binds_tighter_than_equality() {
    let (cst, diagnostics) = parse("{ print(a == b + c) }$");
    assert!(diagnostics.is_empty());

    let boolean = find(&cst, Rule::BooleanExpr).unwrap();
    let operands: Vec<_> = boolean.nodes().collect();
    let operators: Vec<_> = boolean.tokens().map(|token| *token.val()).collect();

    assert_eq!(operators, vec![Token::Equal]);
    assert_eq!(operands.len(), 2);
    assert_eq!(operands[1].tokens().count(), 1);
    assert_eq!(operands[1].nodes().count(), 2);
}

#[test]
fn unexpected_token_names_both_sides() {
    let (_, diagnostics) = parse("{ int }$");

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].category(), Category::Syntax);
    assert_eq!(
        diagnostics[0].message(),
        "Expected an identifier, found `}` instead"
    );

    assert_eq!((diagnostics[0].line(), diagnostics[0].column()), (1, 7));
}

#[test]
fn recovery_continues_after_broken_block() {
    let (cst, diagnostics) = parse("{ { print(1 } int a a = 2 }$");

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].message(),
        "Expected `)`, found `}` instead"
    );

    assert_eq!(
        statements(&cst),
        vec![Rule::Block, Rule::VarDecl, Rule::AssignmentStatement]
    );
}

#[test]
fn leftovers_before_end_of_program() {
    let (cst, diagnostics) = parse("{ } }$");

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].message(),
        "Expected `$`, found `}` instead"
    );

    assert!(cst.node(Rule::Block).is_some());
}

#[test]
fn missing_close_brace() {
    let (_, diagnostics) = parse("{ print(1) $");

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].message(),
        "Expected `}`, found `$` instead"
    );
}

#[test]
fn bad_statement_start() {
    let (_, diagnostics) = parse("{ 5 }$");

    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics[0].message().ends_with("found literal `5` instead"));
}

#[test]
fn empty_input() {
    let (cst, diagnostics) = parse::parse(&[]);

    assert_eq!(cst.rule(), Rule::Program);
    assert!(cst.children().is_empty());
    assert!(diagnostics.is_empty());
}

fn find(cst: &Cst, rule: Rule) -> Option<&Cst> {
    if cst.rule() == rule {
        return Some(cst);
    }

    cst.children().iter().find_map(|child| match child {
        Child::Node(node) => find(node, rule),
        Child::Terminal(_) => None,
    })
}
