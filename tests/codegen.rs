use alanc::{
    codegen::{Flow, Program},
    error::{Category, Stage},
    target::Arch,
};

use pretty_assertions::assert_eq;

fn generate(text: &str, arch: Arch) -> Program {
    let mut units = alanc::compile(text, arch);
    assert_eq!(units.len(), 1);

    let unit = units.remove(0);
    assert!(!unit.failed(), "{}", unit.diagnostics());

    unit.program().cloned().unwrap()
}

fn listing(program: &Program) -> Vec<String> {
    program
        .instructions()
        .iter()
        .map(|instruction| {
            instruction
                .to_string()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

/// Ejecuta una imagen 6502a y retorna lo que el programa imprimió.
fn run(image: &[u8]) -> String {
    let mut memory = image.to_vec();
    let (mut a, mut x, mut y, mut zero) = (0u8, 0u8, 0u8, false);
    let mut pc = 0usize;
    let mut output = String::new();

    for _ in 0..100_000 {
        let operand = memory[(pc + 1) % 256];
        let absolute = operand as usize;

        match memory[pc] {
            0xA9 => (a, pc) = (operand, pc + 2),
            0xAD => (a, pc) = (memory[absolute], pc + 3),
            0x8D => {
                memory[absolute] = a;
                pc += 3;
            }

            0x6D => (a, pc) = (a.wrapping_add(memory[absolute]), pc + 3),
            0xA2 => (x, pc) = (operand, pc + 2),
            0xAE => (x, pc) = (memory[absolute], pc + 3),
            0xA0 => (y, pc) = (operand, pc + 2),
            0xAC => (y, pc) = (memory[absolute], pc + 3),
            0xEC => (zero, pc) = (x == memory[absolute], pc + 3),
            0xD0 if zero => pc += 2,
            0xD0 => pc = (pc as u8).wrapping_add(2).wrapping_add(operand) as usize,

            0xFF => {
                match x {
                    1 => output.push_str(&y.to_string()),
                    2 => {
                        let mut address = y as usize;
                        while memory[address] != 0 {
                            output.push(memory[address] as char);
                            address += 1;
                        }
                    }

                    other => panic!("bad system call {}", other),
                }

                pc += 1;
            }

            0x00 => return output,
            other => panic!("bad opcode {:02X} at {:02X}", other, pc),
        }
    }

    panic!("program did not halt")
}

/// El 6502a no tiene salto por igualdad. Un `BNE` corto rodea un salto
/// incondicional, lo cual equivale a un único salto condicional.
fn fold_skips(shape: &[Flow]) -> Vec<Flow> {
    let mut folded = Vec::new();
    let mut skipping = false;

    for &event in shape {
        match event {
            Flow::Skip => skipping = true,
            Flow::Jump(target) if skipping => {
                folded.push(Flow::Branch(target));
                skipping = false;
            }

            other => folded.push(other),
        }
    }

    folded
}

fn run_6502(text: &str) -> String {
    let program = generate(text, Arch::Mos6502);
    run(program.image().unwrap())
}

#[test]
fn empty_program_is_a_single_break() {
    let program = generate("{}$", Arch::Mos6502);
    let image = program.image().unwrap();

    assert_eq!(listing(&program), vec!["BRK"]);
    assert_eq!(image.len(), 256);
    assert!(image.iter().all(|&byte| byte == 0));
}

#[test]
fn mos6502_image_layout() {
    let program = generate("{ int a a = 5 print(a) }$", Arch::Mos6502);
    let image = program.image().unwrap();

    #[rustfmt::skip]
    let code: [u8; 23] = [
        0xA9, 0x00, 0x8D, 0x17, 0x00,  // int a
        0xA9, 0x05, 0x8D, 0x17, 0x00,  // a = 5
        0xAD, 0x17, 0x00,              // a
        0x8D, 0x18, 0x00, 0xAC, 0x18, 0x00, 0xA2, 0x01, 0xFF,
        0x00,
    ];

    assert_eq!(&image[..code.len()], &code[..]);
    assert_eq!(program.layout()[0].storage, "$17");
    assert_eq!(run(image), "5");
}

#[test]
fn mos6502_jump_encoding() {
    let program = generate("{ while true {} }$", Arch::Mos6502);
    let image = program.image().unwrap();

    assert_eq!(&image[..8], &[0xA2, 0x01, 0xEC, 0xFF, 0x00, 0xD0, 0xF9, 0x00]);
    assert_eq!(
        listing(&program),
        vec!["L0:", "LDX #$01", "CPX $FF00", "BNE $F9 ; L0", "L1:", "BRK"]
    );
}

#[test]
fn mos6502_string_heap() {
    let program = generate("{ print(\"hi\") print(\"hi\") }$", Arch::Mos6502);
    let image = program.image().unwrap();

    assert_eq!(image[1], 0xFC);
    assert_eq!(&image[0xFC..], b"hi\0\0");
    assert_eq!(program.data().iter().filter(|data| data.directive == ".asciz").count(), 1);
    assert_eq!(run(image), "hihi");
}

#[test]
fn mos6502_loops_and_arithmetic() {
    let text = "{ int a a = 3 while a != 6 { print(a) a = 1 + a } }$";
    assert_eq!(run_6502(text), "345");
}

#[test]
fn mos6502_integers_wrap() {
    assert_eq!(run_6502("{ print(200 + 100) }$"), "44");
}

#[test]
fn mos6502_booleans_short_circuit() {
    let text = "{
        boolean b
        b = (1 == 1)
        print(b)
        print(!b)
        print(false || b && true)
    }$";

    assert_eq!(run_6502(text), "truefalsetrue");
}

#[test]
fn mos6502_nested_comparisons() {
    let text = "{ boolean b b = true print(b && (2 != 2)) print(true == (b != false)) }$";
    assert_eq!(run_6502(text), "falsetrue");
}

#[test]
fn mos6502_conditionals_and_scopes() {
    let text = "{
        int a
        a = 1
        string s
        s = \"out\"
        if a == 1 {
            string s
            s = \"in\"
            print(s)
        }
        if a == 2 { print(\"never\") }
        print(s)
        string e
        print(e)
    }$";

    assert_eq!(run_6502(text), "inout");
}

#[test]
fn mos6502_string_equality_compares_addresses() {
    let text = "{ string s s = \"hi\" if s == \"hi\" { print(\"eq\") } if s != \"ho\" { print(\"ne\") } }$";
    assert_eq!(run_6502(text), "eqne");
}

#[test]
fn mos6502_out_of_memory() {
    let text = format!("{{ {} }}$", "print(1) ".repeat(30));
    let units = alanc::compile(&text, Arch::Mos6502);

    let unit = &units[0];
    assert!(unit.failed());
    assert!(unit.program().is_none());

    let diagnostics: Vec<_> = unit.diagnostics().iter().collect();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].stage(), Stage::Codegen);
    assert_eq!(diagnostics[0].category(), Category::Internal);
    assert!(diagnostics[0].message().starts_with("Program does not fit in memory"));
}

#[test]
fn riscv_listing() {
    let program = generate("{ int a a = 5 print(a) }$", Arch::RiscV);

    assert_eq!(
        listing(&program),
        vec![
            ".text",
            ".globl main",
            "main:",
            "li t0, 0",
            "mv s1, t0",
            "li t0, 5",
            "mv s1, t0",
            "mv t0, s1",
            "mv a0, t0",
            "li a7, 1",
            "ecall",
            "li a7, 10",
            "ecall",
        ]
    );

    assert!(program.image().is_none());
    assert_eq!(program.layout()[0].storage, "s1");
}

#[test]
fn riscv_variables_spill_to_memory() {
    let text = "{ int a int b int c int d int e int f int g int h int i int j int k int l }$";
    let program = generate(text, Arch::RiscV);

    let storage: Vec<_> = program.layout().iter().map(|p| p.storage.as_str()).collect();
    assert_eq!(storage[10], "s11");
    assert_eq!(storage[11], "var0");

    let data: Vec<_> = program.data().iter().map(|d| (d.label.as_str(), d.directive)).collect();
    assert_eq!(data, vec![("var0", ".word")]);

    assert!(listing(&program).contains(&"sw t0, var0, t6".to_owned()));
}

#[test]
fn riscv_strings_and_booleans() {
    let program = generate("{ print(\"hi\") print(true) }$", Arch::RiscV);
    let text = program.to_string();

    assert!(text.contains("\t.data\n"));
    assert!(text.contains("str0:\t.asciz \"hi\"\n"));
    assert!(text.contains("str1:\t.asciz \"true\"\n"));
    assert!(text.contains("str2:\t.asciz \"false\"\n"));
    assert_eq!(listing(&program).iter().filter(|line| *line == "li a7, 4").count(), 2);
}

#[test]
fn backends_share_control_flow() {
    let text = "{
        int a
        boolean b
        a = 0
        b = true
        while b {
            if a == 3 || !(a != 5) && b { b = false }
            a = 1 + a
            print(a == 2)
        }
        { boolean c c = b == false print(c) }
    }$";

    let mos = generate(text, Arch::Mos6502);
    let riscv = generate(text, Arch::RiscV);

    assert!(mos.shape().contains(&Flow::Skip));
    assert!(!riscv.shape().contains(&Flow::Skip));
    assert_ne!(mos.shape(), riscv.shape());

    assert_eq!(fold_skips(mos.shape()), riscv.shape());
    assert_eq!(run(mos.image().unwrap()), "falsetruefalsefalsetrue");
}

#[test]
fn shape_follows_emitted_branches() {
    let text = "{ int a a = 1 if a != 1 { print(a) } if a == 2 { print(a) } }$";

    let mos = generate(text, Arch::Mos6502);
    let riscv = generate(text, Arch::RiscV);

    let count = |shape: &[Flow], wanted: fn(&Flow) -> bool| {
        shape.iter().filter(|&event| wanted(event)).count()
    };

    let is_branch: fn(&Flow) -> bool = |event| matches!(event, Flow::Branch(_));
    let is_jump: fn(&Flow) -> bool = |event| matches!(event, Flow::Jump(_));
    let is_skip: fn(&Flow) -> bool = |event| *event == Flow::Skip;

    // `!=` rodea un salto, `==` salta directamente
    assert_eq!(count(mos.shape(), is_skip), 1);
    assert_eq!(count(mos.shape(), is_jump), 1);
    assert_eq!(count(mos.shape(), is_branch), 1);

    let bne = listing(&mos).iter().filter(|line| line.starts_with("BNE")).count();
    assert_eq!(bne, 3);

    let conditional = listing(&riscv)
        .iter()
        .filter(|line| ["beq ", "bne ", "beqz ", "bnez "].iter().any(|op| line.starts_with(op)))
        .count();

    assert_eq!(conditional, 2);
    assert_eq!(count(riscv.shape(), is_branch), 2);
    assert_eq!(count(riscv.shape(), is_jump), 0);

    assert_eq!(fold_skips(mos.shape()), riscv.shape());
    assert_eq!(run(mos.image().unwrap()), "");
}
