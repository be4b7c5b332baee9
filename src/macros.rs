macro_rules! dispatch_arch {
    ($type:ident: $arch:expr => $expr:expr) => {{
        use crate::arch::{Arch, Mos6502, RiscV};

        match $arch {
            Arch::Mos6502 => {
                type $type = Mos6502;
                $expr
            }

            Arch::RiscV => {
                type $type = RiscV;
                $expr
            }
        }
    }};
}

macro_rules! emit {
    ($context:expr, $mnemonic:expr) => {
        $context.output().push(crate::codegen::Instruction::op($mnemonic, String::new()))
    };

    ($context:expr, $mnemonic:expr, $($format:tt)*) => {
        $context.output().push(crate::codegen::Instruction::op($mnemonic, format!($($format)*)))
    };
}
