//! The handful of opcodes needed to assemble straight-line method bodies.

pub const ACONST_NULL: u8 = 0x01;
pub const ICONST_0: u8 = 0x03;
pub const LCONST_0: u8 = 0x09;
pub const FCONST_0: u8 = 0x0B;
pub const DCONST_0: u8 = 0x0E;
pub const LDC: u8 = 0x12;
pub const LDC_W: u8 = 0x13;
pub const ALOAD_0: u8 = 0x2A;
pub const ALOAD_1: u8 = 0x2B;
pub const DUP: u8 = 0x59;
pub const PUTFIELD: u8 = 0xB5;
pub const INVOKESPECIAL: u8 = 0xB7;
pub const NEW: u8 = 0xBB;
pub const ATHROW: u8 = 0xBF;
