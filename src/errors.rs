use thiserror::Error;

/// The decompiler's error taxonomy (spec section 7). Kinds, not identifiers:
/// each variant names a failure class the pipeline can encounter, not a
/// specific diagnostic message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DccError {
    #[error("usage: {0}")]
    Usage(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid opcode 0x{opcode:02X} at offset 0x{offset:06X}")]
    InvalidOpcode { offset: u32, opcode: u8 },

    #[error("invalid 386 opcode 0x{opcode:02X} at offset 0x{offset:06X}")]
    Invalid386Opcode { offset: u32, opcode: u8 },

    #[error("funny segment override at offset 0x{offset:06X}")]
    FunnySegmentOverride { offset: u32 },

    #[error("funny rep prefix at offset 0x{offset:06X}")]
    FunnyRepPrefix { offset: u32 },

    #[error("cannot open file: {0}")]
    CannotOpenFile(String),

    #[error("cannot read file: {0}")]
    CannotReadFile(String),

    #[error("allocation failure: {0}")]
    AllocationFailure(String),

    #[error("unsupported new-EXE format (relocation table at offset 0x40)")]
    UnsupportedNewExeFormat,

    #[error("missing basic block for image offset 0x{0:06X}")]
    MissingBasicBlock(u32),

    #[error("invalid synthetic basic block target 0x{0:08X}")]
    InvalidSyntheticBB(u32),

    #[error("invalid interval basic block")]
    InvalidIntervalBB,

    #[error("IP out of range: 0x{0:06X}")]
    IpOutOfRange(u32),

    #[error("flag definition not found for conditional jump at icode {0}")]
    FlagDefNotFound(usize),

    #[error("unsupported def/use pair under condition-code elimination at icode {0}")]
    UnsupportedCondCodeDefUse(usize),

    #[error("repeat loop condition missing for basic block {0}")]
    RepeatLoopConditionMissing(usize),

    #[error("while loop condition missing for basic block {0}")]
    WhileLoopConditionMissing(usize),
}

pub type DccResult<T> = Result<T, DccError>;
