//! Error types for loading, rendering and input.

use thiserror::Error;

/// Why a ROM image was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RomDefect {
    #[error("ROM is {len} bytes, at least 32 KiB is required")]
    TooShort { len: usize },
    #[error("unsupported ROM size code ${code:02X}")]
    RomSizeCode { code: u8 },
    #[error("ROM is {actual} bytes but the header declares {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("header checksum is ${stored:02X}, computed ${computed:02X}")]
    HeaderChecksum { stored: u8, computed: u8 },
    #[error("unsupported cartridge type ${code:02X}")]
    CartridgeType { code: u8 },
    #[error("unsupported RAM size code ${code:02X}")]
    RamSizeCode { code: u8 },
}

/// Failure to load a cartridge into a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("invalid ROM: {0}")]
    InvalidRom(#[from] RomDefect),
    #[error("save RAM is {actual} bytes, cartridge expects {expected}")]
    InvalidRam { expected: usize, actual: usize },
    #[error("a cartridge is already loaded")]
    AlreadyLoaded,
    #[error("session is busy")]
    Busy,
}

/// Fatal condition raised while emulating. The machine stops at the
/// faulting instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExecutionFault {
    #[error("illegal instruction ${opcode:02X} at ${pc:04X}")]
    IllegalInstruction { opcode: u8, pc: u16 },
    #[error("bus fault at ${address:04X}")]
    BusFault { address: u16 },
}

impl From<sharp_sm83::Fault> for ExecutionFault {
    fn from(fault: sharp_sm83::Fault) -> Self {
        match fault {
            sharp_sm83::Fault::IllegalInstruction { opcode, pc } => {
                Self::IllegalInstruction { opcode, pc }
            }
        }
    }
}

/// Failure to produce a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("no cartridge loaded")]
    NotLoaded,
    #[error("a frame is already being rendered")]
    Busy,
    /// The fault that stopped the machine during this frame.
    #[error("execution fault: {0}")]
    Fault(ExecutionFault),
    /// The machine stopped on an earlier frame and stays stopped until unloaded.
    #[error("machine halted by an earlier fault: {0}")]
    Halted(ExecutionFault),
}

/// Failure to update the button state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("no cartridge loaded")]
    NotLoaded,
    #[error("button state must be 1 or 8 bytes, got {len}")]
    Malformed { len: usize },
}
