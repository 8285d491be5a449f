//! Frame-stepped DMG Game Boy emulator.
//!
//! The CPU crystal runs at 4,194,304 Hz and every component counts in its
//! T-cycles. One frame = 456 dots × 154 lines = 70,224 T-cycles.
//!
//! Hosts drive the emulator through a [`SessionTable`]: load a cartridge,
//! render frames, push button state from any thread, unload.

mod bus;
#[cfg(feature = "native")]
pub mod capture;
pub mod cartridge;
mod config;
mod error;
mod frame;
mod gameboy;
pub mod input;
mod joypad;
mod mapper;
pub mod ppu;
mod serial;
mod session;
mod timer;

pub use bus::GbBus;
pub use cartridge::{Cartridge, CartridgeHeader, MapperKind};
pub use config::{GbConfig, Palette, TableConfig};
pub use error::{ExecutionFault, InputError, LoadError, RenderError, RomDefect};
pub use frame::FrameBuffer;
pub use gameboy::{CPU_HZ, CYCLES_PER_FRAME, GameBoy};
pub use input::{GbButton, InputQueue};
pub use joypad::{Buttons, InputLatch};
pub use session::{Session, SessionHandle, SessionTable};
