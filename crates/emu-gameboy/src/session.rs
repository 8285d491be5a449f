//! Sessions: the surface a host bridge drives.
//!
//! A [`Session`] owns at most one running machine. The machine sits behind
//! a mutex that rendering takes without waiting, so contention surfaces as
//! `Busy`. Button state sits outside that mutex in an [`InputLatch`], so
//! input updates never wait for a frame in flight.
//!
//! A [`SessionTable`] hands out opaque [`SessionHandle`]s. Each handle
//! names a slot and the slot's generation; freeing a slot bumps the
//! generation, so handles to an unloaded session go stale instead of
//! reaching whatever is loaded there next.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};

use emu_core::{Observable, Value};
use tracing::info;

use crate::config::{GbConfig, Palette, TableConfig};
use crate::error::{ExecutionFault, InputError, LoadError, RenderError};
use crate::frame::FrameBuffer;
use crate::gameboy::GameBoy;
use crate::joypad::{Buttons, InputLatch};

/// A loaded machine and the fault that stopped it, if any.
struct Loaded {
    machine: GameBoy,
    halted: Option<ExecutionFault>,
}

/// One emulation session.
pub struct Session {
    state: Mutex<Option<Loaded>>,
    latch: Arc<InputLatch>,
    /// Mirrors `state.is_some()` for callers that must not take the lock.
    loaded: AtomicBool,
    palette: Palette,
}

impl Session {
    #[must_use]
    pub fn new(palette: Palette) -> Self {
        Self {
            state: Mutex::new(None),
            latch: Arc::new(InputLatch::new()),
            loaded: AtomicBool::new(false),
            palette,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Loaded>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_lock(&self) -> Option<MutexGuard<'_, Option<Loaded>>> {
        match self.state.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Load a cartridge. An empty `ram` starts with fresh save RAM.
    ///
    /// # Errors
    ///
    /// `Busy` while a frame is rendering, `AlreadyLoaded` if a cartridge is
    /// in, or the validation error for `rom`/`ram`. Nothing changes on
    /// failure.
    pub fn load(&self, rom: &[u8], ram: &[u8]) -> Result<(), LoadError> {
        let mut state = self.try_lock().ok_or(LoadError::Busy)?;
        if state.is_some() {
            return Err(LoadError::AlreadyLoaded);
        }

        let config = GbConfig {
            rom_data: rom.to_vec(),
            ram_data: ram.to_vec(),
            palette: self.palette,
        };
        let machine = GameBoy::with_latch(config, Arc::clone(&self.latch))?;
        let header = machine.bus().cartridge().header();
        info!(title = %header.title, kind = ?header.kind, "cartridge loaded");

        self.latch.set(Buttons::empty());
        *state = Some(Loaded {
            machine,
            halted: None,
        });
        self.loaded.store(true, Ordering::Release);
        Ok(())
    }

    /// Release the machine and return its battery save, if any.
    ///
    /// Waits for a frame in flight. Unloading an empty session does nothing.
    pub fn unload(&self) -> Option<Vec<u8>> {
        let loaded = self.lock().take()?;
        self.loaded.store(false, Ordering::Release);
        self.latch.set(Buttons::empty());
        info!(
            frames = loaded.machine.frame_count(),
            halted = loaded.halted.is_some(),
            "cartridge unloaded"
        );
        loaded.machine.save_data()
    }

    /// Emulate one frame.
    ///
    /// # Errors
    ///
    /// `NotLoaded` without a cartridge, `Busy` while another frame renders,
    /// `Fault` when this frame stops the machine and `Halted` on every
    /// later call.
    pub fn render_frame(&self) -> Result<FrameBuffer, RenderError> {
        let mut state = self.try_lock().ok_or(RenderError::Busy)?;
        let loaded = state.as_mut().ok_or(RenderError::NotLoaded)?;
        if let Some(fault) = loaded.halted {
            return Err(RenderError::Halted(fault));
        }
        loaded.machine.run_frame().map_err(|fault| {
            loaded.halted = Some(fault);
            RenderError::Fault(fault)
        })
    }

    /// Replace the button state from its wire form.
    ///
    /// # Errors
    ///
    /// `NotLoaded` without a cartridge or `Malformed` for a payload that is
    /// neither 1 nor 8 bytes.
    pub fn set_buttons(&self, bytes: &[u8]) -> Result<(), InputError> {
        if !self.loaded.load(Ordering::Acquire) {
            return Err(InputError::NotLoaded);
        }
        self.latch.set(Buttons::from_wire(bytes)?);
        Ok(())
    }

    /// Query machine state by path. `None` when unloaded or unknown.
    #[must_use]
    pub fn inspect(&self, path: &str) -> Option<Value> {
        self.lock().as_ref()?.machine.query(path)
    }

    /// Run `f` against the loaded machine.
    pub fn with_machine<R>(&self, f: impl FnOnce(&mut GameBoy) -> R) -> Option<R> {
        self.lock().as_mut().map(|loaded| f(&mut loaded.machine))
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// The fault that stopped the machine, if it has stopped.
    #[must_use]
    pub fn halted(&self) -> Option<ExecutionFault> {
        self.lock().as_ref()?.halted
    }
}

/// Opaque session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    index: u32,
    generation: u32,
}

impl SessionHandle {
    /// Integer form for crossing a host boundary.
    #[must_use]
    pub const fn to_raw(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self {
            index: raw as u32,
            generation: (raw >> 32) as u32,
        }
    }
}

struct Slot {
    generation: u32,
    session: Option<Arc<Session>>,
}

/// Slot table of sessions addressed by [`SessionHandle`].
pub struct SessionTable {
    slots: RwLock<Vec<Slot>>,
    config: TableConfig,
}

impl SessionTable {
    #[must_use]
    pub fn new(config: TableConfig) -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
            config,
        }
    }

    /// Load a cartridge into a new session.
    ///
    /// # Errors
    ///
    /// `AlreadyLoaded` when `max_loaded` sessions are live, or the
    /// cartridge validation error. No slot is taken on failure.
    pub fn load(&self, rom: &[u8], ram: &[u8]) -> Result<SessionHandle, LoadError> {
        if self.loaded_count() >= self.config.max_loaded {
            return Err(LoadError::AlreadyLoaded);
        }

        // Validation and machine setup run without the table lock.
        let session = Session::new(self.config.palette);
        session.load(rom, ram)?;
        let session = Some(Arc::new(session));

        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let live = slots.iter().filter(|slot| slot.session.is_some()).count();
        if live >= self.config.max_loaded {
            return Err(LoadError::AlreadyLoaded);
        }

        let index = match slots.iter().position(|slot| slot.session.is_none()) {
            Some(index) => {
                slots[index].session = session;
                index
            }
            None => {
                slots.push(Slot {
                    generation: 0,
                    session,
                });
                slots.len() - 1
            }
        };
        Ok(SessionHandle {
            index: index as u32,
            generation: slots[index].generation,
        })
    }

    /// Unload a session and return its battery save, if any. Stale or
    /// unknown handles are a no-op.
    pub fn unload(&self, handle: SessionHandle) -> Option<Vec<u8>> {
        let session = {
            let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
            let slot = slots
                .get_mut(handle.index as usize)
                .filter(|slot| slot.generation == handle.generation)?;
            let session = slot.session.take()?;
            slot.generation = slot.generation.wrapping_add(1);
            session
        };
        session.unload()
    }

    fn lookup(&self, handle: SessionHandle) -> Option<Arc<Session>> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)?
            .session
            .clone()
    }

    /// Emulate one frame of a session.
    ///
    /// # Errors
    ///
    /// `NotLoaded` for a stale handle, otherwise as [`Session::render_frame`].
    pub fn render_frame(&self, handle: SessionHandle) -> Result<FrameBuffer, RenderError> {
        self.lookup(handle)
            .ok_or(RenderError::NotLoaded)?
            .render_frame()
    }

    /// Replace a session's button state.
    ///
    /// # Errors
    ///
    /// `NotLoaded` for a stale handle, otherwise as [`Session::set_buttons`].
    pub fn set_buttons(&self, handle: SessionHandle, bytes: &[u8]) -> Result<(), InputError> {
        self.lookup(handle)
            .ok_or(InputError::NotLoaded)?
            .set_buttons(bytes)
    }

    #[must_use]
    pub fn inspect(&self, handle: SessionHandle, path: &str) -> Option<Value> {
        self.lookup(handle)?.inspect(path)
    }

    pub fn with_machine<R>(
        &self,
        handle: SessionHandle,
        f: impl FnOnce(&mut GameBoy) -> R,
    ) -> Option<R> {
        self.lookup(handle)?.with_machine(f)
    }

    /// Sessions currently holding a cartridge.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.iter().filter(|slot| slot.session.is_some()).count()
    }

    /// Slots allocated so far, live or free.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new(TableConfig::default())
    }
}
