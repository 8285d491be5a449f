//! Session lifecycle through the host-facing table.

use emu_core::Value;
use emu_gameboy::cartridge::blank_rom;
use emu_gameboy::{
    ExecutionFault, InputError, LoadError, RenderError, SessionHandle, SessionTable,
};

/// Blank 32 KiB ROM with `program` at the entry point.
fn rom_with(cartridge_type: u8, ram_code: u8, program: &[u8]) -> Vec<u8> {
    let mut rom = blank_rom(cartridge_type, 0x00, ram_code);
    rom[0x100..0x100 + program.len()].copy_from_slice(program);
    rom
}

#[test]
fn load_unload_cycles_leave_nothing_behind() {
    let table = SessionTable::default();
    let rom = blank_rom(0x00, 0x00, 0x00);
    let mut previous: Option<SessionHandle> = None;
    for _ in 0..64 {
        let handle = table.load(&rom, &[]).expect("load");
        assert_ne!(Some(handle), previous);
        table.render_frame(handle).expect("frame");
        assert_eq!(table.unload(handle), None);
        previous = Some(handle);
    }
    assert_eq!(table.loaded_count(), 0);
    assert_eq!(table.slot_count(), 1);
}

#[test]
fn nop_rom_renders_one_blank_frame() {
    let table = SessionTable::default();
    let handle = table.load(&blank_rom(0x00, 0x00, 0x00), &[]).expect("load");
    let frame = table.render_frame(handle).expect("frame");

    assert_eq!((frame.width(), frame.height()), (160, 144));
    assert_eq!(frame.pixels().len(), 160 * 144);
    assert!(frame.pixels().iter().all(|&p| p == 0xFFFF_FFFF));
    assert_eq!(frame.cycles(), 70_224);
    assert_eq!(frame.frame_number(), 1);
}

#[test]
fn wrong_ram_size_loads_nothing() {
    let table = SessionTable::default();
    let rom = blank_rom(0x03, 0x00, 0x02);
    assert_eq!(
        table.load(&rom, &[0; 100]),
        Err(LoadError::InvalidRam {
            expected: 0x2000,
            actual: 100
        })
    );
    // No battery: any save image is the wrong size.
    assert_eq!(
        table.load(&blank_rom(0x01, 0x00, 0x02), &[0; 0x2000]),
        Err(LoadError::InvalidRam {
            expected: 0,
            actual: 0x2000
        })
    );
    assert_eq!(table.loaded_count(), 0);
    assert_eq!(table.slot_count(), 0);
}

#[test]
fn second_cartridge_is_refused_while_one_is_loaded() {
    let table = SessionTable::default();
    let rom = blank_rom(0x00, 0x00, 0x00);
    let handle = table.load(&rom, &[]).expect("load");
    assert_eq!(table.load(&rom, &[]), Err(LoadError::AlreadyLoaded));
    table.unload(handle);
    assert!(table.load(&rom, &[]).is_ok());
}

#[test]
fn illegal_opcode_halts_the_session() {
    let table = SessionTable::default();
    let handle = table.load(&rom_with(0x00, 0x00, &[0x00, 0xFC]), &[]).expect("load");
    let fault = ExecutionFault::IllegalInstruction {
        opcode: 0xFC,
        pc: 0x0101,
    };

    assert_eq!(table.render_frame(handle), Err(RenderError::Fault(fault)));
    assert_eq!(table.render_frame(handle), Err(RenderError::Halted(fault)));
    assert_eq!(table.render_frame(handle), Err(RenderError::Halted(fault)));

    // State stays inspectable until unload.
    assert_eq!(table.inspect(handle, "cpu.pc"), Some(Value::U16(0x0101)));
    table.unload(handle);
    assert_eq!(table.render_frame(handle), Err(RenderError::NotLoaded));
}

#[test]
fn stale_handles_are_not_loaded() {
    let table = SessionTable::default();
    let rom = blank_rom(0x00, 0x00, 0x00);
    let old = table.load(&rom, &[]).expect("load");
    table.unload(old);
    let new = table.load(&rom, &[]).expect("load");

    assert_eq!(table.render_frame(old), Err(RenderError::NotLoaded));
    assert_eq!(table.set_buttons(old, &[0x01]), Err(InputError::NotLoaded));
    assert_eq!(table.inspect(old, "cpu.pc"), None);
    assert_eq!(table.unload(old), None);

    // The stale unload did not touch the live session.
    assert!(table.render_frame(new).is_ok());
    let unknown = SessionHandle::from_raw(0xFFFF_FFFF_0000_0009);
    assert_eq!(table.render_frame(unknown), Err(RenderError::NotLoaded));
}

#[test]
fn latest_buttons_are_seen_by_the_next_frame() {
    // loop: LD A,$10 ; LDH ($00),A ; LDH A,($00) ; LDH ($80),A ; JR loop
    let program = [0x3E, 0x10, 0xE0, 0x00, 0xF0, 0x00, 0xE0, 0x80, 0x18, 0xF6];
    let table = SessionTable::default();
    let handle = table.load(&rom_with(0x00, 0x00, &program), &[]).expect("load");

    table.set_buttons(handle, &[0x20]).expect("buttons"); // B
    table.set_buttons(handle, &[0x10]).expect("buttons"); // A
    table.render_frame(handle).expect("frame");
    assert_eq!(table.inspect(handle, "memory.0xFF80"), Some(Value::U8(0xDE)));

    // Eight-flag form: Start only.
    table
        .set_buttons(handle, &[0, 0, 0, 0, 0, 0, 1, 0])
        .expect("buttons");
    table.render_frame(handle).expect("frame");
    assert_eq!(table.inspect(handle, "memory.0xFF80"), Some(Value::U8(0xD7)));

    assert_eq!(
        table.set_buttons(handle, &[1, 2]),
        Err(InputError::Malformed { len: 2 })
    );
}

#[test]
fn input_from_another_thread_during_frames() {
    let table = SessionTable::default();
    let handle = table.load(&blank_rom(0x00, 0x00, 0x00), &[]).expect("load");

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for i in 0..200u8 {
                table.set_buttons(handle, &[i]).expect("buttons");
            }
        });
        for _ in 0..5 {
            table.render_frame(handle).expect("frame");
        }
    });

    table.set_buttons(handle, &[0x81]).expect("buttons");
    assert_eq!(table.with_machine(handle, |gb| gb.latch().get().bits()), Some(0x81));
}

#[test]
fn battery_ram_survives_unload_and_reload() {
    // LD A,$0A ; LD ($0000),A ; LD A,$77 ; LD ($A000),A ; HALT
    let program = [0x3E, 0x0A, 0xEA, 0x00, 0x00, 0x3E, 0x77, 0xEA, 0x00, 0xA0, 0x76];
    let rom = rom_with(0x03, 0x02, &program);
    let table = SessionTable::default();

    let handle = table.load(&rom, &[]).expect("load");
    table.render_frame(handle).expect("frame");
    let save = table.unload(handle).expect("battery save");
    assert_eq!(save.len(), 0x2000);
    assert_eq!(save[0], 0x77);

    let handle = table.load(&rom, &save).expect("reload");
    assert_eq!(table.unload(handle).map(|data| data[0]), Some(0x77));
}

#[test]
fn racing_loads_respect_the_session_limit() {
    let table = SessionTable::default();
    let rom = blank_rom(0x00, 0x00, 0x00);
    let barrier = std::sync::Barrier::new(8);

    let loaded = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    table.load(&rom, &[])
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().expect("worker"))
            .collect::<Vec<_>>()
    });

    assert_eq!(loaded.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(loaded
        .iter()
        .filter_map(|result| result.as_ref().err())
        .all(|err| *err == LoadError::AlreadyLoaded));
    assert_eq!(table.loaded_count(), 1);
    assert_eq!(table.slot_count(), 1);
}
