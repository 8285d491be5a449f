//! Single-instruction state tests for the SM83.
//!
//! Each case gives the full register file and the memory bytes it touches
//! before and after one `step()`, plus the expected T-cycle cost. The
//! format follows the `SingleStepTests` JSON layout.
//!
//! Test data lives in `tests/data/sm83_cases.json`.

use emu_core::{Cpu, SimpleBus};
use serde::Deserialize;
use sharp_sm83::{Registers, Sm83};

#[derive(Deserialize)]
struct TestCase {
    name: String,
    initial: CpuState,
    #[serde(rename = "final")]
    final_state: CpuState,
    cycles: u32,
}

#[derive(Deserialize)]
struct CpuState {
    pc: u16,
    sp: u16,
    a: u8,
    f: u8,
    b: u8,
    c: u8,
    d: u8,
    e: u8,
    h: u8,
    l: u8,
    ram: Vec<(u16, u8)>,
}

impl CpuState {
    fn registers(&self) -> Registers {
        Registers {
            a: self.a,
            f: self.f,
            b: self.b,
            c: self.c,
            d: self.d,
            e: self.e,
            h: self.h,
            l: self.l,
            sp: self.sp,
            pc: self.pc,
            ..Registers::default()
        }
    }
}

fn compare(cpu: &Sm83, bus: &SimpleBus, expected: &CpuState) -> Vec<String> {
    let mut errors = Vec::new();
    let got = cpu.registers();
    let want = expected.registers();

    let pairs = [
        ("PC", got.pc, want.pc),
        ("SP", got.sp, want.sp),
        ("AF", got.af(), want.af()),
        ("BC", got.bc(), want.bc()),
        ("DE", got.de(), want.de()),
        ("HL", got.hl(), want.hl()),
    ];
    for (name, g, w) in pairs {
        if g != w {
            errors.push(format!("{name}: got ${g:04X}, want ${w:04X}"));
        }
    }

    for &(addr, value) in &expected.ram {
        let actual = bus.peek(addr);
        if actual != value {
            errors.push(format!("RAM[${addr:04X}]: got ${actual:02X}, want ${value:02X}"));
        }
    }

    errors
}

#[test]
fn single_step_cases() {
    let text = include_str!("data/sm83_cases.json");
    let cases: Vec<TestCase> = serde_json::from_str(text).expect("valid fixture JSON");
    assert!(!cases.is_empty());

    let mut failures = Vec::new();
    for case in &cases {
        let mut bus = SimpleBus::new();
        for &(addr, value) in &case.initial.ram {
            bus.load(addr, &[value]);
        }
        let mut cpu = Sm83::with_registers(case.initial.registers());

        match cpu.step(&mut bus) {
            Ok(cycles) => {
                let mut errors = compare(&cpu, &bus, &case.final_state);
                if cycles != case.cycles {
                    errors.push(format!("cycles: got {cycles}, want {}", case.cycles));
                }
                if !errors.is_empty() {
                    failures.push(format!("{}: {}", case.name, errors.join("; ")));
                }
            }
            Err(fault) => failures.push(format!("{}: {fault}", case.name)),
        }
    }

    assert!(failures.is_empty(), "{} failures:\n{}", failures.len(), failures.join("\n"));
}
