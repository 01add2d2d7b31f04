#![no_main]
use libfuzzer_sys::fuzz_target;
use risc_asm::aarch64::{Aarch64Assembler, Reg};
use risc_asm::ppc::{Crf, PpcAssembler, Prediction};

// Each byte is one step: low bits pick the action, the rest pick a label.
fuzz_target!(|data: &[u8]| {
    let mut a64 = Aarch64Assembler::new();
    let mut ppc = PpcAssembler::ppc64();
    let mut a64_labels = Vec::new();
    let mut ppc_labels = Vec::new();
    for _ in 0..8 {
        match (a64.new_label(), ppc.new_label()) {
            (Ok(a), Ok(p)) => {
                a64_labels.push(a);
                ppc_labels.push(p);
            }
            _ => return,
        }
    }

    for &byte in data {
        let l = (byte >> 3) as usize % 8;
        let _ = match byte & 7 {
            0 => a64.b(a64_labels[l]).and(ppc.b(ppc_labels[l])),
            1 => a64
                .cbz(Reg::X(1), a64_labels[l])
                .and(ppc.beq(Crf(0), ppc_labels[l], Prediction::None)),
            2 => a64
                .tbnz(Reg::W(2), 5, a64_labels[l])
                .and(ppc.bdnz(ppc_labels[l], Prediction::Taken)),
            3 => a64.adr(Reg::X(3), a64_labels[l]).and(ppc.bl(ppc_labels[l])),
            4 => a64.bind(a64_labels[l]).and(ppc.bind(ppc_labels[l])),
            _ => a64.nop().and(ppc.nop()),
        };
    }

    // Whatever happened, finishing must either fail or leave no placeholder.
    if let Ok(result) = a64.finish() {
        assert!(result.words().all(|w| w != 0));
    }
    if let Ok(result) = ppc.finish() {
        assert!(result.words().all(|w| w != 0));
    }
});
