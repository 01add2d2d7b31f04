//! Property-based tests using proptest.
//!
//! These tests check the immediate encoders and the label protocol across
//! large, randomly generated input spaces, complementing the targeted unit
//! and integration tests and the libfuzzer-based fuzz targets.

use proptest::prelude::*;
use risc_asm::aarch64::{Aarch64Assembler, Reg};
use risc_asm::bitmask::{decode_logical_imm, encode_logical_imm, LogicalImmediateTable};
use risc_asm::imm::{
    decode_arith_imm, decode_fp_imm8, encode_arith_imm, encode_f64_imm, is_arith_imm,
    BranchDisplacement,
};
use risc_asm::ppc::{Gpr, PpcAssembler};

// ── Strategies ──────────────────────────────────────────────────────────

/// Any entry of the logical immediate table.
fn table_entry() -> impl Strategy<Value = u64> {
    (0..LogicalImmediateTable::get().len()).prop_map(|i| LogicalImmediateTable::get().entries()[i].value)
}

fn displacement_family() -> impl Strategy<Value = BranchDisplacement> {
    prop::sample::select(vec![
        BranchDisplacement::A64_IMM26,
        BranchDisplacement::A64_IMM19,
        BranchDisplacement::A64_IMM14,
        BranchDisplacement::A64_ADR,
        BranchDisplacement::PPC_LI,
        BranchDisplacement::PPC_BD,
    ])
}

/// Program shape: `len` words, and for each reference a (site, target) pair.
fn branch_program() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (1usize..200).prop_flat_map(|len| {
        (
            Just(len),
            prop::collection::vec((0..len, 0..=len), 0..32),
        )
    })
}

// ── Immediates ──────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2000))]

    /// An arithmetic immediate encodes exactly when the predicate says so,
    /// and decodes back to itself.
    #[test]
    fn arith_imm_round_trip(value in prop_oneof![any::<u64>(), 0u64..0x1000, (0u64..0x1000).prop_map(|v| v << 12)]) {
        match encode_arith_imm(value) {
            Ok(field) => {
                prop_assert!(is_arith_imm(value));
                prop_assert_eq!(decode_arith_imm(field), value);
            }
            Err(_) => prop_assert!(!is_arith_imm(value)),
        }
    }

    /// Every table entry encodes for 64-bit and decodes to the same value.
    #[test]
    fn logical_imm_table_round_trip(value in table_entry()) {
        let field = encode_logical_imm(value, true).unwrap();
        let n = (field >> 22) & 1;
        let immr = (field >> 16) & 0x3F;
        let imms = (field >> 10) & 0x3F;
        prop_assert_eq!(decode_logical_imm(n, immr, imms), Some(value));
    }

    /// Arbitrary values encode only when they are in the table.
    #[test]
    fn logical_imm_matches_table(value in any::<u64>()) {
        let in_table = LogicalImmediateTable::get().lookup64(value).is_some();
        prop_assert_eq!(encode_logical_imm(value, true).is_ok(), in_table);
    }

    /// A 32-bit logical immediate is a 64-bit one with identical halves.
    #[test]
    fn logical_imm_32bit_is_replicated(value in any::<u32>()) {
        let wide = ((value as u64) << 32) | value as u64;
        prop_assert_eq!(
            encode_logical_imm(value as u64, false).ok(),
            encode_logical_imm(wide, true).ok().filter(|f| f & (1 << 22) == 0)
        );
    }

    /// Every 8-bit FP immediate survives decode then encode.
    #[test]
    fn fp_imm8_round_trip(imm8 in 0u32..256) {
        prop_assert_eq!(encode_f64_imm(decode_fp_imm8(imm8)).unwrap(), imm8);
    }

    /// Arbitrary doubles only encode when exact.
    #[test]
    fn fp_imm_is_exact(bits in any::<u64>()) {
        let value = f64::from_bits(bits);
        if let Ok(imm8) = encode_f64_imm(value) {
            prop_assert_eq!(decode_fp_imm8(imm8).to_bits(), bits);
        }
    }

    /// In-range aligned displacements round-trip; everything else is rejected.
    #[test]
    fn displacement_round_trip(form in displacement_family(), disp in -(1i64 << 30)..(1i64 << 30)) {
        let in_range = disp >= form.min() && disp <= form.max();
        let aligned = disp % form.align() as i64 == 0;
        match form.encode(disp) {
            Ok(field) => {
                prop_assert!(in_range && aligned);
                prop_assert!(field >> form.field_bits() == 0);
                prop_assert_eq!(form.decode(field), disp);
            }
            Err(_) => prop_assert!(!(in_range && aligned)),
        }
    }
}

// ── Label protocol ──────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Branches resolve to the same displacement whether the label is bound
    /// before or after the reference.
    #[test]
    fn branches_resolve_to_their_labels((len, refs) in branch_program()) {
        let mut asm = Aarch64Assembler::new();
        let labels: Vec<_> = (0..=len).map(|_| asm.new_label().unwrap()).collect();
        for pos in 0..len {
            asm.bind(labels[pos]).unwrap();
            match refs.iter().find(|(site, _)| *site == pos) {
                Some(&(_, target)) => asm.b(labels[target]).unwrap(),
                None => asm.nop().unwrap(),
            }
        }
        asm.bind(labels[len]).unwrap();
        let words: Vec<u32> = asm.finish().unwrap().words().collect();
        prop_assert_eq!(words.len(), len);
        for pos in 0..len {
            if let Some(&(_, target)) = refs.iter().find(|(site, _)| *site == pos) {
                let disp = BranchDisplacement::A64_IMM26.decode(words[pos] & 0x03FF_FFFF);
                prop_assert_eq!(disp, (target as i64 - pos as i64) * 4);
            } else {
                prop_assert_eq!(words[pos], 0xD503_201F);
            }
        }
    }

    /// A forward branch over `k` fillers encodes `k + 1` words on both targets.
    #[test]
    fn forward_branch_over_fillers(k in 0u32..2000) {
        let mut a64 = Aarch64Assembler::new();
        let mut ppc = PpcAssembler::ppc32();
        let la = a64.new_label().unwrap();
        let lp = ppc.new_label().unwrap();
        a64.b(la).unwrap();
        ppc.b(lp).unwrap();
        for _ in 0..k {
            a64.nop().unwrap();
            ppc.nop().unwrap();
        }
        a64.bind(la).unwrap();
        ppc.bind(lp).unwrap();
        prop_assert_eq!(a64.finish().unwrap().words().next(), Some(0x1400_0000 | (k + 1)));
        prop_assert_eq!(ppc.finish().unwrap().words().next(), Some(0x4800_0000 | ((k + 1) * 4)));
    }

    /// Any 64-bit constant can be materialised in at most four instructions.
    #[test]
    fn mov_imm_always_succeeds(value in any::<u64>()) {
        let mut asm = Aarch64Assembler::new();
        asm.mov_imm(Reg::X(9), value).unwrap();
        let len = asm.finish().unwrap().len();
        prop_assert!((4..=16).contains(&len));
    }

    /// PPC `li` accepts exactly the signed 16-bit range.
    #[test]
    fn ppc_li_range(value in -100_000i32..100_000) {
        let mut asm = PpcAssembler::ppc32();
        let ok = asm.li(Gpr(3), value).is_ok();
        prop_assert_eq!(ok, (-32768..=32767).contains(&value));
        if ok {
            let word = asm.finish().unwrap().words().next().unwrap();
            prop_assert_eq!(word & 0xFFFF, value as u32 & 0xFFFF);
        }
    }
}
