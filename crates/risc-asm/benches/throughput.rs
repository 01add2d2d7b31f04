//! Performance benchmarks for `risc_asm`.
//!
//! Measures:
//! - Immediate encoder latency (logical, arithmetic, floating point)
//! - Straight-line emission throughput
//! - Label-heavy workloads (forward references patched on bind)
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use risc_asm::aarch64::{Aarch64Assembler, Reg};
use risc_asm::bitmask::{encode_logical_imm, LogicalImmediateTable};
use risc_asm::imm::{encode_arith_imm, encode_f64_imm};
use risc_asm::ppc::{Crf, Gpr, PpcAssembler, Prediction};

// ─── Immediate Encoders ──────────────────────────────────────────────────────

fn bench_immediates(c: &mut Criterion) {
    let mut group = c.benchmark_group("immediates");

    group.bench_function("table_build", |b| b.iter(LogicalImmediateTable::build));

    // Force the shared table before timing lookups.
    let _ = LogicalImmediateTable::get();

    group.bench_function("logical_hit", |b| {
        b.iter(|| encode_logical_imm(black_box(0x00FF_00FF_00FF_00FF), true))
    });

    group.bench_function("logical_miss", |b| {
        b.iter(|| encode_logical_imm(black_box(0x1234_5678_9ABC_DEF0), true))
    });

    group.bench_function("arith", |b| {
        b.iter(|| encode_arith_imm(black_box(0x45_6000)))
    });

    group.bench_function("fp", |b| b.iter(|| encode_f64_imm(black_box(-2.5))));

    group.finish();
}

// ─── Straight-Line Emission ──────────────────────────────────────────────────

fn bench_emission(c: &mut Criterion) {
    let mut group = c.benchmark_group("emission");
    const N: u64 = 10_000;
    group.throughput(Throughput::Bytes(N * 4));

    group.bench_function("aarch64_add_imm", |b| {
        b.iter(|| {
            let mut asm = Aarch64Assembler::new();
            for i in 0..N {
                asm.add_imm(Reg::X(0), Reg::X(1), black_box(i & 0xFFF)).unwrap();
            }
            asm.finish().unwrap()
        })
    });

    group.bench_function("aarch64_mov_imm", |b| {
        b.iter(|| {
            let mut asm = Aarch64Assembler::new();
            for i in 0..N / 4 {
                asm.mov_imm(Reg::X(0), black_box(i.wrapping_mul(0x9E37_79B9_7F4A_7C15)))
                    .unwrap();
            }
            asm.finish().unwrap()
        })
    });

    group.bench_function("ppc_addi", |b| {
        b.iter(|| {
            let mut asm = PpcAssembler::ppc64();
            for i in 0..N {
                asm.addi(Gpr(3), Gpr(3), black_box((i & 0x7FFF) as i32)).unwrap();
            }
            asm.finish().unwrap()
        })
    });

    group.finish();
}

// ─── Labels ──────────────────────────────────────────────────────────────────

fn bench_labels(c: &mut Criterion) {
    let mut group = c.benchmark_group("labels");

    group.bench_function("aarch64_1000_forward", |b| {
        b.iter(|| {
            let mut asm = Aarch64Assembler::new();
            let labels: Vec<_> = (0..1000).map(|_| asm.new_label().unwrap()).collect();
            for &l in &labels {
                asm.cbnz(Reg::X(0), l).unwrap();
            }
            for &l in &labels {
                asm.bind(l).unwrap();
                asm.nop().unwrap();
            }
            asm.finish().unwrap()
        })
    });

    group.bench_function("aarch64_fan_in_1000", |b| {
        b.iter(|| {
            let mut asm = Aarch64Assembler::new();
            let l = asm.new_label().unwrap();
            for _ in 0..1000 {
                asm.b(l).unwrap();
            }
            asm.bind(l).unwrap();
            asm.finish().unwrap()
        })
    });

    group.bench_function("ppc_1000_backward", |b| {
        b.iter(|| {
            let mut asm = PpcAssembler::ppc32();
            let top = asm.new_label().unwrap();
            asm.bind(top).unwrap();
            for _ in 0..1000 {
                asm.bne(Crf(0), top, Prediction::None).unwrap();
            }
            asm.finish().unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_immediates, bench_emission, bench_labels);
criterion_main!(benches);
