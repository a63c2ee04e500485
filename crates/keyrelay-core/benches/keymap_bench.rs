//! Criterion benchmarks for key id derivation.
//!
//! Every key message resolves a physical id (scan code table) and a logical
//! id (named-key match, then layout character). Both sit on the window
//! procedure's hot path.
//!
//! Run with:
//! ```bash
//! cargo bench --package keyrelay-core --bench keymap_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use keyrelay_core::keymap::windows_vk::resolve_sided_key;
use keyrelay_core::WINDOWS_KEYMAP;

// ── Representative keys ──────────────────────────────────────────────────────

/// (scan code, extended) pairs covering letters, keypad, navigation and modifiers.
const BENCH_SCAN_CODES: &[(u16, bool)] = &[
    (0x1E, false), // A
    (0x2C, false), // Z
    (0x1C, false), // Enter
    (0x1C, true),  // Numpad Enter
    (0x1D, true),  // Right Ctrl
    (0x2A, false), // Left Shift
    (0x4B, false), // Numpad 4
    (0x4B, true),  // Arrow Left
    (0x45, true),  // Num Lock
    (0x6F, true),  // unmapped, Windows-plane fallback
];

/// (virtual key, layout character) pairs.
const BENCH_VIRTUAL_KEYS: &[(u16, u32)] = &[
    (0x41, 'A' as u32),
    (0x5A, 'Z' as u32),
    (0x0D, '\r' as u32),
    (0x70, 0),
    (0xA1, 0),
    (0x64, '4' as u32),
    (0xBA, ';' as u32),
    (0xAD, 0),
];

// ── Benchmarks ───────────────────────────────────────────────────────────────

fn bench_physical_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("keymap_physical");

    group.bench_function("physical_single", |b| {
        b.iter(|| WINDOWS_KEYMAP.physical_key(black_box(0x1E), black_box(false)))
    });

    group.bench_function("physical_batch_10", |b| {
        b.iter(|| {
            BENCH_SCAN_CODES
                .iter()
                .map(|&(scan, extended)| WINDOWS_KEYMAP.physical_key(black_box(scan), extended))
                .collect::<Vec<_>>()
        })
    });

    group.finish();
}

fn bench_logical_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("keymap_logical");

    for &(virtual_key, character) in BENCH_VIRTUAL_KEYS {
        group.bench_with_input(
            BenchmarkId::new("logical", format!("vk_{virtual_key:02X}")),
            &(virtual_key, character),
            |b, &(vk, ch)| b.iter(|| WINDOWS_KEYMAP.logical_key(black_box(vk), black_box(ch))),
        );
    }

    group.finish();
}

fn bench_sided_resolution(c: &mut Criterion) {
    c.bench_function("resolve_sided_shift", |b| {
        b.iter(|| resolve_sided_key(black_box(0x10), black_box(0x36), black_box(false)))
    });
}

criterion_group!(benches, bench_physical_key, bench_logical_key, bench_sided_resolution);
criterion_main!(benches);
