//! Criterion benchmarks for the keyboard pipeline's hot path.
//!
//! `handle_message` runs inside the window procedure for every keyboard
//! message, so it has to stay well under a frame. These benches drive a
//! pipeline with scripted host adapters and answering framework doubles.
//!
//! Run with:
//! ```bash
//! cargo bench --package keyrelay-win --bench pipeline_bench
//! ```

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use keyrelay_core::{MessageClass, NativeKeyMessage};
use keyrelay_win::infrastructure::framework::mock::{
    AnswerPolicy, RecordingEventSink, RecordingMessenger, RecordingTextSink, ReplyPolicy,
};
use keyrelay_win::infrastructure::key_state::scripted::ScriptedKeyboard;
use keyrelay_win::infrastructure::message_source::scripted::ScriptedMessageSource;
use keyrelay_win::infrastructure::storage::config::PipelineConfig;
use keyrelay_win::{Collaborators, KeyboardPipeline, MessageDisposition};

// ── Fixtures ─────────────────────────────────────────────────────────────────

struct Bench {
    source: Arc<ScriptedMessageSource>,
    pipeline: KeyboardPipeline,
}

fn build(legacy_channel: bool, policy: AnswerPolicy) -> Bench {
    let source = Arc::new(ScriptedMessageSource::new());
    let keyboard = Arc::new(ScriptedKeyboard::new());
    let config = PipelineConfig {
        legacy_channel,
        ..PipelineConfig::default()
    };
    let pipeline = KeyboardPipeline::new(
        &config,
        Collaborators {
            source: source.clone(),
            oracle: keyboard.clone(),
            layout: keyboard,
            event_sink: Arc::new(RecordingEventSink::new(policy)),
            messenger: Arc::new(RecordingMessenger::new(ReplyPolicy::Handled)),
            text_sink: Arc::new(RecordingTextSink::new()),
        },
    );
    Bench { source, pipeline }
}

/// One keystroke: down, its character, up.
fn keystroke() -> [NativeKeyMessage; 3] {
    [
        NativeKeyMessage::key(MessageClass::KeyDown, 0x41, 0x1E, false, false),
        NativeKeyMessage::character(MessageClass::Char, 'a' as u16, 0x1E),
        NativeKeyMessage::key(MessageClass::KeyUp, 0x41, 0x1E, false, true),
    ]
}

fn pump(bench: &mut Bench) {
    while let Some(message) = bench.source.pop() {
        if bench.pipeline.handle_message(black_box(message)) == MessageDisposition::HostDefault {
            bench.source.host_default(&message);
        }
    }
}

// ── Benchmarks ───────────────────────────────────────────────────────────────

fn bench_handled_keystroke(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_handled");

    for (name, legacy_channel) in [("embedder_only", false), ("with_channel", true)] {
        group.bench_function(name, |b| {
            b.iter_batched(
                || {
                    let bench = build(legacy_channel, AnswerPolicy::Handled);
                    bench.source.push_all(keystroke());
                    bench
                },
                |mut bench| pump(&mut bench),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_redispatched_keystroke(c: &mut Criterion) {
    c.bench_function("pipeline_redispatched", |b| {
        b.iter_batched(
            || {
                let bench = build(false, AnswerPolicy::Unhandled);
                bench.source.set_host_translation(0x41, "a");
                bench.source.push_all(keystroke());
                bench
            },
            |mut bench| pump(&mut bench),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_handled_keystroke, bench_redispatched_keystroke);
criterion_main!(benches);
