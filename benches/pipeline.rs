//! Pipeline throughput over in-memory sources.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::path::PathBuf;
use vqscore::source::{MockSource, ResolutionProbe, SourceError};
use vqscore::{CancelToken, Orchestrator, PixelFormat, PnormComparator, RunOptions};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 180;
const FRAMES: usize = 32;

struct NoProbe;

impl ResolutionProbe for NoProbe {
    fn resolution(&self, _path: &std::path::Path) -> Result<(u32, u32), SourceError> {
        Err(SourceError::Probe("explicit size given".into()))
    }
}

fn options(threads: usize) -> RunOptions {
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
    let mut options = RunOptions::new(manifest.clone(), manifest);
    options.width = Some(WIDTH);
    options.height = Some(HEIGHT);
    options.pixel_format = PixelFormat::RGB48LE;
    options.threads = Some(threads);
    options
}

fn bench_pipeline(c: &mut Criterion) {
    let frame_len = PixelFormat::RGB48LE.frame_len(WIDTH, HEIGHT);
    let comparator = PnormComparator::default();

    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Elements(FRAMES as u64));
    group.sample_size(20);

    for threads in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let mut orchestrator = Orchestrator::new(CancelToken::new());
                let config = orchestrator
                    .validate(options(threads), &NoProbe)
                    .expect("valid options");
                orchestrator
                    .run(
                        &config,
                        MockSource::indexed(FRAMES, frame_len),
                        MockSource::uniform(FRAMES, frame_len, 128),
                        &comparator,
                    )
                    .expect("run succeeds")
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
