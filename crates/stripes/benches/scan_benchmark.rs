//! Selection and scan benchmarks over an in-memory many-stripe file

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stripes::{
    BatchReaderBuilder, ColumnBuffer, MemoryFile, MemoryFileWriter, StatisticsPredicate,
    StripeCatalog, SelectionOptions, StripeSelector,
};

fn build_file() -> MemoryFile {
    let mut writer = MemoryFileWriter::new(2).with_row_index_stride(1_000);
    for i in 0..200_000i64 {
        if i > 0 && i % 10_000 == 0 {
            writer.flush_stripe();
        }
        writer
            .write_row(&[Some(i), Some(i % 97)])
            .expect("Failed to write row");
    }
    writer.finish()
}

fn benchmark_select(c: &mut Criterion) {
    let file = build_file();
    let catalog = StripeCatalog::from_provider(file.metadata()).expect("Failed to build catalog");
    let predicate = StatisticsPredicate::new().with_integer_range(0, 50_000, 120_000);

    c.bench_function("select_stripes", |b| {
        b.iter(|| {
            let plan = StripeSelector::select(
                black_box(&catalog),
                &predicate,
                &SelectionOptions::default(),
            )
            .expect("Failed to select");
            black_box(plan.total_selected_rows())
        });
    });
}

fn benchmark_scan(c: &mut Criterion) {
    let file = build_file();

    c.bench_function("scan_selected_column", |b| {
        b.iter(|| {
            let predicate = StatisticsPredicate::new().with_integer_range(0, 50_000, 120_000);
            let mut reader = BatchReaderBuilder::new(file.metadata())
                .with_predicate(predicate)
                .with_columns([0])
                .build(file.source(), file.decoder())
                .expect("Failed to build reader");

            let mut sum = 0i64;
            while let Some(rows) = reader.advance().expect("Failed to advance") {
                let mut buffer = ColumnBuffer::new(rows);
                reader.read_column(0, &mut buffer).expect("Failed to read column");
                sum += buffer.as_int64().map(|a| a.values().iter().sum::<i64>()).unwrap_or(0);
            }
            black_box(sum)
        });
    });
}

criterion_group!(benches, benchmark_select, benchmark_scan);
criterion_main!(benches);
