use anyhow::{Context, Result};
use arrow::array::Array;
use clap::{Args as ClapArgs, Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use config::Config;
use std::path::{Path, PathBuf};
use stripes::{
    BatchReaderBuilder, ColumnBuffer, MemoryFileWriter, ParquetFooter, ReaderOptions,
    StatisticsPredicate, StripeCatalog, StripeSelector,
};
use tracing::info;

/// Stripe selection and scanning tool
#[derive(Parser, Debug)]
#[command(name = "stripe-scan")]
#[command(about = "Inspect stripe selection and batch positions", long_about = None)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show which row groups of a Parquet file a range predicate keeps
    Plan {
        /// Parquet file to inspect
        path: PathBuf,

        #[command(flatten)]
        range: RangeArgs,
    },
    /// Write a 5-stripe fixture in memory and scan it batch by batch
    Demo {
        #[command(flatten)]
        range: RangeArgs,
    },
}

#[derive(ClapArgs, Debug)]
struct RangeArgs {
    /// Column the range applies to
    #[arg(long, default_value_t = 0)]
    column: usize,

    /// Inclusive lower bound
    #[arg(long)]
    min: Option<i64>,

    /// Inclusive upper bound
    #[arg(long)]
    max: Option<i64>,
}

impl RangeArgs {
    fn predicate(&self, strict: bool) -> StatisticsPredicate {
        let predicate = StatisticsPredicate::new().strict(strict);
        if self.min.is_none() && self.max.is_none() {
            return predicate;
        }
        predicate.with_integer_range(
            self.column,
            self.min.unwrap_or(i64::MIN),
            self.max.unwrap_or(i64::MAX),
        )
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    config.validate()?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log.level)),
        )
        .init();

    let options = ReaderOptions {
        max_batch_size: config.reader.max_batch_size,
        file_precheck: config.reader.file_precheck,
        row_group_pruning: config.reader.row_group_pruning,
    };

    match &args.command {
        Command::Plan { path, range } => plan(&config, options, path, range),
        Command::Demo { range } => demo(&config, options, range),
    }
}

fn plan(config: &Config, options: ReaderOptions, path: &Path, range: &RangeArgs) -> Result<()> {
    let footer = ParquetFooter::open(path)
        .with_context(|| format!("Failed to read footer of {}", path.display()))?
        .with_row_index_stride(config.reader.default_row_index_stride);
    let catalog = StripeCatalog::from_provider(&footer)?;

    let predicate = range.predicate(config.reader.strict_statistics);
    info!(predicate = %predicate, "planning {}", path.display());

    let plan = StripeSelector::select(&catalog, &predicate, &options.selection())?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["stripe", "rows", "bytes", "min", "max", "selected"]);

    for stripe in catalog.stripes() {
        let range_stats = stripe
            .statistics
            .get(&range.column)
            .and_then(|s| s.integer_statistics());
        let selected = plan.selected_ordinals().contains(&stripe.ordinal);
        table.add_row(vec![
            Cell::new(stripe.ordinal),
            Cell::new(stripe.row_count),
            Cell::new(format!("{}..{}", stripe.offset, stripe.end_offset())),
            Cell::new(range_stats.map(|s| s.min.to_string()).unwrap_or_default()),
            Cell::new(range_stats.map(|s| s.max.to_string()).unwrap_or_default()),
            Cell::new(if selected { "yes" } else { "no" }),
        ]);
    }

    println!("{}", table);
    println!(
        "{} of {} rows selected in {} of {} stripes",
        plan.total_selected_rows(),
        plan.total_file_rows(),
        plan.stripes().len(),
        catalog.num_stripes()
    );
    Ok(())
}

fn demo(config: &Config, options: ReaderOptions, range: &RangeArgs) -> Result<()> {
    // 5 stripes of 20 values each: (0,3,..,57), (60,..,117), .., (..,297)
    let mut writer = MemoryFileWriter::new(1);
    for i in (0..300).step_by(3) {
        if i > 0 && i % 60 == 0 {
            writer.flush_stripe();
        }
        writer.write_row(&[Some(i)])?;
    }
    let file = writer.finish();

    let mut reader = BatchReaderBuilder::new(file.metadata())
        .with_predicate(range.predicate(config.reader.strict_statistics))
        .with_columns([0])
        .with_options(options)
        .build(file.source(), file.decoder())?;

    println!(
        "file rows: {}, selected rows: {}",
        reader.file_row_count(),
        reader.total_row_count()
    );

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["stripe", "rows", "position", "file position", "first", "last"]);

    while let Some(rows) = reader.advance()? {
        let mut buffer = ColumnBuffer::new(rows);
        reader.read_column(0, &mut buffer)?;
        let values = buffer
            .as_int64()
            .context("Column 0 did not decode as int64")?;

        let edge = |i: usize| {
            if values.is_null(i) {
                "NULL".to_string()
            } else {
                values.value(i).to_string()
            }
        };

        table.add_row(vec![
            Cell::new(reader.current_stripe_ordinal().map(|o| o.to_string()).unwrap_or_default()),
            Cell::new(rows),
            Cell::new(reader.position()),
            Cell::new(reader.file_position()?),
            Cell::new(edge(0)),
            Cell::new(edge(rows - 1)),
        ]);
    }
    reader.close();

    println!("{}", table);
    Ok(())
}
