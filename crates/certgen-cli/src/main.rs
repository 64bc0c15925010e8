mod logging;
mod output;
mod page;
mod rows;

use anyhow::{Context, Result, bail};
use certgen_engine::{
    Field, FontFile, GenerationJob, GenerationOptions, Generator, OutputMode, PlacementMode,
    TemplateFile, TemplateSource,
};
use certgen_runtime::{ClientError, GenerationClient};
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use logging::LogLevelArg;
use page::PageChoice;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "certgen", about = "Batch certificate generator", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level
    #[arg(long, global = true, default_value = "info", value_enum)]
    log_level: LogLevelArg,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Prefix log lines with timestamps
    #[arg(long, global = true)]
    timestamps: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one certificate per spreadsheet row
    Generate {
        /// CSV file with a header row
        #[arg(short, long)]
        rows: PathBuf,

        /// JSON array of field definitions
        #[arg(short, long)]
        fields: PathBuf,

        /// PNG template image
        #[arg(short, long)]
        template: PathBuf,

        /// TrueType font used for every field
        #[arg(long, env = "CERTGEN_FONT")]
        font: PathBuf,

        /// One document per row or one multi-page document
        #[arg(long, default_value = "per-row", value_enum)]
        mode: ModeArg,

        /// Page size: auto, native, a3, a4, a5, letter, legal, tabloid or WxH in mm
        #[arg(long, default_value = "auto")]
        page: PageChoice,

        /// Turn named and custom page sizes landscape
        #[arg(long)]
        landscape: bool,

        /// Generation options JSON (see `init-config`)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the template placement from the config
        #[arg(long, value_enum)]
        placement: Option<PlacementArg>,

        /// Column used to name per-row files
        #[arg(long)]
        name_column: Option<String>,

        /// Output file (single) or directory (per-row); dated default
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the default generation options to a file
    InitConfig {
        /// Destination JSON file
        #[arg(short, long, default_value = "certgen.json")]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Single,
    PerRow,
}

impl From<ModeArg> for OutputMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Single => OutputMode::Single,
            ModeArg::PerRow => OutputMode::PerRow,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PlacementArg {
    Cover,
    Fit,
}

impl From<PlacementArg> for PlacementMode {
    fn from(arg: PlacementArg) -> Self {
        match arg {
            PlacementArg::Cover => PlacementMode::Cover,
            PlacementArg::Fit => PlacementMode::Fit,
        }
    }
}

struct GenerateArgs {
    rows: PathBuf,
    fields: PathBuf,
    template: PathBuf,
    font: PathBuf,
    mode: OutputMode,
    page: PageChoice,
    landscape: bool,
    config: Option<PathBuf>,
    placement: Option<PlacementMode>,
    name_column: Option<String>,
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(
        logging::effective_level(cli.log_level, cli.quiet),
        cli.timestamps,
    );

    match cli.command {
        Commands::Generate {
            rows,
            fields,
            template,
            font,
            mode,
            page,
            landscape,
            config,
            placement,
            name_column,
            output,
        } => {
            generate(GenerateArgs {
                rows,
                fields,
                template,
                font,
                mode: mode.into(),
                page,
                landscape,
                config,
                placement: placement.map(Into::into),
                name_column,
                output,
            })
            .await?;
        }

        Commands::InitConfig { output } => {
            GenerationOptions::default().save(&output).await?;
            println!("Wrote default options to {}", output.display());
        }
    }

    Ok(())
}

async fn load_fields(path: &Path) -> Result<Vec<Field>> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let fields: Vec<Field> = serde_json::from_str(&json)
        .with_context(|| format!("Invalid field definitions in {}", path.display()))?;
    if fields.iter().all(|f| !f.enabled) {
        log::warn!("No enabled fields; certificates will show the template only");
    }
    Ok(fields)
}

async fn generate(args: GenerateArgs) -> Result<()> {
    let mut options = match &args.config {
        Some(path) => GenerationOptions::load(path).await?,
        None => GenerationOptions::default(),
    };
    if let Some(placement) = args.placement {
        options.placement = placement;
    }

    let rows = rows::load_rows(&args.rows).await?;
    let fields = load_fields(&args.fields).await?;
    let names = match args.mode {
        OutputMode::PerRow => output::document_names(&rows, args.name_column.as_deref()),
        OutputMode::Single => Vec::new(),
    };

    let generator = Generator::new(Arc::new(FontFile(args.font.clone())), options);
    let template = Arc::new(TemplateFile(args.template.clone()));

    if args.landscape && !args.page.has_orientation() {
        log::warn!("--landscape only applies to named or WxH page sizes; ignoring it");
    }
    let page_size = match args.page {
        PageChoice::Native => {
            // Warms the cache so the job does not read the file again
            let resources = generator.resources().clone();
            let source = template.clone();
            let asset =
                tokio::task::spawn_blocking(move || resources.templates.load(source.as_ref()))
                    .await??;
            Some(asset.physical_size())
        }
        choice => choice.resolve(args.landscape),
    };

    let template: Arc<dyn TemplateSource> = template;
    let mut job = GenerationJob::new(rows, fields, template, args.mode);
    if let Some(page_size) = page_size {
        info!(
            "Page size {:.1} x {:.1} mm",
            page_size.width_mm, page_size.height_mm
        );
        job = job.with_page_size(page_size);
    }

    let total = job.rows.len();
    info!("Generating {total} certificate(s) from {}", args.template.display());

    let mut client = GenerationClient::spawn(generator);
    let cancel = client.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling");
            cancel.cancel();
        }
    });

    let result = client
        .generate(job, |p| info!("Rendered {}/{}", p.done, p.total))
        .await;
    interrupt.abort();
    let _ = interrupt.await;
    client.shutdown().await;

    let generated = match result {
        Ok(generated) => generated,
        Err(ClientError::Cancelled) => bail!("Generation cancelled; no files written"),
        Err(e) => {
            error!("{e}");
            return Err(e.into());
        }
    };

    let destination = args
        .output
        .unwrap_or_else(|| output::default_output(args.mode, chrono::Local::now().date_naive()));
    let written =
        output::write_outputs(args.mode, &generated.buffers, &names, &destination).await?;

    println!("\nCertificates generated:");
    println!("  Rows: {}", generated.total);
    println!("  Mode: {}", args.mode);
    match args.mode {
        OutputMode::Single => println!("  Output: {}", destination.display()),
        OutputMode::PerRow => println!(
            "  Output: {} ({} files)",
            destination.display(),
            written.len()
        ),
    }

    Ok(())
}
