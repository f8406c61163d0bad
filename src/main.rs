use anyhow::Result;
use clap::{ArgGroup, Parser};

#[derive(Parser, Debug)]
#[command(
    name = "certificate-renderer",
    version,
    about = "Render personalized certificates from a template image and a CSV roster"
)]
#[command(group(ArgGroup::new("row").required(true).args(["key", "first", "all"])))]
struct Cli {
    /// Template image (PNG, JPEG, GIF, WebP, BMP, TIFF)
    #[arg(short = 't', long = "template")]
    template: String,

    /// Recipient roster (CSV with a header row)
    #[arg(short = 'd', long = "data")]
    data: String,

    /// Field list (JSON array of field specs)
    #[arg(short = 'f', long = "fields")]
    fields: String,

    /// Column used to find the recipient row
    #[arg(short = 'c', long = "key-column")]
    key_column: String,

    /// Key value of the recipient to render
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Render the first row (preview)
    #[arg(long = "first")]
    first: bool,

    /// Render every distinct key in the roster
    #[arg(long = "all")]
    all: bool,

    /// Output mode: preview (PNG) or pdf
    #[arg(short = 'm', long = "mode")]
    mode: Option<String>,

    /// Certificate id used in output filenames
    #[arg(long = "certificate-id", default_value = "0")]
    certificate_id: String,

    /// Output file or directory (default: settings [output] dir)
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Print resolved field values and geometry as JSON instead of rendering
    #[arg(long = "details")]
    details: bool,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    certificate_renderer::logging::init(cli.verbose)?;

    let config = certificate_renderer::Config {
        template: cli.template,
        data: cli.data,
        fields: cli.fields,
        key_column: cli.key_column,
        key: cli.key,
        first: cli.first,
        all: cli.all,
        mode: cli.mode,
        certificate_id: cli.certificate_id,
        output: cli.output,
        details: cli.details,
        settings_path: cli.read_settings,
    };
    let output = certificate_renderer::run(config).await?;
    println!("{}", output);
    Ok(())
}
