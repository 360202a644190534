use anyhow::Result;
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AlignmentArg {
    Left,
    Center,
    Right,
}

impl AlignmentArg {
    fn as_str(self) -> &'static str {
        match self {
            AlignmentArg::Left => "left",
            AlignmentArg::Center => "center",
            AlignmentArg::Right => "right",
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "receipt-overlay",
    version,
    about = "Stamp text into boxes on an image and export the result as PNG"
)]
struct Cli {
    /// Source image (default: pay.png from settings, if present)
    #[arg(short = 'i', long = "image")]
    image: Option<String>,

    /// Directory to write modified_image_<millis>.png into
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Date text (default: today's date)
    #[arg(long = "date")]
    date: Option<String>,

    /// Date box as x1,y1,x2,y2 in source pixels
    #[arg(long = "date-coords")]
    date_coords: Option<String>,

    /// Payment time text
    #[arg(long = "payment-time")]
    payment_time: Option<String>,

    /// Payment time box as x1,y1,x2,y2
    #[arg(long = "payment-time-coords")]
    payment_time_coords: Option<String>,

    /// Transaction id box as x1,y1,x2,y2 (the id is generated)
    #[arg(long = "transaction-id-coords")]
    transaction_id_coords: Option<String>,

    /// Top-left clock text
    #[arg(long = "top-time")]
    top_time: Option<String>,

    /// Top-left clock box as x1,y1,x2,y2
    #[arg(long = "top-time-coords")]
    top_time_coords: Option<String>,

    /// Font size in source pixels for date, payment time and transaction id
    #[arg(long = "main-font-size")]
    main_font_size: Option<f32>,

    /// Font size in source pixels for the top-left clock
    #[arg(long = "top-time-font-size")]
    top_time_font_size: Option<f32>,

    /// Extra pixels between clock characters (0 draws it as one run)
    #[arg(long = "top-time-spacing", allow_negative_numbers = true)]
    top_time_spacing: Option<i32>,

    /// Horizontal alignment inside each box
    #[arg(short = 'a', long = "alignment", value_enum)]
    alignment: Option<AlignmentArg>,

    /// CSS font-family list
    #[arg(long = "font-family")]
    font_family: Option<String>,

    /// Print a data:image/png;base64 URL instead of writing a file
    #[arg(long = "data-url")]
    data_url: bool,

    /// Print the render report as JSON
    #[arg(long = "json")]
    json: bool,

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
    receipt_overlay::logging::init(cli.verbose)?;

    let output = receipt_overlay::run(receipt_overlay::Config {
        image: cli.image,
        output_dir: cli.output,
        date: cli.date,
        date_coords: cli.date_coords,
        payment_time: cli.payment_time,
        payment_time_coords: cli.payment_time_coords,
        transaction_id_coords: cli.transaction_id_coords,
        top_time: cli.top_time,
        top_time_coords: cli.top_time_coords,
        main_font_size: cli.main_font_size,
        top_time_font_size: cli.top_time_font_size,
        top_time_spacing: cli.top_time_spacing,
        alignment: cli.alignment.map(|value| value.as_str().to_string()),
        font_family: cli.font_family,
        settings_path: cli.read_settings,
        data_url: cli.data_url,
        json: cli.json,
    })
    .await?;

    println!("{}", output);
    Ok(())
}
