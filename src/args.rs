use clap::Parser;

/// Joins runoff results by commune with commune boundaries.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The CSV file with the results by commune.
    #[clap(short, long, value_parser)]
    pub input: String,

    /// (file path, optional) A JSON file overriding the default settings. Keys are camelCase and all optional.
    /// See the runoff_reconcile manual for the format.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (directory, default '.') Where the merged GeoJSON, the flat CSV, the summaries and the diagnostics are written.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (directory, optional) Where the local boundary files are looked up. Overrides the configuration.
    #[clap(short, long, value_parser)]
    pub boundaries: Option<String>,

    /// (list of comma-separated region numbers or not specified) Restricts the boundaries to these regions.
    #[clap(long, value_parser, value_delimiter = ',')]
    pub regions: Option<Vec<u8>>,

    /// (region number, optional) Region assigned to rows when the CSV has no region column.
    #[clap(long, value_parser)]
    pub default_region: Option<u8>,

    /// (file path) A reference summaries file in JSON format. If provided, runoffmap will
    /// check that the computed summaries match the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// If passed as an argument, no boundary is downloaded.
    #[clap(long, takes_value = false)]
    pub offline: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
