use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use popdyn::{
    logging, project, scenario::ScenarioLoader, snapshot::RunWriter, summary::ProjectionSummary,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Age- and area-structured stock projection runner")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/two_area_stock.yaml")]
    scenario: PathBuf,

    /// Override projection length in years (uses scenario default when omitted)
    #[arg(long)]
    years: Option<usize>,

    /// Recruitment-deviation replicate to draw
    #[arg(long, default_value_t = 0)]
    replicate: u64,

    /// Directory to export projection and summary JSON into
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_with_level(&cli.log_level);

    let loader = ScenarioLoader::new(".");
    let scenario = loader.load(&cli.scenario)?;
    let years = scenario.years(cli.years);
    tracing::info!(
        scenario = %scenario.name,
        years,
        replicate = cli.replicate,
        "starting projection"
    );

    let inputs = scenario.build_inputs(years, cli.replicate)?;
    let output = project(&inputs)?;
    let summary = ProjectionSummary::from_output(&output, Some(scenario.ssb0()));

    for year in &summary.years {
        println!(
            "year {:>3}  biomass {:>14.2}  ssb {:>14.2}  depletion {:>6.3}",
            year.year,
            year.biomass,
            year.spawning_biomass,
            year.depletion.unwrap_or(f64::NAN)
        );
    }

    if let Some(dir) = cli.output_dir {
        let metadata = RunWriter::metadata(&scenario.name, scenario.seed, cli.replicate, &output);
        RunWriter::new(dir).write(&metadata, &output, &summary)?;
    }

    println!(
        "Scenario '{}' projected for {} years. Final spawning biomass: {:.2}",
        scenario.name,
        years,
        summary
            .final_year()
            .map(|year| year.spawning_biomass)
            .unwrap_or(0.0)
    );
    Ok(())
}
