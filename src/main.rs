//! Appliance classification CLI
//!
//! Leave-one-house-out training of pairwise neural network classifiers on
//! appliance current/voltage traces.

use appliance::{Config, Result};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "appliance")]
#[command(about = "Pairwise appliance classifiers with leave-one-house-out validation", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train every class-pair model, holding out one house at a time
    Train {
        /// Checkpoint path prefix (restored if present, saved while training)
        #[arg(short = 's', long)]
        checkpoint: Option<String>,
        /// Stop each model at this step (-1 trains without limit)
        #[arg(short = 'n', long = "max-step", allow_negative_numbers = true)]
        max_step: Option<i64>,
        /// Write the collected results as JSON
        #[arg(long)]
        report: Option<String>,
    },
    /// Show dataset summary
    Info,
    /// Initialize a new project with default config
    Init,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Train {
            checkpoint,
            max_step,
            report,
        } => commands::train(&config, checkpoint, max_step, report),
        Commands::Info => commands::info(&config),
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use appliance::data::TraceDataset;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        println!("Created data/ directory");

        println!("\nNext steps:");
        println!("  1. Put traces_bundle.npy and traces_class_map.json in data/");
        println!("  2. Run 'appliance info' to check the dataset");
        println!("  3. Run 'appliance train -n 1000' to train");

        Ok(())
    }

    pub fn info(config: &Config) -> Result<()> {
        let mut rng = StdRng::seed_from_u64(config.training.seed);
        let dataset = TraceDataset::load(
            &config.data.bundle_path,
            &config.data.class_map_path,
            &mut rng,
        )?;

        println!("Dataset");
        println!("───────────────────────────────");
        println!("  Bundle:    {}", config.data.bundle_path);
        println!("  Traces:    {}", dataset.len());
        println!("  Features:  {}", dataset.num_features());
        println!("  Classes:   {}", dataset.num_classes());
        println!("  Houses:    {}", dataset.num_houses());
        println!(
            "  Pairs:     {}",
            appliance::data::class_pairs(dataset.num_classes()).len()
        );

        if dataset.is_empty() {
            return Ok(());
        }
        println!("\nTraces per house");
        let histogram = dataset.class_histogram_by_house();
        let houses: Vec<String> = histogram.keys().map(|h| format!("{:>5}", h + 1)).collect();
        println!("  {} {}", " ".repeat(dataset.padded_class_name(0).chars().count()), houses.join(""));
        for class in 0..dataset.num_classes() {
            let counts: Vec<String> = histogram
                .values()
                .map(|row| format!("{:>5}", row[class]))
                .collect();
            println!("  {} {}", dataset.padded_class_name(class), counts.join(""));
        }

        Ok(())
    }

    pub fn train(
        config: &Config,
        checkpoint: Option<String>,
        max_step: Option<i64>,
        report_path: Option<String>,
    ) -> Result<()> {
        use appliance::model::PairNetConfig;
        use appliance::training::{build_pair_trainers, Checkpoint, CrossValidator};
        use burn::backend::{Autodiff, NdArray};
        use burn::tensor::backend::Backend;

        type MyBackend = NdArray<f32>;
        type MyAutodiffBackend = Autodiff<MyBackend>;

        let mut training_config = config.training.clone();
        if let Some(n) = max_step {
            training_config.set_max_step(n)?;
        }
        training_config.validate()?;

        let mut rng = StdRng::seed_from_u64(training_config.seed);

        let dataset = TraceDataset::load(
            &config.data.bundle_path,
            &config.data.class_map_path,
            &mut rng,
        )?;

        let device = burn::backend::ndarray::NdArrayDevice::default();
        MyAutodiffBackend::seed(training_config.seed);
        let model_config = PairNetConfig::new(dataset.num_features(), config.model.hidden_size);
        let mut models = build_pair_trainers::<MyAutodiffBackend>(
            &device,
            dataset.num_classes(),
            &model_config,
            training_config.learning_rate,
        );
        println!(
            "Training {} pair models over {} houses",
            models.len(),
            dataset.num_houses()
        );

        let mut validator = CrossValidator::new(&dataset, training_config);
        if let Some(prefix) = checkpoint.or_else(|| config.data.checkpoint.clone()) {
            validator = validator.with_checkpoint(Checkpoint::new(prefix));
        }

        let report = validator.run(&device, &mut models, &mut rng)?;

        println!("\n{}", report);

        if let Some(path) = report_path {
            std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
            println!("Wrote results to {}", path);
        }

        Ok(())
    }
}
