//! Classifies a single MRI image from the command line.

use clap::Parser;
use neuroscan::config::{AppConfig, PolicyKind};
use neuroscan::inference::InferenceService;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "predict")]
#[command(about = "Predict the tumor class of a brain MRI image")]
struct Args {
    /// Image to classify (.png, .jpg or .jpeg)
    #[arg(required = true)]
    image_path: PathBuf,

    /// Model weights; overrides the configured path
    #[arg(short, long, env = "MODEL_PATH")]
    model: Option<PathBuf>,

    /// Use the thresholded policy with this minimum confidence
    #[arg(short, long)]
    threshold: Option<f32>,
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));

    let args = Args::parse();
    let mut config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(model) = args.model {
        config.model.path = model;
    }
    if let Some(threshold) = args.threshold {
        config.model.policy = PolicyKind::Thresholded;
        config.model.threshold = threshold;
    }
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let service = match InferenceService::initialize(&config.model, &config.preprocessing) {
        Ok(service) => service,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match service.classify(&args.image_path) {
        Ok(result) => {
            println!("Prediction: {}", result.label);
            println!("Confidence: {}", result.confidence_percent());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
