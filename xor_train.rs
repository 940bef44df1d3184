// xor_train.rs
// Trains a 2-hidden-1 network on XOR with mean squared error, saves it,
// reloads it and prints the reloaded model's predictions.
//
// Usage: xor_train [config.json]
// Logging is controlled with RUST_LOG (e.g. RUST_LOG=info).

use log::{error, info, warn};
use std::process;
use tiny_nn::config::{load_config, TrainingConfig};
use tiny_nn::layers::DenseLayer;
use tiny_nn::loss::MeanSquaredError;
use tiny_nn::trainer::Trainer;
use tiny_nn::utils::{Activation, SimpleRng};
use tiny_nn::{Model, Result};

// XOR dataset (binary inputs and expected outputs).
fn xor_samples() -> Vec<(Vec<f32>, Vec<f32>)> {
    vec![
        (vec![0.0, 0.0], vec![0.0]),
        (vec![0.0, 1.0], vec![1.0]),
        (vec![1.0, 0.0], vec![1.0]),
        (vec![1.0, 1.0], vec![0.0]),
    ]
}

fn config_from_args(args: &[String]) -> Result<TrainingConfig> {
    match args.get(1) {
        Some(path) => {
            info!("loading training config from {}", path);
            load_config(path)
        }
        None => Ok(TrainingConfig::default()),
    }
}

fn build_network(config: &TrainingConfig, rng: &mut SimpleRng) -> Result<Model> {
    let mut model = Model::new();
    model.push(DenseLayer::new(
        config.hidden_size.unwrap_or(8),
        config.hidden_activation()?,
        rng,
    ));
    model.push(DenseLayer::new(1, Activation::Sigmoid, rng));
    Ok(model)
}

// Train until the mean epoch loss reaches the target or epochs run out.
fn train(model: &mut Model, config: &TrainingConfig) -> Result<f32> {
    let samples = xor_samples();
    let trainer = Trainer::new(config.learning_rate);
    let log_every = config.log_every.unwrap_or(1000);
    let mut loss = f32::INFINITY;

    for epoch in 0..config.max_epochs {
        trainer.train_epoch(model, &samples, &MeanSquaredError)?;
        loss = Trainer::evaluate(model, &samples, &MeanSquaredError)?;

        if epoch % log_every == 0 {
            info!("epoch {}, mse {:.6}", epoch, loss);
        }
        if loss <= config.target_loss {
            info!("target mse reached at epoch {} (mse {:.6})", epoch, loss);
            return Ok(loss);
        }
    }

    warn!(
        "stopped after {} epochs above target (mse {:.6})",
        config.max_epochs, loss
    );
    Ok(loss)
}

fn run(args: &[String]) -> Result<()> {
    let config = config_from_args(args)?;
    let mut rng = match config.seed {
        Some(seed) => SimpleRng::new(seed),
        None => SimpleRng::from_time(),
    };

    let mut model = build_network(&config, &mut rng)?;
    train(&mut model, &config)?;

    let path = config
        .model_path
        .clone()
        .unwrap_or_else(|| "xor_model.txt".to_string());
    model.save(&path)?;

    let mut loaded = Model::load(&path)?;
    println!("\nTesting loaded XOR model:");
    for (input, target) in xor_samples() {
        let output = loaded.forward(&input)?;
        println!(
            "{} XOR {} = {:.4} (expected: {})",
            input[0], input[1], output[0], target[0]
        );
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if let Err(err) = run(&args) {
        error!("{}", err);
        process::exit(1);
    }
}
