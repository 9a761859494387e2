use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rustyrnn::dataset::{CharSequenceLoader, SplitFractions};
use rustyrnn::neural_network::SynthesisGradient;
use rustyrnn::training::{Checkpoint, OptimizerKind, Trainer, TrainingConfig};

/// Character-level language modelling with a circulant-gated recurrent network.
#[derive(Parser)]
#[command(name = "rustyrnn", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a model on a text file.
    Train(TrainArgs),

    /// Generate text from a checkpoint.
    Sample(SampleArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum OptimizerArg {
    Adam,
    Rmsprop,
}

#[derive(Clone, Copy, ValueEnum)]
enum SynthesisGradientArg {
    Exact,
    Passthrough,
}

#[derive(Args)]
struct TrainArgs {
    /// UTF-8 text file to train on.
    #[arg(long)]
    data: String,

    /// Continue training from this checkpoint instead of a fresh model.
    #[arg(long)]
    resume: Option<String>,

    #[arg(long, default_value_t = 50)]
    batch_size: usize,
    #[arg(long, default_value_t = 50)]
    seq_length: usize,
    #[arg(long, default_value_t = 0.95)]
    train_frac: f64,
    #[arg(long, default_value_t = 0.05)]
    val_frac: f64,

    #[arg(long, default_value_t = 64)]
    embedding_size: usize,
    #[arg(long, default_value_t = 128)]
    hidden_size: usize,
    #[arg(long, default_value_t = 2)]
    num_layers: usize,
    /// Tile side of the circulant update-gate weight; must divide both layer widths.
    #[arg(long, default_value_t = 32)]
    block_size: usize,
    #[arg(long, value_enum, default_value = "exact")]
    synthesis_gradient: SynthesisGradientArg,
    #[arg(long, default_value_t = 0.08)]
    init_range: f64,
    /// Start every batch from zero state instead of the previous batch's final state.
    #[arg(long)]
    no_state_carry: bool,

    #[arg(long, value_enum, default_value = "rmsprop")]
    optimizer: OptimizerArg,
    #[arg(long, default_value_t = 2e-3)]
    learning_rate: f64,
    #[arg(long, default_value_t = 0.97)]
    learning_rate_decay: f64,
    #[arg(long, default_value_t = 10)]
    decay_after: usize,
    #[arg(long, default_value_t = 0.95)]
    decay_rate: f64,
    #[arg(long, default_value_t = 5.0)]
    grad_clip: f64,
    #[arg(long, default_value_t = 50)]
    max_epochs: usize,

    #[arg(long, default_value_t = 1000)]
    eval_val_every: usize,
    #[arg(long, default_value = "cv")]
    checkpoint_dir: String,
    #[arg(long, default_value = "circulant_gru")]
    savefile: String,
    #[arg(long, default_value_t = 123)]
    seed: u64,
    /// Do not draw a progress bar.
    #[arg(long)]
    quiet: bool,
}

#[derive(Args)]
struct SampleArgs {
    /// Checkpoint written by `train`.
    #[arg(long)]
    checkpoint: String,

    /// Number of characters to generate.
    #[arg(long, default_value_t = 2000)]
    length: usize,

    /// Softmax temperature; lower is more conservative.
    #[arg(long, default_value_t = 1.0)]
    temperature: f64,

    /// Text to condition on.
    #[arg(long, default_value = "")]
    prime: String,

    #[arg(long, default_value_t = 123)]
    seed: u64,
}

impl TrainArgs {
    fn to_config(&self) -> TrainingConfig {
        TrainingConfig {
            batch_size: self.batch_size,
            seq_length: self.seq_length,
            train_frac: self.train_frac,
            val_frac: self.val_frac,
            embedding_size: self.embedding_size,
            hidden_size: self.hidden_size,
            num_layers: self.num_layers,
            block_size: self.block_size,
            synthesis_gradient: match self.synthesis_gradient {
                SynthesisGradientArg::Exact => SynthesisGradient::Exact,
                SynthesisGradientArg::Passthrough => SynthesisGradient::Passthrough,
            },
            init_range: self.init_range,
            remember_states: !self.no_state_carry,
            optimizer: match self.optimizer {
                OptimizerArg::Adam => OptimizerKind::Adam,
                OptimizerArg::Rmsprop => OptimizerKind::RMSprop,
            },
            learning_rate: self.learning_rate,
            learning_rate_decay: self.learning_rate_decay,
            decay_after: self.decay_after,
            decay_rate: self.decay_rate,
            grad_clip: self.grad_clip,
            max_epochs: self.max_epochs,
            eval_val_every: self.eval_val_every,
            checkpoint_dir: Some(self.checkpoint_dir.clone()),
            savefile: self.savefile.clone(),
            seed: self.seed,
            show_progress: !self.quiet,
            ..TrainingConfig::default()
        }
    }
}

fn train(args: TrainArgs) -> Result<()> {
    let config = args.to_config();
    config.validate()?;
    let fractions = SplitFractions::new(config.train_frac, config.val_frac)?;
    let loader = CharSequenceLoader::from_path(
        &args.data,
        config.batch_size,
        config.seq_length,
        fractions,
    )
    .with_context(|| format!("Failed to load training data from {}", args.data))?;

    let mut trainer = match &args.resume {
        Some(path) => {
            let checkpoint = Checkpoint::load_from_path(path)
                .with_context(|| format!("Failed to load checkpoint {}", path))?;
            if checkpoint.vocabulary != *loader.vocabulary() {
                bail!("checkpoint {} was trained on a different vocabulary", path);
            }
            Trainer::from_checkpoint(config, loader, &checkpoint)?
        }
        None => Trainer::new(config, loader)?,
    };

    let history = trainer.fit()?;
    match history.val_losses.last() {
        Some(record) => println!(
            "finished {} iterations, validation loss {:.4}",
            history.iterations, record.loss
        ),
        None => println!("finished {} iterations", history.iterations),
    }
    if history.stopped_early {
        eprintln!("training stopped early because the loss exploded");
    }
    for path in &history.checkpoints {
        eprintln!("checkpoint: {}", path);
    }
    Ok(())
}

fn sample(args: SampleArgs) -> Result<()> {
    let checkpoint = Checkpoint::load_from_path(&args.checkpoint)
        .with_context(|| format!("Failed to load checkpoint {}", args.checkpoint))?;
    let mut model = checkpoint.to_model()?;
    let mut rng = StdRng::seed_from_u64(args.seed);
    let text = model.sample(
        &checkpoint.vocabulary,
        &args.prime,
        args.length,
        args.temperature,
        &mut rng,
    )?;
    println!("{}", text);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Train(args) => train(args),
        Command::Sample(args) => sample(args),
    }
}
