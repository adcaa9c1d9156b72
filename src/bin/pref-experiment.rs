use clap::Parser;
use preflearn::cli::Opts;
use preflearn::logging::{DisplayLogger, TensorBoardLogger};
use preflearn::pairs::{generate_pair_archives, PairArchive};
use preflearn::torch::{evaluate, RewardModel, Trainer};
use preflearn::{
    extract_segments, Dataset, ExperimentConfig, LabelPolicy, PairSampler, PreferenceLoader,
    Prng, Split, SweepConfig, TrajectoryStats,
};
use rand::SeedableRng;
use std::error::Error;
use std::fs::{self, OpenOptions};
use std::io::Write;
use yansi::Paint;

/// Generate (or reuse) held-out archives and wrap each in a loader.
fn held_out_loaders<'a>(
    sweep: &SweepConfig,
    dataset: &'a Dataset,
    sampler: &PairSampler,
    split: Split,
    policies: &[LabelPolicy],
    rng: &mut Prng,
) -> Result<Vec<PreferenceLoader<'a>>, Box<dyn Error>> {
    let outcomes = generate_pair_archives(
        &sweep.experiment,
        sampler,
        split,
        sweep.pairs.test_pairs,
        policies,
        rng,
    )?;
    outcomes
        .iter()
        .map(|outcome| -> Result<_, Box<dyn Error>> {
            let archive = PairArchive::from_file(outcome.path())?;
            let loader = PreferenceLoader::from_archive(
                dataset,
                archive,
                sweep.trainer.batch_size,
                sweep.network.device,
            )?;
            Ok(loader)
        })
        .collect()
}

fn append_log_line(
    experiment: &ExperimentConfig,
    line: std::fmt::Arguments,
) -> Result<(), Box<dyn Error>> {
    let log_path = experiment.log_path("experiment.log");
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    writeln!(log, "{}", line)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let opts = Opts::parse();
    let sweep = opts.sweep_config()?;
    let experiment = &sweep.experiment;
    let device = sweep.network.device;
    tch::manual_seed(sweep.seed as i64);
    let mut rng = Prng::seed_from_u64(sweep.seed);

    let dataset = Dataset::from_file(experiment.dataset_path())?;
    if let Some(stats) = TrajectoryStats::from_dataset(&dataset) {
        println!("{}\n{}", Paint::fixed(35, &experiment.env_name), stats);
    }
    let sampler = PairSampler::new(
        &dataset,
        extract_segments(&dataset),
        sweep.pairs.min_length,
    )?;

    // Test pairs share the labeling policy of the training pairs; eval pairs do not.
    let test_loaders = held_out_loaders(
        &sweep,
        &dataset,
        &sampler,
        Split::Test,
        &sweep.pairs.policies,
        &mut rng,
    )?;
    let eval_loader = held_out_loaders(
        &sweep,
        &dataset,
        &sampler,
        Split::Eval,
        &[sweep.eval_policy],
        &mut rng,
    )?
    .pop()
    .ok_or("no eval archive was generated")?;

    for &num_pairs in &sweep.pairs.pair_counts {
        let outcomes = generate_pair_archives(
            experiment,
            &sampler,
            Split::Train,
            num_pairs,
            &sweep.pairs.policies,
            &mut rng,
        )?;

        for ((outcome, &policy), test_loader) in outcomes
            .iter()
            .zip(&sweep.pairs.policies)
            .zip(&test_loaders)
        {
            println!(
                "{} {} pairs ({})",
                Paint::fixed(35, "training"),
                num_pairs,
                policy
            );
            let archive = PairArchive::from_file(outcome.path())?;
            let loader =
                PreferenceLoader::from_archive(&dataset, archive, sweep.trainer.batch_size, device)?;

            let model_path = experiment.reward_model_path(num_pairs, policy, &sweep.model_tag);
            let model = RewardModel::load_or_init(
                dataset.obs_dim(),
                dataset.act_dim(),
                &sweep.network,
                &model_path,
            )?;
            let mut trainer = Trainer::new(&model, sweep.trainer.clone(), &sweep.optimizer)?
                .with_checkpoint_path(&model_path);
            let mut logger = (
                DisplayLogger,
                TensorBoardLogger::new(experiment.reward_log_dir(
                    num_pairs,
                    policy,
                    &sweep.model_tag,
                )),
            );
            trainer.train(&loader, Some(test_loader), &mut rng, &mut logger)?;
            model.save(&model_path)?;

            let evaluation = evaluate(&model, &eval_loader);
            println!("{} {}", Paint::green("evaluation"), evaluation);
            append_log_line(
                experiment,
                format_args!(
                    "{}, {}, {}, {:.4}, {:.6}, {:.4}",
                    experiment.env_name,
                    num_pairs,
                    policy,
                    evaluation.accuracy,
                    evaluation.mse,
                    evaluation.pcc
                ),
            )?;
        }
    }
    Ok(())
}
